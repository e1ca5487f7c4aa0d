use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::{data::field::Value, Data, QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::map::{program, read_group, Program, ReadGroup};
use noodles::sam::header::record::value::Map;

use super::template::{Field, FieldSource, Template};
use crate::common::OutputRecord;
use crate::runtime::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutFormat {
    /// Tagged, unaligned BAM of read 2
    Bam,
    /// Cell barcode + UMI as a read 1 FASTQ
    Fastq,
}

///////////////////////////////
/// Everything needed to turn a processed read into output
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub format: OutFormat,
    pub path_assigned: PathBuf,
    pub path_unassigned: PathBuf,
    pub sample: String,
    pub cell: Template,
    pub umi: Template,
    pub raw: Template,
    pub bam_tags: Vec<(Tag, Template)>,
    pub fq_qual: u8,
}

///////////////////////////////
/// Parse "CB:{cell},MI:{UMI}" into (tag, template) pairs. Commas inside braces do not split
pub fn parse_bam_tags(spec: &str) -> Result<Vec<(Tag, Template)>, Error> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in spec.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&spec[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&spec[start..]);

    let mut tags = Vec::new();
    for item in items.into_iter().filter(|s| !s.trim().is_empty()) {
        let (tag, template) = item
            .split_once(':')
            .ok_or_else(|| Error::template(item, "expected TAG:template"))?;
        let tag = tag.trim().as_bytes();
        if tag.len() != 2 || !tag.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::template(item, "BAM tags are two alphanumeric characters"));
        }
        tags.push((Tag::from([tag[0], tag[1]]), Template::parse(template)?));
    }
    Ok(tags)
}

///////////////////////////////
/// Record plus the fields derived from it by the cell/UMI/raw templates
struct Rendered<'a> {
    record: &'a OutputRecord,
    cell: Vec<u8>,
    umi: Vec<u8>,
    raw: Vec<u8>,
}

impl FieldSource for Rendered<'_> {
    fn field(&self, field: Field) -> &[u8] {
        match field {
            Field::Cell => &self.cell,
            Field::Umi => &self.umi,
            Field::Raw => &self.raw,
            other => self.record.field(other),
        }
    }
}

enum Sink {
    Bam(Box<dyn AlignmentWrite + Send>),
    Fastq(BufWriter<File>),
}

fn create_file(path: &Path) -> anyhow::Result<File> {
    File::create(path).map_err(|e| {
        anyhow::anyhow!("Could not create output file {}: {}", path.display(), e)
    })
}

///////////////////////////////
/// Writes processed reads to the assigned or unassigned destination
pub struct Output {
    config: OutputConfig,
    header: sam::Header,
    assigned: Sink,
    // None when both destinations are the same path
    unassigned: Option<Sink>,
    n_written: u64,
}

impl Output {
    pub fn new(config: OutputConfig) -> anyhow::Result<Output> {
        let header = build_header(&config.sample)?;
        let assigned = Output::open_sink(&config, &config.path_assigned, &header)?;
        let unassigned = if config.path_unassigned != config.path_assigned {
            Some(Output::open_sink(&config, &config.path_unassigned, &header)?)
        } else {
            None
        };
        Ok(Output {
            config,
            header,
            assigned,
            unassigned,
            n_written: 0,
        })
    }

    fn open_sink(config: &OutputConfig, path: &Path, header: &sam::Header) -> anyhow::Result<Sink> {
        debug!("opening {:?} output {}", config.format, path.display());
        let file = create_file(path)?;
        match config.format {
            OutFormat::Bam => {
                let mut writer = bam::io::Writer::new(file);
                writer.write_header(header)?;
                Ok(Sink::Bam(Box::new(writer)))
            }
            OutFormat::Fastq => Ok(Sink::Fastq(BufWriter::new(file))),
        }
    }

    pub fn n_written(&self) -> u64 {
        self.n_written
    }

    pub fn write(&mut self, record: &OutputRecord) -> anyhow::Result<()> {
        let rendered = Rendered {
            record,
            cell: self.config.cell.render(record),
            umi: self.config.umi.render(record),
            raw: self.config.raw.render(record),
        };

        let sink = match (record.assigned, self.unassigned.as_mut()) {
            (false, Some(sink)) => sink,
            _ => &mut self.assigned,
        };
        match sink {
            Sink::Bam(writer) => {
                let bam_record = make_bam_record(&self.config, &rendered)?;
                writer.write_alignment_record(&self.header, &bam_record)?;
            }
            Sink::Fastq(writer) => {
                write_fastq_record(writer, &self.config, &rendered)?;
            }
        }
        self.n_written += 1;
        Ok(())
    }

    pub fn close(self) -> anyhow::Result<()> {
        let header = self.header;
        for sink in std::iter::once(self.assigned).chain(self.unassigned) {
            match sink {
                Sink::Bam(mut writer) => writer.finish(&header)?,
                Sink::Fastq(mut writer) => writer.flush()?,
            }
        }
        Ok(())
    }
}

fn build_header(sample: &str) -> anyhow::Result<sam::Header> {
    let pg = Map::<Program>::builder()
        .insert(program::tag::VERSION, String::from(env!("CARGO_PKG_VERSION")))
        .build()?;
    let rg_assigned = Map::<ReadGroup>::builder()
        .insert(read_group::tag::SAMPLE, sample.to_string())
        .build()?;
    let rg_unassigned = Map::<ReadGroup>::builder()
        .insert(read_group::tag::SAMPLE, format!("unassigned_{}", sample))
        .build()?;

    Ok(sam::Header::builder()
        .set_header(Default::default())
        .add_program(env!("CARGO_PKG_NAME"), pg)
        .add_read_group("A", rg_assigned)
        .add_read_group("U", rg_unassigned)
        .build())
}

fn make_bam_record(config: &OutputConfig, rendered: &Rendered) -> anyhow::Result<RecordBuf> {
    let read = &rendered.record.read;
    // aligners choke on whitespace in read names
    let name = read.r2_qname.split_whitespace().next().unwrap_or("");

    let mut data = Data::default();
    for (tag, template) in &config.bam_tags {
        let value = String::from_utf8_lossy(&template.render(rendered)).into_owned();
        data.insert(*tag, Value::from(value));
    }

    Ok(RecordBuf::builder()
        .set_name(name.as_bytes())
        .set_flags(Flags::UNMAPPED)
        .set_sequence(Sequence::from(read.r2.clone()))
        .set_quality_scores(QualityScores::from(
            read.r2_qual
                .iter()
                .map(|&q| q.saturating_sub(33))
                .collect::<Vec<u8>>(),
        ))
        .set_data(data)
        .build())
}

fn write_fastq_record<W: Write>(
    writer: &mut W,
    config: &OutputConfig,
    rendered: &Rendered,
) -> std::io::Result<()> {
    let seq_len = rendered.cell.len() + rendered.umi.len();
    writer.write_all(b"@")?;
    writer.write_all(rendered.record.read.qname.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(&rendered.cell)?;
    writer.write_all(&rendered.umi)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(&vec![config.fq_qual; seq_len])?;
    writer.write_all(b"\n")?;
    Ok(())
}
