use log::debug;
use std::fs::File;
use std::path::Path;

use niffler::get_reader;
use seq_io::fastq::{Reader as FastqReader, Record as FastqRecord};

use crate::common::ReadPair;
use crate::runtime::Error;

pub fn open_fastq(path: &Path) -> anyhow::Result<FastqReader<Box<dyn std::io::Read>>> {
    let opened_handle = File::open(path).map_err(|_| Error::file_not_found(path))?;
    let (reader, compression) = get_reader(Box::new(opened_handle))
        .map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?;
    debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(FastqReader::new(reader))
}

///////////////////////////////
/// Lazily yields read pairs from one or two FASTQ files, in file order
pub struct PairedFastqSource {
    r1: FastqReader<Box<dyn std::io::Read>>,
    r2: Option<FastqReader<Box<dyn std::io::Read>>>,
}

impl PairedFastqSource {
    pub fn open(path_r1: &Path, path_r2: Option<&Path>) -> anyhow::Result<PairedFastqSource> {
        Ok(PairedFastqSource {
            r1: open_fastq(path_r1)?,
            r2: path_r2.map(open_fastq).transpose()?,
        })
    }

    fn next_pair(&mut self) -> anyhow::Result<Option<ReadPair>> {
        let rec1 = match self.r1.next() {
            Some(rec) => rec?,
            None => {
                if let Some(r2) = self.r2.as_mut() {
                    if r2.next().is_some() {
                        return Err(Error::parse_error(
                            "paired FASTQ input",
                            Some("read 2 has more records than read 1"),
                        )
                        .into());
                    }
                }
                return Ok(None);
            }
        };
        let qname = rec1.id()?.to_string();
        // barcodes and primer are matched upper-case; soft-masked bases count too
        let r1 = trim_end(rec1.seq()).to_ascii_uppercase();

        let Some(r2_reader) = self.r2.as_mut() else {
            return Ok(Some(ReadPair::single_end(qname, r1)));
        };
        let rec2 = match r2_reader.next() {
            Some(rec) => rec?,
            None => {
                return Err(Error::parse_error(
                    "paired FASTQ input",
                    Some("read 1 has more records than read 2"),
                )
                .into())
            }
        };
        let r2_qname = String::from_utf8_lossy(rec2.head()).into_owned();
        if rec2.id()? != qname {
            return Err(Error::parse_error(
                "paired FASTQ input",
                Some(format!("read names differ: {} vs {}", qname, r2_qname)),
            )
            .into());
        }

        Ok(Some(ReadPair {
            qname,
            r1,
            r2_qname,
            r2: rec2.seq().to_vec(),
            r2_qual: rec2.qual().to_vec(),
        }))
    }
}

impl Iterator for PairedFastqSource {
    type Item = anyhow::Result<ReadPair>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().transpose()
    }
}

fn trim_end(seq: &[u8]) -> &[u8] {
    let end = seq
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    &seq[..end]
}
