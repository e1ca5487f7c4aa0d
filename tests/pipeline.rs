use std::path::{Path, PathBuf};
use std::time::Duration;

use noodles::bam;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::{data::field::Value, RecordBuf};

use combiplex::command::combinatorial::core::params;
use combiplex::command::combinatorial::{run, RunSummary};
use combiplex::fileformat::output::{parse_bam_tags, OutFormat, OutputConfig};
use combiplex::fileformat::template::Template;

const OPSEQ: &str = "GAATCACGATACGTACACCAGT";
const BC1_A: &str = "AAAACCCCGGGG";
const BC1_B: &str = "TTTTGGGGCCCC";
const BC2_A: &str = "ACACACACACAC";
const BC2_B: &str = "GTGTGTGTGTGT";

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bc1.fa"),
            format!(">bc1_a\n{}\n>bc1_b first plate\n{}\n", BC1_A, BC1_B),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("bc2.fa"),
            format!(">bc2_a\n{}\n>bc2_b\n{}\n", BC2_A, BC2_B),
        )
        .unwrap();
        Fixture { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_fastq(&self, name: &str, reads: &[(String, String)]) -> PathBuf {
        let mut content = String::new();
        for (qname, seq) in reads {
            content.push_str(&format!("@{}\n{}\n+\n{}\n", qname, seq, "I".repeat(seq.len())));
        }
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn io(&self, path_r1: &Path, path_r2: Option<&Path>) -> params::IO {
        params::IO {
            path_r1: path_r1.to_path_buf(),
            path_r2: path_r2.map(Path::to_path_buf),
            path_bc1_ref: self.path("bc1.fa"),
            path_bc2_ref: self.path("bc2.fa"),
            path_bc1_cache: None,
            path_bc2_cache: None,
            update_cache: false,
            path_stats: None,
        }
    }

    fn fastq_output(&self, path: &Path) -> OutputConfig {
        OutputConfig {
            format: OutFormat::Fastq,
            path_assigned: path.to_path_buf(),
            path_unassigned: path.to_path_buf(),
            sample: "test".to_string(),
            cell: Template::parse_base("{BC1}.{BC2}").unwrap(),
            umi: Template::parse_base("").unwrap(),
            raw: Template::parse_base("").unwrap(),
            bam_tags: Vec::new(),
            fq_qual: b'E',
        }
    }
}

fn runtime() -> params::Runtime {
    params::Runtime {
        opseq: OPSEQ.as_bytes().to_vec(),
        min_opseq_score: 22.0,
        threshold: 0.5,
        chunk_size: 4,
        min_cache_count: 2.0,
        na: "NNNNNNNN".to_string(),
    }
}

fn threading(threads_work: usize) -> params::Threading {
    params::Threading {
        threads_work,
        queue_capacity: threads_work * 5,
        queue_timeout: Duration::from_millis(20),
        report_interval: Duration::from_secs(3600),
    }
}

fn good_read(bc1: &str, bc2: &str) -> String {
    format!("{}{}{}", bc1, OPSEQ, bc2)
}

fn broken_read() -> String {
    format!("{}{}{}", BC1_A, "T".repeat(OPSEQ.len()), BC2_A)
}

///////////////////////////////
/// read_i: every fourth read (i % 4 == 3) lacks the primer, otherwise even reads
/// carry the `a` barcodes and odd reads the `b` barcodes
fn mixed_reads(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| {
            let seq = if i % 4 == 3 {
                broken_read()
            } else if i % 2 == 0 {
                good_read(BC1_A, BC2_A)
            } else {
                good_read(BC1_B, BC2_B)
            };
            (format!("read_{}", i), seq)
        })
        .collect()
}

fn run_mixed(fx: &Fixture, io: params::IO, path_out: &Path) -> RunSummary {
    run(io, runtime(), threading(3), fx.fastq_output(path_out)).unwrap()
}

#[test]
fn test_single_read_is_assigned() {
    let fx = Fixture::new();
    let path_r1 = fx.write_fastq("r1.fq", &[("read_0".to_string(), good_read(BC1_A, BC2_A))]);
    let path_out = fx.path("out.fq");

    let summary = run(
        fx.io(&path_r1, None),
        runtime(),
        threading(1),
        fx.fastq_output(&path_out),
    )
    .unwrap();

    assert!(!summary.aborted);
    assert_eq!(summary.n_written, 1);
    assert_eq!(summary.tally.get("total"), 1.0);
    assert_eq!(summary.tally.get("called"), 1.0);

    let out = std::fs::read_to_string(&path_out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "@read_0");
    assert_eq!(lines[1], "bc1_a.bc2_a");
}

#[test]
fn test_parallel_run_keeps_input_order() {
    let fx = Fixture::new();
    let path_r1 = fx.write_fastq("r1.fq", &mixed_reads(24));
    let path_out = fx.path("out.fq");
    let path_stats = fx.path("stats.txt");

    let mut io = fx.io(&path_r1, None);
    io.path_stats = Some(path_stats.clone());
    let summary = run_mixed(&fx, io, &path_out);

    assert!(!summary.aborted);
    assert_eq!(summary.n_written, 24);
    assert_eq!(summary.tally.get("total"), 24.0);
    assert_eq!(summary.tally.get("called"), 18.0);
    assert_eq!(summary.tally.get("opseq_broken"), 6.0);
    assert_eq!(summary.bc1.name_count.get("bc1_a"), 12.0);
    // BC2 resolves two windows at half weight each; the one shifted into the
    // primer ties between both references
    assert_eq!(summary.bc2.name_count.get("bc2_b"), 3.0);
    assert_eq!(summary.bc2.name_count.get("NNNNNNNN"), 9.0);
    assert_eq!(summary.bc2.name_count.get("total"), 18.0);

    let out = std::fs::read_to_string(&path_out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 24 * 4);
    for i in 0..24 {
        assert_eq!(lines[4 * i], format!("@read_{}", i));
        let expected = match i {
            i if i % 4 == 3 => "NNNNNNNN.NNNNNNNN",
            i if i % 2 == 0 => "bc1_a.bc2_a",
            _ => "bc1_b.bc2_b",
        };
        assert_eq!(lines[4 * i + 1], expected);
    }

    let stats = std::fs::read_to_string(&path_stats).unwrap();
    assert!(stats.lines().any(|l| l == "freq\tcalled\t18\t75.00"));
    assert!(stats.lines().any(|l| l == "freq\ttotal\t24\t100.00"));
    assert!(stats.lines().any(|l| l == "BC1\tbc1_a\t12\t66.67"));
}

#[test]
fn test_cache_is_stored_and_reused() {
    let fx = Fixture::new();
    let path_r1 = fx.write_fastq("r1.fq", &mixed_reads(24));
    let path_bc1_cache = fx.path("bc1_cache.tsv");
    let path_bc2_cache = fx.path("bc2_cache.tsv");

    let mut io = fx.io(&path_r1, None);
    io.path_bc1_cache = Some(path_bc1_cache.clone());
    io.path_bc2_cache = Some(path_bc2_cache.clone());
    io.update_cache = true;
    let first = run_mixed(&fx, io, &fx.path("first.fq"));
    // each worker misses at least once per query it sees
    assert!(first.tally.get("BC1_cache_hit") <= 16.0);

    let cache = std::fs::read_to_string(&path_bc1_cache).unwrap();
    let lines: Vec<&str> = cache.lines().collect();
    assert_eq!(
        lines,
        vec![
            "AAAACCCCGGGG\tAAAACCCCGGGG\tbc1_a\t24\t12",
            "TTTTGGGGCCCC\tTTTTGGGGCCCC\tbc1_b\t24\t6",
        ]
    );
    let cache2 = std::fs::read_to_string(&path_bc2_cache).unwrap();
    assert!(cache2.lines().any(|l| l == "ACACACACACAC\tACACACACACAC\tbc2_a\t24\t6"));

    let mut io = fx.io(&path_r1, None);
    io.path_bc1_cache = Some(path_bc1_cache);
    let second = run_mixed(&fx, io, &fx.path("second.fq"));
    assert_eq!(second.tally.get("BC1_cache_hit"), 18.0);
    assert_eq!(second.tally.get("called"), 18.0);
}

#[test]
fn test_bam_output_routes_by_assignment() {
    let fx = Fixture::new();
    let reads = vec![
        ("read_0".to_string(), good_read(BC1_A, BC2_A)),
        ("read_1".to_string(), broken_read()),
    ];
    let path_r1 = fx.write_fastq("r1.fq", &reads);
    let inserts: Vec<(String, String)> = reads
        .iter()
        .map(|(q, _)| (format!("{} 2:N:0", q), "ACGTACGTAC".to_string()))
        .collect();
    let path_r2 = fx.write_fastq("r2.fq", &inserts);

    let path_assigned = fx.path("assigned.bam");
    let path_unassigned = fx.path("unassigned.bam");
    let config = OutputConfig {
        format: OutFormat::Bam,
        path_assigned: path_assigned.clone(),
        path_unassigned: path_unassigned.clone(),
        sample: "test".to_string(),
        cell: Template::parse_base("{BC1}.{BC2}").unwrap(),
        umi: Template::parse_base("{r1[0:8]}").unwrap(),
        raw: Template::parse_base("{bc1}").unwrap(),
        bam_tags: parse_bam_tags("CB:{cell},CR:{raw},RG:{assigned}").unwrap(),
        fq_qual: b'E',
    };
    let summary = run(fx.io(&path_r1, Some(&path_r2)), runtime(), threading(2), config).unwrap();
    assert_eq!(summary.n_written, 2);

    let read_back = |path: &Path| -> Vec<RecordBuf> {
        let mut reader = bam::io::reader::Builder::default()
            .build_from_path(path)
            .unwrap();
        let header = reader.read_header().unwrap();
        reader
            .record_bufs(&header)
            .collect::<std::io::Result<_>>()
            .unwrap()
    };

    let assigned = read_back(&path_assigned);
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].name().map(|n| n.to_vec()), Some(b"read_0".to_vec()));
    assert_eq!(
        assigned[0].data().get(&Tag::from([b'C', b'B'])),
        Some(&Value::from("bc1_a.bc2_a"))
    );
    assert_eq!(
        assigned[0].data().get(&Tag::from([b'C', b'R'])),
        Some(&Value::from(BC1_A))
    );

    let unassigned = read_back(&path_unassigned);
    assert_eq!(unassigned.len(), 1);
    assert_eq!(
        unassigned[0].data().get(&Tag::from([b'R', b'G'])),
        Some(&Value::from("U"))
    );
}

#[test]
fn test_missing_input_aborts_cleanly() {
    let fx = Fixture::new();
    let path_out = fx.path("out.fq");
    let summary = run(
        fx.io(&fx.path("does_not_exist.fq"), None),
        runtime(),
        threading(2),
        fx.fastq_output(&path_out),
    )
    .unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.n_written, 0);
    assert_eq!(summary.tally.get("total"), 0.0);
}
