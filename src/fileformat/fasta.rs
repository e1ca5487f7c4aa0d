use log::debug;
use std::fs::File;
use std::path::Path;

use niffler::get_reader;
use seq_io::fasta::{Reader as FastaReader, Record as FastaRecord};

use crate::runtime::Error;

pub fn open_fasta(path: &Path) -> anyhow::Result<FastaReader<Box<dyn std::io::Read>>> {
    let opened_handle = File::open(path).map_err(|_| Error::file_not_found(path))?;
    let (reader, compression) = get_reader(Box::new(opened_handle))
        .map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?;
    debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(FastaReader::new(reader))
}

///////////////////////////////
/// Read all (name, sequence) pairs. Name is the first word of the header, sequence upper-cased
pub fn read_named_sequences(path: &Path) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    let mut reader = open_fasta(path)?;
    let mut out = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?;
        let name = record
            .id()
            .map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?
            .to_string();
        let seq: Vec<u8> = record
            .seq_lines()
            .flat_map(|line| line.iter().map(|b| b.to_ascii_uppercase()))
            .collect();
        out.push((name, seq));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_named_sequences() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, ">bc_01 first\nacgt\nACGT\n>bc_02\nTTTTGGGG\n").unwrap();
        file.flush().unwrap();

        let seqs = read_named_sequences(file.path()).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0], ("bc_01".to_string(), b"ACGTACGT".to_vec()));
        assert_eq!(seqs[1].0, "bc_02");
    }

    #[test]
    fn test_missing_file() {
        assert!(read_named_sequences(Path::new("/nonexistent/refs.fa")).is_err());
    }
}
