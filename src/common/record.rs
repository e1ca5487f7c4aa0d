use super::ReadPair;
use crate::fileformat::template::{Field, FieldSource};

///////////////////////////////
/// A processed read, ready for the output sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub assigned: bool,
    pub read: ReadPair,
    /// Raw barcode windows as found in read 1
    pub bc1: Vec<u8>,
    pub bc2: Vec<u8>,
    /// Corrected barcode names, or the NA code
    pub bc1_name: String,
    pub bc2_name: String,
}

impl OutputRecord {
    ///////////////////////////////
    /// Record without barcode resolution; fields fall back to fixed windows of the reads
    pub fn unresolved(read: ReadPair, na: &str) -> OutputRecord {
        let bc1 = read.r1[..read.r1.len().min(super::FALLBACK_BARCODE_LEN)].to_vec();
        let bc2 = read.r2[read.r2.len().saturating_sub(super::FALLBACK_BARCODE_LEN)..].to_vec();
        OutputRecord {
            assigned: false,
            read,
            bc1,
            bc2,
            bc1_name: na.to_string(),
            bc2_name: na.to_string(),
        }
    }
}

impl FieldSource for OutputRecord {
    fn field(&self, field: Field) -> &[u8] {
        match field {
            Field::Qname => self.read.qname.as_bytes(),
            Field::R1 => &self.read.r1,
            Field::R2 => &self.read.r2,
            Field::R2Qual => &self.read.r2_qual,
            Field::R2Qname => self.read.r2_qname.as_bytes(),
            Field::Bc1Raw => &self.bc1,
            Field::Bc2Raw => &self.bc2,
            Field::Bc1 => self.bc1_name.as_bytes(),
            Field::Bc2 => self.bc2_name.as_bytes(),
            Field::Assigned => {
                if self.assigned {
                    b"A"
                } else {
                    b"U"
                }
            }
            Field::Cell | Field::Umi | Field::Raw => b"",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_fallbacks() {
        let read = ReadPair {
            qname: "q".to_string(),
            r1: b"AAAACCCCGGGGTTTT".to_vec(),
            r2_qname: "q".to_string(),
            r2: b"ACGTACGTACGTACGT".to_vec(),
            r2_qual: b"IIIIIIIIIIIIIIII".to_vec(),
        };
        let rec = OutputRecord::unresolved(read, "NNNNNNNN");
        assert_eq!(rec.bc1, b"AAAACCCCGGGG");
        assert_eq!(rec.bc2, b"ACGTACGTACGT");
        assert_eq!(rec.field(Field::Bc1), b"NNNNNNNN");
        assert_eq!(rec.field(Field::Assigned), b"U");
    }
}
