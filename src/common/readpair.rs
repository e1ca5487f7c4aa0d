///////////////////////////////
/// One input read pair. Read 1 carries the barcodes and primer, read 2 the insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    pub qname: String,
    pub r1: Vec<u8>,
    pub r2_qname: String,
    pub r2: Vec<u8>,
    pub r2_qual: Vec<u8>,
}

impl ReadPair {
    ///////////////////////////////
    /// Single-end input: read 2 is replaced by a placeholder
    pub fn single_end(qname: String, r1: Vec<u8>) -> ReadPair {
        ReadPair {
            r2_qname: qname.clone(),
            qname,
            r1,
            r2: super::READ2_PLACEHOLDER.to_vec(),
            r2_qual: super::READ2_PLACEHOLDER.to_vec(),
        }
    }
}

impl std::fmt::Display for ReadPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.qname,
            String::from_utf8_lossy(&self.r1),
            String::from_utf8_lossy(&self.r2)
        )
    }
}

///////////////////////////////
/// Sequence-numbered batch of reads; the unit of parallel work and of reordering
#[derive(Debug, Clone)]
pub struct Chunk {
    pub seq: u64,
    pub records: Vec<ReadPair>,
}
