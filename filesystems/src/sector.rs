// In-memory sector buffer, assembled completely before anything touches the device

/// Bytes about to be written at offset 0 of the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorBuffer {
    bytes: Vec<u8>,
    sector_size: usize,
}

impl SectorBuffer {
    pub fn new(bytes: Vec<u8>, sector_size: usize) -> Self {
        Self { bytes, sector_size }
    }

    /// Concatenate byte ranges in order.
    pub fn from_parts(parts: &[&[u8]], sector_size: usize) -> Self {
        Self::new(parts.concat(), sector_size)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Append whole trailing sectors, e.g. the exFAT checksum sector.
    pub fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}
