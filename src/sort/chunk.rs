/// One sorted run inside a spill file: the bytes `[offset, offset + length)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    offset: u64,
    length: u64,
}

impl Chunk {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// The same run after its file was appended to another at `base`.
    pub fn shifted(&self, base: u64) -> Chunk {
        Chunk::new(self.offset + base, self.length)
    }
}
