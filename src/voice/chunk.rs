//! Audio chunk intake and size policy

/// Smallest chunk worth transcribing (roughly 0.1s of compressed audio)
pub const MIN_CHUNK_BYTES: usize = 4000;

/// Reply text returned for chunks below [`MIN_CHUNK_BYTES`]
pub const SHORT_CHUNK_NOTICE: &str =
    "Audio chunk too short, please speak longer or check your microphone.";

/// One recorded unit of audio, decoded from the wire
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    /// MIME type as declared by the sender, never sniffed
    pub mime_type: String,
}

impl AudioChunk {
    #[must_use]
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Why a chunk was turned away before any upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooShort { len: usize, min: usize },
}

/// Outcome of chunk validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkVerdict {
    Accepted,
    Rejected(RejectReason),
}

/// Validates chunk size before any expensive processing
#[derive(Debug, Clone, Copy)]
pub struct ChunkValidator {
    min_bytes: usize,
}

impl Default for ChunkValidator {
    fn default() -> Self {
        Self::new(MIN_CHUNK_BYTES)
    }
}

impl ChunkValidator {
    #[must_use]
    pub const fn new(min_bytes: usize) -> Self {
        Self { min_bytes }
    }

    #[must_use]
    pub const fn min_bytes(&self) -> usize {
        self.min_bytes
    }

    /// Check a decoded buffer against the minimum-duration threshold
    #[must_use]
    pub const fn validate(&self, buffer: &[u8]) -> ChunkVerdict {
        if buffer.len() < self.min_bytes {
            ChunkVerdict::Rejected(RejectReason::TooShort {
                len: buffer.len(),
                min: self.min_bytes,
            })
        } else {
            ChunkVerdict::Accepted
        }
    }
}
