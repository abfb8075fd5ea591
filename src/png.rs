use fs_err as fs;
use std::{fmt, path::Path};
use thiserror::Error;

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Chunk types required to decode the image. Everything else is ancillary.
pub const CRITICAL_CHUNKS: [ChunkType; 4] = [
    ChunkType(*b"IHDR"),
    ChunkType(*b"PLTE"),
    ChunkType(*b"IDAT"),
    ChunkType(*b"IEND"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("file is shorter than the 8-byte PNG signature")]
    MissingSignature,
    #[error("file does not start with the PNG signature")]
    BadSignature,
    #[error("truncated chunk header at offset {offset}")]
    TruncatedHeader { offset: usize },
    #[error(
        "chunk {chunk_type} at offset {offset} declares {length} bytes but only {available} remain"
    )]
    TruncatedPayload {
        chunk_type: ChunkType,
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("chunk {chunk_type} at offset {offset} is missing its CRC")]
    TruncatedCrc { chunk_type: ChunkType, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn is_critical(&self) -> bool {
        CRITICAL_CHUNKS.contains(self)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// A chunk borrowed from the source buffer. The CRC is kept as raw bytes so
/// retained chunks can be written back verbatim.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub chunk_type: ChunkType,
    pub data: &'a [u8],
    pub crc: [u8; 4],
}

impl Chunk<'_> {
    pub const DATA_LENGTH_BYTES: usize = 4;
    pub const CHUNK_TYPE_BYTES: usize = 4;
    pub const CRC_BYTES: usize = 4;
    pub const HEADER_BYTES: usize = Self::DATA_LENGTH_BYTES + Self::CHUNK_TYPE_BYTES;

    pub fn encoded_len(&self) -> usize {
        Self::HEADER_BYTES + self.data.len() + Self::CRC_BYTES
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.chunk_type.bytes());
        out.extend_from_slice(self.data);
        out.extend_from_slice(&self.crc);
    }
}

/// Sequential reader over the chunks following the signature.
pub struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Chunks<'a> {
    pub fn new(png: &'a [u8]) -> Result<Self, ChunkError> {
        if png.len() < SIGNATURE.len() {
            return Err(ChunkError::MissingSignature);
        }
        if png[..SIGNATURE.len()] != SIGNATURE {
            return Err(ChunkError::BadSignature);
        }

        Ok(Self {
            data: png,
            offset: SIGNATURE.len(),
        })
    }

    fn read_chunk(&mut self) -> Result<Chunk<'a>, ChunkError> {
        let data: &'a [u8] = self.data;
        let offset = self.offset;
        let rest = &data[offset..];

        if rest.len() < Chunk::HEADER_BYTES {
            return Err(ChunkError::TruncatedHeader { offset });
        }
        let (length, rest) = rest.split_at(Chunk::DATA_LENGTH_BYTES);
        let (chunk_type, rest) = rest.split_at(Chunk::CHUNK_TYPE_BYTES);

        let length = u32::from_be_bytes([length[0], length[1], length[2], length[3]]) as usize;
        let chunk_type = ChunkType([chunk_type[0], chunk_type[1], chunk_type[2], chunk_type[3]]);

        if rest.len() < length {
            return Err(ChunkError::TruncatedPayload {
                chunk_type,
                offset,
                length,
                available: rest.len(),
            });
        }
        let (payload, rest) = rest.split_at(length);

        if rest.len() < Chunk::CRC_BYTES {
            return Err(ChunkError::TruncatedCrc { chunk_type, offset });
        }
        let crc = [rest[0], rest[1], rest[2], rest[3]];

        let chunk = Chunk {
            chunk_type,
            data: payload,
            crc,
        };
        self.offset += chunk.encoded_len();
        Ok(chunk)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let chunk = self.read_chunk();
        if chunk.is_err() {
            // Stop after the first error; the remaining offsets are meaningless.
            self.offset = self.data.len();
        }
        Some(chunk)
    }
}

/// Keeps the signature and every critical chunk, dropping ancillary chunks.
///
/// Chunk payloads and CRCs are copied verbatim and their order is preserved.
/// Any truncation fails the whole buffer rather than producing partial output.
pub fn filter_chunks(png: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut out = Vec::with_capacity(png.len());
    out.extend_from_slice(&SIGNATURE);

    for chunk in Chunks::new(png)? {
        let chunk = chunk?;
        if chunk.chunk_type.is_critical() {
            chunk.write_to(&mut out);
        } else {
            log::trace!(
                "Dropping {} chunk ({} bytes)",
                chunk.chunk_type,
                chunk.data.len()
            );
        }
    }

    Ok(out)
}

/// Filters the file at `path` in place. Returns the number of bytes removed.
///
/// The file is left untouched when it cannot be parsed.
pub fn strip_file(path: &Path) -> Result<u64, crate::pipeline::OptimizeError> {
    let original = fs::read(path)?;
    let filtered = filter_chunks(&original)?;

    let removed = (original.len() - filtered.len()) as u64;
    if removed > 0 {
        fs::write(path, &filtered)?;
    }

    Ok(removed)
}
