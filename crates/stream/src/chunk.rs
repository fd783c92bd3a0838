//! Audio chunk records travelling through the handoff queue.
//!
//! A chunk is either one fixed-size slot of compressed audio payload or an
//! in-band session boundary marker. Keeping the markers in the same queue as
//! the payload keeps session boundaries strictly ordered relative to the
//! bytes they bound — no side channel required.

/// Payload bytes per queue slot. Large transfers are split across many
/// chunks; the fixed slot size bounds queue memory.
pub const CHUNK_BYTES: usize = 32;

/// One queue slot's worth of compressed audio payload (at most
/// [`CHUNK_BYTES`] bytes; only the final chunk of a session may be short).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChunkPayload {
    bytes: [u8; CHUNK_BYTES],
    len: u8,
}

impl ChunkPayload {
    /// Build a payload from up to [`CHUNK_BYTES`] bytes.
    ///
    /// Returns `None` when `data` is too long for one slot.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() > CHUNK_BYTES {
            return None;
        }
        let mut bytes = [0u8; CHUNK_BYTES];
        bytes.get_mut(..data.len())?.copy_from_slice(data);
        #[allow(clippy::cast_possible_truncation)] // len <= 32, checked above
        Some(Self {
            bytes,
            len: data.len() as u8,
        })
    }

    /// The valid payload bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.bytes.get(..self.len as usize).unwrap_or(&[])
    }

    /// Number of valid payload bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// `true` when the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` when every slot byte is used.
    pub fn is_full(&self) -> bool {
        self.len as usize == CHUNK_BYTES
    }
}

/// A record in the handoff queue: audio payload or session boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioChunk {
    /// Compressed audio bytes for the decoder chip.
    Data(ChunkPayload),
    /// A new song/stream session begins after this record.
    StartSong,
    /// The session ended; the decoder should flush and go idle.
    StopSong,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn payload_from_full_slice() {
        let p = ChunkPayload::from_slice(&[7u8; CHUNK_BYTES]).unwrap();
        assert!(p.is_full());
        assert_eq!(p.as_slice(), &[7u8; CHUNK_BYTES]);
    }

    #[test]
    fn payload_from_partial_slice() {
        let p = ChunkPayload::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.as_slice(), &[1, 2, 3]);
        assert!(!p.is_full());
    }

    #[test]
    fn payload_rejects_oversized_slice() {
        assert!(ChunkPayload::from_slice(&[0u8; CHUNK_BYTES + 1]).is_none());
    }
}
