//! Stream-format layer for the webradio receiver.
//!
//! This crate turns a raw connection byte stream into playable audio and
//! metadata, with no I/O of its own:
//!
//! - [`StreamFramer`] — the ingestion state machine: ICY/HTTP header block,
//!   chunked transfer framing, in-band metadata intervals, playlist
//!   indirection and local-file ID3 tags
//! - [`AudioChunk`] — the 32-byte records handed to the playback context
//! - [`StreamSession`] — per-connection counters (station identity, advertised
//!   and measured bitrate, content length)
//!
//! Everything here is pure and byte-driven: feeding a stream one byte at a
//! time yields the same event sequence as feeding it in bulk, so the layer is
//! indifferent to network fragmentation.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod chunk;
pub mod framer;
pub mod headers;
pub mod metadata;
pub mod playlist;
pub mod session;

pub use chunk::{AudioChunk, ChunkPayload, CHUNK_BYTES};
pub use framer::{
    FramerEvent, ProtocolError, StreamFramer, StreamState, StreamTarget, HEADER_BYTE_BUDGET,
};
pub use metadata::{MetadataEvent, MAX_TITLE};
pub use playlist::{MAX_PLAYLIST_HOPS, MAX_URL};
pub use session::StreamSession;
