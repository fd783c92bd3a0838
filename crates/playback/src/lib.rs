//! Playback core for the webradio receiver.
//!
//! Ties the format layers to the platform traits with two long-running
//! tasks and a control surface:
//!
//! - [`ChunkQueue`] — the bounded buffer between network and decoder
//! - [`ingest`] — socket bytes → framer → queue, with backpressure
//! - [`play`] — queue → decoder ready gate → 32-byte writes
//! - [`Player`] — session orchestration: presets, playlist hops,
//!   connect retry, stop handling
//! - [`RadioStatus`] — read-mostly state for display/control code
//!
//! The queue and status block are designed to live in `static`s shared by
//! the firmware's tasks; everything is generic over the mutex flavor so the
//! same code runs under host tests with the no-op mutex.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod ingest;
pub mod orchestrator;
pub mod play;
pub mod queue;
pub mod status;

pub use ingest::{run_ingest, IngestOutcome};
pub use orchestrator::{
    preset_url, step_preset, Player, PlayerError, PresetStep, PREF_NAMESPACE, RETRY_BACKOFF,
};
pub use play::run_playback;
pub use queue::{ChunkQueue, QueueTimeout, PUSH_TIMEOUT, QUEUE_DEPTH};
pub use status::{NowPlaying, RadioStatus};
