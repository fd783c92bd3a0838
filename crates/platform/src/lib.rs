//! Hardware Abstraction Layer (HAL) for the webradio receiver.
//!
//! This crate provides trait-based abstractions for the collaborators the
//! radio core talks to, enabling development and testing without physical
//! hardware or a live network.
//!
//! # Architecture Layers
//!
//! ```text
//! Control Layer (playback crate — orchestrator, tasks)
//!         ↓
//! Format Layers (stream, store)
//!         ↓
//! Platform HAL (this crate — trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + socket stack + raw flash)
//! ```
//!
//! # Abstractions
//!
//! - [`StreamSource`] — byte-level read access to a connected stream or file
//! - [`Connector`] — resolves a target URL into a [`StreamSource`]
//! - [`AudioDecoder`] — the external decoder chip (data-request gate,
//!   32-byte data writes, song boundaries, volume)
//! - [`FlashPartition`] — raw, page-aligned reads of the key-value partition
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `hardware`: Physical hardware implementations
//! - `defmt`: Enable defmt derives on platform types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod decoder;
pub mod flash;
pub mod mocks;
pub mod source;

pub use decoder::AudioDecoder;
pub use flash::{FlashPartition, PAGE_SIZE};
pub use source::{ConnectionInfo, Connector, StreamSource};
