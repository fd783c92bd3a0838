//! Flash key-value store reader for the webradio receiver.
//!
//! Station presets and settings live in a log-structured key-value partition
//! written by the configuration side. That store offers typed `get` but no
//! enumeration, so this crate recovers the full key population by walking
//! the raw 4096-byte pages itself:
//!
//! - [`page`] — page header, state word and entry-state bitmap
//! - [`entry`] — 32-byte entry slots, typed values, CRC validation
//! - [`PageScanner`] — sequential scan, typed lookup, namespace resolution
//!
//! Strictly read-only. Every corruption reads as "absent": a half-written
//! record disappears rather than failing the scan, matching the underlying
//! store's own tolerance for interrupted writes.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod entry;
pub mod page;
pub mod scanner;
pub mod testutil;

pub use entry::{EntryHead, EntryType, Value, MAX_KEY, MAX_STR};
pub use page::{PageHeader, PageState, ENTRIES_PER_PAGE, ENTRY_BYTES};
pub use scanner::{KeyRecord, PageScanner, StoreError, MAX_KEYS};
