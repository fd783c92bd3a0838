//! Partition image builders for tests.
//!
//! Writer-side counterpart of the scanner, kept here so integration tests in
//! other crates can assemble realistic partition images without talking to
//! real flash. Layout and CRC conventions mirror `page`/`entry` exactly.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)] // builders: offsets bounded by construction
#![allow(clippy::arithmetic_side_effects)] // slot math bounded by page capacity

use platform::PAGE_SIZE;

use crate::entry::entry_crc;
use crate::page::{ENTRIES_PER_PAGE, ENTRY_BYTES};

/// Builds one 4096-byte page image, filling slots front to back.
pub struct PageBuilder {
    buf: [u8; PAGE_SIZE],
    next: usize,
}

impl PageBuilder {
    /// A page in ACTIVE state with the given sequence number.
    pub fn new(seq: u32) -> Self {
        Self::with_state(0xFFFF_FFFE, seq)
    }

    /// A page in FULL state with the given sequence number.
    pub fn full(seq: u32) -> Self {
        Self::with_state(0xFFFF_FFFC, seq)
    }

    fn with_state(state: u32, seq: u32) -> Self {
        let mut buf = [0xFFu8; PAGE_SIZE];
        buf[0..4].copy_from_slice(&state.to_le_bytes());
        buf[4..8].copy_from_slice(&seq.to_le_bytes());
        let crc = crc32fast::hash(&buf[4..28]);
        buf[28..32].copy_from_slice(&crc.to_le_bytes());
        Self { buf, next: 0 }
    }

    /// Write a raw 32-byte slot and mark it written. Returns the slot index.
    pub fn raw_slot(&mut self, raw: [u8; ENTRY_BYTES]) -> usize {
        assert!(self.next < ENTRIES_PER_PAGE, "page full");
        let slot = self.next;
        self.next += 1;
        let start = 64 + slot * ENTRY_BYTES;
        self.buf[start..start + ENTRY_BYTES].copy_from_slice(&raw);
        self.mark_written(slot);
        slot
    }

    fn mark_written(&mut self, slot: usize) {
        let byte = 32 + slot / 4;
        let shift = (slot % 4) * 2;
        self.buf[byte] &= !(0b11 << shift);
        self.buf[byte] |= 0b10 << shift;
    }

    fn head(ns: u8, type_code: u8, span: u8, key: &str, data: [u8; 8]) -> [u8; ENTRY_BYTES] {
        assert!(key.len() <= 15, "key too long");
        let mut raw = [0u8; ENTRY_BYTES];
        raw[0] = ns;
        raw[1] = type_code;
        raw[2] = span;
        raw[3] = 0xFF;
        raw[8..8 + key.len()].copy_from_slice(key.as_bytes());
        raw[24..32].copy_from_slice(&data);
        let crc = entry_crc(&raw);
        raw[4..8].copy_from_slice(&crc.to_le_bytes());
        raw
    }

    /// Single-slot u8 entry.
    pub fn put_u8(&mut self, ns: u8, key: &str, value: u8) -> usize {
        let mut data = [0u8; 8];
        data[0] = value;
        self.raw_slot(Self::head(ns, 0x01, 1, key, data))
    }

    /// Single-slot u32 entry.
    pub fn put_u32(&mut self, ns: u8, key: &str, value: u32) -> usize {
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&value.to_le_bytes());
        self.raw_slot(Self::head(ns, 0x04, 1, key, data))
    }

    /// Single-slot i16 entry.
    pub fn put_i16(&mut self, ns: u8, key: &str, value: i16) -> usize {
        let mut data = [0u8; 8];
        data[..2].copy_from_slice(&value.to_le_bytes());
        self.raw_slot(Self::head(ns, 0x12, 1, key, data))
    }

    /// String entry: head slot plus continuation slots. The stored payload
    /// carries a NUL terminator, as the original store writes it. Returns
    /// the head slot index.
    pub fn put_str(&mut self, ns: u8, key: &str, value: &str) -> usize {
        let mut payload: heapless::Vec<u8, 192> = heapless::Vec::new();
        payload.extend_from_slice(value.as_bytes()).unwrap();
        payload.push(0).unwrap();
        let len = payload.len();
        let crc = crc32fast::hash(&payload);
        let cont_slots = len.div_ceil(ENTRY_BYTES);

        let mut data = [0u8; 8];
        data[..2].copy_from_slice(&(len as u16).to_le_bytes());
        data[4..8].copy_from_slice(&crc.to_le_bytes());
        let head = Self::head(ns, 0x21, (1 + cont_slots) as u8, key, data);
        let head_slot = self.raw_slot(head);

        for chunk in payload.chunks(ENTRY_BYTES) {
            let mut raw = [0xFFu8; ENTRY_BYTES];
            raw[..chunk.len()].copy_from_slice(chunk);
            self.raw_slot(raw);
        }
        head_slot
    }

    /// Flip a data byte in `slot` without recomputing its entry CRC.
    pub fn corrupt_entry(&mut self, slot: usize) {
        self.buf[64 + slot * ENTRY_BYTES + 24] ^= 0xFF;
    }

    /// Flip the first byte of `slot` raw (for continuation-slot damage).
    pub fn corrupt_slot_data(&mut self, slot: usize) {
        self.buf[64 + slot * ENTRY_BYTES] ^= 0xFF;
    }

    /// Finish the page image.
    pub fn finish(self) -> [u8; PAGE_SIZE] {
        self.buf
    }
}
