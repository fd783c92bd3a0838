//! Flash page layout.
//!
//! The key-value partition is a sequence of fixed 4096-byte pages. Each page
//! opens with a 32-byte header, a 32-byte entry-state bitmap, then 126 entry
//! slots of 32 bytes each:
//!
//! ```text
//! offset    0        4        8            28       32         64
//!           ┌────────┬────────┬────────────┬────────┬──────────┬─────────────┐
//!           │ state  │ seq    │ reserved   │ crc    │ bitmap   │ 126 × entry │
//!           └────────┴────────┴────────────┴────────┴──────────┴─────────────┘
//! ```
//!
//! The header CRC covers bytes 4..28 (sequence number plus reserved area);
//! the state word is excluded so the writer can demote a page without
//! recomputing it.

use platform::PAGE_SIZE;

/// Entry slots per page.
pub const ENTRIES_PER_PAGE: usize = 126;

/// Bytes per entry slot.
pub const ENTRY_BYTES: usize = 32;

/// Byte offset of the entry-state bitmap.
const BITMAP_OFFSET: usize = 32;

/// Byte offset of the first entry slot.
const ENTRIES_OFFSET: usize = 64;

/// Page lifecycle state, stored as a full word so individual bits can be
/// cleared without an erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageState {
    /// Erased flash, never written. Not scanned.
    Uninitialized,
    /// The page currently accepting writes.
    Active,
    /// No free slots remain; contents are valid.
    Full,
    /// Being garbage-collected; contents are moving elsewhere.
    Freeing,
    /// Unrecognized state word.
    Corrupt,
}

impl PageState {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0xFFFF_FFFF => Self::Uninitialized,
            0xFFFF_FFFE => Self::Active,
            0xFFFF_FFFC => Self::Full,
            0xFFFF_FFF8 => Self::Freeing,
            _ => Self::Corrupt,
        }
    }

    /// `true` when the page's entries should be walked.
    pub fn scannable(self) -> bool {
        matches!(self, Self::Active | Self::Full)
    }
}

/// Decoded page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Lifecycle state.
    pub state: PageState,
    /// Monotonic sequence number; higher wins on duplicate keys.
    pub seq: u32,
    /// Whether the stored header CRC matched the recomputed one.
    pub crc_ok: bool,
}

impl PageHeader {
    /// Decode the header of a raw page image.
    pub fn decode(page: &[u8; PAGE_SIZE]) -> Self {
        let state = PageState::from_raw(read_u32(page, 0));
        let seq = read_u32(page, 4);
        let stored = read_u32(page, 28);
        let crc_ok = page
            .get(4..28)
            .is_some_and(|covered| crc32fast::hash(covered) == stored);
        Self { state, seq, crc_ok }
    }
}

/// 2-bit entry slot state from the page bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// `0b11`: erased flash, slot never written.
    Empty,
    /// `0b10`: slot holds a committed entry.
    Written,
    /// Any other pattern: superseded or half-written slot.
    Erased,
}

/// Slot state of entry `index` (slot 0 occupies the low bits of byte 0).
pub fn slot_state(page: &[u8; PAGE_SIZE], index: usize) -> SlotState {
    let byte = page
        .get(BITMAP_OFFSET.saturating_add(index / 4))
        .copied()
        .unwrap_or(0);
    #[allow(clippy::arithmetic_side_effects)] // SAFETY: index % 4 < 4, shift < 8
    let bits = (byte >> ((index % 4) * 2)) & 0b11;
    match bits {
        0b11 => SlotState::Empty,
        0b10 => SlotState::Written,
        _ => SlotState::Erased,
    }
}

/// Raw bytes of entry slot `index`, `None` past the last slot.
pub fn slot_bytes(page: &[u8; PAGE_SIZE], index: usize) -> Option<&[u8]> {
    if index >= ENTRIES_PER_PAGE {
        return None;
    }
    let start = ENTRIES_OFFSET.saturating_add(index.saturating_mul(ENTRY_BYTES));
    page.get(start..start.saturating_add(ENTRY_BYTES))
}

fn read_u32(page: &[u8; PAGE_SIZE], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    if let Some(src) = page.get(offset..offset.saturating_add(4)) {
        word.copy_from_slice(src);
    }
    u32::from_le_bytes(word)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_page_is_not_scannable() {
        let page = [0xFFu8; PAGE_SIZE];
        let header = PageHeader::decode(&page);
        assert_eq!(header.state, PageState::Uninitialized);
        assert!(!header.state.scannable());
    }

    #[test]
    fn active_header_round_trip() {
        let mut page = [0xFFu8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        page[4..8].copy_from_slice(&7u32.to_le_bytes());
        let crc = crc32fast::hash(&page[4..28]);
        page[28..32].copy_from_slice(&crc.to_le_bytes());

        let header = PageHeader::decode(&page);
        assert_eq!(header.state, PageState::Active);
        assert_eq!(header.seq, 7);
        assert!(header.crc_ok);
    }

    #[test]
    fn crc_is_stored_past_the_covered_range() {
        // The CRC word lives at 28..32; storing it anywhere inside the
        // covered 4..28 span could never validate against itself.
        let mut page = [0xFFu8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        page[4..8].copy_from_slice(&3u32.to_le_bytes());
        let crc = crc32fast::hash(&page[4..28]);
        page[24..28].copy_from_slice(&crc.to_le_bytes());
        assert!(!PageHeader::decode(&page).crc_ok);

        let mut page = [0xFFu8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        page[4..8].copy_from_slice(&3u32.to_le_bytes());
        let crc = crc32fast::hash(&page[4..28]);
        page[28..32].copy_from_slice(&crc.to_le_bytes());
        assert!(PageHeader::decode(&page).crc_ok);
    }

    #[test]
    fn seq_tamper_fails_header_crc() {
        let mut page = [0xFFu8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0xFFFF_FFFCu32.to_le_bytes());
        page[4..8].copy_from_slice(&1u32.to_le_bytes());
        let crc = crc32fast::hash(&page[4..28]);
        page[28..32].copy_from_slice(&crc.to_le_bytes());
        page[4] ^= 0x01;
        assert!(!PageHeader::decode(&page).crc_ok);
    }

    #[test]
    fn bitmap_packs_four_slots_per_byte() {
        let mut page = [0xFFu8; PAGE_SIZE];
        // Slot 0 written (0b10), slot 1 erased (0b00), slots 2..3 empty.
        page[32] = 0b1111_0010;
        assert_eq!(slot_state(&page, 0), SlotState::Written);
        assert_eq!(slot_state(&page, 1), SlotState::Erased);
        assert_eq!(slot_state(&page, 2), SlotState::Empty);
    }

    #[test]
    fn slot_bytes_bounds() {
        let page = [0u8; PAGE_SIZE];
        assert_eq!(slot_bytes(&page, 0).unwrap().len(), ENTRY_BYTES);
        assert!(slot_bytes(&page, ENTRIES_PER_PAGE - 1).is_some());
        assert!(slot_bytes(&page, ENTRIES_PER_PAGE).is_none());
    }
}
