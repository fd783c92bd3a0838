//! Key-value partition scanner.
//!
//! Walks the raw flash pages directly — there is no enumeration primitive in
//! the underlying store's API, so presets and settings are recovered by
//! decoding the page format itself. Read-only: the write path belongs to the
//! firmware-update/settings side and is excluded by holding `&mut` on the
//! partition for the duration of a scan.
//!
//! All corruption (page CRC, entry CRC, string payload CRC, truncated span)
//! reads as "absent". A half-written record disappears; it never aborts a
//! scan.

use heapless::{String, Vec};
use platform::{FlashPartition, PAGE_SIZE};

use crate::entry::{EntryHead, EntryType, Value, MAX_KEY, MAX_STR};
use crate::page::{slot_bytes, slot_state, PageHeader, SlotState, ENTRIES_PER_PAGE, ENTRY_BYTES};

/// Most records one scan returns; matches the preset/settings budget of the
/// partition, not its theoretical capacity.
pub const MAX_KEYS: usize = 200;

/// One enumerated key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Namespace index the key lives in.
    pub ns: u8,
    /// Key text.
    pub key: String<MAX_KEY>,
    /// Value type of the winning (highest-sequence) record.
    pub etype: EntryType,
}

/// Scanner failures. Corrupt data is never an error; only the flash
/// transport can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError<E> {
    /// The partition read itself failed.
    Flash(E),
}

/// Page-walking scanner over a raw partition.
///
/// Holds one page image; pages are processed strictly sequentially so peak
/// memory stays at a single 4 KiB buffer regardless of partition size.
pub struct PageScanner<'a, F: FlashPartition> {
    flash: &'a mut F,
    page: [u8; PAGE_SIZE],
}

impl<'a, F: FlashPartition> PageScanner<'a, F> {
    /// Wrap a partition. The exclusive borrow is the mutual-exclusion
    /// domain shared with the external write path.
    pub fn new(flash: &'a mut F) -> Self {
        Self {
            flash,
            page: [0u8; PAGE_SIZE],
        }
    }

    fn page_count(&self) -> u32 {
        #[allow(clippy::arithmetic_side_effects)] // SAFETY: PAGE_SIZE is nonzero
        let count = self.flash.size() / PAGE_SIZE as u32;
        count
    }

    fn load_page(&mut self, index: u32) -> Result<PageHeader, StoreError<F::Error>> {
        let offset = index.saturating_mul(PAGE_SIZE as u32);
        self.flash
            .read(offset, &mut self.page)
            .map_err(StoreError::Flash)?;
        Ok(PageHeader::decode(&self.page))
    }

    /// Enumerate every valid key, optionally restricted to one namespace.
    ///
    /// Ordering is page-sequence then slot order. Duplicate ns+key pairs
    /// collapse to the record from the highest page sequence. Results past
    /// [`MAX_KEYS`] are dropped.
    pub fn scan(
        &mut self,
        namespace: Option<u8>,
    ) -> Result<Vec<KeyRecord, MAX_KEYS>, StoreError<F::Error>> {
        let mut records: Vec<KeyRecord, MAX_KEYS> = Vec::new();
        let mut seqs: Vec<u32, MAX_KEYS> = Vec::new();

        for page_index in 0..self.page_count() {
            let header = self.load_page(page_index)?;
            if !header.state.scannable() || !header.crc_ok {
                continue;
            }
            walk_entries(&self.page, |_, head| {
                if namespace.is_some_and(|ns| ns != head.ns) {
                    return;
                }
                if let Some(pos) = records
                    .iter()
                    .position(|r| r.ns == head.ns && r.key == head.key)
                {
                    let keep = seqs.get(pos).copied().unwrap_or(0);
                    if header.seq >= keep {
                        if let (Some(rec), Some(seq)) = (records.get_mut(pos), seqs.get_mut(pos)) {
                            rec.etype = head.etype;
                            *seq = header.seq;
                        }
                    }
                } else {
                    let record = KeyRecord {
                        ns: head.ns,
                        key: head.key.clone(),
                        etype: head.etype,
                    };
                    if records.push(record).is_ok() {
                        let _ = seqs.push(header.seq);
                    }
                }
            });
        }
        Ok(records)
    }

    /// Typed lookup. `Ok(None)` covers both "never written" and "present
    /// but corrupt".
    pub fn get(&mut self, ns: u8, key: &str) -> Result<Option<Value>, StoreError<F::Error>> {
        let mut best: Option<(u32, Value)> = None;

        for page_index in 0..self.page_count() {
            let header = self.load_page(page_index)?;
            if !header.state.scannable() || !header.crc_ok {
                continue;
            }
            let mut hit: Option<Value> = None;
            walk_entries(&self.page, |slot, head| {
                if head.ns == ns && head.key.as_str() == key {
                    if let Some(value) = materialize(&self.page, slot, head) {
                        hit = Some(value);
                    }
                }
            });
            if let Some(value) = hit {
                let newer = best.as_ref().map_or(true, |(seq, _)| header.seq >= *seq);
                if newer {
                    best = Some((header.seq, value));
                }
            }
        }
        Ok(best.map(|(_, value)| value))
    }

    /// Resolve a namespace name to its index via the namespace directory
    /// (entries with ns byte 0).
    pub fn namespace_id(&mut self, name: &str) -> Result<Option<u8>, StoreError<F::Error>> {
        Ok(match self.get(0, name)? {
            Some(Value::U8(id)) => Some(id),
            _ => None,
        })
    }
}

/// Walk the written head entries of one page, skipping continuation slots
/// by span. Invalid heads are skipped one slot at a time so a corrupt span
/// byte cannot hide later valid entries.
fn walk_entries(page: &[u8; PAGE_SIZE], mut visit: impl FnMut(usize, &EntryHead)) {
    let mut index = 0usize;
    while index < ENTRIES_PER_PAGE {
        let step = match slot_state(page, index) {
            SlotState::Written => match slot_bytes(page, index).and_then(EntryHead::decode) {
                Some(head) => {
                    let span = usize::from(head.span);
                    visit(index, &head);
                    span
                }
                None => 1,
            },
            _ => 1,
        };
        index = index.saturating_add(step.max(1));
    }
}

/// Materialize the value of the decoded head at `slot`, pulling string
/// payload from its continuation slots in the same page image.
fn materialize(page: &[u8; PAGE_SIZE], slot: usize, head: &EntryHead) -> Option<Value> {
    if let Some(value) = head.primitive() {
        return Some(value);
    }
    let (len, crc) = head.str_head()?;
    let span = usize::from(head.span);
    if span < 2 || len > span.saturating_sub(1).saturating_mul(ENTRY_BYTES) {
        return None;
    }
    let start = slot.checked_add(1)?;
    let mut payload: Vec<u8, MAX_STR> = Vec::new();
    let mut remaining = len;
    for index in start..start.saturating_add(span.saturating_sub(1)) {
        let raw = slot_bytes(page, index)?;
        let take = remaining.min(ENTRY_BYTES);
        for &b in raw.get(..take)? {
            payload.push(b).ok()?;
        }
        remaining = remaining.saturating_sub(take);
    }
    if crc32fast::hash(&payload) != crc {
        return None;
    }
    // Stored strings carry their NUL terminator.
    if payload.last() == Some(&0) {
        let _ = payload.pop();
    }
    let text = core::str::from_utf8(&payload).ok()?;
    Some(Value::Str(String::try_from(text).ok()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use platform::mocks::MockFlash;

    use super::*;
    use crate::testutil::PageBuilder;

    #[test]
    fn scan_lists_valid_keys_only() {
        let mut builder = PageBuilder::new(1);
        builder.put_u8(0, "radio", 1);
        builder.put_u32(1, "volume", 72);
        builder.put_str(1, "preset_00", "http://stream.example/one");
        let corrupt = builder.put_u8(1, "broken", 9);
        builder.corrupt_entry(corrupt);
        let image = builder.finish();

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        let records = scanner.scan(Some(1)).unwrap();
        let keys: std::vec::Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, std::vec!["volume", "preset_00"]);
    }

    #[test]
    fn get_primitive_and_string() {
        let mut builder = PageBuilder::new(1);
        builder.put_u32(1, "volume", 72);
        builder.put_str(1, "preset_01", "http://stream.example/two");
        let image = builder.finish();

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        assert_eq!(scanner.get(1, "volume").unwrap(), Some(Value::U32(72)));
        match scanner.get(1, "preset_01").unwrap() {
            Some(Value::Str(s)) => assert_eq!(s.as_str(), "http://stream.example/two"),
            other => panic!("expected Str, got {other:?}"),
        }
        assert_eq!(scanner.get(1, "missing").unwrap(), None);
    }

    #[test]
    fn corrupt_entry_crc_reads_as_absent() {
        let mut builder = PageBuilder::new(1);
        let slot = builder.put_u32(1, "volume", 72);
        builder.corrupt_entry(slot);
        let image = builder.finish();

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        assert_eq!(scanner.get(1, "volume").unwrap(), None);
        assert!(scanner.scan(Some(1)).unwrap().is_empty());
    }

    #[test]
    fn span_continuation_slots_are_not_entries() {
        let mut builder = PageBuilder::new(1);
        // 70-byte value: head + 3 continuation slots (span 4).
        let long = "0123456789".repeat(7);
        builder.put_str(1, "preset_02", &long);
        builder.put_u8(1, "after", 5);
        let image = builder.finish();

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        let records = scanner.scan(None).unwrap();
        // Exactly two records: the string head and the entry after it.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.as_str(), "preset_02");
        assert_eq!(records[1].key.as_str(), "after");
        assert_eq!(scanner.get(1, "after").unwrap(), Some(Value::U8(5)));
    }

    #[test]
    fn higher_page_sequence_wins_duplicates() {
        let mut old = PageBuilder::new(3);
        old.put_u32(1, "volume", 50);
        let mut new = PageBuilder::full(7);
        new.put_u32(1, "volume", 80);

        // Partition order is physical, not sequence order.
        let mut image = std::vec::Vec::new();
        image.extend_from_slice(&new.finish());
        image.extend_from_slice(&old.finish());

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        assert_eq!(scanner.get(1, "volume").unwrap(), Some(Value::U32(80)));
        let records = scanner.scan(Some(1)).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn uninitialized_page_is_skipped() {
        let mut image = std::vec::Vec::from([0xFFu8; PAGE_SIZE]);
        let mut builder = PageBuilder::new(1);
        builder.put_u8(2, "k", 1);
        image.extend_from_slice(&builder.finish());

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        assert_eq!(scanner.scan(None).unwrap().len(), 1);
    }

    #[test]
    fn string_payload_crc_mismatch_is_absent() {
        let mut builder = PageBuilder::new(1);
        let slot = builder.put_str(1, "preset_03", "http://stream.example/three");
        // Flip a byte in the continuation slot, not the head.
        builder.corrupt_slot_data(slot + 1);
        let image = builder.finish();

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        assert_eq!(scanner.get(1, "preset_03").unwrap(), None);
    }

    #[test]
    fn namespace_directory_lookup() {
        let mut builder = PageBuilder::new(1);
        builder.put_u8(0, "radio", 4);
        builder.put_u32(4, "volume", 60);
        let image = builder.finish();

        let mut flash = MockFlash::new(&image);
        let mut scanner = PageScanner::new(&mut flash);
        let ns = scanner.namespace_id("radio").unwrap().unwrap();
        assert_eq!(ns, 4);
        assert_eq!(scanner.get(ns, "volume").unwrap(), Some(Value::U32(60)));
        assert_eq!(scanner.namespace_id("nothere").unwrap(), None);
    }
}
