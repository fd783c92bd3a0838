//! Entry slot decoding.
//!
//! Every 32-byte slot is either the head of an entry or a continuation of a
//! multi-span one:
//!
//! ```text
//! offset  0     1      2      3      4      8        24
//!         ┌─────┬──────┬──────┬──────┬──────┬────────┬──────────┐
//!         │ ns  │ type │ span │ rsvd │ crc  │ key    │ data     │
//!         └─────┴──────┴──────┴──────┴──────┴────────┴──────────┘
//! ```
//!
//! The entry CRC covers bytes 0..4 and 8..32 — the CRC field itself is
//! skipped. Keys are NUL-terminated within their 16-byte field. Primitive
//! values live in the 8-byte inline data; strings put a
//! `{len:u16, _:u16, crc:u32}` head there and the bytes in the following
//! `span - 1` slots.

use heapless::String;

use crate::page::ENTRY_BYTES;

/// Longest key, excluding the NUL terminator.
pub const MAX_KEY: usize = 15;

/// Longest string value the scanner materializes.
pub const MAX_STR: usize = 160;

/// Typed-value codes stored in the entry's type byte. The high nibble is
/// the kind (0 unsigned, 1 signed, 2 string, 4 blob), the low nibble the
/// width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntryType {
    /// `0x01`
    U8,
    /// `0x02`
    U16,
    /// `0x04`
    U32,
    /// `0x08`
    U64,
    /// `0x11`
    I8,
    /// `0x12`
    I16,
    /// `0x14`
    I32,
    /// `0x18`
    I64,
    /// `0x21`
    Str,
}

impl EntryType {
    /// Decode a type byte; unknown codes (blob variants included) are `None`
    /// and the entry is skipped by span.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::U8),
            0x02 => Some(Self::U16),
            0x04 => Some(Self::U32),
            0x08 => Some(Self::U64),
            0x11 => Some(Self::I8),
            0x12 => Some(Self::I16),
            0x14 => Some(Self::I32),
            0x18 => Some(Self::I64),
            0x21 => Some(Self::Str),
            _ => None,
        }
    }
}

/// A typed value materialized from one entry (plus continuation slots for
/// strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned 8-bit.
    U8(u8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Unsigned 32-bit.
    U32(u32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 8-bit.
    I8(i8),
    /// Signed 16-bit.
    I16(i16),
    /// Signed 32-bit.
    I32(i32),
    /// Signed 64-bit.
    I64(i64),
    /// NUL-stripped string.
    Str(String<MAX_STR>),
}

/// Decoded, CRC-validated entry head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHead {
    /// Namespace index; 0 is the namespace directory itself.
    pub ns: u8,
    /// Value type.
    pub etype: EntryType,
    /// Slots occupied, head included. Always ≥ 1.
    pub span: u8,
    /// Key, NUL terminator stripped.
    pub key: String<MAX_KEY>,
    /// Inline data field.
    pub data: [u8; 8],
}

impl EntryHead {
    /// Decode one slot. `None` when the CRC fails, the type code is
    /// unknown, or the key is not NUL-terminated ASCII — all meaning
    /// "absent", never an error.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != ENTRY_BYTES {
            return None;
        }
        let stored = read_u32(raw, 4);
        if entry_crc(raw) != stored {
            return None;
        }
        let ns = *raw.first()?;
        let etype = EntryType::from_code(*raw.get(1)?)?;
        let span = (*raw.get(2)?).max(1);
        let key = decode_key(raw.get(8..24)?)?;
        let mut data = [0u8; 8];
        data.copy_from_slice(raw.get(24..32)?);
        Some(Self {
            ns,
            etype,
            span,
            key,
            data,
        })
    }

    /// Materialize a primitive (span-1) value from the inline data.
    /// `None` for string heads, which need their continuation slots.
    pub fn primitive(&self) -> Option<Value> {
        let d = &self.data;
        Some(match self.etype {
            EntryType::U8 => Value::U8(*d.first()?),
            EntryType::I8 => Value::I8(*d.first()? as i8),
            EntryType::U16 => Value::U16(u16::from_le_bytes([*d.first()?, *d.get(1)?])),
            EntryType::I16 => Value::I16(i16::from_le_bytes([*d.first()?, *d.get(1)?])),
            EntryType::U32 => Value::U32(read_u32(d, 0)),
            EntryType::I32 => Value::I32(read_u32(d, 0) as i32),
            EntryType::U64 => Value::U64(read_u64(d)),
            EntryType::I64 => Value::I64(read_u64(d) as i64),
            EntryType::Str => return None,
        })
    }

    /// String head fields: `(payload_len, payload_crc)`.
    pub fn str_head(&self) -> Option<(usize, u32)> {
        if self.etype != EntryType::Str {
            return None;
        }
        let len = u16::from_le_bytes([self.data[0], self.data[1]]);
        let crc = read_u32(&self.data, 4);
        Some((usize::from(len), crc))
    }
}

/// Entry CRC: bytes 0..4 and 8..32, the CRC field excluded.
pub fn entry_crc(raw: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(raw.get(0..4).unwrap_or(&[]));
    hasher.update(raw.get(8..32).unwrap_or(&[]));
    hasher.finalize()
}

fn decode_key(field: &[u8]) -> Option<String<MAX_KEY>> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if len > MAX_KEY {
        return None;
    }
    let bytes = field.get(..len)?;
    if !bytes.iter().all(|b| b.is_ascii() && !b.is_ascii_control()) {
        return None;
    }
    let text = core::str::from_utf8(bytes).ok()?;
    String::try_from(text).ok()
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    if let Some(src) = raw.get(offset..offset.saturating_add(4)) {
        word.copy_from_slice(src);
    }
    u32::from_le_bytes(word)
}

fn read_u64(raw: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    if let Some(src) = raw.get(0..8) {
        word.copy_from_slice(src);
    }
    u64::from_le_bytes(word)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn raw_entry(ns: u8, type_code: u8, span: u8, key: &str, data: [u8; 8]) -> [u8; 32] {
        let mut raw = [0u8; 32];
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

    #[test]
    fn u32_entry_decodes() {
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&72u32.to_le_bytes());
        let raw = raw_entry(1, 0x04, 1, "volume", data);
        let head = EntryHead::decode(&raw).unwrap();
        assert_eq!(head.ns, 1);
        assert_eq!(head.etype, EntryType::U32);
        assert_eq!(head.key.as_str(), "volume");
        assert_eq!(head.primitive(), Some(Value::U32(72)));
    }

    #[test]
    fn negative_value_decodes() {
        let mut data = [0u8; 8];
        data[..2].copy_from_slice(&(-12i16).to_le_bytes());
        let raw = raw_entry(2, 0x12, 1, "toneha", data);
        let head = EntryHead::decode(&raw).unwrap();
        assert_eq!(head.primitive(), Some(Value::I16(-12)));
    }

    #[test]
    fn crc_mismatch_is_absent() {
        let mut raw = raw_entry(1, 0x01, 1, "pin", [3, 0, 0, 0, 0, 0, 0, 0]);
        raw[24] ^= 0xFF;
        assert!(EntryHead::decode(&raw).is_none());
    }

    #[test]
    fn unknown_type_code_is_absent() {
        // 0x41 is a blob index entry, not supported.
        let raw = raw_entry(1, 0x41, 1, "blob", [0u8; 8]);
        assert!(EntryHead::decode(&raw).is_none());
    }

    #[test]
    fn str_head_reports_len_and_crc() {
        let mut data = [0u8; 8];
        data[..2].copy_from_slice(&21u16.to_le_bytes());
        data[4..8].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let raw = raw_entry(1, 0x21, 2, "preset_00", data);
        let head = EntryHead::decode(&raw).unwrap();
        assert_eq!(head.str_head(), Some((21, 0xDEAD_BEEF)));
        assert!(head.primitive().is_none());
    }

    #[test]
    fn key_without_terminator_fills_field() {
        let raw = raw_entry(1, 0x01, 1, "fifteen_chars15", [0u8; 8]);
        let head = EntryHead::decode(&raw).unwrap();
        assert_eq!(head.key.as_str(), "fifteen_chars15");
    }
}
