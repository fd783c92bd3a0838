//! Metadata extraction — in-band metadata blocks and ID3v2 tag blocks.
//!
//! Both paths share one philosophy: never fail on malformed input. A
//! metadata block that cannot be parsed yields no event; the audio keeps
//! playing. Unknown keys are ignored, quotes are trimmed, overlong titles
//! are truncated to the display width.

use heapless::String;

/// Maximum displayed title/artist length (two display lines plus margin).
pub const MAX_TITLE: usize = 62;

/// Decoded metadata, from an in-band block or a file tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataEvent {
    /// Currently playing title ("Artist - Title" for most stations).
    pub title: String<MAX_TITLE>,
    /// Artist, when carried separately (ID3 only).
    pub artist: Option<String<MAX_TITLE>>,
}

/// Parse one in-band metadata block into its `StreamTitle` field.
///
/// The block is semicolon-separated `key='value'` pairs padded with NULs:
///
/// ```text
/// StreamTitle='Deep Purple - Smoke On The Water';StreamUrl='';
/// ```
///
/// Returns `None` when no non-empty title is present; never errors.
pub fn parse_stream_title(block: &[u8]) -> Option<String<MAX_TITLE>> {
    // Strip the NUL padding and anything non-UTF8 at the tail.
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    let text = lossy_ascii::<1024>(block.get(..end)?);

    let key_at = find_ignore_ascii_case(&text, "streamtitle")?;
    let after_key = text.get(key_at..)?;
    let eq = after_key.find('=')?;
    let mut value = after_key.get(eq.checked_add(1)?..)?;

    // Values are single-quoted; titles may themselves contain quotes, so
    // match the closing quote against the "';" terminator first and fall
    // back to the last quote in the block.
    if let Some(rest) = value.strip_prefix('\'') {
        value = match rest.find("';") {
            Some(close) => rest.get(..close)?,
            None => rest.rfind('\'').and_then(|i| rest.get(..i)).unwrap_or(rest),
        };
    } else {
        value = value.split(';').next().unwrap_or(value);
    }

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_title(trimmed))
}

/// ID3v2 scan result for a local file's leading bytes.
///
/// `tag_span` is the number of file bytes occupied by the tag (header
/// included); the framer must skip them so no tag byte reaches the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Tag {
    /// Total tag bytes to skip before audio starts.
    pub tag_span: u32,
    /// Major version byte (3 for ID3v2.3, 4 for ID3v2.4).
    pub version: u8,
}

/// Probe a 10-byte ID3v2 header.
///
/// Returns the tag geometry when `header` starts with the `ID3` magic and a
/// plausible syncsafe size; `None` means the file starts with audio.
#[allow(clippy::indexing_slicing)] // SAFETY: all indices are constants < 10
pub fn probe_id3(header: &[u8; 10]) -> Option<Id3Tag> {
    if &header[..3] != b"ID3" {
        return None;
    }
    let version = header[3];
    let size = syncsafe_u32(&header[6..10])?;
    Some(Id3Tag {
        tag_span: size.checked_add(10)?,
        version,
    })
}

/// Parse ID3v2 text frames out of the tag body (the bytes after the 10-byte
/// header, possibly truncated).
///
/// Only `TIT2` (title) and `TPE1` (artist) are extracted; everything else is
/// skipped. Tolerant: a malformed frame ends the walk without error.
#[allow(clippy::indexing_slicing)] // SAFETY: frame.len() >= 10 checked before constant indices
pub fn parse_id3_frames(body: &[u8], version: u8) -> MetadataEvent {
    let mut event = MetadataEvent::default();
    let mut pos = 0usize;

    while let Some(frame) = body.get(pos..pos.saturating_add(10)) {
        if frame.len() < 10 {
            break;
        }
        let id = &frame[..4];
        if id.iter().any(|&b| !b.is_ascii_uppercase() && !b.is_ascii_digit()) {
            break; // padding or garbage
        }
        let size = match version {
            4 => syncsafe_u32(&frame[4..8]),
            _ => frame
                .get(4..8)
                .and_then(|s| s.try_into().ok())
                .map(u32::from_be_bytes),
        };
        let Some(size) = size else { break };
        let size = size as usize;
        let Some(data) = body.get(pos.saturating_add(10)..pos.saturating_add(10).saturating_add(size))
        else {
            break; // frame extends past the bytes we buffered
        };

        if id == b"TIT2" {
            event.title = decode_text_frame(data);
        } else if id == b"TPE1" {
            let artist = decode_text_frame(data);
            if !artist.is_empty() {
                event.artist = Some(artist);
            }
        }
        pos = pos.saturating_add(10).saturating_add(size);
    }
    event
}

/// Decode an ID3 text frame: one encoding byte then the text.
///
/// Latin-1/UTF-8 pass printable bytes through; UTF-16 keeps the low byte of
/// BMP code units. Lossy by design — titles are display-only.
#[allow(clippy::indexing_slicing)] // SAFETY: chunks_exact(2) yields 2-byte slices
fn decode_text_frame(data: &[u8]) -> String<MAX_TITLE> {
    let mut out = String::new();
    let Some((&encoding, text)) = data.split_first() else {
        return out;
    };
    match encoding {
        1 | 2 => {
            // UTF-16: keep BMP units whose high byte is zero. Endianness from
            // the BOM when present, big-endian for encoding 2, else little.
            let big_endian = encoding == 2 || text.starts_with(&[0xFE, 0xFF]);
            for pair in text.chunks_exact(2) {
                if pair == [0xFF, 0xFE] || pair == [0xFE, 0xFF] {
                    continue;
                }
                let (lo, hi) = if big_endian {
                    (pair[1], pair[0])
                } else {
                    (pair[0], pair[1])
                };
                if hi == 0 && (0x20..0x7F).contains(&lo) && out.push(char::from(lo)).is_err() {
                    break;
                }
            }
        }
        _ => {
            for &b in text {
                if b == 0 {
                    break;
                }
                if (0x20..0x7F).contains(&b) && out.push(char::from(b)).is_err() {
                    break;
                }
            }
        }
    }
    let mut trimmed = String::new();
    let _ = trimmed.push_str(out.trim());
    trimmed
}

/// Decode a 4-byte syncsafe integer (7 bits per byte, MSB first).
fn syncsafe_u32(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 4 || bytes.iter().any(|&b| b & 0x80 != 0) {
        return None;
    }
    let mut value = 0u32;
    for &b in bytes {
        value = value.checked_shl(7)?.checked_add(u32::from(b))?;
    }
    Some(value)
}

/// Copy the printable ASCII/UTF-8 portion of `bytes` into a bounded string.
fn lossy_ascii<const N: usize>(bytes: &[u8]) -> String<N> {
    let mut s = String::new();
    match core::str::from_utf8(bytes) {
        Ok(text) => {
            for c in text.chars() {
                if s.push(c).is_err() {
                    break;
                }
            }
        }
        Err(_) => {
            for &b in bytes {
                if b.is_ascii() && b != 0 && s.push(char::from(b)).is_err() {
                    break;
                }
            }
        }
    }
    s
}

fn truncate_title(value: &str) -> String<MAX_TITLE> {
    let mut s = String::new();
    for c in value.chars() {
        if s.push(c).is_err() {
            break;
        }
    }
    s
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.len();
    (0..=h.len().checked_sub(n)?).find(|&i| {
        haystack
            .get(i..i.saturating_add(n))
            .is_some_and(|w| w.eq_ignore_ascii_case(needle))
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_stream_title() {
        let block = b"StreamTitle='Deep Purple - Smoke On The Water';StreamUrl='';";
        let title = parse_stream_title(block).unwrap();
        assert_eq!(title.as_str(), "Deep Purple - Smoke On The Water");
    }

    #[test]
    fn title_with_embedded_quote_survives() {
        let block = b"StreamTitle='Guns N' Roses - Don't Cry';";
        let title = parse_stream_title(block).unwrap();
        assert_eq!(title.as_str(), "Guns N' Roses - Don't Cry");
    }

    #[test]
    fn nul_padding_is_stripped() {
        let mut block = [0u8; 64];
        let text = b"StreamTitle='Abba - SOS';";
        block[..text.len()].copy_from_slice(text);
        let title = parse_stream_title(&block).unwrap();
        assert_eq!(title.as_str(), "Abba - SOS");
    }

    #[test]
    fn empty_title_yields_none() {
        assert!(parse_stream_title(b"StreamTitle='';StreamUrl='';").is_none());
        assert!(parse_stream_title(b"").is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let block = b"StreamUrl='http://x';StreamTitle='A - B';Extra='1';";
        assert_eq!(parse_stream_title(block).unwrap().as_str(), "A - B");
    }

    #[test]
    fn malformed_block_never_panics() {
        assert!(parse_stream_title(b"StreamTitle").is_none());
        assert!(parse_stream_title(b"=';;;'").is_none());
        assert!(parse_stream_title(&[0xFF, 0xFE, 0x00]).is_none());
    }

    #[test]
    fn overlong_title_is_truncated() {
        let mut block = std::vec::Vec::new();
        block.extend_from_slice(b"StreamTitle='");
        block.extend_from_slice(&[b'x'; 100]);
        block.extend_from_slice(b"';");
        let title = parse_stream_title(&block).unwrap();
        assert_eq!(title.len(), MAX_TITLE);
    }

    #[test]
    fn key_match_is_case_insensitive() {
        let block = b"streamtitle='lower - case';";
        assert_eq!(parse_stream_title(block).unwrap().as_str(), "lower - case");
    }

    fn id3_header(size: u32) -> [u8; 10] {
        let mut h = [0u8; 10];
        h[..3].copy_from_slice(b"ID3");
        h[3] = 3;
        h[6] = ((size >> 21) & 0x7F) as u8;
        h[7] = ((size >> 14) & 0x7F) as u8;
        h[8] = ((size >> 7) & 0x7F) as u8;
        h[9] = (size & 0x7F) as u8;
        h
    }

    fn text_frame(id: &[u8; 4], text: &str) -> std::vec::Vec<u8> {
        let mut f = std::vec::Vec::new();
        f.extend_from_slice(id);
        f.extend_from_slice(&(text.len() as u32 + 1).to_be_bytes());
        f.extend_from_slice(&[0, 0]); // flags
        f.push(0); // latin-1
        f.extend_from_slice(text.as_bytes());
        f
    }

    #[test]
    fn probe_detects_id3_magic() {
        let tag = probe_id3(&id3_header(1000)).unwrap();
        assert_eq!(tag.tag_span, 1010);
        assert_eq!(tag.version, 3);
    }

    #[test]
    fn probe_rejects_audio_bytes() {
        let mut h = [0u8; 10];
        h[0] = 0xFF;
        h[1] = 0xFB; // MPEG sync word
        assert!(probe_id3(&h).is_none());
    }

    #[test]
    fn id3_frames_extract_title_and_artist() {
        let mut body = text_frame(b"TPE1", "Miles Davis");
        body.extend_from_slice(&text_frame(b"TIT2", "So What"));
        let event = parse_id3_frames(&body, 3);
        assert_eq!(event.title.as_str(), "So What");
        assert_eq!(event.artist.unwrap().as_str(), "Miles Davis");
    }

    #[test]
    fn id3_truncated_body_is_tolerated() {
        let body = text_frame(b"TIT2", "Something Long Enough");
        let event = parse_id3_frames(&body[..body.len() - 5], 3);
        // Frame extends past the buffer: walk ends, no title.
        assert!(event.title.is_empty());
        assert!(event.artist.is_none());
    }

    #[test]
    fn id3_padding_ends_walk() {
        let mut body = text_frame(b"TIT2", "Kind of Blue");
        body.extend_from_slice(&[0u8; 32]); // padding after the last frame
        let event = parse_id3_frames(&body, 3);
        assert_eq!(event.title.as_str(), "Kind of Blue");
    }
}
