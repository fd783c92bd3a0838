//! Stream header line parsing.
//!
//! A remote station answers with text lines terminated by a blank line:
//!
//! ```text
//! icy-name:Classic Rock Florida
//! icy-genre:Classic Rock 60s 70s 80s
//! icy-br:128
//! icy-metaint:32768
//! content-type:audio/mpeg
//! ```
//!
//! Field names are matched case-insensitively; unknown lines (including the
//! status line, which carries no colon) are ignored.

use heapless::String;

/// What the `content-type` value says the body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContentKind {
    /// A compressed audio stream.
    Audio,
    /// A text playlist whose lines point at the real stream.
    Playlist,
    /// Anything else — treated as audio, tolerantly.
    Other,
}

/// One recognized header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine {
    /// `icy-name` — station name.
    Name(String<64>),
    /// `icy-genre` — station genre.
    Genre(String<64>),
    /// `icy-url` — station homepage.
    Url(String<128>),
    /// `icy-br` — advertised bitrate in kbit/s.
    BitrateKbps(u32),
    /// `icy-metaint` — audio bytes between in-band metadata blocks.
    MetaInterval(u32),
    /// `content-type` — classified into a [`ContentKind`].
    ContentType(ContentKind),
    /// `content-length` — body length in bytes.
    ContentLength(u32),
    /// `transfer-encoding: chunked` — hex-length chunk framing is active.
    ChunkedTransfer,
    /// Unrecognized or malformed line; callers skip it.
    Other,
}

/// Parse one header line (without its CRLF terminator).
pub fn parse_header_line(line: &str) -> HeaderLine {
    let Some(colon) = line.find(':') else {
        // Status line ("ICY 200 OK") or garbage.
        return HeaderLine::Other;
    };
    let (key, rest) = line.split_at(colon);
    let key = key.trim();
    let value = rest.get(1..).unwrap_or("").trim();

    if key.eq_ignore_ascii_case("icy-name") {
        HeaderLine::Name(truncated(value))
    } else if key.eq_ignore_ascii_case("icy-genre") {
        HeaderLine::Genre(truncated(value))
    } else if key.eq_ignore_ascii_case("icy-url") {
        HeaderLine::Url(truncated(value))
    } else if key.eq_ignore_ascii_case("icy-br") {
        // Ogg stations send "Quality 2" style values; keep only a leading
        // integer and fall back to Other when there is none.
        match leading_u32(value) {
            Some(kbps) => HeaderLine::BitrateKbps(kbps),
            None => HeaderLine::Other,
        }
    } else if key.eq_ignore_ascii_case("icy-metaint") {
        match leading_u32(value) {
            Some(interval) => HeaderLine::MetaInterval(interval),
            None => HeaderLine::Other,
        }
    } else if key.eq_ignore_ascii_case("content-type") {
        HeaderLine::ContentType(classify_content_type(value))
    } else if key.eq_ignore_ascii_case("content-length") {
        match leading_u32(value) {
            Some(len) => HeaderLine::ContentLength(len),
            None => HeaderLine::Other,
        }
    } else if key.eq_ignore_ascii_case("transfer-encoding") {
        if contains_ignore_ascii_case(value, "chunked") {
            HeaderLine::ChunkedTransfer
        } else {
            HeaderLine::Other
        }
    } else {
        HeaderLine::Other
    }
}

/// Classify a `content-type` value.
///
/// `audio/*` and `application/octet-stream` are audio; the playlist MIME
/// types (`audio/x-scpls`, `*mpegurl*`) are playlists even though they sit
/// under `audio/`.
pub fn classify_content_type(value: &str) -> ContentKind {
    if contains_ignore_ascii_case(value, "scpls")
        || contains_ignore_ascii_case(value, "mpegurl")
        || contains_ignore_ascii_case(value, "/pls")
    {
        return ContentKind::Playlist;
    }
    if starts_with_ignore_ascii_case(value, "audio/")
        || starts_with_ignore_ascii_case(value, "application/octet-stream")
    {
        return ContentKind::Audio;
    }
    ContentKind::Other
}

fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut s = String::new();
    for c in value.chars() {
        if s.push(c).is_err() {
            break;
        }
    }
    s
}

/// Parse the leading decimal digits of `value`, if any.
fn leading_u32(value: &str) -> Option<u32> {
    let digits = value
        .as_bytes()
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    value.get(..digits)?.parse().ok()
}

fn starts_with_ignore_ascii_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|h| h.eq_ignore_ascii_case(prefix))
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let h = haystack.as_bytes();
    let n = needle.len();
    (0..=h.len().saturating_sub(n)).any(|i| {
        haystack
            .get(i..i.saturating_add(n))
            .is_some_and(|w| w.eq_ignore_ascii_case(needle))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_station_name() {
        let parsed = parse_header_line("icy-name:Classic Rock Florida");
        assert_eq!(
            parsed,
            HeaderLine::Name(String::try_from("Classic Rock Florida").unwrap())
        );
    }

    #[test]
    fn field_names_are_case_insensitive() {
        assert_eq!(parse_header_line("ICY-BR:128"), HeaderLine::BitrateKbps(128));
        assert_eq!(
            parse_header_line("Icy-MetaInt: 32768"),
            HeaderLine::MetaInterval(32768)
        );
    }

    #[test]
    fn parses_station_url() {
        assert_eq!(
            parse_header_line("icy-url:http://www.classicrockflorida.com"),
            HeaderLine::Url(String::try_from("http://www.classicrockflorida.com").unwrap())
        );
    }

    #[test]
    fn ogg_quality_bitrate_is_tolerated() {
        // "icy-br=Quality 2" for Ogg — no leading digits, ignored.
        assert_eq!(parse_header_line("icy-br:Quality 2"), HeaderLine::Other);
    }

    #[test]
    fn content_type_audio() {
        assert_eq!(
            parse_header_line("content-type:audio/mpeg"),
            HeaderLine::ContentType(ContentKind::Audio)
        );
        assert_eq!(
            parse_header_line("Content-Type: application/octet-stream"),
            HeaderLine::ContentType(ContentKind::Audio)
        );
    }

    #[test]
    fn content_type_playlist() {
        assert_eq!(
            parse_header_line("content-type:audio/x-scpls"),
            HeaderLine::ContentType(ContentKind::Playlist)
        );
        assert_eq!(
            parse_header_line("content-type:application/x-mpegurl"),
            HeaderLine::ContentType(ContentKind::Playlist)
        );
    }

    #[test]
    fn chunked_transfer_detected() {
        assert_eq!(
            parse_header_line("Transfer-Encoding: chunked"),
            HeaderLine::ChunkedTransfer
        );
        assert_eq!(
            parse_header_line("Transfer-Encoding: identity"),
            HeaderLine::Other
        );
    }

    #[test]
    fn status_line_is_ignored() {
        assert_eq!(parse_header_line("ICY 200 OK"), HeaderLine::Other);
    }

    #[test]
    fn overlong_name_is_truncated() {
        let long = "x".repeat(100);
        let mut line = std::string::String::from("icy-name:");
        line.push_str(&long);
        match parse_header_line(&line) {
            HeaderLine::Name(name) => assert_eq!(name.len(), 64),
            other => panic!("expected Name, got {other:?}"),
        }
    }
}
