//! Playlist payload parsing (.m3u / .pls line formats).
//!
//! Playlists are line-oriented text. A line is a candidate target when it
//! parses as an absolute URL; `.pls` wraps URLs in `FileN=` assignments and
//! `.m3u` mixes them with `#EXTINF` comments. The first candidate wins.

/// Maximum number of playlist indirections followed before the orchestrator
/// gives up. A self-referential playlist therefore terminates instead of
/// looping: hop 1 connects, hops 2..=3 re-resolve, the next redirect fails.
pub const MAX_PLAYLIST_HOPS: usize = 3;

/// Longest target URL carried through a redirect.
pub const MAX_URL: usize = 128;

/// Extract the candidate target URL from one playlist line, if any.
///
/// Comment lines (`#` for m3u, `;` for pls) and section headers are
/// rejected; `Key=value` assignments are unwrapped when the key starts with
/// `file` (any case); whatever remains must be an absolute `http(s)` URL.
pub fn candidate_url(line: &str) -> Option<&str> {
    let mut t = line.trim();
    if t.is_empty() || t.starts_with('#') || t.starts_with(';') || t.starts_with('[') {
        return None;
    }
    if let Some(eq) = t.find('=') {
        let key = t.get(..eq)?.trim();
        if key.len() >= 4 && key.get(..4).is_some_and(|k| k.eq_ignore_ascii_case("file")) {
            t = t.get(eq.checked_add(1)?..)?.trim();
        } else {
            // Other pls keys (Title1=, Length1=, NumberOfEntries=) are noise.
            return None;
        }
    }
    if is_absolute_url(t) {
        Some(t)
    } else {
        None
    }
}

/// `true` for `http://…` / `https://…` targets, any case.
pub fn is_absolute_url(s: &str) -> bool {
    let lower_matches = |prefix: &str| {
        s.get(..prefix.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
    };
    lower_matches("http://") || lower_matches("https://")
}

/// `true` when the target's path names a playlist file.
pub fn is_playlist_target(target: &str) -> bool {
    // Chop a query string before looking at the extension.
    let path = target.split('?').next().unwrap_or(target);
    let lower_ends = |suffix: &str| {
        path.len() >= suffix.len()
            && path
                .get(path.len().saturating_sub(suffix.len())..)
                .is_some_and(|e| e.eq_ignore_ascii_case(suffix))
    };
    lower_ends(".m3u") || lower_ends(".m3u8") || lower_ends(".pls")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn m3u_line_is_candidate() {
        assert_eq!(
            candidate_url("http://icecast.example:8000/stream"),
            Some("http://icecast.example:8000/stream")
        );
    }

    #[test]
    fn m3u_comment_is_skipped() {
        assert!(candidate_url("#EXTM3U").is_none());
        assert!(candidate_url("#EXTINF:123,Some Station").is_none());
    }

    #[test]
    fn pls_file_assignment_is_unwrapped() {
        assert_eq!(
            candidate_url("File1=http://radio.example/live"),
            Some("http://radio.example/live")
        );
    }

    #[test]
    fn pls_noise_keys_are_skipped() {
        assert!(candidate_url("[playlist]").is_none());
        assert!(candidate_url("Title1=My Station").is_none());
        assert!(candidate_url("NumberOfEntries=1").is_none());
    }

    #[test]
    fn relative_paths_are_not_candidates() {
        assert!(candidate_url("live.mp3").is_none());
        assert!(candidate_url("/mount/stream").is_none());
    }

    #[test]
    fn https_and_mixed_case_schemes_accepted() {
        assert!(candidate_url("HTTPS://radio.example/a").is_some());
        assert!(candidate_url("Http://radio.example/b").is_some());
    }

    #[test]
    fn playlist_targets_by_extension() {
        assert!(is_playlist_target("http://x/stream.pls"));
        assert!(is_playlist_target("http://x/stream.M3U"));
        assert!(is_playlist_target("http://x/list.m3u8?sid=1"));
        assert!(!is_playlist_target("http://x/stream.mp3"));
    }
}
