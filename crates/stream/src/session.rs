//! Per-connection stream session state.
//!
//! One `StreamSession` value exists per connection, owned by the framer and
//! reachable through narrow read accessors — the counters the display and
//! control surfaces read are snapshots, not live shared globals.

use heapless::String;

use crate::metadata::MAX_TITLE;

/// Milliseconds of payload over which the bitrate is measured before the
/// measured value replaces the advertised one.
pub const BITRATE_WINDOW_MS: u64 = 10_000;

/// Mutable per-connection stream state.
#[derive(Debug, Clone, Default)]
pub struct StreamSession {
    station_name: String<64>,
    genre: String<64>,
    station_url: String<128>,
    stream_title: String<MAX_TITLE>,
    advertised_kbps: u32,
    measured_kbps: Option<u32>,
    metaint: u32,
    content_length: Option<u32>,
    chunked: bool,
    total_bytes: u32,
    window_anchor_ms: Option<u64>,
    window_base_bytes: u32,
}

impl StreamSession {
    /// Fresh session with nothing learned yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Station name from the `icy-name` header.
    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    /// Genre from the `icy-genre` header.
    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Station homepage from the `icy-url` header.
    pub fn station_url(&self) -> &str {
        &self.station_url
    }

    /// Most recent in-band stream title.
    pub fn stream_title(&self) -> &str {
        &self.stream_title
    }

    /// Audio bytes between in-band metadata blocks (0 = no metadata).
    pub fn meta_interval(&self) -> u32 {
        self.metaint
    }

    /// Declared body length, when the server sent one.
    pub fn content_length(&self) -> Option<u32> {
        self.content_length
    }

    /// `true` when chunked transfer framing is active.
    pub fn chunked(&self) -> bool {
        self.chunked
    }

    /// Total payload bytes consumed this session.
    pub fn total_bytes(&self) -> u32 {
        self.total_bytes
    }

    /// Displayed bitrate: the advertised value until a full measurement
    /// window completes, after which the measured value takes precedence.
    pub fn bitrate_kbps(&self) -> u32 {
        self.measured_kbps.unwrap_or(self.advertised_kbps)
    }

    pub(crate) fn set_station_name(&mut self, name: String<64>) {
        self.station_name = name;
    }

    pub(crate) fn set_genre(&mut self, genre: String<64>) {
        self.genre = genre;
    }

    pub(crate) fn set_station_url(&mut self, url: String<128>) {
        self.station_url = url;
    }

    pub(crate) fn set_stream_title(&mut self, title: &str) {
        self.stream_title.clear();
        let _ = self.stream_title.push_str(title);
    }

    pub(crate) fn set_advertised_kbps(&mut self, kbps: u32) {
        self.advertised_kbps = kbps;
    }

    pub(crate) fn set_meta_interval(&mut self, interval: u32) {
        self.metaint = interval;
    }

    pub(crate) fn set_content_length(&mut self, length: u32) {
        self.content_length = Some(length);
    }

    pub(crate) fn set_chunked(&mut self) {
        self.chunked = true;
    }

    pub(crate) fn note_payload(&mut self, n: u32) {
        self.total_bytes = self.total_bytes.saturating_add(n);
    }

    /// Advance the bitrate measurement clock.
    ///
    /// Called by the ingest loop with a monotonic millisecond timestamp.
    /// When a full [`BITRATE_WINDOW_MS`] has elapsed, the measured rate
    /// (window bytes × 8 / window millis = kbit/s) replaces the advertised
    /// one and a new window starts.
    pub fn record_clock(&mut self, now_ms: u64) {
        match self.window_anchor_ms {
            None => {
                self.window_anchor_ms = Some(now_ms);
                self.window_base_bytes = self.total_bytes;
            }
            Some(anchor) => {
                let elapsed = now_ms.saturating_sub(anchor);
                if elapsed >= BITRATE_WINDOW_MS {
                    let bytes = u64::from(self.total_bytes.saturating_sub(self.window_base_bytes));
                    let kbps = bytes.saturating_mul(8).checked_div(elapsed).unwrap_or(0);
                    #[allow(clippy::cast_possible_truncation)] // kbps fits u32 for any real stream
                    {
                        self.measured_kbps = Some(kbps as u32);
                    }
                    self.window_anchor_ms = Some(now_ms);
                    self.window_base_bytes = self.total_bytes;
                }
            }
        }
    }
}
