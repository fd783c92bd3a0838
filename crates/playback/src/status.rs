//! Shared radio status.
//!
//! Read-mostly state written by the ingest task and read by control/display
//! code. Counters are relaxed atomics — readers tolerate a stale value for a
//! frame, they must never block the ingest path. The textual now-playing
//! pair is the one compound value, guarded by a short blocking mutex.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::String;
use stream::{MetadataEvent, MAX_TITLE};

/// Station name plus current track title, as shown on a display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    /// Station name from the stream header, or the file path for local
    /// playback.
    pub station: String<64>,
    /// Track title from in-band metadata or a file tag.
    pub title: String<MAX_TITLE>,
    /// Artist, when a file tag carries one (in-band metadata does not).
    pub artist: Option<String<MAX_TITLE>>,
}

/// Shared status block; lives in a `static` next to the queue.
pub struct RadioStatus<M: RawMutex> {
    playing: AtomicBool,
    stop_requested: AtomicBool,
    bitrate_kbps: AtomicU32,
    now_playing: Mutex<M, RefCell<NowPlaying>>,
}

impl<M: RawMutex> RadioStatus<M> {
    /// Create an idle status block. `const` so it can live in a `static`.
    pub const fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            bitrate_kbps: AtomicU32::new(0),
            now_playing: Mutex::new(RefCell::new(NowPlaying {
                station: String::new(),
                title: String::new(),
                artist: None,
            })),
        }
    }

    /// `true` while a session is active.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Ask the active session to stop at its next read boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    /// Polled by the ingest task at read boundaries.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Relaxed)
    }

    /// Effective bitrate: advertised until a measurement window completes,
    /// measured afterwards. Zero when unknown.
    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps.load(Ordering::Relaxed)
    }

    /// Snapshot of the now-playing text.
    pub fn now_playing(&self) -> NowPlaying {
        self.now_playing.lock(|np| np.borrow().clone())
    }

    pub(crate) fn session_started(&self) {
        self.stop_requested.store(false, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
    }

    pub(crate) fn session_ended(&self) {
        self.playing.store(false, Ordering::Relaxed);
        self.bitrate_kbps.store(0, Ordering::Relaxed);
    }

    pub(crate) fn set_bitrate(&self, kbps: u32) {
        self.bitrate_kbps.store(kbps, Ordering::Relaxed);
    }

    pub(crate) fn set_station(&self, station: &str) {
        self.now_playing.lock(|np| {
            let mut np = np.borrow_mut();
            np.station.clear();
            let _ = np.station.push_str(station);
            np.title.clear();
            np.artist = None;
        });
    }

    pub(crate) fn set_metadata(&self, event: &MetadataEvent) {
        self.now_playing.lock(|np| {
            let mut np = np.borrow_mut();
            np.title.clear();
            let _ = np.title.push_str(&event.title);
            np.artist.clone_from(&event.artist);
        });
    }
}

impl<M: RawMutex> Default for RadioStatus<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use heapless::String;

    use super::*;

    #[test]
    fn metadata_replaces_title_and_station_resets_it() {
        let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
        status.set_station("Radio One");
        status.set_metadata(&MetadataEvent {
            title: String::try_from("Song A").unwrap_or_default(),
            artist: None,
        });
        let np = status.now_playing();
        assert_eq!(np.station.as_str(), "Radio One");
        assert_eq!(np.title.as_str(), "Song A");

        status.set_station("Radio Two");
        assert!(status.now_playing().title.is_empty());
    }

    #[test]
    fn stop_flag_clears_on_session_start() {
        let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
        status.request_stop();
        assert!(status.stop_requested());
        status.session_started();
        assert!(!status.stop_requested());
        assert!(status.is_playing());
        status.session_ended();
        assert!(!status.is_playing());
    }
}
