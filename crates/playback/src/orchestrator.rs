//! Session orchestration.
//!
//! `Player` owns the connector and the decoder and runs one listening
//! session at a time: resolve the target, connect (with one retry after a
//! fixed backoff), then drive the ingest and playback tasks concurrently
//! until the session ends. Playlist indirection restarts the session
//! against the referenced target, bounded by [`MAX_PLAYLIST_HOPS`].
//!
//! Preset targets live in the key-value store under the `webradio`
//! namespace as `preset_NN` string keys; `preset up/down` wraps around the
//! populated range.

use core::fmt::Write as _;

use embassy_futures::join::join;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use heapless::String;
use platform::{AudioDecoder, ConnectionInfo, Connector, FlashPartition};
use store::{PageScanner, StoreError, Value};
use stream::{
    playlist::is_playlist_target, FramerEvent, ProtocolError, StreamFramer, StreamTarget,
    MAX_PLAYLIST_HOPS, MAX_URL,
};

use crate::ingest::{run_ingest, IngestOutcome};
use crate::play::run_playback;
use crate::queue::ChunkQueue;
use crate::status::{NowPlaying, RadioStatus};

/// Wait between a failed connect and its single retry, and before
/// reconnecting after a mid-stream disconnect.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Mid-stream reconnects attempted before giving up on a target.
pub const RECONNECT_ATTEMPTS: u8 = 3;

/// Key-value store namespace holding presets and settings.
pub const PREF_NAMESPACE: &str = "webradio";

/// Session failures surfaced to the control context.
#[derive(Debug, PartialEq, Eq)]
pub enum PlayerError<CE, DE> {
    /// The target string was unusable (overlong).
    BadTarget,
    /// Connecting failed, retry included.
    Connect(CE),
    /// The decoder rejected an operation.
    Decoder(DE),
    /// The stream violated its protocol.
    Protocol(ProtocolError),
}

/// One radio player: connector + decoder + the shared queue and status.
pub struct Player<'a, C, D, M>
where
    C: Connector,
    D: AudioDecoder,
    M: RawMutex,
{
    connector: C,
    decoder: D,
    queue: &'a ChunkQueue<M>,
    status: &'a RadioStatus<M>,
}

impl<'a, C, D, M> Player<'a, C, D, M>
where
    C: Connector,
    D: AudioDecoder,
    M: RawMutex,
{
    /// Assemble a player around the shared queue and status block.
    pub fn new(
        connector: C,
        decoder: D,
        queue: &'a ChunkQueue<M>,
        status: &'a RadioStatus<M>,
    ) -> Self {
        Self {
            connector,
            decoder,
            queue,
            status,
        }
    }

    /// Run one session against `target` until it ends or fails.
    ///
    /// Returns when the stream finished, a stop request was honored, or a
    /// terminal error occurred. Playlist targets are followed to the real
    /// stream; a chain longer than [`MAX_PLAYLIST_HOPS`] redirects is
    /// reported as [`ProtocolError::RunawayPlaylist`].
    pub async fn play(&mut self, target: &str) -> Result<(), PlayerError<C::Error, D::Error>> {
        let mut url: String<MAX_URL> =
            String::try_from(target).map_err(|_| PlayerError::BadTarget)?;
        let mut hops = 0usize;
        let mut reconnects = 0u8;
        self.status.session_started();

        let result = loop {
            let (mut source, info) = match self.connect_with_retry(&url).await {
                Ok(connected) => connected,
                Err(err) => break Err(PlayerError::Connect(err)),
            };

            let target = classify(&url, &info);
            if info.local {
                // Local playback has no icy-name header; show the file path.
                self.status.set_station(&url);
            }
            let mut framer = StreamFramer::new(target);
            self.open_session(&mut framer).await;

            let (outcome, played) = join(
                run_ingest(&mut source, &mut framer, self.queue, self.status),
                run_playback(self.queue, &mut self.decoder),
            )
            .await;

            if let Err(err) = played {
                break Err(PlayerError::Decoder(err));
            }
            match outcome {
                IngestOutcome::Finished => break Ok(()),
                IngestOutcome::Redirect(next) => {
                    hops = hops.saturating_add(1);
                    if hops >= MAX_PLAYLIST_HOPS {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("playlist chain exceeded {} hops", MAX_PLAYLIST_HOPS);
                        break Err(PlayerError::Protocol(ProtocolError::RunawayPlaylist));
                    }
                    url = next;
                }
                IngestOutcome::Disconnected => {
                    if self.status.stop_requested() {
                        break Ok(());
                    }
                    reconnects = reconnects.saturating_add(1);
                    if reconnects > RECONNECT_ATTEMPTS {
                        break Ok(());
                    }
                    #[cfg(feature = "defmt")]
                    defmt::info!("stream dropped, reconnect {}", reconnects);
                    Timer::after(RETRY_BACKOFF).await;
                }
                IngestOutcome::Protocol(err) => break Err(PlayerError::Protocol(err)),
            }
        };

        self.status.session_ended();
        result
    }

    /// Ask the running session to stop at its next read boundary.
    pub fn stop(&self) {
        self.status.request_stop();
    }

    /// Forward a volume change to the decoder.
    pub async fn set_volume(&mut self, volume: u8) -> Result<(), D::Error> {
        self.decoder.set_volume(volume).await
    }

    /// Read access to the decoder (status queries, tests).
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Snapshot of station and title text.
    pub fn current_metadata(&self) -> NowPlaying {
        self.status.now_playing()
    }

    /// Effective bitrate (advertised until measured, then measured).
    pub fn measured_bitrate(&self) -> u32 {
        self.status.bitrate_kbps()
    }

    /// Chunks waiting between ingest and playback.
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    async fn connect_with_retry(
        &mut self,
        url: &str,
    ) -> Result<(C::Source, ConnectionInfo), C::Error> {
        match self.connector.connect(url).await {
            Ok(connected) => Ok(connected),
            Err(_first) => {
                #[cfg(feature = "defmt")]
                defmt::info!("connect failed, retrying");
                Timer::after(RETRY_BACKOFF).await;
                self.connector.connect(url).await
            }
        }
    }

    /// Signal the framer that its transport is up and forward anything it
    /// emits immediately (local files start their session on connect).
    async fn open_session(&mut self, framer: &mut StreamFramer) {
        let mut pre: heapless::Vec<FramerEvent, 4> = heapless::Vec::new();
        framer.connected(&mut |event| {
            let _ = pre.push(event);
        });
        for event in pre {
            if let FramerEvent::Chunk(chunk) = event {
                while self.queue.push(chunk).await.is_err() {
                    if self.status.stop_requested() {
                        return;
                    }
                }
            }
        }
    }
}

fn classify(url: &str, info: &ConnectionInfo) -> StreamTarget {
    match (info.local, is_playlist_target(url)) {
        (true, true) => StreamTarget::LocalPlaylist,
        (true, false) => StreamTarget::LocalAudio {
            length: info.length,
        },
        (false, true) => StreamTarget::RemotePlaylist,
        (false, false) => StreamTarget::Remote,
    }
}

/// Direction for preset stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetStep {
    /// Next populated preset, wrapping past the highest.
    Up,
    /// Previous populated preset, wrapping past the lowest.
    Down,
}

/// Resolve preset `index` to its stream URL, `Ok(None)` when unset.
pub fn preset_url<F: FlashPartition>(
    flash: &mut F,
    index: u8,
) -> Result<Option<String<MAX_URL>>, StoreError<F::Error>> {
    let mut scanner = PageScanner::new(flash);
    let Some(ns) = scanner.namespace_id(PREF_NAMESPACE)? else {
        return Ok(None);
    };
    let key = preset_key(index);
    match scanner.get(ns, &key)? {
        Some(Value::Str(url)) => Ok(String::try_from(url.as_str()).ok()),
        _ => Ok(None),
    }
}

/// Step from `current` to the adjacent populated preset, wrapping around.
/// `Ok(None)` when no presets exist at all.
pub fn step_preset<F: FlashPartition>(
    flash: &mut F,
    current: u8,
    step: PresetStep,
) -> Result<Option<u8>, StoreError<F::Error>> {
    let mut scanner = PageScanner::new(flash);
    let Some(ns) = scanner.namespace_id(PREF_NAMESPACE)? else {
        return Ok(None);
    };
    let records = scanner.scan(Some(ns))?;
    let mut best: Option<u8> = None;
    let mut edge: Option<u8> = None;
    for record in &records {
        let Some(index) = parse_preset_key(record.key.as_str()) else {
            continue;
        };
        match step {
            PresetStep::Up => {
                if index > current && best.map_or(true, |b| index < b) {
                    best = Some(index);
                }
                if edge.map_or(true, |e| index < e) {
                    edge = Some(index);
                }
            }
            PresetStep::Down => {
                if index < current && best.map_or(true, |b| index > b) {
                    best = Some(index);
                }
                if edge.map_or(true, |e| index > e) {
                    edge = Some(index);
                }
            }
        }
    }
    Ok(best.or(edge))
}

fn preset_key(index: u8) -> String<15> {
    let mut key: String<15> = String::new();
    // Two-digit keys match the writer's format; index is capped at 99.
    let _ = write!(key, "preset_{:02}", index.min(99));
    key
}

fn parse_preset_key(key: &str) -> Option<u8> {
    let digits = key.strip_prefix("preset_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
