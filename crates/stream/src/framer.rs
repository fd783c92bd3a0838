//! Stream framing state machine.
//!
//! `StreamFramer` consumes raw connection bytes and produces audio chunks
//! plus metadata events. It owns all stream-protocol state — header lines,
//! chunked transfer framing, the in-band metadata interval, playlist lines
//! and local-file ID3 tags — so that downstream consumers only ever see
//! clean payload.
//!
//! The framer performs no I/O and never waits: every transition is driven by
//! a single input byte, which makes the event sequence independent of how
//! the network fragments its reads.

use heapless::{String, Vec};

use crate::chunk::{AudioChunk, ChunkPayload, CHUNK_BYTES};
use crate::headers::{parse_header_line, ContentKind, HeaderLine};
use crate::metadata::{self, MetadataEvent};
use crate::playlist::{self, MAX_URL};
use crate::session::StreamSession;

/// Raw header bytes allowed before the blank terminator line must appear.
pub const HEADER_BYTE_BUDGET: u32 = 4096;

/// Bytes of one in-band metadata block kept for parsing; a block may declare
/// up to 255 × 16 = 4080 bytes, the excess is counted but dropped.
const META_BUF_BYTES: usize = 1024;

/// ID3 tag bytes kept for frame parsing; larger tags are skipped past.
const ID3_BUF_BYTES: usize = 1024;

/// What the framer was pointed at, decided before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamTarget {
    /// Remote audio stream: an ICY/HTTP header block precedes the payload.
    Remote,
    /// Remote playlist: header block, then line-oriented playlist text.
    RemotePlaylist,
    /// Local audio file: payload from byte zero, optional known length.
    LocalAudio {
        /// File length when the filesystem reports one.
        length: Option<u32>,
    },
    /// Local playlist file.
    LocalPlaylist,
}

/// Stream datamode. Exactly one is active per framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// Created, connection not yet established.
    Init,
    /// Reading header lines of an audio response.
    Header,
    /// Forwarding audio payload.
    Data,
    /// Inside an in-band metadata block.
    Metadata,
    /// Created for a playlist target, connection not yet established.
    PlaylistInit,
    /// Reading header lines of a playlist response.
    PlaylistHeader,
    /// Reading playlist payload lines.
    PlaylistData,
    /// Stop requested; input is discarded until [`StreamFramer::finish`].
    StopRequested,
    /// Terminal: finished, redirected, or torn down.
    Stopped,
}

/// Terminal protocol failures. The orchestrator owns retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// No blank header terminator within [`HEADER_BYTE_BUDGET`] bytes.
    HeaderOverrun,
    /// Malformed chunked-transfer framing (bad size line or terminator).
    BadChunkSize,
    /// Playlist indirection exceeded the redirect bound.
    RunawayPlaylist,
}

/// One output of the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// Audio payload or session boundary for the handoff queue.
    Chunk(AudioChunk),
    /// Decoded in-band or file-tag metadata.
    Metadata(MetadataEvent),
    /// The payload was a playlist; connect to this target instead.
    Redirect(String<MAX_URL>),
    /// The stream ended cleanly (content length reached or chunked
    /// terminator seen). Call [`StreamFramer::finish`].
    EndOfStream,
}

/// Chunked-transfer decode phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkPhase {
    /// Accumulating hex size digits.
    Size,
    /// Ignoring a chunk extension up to CR.
    Ext,
    /// CR of the size line seen, LF expected.
    SizeLf,
    /// Forwarding payload bytes.
    Payload,
    /// Payload done, CR expected.
    PayloadCr,
    /// CR seen, LF expected, then the next size line.
    PayloadLf,
}

/// Outcome of pushing one raw byte through the chunked-transfer layer.
enum DechunkStep {
    /// Framing byte, nothing to forward.
    Consumed,
    /// A payload byte.
    Payload(u8),
    /// Zero-size chunk: end of stream.
    End,
}

/// Local-file ID3 handling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Id3Phase {
    /// Buffering the first 10 file bytes.
    Probe,
    /// Buffering tag frames for parsing.
    Collect,
    /// Discarding tag bytes beyond the parse buffer.
    Skip,
    /// Tag handled (or absent); bytes are audio.
    Done,
}

/// The streaming ingestion state machine.
pub struct StreamFramer {
    state: StreamState,
    target: StreamTarget,
    session: StreamSession,

    // Header / playlist line accumulator.
    line: String<256>,
    header_bytes: u32,
    content_kind: Option<ContentKind>,

    // Chunked transfer framing.
    chunk_phase: ChunkPhase,
    chunk_size: u32,
    chunk_remaining: u32,

    // In-band metadata.
    meta_remaining: u32,
    meta_buf: Vec<u8, META_BUF_BYTES>,
    data_until_meta: u32,

    // Audio sink buffer.
    sink: [u8; CHUNK_BYTES],
    fill: usize,
    started: bool,

    // Body accounting (post-dechunk bytes, for content-length).
    body_bytes: u32,

    // Playlist redirect.
    redirect_seen: bool,

    // Local-file ID3 tag scan.
    id3_phase: Id3Phase,
    id3_probe: Vec<u8, 10>,
    id3_buf: Vec<u8, ID3_BUF_BYTES>,
    id3_version: u8,
    id3_collect: u32,
    id3_skip: u32,
}

impl StreamFramer {
    /// Create a framer for `target`. The state is `Init`/`PlaylistInit`
    /// until [`connected`](StreamFramer::connected) reports the transport
    /// is up.
    pub fn new(target: StreamTarget) -> Self {
        let state = match target {
            StreamTarget::Remote | StreamTarget::LocalAudio { .. } => StreamState::Init,
            StreamTarget::RemotePlaylist | StreamTarget::LocalPlaylist => StreamState::PlaylistInit,
        };
        let mut session = StreamSession::new();
        if let StreamTarget::LocalAudio { length: Some(len) } = target {
            session.set_content_length(len);
        }
        let id3_phase = match target {
            StreamTarget::LocalAudio { .. } => Id3Phase::Probe,
            _ => Id3Phase::Done,
        };
        Self {
            state,
            target,
            session,
            line: String::new(),
            header_bytes: 0,
            content_kind: None,
            chunk_phase: ChunkPhase::Size,
            chunk_size: 0,
            chunk_remaining: 0,
            meta_remaining: 0,
            meta_buf: Vec::new(),
            data_until_meta: 0,
            sink: [0u8; CHUNK_BYTES],
            fill: 0,
            started: false,
            body_bytes: 0,
            redirect_seen: false,
            id3_phase,
            id3_probe: Vec::new(),
            id3_buf: Vec::new(),
            id3_version: 0,
            id3_collect: 0,
            id3_skip: 0,
        }
    }

    /// Current datamode.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Read access to the per-connection session counters.
    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Mutable session access (the ingest loop drives the bitrate clock).
    pub fn session_mut(&mut self) -> &mut StreamSession {
        &mut self.session
    }

    /// `true` once the framer reached a terminal state.
    pub fn is_stopped(&self) -> bool {
        self.state == StreamState::Stopped
    }

    /// The transport is up; leave `Init`.
    ///
    /// Remote targets move to header parsing; local targets go straight to
    /// payload (there is no header block to read from a file).
    pub fn connected<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        match self.state {
            StreamState::Init => match self.target {
                StreamTarget::LocalAudio { .. } => self.enter_data(emit),
                _ => self.state = StreamState::Header,
            },
            StreamState::PlaylistInit => match self.target {
                StreamTarget::LocalPlaylist => self.state = StreamState::PlaylistData,
                _ => self.state = StreamState::PlaylistHeader,
            },
            _ => {}
        }
    }

    /// Request a cooperative stop: input is discarded from the next byte
    /// boundary; the caller then invokes [`finish`](StreamFramer::finish).
    pub fn request_stop(&mut self) {
        if self.state != StreamState::Stopped {
            self.state = StreamState::StopRequested;
        }
    }

    /// Consume a slice of connection bytes.
    ///
    /// Equivalent to calling [`consume_byte`](StreamFramer::consume_byte)
    /// for each byte: the emitted event sequence does not depend on how the
    /// input is sliced.
    pub fn consume<F: FnMut(FramerEvent)>(
        &mut self,
        data: &[u8],
        emit: &mut F,
    ) -> Result<(), ProtocolError> {
        for &b in data {
            self.consume_byte(b, emit)?;
        }
        Ok(())
    }

    /// Consume one connection byte.
    pub fn consume_byte<F: FnMut(FramerEvent)>(
        &mut self,
        b: u8,
        emit: &mut F,
    ) -> Result<(), ProtocolError> {
        match self.state {
            StreamState::Header | StreamState::PlaylistHeader => self.header_byte(b, emit),
            StreamState::Data | StreamState::Metadata | StreamState::PlaylistData => {
                if self.session.chunked() {
                    match self.dechunk(b)? {
                        DechunkStep::Consumed => Ok(()),
                        DechunkStep::Payload(p) => self.body_byte(p, emit),
                        DechunkStep::End => {
                            self.end_of_stream(emit);
                            Ok(())
                        }
                    }
                } else {
                    self.body_byte(b, emit)
                }
            }
            // Init states: bytes before connected() — not expected; drop.
            // StopRequested/Stopped: input is discarded by contract.
            _ => Ok(()),
        }
    }

    /// Emit the partial sink chunk, if any. The ingest loop calls this when
    /// the input stalls so the decoder is not starved behind a partial slot.
    pub fn flush<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        if self.fill > 0 {
            if let Some(payload) = ChunkPayload::from_slice(self.sink.get(..self.fill).unwrap_or(&[]))
            {
                emit(FramerEvent::Chunk(AudioChunk::Data(payload)));
            }
            self.fill = 0;
        }
    }

    /// Tear down: drain partial state, emit the terminal `StopSong`, and
    /// enter `Stopped`. Every session ends through here — clean end, stop
    /// request, protocol error or connection loss — so the playback context
    /// always sees a well-formed session boundary.
    pub fn finish<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        // A file shorter than the 10-byte ID3 probe is all audio.
        if self.id3_phase == Id3Phase::Probe && !self.id3_probe.is_empty() {
            let probe: Vec<u8, 10> = core::mem::take(&mut self.id3_probe);
            self.id3_phase = Id3Phase::Done;
            for &b in &probe {
                self.push_audio(b, emit);
            }
        }
        // A playlist whose last line has no terminator still counts.
        if self.state == StreamState::PlaylistData && !self.redirect_seen {
            let line: String<256> = core::mem::take(&mut self.line);
            self.playlist_line(&line, emit);
        }
        self.flush(emit);
        emit(FramerEvent::Chunk(AudioChunk::StopSong));
        self.state = StreamState::Stopped;
    }

    // ── Header handling ─────────────────────────────────────────────────

    fn header_byte<F: FnMut(FramerEvent)>(
        &mut self,
        b: u8,
        emit: &mut F,
    ) -> Result<(), ProtocolError> {
        self.header_bytes = self.header_bytes.saturating_add(1);
        if self.header_bytes > HEADER_BYTE_BUDGET {
            return Err(ProtocolError::HeaderOverrun);
        }
        match b {
            b'\r' => Ok(()),
            b'\n' => {
                if self.line.is_empty() {
                    self.end_of_headers(emit);
                } else {
                    let line: String<256> = core::mem::take(&mut self.line);
                    self.process_header_line(&line);
                }
                Ok(())
            }
            _ => {
                if b.is_ascii() {
                    // Overlong lines are truncated, not fatal.
                    let _ = self.line.push(char::from(b));
                }
                Ok(())
            }
        }
    }

    fn process_header_line(&mut self, line: &str) {
        match parse_header_line(line) {
            HeaderLine::Name(name) => self.session.set_station_name(name),
            HeaderLine::Genre(genre) => self.session.set_genre(genre),
            HeaderLine::Url(url) => self.session.set_station_url(url),
            HeaderLine::BitrateKbps(kbps) => self.session.set_advertised_kbps(kbps),
            HeaderLine::MetaInterval(interval) => self.session.set_meta_interval(interval),
            HeaderLine::ContentType(kind) => self.content_kind = Some(kind),
            HeaderLine::ContentLength(len) => self.session.set_content_length(len),
            HeaderLine::ChunkedTransfer => self.session.set_chunked(),
            HeaderLine::Other => {}
        }
    }

    fn end_of_headers<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        match self.state {
            // An audio request may still answer with a playlist document;
            // the content type decides, tolerantly defaulting to audio.
            StreamState::Header => {
                if self.content_kind == Some(ContentKind::Playlist) {
                    self.state = StreamState::PlaylistData;
                } else {
                    self.enter_data(emit);
                }
            }
            StreamState::PlaylistHeader => self.state = StreamState::PlaylistData,
            _ => {}
        }
    }

    fn enter_data<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        self.state = StreamState::Data;
        self.data_until_meta = self.session.meta_interval();
        if !self.started {
            self.started = true;
            emit(FramerEvent::Chunk(AudioChunk::StartSong));
        }
    }

    // ── Body handling (post-dechunk bytes) ──────────────────────────────

    fn body_byte<F: FnMut(FramerEvent)>(
        &mut self,
        b: u8,
        emit: &mut F,
    ) -> Result<(), ProtocolError> {
        self.body_bytes = self.body_bytes.saturating_add(1);
        match self.state {
            StreamState::Data => self.data_byte(b, emit),
            StreamState::Metadata => self.metadata_byte(b, emit),
            StreamState::PlaylistData => self.playlist_byte(b, emit),
            _ => {}
        }
        if let Some(length) = self.session.content_length() {
            if self.body_bytes >= length && self.state != StreamState::Stopped {
                self.end_of_stream(emit);
            }
        }
        Ok(())
    }

    fn data_byte<F: FnMut(FramerEvent)>(&mut self, b: u8, emit: &mut F) {
        let metaint = self.session.meta_interval();
        if metaint > 0 && self.data_until_meta == 0 {
            // This byte is the metadata length byte, not audio.
            let len = u32::from(b).saturating_mul(16);
            if len == 0 {
                self.data_until_meta = metaint;
            } else {
                self.state = StreamState::Metadata;
                self.meta_remaining = len;
                self.meta_buf.clear();
            }
            return;
        }
        if metaint > 0 {
            self.data_until_meta = self.data_until_meta.saturating_sub(1);
        }
        self.audio_or_id3(b, emit);
    }

    fn metadata_byte<F: FnMut(FramerEvent)>(&mut self, b: u8, emit: &mut F) {
        // Bytes beyond the parse buffer are counted but dropped.
        let _ = self.meta_buf.push(b);
        self.meta_remaining = self.meta_remaining.saturating_sub(1);
        if self.meta_remaining == 0 {
            if let Some(title) = metadata::parse_stream_title(&self.meta_buf) {
                self.session.set_stream_title(&title);
                emit(FramerEvent::Metadata(MetadataEvent {
                    title,
                    artist: None,
                }));
            }
            self.meta_buf.clear();
            self.state = StreamState::Data;
            self.data_until_meta = self.session.meta_interval();
        }
    }

    fn playlist_byte<F: FnMut(FramerEvent)>(&mut self, b: u8, emit: &mut F) {
        match b {
            b'\r' => {}
            b'\n' => {
                let line: String<256> = core::mem::take(&mut self.line);
                self.playlist_line(&line, emit);
            }
            _ => {
                if b.is_ascii() {
                    let _ = self.line.push(char::from(b));
                }
            }
        }
    }

    fn playlist_line<F: FnMut(FramerEvent)>(&mut self, line: &str, emit: &mut F) {
        if self.redirect_seen {
            return;
        }
        if let Some(url) = playlist::candidate_url(line) {
            let mut target: String<MAX_URL> = String::new();
            if target.push_str(url).is_err() {
                // URL longer than any real station target; skip the line.
                return;
            }
            self.redirect_seen = true;
            self.state = StreamState::Stopped;
            emit(FramerEvent::Redirect(target));
        }
    }

    fn end_of_stream<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        if self.state != StreamState::Stopped {
            self.state = StreamState::Stopped;
            emit(FramerEvent::EndOfStream);
        }
    }

    // ── Audio sink ──────────────────────────────────────────────────────

    fn audio_or_id3<F: FnMut(FramerEvent)>(&mut self, b: u8, emit: &mut F) {
        match self.id3_phase {
            Id3Phase::Done => self.push_audio(b, emit),
            Id3Phase::Probe => {
                let _ = self.id3_probe.push(b);
                if self.id3_probe.is_full() {
                    self.id3_probe_complete(emit);
                }
            }
            Id3Phase::Collect => {
                let _ = self.id3_buf.push(b);
                self.id3_collect = self.id3_collect.saturating_sub(1);
                if self.id3_collect == 0 {
                    self.id3_parse(emit);
                    self.id3_phase = if self.id3_skip > 0 {
                        Id3Phase::Skip
                    } else {
                        Id3Phase::Done
                    };
                }
            }
            Id3Phase::Skip => {
                self.id3_skip = self.id3_skip.saturating_sub(1);
                if self.id3_skip == 0 {
                    self.id3_phase = Id3Phase::Done;
                }
            }
        }
    }

    fn id3_probe_complete<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        let mut header = [0u8; 10];
        header.copy_from_slice(&self.id3_probe);
        match metadata::probe_id3(&header) {
            Some(tag) => {
                self.id3_version = tag.version;
                let body = tag.tag_span.saturating_sub(10);
                #[allow(clippy::cast_possible_truncation)] // bounded by ID3_BUF_BYTES
                let collect = body.min(ID3_BUF_BYTES as u32);
                self.id3_collect = collect;
                self.id3_skip = body.saturating_sub(collect);
                self.id3_buf.clear();
                self.id3_phase = if collect == 0 {
                    Id3Phase::Done
                } else {
                    Id3Phase::Collect
                };
            }
            None => {
                // No tag: the probe bytes were audio all along.
                let probe: Vec<u8, 10> = core::mem::take(&mut self.id3_probe);
                self.id3_phase = Id3Phase::Done;
                for &a in &probe {
                    self.push_audio(a, emit);
                }
            }
        }
    }

    fn id3_parse<F: FnMut(FramerEvent)>(&mut self, emit: &mut F) {
        let event = metadata::parse_id3_frames(&self.id3_buf, self.id3_version);
        if !event.title.is_empty() || event.artist.is_some() {
            self.session.set_stream_title(&event.title);
            emit(FramerEvent::Metadata(event));
        }
        self.id3_buf.clear();
    }

    #[allow(clippy::indexing_slicing)] // SAFETY: fill < CHUNK_BYTES invariant, reset on emit
    #[allow(clippy::arithmetic_side_effects)] // SAFETY: fill bounded by CHUNK_BYTES
    fn push_audio<F: FnMut(FramerEvent)>(&mut self, b: u8, emit: &mut F) {
        self.sink[self.fill] = b;
        self.fill += 1;
        self.session.note_payload(1);
        if self.fill == CHUNK_BYTES {
            if let Some(payload) = ChunkPayload::from_slice(&self.sink) {
                emit(FramerEvent::Chunk(AudioChunk::Data(payload)));
            }
            self.fill = 0;
        }
    }

    // ── Chunked transfer framing ────────────────────────────────────────

    fn dechunk(&mut self, b: u8) -> Result<DechunkStep, ProtocolError> {
        match self.chunk_phase {
            ChunkPhase::Size => match b {
                b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                    let digit = hex_value(b);
                    self.chunk_size = self
                        .chunk_size
                        .checked_mul(16)
                        .and_then(|s| s.checked_add(digit))
                        .ok_or(ProtocolError::BadChunkSize)?;
                    Ok(DechunkStep::Consumed)
                }
                b';' | b' ' | b'\t' => {
                    self.chunk_phase = ChunkPhase::Ext;
                    Ok(DechunkStep::Consumed)
                }
                b'\r' => {
                    self.chunk_phase = ChunkPhase::SizeLf;
                    Ok(DechunkStep::Consumed)
                }
                _ => Err(ProtocolError::BadChunkSize),
            },
            ChunkPhase::Ext => {
                if b == b'\r' {
                    self.chunk_phase = ChunkPhase::SizeLf;
                }
                Ok(DechunkStep::Consumed)
            }
            ChunkPhase::SizeLf => {
                if b != b'\n' {
                    return Err(ProtocolError::BadChunkSize);
                }
                if self.chunk_size == 0 {
                    // Last chunk; the trailing CRLF (if any) is never read.
                    return Ok(DechunkStep::End);
                }
                self.chunk_remaining = self.chunk_size;
                self.chunk_size = 0;
                self.chunk_phase = ChunkPhase::Payload;
                Ok(DechunkStep::Consumed)
            }
            ChunkPhase::Payload => {
                self.chunk_remaining = self.chunk_remaining.saturating_sub(1);
                if self.chunk_remaining == 0 {
                    self.chunk_phase = ChunkPhase::PayloadCr;
                }
                Ok(DechunkStep::Payload(b))
            }
            ChunkPhase::PayloadCr => {
                if b != b'\r' {
                    return Err(ProtocolError::BadChunkSize);
                }
                self.chunk_phase = ChunkPhase::PayloadLf;
                Ok(DechunkStep::Consumed)
            }
            ChunkPhase::PayloadLf => {
                if b != b'\n' {
                    return Err(ProtocolError::BadChunkSize);
                }
                self.chunk_phase = ChunkPhase::Size;
                Ok(DechunkStep::Consumed)
            }
        }
    }
}

#[allow(clippy::arithmetic_side_effects)] // SAFETY: caller matched the digit range
fn hex_value(b: u8) -> u32 {
    u32::from(match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
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

    fn feed(framer: &mut StreamFramer, data: &[u8]) -> std::vec::Vec<FramerEvent> {
        let mut events = std::vec::Vec::new();
        framer.consume(data, &mut |e| events.push(e)).unwrap();
        events
    }

    fn audio_bytes(events: &[FramerEvent]) -> std::vec::Vec<u8> {
        let mut out = std::vec::Vec::new();
        for e in events {
            if let FramerEvent::Chunk(AudioChunk::Data(p)) = e {
                out.extend_from_slice(p.as_slice());
            }
        }
        out
    }

    fn connected_remote() -> StreamFramer {
        let mut framer = StreamFramer::new(StreamTarget::Remote);
        framer.connected(&mut |_| {});
        framer
    }

    const ICY_HEADER: &[u8] = b"ICY 200 OK\r\n\
icy-name:Test FM\r\n\
icy-genre:Jazz\r\n\
icy-url:http://test.example\r\n\
icy-br:128\r\n\
content-type:audio/mpeg\r\n\
\r\n";

    #[test]
    fn header_then_audio_emits_start_and_chunks() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(ICY_HEADER);
        input.extend_from_slice(&[0xAAu8; 64]);

        let events = feed(&mut framer, &input);
        assert_eq!(
            events[0],
            FramerEvent::Chunk(AudioChunk::StartSong),
            "StartSong precedes audio"
        );
        assert_eq!(audio_bytes(&events), std::vec![0xAA; 64]);
        assert_eq!(framer.session().station_name(), "Test FM");
        assert_eq!(framer.session().genre(), "Jazz");
        assert_eq!(framer.session().station_url(), "http://test.example");
        assert_eq!(framer.session().bitrate_kbps(), 128);
        assert_eq!(framer.state(), StreamState::Data);
    }

    #[test]
    fn byte_at_a_time_equals_bulk() {
        let mut input = std::vec::Vec::from(
            b"icy-metaint:50\r\ncontent-type:audio/mpeg\r\n\r\n".as_slice(),
        );
        input.extend_from_slice(&[1u8; 50]);
        input.push(1); // metadata length byte: 16 bytes
        input.extend_from_slice(b"StreamTitle='x';");
        input.extend_from_slice(&[2u8; 50]);

        let mut bulk = connected_remote();
        let bulk_events = feed(&mut bulk, &input);

        let mut dribble = connected_remote();
        let mut dribble_events = std::vec::Vec::new();
        for &b in &input {
            dribble
                .consume_byte(b, &mut |e| dribble_events.push(e))
                .unwrap();
        }
        assert_eq!(bulk_events, dribble_events);
    }

    #[test]
    fn metadata_interval_framing() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(
            b"icy-metaint:100\r\ncontent-type:audio/mpeg\r\n\r\n".as_slice(),
        );
        input.extend_from_slice(&[7u8; 100]);
        // Length byte 2 → 32 bytes of metadata, NUL padded.
        input.push(2);
        let mut block = [0u8; 32];
        let text = b"StreamTitle='Artist - Song';";
        block[..text.len()].copy_from_slice(text);
        input.extend_from_slice(&block);
        input.extend_from_slice(&[8u8; 100]);

        let events = feed(&mut framer, &input);
        let titles: std::vec::Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                FramerEvent::Metadata(m) => Some(m.title.as_str().to_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(titles, std::vec!["Artist - Song"]);
        assert_eq!(framer.session().stream_title(), "Artist - Song");

        // Exactly 200 audio bytes once the partial sink chunk is drained;
        // no metadata byte leaked into audio.
        let mut end = std::vec::Vec::new();
        framer.flush(&mut |e| end.push(e));
        let mut audio = audio_bytes(&events);
        audio.extend_from_slice(&audio_bytes(&end));
        assert_eq!(audio.len(), 200);
        assert!(audio[..100].iter().all(|&b| b == 7));
        assert!(audio[100..].iter().all(|&b| b == 8));
    }

    #[test]
    fn zero_length_metadata_block_resumes_audio() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(
            b"icy-metaint:10\r\ncontent-type:audio/mpeg\r\n\r\n".as_slice(),
        );
        input.extend_from_slice(&[1u8; 10]);
        input.push(0); // empty metadata block
        input.extend_from_slice(&[2u8; 10]);

        let events = feed(&mut framer, &input);
        assert!(events.iter().all(|e| !matches!(e, FramerEvent::Metadata(_))));
        let mut end = std::vec::Vec::new();
        framer.finish(&mut |e| end.push(e));
        let mut audio = audio_bytes(&events);
        audio.extend_from_slice(&audio_bytes(&end));
        assert_eq!(audio.len(), 20);
    }

    #[test]
    fn chunked_transfer_is_transparent() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(
            b"content-type:audio/mpeg\r\ntransfer-encoding: chunked\r\n\r\n".as_slice(),
        );
        input.extend_from_slice(b"5\r\nHELLO\r\n0\r\n\r\n");

        let events = feed(&mut framer, &input);
        assert!(
            events.contains(&FramerEvent::EndOfStream),
            "zero chunk ends the stream"
        );
        let mut end = std::vec::Vec::new();
        framer.finish(&mut |e| end.push(e));
        let mut audio = audio_bytes(&events);
        audio.extend_from_slice(&audio_bytes(&end));
        assert_eq!(audio, b"HELLO");
        assert_eq!(end.last(), Some(&FramerEvent::Chunk(AudioChunk::StopSong)));
    }

    #[test]
    fn chunk_sizes_in_hex_with_extensions() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(
            b"content-type:audio/mpeg\r\ntransfer-encoding:chunked\r\n\r\n".as_slice(),
        );
        input.extend_from_slice(b"A;ext=1\r\n0123456789\r\n0\r\n");

        let events = feed(&mut framer, &input);
        let mut end = std::vec::Vec::new();
        framer.finish(&mut |e| end.push(e));
        let mut audio = audio_bytes(&events);
        audio.extend_from_slice(&audio_bytes(&end));
        assert_eq!(audio, b"0123456789");
    }

    #[test]
    fn malformed_chunk_size_is_protocol_error() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(
            b"content-type:audio/mpeg\r\ntransfer-encoding:chunked\r\n\r\n".as_slice(),
        );
        input.extend_from_slice(b"XYZ\r\n");
        let mut events = std::vec::Vec::new();
        let result = framer.consume(&input, &mut |e| events.push(e));
        assert_eq!(result, Err(ProtocolError::BadChunkSize));
    }

    #[test]
    fn header_without_terminator_overruns_budget() {
        let mut framer = connected_remote();
        let line = [b'x'; 64];
        let mut result = Ok(());
        for _ in 0..100 {
            result = framer.consume(&line, &mut |_| {});
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(ProtocolError::HeaderOverrun));
    }

    #[test]
    fn playlist_response_redirects() {
        let mut framer = StreamFramer::new(StreamTarget::RemotePlaylist);
        framer.connected(&mut |_| {});
        assert_eq!(framer.state(), StreamState::PlaylistHeader);

        let input = b"HTTP/1.0 200 OK\r\n\
content-type:audio/x-scpls\r\n\
\r\n\
[playlist]\r\n\
NumberOfEntries=1\r\n\
File1=http://real.example/stream\r\n";
        let events = feed(&mut framer, input);
        assert_eq!(
            events,
            std::vec![FramerEvent::Redirect(
                String::try_from("http://real.example/stream").unwrap()
            )]
        );
        assert!(framer.is_stopped());
    }

    #[test]
    fn audio_request_answered_with_playlist_redirects() {
        // Station URL without .pls extension can still serve a playlist.
        let mut framer = connected_remote();
        let input = b"content-type:application/x-mpegurl\r\n\r\nhttp://next.example/live\n";
        let events = feed(&mut framer, input);
        assert_eq!(
            events,
            std::vec![FramerEvent::Redirect(
                String::try_from("http://next.example/live").unwrap()
            )]
        );
    }

    #[test]
    fn playlist_without_trailing_newline_redirects_on_finish() {
        let mut framer = StreamFramer::new(StreamTarget::LocalPlaylist);
        framer.connected(&mut |_| {});
        let events = feed(&mut framer, b"#EXTM3U\nhttp://tail.example/s");
        assert!(events.is_empty());
        let mut end = std::vec::Vec::new();
        framer.finish(&mut |e| end.push(e));
        assert!(matches!(end[0], FramerEvent::Redirect(ref u) if u.as_str() == "http://tail.example/s"));
    }

    #[test]
    fn stop_request_discards_input_and_finish_emits_stopsong() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(ICY_HEADER);
        input.extend_from_slice(&[5u8; 40]); // one full chunk + 8 in the sink
        let events = feed(&mut framer, &input);
        assert_eq!(audio_bytes(&events).len(), 32);

        framer.request_stop();
        assert_eq!(framer.state(), StreamState::StopRequested);
        let ignored = feed(&mut framer, &[6u8; 100]);
        assert!(ignored.is_empty(), "input after stop request is discarded");

        let mut end = std::vec::Vec::new();
        framer.finish(&mut |e| end.push(e));
        // Partial 8-byte chunk drains first, then StopSong.
        assert_eq!(audio_bytes(&end), std::vec![5u8; 8]);
        assert_eq!(end.last(), Some(&FramerEvent::Chunk(AudioChunk::StopSong)));
        assert!(framer.is_stopped());
    }

    #[test]
    fn content_length_reaches_end_of_stream() {
        let mut framer = StreamFramer::new(StreamTarget::LocalAudio { length: Some(20) });
        let mut events = std::vec::Vec::new();
        framer.connected(&mut |e| events.push(e));
        // 20 audio bytes, no ID3 magic (starts with MPEG sync).
        let mut data = std::vec![0xFFu8, 0xFB];
        data.extend_from_slice(&[3u8; 18]);
        framer.consume(&data, &mut |e| events.push(e)).unwrap();
        assert!(events.contains(&FramerEvent::EndOfStream));
        assert!(framer.is_stopped());
    }

    #[test]
    fn local_file_id3_tag_is_extracted_not_played() {
        // Build: 10-byte ID3 header + one TIT2 frame + padding, then audio.
        let mut tag_body = std::vec::Vec::new();
        tag_body.extend_from_slice(b"TIT2");
        let text = b"\x00Blue In Green";
        tag_body.extend_from_slice(&(text.len() as u32).to_be_bytes());
        tag_body.extend_from_slice(&[0, 0]);
        tag_body.extend_from_slice(text);
        tag_body.extend_from_slice(&[0u8; 20]); // padding

        let size = tag_body.len() as u32;
        let mut file = std::vec::Vec::from(b"ID3".as_slice());
        file.push(3); // v2.3
        file.push(0);
        file.push(0);
        file.push(((size >> 21) & 0x7F) as u8);
        file.push(((size >> 14) & 0x7F) as u8);
        file.push(((size >> 7) & 0x7F) as u8);
        file.push((size & 0x7F) as u8);
        file.extend_from_slice(&tag_body);
        file.extend_from_slice(&[0x11u8; 64]); // audio

        let mut framer = StreamFramer::new(StreamTarget::LocalAudio { length: None });
        let mut events = std::vec::Vec::new();
        framer.connected(&mut |e| events.push(e));
        framer.consume(&file, &mut |e| events.push(e)).unwrap();

        let titles: std::vec::Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                FramerEvent::Metadata(m) => Some(m.title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(titles, std::vec!["Blue In Green"]);
        assert_eq!(audio_bytes(&events), std::vec![0x11u8; 64]);
    }

    #[test]
    fn short_file_probe_flushes_as_audio_on_finish() {
        let mut framer = StreamFramer::new(StreamTarget::LocalAudio { length: None });
        let mut events = std::vec::Vec::new();
        framer.connected(&mut |e| events.push(e));
        framer.consume(&[0xFF, 0xFB, 0x90], &mut |e| events.push(e)).unwrap();
        assert!(audio_bytes(&events).is_empty(), "probe still buffering");

        let mut end = std::vec::Vec::new();
        framer.finish(&mut |e| end.push(e));
        assert_eq!(audio_bytes(&end), std::vec![0xFF, 0xFB, 0x90]);
    }

    #[test]
    fn flush_emits_partial_chunk_on_stall() {
        let mut framer = connected_remote();
        let mut input = std::vec::Vec::from(ICY_HEADER);
        input.extend_from_slice(&[9u8; 10]);
        let events = feed(&mut framer, &input);
        assert!(audio_bytes(&events).is_empty());

        let mut flushed = std::vec::Vec::new();
        framer.flush(&mut |e| flushed.push(e));
        assert_eq!(audio_bytes(&flushed), std::vec![9u8; 10]);
        assert_eq!(framer.state(), StreamState::Data, "flush does not stop");
    }
}
