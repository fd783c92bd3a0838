//! Ingest task: socket bytes → framer → chunk queue.
//!
//! Runs one connection to completion. All protocol knowledge lives in the
//! framer; this loop only moves bytes, applies backpressure, polls the stop
//! flag at read boundaries and drives the bitrate clock. Every exit path
//! goes through `framer.finish`, so the playback side always receives a
//! terminal `StopSong`.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_timeout, Duration, Instant};
use heapless::{String, Vec};
use platform::StreamSource;
use stream::{FramerEvent, ProtocolError, StreamFramer, MAX_URL};

use crate::queue::ChunkQueue;
use crate::status::RadioStatus;

/// Read buffer per loop iteration.
const READ_BYTES: usize = 256;

/// Input stall bound after which the partial sink chunk is flushed so the
/// decoder is not starved behind it.
const STALL_FLUSH: Duration = Duration::from_millis(300);

/// Most events one 256-byte read can produce: eight full chunks plus
/// boundary records and metadata (blocks are at least 16 bytes apart).
const EVENT_BURST: usize = 32;

/// Why the ingest loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Clean end: content length reached, chunked terminator, EOF, or a
    /// stop request honored.
    Finished,
    /// The payload was a playlist; reconnect to this target.
    Redirect(String<MAX_URL>),
    /// Terminal protocol failure.
    Protocol(ProtocolError),
    /// The source failed mid-stream (socket error).
    Disconnected,
}

/// Drive `framer` over `source` until the session ends.
///
/// The queue push retries on [`QueueTimeout`](crate::queue::QueueTimeout)
/// until the chunk lands or a stop is requested — backpressure pauses this
/// task rather than dropping audio.
pub async fn run_ingest<S, M>(
    source: &mut S,
    framer: &mut StreamFramer,
    queue: &ChunkQueue<M>,
    status: &RadioStatus<M>,
) -> IngestOutcome
where
    S: StreamSource,
    M: RawMutex,
{
    let mut buf = [0u8; READ_BYTES];
    let mut events: Vec<FramerEvent, EVENT_BURST> = Vec::new();
    let mut station_published = false;

    loop {
        if status.stop_requested() {
            framer.request_stop();
            framer.finish(&mut collector(&mut events));
            drain(&mut events, queue, status).await;
            return IngestOutcome::Finished;
        }

        let read = with_timeout(STALL_FLUSH, source.read(&mut buf)).await;
        let n = match read {
            Ok(Ok(n)) => n,
            Ok(Err(_)) => {
                framer.finish(&mut collector(&mut events));
                drain(&mut events, queue, status).await;
                return IngestOutcome::Disconnected;
            }
            Err(_) => {
                // Stalled input: hand over what we have and keep waiting.
                framer.flush(&mut collector(&mut events));
                drain(&mut events, queue, status).await;
                continue;
            }
        };
        if n == 0 {
            framer.finish(&mut collector(&mut events));
            drain(&mut events, queue, status).await;
            return IngestOutcome::Finished;
        }

        let consumed = framer.consume(buf.get(..n).unwrap_or(&[]), &mut collector(&mut events));
        framer
            .session_mut()
            .record_clock(Instant::now().as_millis());
        status.set_bitrate(framer.session().bitrate_kbps());
        if !station_published && !framer.session().station_name().is_empty() {
            status.set_station(framer.session().station_name());
            station_published = true;
        }

        if let Some(outcome) = drain(&mut events, queue, status).await {
            // Redirect: the framer stopped itself; drain its teardown too.
            framer.finish(&mut collector(&mut events));
            drain(&mut events, queue, status).await;
            return outcome;
        }
        if let Err(err) = consumed {
            framer.finish(&mut collector(&mut events));
            drain(&mut events, queue, status).await;
            return IngestOutcome::Protocol(err);
        }
        if framer.is_stopped() {
            // Clean end of stream; the connection may stay open (keep-alive)
            // so do not wait for EOF.
            framer.finish(&mut collector(&mut events));
            drain(&mut events, queue, status).await;
            return IngestOutcome::Finished;
        }
    }
}

fn collector(events: &mut Vec<FramerEvent, EVENT_BURST>) -> impl FnMut(FramerEvent) + '_ {
    |event| {
        // A full burst buffer would drop audio; EVENT_BURST is sized so a
        // 256-byte read cannot reach it.
        let _ = events.push(event);
    }
}

/// Forward buffered events to the queue/status. Returns early-exit outcomes
/// (currently only `Redirect`).
async fn drain<M: RawMutex>(
    events: &mut Vec<FramerEvent, EVENT_BURST>,
    queue: &ChunkQueue<M>,
    status: &RadioStatus<M>,
) -> Option<IngestOutcome> {
    let mut outcome = None;
    for event in events.iter() {
        match event {
            FramerEvent::Chunk(chunk) => {
                // Chunks are Copy; a timed-out push loses nothing.
                while queue.push(*chunk).await.is_err() {
                    if status.stop_requested() {
                        break;
                    }
                }
            }
            FramerEvent::Metadata(meta) => status.set_metadata(meta),
            FramerEvent::Redirect(url) => {
                outcome = Some(IngestOutcome::Redirect(url.clone()));
            }
            FramerEvent::EndOfStream => {}
        }
    }
    events.clear();
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::MockSource;
    use stream::{AudioChunk, StreamTarget};

    use super::*;

    async fn pop_all(queue: &ChunkQueue<NoopRawMutex>) -> std::vec::Vec<AudioChunk> {
        let mut out = std::vec::Vec::new();
        while !queue.is_empty() {
            out.push(queue.pop().await);
        }
        out
    }

    #[tokio::test]
    async fn eof_always_ends_with_stopsong() {
        let mut input = std::vec::Vec::from(b"icy-name:One\r\n\r\n".as_slice());
        input.extend_from_slice(&[0x55u8; 40]);
        let mut source = MockSource::new(&input);
        let mut framer = StreamFramer::new(StreamTarget::Remote);
        framer.connected(&mut |_| {});
        let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
        let status: RadioStatus<NoopRawMutex> = RadioStatus::new();

        let outcome = run_ingest(&mut source, &mut framer, &queue, &status).await;
        assert_eq!(outcome, IngestOutcome::Finished);

        let chunks = pop_all(&queue).await;
        assert_eq!(chunks.first(), Some(&AudioChunk::StartSong));
        assert_eq!(chunks.last(), Some(&AudioChunk::StopSong));
        let payload: usize = chunks
            .iter()
            .filter_map(|c| match c {
                AudioChunk::Data(p) => Some(p.len()),
                _ => None,
            })
            .sum();
        assert_eq!(payload, 40);
    }

    #[tokio::test]
    async fn stop_request_ends_session_with_stopsong() {
        let mut input = std::vec::Vec::from(b"icy-name:One\r\n\r\n".as_slice());
        input.extend_from_slice(&[0x55u8; 64]);
        let mut source = MockSource::new(&input);
        let mut framer = StreamFramer::new(StreamTarget::Remote);
        framer.connected(&mut |_| {});
        let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
        let status: RadioStatus<NoopRawMutex> = RadioStatus::new();

        status.request_stop();
        let outcome = run_ingest(&mut source, &mut framer, &queue, &status).await;
        assert_eq!(outcome, IngestOutcome::Finished);
        let chunks = pop_all(&queue).await;
        assert_eq!(chunks.last(), Some(&AudioChunk::StopSong));
    }

    #[tokio::test]
    async fn fragmented_reads_deliver_identical_audio() {
        let mut input = std::vec::Vec::from(b"icy-metaint:20\r\n\r\n".as_slice());
        input.extend_from_slice(&[1u8; 20]);
        input.push(0);
        input.extend_from_slice(&[2u8; 20]);

        let collect = |max_read: usize, input: &[u8]| {
            let input = input.to_vec();
            async move {
                let mut source = MockSource::with_max_read(&input, max_read);
                let mut framer = StreamFramer::new(StreamTarget::Remote);
                framer.connected(&mut |_| {});
                let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
                let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
                run_ingest(&mut source, &mut framer, &queue, &status).await;
                let mut audio = std::vec::Vec::new();
                while !queue.is_empty() {
                    if let AudioChunk::Data(p) = queue.pop().await {
                        audio.extend_from_slice(p.as_slice());
                    }
                }
                audio
            }
        };

        let bulk = collect(usize::MAX, &input).await;
        let dribble = collect(1, &input).await;
        assert_eq!(bulk, dribble);
        assert_eq!(bulk.len(), 40);
    }
}
