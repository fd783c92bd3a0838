//! Bounded audio chunk queue.
//!
//! The single buffer between the ingest task and the playback task. Capacity
//! is sized so a network hiccup of a couple of seconds at 128 kbps does not
//! starve the decoder, while a fast server cannot balloon memory: 400 slots
//! × 32 payload bytes ≈ 12.5 KiB of audio.
//!
//! `push` bounds its wait so the producer notices sustained backpressure and
//! stops reading the socket instead of buffering unboundedly below us.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};
use stream::AudioChunk;

/// Queue capacity in chunks.
pub const QUEUE_DEPTH: usize = 400;

/// How long a full queue blocks `push` before reporting backpressure.
pub const PUSH_TIMEOUT: Duration = Duration::from_millis(200);

/// The queue stayed full past [`PUSH_TIMEOUT`]. Not an error: the producer
/// pauses and retries; the chunk it holds is not lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueTimeout;

/// Strict-FIFO bounded queue of [`AudioChunk`]s, one producer, one consumer.
///
/// Generic over the mutex flavor so firmware can share it across tasks with
/// a critical-section mutex while host tests use the no-op one.
pub struct ChunkQueue<M: RawMutex> {
    channel: Channel<M, AudioChunk, QUEUE_DEPTH>,
}

impl<M: RawMutex> ChunkQueue<M> {
    /// Create an empty queue. `const` so it can live in a `static`.
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue a chunk, waiting up to [`PUSH_TIMEOUT`] for a free slot.
    pub async fn push(&self, chunk: AudioChunk) -> Result<(), QueueTimeout> {
        with_timeout(PUSH_TIMEOUT, self.channel.send(chunk))
            .await
            .map_err(|_| QueueTimeout)
    }

    /// Dequeue the oldest chunk, waiting until one is available.
    pub async fn pop(&self) -> AudioChunk {
        self.channel.receive().await
    }

    /// Chunks currently queued.
    pub fn depth(&self) -> usize {
        self.channel.len()
    }

    /// `true` when no chunk is queued.
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl<M: RawMutex> Default for ChunkQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use stream::ChunkPayload;

    use super::*;

    fn data(tag: u8) -> AudioChunk {
        AudioChunk::Data(ChunkPayload::from_slice(&[tag; 32]).unwrap())
    }

    #[tokio::test]
    async fn push_past_capacity_times_out_and_pop_unblocks() {
        let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
        for i in 0..QUEUE_DEPTH {
            queue.push(data(i as u8)).await.unwrap();
        }
        assert_eq!(queue.depth(), QUEUE_DEPTH);

        // Slot 401 must report backpressure, not block forever.
        assert_eq!(queue.push(data(0xEE)).await, Err(QueueTimeout));

        // One pop frees a slot; the retried push succeeds.
        let first = queue.pop().await;
        assert_eq!(first, data(0));
        queue.push(data(0xEE)).await.unwrap();
        assert_eq!(queue.depth(), QUEUE_DEPTH);
    }

    #[tokio::test]
    async fn fifo_order_preserved_across_control_records() {
        let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
        queue.push(AudioChunk::StartSong).await.unwrap();
        queue.push(data(1)).await.unwrap();
        queue.push(data(2)).await.unwrap();
        queue.push(AudioChunk::StopSong).await.unwrap();

        assert_eq!(queue.pop().await, AudioChunk::StartSong);
        assert_eq!(queue.pop().await, data(1));
        assert_eq!(queue.pop().await, data(2));
        assert_eq!(queue.pop().await, AudioChunk::StopSong);
        assert!(queue.is_empty());
    }
}
