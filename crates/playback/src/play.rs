//! Playback task: chunk queue → decoder chip.
//!
//! Pops chunks and feeds the decoder at the pace its data-request gate
//! allows. The queue is the only coupling to the ingest side; the in-band
//! `StartSong`/`StopSong` records carry session boundaries, so this loop
//! needs no other signalling to know when a session begins or ends.

use embassy_sync::blocking_mutex::raw::RawMutex;
use platform::AudioDecoder;
use stream::AudioChunk;

use crate::queue::ChunkQueue;

/// Drain the queue into `decoder` until the session's `StopSong` arrives.
///
/// Suspends on an empty queue and on the decoder's ready gate; payload is
/// written in the chunk-sized slices the chip expects.
pub async fn run_playback<D, M>(queue: &ChunkQueue<M>, decoder: &mut D) -> Result<(), D::Error>
where
    D: AudioDecoder,
    M: RawMutex,
{
    loop {
        match queue.pop().await {
            AudioChunk::StartSong => decoder.start_song().await?,
            AudioChunk::Data(payload) => {
                decoder.await_data_request().await?;
                decoder.send_data(payload.as_slice()).await?;
            }
            AudioChunk::StopSong => {
                decoder.stop_song().await?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::MockDecoder;
    use stream::ChunkPayload;

    use super::*;

    #[tokio::test]
    async fn session_boundaries_reach_decoder() {
        let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
        queue.push(AudioChunk::StartSong).await.unwrap();
        for i in 0..4u8 {
            let payload = ChunkPayload::from_slice(&[i; 32]).unwrap();
            queue.push(AudioChunk::Data(payload)).await.unwrap();
        }
        queue.push(AudioChunk::StopSong).await.unwrap();

        let mut decoder = MockDecoder::new();
        run_playback(&queue, &mut decoder).await.unwrap();

        assert_eq!(decoder.start_count(), 1);
        assert_eq!(decoder.stop_count(), 1);
        assert_eq!(decoder.data().len(), 128);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn partial_chunk_preserves_length() {
        let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
        queue.push(AudioChunk::StartSong).await.unwrap();
        let payload = ChunkPayload::from_slice(&[7u8; 5]).unwrap();
        queue.push(AudioChunk::Data(payload)).await.unwrap();
        queue.push(AudioChunk::StopSong).await.unwrap();

        let mut decoder = MockDecoder::new();
        run_playback(&queue, &mut decoder).await.unwrap();
        assert_eq!(decoder.data(), &[7u8; 5]);
    }
}
