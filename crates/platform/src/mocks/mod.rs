//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)] // test doubles: slices are script-bounded
#![allow(clippy::arithmetic_side_effects)] // counters bounded by script length

use crate::*;

/// Mock byte source that replays a scripted byte sequence.
///
/// `max_read` caps how many bytes a single `read` call returns, so tests can
/// exercise arbitrary network fragmentation (down to one byte per read).
pub struct MockSource<'a> {
    data: &'a [u8],
    pos: usize,
    max_read: usize,
}

impl<'a> MockSource<'a> {
    /// Create a source that replays `data` and then reports end-of-stream.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            max_read: usize::MAX,
        }
    }

    /// Cap each read at `n` bytes to simulate a dribbling connection.
    pub fn with_max_read(data: &'a [u8], n: usize) -> Self {
        Self {
            data,
            pos: 0,
            max_read: n.max(1),
        }
    }

    /// Bytes not yet consumed by the reader.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

impl StreamSource for MockSource<'_> {
    type Error = core::convert::Infallible;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len()).min(self.max_read);
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Error returned by [`MockConnector`] for unknown targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockConnectError;

/// Mock connector serving scripted responses per target URL.
pub struct MockConnector<'a> {
    routes: heapless::Vec<(heapless::String<128>, &'a [u8], ConnectionInfo), 8>,
    /// Number of successful connects, for redirect-depth assertions.
    pub connects: usize,
    max_read: usize,
}

impl<'a> MockConnector<'a> {
    /// Create an empty connector; unknown targets fail to connect.
    pub fn new() -> Self {
        Self {
            routes: heapless::Vec::new(),
            connects: 0,
            max_read: usize::MAX,
        }
    }

    /// Serve `data` with `info` when `target` is connected to.
    pub fn route(&mut self, target: &str, data: &'a [u8], info: ConnectionInfo) {
        let mut t = heapless::String::new();
        t.push_str(target).unwrap();
        self.routes.push((t, data, info)).ok().unwrap();
    }

    /// Cap each read of every served source at `n` bytes.
    pub fn set_max_read(&mut self, n: usize) {
        self.max_read = n.max(1);
    }
}

impl Default for MockConnector<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Connector for MockConnector<'a> {
    type Error = MockConnectError;
    type Source = MockSource<'a>;

    async fn connect(&mut self, target: &str) -> Result<(Self::Source, ConnectionInfo), Self::Error> {
        for (t, data, info) in &self.routes {
            if t.as_str() == target {
                self.connects += 1;
                return Ok((MockSource::with_max_read(data, self.max_read), *info));
            }
        }
        Err(MockConnectError)
    }
}

/// Mock audio decoder recording everything the playback task sends it.
pub struct MockDecoder {
    data: heapless::Vec<u8, 8192>,
    start_count: usize,
    stop_count: usize,
    volume: u8,
    /// Milliseconds to sleep per data write, to simulate a slow chip.
    pub write_delay_ms: u64,
}

impl MockDecoder {
    /// Create a new mock decoder.
    pub fn new() -> Self {
        Self {
            data: heapless::Vec::new(),
            start_count: 0,
            stop_count: 0,
            volume: 50,
            write_delay_ms: 0,
        }
    }

    /// All audio bytes received so far, in order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of `start_song` calls.
    pub fn start_count(&self) -> usize {
        self.start_count
    }

    /// Number of `stop_song` calls.
    pub fn stop_count(&self) -> usize {
        self.stop_count
    }

    /// Current volume setting.
    pub fn volume(&self) -> u8 {
        self.volume
    }
}

impl Default for MockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDecoder for MockDecoder {
    type Error = core::convert::Infallible;

    async fn await_data_request(&mut self) -> Result<(), Self::Error> {
        if self.write_delay_ms > 0 {
            embassy_time::Timer::after_millis(self.write_delay_ms).await;
        }
        Ok(())
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for &b in data {
            let _ = self.data.push(b);
        }
        Ok(())
    }

    async fn start_song(&mut self) -> Result<(), Self::Error> {
        self.start_count += 1;
        Ok(())
    }

    async fn stop_song(&mut self) -> Result<(), Self::Error> {
        self.stop_count += 1;
        Ok(())
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), Self::Error> {
        self.volume = volume.min(100);
        Ok(())
    }
}

/// Error returned by [`MockFlash`] on out-of-range reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockFlashError;

/// Mock flash partition backed by a borrowed byte slice.
pub struct MockFlash<'a> {
    mem: &'a [u8],
}

impl<'a> MockFlash<'a> {
    /// Wrap `mem` as a partition; length must be a multiple of [`PAGE_SIZE`].
    pub fn new(mem: &'a [u8]) -> Self {
        debug_assert_eq!(mem.len() % PAGE_SIZE, 0);
        Self { mem }
    }
}

impl FlashPartition for MockFlash<'_> {
    type Error = MockFlashError;

    fn size(&self) -> u32 {
        self.mem.len() as u32
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or(MockFlashError)?;
        let src = self.mem.get(start..end).ok_or(MockFlashError)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_respects_max_read() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = MockSource::with_max_read(&data, 2);
        let mut buf = [0u8; 8];
        assert_eq!(src.read(&mut buf).await.unwrap(), 2);
        assert_eq!(src.read(&mut buf).await.unwrap(), 2);
        assert_eq!(src.read(&mut buf).await.unwrap(), 1);
        assert_eq!(src.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_connector_routes() {
        let payload = b"PAYLOAD";
        let mut conn = MockConnector::new();
        conn.route(
            "http://radio.example/stream",
            payload,
            ConnectionInfo { local: false, length: None },
        );

        let (mut src, info) = conn.connect("http://radio.example/stream").await.unwrap();
        assert!(!info.local);
        let mut buf = [0u8; 16];
        let n = src.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], payload);

        assert!(conn.connect("http://other.example/").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_decoder_records_data() {
        let mut dec = MockDecoder::new();
        dec.start_song().await.unwrap();
        dec.await_data_request().await.unwrap();
        dec.send_data(&[9u8; 32]).await.unwrap();
        dec.stop_song().await.unwrap();

        assert_eq!(dec.start_count(), 1);
        assert_eq!(dec.stop_count(), 1);
        assert_eq!(dec.data().len(), 32);
    }

    #[test]
    fn test_mock_flash_rejects_out_of_range() {
        let mem = [0xFFu8; PAGE_SIZE];
        let mut flash = MockFlash::new(&mem);
        let mut buf = [0u8; 16];
        assert!(flash.read((PAGE_SIZE - 8) as u32, &mut buf).is_err());
        assert!(flash.read(0, &mut buf).is_ok());
    }
}
