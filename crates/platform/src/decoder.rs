//! Audio decoder chip abstraction.
//!
//! The decoder is an external peripheral (VS1053-class) fed over SPI in
//! 32-byte bursts. It raises a data-request line when its internal FIFO has
//! room; the playback task must gate every data write on that signal.

/// The external audio decoder peripheral.
pub trait AudioDecoder {
    /// Error type
    type Error: core::fmt::Debug;

    /// Wait until the chip's data-request line permits another data write.
    fn await_data_request(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Send one burst of compressed audio data (at most 32 bytes).
    ///
    /// Callers must have observed [`await_data_request`] since the previous
    /// write.
    ///
    /// [`await_data_request`]: AudioDecoder::await_data_request
    fn send_data(&mut self, data: &[u8])
        -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Prepare the chip for a new song (reset decode state, un-mute).
    fn start_song(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Flush the chip's buffers and mute at the end of a song.
    fn stop_song(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Set the output volume (0 = mute, 100 = maximum).
    fn set_volume(&mut self, volume: u8)
        -> impl core::future::Future<Output = Result<(), Self::Error>>;
}
