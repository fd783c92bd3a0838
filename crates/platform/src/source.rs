//! Stream source abstraction — where the compressed audio bytes come from.
//!
//! A [`StreamSource`] hides whether bytes arrive over a TCP socket, a TLS
//! session or a local file on the SD card. The ingest loop only ever sees a
//! `read` that yields some bytes or signals end-of-stream.

/// Byte-level read access to an open stream or file.
pub trait StreamSource {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read into `buf` from the current position.
    ///
    /// Returns the number of bytes read. `Ok(0)` means end-of-stream: the
    /// peer closed the connection or the file is exhausted. A short read is
    /// normal for sockets and must not be treated as an error.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;
}

/// What kind of thing a [`Connector`] connected to.
///
/// The framer needs to know whether an HTTP-style header block precedes the
/// payload (remote streams) and how many payload bytes to expect (local
/// files declare their length up front, servers may send `content-length`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionInfo {
    /// `true` when the target is a local file: no header block will arrive.
    pub local: bool,
    /// Declared payload length in bytes, when known ahead of time.
    pub length: Option<u32>,
}

/// Resolves a target URL or file path into an open [`StreamSource`].
///
/// Connection-level concerns (DNS, TCP handshake, socket timeouts, SD card
/// mounting) live behind this trait; failures surface as one connect error
/// which the orchestrator maps to its retry policy.
pub trait Connector {
    /// Error type
    type Error: core::fmt::Debug;
    /// Source type produced by a successful connect
    type Source: StreamSource;

    /// Connect to `target` and return the open source plus what we learned
    /// about it at connect time.
    fn connect(
        &mut self,
        target: &str,
    ) -> impl core::future::Future<Output = Result<(Self::Source, ConnectionInfo), Self::Error>>;
}
