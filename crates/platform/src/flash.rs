//! Raw flash partition access for the key-value store scanner.
//!
//! The scanner reads whole 4096-byte pages; there is no higher-level
//! key-enumeration primitive on the partition, which is exactly why the
//! `store` crate decodes pages itself.

/// Size of one flash page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Read-only raw access to the wear-leveled key-value partition.
///
/// Reads are blocking: the scanner runs to completion on the control
/// context. Holding `&mut` on the partition for the duration of a scan is
/// the mutual-exclusion domain shared with the (external) flash-write path —
/// a concurrent writer cannot exist while the scanner borrows the partition.
pub trait FlashPartition {
    /// Error type
    type Error: core::fmt::Debug;

    /// Total partition size in bytes (a multiple of [`PAGE_SIZE`]).
    fn size(&self) -> u32;

    /// Read `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// `offset + buf.len()` must not exceed [`size`](FlashPartition::size);
    /// implementations return their out-of-range error otherwise.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
}
