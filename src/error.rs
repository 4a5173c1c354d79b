// Decode pipeline failures.
// Everything except CacheAllocationFailed is fatal to the call; that one
// only downgrades a decode to "no cache" and is logged, never returned.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// Free heap below decoder footprint + headroom, or decoder alloc failed
    MemoryExhausted,
    /// Storage could not open the file, or the engine rejected its header
    OpenFailed,
    /// Zero-sized source
    InvalidDimensions,
    /// Source larger than the configured limits
    UnsupportedDimensions,
    /// Engine reported failure mid-decode, or the sink refused pixels
    DecodeFailed,
    /// Pixel cache buffer could not be allocated
    CacheAllocationFailed,
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageError::MemoryExhausted => "not enough heap for decoder",
            ImageError::OpenFailed => "failed to open image",
            ImageError::InvalidDimensions => "invalid image dimensions",
            ImageError::UnsupportedDimensions => "image dimensions exceed limits",
            ImageError::DecodeFailed => "decode failed",
            ImageError::CacheAllocationFailed => "pixel cache allocation failed",
        };
        f.write_str(s)
    }
}
