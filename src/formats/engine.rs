//! Seam to the block decoder (Huffman + IDCT). The pipeline never decodes
//! entropy data itself; it configures an engine, hands it a byte source,
//! and receives decoded 8-bit gray blocks top-to-bottom through a
//! [`BlockSink`] that carries the per-call context.

use super::scale::CoarseScale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    Baseline,
    /// Only DC coefficients are decoded; output is 1/8 native resolution
    Progressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Gray8,
}

/// Random-access byte source the engine pulls compressed data from.
///
/// `position()` must always equal the real file position; header
/// parsing on files with large APP segments depends on it.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str>;
    fn seek(&mut self, pos: u32) -> Result<(), &'static str>;
    fn position(&self) -> u32;
    fn size(&self) -> u32;
}

/// One decoded strip or tile in scaled-source coordinates.
///
/// `pixels` holds `height` rows of `stride` bytes; only the first `width`
/// samples of each row are valid.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub pixels: &'a [u8],
}

impl<'a> Block<'a> {
    /// Valid samples of local row `r`.
    #[inline]
    pub fn row(&self, r: usize) -> &'a [u8] {
        let start = r * self.stride;
        &self.pixels[start..start + self.width]
    }

    /// Stride and sizes are consistent with the backing slice.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.stride >= self.width
            && self.pixels.len() >= (self.height - 1) * self.stride + self.width
    }
}

/// Receives blocks during [`DecodeEngine::decode`]. Returning `false`
/// asks the engine to stop; it then reports failure.
pub trait BlockSink {
    fn on_block(&mut self, block: &Block<'_>) -> bool;
}

pub trait DecodeEngine {
    /// Parse headers up to the first scan.
    fn open<R: ByteSource>(&mut self, src: &mut R) -> Result<(), &'static str>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn encoding_mode(&self) -> EncodingMode;

    /// Must be called after `open`.
    fn set_pixel_format(&mut self, format: PixelFormat);

    /// Decode every block in order, calling `sink` synchronously for each.
    fn decode<R: ByteSource, K: BlockSink>(
        &mut self,
        src: &mut R,
        x: i32,
        y: i32,
        scale: CoarseScale,
        sink: &mut K,
    ) -> Result<(), &'static str>;

    /// Engine-specific code for the most recent failure (0 = none).
    fn last_error(&self) -> i32;

    fn close(&mut self);
}
