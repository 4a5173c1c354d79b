// Image format support for the reader
//
// scale       - target scale, coarse engine denominator, fine 16.16 factors
// resample    - per-block destination mapping: identity / nearest / bilinear
// dither      - 8-bit gray to 4-level gray, optional 4x4 Bayer
// pixel_cache - quantized output snapshot, persisted for cheap redraw
// engine      - block decoder seam (JPEG entropy decode lives elsewhere)
// jpeg        - decode orchestration: heap guard, lifecycle, wiring

pub mod dither;
pub mod engine;
pub mod jpeg;
pub mod pixel_cache;
pub mod resample;
pub mod scale;

/// Per-call render parameters; owned by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderConfig<'a> {
    /// Destination origin on screen (may be negative; clipped per block)
    pub x: i32,
    pub y: i32,
    /// Bounding box; 0 leaves that axis unbounded
    pub max_width: u32,
    pub max_height: u32,
    /// Stretch to exactly max_width x max_height instead of fit-within
    pub exact_dimensions: bool,
    pub dithering: bool,
    /// Persist quantized output here after a successful decode
    pub cache_path: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    // extension includes the leading dot, e.g. ".JPG"
    pub fn from_extension(ext: &str) -> Option<Self> {
        if jpeg::supports_format(ext) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let dot = path.rfind('.')?;
        if path[dot..].contains('/') {
            return None;
        }
        Self::from_extension(&path[dot..])
    }
}
