// JPEG decode straight into a gray draw target.
// The block decoder is heap-allocated on demand so its ~20KB only exists
// during a decode; a free-heap check gates it. Per-call state (mapping,
// row buffer, optional pixel cache) lives in a DecodeSession that the
// engine drives block by block; nothing here is global.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::Point,
    pixelcolor::Gray2,
};
use log::{debug, error, info, warn};

use super::dither::quantize_at;
use super::engine::{Block, BlockSink, DecodeEngine, EncodingMode, PixelFormat};
use super::pixel_cache::PixelCache;
use super::resample::{Mapping, Strategy};
use super::scale::{self, SizeLimits};
use super::{ImageDimensions, RenderConfig};
use crate::drivers::heap::HeapStats;
use crate::drivers::storage::{SourceReader, Storage};
use crate::error::ImageError;

// decoder instance, tables and work buffers
pub const ENGINE_FOOTPRINT: usize = 20 * 1024;
// left free for the rest of the system while a decode runs
pub const HEAP_HEADROOM: usize = 16 * 1024;
// kept free after the pixel cache buffer is reserved
pub const CACHE_HEADROOM: usize = 8 * 1024;

// case-insensitive, extension includes the dot
pub fn supports_format(ext: &str) -> bool {
    ext.eq_ignore_ascii_case(".jpg") || ext.eq_ignore_ascii_case(".jpeg")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterConfig {
    pub engine_footprint: usize,
    pub headroom: usize,
    pub cache_headroom: usize,
    pub limits: SizeLimits,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            engine_footprint: ENGINE_FOOTPRINT,
            headroom: HEAP_HEADROOM,
            cache_headroom: CACHE_HEADROOM,
            limits: SizeLimits::default(),
        }
    }
}

impl ConverterConfig {
    /// Free heap required before a decoder may be created.
    pub const fn min_free_heap(&self) -> usize {
        self.engine_footprint + self.headroom
    }
}

/// What a successful decode produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    pub width: u32,
    pub height: u32,
    /// Coarse decimation the engine applied (1, 2, 4 or 8)
    pub denominator: u32,
    pub strategy: Strategy,
    pub blocks: u32,
    pub cache_written: bool,
}

// closes the engine on every exit path
struct EngineGuard<E: DecodeEngine>(E);

impl<E: DecodeEngine> Deref for EngineGuard<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.0
    }
}

impl<E: DecodeEngine> DerefMut for EngineGuard<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.0
    }
}

impl<E: DecodeEngine> Drop for EngineGuard<E> {
    fn drop(&mut self) {
        self.0.close();
    }
}

// per-call context handed to the engine as its block sink
struct DecodeSession<'d, D> {
    mapping: Mapping,
    dithering: bool,
    target: &'d mut D,
    row_buf: Vec<u8>,
    cache: Option<PixelCache>,
    blocks: u32,
    aborted: bool,
}

impl<D: DrawTarget<Color = Gray2>> BlockSink for DecodeSession<'_, D> {
    fn on_block(&mut self, block: &Block<'_>) -> bool {
        if !block.is_well_formed() {
            error!(
                "jpeg: malformed block at {},{} ({}x{}, stride {}, {} bytes)",
                block.x,
                block.y,
                block.width,
                block.height,
                block.stride,
                block.pixels.len()
            );
            self.aborted = true;
            return false;
        }
        self.blocks += 1;

        let Self {
            mapping,
            dithering,
            target,
            row_buf,
            cache,
            ..
        } = self;
        let (ox, oy, dithering) = (mapping.origin_x, mapping.origin_y, *dithering);

        let ok = mapping.resample(block, row_buf, |dst_y, range, row| {
            let sy = oy + dst_y;
            let x0 = ox + range.x0;
            let pixels = row.iter().enumerate().map(|(i, &gray)| {
                let sx = x0 + i as i32;
                let level = quantize_at(gray, sx, sy, dithering);
                if let Some(c) = cache.as_mut() {
                    c.set_pixel(sx, sy, level);
                }
                Pixel(Point::new(sx, sy), Gray2::new(level))
            });
            target.draw_iter(pixels).is_ok()
        });

        if !ok {
            error!("jpeg: draw target refused block at {},{}", block.x, block.y);
            self.aborted = true;
        }
        ok
    }
}

pub struct JpegConverter<'a, S, H, F> {
    storage: &'a S,
    heap: H,
    new_engine: F,
    config: ConverterConfig,
}

impl<'a, S, H, F, E> JpegConverter<'a, S, H, F>
where
    S: Storage,
    H: HeapStats,
    F: FnMut() -> Option<E>,
    E: DecodeEngine,
{
    /// `new_engine` allocates a decoder; `None` means the allocation failed.
    pub fn new(storage: &'a S, heap: H, new_engine: F) -> Self {
        Self {
            storage,
            heap,
            new_engine,
            config: ConverterConfig::default(),
        }
    }

    /// Source limits above [`scale::MAX_SOURCE_DIM`] are capped.
    pub fn with_config(mut self, config: ConverterConfig) -> Self {
        let limits = config.limits.clamped();
        if limits != config.limits {
            warn!(
                "jpeg: source limits {}x{} capped to {}x{}",
                config.limits.max_width, config.limits.max_height, limits.max_width, limits.max_height
            );
        }
        self.config = ConverterConfig { limits, ..config };
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Native size from the headers only; no scan data is decoded.
    pub fn dimensions(&mut self, path: &str) -> Result<ImageDimensions, ImageError> {
        let (engine, _reader) = self.open(path)?;
        let dims = ImageDimensions {
            width: engine.width(),
            height: engine.height(),
        };
        debug!("jpeg: {} is {}x{}", path, dims.width, dims.height);
        Ok(dims)
    }

    /// Decode `path` into `target` at `cfg`'s origin, scaled per `cfg`.
    pub fn decode_to_framebuffer<D>(
        &mut self,
        path: &str,
        target: &mut D,
        cfg: &RenderConfig<'_>,
    ) -> Result<DecodeSummary, ImageError>
    where
        D: DrawTarget<Color = Gray2>,
    {
        let (mut engine, mut reader) = self.open(path)?;

        let dims = ImageDimensions {
            width: engine.width(),
            height: engine.height(),
        };
        scale::check_dimensions(dims, &self.config.limits)?;

        let progressive = engine.encoding_mode() == EncodingMode::Progressive;
        if progressive {
            warn!("jpeg: {} is progressive, DC-only decode at 1/8", path);
        }
        let decision = scale::decide(dims, cfg, progressive);
        engine.set_pixel_format(PixelFormat::Gray8);

        let screen = target.bounding_box();
        let mapping = Mapping {
            factors: decision.factors,
            scaled_width: decision.scaled_width as i32,
            scaled_height: decision.scaled_height as i32,
            dst_width: decision.dst_width as i32,
            dst_height: decision.dst_height as i32,
            origin_x: cfg.x,
            origin_y: cfg.y,
            screen_width: screen.top_left.x + screen.size.width as i32,
            screen_height: screen.top_left.y + screen.size.height as i32,
        };

        let cache = match cfg.cache_path {
            Some(_) => self.allocate_cache(decision.dst_width, decision.dst_height, cfg),
            None => None,
        };

        let row_len = mapping.max_row_len();
        let mut row_buf = Vec::new();
        if row_buf.try_reserve_exact(row_len).is_err() {
            error!("jpeg: cannot reserve {} byte row buffer", row_len);
            return Err(ImageError::MemoryExhausted);
        }
        row_buf.resize(row_len, 0);

        let mut session = DecodeSession {
            mapping,
            dithering: cfg.dithering,
            target,
            row_buf,
            cache,
            blocks: 0,
            aborted: false,
        };

        let status = engine.decode(&mut reader, 0, 0, decision.coarse, &mut session);
        let code = engine.last_error();
        drop(engine);
        drop(reader);

        if let Err(e) = status {
            error!("jpeg: {} decode failed: {} (code {})", path, e, code);
            return Err(ImageError::DecodeFailed);
        }
        if session.aborted {
            error!("jpeg: {} decode aborted after {} blocks", path, session.blocks);
            return Err(ImageError::DecodeFailed);
        }

        let cache_written = match (session.cache.take(), cfg.cache_path) {
            (Some(cache), Some(cache_path)) => match cache.write_to_file(self.storage, cache_path) {
                Ok(()) => true,
                Err(e) => {
                    warn!("cache: write {} failed: {}", cache_path, e);
                    false
                }
            },
            _ => false,
        };

        let summary = DecodeSummary {
            width: decision.dst_width,
            height: decision.dst_height,
            denominator: decision.coarse.denominator(),
            strategy: mapping.strategy(),
            blocks: session.blocks,
            cache_written,
        };
        info!(
            "jpeg: {} done, {}x{} at {},{} via {:?}, {} blocks{}",
            path,
            summary.width,
            summary.height,
            cfg.x,
            cfg.y,
            summary.strategy,
            summary.blocks,
            if cache_written { ", cached" } else { "" }
        );
        Ok(summary)
    }

    // heap gate, decoder allocation, file open, header parse
    fn open(&mut self, path: &str) -> Result<(EngineGuard<E>, SourceReader<'a, S>), ImageError> {
        let free = self.heap.free();
        let need = self.config.min_free_heap();
        if free < need {
            error!("jpeg: not enough heap for decoder ({} free, need {})", free, need);
            return Err(ImageError::MemoryExhausted);
        }

        let Some(engine) = (self.new_engine)() else {
            error!("jpeg: failed to allocate decoder");
            return Err(ImageError::MemoryExhausted);
        };
        let mut engine = EngineGuard(engine);

        let mut reader = SourceReader::open(self.storage, "JPG", path).map_err(|e| {
            error!("jpeg: open {} failed: {}", path, e);
            ImageError::OpenFailed
        })?;

        engine.open(&mut reader).map_err(|e| {
            error!("jpeg: {} header rejected: {} (code {})", path, e, engine.last_error());
            ImageError::OpenFailed
        })?;

        Ok((engine, reader))
    }

    fn allocate_cache(&self, width: u32, height: u32, cfg: &RenderConfig<'_>) -> Option<PixelCache> {
        let bytes = PixelCache::byte_len(width, height);
        let free = self.heap.free();
        if free < bytes + self.config.cache_headroom {
            warn!(
                "jpeg: {} ({} bytes, {} free), continuing without caching",
                ImageError::CacheAllocationFailed,
                bytes,
                free
            );
            return None;
        }
        match PixelCache::allocate(width, height, cfg.x, cfg.y) {
            Some(cache) => Some(cache),
            None => {
                warn!(
                    "jpeg: {}, continuing without caching",
                    ImageError::CacheAllocationFailed
                );
                None
            }
        }
    }
}
