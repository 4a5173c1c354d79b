// Quantized output snapshot.
//
// File layout (little-endian):
//   u32 width, u32 height, i32 origin_x, i32 origin_y
//   then height rows of 2-bit levels, four pixels per byte MSB-first,
//   each row padded to a whole byte.
// Redraw from the file skips decode and scaling entirely.

use alloc::vec::Vec;

use embedded_graphics_core::{Pixel, draw_target::DrawTarget, geometry::Point, pixelcolor::Gray2};
use log::{error, info, warn};

use crate::drivers::storage::{SourceReader, Storage};
use crate::error::ImageError;
use crate::formats::engine::ByteSource;

pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHeader {
    pub width: u32,
    pub height: u32,
    pub origin_x: i32,
    pub origin_y: i32,
}

impl CacheHeader {
    #[inline]
    pub const fn row_bytes(&self) -> usize {
        (self.width as usize).div_ceil(4)
    }

    pub const fn body_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.width.to_le_bytes());
        out[4..8].copy_from_slice(&self.height.to_le_bytes());
        out[8..12].copy_from_slice(&self.origin_x.to_le_bytes());
        out[12..16].copy_from_slice(&self.origin_y.to_le_bytes());
        out
    }

    pub fn decode(b: &[u8; HEADER_LEN]) -> Self {
        let word = |i: usize| [b[i], b[i + 1], b[i + 2], b[i + 3]];
        Self {
            width: u32::from_le_bytes(word(0)),
            height: u32::from_le_bytes(word(4)),
            origin_x: i32::from_le_bytes(word(8)),
            origin_y: i32::from_le_bytes(word(12)),
        }
    }
}

/// Dense store of one decode's output, addressed by absolute screen
/// coordinate.
pub struct PixelCache {
    header: CacheHeader,
    data: Vec<u8>,
}

impl PixelCache {
    /// Buffer size for a `width` x `height` cache.
    pub const fn byte_len(width: u32, height: u32) -> usize {
        (width as usize).div_ceil(4) * height as usize
    }

    /// `None` only when the buffer cannot be reserved.
    pub fn allocate(width: u32, height: u32, origin_x: i32, origin_y: i32) -> Option<Self> {
        let len = Self::byte_len(width, height);
        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            warn!("cache: cannot reserve {} bytes for {}x{}", len, width, height);
            return None;
        }
        // untouched (clipped) pixels read back as white
        data.resize(len, 0xFF);
        Some(Self {
            header: CacheHeader {
                width,
                height,
                origin_x,
                origin_y,
            },
            data,
        })
    }

    pub fn header(&self) -> CacheHeader {
        self.header
    }

    // byte index and bit shift of an absolute pixel, None outside
    #[inline]
    fn locate(&self, abs_x: i32, abs_y: i32) -> Option<(usize, u32)> {
        let x = abs_x as i64 - self.header.origin_x as i64;
        let y = abs_y as i64 - self.header.origin_y as i64;
        if x < 0 || y < 0 || x >= self.header.width as i64 || y >= self.header.height as i64 {
            return None;
        }
        let idx = y as usize * self.header.row_bytes() + x as usize / 4;
        Some((idx, 6 - 2 * (x % 4) as u32))
    }

    #[inline]
    pub fn set_pixel(&mut self, abs_x: i32, abs_y: i32, level: u8) {
        if let Some((idx, shift)) = self.locate(abs_x, abs_y) {
            self.data[idx] = (self.data[idx] & !(3 << shift)) | ((level & 3) << shift);
        }
    }

    pub fn level(&self, abs_x: i32, abs_y: i32) -> Option<u8> {
        self.locate(abs_x, abs_y)
            .map(|(idx, shift)| (self.data[idx] >> shift) & 3)
    }

    /// Header via create/truncate, then the body as one append. A failed
    /// append removes the file again so no header-only cache is left.
    pub fn write_to_file<S: Storage>(&self, storage: &S, path: &str) -> Result<(), &'static str> {
        storage.write_file(path, &self.header.encode())?;
        if let Err(e) = storage.append_file(path, &self.data) {
            if let Err(rm) = storage.remove_file(path) {
                error!("cache: {} left partial, remove failed: {}", path, rm);
            }
            return Err(e);
        }
        info!(
            "cache: wrote {} ({}x{}, {} bytes)",
            path,
            self.header.width,
            self.header.height,
            HEADER_LEN + self.data.len()
        );
        Ok(())
    }
}

/// Draw a cache file at its recorded origin without decoding.
pub fn render_cached<S, D>(storage: &S, path: &str, target: &mut D) -> Result<CacheHeader, ImageError>
where
    S: Storage,
    D: DrawTarget<Color = Gray2>,
{
    let mut reader = SourceReader::open(storage, "PXC", path).map_err(|e| {
        error!("cache: open {} failed: {}", path, e);
        ImageError::OpenFailed
    })?;

    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).map_err(|e| {
        error!("cache: {} header: {}", path, e);
        ImageError::DecodeFailed
    })?;
    let header = CacheHeader::decode(&raw);

    let expected = HEADER_LEN + header.body_len();
    if header.width == 0 || header.height == 0 || reader.size() as usize != expected {
        error!(
            "cache: {} invalid ({}x{}, {} bytes, expected {})",
            path,
            header.width,
            header.height,
            reader.size(),
            expected
        );
        return Err(ImageError::DecodeFailed);
    }

    let mut row = Vec::new();
    row.try_reserve_exact(header.row_bytes())
        .map_err(|_| ImageError::MemoryExhausted)?;
    row.resize(header.row_bytes(), 0);

    for y in 0..header.height {
        reader.read_exact(&mut row).map_err(|e| {
            error!("cache: {} row {}: {}", path, y, e);
            ImageError::DecodeFailed
        })?;
        // rows or columns past i32 cannot be on any target
        let Ok(sy) = i32::try_from(header.origin_y as i64 + y as i64) else {
            continue;
        };
        let pixels = (0..header.width).filter_map(|x| {
            let sx = i32::try_from(header.origin_x as i64 + x as i64).ok()?;
            let level = (row[x as usize / 4] >> (6 - 2 * (x % 4))) & 3;
            Some(Pixel(Point::new(sx, sy), Gray2::new(level)))
        });
        target
            .draw_iter(pixels)
            .map_err(|_| ImageError::DecodeFailed)?;
    }

    info!(
        "cache: drew {} ({}x{} at {},{})",
        path, header.width, header.height, header.origin_x, header.origin_y
    );
    Ok(header)
}
