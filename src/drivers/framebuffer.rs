// 2bpp gray framebuffer for the four-gray panel refresh.
// Pixels are stored physically, four per byte, MSB-first; level 0 is black,
// 3 is white. Widgets and images draw in logical coordinates and are
// rotated here, then the refresh reads the packed 1-bit RAM planes.

use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Size},
    pixelcolor::{Gray2, GrayColor},
    primitives::Rectangle,
};

// physical panel size (SSD1677, 800x480)
pub const WIDTH: u16 = 800;
pub const HEIGHT: u16 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

pub struct GrayFramebuffer {
    buf: Vec<u8>,
    width: u16,
    height: u16,
    row_bytes: usize,
    rotation: Rotation,
}

impl GrayFramebuffer {
    /// Physical `width` x `height`, cleared to white. `None` if the buffer
    /// cannot be allocated.
    pub fn new(width: u16, height: u16, rotation: Rotation) -> Option<Self> {
        let row_bytes = (width as usize).div_ceil(4);
        let len = row_bytes * height as usize;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).ok()?;
        buf.resize(len, 0xFF);
        Some(Self {
            buf,
            width,
            height,
            row_bytes,
            rotation,
        })
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Raw packed physical pixels.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Level at logical `(x, y)`, `None` outside the screen.
    pub fn level(&self, x: i32, y: i32) -> Option<u8> {
        let (lx, ly) = self.logical(x, y)?;
        let (px, py) = self.to_physical(lx, ly);
        Some(self.get_physical(px, py))
    }

    pub fn set_level(&mut self, x: i32, y: i32, level: u8) {
        if let Some((lx, ly)) = self.logical(x, y) {
            let (px, py) = self.to_physical(lx, ly);
            self.set_physical(px, py, level & 3);
        }
    }

    /// Bytes per 1-bit plane.
    pub fn plane_len(&self) -> usize {
        (self.width as usize).div_ceil(8) * self.height as usize
    }

    // black where level < 2, for the fast B/W pass
    pub fn bw_plane(&self, out: &mut [u8]) -> usize {
        self.plane(out, |level| level >= 2)
    }

    pub fn lsb_plane(&self, out: &mut [u8]) -> usize {
        self.plane(out, |level| level & 1 != 0)
    }

    pub fn msb_plane(&self, out: &mut [u8]) -> usize {
        self.plane(out, |level| level & 2 != 0)
    }

    // packed 1-bit rows, MSB-first, 1 = white; writes whole rows that fit
    fn plane(&self, out: &mut [u8], white: impl Fn(u8) -> bool) -> usize {
        let pr = (self.width as usize).div_ceil(8);
        if pr == 0 {
            return 0;
        }
        let rows = (out.len() / pr).min(self.height as usize);
        for py in 0..rows {
            let dst = &mut out[py * pr..(py + 1) * pr];
            dst.fill(0);
            for px in 0..self.width {
                if white(self.get_physical(px, py as u16)) {
                    dst[px as usize / 8] |= 0x80 >> (px % 8);
                }
            }
        }
        rows * pr
    }

    fn logical_size(&self) -> (u16, u16) {
        match self.rotation {
            Rotation::Deg0 | Rotation::Deg180 => (self.width, self.height),
            Rotation::Deg90 | Rotation::Deg270 => (self.height, self.width),
        }
    }

    #[inline]
    fn logical(&self, x: i32, y: i32) -> Option<(u16, u16)> {
        let (w, h) = self.logical_size();
        if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
            return None;
        }
        Some((x as u16, y as u16))
    }

    #[inline]
    fn to_physical(&self, lx: u16, ly: u16) -> (u16, u16) {
        let (w, h) = (self.width, self.height);
        match self.rotation {
            Rotation::Deg0 => (lx, ly),
            Rotation::Deg90 => (w - 1 - ly, lx),
            Rotation::Deg180 => (w - 1 - lx, h - 1 - ly),
            Rotation::Deg270 => (ly, h - 1 - lx),
        }
    }

    #[inline]
    fn get_physical(&self, px: u16, py: u16) -> u8 {
        let idx = py as usize * self.row_bytes + px as usize / 4;
        let shift = 6 - 2 * (px % 4);
        (self.buf[idx] >> shift) & 3
    }

    #[inline]
    fn set_physical(&mut self, px: u16, py: u16, level: u8) {
        let idx = py as usize * self.row_bytes + px as usize / 4;
        let shift = 6 - 2 * (px % 4);
        self.buf[idx] = (self.buf[idx] & !(3 << shift)) | (level << shift);
    }
}

impl OriginDimensions for GrayFramebuffer {
    fn size(&self) -> Size {
        let (w, h) = self.logical_size();
        Size::new(w as u32, h as u32)
    }
}

impl DrawTarget for GrayFramebuffer {
    type Color = Gray2;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, color) in pixels {
            self.set_level(p.x, p.y, color.luma());
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let screen = self.bounding_box().size;
        let x0 = area.top_left.x.max(0);
        let y0 = area.top_left.y.max(0);
        let x_end = (area.top_left.x + area.size.width as i32).min(screen.width as i32);
        let y_end = (area.top_left.y + area.size.height as i32).min(screen.height as i32);
        if x0 >= x_end || y0 >= y_end {
            return Ok(());
        }
        let level = color.luma() & 3;

        if self.rotation != Rotation::Deg0 {
            for y in y0..y_end {
                for x in x0..x_end {
                    self.set_level(x, y, level);
                }
            }
            return Ok(());
        }

        // unrotated rows: edge pixels one by one, whole bytes in between
        let pattern = level * 0x55;
        for y in y0..y_end {
            let mut x = x0;
            while x < x_end && x % 4 != 0 {
                self.set_physical(x as u16, y as u16, level);
                x += 1;
            }
            let bytes_end = x + (x_end - x) / 4 * 4;
            let row = y as usize * self.row_bytes;
            self.buf[row + x as usize / 4..row + bytes_end as usize / 4].fill(pattern);
            x = bytes_end;
            while x < x_end {
                self.set_physical(x as u16, y as u16, level);
                x += 1;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill((color.luma() & 3) * 0x55);
        Ok(())
    }
}
