// Block -> destination mapping.
//
// A block's footprint comes from pushing its source edges through the
// forward factor; each destination pixel inside it looks back into the
// block through the inverse factor. The footprint is clipped to the
// screen once per block, never per pixel.
//
//   forward == 1.0  identity copy
//   forward  > 1.0  bilinear (DC-only progressive output is 1/8 scale;
//                   nearest would show 8x8 blocks)
//   forward  < 1.0  nearest neighbour, skipped samples are not averaged

use crate::fixed::{Fixed, FixedPos, ScalePair, lerp};

use super::engine::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Identity,
    Bilinear,
    Nearest,
}

impl Strategy {
    pub fn for_factor(forward: Fixed) -> Self {
        if forward == Fixed::ONE {
            Strategy::Identity
        } else if forward > Fixed::ONE {
            Strategy::Bilinear
        } else {
            Strategy::Nearest
        }
    }
}

/// Destination rectangle `[x0, x1) x [y0, y1)`, relative to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRange {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
}

impl DstRange {
    pub fn width(&self) -> usize {
        (self.x1 - self.x0) as usize
    }
}

/// Fixed geometry of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub factors: ScalePair,
    pub scaled_width: i32,
    pub scaled_height: i32,
    pub dst_width: i32,
    pub dst_height: i32,
    pub origin_x: i32,
    pub origin_y: i32,
    pub screen_width: i32,
    pub screen_height: i32,
}

impl Mapping {
    pub fn strategy(&self) -> Strategy {
        Strategy::for_factor(self.factors.forward)
    }

    /// Widest row any block can produce after clipping.
    pub fn max_row_len(&self) -> usize {
        let (lo, hi) = visible_span(self.origin_x, self.dst_width, self.screen_width);
        (hi - lo).max(0) as usize
    }

    /// Clipped destination footprint of `block`, or `None` if nothing of it
    /// is visible.
    pub fn footprint(&self, block: &Block<'_>) -> Option<DstRange> {
        let fwd = self.factors.forward;
        let src_x_end = block.x + block.width as i32;
        let src_y_end = block.y + block.height as i32;

        let x0 = fwd.mul_floor(block.x);
        let y0 = fwd.mul_floor(block.y);
        // the last block stretches to the destination edge
        let x1 = if src_x_end >= self.scaled_width {
            self.dst_width
        } else {
            fwd.mul_floor(src_x_end)
        };
        let y1 = if src_y_end >= self.scaled_height {
            self.dst_height
        } else {
            fwd.mul_floor(src_y_end)
        };

        let (lo_x, hi_x) = visible_span(self.origin_x, self.dst_width, self.screen_width);
        let (lo_y, hi_y) = visible_span(self.origin_y, self.dst_height, self.screen_height);
        let (x0, x1) = ((x0 as i64).max(lo_x), (x1 as i64).min(hi_x));
        let (y0, y1) = ((y0 as i64).max(lo_y), (y1 as i64).min(hi_y));

        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        // non-empty spans lie inside [0, dst)
        Some(DstRange {
            x0: x0 as i32,
            x1: x1 as i32,
            y0: y0 as i32,
            y1: y1 as i32,
        })
    }

    /// Interior `[start, end)` of `range` in which both bilinear taps fall
    /// inside the block's valid columns.
    ///
    /// Derived from the inverse factor, which is what the per-pixel lookup
    /// uses, so forward/inverse drift cannot push a tap out of range.
    pub fn safe_x_range(&self, block: &Block<'_>, range: &DstRange) -> (i32, i32) {
        let inv = self.factors.inverse.raw() as i64;
        let first = (block.x as i64) << 16;
        let last = (block.x as i64 + block.width as i64 - 1) << 16;
        let lo = ceil_div(first, inv);
        let hi = ceil_div(last, inv);
        let start = lo.clamp(range.x0 as i64, range.x1 as i64) as i32;
        let end = hi.clamp(start as i64, range.x1 as i64) as i32;
        (start, end)
    }

    /// Resample `block` row by row into `row_buf`; `emit(dst_y, range, row)`
    /// receives each finished row. Stops early if `emit` returns false.
    pub fn resample<F>(&self, block: &Block<'_>, row_buf: &mut [u8], mut emit: F) -> bool
    where
        F: FnMut(i32, &DstRange, &[u8]) -> bool,
    {
        let Some(range) = self.footprint(block) else {
            return true;
        };
        let row = &mut row_buf[..range.width()];

        match self.strategy() {
            Strategy::Identity => {
                for dst_y in range.y0..range.y1 {
                    let src = block.row(local(dst_y - block.y, block.height));
                    for (out, dst_x) in row.iter_mut().zip(range.x0..range.x1) {
                        *out = src[local(dst_x - block.x, block.width)];
                    }
                    if !emit(dst_y, &range, row) {
                        return false;
                    }
                }
            }
            Strategy::Nearest => {
                let inv = self.factors.inverse;
                for dst_y in range.y0..range.y1 {
                    let sy = inv.mul_floor(dst_y) - block.y;
                    let src = block.row(local(sy, block.height));
                    for (out, dst_x) in row.iter_mut().zip(range.x0..range.x1) {
                        let sx = inv.mul_floor(dst_x) - block.x;
                        *out = src[local(sx, block.width)];
                    }
                    if !emit(dst_y, &range, row) {
                        return false;
                    }
                }
            }
            Strategy::Bilinear => {
                let (safe0, safe1) = self.safe_x_range(block, &range);
                for dst_y in range.y0..range.y1 {
                    self.bilinear_row(block, &range, (safe0, safe1), dst_y, row);
                    if !emit(dst_y, &range, row) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn bilinear_row(
        &self,
        block: &Block<'_>,
        range: &DstRange,
        (safe0, safe1): (i32, i32),
        dst_y: i32,
        row: &mut [u8],
    ) {
        let inv = self.factors.inverse;
        let fy = FixedPos::from_raw(inv.mul_raw(dst_y));
        let ly = fy.index - block.y;
        let row0 = block.row(local(ly, block.height));
        let row1 = block.row(local(ly + 1, block.height));

        let sample = |lx0: usize, lx1: usize, fx: i32| -> u8 {
            let top = lerp(row0[lx0] as i32, row0[lx1] as i32, fx);
            let bot = lerp(row1[lx0] as i32, row1[lx1] as i32, fx);
            lerp(top, bot, fy.frac) as u8
        };

        let w = block.width;
        let base = range.x0;

        // edges clamp both taps
        for dst_x in range.x0..safe0 {
            let fx = FixedPos::from_raw(inv.mul_raw(dst_x));
            let lx = fx.index - block.x;
            row[(dst_x - base) as usize] = sample(local(lx, w), local(lx + 1, w), fx.frac);
        }

        // interior: lx and lx + 1 both in [0, w)
        for dst_x in safe0..safe1 {
            let fx = FixedPos::from_raw(inv.mul_raw(dst_x));
            let lx = (fx.index - block.x) as usize;
            row[(dst_x - base) as usize] = sample(lx, lx + 1, fx.frac);
        }

        for dst_x in safe1..range.x1 {
            let fx = FixedPos::from_raw(inv.mul_raw(dst_x));
            let lx = fx.index - block.x;
            row[(dst_x - base) as usize] = sample(local(lx, w), local(lx + 1, w), fx.frac);
        }
    }
}

// on-screen part [lo, hi) of one destination axis, relative to the origin;
// wide arithmetic so any i32 origin clips instead of overflowing
#[inline]
fn visible_span(origin: i32, dst: i32, screen_end: i32) -> (i64, i64) {
    let origin = origin as i64;
    ((-origin).max(0), (screen_end as i64 - origin).min(dst as i64))
}

// clamp a block-local index into [0, len)
#[inline]
fn local(i: i32, len: usize) -> usize {
    i.clamp(0, len as i32 - 1) as usize
}

#[inline]
fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a.div_euclid(b);
    if a.rem_euclid(b) != 0 { q + 1 } else { q }
}
