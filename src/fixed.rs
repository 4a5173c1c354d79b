// 16.16 fixed-point; the ESP32-C3 has no FPU, so nothing on the pixel
// path touches f32. Products are widened to i64 before shifting back.

use core::fmt;

pub const FP_SHIFT: u32 = 16;
pub const FP_ONE: i32 = 1 << FP_SHIFT;
pub const FP_MASK: i32 = FP_ONE - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed(i32);

impl Fixed {
    pub const ONE: Fixed = Fixed(FP_ONE);

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// `num / den` truncated to 16.16. `den` must be non-zero.
    #[inline]
    pub const fn ratio(num: u32, den: u32) -> Self {
        Fixed((((num as i64) << FP_SHIFT) / den as i64) as i32)
    }

    /// Raw 16.16 product `v * self`, not shifted back.
    #[inline]
    pub const fn mul_raw(self, v: i32) -> i64 {
        v as i64 * self.0 as i64
    }

    /// `floor(v * self)`
    #[inline]
    pub const fn mul_floor(self, v: i32) -> i32 {
        (self.mul_raw(v) >> FP_SHIFT) as i32
    }
}

// two decimals, integer-only
impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0 as i64;
        let sign = if v < 0 { "-" } else { "" };
        let a = v.unsigned_abs();
        let int = a >> FP_SHIFT;
        let hundredths = ((a & FP_MASK as u64) * 100 + (1 << (FP_SHIFT - 1))) >> FP_SHIFT;
        // rounding can carry into the integer part
        let (int, hundredths) = if hundredths >= 100 {
            (int + 1, hundredths - 100)
        } else {
            (int, hundredths)
        };
        write!(f, "{}{}.{:02}", sign, int, hundredths)
    }
}

/// 16.16 position split into sample index and interpolation weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPos {
    pub index: i32,
    pub frac: i32,
}

impl FixedPos {
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self {
            index: (raw >> FP_SHIFT) as i32,
            frac: (raw & FP_MASK as i64) as i32,
        }
    }
}

/// Weighted blend of two 8-bit samples; `w` is the 16-bit weight of `b`.
#[inline]
pub const fn lerp(a: i32, b: i32, w: i32) -> i32 {
    (a * (FP_ONE - w) + b * w) >> FP_SHIFT
}

/// Forward (dst per src) and inverse (src per dst) factors.
///
/// Each side is its own truncating division, so `forward * inverse` is
/// not exactly one. Coordinate mapping relies on this pair as-is: the
/// block footprint uses `forward`, per-pixel lookups use `inverse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePair {
    pub forward: Fixed,
    pub inverse: Fixed,
}

impl ScalePair {
    /// `dst` and `src` are both non-zero.
    pub const fn new(dst: u32, src: u32) -> Self {
        Self {
            forward: Fixed::ratio(dst, src),
            inverse: Fixed::ratio(src, dst),
        }
    }

    pub const IDENTITY: ScalePair = ScalePair {
        forward: Fixed::ONE,
        inverse: Fixed::ONE,
    };
}
