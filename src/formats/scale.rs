// Scale decision: how big the output is, how much the engine decimates
// during IDCT, and the fine 16.16 factor that covers the rest.
// Exact rational comparisons throughout; no f32 on a core without FPU.

use log::info;

use super::{ImageDimensions, RenderConfig};
use crate::error::ImageError;
use crate::fixed::{Fixed, ScalePair};

// upper bound on a requested destination axis; keeps 16.16 factors in i32
pub const MAX_DEST_DIM: u32 = 8192;
// upper bound on a source axis: src/1 in 16.16 must still fit an i32
pub const MAX_SOURCE_DIM: u32 = (i32::MAX >> 16) as u32;

/// Exact scale `num / den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub num: u32,
    pub den: u32,
}

impl Ratio {
    pub const ONE: Ratio = Ratio { num: 1, den: 1 };

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    // self <= n / d
    #[inline]
    pub const fn at_most(self, n: u32, d: u32) -> bool {
        self.num as u64 * d as u64 <= n as u64 * self.den as u64
    }

    #[inline]
    pub const fn less_than(self, other: Ratio) -> bool {
        (self.num as u64) * (other.den as u64) < (other.num as u64) * (self.den as u64)
    }

    /// `floor(v * self)`
    #[inline]
    pub const fn apply(self, v: u32) -> u32 {
        (v as u64 * self.num as u64 / self.den as u64) as u32
    }

    pub const fn to_fixed(self) -> Fixed {
        Fixed::ratio(self.num, self.den)
    }
}

/// Decimation the decode engine applies inside its IDCT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseScale {
    Full,
    Half,
    Quarter,
    Eighth,
}

impl CoarseScale {
    pub const fn denominator(self) -> u32 {
        match self {
            CoarseScale::Full => 1,
            CoarseScale::Half => 2,
            CoarseScale::Quarter => 4,
            CoarseScale::Eighth => 8,
        }
    }

    // boundaries inclusive toward the coarser option: exactly 1/8 -> Eighth
    pub const fn for_target(target: Ratio) -> Self {
        if target.at_most(1, 8) {
            CoarseScale::Eighth
        } else if target.at_most(1, 4) {
            CoarseScale::Quarter
        } else if target.at_most(1, 2) {
            CoarseScale::Half
        } else {
            CoarseScale::Full
        }
    }

    /// Output size of the engine for a native axis length.
    #[inline]
    pub const fn scaled(self, native: u32) -> u32 {
        native.div_ceil(self.denominator())
    }
}

/// Source size limits enforced before the engine is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_width: 4096,
            max_height: 4096,
        }
    }
}

impl SizeLimits {
    /// Limits no larger than [`MAX_SOURCE_DIM`] on either axis.
    pub fn clamped(self) -> Self {
        Self {
            max_width: self.max_width.min(MAX_SOURCE_DIM),
            max_height: self.max_height.min(MAX_SOURCE_DIM),
        }
    }
}

pub fn check_dimensions(dims: ImageDimensions, limits: &SizeLimits) -> Result<(), ImageError> {
    if dims.width == 0 || dims.height == 0 {
        log::error!("jpeg: invalid dimensions {}x{}", dims.width, dims.height);
        return Err(ImageError::InvalidDimensions);
    }
    if dims.width > limits.max_width || dims.height > limits.max_height {
        log::error!(
            "jpeg: {}x{} exceeds supported {}x{}",
            dims.width,
            dims.height,
            limits.max_width,
            limits.max_height
        );
        return Err(ImageError::UnsupportedDimensions);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDecision {
    pub target: Ratio,
    pub dst_width: u32,
    pub dst_height: u32,
    pub coarse: CoarseScale,
    /// Native size after the engine's decimation
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// One shared factor pair, derived from the width axis
    pub factors: ScalePair,
}

/// `dims` must already have passed [`check_dimensions`].
pub fn decide(dims: ImageDimensions, cfg: &RenderConfig<'_>, progressive: bool) -> ScaleDecision {
    let (src_w, src_h) = (dims.width, dims.height);

    let (target, dst_width, dst_height) =
        if cfg.exact_dimensions && cfg.max_width > 0 && cfg.max_height > 0 {
            let w = cfg.max_width.min(MAX_DEST_DIM);
            let h = cfg.max_height.min(MAX_DEST_DIM);
            // aspect not preserved; target follows the width axis
            (Ratio::new(w, src_w), w, h)
        } else {
            let sx = if cfg.max_width > 0 && src_w > cfg.max_width {
                Ratio::new(cfg.max_width, src_w)
            } else {
                Ratio::ONE
            };
            let sy = if cfg.max_height > 0 && src_h > cfg.max_height {
                Ratio::new(cfg.max_height, src_h)
            } else {
                Ratio::ONE
            };
            let t = if sy.less_than(sx) { sy } else { sx };
            (t, t.apply(src_w).max(1), t.apply(src_h).max(1))
        };

    // DC-only decode always comes out at 1/8; any other request makes the
    // engine pick a mismatched scale
    let coarse = if progressive {
        CoarseScale::Eighth
    } else {
        CoarseScale::for_target(target)
    };

    let scaled_width = coarse.scaled(src_w);
    let scaled_height = coarse.scaled(src_h);
    let factors = ScalePair::new(dst_width, scaled_width);

    info!(
        "jpeg: {}x{} -> {}x{} (scale {}, coarse 1/{}, fine {}){}",
        src_w,
        src_h,
        dst_width,
        dst_height,
        target.to_fixed(),
        coarse.denominator(),
        factors.forward,
        if progressive { " [progressive]" } else { "" }
    );

    ScaleDecision {
        target,
        dst_width,
        dst_height,
        coarse,
        scaled_width,
        scaled_height,
        factors,
    }
}
