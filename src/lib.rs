// Image pipeline for the XTEink X4 reader (ESP32-C3, 4-gray e-paper)
//
// fixed   - 16.16 fixed-point primitives (no FPU on the C3)
// formats - JPEG decode-to-framebuffer: scale decision, resampling,
//           dithering, pixel cache, decode orchestration
// drivers - storage (SD via embedded-sdmmc), 2bpp framebuffer, heap stats

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod drivers;
pub mod error;
pub mod fixed;
pub mod formats;

pub use error::ImageError;
