// Device-side collaborators of the image pipeline.
//
// storage     - handle-style file reads and cache writes; SD card backend
// framebuffer - 2bpp gray draw target with panel rotation and RAM planes
// heap        - free-heap snapshot for the decoder admission check

pub mod framebuffer;
pub mod heap;
pub mod storage;
