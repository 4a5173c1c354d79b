// Host-side collaborators for the pipeline tests: in-memory storage, a
// fixed heap reading and a scripted block decoder.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use pulp_image::drivers::framebuffer::{GrayFramebuffer, HEIGHT, Rotation, WIDTH};
use pulp_image::drivers::heap::HeapStats;
use pulp_image::drivers::storage::Storage;
use pulp_image::formats::engine::{
    Block, BlockSink, ByteSource, DecodeEngine, EncodingMode, PixelFormat,
};
use pulp_image::formats::jpeg::JpegConverter;
use pulp_image::formats::scale::CoarseScale;

#[derive(Default)]
pub struct MemStorage {
    pub files: RefCell<BTreeMap<String, Vec<u8>>>,
    pub open_handles: Cell<usize>,
    /// Every append fails, like a full card
    pub fail_appends: Cell<bool>,
}

pub struct MemFile {
    path: String,
    pos: usize,
}

impl MemStorage {
    pub fn put(&self, path: &str, data: Vec<u8>) {
        self.files.borrow_mut().insert(path.to_string(), data);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }
}

impl Storage for MemStorage {
    type Handle = MemFile;

    fn open_read(&self, _tag: &str, path: &str) -> Result<MemFile, &'static str> {
        if !self.files.borrow().contains_key(path) {
            return Err("open file failed");
        }
        self.open_handles.set(self.open_handles.get() + 1);
        Ok(MemFile {
            path: path.to_string(),
            pos: 0,
        })
    }

    fn read(&self, h: &mut MemFile, buf: &mut [u8]) -> Result<usize, &'static str> {
        let files = self.files.borrow();
        let data = files.get(&h.path).ok_or("read failed")?;
        // SD-sized chunks: reads never return more than one sector
        let n = buf.len().min(data.len() - h.pos).min(512);
        buf[..n].copy_from_slice(&data[h.pos..h.pos + n]);
        h.pos += n;
        Ok(n)
    }

    fn seek(&self, h: &mut MemFile, pos: u32) -> Result<(), &'static str> {
        h.pos = pos as usize;
        Ok(())
    }

    fn size(&self, h: &MemFile) -> u32 {
        self.files.borrow().get(&h.path).map_or(0, |d| d.len() as u32)
    }

    fn close(&self, _h: MemFile) {
        self.open_handles.set(self.open_handles.get() - 1);
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), &'static str> {
        self.put(path, data.to_vec());
        Ok(())
    }

    fn append_file(&self, path: &str, data: &[u8]) -> Result<(), &'static str> {
        if self.fail_appends.get() {
            return Err("card full");
        }
        self.files
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), &'static str> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or("delete file failed")
    }
}

pub struct FakeHeap(pub usize);

impl HeapStats for FakeHeap {
    fn free(&self) -> usize {
        self.0
    }
}

pub const MAGIC: &[u8; 4] = b"FJPG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Flat(u8),
    Ramp,
}

impl Pattern {
    pub fn sample(self, x: u32, y: u32) -> u8 {
        match self {
            Pattern::Flat(v) => v,
            Pattern::Ramp => ramp(x, y),
        }
    }
}

pub fn ramp(x: u32, y: u32) -> u8 {
    ((x * 7 + y * 3) % 256) as u8
}

/// Script for one fake image file.
#[derive(Debug, Clone, Copy)]
pub struct FakeImage {
    pub width: u32,
    pub height: u32,
    pub progressive: bool,
    pub pattern: Pattern,
    /// Fail the scan after this many blocks (0 = never)
    pub fail_after: u8,
    /// Hand out one block whose stride is shorter than its width
    pub bad_stride: bool,
}

impl FakeImage {
    pub fn new(width: u32, height: u32, pattern: Pattern) -> Self {
        Self {
            width,
            height,
            progressive: false,
            pattern,
            fail_after: 0,
            bad_stride: false,
        }
    }

    pub fn progressive(mut self) -> Self {
        self.progressive = true;
        self
    }

    // 4 magic, w, h, flags, pattern, flat value, fail_after, then filler
    // standing in for entropy-coded data
    pub fn encode(&self) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.progressive as u8 | (self.bad_stride as u8) << 1);
        let (kind, value) = match self.pattern {
            Pattern::Flat(v) => (0, v),
            Pattern::Ramp => (1, 0),
        };
        out.extend_from_slice(&[kind, value, self.fail_after]);
        out.extend(std::iter::repeat_n(0x5A, 64));
        out
    }
}

#[derive(Default)]
pub struct EngineStats {
    pub created: Cell<usize>,
    pub closed: Cell<usize>,
    pub blocks: Cell<usize>,
    pub last_scale: Cell<Option<CoarseScale>>,
}

// MCU-sized tiles with padded stride, like a real baseline decoder
pub const TILE_W: u32 = 16;
pub const TILE_H: u32 = 8;
pub const PAD: usize = 4;

pub struct FakeEngine {
    stats: Rc<EngineStats>,
    image: Option<FakeImage>,
    format: Option<PixelFormat>,
    last_error: i32,
}

impl FakeEngine {
    pub fn new(stats: Rc<EngineStats>) -> Self {
        Self {
            stats,
            image: None,
            format: None,
            last_error: 0,
        }
    }
}

impl DecodeEngine for FakeEngine {
    fn open<R: ByteSource>(&mut self, src: &mut R) -> Result<(), &'static str> {
        let mut magic = [0u8; 4];
        read_full(src, &mut magic)?;
        if &magic != MAGIC {
            self.last_error = -1;
            return Err("not a JPEG");
        }
        // re-read the header after a seek, the way marker scanning does
        src.seek(0)?;
        let mut hdr = [0u8; 16];
        read_full(src, &mut hdr)?;
        if src.position() != 16 {
            self.last_error = -2;
            return Err("position drift");
        }
        let word = |i: usize| u32::from_le_bytes([hdr[i], hdr[i + 1], hdr[i + 2], hdr[i + 3]]);
        let pattern = match hdr[13] {
            0 => Pattern::Flat(hdr[14]),
            _ => Pattern::Ramp,
        };
        self.image = Some(FakeImage {
            width: word(4),
            height: word(8),
            progressive: hdr[12] & 1 != 0,
            pattern,
            fail_after: hdr[15],
            bad_stride: hdr[12] & 2 != 0,
        });
        Ok(())
    }

    fn width(&self) -> u32 {
        self.image.map_or(0, |i| i.width)
    }

    fn height(&self) -> u32 {
        self.image.map_or(0, |i| i.height)
    }

    fn encoding_mode(&self) -> EncodingMode {
        match self.image {
            Some(i) if i.progressive => EncodingMode::Progressive,
            _ => EncodingMode::Baseline,
        }
    }

    fn set_pixel_format(&mut self, format: PixelFormat) {
        self.format = Some(format);
    }

    fn decode<R: ByteSource, K: BlockSink>(
        &mut self,
        _src: &mut R,
        x: i32,
        y: i32,
        scale: CoarseScale,
        sink: &mut K,
    ) -> Result<(), &'static str> {
        let image = self.image.ok_or("not open")?;
        if self.format != Some(PixelFormat::Gray8) {
            return Err("pixel format not set");
        }
        // DC-only sources can only come out at 1/8
        if image.progressive && scale != CoarseScale::Eighth {
            self.last_error = -4;
            return Err("unsupported scale for progressive");
        }
        self.stats.last_scale.set(Some(scale));

        let sw = scale.scaled(image.width);
        let sh = scale.scaled(image.height);
        let mut delivered = 0u32;

        for ty in (0..sh).step_by(TILE_H as usize) {
            for tx in (0..sw).step_by(TILE_W as usize) {
                if image.fail_after > 0 && delivered == image.fail_after as u32 {
                    self.last_error = -3;
                    return Err("corrupt scan");
                }
                let w = TILE_W.min(sw - tx) as usize;
                let h = TILE_H.min(sh - ty) as usize;
                let stride = w + PAD;
                let mut pixels = vec![0xAA; stride * h];
                for r in 0..h {
                    for c in 0..w {
                        pixels[r * stride + c] =
                            image.pattern.sample(tx + c as u32, ty + r as u32);
                    }
                }
                let stride = if image.bad_stride { w - 1 } else { stride };
                let block = Block {
                    x: x + tx as i32,
                    y: y + ty as i32,
                    width: w,
                    height: h,
                    stride,
                    pixels: &pixels,
                };
                delivered += 1;
                self.stats.blocks.set(self.stats.blocks.get() + 1);
                if !sink.on_block(&block) {
                    self.last_error = -5;
                    return Err("aborted by sink");
                }
            }
        }
        Ok(())
    }

    fn last_error(&self) -> i32 {
        self.last_error
    }

    fn close(&mut self) {
        self.image = None;
        self.stats.closed.set(self.stats.closed.get() + 1);
    }
}

fn read_full<R: ByteSource>(src: &mut R, buf: &mut [u8]) -> Result<(), &'static str> {
    let mut total = 0;
    while total < buf.len() {
        let n = src.read(&mut buf[total..])?;
        if n == 0 {
            return Err("truncated header");
        }
        total += n;
    }
    Ok(())
}

pub const PLENTY: usize = 512 * 1024;

pub fn converter<'a>(
    storage: &'a MemStorage,
    heap: usize,
    stats: &Rc<EngineStats>,
) -> JpegConverter<'a, MemStorage, FakeHeap, impl FnMut() -> Option<FakeEngine>> {
    let stats = stats.clone();
    JpegConverter::new(storage, FakeHeap(heap), move || {
        stats.created.set(stats.created.get() + 1);
        Some(FakeEngine::new(stats.clone()))
    })
}

pub fn screen() -> GrayFramebuffer {
    GrayFramebuffer::new(WIDTH, HEIGHT, Rotation::Deg0).unwrap()
}
