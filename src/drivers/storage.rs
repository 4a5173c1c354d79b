// File access for the image pipeline.
// Storage is the handle-style read API plus whole-file writes for caches.
// SdStorage re-opens volume -> root -> dirs -> file on every operation;
// nothing stays open between calls, so a pulled card never leaves a
// dangling handle in the volume manager.

use alloc::string::{String, ToString};

use embedded_sdmmc::{BlockDevice, Mode, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use log::{debug, info};

use crate::formats::engine::ByteSource;

pub trait Storage {
    type Handle;

    /// `tag` names the subsystem in log output.
    fn open_read(&self, tag: &str, path: &str) -> Result<Self::Handle, &'static str>;
    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> Result<usize, &'static str>;
    fn seek(&self, handle: &mut Self::Handle, pos: u32) -> Result<(), &'static str>;
    fn size(&self, handle: &Self::Handle) -> u32;
    fn close(&self, handle: Self::Handle);

    /// Create or truncate `path` and write `data`.
    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), &'static str>;
    /// Append to `path`, creating it if missing.
    fn append_file(&self, path: &str, data: &[u8]) -> Result<(), &'static str>;
    fn remove_file(&self, path: &str) -> Result<(), &'static str>;
}

/// Open read handle that closes itself.
///
/// The tracked position always equals the storage position: it only moves
/// by the byte count a read actually returned, or to a seek that succeeded.
pub struct SourceReader<'s, S: Storage> {
    storage: &'s S,
    handle: Option<S::Handle>,
    position: u32,
    size: u32,
}

impl<'s, S: Storage> SourceReader<'s, S> {
    pub fn open(storage: &'s S, tag: &str, path: &str) -> Result<Self, &'static str> {
        let handle = storage.open_read(tag, path)?;
        let size = storage.size(&handle);
        Ok(Self {
            storage,
            handle: Some(handle),
            position: 0,
            size,
        })
    }

    /// Fill `buf` completely or fail.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), &'static str> {
        let mut total = 0;
        while total < buf.len() {
            let n = ByteSource::read(self, &mut buf[total..])?;
            if n == 0 {
                return Err("unexpected end of file");
            }
            total += n;
        }
        Ok(())
    }
}

impl<S: Storage> ByteSource for SourceReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        let handle = self.handle.as_mut().ok_or("source closed")?;
        let n = self.storage.read(handle, buf)?;
        self.position += n as u32;
        Ok(n)
    }

    fn seek(&mut self, pos: u32) -> Result<(), &'static str> {
        if pos > self.size {
            return Err("seek past end");
        }
        let handle = self.handle.as_mut().ok_or("source closed")?;
        self.storage.seek(handle, pos)?;
        self.position = pos;
        Ok(())
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn size(&self) -> u32 {
        self.size
    }
}

impl<S: Storage> Drop for SourceReader<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.storage.close(handle);
        }
    }
}

// "A/B/NAME.EXT" -> ("A/B", "NAME.EXT"); leading slash ignored
pub fn split_path(path: &str) -> Result<(&str, &str), &'static str> {
    let path = path.trim_start_matches('/');
    let (dirs, name) = path.rsplit_once('/').unwrap_or(("", path));
    if name.is_empty() {
        return Err("empty file name");
    }
    Ok((dirs, name))
}

// directory components in walk order, empty segments skipped
pub fn dir_parts(dirs: &str) -> impl Iterator<Item = &str> {
    dirs.split('/').filter(|p| !p.is_empty())
}

// No RTC on board; timestamps are fixed to 2025-01-01.
#[derive(Default, Clone, Copy)]
pub struct FixedTime;

impl TimeSource for FixedTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub volume_mgr: VolumeManager<D, T>,
}

/// Read cursor into a file on the card. Holds no card resources.
#[derive(Debug, Clone)]
pub struct SdFile {
    path: String,
    pos: u32,
    size: u32,
}

impl<SPI, DELAY> SdStorage<SdCard<SPI, DELAY>, FixedTime>
where
    SPI: embedded_hal::spi::SpiDevice,
    DELAY: embedded_hal::delay::DelayNs,
{
    pub fn from_spi(spi: SPI, delay: DELAY) -> Self {
        let sdcard = SdCard::new(spi, delay);

        match sdcard.num_bytes() {
            Ok(bytes) => info!("sd: {} bytes ({} MB)", bytes, bytes / 1024 / 1024),
            Err(e) => info!("sd: probe failed: {:?}", e),
        }

        Self::new(sdcard, FixedTime)
    }
}

// volume -> root -> each dir of the path; body runs with the file's
// directory. change_dir closes the parent as it descends.
macro_rules! with_dir {
    ($sd:expr, $path:expr, |$dir:ident, $name:ident| $body:expr) => {{
        let (dirs, $name) = split_path($path)?;
        let volume = $sd
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| "open volume failed")?;
        let mut $dir = volume.open_root_dir().map_err(|_| "open root dir failed")?;
        for part in dir_parts(dirs) {
            $dir.change_dir(part).map_err(|_| "open dir failed")?;
        }
        $body
    }};
}

macro_rules! with_file {
    ($sd:expr, $path:expr, $mode:expr, |$file:ident| $body:expr) => {
        with_dir!($sd, $path, |dir, name| {
            let $file = dir
                .open_file_in_dir(name, $mode)
                .map_err(|_| "open file failed")?;
            $body
        })
    };
}

impl<D, T> SdStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub fn new(device: D, time: T) -> Self {
        Self {
            volume_mgr: VolumeManager::new(device, time),
        }
    }
}

impl<D, T> Storage for SdStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    type Handle = SdFile;

    fn open_read(&self, tag: &str, path: &str) -> Result<SdFile, &'static str> {
        let size = with_file!(self, path, Mode::ReadOnly, |file| file.length());
        debug!("sd: [{}] open {} ({} bytes)", tag, path, size);
        Ok(SdFile {
            path: path.to_string(),
            pos: 0,
            size,
        })
    }

    fn read(&self, handle: &mut SdFile, buf: &mut [u8]) -> Result<usize, &'static str> {
        if handle.pos >= handle.size || buf.is_empty() {
            return Ok(0);
        }
        let total = with_file!(self, &handle.path, Mode::ReadOnly, |file| {
            file.seek_from_start(handle.pos)
                .map_err(|_| "seek failed")?;
            let mut total = 0;
            while total < buf.len() && !file.is_eof() {
                let n = file.read(&mut buf[total..]).map_err(|_| "read failed")?;
                if n == 0 {
                    break;
                }
                total += n;
            }
            total
        });
        handle.pos += total as u32;
        Ok(total)
    }

    fn seek(&self, handle: &mut SdFile, pos: u32) -> Result<(), &'static str> {
        if pos > handle.size {
            return Err("seek failed");
        }
        handle.pos = pos;
        Ok(())
    }

    fn size(&self, handle: &SdFile) -> u32 {
        handle.size
    }

    fn close(&self, handle: SdFile) {
        debug!("sd: close {}", handle.path);
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), &'static str> {
        // ReadWriteCreateOrTruncate handles both creation and updates
        with_file!(self, path, Mode::ReadWriteCreateOrTruncate, |file| {
            if !data.is_empty() {
                file.write(data).map_err(|_| "write failed")?;
            }
            file.flush().map_err(|_| "flush failed")?;
        });
        Ok(())
    }

    fn append_file(&self, path: &str, data: &[u8]) -> Result<(), &'static str> {
        with_file!(self, path, Mode::ReadWriteCreateOrAppend, |file| {
            if !data.is_empty() {
                file.write(data).map_err(|_| "append write failed")?;
            }
            file.flush().map_err(|_| "append flush failed")?;
        });
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), &'static str> {
        with_dir!(self, path, |dir, name| {
            dir.delete_file_in_dir(name)
                .map_err(|_| "delete file failed")?;
        });
        debug!("sd: removed {}", path);
        Ok(())
    }
}
