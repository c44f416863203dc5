// Linux framebuffer output: darkens the pixels the overlay covers directly
// in /dev/fb0 and puts the original contents back on detach.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tiny_skia::Pixmap;

use crate::compositor::{DisplayMetrics, FrameSink};
use crate::error::CompositorError;

pub const FB_SYSFS_DIR: &str = "/sys/class/graphics/fb0";
pub const FB_DEVICE: &str = "/dev/fb0";

/// Only 32-bit XRGB/ARGB framebuffers are handled
const BYTES_PER_PIXEL: usize = 4;

pub struct FbDevice {
    device: PathBuf,
    metrics: DisplayMetrics,
    stride: usize,
    /// Screen contents before the first frame was presented
    snapshot: Option<Vec<u8>>,
}

fn read_sysfs(dir: &Path, name: &str) -> Result<String, CompositorError> {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .map(|raw| raw.trim().to_string())
        .map_err(|source| CompositorError::Framebuffer { path, source })
}

fn invalid(path: PathBuf, what: &str) -> CompositorError {
    CompositorError::Framebuffer {
        path,
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, what.to_string()),
    }
}

impl FbDevice {
    /// Describe the framebuffer from its sysfs directory and check the
    /// device node can be written.
    pub fn open(
        sysfs_dir: impl AsRef<Path>,
        device: impl Into<PathBuf>,
    ) -> Result<Self, CompositorError> {
        let dir = sysfs_dir.as_ref();
        let device = device.into();

        let metrics = DisplayMetrics::from_sysfs(dir.join("virtual_size"))
            .ok_or_else(|| invalid(dir.join("virtual_size"), "expected \"width,height\""))?;
        let bpp: u32 = read_sysfs(dir, "bits_per_pixel")?
            .parse()
            .map_err(|_| invalid(dir.join("bits_per_pixel"), "not a number"))?;
        if bpp as usize != BYTES_PER_PIXEL * 8 {
            return Err(CompositorError::PixelFormat(bpp));
        }
        let stride: usize = read_sysfs(dir, "stride")?
            .parse()
            .map_err(|_| invalid(dir.join("stride"), "not a number"))?;
        if stride < metrics.width as usize * BYTES_PER_PIXEL {
            return Err(invalid(dir.join("stride"), "shorter than one row"));
        }

        OpenOptions::new()
            .write(true)
            .open(&device)
            .map_err(|source| CompositorError::Framebuffer {
                path: device.clone(),
                source,
            })?;

        tracing::debug!(
            device = %device.display(),
            width = metrics.width,
            height = metrics.height,
            stride,
            "Framebuffer opened"
        );
        Ok(Self {
            device,
            metrics,
            stride,
            snapshot: None,
        })
    }

    pub fn metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    fn frame_len(&self) -> usize {
        self.stride * self.metrics.height as usize
    }

    fn snapshot(&mut self) -> Result<Vec<u8>, CompositorError> {
        if let Some(snapshot) = &self.snapshot {
            return Ok(snapshot.clone());
        }
        let mut contents =
            fs::read(&self.device).map_err(|source| CompositorError::Framebuffer {
                path: self.device.clone(),
                source,
            })?;
        contents.resize(self.frame_len(), 0);
        self.snapshot = Some(contents.clone());
        Ok(contents)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), CompositorError> {
        let result = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .and_then(|mut file| file.write_all(bytes));
        result.map_err(|source| CompositorError::Framebuffer {
            path: self.device.clone(),
            source,
        })
    }
}

/// Black out every pixel of `frame` that is opaque, leaving the rest of
/// `screen` untouched. `screen` rows are `stride` bytes, BGRX order.
pub fn darken(screen: &mut [u8], stride: usize, frame: &Pixmap) {
    let width = frame.width() as usize;
    for (i, px) in frame.pixels().iter().enumerate() {
        if px.alpha() != 255 {
            continue;
        }
        let at = (i / width) * stride + (i % width) * BYTES_PER_PIXEL;
        if let Some(bgr) = screen.get_mut(at..at + 3) {
            bgr.fill(0);
        }
    }
}

impl FrameSink for FbDevice {
    fn present(&mut self, frame: &Pixmap) -> Result<(), CompositorError> {
        let mut screen = self.snapshot()?;
        darken(&mut screen, self.stride, frame);
        self.write(&screen)
    }

    fn restore(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        if let Err(e) = self.write(&snapshot) {
            tracing::warn!(error = %e, "Could not restore framebuffer contents");
        }
    }
}
