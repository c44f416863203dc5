// Compositor abstraction for the overlay surface
//
// A backend accepts a surface description plus a small bitmap that it
// tiles across the surface, and shows it above all other content.

use std::collections::HashMap;
use std::path::Path;

use tiny_skia::{FilterQuality, Paint, Pattern, Pixmap, Rect, SpreadMode, Transform};

use crate::error::CompositorError;

pub type SurfaceId = u64;

/// Real size of the default display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    /// Height of the system status bar / caption, used as the coverage margin
    pub status_bar_height: u32,
}

impl DisplayMetrics {
    /// Read the display size from a sysfs `virtual_size` file. There is no
    /// status bar on a bare framebuffer, so the margin is zero.
    pub fn from_sysfs(path: impl AsRef<Path>) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        let (w, h) = raw.trim().split_once(',')?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            status_bar_height: 0,
        })
    }
}

/// Position and size of the overlay surface in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    /// Geometry covering the whole display plus a status-bar-sized margin on
    /// every edge, so areas the compositor insets are still dimmed.
    pub fn covering(metrics: DisplayMetrics) -> Self {
        let margin = metrics.status_bar_height;
        Self {
            x: -(margin as i32),
            y: -(margin as i32),
            width: metrics.width + margin * 2,
            height: metrics.height + margin * 2,
        }
    }
}

/// Window behaviour requested for the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFlags {
    pub focusable: bool,
    pub touchable: bool,
    pub show_when_locked: bool,
    /// May extend into system-reserved areas (status bar, cutouts, overscan)
    pub layout_no_limits: bool,
    pub filter_bitmap: bool,
    pub anti_alias: bool,
    /// Repeat the bitmap horizontally and vertically
    pub tiled: bool,
}

impl SurfaceFlags {
    pub const OVERLAY: Self = Self {
        focusable: false,
        touchable: false,
        show_when_locked: true,
        layout_no_limits: true,
        filter_bitmap: false,
        anti_alias: false,
        tiled: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub geometry: Geometry,
    pub flags: SurfaceFlags,
}

/// Trait that every compositor backend implements
pub trait Compositor {
    fn display_metrics(&self) -> Result<DisplayMetrics, CompositorError>;

    /// Show a new surface filled with `tile`
    fn attach(&mut self, spec: &SurfaceSpec, tile: &Pixmap) -> Result<SurfaceId, CompositorError>;

    /// Move/resize an attached surface in place
    fn update_layout(&mut self, surface: SurfaceId, geometry: Geometry)
        -> Result<(), CompositorError>;

    /// Replace the surface's tile contents and redraw it
    fn redraw(&mut self, surface: SurfaceId, tile: &Pixmap) -> Result<(), CompositorError>;

    fn detach(&mut self, surface: SurfaceId);
}

/// Output for composed frames
pub trait FrameSink {
    fn present(&mut self, frame: &Pixmap) -> Result<(), CompositorError>;

    /// Put back whatever was on screen before the first frame
    fn restore(&mut self);
}

/// Call counters, handy for asserting lifecycle behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub attaches: u32,
    pub detaches: u32,
    pub layouts: u32,
    pub redraws: u32,
}

struct Surface {
    spec: SurfaceSpec,
    tile: Pixmap,
}

/// Compositor that keeps surfaces in memory, composes them into a
/// full-display frame and hands each frame to a `FrameSink`. Without a sink
/// nothing reaches the screen.
pub struct FramebufferCompositor {
    metrics: Option<DisplayMetrics>,
    refuse_attach: Option<String>,
    next_id: SurfaceId,
    surfaces: HashMap<SurfaceId, Surface>,
    sink: Option<Box<dyn FrameSink>>,
    stats: CompositorStats,
}

impl FramebufferCompositor {
    pub fn new(metrics: DisplayMetrics) -> Self {
        Self {
            metrics: Some(metrics),
            refuse_attach: None,
            next_id: 1,
            surfaces: HashMap::new(),
            sink: None,
            stats: CompositorStats::default(),
        }
    }

    /// Compositor that presents every change to `sink`
    pub fn with_sink(metrics: DisplayMetrics, sink: impl FrameSink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            ..Self::new(metrics)
        }
    }

    /// A compositor with no display attached
    pub fn without_display() -> Self {
        Self {
            metrics: None,
            ..Self::new(DisplayMetrics {
                width: 0,
                height: 0,
                status_bar_height: 0,
            })
        }
    }

    /// Make subsequent attaches fail, as when the overlay permission is missing
    pub fn refuse_attach(&mut self, reason: impl Into<String>) {
        self.refuse_attach = Some(reason.into());
    }

    /// Simulate a rotation or resolution change
    pub fn set_metrics(&mut self, metrics: DisplayMetrics) {
        self.metrics = Some(metrics);
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn spec(&self, surface: SurfaceId) -> Option<SurfaceSpec> {
        self.surfaces.get(&surface).map(|s| s.spec)
    }

    pub fn tile(&self, surface: SurfaceId) -> Option<&Pixmap> {
        self.surfaces.get(&surface).map(|s| &s.tile)
    }

    /// Render `surface` over a transparent display-sized frame
    pub fn compose(&self, surface: SurfaceId) -> Option<Pixmap> {
        let metrics = self.metrics?;
        let surface = self.surfaces.get(&surface)?;
        let g = surface.spec.geometry;
        let flags = surface.spec.flags;

        let mut frame = Pixmap::new(metrics.width, metrics.height)?;
        let quality = if flags.filter_bitmap {
            FilterQuality::Bilinear
        } else {
            FilterQuality::Nearest
        };
        let spread = if flags.tiled {
            SpreadMode::Repeat
        } else {
            SpreadMode::Pad
        };
        let shader = Pattern::new(
            surface.tile.as_ref(),
            spread,
            quality,
            1.0,
            Transform::from_translate(g.x as f32, g.y as f32),
        );
        let paint = Paint {
            shader,
            anti_alias: flags.anti_alias,
            ..Paint::default()
        };
        let rect = Rect::from_xywh(g.x as f32, g.y as f32, g.width as f32, g.height as f32)?;
        frame.fill_rect(rect, &paint, Transform::identity(), None);
        Some(frame)
    }

    fn present(&mut self, surface: SurfaceId) -> Result<(), CompositorError> {
        if self.sink.is_none() {
            return Ok(());
        }
        let metrics = self.display_metrics()?;
        let frame = self.compose(surface).ok_or(CompositorError::Bitmap {
            width: metrics.width,
            height: metrics.height,
        })?;
        match self.sink.as_mut() {
            Some(sink) => sink.present(&frame),
            None => Ok(()),
        }
    }
}

impl Compositor for FramebufferCompositor {
    fn display_metrics(&self) -> Result<DisplayMetrics, CompositorError> {
        self.metrics.ok_or(CompositorError::NoDisplay)
    }

    fn attach(&mut self, spec: &SurfaceSpec, tile: &Pixmap) -> Result<SurfaceId, CompositorError> {
        if self.metrics.is_none() {
            return Err(CompositorError::NoDisplay);
        }
        if let Some(reason) = &self.refuse_attach {
            return Err(CompositorError::AttachRefused(reason.clone()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.surfaces.insert(
            id,
            Surface {
                spec: *spec,
                tile: tile.clone(),
            },
        );
        if let Err(e) = self.present(id) {
            self.surfaces.remove(&id);
            return Err(e);
        }
        self.stats.attaches += 1;
        tracing::debug!(surface = id, geometry = ?spec.geometry, "Surface attached");
        Ok(id)
    }

    fn update_layout(
        &mut self,
        surface: SurfaceId,
        geometry: Geometry,
    ) -> Result<(), CompositorError> {
        let entry = self
            .surfaces
            .get_mut(&surface)
            .ok_or(CompositorError::UnknownSurface(surface))?;
        entry.spec.geometry = geometry;
        self.stats.layouts += 1;
        self.present(surface)
    }

    fn redraw(&mut self, surface: SurfaceId, tile: &Pixmap) -> Result<(), CompositorError> {
        let entry = self
            .surfaces
            .get_mut(&surface)
            .ok_or(CompositorError::UnknownSurface(surface))?;
        entry.tile = tile.clone();
        self.stats.redraws += 1;
        self.present(surface)
    }

    fn detach(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_some() {
            if let Some(sink) = self.sink.as_mut() {
                sink.restore();
            }
            self.stats.detaches += 1;
            tracing::debug!(surface, "Surface detached");
        }
    }
}
