// Overlay lifecycle: owns the dither bitmap and the compositor surface.
//
// The surface is recreated from scratch on every start; nothing survives a
// stop. Every start and stop bumps a generation counter so timer firings
// issued for an earlier run can recognise themselves as stale.

use tiny_skia::Pixmap;

use crate::compositor::{Compositor, Geometry, SurfaceFlags, SurfaceId, SurfaceSpec};
use crate::error::CompositorError;
use crate::patterns::{self, GRID_SIDE, PATTERNS};
use crate::renderer;

struct ActiveOverlay {
    surface: SurfaceId,
    bitmap: Pixmap,
    geometry: Geometry,
}

pub struct OverlayLifecycle<C: Compositor> {
    compositor: C,
    /// Index into `PATTERNS`, resolved once when the id is set
    pattern: usize,
    active: Option<ActiveOverlay>,
    generation: u64,
}

impl<C: Compositor> OverlayLifecycle<C> {
    pub fn new(compositor: C, pattern_id: i32) -> Self {
        Self {
            compositor,
            pattern: patterns::resolve_pattern(pattern_id),
            active: None,
            generation: 0,
        }
    }

    /// Pattern used by the next start. A running overlay keeps its pattern.
    pub fn set_pattern(&mut self, pattern_id: i32) {
        self.pattern = patterns::resolve_pattern(pattern_id);
    }

    pub fn pattern(&self) -> usize {
        self.pattern
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.active.as_ref().map(|a| a.geometry)
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.active.as_ref().map(|a| a.surface)
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    /// Allocate the bitmap, render the pattern at `offset` and attach the
    /// surface. Returns `Ok(false)` when already started.
    ///
    /// If the compositor refuses the surface the overlay stays stopped.
    pub fn start(&mut self, offset: usize) -> Result<bool, CompositorError> {
        if self.active.is_some() {
            return Ok(false);
        }
        self.generation += 1;

        let metrics = self.compositor.display_metrics()?;
        let mut bitmap = Pixmap::new(GRID_SIDE as u32, GRID_SIDE as u32).ok_or(
            CompositorError::Bitmap {
                width: GRID_SIDE as u32,
                height: GRID_SIDE as u32,
            },
        )?;
        renderer::paint(&renderer::render_cells(&PATTERNS[self.pattern], offset), &mut bitmap);

        let geometry = Geometry::covering(metrics);
        let spec = SurfaceSpec {
            geometry,
            flags: SurfaceFlags::OVERLAY,
        };
        let surface = self.compositor.attach(&spec, &bitmap)?;

        tracing::info!(
            pattern = self.pattern,
            generation = self.generation,
            width = geometry.width,
            height = geometry.height,
            "Overlay started"
        );
        self.active = Some(ActiveOverlay {
            surface,
            bitmap,
            geometry,
        });
        Ok(true)
    }

    /// Detach the surface and release the bitmap. Returns false when not started.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        self.generation += 1;
        self.compositor.detach(active.surface);
        tracing::info!(generation = self.generation, "Overlay stopped");
        true
    }

    /// Recompute geometry for the current display (rotation, resolution
    /// change) and update the surface in place.
    pub fn on_configuration_changed(&mut self) -> Result<(), CompositorError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let geometry = Geometry::covering(self.compositor.display_metrics()?);
        if geometry == active.geometry {
            return Ok(());
        }
        self.compositor.update_layout(active.surface, geometry)?;
        tracing::debug!(?geometry, "Overlay layout updated");
        active.geometry = geometry;
        Ok(())
    }

    /// Re-render the existing bitmap at `offset` and redraw. Returns false
    /// without touching anything when the overlay is stopped.
    pub fn repaint(&mut self, offset: usize) -> Result<bool, CompositorError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };
        let grid = renderer::render_cells(&PATTERNS[self.pattern], offset);
        renderer::paint(&grid, &mut active.bitmap);
        self.compositor.redraw(active.surface, &active.bitmap)?;
        Ok(true)
    }
}
