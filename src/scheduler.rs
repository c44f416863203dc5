// Shift scheduler: a self re-arming deferred task that moves the dither
// pattern one step every interval.
//
// Each armed firing carries the overlay generation it was armed for. A
// firing whose generation no longer matches (the overlay was stopped or
// restarted in between) does nothing and is not re-armed, so stopping
// never has to cancel anything.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::compositor::Compositor;
use crate::overlay::OverlayLifecycle;
use crate::renderer;

/// One pending firing of the shift task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Deferred delivery of a `Tick` back onto the callback thread
pub trait Timer {
    fn arm(&mut self, delay: Duration, tick: Tick);

    /// Drop whatever is pending. Optional; stale ticks are harmless.
    fn cancel(&mut self) {}
}

/// What a firing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    /// Superseded generation or stopped overlay; not re-armed
    Stale,
    /// Display asleep; re-armed without repainting
    Idle,
    /// Repainted at `offset` and re-armed
    Shifted { offset: usize },
}

pub struct ShiftScheduler {
    interval: Duration,
}

impl ShiftScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the first firing for the overlay's current generation
    pub fn arm<C: Compositor>(&self, overlay: &OverlayLifecycle<C>, timer: &mut dyn Timer) {
        timer.arm(
            self.interval,
            Tick {
                generation: overlay.generation(),
            },
        );
    }

    pub fn on_fire<C: Compositor>(
        &self,
        tick: Tick,
        overlay: &mut OverlayLifecycle<C>,
        interactive: bool,
        now_ms: u64,
        timer: &mut dyn Timer,
    ) -> Firing {
        if !overlay.is_started() || tick.generation != overlay.generation() {
            tracing::debug!(
                tick = tick.generation,
                current = overlay.generation(),
                "Dropping stale shift tick"
            );
            return Firing::Stale;
        }

        let firing = if interactive {
            let offset = renderer::shift_offset(now_ms, self.interval);
            if let Err(e) = overlay.repaint(offset) {
                tracing::warn!(error = %e, "Overlay repaint failed");
            }
            Firing::Shifted { offset }
        } else {
            Firing::Idle
        };

        timer.arm(self.interval, tick);
        firing
    }
}

/// Timer backed by tokio sleeps; fired ticks are sent into the event loop
pub struct TokioTimer<E> {
    tx: UnboundedSender<E>,
    pending: Option<JoinHandle<()>>,
}

impl<E> TokioTimer<E> {
    pub fn new(tx: UnboundedSender<E>) -> Self {
        Self { tx, pending: None }
    }
}

impl<E: From<Tick> + Send + 'static> Timer for TokioTimer<E> {
    fn arm(&mut self, delay: Duration, tick: Tick) {
        self.cancel();
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(E::from(tick));
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// Timer that only records what was armed; the caller fires ticks by hand
#[derive(Debug, Default)]
pub struct ManualTimer {
    armed: Vec<(Duration, Tick)>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.armed.len()
    }

    /// Take the oldest armed firing
    pub fn take_next(&mut self) -> Option<(Duration, Tick)> {
        if self.armed.is_empty() {
            None
        } else {
            Some(self.armed.remove(0))
        }
    }
}

impl Timer for ManualTimer {
    fn arm(&mut self, delay: Duration, tick: Tick) {
        self.armed.push((delay, tick));
    }

    fn cancel(&mut self) {
        self.armed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{DisplayMetrics, FramebufferCompositor};
    use crate::patterns::GRID_SHIFT;
    use tokio::sync::mpsc;

    const METRICS: DisplayMetrics = DisplayMetrics {
        width: 16,
        height: 16,
        status_bar_height: 2,
    };

    fn started() -> OverlayLifecycle<FramebufferCompositor> {
        let mut overlay = OverlayLifecycle::new(FramebufferCompositor::new(METRICS), 3);
        overlay.start(0).unwrap();
        overlay
    }

    #[test]
    fn test_firing_repaints_and_rearms() {
        let scheduler = ShiftScheduler::new(Duration::from_secs(15));
        let mut overlay = started();
        let mut timer = ManualTimer::new();
        scheduler.arm(&overlay, &mut timer);

        let (delay, tick) = timer.take_next().unwrap();
        assert_eq!(delay, Duration::from_secs(15));
        let firing = scheduler.on_fire(tick, &mut overlay, true, 15_000, &mut timer);
        assert_eq!(
            firing,
            Firing::Shifted {
                offset: GRID_SHIFT[1] as usize
            }
        );
        assert_eq!(overlay.compositor().stats().redraws, 1);
        assert_eq!(timer.pending(), 1);
    }

    #[test]
    fn test_sleeping_display_rearms_without_repaint() {
        let scheduler = ShiftScheduler::new(Duration::from_secs(15));
        let mut overlay = started();
        let mut timer = ManualTimer::new();
        scheduler.arm(&overlay, &mut timer);

        let (_, tick) = timer.take_next().unwrap();
        let firing = scheduler.on_fire(tick, &mut overlay, false, 15_000, &mut timer);
        assert_eq!(firing, Firing::Idle);
        assert_eq!(overlay.compositor().stats().redraws, 0);
        assert_eq!(timer.pending(), 1);
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let scheduler = ShiftScheduler::new(Duration::from_secs(15));
        let mut overlay = started();
        let mut timer = ManualTimer::new();
        scheduler.arm(&overlay, &mut timer);
        let (_, old_tick) = timer.take_next().unwrap();

        overlay.stop();
        overlay.start(0).unwrap();

        let firing = scheduler.on_fire(old_tick, &mut overlay, true, 15_000, &mut timer);
        assert_eq!(firing, Firing::Stale);
        assert_eq!(overlay.compositor().stats().redraws, 0);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_firing_after_stop_is_dropped() {
        let scheduler = ShiftScheduler::new(Duration::from_secs(15));
        let mut overlay = started();
        let mut timer = ManualTimer::new();
        scheduler.arm(&overlay, &mut timer);
        let (_, tick) = timer.take_next().unwrap();

        overlay.stop();
        let firing = scheduler.on_fire(tick, &mut overlay, true, 15_000, &mut timer);
        assert_eq!(firing, Firing::Stale);
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_delivers_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Tick>();
        let mut timer = TokioTimer::new(tx);
        timer.arm(Duration::from_secs(60), Tick { generation: 7 });

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().unwrap(), Tick { generation: 7 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Tick>();
        let mut timer = TokioTimer::new(tx);
        timer.arm(Duration::from_secs(1), Tick { generation: 1 });
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
