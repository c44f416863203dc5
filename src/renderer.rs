// Dither renderer: toroidal shift of a pattern grid and painting into the
// overlay bitmap.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tiny_skia::{ColorU8, Pixmap, PremultipliedColorU8};

use crate::patterns::{self, GRID_SHIFT, GRID_SIDE, GRID_SIZE};

/// Row-major cell grid, `true` = opaque.
pub type Grid = [bool; GRID_SIZE];

/// Wall-clock milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Shift offset for the step that `now_ms` falls into.
pub fn shift_offset(now_ms: u64, interval: Duration) -> usize {
    let interval_ms = (interval.as_millis() as u64).max(1);
    let step = (now_ms / interval_ms) % GRID_SIZE as u64;
    GRID_SHIFT[step as usize] as usize
}

/// Shift offset for the current wall-clock time.
pub fn current_offset(interval: Duration) -> usize {
    shift_offset(now_ms(), interval)
}

/// Render a stored pattern id shifted by `offset`.
pub fn render(pattern_id: i32, offset: usize) -> Grid {
    render_cells(patterns::pattern(pattern_id), offset)
}

pub fn render_cells(cells: &[u8; GRID_SIZE], offset: usize) -> Grid {
    let mut grid = [false; GRID_SIZE];
    shift_into(cells, GRID_SIDE, offset, &mut grid);
    grid
}

/// Translate a `side` x `side` grid by `offset` on the torus: x moves by
/// `offset % side`, y by `offset / side`, both wrapping at the grid edge.
pub fn shift_into(cells: &[u8], side: usize, offset: usize, out: &mut [bool]) {
    debug_assert_eq!(cells.len(), side * side);
    debug_assert_eq!(out.len(), side * side);
    let shift_x = offset % side;
    let shift_y = offset / side;
    for (i, &cell) in cells.iter().enumerate() {
        let x = (i + shift_x) % side;
        let y = (i / side + shift_y) % side;
        out[y * side + x] = cell != 0;
    }
}

/// Write `grid` into the top-left `GRID_SIDE` square of `bitmap`.
pub fn paint(grid: &Grid, bitmap: &mut Pixmap) {
    let stride = bitmap.width() as usize;
    let rows = bitmap.height() as usize;
    let black = ColorU8::from_rgba(0, 0, 0, 255).premultiply();
    let pixels = bitmap.pixels_mut();

    for y in 0..GRID_SIDE.min(rows) {
        for x in 0..GRID_SIDE.min(stride) {
            pixels[y * stride + x] = if grid[y * GRID_SIDE + x] {
                black
            } else {
                PremultipliedColorU8::TRANSPARENT
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PATTERNS;

    #[rustfmt::skip]
    const CORNERS: [u8; 16] = [
        1, 0, 0, 1,
        0, 1, 1, 0,
        0, 1, 1, 0,
        1, 0, 0, 1,
    ];

    fn render_4x4(cells: &[u8; 16], offset: usize) -> [bool; 16] {
        let mut grid = [false; 16];
        shift_into(cells, 4, offset, &mut grid);
        grid
    }

    #[test]
    fn test_zero_offset_is_identity() {
        for id in 0..PATTERNS.len() as i32 {
            let grid = render(id, 0);
            for (i, &c) in PATTERNS[id as usize].iter().enumerate() {
                assert_eq!(grid[i], c != 0);
            }
        }

        let grid = render_4x4(&CORNERS, 0);
        for (i, &c) in CORNERS.iter().enumerate() {
            assert_eq!(grid[i], c != 0);
        }
    }

    #[test]
    fn test_offset_one_wraps_horizontally() {
        let mut cells = [0u8; GRID_SIZE];
        cells[0] = 1;
        cells[GRID_SIDE - 1] = 1;
        let grid = render_cells(&cells, 1);
        assert!(grid[1]);
        // Last cell of row 0 wraps to column 0.
        assert!(grid[0]);
        assert_eq!(grid.iter().filter(|&&c| c).count(), 2);

        let grid = render_4x4(&CORNERS, 1);
        // Cell 0 lands at (1, 0); cell 3 wraps to (0, 0).
        assert!(grid[1]);
        assert!(grid[0]);
        assert!(!grid[3]);
    }

    #[test]
    fn test_vertical_shift() {
        let mut cells = [0u8; GRID_SIZE];
        cells[0] = 1;
        let grid = render_cells(&cells, GRID_SIDE * 3 + 2);
        assert!(grid[3 * GRID_SIDE + 2]);
    }

    #[test]
    fn test_render_is_periodic() {
        for id in 0..PATTERNS.len() as i32 {
            for offset in [0, 1, 7, 9, 33, 63] {
                assert_eq!(render(id, offset), render(id, offset + GRID_SIZE));
            }
        }
    }

    #[test]
    fn test_shift_preserves_opaque_count() {
        for id in 0..PATTERNS.len() as i32 {
            let expected = render(id, 0).iter().filter(|&&c| c).count();
            for offset in 0..GRID_SIZE {
                assert_eq!(render(id, offset).iter().filter(|&&c| c).count(), expected);
            }
        }
    }

    #[test]
    fn test_shift_offset_walks_permutation() {
        let interval = Duration::from_secs(15);
        assert_eq!(shift_offset(0, interval), GRID_SHIFT[0] as usize);
        assert_eq!(shift_offset(14_999, interval), GRID_SHIFT[0] as usize);
        assert_eq!(shift_offset(15_000, interval), GRID_SHIFT[1] as usize);
        assert_eq!(
            shift_offset(15_000 * GRID_SIZE as u64, interval),
            GRID_SHIFT[0] as usize
        );
    }

    #[test]
    fn test_paint_writes_transparent_and_black() {
        let mut bitmap = Pixmap::new(GRID_SIDE as u32, GRID_SIDE as u32).unwrap();
        let grid = render(3, 0);
        paint(&grid, &mut bitmap);
        for y in 0..GRID_SIDE {
            for x in 0..GRID_SIDE {
                let px = bitmap.pixel(x as u32, y as u32).unwrap();
                if grid[y * GRID_SIDE + x] {
                    assert_eq!((px.red(), px.alpha()), (0, 255));
                } else {
                    assert_eq!(px.alpha(), 0);
                }
            }
        }
    }
}
