// Static dither data: pattern grids, shift permutation and shift intervals.
//
// Every pattern is an 8x8 ordered-dither grid. A non-zero cell is painted
// opaque black, a zero cell is left transparent, so pattern N hides
// roughly (N + 1) / 8 of the screen's pixels.

use std::time::Duration;

pub const GRID_SIDE: usize = 8;
pub const GRID_SIZE: usize = GRID_SIDE * GRID_SIDE;

/// Pattern used when the stored id is missing or out of range.
pub const DEFAULT_PATTERN: i32 = 3;

/// Index into `SHIFT_TIMEOUTS_MS` used when no speed level is stored (5 min).
pub const DEFAULT_SHIFT_SPEED: i32 = 4;

#[rustfmt::skip]
pub const PATTERNS: [[u8; GRID_SIZE]; 7] = [
    // 12%
    [
        1, 0, 0, 0, 1, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 1, 0, 0, 0, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        1, 0, 0, 0, 1, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 1, 0, 0, 0, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 25%
    [
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 38%
    [
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 1, 0, 0, 0, 1, 0, 0,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 0, 0, 1, 0, 0, 0, 1,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 1, 0, 0, 0, 1, 0, 0,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 0, 0, 1, 0, 0, 0, 1,
    ],
    // 50%
    [
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 0, 1, 0, 1, 0, 1, 0,
        0, 1, 0, 1, 0, 1, 0, 1,
    ],
    // 62%
    [
        1, 1, 1, 0, 1, 1, 1, 0,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 0, 1, 1, 1, 0, 1, 1,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 1, 1, 0, 1, 1, 1, 0,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 0, 1, 1, 1, 0, 1, 1,
        0, 1, 0, 1, 0, 1, 0, 1,
    ],
    // 75%
    [
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 0, 1, 0, 1, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 0, 1, 0, 1, 0, 1,
    ],
    // 88%
    [
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 0, 1, 1, 1, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 1, 1, 0, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 0, 1, 1, 1, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 1, 1, 0, 1, 1, 1,
    ],
];

/// Order in which shift steps visit the grid. Consecutive steps land far
/// apart so the pattern never sweeps visibly in one direction.
#[rustfmt::skip]
pub const GRID_SHIFT: [u8; GRID_SIZE] = [
     0, 36,  4, 32, 18, 54, 22, 50,
     2, 38,  6, 34, 16, 52, 20, 48,
     9, 45, 13, 41, 27, 63, 31, 59,
    11, 47, 15, 43, 25, 61, 29, 57,
     1, 37,  5, 33, 19, 55, 23, 51,
     3, 39,  7, 35, 17, 53, 21, 49,
     8, 44, 12, 40, 26, 62, 30, 58,
    10, 46, 14, 42, 24, 60, 28, 56,
];

/// Shift interval per speed level, in milliseconds.
pub const SHIFT_TIMEOUTS_MS: [u64; 9] = [
    15 * 1000,
    30 * 1000,
    60 * 1000,
    2 * 60 * 1000,
    5 * 60 * 1000,
    10 * 60 * 1000,
    20 * 60 * 1000,
    30 * 60 * 1000,
    60 * 60 * 1000,
];

/// Resolve a stored pattern id, falling back to `DEFAULT_PATTERN` when it
/// does not name a pattern.
pub fn resolve_pattern(id: i32) -> usize {
    match usize::try_from(id) {
        Ok(idx) if idx < PATTERNS.len() => idx,
        _ => {
            tracing::warn!(pattern = id, "Unknown dither pattern, using default");
            DEFAULT_PATTERN as usize
        }
    }
}

pub fn pattern(id: i32) -> &'static [u8; GRID_SIZE] {
    &PATTERNS[resolve_pattern(id)]
}

/// Clamp a stored speed level into the valid range.
pub fn resolve_shift_speed(level: i32) -> usize {
    let max = SHIFT_TIMEOUTS_MS.len() - 1;
    let idx = usize::try_from(level).unwrap_or(0).min(max);
    if idx as i64 != level as i64 {
        tracing::warn!(level, clamped = idx, "Shift speed level out of range");
    }
    idx
}

pub fn shift_interval(level: i32) -> Duration {
    Duration::from_millis(SHIFT_TIMEOUTS_MS[resolve_shift_speed(level)])
}
