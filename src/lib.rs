//! Smart Pixels: dims the screen by overlaying a sparse black dither
//! pattern that shifts position over time, so no pixel stays dark for long.

pub mod compositor;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod patterns;
pub mod platform;
pub mod power;
pub mod renderer;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod tile;
pub mod watcher;
