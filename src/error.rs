// Error types for settings, compositor and service hosting

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading, writing or watching the settings store
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write settings file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to create settings directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize settings watcher")]
    InitWatcher(#[source] notify::Error),

    #[error("failed to watch path {path}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Errors raised by a compositor backend
#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("no display available")]
    NoDisplay,

    #[error("compositor refused the overlay surface: {0}")]
    AttachRefused(String),

    #[error("unknown surface {0}")]
    UnknownSurface(u64),

    #[error("failed to allocate a {width}x{height} bitmap")]
    Bitmap { width: u32, height: u32 },

    #[error("compositor call failed: {0}")]
    Backend(String),

    #[error("framebuffer {path} is not usable")]
    Framebuffer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported framebuffer depth: {0} bits per pixel")]
    PixelFormat(u32),
}

/// Errors starting or stopping the overlay service
#[derive(Debug, Error)]
pub enum HostError {
    #[error("overlay service failed to start")]
    Start(#[from] CompositorError),

    #[error("overlay service is not available: {0}")]
    Unavailable(String),
}
