// Native backends

#[cfg(not(windows))]
pub mod desktop;
#[cfg(target_os = "linux")]
pub mod fbdev;
#[cfg(windows)]
pub mod windows;
