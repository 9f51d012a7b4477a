//! Platform layer for Veil.
//!
//! Provides the OS capture-exclusion primitive for the current target and a
//! headless embedding host. macOS goes through `objc2-app-kit`, Windows
//! through `windows-sys`; other targets report exclusion as unavailable.

pub mod host;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(windows)]
pub mod windows;

pub use host::{classify_source, HeadlessHost, HeadlessSurface, SourceKind};

use veil_core::{CaptureExclusion, WindowHandle};

// ──────────────────────────────────────────────
// Capture exclusion
// ──────────────────────────────────────────────

#[cfg(target_os = "macos")]
pub type NativeExclusion = macos::MacosExclusion;

#[cfg(windows)]
pub type NativeExclusion = windows::Win32Exclusion;

#[cfg(not(any(target_os = "macos", windows)))]
pub type NativeExclusion = NoExclusion;

/// Uninhabited primitive for targets without capture exclusion. A
/// `ConcealmentManager<NoExclusion>` is always in the unavailable state.
pub enum NoExclusion {}

impl CaptureExclusion for NoExclusion {
    fn find_window_by_title(&self, _title: &str) -> Option<WindowHandle> {
        match *self {}
    }

    fn set_excluded(&mut self, _window: WindowHandle) -> bool {
        match *self {}
    }

    fn clear_excluded(&mut self, _window: WindowHandle) -> bool {
        match *self {}
    }
}

/// The exclusion primitive for this platform, or `None` when the OS (or the
/// calling thread) cannot provide one.
pub fn capture_exclusion() -> Option<NativeExclusion> {
    #[cfg(target_os = "macos")]
    {
        macos::MacosExclusion::new()
    }
    #[cfg(windows)]
    {
        Some(windows::Win32Exclusion::new())
    }
    #[cfg(not(any(target_os = "macos", windows)))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(any(target_os = "macos", windows)))]
    #[test]
    fn no_primitive_off_desktop_targets() {
        assert!(capture_exclusion().is_none());
    }
}
