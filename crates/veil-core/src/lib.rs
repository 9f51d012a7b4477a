//! Core types and traits shared by every Veil crate.
//!
//! Nothing in here talks to the OS. The embedding host and the capture
//! exclusion primitive are traits so the compositor can be driven by fakes
//! in tests and by native backends in the binary.

pub mod error;

use std::fmt;

pub use error::{ConcealError, HostError, PanelError};

// ──────────────────────────────────────────────
// Geometry
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

/// Stable, user-visible panel identifier (e.g. `"notes"`, `"panel-2"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(String);

impl PanelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PanelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque native window handle (HWND on Windows, window number on macOS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

// ──────────────────────────────────────────────
// Panel configuration
// ──────────────────────────────────────────────

/// How tall a panel wants to be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightSpec {
    /// Absolute height in logical pixels.
    Pixels(f32),
    /// Percentage of the viewport height (`50.0` = half the viewport).
    Percent(f32),
    /// No usable value was given; the planner substitutes its default.
    Default,
}

impl HeightSpec {
    /// Parse `"600"`, `"600px"` or `"50%"`. Returns `None` for anything else,
    /// including negative and non-finite numbers.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(pct) = text.strip_suffix('%') {
            let value: f32 = pct.trim().parse().ok()?;
            return (value.is_finite() && value >= 0.0).then_some(HeightSpec::Percent(value));
        }
        let px = text.strip_suffix("px").unwrap_or(text).trim();
        let value: f32 = px.parse().ok()?;
        (value.is_finite() && value >= 0.0).then_some(HeightSpec::Pixels(value))
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            HeightSpec::Pixels(v) | HeightSpec::Percent(v) => v.is_finite() && v >= 0.0,
            HeightSpec::Default => true,
        }
    }
}

impl fmt::Display for HeightSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeightSpec::Pixels(v) => write!(f, "{}px", v),
            HeightSpec::Percent(v) => write!(f, "{}%", v),
            HeightSpec::Default => f.write_str("default"),
        }
    }
}

/// Canonical description of one panel, after ingestion-time normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    pub id: PanelId,
    /// Opaque to the core: URL-vs-file resolution belongs to the host.
    pub source: String,
    pub height: HeightSpec,
    /// Position in the stack. `None` on insert means "append".
    pub order: Option<usize>,
    pub visible: bool,
}

impl PanelConfig {
    pub fn new(id: impl Into<PanelId>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            height: HeightSpec::Default,
            order: None,
            visible: true,
        }
    }

    pub fn with_height(mut self, height: HeightSpec) -> Self {
        self.height = height;
        self
    }

    pub fn at_order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

// ──────────────────────────────────────────────
// Layout types
// ──────────────────────────────────────────────

/// Vertical spacing used by the planner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapConfig {
    /// Space above the first visible panel.
    pub top: f32,
    /// Space between two consecutive visible panels.
    pub between: f32,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            top: 10.0,
            between: 20.0,
        }
    }
}

/// One row of a layout pass. Rebuilt on every pass, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub id: PanelId,
    /// Top edge in viewport coordinates, scroll offset already applied.
    pub y: f32,
    pub height: f32,
}

// ──────────────────────────────────────────────
// Trait: EmbeddingHost
// ──────────────────────────────────────────────

/// Creates and positions the native content surfaces (webviews) that back
/// each panel. The registry owns every surface exclusively.
pub trait EmbeddingHost {
    type Surface;

    fn create_surface(&mut self, id: &PanelId, source: &str) -> Result<Self::Surface, HostError>;
    fn set_bounds(&mut self, surface: &Self::Surface, bounds: Rect);
    /// Stop media, timers and anything else the surface holds. Called right
    /// before `destroy_surface`; failures are logged and ignored.
    fn release_surface(&mut self, surface: &mut Self::Surface) -> Result<(), HostError>;
    fn destroy_surface(&mut self, surface: Self::Surface);
}

// ──────────────────────────────────────────────
// Trait: CaptureExclusion
// ──────────────────────────────────────────────

/// OS primitive that hides a window from screen and video capture.
pub trait CaptureExclusion {
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle>;
    fn set_excluded(&mut self, window: WindowHandle) -> bool;
    fn clear_excluded(&mut self, window: WindowHandle) -> bool;
}

impl<P: CaptureExclusion + ?Sized> CaptureExclusion for Box<P> {
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle> {
        (**self).find_window_by_title(title)
    }

    fn set_excluded(&mut self, window: WindowHandle) -> bool {
        (**self).set_excluded(window)
    }

    fn clear_excluded(&mut self, window: WindowHandle) -> bool {
        (**self).clear_excluded(window)
    }
}
