// Geometry planner: stacks panels vertically inside the host window.
// Pure and deterministic; the compositor calls it after every registry
// mutation, scroll tick, page tick and resize.


use veil_core::{GapConfig, HeightSpec, LayoutEntry, PanelConfig, Rect, Size};

/// Height used when a panel has no usable height spec.
pub const DEFAULT_PANEL_HEIGHT: f32 = 100.0;

// ──────────────────────────────────────────────
// LayoutPlan
// ──────────────────────────────────────────────

/// Result of one planning pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutPlan {
    /// One entry per panel, in registry order (hidden panels included with
    /// zero height).
    pub entries: Vec<LayoutEntry>,
    /// Top gap + visible heights + gaps between visible panels.
    pub content_extent: f32,
    /// How far the stack can be scrolled: `max(0, extent - viewport)`.
    pub max_scroll: f32,
    /// Scroll distance (positive, ascending) that brings each visible panel
    /// to the top gap. Clamped to `max_scroll`, and the last stop is always
    /// `max_scroll` so paging can reach the bottom of the stack.
    pub page_stops: Vec<f32>,
}

// ──────────────────────────────────────────────
// Planner
// ──────────────────────────────────────────────

/// Resolve a height spec against the viewport height. Results are rounded to
/// whole pixels and never negative.
pub fn resolve_height(spec: HeightSpec, viewport_height: f32) -> f32 {
    match spec {
        HeightSpec::Pixels(px) if px.is_finite() => px.round().max(0.0),
        HeightSpec::Percent(pct) if pct.is_finite() => {
            (pct / 100.0 * viewport_height).round().max(0.0)
        }
        _ => DEFAULT_PANEL_HEIGHT,
    }
}

/// Lay out `panels` (already in display order) for the given viewport.
///
/// `scroll_offset` is added to every `y`, so all panels move together. With
/// the Veil sign convention the offset lives in `[-max_scroll, 0]`.
pub fn compute<'a, I>(viewport: Size, panels: I, scroll_offset: f32, gaps: GapConfig) -> LayoutPlan
where
    I: IntoIterator<Item = &'a PanelConfig>,
{
    let mut entries = Vec::new();
    let mut cursor = gaps.top;
    let mut placed = 0usize;
    let mut tops = Vec::new();

    for panel in panels {
        if !panel.visible {
            entries.push(LayoutEntry {
                id: panel.id.clone(),
                y: cursor + scroll_offset,
                height: 0.0,
            });
            continue;
        }

        if placed > 0 {
            cursor += gaps.between;
        }
        let height = resolve_height(panel.height, viewport.height);
        tops.push(cursor - gaps.top);
        entries.push(LayoutEntry {
            id: panel.id.clone(),
            y: cursor + scroll_offset,
            height,
        });
        cursor += height;
        placed += 1;
    }

    let content_extent = if placed == 0 { 0.0 } else { cursor };
    let max_scroll = (content_extent - viewport.height).max(0.0);

    LayoutPlan {
        entries,
        content_extent,
        max_scroll,
        page_stops: page_stops(tops, max_scroll),
    }
}

fn page_stops(tops: Vec<f32>, max_scroll: f32) -> Vec<f32> {
    let mut stops: Vec<f32> = Vec::with_capacity(tops.len());
    for top in tops {
        let stop = top.min(max_scroll);
        if stops.last() != Some(&stop) {
            stops.push(stop);
        }
    }
    if let Some(last) = stops.last_mut() {
        *last = max_scroll;
    }
    stops
}

/// Full host rectangle for an entry: panels always span the viewport width.
pub fn bounds(entry: &LayoutEntry, viewport: Size) -> Rect {
    Rect::new(0.0, entry.y, viewport.width, entry.height)
}
