//! Headless embedding host: tracks surfaces and their bounds without a
//! windowing system. Used by the command driver and for smoke runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use veil_core::{EmbeddingHost, HostError, PanelId, Rect};

/// What a panel's content source points at.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// `http://` or `https://` page.
    Web(String),
    /// Local file. Relative `file://` paths resolve against the asset root.
    File(PathBuf),
    /// Built-in page served by Veil itself (`veil://<name>`).
    Builtin(String),
}

/// Classify `source`. Unknown schemes are rejected; bare strings are
/// treated as paths relative to `asset_root`.
pub fn classify_source(source: &str, asset_root: &Path) -> Result<SourceKind, HostError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(HostError("empty content source".to_string()));
    }

    let lower = source.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(SourceKind::Web(source.to_string()));
    }
    if let Some(name) = source.strip_prefix("veil://") {
        if name.is_empty() {
            return Err(HostError("builtin source without a name".to_string()));
        }
        return Ok(SourceKind::Builtin(name.to_string()));
    }
    if let Some(path) = source.strip_prefix("file://") {
        let path = Path::new(path);
        return Ok(SourceKind::File(if path.is_absolute() {
            path.to_path_buf()
        } else {
            asset_root.join(path)
        }));
    }
    if let Some((scheme, _)) = source.split_once("://") {
        return Err(HostError(format!("unsupported scheme {:?}", scheme)));
    }

    let path = Path::new(source);
    Ok(SourceKind::File(if path.is_absolute() {
        path.to_path_buf()
    } else {
        asset_root.join(path)
    }))
}

// ──────────────────────────────────────────────
// HeadlessHost
// ──────────────────────────────────────────────

#[derive(Debug)]
pub struct HeadlessSurface {
    id: u64,
    panel: PanelId,
    kind: SourceKind,
}

pub struct HeadlessHost {
    asset_root: PathBuf,
    next_id: u64,
    bounds: HashMap<u64, Rect>,
}

impl HeadlessHost {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            next_id: 0,
            bounds: HashMap::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.bounds.len()
    }

    /// Last bounds pushed for `surface`.
    pub fn bounds_of(&self, surface: &HeadlessSurface) -> Option<Rect> {
        self.bounds.get(&surface.id).copied()
    }
}

impl EmbeddingHost for HeadlessHost {
    type Surface = HeadlessSurface;

    fn create_surface(&mut self, id: &PanelId, source: &str) -> Result<HeadlessSurface, HostError> {
        let kind = classify_source(source, &self.asset_root)?;
        self.next_id += 1;
        let surface = HeadlessSurface {
            id: self.next_id,
            panel: id.clone(),
            kind,
        };
        self.bounds.insert(surface.id, Rect::new(0.0, 0.0, 0.0, 0.0));
        log::debug!("Surface #{} for {} -> {:?}", surface.id, id, surface.kind);
        Ok(surface)
    }

    fn set_bounds(&mut self, surface: &HeadlessSurface, bounds: Rect) {
        log::trace!(
            "Bounds #{} ({}): y={} h={}",
            surface.id,
            surface.panel,
            bounds.y,
            bounds.height
        );
        self.bounds.insert(surface.id, bounds);
    }

    fn release_surface(&mut self, surface: &mut HeadlessSurface) -> Result<(), HostError> {
        log::debug!("Releasing surface #{} ({})", surface.id, surface.panel);
        Ok(())
    }

    fn destroy_surface(&mut self, surface: HeadlessSurface) {
        self.bounds.remove(&surface.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn classifies_sources() {
        let root = Path::new("/opt/veil");
        assert_eq!(
            classify_source("https://example.com", root),
            Ok(SourceKind::Web("https://example.com".to_string()))
        );
        assert_eq!(
            classify_source("veil://placeholder", root),
            Ok(SourceKind::Builtin("placeholder".to_string()))
        );
        assert_eq!(
            classify_source("file://pages/notes/index.html", root),
            Ok(SourceKind::File(PathBuf::from("/opt/veil/pages/notes/index.html")))
        );
        assert_eq!(
            classify_source("file:///tmp/a.html", root),
            Ok(SourceKind::File(PathBuf::from("/tmp/a.html")))
        );
        assert!(classify_source("ftp://example.com", root).is_err());
        assert!(classify_source("  ", root).is_err());
    }

    #[test]
    fn host_tracks_surface_lifecycle() {
        let mut host = HeadlessHost::new("/opt/veil");
        let mut surface = host
            .create_surface(&PanelId::from("a"), "https://a.example")
            .unwrap();
        assert_eq!(host.live_count(), 1);

        let rect = Rect::new(0.0, 10.0, 400.0, 300.0);
        host.set_bounds(&surface, rect);
        assert_eq!(host.bounds_of(&surface), Some(rect));

        host.release_surface(&mut surface).unwrap();
        host.destroy_surface(surface);
        assert_eq!(host.live_count(), 0);
    }

    #[test]
    fn host_rejects_unknown_scheme() {
        let mut host = HeadlessHost::new("/opt/veil");
        assert!(host
            .create_surface(&PanelId::from("a"), "gopher://old.example")
            .is_err());
        assert_eq!(host.live_count(), 0);
    }
}
