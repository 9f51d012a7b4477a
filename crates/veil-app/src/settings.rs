// Settings persistence: one JSON file in the platform config dir, e.g.
// ~/Library/Application Support/veil/settings.json on macOS,
// ~/.config/veil/settings.json on Linux.
//
// Loading never fails: a missing file yields defaults silently, a corrupt
// one yields defaults with a warning.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use veil_core::{GapConfig, HeightSpec, PanelConfig, PanelId};

pub const DEFAULT_SCROLL_SPEED: f32 = 100.0;
/// Tray-menu presets: slow, normal, fast.
pub const SCROLL_SPEED_PRESETS: [f32; 3] = [50.0, 100.0, 200.0];
/// Shown when no panels are configured.
pub const PLACEHOLDER_SOURCE: &str = "veil://placeholder";
pub const PLACEHOLDER_ID: &str = "placeholder";

// ──────────────────────────────────────────────
// Settings model
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_scroll_speed")]
    pub scroll_speed: f32,
    #[serde(default = "default_panels")]
    pub panels: Vec<PanelEntry>,
    #[serde(default)]
    pub concealment: ConcealmentSettings,
    /// Panel that can never be removed at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected_panel: Option<String>,
    #[serde(default)]
    pub layout: LayoutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scroll_speed: DEFAULT_SCROLL_SPEED,
            panels: default_panels(),
            concealment: ConcealmentSettings::default(),
            protected_panel: None,
            layout: LayoutSettings::default(),
        }
    }
}

fn default_scroll_speed() -> f32 {
    DEFAULT_SCROLL_SPEED
}

fn default_panels() -> Vec<PanelEntry> {
    [
        "https://www.google.com",
        "https://www.github.com",
        "https://www.stackoverflow.com",
    ]
    .iter()
    .map(|url| PanelEntry::Source(url.to_string()))
    .collect()
}

fn default_true() -> bool {
    true
}

/// A configured panel: either a bare source string or a full object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PanelEntry {
    Source(String),
    Full(PanelSpec),
    /// Anything else; skipped with a warning during normalization.
    Invalid(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "url")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<HeightValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// Height as written by the user: `600`, `"600px"`, `"50%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeightValue {
    Pixels(f64),
    Text(String),
    Other(serde_json::Value),
}

impl HeightValue {
    fn to_spec(&self) -> Option<HeightSpec> {
        match self {
            HeightValue::Pixels(px) if px.is_finite() && *px >= 0.0 => {
                Some(HeightSpec::Pixels(*px as f32))
            }
            HeightValue::Pixels(_) => None,
            HeightValue::Text(text) => HeightSpec::parse(text),
            HeightValue::Other(_) => None,
        }
    }

    fn from_spec(spec: HeightSpec) -> Option<Self> {
        match spec {
            HeightSpec::Pixels(px) => Some(HeightValue::Pixels(px as f64)),
            HeightSpec::Percent(pct) => Some(HeightValue::Text(format!("{}%", pct))),
            HeightSpec::Default => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcealmentSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Conceal the windows below right after startup.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default = "default_windows")]
    pub windows: Vec<String>,
}

impl Default for ConcealmentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_start: true,
            windows: default_windows(),
        }
    }
}

fn default_windows() -> Vec<String> {
    vec!["Veil".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    #[serde(default = "default_top_gap")]
    pub top_gap: f32,
    #[serde(default = "default_gap")]
    pub gap: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            top_gap: default_top_gap(),
            gap: default_gap(),
        }
    }
}

fn default_top_gap() -> f32 {
    GapConfig::default().top
}

fn default_gap() -> f32 {
    GapConfig::default().between
}

// ──────────────────────────────────────────────
// Normalization
// ──────────────────────────────────────────────

impl Settings {
    /// Scroll step in pixels; falls back to the default for unusable values.
    pub fn scroll_step(&self) -> f32 {
        if self.scroll_speed.is_finite() && self.scroll_speed > 0.0 {
            self.scroll_speed
        } else {
            log::warn!("Ignoring scroll speed {}", self.scroll_speed);
            DEFAULT_SCROLL_SPEED
        }
    }

    pub fn gaps(&self) -> GapConfig {
        let defaults = GapConfig::default();
        let sane = |v: f32, fallback: f32, name: &str| {
            if v.is_finite() && v >= 0.0 {
                v
            } else {
                log::warn!("Ignoring layout.{} = {}", name, v);
                fallback
            }
        };
        GapConfig {
            top: sane(self.layout.top_gap, defaults.top, "topGap"),
            between: sane(self.layout.gap, defaults.between, "gap"),
        }
    }

    pub fn protected_id(&self) -> Option<PanelId> {
        self.protected_panel
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(PanelId::from)
    }

    /// Canonical panel list in display order. Bare strings get generated ids,
    /// bad heights fall back to the default, duplicates and empty sources are
    /// dropped. An empty result becomes a single placeholder panel.
    pub fn panel_configs(&self) -> Vec<PanelConfig> {
        let mut staged: Vec<(usize, PanelConfig)> = Vec::new();

        for (index, entry) in self.panels.iter().enumerate() {
            let generated = format!("panel-{}", index + 1);
            let (config, slot) = match entry {
                PanelEntry::Source(source) => (PanelConfig::new(generated, source.trim()), index),
                PanelEntry::Full(spec) => {
                    let id = spec
                        .id
                        .as_deref()
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .unwrap_or(generated);
                    let height = match &spec.height {
                        None => HeightSpec::Default,
                        Some(value) => value.to_spec().unwrap_or_else(|| {
                            log::warn!("Panel {}: unusable height {:?}, using default", id, value);
                            HeightSpec::Default
                        }),
                    };
                    let mut config = PanelConfig::new(id, spec.source.trim()).with_height(height);
                    config.visible = spec.visible;
                    (config, spec.order.unwrap_or(index))
                }
                PanelEntry::Invalid(value) => {
                    log::warn!("Skipping panel entry {}: {}", index, value);
                    continue;
                }
            };
            if config.source.is_empty() {
                log::warn!("Skipping panel {}: no source", config.id);
                continue;
            }
            staged.push((slot, config));
        }

        staged.sort_by_key(|(slot, _)| *slot);

        let mut seen = HashSet::new();
        let mut configs: Vec<PanelConfig> = Vec::with_capacity(staged.len());
        for (_, config) in staged {
            if !seen.insert(config.id.clone()) {
                log::warn!("Skipping duplicate panel id {}", config.id);
                continue;
            }
            configs.push(config);
        }

        if configs.is_empty() {
            log::info!("No panels configured; showing placeholder");
            configs.push(
                PanelConfig::new(PLACEHOLDER_ID, PLACEHOLDER_SOURCE)
                    .with_height(HeightSpec::Percent(100.0)),
            );
        }
        configs
    }

    /// Replace the stored panel list with the live one. The placeholder is
    /// never written back.
    pub fn store_panels<'a>(&mut self, configs: impl IntoIterator<Item = &'a PanelConfig>) {
        self.panels = configs
            .into_iter()
            .filter(|c| c.source != PLACEHOLDER_SOURCE)
            .map(|c| {
                PanelEntry::Full(PanelSpec {
                    id: Some(c.id.to_string()),
                    source: c.source.clone(),
                    height: HeightValue::from_spec(c.height),
                    order: None,
                    visible: c.visible,
                })
            })
            .collect();
    }
}

// ──────────────────────────────────────────────
// Store
// ──────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot determine the config directory")]
    NoConfigDir,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/veil/settings.json`.
    pub fn default_location() -> Result<Self, SettingsError> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(dir.join("veil").join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Settings {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}; using defaults", self.path.display());
                return Settings::default();
            }
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.path.display(), e);
                return Settings::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Failed to parse {}: {}", self.path.display(), e);
                Settings::default()
            }
        }
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
