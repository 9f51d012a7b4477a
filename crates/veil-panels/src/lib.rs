// Panel registry: the ordered set of panels and the surfaces backing them.
// Every mutation either fully succeeds or leaves the registry untouched.


use std::collections::{HashMap, HashSet};

use veil_core::{EmbeddingHost, PanelConfig, PanelError, PanelId, Size};
use veil_layout::LayoutPlan;

// ──────────────────────────────────────────────
// PanelRecord
// ──────────────────────────────────────────────

/// A registered panel and the surface it exclusively owns.
struct PanelRecord<S> {
    config: PanelConfig,
    surface: S,
}

// ──────────────────────────────────────────────
// PanelRegistry
// ──────────────────────────────────────────────

pub struct PanelRegistry<H: EmbeddingHost> {
    host: H,
    records: Vec<PanelRecord<H::Surface>>,
    /// Panel that `remove_panel` refuses to touch.
    protected: Option<PanelId>,
    /// Bumped on every successful mutation so callers can tell whether the
    /// panel list changed since they last looked.
    generation: u64,
}

impl<H: EmbeddingHost> PanelRegistry<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            records: Vec::new(),
            protected: None,
            generation: 0,
        }
    }

    pub fn with_protected(mut self, id: Option<PanelId>) -> Self {
        self.protected = id;
        self
    }

    pub fn set_protected(&mut self, id: Option<PanelId>) {
        self.protected = id;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Panel ids in display order.
    pub fn ids(&self) -> Vec<PanelId> {
        self.records.iter().map(|r| r.config.id.clone()).collect()
    }

    /// Panel configs in display order.
    pub fn configs(&self) -> impl Iterator<Item = &PanelConfig> {
        self.records.iter().map(|r| &r.config)
    }

    pub fn contains(&self, id: &PanelId) -> bool {
        self.position(id).is_some()
    }

    pub fn visible_count(&self) -> usize {
        self.records.iter().filter(|r| r.config.visible).count()
    }

    fn position(&self, id: &PanelId) -> Option<usize> {
        self.records.iter().position(|r| &r.config.id == id)
    }

    /// Keep `config.order` equal to the record's index: unique and contiguous.
    fn renumber(&mut self) {
        for (index, record) in self.records.iter_mut().enumerate() {
            record.config.order = Some(index);
        }
        self.generation = self.generation.wrapping_add(1);
    }

    // ── Mutations ──

    /// Validate `config`, create its surface and insert it. Appends unless
    /// `config.order` names an earlier slot.
    pub fn add_panel(&mut self, config: PanelConfig) -> Result<PanelId, PanelError> {
        if config.id.is_empty() {
            return Err(PanelError::InvalidConfig("panel id is empty".to_string()));
        }
        if config.source.trim().is_empty() {
            return Err(PanelError::InvalidConfig(format!(
                "panel {} has no content source",
                config.id
            )));
        }
        if !config.height.is_valid() {
            return Err(PanelError::InvalidConfig(format!(
                "panel {} has an invalid height ({})",
                config.id, config.height
            )));
        }
        if self.contains(&config.id) {
            return Err(PanelError::InvalidConfig(format!(
                "duplicate panel id {}",
                config.id
            )));
        }

        let surface = self
            .host
            .create_surface(&config.id, &config.source)
            .map_err(|reason| PanelError::SurfaceFailed {
                id: config.id.clone(),
                reason,
            })?;

        let id = config.id.clone();
        let index = config.order.unwrap_or(self.records.len()).min(self.records.len());
        log::info!("Adding panel {} at slot {} ({})", id, index, config.source);
        self.records.insert(index, PanelRecord { config, surface });
        self.renumber();
        Ok(id)
    }

    /// Release and destroy a panel's surface, then drop the record.
    pub fn remove_panel(&mut self, id: &PanelId) -> Result<(), PanelError> {
        let index = self
            .position(id)
            .ok_or_else(|| PanelError::NotFound(id.clone()))?;
        if self.protected.as_ref() == Some(id) {
            log::warn!("Refusing to remove protected panel {}", id);
            return Err(PanelError::Protected(id.clone()));
        }

        let record = self.records.remove(index);
        self.dispose(record);
        self.renumber();
        log::info!("Removed panel {}", id);
        Ok(())
    }

    /// Apply a new display order. `new_order` must be exactly a permutation
    /// of the current ids.
    pub fn reorder(&mut self, new_order: &[PanelId]) -> Result<(), PanelError> {
        if new_order.len() != self.records.len() {
            return Err(PanelError::InvalidConfig(format!(
                "reorder expects {} ids, got {}",
                self.records.len(),
                new_order.len()
            )));
        }

        let mut seen = HashSet::with_capacity(new_order.len());
        for id in new_order {
            if !seen.insert(id) {
                return Err(PanelError::InvalidConfig(format!(
                    "panel {} appears twice in reorder",
                    id
                )));
            }
            if !self.contains(id) {
                return Err(PanelError::InvalidConfig(format!(
                    "reorder names unknown panel {}",
                    id
                )));
            }
        }

        let slots: HashMap<&PanelId, usize> = new_order
            .iter()
            .enumerate()
            .map(|(slot, id)| (id, slot))
            .collect();
        self.records
            .sort_by_key(|r| slots.get(&r.config.id).copied().unwrap_or(usize::MAX));
        self.renumber();
        log::info!("Reordered panels: {:?}", self.ids());
        Ok(())
    }

    /// Show or hide a panel without touching its surface. Returns whether
    /// anything changed.
    pub fn set_visibility(&mut self, id: &PanelId, visible: bool) -> Result<bool, PanelError> {
        let index = self
            .position(id)
            .ok_or_else(|| PanelError::NotFound(id.clone()))?;
        let record = &mut self.records[index];
        if record.config.visible == visible {
            return Ok(false);
        }
        record.config.visible = visible;
        self.generation = self.generation.wrapping_add(1);
        log::debug!("Panel {} visible={}", id, visible);
        Ok(true)
    }

    // ── Layout ──

    /// Push a plan's bounds to the host. Entries must come from a plan
    /// computed over `configs()` with the same generation.
    pub fn apply_layout(&mut self, plan: &LayoutPlan, viewport: Size) {
        debug_assert_eq!(plan.entries.len(), self.records.len());
        for (record, entry) in self.records.iter().zip(&plan.entries) {
            debug_assert_eq!(record.config.id, entry.id);
            let bounds = veil_layout::bounds(entry, viewport);
            self.host.set_bounds(&record.surface, bounds);
        }
    }

    // ── Teardown ──

    /// Release and destroy every surface, front to back.
    pub fn teardown(&mut self) {
        if self.records.is_empty() {
            return;
        }
        log::info!("Tearing down {} panels", self.records.len());
        let records: Vec<_> = self.records.drain(..).collect();
        for record in records {
            self.dispose(record);
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn dispose(&mut self, mut record: PanelRecord<H::Surface>) {
        if let Err(e) = self.host.release_surface(&mut record.surface) {
            log::warn!("Cleanup of panel {} failed: {}", record.config.id, e);
        }
        self.host.destroy_surface(record.surface);
    }
}
