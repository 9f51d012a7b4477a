// Compositor: the one context object that owns the panel registry, scroll
// motion, concealment and settings. Every mutation funnels through here and
// ends with a layout pass pushed to the embedding host.

use std::rc::Rc;
use std::time::Instant;

use veil_conceal::{BatchOutcome, ConcealStatus, ConcealmentManager};
use veil_core::{
    CaptureExclusion, ConcealError, EmbeddingHost, GapConfig, PanelConfig, PanelError, PanelId,
    Size,
};
use veil_layout::LayoutPlan;
use veil_motion::{Clock, MotionConfig, MotionController, PageDirection, ScrollState};
use veil_panels::PanelRegistry;

use crate::settings::{Settings, SettingsStore};

pub struct Compositor<H: EmbeddingHost, P: CaptureExclusion> {
    registry: PanelRegistry<H>,
    motion: MotionController,
    concealment: ConcealmentManager<P>,
    store: Box<dyn SettingsStore>,
    clock: Rc<dyn Clock>,
    settings: Settings,
    viewport: Size,
    gaps: GapConfig,
    plan: LayoutPlan,
    /// Registry generation last written to the store.
    saved_generation: u64,
}

impl<H: EmbeddingHost, P: CaptureExclusion> Compositor<H, P> {
    pub fn new(
        host: H,
        primitive: Option<P>,
        store: Box<dyn SettingsStore>,
        clock: Rc<dyn Clock>,
        viewport: Size,
    ) -> Self {
        let settings = store.load();
        let registry = PanelRegistry::new(host).with_protected(settings.protected_id());
        Self {
            registry,
            motion: MotionController::new(MotionConfig::default()),
            concealment: ConcealmentManager::new(primitive),
            store,
            clock,
            gaps: settings.gaps(),
            settings,
            viewport,
            plan: LayoutPlan::default(),
            saved_generation: 0,
        }
    }

    /// Create the configured panels, lay them out and, if allowed, conceal
    /// the configured windows.
    pub fn bootstrap(&mut self, allow_conceal: bool) {
        self.populate();
        self.relayout();

        let conceal = &self.settings.concealment;
        if allow_conceal && conceal.enabled && conceal.auto_start {
            if let Err(e) = self.concealment.enable_for_multiple(conceal.windows.as_slice()) {
                log::warn!("Startup concealment failed: {}", e);
            }
        }
    }

    fn populate(&mut self) {
        for config in self.settings.panel_configs() {
            if let Err(e) = self.registry.add_panel(config) {
                log::warn!("Skipping panel: {}", e);
            }
        }
        self.saved_generation = self.registry.generation();
        log::info!("Loaded {} panels", self.registry.len());
    }

    // ── Accessors ──

    pub fn registry(&self) -> &PanelRegistry<H> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn plan(&self) -> &LayoutPlan {
        &self.plan
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.motion.state()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.motion.next_deadline()
    }

    // ── Layout ──

    /// Recompute geometry for the current offset and push it to the host.
    pub fn relayout(&mut self) {
        let mut plan = veil_layout::compute(
            self.viewport,
            self.registry.configs(),
            self.motion.offset(),
            self.gaps,
        );
        if self.motion.set_max_scroll(plan.max_scroll) {
            plan = veil_layout::compute(
                self.viewport,
                self.registry.configs(),
                self.motion.offset(),
                self.gaps,
            );
        }
        log::debug!(
            "Layout: {}/{} panels visible, extent {}, offset {}/{}",
            self.registry.visible_count(),
            plan.entries.len(),
            plan.content_extent,
            self.motion.offset(),
            plan.max_scroll
        );
        self.registry.apply_layout(&plan, self.viewport);
        self.plan = plan;
    }

    pub fn resize(&mut self, viewport: Size) {
        if !(viewport.width > 0.0 && viewport.height > 0.0) {
            log::warn!("Ignoring resize to {}x{}", viewport.width, viewport.height);
            return;
        }
        self.viewport = viewport;
        self.relayout();
    }

    // ── Panels ──

    /// Structural changes snap back to the top of the stack.
    fn after_structure_change(&mut self) {
        self.motion.reset();
        self.relayout();
        self.persist_panels();
    }

    pub fn add_panel(&mut self, config: PanelConfig) -> Result<PanelId, PanelError> {
        let id = self.registry.add_panel(config)?;
        self.after_structure_change();
        Ok(id)
    }

    pub fn remove_panel(&mut self, id: &PanelId) -> Result<(), PanelError> {
        self.registry.remove_panel(id)?;
        self.after_structure_change();
        Ok(())
    }

    pub fn reorder(&mut self, order: &[PanelId]) -> Result<(), PanelError> {
        self.registry.reorder(order)?;
        self.after_structure_change();
        Ok(())
    }

    pub fn set_visibility(&mut self, id: &PanelId, visible: bool) -> Result<bool, PanelError> {
        let changed = self.registry.set_visibility(id, visible)?;
        if changed {
            self.relayout();
            self.persist_panels();
        }
        Ok(changed)
    }

    // ── Scrolling ──

    pub fn scroll_by(&mut self, delta: f32) -> bool {
        self.motion.scroll_by(delta, self.clock.now())
    }

    /// One scroll step down the stack.
    pub fn scroll_down(&mut self) -> bool {
        self.scroll_by(-self.settings.scroll_step())
    }

    pub fn scroll_up(&mut self) -> bool {
        self.scroll_by(self.settings.scroll_step())
    }

    pub fn scroll_to_top(&mut self) -> bool {
        self.motion.scroll_to_top(self.clock.now())
    }

    pub fn scroll_to_bottom(&mut self) -> bool {
        self.motion.scroll_to_bottom(self.clock.now())
    }

    /// One page per visible panel; each page brings that panel to the top
    /// gap, and the last one reaches the bottom of the stack.
    pub fn navigate_to_page(&mut self, direction: PageDirection) -> bool {
        self.motion
            .navigate_to_page(direction, &self.plan.page_stops, self.clock.now())
    }

    pub fn set_scroll_speed(&mut self, speed: f32) -> bool {
        if !(speed.is_finite() && speed > 0.0) {
            return false;
        }
        self.settings.scroll_speed = speed;
        self.persist();
        true
    }

    /// Advance the running animation if its deadline has passed.
    pub fn tick(&mut self) -> bool {
        if self.motion.tick(self.clock.now()) {
            self.relayout();
            true
        } else {
            false
        }
    }

    // ── Concealment ──

    pub fn conceal_status(&self) -> ConcealStatus {
        self.concealment.status()
    }

    pub fn conceal_enable(&mut self) -> Result<BatchOutcome, ConcealError> {
        if !self.concealment.is_available() {
            return Err(ConcealError::Unavailable);
        }
        self.settings.concealment.enabled = true;
        self.persist();
        self.concealment
            .enable_for_multiple(self.settings.concealment.windows.as_slice())
    }

    pub fn conceal_disable(&mut self) -> BatchOutcome {
        self.settings.concealment.enabled = false;
        self.persist();
        self.concealment.disable_all()
    }

    /// Flip concealment and return the resulting status.
    pub fn conceal_toggle(&mut self) -> ConcealStatus {
        if self.concealment.is_active() {
            let outcome = self.conceal_disable();
            for (title, e) in &outcome.failed {
                log::warn!("Could not reveal {:?}: {}", title, e);
            }
        } else if let Err(e) = self.conceal_enable() {
            log::warn!("Could not conceal: {}", e);
        }
        self.concealment.status()
    }

    // ── Settings ──

    /// Re-read settings and rebuild the panel stack from them.
    pub fn reload(&mut self) {
        log::info!("Reloading settings");
        self.settings = self.store.load();
        self.gaps = self.settings.gaps();

        self.motion.cancel();
        self.registry.teardown();
        self.registry.set_protected(self.settings.protected_id());
        self.populate();
        self.motion.reset();
        self.relayout();

        self.reconcile_concealment();
    }

    /// Bring the concealed set in line with the reloaded settings: reveal
    /// titles that are no longer listed and conceal newly listed ones.
    fn reconcile_concealment(&mut self) {
        if !self.concealment.is_available() {
            return;
        }
        let conceal = &self.settings.concealment;
        if !conceal.enabled {
            if self.concealment.is_active() {
                self.concealment.disable_all();
            }
            return;
        }

        for title in self.concealment.concealed_titles() {
            if !conceal.windows.contains(&title) {
                if let Err(e) = self.concealment.disable_for_window(&title) {
                    log::warn!("Could not reveal {:?} after reload: {}", title, e);
                }
            }
        }

        let added: Vec<&String> = conceal
            .windows
            .iter()
            .filter(|title| !self.concealment.is_concealed(title))
            .collect();
        if added.is_empty() {
            return;
        }
        if let Err(e) = self.concealment.enable_for_multiple(added.as_slice()) {
            log::warn!("Concealment after reload failed: {}", e);
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.settings) {
            log::error!("Failed to save settings: {}", e);
        }
    }

    /// Save the panel list if the registry changed since the last save.
    fn persist_panels(&mut self) {
        let generation = self.registry.generation();
        if generation == self.saved_generation {
            return;
        }
        self.settings.store_panels(self.registry.configs());
        self.persist();
        self.saved_generation = generation;
    }

    // ── Teardown ──

    /// Stop animation first, then destroy surfaces, then lift concealment.
    pub fn teardown(&mut self) {
        self.motion.cancel();
        self.registry.teardown();
        self.concealment.teardown();
        log::info!("Teardown complete");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::time::Duration;

    use super::Compositor;
    use crate::settings::{
        ConcealmentSettings, LayoutSettings, PanelEntry, PanelSpec, Settings, SettingsError,
        SettingsStore, PLACEHOLDER_SOURCE,
    };
    use veil_conceal::ConcealStatus;
    use veil_core::{
        CaptureExclusion, ConcealError, EmbeddingHost, HostError, PanelConfig, PanelError, PanelId,
        Rect, Size, WindowHandle,
    };
    use veil_motion::{ManualClock, PageDirection};

    const VIEWPORT: Size = Size {
        width: 400.0,
        height: 600.0,
    };

    // ── Fakes ──

    #[derive(Default)]
    struct RecordingHost {
        next: u32,
        bounds: HashMap<u32, Rect>,
        destroyed: Vec<u32>,
    }

    struct Surface(u32);

    impl EmbeddingHost for RecordingHost {
        type Surface = Surface;

        fn create_surface(&mut self, _id: &PanelId, _source: &str) -> Result<Surface, HostError> {
            self.next += 1;
            Ok(Surface(self.next))
        }

        fn set_bounds(&mut self, surface: &Surface, bounds: Rect) {
            self.bounds.insert(surface.0, bounds);
        }

        fn release_surface(&mut self, _surface: &mut Surface) -> Result<(), HostError> {
            Ok(())
        }

        fn destroy_surface(&mut self, surface: Surface) {
            self.destroyed.push(surface.0);
        }
    }

    #[derive(Default)]
    struct FakeExclusion {
        windows: HashMap<String, WindowHandle>,
        excluded: Vec<WindowHandle>,
    }

    impl CaptureExclusion for FakeExclusion {
        fn find_window_by_title(&self, title: &str) -> Option<WindowHandle> {
            self.windows.get(title).copied()
        }

        fn set_excluded(&mut self, window: WindowHandle) -> bool {
            if !self.excluded.contains(&window) {
                self.excluded.push(window);
            }
            true
        }

        fn clear_excluded(&mut self, window: WindowHandle) -> bool {
            self.excluded.retain(|w| *w != window);
            true
        }
    }

    /// Shared so tests can inspect what was saved after handing the store
    /// to the compositor.
    #[derive(Clone)]
    struct SharedStore(Rc<RefCell<(Settings, usize)>>);

    impl SharedStore {
        fn with(settings: Settings) -> Self {
            Self(Rc::new(RefCell::new((settings, 0))))
        }

        fn saved(&self) -> Settings {
            self.0.borrow().0.clone()
        }

        fn saves(&self) -> usize {
            self.0.borrow().1
        }

        fn replace(&self, settings: Settings) {
            self.0.borrow_mut().0 = settings;
        }
    }

    impl SettingsStore for SharedStore {
        fn load(&self) -> Settings {
            self.0.borrow().0.clone()
        }

        fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
            let mut inner = self.0.borrow_mut();
            inner.0 = settings.clone();
            inner.1 += 1;
            Ok(())
        }
    }

    type TestCompositor = Compositor<RecordingHost, FakeExclusion>;

    fn panel(id: &str) -> PanelEntry {
        PanelEntry::Full(PanelSpec {
            id: Some(id.to_string()),
            source: format!("https://{}.example", id),
            height: Some(crate::settings::HeightValue::Pixels(600.0)),
            order: None,
            visible: true,
        })
    }

    /// Three 600 px panels, no gaps, one concealable window titled "Veil".
    fn settings() -> Settings {
        Settings {
            panels: vec![panel("a"), panel("b"), panel("c")],
            layout: LayoutSettings {
                top_gap: 0.0,
                gap: 0.0,
            },
            concealment: ConcealmentSettings {
                enabled: true,
                auto_start: true,
                windows: vec!["Veil".to_string()],
            },
            protected_panel: Some("a".to_string()),
            ..Settings::default()
        }
    }

    fn build(settings: Settings) -> (TestCompositor, Rc<ManualClock>, SharedStore) {
        let clock = Rc::new(ManualClock::new());
        let store = SharedStore::with(settings);
        let mut exclusion = FakeExclusion::default();
        exclusion
            .windows
            .insert("Veil".to_string(), WindowHandle(7));
        exclusion
            .windows
            .insert("Other".to_string(), WindowHandle(8));
        let mut compositor = Compositor::new(
            RecordingHost::default(),
            Some(exclusion),
            Box::new(store.clone()),
            clock.clone(),
            VIEWPORT,
        );
        compositor.bootstrap(true);
        (compositor, clock, store)
    }

    fn settle(c: &mut TestCompositor, clock: &ManualClock) {
        for _ in 0..1000 {
            match c.next_deadline() {
                Some(deadline) => {
                    clock.set(deadline);
                    c.tick();
                }
                None => return,
            }
        }
        panic!("animation never settled");
    }

    fn id(s: &str) -> PanelId {
        PanelId::from(s)
    }

    // ── Startup ──

    #[test]
    fn bootstrap_lays_out_and_conceals() {
        let (c, _, _) = build(settings());
        assert_eq!(c.registry().len(), 3);
        assert_eq!(c.plan().max_scroll, 1200.0);
        assert_eq!(c.registry().host().bounds[&2], Rect::new(0.0, 600.0, 400.0, 600.0));
        assert_eq!(c.conceal_status(), ConcealStatus::Active(1));
    }

    #[test]
    fn bootstrap_without_concealment() {
        let clock = Rc::new(ManualClock::new());
        let mut c: TestCompositor = Compositor::new(
            RecordingHost::default(),
            None,
            Box::new(SharedStore::with(settings())),
            clock,
            VIEWPORT,
        );
        c.bootstrap(true);
        assert_eq!(c.conceal_status(), ConcealStatus::Unavailable);
        assert_eq!(c.registry().len(), 3);
    }

    #[test]
    fn empty_config_shows_placeholder() {
        let (c, _, _) = build(Settings {
            panels: vec![],
            ..settings()
        });
        assert_eq!(c.registry().len(), 1);
        let first = c.registry().configs().next().unwrap();
        assert_eq!(first.source, PLACEHOLDER_SOURCE);
    }

    // ── Scrolling ──

    #[test]
    fn overscroll_converges_to_bottom_and_moves_surfaces() {
        let (mut c, clock, _) = build(settings());
        assert!(c.scroll_by(-2000.0));
        assert_eq!(c.scroll_state().target, -1200.0);

        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -1200.0);
        assert_eq!(c.registry().host().bounds[&3], Rect::new(0.0, 0.0, 400.0, 600.0));
    }

    #[test]
    fn scroll_steps_use_configured_speed() {
        let (mut c, clock, store) = build(settings());
        assert!(c.set_scroll_speed(200.0));
        assert_eq!(store.saved().scroll_speed, 200.0);

        c.scroll_down();
        c.scroll_down();
        c.scroll_up();
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -200.0);
        assert!(!c.set_scroll_speed(0.0));
    }

    #[test]
    fn top_and_bottom() {
        let (mut c, clock, _) = build(settings());
        c.scroll_to_bottom();
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -1200.0);
        c.scroll_to_top();
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, 0.0);
    }

    #[test]
    fn paging_walks_one_viewport_at_a_time() {
        let (mut c, clock, _) = build(settings());
        for expected in [-600.0, -1200.0, -1200.0] {
            c.navigate_to_page(PageDirection::Next);
            settle(&mut c, &clock);
            assert_eq!(c.scroll_state().offset, expected);
        }
        c.navigate_to_page(PageDirection::Prev);
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -600.0);
    }

    #[test]
    fn paging_lands_on_panels_with_default_gaps() {
        let (mut c, clock, _) = build(Settings {
            layout: LayoutSettings::default(),
            ..settings()
        });
        assert_eq!(c.plan().max_scroll, 1250.0);

        c.navigate_to_page(PageDirection::Next);
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -620.0);
        assert_eq!(c.registry().host().bounds[&2].y, 10.0);

        c.navigate_to_page(PageDirection::Next);
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -1250.0);
        assert_eq!(c.registry().host().bounds[&3].y, 0.0);

        assert!(!c.navigate_to_page(PageDirection::Next));
        c.navigate_to_page(PageDirection::Prev);
        settle(&mut c, &clock);
        assert_eq!(c.scroll_state().offset, -620.0);
    }

    #[test]
    fn ticks_before_deadline_do_not_relayout() {
        let (mut c, clock, _) = build(settings());
        c.scroll_by(-300.0);
        assert!(c.tick());
        clock.advance(Duration::from_millis(1));
        assert!(!c.tick());
    }

    // ── Panels ──

    #[test]
    fn structural_change_resets_scroll_and_persists() {
        let (mut c, clock, store) = build(settings());
        c.scroll_by(-500.0);
        settle(&mut c, &clock);

        c.add_panel(PanelConfig::new("d", "https://d.example")).unwrap();
        assert_eq!(c.scroll_state().offset, 0.0);
        assert_eq!(c.next_deadline(), None);
        assert_eq!(store.saved().panels.len(), 4);

        c.remove_panel(&id("d")).unwrap();
        assert_eq!(store.saved().panels.len(), 3);
        assert_eq!(c.plan().max_scroll, 1200.0);
    }

    #[test]
    fn protected_panel_survives_remove() {
        let (mut c, _, store) = build(settings());
        let saves = store.saves();
        assert_eq!(
            c.remove_panel(&id("a")),
            Err(PanelError::Protected(id("a")))
        );
        assert_eq!(c.registry().len(), 3);
        assert_eq!(store.saves(), saves);
    }

    #[test]
    fn hiding_clamps_offset_without_reset() {
        let (mut c, clock, _) = build(settings());
        c.scroll_to_bottom();
        settle(&mut c, &clock);

        assert_eq!(c.set_visibility(&id("c"), false), Ok(true));
        assert_eq!(c.plan().max_scroll, 600.0);
        assert_eq!(c.scroll_state().offset, -600.0);
        assert_eq!(c.set_visibility(&id("c"), false), Ok(false));
    }

    #[test]
    fn reorder_moves_surfaces() {
        let (mut c, _, _) = build(settings());
        c.reorder(&[id("c"), id("b"), id("a")]).unwrap();
        assert_eq!(c.registry().host().bounds[&3].y, 0.0);
        assert_eq!(c.registry().host().bounds[&1].y, 1200.0);
    }

    #[test]
    fn resize_reflows_percent_heights() {
        let mut s = settings();
        s.panels = vec![PanelEntry::Full(PanelSpec {
            id: Some("half".to_string()),
            source: "https://h.example".to_string(),
            height: Some(crate::settings::HeightValue::Text("50%".to_string())),
            order: None,
            visible: true,
        })];
        let (mut c, _, _) = build(s);
        assert_eq!(c.plan().entries[0].height, 300.0);
        c.resize(Size::new(400.0, 1000.0));
        assert_eq!(c.plan().entries[0].height, 500.0);
    }

    // ── Concealment ──

    #[test]
    fn toggle_flips_and_persists() {
        let (mut c, _, store) = build(settings());
        assert_eq!(c.conceal_toggle(), ConcealStatus::Inactive);
        assert!(!store.saved().concealment.enabled);
        assert_eq!(c.conceal_toggle(), ConcealStatus::Active(1));
        assert!(store.saved().concealment.enabled);
    }

    #[test]
    fn enable_without_primitive_does_not_persist() {
        let clock = Rc::new(ManualClock::new());
        let mut s = settings();
        s.concealment.enabled = false;
        let store = SharedStore::with(s);
        let mut c: TestCompositor = Compositor::new(
            RecordingHost::default(),
            None,
            Box::new(store.clone()),
            clock,
            VIEWPORT,
        );
        c.bootstrap(true);
        let saves = store.saves();

        assert_eq!(c.conceal_enable(), Err(ConcealError::Unavailable));
        assert!(!store.saved().concealment.enabled);
        assert_eq!(store.saves(), saves);
        assert_eq!(c.conceal_toggle(), ConcealStatus::Unavailable);
        assert!(!store.saved().concealment.enabled);
    }

    #[test]
    fn panel_list_is_saved_only_when_it_changes() {
        let (mut c, _, store) = build(settings());
        let before = store.saves();
        c.set_visibility(&id("b"), false).unwrap();
        assert_eq!(store.saves(), before + 1);
        assert!(!store.saved().panels.is_empty());

        let saves = store.saves();
        c.set_visibility(&id("b"), false).unwrap();
        assert_eq!(store.saves(), saves);
    }

    // ── Reload + teardown ──

    #[test]
    fn reload_rebuilds_from_store() {
        let (mut c, _, store) = build(settings());
        let mut next = settings();
        next.panels = vec![panel("x")];
        next.concealment.enabled = false;
        store.replace(next);

        c.reload();
        assert_eq!(c.registry().ids(), vec![id("x")]);
        assert_eq!(c.registry().host().destroyed, vec![1, 2, 3]);
        assert_eq!(c.conceal_status(), ConcealStatus::Inactive);
    }

    #[test]
    fn reload_follows_new_window_list() {
        let (mut c, _, store) = build(settings());
        assert!(c.concealment.is_concealed("Veil"));

        let mut next = settings();
        next.concealment.windows = vec!["Other".to_string()];
        store.replace(next);
        c.reload();

        assert_eq!(c.concealment.concealed_titles(), vec!["Other".to_string()]);
        let excluded = &c.concealment.primitive().unwrap().excluded;
        assert_eq!(excluded, &vec![WindowHandle(8)]);
    }

    #[test]
    fn reload_keeps_listed_windows_concealed() {
        let (mut c, _, store) = build(settings());
        let mut next = settings();
        next.concealment.windows = vec!["Veil".to_string(), "Other".to_string()];
        store.replace(next);
        c.reload();

        assert_eq!(c.conceal_status(), ConcealStatus::Active(2));
        assert!(c.concealment.is_concealed("Veil"));
    }

    #[test]
    fn teardown_cancels_destroys_and_reveals() {
        let (mut c, _, _) = build(settings());
        c.scroll_by(-400.0);
        c.teardown();
        assert_eq!(c.next_deadline(), None);
        assert!(c.registry().is_empty());
        assert_eq!(c.conceal_status(), ConcealStatus::Inactive);
    }
}
