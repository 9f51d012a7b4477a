// Concealment: which windows are currently hidden from screen capture.
//
// Each window moves NotConcealed -> Concealed on a confirmed `set_excluded`
// and back on a confirmed `clear_excluded`. A failed clear keeps the entry so
// a later disable can retry it.


use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use veil_core::{CaptureExclusion, ConcealError, WindowHandle};

/// Time an OS exclusion call may take before it counts as failed.
pub const DEFAULT_CALL_BUDGET: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcealStatus {
    Unavailable,
    Inactive,
    Active(usize),
}

/// Per-title results of a batch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, ConcealError)>,
}

impl BatchOutcome {
    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

// ──────────────────────────────────────────────
// ConcealmentManager
// ──────────────────────────────────────────────

pub struct ConcealmentManager<P: CaptureExclusion> {
    /// `None` when the platform has no exclusion primitive.
    primitive: Option<P>,
    /// Title -> the handle exclusion was applied to.
    concealed: BTreeMap<String, WindowHandle>,
    call_budget: Duration,
}

impl<P: CaptureExclusion> ConcealmentManager<P> {
    pub fn new(primitive: Option<P>) -> Self {
        if primitive.is_none() {
            log::warn!("Screen-capture exclusion is unavailable on this platform; concealment disabled");
        }
        Self {
            primitive,
            concealed: BTreeMap::new(),
            call_budget: DEFAULT_CALL_BUDGET,
        }
    }

    pub fn with_call_budget(mut self, budget: Duration) -> Self {
        self.call_budget = budget;
        self
    }

    pub fn primitive(&self) -> Option<&P> {
        self.primitive.as_ref()
    }

    pub fn primitive_mut(&mut self) -> Option<&mut P> {
        self.primitive.as_mut()
    }

    pub fn is_available(&self) -> bool {
        self.primitive.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.concealed.is_empty()
    }

    pub fn concealed_count(&self) -> usize {
        self.concealed.len()
    }

    pub fn concealed_titles(&self) -> Vec<String> {
        self.concealed.keys().cloned().collect()
    }

    pub fn is_concealed(&self, title: &str) -> bool {
        self.concealed.contains_key(title)
    }

    pub fn status(&self) -> ConcealStatus {
        match (self.is_available(), self.concealed.len()) {
            (false, _) => ConcealStatus::Unavailable,
            (true, 0) => ConcealStatus::Inactive,
            (true, n) => ConcealStatus::Active(n),
        }
    }

    // ── Single window ──

    /// Resolve `title` and exclude that window from capture. Enabling a
    /// concealed window again re-applies exclusion to the freshly resolved
    /// handle.
    pub fn enable_for_window(&mut self, title: &str) -> Result<(), ConcealError> {
        let budget = self.call_budget;
        let primitive = self.primitive.as_mut().ok_or(ConcealError::Unavailable)?;
        let handle = primitive
            .find_window_by_title(title)
            .ok_or_else(|| ConcealError::NotFound(title.to_string()))?;

        let started = Instant::now();
        let applied = primitive.set_excluded(handle);
        let elapsed = started.elapsed();

        if elapsed > budget {
            log::warn!(
                "Capture exclusion for {:?} took {:?} (budget {:?})",
                title,
                elapsed,
                budget
            );
            if applied {
                if primitive.clear_excluded(handle) {
                    self.concealed.remove(title);
                } else {
                    // Still excluded: track it so disable can retry.
                    log::warn!("Rollback of late exclusion for {:?} failed", title);
                    self.concealed.insert(title.to_string(), handle);
                }
            }
            return Err(ConcealError::TimedOut(title.to_string()));
        }
        if !applied {
            log::warn!("OS refused capture exclusion for {:?}", title);
            return Err(ConcealError::ExclusionFailed(title.to_string()));
        }

        self.concealed.insert(title.to_string(), handle);
        log::info!("Concealed window {:?} ({} active)", title, self.concealed.len());
        Ok(())
    }

    /// Clear exclusion for `title`. The entry is only dropped once the OS
    /// confirms. Falls back to the cached handle if the title no longer
    /// resolves.
    pub fn disable_for_window(&mut self, title: &str) -> Result<(), ConcealError> {
        let budget = self.call_budget;
        let primitive = self.primitive.as_mut().ok_or(ConcealError::Unavailable)?;
        let handle = primitive
            .find_window_by_title(title)
            .or_else(|| self.concealed.get(title).copied())
            .ok_or_else(|| ConcealError::NotFound(title.to_string()))?;

        let started = Instant::now();
        let cleared = primitive.clear_excluded(handle);
        let elapsed = started.elapsed();

        if elapsed > budget {
            log::warn!(
                "Clearing capture exclusion for {:?} took {:?} (budget {:?})",
                title,
                elapsed,
                budget
            );
            return Err(ConcealError::TimedOut(title.to_string()));
        }
        if !cleared {
            log::warn!("OS refused to clear capture exclusion for {:?}", title);
            return Err(ConcealError::ExclusionFailed(title.to_string()));
        }

        if self.concealed.remove(title).is_some() {
            log::info!("Revealed window {:?} ({} active)", title, self.concealed.len());
        }
        Ok(())
    }

    // ── Batches ──

    /// Try every title independently. Succeeds if at least one window was
    /// concealed; nothing is rolled back.
    pub fn enable_for_multiple<S: AsRef<str>>(
        &mut self,
        titles: &[S],
    ) -> Result<BatchOutcome, ConcealError> {
        if self.primitive.is_none() {
            return Err(ConcealError::Unavailable);
        }
        if titles.is_empty() {
            return Err(ConcealError::EmptyBatch);
        }

        let mut outcome = BatchOutcome::default();
        for title in titles {
            let title = title.as_ref();
            match self.enable_for_window(title) {
                Ok(()) => outcome.succeeded.push(title.to_string()),
                Err(e) => outcome.failed.push((title.to_string(), e)),
            }
        }

        if !outcome.any_succeeded() {
            // Report the first failure; the rest were logged already.
            let (_, first) = outcome.failed.swap_remove(0);
            return Err(first);
        }
        Ok(outcome)
    }

    /// Clear every concealed window. Entries whose clear fails stay.
    pub fn disable_all(&mut self) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if self.primitive.is_none() {
            return outcome;
        }
        for title in self.concealed_titles() {
            match self.disable_for_window(&title) {
                Ok(()) => outcome.succeeded.push(title),
                Err(e) => outcome.failed.push((title, e)),
            }
        }
        outcome
    }

    /// Best-effort `disable_all`, then forget everything.
    pub fn teardown(&mut self) {
        let outcome = self.disable_all();
        for (title, e) in &outcome.failed {
            log::warn!("Leaving {:?} concealed at shutdown: {}", title, e);
        }
        self.concealed.clear();
    }
}
