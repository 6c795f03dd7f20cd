use std::collections::HashMap;
use std::time::Instant;

use crate::meeting::events::DetectionSource;

/// Holds the set of currently-firing detection sources and elects a primary
/// by priority. Single-owner; callers serialise access (the detector holds
/// this behind its own mutex), so no internal locking here.
#[derive(Debug, Default)]
pub struct DetectionCoordinator {
    active_sources: HashMap<DetectionSource, Instant>,
    primary: Option<DetectionSource>,
}

impl DetectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` as active. Returns `true` only when this call just
    /// transitioned `active_sources` from empty to non-empty — i.e. "should
    /// the caller start recording" — not "is this now the primary source".
    pub fn register(&mut self, source: DetectionSource) -> bool {
        let just_started = self.active_sources.is_empty();
        self.active_sources.entry(source).or_insert_with(Instant::now);

        match self.primary {
            None => self.primary = Some(source),
            Some(current) if source < current => self.primary = Some(source),
            Some(_) => {}
        }

        just_started
    }

    /// Removes `source` from the active set. If it was primary, promotes the
    /// lowest-priority remaining source.
    pub fn remove(&mut self, source: DetectionSource) {
        self.active_sources.remove(&source);

        if self.primary == Some(source) {
            self.primary = self.active_sources.keys().min().copied();
        }
    }

    pub fn has_active(&self) -> bool {
        !self.active_sources.is_empty()
    }

    pub fn get_primary(&self) -> Option<DetectionSource> {
        self.primary
    }

    pub fn reset(&mut self) {
        self.active_sources.clear();
        self.primary = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_returns_true_only_on_first_activation() {
        let mut coord = DetectionCoordinator::new();
        assert!(coord.register(DetectionSource::MicrophoneActive));
        assert!(!coord.register(DetectionSource::WindowTitle));
    }

    #[test]
    fn primary_upgrades_to_lower_priority_source() {
        let mut coord = DetectionCoordinator::new();
        coord.register(DetectionSource::MicrophoneActive);
        assert_eq!(coord.get_primary(), Some(DetectionSource::MicrophoneActive));

        let started = coord.register(DetectionSource::WindowTitle);
        assert!(!started, "register must return false once already active");
        assert_eq!(coord.get_primary(), Some(DetectionSource::WindowTitle));
    }

    #[test]
    fn remove_promotes_next_lowest_priority() {
        let mut coord = DetectionCoordinator::new();
        coord.register(DetectionSource::MicrophoneActive);
        coord.register(DetectionSource::WindowTitle);
        coord.remove(DetectionSource::WindowTitle);
        assert_eq!(coord.get_primary(), Some(DetectionSource::MicrophoneActive));
    }

    #[test]
    fn remove_last_source_clears_primary() {
        let mut coord = DetectionCoordinator::new();
        coord.register(DetectionSource::MicrophoneActive);
        coord.remove(DetectionSource::MicrophoneActive);
        assert_eq!(coord.get_primary(), None);
        assert!(!coord.has_active());
    }

    #[test]
    fn reset_clears_everything() {
        let mut coord = DetectionCoordinator::new();
        coord.register(DetectionSource::Manual);
        coord.reset();
        assert!(!coord.has_active());
        assert_eq!(coord.get_primary(), None);
    }
}
