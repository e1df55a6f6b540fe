//! Consecutive duplicate suppression

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{DedupConfig, DedupScope};

/// Last item taken by any worker of a stage
pub type SharedLastSeen<I> = Arc<Mutex<Option<I>>>;

/// Decides whether an item repeats the previously taken one.
///
/// Only the immediately preceding item is compared; `a, b, a` fetches `a`
/// twice.
#[derive(Debug, Clone)]
pub enum Deduplicator<I> {
    /// Every item is fetched
    Disabled,
    /// Compare against the worker's own previous item
    PerWorker,
    /// Compare against the previous item of the whole stage
    Shared(SharedLastSeen<I>),
}

impl<I: PartialEq + Clone> Deduplicator<I> {
    /// Build from config
    ///
    /// `shared` is the slot handed to every worker of the stage and is only
    /// used for `DedupScope::Shared`.
    pub fn from_config(config: &DedupConfig, shared: &SharedLastSeen<I>) -> Self {
        match (config.enabled, config.scope) {
            (false, _) => Self::Disabled,
            (true, DedupScope::PerWorker) => Self::PerWorker,
            (true, DedupScope::Shared) => Self::Shared(Arc::clone(shared)),
        }
    }

    /// Check `item` and make it the new last-seen item.
    ///
    /// `own_last` is the worker's own last-seen slot, which is always updated.
    pub fn is_duplicate(&self, own_last: &mut Option<I>, item: &I) -> bool {
        let duplicate = match self {
            Self::Disabled => false,
            Self::PerWorker => own_last.as_ref() == Some(item),
            Self::Shared(slot) => {
                let mut last = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let duplicate = last.as_ref() == Some(item);
                *last = Some(item.clone());
                duplicate
            }
        };
        *own_last = Some(item.clone());
        duplicate
    }

    /// Check if suppression is active
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(dedup: &Deduplicator<&'static str>, items: &[&'static str]) -> Vec<&'static str> {
        let mut last = None;
        items
            .iter()
            .filter(|item| !dedup.is_duplicate(&mut last, item))
            .copied()
            .collect()
    }

    #[test]
    fn test_consecutive_duplicate_skipped() {
        let fetched = run(&Deduplicator::PerWorker, &["colombo", "colombo", "matara"]);
        assert_eq!(fetched, vec!["colombo", "matara"]);
    }

    #[test]
    fn test_only_previous_item_compared() {
        let fetched = run(&Deduplicator::PerWorker, &["a", "b", "a", "a"]);
        assert_eq!(fetched, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_disabled_fetches_everything() {
        let fetched = run(&Deduplicator::Disabled, &["colombo", "colombo", "matara"]);
        assert_eq!(fetched.len(), 3);
    }

    #[test]
    fn test_shared_scope_spans_workers() {
        let slot: SharedLastSeen<&str> = Arc::new(Mutex::new(None));
        let config = DedupConfig {
            enabled: true,
            scope: DedupScope::Shared,
        };
        let first = Deduplicator::from_config(&config, &slot);
        let second = Deduplicator::from_config(&config, &slot);

        let (mut last_a, mut last_b) = (None, None);
        assert!(!first.is_duplicate(&mut last_a, &"colombo"));
        assert!(second.is_duplicate(&mut last_b, &"colombo"));
        assert!(!second.is_duplicate(&mut last_b, &"matara"));
        assert!(!first.is_duplicate(&mut last_a, &"colombo"));
    }

    #[test]
    fn test_from_config_disabled() {
        let slot: SharedLastSeen<u8> = Arc::new(Mutex::new(None));
        let config = DedupConfig {
            enabled: false,
            scope: DedupScope::Shared,
        };
        assert!(!Deduplicator::from_config(&config, &slot).is_enabled());
    }
}
