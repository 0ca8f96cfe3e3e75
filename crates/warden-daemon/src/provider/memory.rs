//! Static desired-state provider

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use warden_types::DesiredStateEntry;

use super::traits::DesiredStateProvider;
use crate::error::{ProviderError, ProviderResult};

/// Desired state held in memory. Used for development configurations and
/// tests; the entries can be replaced at runtime.
#[derive(Debug, Default)]
pub struct StaticDesiredState {
    entries: RwLock<Vec<DesiredStateEntry>>,
    failing: AtomicBool,
}

impl StaticDesiredState {
    pub fn new(entries: Vec<DesiredStateEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
            failing: AtomicBool::new(false),
        }
    }

    /// Replace the desired entries.
    pub fn set(&self, entries: Vec<DesiredStateEntry>) {
        *self.entries.write() = entries;
    }

    /// Make fetches fail (or succeed again).
    pub fn fail_fetches(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DesiredStateProvider for StaticDesiredState {
    async fn fetch(&self) -> ProviderResult<Vec<DesiredStateEntry>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("injected fetch failure".to_string()));
        }
        Ok(self.entries.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_replaces_entries() {
        let provider = StaticDesiredState::new(vec![DesiredStateEntry::new("t1", "r1")]);
        provider.set(vec![DesiredStateEntry::new("t2", "r2")]);

        let entries = provider.fetch().await.unwrap();
        assert_eq!(entries, vec![DesiredStateEntry::new("t2", "r2")]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let provider = StaticDesiredState::default();
        provider.fail_fetches(true);
        assert!(matches!(provider.fetch().await, Err(ProviderError::Unavailable(_))));

        provider.fail_fetches(false);
        assert!(provider.fetch().await.unwrap().is_empty());
    }
}
