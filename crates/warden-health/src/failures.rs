//! Consecutive-failure tracking per worker.

use std::collections::{HashMap, HashSet};

/// Raised once when a worker reaches the alert threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureAlert {
    pub instance_name: String,
    pub consecutive_failures: u32,
}

/// `instance_name -> consecutive non-online observations`.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    threshold: u32,
    counts: HashMap<String, u32>,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counts: HashMap::new(),
        }
    }

    /// Record one observation. Returns an alert exactly when the count
    /// reaches the threshold; further failures stay silent until a healthy
    /// observation resets the count.
    pub fn observe(&mut self, instance_name: &str, online: bool) -> Option<FailureAlert> {
        if online {
            self.counts.remove(instance_name);
            return None;
        }

        let count = self.counts.entry(instance_name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let current = *count;

        (current == self.threshold).then(|| FailureAlert {
            instance_name: instance_name.to_string(),
            consecutive_failures: current,
        })
    }

    /// Current count for a worker.
    pub fn count(&self, instance_name: &str) -> u32 {
        self.counts.get(instance_name).copied().unwrap_or(0)
    }

    /// Forget workers that are no longer listed by the supervisor.
    pub fn retain_seen(&mut self, seen: &HashSet<String>) {
        self.counts.retain(|name, _| seen.contains(name));
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_failures_do_not_alert() {
        let mut tracker = FailureTracker::new(3);
        assert!(tracker.observe("worker-a", false).is_none());
        assert!(tracker.observe("worker-a", false).is_none());
        assert_eq!(tracker.count("worker-a"), 2);
    }

    #[test]
    fn test_alert_fires_once_at_threshold() {
        let mut tracker = FailureTracker::new(3);
        let alerts: Vec<_> = (0..5)
            .filter_map(|_| tracker.observe("worker-a", false))
            .collect();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].consecutive_failures, 3);
    }

    #[test]
    fn test_healthy_observation_resets() {
        let mut tracker = FailureTracker::new(3);
        tracker.observe("worker-a", false);
        tracker.observe("worker-a", false);
        tracker.observe("worker-a", true);

        assert_eq!(tracker.count("worker-a"), 0);
        assert!(tracker.observe("worker-a", false).is_none());
    }

    #[test]
    fn test_retain_seen_drops_vanished_workers() {
        let mut tracker = FailureTracker::new(3);
        tracker.observe("worker-a", false);
        tracker.observe("worker-b", false);

        let seen: HashSet<String> = ["worker-b".to_string()].into_iter().collect();
        tracker.retain_seen(&seen);

        assert_eq!(tracker.count("worker-a"), 0);
        assert_eq!(tracker.count("worker-b"), 1);
    }
}
