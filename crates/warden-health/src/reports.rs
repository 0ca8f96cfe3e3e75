//! Rolling health report files.
//!
//! Each report is written to `health-report-<millis>.json`. The timestamp in
//! the file name strictly increases, even if the wall clock steps back, so
//! name order is write order. Only the newest `retain` files are kept.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};
use warden_types::HealthReport;

use crate::error::{HealthError, HealthResult};

const FILE_PREFIX: &str = "health-report-";
const FILE_SUFFIX: &str = ".json";

/// Directory of health report files.
#[derive(Debug)]
pub struct ReportStore {
    dir: PathBuf,
    retain: usize,
    last_stamp: Mutex<Option<i64>>,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>, retain: usize) -> Self {
        Self {
            dir: dir.into(),
            retain: retain.max(1),
            last_stamp: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a report, then prune old ones. Returns the new file's path.
    pub async fn write(&self, report: &HealthReport) -> HealthResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HealthError::report_io(&self.dir, e))?;

        let last = *self.last_stamp.lock();
        let floor = match last {
            Some(stamp) => stamp,
            None => self.stamps().await?.into_iter().map(|(s, _)| s).max().unwrap_or(0),
        };
        let stamp = report.timestamp.timestamp_millis().max(floor + 1);
        *self.last_stamp.lock() = Some(stamp);

        let path = self.dir.join(format!("{}{}{}", FILE_PREFIX, stamp, FILE_SUFFIX));
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| HealthError::report_io(&path, e))?;

        debug!(path = %path.display(), "Wrote health report");

        if let Err(e) = self.prune().await {
            warn!(error = %e, "Failed to prune health reports");
        }

        Ok(path)
    }

    /// Delete all but the newest `retain` reports. Returns how many were deleted.
    pub async fn prune(&self) -> HealthResult<usize> {
        let mut stamps = self.stamps().await?;
        if stamps.len() <= self.retain {
            return Ok(0);
        }

        stamps.sort_by(|a, b| b.0.cmp(&a.0));
        let mut deleted = 0;
        for (_, path) in stamps.into_iter().skip(self.retain) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(HealthError::report_io(&path, e)),
            }
        }

        debug!(deleted, "Pruned health reports");
        Ok(deleted)
    }

    /// The most recently written report, if any.
    pub async fn latest(&self) -> HealthResult<Option<HealthReport>> {
        let newest = self.stamps().await?.into_iter().max_by_key(|(stamp, _)| *stamp);

        match newest {
            Some((_, path)) => {
                let raw = tokio::fs::read(&path)
                    .await
                    .map_err(|e| HealthError::report_io(&path, e))?;
                Ok(Some(serde_json::from_slice(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Number of report files currently on disk.
    pub async fn count(&self) -> HealthResult<usize> {
        Ok(self.stamps().await?.len())
    }

    async fn stamps(&self) -> HealthResult<Vec<(i64, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HealthError::report_io(&self.dir, e)),
        };

        let mut stamps = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HealthError::report_io(&self.dir, e))?
        {
            let name = entry.file_name();
            if let Some(stamp) = name.to_str().and_then(parse_stamp) {
                stamps.push((stamp, entry.path()));
            }
        }
        Ok(stamps)
    }
}

fn parse_stamp(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use warden_types::{OverallStatus, ServiceStatus, WorkerCounts};

    fn report(overall_status: OverallStatus) -> HealthReport {
        HealthReport {
            timestamp: Utc::now(),
            overall_status,
            worker_counts: WorkerCounts::default(),
            manager_status: ServiceStatus {
                name: "warden".to_string(),
                status: None,
            },
            auxiliary_service_statuses: BTreeMap::new(),
            http_probe: None,
            unhealthy_workers: Vec::new(),
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_parse_stamp() {
        assert_eq!(parse_stamp("health-report-1700000000000.json"), Some(1_700_000_000_000));
        assert_eq!(parse_stamp("health-report-abc.json"), None);
        assert_eq!(parse_stamp("notes.txt"), None);
    }

    #[tokio::test]
    async fn test_retains_newest_reports() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path(), 10);

        for _ in 0..13 {
            store.write(&report(OverallStatus::Healthy)).await.unwrap();
        }
        let last = store.write(&report(OverallStatus::Degraded)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 10);
        assert!(last.exists());
        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.overall_status, OverallStatus::Degraded);
    }

    #[tokio::test]
    async fn test_stamps_strictly_increase() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path(), 10);
        let fixed = report(OverallStatus::Healthy);

        let first = store.write(&fixed).await.unwrap();
        let second = store.write(&fixed).await.unwrap();

        let stamp = |p: &PathBuf| parse_stamp(p.file_name().unwrap().to_str().unwrap()).unwrap();
        assert!(stamp(&second) > stamp(&first));
    }

    #[tokio::test]
    async fn test_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("README"), b"keep me").await.unwrap();
        let store = ReportStore::new(dir.path(), 1);

        store.write(&report(OverallStatus::Healthy)).await.unwrap();
        store.write(&report(OverallStatus::Healthy)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(dir.path().join("README").exists());
    }

    #[tokio::test]
    async fn test_latest_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("missing"), 10);
        assert!(store.latest().await.unwrap().is_none());
    }
}
