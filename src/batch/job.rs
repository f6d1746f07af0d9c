//! Resumable batch jobs saved as JSON files.
//!
//! One file per job, `<dir>/<job_id>.json`, rewritten after every finished
//! item so a crashed run can pick up the items it never reached.

use super::item::{BatchItem, ProcessingResult};
use crate::types::GenerationStatus;
use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

/// Saved state of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationJob {
    pub job_id: String,
    /// Free-form label of what the job produces (`images`, `videos`, ...).
    pub mode: String,
    pub items: Vec<BatchItem>,
    #[serde(default)]
    pub results: BTreeMap<String, ProcessingResult>,
    #[serde(default)]
    pub completed_count: usize,
    #[serde(default)]
    pub failed_count: usize,
    #[serde(default)]
    pub status: JobStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub current_step: String,
}

impl AutomationJob {
    pub fn new(mode: impl Into<String>, items: Vec<BatchItem>, settings: Map<String, Value>) -> Self {
        let mut job_id = Uuid::new_v4().simple().to_string();
        job_id.truncate(8);
        Self {
            job_id,
            mode: mode.into(),
            items,
            results: BTreeMap::new(),
            completed_count: 0,
            failed_count: 0,
            status: JobStatus::Pending,
            last_updated: Utc::now(),
            settings,
            current_step: String::new(),
        }
    }

    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count()
            .saturating_sub(self.completed_count + self.failed_count)
    }

    pub fn is_resumable(&self) -> bool {
        matches!(self.status, JobStatus::Running | JobStatus::Paused) && self.remaining_count() > 0
    }

    /// Items without a recorded result.
    pub fn pending_items(&self) -> Vec<BatchItem> {
        self.items
            .iter()
            .filter(|item| !self.results.contains_key(&item.id))
            .cloned()
            .collect()
    }

    /// Record an item's result and bump the matching counter.
    ///
    /// A result that replaces an earlier one for the same id moves the
    /// counters rather than double-counting.
    pub fn update_result(&mut self, result: ProcessingResult) {
        if let Some(previous) = self.results.remove(&result.id) {
            self.adjust(previous.status, false);
        }
        self.adjust(result.status, true);
        self.results.insert(result.id.clone(), result);
        self.last_updated = Utc::now();
    }

    fn adjust(&mut self, status: GenerationStatus, add: bool) {
        let counter = match status {
            GenerationStatus::Completed => &mut self.completed_count,
            GenerationStatus::Failed => &mut self.failed_count,
            GenerationStatus::Processing => return,
        };
        *counter = if add {
            *counter + 1
        } else {
            counter.saturating_sub(1)
        };
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.last_updated = Utc::now();
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.job_id.clone(),
            mode: self.mode.clone(),
            status: self.status,
            completed: self.completed_count,
            failed: self.failed_count,
            total: self.total_count(),
            last_updated: self.last_updated,
            current_step: self.current_step.clone(),
        }
    }
}

/// Listing row for a saved job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub mode: String,
    pub status: JobStatus,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub last_updated: DateTime<Utc>,
    pub current_step: String,
}

/// Directory of saved jobs.
#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh pending job. Nothing is written until [`save`](Self::save).
    pub fn create(
        &self,
        mode: impl Into<String>,
        items: Vec<BatchItem>,
        settings: Map<String, Value>,
    ) -> AutomationJob {
        AutomationJob::new(mode, items, settings)
    }

    pub async fn save(&self, job: &AutomationJob) -> Result<()> {
        let path = self.path_for(&job.job_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(job)?;

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(job_id = job.job_id.as_str(), status = job.status.as_str(), "job saved");
        Ok(())
    }

    /// `Ok(None)` when no such job was saved.
    pub async fn load(&self, job_id: &str) -> Result<Option<AutomationJob>> {
        let path = self.path_for(job_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Returns whether a file was removed.
    pub async fn delete(&self, job_id: &str) -> Result<bool> {
        let path = self.path_for(job_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every saved job, unreadable files skipped.
    pub async fn list(&self) -> Result<Vec<AutomationJob>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read(&path)
                .await
                .map_err(Error::from)
                .and_then(|b| serde_json::from_slice::<AutomationJob>(&b).map_err(Error::from));
            match parsed {
                Ok(job) => jobs.push(job),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable job file"),
            }
        }
        Ok(jobs)
    }

    /// Running or paused jobs with items left, newest first.
    pub async fn list_resumable(&self) -> Result<Vec<JobSummary>> {
        let mut resumable: Vec<JobSummary> = self
            .list()
            .await?
            .iter()
            .filter(|j| j.is_resumable())
            .map(AutomationJob::summary)
            .collect();
        resumable.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(resumable)
    }

    /// Delete job files not modified within `max_age`. Returns how many went.
    pub async fn cleanup_older_than(&self, max_age: Duration) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let cutoff = SystemTime::now().checked_sub(max_age);
        let mut deleted = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if cutoff.map_or(false, |c| modified < c) && tokio::fs::remove_file(&path).await.is_ok() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn path_for(&self, job_id: &str) -> Result<PathBuf> {
        let valid = !job_id.is_empty()
            && job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::validation_with_context(
                "invalid job id",
                ErrorContext::new()
                    .with_field_path("job_id")
                    .with_details(job_id.to_string()),
            ));
        }
        Ok(self.dir.join(format!("{}.json", job_id)))
    }
}
