//! Storage lifecycle: persisting finished sessions and quota-aware eviction.
//!
//! Persistence is two-phase: blob records are written before the project
//! record that references them, and the recent-projects index is updated
//! last. A crash can therefore leave orphan blobs (recoverable; the next
//! eviction pass removes them) but never a project pointing at bytes that
//! were not durably written.
//!
//! Eviction is deterministic and idempotent: orphaned blobs go first, then
//! projects past the maximum age (oldest `updated_at` first) while usage is
//! over the quota threshold, then the oldest projects beyond the hard count
//! ceiling. Deleting a project always removes its blobs in the same
//! operation.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::store::RecordStore;
use super::types::{
    BlobRecord, CleanupStats, EvictionReport, ExportBundle, ExportDocument, ExportFormat,
    ExportSegment, Project, ProjectSummary, RecentProjects, StorageStats, PROJECT_SCHEMA_VERSION,
};
use super::{blob_key, generate_id, project_key, BLOB_KEY_PREFIX, CLEANUP_STATS_KEY,
    PROJECT_KEY_PREFIX, RECENT_PROJECTS_KEY};
use crate::clock::Clock;
use crate::config::RetentionConfig;
use crate::error::{ZoomcastError, ZoomcastResult};
use crate::session::types::Session;
use crate::timeline::SealedTimeline;

/// Hot-project cache size; project records are small (blob bytes live in
/// separate records) so this is purely a deserialization saver.
const PROJECT_CACHE_SIZE: usize = 16;

/// Turns sealed timelines into durable Project + BlobRecord entries and
/// keeps total usage under quota.
pub struct StorageLifecycleManager {
    store: Arc<dyn RecordStore>,
    retention: RetentionConfig,
    clock: Arc<dyn Clock>,
    cache: Mutex<LruCache<String, Project>>,
    /// Project ids whose blobs are written but whose project record is not
    /// yet durable. Eviction must not treat these blobs as orphans.
    in_flight: Mutex<HashSet<String>>,
}

impl StorageLifecycleManager {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mut retention: RetentionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        retention.validate();
        Self {
            store,
            retention,
            clock,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(PROJECT_CACHE_SIZE).unwrap(),
            )),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    // ========================================================================
    // Persist
    // ========================================================================

    /// Persist a finished session: blobs first, then the project record,
    /// then the recent-projects index. Returns the new project id.
    ///
    /// Runs an opportunistic eviction pass afterwards; eviction failures are
    /// logged and retried on the next pass, never surfaced to the caller.
    pub fn persist(&self, session: &Session, sealed: SealedTimeline) -> ZoomcastResult<String> {
        let project_id = session.id.clone();
        self.in_flight.lock().insert(project_id.clone());
        let result = self.persist_inner(session, sealed);
        self.in_flight.lock().remove(&project_id);
        result
    }

    fn persist_inner(&self, session: &Session, sealed: SealedTimeline) -> ZoomcastResult<String> {
        let SealedTimeline { timeline, payloads } = sealed;
        let project_id = session.id.clone();
        let now = self.clock.wall_now();

        for (segment, chunk) in timeline.segments.iter().zip(payloads) {
            let record = BlobRecord::new(
                segment.blob_id.clone(),
                project_id.clone(),
                chunk.mime_type,
                chunk.data,
                now,
            );
            self.put_json_reclaiming(&blob_key(&record.id), &record)?;
        }

        let project = Project {
            schema_version: PROJECT_SCHEMA_VERSION,
            id: project_id.clone(),
            name: format!("Recording {}", now.format("%Y-%m-%d %H:%M")),
            created_at: now,
            updated_at: now,
            duration_ms: timeline.duration_ms,
            settings: session.settings.clone(),
            no_video_data: timeline.no_video_data,
            timeline,
        };
        self.put_json_reclaiming(&project_key(&project.id), &project)?;

        if let Err(e) = self.push_recent(project.summary()) {
            log::warn!("[STORAGE] failed to update recent projects index: {}", e);
        }

        log::info!(
            "[STORAGE] Persisted project {} ({} segments, {}ms, noVideoData={})",
            project.id,
            project.timeline.segments.len(),
            project.duration_ms,
            project.no_video_data
        );

        self.cache.lock().put(project.id.clone(), project);

        if let Err(e) = self.evict() {
            log::warn!("[CLEANUP] eviction after persist failed: {}", e);
        }

        Ok(project_id)
    }

    // ========================================================================
    // Project Operations
    // ========================================================================

    /// Load a project by id.
    pub fn load_project(&self, project_id: &str) -> ZoomcastResult<Project> {
        if let Some(project) = self.cache.lock().get(project_id) {
            return Ok(project.clone());
        }

        let project: Project = self
            .get_json(&project_key(project_id))?
            .ok_or_else(|| ZoomcastError::not_found("Project", project_id))?;

        if project.schema_version > PROJECT_SCHEMA_VERSION {
            return Err(ZoomcastError::UnsupportedSchema {
                found: project.schema_version,
                supported: PROJECT_SCHEMA_VERSION,
            });
        }

        self.cache.lock().put(project_id.to_string(), project.clone());
        Ok(project)
    }

    /// Save a caller-edited project (rename, settings). Bumps `updated_at`
    /// and refreshes the recent-projects index.
    pub fn save_project(&self, mut project: Project) -> ZoomcastResult<Project> {
        if project.schema_version > PROJECT_SCHEMA_VERSION {
            return Err(ZoomcastError::UnsupportedSchema {
                found: project.schema_version,
                supported: PROJECT_SCHEMA_VERSION,
            });
        }
        if self.get_json::<Project>(&project_key(&project.id))?.is_none() {
            return Err(ZoomcastError::not_found("Project", &project.id));
        }

        project.updated_at = self.clock.wall_now();
        self.put_json_reclaiming(&project_key(&project.id), &project)?;

        if let Err(e) = self.push_recent(project.summary()) {
            log::warn!("[STORAGE] failed to update recent projects index: {}", e);
        }

        self.cache.lock().put(project.id.clone(), project.clone());
        Ok(project)
    }

    /// Delete a project and all blobs it references, in one operation.
    pub fn delete_project(&self, project_id: &str) -> ZoomcastResult<()> {
        let project = self.load_project(project_id)?;
        self.delete_project_records(&project)?;
        log::info!("[STORAGE] Deleted project {}", project_id);
        Ok(())
    }

    /// All persisted project summaries, most recently updated first.
    pub fn list_projects(&self) -> ZoomcastResult<Vec<ProjectSummary>> {
        let mut summaries = Vec::new();
        for key in self.store.keys()? {
            if !key.starts_with(PROJECT_KEY_PREFIX) {
                continue;
            }
            if let Some(project) = self.get_json::<Project>(&key)? {
                summaries.push(project.summary());
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// The bounded most-recent-first index.
    pub fn recent_projects(&self) -> ZoomcastResult<Vec<ProjectSummary>> {
        Ok(self
            .get_json::<RecentProjects>(RECENT_PROJECTS_KEY)?
            .unwrap_or_default()
            .entries)
    }

    /// Duplicate a project, copying every referenced blob under the new id.
    ///
    /// Blob ids keep the `{projectId}_{segmentIndex}` composite convention
    /// (`replace(old_id, new_id)`), so eviction and reference accounting see
    /// the copy exactly like an original.
    pub fn duplicate_project(&self, project_id: &str) -> ZoomcastResult<Project> {
        let source = self.load_project(project_id)?;
        let new_id = generate_id();
        let now = self.clock.wall_now();

        let mut copy = source.clone();
        copy.id = new_id.clone();
        copy.name = format!("{} copy", source.name);
        copy.created_at = now;
        copy.updated_at = now;
        copy.timeline.session_id = new_id.clone();

        for segment in copy.timeline.segments.iter_mut() {
            let source_blob: BlobRecord = self
                .get_json(&blob_key(&segment.blob_id))?
                .ok_or_else(|| ZoomcastError::not_found("Blob", &segment.blob_id))?;

            let new_blob_id = segment.blob_id.replace(project_id, &new_id);
            let record = BlobRecord::new(
                new_blob_id.clone(),
                new_id.clone(),
                source_blob.mime_type,
                source_blob.data,
                now,
            );
            self.put_json_reclaiming(&blob_key(&record.id), &record)?;
            segment.blob_id = new_blob_id;
        }

        self.put_json_reclaiming(&project_key(&copy.id), &copy)?;

        if let Err(e) = self.push_recent(copy.summary()) {
            log::warn!("[STORAGE] failed to update recent projects index: {}", e);
        }

        log::info!("[STORAGE] Duplicated project {} -> {}", project_id, new_id);
        self.cache.lock().put(copy.id.clone(), copy.clone());
        Ok(copy)
    }

    /// Export a project with its segment payloads. Checksums are verified
    /// before any bytes leave the store.
    pub fn export_project(
        &self,
        project_id: &str,
        format: ExportFormat,
    ) -> ZoomcastResult<ExportBundle> {
        let project = self.load_project(project_id)?;

        let mut segments = Vec::with_capacity(project.timeline.segments.len());
        for segment in &project.timeline.segments {
            let record: BlobRecord = self
                .get_json(&blob_key(&segment.blob_id))?
                .ok_or_else(|| ZoomcastError::not_found("Blob", &segment.blob_id))?;
            if !record.verify() {
                return Err(ZoomcastError::Other(format!(
                    "checksum mismatch for blob {}",
                    record.id
                )));
            }
            segments.push(ExportSegment {
                blob_id: record.id,
                mime_type: record.mime_type,
                data: record.data,
            });
        }

        let safe_name: String = project
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        let bundle = match format {
            ExportFormat::Json => {
                let doc = ExportDocument { project, segments };
                ExportBundle {
                    format,
                    file_name: format!("{}.json", safe_name),
                    data: serde_json::to_vec_pretty(&doc)?,
                }
            }
            ExportFormat::Raw => {
                let mut data = Vec::new();
                for segment in &segments {
                    data.extend_from_slice(&segment.data);
                }
                ExportBundle {
                    format,
                    file_name: format!("{}.webm", safe_name),
                    data,
                }
            }
        };

        log::info!(
            "[STORAGE] Exported project {} as {:?} ({} bytes)",
            project_id,
            format,
            bundle.data.len()
        );
        Ok(bundle)
    }

    /// Load a blob record by id, for renderer collaborators.
    pub fn load_blob(&self, blob_id: &str) -> ZoomcastResult<BlobRecord> {
        self.get_json(&blob_key(blob_id))?
            .ok_or_else(|| ZoomcastError::not_found("Blob", blob_id))
    }

    /// Usage snapshot for the control surface.
    pub fn storage_stats(&self) -> ZoomcastResult<StorageStats> {
        let keys = self.store.keys()?;
        Ok(StorageStats {
            used_bytes: self.store.usage_bytes()?,
            capacity_bytes: self.store.capacity_bytes(),
            project_count: keys
                .iter()
                .filter(|k| k.starts_with(PROJECT_KEY_PREFIX))
                .count() as u32,
            blob_count: keys.iter().filter(|k| k.starts_with(BLOB_KEY_PREFIX)).count() as u32,
        })
    }

    /// Accumulated eviction counters.
    pub fn cleanup_stats(&self) -> ZoomcastResult<CleanupStats> {
        Ok(self
            .get_json::<CleanupStats>(CLEANUP_STATS_KEY)?
            .unwrap_or_default())
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Run one eviction pass. Idempotent: with nothing over quota and no
    /// orphans, this deletes nothing.
    pub fn evict(&self) -> ZoomcastResult<EvictionReport> {
        let mut report = EvictionReport::default();
        let keys = self.store.keys()?;
        let now = self.clock.wall_now();

        // Load the live project set once; unreadable records are skipped
        // (and logged), not deleted.
        let mut projects: Vec<Project> = Vec::new();
        for key in keys.iter().filter(|k| k.starts_with(PROJECT_KEY_PREFIX)) {
            match self.get_json::<Project>(key) {
                Ok(Some(project)) => projects.push(project),
                Ok(None) => {}
                Err(e) => log::warn!("[CLEANUP] skipping unreadable record {}: {}", key, e),
            }
        }
        let live_ids: HashSet<String> = projects.iter().map(|p| p.id.clone()).collect();

        // Phase 1: orphaned blobs, owned by no live project. Always safe to remove.
        // Blobs of an in-flight persist are not orphans yet.
        for key in keys.iter().filter(|k| k.starts_with(BLOB_KEY_PREFIX)) {
            match self.get_json::<BlobRecord>(key) {
                Ok(Some(blob))
                    if !live_ids.contains(&blob.owner_project_id)
                        && !self.in_flight.lock().contains(&blob.owner_project_id) =>
                {
                    self.store.delete(key)?;
                    report.orphan_blobs_removed += 1;
                }
                Ok(_) => {}
                Err(e) => log::warn!("[CLEANUP] skipping unreadable record {}: {}", key, e),
            }
        }

        // Phase 2: aged projects, oldest updated-time first, while usage is
        // over the quota threshold.
        projects.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        let threshold =
            (self.store.capacity_bytes() as f64 * self.retention.quota_threshold) as u64;
        let max_age = self.retention.max_project_age();
        let mut removed: HashSet<String> = HashSet::new();

        for project in &projects {
            if self.store.usage_bytes()? <= threshold {
                break;
            }
            if now.signed_duration_since(project.updated_at) <= max_age {
                // Sorted oldest-first: nothing further is old enough either.
                break;
            }
            self.delete_project_records(project)?;
            removed.insert(project.id.clone());
            report.aged_projects_removed += 1;
        }

        // Phase 3: hard project-count ceiling, regardless of age.
        let remaining: Vec<&Project> = projects
            .iter()
            .filter(|p| !removed.contains(&p.id))
            .collect();
        if remaining.len() > self.retention.max_projects {
            let excess = remaining.len() - self.retention.max_projects;
            for project in remaining.into_iter().take(excess) {
                self.delete_project_records(project)?;
                removed.insert(project.id.clone());
                report.overflow_projects_removed += 1;
            }
        }

        let mut stats = self.cleanup_stats()?;
        stats.runs += 1;
        stats.orphan_blobs_removed += report.orphan_blobs_removed;
        stats.aged_projects_removed += report.aged_projects_removed;
        stats.overflow_projects_removed += report.overflow_projects_removed;
        stats.last_run_at = Some(now);
        if let Err(e) = self.put_json(CLEANUP_STATS_KEY, &stats) {
            log::warn!("[CLEANUP] failed to persist cleanup stats: {}", e);
        }

        if !report.is_noop() {
            log::info!(
                "[CLEANUP] Evicted {} orphan blobs, {} aged projects, {} overflow projects",
                report.orphan_blobs_removed,
                report.aged_projects_removed,
                report.overflow_projects_removed
            );
        }

        Ok(report)
    }

    /// Run `evict` every `period` until the token is cancelled. Failures are
    /// logged and retried on the next tick.
    pub fn run_eviction_schedule(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.evict() {
                            log::warn!("[CLEANUP] scheduled eviction failed: {}", e);
                        }
                    }
                }
            }
        })
    }

    // ========================================================================
    // Shared Helpers
    // ========================================================================

    /// Delete a project record and then its blobs. Project-first ordering
    /// means a crash mid-way leaves recoverable orphan blobs, never a live
    /// project with dangling references.
    fn delete_project_records(&self, project: &Project) -> ZoomcastResult<()> {
        self.store.delete(&project_key(&project.id))?;
        for segment in &project.timeline.segments {
            self.store.delete(&blob_key(&segment.blob_id))?;
        }
        self.cache.lock().pop(&project.id);

        if let Ok(Some(mut recent)) = self.get_json::<RecentProjects>(RECENT_PROJECTS_KEY) {
            recent.remove(&project.id);
            if let Err(e) = self.put_json(RECENT_PROJECTS_KEY, &recent) {
                log::warn!("[STORAGE] failed to prune recent projects index: {}", e);
            }
        }
        Ok(())
    }

    fn push_recent(&self, summary: ProjectSummary) -> ZoomcastResult<()> {
        let mut recent = self
            .get_json::<RecentProjects>(RECENT_PROJECTS_KEY)?
            .unwrap_or_default();
        recent.push(summary, self.retention.recent_projects_cap);
        self.put_json(RECENT_PROJECTS_KEY, &recent)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> ZoomcastResult<Option<T>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> ZoomcastResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.put(key, &bytes)
    }

    /// Write a record; when the store reports the quota exceeded, run an
    /// eviction pass and retry once before surfacing `QuotaExceeded`.
    fn put_json_reclaiming<T: Serialize>(&self, key: &str, value: &T) -> ZoomcastResult<()> {
        let bytes = serde_json::to_vec(value)?;
        match self.store.put(key, &bytes) {
            Err(ZoomcastError::QuotaExceeded { used, capacity }) => {
                log::warn!(
                    "[STORAGE] quota hit writing {} ({}/{} bytes), evicting",
                    key,
                    used,
                    capacity
                );
                if let Err(e) = self.evict() {
                    log::warn!("[CLEANUP] reclaim eviction failed: {}", e);
                }
                self.store.put(key, &bytes)
            }
            other => other,
        }
    }
}
