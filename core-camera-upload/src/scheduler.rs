//! # Upload Scheduler
//!
//! Drives camera upload passes: gating, indexing, delta computation and
//! bounded-concurrency execution, repeated on a fixed interval.
//!
//! ## Overview
//!
//! A pass runs under a run-level lock, so at most one is in flight. A pass
//! that starts less than the cooldown after the previous one ended returns
//! [`RunOutcome::CoolingDown`] without doing anything.
//!
//! ### Gates
//! Checked in order; the first failure ends the pass:
//! 1. Logged in
//! 2. Camera upload enabled
//! 3. Destination folder configured and a valid UUID
//! 4. Online
//! 5. On Wi-Fi when Wi-Fi-only uploads are on
//! 6. Media permissions granted (the prompt is shown at most once per
//!    scheduler)
//! 7. Destination folder still present and not trashed; otherwise camera
//!    upload is disabled and its configuration reset
//!
//! ### Execution
//! 1. Build the local and remote indexes concurrently
//! 2. Compute deltas
//! 3. Queue at most `max_queued_per_run` deltas whose asset has fewer than
//!    `max_failures` recorded failures
//! 4. Each queued asset takes an upload slot from a semaphore of
//!    `max_concurrent_uploads` permits, then either refreshes its state
//!    (content unchanged) or materializes, enqueues and cleans up its files
//!    and then persists its state
//!
//! Per-asset failures bump an in-memory failure counter and never fail the
//! pass. State is written once the files were handed to the upload queue,
//! whether or not the queue accepted them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_camera_upload::UploadScheduler;
//!
//! let scheduler = UploadScheduler::new(config);
//! scheduler.start().await;
//!
//! // "Sync now" from the UI
//! let outcome = scheduler.run_once().await;
//!
//! scheduler.stop().await;
//! ```

use crate::delta::{get_deltas, Delta};
use crate::error::{CameraUploadError, Result};
use crate::local_index::LocalIndexBuilder;
use crate::materializer::FileMaterializer;
use crate::remote_index::RemoteIndexLoader;
use crate::run::{GateFailure, RunOutcome, RunPhase, RunSummary};
use crate::settings::{CameraUploadSettings, UploadProgress, UserSettings};
use crate::state::{PerAssetUploadState, SettingsUploadStateRepository, UploadStateRepository};
use bridge_traits::cloud::{RemoteDirectory, UploadQueue, UploadRequest};
use bridge_traits::media::PermissionGate;
use bridge_traits::network::NetworkMonitor;
use bridge_traits::storage::FileSystemAccess;
use core_runtime::config::{CameraUploadConfig, SchedulerSettings};
use core_runtime::events::{CameraUploadEvent, CoreEvent, EventBus};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one queued asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetResult {
    Uploaded,
    Unchanged,
    Failed,
}

/// Progress of the executing phase.
struct RunProgress {
    already_synced: u64,
    total: u64,
    completed: AtomicU64,
}

struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct UploadScheduler {
    settings: CameraUploadSettings,
    states: Arc<dyn UploadStateRepository>,
    local_index: Arc<LocalIndexBuilder>,
    remote_index: Arc<RemoteIndexLoader>,
    materializer: Arc<FileMaterializer>,
    remote_directory: Arc<dyn RemoteDirectory>,
    upload_queue: Arc<dyn UploadQueue>,
    file_system: Arc<dyn FileSystemAccess>,
    network_monitor: Arc<dyn NetworkMonitor>,
    permission_gate: Arc<dyn PermissionGate>,
    event_bus: EventBus,
    tunables: SchedulerSettings,

    run_lock: Arc<Mutex<()>>,
    upload_slots: Arc<Semaphore>,
    phase: Arc<StdMutex<RunPhase>>,
    cooldown_until: Arc<StdMutex<Option<Instant>>>,
    failures: Arc<StdMutex<HashMap<String, u32>>>,
    permission_prompted: Arc<AtomicBool>,
    permission_granted: Arc<AtomicBool>,
    task: Arc<Mutex<Option<PeriodicTask>>>,
}

impl UploadScheduler {
    pub fn new(config: CameraUploadConfig) -> Self {
        let states: Arc<dyn UploadStateRepository> = Arc::new(
            SettingsUploadStateRepository::new(config.settings_store.clone()),
        );
        Self::with_state_repository(config, states)
    }

    /// Create a scheduler with a custom per-asset state store
    pub fn with_state_repository(
        config: CameraUploadConfig,
        states: Arc<dyn UploadStateRepository>,
    ) -> Self {
        let tunables = config.scheduler.clone();

        Self {
            settings: CameraUploadSettings::new(
                config.settings_store.clone(),
                config.clock.clone(),
            ),
            states,
            local_index: Arc::new(LocalIndexBuilder::new(
                config.media_library.clone(),
                tunables.asset_page_size,
            )),
            remote_index: Arc::new(RemoteIndexLoader::new(
                config.remote_directory.clone(),
                config.metadata_codec.clone(),
                config.settings_store.clone(),
            )),
            materializer: Arc::new(FileMaterializer::new(
                config.media_library.clone(),
                config.file_system.clone(),
                config.image_transcoder.clone(),
                config.clock.clone(),
            )),
            remote_directory: config.remote_directory,
            upload_queue: config.upload_queue,
            file_system: config.file_system,
            network_monitor: config.network_monitor,
            permission_gate: config.permission_gate,
            event_bus: config.event_bus,
            run_lock: Arc::new(Mutex::new(())),
            upload_slots: Arc::new(Semaphore::new(tunables.max_concurrent_uploads)),
            phase: Arc::new(StdMutex::new(RunPhase::Idle)),
            cooldown_until: Arc::new(StdMutex::new(None)),
            failures: Arc::new(StdMutex::new(HashMap::new())),
            permission_prompted: Arc::new(AtomicBool::new(false)),
            permission_granted: Arc::new(AtomicBool::new(false)),
            task: Arc::new(Mutex::new(None)),
            tunables,
        }
    }

    /// Clone for background task (shares all state)
    fn clone_for_task(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            states: Arc::clone(&self.states),
            local_index: Arc::clone(&self.local_index),
            remote_index: Arc::clone(&self.remote_index),
            materializer: Arc::clone(&self.materializer),
            remote_directory: Arc::clone(&self.remote_directory),
            upload_queue: Arc::clone(&self.upload_queue),
            file_system: Arc::clone(&self.file_system),
            network_monitor: Arc::clone(&self.network_monitor),
            permission_gate: Arc::clone(&self.permission_gate),
            event_bus: self.event_bus.clone(),
            tunables: self.tunables.clone(),
            run_lock: Arc::clone(&self.run_lock),
            upload_slots: Arc::clone(&self.upload_slots),
            phase: Arc::clone(&self.phase),
            cooldown_until: Arc::clone(&self.cooldown_until),
            failures: Arc::clone(&self.failures),
            permission_prompted: Arc::clone(&self.permission_prompted),
            permission_granted: Arc::clone(&self.permission_granted),
            task: Arc::clone(&self.task),
        }
    }

    pub fn settings(&self) -> &CameraUploadSettings {
        &self.settings
    }

    /// Current phase of the pass in flight
    pub fn phase(&self) -> RunPhase {
        self.phase.lock().map(|p| *p).unwrap_or_default()
    }

    /// Failures recorded for an asset since this scheduler was created
    pub fn failure_count(&self, asset_id: &str) -> u32 {
        self.failures
            .lock()
            .map(|f| f.get(asset_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub async fn progress(&self) -> Result<UploadProgress> {
        self.settings.progress().await
    }

    /// Forget every per-asset upload record
    pub async fn reset_upload_state(&self) -> Result<usize> {
        self.states.reset().await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the periodic pass loop. A running loop is left untouched.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("Camera upload loop already running");
            return;
        }

        let token = CancellationToken::new();
        let scheduler = self.clone_for_task();
        let loop_token = token.clone();
        let interval = self.tunables.run_interval;

        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Camera upload loop started");
            loop {
                // A pass in flight is allowed to finish
                let outcome = scheduler.run_guarded().await;
                debug!(outcome = ?outcome, "Camera upload pass finished");

                if loop_token.is_cancelled() {
                    break;
                }

                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Camera upload loop stopped");
        });

        *task = Some(PeriodicTask { token, handle });
    }

    /// Stop the periodic loop and wait for it to exit. A pass in flight
    /// completes first.
    pub async fn stop(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Camera upload loop ended abnormally");
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    // ========================================================================
    // Pass
    // ========================================================================

    /// Run one pass now. Never fails; errors are reported in the outcome.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> RunOutcome {
        let _guard = self.run_lock.lock().await;

        if self.cooling_down() {
            debug!("Camera upload cooling down");
            return RunOutcome::CoolingDown;
        }

        self.emit(CameraUploadEvent::RunStarted);

        let outcome = match self.run_pass().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Camera upload pass failed");
                self.emit(CameraUploadEvent::RunFailed {
                    message: e.to_string(),
                });
                RunOutcome::Failed(e.to_string())
            }
        };

        self.set_phase(RunPhase::Idle);
        self.arm_cooldown();
        outcome
    }

    /// `run_once` for the periodic loop; a panicking pass is reported as a
    /// failed run and the loop keeps going.
    async fn run_guarded(&self) -> RunOutcome {
        match AssertUnwindSafe(self.run_once()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Camera upload pass panicked");
                self.emit(CameraUploadEvent::RunFailed {
                    message: message.clone(),
                });
                self.set_phase(RunPhase::Idle);
                self.arm_cooldown();
                RunOutcome::Failed(message)
            }
        }
    }

    async fn run_pass(&self) -> Result<RunOutcome> {
        self.advance(RunPhase::Gating)?;

        let (settings, folder_uuid) = match self.check_gates().await? {
            Ok(open) => open,
            Err(gate) => {
                info!(gate = %gate, "Camera upload gated");
                self.emit(CameraUploadEvent::GateBlocked {
                    gate: gate.to_string(),
                });
                return Ok(RunOutcome::Skipped(gate));
            }
        };

        self.advance(RunPhase::Indexing)?;
        let master_keys = self.settings.master_keys().await?;
        let (local, remote) = tokio::try_join!(
            self.local_index.build(&settings),
            self.remote_index.load(&folder_uuid, &master_keys),
        )?;

        self.advance(RunPhase::Diffing)?;
        let deltas = get_deltas(&local, &remote, self.states.as_ref()).await?;

        let total = local.len() as u64;
        let progress = RunProgress {
            already_synced: total.saturating_sub(deltas.len() as u64),
            total,
            completed: AtomicU64::new(0),
        };
        self.publish_progress(progress.already_synced, total).await;

        self.advance(RunPhase::Executing)?;
        let queued = self.select_queued(&deltas);
        info!(
            deltas = deltas.len(),
            queued = queued.len(),
            total,
            "Executing camera upload deltas"
        );

        let results = join_all(
            queued
                .iter()
                .map(|delta| self.execute_delta(delta, &settings, &folder_uuid, &progress)),
        )
        .await;

        let count = |wanted: AssetResult| results.iter().filter(|r| **r == wanted).count() as u64;
        let summary = RunSummary {
            deltas: deltas.len() as u64,
            uploaded: count(AssetResult::Uploaded),
            skipped: count(AssetResult::Unchanged),
            failed: count(AssetResult::Failed),
            total,
        };

        if queued.is_empty() {
            self.publish_progress(total, total).await;
        } else {
            let completed = progress.completed.load(Ordering::SeqCst);
            self.publish_progress(progress.already_synced + completed, total)
                .await;
        }

        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Camera upload pass completed"
        );
        self.emit(CameraUploadEvent::RunCompleted {
            deltas: summary.deltas,
            uploaded: summary.uploaded,
            skipped: summary.skipped,
            failed: summary.failed,
        });

        Ok(RunOutcome::Completed(summary))
    }

    /// Settings snapshot and folder when every gate passes
    async fn check_gates(
        &self,
    ) -> Result<std::result::Result<(UserSettings, String), GateFailure>> {
        let Some(user_id) = self.settings.current_user().await? else {
            return Ok(Err(GateFailure::NotLoggedIn));
        };

        let settings = self.settings.user_settings(&user_id).await?;
        if !settings.enabled {
            return Ok(Err(GateFailure::Disabled));
        }

        let Some(folder_uuid) = settings.valid_folder_uuid().map(str::to_string) else {
            return Ok(Err(GateFailure::NoDestination));
        };

        if !self.network_monitor.is_connected().await {
            return Ok(Err(GateFailure::Offline));
        }

        if settings.wifi_only && !self.network_monitor.is_wifi().await {
            return Ok(Err(GateFailure::WifiRequired));
        }

        if !self.permissions_granted().await {
            return Ok(Err(GateFailure::PermissionsMissing));
        }

        let presence = self.remote_directory.folder_presence(&folder_uuid).await?;
        if !presence.present || presence.trashed {
            warn!(folder_uuid = %folder_uuid, "Camera upload folder is gone, disabling");
            self.settings.disable(&user_id, true).await?;
            self.emit(CameraUploadEvent::Disabled { reset: true });
            return Ok(Err(GateFailure::DestinationGone));
        }

        Ok(Ok((settings, folder_uuid)))
    }

    /// The first check may prompt; later checks only probe.
    async fn permissions_granted(&self) -> bool {
        if self.permission_granted.load(Ordering::SeqCst) {
            return true;
        }

        let prompt = !self.permission_prompted.swap(true, Ordering::SeqCst);
        match self.permission_gate.media_permissions_granted(prompt).await {
            Ok(granted) => {
                self.permission_granted.store(granted, Ordering::SeqCst);
                granted
            }
            Err(e) => {
                warn!(error = %e, "Permission check failed");
                false
            }
        }
    }

    fn select_queued<'a>(&self, deltas: &'a [Delta]) -> Vec<&'a Delta> {
        deltas
            .iter()
            .filter(|delta| self.failure_count(&delta.item.id) < self.tunables.max_failures)
            .take(self.tunables.max_queued_per_run)
            .collect()
    }

    // ========================================================================
    // Per-asset execution
    // ========================================================================

    async fn execute_delta(
        &self,
        delta: &Delta,
        settings: &UserSettings,
        folder_uuid: &str,
        progress: &RunProgress,
    ) -> AssetResult {
        let _permit = match self.upload_slots.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Upload slots closed");
                return AssetResult::Failed;
            }
        };

        match self.upload_asset(delta, settings, folder_uuid).await {
            Ok(result) => {
                let completed = progress.completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.publish_progress(progress.already_synced + completed, progress.total)
                    .await;
                result
            }
            Err(e) => {
                let failures = self.record_failure(&delta.item.id);
                warn!(
                    asset_id = %delta.item.id,
                    kind = %delta.kind,
                    failures,
                    error = %e,
                    "Camera upload of asset failed"
                );
                self.emit(CameraUploadEvent::AssetFailed {
                    asset_id: delta.item.id.clone(),
                    message: e.to_string(),
                    failures,
                });
                AssetResult::Failed
            }
        }
    }

    async fn upload_asset(
        &self,
        delta: &Delta,
        settings: &UserSettings,
        folder_uuid: &str,
    ) -> Result<AssetResult> {
        let entry = &delta.item;
        let asset = entry
            .asset
            .as_ref()
            .ok_or_else(|| CameraUploadError::NoAssetUri {
                asset_id: entry.id.clone(),
            })?;

        let uri = self.materializer.resolve_uri(asset).await?;
        let stat = self.file_system.metadata(Path::new(&uri)).await.ok();

        if let Some(stat) = &stat {
            if let Some(state) = self.states.get(&entry.id).await? {
                if state.matches_any(entry.last_modified, stat) {
                    debug!(asset_id = %entry.id, "Asset unchanged, refreshing state");
                    self.states
                        .put(
                            &entry.id,
                            PerAssetUploadState::observed(entry.last_modified, stat),
                        )
                        .await?;
                    return Ok(AssetResult::Unchanged);
                }
            }
        }

        let files = self
            .materializer
            .materialize(asset, &uri, &settings.materialize)
            .await?;

        for file in files {
            let request = UploadRequest {
                path: file.path.clone(),
                name: file.name,
                mime_type: file.mime_type,
                size: file.size,
                last_modified: file.last_modified,
                parent_uuid: folder_uuid.to_string(),
                is_camera_upload: true,
            };
            if let Err(e) = self.upload_queue.enqueue(request).await {
                warn!(asset_id = %entry.id, error = %e, "Upload queue rejected file");
            }
            self.materializer.discard(&file.path).await;
        }

        if let Some(stat) = &stat {
            if let Err(e) = self
                .states
                .put(
                    &entry.id,
                    PerAssetUploadState::observed(entry.last_modified, stat),
                )
                .await
            {
                warn!(asset_id = %entry.id, error = %e, "Could not store upload state");
            }
        }

        debug!(asset_id = %entry.id, kind = %delta.kind, "Queued asset");
        Ok(AssetResult::Uploaded)
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn record_failure(&self, asset_id: &str) -> u32 {
        match self.failures.lock() {
            Ok(mut failures) => {
                let count = failures.entry(asset_id.to_string()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => 0,
        }
    }

    fn cooling_down(&self) -> bool {
        self.cooldown_until
            .lock()
            .ok()
            .and_then(|until| *until)
            .is_some_and(|until| Instant::now() < until)
    }

    fn arm_cooldown(&self) {
        if let Ok(mut until) = self.cooldown_until.lock() {
            *until = Some(Instant::now() + self.tunables.run_cooldown);
        }
    }

    fn advance(&self, next: RunPhase) -> Result<()> {
        let current = self.phase();
        let next = current.transition(next)?;
        self.set_phase(next);
        Ok(())
    }

    fn set_phase(&self, phase: RunPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    async fn publish_progress(&self, uploaded: u64, total: u64) {
        let progress = UploadProgress { uploaded, total };
        if let Err(e) = self.settings.set_progress(progress).await {
            warn!(error = %e, "Could not store camera upload progress");
        }
        self.emit(CameraUploadEvent::Progress { uploaded, total });
    }

    fn emit(&self, event: CameraUploadEvent) {
        self.event_bus.emit(CoreEvent::CameraUpload(event)).ok();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("pass panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("pass panicked: {}", message)
    } else {
        "pass panicked".to_string()
    }
}
