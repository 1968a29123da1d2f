//! Export tasks: a pipeline run that can be started, polled and cancelled.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{error, info};

use crate::error::{CloudError, Result};
use crate::export::pipeline::run_export;
use crate::export::request::ExportRequest;
use crate::range_reader::HttpOptions;

/// Lifecycle of an export task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Still waiting or running
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Ready | TaskState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Ready => "READY",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
            TaskState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub id: String,
    pub state: TaskState,
    /// Output file, set once the task completes
    pub destination: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl TaskStatus {
    fn ready(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: TaskState::Ready,
            destination: None,
            error_message: None,
        }
    }
}

/// A long-running export that is polled for its state.
pub trait ExportTask: Send {
    fn id(&self) -> &str;

    /// Begin work. Fails if the task was already started.
    fn start(&mut self) -> Result<()>;

    fn status(&self) -> TaskStatus;

    /// Request cancellation; a running task stops at its next checkpoint.
    fn cancel(&self);
}

/// Runs [`run_export`] on a worker thread.
pub struct LocalExportTask {
    id: String,
    request: Option<ExportRequest>,
    http: HttpOptions,
    status: Arc<Mutex<TaskStatus>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LocalExportTask {
    pub fn new(request: ExportRequest, http: HttpOptions) -> Self {
        let id = format!("{}_{}", request.destination.prefix, request.scene.date_string());
        Self {
            status: Arc::new(Mutex::new(TaskStatus::ready(&id))),
            id,
            request: Some(request),
            http,
            cancel: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Block until the worker thread exits and return the final status.
    pub fn join(&mut self) -> TaskStatus {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                let mut s = lock(&self.status);
                s.state = TaskState::Failed;
                s.error_message = Some("export worker panicked".into());
            }
        }
        self.status()
    }
}

fn lock(status: &Mutex<TaskStatus>) -> MutexGuard<'_, TaskStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

impl ExportTask for LocalExportTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> Result<()> {
        let request = self.request.take().ok_or_else(|| CloudError::Task {
            id: self.id.clone(),
            reason: "task already started".into(),
        })?;
        if self.cancel.load(Ordering::SeqCst) {
            return Ok(());
        }

        lock(&self.status).state = TaskState::Running;
        info!(id = %self.id, "export task started");

        let status = Arc::clone(&self.status);
        let cancel = Arc::clone(&self.cancel);
        let http = self.http.clone();
        let id = self.id.clone();

        let handle = thread::Builder::new()
            .name(format!("export-{id}"))
            .spawn(move || {
                let result = run_export(&request, &http, &|| cancel.load(Ordering::SeqCst));
                let mut s = lock(&status);
                match result {
                    Ok(output) => {
                        s.state = TaskState::Completed;
                        s.destination = Some(output.path);
                    }
                    Err(_) if cancel.load(Ordering::SeqCst) => {
                        s.state = TaskState::Cancelled;
                    }
                    Err(e) => {
                        error!(id = %id, error = %e, "export task failed");
                        s.state = TaskState::Failed;
                        s.error_message = Some(e.to_string());
                    }
                }
            })
            .map_err(|e| CloudError::Task {
                id: self.id.clone(),
                reason: format!("failed to spawn worker: {e}"),
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    fn status(&self) -> TaskStatus {
        lock(&self.status).clone()
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let mut s = lock(&self.status);
        if s.state == TaskState::Ready {
            s.state = TaskState::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::request::{ExportDestination, ExportKind};
    use crate::geometry::Aoi;
    use crate::scene::SceneInfo;
    use chrono::NaiveDate;
    use urbanlens_algorithms::imagery::SpectralIndex;

    fn request(assets: Vec<String>, folder: PathBuf) -> ExportRequest {
        ExportRequest {
            scene: SceneInfo {
                id: "S2B_TEST".into(),
                collection: "sentinel-2-l2a".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                cloud_cover: Some(1.0),
                epsg: Some(32643),
            },
            dn_offsets: vec![0.0; assets.len()],
            assets,
            kind: ExportKind::BandPair(SpectralIndex::Ndvi),
            aoi: Aoi::from_bbox(77.04, 28.46, 77.05, 28.47).unwrap(),
            scale_m: 10.0,
            destination: ExportDestination::new(folder, "sector14"),
        }
    }

    #[test]
    fn states() {
        assert!(TaskState::Ready.is_active());
        assert!(TaskState::Running.is_active());
        assert!(!TaskState::Completed.is_active());
        assert!(!TaskState::Failed.is_active());
        assert!(!TaskState::Cancelled.is_active());
        assert_eq!(TaskState::Completed.to_string(), "COMPLETED");
    }

    #[test]
    fn missing_asset_fails_with_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = LocalExportTask::new(
            request(vec!["/no/such/red.tif".into(), "/no/such/nir.tif".into()], dir.path().into()),
            HttpOptions::default(),
        );
        assert_eq!(task.id(), "sector14_2024-01-10");
        assert_eq!(task.status().state, TaskState::Ready);

        task.start().unwrap();
        let status = task.join();
        assert_eq!(status.state, TaskState::Failed);
        assert!(status.error_message.is_some());
        assert!(status.destination.is_none());
    }

    #[test]
    fn cannot_start_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut task =
            LocalExportTask::new(request(vec![], dir.path().into()), HttpOptions::default());
        task.cancel();
        assert_eq!(task.status().state, TaskState::Cancelled);
        task.start().unwrap();
        assert!(matches!(task.start(), Err(CloudError::Task { .. })));
        assert_eq!(task.join().state, TaskState::Cancelled);
    }
}
