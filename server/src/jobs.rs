use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use common::{Job, JobStatus};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("illegal transition for job '{id}': {reason}")]
    IllegalTransition { id: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("jobs file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cambio parcial sobre un job. Solo se construye por los helpers de abajo,
/// que son las únicas transiciones legales de la máquina de estados.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub rows_fetched: Option<u64>,
    pub progress_message: Option<String>,
    pub output_file: Option<String>,
    pub error_message: Option<String>,
}

impl JobPatch {
    /// pending -> running, cuando el servicio de analytics aceptó el pedido
    pub fn to_running(message: &str) -> JobPatch {
        JobPatch {
            status: Some(JobStatus::Running),
            progress_message: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// avance de filas mientras corre, sin cambio de estado
    pub fn progress(rows_fetched: u64, message: &str) -> JobPatch {
        JobPatch {
            rows_fetched: Some(rows_fetched),
            progress_message: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// running -> completed
    pub fn complete(output_file: &str, rows_fetched: u64) -> JobPatch {
        JobPatch {
            status: Some(JobStatus::Completed),
            rows_fetched: Some(rows_fetched),
            output_file: Some(output_file.to_string()),
            ..Default::default()
        }
    }

    /// pending|running -> failed
    pub fn fail(error_message: &str) -> JobPatch {
        JobPatch {
            status: Some(JobStatus::Failed),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// pending|running -> cancelled
    pub fn cancel() -> JobPatch {
        JobPatch {
            status: Some(JobStatus::Cancelled),
            ..Default::default()
        }
    }
}

/// Historial de ejecuciones respaldado en un archivo JSON. Solo se agrega
/// y se actualiza; los jobs nunca se borran de acá.
pub struct JobStore {
    path: PathBuf,
    jobs: Mutex<Vec<Job>>,
}

impl JobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<JobStore, StoreError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            fs::write(&path, "[]")?;
        }

        let raw = fs::read_to_string(&path)?;
        let jobs: Vec<Job> = serde_json::from_str(&raw)?;

        info!("historial de jobs cargado: {} jobs desde {:?}", jobs.len(), path);

        Ok(JobStore {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    fn persist(&self, jobs: &[Job]) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(jobs)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn create(&self, task_name: &str, test_mode: bool) -> Result<Job, StoreError> {
        let job = Job::new(task_name, test_mode);

        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(job.clone());
        self.persist(&jobs)?;

        info!("job {} creado para tarea '{}' (test={})", job.id, task_name, test_mode);
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        let jobs = self.jobs.lock().unwrap();
        jobs.iter().find(|j| j.id == job_id).cloned()
    }

    /// Jobs más recientes primero, recortado a `limit` (50 si no se pide otro).
    pub fn list(&self, limit: Option<usize>) -> Vec<Job> {
        let jobs = self.jobs.lock().unwrap();

        let mut out: Vec<Job> = jobs.clone();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        out.truncate(limit.unwrap_or(DEFAULT_LIST_LIMIT));
        out
    }

    /// Aplica un parche validando la máquina de estados:
    /// pending -> running -> {completed|failed|cancelled}, pending -> {failed|cancelled}.
    /// De un estado terminal no se sale, y los parches tardíos se rechazan.
    pub fn update(&self, job_id: &str, patch: JobPatch) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();

        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            return Err(StoreError::IllegalTransition {
                id: job_id.to_string(),
                reason: format!("job is already {:?}", job.status),
            });
        }

        if let Some(next) = patch.status {
            let legal = matches!(
                (job.status, next),
                (JobStatus::Pending, JobStatus::Running)
                    | (JobStatus::Pending, JobStatus::Failed)
                    | (JobStatus::Pending, JobStatus::Cancelled)
                    | (JobStatus::Running, JobStatus::Completed)
                    | (JobStatus::Running, JobStatus::Failed)
                    | (JobStatus::Running, JobStatus::Cancelled)
            );
            if !legal {
                return Err(StoreError::IllegalTransition {
                    id: job_id.to_string(),
                    reason: format!("{:?} -> {:?} is not a legal transition", job.status, next),
                });
            }
        }

        // output_file solo entra con el parche que completa,
        // error_message solo con el que falla
        if patch.output_file.is_some() && patch.status != Some(JobStatus::Completed) {
            return Err(StoreError::IllegalTransition {
                id: job_id.to_string(),
                reason: "output_file only allowed when completing".to_string(),
            });
        }
        if patch.error_message.is_some() && patch.status != Some(JobStatus::Failed) {
            return Err(StoreError::IllegalTransition {
                id: job_id.to_string(),
                reason: "error_message only allowed when failing".to_string(),
            });
        }

        if let Some(rows) = patch.rows_fetched {
            if rows < job.rows_fetched {
                return Err(StoreError::IllegalTransition {
                    id: job_id.to_string(),
                    reason: format!("rows_fetched cannot go back ({} -> {})", job.rows_fetched, rows),
                });
            }
        }

        if let Some(next) = patch.status {
            job.status = next;
            if next.is_terminal() {
                job.completed_at = Some(Utc::now());
            }
        }
        if let Some(rows) = patch.rows_fetched {
            job.rows_fetched = rows;
        }
        if let Some(msg) = patch.progress_message {
            job.progress_message = msg;
        }
        if let Some(file) = patch.output_file {
            job.output_file = Some(file);
        }
        if let Some(err) = patch.error_message {
            job.error_message = Some(err);
        }

        let updated = job.clone();
        self.persist(&jobs)?;
        Ok(updated)
    }
}
