use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, Failed y Cancelled son finales: de ahí no se sale.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Pedido de ejecución de una tarea (una corrida = un job nuevo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreate {
    pub task_name: String,
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    /// Nombre de la tarea que lo originó. Es solo una clave de búsqueda:
    /// el job sobrevive aunque la tarea se borre después.
    pub task_name: String,
    pub test_mode: bool,

    pub status: JobStatus,

    /* -------- Métricas del job -------- */
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rows_fetched: u64,
    #[serde(default)]
    pub progress_message: String,

    /// Solo uno de estos dos queda poblado al terminar:
    /// output_file si completó, error_message si falló.
    pub output_file: Option<String>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(task_name: &str, test_mode: bool) -> Job {
        Job {
            id: uuid::Uuid::new_v4().to_string(),
            task_name: task_name.to_string(),
            test_mode,
            status: JobStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            rows_fetched: 0,
            progress_message: String::new(),
            output_file: None,
            error_message: None,
        }
    }
}
