use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::task::Frequency;

/// Pedido de corrida en lote: todas las tareas activas de una frecuencia.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub frequency: Frequency,

    /// Si una tarea falla, seguir con las demás (default) o cortar ahí.
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

fn default_continue_on_error() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchTaskStatus {
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

/// Resultado de una tarea dentro del lote.
/// `job_id` queda en None si la tarea falló antes de crear el job
/// (config desaparecida a mitad del lote) o si quedó sin correr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTaskOutcome {
    pub task_name: String,
    pub job_id: Option<JobId>,
    pub status: BatchTaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub frequency: Frequency,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,

    /// Un resultado por tarea seleccionada, en el orden del registro
    pub outcomes: Vec<BatchTaskOutcome>,

    /// Ids de los jobs creados, en orden de ejecución
    pub job_ids: Vec<JobId>,
}
