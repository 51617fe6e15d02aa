use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Un archivo de log de ejecución, tal como lo lista el server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogContent {
    pub name: String,
    pub content: String,
}
