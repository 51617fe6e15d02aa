use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use common::{LogContent, LogFile, TaskConfig};
use glob::glob;
use thiserror::Error;

pub const DEFAULT_TAIL_LINES: usize = 500;

#[derive(Debug, Error)]
pub enum LogsError {
    #[error("Log directory not configured")]
    NotConfigured,

    #[error("Log file '{0}' not found")]
    FileNotFound(String),

    #[error("Invalid file path")]
    InvalidPath,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lista los .log del directorio de la tarea, más nuevos primero.
/// Directorio sin configurar o inexistente: lista vacía, no es error.
pub fn list_log_files(config: &TaskConfig, test_mode: bool) -> Vec<LogFile> {
    let Some(dir) = config.log_dir_for(test_mode) else {
        return Vec::new();
    };

    let pattern = format!("{}/*.log", dir);
    let Ok(paths) = glob(&pattern) else {
        return Vec::new();
    };

    let mut files = Vec::new();
    for path in paths.flatten() {
        if !path.is_file() {
            continue;
        }
        let Ok(meta) = path.metadata() else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        files.push(LogFile {
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    files
}

/// Lee un log, recortado a las últimas `tail` líneas (0 = completo).
pub fn read_log_file(
    config: &TaskConfig,
    test_mode: bool,
    filename: &str,
    tail: usize,
) -> Result<LogContent, LogsError> {
    let dir = config.log_dir_for(test_mode).ok_or(LogsError::NotConfigured)?;

    // el nombre tiene que ser un nombre pelado, sin saltos de directorio
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(LogsError::InvalidPath);
    }

    let path = Path::new(dir).join(filename);
    if !path.is_file() {
        return Err(LogsError::FileNotFound(filename.to_string()));
    }

    let bytes = fs::read(&path)?;
    let text = String::from_utf8_lossy(&bytes);

    let content = if tail == 0 {
        text.to_string()
    } else {
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(tail);
        lines[start..].join("\n")
    };

    Ok(LogContent {
        name: filename.to_string(),
        content,
    })
}
