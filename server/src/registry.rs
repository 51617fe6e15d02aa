use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::{Frequency, TaskConfig, TaskUpdate};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task '{0}' already exists")]
    DuplicateName(String),

    #[error("task '{0}' not found")]
    NotFound(String),

    #[error("task name cannot be empty")]
    EmptyName,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Registro de tareas respaldado en un archivo JSON (un array, en orden
/// de inserción). Cada mutación reescribe el archivo completo.
pub struct TaskRegistry {
    path: PathBuf,
    tasks: Mutex<Vec<TaskConfig>>,
}

impl TaskRegistry {
    pub fn open(path: impl AsRef<Path>) -> Result<TaskRegistry, RegistryError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            fs::write(&path, "[]")?;
        }

        let raw = fs::read_to_string(&path)?;
        let tasks: Vec<TaskConfig> = serde_json::from_str(&raw)?;

        info!("registro de tareas cargado: {} tareas desde {:?}", tasks.len(), path);

        Ok(TaskRegistry {
            path,
            tasks: Mutex::new(tasks),
        })
    }

    fn persist(&self, tasks: &[TaskConfig]) -> Result<(), RegistryError> {
        let raw = serde_json::to_string_pretty(tasks)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn list(&self) -> Vec<TaskConfig> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn get(&self, name: &str) -> Option<TaskConfig> {
        let tasks = self.tasks.lock().unwrap();
        tasks.iter().find(|t| t.name == name).cloned()
    }

    /// Solo las tareas activas de esa frecuencia, en orden de inserción.
    /// Lo usa el scheduler de lotes.
    pub fn list_active_by_frequency(&self, frequency: Frequency) -> Vec<TaskConfig> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .iter()
            .filter(|t| t.active && t.frequency == frequency)
            .cloned()
            .collect()
    }

    pub fn create(&self, config: TaskConfig) -> Result<TaskConfig, RegistryError> {
        if config.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut tasks = self.tasks.lock().unwrap();

        if tasks.iter().any(|t| t.name == config.name) {
            return Err(RegistryError::DuplicateName(config.name));
        }

        tasks.push(config.clone());
        self.persist(&tasks)?;

        info!("tarea '{}' creada (frequency={})", config.name, config.frequency);
        Ok(config)
    }

    /// Actualización parcial: campos ausentes quedan como estaban,
    /// el nombre nunca cambia.
    pub fn update(&self, name: &str, update: TaskUpdate) -> Result<TaskConfig, RegistryError> {
        let mut tasks = self.tasks.lock().unwrap();

        let task = tasks
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        task.apply(update);
        let updated = task.clone();

        self.persist(&tasks)?;
        Ok(updated)
    }

    /// Borra la tarea. Los jobs que apuntan a ella no se tocan.
    pub fn delete(&self, name: &str) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.lock().unwrap();

        let before = tasks.len();
        tasks.retain(|t| t.name != name);

        if tasks.len() == before {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        self.persist(&tasks)?;
        info!("tarea '{}' borrada", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OutputFormat;
    use tempfile::tempdir;

    fn cfg(name: &str, frequency: Frequency) -> TaskConfig {
        TaskConfig {
            name: name.to_string(),
            report_path: format!("/shared/{}", name),
            output_path: "/data/out".to_string(),
            output_file_name: format!("{}.csv", name),
            output_format: OutputFormat::Csv,
            log_dir: format!("/data/logs/{}", name),
            test_output_path: None,
            test_log_dir: None,
            test_row_limit: 25,
            frequency,
            active: true,
        }
    }

    fn registry_temporal() -> (tempfile::TempDir, TaskRegistry) {
        let dir = tempdir().unwrap();
        let reg = TaskRegistry::open(dir.path().join("reports_config.json")).unwrap();
        (dir, reg)
    }

    #[test]
    fn crear_y_listar_respeta_orden_de_insercion() {
        let (_dir, reg) = registry_temporal();

        reg.create(cfg("b_tarea", Frequency::Daily)).unwrap();
        reg.create(cfg("a_tarea", Frequency::Daily)).unwrap();

        let names: Vec<String> = reg.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b_tarea", "a_tarea"]);
    }

    #[test]
    fn crear_con_nombre_repetido_falla_y_no_pisa_la_original() {
        let (_dir, reg) = registry_temporal();

        reg.create(cfg("loans", Frequency::Daily)).unwrap();

        let mut dup = cfg("loans", Frequency::Weekly);
        dup.report_path = "/otro/path".to_string();

        let err = reg.create(dup).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(n) if n == "loans"));

        // la original sigue intacta
        let original = reg.get("loans").unwrap();
        assert_eq!(original.frequency, Frequency::Daily);
        assert_eq!(original.report_path, "/shared/loans");
    }

    #[test]
    fn crear_con_nombre_vacio_falla() {
        let (_dir, reg) = registry_temporal();
        let err = reg.create(cfg("", Frequency::Daily)).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyName));
    }

    #[test]
    fn update_parcial_no_cambia_el_nombre_ni_lo_no_especificado() {
        let (_dir, reg) = registry_temporal();
        reg.create(cfg("loans", Frequency::Daily)).unwrap();

        let updated = reg
            .update(
                "loans",
                TaskUpdate {
                    frequency: Some(Frequency::Weekly),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "loans");
        assert_eq!(updated.frequency, Frequency::Weekly);
        assert_eq!(updated.report_path, "/shared/loans");
    }

    #[test]
    fn update_de_tarea_inexistente_da_not_found() {
        let (_dir, reg) = registry_temporal();
        let err = reg.update("nada", TaskUpdate::default()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn delete_saca_la_tarea_y_repetirlo_da_not_found() {
        let (_dir, reg) = registry_temporal();
        reg.create(cfg("loans", Frequency::Daily)).unwrap();

        reg.delete("loans").unwrap();
        assert!(reg.get("loans").is_none());

        let err = reg.delete("loans").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn list_active_by_frequency_filtra_por_flag_y_frecuencia() {
        let (_dir, reg) = registry_temporal();

        reg.create(cfg("d1", Frequency::Daily)).unwrap();
        let mut inactiva = cfg("d2", Frequency::Daily);
        inactiva.active = false;
        reg.create(inactiva).unwrap();
        reg.create(cfg("w1", Frequency::Weekly)).unwrap();

        let names: Vec<String> = reg
            .list_active_by_frequency(Frequency::Daily)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["d1"]);
    }

    #[test]
    fn registros_legados_sin_active_cuentan_como_activos() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports_config.json");

        // archivo escrito por la versión anterior, sin "active"
        std::fs::write(
            &path,
            r#"[{
                "name": "legacy",
                "report_path": "/shared/legacy",
                "output_path": "/data/out",
                "output_file_name": "legacy.csv",
                "log_dir": "/data/logs/legacy"
            }]"#,
        )
        .unwrap();

        let reg = TaskRegistry::open(&path).unwrap();
        let activas = reg.list_active_by_frequency(Frequency::Daily);
        assert_eq!(activas.len(), 1);
        assert_eq!(activas[0].name, "legacy");
    }

    #[test]
    fn el_archivo_persiste_entre_aperturas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports_config.json");

        {
            let reg = TaskRegistry::open(&path).unwrap();
            reg.create(cfg("loans", Frequency::Weekly)).unwrap();
        }

        let reg = TaskRegistry::open(&path).unwrap();
        let loans = reg.get("loans").unwrap();
        assert_eq!(loans.frequency, Frequency::Weekly);
    }
}
