use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Frecuencia con la que una tarea entra en los lotes programados.
/// Conjunto cerrado: cualquier otro valor se rechaza al deserializar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    OnDemand,
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::OnDemand => "on_demand",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "on_demand" => Ok(Frequency::OnDemand),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

/// Formato del archivo de salida del reporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    Tsv,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Csv
    }
}

impl OutputFormat {
    pub fn delimiter(&self) -> u8 {
        match self {
            OutputFormat::Csv => b',',
            OutputFormat::Tsv => b'\t',
        }
    }
}

/// Configuración de una tarea de descarga de reportes.
/// `name` es la clave única e inmutable; todo lo demás se puede editar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,

    /// Ruta del reporte dentro del servicio de analytics (opaca para nosotros)
    pub report_path: String,

    /// Destino del archivo generado
    pub output_path: String,
    pub output_file_name: String,
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Directorio donde quedan los logs de cada ejecución
    pub log_dir: String,

    /* -------- variantes para modo test -------- */
    #[serde(default)]
    pub test_output_path: Option<String>,
    #[serde(default)]
    pub test_log_dir: Option<String>,
    #[serde(default = "default_test_row_limit")]
    pub test_row_limit: u64,

    #[serde(default)]
    pub frequency: Frequency,

    /// Registros viejos no traen este campo: se tratan como activos.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_test_row_limit() -> u64 {
    25
}

fn default_active() -> bool {
    true
}

/// Actualización parcial: los campos en None quedan como estaban.
/// El nombre no se puede cambiar por esta vía.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub report_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub test_output_path: Option<String>,
    #[serde(default)]
    pub test_log_dir: Option<String>,
    #[serde(default)]
    pub test_row_limit: Option<u64>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl TaskConfig {
    /// Directorio de logs efectivo según el modo. En test NO cae al de
    /// producción: sin test_log_dir la corrida de prueba no deja log.
    pub fn log_dir_for(&self, test_mode: bool) -> Option<&str> {
        let dir = if test_mode {
            self.test_log_dir.as_deref()
        } else {
            Some(self.log_dir.as_str())
        };
        dir.filter(|d| !d.is_empty())
    }

    pub fn output_path_for(&self, test_mode: bool) -> &str {
        if test_mode {
            self.test_output_path.as_deref().unwrap_or(&self.output_path)
        } else {
            &self.output_path
        }
    }

    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(v) = update.report_path {
            self.report_path = v;
        }
        if let Some(v) = update.output_path {
            self.output_path = v;
        }
        if let Some(v) = update.output_file_name {
            self.output_file_name = v;
        }
        if let Some(v) = update.output_format {
            self.output_format = v;
        }
        if let Some(v) = update.log_dir {
            self.log_dir = v;
        }
        if let Some(v) = update.test_output_path {
            self.test_output_path = Some(v);
        }
        if let Some(v) = update.test_log_dir {
            self.test_log_dir = Some(v);
        }
        if let Some(v) = update.test_row_limit {
            self.test_row_limit = v;
        }
        if let Some(v) = update.frequency {
            self.frequency = v;
        }
        if let Some(v) = update.active {
            self.active = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_sin_active_se_deserializa_como_activa() {
        // registro viejo: sin active ni frequency
        let json = r#"{
            "name": "aas_loans",
            "report_path": "/shared/reports/loans",
            "output_path": "/data/out",
            "output_file_name": "loans.csv",
            "log_dir": "/data/logs/loans"
        }"#;

        let cfg: TaskConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.active);
        assert_eq!(cfg.frequency, Frequency::Daily);
        assert_eq!(cfg.output_format, OutputFormat::Csv);
        assert_eq!(cfg.test_row_limit, 25);
    }

    #[test]
    fn frequency_desconocida_se_rechaza() {
        let json = r#"{
            "name": "x",
            "report_path": "p",
            "output_path": "o",
            "output_file_name": "f.csv",
            "log_dir": "l",
            "frequency": "hourly"
        }"#;

        assert!(serde_json::from_str::<TaskConfig>(json).is_err());
    }

    #[test]
    fn apply_solo_toca_los_campos_presentes() {
        let mut cfg: TaskConfig = serde_json::from_str(
            r#"{
                "name": "t",
                "report_path": "orig",
                "output_path": "o",
                "output_file_name": "f.csv",
                "log_dir": "l",
                "frequency": "weekly"
            }"#,
        )
        .unwrap();

        cfg.apply(TaskUpdate {
            report_path: Some("nuevo".to_string()),
            active: Some(false),
            ..Default::default()
        });

        assert_eq!(cfg.report_path, "nuevo");
        assert!(!cfg.active);
        // lo no especificado queda igual
        assert_eq!(cfg.name, "t");
        assert_eq!(cfg.frequency, Frequency::Weekly);
        assert_eq!(cfg.output_path, "o");
    }

    #[test]
    fn log_dir_for_en_test_no_cae_al_de_produccion() {
        let mut cfg: TaskConfig = serde_json::from_str(
            r#"{
                "name": "t",
                "report_path": "p",
                "output_path": "o",
                "output_file_name": "f.csv",
                "log_dir": "/logs/prod"
            }"#,
        )
        .unwrap();

        // sin test_log_dir, la corrida de prueba no tiene dónde loguear
        assert_eq!(cfg.log_dir_for(true), None);

        cfg.test_log_dir = Some("/logs/test".to_string());
        assert_eq!(cfg.log_dir_for(true), Some("/logs/test"));
        assert_eq!(cfg.log_dir_for(false), Some("/logs/prod"));
    }

    #[test]
    fn output_path_en_test_si_cae_al_de_produccion() {
        let mut cfg: TaskConfig = serde_json::from_str(
            r#"{
                "name": "t",
                "report_path": "p",
                "output_path": "/out/prod",
                "output_file_name": "f.csv",
                "log_dir": "l"
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.output_path_for(true), "/out/prod");

        cfg.test_output_path = Some("/out/test".to_string());
        assert_eq!(cfg.output_path_for(true), "/out/test");
        assert_eq!(cfg.output_path_for(false), "/out/prod");
    }
}
