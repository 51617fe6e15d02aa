use std::env;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{OutputFormat, TaskConfig};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

const DEFAULT_API_URL: &str = "https://analytics.example.edu/api/v1/reports";
const PAGE_LIMIT: u64 = 1000;

/// Eventos que emite la descarga de un reporte. El executor no ve nada
/// más que esto: o avanza, o termina bien, o termina mal.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Progress { rows_fetched: u64, message: String },
    Completed { output_file: String, rows_fetched: u64 },
    Failed { error: String },
}

/// Fuente de reportes. `begin` arranca la descarga en segundo plano y
/// devuelve el canal de eventos; la señal de cancelación es cooperativa
/// (se mira entre páginas, no corta el request en vuelo).
pub trait ReportSource: Send + Sync + 'static {
    fn begin(
        &self,
        config: &TaskConfig,
        test_mode: bool,
        cancel: Arc<AtomicBool>,
    ) -> mpsc::Receiver<FetchEvent>;
}

/* ---------------- implementación real contra la API ---------------- */

/// Una página de la API de analytics: filas como objetos JSON más el
/// token de continuación.
#[derive(Debug, Deserialize)]
struct ReportPage {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default)]
    resumption_token: Option<String>,
    #[serde(default)]
    is_finished: bool,
}

pub struct AnalyticsSource {
    api_url: String,
    client: reqwest::Client,
}

impl AnalyticsSource {
    pub fn from_env() -> AnalyticsSource {
        let api_url =
            env::var("ANALYTICS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        AnalyticsSource {
            api_url,
            client: reqwest::Client::new(),
        }
    }

    /// Descarga paginada. Devuelve None si la cancelaron a mitad de camino
    /// (en ese caso no hay veredicto que reportar).
    async fn fetch_report(
        &self,
        config: &TaskConfig,
        test_mode: bool,
        cancel: &AtomicBool,
        tx: &mpsc::Sender<FetchEvent>,
    ) -> Result<Option<(String, u64)>, String> {
        let api_key = env::var("ANALYTICS_API_KEY")
            .map_err(|_| "ANALYTICS_API_KEY environment variable not set".to_string())?;

        let max_rows = if test_mode {
            Some(config.test_row_limit)
        } else {
            None
        };

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Value> = Vec::new();
        let mut token: Option<String> = None;
        let mut total: u64 = 0;

        'pages: loop {
            if cancel.load(Ordering::Relaxed) {
                info!("descarga de '{}' cancelada entre páginas", config.name);
                return Ok(None);
            }

            let mut query: Vec<(&str, String)> = vec![
                ("path", config.report_path.clone()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(t) = &token {
                query.push(("token", t.clone()));
            }

            let resp = self
                .client
                .get(&self.api_url)
                .header("Authorization", format!("apikey {}", api_key))
                .query(&query)
                .send()
                .await
                .map_err(|e| format!("request failed: {}", e))?;

            if !resp.status().is_success() {
                return Err(format!("analytics API returned status {}", resp.status()));
            }

            let page: ReportPage = resp
                .json()
                .await
                .map_err(|e| format!("invalid response body: {}", e))?;

            if columns.is_empty() && !page.columns.is_empty() {
                columns = page.columns;
            }

            for row in page.rows {
                rows.push(row);
                total += 1;

                if total % 100 == 0 {
                    let _ = tx
                        .send(FetchEvent::Progress {
                            rows_fetched: total,
                            message: format!("Fetched {} rows...", total),
                        })
                        .await;
                }

                if let Some(max) = max_rows {
                    if total >= max {
                        info!("[test mode] tope de filas alcanzado: {}", max);
                        break 'pages;
                    }
                }
            }

            if page.is_finished || page.resumption_token.is_none() {
                break;
            }
            token = page.resumption_token;
        }

        if columns.is_empty() {
            return Err("no columns found for report".to_string());
        }

        let out_file = Path::new(config.output_path_for(test_mode)).join(&config.output_file_name);
        write_output(config.output_format, &columns, &rows, &out_file)
            .map_err(|e| format!("failed to write output: {}", e))?;

        Ok(Some((out_file.to_string_lossy().to_string(), total)))
    }
}

impl ReportSource for AnalyticsSource {
    fn begin(
        &self,
        config: &TaskConfig,
        test_mode: bool,
        cancel: Arc<AtomicBool>,
    ) -> mpsc::Receiver<FetchEvent> {
        let (tx, rx) = mpsc::channel(16);

        let config = config.clone();
        let source = AnalyticsSource {
            api_url: self.api_url.clone(),
            client: self.client.clone(),
        };

        tokio::spawn(async move {
            match source.fetch_report(&config, test_mode, &cancel, &tx).await {
                Ok(Some((output_file, rows_fetched))) => {
                    let _ = tx
                        .send(FetchEvent::Completed {
                            output_file,
                            rows_fetched,
                        })
                        .await;
                }
                // cancelada: se cierra el canal sin veredicto
                Ok(None) => {}
                Err(error) => {
                    warn!("descarga de '{}' falló: {}", config.name, error);
                    let _ = tx.send(FetchEvent::Failed { error }).await;
                }
            }
        });

        rx
    }
}

/// Escribe las filas como CSV/TSV. Celdas faltantes quedan vacías;
/// valores no-string se serializan como JSON.
pub fn write_output(
    format: OutputFormat,
    columns: &[String],
    rows: &[Value],
    output_file: &Path,
) -> csv::Result<()> {
    if let Some(parent) = output_file.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_path(output_file)?;

    writer.write_record(columns)?;

    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|col| match row.get(col) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn columnas() -> Vec<String> {
        vec!["Title".to_string(), "Loans".to_string()]
    }

    #[test]
    fn write_output_csv_con_celdas_faltantes_vacias() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sub").join("loans.csv");

        let rows = vec![
            json!({"Title": "Quijote", "Loans": 12}),
            json!({"Title": "Rayuela"}),
        ];

        write_output(OutputFormat::Csv, &columnas(), &rows, &out).unwrap();

        let contenido = std::fs::read_to_string(&out).unwrap();
        let lineas: Vec<&str> = contenido.lines().collect();
        assert_eq!(lineas[0], "Title,Loans");
        assert_eq!(lineas[1], "Quijote,12");
        assert_eq!(lineas[2], "Rayuela,");
    }

    #[test]
    fn write_output_tsv_usa_tabulador() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("loans.tsv");

        let rows = vec![json!({"Title": "Quijote", "Loans": "12"})];

        write_output(OutputFormat::Tsv, &columnas(), &rows, &out).unwrap();

        let contenido = std::fs::read_to_string(&out).unwrap();
        assert!(contenido.starts_with("Title\tLoans"));
        assert!(contenido.contains("Quijote\t12"));
    }

    #[test]
    fn pagina_sin_campos_opcionales_se_deserializa() {
        let page: ReportPage = serde_json::from_str(r#"{"rows": []}"#).unwrap();
        assert!(page.columns.is_empty());
        assert!(page.resumption_token.is_none());
        assert!(!page.is_finished);
    }
}
