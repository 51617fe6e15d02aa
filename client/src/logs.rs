use std::future::Future;

use anyhow::Result;
use common::LogFile;

use crate::api::ApiClient;

/// De dónde salen los listados de logs.
pub trait LogFeed {
    fn log_files(
        &self,
        task_name: &str,
        test_mode: bool,
    ) -> impl Future<Output = Result<Vec<LogFile>>> + Send;
}

impl LogFeed for ApiClient {
    async fn log_files(&self, task_name: &str, test_mode: bool) -> Result<Vec<LogFile>> {
        ApiClient::log_files(self, task_name, test_mode).await
    }
}

/// Vista de logs con supresión de pedidos repetidos: mientras la
/// combinación (tarea, modo) no cambie, se sirve lo ya traído en vez de
/// volver a pedir lo mismo.
pub struct LogView<F: LogFeed> {
    feed: F,
    last_key: Option<String>,
    files: Vec<LogFile>,
}

impl<F: LogFeed> LogView<F> {
    pub fn new(feed: F) -> LogView<F> {
        LogView {
            feed,
            last_key: None,
            files: Vec::new(),
        }
    }

    pub async fn select(&mut self, task_name: &str, test_mode: bool) -> Result<&[LogFile]> {
        let key = format!("{}-{}", task_name, test_mode);

        if self.last_key.as_deref() == Some(key.as_str()) {
            return Ok(&self.files);
        }

        let files = self.feed.log_files(task_name, test_mode).await?;

        // la clave recién se fija con el fetch logrado: un error deja la
        // vista lista para reintentar
        self.last_key = Some(key);
        self.files = files;
        Ok(&self.files)
    }

    /// Olvida la clave: el próximo select vuelve a pedir sí o sí.
    pub fn reset(&mut self) {
        self.last_key = None;
    }
}
