use anyhow::{anyhow, Result};
use common::{
    BatchRequest, BatchSummary, Frequency, Job, JobCreate, LogContent, LogFile, TaskConfig,
    TaskUpdate,
};
use reqwest::{Client, Response, StatusCode};
use std::env;

/// Igual que siempre:
/// - En Docker: SERVER_URL=http://server:8080
/// - Local: default http://localhost:8080
pub fn server_base_url() -> String {
    env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: String) -> ApiClient {
        ApiClient {
            base_url,
            http: Client::new(),
        }
    }

    pub fn from_env() -> ApiClient {
        ApiClient::new(server_base_url())
    }

    /// Convierte una respuesta de error en anyhow, rescatando el
    /// {"error": "..."} del server si vino.
    async fn into_error(resp: Response) -> anyhow::Error {
        let status = resp.status();
        let detail = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error")?.as_str().map(String::from));

        match detail {
            Some(msg) => anyhow!("{} ({})", msg, status),
            None => anyhow!("el server devolvió status {}", status),
        }
    }

    /* ---------------- tareas ---------------- */

    pub async fn list_tasks(&self) -> Result<Vec<TaskConfig>> {
        let url = format!("{}/api/v1/tasks", self.base_url);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn get_task(&self, name: &str) -> Result<TaskConfig> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, name);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn create_task(&self, config: &TaskConfig) -> Result<TaskConfig> {
        let url = format!("{}/api/v1/tasks", self.base_url);
        let resp = self.http.post(&url).json(config).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn update_task(&self, name: &str, update: &TaskUpdate) -> Result<TaskConfig> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, name);
        let resp = self.http.put(&url).json(update).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn delete_task(&self, name: &str) -> Result<()> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, name);
        let resp = self.http.delete(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(())
    }

    /* ---------------- jobs ---------------- */

    pub async fn run(&self, task_name: &str, test_mode: bool) -> Result<Job> {
        let url = format!("{}/api/v1/reports/run", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&JobCreate {
                task_name: task_name.to_string(),
                test_mode,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn list_jobs(&self, limit: Option<usize>) -> Result<Vec<Job>> {
        let mut url = format!("{}/api/v1/reports/jobs", self.base_url);
        if let Some(limit) = limit {
            url = format!("{}?limit={}", url, limit);
        }
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// 404 es "no hay registro", no un error del cliente.
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let url = format!("{}/api/v1/reports/jobs/{}", self.base_url, id);
        let resp = self.http.get(&url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(Some(resp.json().await?))
    }

    pub async fn cancel_job(&self, id: &str) -> Result<()> {
        let url = format!("{}/api/v1/reports/jobs/{}/cancel", self.base_url, id);
        let resp = self.http.post(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(())
    }

    pub async fn run_batch(&self, frequency: Frequency, continue_on_error: bool) -> Result<BatchSummary> {
        let url = format!("{}/api/v1/reports/batch", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&BatchRequest {
                frequency,
                continue_on_error,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    /* ---------------- logs ---------------- */

    pub async fn log_files(&self, task_name: &str, test_mode: bool) -> Result<Vec<LogFile>> {
        let url = format!(
            "{}/api/v1/logs/{}?test_mode={}",
            self.base_url, task_name, test_mode
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn log_content(
        &self,
        task_name: &str,
        filename: &str,
        test_mode: bool,
        tail: Option<usize>,
    ) -> Result<LogContent> {
        let mut url = format!(
            "{}/api/v1/logs/{}/{}?test_mode={}",
            self.base_url, task_name, filename, test_mode
        );
        if let Some(tail) = tail {
            url = format!("{}&tail={}", url, tail);
        }
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json().await?)
    }
}
