use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Local;
use common::{Job, TaskConfig};
use tracing::{info, warn};

use crate::fetcher::{FetchEvent, ReportSource};
use crate::jobs::{JobPatch, JobStore};
use crate::state::CancelFlags;

/// Log de una corrida, como archivo plano en el log_dir de la tarea.
/// Es lo que después sirve la vista de logs. Best-effort: si no se puede
/// escribir, la corrida sigue igual.
struct RunLog {
    w: Option<BufWriter<File>>,
}

impl RunLog {
    fn open(dir: Option<&str>) -> RunLog {
        let Some(dir) = dir else {
            return RunLog { w: None };
        };

        let name = format!(
            "download_analytics_log_{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        );

        let w = fs::create_dir_all(dir)
            .and_then(|_| File::create(Path::new(dir).join(name)))
            .map(BufWriter::new);

        match w {
            Ok(w) => RunLog { w: Some(w) },
            Err(e) => {
                warn!("no se pudo abrir el log de la corrida en {}: {}", dir, e);
                RunLog { w: None }
            }
        }
    }

    fn line(&mut self, level: &str, msg: &str) {
        if let Some(w) = &mut self.w {
            let _ = writeln!(
                w,
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                level,
                msg
            );
            let _ = w.flush();
        }
    }

    fn info(&mut self, msg: &str) {
        self.line("INFO", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("ERROR", msg);
    }
}

/// Corre un job hasta su estado terminal consumiendo los eventos de la
/// fuente. Toda mutación pasa por el store; si el store rechaza un parche
/// (job cancelado a mitad de camino), se deja de escuchar a la fuente.
pub async fn run_job<S: ReportSource>(
    source: &S,
    store: &JobStore,
    config: &TaskConfig,
    job_id: &str,
    test_mode: bool,
    cancel: Arc<AtomicBool>,
) -> Option<Job> {
    let mut log = RunLog::open(config.log_dir_for(test_mode));
    log.info(&format!("Started task: {}", config.name));
    log.info(&format!("Report path: {}", config.report_path));
    log.info(&format!("Test mode: {}", test_mode));

    // pending -> running; si ya lo cancelaron, no hay nada que correr
    if let Err(e) = store.update(job_id, JobPatch::to_running("starting report fetch")) {
        warn!("job {} no pudo arrancar: {}", job_id, e);
        log.error("Job could not start (already finished or cancelled)");
        return store.get(job_id);
    }

    let mut rx = source.begin(config, test_mode, cancel);
    let mut saw_terminal = false;

    while let Some(event) = rx.recv().await {
        match event {
            FetchEvent::Progress {
                rows_fetched,
                message,
            } => {
                log.info(&message);
                if let Err(e) = store.update(job_id, JobPatch::progress(rows_fetched, &message)) {
                    // parche tardío sobre un job ya terminal: se descarta
                    warn!("avance descartado para job {}: {}", job_id, e);
                    break;
                }
            }
            FetchEvent::Completed {
                output_file,
                rows_fetched,
            } => {
                log.info(&format!(
                    "Finished. Output: {}, Rows: {}",
                    output_file, rows_fetched
                ));
                if let Err(e) = store.update(job_id, JobPatch::complete(&output_file, rows_fetched))
                {
                    warn!("cierre descartado para job {}: {}", job_id, e);
                }
                saw_terminal = true;
                break;
            }
            FetchEvent::Failed { error } => {
                log.error(&error);
                if let Err(e) = store.update(job_id, JobPatch::fail(&error)) {
                    warn!("fallo descartado para job {}: {}", job_id, e);
                }
                saw_terminal = true;
                break;
            }
        }
    }

    // canal cerrado sin veredicto: o lo cancelaron (el job ya quedó
    // terminal por el handler) o la fuente se murió
    if !saw_terminal {
        if let Some(job) = store.get(job_id) {
            if !job.status.is_terminal() {
                log.error("Report source ended without a result");
                if let Err(e) =
                    store.update(job_id, JobPatch::fail("report source ended without a result"))
                {
                    warn!("no se pudo marcar como fallido el job {}: {}", job_id, e);
                }
            }
        }
    }

    let fin = store.get(job_id);
    if let Some(job) = &fin {
        info!("job {} terminó en estado {:?}", job.id, job.status);
    }
    fin
}

/// run_job más el alta/baja de la señal de cancelación.
pub async fn execute<S: ReportSource>(
    source: &S,
    store: &JobStore,
    cancels: &CancelFlags,
    config: &TaskConfig,
    job: &Job,
) -> Option<Job> {
    let flag = cancels.register(&job.id);
    let fin = run_job(source, store, config, &job.id, job.test_mode, flag).await;
    cancels.remove(&job.id);
    fin
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    use common::{Frequency, OutputFormat, TaskConfig};
    use tokio::sync::mpsc;

    use crate::fetcher::{FetchEvent, ReportSource};

    pub fn cfg(name: &str, frequency: Frequency) -> TaskConfig {
        TaskConfig {
            name: name.to_string(),
            report_path: format!("/shared/{}", name),
            output_path: "/data/out".to_string(),
            output_file_name: format!("{}.csv", name),
            output_format: OutputFormat::Csv,
            // sin log_dir: las corridas de test unitario no dejan archivos
            log_dir: String::new(),
            test_output_path: None,
            test_log_dir: None,
            test_row_limit: 25,
            frequency,
            active: true,
        }
    }

    /// Fuente de mentira: un guion de eventos por nombre de tarea.
    pub struct FakeSource {
        scripts: Mutex<HashMap<String, Vec<FetchEvent>>>,
    }

    impl FakeSource {
        pub fn new() -> FakeSource {
            FakeSource {
                scripts: Mutex::new(HashMap::new()),
            }
        }

        pub fn script(self, task_name: &str, events: Vec<FetchEvent>) -> FakeSource {
            self.scripts
                .lock()
                .unwrap()
                .insert(task_name.to_string(), events);
            self
        }
    }

    impl ReportSource for FakeSource {
        fn begin(
            &self,
            config: &TaskConfig,
            _test_mode: bool,
            _cancel: Arc<AtomicBool>,
        ) -> mpsc::Receiver<FetchEvent> {
            let (tx, rx) = mpsc::channel(16);
            let events = self
                .scripts
                .lock()
                .unwrap()
                .remove(&config.name)
                .unwrap_or_default();

            tokio::spawn(async move {
                for ev in events {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
            });

            rx
        }
    }

    /// Fuente con compuerta: manda el primer tramo, espera la señal del
    /// test y recién ahí manda el resto.
    pub struct GatedSource {
        pub first: Mutex<Vec<FetchEvent>>,
        pub rest: Mutex<Vec<FetchEvent>>,
        pub gate: Arc<tokio::sync::Notify>,
    }

    impl ReportSource for GatedSource {
        fn begin(
            &self,
            _config: &TaskConfig,
            _test_mode: bool,
            _cancel: Arc<AtomicBool>,
        ) -> mpsc::Receiver<FetchEvent> {
            let (tx, rx) = mpsc::channel(16);
            let first = std::mem::take(&mut *self.first.lock().unwrap());
            let rest = std::mem::take(&mut *self.rest.lock().unwrap());
            let gate = self.gate.clone();

            tokio::spawn(async move {
                for ev in first {
                    let _ = tx.send(ev).await;
                }
                gate.notified().await;
                for ev in rest {
                    let _ = tx.send(ev).await;
                }
            });

            rx
        }
    }
}
