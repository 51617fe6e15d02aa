use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use common::Job;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::ApiClient;

/// De dónde saca el observador el estado de los jobs. El cliente HTTP lo
/// implementa de verdad; los tests lo implementan con un guion.
pub trait JobFeed: Send + Sync + 'static {
    fn fetch_job(&self, id: &str) -> impl Future<Output = Result<Option<Job>>> + Send;
    fn fetch_jobs(&self) -> impl Future<Output = Result<Vec<Job>>> + Send;
}

impl JobFeed for ApiClient {
    async fn fetch_job(&self, id: &str) -> Result<Option<Job>> {
        self.get_job(id).await
    }

    async fn fetch_jobs(&self) -> Result<Vec<Job>> {
        self.list_jobs(None).await
    }
}

/// Sigue un job hasta su estado terminal, un pedido por vez: cada poll se
/// espera completo antes de programar el siguiente, así que nunca hay dos
/// pedidos superpuestos para el mismo job.
///
/// Si el fetch falla o el job no está, devuelve None ("no hay registro")
/// en vez de reintentar para siempre.
pub async fn poll_job<F: JobFeed>(
    feed: &F,
    job_id: &str,
    interval: Duration,
    mut on_update: impl FnMut(&Job),
) -> Option<Job> {
    loop {
        let job = match feed.fetch_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) | Err(_) => return None,
        };

        on_update(&job);

        if job.status.is_terminal() {
            return Some(job);
        }

        tokio::time::sleep(interval).await;
    }
}

/// Sesión de observación de la lista de jobs, con vida propia:
/// `start` la arranca, `stop` la termina y no se programa nada más.
///
/// El timer solo despacha un fetch si la última vista tiene al menos un
/// job activo; descubrir jobs nuevos corre por cuenta de `refresh` (por
/// ejemplo recién disparada una corrida), no del timer ocioso.
pub struct JobListSession<F: JobFeed> {
    shared: Arc<SessionShared<F>>,
    handle: JoinHandle<()>,
}

struct SessionShared<F> {
    feed: Arc<F>,
    snapshot: Mutex<Vec<Job>>,
    in_flight: AtomicBool,
    last_dispatch: Mutex<Option<Instant>>,
    stopped: AtomicBool,
    cooldown: Duration,
}

impl<F: JobFeed> JobListSession<F> {
    pub async fn start(feed: Arc<F>, interval: Duration, cooldown: Duration) -> JobListSession<F> {
        let shared = Arc::new(SessionShared {
            feed,
            snapshot: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            last_dispatch: Mutex::new(None),
            stopped: AtomicBool::new(false),
            cooldown,
        });

        // primer fetch para sembrar la vista
        shared.dispatch(true).await;

        let handle = {
            let shared = shared.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if shared.stopped.load(Ordering::Relaxed) {
                        break;
                    }
                    shared.dispatch(false).await;
                }
            })
        };

        JobListSession { shared, handle }
    }

    /// Última vista conocida de la lista.
    pub fn jobs(&self) -> Vec<Job> {
        self.shared.snapshot.lock().unwrap().clone()
    }

    /// Fetch forzado, con las mismas barreras de un-solo-vuelo y
    /// enfriamiento. Se usa recién disparada una corrida.
    pub async fn refresh(&self) {
        self.shared.dispatch(true).await;
    }

    /// Corta la sesión: el timer se apaga y no se programan más polls.
    pub fn stop(self) {
        self.shared.stopped.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

impl<F: JobFeed> SessionShared<F> {
    fn has_active(&self) -> bool {
        self.snapshot
            .lock()
            .unwrap()
            .iter()
            .any(|j| !j.status.is_terminal())
    }

    async fn dispatch(&self, force: bool) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }
        if !force && !self.has_active() {
            return;
        }

        // a lo sumo un fetch en vuelo: el que llega mientras hay otro
        // pendiente se descarta, no se encola
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        // ventana de enfriamiento contra re-disparos redundantes
        let too_soon = {
            let last = self.last_dispatch.lock().unwrap();
            matches!(*last, Some(t) if t.elapsed() < self.cooldown)
        };
        if too_soon {
            self.in_flight.store(false, Ordering::Release);
            return;
        }

        let result = self.feed.fetch_jobs().await;

        // si pararon la sesión mientras volaba el pedido, el resultado
        // se tira; los errores transitorios dejan la vista anterior
        if !self.stopped.load(Ordering::Relaxed) {
            if let Ok(jobs) = result {
                *self.snapshot.lock().unwrap() = jobs;
            }
        }

        *self.last_dispatch.lock().unwrap() = Some(Instant::now());
        self.in_flight.store(false, Ordering::Release);
    }
}
