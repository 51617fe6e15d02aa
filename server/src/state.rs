use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::fetcher::AnalyticsSource;
use crate::jobs::JobStore;
use crate::registry::TaskRegistry;

/// Señales de cancelación de los jobs en vuelo, por id.
/// El handler de cancel levanta la señal; el fetcher la mira entre páginas.
#[derive(Clone, Default)]
pub struct CancelFlags {
    inner: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl CancelFlags {
    pub fn register(&self, job_id: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut flags = self.inner.lock().unwrap();
        flags.insert(job_id.to_string(), flag.clone());
        flag
    }

    pub fn remove(&self, job_id: &str) {
        let mut flags = self.inner.lock().unwrap();
        flags.remove(job_id);
    }

    /// Levanta la señal si el job sigue en vuelo. Devuelve si había señal.
    pub fn request(&self, job_id: &str) -> bool {
        let flags = self.inner.lock().unwrap();
        match flags.get(job_id) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
    pub store: Arc<JobStore>,
    pub source: Arc<AnalyticsSource>,
    pub cancels: CancelFlags,
}
