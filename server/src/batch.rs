use common::{BatchSummary, BatchTaskOutcome, BatchTaskStatus, Frequency, JobStatus};
use tracing::{info, warn};

use crate::executor;
use crate::fetcher::ReportSource;
use crate::jobs::JobStore;
use crate::registry::TaskRegistry;
use crate::state::CancelFlags;

/// Corre en lote todas las tareas activas de una frecuencia, una por una
/// y en el orden del registro. Nunca en paralelo: la carga sobre el
/// servicio de analytics queda acotada y el orden de los fallos es claro.
///
/// Con continue_on_error (el default) una tarea rota no frena la cadencia
/// del resto; sin él, el lote corta ahí y lo que falta queda como skipped.
pub async fn run_batch<S: ReportSource>(
    source: &S,
    registry: &TaskRegistry,
    store: &JobStore,
    cancels: &CancelFlags,
    frequency: Frequency,
    continue_on_error: bool,
) -> BatchSummary {
    let selected = registry.list_active_by_frequency(frequency);
    info!(
        "lote {}: {} tareas seleccionadas (continue_on_error={})",
        frequency,
        selected.len(),
        continue_on_error
    );

    let mut summary = BatchSummary {
        frequency,
        succeeded: 0,
        failed: 0,
        skipped: 0,
        outcomes: Vec::new(),
        job_ids: Vec::new(),
    };

    for (idx, task) in selected.iter().enumerate() {
        // releer la config: pudo desaparecer a mitad del lote
        let Some(config) = registry.get(&task.name) else {
            warn!("tarea '{}' desapareció a mitad del lote", task.name);
            summary.failed += 1;
            summary.outcomes.push(BatchTaskOutcome {
                task_name: task.name.clone(),
                job_id: None,
                status: BatchTaskStatus::Failed,
            });
            if continue_on_error {
                continue;
            }
            skip_rest(&mut summary, &selected[idx + 1..]);
            break;
        };

        let job = match store.create(&config.name, false) {
            Ok(job) => job,
            Err(e) => {
                warn!("no se pudo crear job para '{}': {}", config.name, e);
                summary.failed += 1;
                summary.outcomes.push(BatchTaskOutcome {
                    task_name: config.name.clone(),
                    job_id: None,
                    status: BatchTaskStatus::Failed,
                });
                if continue_on_error {
                    continue;
                }
                skip_rest(&mut summary, &selected[idx + 1..]);
                break;
            }
        };

        summary.job_ids.push(job.id.clone());

        // secuencial a propósito: se espera el estado terminal antes de
        // pasar a la siguiente tarea
        let fin = executor::execute(source, store, cancels, &config, &job).await;

        let status = match fin.map(|j| j.status) {
            Some(JobStatus::Completed) => {
                summary.succeeded += 1;
                BatchTaskStatus::Completed
            }
            Some(JobStatus::Cancelled) => {
                summary.failed += 1;
                BatchTaskStatus::Cancelled
            }
            // Failed, o el job desapareció del store (no debería pasar)
            _ => {
                summary.failed += 1;
                BatchTaskStatus::Failed
            }
        };

        summary.outcomes.push(BatchTaskOutcome {
            task_name: config.name.clone(),
            job_id: Some(job.id),
            status,
        });

        if status != BatchTaskStatus::Completed && !continue_on_error {
            info!("lote {} cortado en '{}' por error", frequency, config.name);
            skip_rest(&mut summary, &selected[idx + 1..]);
            break;
        }
    }

    info!(
        "lote {} terminado: {} ok, {} fallidas, {} salteadas",
        frequency, summary.succeeded, summary.failed, summary.skipped
    );
    summary
}

fn skip_rest(summary: &mut BatchSummary, rest: &[common::TaskConfig]) {
    for task in rest {
        summary.skipped += 1;
        summary.outcomes.push(BatchTaskOutcome {
            task_name: task.name.clone(),
            job_id: None,
            status: BatchTaskStatus::Skipped,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::{cfg, FakeSource};
    use crate::fetcher::FetchEvent;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        registry: TaskRegistry,
        store: JobStore,
        cancels: CancelFlags,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let registry = TaskRegistry::open(dir.path().join("reports_config.json")).unwrap();
        let store = JobStore::open(dir.path().join("jobs_db.json")).unwrap();
        Fixture {
            _dir: dir,
            registry,
            store,
            cancels: CancelFlags::default(),
        }
    }

    fn fuente_a_falla_b_anda() -> FakeSource {
        FakeSource::new()
            .script(
                "a_rota",
                vec![FetchEvent::Failed {
                    error: "boom".to_string(),
                }],
            )
            .script(
                "b_sana",
                vec![FetchEvent::Completed {
                    output_file: "/data/out/b_sana.csv".to_string(),
                    rows_fetched: 10,
                }],
            )
    }

    #[tokio::test]
    async fn continue_on_error_sigue_despues_de_una_falla() {
        let fx = fixture();
        fx.registry.create(cfg("a_rota", Frequency::Daily)).unwrap();
        fx.registry.create(cfg("b_sana", Frequency::Daily)).unwrap();

        let summary = run_batch(
            &fuente_a_falla_b_anda(),
            &fx.registry,
            &fx.store,
            &fx.cancels,
            Frequency::Daily,
            true,
        )
        .await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);

        // orden del registro, con sus resultados
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.outcomes[0].task_name, "a_rota");
        assert_eq!(summary.outcomes[0].status, BatchTaskStatus::Failed);
        assert_eq!(summary.outcomes[1].task_name, "b_sana");
        assert_eq!(summary.outcomes[1].status, BatchTaskStatus::Completed);

        assert_eq!(summary.job_ids.len(), 2);

        // los dos jobs quedaron en el historial con su estado
        let a = fx.store.get(&summary.job_ids[0]).unwrap();
        assert_eq!(a.status, JobStatus::Failed);
        let b = fx.store.get(&summary.job_ids[1]).unwrap();
        assert_eq!(b.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn sin_continue_on_error_corta_y_no_arranca_lo_que_sigue() {
        let fx = fixture();
        fx.registry.create(cfg("a_rota", Frequency::Daily)).unwrap();
        fx.registry.create(cfg("b_sana", Frequency::Daily)).unwrap();

        let summary = run_batch(
            &fuente_a_falla_b_anda(),
            &fx.registry,
            &fx.store,
            &fx.cancels,
            Frequency::Daily,
            false,
        )
        .await;

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);

        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.outcomes[0].status, BatchTaskStatus::Failed);
        assert_eq!(summary.outcomes[1].task_name, "b_sana");
        assert_eq!(summary.outcomes[1].status, BatchTaskStatus::Skipped);
        assert!(summary.outcomes[1].job_id.is_none());

        // b_sana nunca llegó a crear un job
        assert_eq!(summary.job_ids.len(), 1);
        assert_eq!(fx.store.list(None).len(), 1);
    }

    #[tokio::test]
    async fn solo_corre_las_tareas_activas_de_esa_frecuencia() {
        let fx = fixture();
        let mut inactiva = cfg("a_rota", Frequency::Daily);
        inactiva.active = false;
        fx.registry.create(inactiva).unwrap();
        fx.registry.create(cfg("b_sana", Frequency::Daily)).unwrap();
        fx.registry.create(cfg("semanal", Frequency::Weekly)).unwrap();

        let summary = run_batch(
            &fuente_a_falla_b_anda(),
            &fx.registry,
            &fx.store,
            &fx.cancels,
            Frequency::Daily,
            true,
        )
        .await;

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].task_name, "b_sana");
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn borrar_la_tarea_no_toca_sus_jobs_viejos() {
        let fx = fixture();
        fx.registry.create(cfg("b_sana", Frequency::Daily)).unwrap();

        let summary = run_batch(
            &fuente_a_falla_b_anda(),
            &fx.registry,
            &fx.store,
            &fx.cancels,
            Frequency::Daily,
            true,
        )
        .await;
        let job_id = summary.job_ids[0].clone();

        fx.registry.delete("b_sana").unwrap();

        // el job sobrevive a la tarea, intacto
        let job = fx.store.get(&job_id).unwrap();
        assert_eq!(job.task_name, "b_sana");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_file.as_deref(), Some("/data/out/b_sana.csv"));
    }

    #[tokio::test]
    async fn lote_vacio_devuelve_resumen_vacio() {
        let fx = fixture();

        let summary = run_batch(
            &FakeSource::new(),
            &fx.registry,
            &fx.store,
            &fx.cancels,
            Frequency::Monthly,
            true,
        )
        .await;

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 0);
        assert!(summary.outcomes.is_empty());
        assert!(summary.job_ids.is_empty());
    }
}
