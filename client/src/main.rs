mod api;
mod cli;
mod logs;
mod sync;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use common::{BatchSummary, Frequency, Job, TaskConfig, TaskUpdate};

use crate::api::ApiClient;
use crate::cli::{Cli, Commands, TaskCommands};
use crate::logs::LogView;
use crate::sync::{poll_job, JobListSession};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const REFRESH_COOLDOWN: Duration = Duration::from_millis(300);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::from_env();

    match cli.command {
        Commands::Tasks { command } => run_tasks(&client, command).await?,

        Commands::Run {
            task,
            test,
            no_wait,
        } => {
            let job = client.run(&task, test).await?;
            println!("Job creado:");
            print_job(&job);

            if !no_wait {
                println!("esperando a que termine...");
                match poll_job(&client, &job.id, POLL_INTERVAL, |j| {
                    println!(
                        "  [{:?}] filas: {} {}",
                        j.status, j.rows_fetched, j.progress_message
                    );
                })
                .await
                {
                    Some(fin) => {
                        println!("Resultado:");
                        print_job(&fin);
                    }
                    None => println!("se perdió el registro del job {}", job.id),
                }
            }
        }

        Commands::Status { id } => match client.get_job(&id).await? {
            Some(job) => {
                println!("Job:");
                print_job(&job);
            }
            None => println!("No se encontró el job con id {id}"),
        },

        Commands::Jobs { limit } => {
            let jobs = client.list_jobs(limit).await?;
            print_jobs(&jobs);
        }

        Commands::Cancel { id } => {
            client.cancel_job(&id).await?;
            println!("Job {} cancelado", id);
        }

        Commands::Watch { interval } => {
            let client = Arc::new(client);
            let session = JobListSession::start(
                client.clone(),
                Duration::from_secs(interval),
                REFRESH_COOLDOWN,
            )
            .await;

            println!("observando jobs cada {}s...", interval);
            loop {
                let jobs = session.jobs();
                print_jobs(&jobs);

                if jobs.iter().all(|j| j.status.is_terminal()) {
                    println!("sin jobs activos, listo.");
                    break;
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
            session.stop();
        }

        Commands::Batch {
            frequency,
            stop_on_error,
        } => {
            let frequency: Frequency = frequency.parse().map_err(|e: String| anyhow!(e))?;
            let summary = client.run_batch(frequency, !stop_on_error).await?;
            print_batch(&summary);
        }

        Commands::Logs {
            task,
            file,
            test,
            tail,
        } => match file {
            Some(file) => {
                let contenido = client.log_content(&task, &file, test, tail).await?;
                println!("===== {} =====", contenido.name);
                println!("{}", contenido.content);
            }
            None => {
                let mut view = LogView::new(client);
                let files = view.select(&task, test).await?;

                if files.is_empty() {
                    println!("sin logs para {task}");
                }
                for f in files {
                    println!("{}  ({} bytes, {})", f.name, f.size, f.modified);
                }
            }
        },
    }

    Ok(())
}

async fn run_tasks(client: &ApiClient, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::List => {
            let tasks = client.list_tasks().await?;
            if tasks.is_empty() {
                println!("no hay tareas configuradas");
            }
            for t in tasks {
                println!(
                    "{}  [{}{}]  -> {}/{}",
                    t.name,
                    t.frequency,
                    if t.active { "" } else { ", inactiva" },
                    t.output_path,
                    t.output_file_name
                );
            }
        }

        TaskCommands::Show { name } => {
            let task = client.get_task(&name).await?;
            print_task(&task);
        }

        TaskCommands::Create { file } => {
            let raw = fs::read_to_string(&file)?;
            let config: TaskConfig = serde_json::from_str(&raw)?;
            let created = client.create_task(&config).await?;
            println!("Tarea creada:");
            print_task(&created);
        }

        TaskCommands::Update { name, file } => {
            let raw = fs::read_to_string(&file)?;
            let update: TaskUpdate = serde_json::from_str(&raw)?;
            let updated = client.update_task(&name, &update).await?;
            println!("Tarea actualizada:");
            print_task(&updated);
        }

        TaskCommands::Delete { name } => {
            client.delete_task(&name).await?;
            println!("Tarea {} borrada", name);
        }
    }

    Ok(())
}

fn print_task(task: &TaskConfig) {
    println!("  nombre: {}", task.name);
    println!("  reporte: {}", task.report_path);
    println!("  salida: {}/{}", task.output_path, task.output_file_name);
    println!("  formato: {:?}", task.output_format);
    println!("  logs: {}", task.log_dir);
    println!("  frecuencia: {}", task.frequency);
    println!("  activa: {}", task.active);
}

fn print_job(job: &Job) {
    println!("  id: {}", job.id);
    println!("  tarea: {}", job.task_name);
    println!("  estado: {:?}", job.status);
    println!("  filas: {}", job.rows_fetched);
    if let Some(out) = &job.output_file {
        println!("  salida: {}", out);
    }
    if let Some(err) = &job.error_message {
        println!("  error: {}", err);
    }
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("(sin jobs)");
        return;
    }
    for j in jobs {
        println!(
            "{}  {}  [{:?}]  filas: {}  {}",
            j.id, j.task_name, j.status, j.rows_fetched, j.progress_message
        );
    }
}

fn print_batch(summary: &BatchSummary) {
    println!("Lote {}:", summary.frequency);
    println!(
        "  ok: {}  fallidas: {}  salteadas: {}",
        summary.succeeded, summary.failed, summary.skipped
    );
    for o in &summary.outcomes {
        match &o.job_id {
            Some(id) => println!("  {}  [{:?}]  job {}", o.task_name, o.status, id),
            None => println!("  {}  [{:?}]", o.task_name, o.status),
        }
    }
}
