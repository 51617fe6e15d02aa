use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para administrar tareas de reportes y sus corridas")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Administra las tareas configuradas
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Dispara una corrida y sigue su avance hasta que termina
    Run {
        #[arg(value_name = "TAREA")]
        task: String,

        /// Modo test: menos filas y salida aparte
        #[arg(long)]
        test: bool,

        /// No esperar: imprime el job recién creado y vuelve
        #[arg(long)]
        no_wait: bool,
    },

    /// Consulta el estado de un job
    Status {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },

    /// Lista los últimos jobs
    Jobs {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Cancela un job en vuelo
    Cancel {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },

    /// Observa la lista de jobs mientras quede alguno activo
    Watch {
        /// Segundos entre polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },

    /// Corre en lote todas las tareas activas de una frecuencia
    Batch {
        #[arg(value_name = "FRECUENCIA")]
        frequency: String,

        /// Cortar el lote en la primera falla
        #[arg(long)]
        stop_on_error: bool,
    },

    /// Lista los logs de una tarea, o muestra uno
    Logs {
        #[arg(value_name = "TAREA")]
        task: String,

        /// Archivo puntual a mostrar
        #[arg(value_name = "ARCHIVO")]
        file: Option<String>,

        #[arg(long)]
        test: bool,

        /// Últimas N líneas (0 = completo)
        #[arg(long)]
        tail: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Lista todas las tareas
    List,

    /// Muestra una tarea
    Show { name: String },

    /// Crea una tarea desde un archivo JSON de configuración
    Create {
        #[arg(value_name = "ARCHIVO")]
        file: PathBuf,
    },

    /// Actualiza una tarea desde un JSON parcial (lo ausente no se toca)
    Update {
        name: String,
        #[arg(value_name = "ARCHIVO")]
        file: PathBuf,
    },

    /// Borra una tarea (sus jobs viejos quedan)
    Delete { name: String },
}
