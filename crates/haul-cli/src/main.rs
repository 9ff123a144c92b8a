#![forbid(unsafe_code)]

mod fixture;
mod lock;
mod output;
mod state;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use haul_core::domain::{MaterialType, NewTask, Priority, TaskId, TaskStatus};
use haul_core::ports::{ActivityFilter, TaskFilter};
use haul_core::{EngineConfig, EngineError, load_config};
use output::{Containers, OutputMode, render};
use state::Workspace;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "haul: pickup-to-warehouse task lifecycle",
    long_about = None
)]
struct Cli {
    /// JSON state file holding users, containers, tasks and logs.
    #[arg(long, global = true, default_value = "haul-state.json")]
    state: PathBuf,

    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register users and containers from a TOML fixture.
    Seed { fixture: PathBuf },

    /// Plan a new pickup task.
    CreateTask {
        /// Customer container QR code or id.
        #[arg(long)]
        container: String,
        #[arg(long)]
        quantity: u64,
        #[arg(long, default_value = "kg")]
        unit: String,
        /// Defaults to the container's material.
        #[arg(long)]
        material: Option<String>,
        /// Warehouse container QR code or id the load must go to.
        #[arg(long)]
        target: Option<String>,
        #[arg(long, default_value = "normal")]
        priority: Priority,
        /// RFC 3339 timestamp.
        #[arg(long)]
        scheduled_for: Option<DateTime<Utc>>,
        /// Creating user (name or id).
        #[arg(long = "by")]
        actor: String,
    },

    /// Assign a planned task to a driver.
    Assign {
        task: TaskId,
        #[arg(long)]
        driver: String,
        #[arg(long = "by")]
        actor: String,
    },

    /// Move an assigned task to another driver.
    Reassign {
        task: TaskId,
        #[arg(long)]
        driver: String,
        #[arg(long = "by")]
        actor: String,
    },

    /// Put an assigned task back to PLANNED.
    Unassign {
        task: TaskId,
        #[arg(long = "by")]
        actor: String,
    },

    /// Record a QR scan and show what it resolves to.
    Scan {
        payload: String,
        #[arg(long)]
        driver: String,
        #[arg(long)]
        location: Option<String>,
    },

    /// Confirm pickup at the customer container.
    Pickup {
        task: TaskId,
        #[arg(long)]
        driver: String,
        #[arg(long)]
        location: Option<String>,
    },

    /// Record the weighed amount of an in-transit load.
    Weigh {
        task: TaskId,
        #[arg(long)]
        driver: String,
        #[arg(long)]
        amount: u64,
    },

    /// Confirm delivery into a warehouse container.
    Deliver {
        task: TaskId,
        #[arg(long)]
        driver: String,
        /// Warehouse container QR code or id.
        #[arg(long)]
        container: String,
        /// Defaults to the recorded weight, then the planned quantity.
        #[arg(long)]
        amount: Option<u64>,
        #[arg(long)]
        location: Option<String>,
    },

    /// Cancel any task that is not COMPLETED or CANCELLED.
    Cancel {
        task: TaskId,
        #[arg(long)]
        reason: String,
        #[arg(long = "by")]
        actor: String,
    },

    /// Plan a fresh task from a cancelled one.
    Reopen {
        task: TaskId,
        #[arg(long = "by")]
        actor: String,
    },

    /// Read-only views.
    #[command(subcommand)]
    Show(ShowCommand),
}

#[derive(Subcommand, Debug)]
enum ShowCommand {
    /// List tasks.
    Tasks {
        /// Only this driver's open tasks.
        #[arg(long)]
        driver: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// One task in full.
    Task { task: TaskId },
    /// All containers.
    Containers,
    /// Fill ledger of a warehouse container.
    Fill { container: String },
    /// Activity log, oldest first.
    Activity {
        #[arg(long)]
        task: Option<TaskId>,
    },
    /// Tasks per status.
    Counts,
    /// Check a warehouse container's amount against its fill ledger.
    Reconcile { container: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HAUL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "haul=debug,info"
        } else {
            "haul=info,warn"
        })
    });

    let format = env::var("HAUL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_config(path).context("failed to load config"),
        None => Ok(EngineConfig::default()),
    }
}

/// Attach the stable error code so scripts can match on it.
fn coded(err: EngineError) -> anyhow::Error {
    let code = err.code();
    anyhow::Error::new(err).context(code)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mode = cli.output_mode();
    let config = engine_config(cli.config.as_deref())?;
    let ws = Workspace::open(&cli.state, config)?;

    let mutated = run(&ws, cli.command, mode).await?;
    if mutated {
        ws.save().await?;
        info!(state = %cli.state.display(), "state saved");
    }
    Ok(())
}

/// Run one command; `Ok(true)` when the state file must be rewritten.
async fn run(ws: &Workspace, command: Commands, mode: OutputMode) -> Result<bool> {
    let engine = &ws.engine;

    match command {
        Commands::Seed { fixture } => {
            let seeded = fixture::Fixture::load(&fixture)?
                .apply(&ws.store)
                .await?;
            render(mode, &seeded, |w, s| {
                for user in &s.users {
                    writeln!(w, "user      {} {} ({})", user.id, user.name, user.role)?;
                }
                for c in &s.customer_containers {
                    writeln!(w, "customer  {} {}", c.id, c.qr_code)?;
                }
                for c in &s.warehouse_containers {
                    writeln!(w, "warehouse {} {}", c.id, c.qr_code)?;
                }
                Ok(())
            })?;
            Ok(true)
        }

        Commands::CreateTask {
            container,
            quantity,
            unit,
            material,
            target,
            priority,
            scheduled_for,
            actor,
        } => {
            let actor = ws.user(&actor).await?;
            let container = ws.customer_container(&container).await?;
            let target = match target {
                Some(reference) => Some(ws.warehouse_container(&reference).await?.id),
                None => None,
            };
            let spec = NewTask {
                customer_container_id: container.id,
                target_warehouse_id: target,
                scheduled_for,
                planned_quantity: quantity,
                unit,
                priority,
                material_type: material
                    .map(MaterialType::new)
                    .unwrap_or_else(|| container.material_type.clone()),
            };
            let task = engine.create_task(spec, actor.id).await.map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Assign {
            task,
            driver,
            actor,
        } => {
            let driver = ws.user(&driver).await?;
            let actor = ws.user(&actor).await?;
            let task = engine
                .assign_driver(task, driver.id, actor.id)
                .await
                .map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Reassign {
            task,
            driver,
            actor,
        } => {
            let driver = ws.user(&driver).await?;
            let actor = ws.user(&actor).await?;
            let task = engine
                .reassign(task, Some(driver.id), actor.id)
                .await
                .map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Unassign { task, actor } => {
            let actor = ws.user(&actor).await?;
            let task = engine.reassign(task, None, actor.id).await.map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Scan {
            payload,
            driver,
            location,
        } => {
            let driver = ws.user(&driver).await?;
            // The scan event is written even when the scan is rejected.
            let result = engine.record_scan(&payload, driver.id, location).await;
            ws.save().await?;
            let resolution = result.map_err(coded)?;
            render(mode, &resolution, output::resolution)?;
            Ok(false)
        }

        Commands::Pickup {
            task,
            driver,
            location,
        } => {
            let driver = ws.user(&driver).await?;
            let task = engine
                .confirm_pickup(task, driver.id, location)
                .await
                .map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Weigh {
            task,
            driver,
            amount,
        } => {
            let driver = ws.user(&driver).await?;
            let task = engine
                .record_weight(task, driver.id, amount)
                .await
                .map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Deliver {
            task,
            driver,
            container,
            amount,
            location,
        } => {
            let driver = ws.user(&driver).await?;
            let container = ws.warehouse_container(&container).await?;
            let receipt = engine
                .confirm_delivery(task, driver.id, container.id, amount, location)
                .await
                .map_err(coded)?;
            render(mode, &receipt, output::receipt)?;
            Ok(true)
        }

        Commands::Cancel {
            task,
            reason,
            actor,
        } => {
            let actor = ws.user(&actor).await?;
            let task = engine
                .cancel(task, actor.id, &reason)
                .await
                .map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Reopen { task, actor } => {
            let actor = ws.user(&actor).await?;
            let task = engine.reopen(task, actor.id).await.map_err(coded)?;
            render(mode, &task, output::task_line)?;
            Ok(true)
        }

        Commands::Show(view) => {
            show(ws, view, mode).await?;
            Ok(false)
        }
    }
}

async fn show(ws: &Workspace, view: ShowCommand, mode: OutputMode) -> Result<()> {
    let engine = &ws.engine;

    match view {
        ShowCommand::Tasks { driver, status } => {
            let tasks = match (driver, status) {
                (Some(driver), _) => {
                    let driver = ws.user(&driver).await?;
                    let mut tasks = engine.tasks_for_driver(driver.id).await.map_err(coded)?;
                    if let Some(status) = status {
                        tasks.retain(|t| t.status == status);
                    }
                    tasks
                }
                (None, Some(status)) => engine
                    .tasks(&TaskFilter::with_status(status))
                    .await
                    .map_err(coded)?,
                (None, None) => engine.tasks(&TaskFilter::all()).await.map_err(coded)?,
            };
            render(mode, &tasks, |w, tasks| {
                tasks.iter().try_for_each(|t| output::task_line(w, t))
            })
        }
        ShowCommand::Task { task } => {
            let task = engine.task(task).await.map_err(coded)?;
            render(mode, &task, output::task_detail)
        }
        ShowCommand::Containers => {
            let all = Containers {
                customer: ws.store.customer_containers().await,
                warehouse: ws.store.warehouse_containers().await,
            };
            render(mode, &all, output::containers)
        }
        ShowCommand::Fill { container } => {
            let container = ws.warehouse_container(&container).await?;
            let entries = engine.fill_history(container.id).await.map_err(coded)?;
            render(mode, &entries, |w, e| output::fill(w, e))
        }
        ShowCommand::Activity { task } => {
            let filter = ActivityFilter {
                task,
                ..ActivityFilter::default()
            };
            let entries = engine.activity_log(&filter).await.map_err(coded)?;
            render(mode, &entries, |w, e| output::activity(w, e))
        }
        ShowCommand::Counts => {
            let counts = engine.status_counts().await.map_err(coded)?;
            render(mode, &counts, output::counts)
        }
        ShowCommand::Reconcile { container } => {
            let container = ws.warehouse_container(&container).await?;
            let rec = engine.reconcile(container.id).await.map_err(coded)?;
            render(mode, &rec, output::reconciliation)
        }
    }
}
