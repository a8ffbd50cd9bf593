use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;

use plan_engine::Coordinator;
use plan_engine::capabilities::CapabilityRegistry;
use plan_engine::capabilities::builtin::register_builtins;
use plan_engine::config::{EngineConfig, PlannerConfig};
use plan_engine::planner::{KeywordPlanner, LlmPlanner, Planner};
use plan_engine::task::{TaskEvent, TaskId};

/// How long the CLI waits for one request before giving up on it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let engine_config = EngineConfig::from_env().context("invalid engine configuration")?;
    let planner_config = PlannerConfig::from_env().context("invalid planner configuration")?;

    let registry = Arc::new(CapabilityRegistry::new());
    register_builtins(&registry, engine_config.workspace_dir.clone()).await;

    let planner: Arc<dyn Planner> = if planner_config.api_key.is_some() {
        Arc::new(LlmPlanner::new(planner_config, Arc::clone(&registry))?)
    } else {
        tracing::warn!("OPENAI_API_KEY not set; using the keyword planner");
        Arc::new(KeywordPlanner::default_rules())
    };

    eprintln!("plan-engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Planner: {}", planner.name());
    eprintln!("   Workspace: {}", engine_config.workspace_dir.display());
    eprintln!(
        "   Workers: {} tasks / {} steps",
        engine_config.max_concurrent_tasks, engine_config.max_concurrent_steps
    );
    eprintln!("   Type a request and press Enter. /tasks, /capabilities, /quit.\n");

    let coordinator = Coordinator::new(&engine_config, registry, planner);
    let _retention = coordinator.spawn_retention_task();

    let mut events = Box::pin(coordinator.events());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/tasks" => {
                for task in coordinator.list_tasks().await {
                    println!("{} [{}] {}", task.task_id, task.status, task.input);
                }
            }
            "/capabilities" => {
                for capability in coordinator.list_capabilities().await {
                    println!(
                        "{} ({}): {}",
                        capability.name,
                        capability.actions.join(", "),
                        capability.description
                    );
                }
            }
            _ if line.starts_with("/task ") => {
                let id: TaskId = match line["/task ".len()..].parse() {
                    Ok(id) => id,
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };
                match coordinator.get_task(id).await {
                    Some(task) => {
                        for entry in &task.log {
                            println!("{entry}");
                        }
                    }
                    None => eprintln!("{id} not found"),
                }
            }
            request => {
                let id = coordinator.submit_task(request).await;
                match coordinator.wait_for_terminal(id, REQUEST_TIMEOUT).await {
                    Ok(task) => match task.result {
                        Some(result) => println!("{result}\n"),
                        None => println!("{}: {}\n", task.status, task.status_message),
                    },
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    Ok(())
}

fn print_event(event: &TaskEvent) {
    let task = event.task();
    tracing::debug!(topic = event.topic(), task_id = %task.task_id, "Task event");
    eprintln!("   {} {}: {}", task.task_id, task.status, task.status_message);
}
