//! sisyphus - run task descriptors through a local agent.
//!
//! ```text
//! sisyphus [--config agent.json] [--store DIR] TASK.json...
//! ```
//!
//! Tasks are submitted to an in-memory queue, executed with the docker CLI
//! against a directory-backed object store, and the agent stops once the queue
//! is drained. With bus topics configured the agent listens until a
//! `GLOBAL_SHUTDOWN` event or Ctrl-C instead.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use sisyphus_core::domain::AgentState;
use sisyphus_core::impls::{DockerCli, InMemoryEventBus, InMemoryWorkQueue, LocalObjectStore};
use sisyphus_core::observability::{IngressCounts, init_tracing};
use sisyphus_core::{Agent, AgentBuilder, AgentConfig, TaskDescriptor};

const USAGE: &str = "usage: sisyphus [--config FILE] [--store DIR] TASK.json...";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    store: Option<PathBuf>,
    tasks: Vec<PathBuf>,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut raw = raw.into_iter();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                let path = raw.next().ok_or("--config needs a file")?;
                args.config = Some(PathBuf::from(path));
            }
            "--store" => {
                let path = raw.next().ok_or("--store needs a directory")?;
                args.store = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}\n{USAGE}")),
            _ => args.tasks.push(PathBuf::from(arg)),
        }
    }
    Ok(args)
}

async fn run(args: Args) -> Result<IngressCounts, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    let store = args
        .store
        .unwrap_or_else(|| config.storage.local_root.join("store"));
    let queue_name = config.queue.queue.clone();
    let uses_bus = config.uses_bus();
    let offset_reset = config.bus.offset_reset;

    let queue = Arc::new(InMemoryWorkQueue::new());
    let agent = Arc::new(
        AgentBuilder::new(config)
            .with_work_queue(queue.clone())
            .with_event_bus(Arc::new(InMemoryEventBus::with_offset_reset(offset_reset)))
            .with_object_store(Arc::new(LocalObjectStore::new(store)))
            .with_container_runtime(Arc::new(DockerCli::new()))
            .build()?,
    );

    for path in &args.tasks {
        let raw = tokio::fs::read(path).await?;
        let task = TaskDescriptor::from_slice(&raw)?;
        agent.submit(&task).await?;
        tracing::info!(task = %path.display(), "queued");
    }

    let running = tokio::spawn({
        let agent = agent.clone();
        async move { agent.start().await }
    });

    if uses_bus {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = wait_stopped(&agent) => {}
        }
    } else {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = queue.wait_drained(&queue_name) => {}
        }
    }
    agent.shutdown();
    running.await??;

    Ok(agent.counts())
}

async fn wait_stopped(agent: &Agent) {
    let mut state = agent.context().watch_state();
    let _ = state
        .wait_for(|state| *state == AgentState::Stopped)
        .await;
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    match run(args).await {
        Ok(counts) => {
            match serde_json::to_string_pretty(&counts) {
                Ok(summary) => println!("{summary}"),
                Err(err) => tracing::warn!(error = %err, "failed to render summary"),
            }
            if counts.failed + counts.malformed > 0 {
                std::process::exit(1);
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "sisyphus failed");
            std::process::exit(1);
        }
    }
}
