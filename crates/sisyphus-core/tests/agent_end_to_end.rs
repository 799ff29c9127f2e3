use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sisyphus_core::domain::{AgentState, ContainerExit, VolumeMode};
use sisyphus_core::impls::{
    InMemoryEventBus, InMemoryWorkQueue, LocalObjectStore, RecordingRuntime, RunRequest,
};
use sisyphus_core::ports::WorkQueue;
use sisyphus_core::{
    Agent, AgentBuilder, AgentConfig, AgentContext, AgentError, AgentHooks, BusMessage, Command,
    TaskDescriptor,
};
use tempfile::TempDir;

struct Dirs {
    store: TempDir,
    stage: TempDir,
}

fn dirs() -> Dirs {
    Dirs {
        store: tempfile::tempdir().unwrap(),
        stage: tempfile::tempdir().unwrap(),
    }
}

fn config(dirs: &Dirs) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.storage.local_root = dirs.stage.path().to_path_buf();
    config
}

/// Stands in for `sh -c 'echo hi > /out/a.txt'`.
fn echo_into_outputs(request: &RunRequest) -> ContainerExit {
    for binding in request.volumes.iter() {
        if binding.mode == VolumeMode::ReadWrite {
            std::fs::write(&binding.local_path, b"hi\n").unwrap();
        }
    }
    ContainerExit::new(0, "")
}

fn queue_agent(
    dirs: &Dirs,
    queue: &Arc<InMemoryWorkQueue>,
    runtime: Arc<RecordingRuntime>,
) -> Arc<Agent> {
    Arc::new(
        AgentBuilder::new(config(dirs))
            .with_work_queue(queue.clone())
            .with_object_store(Arc::new(LocalObjectStore::new(dirs.store.path())))
            .with_container_runtime(runtime)
            .build()
            .unwrap(),
    )
}

async fn run_until_drained(
    agent: &Arc<Agent>,
    queue: &InMemoryWorkQueue,
) -> Result<(), AgentError> {
    let running = tokio::spawn({
        let agent = agent.clone();
        async move { agent.start().await }
    });
    tokio::time::timeout(Duration::from_secs(5), queue.wait_drained("tasks"))
        .await
        .unwrap();
    agent.shutdown();
    running.await.unwrap()
}

#[tokio::test]
async fn submitted_task_output_lands_in_bucket() {
    let dirs = dirs();
    let queue = Arc::new(InMemoryWorkQueue::new());
    let runtime = Arc::new(RecordingRuntime::new().with_effect(echo_into_outputs));
    let agent = queue_agent(&dirs, &queue, runtime.clone());

    let task = TaskDescriptor::new("alpine")
        .with_command(Command::new(["echo", "hi"]).with_stdout("/out/a.txt"))
        .with_output("mybucket:result/a.txt", "/out/a.txt");
    agent.submit(&task).await.unwrap();

    run_until_drained(&agent, &queue).await.unwrap();

    let uploaded = std::fs::read(dirs.store.path().join("mybucket/result/a.txt")).unwrap();
    assert_eq!(uploaded, b"hi\n");
    assert_eq!(runtime.pulls(), vec!["alpine"]);
    assert_eq!(runtime.runs()[0].argv, vec!["sh", "-c", "echo hi > /out/a.txt"]);
    assert_eq!(queue.acked_count().await, 1);
    assert_eq!(agent.counts().succeeded, 1);
    assert_eq!(agent.state(), AgentState::Stopped);
}

#[tokio::test]
async fn malformed_message_does_not_block_the_next_task() {
    let dirs = dirs();
    let queue = Arc::new(InMemoryWorkQueue::new());
    let runtime = Arc::new(RecordingRuntime::new().with_effect(echo_into_outputs));
    let agent = queue_agent(&dirs, &queue, runtime.clone());

    queue.declare("tasks", true).await.unwrap();
    queue
        .publish("tasks", br#"{"container": "alpine"}"#.to_vec(), true)
        .await
        .unwrap();
    let task = TaskDescriptor::new("busybox")
        .with_command(Command::new(["touch", "/out/done"]))
        .with_output("done", "/out/done");
    agent.submit(&task).await.unwrap();

    run_until_drained(&agent, &queue).await.unwrap();

    assert_eq!(queue.acked_count().await, 2);
    assert_eq!(queue.pending("tasks").await, 0);
    assert_eq!(runtime.pulls(), vec!["busybox"]);
    // default bucket for a reference without prefix
    assert!(dirs.store.path().join("sisyphus/done").exists());
    let counts = agent.counts();
    assert_eq!((counts.malformed, counts.succeeded), (1, 1));
}

#[tokio::test]
async fn failing_task_is_reported_and_not_uploaded() {
    let dirs = dirs();
    let queue = Arc::new(InMemoryWorkQueue::new());
    let runtime =
        Arc::new(RecordingRuntime::new().with_effect(|_| ContainerExit::new(127, "not found")));
    let agent = queue_agent(&dirs, &queue, runtime.clone());

    let task = TaskDescriptor::new("alpine")
        .with_command(Command::new(["missing-tool"]))
        .with_command(Command::new(["never-runs"]))
        .with_output("out.txt", "/out/out.txt");
    agent.submit(&task).await.unwrap();

    run_until_drained(&agent, &queue).await.unwrap();

    assert_eq!(runtime.runs().len(), 1);
    assert!(!dirs.store.path().join("sisyphus/out.txt").exists());
    assert_eq!(queue.acked_count().await, 1);
    assert_eq!(agent.counts().failed, 1);
}

#[tokio::test]
async fn agent_starts_only_once() {
    let dirs = dirs();
    let queue = Arc::new(InMemoryWorkQueue::new());
    let agent = queue_agent(&dirs, &queue, Arc::new(RecordingRuntime::new()));

    agent.shutdown();
    agent.start().await.unwrap();
    assert_eq!(agent.state(), AgentState::Stopped);

    let err = agent.start().await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidState { action: "start", .. }));
}

/// Announces itself once subscribed and stops on the first reply.
struct PingPong;

#[async_trait]
impl AgentHooks for PingPong {
    async fn preinitialize(&self, ctx: &AgentContext) {
        ctx.send("lobby", &json!({"event": "READY", "agent": ctx.id().to_string()}))
            .await
            .unwrap();
    }

    async fn receive(&self, ctx: &AgentContext, message: BusMessage) {
        if message.event() == Some("READY") {
            ctx.send("lobby", &json!({"event": "GLOBAL_SHUTDOWN"})).await.unwrap();
        }
    }
}

#[tokio::test]
async fn bus_agent_reacts_to_its_own_announcement() {
    let dirs = dirs();
    let bus = Arc::new(InMemoryEventBus::new());
    let mut config = config(&dirs);
    config.bus.subscribe = vec!["lobby".to_string()];
    config.bus.poll_timeout_ms = 20;

    let agent = AgentBuilder::new(config)
        .with_event_bus(bus.clone())
        .with_object_store(Arc::new(LocalObjectStore::new(dirs.store.path())))
        .with_container_runtime(Arc::new(RecordingRuntime::new()))
        .with_hooks(Arc::new(PingPong))
        .build()
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), agent.start())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(agent.state(), AgentState::Stopped);
    assert_eq!(bus.produced("lobby").await.len(), 2);
    assert_eq!(agent.counts().received, 1);
}
