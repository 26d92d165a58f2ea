// Demo: a worker session watched by a supervisor session.
//
// Runs entirely on a scripted agent, so no model or network access is
// needed. Set RUST_LOG=debug to see the orchestrator's own logging.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use kodegen_agent_orchestrator::{
    ChunkKind, OrchestratorOptions, RoleAuthority, ScriptStep, ScriptedAgent, SessionManager,
    SessionRole, SessionStatus, StreamChunk, TriggerKinds, WatcherConfig,
};

const SETTLE: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Turn order: worker, supervisor evaluation, worker answering the injection.
    let agent = Arc::new(
        ScriptedAgent::new()
            .with_turn(vec![
                ScriptStep::text("Removing build artifacts with rm -rf ./target ./data\n"),
                ScriptStep::Delay(Duration::from_millis(20)),
                ScriptStep::Chunk(StreamChunk::tool_call(
                    "call-1",
                    "shell",
                    serde_json::json!({ "command": "rm -rf ./target ./data" }),
                )),
                ScriptStep::done(),
            ])
            .with_turn(vec![
                ScriptStep::text(
                    "[INTERJECT]\nurgent: false\ncontent: ./data holds user files; only remove ./target.\n[/INTERJECT]",
                ),
                ScriptStep::done(),
            ])
            .with_turn(vec![
                ScriptStep::text("Understood, leaving ./data in place.\n"),
                ScriptStep::done(),
            ]),
    );

    let options = OrchestratorOptions::builder().max_sessions(4).build()?;
    let manager = SessionManager::new(agent.clone(), options);

    let worker = manager.create_session(Some(SessionRole::new(
        "worker",
        Some("Performs housekeeping tasks".into()),
        RoleAuthority::Peer,
    )?))?;
    let supervisor = manager.create_watcher(
        worker,
        SessionRole::new("safety", None, RoleAuthority::Supervisor)?,
        WatcherConfig::builder("Stop anything that deletes user data.")
            .triggers(TriggerKinds::TURN_COMPLETE)
            .build()?,
    )?;

    manager.attach(worker, Arc::new(|chunk: &StreamChunk| print_chunk("worker", chunk)))?;
    manager.attach(supervisor, Arc::new(|chunk: &StreamChunk| print_chunk("safety", chunk)))?;

    manager.prompt(worker, "Clean up the workspace")?;

    // Let the worker turn, the evaluation and the injected turn play out.
    let worker_session = manager.session(worker)?;
    while agent.requests_for(worker).len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    worker_session.wait_for_status(SessionStatus::Idle).await;
    tokio::time::sleep(SETTLE).await;

    for info in manager.list_info() {
        println!(
            "{} {:<8} {:?} chunks={} parent={:?} watchers={}",
            info.id,
            info.role.name,
            info.status,
            info.chunk_count,
            info.parent,
            info.watchers.len()
        );
    }

    manager.shutdown().await?;
    Ok(())
}

fn print_chunk(label: &str, chunk: &StreamChunk) {
    match &chunk.kind {
        ChunkKind::Text { text } => print!("[{label}] {text}"),
        ChunkKind::WatcherInput(injection) => println!("[{label}] <= {}", injection.encode_wire()),
        ChunkKind::InjectionConsumed(injection) => {
            println!("[{label}] (answering {})", injection.role_name);
        }
        ChunkKind::Done => println!("[{label}] (done)"),
        other => {
            if let Some(rendered) = chunk.render_observation() {
                println!("[{label}] {}", rendered.trim_end());
            } else {
                println!("[{label}] {other:?}");
            }
        }
    }
}
