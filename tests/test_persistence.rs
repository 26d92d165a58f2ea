//! Snapshot and restore tests

mod common;

use std::sync::Arc;

use common::{init_logging, wait_for_turns};
use kodegen_agent_orchestrator::{
    ConversationMessage, OrchestratorError, OrchestratorOptions, OrchestratorSnapshot,
    RoleAuthority, SNAPSHOT_VERSION, ScriptedAgent, SessionId, SessionManager, SessionRole,
    TriggerKinds, WatcherConfig,
};

fn watcher_config() -> WatcherConfig {
    WatcherConfig::builder("Watch for mistakes.")
        .triggers(TriggerKinds::TURN_COMPLETE)
        .silence_timeout(None)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_snapshot_round_trip_restores_sessions_and_edges() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let manager = SessionManager::with_defaults(Arc::new(ScriptedAgent::new()));
    let parent = manager
        .create_session(Some(SessionRole::new("builder", None, RoleAuthority::Peer).unwrap()))
        .unwrap();
    let watcher = manager
        .create_watcher(
            parent,
            SessionRole::new("reviewer", None, RoleAuthority::Supervisor).unwrap(),
            watcher_config(),
        )
        .unwrap();

    manager.prompt(parent, "hello").unwrap();
    wait_for_turns(&manager, parent, 1).await;
    wait_for_turns(&manager, watcher, 1).await;

    let before_parent = manager.session(parent).unwrap().buffered_chunks();
    let before_watcher = manager.session(watcher).unwrap().buffered_chunks();
    manager.save_snapshot(&path).await.unwrap();
    manager.shutdown().await.unwrap();

    let snapshot = OrchestratorSnapshot::load(&path).await.unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.sessions.len(), 2);

    let agent = Arc::new(ScriptedAgent::new());
    let restored =
        SessionManager::restore(agent.clone(), OrchestratorOptions::default(), snapshot).unwrap();

    assert_eq!(restored.list(), vec![parent, watcher]);
    assert_eq!(restored.get_parent(watcher), Some(parent));
    assert_eq!(restored.get_watchers(parent), vec![watcher]);
    assert_eq!(restored.session(parent).unwrap().buffered_chunks(), before_parent);
    assert_eq!(restored.session(watcher).unwrap().buffered_chunks(), before_watcher);

    let info = restored.info(watcher).unwrap();
    assert_eq!(info.role.name, "reviewer");
    assert_eq!(info.role.authority, RoleAuthority::Supervisor);
    assert_eq!(info.watcher_config, Some(watcher_config()));

    // The conversation continues where it left off.
    restored.prompt(parent, "again").unwrap();
    wait_for_turns(&restored, parent, 2).await;

    let request = &agent.requests_for(parent)[0];
    assert_eq!(
        request.history,
        vec![ConversationMessage::user("hello"), ConversationMessage::assistant("ok")]
    );

    let sequences: Vec<u64> = restored
        .session(parent)
        .unwrap()
        .buffered_chunks()
        .iter()
        .filter_map(|c| c.correlation_id.as_ref().and_then(|id| id.sequence()))
        .collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    restored.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_load_rejects_unknown_version() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.json");

    let manager = SessionManager::with_defaults(Arc::new(ScriptedAgent::new()));
    manager.create_session(None).unwrap();
    let mut snapshot = manager.snapshot();
    snapshot.version = SNAPSHOT_VERSION + 1;
    tokio::fs::write(&path, serde_json::to_vec(&snapshot).unwrap())
        .await
        .unwrap();

    assert!(matches!(
        OrchestratorSnapshot::load(&path).await,
        Err(OrchestratorError::InvalidConfig(_))
    ));

    tokio::fs::write(&path, b"not json").await.unwrap();
    assert!(matches!(
        OrchestratorSnapshot::load(&path).await,
        Err(OrchestratorError::Json(_))
    ));
    assert!(matches!(
        OrchestratorSnapshot::load(dir.path().join("missing.json")).await,
        Err(OrchestratorError::Persistence(_))
    ));
}

#[tokio::test]
async fn test_restore_leaves_orphaned_watcher_detached() {
    init_logging();
    let manager = SessionManager::with_defaults(Arc::new(ScriptedAgent::new()));
    let parent = manager.create_session(None).unwrap();
    let watcher = manager
        .create_watcher(parent, SessionRole::default(), watcher_config())
        .unwrap();

    let mut snapshot = manager.snapshot();
    snapshot.sessions.retain(|s| s.id != parent);

    let restored = SessionManager::restore(
        Arc::new(ScriptedAgent::new()),
        OrchestratorOptions::default(),
        snapshot,
    )
    .unwrap();
    assert_eq!(restored.list(), vec![watcher]);
    assert_eq!(restored.get_parent(watcher), None);
    assert!(restored.info(watcher).unwrap().watcher_config.is_some());
}

#[tokio::test]
async fn test_restore_respects_session_limit() {
    init_logging();
    let manager = SessionManager::with_defaults(Arc::new(ScriptedAgent::new()));
    for _ in 0..3 {
        manager.create_session(None).unwrap();
    }
    let snapshot = manager.snapshot();

    let options = OrchestratorOptions::builder().max_sessions(2).build().unwrap();
    let restored = SessionManager::restore(Arc::new(ScriptedAgent::new()), options, snapshot);
    assert!(matches!(restored, Err(OrchestratorError::SessionLimitReached(2))));

    let ids: Vec<SessionId> = manager.list();
    assert_eq!(ids.len(), 3);
}
