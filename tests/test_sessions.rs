//! Session lifecycle, prompting, interruption and output tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{WAIT, count, init_logging, is_done, kinds, wait_for_turns, wait_until};
use kodegen_agent_orchestrator::{
    ChunkKind, OrchestratorError, OrchestratorOptions, RoleAuthority, ScriptStep, ScriptedAgent,
    SessionManager, SessionRole, SessionStatus, StreamChunk, WatcherConfig,
};
use parking_lot::Mutex;

fn manager_with(agent: &Arc<ScriptedAgent>) -> SessionManager {
    SessionManager::with_defaults(agent.clone())
}

#[tokio::test]
async fn test_create_list_and_destroy() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new());
    let manager = manager_with(&agent);

    let first = manager.create_session(None).unwrap();
    let role = SessionRole::new("planner", None, RoleAuthority::Peer).unwrap();
    let second = manager.create_session(Some(role)).unwrap();
    assert_eq!(manager.list(), vec![first, second]);

    let info = manager.info(second).unwrap();
    assert_eq!(info.role.name, "planner");
    assert_eq!(info.status, SessionStatus::Idle);
    assert_eq!(info.chunk_count, 0);
    assert!(info.parent.is_none());
    assert!(info.watchers.is_empty());

    tokio_test::assert_ok!(manager.destroy(first).await);
    assert_eq!(manager.list(), vec![second]);
    assert!(matches!(
        manager.destroy(first).await,
        Err(OrchestratorError::SessionNotFound(id)) if id == first
    ));
    assert!(matches!(
        manager.prompt(first, "hello"),
        Err(OrchestratorError::SessionNotFound(_))
    ));

    tokio_test::assert_ok!(manager.shutdown().await);
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn test_session_limit() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new());
    let options = OrchestratorOptions::builder().max_sessions(2).build().unwrap();
    let manager = SessionManager::new(agent, options);

    let parent = manager.create_session(None).unwrap();
    manager.create_session(None).unwrap();
    assert!(matches!(
        manager.create_session(None),
        Err(OrchestratorError::SessionLimitReached(2))
    ));

    let watcher = manager.create_watcher(
        parent,
        SessionRole::default(),
        WatcherConfig::builder("watch").build().unwrap(),
    );
    assert!(matches!(watcher, Err(OrchestratorError::SessionLimitReached(2))));
    assert_eq!(manager.list().len(), 2);
    assert!(manager.get_watchers(parent).is_empty());
}

#[tokio::test]
async fn test_chunks_published_in_order_with_increasing_correlation_ids() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new().with_turn(vec![
        ScriptStep::text("a"),
        ScriptStep::Chunk(StreamChunk::thinking("hmm")),
        ScriptStep::text("b"),
        ScriptStep::done(),
    ]));
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();
    let mut rx = manager.subscribe(id).unwrap();

    manager.prompt(id, "go").unwrap();

    let mut published = Vec::new();
    tokio::time::timeout(WAIT, async {
        loop {
            let chunk = rx.recv().await.unwrap();
            let terminal = chunk.is_terminal();
            published.push(chunk);
            if terminal {
                break;
            }
        }
    })
    .await
    .unwrap();

    let published_kinds: Vec<_> = published.iter().map(|c| c.kind.clone()).collect();
    assert_eq!(
        published_kinds,
        vec![
            ChunkKind::UserInput { text: "go".into() },
            ChunkKind::Text { text: "a".into() },
            ChunkKind::Thinking { text: "hmm".into() },
            ChunkKind::Text { text: "b".into() },
            ChunkKind::Done,
        ]
    );

    let sequences: Vec<u64> = published
        .iter()
        .map(|c| c.correlation_id.as_ref().and_then(|id| id.sequence()).unwrap())
        .collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);

    // Subscribers and the buffer agree.
    assert_eq!(manager.session(id).unwrap().buffered_chunks(), published);
}

#[tokio::test]
async fn test_prompts_run_in_order_with_history() {
    init_logging();
    let agent = Arc::new(
        ScriptedAgent::new()
            .with_turn(vec![ScriptStep::text("one"), ScriptStep::done()])
            .with_turn(vec![ScriptStep::text("two"), ScriptStep::done()]),
    );
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();

    manager.prompt(id, "first").unwrap();
    manager.prompt(id, "second").unwrap();
    wait_for_turns(&manager, id, 2).await;

    let requests = agent.requests_for(id);
    let prompts: Vec<_> = requests.iter().map(|r| r.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["first", "second"]);
    assert!(requests[0].history.is_empty());

    let history: Vec<_> = requests[1].history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(history, vec!["first", "one"]);
}

#[tokio::test]
async fn test_interrupt_abandons_hung_turn() {
    init_logging();
    let agent = Arc::new(
        ScriptedAgent::new().with_turn(vec![ScriptStep::text("thinking..."), ScriptStep::Hang]),
    );
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();
    let session = manager.session(id).unwrap();

    manager.prompt(id, "stall").unwrap();
    wait_until("hung turn to stream", || {
        count(&manager, id, |k| matches!(k, ChunkKind::Text { .. })) == 1
    })
    .await;
    assert_eq!(session.status(), SessionStatus::Running);
    assert_eq!(agent.live_turns(), 1);

    assert!(manager.interrupt(id).unwrap());
    tokio::time::timeout(Duration::from_millis(200), session.wait_for_status(SessionStatus::Idle))
        .await
        .expect("interrupt should resolve promptly");

    assert_eq!(agent.live_turns(), 0);
    assert_eq!(count(&manager, id, |k| matches!(k, ChunkKind::Interrupted)), 1);
    assert!(matches!(kinds(&manager, id).last(), Some(ChunkKind::Interrupted)));

    // The session stays usable.
    manager.prompt(id, "again").unwrap();
    wait_for_turns(&manager, id, 1).await;
    assert_eq!(count(&manager, id, |k| matches!(k, ChunkKind::Interrupted)), 1);
}

#[tokio::test]
async fn test_interrupt_while_idle_does_not_cancel_next_turn() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new());
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();

    assert!(manager.interrupt(id).unwrap());
    assert!(!manager.interrupt(id).unwrap());

    manager.prompt(id, "hello").unwrap();
    wait_for_turns(&manager, id, 1).await;
    assert_eq!(count(&manager, id, |k| matches!(k, ChunkKind::Interrupted)), 0);
}

#[tokio::test]
async fn test_agent_failure_becomes_error_chunk() {
    init_logging();
    let agent = Arc::new(
        ScriptedAgent::new().with_turn(vec![ScriptStep::text("partial"), ScriptStep::Fail("boom".into())]),
    );
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();

    manager.prompt(id, "try").unwrap();
    wait_until("error chunk", || {
        count(&manager, id, |k| matches!(k, ChunkKind::Error { message } if message.contains("boom"))) == 1
    })
    .await;

    manager.session(id).unwrap().wait_for_status(SessionStatus::Idle).await;
    manager.prompt(id, "retry").unwrap();
    wait_for_turns(&manager, id, 1).await;
}

#[tokio::test]
async fn test_input_queue_full() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new().with_turn(vec![ScriptStep::Hang]));
    let options = OrchestratorOptions::builder()
        .input_queue_capacity(1)
        .build()
        .unwrap();
    let manager = SessionManager::new(agent, options);
    let id = manager.create_session(None).unwrap();
    let session = manager.session(id).unwrap();

    manager.prompt(id, "hang").unwrap();
    tokio::time::timeout(WAIT, session.wait_for_status(SessionStatus::Running))
        .await
        .unwrap();

    tokio_test::assert_ok!(manager.prompt(id, "queued"));
    assert!(matches!(
        manager.prompt(id, "overflow"),
        Err(OrchestratorError::InputQueueFull(full)) if full == id
    ));
}

#[tokio::test]
async fn test_buffered_output_pagination() {
    init_logging();
    let mut steps: Vec<_> = (0..5).map(|i| ScriptStep::text(format!("line {i}"))).collect();
    steps.push(ScriptStep::done());
    let agent = Arc::new(ScriptedAgent::new().with_turn(steps));
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();

    manager.prompt(id, "count").unwrap();
    wait_for_turns(&manager, id, 1).await;

    let head = manager.buffered_output(id, 0, 3).unwrap();
    assert_eq!(head.total, 7);
    assert_eq!(head.offset, 0);
    assert_eq!(head.chunks.len(), 3);
    assert!(head.has_more);
    assert!(matches!(head.chunks[0].kind, ChunkKind::UserInput { .. }));

    let tail = manager.buffered_output(id, -2, 10).unwrap();
    assert_eq!(tail.offset, 5);
    assert_eq!(tail.chunks.len(), 2);
    assert!(!tail.has_more);
    assert!(matches!(tail.chunks[1].kind, ChunkKind::Done));

    let past_end = manager.buffered_output(id, 100, 10).unwrap();
    assert!(past_end.chunks.is_empty());
    assert!(!past_end.has_more);
}

#[tokio::test]
async fn test_attach_replays_then_streams() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new());
    let manager = manager_with(&agent);
    let id = manager.create_session(None).unwrap();

    manager.prompt(id, "before").unwrap();
    wait_for_turns(&manager, id, 1).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let replayed = manager
        .attach(id, Arc::new(move |chunk: &StreamChunk| sink.lock().push(chunk.clone())))
        .unwrap();
    assert_eq!(replayed, 3);

    manager.prompt(id, "after").unwrap();
    wait_for_turns(&manager, id, 2).await;

    assert_eq!(*seen.lock(), manager.session(id).unwrap().buffered_chunks());
    assert!(manager.detach(id).unwrap());
    assert!(!manager.detach(id).unwrap());
}

#[tokio::test]
async fn test_output_buffer_limit_keeps_newest() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new().with_turn(vec![
        ScriptStep::text("1"),
        ScriptStep::text("2"),
        ScriptStep::text("3"),
        ScriptStep::done(),
    ]));
    let options = OrchestratorOptions::builder()
        .output_buffer_limit(3)
        .build()
        .unwrap();
    let manager = SessionManager::new(agent, options);
    let id = manager.create_session(None).unwrap();

    manager.prompt(id, "go").unwrap();
    wait_until("turn to finish", || kinds(&manager, id).last().is_some_and(is_done)).await;

    assert_eq!(
        kinds(&manager, id),
        vec![
            ChunkKind::Text { text: "2".into() },
            ChunkKind::Text { text: "3".into() },
            ChunkKind::Done,
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_interrupts_record_one_interrupted() {
    init_logging();
    let agent = Arc::new(
        ScriptedAgent::new().with_turn(vec![ScriptStep::text("stuck"), ScriptStep::Hang]),
    );
    let manager = Arc::new(manager_with(&agent));
    let id = manager.create_session(None).unwrap();
    let session = manager.session(id).unwrap();

    manager.prompt(id, "stall").unwrap();
    tokio::time::timeout(WAIT, session.wait_for_status(SessionStatus::Running))
        .await
        .unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let callers: Vec<_> = (0..2)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                manager.interrupt(id).unwrap()
            })
        })
        .collect();

    let mut fresh = 0;
    for caller in callers {
        if caller.await.unwrap() {
            fresh += 1;
        }
    }
    assert!(fresh >= 1);

    tokio::time::timeout(WAIT, session.wait_for_status(SessionStatus::Idle))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count(&manager, id, |k| matches!(k, ChunkKind::Interrupted)), 1);
    assert_eq!(agent.live_turns(), 0);
}
