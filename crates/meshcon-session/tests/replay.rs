//! Rebuilding the node table from transcripts.

use meshcon_protocol::{ConsoleCommand, NodeAddress, Timestamp};
use meshcon_session::{
    load_replay, CheckConfig, NotifierHandle, Origin, ProcessingMode, SessionConfig, SessionEngine,
    TranscriptConfig, TranscriptWriter,
};
use meshcon_telemetry::OnOffStatus;

const DOOR: NodeAddress = NodeAddress(0x000D);

fn config_with_door_check(dir: &std::path::Path) -> SessionConfig {
    let mut config = SessionConfig {
        transcript: TranscriptConfig::in_dir(dir),
        checks: vec![CheckConfig {
            node: "Front door".into(),
            thing: "Front door".into(),
            recipient: "42".into(),
        }],
        ..Default::default()
    };
    config.telemetry.node_names.insert(DOOR, "Front door".into());
    config
}

/// Traffic as it would arrive live, in timestamp order.
fn session() -> Vec<(Origin, f64, &'static str)> {
    vec![
        (Origin::Transport, 100.0, "sta health 000D 2 -61.0 [0000]"),
        (Origin::Transport, 100.5, "sta battery 000D 2 -60.0 8000"),
        (Origin::Transport, 101.0, "sta health 0005 3 -80.5 [01]"),
        (Origin::Transport, 102.0, "sta log [ 12.000] [ INFO ] Provisioned."),
        (Origin::Transport, 102.5, "sta log Received raw 01 02 03"),
        (Origin::Transport, 103.0, "sta address_book_capacity 5 16"),
        (Origin::Operator, 104.0, "name 0005 LPN Ant"),
        (Origin::Operator, 104.5, "mesh reset 0005"),
        (Origin::Transport, 105.0, "rep 0 ok"),
        (Origin::Transport, 106.0, "sta onoff 000D 2 -59.0 0"),
        (Origin::Transport, 107.0, "garbage without a tag"),
        (Origin::Transport, 108.0, "sta battery 000D 2 -58.0 not-a-number"),
        (Origin::Transport, 110.0, "sta health 000D 2 -62.0 [0000]"),
        (Origin::Transport, 140.0, "sta health 000D 1 -50.0 [0000]"),
        (Origin::Operator, 140.0, "prune"),
        (Origin::Operator, 141.0, "session_reset"),
        (Origin::Transport, 150.0, "sta onoff 000D 1 -49.0 1"),
    ]
}

fn run_live(engine: &mut SessionEngine, traffic: &[(Origin, f64, &str)]) {
    for &(origin, secs, text) in traffic {
        let timestamp = Timestamp::from_secs(secs);
        match origin {
            Origin::Transport => {
                engine.process_transport_line(timestamp, text, ProcessingMode::Live);
            }
            Origin::Operator => {
                if let Ok(ConsoleCommand::Admin(command)) = ConsoleCommand::parse(text) {
                    engine.apply_admin(timestamp, &command);
                }
            }
        }
    }
}

fn write_transcripts(config: &TranscriptConfig, traffic: &[(Origin, f64, &str)]) {
    let mut transport = TranscriptWriter::open(config.transport_path()).unwrap();
    let mut operator = TranscriptWriter::open(config.operator_path()).unwrap();
    for &(origin, secs, text) in traffic {
        let writer = match origin {
            Origin::Transport => &mut transport,
            Origin::Operator => &mut operator,
        };
        writer.append(Timestamp::from_secs(secs), text).unwrap();
    }
}

#[test]
fn test_replay_reproduces_live_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_door_check(dir.path());
    let traffic = session();

    let mut live = SessionEngine::new(&config);
    run_live(&mut live, &traffic);

    write_transcripts(&config.transcript, &traffic);
    let mut replayed = SessionEngine::new(&config);
    let summary = replayed.replay(&load_replay(&config.transcript).unwrap());

    assert_eq!(replayed.table(), live.table());
    assert_eq!(summary.admin_commands, 3);
    assert_eq!(summary.skipped_requests, 1);
    assert_eq!(summary.skipped_replies, 1);
    assert_eq!(summary.rejected_lines, 2);

    let table = replayed.table();
    assert!(table.get(NodeAddress(0x0005)).is_none(), "LPN Ant was pruned");
    let door = table.get(DOOR).unwrap();
    assert_eq!(door.name, "Front door");
    assert_eq!(door.msg_count, 6);
    assert_eq!(door.msg_count_by_ttl.values().sum::<u64>(), door.msg_count);
    assert_eq!(door.health_status_count, 0);
    assert_eq!(door.onoff_status, OnOffStatus::On);
    assert_eq!(door.last_seen, Timestamp::from_secs(150.0));
    assert_eq!(table.gateway().logs, ["[ 12.000] [ INFO ] Provisioned."]);
    assert_eq!(table.gateway().address_book_free_slots, Some(5));
}

#[test]
fn test_replay_never_fires_checks() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_door_check(dir.path());
    let traffic: Vec<(Origin, f64, &str)> = vec![
        (Origin::Transport, 1.0, "sta onoff 000D 1 -40 0"),
        (Origin::Transport, 2.0, "sta onoff 000D 1 -40 1"),
        (Origin::Transport, 3.0, "sta onoff 000D 1 -40 0"),
    ];

    let (live_notifier, mut live_queue) = NotifierHandle::channel(8);
    let mut live = SessionEngine::new(&config).with_notifier(live_notifier);
    run_live(&mut live, &traffic);
    let mut live_texts = Vec::new();
    while let Ok(notification) = live_queue.try_recv() {
        live_texts.push(notification.text);
    }
    assert_eq!(live_texts, ["Front door is opened.", "Front door is closed."]);

    write_transcripts(&config.transcript, &traffic);
    let (replay_notifier, mut replay_queue) = NotifierHandle::channel(8);
    let mut replayed = SessionEngine::new(&config).with_notifier(replay_notifier);
    replayed.replay(&load_replay(&config.transcript).unwrap());
    assert!(replay_queue.try_recv().is_err());

    // Primed to "off" by the replay, so the next live change fires.
    replayed.process_transport_line(Timestamp::from_secs(4.0), "sta onoff 000D 1 -40 1", ProcessingMode::Live);
    let fired = replay_queue.try_recv().unwrap();
    assert_eq!(fired.text, "Front door is opened.");
    assert_eq!(fired.recipient, "42");
    assert!(replay_queue.try_recv().is_err());

    // An unchanged reading does not fire again.
    replayed.process_transport_line(Timestamp::from_secs(5.0), "sta onoff 000D 1 -40 1", ProcessingMode::Live);
    assert!(replay_queue.try_recv().is_err());
}

#[test]
fn test_replay_of_empty_transcripts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_door_check(dir.path());
    let mut engine = SessionEngine::new(&config);
    let summary = engine.replay(&load_replay(&config.transcript).unwrap());
    assert_eq!(summary, Default::default());
    assert!(engine.table().is_empty());
}
