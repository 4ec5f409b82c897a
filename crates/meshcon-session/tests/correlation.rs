//! Requests and replies over an in-memory gateway link.

use std::time::Duration;

use meshcon_protocol::{AdminCommand, NodeAddress, ProtocolError, Reply, Timestamp};
use meshcon_session::{
    read_transcript, spawn_transport, AdminOutcome, CommandDispatcher, ConsoleResponse, CorrelatorError,
    EngineHandle, SessionConfig, SessionEngine, SessionError, TranscriptWriter,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

/// Simulated gateway end of the link.
struct Gateway {
    requests: BufReader<ReadHalf<DuplexStream>>,
    lines: WriteHalf<DuplexStream>,
}

impl Gateway {
    async fn next_request(&mut self) -> String {
        let mut line = String::new();
        self.requests.read_line(&mut line).await.unwrap();
        line
    }

    async fn send(&mut self, line: &str) {
        self.lines.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }
}

struct Harness {
    gateway: Gateway,
    handle: EngineHandle,
    dispatcher: CommandDispatcher,
    _engine: JoinHandle<meshcon_telemetry::NodeTable>,
}

fn start(reply_timeout: Duration, transcript: Option<TranscriptWriter>) -> Harness {
    let config = SessionConfig::default();
    let (handle, events) = EngineHandle::channel(32);

    let (link, gateway_end) = tokio::io::duplex(1024);
    let (reader, writer) = tokio::io::split(link);
    let tasks = spawn_transport(reader, writer, None, handle.sender(), 32);

    let engine = SessionEngine::new(&config).with_outbound(tasks.outbound);
    let engine = tokio::spawn(engine.run(events));

    let mut dispatcher = CommandDispatcher::new(handle.clone(), handle.correlator(reply_timeout));
    if let Some(transcript) = transcript {
        dispatcher = dispatcher.with_transcript(transcript);
    }

    let (requests, lines) = tokio::io::split(gateway_end);
    Harness {
        gateway: Gateway {
            requests: BufReader::new(requests),
            lines,
        },
        handle,
        dispatcher,
        _engine: engine,
    }
}

fn ts(secs: f64) -> Timestamp {
    Timestamp::from_secs(secs)
}

#[tokio::test]
async fn test_request_resolves_with_reply_and_second_reply_is_orphaned() {
    let Harness {
        mut gateway,
        handle,
        mut dispatcher,
        ..
    } = start(Duration::from_secs(5), None);

    gateway.send("sta health 00AB 2 -55.0 [0000]").await;
    gateway.send("sta battery 00AB 2 -54.0 8192").await;

    let request = tokio::spawn(async move {
        let response = dispatcher.process_console_message(ts(1.0), "mesh reset 00AB").await;
        (dispatcher, response)
    });

    assert_eq!(gateway.next_request().await, "req mesh reset 00AB\n");
    gateway.send("rep 0 ok").await;

    let (_dispatcher, response) = request.await.unwrap();
    assert_eq!(
        response.unwrap(),
        ConsoleResponse::Reply(Reply {
            code: 0,
            detail: "ok".into()
        })
    );

    let before = handle.snapshot().await.unwrap();
    let node = before.get(NodeAddress(0x00AB)).unwrap();
    assert_eq!(node.avg_ttl.value(), Some(2.0));
    assert!((node.battery.value().unwrap() - 1.8).abs() < 1e-9);
    assert!(node.faults.is_empty());

    gateway.send("rep 0 ok").await;
    gateway.send("sta log marker").await;
    let after = loop {
        let table = handle.snapshot().await.unwrap();
        if !table.gateway().logs.is_empty() {
            break table;
        }
        tokio::task::yield_now().await;
    };
    assert_eq!(after.get(NodeAddress(0x00AB)), before.get(NodeAddress(0x00AB)));
}

#[tokio::test]
async fn test_error_reply_is_decoded() {
    let Harness {
        mut gateway,
        mut dispatcher,
        ..
    } = start(Duration::from_secs(5), None);

    let request = tokio::spawn(async move {
        dispatcher.process_console_message(ts(1.0), "cfg reset 0042").await
    });
    assert_eq!(gateway.next_request().await, "req cfg reset 0042\n");
    gateway.send("rep 4 unknown  node").await;

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.to_string(), "Error 4: unknown node");
}

#[tokio::test]
async fn test_second_request_while_pending_is_busy() {
    let Harness {
        mut gateway,
        handle,
        mut dispatcher,
        ..
    } = start(Duration::from_secs(5), None);
    let second = handle.correlator(Duration::from_secs(5));

    let first = tokio::spawn(async move { dispatcher.process_console_message(ts(1.0), "first").await });
    assert_eq!(gateway.next_request().await, "req first\n");

    assert_eq!(second.send_and_wait("second").await, Err(CorrelatorError::Busy));

    gateway.send("rep 0 done").await;
    assert_eq!(
        first.await.unwrap().unwrap(),
        ConsoleResponse::Reply(Reply {
            code: 0,
            detail: "done".into()
        })
    );
}

#[tokio::test]
async fn test_timeout_frees_slot_and_late_reply_is_orphaned() {
    let Harness {
        mut gateway,
        handle,
        mut dispatcher,
        ..
    } = start(Duration::from_millis(50), None);

    let result = dispatcher.process_console_message(ts(1.0), "slow").await;
    assert!(matches!(result, Err(SessionError::Correlator(CorrelatorError::NoReply))));
    assert_eq!(gateway.next_request().await, "req slow\n");

    gateway.send("rep 0 late").await;
    gateway.send("sta log after").await;
    loop {
        if !handle.snapshot().await.unwrap().gateway().logs.is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }

    let correlator = handle.correlator(Duration::from_secs(5));
    let next = tokio::spawn(async move { correlator.send_and_wait("fast").await });
    assert_eq!(gateway.next_request().await, "req fast\n");
    gateway.send("rep 0 quick").await;
    assert_eq!(next.await.unwrap(), Ok("0 quick".to_string()));
}

#[tokio::test]
async fn test_admin_commands_are_logged_and_applied_locally() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("console_transcript");
    let Harness {
        mut gateway,
        handle,
        mut dispatcher,
        ..
    } = start(Duration::from_secs(5), Some(TranscriptWriter::open(&path).unwrap()));

    gateway.send("sta onoff 000D 1 -40 1").await;
    loop {
        if !handle.snapshot().await.unwrap().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }

    let renamed = dispatcher.process_console_message(ts(10.0), "name 000D Front door").await.unwrap();
    assert_eq!(renamed.to_string(), "Set the name of node 0x000D to \"Front door\"");

    let unknown = dispatcher.process_console_message(ts(11.0), "name 0099 Ghost").await.unwrap();
    assert_eq!(
        unknown,
        ConsoleResponse::Admin(AdminOutcome::UnknownAddress(NodeAddress(0x0099)))
    );

    let usage = dispatcher.process_console_message(ts(12.0), "name zz").await;
    assert!(matches!(usage, Err(SessionError::Protocol(ProtocolError::InvalidField { .. }))));

    let reset = handle.admin(ts(13.0), AdminCommand::SessionReset).await.unwrap();
    assert_eq!(reset, AdminOutcome::SessionReset);

    let table = handle.snapshot().await.unwrap();
    assert_eq!(table.get(NodeAddress(0x000D)).unwrap().name, "Front door");

    let logged: Vec<String> = read_transcript(&path).unwrap().into_iter().map(|e| e.text).collect();
    assert_eq!(logged, ["name 000D Front door", "name 0099 Ghost", "name zz"]);
}
