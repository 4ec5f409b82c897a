//! Subcommand implementations.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use meshcon_protocol::{NodeAddress, Timestamp};
use meshcon_session::{
    connect, load_replay, read_transcript, spawn_notifier, spawn_transport, CommandDispatcher, EngineHandle,
    SessionConfig, SessionEngine, TranscriptWriter, TransportConfig,
};
use meshcon_telemetry::NodeTable;
use tracing::{info, warn};

use crate::cli::{transport_override, Cli, Command};
use crate::console::{handle_line, print_response, spawn_line_reader};
use crate::error::{RunnerError, RunnerResult};
use crate::history::{extract_history, write_csv};
use crate::render::render_dashboard;

/// How long pending notifications may take to drain on exit.
const NOTIFIER_DRAIN: Duration = Duration::from_secs(5);

/// Options of the live console.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub transport: Option<TransportConfig>,
    pub dashboard: bool,
    pub metrics_addr: Option<std::net::SocketAddr>,
}

/// Execute the parsed command line.
pub async fn execute(cli: Cli) -> RunnerResult<()> {
    let config = cli.load_config()?;
    match cli.command {
        None => run_console(config, RunOptions {
            dashboard: true,
            ..Default::default()
        })
        .await,
        Some(Command::Run {
            tcp,
            serial,
            baud,
            no_dashboard,
            metrics_addr,
        }) => {
            let options = RunOptions {
                transport: transport_override(tcp.as_deref(), serial.as_deref(), baud),
                dashboard: !no_dashboard,
                metrics_addr,
            };
            run_console(config, options).await
        }
        Some(Command::Replay { json }) => replay(&config, json),
        Some(Command::History {
            address,
            window_hours,
            output,
        }) => history(&config, &address, window_hours, output),
    }
}

fn install_metrics(addr: Option<std::net::SocketAddr>) -> RunnerResult<()> {
    let Some(addr) = addr else {
        return Ok(());
    };
    #[cfg(feature = "prometheus")]
    {
        meshcon_metrics::install_prometheus(addr)
            .map_err(|e| RunnerError::InvalidArgument(format!("metrics exporter on {addr}: {e}")))?;
        info!(%addr, "serving metrics");
        Ok(())
    }
    #[cfg(not(feature = "prometheus"))]
    {
        Err(RunnerError::InvalidArgument(format!(
            "cannot serve metrics on {addr}: built without the `prometheus` feature"
        )))
    }
}

fn rebuild(config: &SessionConfig) -> RunnerResult<SessionEngine> {
    let entries = load_replay(&config.transcript)?;
    let mut engine = SessionEngine::new(config);
    engine.replay(&entries);
    Ok(engine)
}

/// Replay, connect and run the console until the operator quits or the
/// gateway link closes.
pub async fn run_console(mut config: SessionConfig, options: RunOptions) -> RunnerResult<()> {
    if let Some(transport) = options.transport {
        config.transport = transport;
    }
    install_metrics(options.metrics_addr)?;

    let (notifier, notifier_task) = spawn_notifier(&config.notifier);
    let engine = rebuild(&config)?.with_notifier(notifier);

    let capacity = config.session.queue_capacity;
    let (reader, writer) = connect(&config.transport).await?;
    let (handle, events) = EngineHandle::channel(capacity);
    let transport_log = TranscriptWriter::open(config.transcript.transport_path())?;
    let mut transport = spawn_transport(reader, writer, Some(transport_log), handle.sender(), capacity);

    let engine = engine.with_outbound(transport.outbound.clone());
    let engine_task = tokio::spawn(engine.run(events));

    let render_task = options.dashboard.then(|| {
        let handle = handle.clone();
        let interval = config.session.render_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match handle.snapshot().await {
                    Ok(table) => print!("{}", render_dashboard(&table, Timestamp::now())),
                    Err(_) => break,
                }
            }
        })
    });

    let operator_log = TranscriptWriter::open(config.transcript.operator_path())?;
    let mut dispatcher = CommandDispatcher::new(handle.clone(), handle.correlator(config.session.reply_timeout()))
        .with_transcript(operator_log);
    let history_path: PathBuf = config.transcript.dir.join("console_history");
    let (mut lines, line_reader) = spawn_line_reader(Some(history_path));

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => print_response(&handle_line(&mut dispatcher, &line).await),
                None => break,
            },
            result = &mut transport.reader => {
                match result {
                    Ok(Ok(())) => warn!("gateway link closed"),
                    Ok(Err(error)) => warn!(%error, "gateway link failed"),
                    Err(error) => warn!(%error, "transport reader panicked"),
                }
                break;
            }
        }
    }

    // Stop every producer so the engine drains and returns.
    transport.reader.abort();
    if let Some(task) = render_task {
        task.abort();
    }
    drop(lines);
    drop(dispatcher);
    drop(handle);
    drop(transport.outbound);

    let table = engine_task.await?;
    info!(nodes = table.len(), "session ended");

    if tokio::time::timeout(NOTIFIER_DRAIN, notifier_task).await.is_err() {
        warn!("gave up waiting for pending notifications");
    }
    if line_reader.is_finished() {
        if let Ok(Err(error)) = line_reader.await {
            warn!(%error, "console stopped");
        }
    }
    Ok(())
}

/// Rebuild the table from the transcripts and print it.
pub fn replay(config: &SessionConfig, json: bool) -> RunnerResult<()> {
    let table = rebuild(config)?.into_table();
    print!("{}", format_table(&table, json, Timestamp::now())?);
    Ok(())
}

fn format_table(table: &NodeTable, json: bool, now: Timestamp) -> RunnerResult<String> {
    if json {
        Ok(serde_json::to_string_pretty(table)? + "\n")
    } else {
        Ok(render_dashboard(table, now))
    }
}

/// Write one node's history as CSV.
pub fn history(config: &SessionConfig, address: &str, window_hours: f64, output: Option<PathBuf>) -> RunnerResult<()> {
    let address = NodeAddress::parse_hex(address)
        .ok_or_else(|| RunnerError::InvalidArgument(format!("not a hex node address: {address}")))?;
    if !(window_hours > 0.0) {
        return Err(RunnerError::InvalidArgument(format!(
            "window must be positive, got {window_hours}"
        )));
    }

    let entries = read_transcript(config.transcript.transport_path())?;
    let samples = extract_history(&entries, address, Some(window_hours * 3600.0));
    match output {
        Some(path) => {
            let file = File::create(&path).map_err(|source| RunnerError::Io {
                context: format!("creating {}", path.display()),
                source,
            })?;
            write_csv(&samples, BufWriter::new(file))
        }
        None => write_csv(&samples, io::stdout().lock()),
    }
}
