//! Reader and writer tasks for the gateway link.
//!
//! The link is any byte stream: a TCP socket in front of the gateway UART,
//! a serial device (`serial` feature), or an in-memory duplex in tests.

use meshcon_metrics::{metric_defs, metrics};
use meshcon_protocol::{LineCodec, Timestamp};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::engine::EngineEvent;
use crate::error::{SessionError, SessionResult};
use crate::transcript::TranscriptWriter;

/// Boxed read half of a gateway link.
pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed write half of a gateway link.
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Running transport tasks.
pub struct TransportTasks {
    /// Queue of encoded requests for the writer task.
    pub outbound: mpsc::Sender<Vec<u8>>,
    /// Ends when the link closes or the engine stops.
    pub reader: JoinHandle<SessionResult<()>>,
    /// Ends when `outbound` is dropped or a write fails.
    pub writer: JoinHandle<SessionResult<()>>,
}

/// Open the link described by `config`.
pub async fn connect(config: &TransportConfig) -> SessionResult<(LinkReader, LinkWriter)> {
    match config {
        TransportConfig::Tcp { address } => {
            let stream = TcpStream::connect(address)
                .await
                .map_err(|e| SessionError::io(format!("connecting to {address}"), e))?;
            stream.set_nodelay(true).ok();
            info!(%address, "connected to gateway");
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        TransportConfig::Serial { path, baud } => open_serial(path, *baud),
    }
}

#[cfg(feature = "serial")]
fn open_serial(path: &str, baud: u32) -> SessionResult<(LinkReader, LinkWriter)> {
    use tokio_serial::SerialPortBuilderExt;

    let port = tokio_serial::new(path, baud)
        .open_native_async()
        .map_err(|e| SessionError::io(format!("opening {path}"), e.into()))?;
    info!(%path, baud, "opened gateway serial port");
    let (reader, writer) = tokio::io::split(port);
    Ok((Box::new(reader), Box::new(writer)))
}

#[cfg(not(feature = "serial"))]
fn open_serial(path: &str, _baud: u32) -> SessionResult<(LinkReader, LinkWriter)> {
    Err(SessionError::Config(format!(
        "cannot open {path}: built without the `serial` feature"
    )))
}

/// Spawn the reader and writer tasks for one link.
///
/// Every complete line is appended to `transcript` (when given) before it is
/// queued for the engine.
pub fn spawn_transport<R, W>(
    reader: R,
    writer: W,
    transcript: Option<TranscriptWriter>,
    events: mpsc::Sender<EngineEvent>,
    capacity: usize,
) -> TransportTasks
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (outbound, requests) = mpsc::channel(capacity);
    TransportTasks {
        outbound,
        reader: tokio::spawn(read_lines(reader, transcript, events)),
        writer: tokio::spawn(write_requests(writer, requests)),
    }
}

async fn read_lines<R>(
    mut reader: R,
    mut transcript: Option<TranscriptWriter>,
    events: mpsc::Sender<EngineEvent>,
) -> SessionResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut codec = LineCodec::new();
    let mut read_buf = [0u8; 1024];

    loop {
        let n = reader
            .read(&mut read_buf)
            .await
            .map_err(|e| SessionError::io("reading from gateway", e))?;
        if n == 0 {
            info!("gateway link closed");
            return Ok(());
        }
        codec.push(&read_buf[..n]);

        loop {
            let line = match codec.decode_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "discarding oversized gateway line");
                    metrics::counter!(metric_defs::TRANSPORT_REJECTED.name, "reason" => "overflow")
                        .increment(1);
                    continue;
                }
            };

            let timestamp = Timestamp::now();
            if let Some(transcript) = &mut transcript {
                transcript.append_async(timestamp, &line).await?;
            }
            if events
                .send(EngineEvent::Transport { timestamp, line })
                .await
                .is_err()
            {
                debug!("engine stopped, closing reader");
                return Ok(());
            }
        }
    }
}

async fn write_requests<W>(mut writer: W, mut requests: mpsc::Receiver<Vec<u8>>) -> SessionResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(data) = requests.recv().await {
        writer
            .write_all(&data)
            .await
            .map_err(|e| SessionError::io("writing to gateway", e))?;
        writer
            .flush()
            .await
            .map_err(|e| SessionError::io("writing to gateway", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::read_transcript;

    #[tokio::test]
    async fn test_reader_logs_then_queues_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protocol_transcript");
        let (events, mut received) = mpsc::channel(8);
        let (link, mut gateway) = tokio::io::duplex(256);
        let (reader, writer) = tokio::io::split(link);

        let tasks = spawn_transport(reader, writer, Some(TranscriptWriter::open(&path).unwrap()), events, 8);

        gateway.write_all(b"sta log hello\r\n\r\nsta address_book").await.unwrap();
        gateway.write_all(b"_capacity 3 8\r\n").await.unwrap();

        let mut lines = Vec::new();
        for _ in 0..2 {
            match received.recv().await.unwrap() {
                EngineEvent::Transport { line, .. } => lines.push(line),
                _ => panic!("expected a transport line"),
            }
        }
        assert_eq!(lines, ["sta log hello", "sta address_book_capacity 3 8"]);

        drop(gateway);
        tasks.reader.await.unwrap().unwrap();

        let logged: Vec<String> = read_transcript(&path).unwrap().into_iter().map(|e| e.text).collect();
        assert_eq!(logged, lines);
    }

    #[tokio::test]
    async fn test_writer_sends_requests() {
        let (events, _received) = mpsc::channel(8);
        let (link, mut gateway) = tokio::io::duplex(256);
        let (reader, writer) = tokio::io::split(link);
        let tasks = spawn_transport(reader, writer, None, events, 8);

        tasks.outbound.send(LineCodec::encode_request("mesh reset")).await.unwrap();
        let mut buf = [0u8; 16];
        let n = gateway.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"req mesh reset\n");
    }

    #[tokio::test]
    async fn test_serial_without_feature_or_missing_device() {
        let config = TransportConfig::Serial {
            path: "/nonexistent/ttyMESH".into(),
            baud: 115_200,
        };
        assert!(connect(&config).await.is_err());
    }
}
