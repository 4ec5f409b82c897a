//! Interactive operator console.
//!
//! The line editor blocks, so it runs on a blocking thread and hands each
//! line to the async side over a channel.

use std::path::PathBuf;

use meshcon_protocol::Timestamp;
use meshcon_session::{CommandDispatcher, ConsoleResponse, SessionResult};
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::RunnerResult;

const PROMPT: &str = "> ";

/// Start the line editor on a blocking thread.
///
/// The returned channel closes when the operator ends input (Ctrl+D) or the
/// receiver is dropped.
pub fn spawn_line_reader(history_path: Option<PathBuf>) -> (mpsc::Receiver<String>, JoinHandle<RunnerResult<()>>) {
    let (lines, receiver) = mpsc::channel(16);

    let task = tokio::task::spawn_blocking(move || {
        let mut editor = rustyline::DefaultEditor::new()?;
        if let Some(path) = &history_path {
            let _ = editor.load_history(path);
        }

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    editor.add_history_entry(line.as_str()).ok();
                    if lines.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    eprintln!("(Use Ctrl+D to quit)");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(path) = &history_path {
            editor.save_history(path).ok();
        }
        debug!("line reader stopped");
        Ok(())
    });

    (receiver, task)
}

/// Run one operator line and format the text shown back.
pub async fn handle_line(dispatcher: &mut CommandDispatcher, line: &str) -> SessionResult<ConsoleResponse> {
    dispatcher.process_console_message(Timestamp::now(), line).await
}

/// Print the outcome of one operator line.
pub fn print_response(result: &SessionResult<ConsoleResponse>) {
    match result {
        Ok(response) => println!("{response}\n"),
        Err(error) => eprintln!("error: {error}"),
    }
}
