//! The local console: one avatar driven from a line editor.
//!
//! ```text
//! readline thread ──line──▶ Console::run ──spawn_blocking──▶ execute
//!        ▲                                                      │
//!        └──── ExternalPrinter ◀── StdoutSink ◀── session text ◀┘
//! ```
//!
//! Lines starting with `/` are administrative commands; everything else
//! is typed as the avatar. `/quit` (or end of input) leaves. While the
//! editor is active, session text goes through its printer so timer
//! output does not tear the prompt.

use parking_lot::Mutex;
use rustyline::error::ReadlineError;
use rustyline::ExternalPrinter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use wisp_runtime::{Admin, AdminCommand, Dispatcher, OutputSink, RuntimeError};
use wisp_types::ObjectId;

const PROMPT: &str = "wisp> ";

type Printer = Box<dyn ExternalPrinter + Send>;

/// Prints session text to the terminal.
///
/// Falls back to stdout when no editor printer is installed.
#[derive(Default)]
pub struct StdoutSink {
    printer: Mutex<Option<Printer>>,
}

impl StdoutSink {
    fn set_printer(&self, printer: Printer) {
        *self.printer.lock() = Some(printer);
    }

    fn clear_printer(&self) {
        *self.printer.lock() = None;
    }
}

impl std::fmt::Debug for StdoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutSink")
            .field("printer", &self.printer.lock().is_some())
            .finish()
    }
}

impl OutputSink for StdoutSink {
    fn print(&self, text: &str) {
        if let Some(printer) = self.printer.lock().as_mut() {
            if printer.print(format!("{text}\n")).is_ok() {
                return;
            }
        }
        let mut out = std::io::stdout().lock();
        // A closed stdout ends the session at the next read anyway.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

pub struct Console {
    dispatcher: Dispatcher,
    avatar: ObjectId,
    sink: Arc<StdoutSink>,
}

impl Console {
    pub fn new(dispatcher: Dispatcher, avatar: ObjectId, sink: Arc<StdoutSink>) -> Self {
        Self {
            dispatcher,
            avatar,
            sink,
        }
    }

    /// Reads lines until `/quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor thread cannot be started.
    pub async fn run(&self, history: PathBuf) -> anyhow::Result<()> {
        let (mut lines, printer) = spawn_readline(history)?;
        if let Some(printer) = printer {
            self.sink.set_printer(printer);
        }

        while let Some(line) = lines.recv().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            self.handle(line).await;
        }

        self.sink.clear_printer();
        debug!("console input closed");
        Ok(())
    }

    async fn handle(&self, line: String) {
        let dispatcher = self.dispatcher.clone();
        let avatar = self.avatar.clone();
        let sink: Arc<dyn OutputSink> = self.sink.clone();
        let result =
            tokio::task::spawn_blocking(move || execute(&dispatcher, &avatar, &line, sink)).await;

        match result {
            Ok(Ok(Some(text))) => self.sink.print(&text),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => self.sink.print(&e.to_string()),
            Err(e) => warn!(error = %e, "console command task failed"),
        }
    }
}

fn is_quit(line: &str) -> bool {
    matches!(line.trim(), "/quit" | "/q")
}

/// Runs the line editor on its own thread.
///
/// The channel closes on `/quit` or end of input; the editor leaves raw
/// mode before that happens. History is saved after every line.
fn spawn_readline(
    history: PathBuf,
) -> anyhow::Result<(mpsc::UnboundedReceiver<String>, Option<Printer>)> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (printer_tx, printer_rx) = std::sync::mpsc::sync_channel::<Option<Printer>>(1);

    std::thread::Builder::new()
        .name("wisp-readline".into())
        .spawn(move || {
            let config = rustyline::Config::builder().auto_add_history(true).build();
            let mut rl = match rustyline::DefaultEditor::with_config(config) {
                Ok(editor) => editor,
                Err(e) => {
                    error!(error = %e, "failed to create line editor");
                    let _ = printer_tx.send(None);
                    return;
                }
            };

            if let Err(e) = rl.load_history(&history) {
                debug!(error = %e, "no history loaded");
            }

            let printer = rl
                .create_external_printer()
                .ok()
                .map(|p| Box::new(p) as Printer);
            let _ = printer_tx.send(printer);

            loop {
                match rl.readline(PROMPT) {
                    Ok(line) => {
                        save_history(&mut rl, &history);
                        if is_quit(&line) || line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) => continue,
                    Err(ReadlineError::Eof) => break,
                    Err(e) => {
                        error!(error = %e, "readline failed");
                        break;
                    }
                }
            }
            save_history(&mut rl, &history);
        })?;

    let printer = printer_rx.recv().ok().flatten();
    Ok((line_rx, printer))
}

fn save_history(rl: &mut rustyline::DefaultEditor, path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = rl.save_history(path) {
        debug!(error = %e, path = %path.display(), "history not saved");
    }
}

/// Runs one console line. Returns text the dispatcher did not print
/// itself.
fn execute(
    dispatcher: &Dispatcher,
    avatar: &ObjectId,
    line: &str,
    sink: Arc<dyn OutputSink>,
) -> Result<Option<String>, RuntimeError> {
    if line.starts_with('/') {
        let command = AdminCommand::parse(line)?;
        return Admin::new(dispatcher.clone())
            .execute(avatar, &command, sink)
            .map(Some);
    }
    dispatcher.command(avatar, line)?;
    Ok(None)
}
