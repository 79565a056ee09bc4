//! Minimal line-oriented front-end for the conversation controller.
//!
//! Reads questions from stdin, prints streamed answers as they grow, and
//! exposes the thread commands: `/new <name>`, `/switch <name>`, `/delete`,
//! `/threads`, `/quit`.

use std::io::Write;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use parley::config::{Config, API_KEY_VAR};
use parley::controller::{ControllerSnapshot, ConversationController};
use parley::generator::ChatApiGenerator;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()
        .map_err(|e| eyre!("{e}. Set {API_KEY_VAR} and try again."))?;
    tracing::info!(model = %config.model, api_base = %config.api_base, "starting parley");

    let generator = Arc::new(ChatApiGenerator::new(&config));
    let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
    let mut controller = ConversationController::with_snapshots(generator, snapshot_tx);

    let renderer = tokio::spawn(render_snapshots(snapshot_rx));

    println!("parley - ask anything. Commands: /new <name>, /switch <name>, /delete, /threads, /quit");
    print_prompt(controller.current_thread_name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        match line.split_once(' ') {
            _ if line == "/quit" => break,
            _ if line == "/delete" => controller.delete_current_thread(),
            _ if line == "/threads" => {
                for name in controller.thread_names() {
                    let marker = if name == controller.current_thread_name() {
                        "*"
                    } else {
                        " "
                    };
                    println!("{marker} {name}");
                }
            }
            Some(("/new", name)) if !name.trim().is_empty() => {
                controller.create_thread(name.trim());
            }
            Some(("/switch", name)) => {
                if let Err(e) = controller.switch_thread(name.trim()) {
                    eprintln!("{e}");
                }
            }
            _ => {
                if let Err(e) = controller.submit_question(&line).await {
                    eprintln!("\nerror: {e}");
                }
            }
        }
        print_prompt(controller.current_thread_name());
    }

    drop(controller);
    let _ = renderer.await;
    Ok(())
}

fn print_prompt(thread_name: &str) {
    print!("[{thread_name}] > ");
    let _ = std::io::stdout().flush();
}

/// Tracks how much of the current exchange's answer has been printed.
///
/// The printed length is only meaningful for the exchange it was measured
/// against, so it is keyed by (thread name, exchange index). A snapshot
/// whose current exchange differs - a thread switch, a deletion, a new
/// question - resyncs the length to that exchange without replaying text.
struct AnswerPrinter {
    /// Identity of the exchange `printed_len` refers to
    key: Option<(String, usize)>,
    printed_len: usize,
}

impl AnswerPrinter {
    fn new() -> Self {
        Self {
            key: None,
            printed_len: 0,
        }
    }

    /// Advance to `snapshot`, returning newly appended answer text to print.
    fn advance<'a>(&mut self, snapshot: &'a ControllerSnapshot) -> Option<&'a str> {
        let exchanges = snapshot.current_exchanges();
        let Some(index) = exchanges.len().checked_sub(1) else {
            self.key = None;
            self.printed_len = 0;
            return None;
        };
        let answer = exchanges[index].answer.as_str();

        let same_exchange = matches!(
            &self.key,
            Some((thread, i)) if thread == &snapshot.current_thread && *i == index
        );
        // A shrunk answer means the exchange was replaced under the same
        // key (thread overwritten via create_thread); resync, don't slice.
        if !same_exchange || self.printed_len > answer.len() {
            self.key = Some((snapshot.current_thread.clone(), index));
            self.printed_len = answer.len();
            return None;
        }

        if answer.len() > self.printed_len {
            let suffix = &answer[self.printed_len..];
            self.printed_len = answer.len();
            return Some(suffix);
        }
        None
    }
}

/// Consume state snapshots and print incremental answer growth.
async fn render_snapshots(mut rx: mpsc::UnboundedReceiver<ControllerSnapshot>) {
    let mut printer = AnswerPrinter::new();
    let mut was_processing = false;

    while let Some(snapshot) = rx.recv().await {
        if snapshot.processing && !was_processing {
            println!();
        }

        if let Some(suffix) = printer.advance(&snapshot) {
            print!("{suffix}");
            let _ = std::io::stdout().flush();
        }

        if !snapshot.processing && was_processing {
            println!();
        }
        was_processing = snapshot.processing;
    }
}
