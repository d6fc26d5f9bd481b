//! Interactive chat command with streamed answers.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::conversation::ConversationId;
use crate::error::Result;
use crate::rag::{build_service, ChatRequest, ChatService};
use console::style;
use futures::StreamExt;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What the user asked for at the prompt.
#[derive(Debug, PartialEq)]
enum Input {
    Exit,
    Clear,
    Empty,
    Message(String),
}

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'searchgpt doctor' for detailed diagnostics.");
        return Err(e);
    }

    let service = build_service(&settings)?;
    let mut conversation_id = ConversationId::new();

    // One Ctrl+C watcher for the whole session: it stops an answer in
    // progress, or leaves the session at the prompt.
    let (interrupt_tx, mut interrupts) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(()).is_err() {
                break;
            }
        }
    });

    println!("\n{}", style(&settings.general.application_name).bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to start a new conversation. Ctrl+C stops an answer, or quits at the prompt.").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        match read_input(&mut lines, &mut interrupts).await? {
            Input::Empty => continue,
            Input::Exit => {
                Output::info("Goodbye!");
                break;
            }
            Input::Clear => {
                service.delete(conversation_id).await?;
                conversation_id = ConversationId::new();
                Output::info("Conversation cleared.");
            }
            Input::Message(message) => {
                print!("\n{} ", style("Assistant:").cyan().bold());
                stdout.flush()?;

                match stream_answer(&service, conversation_id, &message, &mut interrupts, &mut stdout).await {
                    Ok(true) => print!("{}", style(" [stopped]").dim()),
                    Ok(false) => {}
                    Err(e) => Output::error(&format!("Error: {}", e)),
                }
                println!("\n");
            }
        }
    }

    Ok(())
}

/// Wait for the next line, or for Ctrl+C which counts as `exit`.
async fn read_input<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> Result<Input> {
    let line = tokio::select! {
        line = lines.next_line() => line?,
        _ = interrupts.recv() => {
            println!();
            return Ok(Input::Exit);
        }
    };

    let Some(line) = line else {
        return Ok(Input::Exit);
    };

    let input = line.trim();
    Ok(if input.is_empty() {
        Input::Empty
    } else if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else if input.eq_ignore_ascii_case("clear") {
        Input::Clear
    } else {
        Input::Message(input.to_string())
    })
}

/// Write one streamed answer to `out`. Returns true if Ctrl+C stopped it,
/// in which case the exchange is not recorded.
async fn stream_answer<W: Write>(
    service: &ChatService,
    id: ConversationId,
    message: &str,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
    out: &mut W,
) -> Result<bool> {
    let token = CancellationToken::new();
    let mut chunks = service
        .ask_stream(ChatRequest::new(id, message), Some(token.clone()))
        .await?;

    loop {
        tokio::select! {
            biased;
            Some(()) = interrupts.recv(), if !token.is_cancelled() => {
                debug!("Answer cancelled by user");
                token.cancel();
            }
            chunk = chunks.next() => match chunk {
                Some(chunk) => {
                    write!(out, "{}", chunk?)?;
                    out.flush()?;
                }
                None => break,
            },
        }
    }

    Ok(token.is_cancelled())
}
