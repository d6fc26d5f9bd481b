//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::conversation::ConversationId;
use crate::rag::{build_service, ChatRequest};
use anyhow::Result;
use futures::StreamExt;
use std::io::Write;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    conversation: Option<&str>,
    stream: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'searchgpt doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let conversation_id = match conversation {
        Some(id) => id.parse::<ConversationId>()?,
        None => ConversationId::new(),
    };

    if conversation.is_some() && settings.conversation.provider == "memory" {
        Output::warning("The memory conversation store does not keep history between runs.");
    }

    let service = build_service(&settings)?;
    let request = ChatRequest::new(conversation_id, question);

    if stream {
        let spinner = Output::spinner("Searching...");
        let mut chunks = match service.ask_stream(request, None).await {
            Ok(chunks) => chunks,
            Err(e) => {
                spinner.finish_and_clear();
                Output::error(&format!("Failed to generate answer: {}", e));
                return Err(e.into());
            }
        };
        spinner.finish_and_clear();

        println!();
        let mut stdout = std::io::stdout();
        while let Some(chunk) = chunks.next().await {
            let text = chunk?;
            print!("{}", text);
            stdout.flush()?;
        }
        println!("\n");
    } else {
        let spinner = Output::spinner("Searching...");
        match service.ask(&request).await {
            Ok(response) => {
                spinner.finish_and_clear();
                println!("\n{}\n", response.message);
            }
            Err(e) => {
                spinner.finish_and_clear();
                Output::error(&format!("Failed to generate answer: {}", e));
                return Err(e.into());
            }
        }
    }

    Output::conversation(&conversation_id.to_string());
    Ok(())
}
