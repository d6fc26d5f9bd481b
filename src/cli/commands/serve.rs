//! HTTP API server command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::build_service;
use crate::server;
use anyhow::Result;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<&str>, port: Option<u16>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'searchgpt doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let service = build_service(&settings)?;

    let host = host.unwrap_or(&settings.server.host);
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header(&format!("{} API Server", settings.general.application_name));
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Ask", "POST   /api/chat/ask");
    Output::kv("Stream (SSE)", "POST   /api/chat/stream");
    Output::kv("Delete", "DELETE /api/chat/{conversationId}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(listener, service).await?;

    Ok(())
}
