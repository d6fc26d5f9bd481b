//! Delete command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::conversation::{create_store, ConversationId};
use anyhow::Result;

/// Run the delete command against the configured conversation store.
pub async fn run_delete(conversation: &str, settings: &Settings) -> Result<()> {
    let id: ConversationId = conversation.parse()?;

    if settings.conversation.provider == "memory" {
        Output::warning("The memory conversation store is empty outside a running server.");
    }

    let store = create_store(settings)?;
    let existed = store.exists(id).await?;
    store.delete(id).await?;

    if existed {
        Output::success(&format!("Deleted conversation {}", id));
    } else {
        Output::info(&format!("Conversation {} not found, nothing to delete", id));
    }

    Ok(())
}
