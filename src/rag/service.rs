//! Retrieval-augmented chat service.
//!
//! Each request runs the same pipeline: seed the conversation if it is new,
//! rewrite the message into a search query, retrieve highlighted fragments,
//! and ask the grounded question. The grounded question itself never enters
//! the conversation history; the user's original message does.

use super::context::format_context;
use super::query::QueryRewriter;
use crate::chat::{ChatAnswer, ChatClient, ChatDelta, ChatParameters};
use crate::config::Prompts;
use crate::conversation::ConversationId;
use crate::error::{Result, SearchGptError};
use crate::search::{SearchClient, SearchOptions};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// A user message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub conversation_id: ConversationId,
    pub message: String,
}

impl ChatRequest {
    pub fn new(conversation_id: ConversationId, message: impl Into<String>) -> Self {
        Self {
            conversation_id,
            message: message.into(),
        }
    }
}

/// The answer to a [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

/// Lazily produced answer text. Dropping it stops the upstream completion.
pub type ChatStream = BoxStream<'static, Result<String>>;

/// Orchestrates query rewriting, retrieval and grounded answering.
pub struct ChatService {
    chat: Arc<dyn ChatClient>,
    search: Arc<dyn SearchClient>,
    rewriter: QueryRewriter,
    prompts: Arc<Prompts>,
    search_options: SearchOptions,
    rewrite_with_history: bool,
}

impl ChatService {
    /// Create a new chat service.
    pub fn new(
        chat: Arc<dyn ChatClient>,
        search: Arc<dyn SearchClient>,
        prompts: Prompts,
        search_options: SearchOptions,
    ) -> Self {
        let prompts = Arc::new(prompts);
        Self {
            rewriter: QueryRewriter::new(Arc::clone(&chat), Arc::clone(&prompts)),
            chat,
            search,
            prompts,
            search_options,
            rewrite_with_history: false,
        }
    }

    /// Let query rewriting see the conversation's previous turns.
    pub fn with_rewrite_with_history(mut self, enabled: bool) -> Self {
        self.rewrite_with_history = enabled;
        self
    }

    /// Answer a message and wait for the full response.
    #[instrument(skip(self, request), fields(conversation = %request.conversation_id))]
    pub async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let grounded = self.setup(request).await?;

        let answer = self
            .chat
            .ask(request.conversation_id, &grounded, &ChatParameters::default(), false)
            .await?;

        let message = match answer {
            ChatAnswer::ContentFiltered => {
                info!("Answer withheld by the content filter");
                self.prompts.chat.content_filtered.clone()
            }
            ChatAnswer::Text(answer) => {
                self.chat
                    .add_interaction(request.conversation_id, &request.message, &answer)
                    .await?;
                answer
            }
        };

        Ok(ChatResponse { message })
    }

    /// Answer a message as a stream of text chunks.
    ///
    /// Retrieval happens before this returns; the answer is produced as the
    /// stream is polled. A filtered answer yields the content-filter notice once.
    /// The exchange is recorded after the stream completes, unless it was
    /// cancelled or produced no unfiltered text.
    #[instrument(skip(self, request, cancel), fields(conversation = %request.conversation_id))]
    pub async fn ask_stream(
        &self,
        request: ChatRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ChatStream> {
        let grounded = self.setup(&request).await?;

        let mut upstream = self
            .chat
            .ask_stream(request.conversation_id, &grounded, &ChatParameters::default(), false)
            .await?;

        let chat = Arc::clone(&self.chat);
        let notice = self.prompts.chat.content_filtered.clone();

        let stream = async_stream::stream! {
            let mut answer = String::new();
            let mut notified = false;

            loop {
                let next = match cancel.as_ref() {
                    Some(token) => tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        next = upstream.next() => next,
                    },
                    None => upstream.next().await,
                };

                if cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                    debug!("Stream for conversation {} cancelled", request.conversation_id);
                    return;
                }

                let Some(delta) = next else {
                    break;
                };

                match delta {
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                    Ok(ChatDelta::ContentFiltered) => {
                        if !notified {
                            notified = true;
                            info!("Streamed answer withheld by the content filter");
                            yield Ok(notice.clone());
                        }
                    }
                    Ok(ChatDelta::Text(text)) => {
                        answer.push_str(&text);
                        yield Ok(text);
                    }
                }
            }

            if !answer.is_empty() {
                if let Err(e) = chat
                    .add_interaction(request.conversation_id, &request.message, &answer)
                    .await
                {
                    yield Err(e);
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Delete a conversation. Unknown conversations are not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, conversation_id: ConversationId) -> Result<()> {
        self.chat.delete_conversation(conversation_id).await?;
        info!("Deleted conversation {}", conversation_id);
        Ok(())
    }

    /// Seed the conversation if needed and build the grounded question.
    async fn setup(&self, request: &ChatRequest) -> Result<String> {
        if request.message.trim().is_empty() {
            return Err(SearchGptError::InvalidInput("Message must not be empty".to_string()));
        }

        let id = request.conversation_id;

        if !self.chat.conversation_exists(id).await? {
            debug!("Seeding new conversation {}", id);
            self.chat.setup(id, &self.prompts.system()).await?;
        }

        let rewrite_in = self.rewrite_with_history.then_some(id);
        let query = self.rewriter.rewrite(rewrite_in, &request.message).await?;

        let hits = self.search.search(&query, &self.search_options).await?;
        info!("Retrieved {} documents for query '{}'", hits.len(), query);

        let context = format_context(&hits, &self.search_options.highlight_field);
        Ok(self.prompts.grounded_question(&context, &request.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hit, FakeChat, FakeSearch, NOTICE};
    use futures::TryStreamExt;

    fn service(chat: Arc<FakeChat>, search: Arc<FakeSearch>) -> ChatService {
        let mut prompts = Prompts::default();
        prompts.chat.content_filtered = NOTICE.to_string();
        ChatService::new(chat, search, prompts, SearchOptions::default())
    }

    #[tokio::test]
    async fn test_ask_records_original_message() {
        let chat = Arc::new(FakeChat::new("panels", ChatAnswer::Text("They convert light.".to_string())));
        let search = Arc::new(FakeSearch::new(vec![hit("Solar panels convert light")]));
        let service = service(chat.clone(), search);
        let id = ConversationId::new();

        let response = service
            .ask(&ChatRequest::new(id, "How do solar panels work?"))
            .await
            .unwrap();

        assert_eq!(response.message, "They convert light.");
        assert_eq!(
            chat.interactions(),
            vec![(id, "How do solar panels work?".to_string(), "They convert light.".to_string())]
        );

        let grounded = chat.last_prompt();
        assert!(grounded.contains("Solar panels convert light\n---\n"));
        assert!(grounded.contains("How do solar panels work?"));
    }

    #[tokio::test]
    async fn test_seed_happens_once_per_conversation() {
        let chat = Arc::new(FakeChat::new("query", ChatAnswer::Text("answer".to_string())));
        let search = Arc::new(FakeSearch::new(vec![hit("fact")]));
        let service = service(chat.clone(), search);
        let id = ConversationId::new();

        for _ in 0..3 {
            service.ask(&ChatRequest::new(id, "question")).await.unwrap();
        }
        assert_eq!(chat.seed_count(), 1);

        service
            .ask(&ChatRequest::new(ConversationId::new(), "question"))
            .await
            .unwrap();
        assert_eq!(chat.seed_count(), 2);
    }

    #[tokio::test]
    async fn test_quoted_query_is_unquoted_before_search() {
        let chat = Arc::new(FakeChat::new("\"solar panels\"", ChatAnswer::Text("answer".to_string())));
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat, search.clone());

        service
            .ask(&ChatRequest::new(ConversationId::new(), "Tell me about solar panels"))
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["solar panels".to_string()]);
    }

    #[tokio::test]
    async fn test_filtered_answer_returns_notice_without_history() {
        let chat = Arc::new(FakeChat::new("query", ChatAnswer::ContentFiltered));
        let search = Arc::new(FakeSearch::new(vec![hit("fact")]));
        let service = service(chat.clone(), search);

        let response = service
            .ask(&ChatRequest::new(ConversationId::new(), "question"))
            .await
            .unwrap();

        assert_eq!(response.message, NOTICE);
        assert!(chat.interactions().is_empty());
    }

    #[tokio::test]
    async fn test_filtered_rewrite_searches_raw_message() {
        let mut fake = FakeChat::new("unused", ChatAnswer::Text("answer".to_string()));
        fake.rewrite_reply = ChatAnswer::ContentFiltered;
        let chat = Arc::new(fake);
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat, search.clone());

        service
            .ask(&ChatRequest::new(ConversationId::new(), "raw question"))
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["raw question".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let chat = Arc::new(FakeChat::new("query", ChatAnswer::Text("answer".to_string())));
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat.clone(), search.clone());

        let err = service
            .ask(&ChatRequest::new(ConversationId::new(), "   "))
            .await
            .unwrap_err();

        assert!(matches!(err, SearchGptError::InvalidInput(_)));
        assert_eq!(chat.seed_count(), 0);
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_stream_concatenation_matches_ask() {
        let deltas = vec![
            ChatDelta::Text("They ".to_string()),
            ChatDelta::Text("convert ".to_string()),
            ChatDelta::Text("light.".to_string()),
        ];
        let chat = Arc::new(
            FakeChat::new("panels", ChatAnswer::Text("They convert light.".to_string()))
                .with_deltas(deltas),
        );
        let search = Arc::new(FakeSearch::new(vec![hit("fact")]));
        let service = service(chat.clone(), search);
        let id = ConversationId::new();

        let chunks: Vec<String> = service
            .ask_stream(ChatRequest::new(id, "How?"), None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let streamed = chunks.concat();

        let asked = service
            .ask(&ChatRequest::new(ConversationId::new(), "How?"))
            .await
            .unwrap();

        assert_eq!(streamed, asked.message);
        assert_eq!(
            chat.interactions()[0],
            (id, "How?".to_string(), "They convert light.".to_string())
        );
    }

    #[tokio::test]
    async fn test_stream_emits_filter_notice_once() {
        let deltas = vec![
            ChatDelta::Text("Partial".to_string()),
            ChatDelta::ContentFiltered,
            ChatDelta::ContentFiltered,
        ];
        let chat = Arc::new(
            FakeChat::new("query", ChatAnswer::ContentFiltered).with_deltas(deltas),
        );
        let search = Arc::new(FakeSearch::new(vec![hit("fact")]));
        let service = service(chat.clone(), search);
        let id = ConversationId::new();

        let chunks: Vec<String> = service
            .ask_stream(ChatRequest::new(id, "question"), None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks, vec!["Partial".to_string(), NOTICE.to_string()]);
        assert_eq!(
            chat.interactions(),
            vec![(id, "question".to_string(), "Partial".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fully_filtered_stream_records_nothing() {
        let chat = Arc::new(
            FakeChat::new("query", ChatAnswer::ContentFiltered)
                .with_deltas(vec![ChatDelta::ContentFiltered]),
        );
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat.clone(), search);

        let chunks: Vec<String> = service
            .ask_stream(ChatRequest::new(ConversationId::new(), "question"), None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks, vec![NOTICE.to_string()]);
        assert!(chat.interactions().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_stream_stops_without_history() {
        let chat = Arc::new(
            FakeChat::new("query", ChatAnswer::Text("unused".to_string()))
                .with_deltas(vec![ChatDelta::Text("a".to_string()), ChatDelta::Text("b".to_string())]),
        );
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat.clone(), search);

        let token = CancellationToken::new();
        let mut stream = service
            .ask_stream(ChatRequest::new(ConversationId::new(), "question"), Some(token.clone()))
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        token.cancel();
        assert!(stream.next().await.is_none());
        assert!(chat.interactions().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_conversation_succeeds() {
        let chat = Arc::new(FakeChat::new("query", ChatAnswer::Text("answer".to_string())));
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat.clone(), search);

        let id = ConversationId::new();
        assert!(service.delete(id).await.is_ok());
        assert_eq!(*chat.deleted.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_rewrite_with_history_uses_conversation() {
        let chat = Arc::new(FakeChat::new("query", ChatAnswer::Text("answer".to_string())));
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat.clone(), search).with_rewrite_with_history(true);
        let id = ConversationId::new();

        let response = service.ask(&ChatRequest::new(id, "follow-up")).await.unwrap();

        assert_eq!(response.message, "answer");
        assert_eq!(chat.rewrite_conversations(), vec![id]);
    }

    #[tokio::test]
    async fn test_rewrite_runs_in_throwaway_conversation_by_default() {
        let chat = Arc::new(FakeChat::new("query", ChatAnswer::Text("answer".to_string())));
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let service = service(chat.clone(), search);
        let id = ConversationId::new();

        service.ask(&ChatRequest::new(id, "first")).await.unwrap();
        service.ask(&ChatRequest::new(id, "second")).await.unwrap();

        let rewrites = chat.rewrite_conversations();
        assert_eq!(rewrites.len(), 2);
        assert!(rewrites.iter().all(|r| *r != id));
        assert_ne!(rewrites[0], rewrites[1]);
    }
}
