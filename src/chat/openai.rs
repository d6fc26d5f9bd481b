//! Chat client backed by the OpenAI (or Azure OpenAI) chat completions API.

use super::{trim_history, ChatAnswer, ChatClient, ChatDelta, ChatDeltaStream, ChatParameters};
use crate::config::OpenAISettings;
use crate::conversation::{ChatMessage, ConversationId, ConversationStore, Role};
use crate::error::{Result, SearchGptError};
use async_openai::config::Config;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Chat client over any `async-openai` provider configuration.
pub struct OpenAIChatClient<C: Config> {
    client: Client<C>,
    store: Arc<dyn ConversationStore>,
    model: String,
    temperature: f32,
    message_limit: usize,
}

impl<C: Config> OpenAIChatClient<C> {
    /// Create a new chat client.
    pub fn new(client: Client<C>, store: Arc<dyn ConversationStore>, settings: &OpenAISettings) -> Self {
        Self {
            client,
            store,
            model: settings.model.clone(),
            temperature: settings.temperature,
            message_limit: settings.message_limit,
        }
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        parameters: &ChatParameters,
    ) -> Result<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(parameters.temperature.unwrap_or(self.temperature))
            .build()
            .map_err(|e| SearchGptError::OpenAI(format!("Failed to build request: {}", e)))
    }

    /// History of the conversation followed by the new user message.
    async fn prepare_messages(&self, id: ConversationId, message: &str) -> Result<Vec<ChatMessage>> {
        let mut messages = self.store.get(id).await?;
        messages.push(ChatMessage::user(message));
        Ok(messages)
    }

    async fn save_trimmed(&self, id: ConversationId, messages: Vec<ChatMessage>) -> Result<()> {
        self.store
            .save(id, &trim_history(messages, self.message_limit))
            .await
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| SearchGptError::OpenAI(e.to_string()))?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| SearchGptError::OpenAI(e.to_string()))?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| SearchGptError::OpenAI(e.to_string()))?
            .into(),
    };
    Ok(built)
}

fn is_content_filtered(finish_reason: &Option<FinishReason>) -> bool {
    matches!(finish_reason, Some(FinishReason::ContentFilter))
}

#[async_trait]
impl<C: Config + Send + Sync + 'static> ChatClient for OpenAIChatClient<C> {
    async fn conversation_exists(&self, id: ConversationId) -> Result<bool> {
        self.store.exists(id).await
    }

    #[instrument(skip(self, system_message))]
    async fn setup(&self, id: ConversationId, system_message: &str) -> Result<()> {
        let mut messages = self.store.get(id).await?;
        messages.retain(|m| m.role != Role::System);
        messages.insert(0, ChatMessage::system(system_message));
        self.store.save(id, &messages).await
    }

    #[instrument(skip(self, message, parameters))]
    async fn ask(
        &self,
        id: ConversationId,
        message: &str,
        parameters: &ChatParameters,
        add_to_history: bool,
    ) -> Result<ChatAnswer> {
        let mut messages = self.prepare_messages(id, message).await?;
        let request = self.build_request(&messages, parameters)?;

        debug!("Sending {} messages to {}", messages.len(), self.model);

        let response = self.client.chat().create(request).await.map_err(|e| {
            SearchGptError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SearchGptError::OpenAI("Empty response from LLM".to_string()))?;

        if is_content_filtered(&choice.finish_reason) {
            warn!("Response for conversation {} was content filtered", id);
            return Ok(ChatAnswer::ContentFiltered);
        }

        let answer = choice
            .message
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SearchGptError::OpenAI("Empty response from LLM".to_string()))?;

        if add_to_history {
            messages.push(ChatMessage::assistant(answer.clone()));
            self.save_trimmed(id, messages).await?;
        }

        Ok(ChatAnswer::Text(answer))
    }

    #[instrument(skip(self, message, parameters))]
    async fn ask_stream(
        &self,
        id: ConversationId,
        message: &str,
        parameters: &ChatParameters,
        add_to_history: bool,
    ) -> Result<ChatDeltaStream> {
        let mut messages = self.prepare_messages(id, message).await?;
        let request = self.build_request(&messages, parameters)?;

        let mut upstream = self.client.chat().create_stream(request).await.map_err(|e| {
            SearchGptError::OpenAI(format!("Failed to start response stream: {}", e))
        })?;

        let store = Arc::clone(&self.store);
        let message_limit = self.message_limit;

        let stream = async_stream::stream! {
            let mut answer = String::new();

            while let Some(chunk) = upstream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(SearchGptError::OpenAI(format!("Response stream failed: {}", e)));
                        return;
                    }
                };

                // Azure sends prompt filter results in a chunk without choices.
                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                if is_content_filtered(&choice.finish_reason) {
                    yield Ok(ChatDelta::ContentFiltered);
                    continue;
                }

                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    answer.push_str(&content);
                    yield Ok(ChatDelta::Text(content));
                }
            }

            if add_to_history && !answer.is_empty() {
                messages.push(ChatMessage::assistant(answer));
                if let Err(e) = store.save(id, &trim_history(messages, message_limit)).await {
                    yield Err(e);
                }
            }
        };

        info!("Streaming response for conversation {}", id);
        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, question, answer))]
    async fn add_interaction(&self, id: ConversationId, question: &str, answer: &str) -> Result<()> {
        let mut messages = self.store.get(id).await?;
        messages.push(ChatMessage::user(question));
        messages.push(ChatMessage::assistant(answer));
        self.save_trimmed(id, messages).await
    }

    #[instrument(skip(self))]
    async fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        self.store.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::MemoryConversationStore;
    use async_openai::config::OpenAIConfig;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(
        server: &MockServer,
        store: Arc<dyn ConversationStore>,
    ) -> OpenAIChatClient<OpenAIConfig> {
        let config = OpenAIConfig::new()
            .with_api_base(server.uri())
            .with_api_key("test-api-key");
        let client = crate::openai::create_client_with_config(config, Duration::from_secs(5)).unwrap();
        OpenAIChatClient::new(client, store, &OpenAISettings::default())
    }

    fn completion(content: Option<&str>, finish_reason: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": finish_reason
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })
    }

    fn stream_chunk(content: Option<&str>, finish_reason: Option<&str>) -> String {
        let chunk = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion.chunk",
            "created": 1677652288,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "delta": { "content": content },
                "finish_reason": finish_reason
            }]
        });
        format!("data: {}\n\n", chunk)
    }

    #[tokio::test]
    async fn test_ask_records_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(Some("Paris"), "stop")))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryConversationStore::new());
        let client = client_for(&server, store.clone());
        let id = ConversationId::new();

        client.setup(id, "persona").await.unwrap();
        let answer = client
            .ask(id, "Capital of France?", &ChatParameters::default(), true)
            .await
            .unwrap();

        assert_eq!(answer, ChatAnswer::Text("Paris".to_string()));
        assert_eq!(
            store.get(id).await.unwrap(),
            vec![
                ChatMessage::system("persona"),
                ChatMessage::user("Capital of France?"),
                ChatMessage::assistant("Paris"),
            ]
        );
    }

    #[tokio::test]
    async fn test_ask_without_history_leaves_store_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(Some("answer"), "stop")))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryConversationStore::new());
        let client = client_for(&server, store.clone());
        let id = ConversationId::new();

        client
            .ask(id, "question", &ChatParameters::with_temperature(0.0), false)
            .await
            .unwrap();

        assert!(!store.exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_ask_content_filtered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(None, "content_filter")))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryConversationStore::new());
        let client = client_for(&server, store);

        let answer = client
            .ask(ConversationId::new(), "question", &ChatParameters::default(), true)
            .await
            .unwrap();
        assert_eq!(answer, ChatAnswer::ContentFiltered);
    }

    #[tokio::test]
    async fn test_ask_api_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Invalid API key",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key"
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryConversationStore::new()));
        let err = client
            .ask(ConversationId::new(), "question", &ChatParameters::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchGptError::OpenAI(_)));
    }

    #[tokio::test]
    async fn test_ask_stream_yields_deltas_and_records_history() {
        let server = MockServer::start().await;
        let body = [
            stream_chunk(Some("Hel"), None),
            stream_chunk(Some("lo"), None),
            stream_chunk(None, Some("stop")),
            "data: [DONE]\n\n".to_string(),
        ]
        .concat();
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryConversationStore::new());
        let client = client_for(&server, store.clone());
        let id = ConversationId::new();

        let deltas: Vec<ChatDelta> = client
            .ask_stream(id, "Say hello", &ChatParameters::default(), true)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            deltas,
            vec![
                ChatDelta::Text("Hel".to_string()),
                ChatDelta::Text("lo".to_string())
            ]
        );
        assert_eq!(
            store.get(id).await.unwrap(),
            vec![ChatMessage::user("Say hello"), ChatMessage::assistant("Hello")]
        );
    }

    #[tokio::test]
    async fn test_setup_replaces_system_message() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryConversationStore::new());
        let client = client_for(&server, store.clone());
        let id = ConversationId::new();

        client.setup(id, "first").await.unwrap();
        client.add_interaction(id, "q", "a").await.unwrap();
        client.setup(id, "second").await.unwrap();

        assert_eq!(
            store.get(id).await.unwrap(),
            vec![
                ChatMessage::system("second"),
                ChatMessage::user("q"),
                ChatMessage::assistant("a"),
            ]
        );
    }
}
