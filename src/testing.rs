//! Test doubles for the chat and search collaborators.

use crate::chat::{ChatAnswer, ChatClient, ChatDelta, ChatDeltaStream, ChatParameters};
use crate::conversation::ConversationId;
use crate::error::Result;
use crate::search::{SearchClient, SearchHit, SearchOptions};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) const NOTICE: &str = "Filtered.";

/// Chat client double. Temperature-0 calls are query rewrites.
pub(crate) struct FakeChat {
    pub(crate) rewrite_reply: ChatAnswer,
    pub(crate) answer: ChatAnswer,
    pub(crate) deltas: Vec<ChatDelta>,
    pub(crate) seeds: Mutex<Vec<ConversationId>>,
    pub(crate) prompts: Mutex<Vec<String>>,
    pub(crate) rewrites: Mutex<Vec<ConversationId>>,
    pub(crate) interactions: Mutex<Vec<(ConversationId, String, String)>>,
    pub(crate) deleted: Mutex<Vec<ConversationId>>,
}

impl FakeChat {
    pub(crate) fn new(rewrite_reply: &str, answer: ChatAnswer) -> Self {
        Self {
            rewrite_reply: ChatAnswer::Text(rewrite_reply.to_string()),
            answer,
            deltas: Vec::new(),
            seeds: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            rewrites: Mutex::new(Vec::new()),
            interactions: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_deltas(mut self, deltas: Vec<ChatDelta>) -> Self {
        self.deltas = deltas;
        self
    }

    pub(crate) fn seed_count(&self) -> usize {
        self.seeds.lock().unwrap().len()
    }

    pub(crate) fn interactions(&self) -> Vec<(ConversationId, String, String)> {
        self.interactions.lock().unwrap().clone()
    }

    /// Conversations the query rewrites ran in, in call order.
    pub(crate) fn rewrite_conversations(&self) -> Vec<ConversationId> {
        self.rewrites.lock().unwrap().clone()
    }

    pub(crate) fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn conversation_exists(&self, id: ConversationId) -> Result<bool> {
        Ok(self.seeds.lock().unwrap().contains(&id)
            || self.interactions.lock().unwrap().iter().any(|(c, _, _)| *c == id))
    }

    async fn setup(&self, id: ConversationId, _system_message: &str) -> Result<()> {
        self.seeds.lock().unwrap().push(id);
        Ok(())
    }

    async fn ask(
        &self,
        id: ConversationId,
        message: &str,
        parameters: &ChatParameters,
        add_to_history: bool,
    ) -> Result<ChatAnswer> {
        assert!(!add_to_history);
        self.prompts.lock().unwrap().push(message.to_string());
        if parameters.temperature == Some(0.0) {
            self.rewrites.lock().unwrap().push(id);
            Ok(self.rewrite_reply.clone())
        } else {
            Ok(self.answer.clone())
        }
    }

    async fn ask_stream(
        &self,
        _id: ConversationId,
        message: &str,
        _parameters: &ChatParameters,
        add_to_history: bool,
    ) -> Result<ChatDeltaStream> {
        assert!(!add_to_history);
        self.prompts.lock().unwrap().push(message.to_string());
        let deltas: Vec<Result<ChatDelta>> = self.deltas.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    async fn add_interaction(&self, id: ConversationId, question: &str, answer: &str) -> Result<()> {
        self.interactions
            .lock()
            .unwrap()
            .push((id, question.to_string(), answer.to_string()));
        Ok(())
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}

/// Search client double returning a fixed result list.
pub(crate) struct FakeSearch {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub(crate) fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    async fn search(&self, query: &str, _options: &SearchOptions) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.clone())
    }
}

/// A hit whose `content` highlight is the single given fragment.
pub(crate) fn hit(fragment: &str) -> SearchHit {
    SearchHit {
        score: 1.0,
        content: Some(fragment.to_string()),
        highlights: HashMap::from([("content".to_string(), vec![fragment.to_string()])]),
    }
}
