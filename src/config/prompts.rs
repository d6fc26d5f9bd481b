//! Prompt templates for SearchGPT.
//!
//! Prompts can be customized by placing a `chat.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub chat: ChatPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the retrieval-augmented chat pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    /// Turns the user's message into a search query. Variables: `question`.
    pub query_rewrite: String,
    /// Seeded once as the system message of every new conversation.
    pub system: String,
    /// The question actually sent to the model. Variables: `context`, `question`.
    pub grounded_question: String,
    /// Returned in place of an answer withheld by the content filter.
    pub content_filtered: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            query_rewrite: r#"Generate a search query based on names and concepts extracted from the following question:
---
{{question}}
---
Reply with the search query only.
When you answer, always use the same language of the question."#
                .to_string(),

            system: r#"You are a search engine assistant that helps people find information in a document index.

Guidelines:
- Answer using only the information supplied together with each question
- Never make up facts, names, numbers or sources
- Keep answers concise and to the point
- Always reply in the same language as the question
- If the supplied information is not enough, say so and suggest how to refine the question"#
                .to_string(),

            grounded_question: r#"You know the following information only:
---
{{context}}
When you answer, always use the same language of the question.
You can use only the information above to answer the question.
If you don't know the answer, reply suggesting to refine the question.

Question: {{question}}"#
                .to_string(),

            content_filtered: "I'm sorry, the answer has been withheld by the content filter. Please try rephrasing your question."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template: inserted values are
    /// never scanned for placeholders. Unknown placeholders are left as is.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            match after.find("}}") {
                Some(end) => {
                    let name = &after[..end];
                    match vars.get(name) {
                        Some(value) => result.push_str(value),
                        None => result.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Render the query rewrite instruction for a user message.
    pub fn query_rewrite(&self, question: &str) -> String {
        let vars = HashMap::from([("question".to_string(), question.to_string())]);
        self.render_with_custom(&self.chat.query_rewrite, &vars)
    }

    /// Render the grounded question from an assembled context block.
    pub fn grounded_question(&self, context: &str, question: &str) -> String {
        let vars = HashMap::from([
            ("context".to_string(), context.to_string()),
            ("question".to_string(), question.to_string()),
        ]);
        self.render_with_custom(&self.chat.grounded_question, &vars)
    }

    /// Render the system instruction seeded into new conversations.
    pub fn system(&self) -> String {
        self.render_with_custom(&self.chat.system, &HashMap::new())
    }
}
