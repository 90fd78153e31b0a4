//! Text-generation trait, chat messages, and retrieval prompt assembly.
//!
//! The conversational pipeline builds two prompts per request: one that
//! rewrites the latest question into a standalone query using the session
//! history, and one that answers the question from retrieved context.
//! Both are plain message lists handed to a [`TextGenerator`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ConversationTurn, SearchHit};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Ai,
}

impl Role {
    /// Role name on the OpenAI-compatible wire format.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "user",
            Role::Ai => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Backend that turns a message list into a reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name used in logs and error messages.
    fn provider_name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Allow-list of model identifiers accepted on the query side.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCatalog {
    models: Vec<String>,
    default_model: String,
}

impl ModelCatalog {
    pub fn new(models: Vec<String>, default_model: impl Into<String>) -> Result<Self> {
        let default_model = default_model.into();
        if !models.iter().any(|m| *m == default_model) {
            return Err(Error::UnknownModel(default_model));
        }
        Ok(Self {
            models,
            default_model,
        })
    }

    /// Resolve a requested model, falling back to the default.
    pub fn resolve(&self, requested: Option<&str>) -> Result<String> {
        match requested {
            None => Ok(self.default_model.clone()),
            Some(name) if self.models.iter().any(|m| m == name) => Ok(name.to_string()),
            Some(name) => Err(Error::UnknownModel(name.to_string())),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

const CONTEXTUALIZE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Use the following context to answer the user's question.";

/// Map stored turns to alternating human/ai messages, oldest first.
pub fn history_messages(turns: &[ConversationTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .flat_map(|t| {
            [
                ChatMessage::human(t.user_query.clone()),
                ChatMessage::ai(t.response.clone()),
            ]
        })
        .collect()
}

/// Build the history-aware rewrite prompt.
///
/// Returns `None` when there is no history, in which case the question is
/// already standalone.
pub fn contextualize_messages(history: &[ChatMessage], question: &str) -> Option<Vec<ChatMessage>> {
    if history.is_empty() {
        return None;
    }
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(CONTEXTUALIZE_SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::human(question));
    Some(messages)
}

/// Build the answer prompt from retrieved context, history, and question.
pub fn answer_messages(
    context: &[SearchHit],
    history: &[ChatMessage],
    question: &str,
) -> Vec<ChatMessage> {
    let context_text = context
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!(
        "{}\n\n{}",
        ANSWER_SYSTEM_PROMPT, context_text
    )));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::human(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Metadata};
    use chrono::Utc;

    fn turn(seq: i64, q: &str, a: &str) -> ConversationTurn {
        ConversationTurn {
            session_id: "s".into(),
            seq,
            user_query: q.into(),
            response: a.into(),
            model: "m".into(),
            created_at: Utc::now(),
        }
    }

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            chunk: Chunk {
                file_id: 1,
                chunk_index: 0,
                text: text.into(),
                embedding: vec![],
                hash: String::new(),
                metadata: Metadata::new(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn history_alternates_human_and_ai() {
        let msgs = history_messages(&[turn(1, "q1", "a1"), turn(2, "q2", "a2")]);
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Human, Role::Ai, Role::Human, Role::Ai]);
        assert_eq!(msgs[2].content, "q2");
    }

    #[test]
    fn contextualize_skipped_without_history() {
        assert!(contextualize_messages(&[], "what is rust?").is_none());
    }

    #[test]
    fn contextualize_wraps_history() {
        let history = history_messages(&[turn(1, "q1", "a1")]);
        let msgs = contextualize_messages(&history, "and then?").unwrap();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[3], ChatMessage::human("and then?"));
    }

    #[test]
    fn answer_prompt_joins_context() {
        let msgs = answer_messages(&[hit("alpha"), hit("beta")], &[], "q");
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].content.ends_with("alpha\n\nbeta"));
        assert_eq!(msgs[1].content, "q");
    }

    #[test]
    fn model_catalog_resolves() {
        let catalog = ModelCatalog::new(
            vec!["llama-3.1-8b-instant".into(), "mixtral-8x7b-groq".into()],
            "llama-3.1-8b-instant",
        )
        .unwrap();
        assert_eq!(catalog.resolve(None).unwrap(), "llama-3.1-8b-instant");
        assert_eq!(
            catalog.resolve(Some("mixtral-8x7b-groq")).unwrap(),
            "mixtral-8x7b-groq"
        );
        assert_eq!(
            catalog.resolve(Some("gpt-9")),
            Err(Error::UnknownModel("gpt-9".into()))
        );
    }

    #[test]
    fn model_catalog_requires_default_in_list() {
        assert!(ModelCatalog::new(vec!["a".into()], "b").is_err());
    }

    #[test]
    fn wire_roles() {
        assert_eq!(Role::Human.as_wire_str(), "user");
        assert_eq!(Role::Ai.as_wire_str(), "assistant");
    }
}
