//! Conversational retrieval pipeline.
//!
//! Per request:
//!
//! 1. Resolve the model against the allow-list and the session id
//!    (a fresh UUID when absent).
//! 2. Load the session's prior turns in order and map them to messages.
//! 3. Rewrite the question into a standalone query when there is history.
//! 4. Embed the query and retrieve the top-k chunks.
//! 5. Generate an answer from context, history, and question.
//! 6. Append the turn to the catalog.
//!
//! A generation failure returns an error and logs no turn. A failure to
//! append the turn is also an error, and the answer is not returned.

use uuid::Uuid;

use docchat_core::generation::{
    answer_messages, contextualize_messages, history_messages, ChatMessage, GenerationRequest,
};
use docchat_core::models::{FileId, NewTurn, SearchHit};
use docchat_core::{Error, Result};

use crate::context::AppContext;

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub question: String,
    pub session_id: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: String,
    pub model: String,
    /// Chunks the answer was grounded on.
    pub sources: Vec<SearchHit>,
}

/// Query and chunks produced by the retrieval half of the pipeline.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub standalone_query: String,
    pub hits: Vec<SearchHit>,
}

pub async fn chat(ctx: &AppContext, request: &ChatRequest) -> Result<ChatResponse> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(Error::InvalidInput("question must not be empty".into()));
    }
    let model = ctx.models.resolve(request.model.as_deref())?;
    let session_id = match &request.session_id {
        Some(id) if !id.trim().is_empty() => id.clone(),
        _ => Uuid::new_v4().to_string(),
    };
    tracing::info!(%session_id, %model, "chat request");

    let turns = ctx.catalog.get_turns(&session_id).await?;
    let history = history_messages(&turns);

    let retrieval = retrieve(ctx, &history, question, &model).await?;
    tracing::info!(
        %session_id,
        chunks = retrieval.hits.len(),
        rewritten = retrieval.standalone_query != question,
        "context retrieved"
    );

    let answer = ctx
        .generator
        .generate(&GenerationRequest {
            model: model.clone(),
            messages: answer_messages(&retrieval.hits, &history, question),
        })
        .await
        .map_err(|e| {
            tracing::error!(
                %session_id,
                error = %e,
                retryable = e.is_retryable(),
                "generation failed, turn not logged"
            );
            e
        })?;

    ctx.catalog
        .append_turn(&NewTurn {
            session_id: session_id.clone(),
            user_query: question.to_string(),
            response: answer.clone(),
            model: model.clone(),
        })
        .await
        .map_err(|e| {
            tracing::error!(%session_id, error = %e, "failed to log turn");
            e
        })?;

    Ok(ChatResponse {
        answer,
        session_id,
        model,
        sources: retrieval.hits,
    })
}

/// Rewrite the question against history, then search the index.
///
/// With a deterministic generator and an unchanged index, the same history
/// and question always retrieve the same chunks.
pub async fn retrieve(
    ctx: &AppContext,
    history: &[ChatMessage],
    question: &str,
    model: &str,
) -> Result<Retrieval> {
    let standalone_query = match contextualize_messages(history, question) {
        Some(messages) => {
            let rewritten = ctx
                .generator
                .generate(&GenerationRequest {
                    model: model.to_string(),
                    messages,
                })
                .await?;
            let rewritten = rewritten.trim();
            if rewritten.is_empty() {
                question.to_string()
            } else {
                rewritten.to_string()
            }
        }
        None => question.to_string(),
    };

    let hits = search(ctx, &standalone_query, ctx.top_k, None).await?;
    Ok(Retrieval {
        standalone_query,
        hits,
    })
}

/// Embed `query` and return the `limit` most similar chunks.
pub async fn search(
    ctx: &AppContext,
    query: &str,
    limit: usize,
    file_id: Option<FileId>,
) -> Result<Vec<SearchHit>> {
    if limit == 0 {
        return Err(Error::InvalidInput("limit must be >= 1".into()));
    }
    let vector = ctx.embedder.embed_query(query).await?;
    ctx.index.search(&vector, limit, file_id).await
}
