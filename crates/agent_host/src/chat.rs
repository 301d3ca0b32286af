//! Direct single-turn chat, outside the research workflow.

use providers::{AbortCheck, InvokeRequest, LlmInvoker};
use shared::agent_api::ChatMessage;
use shared::settings::ResearchSettings;
use tracing::{info, warn};

/// Last three exchanges.
const CONTEXT_WINDOW: usize = 6;

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub provider_used: String,
    pub model_used: Option<String>,
    pub error: bool,
}

/// Answer the latest user turn, inlining up to the last three exchanges as
/// context. Persistent history injection is disabled since the prompt carries
/// the context itself. Errors become an apologetic reply rather than a
/// failure, so callers can always render something.
pub async fn chat(
    invoker: &dyn LlmInvoker,
    messages: &[ChatMessage],
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> ChatReply {
    let Some(latest) = messages.iter().rev().find(|m| m.role == "user") else {
        warn!("chat invoked without a user message");
        return error_reply("no user message found in conversation");
    };

    let prompt = build_prompt(messages, &latest.content);
    let model = settings.query_generator_model.clone();

    let mut req = InvokeRequest::new(prompt, settings.provider, settings.temperature);
    req.model_override = Some(model.clone());
    req.session_id = settings.session_id.clone();
    req.include_history = false;
    req.abort_check = abort_check;

    match invoker.invoke(req).await {
        Ok(invocation) => {
            info!(provider = %invocation.provider_used, "chat reply");
            ChatReply {
                content: invocation.text,
                provider_used: invocation.provider_used,
                model_used: Some(model),
                error: false,
            }
        }
        Err(e) => {
            warn!(error = %e, "chat failed");
            error_reply(&e.to_string())
        }
    }
}

fn build_prompt(messages: &[ChatMessage], latest: &str) -> String {
    if messages.len() <= 1 {
        return latest.to_string();
    }
    let skip = messages.len().saturating_sub(CONTEXT_WINDOW);
    let recent = &messages[skip..];
    let mut context = String::new();
    // Everything but the turn being answered
    for msg in &recent[..recent.len().saturating_sub(1)] {
        match msg.role.as_str() {
            "user" => context.push_str(&format!("Human: {}\n", msg.content)),
            "assistant" => context.push_str(&format!("Assistant: {}\n", msg.content)),
            _ => {}
        }
    }
    if context.is_empty() {
        latest.to_string()
    } else {
        format!("{context}\nCurrent message: {latest}")
    }
}

fn error_reply(error: &str) -> ChatReply {
    ChatReply {
        content: format!("I apologize, but I encountered an error: {error}"),
        provider_used: "error".to_string(),
        model_used: None,
        error: true,
    }
}
