//! Optional pre-pass that asks the model for the document's main topics.
//!
//! Topic discovery is best-effort: a failed call or an answer that cannot be
//! read as a label list yields an empty list, which downstream simply means
//! "no topic filter".

use crate::pipeline::llm::LlmClient;
use crate::prompts::topic_prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Labels longer than this are prose, not topics.
const MAX_TOPIC_CHARS: usize = 80;

/// First `n` whitespace-separated words of `text`, joined by single spaces.
pub fn preview_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// Ask `client` for up to `max_topics` labels describing `preview`.
///
/// No retries beyond whatever the client does itself.
pub async fn extract_topics(client: &dyn LlmClient, preview: &str, max_topics: usize) -> Vec<String> {
    if preview.trim().is_empty() || max_topics == 0 {
        return Vec::new();
    }

    let prompt = topic_prompt(preview, max_topics);
    match client.invoke(&prompt).await {
        Ok(reply) => {
            let topics = parse_topics(&reply.content, max_topics);
            if topics.is_empty() {
                warn!("Topic discovery returned no usable labels");
                debug!("Raw topic reply: {}", reply.content);
            } else {
                info!("Discovered {} topics: {}", topics.len(), topics.join(", "));
            }
            topics
        }
        Err(e) => {
            warn!("Topic discovery failed: {}", e);
            Vec::new()
        }
    }
}

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]+|\d+[.)])\s*").unwrap());

/// Split a comma/newline separated list into clean, unique labels.
pub fn parse_topics(raw: &str, max_topics: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split([',', '\n', ';'])
        .map(|t| {
            let t = t.trim().replace("**", "");
            let t = RE_BULLET.replace(t.trim(), "");
            t.trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c.is_whitespace())
                .to_string()
        })
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_TOPIC_CHARS && !t.ends_with(':'))
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(max_topics)
        .collect()
}
