use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use roomsync_core::SyncResult;
use roomsync_domain::entities::RoomMessage;
use roomsync_domain::ports::{SummaryModel, SummaryOutput, SummaryRequest};
use roomsync_domain::value_objects::TokenUsage;

/// Conversation window per model call. Larger histories are summarized
/// chunk by chunk, then reduced in one final pass.
const CHUNK_SIZE: usize = 40;

const MAP_INSTRUCTION: &str = "Summarize this segment of a sales chat conversation. \
Keep concrete facts, decisions and commitments.";
const REDUCE_INSTRUCTION: &str = "Combine these segment summaries into one digest \
of the whole conversation.";

/// Map-reduce summarization over a room's message history.
pub struct DigestPipeline {
    model: Arc<dyn SummaryModel>,
}

impl DigestPipeline {
    pub fn new(model: Arc<dyn SummaryModel>) -> Self {
        Self { model }
    }

    pub async fn summarize(&self, messages: &[RoomMessage]) -> SyncResult<SummaryOutput> {
        if messages.is_empty() {
            return Ok(SummaryOutput {
                text: String::new(),
                usage: TokenUsage::default(),
            });
        }

        let lines: Vec<String> = messages.iter().map(format_line).collect();
        let mut usage = TokenUsage::default();

        if lines.len() <= CHUNK_SIZE {
            let output = self.call(MAP_INSTRUCTION, lines.join("\n")).await?;
            usage += output.usage;
            return Ok(SummaryOutput {
                text: output.text,
                usage,
            });
        }

        let mut partials = Vec::new();
        for chunk in lines.chunks(CHUNK_SIZE) {
            let output = self.call(MAP_INSTRUCTION, chunk.join("\n")).await?;
            usage += output.usage;
            partials.push(output.text);
        }
        debug!(
            messages = lines.len(),
            chunks = partials.len(),
            "reducing chunk summaries"
        );

        let reduced = self.call(REDUCE_INSTRUCTION, partials.join("\n\n")).await?;
        usage += reduced.usage;
        Ok(SummaryOutput {
            text: reduced.text,
            usage,
        })
    }

    async fn call(&self, instruction: &str, content: String) -> SyncResult<SummaryOutput> {
        self.model
            .summarize(&SummaryRequest {
                instruction: instruction.to_string(),
                content,
            })
            .await
    }
}

fn format_line(message: &RoomMessage) -> String {
    format!("{}: {}", message.sender_name, message.body)
}

const SECTION_LINE_CHARS: usize = 120;
const SECTION_LINES: usize = 3;
const TOPIC_COUNT: usize = 5;

/// Deterministic fallback used when no model credentials are configured.
/// It reads only the request content, so identical input gives identical
/// output.
pub struct RuleBasedSummarizer;

#[async_trait]
impl SummaryModel for RuleBasedSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> SyncResult<SummaryOutput> {
        let lines: Vec<&str> = request
            .content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let mut text = String::new();
        push_section(
            &mut text,
            "Highlights",
            lines.iter().take(SECTION_LINES).copied(),
        );
        text.push_str("Key topics: ");
        let topics = key_topics(&lines);
        if topics.is_empty() {
            text.push_str("(none)");
        } else {
            text.push_str(&topics.join(", "));
        }
        text.push('\n');
        push_section(
            &mut text,
            "Open items",
            lines
                .iter()
                .filter(|line| line.contains('?'))
                .take(SECTION_LINES)
                .copied(),
        );
        push_section(
            &mut text,
            "Next actions",
            lines
                .iter()
                .filter(|line| is_action_line(line))
                .take(SECTION_LINES)
                .copied(),
        );

        Ok(SummaryOutput {
            text,
            usage: TokenUsage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
                requests: 1,
            },
        })
    }
}

fn push_section<'a>(out: &mut String, title: &str, lines: impl Iterator<Item = &'a str>) {
    out.push_str(title);
    out.push_str(":\n");
    let mut any = false;
    for line in lines {
        out.push_str("- ");
        out.push_str(&clip_line(line));
        out.push('\n');
        any = true;
    }
    if !any {
        out.push_str("- (none)\n");
    }
}

fn clip_line(line: &str) -> String {
    if line.chars().count() <= SECTION_LINE_CHARS {
        return line.to_string();
    }
    let mut clipped: String = line.chars().take(SECTION_LINE_CHARS).collect();
    clipped.push('…');
    clipped
}

/// Most frequent words of 5+ letters, ties broken alphabetically
fn key_topics(lines: &[&str]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for line in lines {
        // drop the "sender:" prefix so names do not dominate the topics
        let body = line.split_once(':').map(|(_, rest)| rest).unwrap_or(line);
        for word in body.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if word.chars().count() >= 5 {
                *counts.entry(word).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(TOPIC_COUNT)
        .map(|(word, _)| word)
        .collect()
}

fn is_action_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["will ", "need to", "let's", "todo", "follow up", "by tomorrow"]
        .iter()
        .any(|marker| lower.contains(marker))
}
