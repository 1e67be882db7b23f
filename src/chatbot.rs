//! Chat over processed documents: context rendering, question suggestions and answers.
//!
//! The rendered context grows with every stored document and is sent whole; there is no
//! windowing, so a large session can exceed the model's input limit.

use crate::error::GatewayResult;
use crate::llm::{CompletionClient, CompletionRequest, RequestMessage};
use crate::session::Session;
use crate::text::truncate_chars;
use crate::types::{Category, ChatTurn, DocumentRecord};
use std::collections::{BTreeMap, BTreeSet};

pub const TEXT_PREVIEW_CHARS: usize = 200;
pub const SUMMARY_PREVIEW_CHARS: usize = 150;
pub const MAX_SUGGESTIONS: usize = 10;

pub const NO_DOCUMENTS_REPLY: &str = "I don't have any processed documents to analyze yet. Please upload and process some documents first.";

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that provides accurate insights from document processing.

Your responsibilities:
- Accurately answer user questions using ONLY the structured data and summaries provided.
- If the required data isn't in the context, explain that clearly and suggest next steps.
- Do NOT make up values. Focus on practical business insights from ANY type of form (tax, medical, insurance, college, employment, etc).
- Be concise, factual, and helpful for team communication and decision-making.";

/// Answers a question against a rendered document context.
pub trait ChatGateway {
    fn respond(&self, question: &str, context: &str) -> GatewayResult<String>;
}

/// Flatten the documents into the text block the chat model is grounded on.
pub fn render_context(records: &[DocumentRecord]) -> String {
    let mut context = String::from("Available Documents and Data:\n\n");

    for (i, doc) in records.iter().enumerate() {
        context.push_str(&format!("Document {}: {}\n", i + 1, doc.filename));
        context.push_str(&format!("- Type: {}\n", doc.category));
        context.push_str(&format!("- Processed: {}\n", doc.timestamp));
        context.push_str(&format!(
            "- Text Preview: {}...\n",
            truncate_chars(&doc.raw_text, TEXT_PREVIEW_CHARS)
        ));

        if let Some(summary) = &doc.summary {
            context.push_str(&format!(
                "- Summary: {}...\n",
                truncate_chars(summary, SUMMARY_PREVIEW_CHARS)
            ));
        }

        if !doc.extracted_fields.is_empty() {
            context.push_str("- Extracted Key Fields:\n");
            for (k, v) in &doc.extracted_fields {
                context.push_str(&format!("   - {}: {}\n", k, v));
            }
        }

        context.push('\n');
        context.push_str(&"=".repeat(50));
        context.push_str("\n\n");
    }

    context
}

pub fn build_chat_request(model: &str, question: &str, context: &str) -> CompletionRequest {
    let user_prompt = format!(
        "Below is the available context from processed documents:\n\n{}\n\n\
         Now answer this question clearly and factually:\n\n{}",
        context, question
    );
    CompletionRequest {
        model: model.to_string(),
        messages: vec![
            RequestMessage::system(CHAT_SYSTEM_PROMPT),
            RequestMessage::user(user_prompt),
        ],
        temperature: 0.4,
        max_tokens: 1000,
    }
}

/// Ask the gateway; a failure becomes an apology carrying the error text.
pub fn answer(gateway: &dyn ChatGateway, question: &str, context: &str) -> String {
    match gateway.respond(question, context) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "chat gateway failed");
            format!(
                "I encountered an error while processing your question: {}. \
                 Please try rephrasing your question or check if the API service is available.",
                e
            )
        }
    }
}

/// One chat exchange: records the question and the reply in the session and returns the reply.
pub fn chat_with_data(session: &mut Session, gateway: &dyn ChatGateway, question: &str) -> String {
    session.push_chat(ChatTurn::user(question));
    let reply = if session.documents().is_empty() {
        NO_DOCUMENTS_REPLY.to_string()
    } else {
        let context = render_context(session.documents());
        tracing::debug!(documents = session.documents().len(), context_chars = context.chars().count(), "answering chat question");
        answer(gateway, question, &context)
    };
    session.push_chat(ChatTurn::assistant(reply.clone()));
    reply
}

/// Prompts worth asking given which form types are present.
pub fn suggest_questions(records: &[DocumentRecord]) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }

    let present: BTreeSet<Category> = records.iter().map(|d| d.category).collect();

    let mut suggestions: Vec<&str> = vec![
        "What are the key insights from all processed documents?",
        "Can you summarize the main findings for my team?",
        "What action items should I communicate to stakeholders?",
    ];

    let per_category: [(Category, [&str; 2]); 5] = [
        (
            Category::Medical,
            [
                "What are the key diagnoses or treatments mentioned?",
                "Which patient conditions are most critical?",
            ],
        ),
        (
            Category::Insurance,
            [
                "What policy or claim details are extracted?",
                "Are there any expired policies or unpaid claims?",
            ],
        ),
        (
            Category::Financial,
            [
                "What is the tax amount due or refund expected?",
                "Are there any inconsistencies in income or deductions?",
            ],
        ),
        (
            Category::College,
            [
                "What academic information is extracted?",
                "Are there missing transcripts or GPA fields?",
            ],
        ),
        (
            Category::Employment,
            [
                "What job roles or hiring statuses are mentioned?",
                "Is the employment history complete?",
            ],
        ),
    ];
    for (category, questions) in per_category {
        if present.contains(&category) {
            suggestions.extend(questions);
        }
    }

    if records.len() > 1 {
        suggestions.extend([
            "Compare summary fields across documents",
            "What trends do you notice between documents?",
            "Which document has the most important action item?",
        ]);
    }

    suggestions
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(String::from)
        .collect()
}

/// Per-session overview shown by `stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStats<'a> {
    pub total_documents: usize,
    pub form_types: BTreeMap<Category, usize>,
    pub total_text_length: usize,
    pub latest_document: Option<&'a DocumentRecord>,
    pub oldest_document: Option<&'a DocumentRecord>,
}

/// `None` for an empty sequence. On equal timestamps the earliest-stored document is kept for both ends.
pub fn document_stats(records: &[DocumentRecord]) -> Option<DocumentStats<'_>> {
    if records.is_empty() {
        return None;
    }

    let mut stats = DocumentStats {
        total_documents: records.len(),
        form_types: BTreeMap::new(),
        total_text_length: 0,
        latest_document: None,
        oldest_document: None,
    };

    for doc in records {
        *stats.form_types.entry(doc.category).or_insert(0) += 1;
        stats.total_text_length += doc.text_length();

        if stats
            .latest_document
            .map_or(true, |latest| doc.timestamp > latest.timestamp)
        {
            stats.latest_document = Some(doc);
        }
        if stats
            .oldest_document
            .map_or(true, |oldest| doc.timestamp < oldest.timestamp)
        {
            stats.oldest_document = Some(doc);
        }
    }

    Some(stats)
}

/// Chat answers through a Groq-hosted model.
pub struct GroqChat {
    client: CompletionClient,
    model: String,
}

impl GroqChat {
    pub fn new(client: CompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl ChatGateway for GroqChat {
    fn respond(&self, question: &str, context: &str) -> GatewayResult<String> {
        let request = build_chat_request(&self.model, question, context);
        let resp = self.client.complete(&request)?;
        Ok(resp.first_text()?.to_string())
    }
}
