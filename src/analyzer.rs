use crate::error::GatewayResult;
use crate::llm::{CompletionClient, CompletionRequest, RequestMessage};
use crate::text::truncate_chars;
use crate::types::{Analysis, Category};

pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// OCR text sent for analysis is cut to this many characters.
const MAX_ANALYSIS_CHARS: usize = 6000;

const ANALYST_SYSTEM_PROMPT: &str = "You are a document analyst. Work only from the text you are given. \
Do not invent values; when something is missing, say so.";

/// Summarizes a document and lists its key-value pairs.
pub trait AnalysisGateway {
    fn analyze(&self, text: &str, category: Category) -> GatewayResult<Analysis>;
}

fn category_focus(category: Category) -> &'static str {
    match category {
        Category::Medical => "patient details, diagnoses, medications, providers and authorizations",
        Category::Insurance => "policy and claim numbers, coverage, premiums and insured parties",
        Category::College => "student details, programs, grades and academic dates",
        Category::Employment => "roles, employers, salary, dates and hiring status",
        Category::Tax => "taxpayer details, income, deductions, amounts due or refunded",
        Category::Financial => "account details, balances, transactions and dates",
        Category::Government => "issuing authority, identifiers, holders and validity dates",
        Category::Invoice => "vendor, client, line items, totals, taxes and due dates",
        Category::General => "the parties, dates, amounts and any requested actions",
    }
}

pub fn summary_prompt(text: &str, category: Category) -> String {
    format!(
        "The following text was extracted from a {} form.\n\n{}\n\n\
         Write a concise summary (at most 6 sentences) for a product team, focusing on {}. \
         End with any action items.",
        category,
        truncate_chars(text, MAX_ANALYSIS_CHARS),
        category_focus(category)
    )
}

pub fn key_values_prompt(text: &str, category: Category) -> String {
    format!(
        "The following text was extracted from a {} form.\n\n{}\n\n\
         List every field label and its value as 'Label: Value', one per line. \
         Then add a line 'Completeness:' stating which expected fields of a {} form are missing or empty.",
        category,
        truncate_chars(text, MAX_ANALYSIS_CHARS),
        category
    )
}

/// Analysis through a Groq-hosted chat model: one call for the summary, one for key-values.
pub struct GroqAnalyzer {
    client: CompletionClient,
    model: String,
}

impl GroqAnalyzer {
    pub fn new(client: CompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn ask(&self, prompt: String) -> GatewayResult<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                RequestMessage::system(ANALYST_SYSTEM_PROMPT),
                RequestMessage::user(prompt),
            ],
            temperature: 0.3,
            max_tokens: 1000,
        };
        let resp = self.client.complete(&request)?;
        Ok(resp.first_text()?.trim().to_string())
    }
}

impl AnalysisGateway for GroqAnalyzer {
    fn analyze(&self, text: &str, category: Category) -> GatewayResult<Analysis> {
        tracing::info!(model = %self.model, %category, "analyzing document");
        let summary = self.ask(summary_prompt(text, category))?;
        let key_values = self.ask(key_values_prompt(text, category))?;
        Ok(Analysis { summary, key_values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_name_the_category() {
        let p = summary_prompt("Policy No: 1", Category::Insurance);
        assert!(p.contains("insurance form"));
        assert!(p.contains("Policy No: 1"));
        assert!(p.contains("premiums"));
        let kv = key_values_prompt("x", Category::Tax);
        assert!(kv.contains("Completeness:"));
    }

    #[test]
    fn long_text_is_cut() {
        let text = "a".repeat(MAX_ANALYSIS_CHARS + 500);
        let p = summary_prompt(&text, Category::General);
        assert!(p.len() < text.len());
    }
}
