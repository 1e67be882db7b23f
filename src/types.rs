use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse form type assigned to a processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Medical,
    Insurance,
    College,
    Employment,
    Tax,
    Financial,
    Government,
    Invoice,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Medical => "medical",
            Category::Insurance => "insurance",
            Category::College => "college",
            Category::Employment => "employment",
            Category::Tax => "tax",
            Category::Financial => "financial",
            Category::Government => "government",
            Category::Invoice => "invoice",
            Category::General => "general",
        }
    }

    /// Parse a lowercase category name. Unknown names map to `General`.
    pub fn from_name(name: &str) -> Category {
        match name.trim().to_lowercase().as_str() {
            "medical" => Category::Medical,
            "insurance" => Category::Insurance,
            "college" => Category::College,
            "employment" => Category::Employment,
            "tax" => Category::Tax,
            "financial" => Category::Financial,
            "government" => Category::Government,
            "invoice" => Category::Invoice,
            _ => Category::General,
        }
    }

    /// Display form with the first letter capitalized ("Medical").
    pub fn title(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One processed upload. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub timestamp: String,
    pub raw_text: String,
    pub category: Category,
    pub extracted_fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_value_narrative: Option<String>,
}

impl DocumentRecord {
    /// Text length in characters.
    pub fn text_length(&self) -> usize {
        self.raw_text.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting reported by a chat-completions endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Text returned by the OCR gateway plus the named metadata fields we keep from the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl OcrResponse {
    /// Present metadata fields rendered as strings. Absent fields are omitted; nothing else is harvested.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(id) = &self.response_id {
            out.insert("id".to_string(), id.clone());
        }
        if let Some(model) = &self.model {
            out.insert("model".to_string(), model.clone());
        }
        if let Some(created) = self.created {
            out.insert("created".to_string(), created.to_string());
        }
        if let Some(reason) = &self.finish_reason {
            out.insert("finish_reason".to_string(), reason.clone());
        }
        if let Some(usage) = &self.usage {
            let counts = [
                ("prompt_tokens", usage.prompt_tokens),
                ("completion_tokens", usage.completion_tokens),
                ("total_tokens", usage.total_tokens),
            ];
            for (key, value) in counts {
                if let Some(v) = value {
                    out.insert(key.to_string(), v.to_string());
                }
            }
        }
        out
    }
}

/// Summary and key-value narrative produced by the analysis gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    pub key_values: String,
}

/// Aggregate numbers over a document sequence (live session or re-read export).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_documents: usize,
    pub total_characters: usize,
    pub form_types: BTreeMap<String, usize>,
    pub avg_text_length: usize,
    pub processing_dates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Insurance).unwrap();
        assert_eq!(json, "\"insurance\"");
        let back: Category = serde_json::from_str("\"tax\"").unwrap();
        assert_eq!(back, Category::Tax);
    }

    #[test]
    fn unknown_category_name_is_general() {
        assert_eq!(Category::from_name("Medical"), Category::Medical);
        assert_eq!(Category::from_name("recipe"), Category::General);
        assert_eq!(Category::Employment.title(), "Employment");
    }

    #[test]
    fn attributes_only_list_present_fields() {
        let resp = OcrResponse {
            text: "hello".to_string(),
            model: Some("pixtral-12b-2409".to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: Some(12),
                completion_tokens: None,
                total_tokens: Some(40),
            }),
            ..Default::default()
        };
        let attrs = resp.attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["model"], "pixtral-12b-2409");
        assert_eq!(attrs["total_tokens"], "40");
        assert!(!attrs.contains_key("completion_tokens"));
        assert!(!attrs.contains_key("text"));
    }

    #[test]
    fn text_length_counts_characters() {
        let record = DocumentRecord {
            filename: "a.png".to_string(),
            timestamp: "2024-01-01 00:00:00".to_string(),
            raw_text: "Näme".to_string(),
            category: Category::General,
            extracted_fields: BTreeMap::new(),
            summary: None,
            key_value_narrative: None,
        };
        assert_eq!(record.text_length(), 4);
    }
}
