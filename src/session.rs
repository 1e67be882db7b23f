use crate::types::{ChatTurn, DocumentRecord, ProcessingStats};
use std::collections::BTreeMap;

/// Everything one user has processed and asked: ordered documents and chat turns.
///
/// Owned by the caller and passed to whatever needs it. Items are only ever appended;
/// the only removal is clearing a whole sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    documents: Vec<DocumentRecord>,
    chat_history: Vec<ChatTurn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from stored sequences, keeping their order.
    pub fn from_parts(documents: Vec<DocumentRecord>, chat_history: Vec<ChatTurn>) -> Self {
        Self {
            documents,
            chat_history,
        }
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn chat_history(&self) -> &[ChatTurn] {
        &self.chat_history
    }

    pub fn latest(&self) -> Option<&DocumentRecord> {
        self.documents.last()
    }

    pub fn push_document(&mut self, record: DocumentRecord) -> &DocumentRecord {
        self.documents.push(record);
        &self.documents[self.documents.len() - 1]
    }

    pub fn push_chat(&mut self, turn: ChatTurn) {
        self.chat_history.push(turn);
    }

    /// Drop all documents and the chat history.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.chat_history.clear();
    }

    pub fn clear_chat(&mut self) {
        self.chat_history.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn stats(&self) -> ProcessingStats {
        processing_stats(
            self.documents
                .iter()
                .map(|d| (d.category.as_str(), d.text_length(), d.timestamp.as_str())),
        )
    }
}

/// Aggregate (category, text length, timestamp) triples. Shared by live sessions and re-read exports
/// so both compute identical numbers.
pub fn processing_stats<'a>(docs: impl Iterator<Item = (&'a str, usize, &'a str)>) -> ProcessingStats {
    let mut stats = ProcessingStats::default();
    let mut form_types: BTreeMap<String, usize> = BTreeMap::new();

    for (form_type, text_length, timestamp) in docs {
        stats.total_documents += 1;
        stats.total_characters += text_length;
        *form_types.entry(form_type.to_string()).or_insert(0) += 1;
        stats.processing_dates.push(timestamp.to_string());
    }

    stats.form_types = form_types;
    stats.avg_text_length = if stats.total_documents > 0 {
        stats.total_characters / stats.total_documents
    } else {
        0
    };
    stats
}
