pub mod analyzer;
pub mod chatbot;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod fields;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod session;
pub mod text;
pub mod types;

pub use analyzer::AnalysisGateway;
pub use chatbot::ChatGateway;
pub use classifier::classify;
pub use config::Config;
pub use db::Db;
pub use fields::extract_fields;
pub use ocr::OcrGateway;
pub use pipeline::{process_upload, ProcessOutcome};
pub use session::Session;
pub use types::{Category, ChatRole, ChatTurn, DocumentRecord};
