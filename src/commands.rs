use crate::analyzer::AnalysisGateway;
use crate::chatbot::{chat_with_data, document_stats, suggest_questions, ChatGateway};
use crate::config::Config;
use crate::db::{Db, SessionSummary};
use crate::export::{export_csv, export_json, export_xlsx, read_json, resolve_export_path, summary_report};
use crate::ocr::OcrGateway;
use crate::error::ProcessError;
use crate::pipeline::{process_upload, ProcessOutcome};
use crate::session::Session;
use crate::text::format_file_size;
use crate::types::DocumentRecord;
use std::fmt::Write as _;
use std::path::Path;

/// What every command needs: the store, configuration and the selected session name.
pub struct AppState {
    pub db: Db,
    pub config: Config,
    pub session: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
    Txt,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Txt => "txt",
        }
    }
}

impl AppState {
    pub fn open(config: Config, session: &str) -> Result<Self, String> {
        let db = Db::new(&config.db_path()).map_err(|e| e.to_string())?;
        Ok(AppState {
            db,
            config,
            session: session.to_string(),
        })
    }

    fn load(&self) -> Result<Session, String> {
        self.db.load_session(&self.session).map_err(|e| e.to_string())
    }
}

/// OCR + analyze one file with the configured gateways.
pub fn process_file(state: &AppState, path: &Path) -> Result<String, String> {
    let ocr = state.config.ocr_gateway().map_err(|e| e.to_string())?;
    let analyzer = state.config.analysis_gateway().map_err(|e| e.to_string())?;
    process_file_with(state, &ocr, &analyzer, path)
}

pub fn process_file_with(
    state: &AppState,
    ocr: &dyn OcrGateway,
    analyzer: &dyn AnalysisGateway,
    path: &Path,
) -> Result<String, String> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| "Invalid path".to_string())?;
    let (outcome, size) = ingest(state, ocr, analyzer, path, filename).map_err(|e| e.to_string())?;

    let record = &outcome.record;
    let mut out = String::new();
    let _ = writeln!(out, "Processed {} ({})", record.filename, format_file_size(size));
    let _ = writeln!(out, "Form type: {}", record.category.title());
    let _ = writeln!(out, "Text length: {} characters", record.text_length());
    for (key, value) in &outcome.ocr.attributes() {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
    write_fields(&mut out, record);
    if let Some(summary) = &record.summary {
        let _ = writeln!(out, "\nSummary:\n{}", summary);
    }
    if let Some(narrative) = &record.key_value_narrative {
        let _ = writeln!(out, "\nKey information:\n{}", narrative);
    }
    if let Some(err) = &outcome.analysis_error {
        let _ = writeln!(out, "\n{}", err);
    }
    Ok(out.trim_end().to_string())
}

/// Read, process and store one file. Returns the outcome and the file size in bytes.
fn ingest(
    state: &AppState,
    ocr: &dyn OcrGateway,
    analyzer: &dyn AnalysisGateway,
    path: &Path,
    filename: &str,
) -> Result<(ProcessOutcome, u64), ProcessError> {
    let image = std::fs::read(path)?;
    let mut session = state.db.load_session(&state.session)?;
    let outcome = process_upload(&mut session, ocr, analyzer, filename, &image)?;
    state.db.add_document(&state.session, &outcome.record)?;
    Ok((outcome, image.len() as u64))
}

fn write_fields(out: &mut String, record: &DocumentRecord) {
    if record.extracted_fields.is_empty() {
        return;
    }
    let _ = writeln!(out, "Extracted fields:");
    for (key, value) in &record.extracted_fields {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
}

pub fn chat(state: &AppState, question: &str) -> Result<String, String> {
    let gateway = state.config.chat_gateway().map_err(|e| e.to_string())?;
    chat_with(state, &gateway, question)
}

/// Answer `question` and persist both new turns.
pub fn chat_with(state: &AppState, gateway: &dyn ChatGateway, question: &str) -> Result<String, String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Question is empty".to_string());
    }
    let mut session = state.load()?;
    let before = session.chat_history().len();
    let reply = chat_with_data(&mut session, gateway, question);
    for turn in &session.chat_history()[before..] {
        state
            .db
            .add_chat_turn(&state.session, turn)
            .map_err(|e| e.to_string())?;
    }
    Ok(reply)
}

pub fn suggest(state: &AppState) -> Result<String, String> {
    let session = state.load()?;
    let questions = suggest_questions(session.documents());
    if questions.is_empty() {
        return Ok("Process some documents to get suggested questions.".to_string());
    }
    Ok(questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn list(state: &AppState) -> Result<String, String> {
    let session = state.load()?;
    if session.is_empty() {
        return Ok("No documents processed yet.".to_string());
    }
    Ok(session
        .documents()
        .iter()
        .enumerate()
        .map(|(i, d)| {
            format!(
                "{}. {} [{}] {} ({} chars)",
                i + 1,
                d.filename,
                d.category,
                d.timestamp,
                d.text_length()
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Show one document by 1-based index; the latest when `index` is None.
pub fn show(state: &AppState, index: Option<usize>) -> Result<String, String> {
    let session = state.load()?;
    let record = match index {
        Some(i) => i
            .checked_sub(1)
            .and_then(|i| session.documents().get(i))
            .ok_or_else(|| format!("No document #{} (have {})", i, session.documents().len()))?,
        None => session
            .latest()
            .ok_or_else(|| "No documents processed yet.".to_string())?,
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", record.filename);
    let _ = writeln!(out, "Type: {}", record.category.title());
    let _ = writeln!(out, "Processed: {}", record.timestamp);
    write_fields(&mut out, record);
    if let Some(summary) = &record.summary {
        let _ = writeln!(out, "Summary: {}", summary);
    }
    if let Some(narrative) = &record.key_value_narrative {
        let _ = writeln!(out, "Key information:\n{}", narrative);
    }
    let _ = writeln!(out, "\n{}", record.raw_text);
    Ok(out.trim_end().to_string())
}

pub fn stats(state: &AppState) -> Result<String, String> {
    let session = state.load()?;
    let Some(stats) = document_stats(session.documents()) else {
        return Ok("No documents processed yet.".to_string());
    };
    let totals = session.stats();
    let mut out = String::new();
    let _ = writeln!(out, "Documents: {}", totals.total_documents);
    let _ = writeln!(out, "Total text: {} characters", totals.total_characters);
    let _ = writeln!(out, "Average text: {} characters", totals.avg_text_length);
    for (category, count) in &stats.form_types {
        let _ = writeln!(out, "  {}: {}", category.title(), count);
    }
    if let Some(doc) = stats.oldest_document {
        let _ = writeln!(out, "Oldest: {} ({})", doc.filename, doc.timestamp);
    }
    if let Some(doc) = stats.latest_document {
        let _ = writeln!(out, "Latest: {} ({})", doc.filename, doc.timestamp);
    }
    let _ = write!(out, "Chat messages: {}", session.chat_history().len());
    Ok(out)
}

pub fn report(state: &AppState) -> Result<String, String> {
    Ok(summary_report(state.load()?.documents()))
}

/// Write the session in `format`; returns the path written.
pub fn export(state: &AppState, format: ExportFormat, out: Option<&str>) -> Result<String, String> {
    let session = state.load()?;
    if session.is_empty() {
        return Err("No documents to export".to_string());
    }
    let path = resolve_export_path(out, "Documents", format.extension()).map_err(|e| e.to_string())?;

    match format {
        ExportFormat::Xlsx => export_xlsx(session.documents(), &path).map_err(|e| e.to_string())?,
        ExportFormat::Json | ExportFormat::Csv | ExportFormat::Txt => {
            let body = match format {
                ExportFormat::Json => export_json(&session),
                ExportFormat::Csv => export_csv(session.documents()),
                _ => Ok(summary_report(session.documents())),
            }
            .map_err(|e| e.to_string())?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&path, body).map_err(|e| e.to_string())?;
        }
    }
    tracing::info!(path = %path.display(), format = format.extension(), "export written");
    Ok(path.display().to_string())
}

/// Re-read a JSON export and print its stats. With `restore`, its documents and chat are added to the session.
pub fn import(state: &AppState, path: &Path, restore: bool) -> Result<String, String> {
    let json = std::fs::read_to_string(path).map_err(|e| format!("Could not read file: {}", e))?;
    let bundle = read_json(&json).map_err(|e| e.to_string())?;
    let stats = bundle.stats();

    let mut out = String::new();
    let _ = writeln!(out, "Exported: {}", bundle.metadata.export_timestamp);
    let _ = writeln!(out, "Documents: {}", stats.total_documents);
    let _ = writeln!(out, "Total text: {} characters", stats.total_characters);
    let _ = writeln!(out, "Average text: {} characters", stats.avg_text_length);
    for (form_type, count) in &stats.form_types {
        let _ = writeln!(out, "  {}: {}", form_type, count);
    }

    if restore {
        let imported = bundle.into_session();
        for record in imported.documents() {
            state
                .db
                .add_document(&state.session, record)
                .map_err(|e| e.to_string())?;
        }
        for turn in imported.chat_history() {
            state
                .db
                .add_chat_turn(&state.session, turn)
                .map_err(|e| e.to_string())?;
        }
        let _ = writeln!(out, "Restored into session '{}'", state.session);
    }
    Ok(out.trim_end().to_string())
}

pub fn clear(state: &AppState) -> Result<String, String> {
    state.db.clear_session(&state.session).map_err(|e| e.to_string())?;
    Ok(format!("Cleared session '{}'", state.session))
}

pub fn clear_chat(state: &AppState) -> Result<String, String> {
    let n = state.db.clear_chat(&state.session).map_err(|e| e.to_string())?;
    Ok(format!("Removed {} chat message(s)", n))
}

pub fn sessions(state: &AppState) -> Result<String, String> {
    let sessions: Vec<SessionSummary> = state.db.list_sessions().map_err(|e| e.to_string())?;
    if sessions.is_empty() {
        return Ok("No sessions yet.".to_string());
    }
    Ok(sessions
        .iter()
        .map(|s| {
            let marker = if s.name == state.session { "*" } else { " " };
            format!("{} {} ({} documents, {} chat messages)", marker, s.name, s.documents, s.chat_messages)
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn status(config: &Config) -> String {
    let mut out = String::new();
    for (provider, state) in config.status() {
        let _ = writeln!(out, "{}: {}", provider, state);
    }
    let _ = writeln!(out, "ocr model: {}", config.ocr_model);
    let _ = write!(out, "chat model: {}", config.chat_model);
    out
}

pub fn get_app_data_path(config: &Config) -> Result<String, String> {
    config
        .data_dir
        .to_str()
        .map(String::from)
        .ok_or_else(|| "Invalid path".to_string())
}

pub fn open_app_data_folder(config: &Config) -> Result<(), String> {
    std::fs::create_dir_all(&config.data_dir).map_err(|e| e.to_string())?;
    opener::open(&config.data_dir).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GatewayError, GatewayResult};
    use crate::types::{Analysis, Category, OcrResponse};

    struct Ocr(&'static str);

    impl OcrGateway for Ocr {
        fn extract_text(&self, _: &[u8], _: &str) -> GatewayResult<OcrResponse> {
            Ok(OcrResponse {
                text: self.0.to_string(),
                model: Some("pixtral-12b-2409".to_string()),
                ..Default::default()
            })
        }
    }

    struct NoAnalysis;

    impl AnalysisGateway for NoAnalysis {
        fn analyze(&self, _: &str, _: Category) -> GatewayResult<Analysis> {
            Err(GatewayError::Network("Network error.".to_string()))
        }
    }

    struct Parrot;

    impl ChatGateway for Parrot {
        fn respond(&self, question: &str, _: &str) -> GatewayResult<String> {
            Ok(format!("you asked: {}", question))
        }
    }

    fn state(dir: &Path) -> AppState {
        let config = Config::from_lookup(|name| {
            (name == "FORM_INTAKE_DATA_DIR").then(|| dir.display().to_string())
        });
        AppState::open(config, "test").unwrap()
    }

    #[test]
    fn process_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let file = dir.path().join("claim.png");
        std::fs::write(&file, b"png").unwrap();

        let out = process_file_with(&st, &Ocr("Insurance claim\nPolicy Number: P-77"), &NoAnalysis, &file).unwrap();
        assert!(out.contains("Form type: Insurance"));
        assert!(out.contains("  model: pixtral-12b-2409"));
        assert!(out.contains("Analysis unavailable: Network error."));

        let again = state(dir.path());
        let listed = list(&again).unwrap();
        assert!(listed.starts_with("1. claim.png [insurance]"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let path = dir.path().join("gone.png");
        let err = ingest(&st, &Ocr("unused"), &NoAnalysis, &path, "gone.png").unwrap_err();
        assert!(matches!(err, ProcessError::Read(_)));
        let msg = process_file_with(&st, &Ocr("unused"), &NoAnalysis, &path).unwrap_err();
        assert!(msg.starts_with("Could not read file:"));
        assert!(st.db.load_session("test").unwrap().is_empty());
    }

    #[test]
    fn stats_use_session_totals() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        for (name, text) in [("a.png", "Invoice number 1\nTotal: 5"), ("b.png", "Invoice number 22\nTotal: 7")] {
            let file = dir.path().join(name);
            std::fs::write(&file, b"x").unwrap();
            process_file_with(&st, &Ocr(text), &NoAnalysis, &file).unwrap();
        }
        let expected = st.db.load_session("test").unwrap().stats();
        let out = stats(&st).unwrap();
        assert!(out.contains("Documents: 2"));
        assert!(out.contains(&format!("Total text: {} characters", expected.total_characters)));
        assert!(out.contains(&format!("Average text: {} characters", expected.avg_text_length)));
        assert!(out.ends_with("Chat messages: 0"));
    }

    #[test]
    fn chat_turns_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let reply = chat_with(&st, &Parrot, "anything?").unwrap();
        assert!(reply.starts_with("I don't have any processed documents"));
        assert_eq!(st.db.load_session("test").unwrap().chat_history().len(), 2);
        assert_eq!(clear_chat(&st).unwrap(), "Removed 2 chat message(s)");
    }

    #[test]
    fn show_rejects_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        assert!(show(&st, None).is_err());
        assert_eq!(show(&st, Some(0)).unwrap_err(), "No document #0 (have 0)");
    }

    #[test]
    fn export_then_import_restores() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let file = dir.path().join("bill.jpg");
        std::fs::write(&file, b"jpg").unwrap();
        process_file_with(&st, &Ocr("Invoice number 9\nTotal: 12.50"), &NoAnalysis, &file).unwrap();

        let out = dir.path().join("out.json");
        let written = export(&st, ExportFormat::Json, out.to_str()).unwrap();
        assert_eq!(Path::new(&written), out);

        let other = AppState {
            session: "copy".to_string(),
            ..state(dir.path())
        };
        let summary = import(&other, &out, true).unwrap();
        assert!(summary.contains("Documents: 1"));
        assert_eq!(other.db.load_session("copy").unwrap().documents().len(), 1);
    }

    #[test]
    fn export_needs_documents() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export(&state(dir.path()), ExportFormat::Csv, Some("x.csv")).is_err());
    }
}
