use crate::error::{ExportError, ExportResult};
use crate::pipeline::timestamp_now;
use crate::session::{processing_stats, Session};
use crate::text::{clean_text, truncate_chars};
use crate::types::{Category, ChatTurn, DocumentRecord, ProcessingStats};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_timestamp: String,
    pub total_documents: usize,
    pub total_chat_messages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportAnalysis {
    pub summary: String,
    #[serde(default)]
    pub completeness_score: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub filename: String,
    pub timestamp: String,
    pub form_type: String,
    pub extracted_text: String,
    pub text_length: usize,
    pub key_fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ExportAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub form_types: BTreeMap<String, usize>,
    pub processing_dates: Vec<String>,
}

/// JSON export of a whole session. Unversioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub metadata: ExportMetadata,
    pub documents: Vec<ExportDocument>,
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub summary: ExportSummary,
}

impl ExportBundle {
    pub fn from_session(session: &Session) -> Self {
        let mut summary = ExportSummary::default();
        let documents = session
            .documents()
            .iter()
            .map(|doc| {
                *summary
                    .form_types
                    .entry(doc.category.as_str().to_string())
                    .or_insert(0) += 1;
                summary.processing_dates.push(doc.timestamp.clone());
                ExportDocument {
                    filename: doc.filename.clone(),
                    timestamp: doc.timestamp.clone(),
                    form_type: doc.category.as_str().to_string(),
                    extracted_text: doc.raw_text.clone(),
                    text_length: doc.text_length(),
                    key_fields: doc.extracted_fields.clone(),
                    analysis: doc.summary.as_ref().map(|s| ExportAnalysis {
                        summary: s.clone(),
                        completeness_score: doc.key_value_narrative.clone().unwrap_or_default(),
                    }),
                }
            })
            .collect();

        ExportBundle {
            metadata: ExportMetadata {
                export_timestamp: timestamp_now(),
                total_documents: session.documents().len(),
                total_chat_messages: session.chat_history().len(),
            },
            documents,
            chat_history: session.chat_history().to_vec(),
            summary,
        }
    }

    /// Stats recomputed from the exported documents themselves (text is re-measured, not trusted).
    pub fn stats(&self) -> ProcessingStats {
        processing_stats(self.documents.iter().map(|d| {
            (
                d.form_type.as_str(),
                d.extracted_text.chars().count(),
                d.timestamp.as_str(),
            )
        }))
    }

    /// Rebuild document records from the export. Chat history is carried over as is.
    pub fn into_session(self) -> Session {
        let documents = self
            .documents
            .into_iter()
            .map(|d| DocumentRecord {
                category: Category::from_name(&d.form_type),
                filename: d.filename,
                timestamp: d.timestamp,
                raw_text: d.extracted_text,
                extracted_fields: d.key_fields,
                summary: d.analysis.as_ref().map(|a| a.summary.clone()),
                key_value_narrative: d
                    .analysis
                    .map(|a| a.completeness_score)
                    .filter(|s| !s.is_empty()),
            })
            .collect();
        Session::from_parts(documents, self.chat_history)
    }
}

pub fn export_json(session: &Session) -> ExportResult<String> {
    Ok(serde_json::to_string_pretty(&ExportBundle::from_session(session))?)
}

pub fn read_json(json: &str) -> ExportResult<ExportBundle> {
    Ok(serde_json::from_str(json)?)
}

/// Key fields flattened into one cell: "k: v; k: v".
fn joined_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

const TABLE_HEADERS: &[&str] = &[
    "filename",
    "timestamp",
    "form_type",
    "text_length",
    "summary",
    "key_fields",
];

/// One flat row per document, shared by the CSV and XLSX exports.
fn table_rows(records: &[DocumentRecord]) -> Vec<[String; 6]> {
    records
        .iter()
        .map(|doc| {
            [
                doc.filename.clone(),
                doc.timestamp.clone(),
                doc.category.as_str().to_string(),
                doc.text_length().to_string(),
                doc.summary.as_deref().map(clean_text).unwrap_or_default(),
                joined_fields(&doc.extracted_fields),
            ]
        })
        .collect()
}

pub fn export_csv(records: &[DocumentRecord]) -> ExportResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TABLE_HEADERS)?;
    for row in table_rows(records) {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Path(e.to_string()))
}

/// Plain-text processing report.
pub fn summary_report(records: &[DocumentRecord]) -> String {
    if records.is_empty() {
        return "No documents have been processed yet.".to_string();
    }

    let rule = "=".repeat(50);
    let mut report = String::from("PROCESSING SUMMARY REPORT\n");
    report.push_str(&rule);
    report.push_str("\n\n");
    report.push_str(&format!("Total Documents Processed: {}\n", records.len()));
    report.push_str(&format!("Report Generated: {}\n\n", timestamp_now()));

    let mut form_types: BTreeMap<Category, usize> = BTreeMap::new();
    for doc in records {
        *form_types.entry(doc.category).or_insert(0) += 1;
    }
    report.push_str("Document Types:\n");
    for (category, count) in &form_types {
        report.push_str(&format!("  - {}: {} document(s)\n", category.title(), count));
    }

    report.push('\n');
    report.push_str(&rule);
    report.push_str("\n\nINDIVIDUAL DOCUMENTS:\n\n");
    for (i, doc) in records.iter().enumerate() {
        report.push_str(&format!("{}. {}\n", i + 1, doc.filename));
        report.push_str(&format!("   Type: {}\n", doc.category.title()));
        report.push_str(&format!("   Processed: {}\n", doc.timestamp));
        report.push_str(&format!("   Text Length: {} characters\n", doc.text_length()));
        if let Some(summary) = &doc.summary {
            let preview = if summary.chars().count() > 100 {
                format!("{}...", truncate_chars(summary, 100))
            } else {
                summary.clone()
            };
            report.push_str(&format!("   Summary: {}\n", preview));
        }
        report.push('\n');
    }

    report.push_str(&rule);
    report.push_str("\nEnd of Report");
    report
}

/// Remove characters that corrupt worksheet XML. Tab, newline and CR are kept.
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Estimate column width from text length (char count × 1.2, clamped 10–50).
fn estimate_text_width(text: &str) -> f64 {
    let w = text.chars().count() as f64 * 1.2;
    w.clamp(10.0, 50.0)
}

fn column_widths(rows: &[[String; 6]]) -> Vec<f64> {
    let mut widths: Vec<f64> = TABLE_HEADERS.iter().map(|h| estimate_text_width(h)).collect();
    for row in rows {
        for (col, value) in row.iter().enumerate() {
            widths[col] = widths[col].max(estimate_text_width(value));
        }
    }
    widths
}

fn write_rows(worksheet: &mut Worksheet, rows: &[[String; 6]]) -> Result<(), XlsxError> {
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x2563EB))
        .set_font_color(Color::RGB(0xFFFFFF));
    let text_format = Format::new().set_text_wrap();
    let number_format = Format::new().set_align(FormatAlign::Right);

    for (col, &w) in column_widths(rows).iter().enumerate() {
        worksheet.set_column_width(col as u16, w)?;
    }
    for (col, header) in TABLE_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let r = (row_idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            if TABLE_HEADERS[col] == "text_length" {
                let n: f64 = value.parse().unwrap_or(0.0);
                worksheet.write_number_with_format(r, col as u16, n, &number_format)?;
            } else {
                worksheet.write_string_with_format(r, col as u16, sanitize_cell(value), &text_format)?;
            }
        }
        let longest = row.iter().map(|v| v.chars().count()).max().unwrap_or(0);
        let height = if longest > 80 {
            ((longest as f64 / 50.0).ceil() * 15.0).min(100.0)
        } else if longest > 40 {
            30.0
        } else {
            15.0
        };
        worksheet.set_row_height(r, height)?;
    }

    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// `path` with the given extension, or a fresh timestamped name in Downloads (Desktop as fallback).
pub fn resolve_export_path(path_override: Option<&str>, stem: &str, ext: &str) -> ExportResult<PathBuf> {
    if let Some(p) = path_override.map(str::trim).filter(|p| !p.is_empty()) {
        let mut pb = PathBuf::from(p);
        if pb.extension().and_then(|e| e.to_str()) != Some(ext) {
            pb.set_extension(ext);
        }
        return Ok(pb);
    }

    let dir = dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .ok_or_else(|| ExportError::Path("Could not find Downloads or Desktop folder.".to_string()))?;
    Ok(unique_path(&dir, stem, ext, &chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()))
}

fn unique_path(dir: &Path, stem: &str, ext: &str, stamp: &str) -> PathBuf {
    let mut p = dir.join(format!("{}_{}.{}", stem, stamp, ext));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!("{}_{}_{}.{}", stem, stamp, counter, ext));
        counter += 1;
    }
    p
}

/// Write the document table to a new workbook at `path`.
pub fn export_xlsx(records: &[DocumentRecord], path: &Path) -> ExportResult<()> {
    let rows = table_rows(records);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Documents")?;
    write_rows(worksheet, &rows)?;
    workbook.save(path)?;
    tracing::info!(path = %path.display(), documents = records.len(), "workbook written");
    Ok(())
}
