use regex::Regex;
use std::sync::LazyLock;

/// Upload suffixes accepted by `process`. Checked on the filename only, never on content.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf"];

/// Lower-cased suffix after the last '.'; empty when the name has no dot.
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .unwrap_or_default()
}

pub fn validate_file_type(filename: &str) -> bool {
    let ext = file_extension(filename);
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// MIME subtype for the data URI sent to the OCR gateway ("jpg" is spelled "jpeg").
pub fn image_subtype(filename: &str) -> String {
    let ext = file_extension(filename);
    if ext == "jpg" {
        "jpeg".to_string()
    } else {
        ext
    }
}

/// Human readable size (e.g. 2048 -> "2.0 KB").
pub fn format_file_size(size_bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if size_bytes < KB {
        format!("{} B", size_bytes)
    } else if size_bytes < MB {
        format!("{:.1} KB", size_bytes as f64 / KB as f64)
    } else if size_bytes < GB {
        format!("{:.1} MB", size_bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", size_bytes as f64 / GB as f64)
    }
}

/// Drop null characters and collapse every whitespace run (newlines included) into one space.
pub fn clean_text(text: &str) -> String {
    text.replace('\0', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize OCR output while keeping its line structure: null characters removed,
/// whitespace runs inside a line collapsed to one space, blank lines dropped.
pub fn normalize_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

static DEPOSITOR_RUPEES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Depositor'?s?\s*Name\s*[/]\s*[^:]*\s*:\s*)(Rupees?\s*[/]\s*[^:]*\s*:)")
        .expect("depositor pattern")
});
static TOTAL_RS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Total\s+Rs\.\s*[/]\s*[^:]*\s*:\s*)([A-Za-z\s]+)").expect("total pattern")
});
static DEPOSITOR_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Depositor'?s?\s*Name[^:]*:)\s*(Rupees?)").expect("inline depositor pattern")
});

/// Repair common OCR mix-ups on bank deposit slips: the "Rupees" label swallowed into the
/// depositor name, and words trailing the "Total Rs." amount label.
pub fn post_process_financial_text(text: &str) -> String {
    let mut processed = text.to_string();

    if let Some(caps) = DEPOSITOR_RUPEES_RE.captures(text) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
        let name_part = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let rupees_part = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        processed = processed.replace(whole, name_part);
        processed.push('\n');
        processed.push_str(rupees_part);
    }

    processed = TOTAL_RS_RE.replace_all(&processed, "${1}").into_owned();
    DEPOSITOR_INLINE_RE
        .replace_all(&processed, "${1}\n${2}")
        .into_owned()
}
