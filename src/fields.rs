//! Label-based key field extraction.
//!
//! For each field the label variants are tried in order; the first variant present in the
//! text (case-insensitive) yields the rest of its line as the value. Values are not checked
//! for plausibility: a wrong or missing field is the failure mode, never an error.

use crate::types::Category;
use std::collections::BTreeMap;

type FieldPatterns = &'static [(&'static str, &'static [&'static str])];

const MEDICAL_PATTERNS: FieldPatterns = &[
    ("patient_name", &["patient name", "name:", "patient:"]),
    ("date_of_birth", &["dob:", "date of birth", "birth date"]),
    ("diagnosis", &["diagnosis:", "condition:", "icd"]),
    ("medication", &["medication:", "drug:", "prescription:"]),
    ("provider", &["provider:", "doctor:", "physician:"]),
];

const INSURANCE_PATTERNS: FieldPatterns = &[
    ("policy_number", &["policy no", "policy number", "policy #"]),
    ("insured_name", &["insured:", "policyholder:", "name:"]),
    ("coverage", &["coverage:", "benefits:", "limits:"]),
    ("premium", &["premium:", "payment:", "cost:"]),
    ("claim_number", &["claim no", "claim number", "claim #"]),
];

const FINANCIAL_PATTERNS: FieldPatterns = &[
    ("account_number", &["account no", "account number", "acct #"]),
    ("balance", &["balance:", "amount:", "total:"]),
    ("date", &["date:", "as of:", "statement date"]),
    ("transaction", &["transaction:", "payment:", "deposit:"]),
];

const GENERIC_PATTERNS: FieldPatterns = &[
    ("name", &["name:", "full name"]),
    ("date", &["date:", "dated:"]),
    ("amount", &["amount:", "total:", "$"]),
    ("reference", &["ref:", "reference:", "#"]),
];

/// Label table used for `category`. Categories without their own table use the generic one.
pub fn patterns_for(category: Category) -> FieldPatterns {
    match category {
        Category::Medical => MEDICAL_PATTERNS,
        Category::Insurance => INSURANCE_PATTERNS,
        Category::Financial => FINANCIAL_PATTERNS,
        _ => GENERIC_PATTERNS,
    }
}

/// Lower-case `text` and keep, for every byte offset of the result, the byte offset of the
/// originating character in `text`. Needed because lower-casing can change UTF-8 lengths.
fn lowercase_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut lower = String::with_capacity(text.len());
    let mut offsets = Vec::with_capacity(text.len() + 1);
    for (idx, c) in text.char_indices() {
        for lc in c.to_lowercase() {
            lower.push(lc);
            offsets.extend(std::iter::repeat(idx).take(lc.len_utf8()));
        }
    }
    offsets.push(text.len());
    (lower, offsets)
}

/// Keep what follows the last ':' of a raw value, then trim.
fn clean_value(raw: &str) -> &str {
    match raw.rfind(':') {
        Some(pos) => raw[pos + 1..].trim(),
        None => raw.trim(),
    }
}

/// Line remainder after the first occurrence of `label`, cleaned. `None` when the label is absent.
fn value_after_label<'a>(text: &'a str, lower: &str, offsets: &[usize], label: &str) -> Option<&'a str> {
    let start = lower.find(label)?;
    let value_start = offsets[start + label.len()];
    let rest = &text[value_start..];
    let line = match rest.find('\n') {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(clean_value(line))
}

/// Pull key fields for `category` out of OCR text. Never returns empty values.
pub fn extract_fields(text: &str, category: Category) -> BTreeMap<String, String> {
    let (lower, offsets) = lowercase_with_offsets(text);
    let mut fields = BTreeMap::new();

    for (field, labels) in patterns_for(category) {
        for label in labels.iter() {
            match value_after_label(text, &lower, &offsets, label) {
                Some(value) if !value.is_empty() => {
                    fields.insert((*field).to_string(), value.to_string());
                    break;
                }
                _ => continue,
            }
        }
    }

    fields
}
