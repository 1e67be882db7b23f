//! Rule-based form type detection over raw OCR text.
//!
//! Matching is plain substring containment on lower-cased text, not word matching:
//! "pan" matches inside "company", "ins" inside "instructions". Callers get a best-effort
//! label, never an error.

use crate::types::Category;

/// OCR engines emit `![img-N.jpeg](img-N.jpeg)` when a page has pictures but no readable text.
pub const IMAGE_PLACEHOLDER: &str = "![img-";

/// Below this many characters (after trimming) the text is treated as unusable and the filename is consulted.
pub const MIN_TEXT_CHARS: usize = 20;

/// Filename hints, tested in order; the first group with a hit decides.
const FILENAME_HINTS: &[(Category, &[&str])] = &[
    (
        Category::Medical,
        &[
            "med", "health", "patient", "doctor", "rx", "script", "scripus", "prior", "xray",
            "x-ray",
        ],
    ),
    (Category::Insurance, &["ins", "claim", "policy"]),
    (Category::College, &["edu", "school", "college"]),
    (Category::Employment, &["work", "job", "employ"]),
    (Category::Tax, &["tax", "irs"]),
];

/// Keyword table. Order matters: on equal scores the category listed first wins.
pub const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Medical,
        &[
            "medical",
            "patient",
            "diagnosis",
            "health",
            "doctor",
            "hospital",
            "treatment",
            "prescription",
            "pharmacy",
            "medication",
            "authorization",
            "scripius",
            "provider",
            "prior authorization",
            "dosage",
            "xolair",
            "birth",
            "physician",
            "clinic",
            "consultation",
            "healthcare",
            "referral",
            "medical record",
            "symptoms",
        ],
    ),
    (
        Category::Insurance,
        &[
            "insurance",
            "policy",
            "coverage",
            "claim",
            "premium",
            "insurer",
            "policyholder",
            "beneficiary",
            "deductible",
            "underwriter",
            "co-pay",
            "claim number",
            "provider id",
            "authorization number",
            "network",
        ],
    ),
    (
        Category::College,
        &[
            "college",
            "university",
            "school",
            "education",
            "student",
            "admission",
            "academic",
            "course",
            "degree",
            "gpa",
            "transcript",
            "semester",
            "department",
            "roll number",
            "institute",
            "faculty",
            "certificate",
            "marksheet",
        ],
    ),
    (
        Category::Employment,
        &[
            "employment",
            "job",
            "work",
            "salary",
            "employer",
            "employee",
            "position",
            "resume",
            "hiring",
            "application",
            "hr",
            "interview",
            "designation",
            "joining",
            "pay slip",
            "offer letter",
            "experience",
            "department",
            "employee id",
        ],
    ),
    (
        Category::Tax,
        &[
            "tax",
            "income",
            "return",
            "deduction",
            "credit",
            "taxpayer",
            "irs",
            "filing",
            "refund",
            "asset",
            "liability",
            "form 16",
            "tds",
            "gst",
            "assessment",
            "pan",
            "gross income",
            "taxable",
            "section",
        ],
    ),
    (
        Category::Financial,
        &[
            "financial",
            "bank",
            "loan",
            "credit",
            "payment",
            "account",
            "finance",
            "mortgage",
            "investment",
            "statement",
            "transfer",
            "cheque",
            "ifsc",
            "account number",
            "routing",
            "transaction",
            "deposit",
            "withdrawal",
            "branch",
            "balance",
            "passbook",
            "rupees",
            "amount",
            "total",
            "depositor",
        ],
    ),
    (
        Category::Government,
        &[
            "government",
            "official",
            "certificate",
            "id",
            "passport",
            "license",
            "registration",
            "aadhaar",
            "voter",
            "rto",
            "issued by",
            "department",
            "authority",
            "seal",
            "stamp",
            "dob",
            "national",
        ],
    ),
    (
        Category::Invoice,
        &[
            "invoice",
            "receipt",
            "bill",
            "amount",
            "total",
            "paid",
            "due",
            "balance",
            "invoice number",
            "billing",
            "tax",
            "gst",
            "item",
            "vendor",
            "client",
            "quantity",
            "rate",
            "net",
            "subtotal",
        ],
    ),
];

/// Keywords registered for `category`; empty for `General`.
pub fn keywords_for(category: Category) -> &'static [&'static str] {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, kws)| *kws)
        .unwrap_or(&[])
}

/// True when the OCR text carries no usable content of its own.
fn is_unusable_text(text_lower: &str) -> bool {
    text_lower.trim().chars().count() < MIN_TEXT_CHARS || text_lower.contains(IMAGE_PLACEHOLDER)
}

/// Category suggested by the upload's filename, if any hint group matches.
pub fn classify_filename(filename: &str) -> Option<Category> {
    let filename_lower = filename.to_lowercase();
    FILENAME_HINTS
        .iter()
        .find(|(_, hints)| hints.iter().any(|h| filename_lower.contains(h)))
        .map(|(category, _)| *category)
}

/// Number of distinct keywords of `category` present in `text_lower`.
pub fn keyword_score(text_lower: &str, category: Category) -> usize {
    keywords_for(category)
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .count()
}

/// Assign a form type to OCR output. Pure function of its inputs and the static tables.
pub fn classify(text: &str, filename: &str) -> Category {
    let text_lower = text.to_lowercase();

    if is_unusable_text(&text_lower) {
        if let Some(category) = classify_filename(filename) {
            return category;
        }
    }

    let mut best: Option<(Category, usize)> = None;
    for (category, _) in CATEGORY_KEYWORDS {
        let score = keyword_score(&text_lower, *category);
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((*category, score)),
        }
    }

    best.map(|(category, _)| category).unwrap_or(Category::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_general() {
        assert_eq!(classify("", ""), Category::General);
        assert_eq!(classify("   \n  ", "scan.png"), Category::General);
    }

    #[test]
    fn filename_fallback_for_short_text() {
        assert_eq!(classify("", "xray_report.jpg"), Category::Medical);
        assert_eq!(classify("", "patient_intake.png"), Category::Medical);
        assert_eq!(classify("short", "car_claim.jpg"), Category::Insurance);
        assert_eq!(classify("", "school_form.png"), Category::College);
        assert_eq!(classify("", "job_offer.png"), Category::Employment);
        assert_eq!(classify("", "irs_1040.pdf"), Category::Tax);
    }

    #[test]
    fn filename_groups_follow_priority() {
        // "prior" (medical) and "claim" (insurance) both hit; medical is tested first.
        assert_eq!(classify("", "prior_claim.jpg"), Category::Medical);
    }

    #[test]
    fn placeholder_text_uses_filename_even_when_long() {
        let text = "![img-0.jpeg](img-0.jpeg) followed by plenty of other characters";
        assert_eq!(classify(text, "health_form.jpg"), Category::Medical);
    }

    #[test]
    fn short_text_without_filename_hint_falls_through_to_scoring() {
        assert_eq!(classify("invoice", "scan.png"), Category::Invoice);
    }

    #[test]
    fn filename_ignored_when_text_is_usable() {
        let text = "University admission transcript for the semester";
        assert_eq!(classify(text, "medical.jpg"), Category::College);
    }

    #[test]
    fn single_category_match_wins() {
        let text = "This mortgage statement lists the cheque.";
        assert_eq!(keyword_score(&text.to_lowercase(), Category::Financial), 3);
        assert_eq!(classify(text, ""), Category::Financial);
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let text = "premium premium premium premium coverage";
        assert_eq!(keyword_score(text, Category::Insurance), 2);
    }

    #[test]
    fn highest_score_wins() {
        let text = "Patient diagnosis at the hospital; insurance policy attached.";
        assert_eq!(classify(text, ""), Category::Medical);
    }

    #[test]
    fn ties_go_to_earlier_table_entry() {
        // "balance" scores 1 for financial and 1 for invoice; financial is listed first.
        let text = "balance ......................";
        assert_eq!(keyword_score(text, Category::Financial), 1);
        assert_eq!(keyword_score(text, Category::Invoice), 1);
        assert_eq!(classify(text, ""), Category::Financial);
    }

    #[test]
    fn mixed_case_keywords_are_matchable() {
        assert!(keywords_for(Category::Insurance).contains(&"provider id"));
        assert!(keywords_for(Category::General).is_empty());
    }

    #[test]
    fn classification_is_pure() {
        let text = "Salary slip for employee, department of sales";
        assert_eq!(classify(text, "x.png"), classify(text, "x.png"));
    }
}
