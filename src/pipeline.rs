use crate::analyzer::AnalysisGateway;
use crate::classifier::classify;
use crate::error::{GatewayError, ProcessError};
use crate::fields::extract_fields;
use crate::ocr::OcrGateway;
use crate::session::Session;
use crate::text::{image_subtype, normalize_text, post_process_financial_text, validate_file_type};
use crate::types::{Category, DocumentRecord, OcrResponse};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// What one successful upload produced.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub record: DocumentRecord,
    pub ocr: OcrResponse,
    /// Set when the analysis gateway failed; the record is stored without summary or narrative.
    pub analysis_error: Option<String>,
}

/// Reject records missing a required part. Nothing is stored when this fails.
pub fn validate_record(record: &DocumentRecord) -> Result<(), String> {
    if record.filename.trim().is_empty() {
        return Err("missing filename".to_string());
    }
    if record.timestamp.trim().is_empty() {
        return Err("missing timestamp".to_string());
    }
    if record.raw_text.trim().is_empty() {
        return Err("missing extracted text".to_string());
    }
    if record.extracted_fields.values().any(|v| v.is_empty()) {
        return Err("empty extracted field".to_string());
    }
    Ok(())
}

/// Classify, repair and field-extract OCR text; no gateways involved.
pub fn assemble_record(filename: &str, raw_text: &str, timestamp: String) -> DocumentRecord {
    let normalized = normalize_text(raw_text);
    let category = classify(&normalized, filename);
    let text = if category == Category::Financial {
        post_process_financial_text(&normalized)
    } else {
        normalized
    };
    let extracted_fields = extract_fields(&text, category);
    DocumentRecord {
        filename: filename.to_string(),
        timestamp,
        raw_text: text,
        category,
        extracted_fields,
        summary: None,
        key_value_narrative: None,
    }
}

/// Run one upload end to end and append the record to `session`.
///
/// OCR failure, empty text and validation failure leave the session untouched.
/// An analysis failure does not: the record is stored and the error is reported on the outcome.
pub fn process_upload(
    session: &mut Session,
    ocr: &dyn OcrGateway,
    analyzer: &dyn AnalysisGateway,
    filename: &str,
    image: &[u8],
) -> Result<ProcessOutcome, ProcessError> {
    if !validate_file_type(filename) {
        return Err(ProcessError::UnsupportedFile(filename.to_string()));
    }
    let subtype = image_subtype(filename);

    let ocr_response = ocr.extract_text(image, &subtype).map_err(|e| match e {
        GatewayError::EmptyResponse => ProcessError::EmptyText,
        other => ProcessError::Ocr(other),
    })?;
    if normalize_text(&ocr_response.text).is_empty() {
        return Err(ProcessError::EmptyText);
    }

    let mut record = assemble_record(filename, &ocr_response.text, timestamp_now());
    tracing::info!(
        filename,
        category = %record.category,
        fields = record.extracted_fields.len(),
        "document classified"
    );

    let analysis_error = match analyzer.analyze(&record.raw_text, record.category) {
        Ok(analysis) => {
            record.summary = Some(analysis.summary);
            record.key_value_narrative = Some(analysis.key_values);
            None
        }
        Err(e) => {
            tracing::warn!(filename, error = %e, "analysis failed; storing without summary");
            Some(format!("Analysis unavailable: {}", e))
        }
    };

    validate_record(&record).map_err(ProcessError::Invalid)?;

    session.push_document(record.clone());
    Ok(ProcessOutcome {
        record,
        ocr: ocr_response,
        analysis_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayResult;
    use crate::types::Analysis;
    use std::cell::RefCell;

    struct FixedOcr {
        text: &'static str,
        seen_subtype: RefCell<Option<String>>,
    }

    impl FixedOcr {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                seen_subtype: RefCell::new(None),
            }
        }
    }

    impl OcrGateway for FixedOcr {
        fn extract_text(&self, _image: &[u8], subtype: &str) -> GatewayResult<OcrResponse> {
            *self.seen_subtype.borrow_mut() = Some(subtype.to_string());
            Ok(OcrResponse {
                text: self.text.to_string(),
                ..Default::default()
            })
        }
    }

    struct FailingOcr;

    impl OcrGateway for FailingOcr {
        fn extract_text(&self, _: &[u8], _: &str) -> GatewayResult<OcrResponse> {
            Err(GatewayError::Network("Check your internet connection and try again.".to_string()))
        }
    }

    struct StubAnalyzer;

    impl AnalysisGateway for StubAnalyzer {
        fn analyze(&self, _text: &str, category: Category) -> GatewayResult<Analysis> {
            Ok(Analysis {
                summary: format!("A {} form.", category),
                key_values: "Name: x".to_string(),
            })
        }
    }

    struct FailingAnalyzer;

    impl AnalysisGateway for FailingAnalyzer {
        fn analyze(&self, _: &str, _: Category) -> GatewayResult<Analysis> {
            Err(GatewayError::Status {
                status: 401,
                body: "Invalid API key?".to_string(),
            })
        }
    }

    #[test]
    fn medical_upload_is_stored() {
        let mut session = Session::new();
        let ocr = FixedOcr::new("Patient Name: John Doe\nDiagnosis: flu\nHospital visit");
        let outcome =
            process_upload(&mut session, &ocr, &StubAnalyzer, "visit.jpg", b"img").unwrap();
        assert_eq!(ocr.seen_subtype.borrow().as_deref(), Some("jpeg"));
        assert_eq!(outcome.record.category, Category::Medical);
        assert_eq!(outcome.record.extracted_fields["patient_name"], "John Doe");
        assert_eq!(outcome.record.summary.as_deref(), Some("A medical form."));
        assert!(outcome.analysis_error.is_none());
        assert_eq!(session.documents().len(), 1);
    }

    #[test]
    fn unsupported_extension_rejected_before_ocr() {
        let mut session = Session::new();
        let ocr = FixedOcr::new("anything");
        let err = process_upload(&mut session, &ocr, &StubAnalyzer, "notes.txt", b"").unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFile(_)));
        assert!(ocr.seen_subtype.borrow().is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn ocr_failure_stores_nothing() {
        let mut session = Session::new();
        let err = process_upload(&mut session, &FailingOcr, &StubAnalyzer, "a.png", b"").unwrap_err();
        assert!(matches!(err, ProcessError::Ocr(_)));
        assert!(session.is_empty());
    }

    #[test]
    fn blank_text_stores_nothing() {
        let mut session = Session::new();
        let ocr = FixedOcr::new(" \n\0\t ");
        let err = process_upload(&mut session, &ocr, &StubAnalyzer, "a.png", b"").unwrap_err();
        assert!(matches!(err, ProcessError::EmptyText));
        assert!(session.is_empty());
    }

    #[test]
    fn analysis_failure_still_stores_record() {
        let mut session = Session::new();
        let ocr = FixedOcr::new("Invoice number 7\nTotal: 40.00");
        let outcome =
            process_upload(&mut session, &ocr, &FailingAnalyzer, "bill.png", b"").unwrap();
        assert!(outcome.record.summary.is_none());
        assert!(outcome
            .analysis_error
            .unwrap()
            .contains("Request failed (401)"));
        assert_eq!(session.documents().len(), 1);
    }

    #[test]
    fn financial_text_is_repaired_before_extraction() {
        let record = assemble_record(
            "slip.png",
            "Bank deposit slip\nAccount Number: 12345\nTotal Rs. / कुल: Five Hundred\n500",
            "2024-01-01 00:00:00".to_string(),
        );
        assert_eq!(record.category, Category::Financial);
        assert!(!record.raw_text.contains("Five Hundred"));
        assert_eq!(record.extracted_fields["account_number"], "12345");
    }

    #[test]
    fn validation_catches_missing_parts() {
        let mut record = assemble_record("a.png", "Name: Jo", "t".to_string());
        assert!(validate_record(&record).is_ok());
        record.timestamp = " ".to_string();
        assert_eq!(validate_record(&record).unwrap_err(), "missing timestamp");
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[13..14], ":");
    }
}
