use thiserror::Error;

/// Failure talking to a hosted model (OCR, analysis or chat).
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0} not set in .env")]
    MissingKey(&'static str),

    #[error("{0}")]
    Network(String),

    #[error("Request failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("The model returned an empty response.")]
    EmptyResponse,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of the SQLite session store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Could not serialize record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not create data folder: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reasons an upload is not stored.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported file type '{0}'. Supported: jpg, jpeg, png, pdf.")]
    UnsupportedFile(String),

    #[error("Could not read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to extract text: {0}")]
    Ocr(#[source] GatewayError),

    #[error("No text could be extracted from the image.")]
    EmptyText,

    #[error("Document validation failed: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure writing or reading an export file.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid export JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("{0}")]
    Path(String),
}

pub type ExportResult<T> = Result<T, ExportError>;
