use thiserror::Error;

#[derive(Debug, Error)]
pub enum TleError {
    #[error("malformed TLE line {line}: {reason}")]
    Malformed { line: u8, reason: String },
    #[error("checksum mismatch on TLE line {line}: expected {expected}, found {found}")]
    Checksum { line: u8, expected: u8, found: char },
    #[error("epoch parse error: {0}")]
    EpochParse(String),
    #[error("invalid orbital elements: {0}")]
    Elements(String),
    #[error("TLE file read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLE JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TleError {
    pub(crate) fn malformed(line: u8, reason: impl Into<String>) -> Self {
        TleError::Malformed {
            line,
            reason: reason.into(),
        }
    }

    /// True for structural/checksum failures, false for numeric field failures.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TleError::Malformed { .. } | TleError::Checksum { .. })
    }
}
