use serde::Serialize;

/// Summary of a fully processed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    #[serde(rename = "original_file")]
    pub original_location: String,
    /// Ascending width order. Widths that already had output are absent.
    #[serde(rename = "processed_files")]
    pub processed_locations: Vec<String>,
    pub original_filename: String,
    pub sanitized_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Processed(ProcessingResult),
    SkippedIneligible { key: String },
    SkippedUnsupportedType { extension: String },
    Failed { reason: String },
}

impl Outcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Failed { .. } => 500,
            _ => 200,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// What the handler returns for one trigger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl From<Outcome> for InvocationResponse {
    fn from(outcome: Outcome) -> Self {
        InvocationResponse {
            status_code: outcome.status_code(),
            outcome,
        }
    }
}
