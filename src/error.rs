use thiserror::Error;

use crate::gpmf::FourCC;

/// Errors that abort a reconstruction run.
///
/// Degraded samples (empty coordinates, no fix, duplicate timestamps) are not
/// errors; they are counted in [`crate::types::Stats`] and filtered out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconstructError {
    #[error("Malformed {tag} timestamp: {raw:?}")]
    MalformedTimestamp { tag: FourCC, raw: String },

    #[error("{tag} field {field} divided by a zero scale component")]
    ZeroScale { tag: FourCC, field: usize },
}

/// GPMF decoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Truncated KLV at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid KLV key {key:02x?} at offset {offset}")]
    InvalidKey { key: [u8; 4], offset: usize },

    #[error("{tag}: expected {expected} fields, got {actual}")]
    SchemaMismatch {
        tag: FourCC,
        expected: usize,
        actual: usize,
    },

    #[error("{tag}: expected {expected} payload")]
    UnexpectedPayload { tag: FourCC, expected: &'static str },
}

/// Top-level error type for track extraction
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("No GPS points to write")]
    NoData,

    #[error("No GPMF metadata stream in {0}")]
    NoMetadataStream(String),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for track extraction
pub type Result<T> = std::result::Result<T, TrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors: Vec<TrackError> = vec![
            TrackError::NoData,
            TrackError::NoMetadataStream("GX010001.MP4".to_string()),
            TrackError::ExternalTool {
                tool: "ffmpeg".to_string(),
                message: "not found".to_string(),
            },
            DecodeError::Truncated {
                offset: 8,
                needed: 20,
                available: 4,
            }
            .into(),
            ReconstructError::ZeroScale {
                tag: FourCC::GPS5,
                field: 2,
            }
            .into(),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn test_reconstruct_error_names_tag() {
        let err = ReconstructError::MalformedTimestamp {
            tag: FourCC::GPSU,
            raw: "garbage".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("GPSU"));
        assert!(message.contains("garbage"));
    }
}
