//! GoPro GPMF telemetry decoding
//!
//! Turns a raw GPMF buffer into the ordered [`Record`] stream consumed by the
//! track reconstructor.

pub mod fourcc;
pub mod klv;
pub mod record;
pub mod schema;
pub mod source;

pub use fourcc::FourCC;
pub use klv::{parse_entries, KlvEntry, KlvHeader, Value};
pub use record::{Payload, Record};
pub use schema::{decode_record, schema_for, RecordKind, TagSchema, SCHEMAS};
pub use source::{load, ToolPaths};

use crate::error::DecodeError;

/// Decode a GPMF buffer into records, preserving file order.
pub fn decode(bytes: &[u8]) -> Result<Vec<Record>, DecodeError> {
    parse_entries(bytes)?.iter().map(decode_record).collect()
}
