//! Per-tag record schemas.
//!
//! Each telemetry tag the reconstructor understands has one entry here naming
//! its record kind and field layout. Supporting a new tag means adding a row
//! to [`SCHEMAS`] and a payload conversion in [`decode_record`].

use log::debug;

use super::{FourCC, KlvEntry, Payload, Record, Value};
use crate::error::DecodeError;

/// Field positions shared by both geo dialects
pub mod field {
    pub const LATITUDE: usize = 0;
    pub const LONGITUDE: usize = 1;
    pub const ALTITUDE: usize = 2;
    /// 2D speed for GPS5, ground speed for GPRI
    pub const SPEED: usize = 3;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Scale,
    Timestamp,
    Fix,
    Geo5,
    SystemClock,
    VendorGeo,
    Accel,
}

impl RecordKind {
    /// Kinds the reconstructor only logs; a malformed one must not abort decoding.
    pub fn is_observed_only(self) -> bool {
        matches!(self, RecordKind::Accel)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TagSchema {
    pub tag: FourCC,
    pub kind: RecordKind,
    pub fields: &'static [&'static str],
    /// Samples must have exactly `fields.len()` elements rather than at least
    pub exact: bool,
}

pub const SCHEMAS: &[TagSchema] = &[
    TagSchema {
        tag: FourCC::SCAL,
        kind: RecordKind::Scale,
        fields: &[],
        exact: false,
    },
    TagSchema {
        tag: FourCC::GPSU,
        kind: RecordKind::Timestamp,
        fields: &["utc"],
        exact: true,
    },
    TagSchema {
        tag: FourCC::GPSF,
        kind: RecordKind::Fix,
        fields: &["fix"],
        exact: false,
    },
    TagSchema {
        tag: FourCC::GPS5,
        kind: RecordKind::Geo5,
        fields: &["latitude", "longitude", "altitude", "speed_2d", "speed_3d"],
        exact: true,
    },
    TagSchema {
        tag: FourCC::SYST,
        kind: RecordKind::SystemClock,
        fields: &["seconds", "milliseconds"],
        exact: false,
    },
    TagSchema {
        tag: FourCC::GPRI,
        kind: RecordKind::VendorGeo,
        fields: &["latitude", "longitude", "altitude", "speed"],
        exact: false,
    },
    TagSchema {
        tag: FourCC::ACCL,
        kind: RecordKind::Accel,
        fields: &["x", "y", "z"],
        exact: false,
    },
];

pub fn schema_for(tag: FourCC) -> Option<&'static TagSchema> {
    SCHEMAS.iter().find(|schema| schema.tag == tag)
}

impl TagSchema {
    fn check_width(&self, actual: usize) -> Result<(), DecodeError> {
        let expected = self.fields.len();
        let ok = if self.exact {
            actual == expected
        } else {
            actual >= expected
        };
        if ok {
            Ok(())
        } else {
            Err(DecodeError::SchemaMismatch {
                tag: self.tag,
                expected,
                actual,
            })
        }
    }

    /// Copy the leading schema fields of a row into a fixed-size sample.
    fn sample<const N: usize>(&self, row: &[f64]) -> Result<[f64; N], DecodeError> {
        self.check_width(row.len())?;
        let mut sample = [0.0; N];
        sample.copy_from_slice(&row[..N]);
        Ok(sample)
    }

    fn numbers<'a>(&self, value: &'a Value) -> Result<&'a [Vec<f64>], DecodeError> {
        value.rows().ok_or(DecodeError::UnexpectedPayload {
            tag: self.tag,
            expected: "numeric",
        })
    }
}

/// Convert a decoded KLV leaf into a typed record, validating its layout.
///
/// Layout errors are fatal for the tags that feed the track. Observed-only
/// tags that fail validation pass through as [`Payload::Other`].
pub fn decode_record(entry: &KlvEntry) -> Result<Record, DecodeError> {
    let tag = entry.header.key;
    let Some(schema) = schema_for(tag) else {
        return Ok(Record::new(tag, Payload::Other(entry.value.clone())));
    };

    let payload = match typed_payload(schema, entry) {
        Ok(payload) => payload,
        Err(e) if schema.kind.is_observed_only() => {
            debug!("{} at {}: {}, kept untyped", tag, entry.offset, e);
            Payload::Other(entry.value.clone())
        }
        Err(e) => return Err(e),
    };

    Ok(Record::new(tag, payload))
}

fn typed_payload(schema: &TagSchema, entry: &KlvEntry) -> Result<Payload, DecodeError> {
    let tag = schema.tag;
    let payload = match schema.kind {
        RecordKind::Scale => Payload::Scale(flatten(schema, &entry.value)?),
        RecordKind::Timestamp => {
            let text = entry
                .value
                .first_text()
                .ok_or(DecodeError::UnexpectedPayload {
                    tag,
                    expected: "UTC date",
                })?;
            Payload::Timestamp(text.to_string())
        }
        RecordKind::Fix => {
            let values = flatten(schema, &entry.value)?;
            schema.check_width(values.len())?;
            Payload::Fix(values[0].max(0.0) as u32)
        }
        RecordKind::Geo5 => Payload::Geo5(
            schema
                .numbers(&entry.value)?
                .iter()
                .map(|row| schema.sample::<5>(row))
                .collect::<Result<_, _>>()?,
        ),
        RecordKind::SystemClock => {
            // SYST may arrive as one 2-field row or as two 1-field rows
            let values = flatten(schema, &entry.value)?;
            Payload::SystemClock(schema.sample::<2>(&values)?)
        }
        RecordKind::VendorGeo => {
            let rows = schema.numbers(&entry.value)?;
            let first = rows.first().ok_or(DecodeError::SchemaMismatch {
                tag,
                expected: schema.fields.len(),
                actual: 0,
            })?;
            if rows.len() > 1 {
                debug!("{}: using first of {} samples", tag, rows.len());
            }
            Payload::VendorGeo(schema.sample::<4>(first)?)
        }
        RecordKind::Accel => Payload::Accel(
            schema
                .numbers(&entry.value)?
                .iter()
                .map(|row| schema.sample::<3>(row))
                .collect::<Result<_, _>>()?,
        ),
    };

    Ok(payload)
}

fn flatten(schema: &TagSchema, value: &Value) -> Result<Vec<f64>, DecodeError> {
    value.flatten().ok_or(DecodeError::UnexpectedPayload {
        tag: schema.tag,
        expected: "numeric",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpmf::klv::{klv, parse_entries};

    fn decode_one(bytes: &[u8]) -> Result<Record, DecodeError> {
        let entries = parse_entries(bytes).unwrap();
        decode_record(&entries[0])
    }

    fn be_i32s(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn test_every_schema_tag_is_unique() {
        for (i, a) in SCHEMAS.iter().enumerate() {
            for b in &SCHEMAS[i + 1..] {
                assert_ne!(a.tag, b.tag);
            }
        }
    }

    #[test]
    fn test_geo5_block() {
        let data = be_i32s(&[
            400_000_000, -1_200_000_000, 150_000, 1_000, 1_100, 400_000_010, -1_200_000_010,
            150_100, 1_010, 1_110,
        ]);
        let record = decode_one(&klv(b"GPS5", b'l', 20, 2, &data)).unwrap();
        assert_eq!(record.tag, FourCC::GPS5);
        match record.payload {
            Payload::Geo5(samples) => {
                assert_eq!(samples.len(), 2);
                assert_eq!(samples[0][field::LATITUDE], 400_000_000.0);
                assert_eq!(samples[1][field::SPEED], 1_010.0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_geo5_wrong_width_rejected() {
        let record = decode_one(&klv(b"GPS5", b'l', 16, 1, &be_i32s(&[1, 2, 3, 4])));
        assert_eq!(
            record,
            Err(DecodeError::SchemaMismatch {
                tag: FourCC::GPS5,
                expected: 5,
                actual: 4,
            })
        );
    }

    #[test]
    fn test_scale_flattens_rows() {
        let data = be_i32s(&[10_000_000, 10_000_000, 1_000, 1_000, 100]);
        let record = decode_one(&klv(b"SCAL", b'l', 4, 5, &data)).unwrap();
        assert_eq!(
            record.payload,
            Payload::Scale(vec![10_000_000.0, 10_000_000.0, 1_000.0, 1_000.0, 100.0])
        );
    }

    #[test]
    fn test_fix_and_timestamp() {
        let fix = decode_one(&klv(b"GPSF", b'L', 4, 1, &3u32.to_be_bytes())).unwrap();
        assert_eq!(fix.payload, Payload::Fix(3));

        let time = decode_one(&klv(b"GPSU", b'U', 16, 1, b"190217103201.500")).unwrap();
        assert_eq!(time.payload, Payload::Timestamp("190217103201.500".to_string()));
    }

    #[test]
    fn test_timestamp_must_be_text() {
        let record = decode_one(&klv(b"GPSU", b'L', 4, 1, &1u32.to_be_bytes()));
        assert!(matches!(
            record,
            Err(DecodeError::UnexpectedPayload { expected: "UTC date", .. })
        ));
    }

    #[test]
    fn test_system_clock_from_single_column_rows() {
        let data: Vec<u8> = [1_000u64, 2_000u64].iter().flat_map(|v| v.to_be_bytes()).collect();
        let record = decode_one(&klv(b"SYST", b'J', 8, 2, &data)).unwrap();
        assert_eq!(record.payload, Payload::SystemClock([1_000.0, 2_000.0]));
    }

    #[test]
    fn test_vendor_geo_ignores_trailing_fields() {
        let data = be_i32s(&[1, 2, 3, 4, 5, 6]);
        let record = decode_one(&klv(b"GPRI", b'l', 24, 1, &data)).unwrap();
        assert_eq!(record.payload, Payload::VendorGeo([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn test_narrow_accel_kept_untyped() {
        let data: Vec<u8> = [1i16, 2, 3, 4].iter().flat_map(|v| v.to_be_bytes()).collect();
        let record = decode_one(&klv(b"ACCL", b's', 4, 2, &data)).unwrap();
        assert_eq!(record.tag, FourCC::ACCL);
        assert_eq!(
            record.payload,
            Payload::Other(Value::Numbers(vec![vec![1.0, 2.0], vec![3.0, 4.0]]))
        );
    }

    #[test]
    fn test_narrow_vendor_geo_is_fatal() {
        let record = decode_one(&klv(b"GPRI", b'l', 8, 1, &be_i32s(&[1, 2])));
        assert_eq!(
            record,
            Err(DecodeError::SchemaMismatch {
                tag: FourCC::GPRI,
                expected: 4,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let record = decode_one(&klv(b"TMPC", b'f', 4, 1, &21.5f32.to_be_bytes())).unwrap();
        assert_eq!(record.tag, FourCC(*b"TMPC"));
        assert!(matches!(record.payload, Payload::Other(Value::Numbers(_))));
    }
}
