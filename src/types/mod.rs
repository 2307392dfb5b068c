use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReconstructError;
use crate::gpmf::FourCC;

/// One reconstructed track point
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// meters
    pub elevation: f64,
    pub timestamp: DateTime<Utc>,
    /// m/s
    pub speed: f64,
}

impl GpsPoint {
    pub fn new(
        latitude: f64,
        longitude: f64,
        elevation: f64,
        timestamp: DateTime<Utc>,
        speed: f64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
            timestamp,
            speed,
        }
    }
}

/// Per-category sample counts for one reconstruction run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub ok: u64,
    pub badfix: u64,
    pub badfix_skipped: u64,
    pub empty: u64,
    pub duplicate_time: u64,
}

impl Stats {
    pub fn total(&self) -> u64 {
        self.ok + self.badfix + self.badfix_skipped + self.empty + self.duplicate_time
    }
}

/// Per-field divisors from the most recent SCAL record
///
/// Field `i` is divided by component `i`. A single component applies to every
/// field; fields past the end of a longer vector are left unscaled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleVector(Vec<f64>);

impl Default for ScaleVector {
    fn default() -> Self {
        Self(vec![1.0, 1.0, 1.0])
    }
}

impl ScaleVector {
    pub fn new(components: Vec<f64>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[f64] {
        &self.0
    }

    fn divisor(&self, field: usize) -> f64 {
        match self.0.as_slice() {
            [uniform] => *uniform,
            components => components.get(field).copied().unwrap_or(1.0),
        }
    }

    /// Divide a raw sample by the scale, element-wise.
    pub fn apply<const N: usize>(
        &self,
        tag: FourCC,
        raw: &[f64; N],
    ) -> Result<[f64; N], ReconstructError> {
        let mut scaled = [0.0; N];
        for (field, (out, value)) in scaled.iter_mut().zip(raw).enumerate() {
            let divisor = self.divisor(field);
            if divisor == 0.0 {
                return Err(ReconstructError::ZeroScale { tag, field });
            }
            *out = value / divisor;
        }
        Ok(scaled)
    }
}

/// Device-relative clock carried by SYST records (vendor dialect)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceClock {
    pub seconds: f64,
    /// Scaled by SCAL into epoch seconds on the devices that emit GPRI
    pub milliseconds: f64,
}

impl DeviceClock {
    /// Both components must be non-zero before the clock can timestamp a sample.
    pub fn is_valid(&self) -> bool {
        self.seconds != 0.0 && self.milliseconds != 0.0
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        epoch_to_datetime(self.milliseconds)
    }
}

/// Convert fractional Unix seconds to a UTC time.
pub fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Timelike;

    #[test]
    fn test_unit_scale_is_identity() {
        let raw = [40.123, -3.5, 612.0];
        let scaled = ScaleVector::default().apply(FourCC::GPS5, &raw).unwrap();
        assert_eq!(scaled, raw);
    }

    #[test]
    fn test_scale_per_field() {
        let scale = ScaleVector::new(vec![10_000_000.0, 10_000_000.0, 1_000.0, 1_000.0, 100.0]);
        let raw = [405_000_000.0, -37_000_000.0, 612_000.0, 5_000.0, 510.0];
        let scaled = scale.apply(FourCC::GPS5, &raw).unwrap();
        assert_relative_eq!(scaled[0], 40.5);
        assert_relative_eq!(scaled[1], -3.7);
        assert_relative_eq!(scaled[2], 612.0);
        assert_relative_eq!(scaled[3], 5.0);
        assert_relative_eq!(scaled[4], 5.1);
    }

    #[test]
    fn test_short_scale_leaves_tail_unscaled() {
        let scale = ScaleVector::new(vec![2.0, 4.0]);
        let scaled = scale.apply(FourCC::GPS5, &[2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
        assert_eq!(scaled, [1.0, 1.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_single_component_scale_is_uniform() {
        let scale = ScaleVector::new(vec![10.0]);
        let scaled = scale.apply(FourCC::SYST, &[100.0, 50.0]).unwrap();
        assert_eq!(scaled, [10.0, 5.0]);
    }

    #[test]
    fn test_zero_scale_component_is_an_error() {
        let scale = ScaleVector::new(vec![1.0, 0.0, 1.0]);
        let err = scale.apply(FourCC::GPRI, &[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::ZeroScale {
                tag: FourCC::GPRI,
                field: 1
            }
        );
    }

    #[test]
    fn test_device_clock_validity() {
        assert!(!DeviceClock::default().is_valid());
        assert!(!DeviceClock {
            seconds: 12.0,
            milliseconds: 0.0
        }
        .is_valid());
        assert!(DeviceClock {
            seconds: 12.0,
            milliseconds: 1_550_000_000.5
        }
        .is_valid());
    }

    #[test]
    fn test_epoch_to_datetime() {
        let t = epoch_to_datetime(1_550_399_521.25).unwrap();
        assert_eq!(t.timestamp(), 1_550_399_521);
        assert_eq!(t.nanosecond(), 250_000_000);
        assert!(epoch_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn test_stats_total() {
        let stats = Stats {
            ok: 3,
            badfix: 2,
            badfix_skipped: 1,
            empty: 4,
            duplicate_time: 1,
        };
        assert_eq!(stats.total(), 11);
    }
}
