use super::{FourCC, Value};

/// Typed payload of one telemetry record
///
/// Numeric fields are raw (unscaled) device units; the reconstructor divides
/// them by the current scale vector.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// SCAL: one divisor per field
    Scale(Vec<f64>),
    /// GPSU: UTC date text, `yymmddhhmmss.sss`
    Timestamp(String),
    /// GPSF: 0 = no lock, 2 = 2D, 3 = 3D
    Fix(u32),
    /// GPS5 block: latitude, longitude, altitude, 2D speed, 3D speed
    Geo5(Vec<[f64; 5]>),
    /// SYST: device seconds, device milliseconds
    SystemClock([f64; 2]),
    /// GPRI: latitude, longitude, altitude, speed
    VendorGeo([f64; 4]),
    /// ACCL block
    Accel(Vec<[f64; 3]>),
    /// Anything without a schema entry
    Other(Value),
}

/// One tagged telemetry record in file order
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub tag: FourCC,
    pub payload: Payload,
}

impl Record {
    pub fn new(tag: FourCC, payload: Payload) -> Self {
        Self { tag, payload }
    }

    pub fn scale(divisors: &[f64]) -> Self {
        Self::new(FourCC::SCAL, Payload::Scale(divisors.to_vec()))
    }

    pub fn timestamp(text: &str) -> Self {
        Self::new(FourCC::GPSU, Payload::Timestamp(text.to_string()))
    }

    pub fn fix(quality: u32) -> Self {
        Self::new(FourCC::GPSF, Payload::Fix(quality))
    }

    pub fn geo5(samples: Vec<[f64; 5]>) -> Self {
        Self::new(FourCC::GPS5, Payload::Geo5(samples))
    }

    pub fn system_clock(seconds: f64, milliseconds: f64) -> Self {
        Self::new(FourCC::SYST, Payload::SystemClock([seconds, milliseconds]))
    }

    pub fn vendor_geo(sample: [f64; 4]) -> Self {
        Self::new(FourCC::GPRI, Payload::VendorGeo(sample))
    }

    /// Number of samples carried, for diagnostics.
    pub fn sample_count(&self) -> usize {
        match &self.payload {
            Payload::Geo5(samples) => samples.len(),
            Payload::Accel(samples) => samples.len(),
            Payload::Scale(_)
            | Payload::Timestamp(_)
            | Payload::Fix(_)
            | Payload::SystemClock(_)
            | Payload::VendorGeo(_) => 1,
            Payload::Other(_) => 0,
        }
    }
}
