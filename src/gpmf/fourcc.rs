use std::fmt::{self, Debug, Display, Formatter};

/// Four-character GPMF key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const TYPE: FourCC = FourCC(*b"TYPE");
    pub const SCAL: FourCC = FourCC(*b"SCAL");
    pub const GPSU: FourCC = FourCC(*b"GPSU");
    pub const GPSF: FourCC = FourCC(*b"GPSF");
    pub const GPS5: FourCC = FourCC(*b"GPS5");
    pub const SYST: FourCC = FourCC(*b"SYST");
    pub const GPRI: FourCC = FourCC(*b"GPRI");
    pub const ACCL: FourCC = FourCC(*b"ACCL");

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let key: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(FourCC(key))
    }

    /// GPMF keys are printable ASCII; anything else means the parser lost alignment.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "FourCC({})", self.as_str())
    }
}
