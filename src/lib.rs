//! Extract GPS tracks from GoPro GPMF telemetry.
//!
//! ```no_run
//! use gopro_track_rs::{export, gpmf, reconstruct, ReconstructOptions};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let bytes = gpmf::load(Path::new("GX010001.MP4"), false, &gpmf::ToolPaths::default())?;
//!     let records = gpmf::decode(&bytes)?;
//!     let track = reconstruct(&records, ReconstructOptions::default())?;
//!     export::write_tracks(&track.points, Path::new("GX010001"), "GX010001")?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod export;
pub mod gpmf;
pub mod reconstruct;
pub mod summary;
pub mod types;

pub use error::{DecodeError, ReconstructError, Result, TrackError};
pub use reconstruct::{reconstruct, ReconstructOptions, Reconstruction, ReconstructionState};
pub use summary::TrackSummary;
pub use types::{DeviceClock, GpsPoint, ScaleVector, Stats};
