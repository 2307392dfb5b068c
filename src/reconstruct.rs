//! GPS track reconstruction
//!
//! Folds the ordered GPMF record stream into track points. State carried
//! between records (scale, fix quality, GPS clock, device clock) lives in a
//! [`ReconstructionState`] owned by the caller, so independent files never
//! share anything.

use std::borrow::Borrow;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ReconstructError;
use crate::gpmf::schema::field;
use crate::gpmf::{FourCC, Payload, Record};
use crate::types::{DeviceClock, GpsPoint, ScaleVector, Stats};

/// GPSU date layout: `yymmddhhmmss.sss`
const GPSU_FORMAT: &str = "%y%m%d%H%M%S%.f";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructOptions {
    /// Drop samples taken without a GPS lock instead of keeping them
    pub skip_bad_fix: bool,
    /// Keep every sample of a GPS5 block instead of one per second
    pub unrestricted: bool,
}

/// Output of a completed run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub points: Vec<GpsPoint>,
    pub stats: Stats,
}

/// Mutable context for one reconstruction run
#[derive(Debug, Default)]
pub struct ReconstructionState {
    options: ReconstructOptions,
    scale: ScaleVector,
    fix: u32,
    /// Last accepted GPSU time, base for sub-second interpolation
    clock: Option<DateTime<Utc>>,
    /// Set by a duplicate GPSU; drops the next GPS5 block
    suppress_next_block: bool,
    device_clock: DeviceClock,
    points: Vec<GpsPoint>,
    stats: Stats,
}

impl ReconstructionState {
    pub fn new(options: ReconstructOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Consume one record.
    pub fn step(&mut self, record: &Record) -> Result<(), ReconstructError> {
        match &record.payload {
            Payload::Scale(divisors) => {
                self.scale = ScaleVector::new(divisors.clone());
                debug!("Scale set to {:?}", self.scale.components());
            }
            Payload::Timestamp(text) => self.gps_time(record.tag, text)?,
            Payload::Fix(quality) => {
                if *quality != self.fix {
                    info!("GPS fix changed to {} [{}]", quality, fix_label(*quality));
                }
                self.fix = *quality;
            }
            Payload::Geo5(samples) => self.geo_block(record.tag, samples)?,
            Payload::VendorGeo(sample) => self.vendor_sample(record.tag, sample)?,
            Payload::SystemClock(raw) => {
                let [seconds, milliseconds] = self.scale.apply(record.tag, raw)?;
                if seconds != 0.0 && milliseconds != 0.0 {
                    self.device_clock = DeviceClock {
                        seconds,
                        milliseconds,
                    };
                }
            }
            Payload::Accel(samples) => {
                debug!("Accel: {} samples {:?}", samples.len(), samples.first());
            }
            Payload::Other(_) => {}
        }
        Ok(())
    }

    pub fn finish(self) -> Reconstruction {
        Reconstruction {
            points: self.points,
            stats: self.stats,
        }
    }

    fn gps_time(&mut self, tag: FourCC, text: &str) -> Result<(), ReconstructError> {
        let time = parse_gps_time(text).ok_or_else(|| ReconstructError::MalformedTimestamp {
            tag,
            raw: text.to_string(),
        })?;

        if self.clock == Some(time) {
            warn!("Skipping duplicate timestamp {}", time);
            self.stats.duplicate_time += 1;
            self.suppress_next_block = true;
        } else {
            self.clock = Some(time);
            self.suppress_next_block = false;
        }
        Ok(())
    }

    /// Empty-coordinate and fix-quality gates shared by both geo dialects.
    fn admit(&mut self, raw: &[f64]) -> bool {
        let empty = [field::LATITUDE, field::LONGITUDE, field::ALTITUDE]
            .iter()
            .all(|&i| raw[i] == 0.0);
        if empty {
            warn!("Skipping empty point");
            self.stats.empty += 1;
            return false;
        }

        if self.fix == 0 {
            self.stats.badfix += 1;
            if self.options.skip_bad_fix {
                warn!("Skipping point due to GPS fix 0");
                self.stats.badfix_skipped += 1;
                return false;
            }
        }
        true
    }

    fn geo_block(&mut self, tag: FourCC, samples: &[[f64; 5]]) -> Result<(), ReconstructError> {
        if std::mem::take(&mut self.suppress_next_block) {
            debug!("Dropping {} block of {} samples after duplicate timestamp", tag, samples.len());
            return Ok(());
        }
        let Some(base) = self.clock else {
            warn!("{} block of {} samples before any GPS time, dropped", tag, samples.len());
            return Ok(());
        };

        let count = samples.len();
        for (index, raw) in samples.iter().enumerate() {
            if !self.admit(raw) {
                continue;
            }

            let geo = self.scale.apply(tag, raw)?;
            let offset = Duration::nanoseconds((index as f64 / count as f64 * 1e9).round() as i64);
            self.points.push(GpsPoint::new(
                geo[field::LATITUDE],
                geo[field::LONGITUDE],
                geo[field::ALTITUDE],
                base + offset,
                geo[field::SPEED],
            ));
            self.stats.ok += 1;

            if !self.options.unrestricted {
                break;
            }
        }
        Ok(())
    }

    fn vendor_sample(&mut self, tag: FourCC, raw: &[f64; 4]) -> Result<(), ReconstructError> {
        if !self.admit(raw) {
            return Ok(());
        }

        let geo = self.scale.apply(tag, raw)?;
        // samples before the device clock warms up are lost
        if !self.device_clock.is_valid() {
            debug!("{} sample before device clock is valid, dropped", tag);
            return Ok(());
        }
        let Some(timestamp) = self.device_clock.timestamp() else {
            warn!("{} device clock {:?} out of range", tag, self.device_clock);
            return Ok(());
        };

        self.points.push(GpsPoint::new(
            geo[field::LATITUDE],
            geo[field::LONGITUDE],
            geo[field::ALTITUDE],
            timestamp,
            geo[field::SPEED],
        ));
        self.stats.ok += 1;
        Ok(())
    }
}

/// Fold a record stream into a track with fresh state.
pub fn reconstruct<I>(
    records: I,
    options: ReconstructOptions,
) -> Result<Reconstruction, ReconstructError>
where
    I: IntoIterator,
    I::Item: Borrow<Record>,
{
    let mut state = ReconstructionState::new(options);
    for record in records {
        state.step(record.borrow())?;
    }
    Ok(state.finish())
}

/// Whole-second UTC time of a GPSU date.
fn parse_gps_time(text: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), GPSU_FORMAT).ok()?;
    DateTime::from_timestamp(naive.and_utc().timestamp(), 0)
}

pub fn fix_label(quality: u32) -> &'static str {
    match quality {
        0 => "No lock",
        2 => "2D lock",
        3 => "3D lock",
        _ => "Unknown",
    }
}
