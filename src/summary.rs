use chrono::{DateTime, Utc};
use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::types::GpsPoint;

/// Track-level figures for the CLI report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub points: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub max_speed: f64,
}

impl TrackSummary {
    pub fn from_points(points: &[GpsPoint]) -> Self {
        let start = points.first().map(|p| p.timestamp);
        let end = points.last().map(|p| p.timestamp);
        let duration_seconds = match (start, end) {
            (Some(start), Some(end)) => {
                end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        };

        let distance_meters = points
            .windows(2)
            .map(|pair| {
                let a = Point::new(pair[0].longitude, pair[0].latitude);
                let b = Point::new(pair[1].longitude, pair[1].latitude);
                a.haversine_distance(&b)
            })
            .sum();

        let max_speed = points.iter().map(|p| p.speed).fold(0.0_f64, f64::max);

        Self {
            points: points.len(),
            start,
            end,
            duration_seconds,
            distance_meters,
            max_speed,
        }
    }

    pub fn max_speed_kmh(&self) -> f64 {
        self.max_speed * 3.6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_empty_track() {
        let summary = TrackSummary::from_points(&[]);
        assert_eq!(summary.points, 0);
        assert_eq!(summary.start, None);
        assert_eq!(summary.duration_seconds, 0.0);
        assert_eq!(summary.distance_meters, 0.0);
    }

    #[test]
    fn test_distance_and_duration() {
        let t0 = Utc.with_ymd_and_hms(2019, 2, 17, 10, 32, 1).unwrap();
        let points = vec![
            GpsPoint::new(0.0, 0.0, 0.0, t0, 4.0),
            GpsPoint::new(0.5, 0.0, 0.0, t0 + Duration::milliseconds(1500), 10.0),
            GpsPoint::new(1.0, 0.0, 0.0, t0 + Duration::seconds(3), 6.0),
        ];

        let summary = TrackSummary::from_points(&points);
        assert_eq!(summary.points, 3);
        assert_relative_eq!(summary.duration_seconds, 3.0);
        // one degree of latitude on the mean-radius sphere
        assert_relative_eq!(summary.distance_meters, 111_195.0, max_relative = 1e-3);
        assert_relative_eq!(summary.max_speed, 10.0);
        assert_relative_eq!(summary.max_speed_kmh(), 36.0);
    }
}
