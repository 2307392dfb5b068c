use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Result, TrackError};
use crate::types::GpsPoint;

const CREATOR: &str = "gopro2gpx";

/// Named point sequence ready for serialization
#[derive(Debug, Clone, Copy)]
pub struct Track<'a> {
    pub name: &'a str,
    pub points: &'a [GpsPoint],
}

/// Paths written by [`write_tracks`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFiles {
    pub kml: PathBuf,
    pub gpx: PathBuf,
}

impl<'a> Track<'a> {
    pub fn new(name: &'a str, points: &'a [GpsPoint]) -> Self {
        Self { name, points }
    }

    /// GPX 1.1 document with one track segment
    pub fn to_gpx_xml(&self) -> Result<String> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut gpx = BytesStart::new("gpx");
        gpx.push_attribute(("version", "1.1"));
        gpx.push_attribute(("creator", CREATOR));
        gpx.push_attribute(("xmlns", "http://www.topografix.com/GPX/1/1"));
        w.write_event(Event::Start(gpx))?;

        w.write_event(Event::Start(BytesStart::new("metadata")))?;
        text_element(&mut w, "name", self.name)?;
        if let Some(first) = self.points.first() {
            text_element(&mut w, "time", &format_time(&first.timestamp))?;
        }
        w.write_event(Event::End(BytesEnd::new("metadata")))?;

        w.write_event(Event::Start(BytesStart::new("trk")))?;
        text_element(&mut w, "name", self.name)?;
        w.write_event(Event::Start(BytesStart::new("trkseg")))?;

        for p in self.points {
            let mut trkpt = BytesStart::new("trkpt");
            trkpt.push_attribute(("lat", p.latitude.to_string().as_str()));
            trkpt.push_attribute(("lon", p.longitude.to_string().as_str()));
            w.write_event(Event::Start(trkpt))?;
            text_element(&mut w, "ele", &p.elevation.to_string())?;
            text_element(&mut w, "time", &format_time(&p.timestamp))?;
            w.write_event(Event::Start(BytesStart::new("extensions")))?;
            text_element(&mut w, "speed", &p.speed.to_string())?;
            w.write_event(Event::End(BytesEnd::new("extensions")))?;
            w.write_event(Event::End(BytesEnd::new("trkpt")))?;
        }

        w.write_event(Event::End(BytesEnd::new("trkseg")))?;
        w.write_event(Event::End(BytesEnd::new("trk")))?;
        w.write_event(Event::End(BytesEnd::new("gpx")))?;

        Ok(String::from_utf8_lossy(&w.into_inner()).into_owned())
    }

    /// KML 2.2 document: a timed `gx:Track` plus a plain `LineString`
    pub fn to_kml_xml(&self) -> Result<String> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut kml = BytesStart::new("kml");
        kml.push_attribute(("xmlns", "http://www.opengis.net/kml/2.2"));
        kml.push_attribute(("xmlns:gx", "http://www.google.com/kml/ext/2.2"));
        w.write_event(Event::Start(kml))?;
        w.write_event(Event::Start(BytesStart::new("Document")))?;
        text_element(&mut w, "name", self.name)?;

        w.write_event(Event::Start(BytesStart::new("Placemark")))?;
        text_element(&mut w, "name", self.name)?;
        w.write_event(Event::Start(BytesStart::new("gx:Track")))?;
        text_element(&mut w, "altitudeMode", "absolute")?;
        for p in self.points {
            text_element(&mut w, "when", &format_time(&p.timestamp))?;
        }
        for p in self.points {
            let coord = format!("{} {} {}", p.longitude, p.latitude, p.elevation);
            text_element(&mut w, "gx:coord", &coord)?;
        }
        w.write_event(Event::End(BytesEnd::new("gx:Track")))?;
        w.write_event(Event::End(BytesEnd::new("Placemark")))?;

        w.write_event(Event::Start(BytesStart::new("Placemark")))?;
        text_element(&mut w, "name", &format!("{} path", self.name))?;
        w.write_event(Event::Start(BytesStart::new("LineString")))?;
        text_element(&mut w, "tessellate", "1")?;
        text_element(&mut w, "altitudeMode", "absolute")?;
        let coordinates = self
            .points
            .iter()
            .map(|p| format!("{},{},{}", p.longitude, p.latitude, p.elevation))
            .collect::<Vec<_>>()
            .join(" ");
        text_element(&mut w, "coordinates", &coordinates)?;
        w.write_event(Event::End(BytesEnd::new("LineString")))?;
        w.write_event(Event::End(BytesEnd::new("Placemark")))?;

        w.write_event(Event::End(BytesEnd::new("Document")))?;
        w.write_event(Event::End(BytesEnd::new("kml")))?;

        Ok(String::from_utf8_lossy(&w.into_inner()).into_owned())
    }
}

/// Write `<base>.kml` and `<base>.gpx`.
///
/// Refuses to write anything for an empty track.
pub fn write_tracks(points: &[GpsPoint], base: &Path, name: &str) -> Result<TrackFiles> {
    if points.is_empty() {
        return Err(TrackError::NoData);
    }

    let track = Track::new(name, points);
    let files = TrackFiles {
        kml: with_suffix(base, ".kml"),
        gpx: with_suffix(base, ".gpx"),
    };

    fs::write(&files.kml, track.to_kml_xml()?)?;
    fs::write(&files.gpx, track.to_gpx_xml()?)?;
    info!(
        "Wrote {} points to {} and {}",
        points.len(),
        files.kml.display(),
        files.gpx.display()
    );
    Ok(files)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path: OsString = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn points() -> Vec<GpsPoint> {
        let t0 = Utc.with_ymd_and_hms(2019, 2, 17, 10, 32, 1).unwrap();
        vec![
            GpsPoint::new(40.0, -3.5, 612.25, t0, 1.5),
            GpsPoint::new(40.01, -3.51, 615.0, t0 + Duration::milliseconds(500), 2.0),
        ]
    }

    #[test]
    fn test_gpx_generation() {
        let points = points();
        let gpx = Track::new("ride", &points).to_gpx_xml().unwrap();

        assert!(gpx.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(gpx.contains("<gpx version=\"1.1\" creator=\"gopro2gpx\""));
        assert!(gpx.contains("<trkpt lat=\"40\" lon=\"-3.5\">"));
        assert!(gpx.contains("<trkpt lat=\"40.01\" lon=\"-3.51\">"));
        assert!(gpx.contains("<ele>612.25</ele>"));
        assert!(gpx.contains("<time>2019-02-17T10:32:01.500Z</time>"));
        assert!(gpx.contains("<speed>1.5</speed>"));
        assert_eq!(gpx.matches("<trkpt ").count(), 2);
    }

    #[test]
    fn test_kml_generation() {
        let points = points();
        let kml = Track::new("ride", &points).to_kml_xml().unwrap();

        assert!(kml.contains("xmlns:gx=\"http://www.google.com/kml/ext/2.2\""));
        assert!(kml.contains("<when>2019-02-17T10:32:01.000Z</when>"));
        assert!(kml.contains("<gx:coord>-3.5 40 612.25</gx:coord>"));
        assert!(kml.contains("<coordinates>-3.5,40,612.25 -3.51,40.01,615</coordinates>"));
    }

    #[test]
    fn test_track_name_is_escaped() {
        let points = points();
        let gpx = Track::new("Tom & <Jerry>", &points).to_gpx_xml().unwrap();
        assert!(gpx.contains("<name>Tom &amp; &lt;Jerry&gt;</name>"));
    }

    #[test]
    fn test_write_tracks_creates_both_files() {
        let dir = std::env::temp_dir().join(format!("gopro_track_rs_export_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let base = dir.join("GX010001");

        let files = write_tracks(&points(), &base, "GX010001").unwrap();
        assert_eq!(files.kml, dir.join("GX010001.kml"));
        assert_eq!(files.gpx, dir.join("GX010001.gpx"));
        assert!(fs::read_to_string(&files.gpx).unwrap().contains("<trkseg>"));
        assert!(fs::read_to_string(&files.kml).unwrap().contains("<LineString>"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_track_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("gopro_track_rs_empty_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let base = dir.join("empty");

        assert!(matches!(
            write_tracks(&[], &base, "empty"),
            Err(TrackError::NoData)
        ));
        assert!(!dir.join("empty.kml").exists());
        assert!(!dir.join("empty.gpx").exists());

        fs::remove_dir_all(&dir).ok();
    }
}
