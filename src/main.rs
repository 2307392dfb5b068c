use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use serde::Serialize;

use gopro_track_rs::gpmf::{self, ToolPaths};
use gopro_track_rs::{export, reconstruct, ReconstructOptions, Stats, TrackError, TrackSummary};

#[derive(Parser, Debug)]
#[command(name = "gopro2gpx")]
#[command(about = "Extract the GPS track from GoPro telemetry into KML and GPX", long_about = None)]
struct Args {
    /// Increase output verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Read data from a GPMF binary dump (.bin or .bin.gz) instead of a video
    #[arg(short, long)]
    binary: bool,

    /// Skip bad points (GPS fix 0)
    #[arg(short, long)]
    skip: bool,

    /// Don't restrict to 1 Hz GPS data
    #[arg(short, long)]
    unrestricted: bool,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe executable
    #[arg(long, env = "FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Also write stats and track summary as JSON
    #[arg(long, value_name = "FILE")]
    stats_json: Option<PathBuf>,

    /// Video file or binary metadata dump
    file: PathBuf,

    /// Output path without extension; builds <OUTPUT>.kml and <OUTPUT>.gpx
    output: PathBuf,
}

#[derive(Serialize)]
struct Report<'a> {
    input: String,
    options: ReconstructOptions,
    stats: &'a Stats,
    summary: &'a TrackSummary,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let tools = ToolPaths {
        ffmpeg: args.ffmpeg.clone(),
        ffprobe: args.ffprobe.clone(),
    };
    let bytes = gpmf::load(&args.file, args.binary, &tools)?;
    let records = gpmf::decode(&bytes)?;
    info!("Decoded {} records from {}", records.len(), args.file.display());

    let options = ReconstructOptions {
        skip_bad_fix: args.skip,
        unrestricted: args.unrestricted,
    };
    let track = reconstruct(&records, options)?;
    let summary = TrackSummary::from_points(&track.points);

    print_stats(&track.stats);
    print_summary(&summary);

    if let Some(path) = args.stats_json.as_ref() {
        let report = Report {
            input: args.file.display().to_string(),
            options,
            stats: &track.stats,
            summary: &summary,
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Wrote report to {}", path.display());
    }

    let name = args
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());

    match export::write_tracks(&track.points, &args.output, &name) {
        Ok(files) => {
            println!("Wrote {}", files.kml.display());
            println!("Wrote {}", files.gpx.display());
        }
        Err(TrackError::NoData) => {
            println!(
                "Can't create file. No GPS info in {}. Exiting",
                args.file.display()
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_stats(stats: &Stats) {
    println!("-- stats -----------------");
    println!("- Ok:              {:5}", stats.ok);
    println!(
        "- GPSFIX=0 (bad):  {:5} (skipped: {})",
        stats.badfix, stats.badfix_skipped
    );
    println!("- Empty (No data): {:5}", stats.empty);
    println!("- Duplicate times: {:5}", stats.duplicate_time);
    println!("Total points:      {:5}", stats.total());
    println!("--------------------------");
}

fn print_summary(summary: &TrackSummary) {
    if summary.points == 0 {
        return;
    }
    println!("\n=== Track ===");
    println!("Points:    {}", summary.points);
    if let (Some(start), Some(end)) = (summary.start, summary.end) {
        println!("Start:     {}", start.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
        println!("End:       {}", end.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
    }
    println!("Duration:  {:.1} s", summary.duration_seconds);
    println!("Distance:  {:.2} km", summary.distance_meters / 1000.0);
    println!(
        "Max speed: {:.2} m/s ({:.1} km/h)",
        summary.max_speed,
        summary.max_speed_kmh()
    );
}
