use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use gopro_track_rs::gpmf::{self, FourCC, ToolPaths};

#[derive(Parser, Debug)]
#[command(about = "Print the decoded GPMF records of a GoPro video or metadata dump")]
struct Args {
    /// Video file or binary metadata dump
    file: PathBuf,

    /// Input is a GPMF binary dump (.bin or .bin.gz)
    #[arg(short, long)]
    binary: bool,

    /// Only print records with this four character tag (e.g. GPS5)
    #[arg(long)]
    tag: Option<String>,

    /// Print raw KLV entries with offsets instead of typed records
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe executable
    #[arg(long, env = "FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,
}

fn parse_tag(text: &str) -> Result<FourCC> {
    match FourCC::from_slice(text.as_bytes()) {
        Some(tag) if text.len() == 4 && tag.is_valid() => Ok(tag),
        _ => bail!("'{}' is not a four character tag", text),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let filter = args.tag.as_deref().map(parse_tag).transpose()?;
    let tools = ToolPaths {
        ffmpeg: args.ffmpeg.clone(),
        ffprobe: args.ffprobe.clone(),
    };
    let bytes = gpmf::load(&args.file, args.binary, &tools)?;
    println!("{}: {} bytes", args.file.display(), bytes.len());

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    if args.raw {
        for entry in gpmf::parse_entries(&bytes)? {
            let key = entry.header.key;
            if filter.is_some_and(|f| f != key) {
                continue;
            }
            *counts.entry(key.to_string()).or_default() += 1;
            println!(
                "{:>8}  {} '{}' size={} repeat={} -> {}",
                entry.offset,
                key,
                entry.header.type_char as char,
                entry.header.struct_size,
                entry.header.repeat,
                entry.value.type_name()
            );
        }
    } else {
        for (i, record) in gpmf::decode(&bytes)?.iter().enumerate() {
            if filter.is_some_and(|f| f != record.tag) {
                continue;
            }
            *counts.entry(record.tag.to_string()).or_default() += 1;
            println!(
                "{:>6}  {}  n={:<3} {:?}",
                i,
                record.tag,
                record.sample_count(),
                record.payload
            );
        }
    }

    println!("\n=== Tags ===");
    for (tag, count) in &counts {
        println!("{}: {}", tag, count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag("GPS5").unwrap(), FourCC::GPS5);
        assert!(parse_tag("GPS").is_err());
        assert!(parse_tag("GPS55").is_err());
    }
}
