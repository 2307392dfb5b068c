use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;
use log::{debug, info};
use serde::Deserialize;

use crate::error::{Result, TrackError};

/// External tools used to pull the metadata track out of a video container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Read a GPMF buffer from a raw dump (`binary`) or from a video file.
pub fn load(path: &Path, binary: bool, tools: &ToolPaths) -> Result<Vec<u8>> {
    if binary {
        read_binary(path)
    } else {
        read_from_video(path, tools)
    }
}

/// Read a raw GPMF dump, transparently decompressing `.gz` files.
pub fn read_binary(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut bytes = Vec::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let mut reader = BufReader::new(GzDecoder::new(file));
        reader.read_to_end(&mut bytes)?;
    } else {
        let mut reader = BufReader::new(file);
        reader.read_to_end(&mut bytes)?;
    }
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Extract the `gpmd` stream of a video container through ffprobe + ffmpeg.
pub fn read_from_video(path: &Path, tools: &ToolPaths) -> Result<Vec<u8>> {
    let probe = run_tool(&tools.ffprobe, &ffprobe_args(path))?;
    let index = find_metadata_stream(&String::from_utf8_lossy(&probe))?
        .ok_or_else(|| TrackError::NoMetadataStream(path.display().to_string()))?;
    info!("GPMF metadata is stream {} of {}", index, path.display());

    let bytes = run_tool(&tools.ffmpeg, &ffmpeg_args(path, index))?;
    debug!("Extracted {} bytes of GPMF", bytes.len());
    Ok(bytes)
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    index: u64,
    #[serde(default)]
    codec_tag_string: String,
    #[serde(default)]
    tags: Option<ProbeTags>,
}

#[derive(Deserialize)]
struct ProbeTags {
    handler_name: Option<String>,
}

impl ProbeStream {
    fn is_gpmf(&self) -> bool {
        self.codec_tag_string == "gpmd"
            || self
                .tags
                .as_ref()
                .and_then(|t| t.handler_name.as_deref())
                .map(|name| name.contains("GoPro MET"))
                .unwrap_or(false)
    }
}

/// Index of the first GPMF stream in `ffprobe -of json -show_streams` output.
fn find_metadata_stream(probe_json: &str) -> Result<Option<u64>> {
    let probe: ProbeOutput = serde_json::from_str(probe_json)?;
    Ok(probe
        .streams
        .iter()
        .find(|s| s.is_gpmf())
        .map(|s| s.index))
}

fn ffprobe_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-show_streams", "-of", "json"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args
}

fn ffmpeg_args(path: &Path, stream_index: u64) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-y".into(), "-i".into()];
    args.push(path.as_os_str().to_owned());
    for arg in ["-codec", "copy", "-map"] {
        args.push(arg.into());
    }
    args.push(format!("0:{}", stream_index).into());
    for arg in ["-f", "rawvideo", "-"] {
        args.push(arg.into());
    }
    args
}

fn run_tool(tool: &Path, args: &[OsString]) -> Result<Vec<u8>> {
    let name = tool.display().to_string();
    debug!("Running {} {:?}", name, args);

    let output = Command::new(tool).args(args).output().map_err(|e| {
        let message = if e.kind() == ErrorKind::NotFound {
            "not found (install it or pass its path)".to_string()
        } else {
            e.to_string()
        };
        TrackError::ExternalTool {
            tool: name.clone(),
            message,
        }
    })?;

    if !output.status.success() {
        return Err(TrackError::ExternalTool {
            tool: name,
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(output.stdout)
}
