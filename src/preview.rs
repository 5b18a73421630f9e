//! Single-frame preview capture.
//!
//! ffprobe reports the stored size of the first video stream, ffmpeg
//! decodes to raw RGB24 on stdout with autorotation off, and the first
//! complete frame is saved as a PNG. The decoder is stopped as soon as that
//! frame has been read.

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::config::ToolPaths;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Width and height from `ffprobe -of json -show_entries stream=width,height`
pub fn parse_probe_dimensions(json: &[u8]) -> Result<(u32, u32)> {
    let probe: ProbeOutput = serde_json::from_slice(json).context("parsing ffprobe json")?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| anyhow!("no video stream found"))?;
    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => bail!("video stream has no usable dimensions"),
    }
}

/// Wrap a raw RGB24 buffer as an image of the given size
pub fn frame_to_image(raw: Vec<u8>, width: u32, height: u32) -> Result<RgbImage> {
    let expected = frame_size(width, height);
    let got = raw.len();
    RgbImage::from_raw(width, height, raw)
        .ok_or_else(|| anyhow!("frame has {} bytes, expected {} for {}x{}", got, expected, width, height))
}

fn frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

fn probe_dimensions(ffprobe: &Path, input: &Path) -> Result<(u32, u32)> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height", "-of", "json"])
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("running {}", ffprobe.display()))?;

    if !output.status.success() {
        bail!("ffprobe failed on {}: {}", input.display(), output.status);
    }
    parse_probe_dimensions(&output.stdout)
}

fn read_first_frame(ffmpeg: &Path, input: &Path, width: u32, height: u32) -> Result<Vec<u8>> {
    // ffprobe reports the stored size; rotation metadata would otherwise
    // make ffmpeg emit a height x width frame of the same byte count.
    let mut child = Command::new(ffmpeg)
        .args(["-loglevel", "error", "-noautorotate", "-i"])
        .arg(input)
        .args(["-an", "-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("running {}", ffmpeg.display()))?;

    let mut frame = vec![0u8; frame_size(width, height)];
    let read = match child.stdout.take() {
        Some(mut stdout) => stdout.read_exact(&mut frame),
        None => bail!("ffmpeg stdout not captured"),
    };

    if read.is_err() {
        let status = child.wait().context("waiting for ffmpeg")?;
        bail!("ffmpeg produced no complete frame for {} ({})", input.display(), status);
    }

    // One frame is all we need; don't wait for a slow decoder to drain.
    if let Err(e) = child.kill() {
        debug!(error = %e, "ffmpeg already exited");
    }
    child.wait().context("waiting for ffmpeg")?;
    Ok(frame)
}

/// Decode the first frame of `input` and save it as a PNG at `output`.
/// Returns the frame's width and height.
pub fn capture_preview(input: &Path, output: &Path, tools: &ToolPaths) -> Result<(u32, u32)> {
    if !input.is_file() {
        bail!("{}: no such file", input.display());
    }
    let (width, height) = probe_dimensions(&tools.ffprobe(), input)?;
    debug!(width, height, "probed video dimensions");

    let raw = read_first_frame(&tools.ffmpeg(), input, width, height)?;
    let img = frame_to_image(raw, width, height)?;
    img.save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("saving preview {}", output.display()))?;

    info!(output = %output.display(), "{}x{} preview saved", width, height);
    Ok((width, height))
}
