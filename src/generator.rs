//! External frame generators and the command lines used to drive them.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

/// The external tool that decodes a video and writes periodic frame images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generator {
    /// `mpv --vo image`, stepping with `--sstep`
    #[default]
    Mpv,
    /// `mplayer -vo jpeg`, stepping with `-sstep`
    Mplayer,
    /// `ffmpeg` with an `fps=1/N` video filter
    Ffmpeg,
}

impl Generator {
    pub const ALL: [Generator; 3] = [Generator::Mpv, Generator::Mplayer, Generator::Ffmpeg];

    pub fn name(&self) -> &'static str {
        match self {
            Generator::Mpv => "mpv",
            Generator::Mplayer => "mplayer",
            Generator::Ffmpeg => "ffmpeg",
        }
    }

    /// Output file pattern inside the scratch directory: `<base>-%08d.jpg`.
    ///
    /// Only ffmpeg is told about the pattern; mpv and mplayer pick their own
    /// numbered names inside the directory they are pointed at.
    pub fn output_pattern(&self, scratch_dir: &Path, input_base: &str) -> PathBuf {
        scratch_dir.join(format!("{}-%08d.jpg", input_base))
    }

    /// Arguments for one extraction run: one frame every `interval_secs`
    /// seconds of video, audio disabled.
    pub fn arguments(&self, input: &Path, scratch_dir: &Path, pattern: &Path, interval_secs: u32) -> Vec<OsString> {
        let interval = interval_secs.to_string();
        match self {
            Generator::Mpv => vec![
                "--ao".into(),
                "null".into(),
                "--quiet".into(),
                "--vo".into(),
                "image".into(),
                "--vo-image-outdir".into(),
                scratch_dir.into(),
                "--sstep".into(),
                interval.into(),
                input.into(),
            ],
            Generator::Mplayer => {
                let mut vo = OsString::from("jpeg:outdir=");
                vo.push(scratch_dir);
                vec![
                    "-nosound".into(),
                    "-quiet".into(),
                    "-vo".into(),
                    vo,
                    "-sstep".into(),
                    interval.into(),
                    input.into(),
                ]
            }
            Generator::Ffmpeg => vec![
                "-i".into(),
                input.into(),
                "-vf".into(),
                format!("fps=1/{}", interval).into(),
                pattern.into(),
            ],
        }
    }

    /// Build the process invocation. Stdin is detached so a player never
    /// waits on terminal input.
    pub fn command(&self, program: &Path, input: &Path, scratch_dir: &Path, pattern: &Path, interval_secs: u32) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(self.arguments(input, scratch_dir, pattern, interval_secs))
            .stdin(Stdio::null());
        cmd
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Generator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Generator::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid generator: {}", s))
    }
}
