//! # vidthumbzip - Video Thumbnail Archiver
//!
//! `vidthumbzip` extracts one thumbnail every N seconds of a video with an
//! external player or encoder (mpv, mplayer or ffmpeg) and packs the frames
//! into a zip archive.
//!
//! ## Features
//!
//! - Selectable generator with a documented default (mpv)
//! - Per-job private scratch directory
//! - Atomic publish: archives are written as `<name>.part` and renamed when complete
//! - Sequential batch processing with an abort or keep-going policy
//! - Single-frame PNG preview capture
//!
//! ## Example
//!
//! ```no_run
//! use vidthumbzip::{Generator, OutputTarget, ThumbnailArchiver, ThumbnailJob};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let archiver = ThumbnailArchiver::new();
//! let target = OutputTarget::from_options(Some(PathBuf::from("/tmp/out")), None, 1)?;
//! let job = ThumbnailJob::new("movie.mp4", target, Generator::Mpv);
//! let archive = archiver.produce_thumbnails(&job)?;
//! assert_eq!(archive, PathBuf::from("/tmp/out/movie.mp4.zip"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress Reporting
//!
//! ```no_run
//! use vidthumbzip::{Generator, OutputTarget, ProgressPhase, ThumbnailArchiver, ThumbnailJob};
//!
//! let archiver = ThumbnailArchiver::new();
//! let job = ThumbnailJob::new("movie.mp4", OutputTarget::File("thumbs.zip".into()), Generator::Ffmpeg);
//! archiver
//!     .produce_thumbnails_with_progress(&job, |progress| match progress.phase {
//!         ProgressPhase::ExtractingFrames => println!("Extracting frames..."),
//!         ProgressPhase::Archiving => {
//!             println!("Archiving: {}/{}", progress.completed, progress.total)
//!         }
//!         ProgressPhase::Complete => println!("Done!"),
//!     })
//!     .unwrap();
//! ```

pub mod archive;
mod archiver;
pub mod config;
mod error;
mod generator;
mod job;
pub mod preview;

pub use archiver::{BatchReport, Progress, ProgressPhase, ThumbnailArchiver};
pub use config::{load_config, AppConfig, ArchivePolicy, BatchPolicy, ToolPaths};
pub use error::ThumbnailError;
pub use generator::Generator;
pub use job::{plan_jobs, OutputTarget, ThumbnailJob};
pub use preview::capture_preview;

#[cfg(test)]
mod tests;
