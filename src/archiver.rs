use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::archive::{self, part_path};
use crate::config::{AppConfig, BatchPolicy};
use crate::error::{Result, ThumbnailError};
use crate::job::{input_base_name, OutputTarget, ThumbnailJob};

/// Represents the current phase of a thumbnail job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// The external generator is decoding the video
    ExtractingFrames,
    /// Frames are being written into the `.part` archive
    Archiving,
    /// The archive has been published under its final name
    Complete,
}

/// Progress information for a thumbnail job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub phase: ProgressPhase,
    /// Number of items completed in the current phase
    pub completed: usize,
    /// Total number of items in the current phase (0 if unknown)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0)
    pub percentage: f64,
    /// Human-readable message describing current status
    pub message: String,
}

impl Progress {
    pub fn extracting_frames(input: &Path) -> Self {
        Self {
            phase: ProgressPhase::ExtractingFrames,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: format!("Extracting frames from {}", input.display()),
        }
    }

    pub fn archiving(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            phase: ProgressPhase::Archiving,
            completed,
            total,
            percentage,
            message: format!("Archiving frame {} of {}", completed, total),
        }
    }

    pub fn complete(archive: &Path, total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!("{}: {} frames", archive.display(), total_frames),
        }
    }
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Archives published, in input order
    pub archives: Vec<PathBuf>,
    /// Inputs that failed, only populated under [`BatchPolicy::KeepGoing`]
    pub failures: Vec<(PathBuf, ThumbnailError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs generators and turns their frames into published zip archives
pub struct ThumbnailArchiver {
    config: AppConfig,
}

impl ThumbnailArchiver {
    /// Create an archiver with default configuration
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Create an archiver with custom configuration
    pub fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Produce the thumbnail archive for one job and return its final path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vidthumbzip::{Generator, OutputTarget, ThumbnailArchiver, ThumbnailJob};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let archiver = ThumbnailArchiver::new();
    /// let job = ThumbnailJob::new(
    ///     "movie.mp4",
    ///     OutputTarget::Directory("/tmp/out".into()),
    ///     Generator::Ffmpeg,
    /// );
    /// let archive = archiver.produce_thumbnails(&job)?;
    /// println!("wrote {}", archive.display());
    /// # Ok(())
    /// # }
    /// ```
    pub fn produce_thumbnails(&self, job: &ThumbnailJob) -> Result<PathBuf> {
        self.produce_thumbnails_with_progress(job, |_| {})
    }

    /// Same as [`produce_thumbnails`](Self::produce_thumbnails), reporting each
    /// phase and every archived frame to `progress_callback`.
    pub fn produce_thumbnails_with_progress<F>(&self, job: &ThumbnailJob, mut progress_callback: F) -> Result<PathBuf>
    where
        F: FnMut(Progress),
    {
        let input = resolve_input(&job.input)?;
        if let OutputTarget::Directory(dir) = &job.output {
            if !dir.is_dir() {
                return Err(ThumbnailError::InvalidOutputPath(dir.clone()));
            }
        }
        let base = input_base_name(&input)?;
        let archive_path = job.output.archive_path(&base);

        let scratch = self.create_scratch()?;
        debug!(scratch = %scratch.path().display(), "created scratch workspace");

        progress_callback(Progress::extracting_frames(&input));
        if let Err(err) = self.run_generator(job, &input, &base, scratch.path()) {
            self.discard_scratch(scratch);
            return Err(err);
        }

        info!(archive = %archive_path.display(), "building .zip file");
        let frames = archive::scratch_frames(scratch.path())?;
        if frames.is_empty() {
            warn!(input = %input.display(), generator = %job.generator, "generator produced no frames");
        }

        let part = part_path(&archive_path);
        let written = archive::write_part(&frames, &part, self.config.archive_policy, |done, total| {
            progress_callback(Progress::archiving(done, total))
        });
        let count = match written {
            Ok(count) => count,
            Err(err) => {
                if let Err(e) = fs::remove_file(&part) {
                    debug!(part = %part.display(), error = %e, "could not remove part file");
                }
                return Err(err);
            }
        };

        let scratch_path = scratch.path().to_path_buf();
        scratch.close().map_err(|e| {
            ThumbnailError::filesystem(format!("removing scratch directory {}", scratch_path.display()), e)
        })?;
        archive::publish(&part, &archive_path)?;

        progress_callback(Progress::complete(&archive_path, count));
        Ok(archive_path)
    }

    /// Process jobs strictly one after another.
    ///
    /// Under [`BatchPolicy::Abort`] the first failure is returned as the
    /// error; under [`BatchPolicy::KeepGoing`] failures are collected in the
    /// report and the next job is started.
    pub fn run_batch<F>(&self, jobs: &[ThumbnailJob], mut progress_callback: F) -> Result<BatchReport>
    where
        F: FnMut(&ThumbnailJob, Progress),
    {
        let mut report = BatchReport::default();
        for job in jobs {
            match self.produce_thumbnails_with_progress(job, |p| progress_callback(job, p)) {
                Ok(archive) => report.archives.push(archive),
                Err(err) => match self.config.batch_policy {
                    BatchPolicy::Abort => return Err(err),
                    BatchPolicy::KeepGoing => {
                        warn!(input = %job.input.display(), error = %err, "skipping failed input");
                        report.failures.push((job.input.clone(), err));
                    }
                },
            }
        }
        Ok(report)
    }

    fn create_scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vidthumbzip-");
        let scratch = match &self.config.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        scratch.map_err(|e| ThumbnailError::filesystem("creating scratch directory", e))
    }

    fn run_generator(&self, job: &ThumbnailJob, input: &Path, base: &str, scratch_dir: &Path) -> Result<()> {
        let generator = job.generator;
        let program = self.config.tools.generator(generator);
        let pattern = generator.output_pattern(scratch_dir, base);
        let mut cmd = generator.command(&program, input, scratch_dir, &pattern, self.config.interval_secs);
        debug!(command = ?cmd, "running generator");

        let status = cmd.status().map_err(|e| ThumbnailError::GeneratorFailed {
            generator,
            exit_code: None,
            reason: format!("could not run {}: {}", program.display(), e),
        })?;

        if !status.success() {
            return Err(ThumbnailError::GeneratorFailed {
                generator,
                exit_code: status.code(),
                reason: format!("{}", status),
            });
        }
        Ok(())
    }

    fn discard_scratch(&self, scratch: TempDir) {
        if self.config.keep_scratch_on_failure {
            let kept = scratch.keep();
            warn!(scratch = %kept.display(), "generator failed, keeping scratch directory");
        } else if let Err(e) = scratch.close() {
            warn!(error = %e, "could not remove scratch directory");
        }
    }
}

impl Default for ThumbnailArchiver {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_input(input: &Path) -> Result<PathBuf> {
    if !input.is_file() {
        return Err(ThumbnailError::InputNotFound(input.to_path_buf()));
    }
    fs::canonicalize(input)
        .map_err(|e| ThumbnailError::filesystem(format!("resolving {}", input.display()), e))
}

