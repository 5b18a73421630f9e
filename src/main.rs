use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use vidthumbzip::{
    load_config, plan_jobs, AppConfig, ArchivePolicy, BatchPolicy, Generator, OutputTarget, Progress,
    ProgressPhase, ThumbnailArchiver, ThumbnailError, ThumbnailJob,
};

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the first decoded frame of a video as a PNG
    Preview {
        /// Input video file
        input: PathBuf,
        /// Output PNG file
        output: PathBuf,
    },
}

/// Generator selection; at most one of these may be given
#[derive(ClapArgs, Debug, Default)]
#[group(multiple = false)]
struct GeneratorFlags {
    /// Generator by name: mpv, mplayer or ffmpeg
    #[arg(long = "generator", value_name = "NAME")]
    named: Option<Generator>,

    /// Use ffmpeg for thumbnail generation
    #[arg(long)]
    ffmpeg: bool,

    /// Use mplayer for thumbnail generation
    #[arg(long)]
    mplayer: bool,

    /// Use mpv for thumbnail generation
    #[arg(long)]
    mpv: bool,
}

impl GeneratorFlags {
    fn selected(&self) -> Option<Generator> {
        if let Some(generator) = self.named {
            Some(generator)
        } else if self.ffmpeg {
            Some(Generator::Ffmpeg)
        } else if self.mplayer {
            Some(Generator::Mplayer)
        } else if self.mpv {
            Some(Generator::Mpv)
        } else {
            None
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Create .zip files with video thumbnails",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Args {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Video file to thumbnail (put `--` before a file named `preview`)
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Write output .zip's to DIR
    #[arg(short = 'o', long = "outputdir", value_name = "DIR")]
    outputdir: Option<PathBuf>,

    /// Write output .zip to FILE (single input only)
    #[arg(short = 'O', long = "outputfile", value_name = "FILE")]
    outputfile: Option<PathBuf>,

    #[command(flatten)]
    generator: GeneratorFlags,

    /// Seconds of video between two thumbnails
    #[arg(long, value_name = "SECS")]
    interval: Option<u32>,

    /// Keep the scratch directory when the generator fails
    #[arg(long, default_value_t = false)]
    keep_scratch: bool,

    /// Keep extracted frames until the archive is complete instead of
    /// deleting each one as it is archived
    #[arg(long, default_value_t = false)]
    finalize: bool,

    /// Continue with the remaining files when one fails
    #[arg(long, default_value_t = false)]
    keep_going: bool,

    /// Configuration file (default: search the config dir, then the current dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (repeat for debug)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    /// Command line flags take precedence over the config file
    fn apply_overrides(&self, mut cfg: AppConfig) -> AppConfig {
        if let Some(generator) = self.generator.selected() {
            cfg.generator = generator;
        }
        if let Some(interval) = self.interval {
            cfg.interval_secs = interval;
        }
        if self.keep_scratch {
            cfg.keep_scratch_on_failure = true;
        }
        if self.finalize {
            cfg.archive_policy = ArchivePolicy::Finalize;
        }
        if self.keep_going {
            cfg.batch_policy = BatchPolicy::KeepGoing;
        }
        cfg
    }
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level());

    let cfg = load_config(args.config.as_deref())?;
    let cfg = args.apply_overrides(cfg);

    if let Some(Command::Preview { input, output }) = &args.cmd {
        let (width, height) = vidthumbzip::capture_preview(input, output, &cfg.tools)?;
        println!("{}: {}x{}", output.display(), width, height);
        return Ok(());
    }

    // Validate the whole command line before any generator is spawned.
    let target = OutputTarget::from_options(
        args.outputdir.clone(),
        args.outputfile.clone(),
        args.files.len(),
    )
    .map_err(usage_error)?;
    let jobs = plan_jobs(&args.files, &target, cfg.generator).map_err(usage_error)?;

    let archiver = ThumbnailArchiver::with_config(cfg).context("invalid configuration")?;
    debug!(config = ?archiver.config(), "effective configuration");
    let mut progress = ArchiveProgress::new(args.quiet);
    let report = archiver
        .run_batch(&jobs, |job, p| progress.update(job, p))
        .map_err(usage_error)?;

    for archive in &report.archives {
        println!("{}", archive.display());
    }
    if !report.is_success() {
        for (input, err) in &report.failures {
            error!(input = %input.display(), "{}", err);
        }
        return Err(anyhow!(
            "{} of {} files failed",
            report.failures.len(),
            jobs.len()
        ));
    }
    Ok(())
}

/// Progress bar for the frames of the job currently being archived
struct ArchiveProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl ArchiveProgress {
    fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }

    fn update(&mut self, job: &ThumbnailJob, progress: Progress) {
        match progress.phase {
            ProgressPhase::ExtractingFrames => {
                // A previous job may have failed mid-archive and left its bar behind.
                if let Some(pb) = self.bar.take() {
                    pb.abandon();
                }
                info!(generator = %job.generator, "{}", progress.message);
            }
            ProgressPhase::Archiving => {
                if self.quiet {
                    return;
                }
                let pb = self.bar.get_or_insert_with(|| new_bar(job, progress.total));
                pb.set_position(progress.completed as u64);
            }
            ProgressPhase::Complete => {
                if let Some(pb) = self.bar.take() {
                    pb.finish_and_clear();
                }
                info!("{}", progress.message);
            }
        }
    }
}

fn new_bar(job: &ThumbnailJob, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(
        job.input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    pb
}

/// Usage errors get a pointer to `--help`; everything else passes through.
fn usage_error(err: ThumbnailError) -> anyhow::Error {
    if err.is_usage_error() {
        anyhow!("{}\nTry 'vidthumbzip --help' for more information.", err)
    } else {
        err.into()
    }
}
