use std::path::{Path, PathBuf};

use crate::error::{Result, ThumbnailError};
use crate::generator::Generator;

/// Where a job's archive ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write `<dir>/<input basename>.zip`
    Directory(PathBuf),
    /// Write exactly this file; only valid for a single input
    File(PathBuf),
}

impl OutputTarget {
    /// Validate the `--outputdir`/`--outputfile` combination for a batch of
    /// `input_count` files. Nothing is spawned or written here.
    pub fn from_options(outputdir: Option<PathBuf>, outputfile: Option<PathBuf>, input_count: usize) -> Result<Self> {
        match (outputdir, outputfile) {
            (Some(_), Some(_)) => Err(ThumbnailError::InvalidArguments(
                "can't mix --outputdir and --outputfile".to_string(),
            )),
            (None, None) => Err(ThumbnailError::InvalidArguments(
                "--outputdir or --outputfile required".to_string(),
            )),
            (Some(dir), None) => {
                if !dir.is_dir() {
                    return Err(ThumbnailError::InvalidOutputPath(dir));
                }
                Ok(OutputTarget::Directory(dir))
            }
            (None, Some(file)) => {
                if input_count > 1 {
                    return Err(ThumbnailError::InvalidArguments(
                        "can't use --outputfile with multiple input files".to_string(),
                    ));
                }
                Ok(OutputTarget::File(file))
            }
        }
    }

    /// Final archive path for an input with base name `input_base`
    pub fn archive_path(&self, input_base: &str) -> PathBuf {
        match self {
            OutputTarget::Directory(dir) => dir.join(format!("{}.zip", input_base)),
            OutputTarget::File(file) => file.clone(),
        }
    }
}

/// One input video and where its thumbnails go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailJob {
    pub input: PathBuf,
    pub output: OutputTarget,
    pub generator: Generator,
}

impl ThumbnailJob {
    pub fn new(input: impl Into<PathBuf>, output: OutputTarget, generator: Generator) -> Self {
        Self {
            input: input.into(),
            output,
            generator,
        }
    }
}

/// One job per input, all sharing the same target and generator.
pub fn plan_jobs(inputs: &[PathBuf], output: &OutputTarget, generator: Generator) -> Result<Vec<ThumbnailJob>> {
    if inputs.is_empty() {
        return Err(ThumbnailError::InvalidArguments(
            "at least one input file is required".to_string(),
        ));
    }
    if matches!(output, OutputTarget::File(_)) && inputs.len() > 1 {
        return Err(ThumbnailError::InvalidArguments(
            "can't use --outputfile with multiple input files".to_string(),
        ));
    }
    Ok(inputs
        .iter()
        .map(|input| ThumbnailJob::new(input.clone(), output.clone(), generator))
        .collect())
}

/// Base name of the input, used for the frame pattern and the archive name
pub(crate) fn input_base_name(input: &Path) -> Result<String> {
    input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| ThumbnailError::InvalidArguments(format!("{}: not a file name", input.display())))
}
