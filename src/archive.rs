//! Packing scratch frames into a zip archive and publishing it atomically.
//!
//! The archive is always written as `<archive>.part` first. Renaming the part
//! file onto the final name is the only step that makes an archive visible,
//! so an observer never sees a truncated file under the final name.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::ArchivePolicy;
use crate::error::{Result, ThumbnailError};

pub const PART_SUFFIX: &str = ".part";

/// `<archive>.part`, next to the final archive
pub fn part_path(archive: &Path) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Regular files directly inside the scratch directory, by file name.
pub fn scratch_frames(scratch_dir: &Path) -> Result<Vec<PathBuf>> {
    WalkDir::new(scratch_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter(|e| e.as_ref().map(|e| e.file_type().is_file()).unwrap_or(true))
        .map(|e| e.map(|e| e.into_path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            ThumbnailError::filesystem(
                format!("listing scratch directory {}", scratch_dir.display()),
                io::Error::from(e),
            )
        })
}

fn entry_options() -> SimpleFileOptions {
    // Frames are already compressed images. A fixed timestamp keeps two runs
    // over the same frames byte-identical.
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Write `frames` into `part` as flat entries named by their bare file name.
///
/// With [`ArchivePolicy::Consume`] every frame is deleted as soon as it has
/// been copied into the archive. `on_entry` is called with
/// `(completed, total)` after each entry. Returns the number of entries.
pub fn write_part<F>(frames: &[PathBuf], part: &Path, policy: ArchivePolicy, mut on_entry: F) -> Result<usize>
where
    F: FnMut(usize, usize),
{
    let file = File::create(part)
        .map_err(|e| ThumbnailError::filesystem(format!("creating {}", part.display()), e))?;
    let mut archive = ZipWriter::new(BufWriter::new(file));
    let archive_err = |source: zip::result::ZipError| ThumbnailError::Archive {
        path: part.to_path_buf(),
        source,
    };

    let total = frames.len();
    for (idx, frame) in frames.iter().enumerate() {
        let name = frame
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| ThumbnailError::InvalidArguments(format!("{}: not a file name", frame.display())))?;
        debug!(archive = %part.display(), entry = %name, "adding frame");

        archive.start_file(name, entry_options()).map_err(archive_err)?;
        let mut src = File::open(frame)
            .map_err(|e| ThumbnailError::filesystem(format!("opening frame {}", frame.display()), e))?;
        io::copy(&mut src, &mut archive)
            .map_err(|e| ThumbnailError::filesystem(format!("copying frame {}", frame.display()), e))?;

        if policy == ArchivePolicy::Consume {
            fs::remove_file(frame)
                .map_err(|e| ThumbnailError::filesystem(format!("removing frame {}", frame.display()), e))?;
        }
        on_entry(idx + 1, total);
    }

    let writer = archive.finish().map_err(archive_err)?;
    let file = writer
        .into_inner()
        .map_err(|e| ThumbnailError::filesystem(format!("flushing {}", part.display()), e.into_error()))?;
    file.sync_all()
        .map_err(|e| ThumbnailError::filesystem(format!("syncing {}", part.display()), e))?;

    Ok(total)
}

/// Rename the finished part file onto its final name.
pub fn publish(part: &Path, archive: &Path) -> Result<()> {
    fs::rename(part, archive).map_err(|e| {
        ThumbnailError::filesystem(
            format!("renaming {} to {}", part.display(), archive.display()),
            e,
        )
    })?;
    info!(archive = %archive.display(), "archive published");
    Ok(())
}
