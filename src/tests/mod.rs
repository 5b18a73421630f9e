// Archiver runs against small shell scripts standing in for mpv and ffmpeg.
// Each fake reads the "duration" in seconds from the input file and writes
// one frame per interval, starting at 0s.
#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tempfile::TempDir;

use crate::{
    capture_preview, AppConfig, ArchivePolicy, BatchPolicy, Generator, OutputTarget, ProgressPhase, ThumbnailArchiver,
    ThumbnailError, ThumbnailJob, ToolPaths,
};

const FAKE_FFMPEG: &str = r#"#!/bin/sh
input=""; interval=""; pattern=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift 2 ;;
    -vf) interval="${2#fps=1/}"; shift 2 ;;
    *) pattern="$1"; shift ;;
  esac
done
duration=$(cat "$input")
n=0; t=0
while [ "$t" -lt "$duration" ]; do
  n=$((n + 1))
  file=$(printf "$pattern" "$n")
  printf 'frame %s of %s' "$n" "$(basename "$input")" > "$file"
  t=$((t + interval))
done
"#;

const FAKE_MPV: &str = r#"#!/bin/sh
outdir=""; step=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --vo-image-outdir) outdir="$2"; shift 2 ;;
    --sstep) step="$2"; shift 2 ;;
    --ao|--vo) shift 2 ;;
    --*) shift ;;
    *) input="$1"; shift ;;
  esac
done
duration=$(cat "$input")
n=0; t=0
while [ "$t" -lt "$duration" ]; do
  n=$((n + 1))
  printf 'mpv frame %s' "$n" > "$outdir/$(printf '%08d' "$n").jpg"
  t=$((t + step))
done
"#;

const FAILING_TOOL: &str = "#!/bin/sh\nexit 1\n";

const FAKE_FFPROBE: &str = r#"#!/bin/sh
printf '{"streams": [{"width": 2, "height": 1}]}'
"#;

// Emits one 2x1 rgb24 frame (red, blue), but only when autorotation is
// switched off ahead of the input.
const FAKE_PREVIEW_FFMPEG: &str = r#"#!/bin/sh
noautorotate=""
for arg in "$@"; do
  case "$arg" in
    -noautorotate) noautorotate=1 ;;
    -i) [ -n "$noautorotate" ] || exit 3; break ;;
  esac
done
printf '\377\000\000\000\000\377'
"#;

const SHORT_FRAME_FFMPEG: &str = r#"#!/bin/sh
printf '\377\000'
"#;

struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

// All scripts are written before the first spawn so no child inherits an
// open write handle to an executable (ETXTBSY).
fn fake_tools() -> &'static FakeTools {
    static TOOLS: OnceLock<FakeTools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let scripts = [
            ("ffmpeg", FAKE_FFMPEG),
            ("mpv", FAKE_MPV),
            ("failing", FAILING_TOOL),
            ("ffprobe", FAKE_FFPROBE),
            ("preview-ffmpeg", FAKE_PREVIEW_FFMPEG),
            ("short-ffmpeg", SHORT_FRAME_FFMPEG),
        ];
        for (name, body) in scripts {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        FakeTools { dir }
    })
}

struct Fixture {
    root: TempDir,
    config: AppConfig,
}

impl Fixture {
    fn new() -> Self {
        let tools = fake_tools();
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("scratch")).unwrap();
        fs::create_dir(root.path().join("out")).unwrap();

        let mut config = AppConfig::default();
        config.scratch_root = Some(root.path().join("scratch"));
        config.tools.ffmpeg = Some(tools.path("ffmpeg"));
        config.tools.mpv = Some(tools.path("mpv"));
        config.tools.mplayer = Some(tools.path("failing"));
        Self { root, config }
    }

    fn video(&self, name: &str, duration_secs: u32) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, duration_secs.to_string()).unwrap();
        path
    }

    fn out_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    fn scratch_entries(&self) -> usize {
        fs::read_dir(self.root.path().join("scratch")).unwrap().count()
    }

    fn archiver(&self) -> ThumbnailArchiver {
        ThumbnailArchiver::with_config(self.config.clone()).unwrap()
    }
}

fn read_entries(archive: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        assert!(entry.is_file(), "unexpected directory entry {}", entry.name());
        assert!(!entry.name().contains('/'), "nested entry {}", entry.name());
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        entries.insert(entry.name().to_string(), body);
    }
    entries
}

fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn directory_mode_archives_one_entry_per_interval() {
    let fx = Fixture::new();
    let video = fx.video("movie.mp4", 125);
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Ffmpeg);

    let archive = fx.archiver().produce_thumbnails(&job).unwrap();

    assert_eq!(archive, fx.out_dir().join("movie.mp4.zip"));
    let entries = read_entries(&archive);
    let names: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        ["movie.mp4-00000001.jpg", "movie.mp4-00000002.jpg", "movie.mp4-00000003.jpg"]
    );
    assert_eq!(entries["movie.mp4-00000002.jpg"], b"frame 2 of movie.mp4");
    assert_eq!(dir_listing(&fx.out_dir()), ["movie.mp4.zip"]);
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn explicit_file_mode_uses_path_verbatim() {
    let fx = Fixture::new();
    let video = fx.video("clip.mkv", 30);
    let target = fx.out_dir().join("custom-name.zip");
    let job = ThumbnailJob::new(&video, OutputTarget::File(target.clone()), Generator::Ffmpeg);

    let archive = fx.archiver().produce_thumbnails(&job).unwrap();

    assert_eq!(archive, target);
    assert_eq!(read_entries(&archive).len(), 1);
}

#[test]
fn final_name_is_absent_while_archive_is_written() {
    let fx = Fixture::new();
    let video = fx.video("movie.mp4", 200);
    let final_path = fx.out_dir().join("movie.mp4.zip");
    let part = crate::archive::part_path(&final_path);
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Ffmpeg);

    let mut archiving_updates = 0;
    let mut completed = false;
    fx.archiver()
        .produce_thumbnails_with_progress(&job, |p| match p.phase {
            ProgressPhase::ExtractingFrames => assert!(!part.exists() && !final_path.exists()),
            ProgressPhase::Archiving => {
                archiving_updates += 1;
                assert!(part.exists());
                assert!(!final_path.exists());
            }
            ProgressPhase::Complete => {
                completed = true;
                assert!(final_path.exists());
                assert!(!part.exists());
            }
        })
        .unwrap();

    assert_eq!(archiving_updates, 4);
    assert!(completed);
}

#[test]
fn repeated_runs_produce_identical_entries() {
    let fx = Fixture::new();
    let video = fx.video("movie.mp4", 125);
    let second_out = fx.root.path().join("out2");
    fs::create_dir(&second_out).unwrap();
    let archiver = fx.archiver();

    let first = archiver
        .produce_thumbnails(&ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Ffmpeg))
        .unwrap();
    let second = archiver
        .produce_thumbnails(&ThumbnailJob::new(&video, OutputTarget::Directory(second_out), Generator::Ffmpeg))
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(read_entries(&first), read_entries(&second));
}

#[test]
fn mpv_generator_with_finalize_policy() {
    let mut fx = Fixture::new();
    fx.config.archive_policy = ArchivePolicy::Finalize;
    fx.config.interval_secs = 10;
    let video = fx.video("talk.webm", 25);
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Mpv);

    let archive = fx.archiver().produce_thumbnails(&job).unwrap();

    let entries = read_entries(&archive);
    assert_eq!(entries.len(), 3);
    assert!(entries.contains_key("00000003.jpg"));
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn failing_generator_leaves_no_archive() {
    let fx = Fixture::new();
    let video = fx.video("movie.mp4", 125);
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Mplayer);

    let err = fx.archiver().produce_thumbnails(&job).unwrap_err();

    match err {
        ThumbnailError::GeneratorFailed { generator, exit_code, .. } => {
            assert_eq!(generator, Generator::Mplayer);
            assert_eq!(exit_code, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dir_listing(&fx.out_dir()).is_empty());
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn failing_generator_can_keep_scratch_for_inspection() {
    let mut fx = Fixture::new();
    fx.config.keep_scratch_on_failure = true;
    let video = fx.video("movie.mp4", 125);
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Mplayer);

    assert!(fx.archiver().produce_thumbnails(&job).is_err());
    assert_eq!(fx.scratch_entries(), 1);
}

#[test]
fn missing_generator_binary_is_generator_failure() {
    let mut fx = Fixture::new();
    fx.config.tools.ffmpeg = Some(fx.root.path().join("no-such-ffmpeg"));
    let video = fx.video("movie.mp4", 125);
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Ffmpeg);

    let err = fx.archiver().produce_thumbnails(&job).unwrap_err();
    assert!(matches!(err, ThumbnailError::GeneratorFailed { exit_code: None, .. }));
}

#[test]
fn missing_input_fails_before_scratch_is_created() {
    let fx = Fixture::new();
    let job = ThumbnailJob::new(
        fx.root.path().join("absent.mp4"),
        OutputTarget::Directory(fx.out_dir()),
        Generator::Ffmpeg,
    );

    let err = fx.archiver().produce_thumbnails(&job).unwrap_err();
    assert!(matches!(err, ThumbnailError::InputNotFound(_)));
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn nonexistent_output_dir_fails_before_generator_runs() {
    let fx = Fixture::new();
    let video = fx.video("movie.mp4", 125);
    let missing = fx.root.path().join("missing-out");
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(missing.clone()), Generator::Ffmpeg);

    let err = fx.archiver().produce_thumbnails(&job).unwrap_err();
    assert!(matches!(err, ThumbnailError::InvalidOutputPath(p) if p == missing));
    assert_eq!(fx.scratch_entries(), 0);
    assert!(!missing.exists());
}

#[test]
fn batch_keep_going_skips_failed_inputs() {
    let mut fx = Fixture::new();
    fx.config.batch_policy = BatchPolicy::KeepGoing;
    let good = fx.video("good.mp4", 61);
    let bad = fx.root.path().join("bad.mp4");
    let target = OutputTarget::Directory(fx.out_dir());
    let jobs = crate::plan_jobs(&[bad.clone(), good], &target, Generator::Ffmpeg).unwrap();

    let report = fx.archiver().run_batch(&jobs, |_, _| {}).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.archives, [fx.out_dir().join("good.mp4.zip")]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, bad);
}

#[test]
fn batch_abort_stops_at_first_failure() {
    let fx = Fixture::new();
    let bad = fx.root.path().join("bad.mp4");
    let good = fx.video("good.mp4", 61);
    let target = OutputTarget::Directory(fx.out_dir());
    let jobs = crate::plan_jobs(&[bad, good], &target, Generator::Ffmpeg).unwrap();

    let err = fx.archiver().run_batch(&jobs, |_, _| {}).unwrap_err();

    assert!(matches!(err, ThumbnailError::InputNotFound(_)));
    assert!(dir_listing(&fx.out_dir()).is_empty());
}

#[test]
fn archive_write_failure_removes_part_file() {
    let fx = Fixture::new();
    let video = fx.video("movie.mp4", 180);
    let final_path = fx.out_dir().join("movie.mp4.zip");
    let part = crate::archive::part_path(&final_path);
    let scratch_root = fx.root.path().join("scratch");
    let job = ThumbnailJob::new(&video, OutputTarget::Directory(fx.out_dir()), Generator::Ffmpeg);

    // After the first entry is written, pull the remaining frames out from
    // under the writer so the next open fails.
    let err = fx
        .archiver()
        .produce_thumbnails_with_progress(&job, |p| {
            if p.phase == ProgressPhase::Archiving && p.completed == 1 {
                assert!(part.exists());
                for dir in fs::read_dir(&scratch_root).unwrap() {
                    for frame in fs::read_dir(dir.unwrap().path()).unwrap() {
                        fs::remove_file(frame.unwrap().path()).unwrap();
                    }
                }
            }
        })
        .unwrap_err();

    assert!(matches!(err, ThumbnailError::Filesystem { .. }), "unexpected error: {err}");
    assert!(!part.exists());
    assert!(!final_path.exists());
    assert_eq!(fx.scratch_entries(), 0);
}

fn preview_tools(ffmpeg: &str) -> ToolPaths {
    let tools = fake_tools();
    ToolPaths {
        ffmpeg: Some(tools.path(ffmpeg)),
        ffprobe: Some(tools.path("ffprobe")),
        ..ToolPaths::default()
    }
}

#[test]
fn preview_saves_first_frame_as_png() {
    let fx = Fixture::new();
    let video = fx.video("phone.mp4", 5);
    let output = fx.out_dir().join("phone.png");

    let size = capture_preview(&video, &output, &preview_tools("preview-ffmpeg")).unwrap();

    assert_eq!(size, (2, 1));
    let img = image::open(&output).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (2, 1));
    assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(img.get_pixel(1, 0).0, [0, 0, 255]);
}

#[test]
fn preview_short_frame_is_an_error() {
    let fx = Fixture::new();
    let video = fx.video("broken.mp4", 5);
    let output = fx.out_dir().join("broken.png");

    let err = capture_preview(&video, &output, &preview_tools("short-ffmpeg")).unwrap_err();

    assert!(format!("{err:#}").contains("no complete frame"), "unexpected error: {err:#}");
    assert!(!output.exists());
}
