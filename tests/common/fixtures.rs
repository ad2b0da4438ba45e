//! Fake fetcher and transcoder executables
//!
//! Each fake is a POSIX shell script that mimics the output format and
//! file side effects of the real tool closely enough for the pipeline.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vidpipe::{Config, Tool, ToolsConfig};

/// Video URL accepted by the validator
pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Title printed by the fake fetcher
pub const FAKE_TITLE: &str = "Fake: Clip";

/// Filename the pipeline derives from [`FAKE_TITLE`]
pub const FAKE_NAME: &str = "Fake Clip";

/// How the fake fetcher behaves during the download step
#[derive(Clone, Copy, Debug)]
pub enum FetcherMode {
    /// Print carriage-return progress and write `<output>.<ext>`
    Produce(&'static str),
    /// Print one progress line and then hang until killed
    Hang,
    /// Print an error and exit 1
    Fail,
}

/// How the fake transcoder behaves
#[derive(Clone, Copy, Debug)]
pub enum TranscoderMode {
    /// Print progress and write the output file
    Succeed,
    /// Write a partial output file, print an error and exit 1
    Fail,
}

/// Directory of fake tools plus a download destination
pub struct FakeTools {
    pub root: TempDir,
    pub bin: PathBuf,
    pub dest: PathBuf,
}

impl FakeTools {
    pub fn new(fetcher: FetcherMode, transcoder: TranscoderMode) -> Self {
        let root = TempDir::new().expect("create temp dir");
        let bin = root.path().join("bin");
        let dest = root.path().join("downloads");
        std::fs::create_dir_all(&bin).expect("create bin dir");
        std::fs::create_dir_all(&dest).expect("create destination dir");

        write_script(&bin, "yt-dlp", &fetcher_script(fetcher));
        write_script(&bin, "ffmpeg", &transcoder_script(transcoder));
        write_script(&bin, "ffprobe", "#!/bin/sh\necho 2.000000\n");

        Self { root, bin, dest }
    }

    /// Config pointing every tool at the fakes explicitly
    pub fn config(&self) -> Config {
        Config {
            tools: ToolsConfig {
                yt_dlp_path: Some(self.bin.join(Tool::YtDlp.program_name())),
                ffmpeg_path: Some(self.bin.join(Tool::Ffmpeg.program_name())),
                ffprobe_path: Some(self.bin.join(Tool::Ffprobe.program_name())),
                bundle_dir: Some(self.root.path().join("no-bundle")),
                dev_dir: self.root.path().join("no-assets"),
                search_path: false,
            },
            ..Default::default()
        }
    }

    /// Files in the destination, sorted
    pub fn dest_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dest)
            .expect("read destination")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

fn fetcher_script(mode: FetcherMode) -> String {
    let download = match mode {
        FetcherMode::Produce(ext) => format!(
            r#"for p in 10.0 55.5 100.0; do printf '[download] %5s%% of 1.00MiB at 1.00MiB/s\r' "$p"; done
printf '\n'
: > "$(printf '%s' "$out" | sed 's/%(ext)s/{ext}/')"
exit 0"#
        ),
        FetcherMode::Hang => r#"printf '[download]   1.0%% of 1.00MiB\n'
exec sleep 30"#
            .to_string(),
        FetcherMode::Fail => r#"echo 'ERROR: [youtube] dQw4w9WgXcQ: Video unavailable' >&2
exit 1"#
            .to_string(),
    };

    format!(
        r#"#!/bin/sh
case " $* " in
  *" --dump-json "*)
    echo '{{"title": "{FAKE_TITLE}", "thumbnail": "https://i.ytimg.com/vi/x/hq.jpg", "formats": [{{"vcodec": "avc1", "height": 720}}, {{"vcodec": "avc1", "height": 360}}]}}'
    exit 0;;
  *" --get-title "*)
    echo '{FAKE_TITLE}'
    exit 0;;
esac
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
{download}
"#
    )
}

fn transcoder_script(mode: TranscoderMode) -> String {
    let body = match mode {
        TranscoderMode::Succeed => {
            r#"printf 'frame=1\nout_time_ms=1000000\nprogress=continue\nout_time_ms=2000000\nprogress=end\n'
: > "$last"
exit 0"#
        }
        TranscoderMode::Fail => {
            r#": > "$last"
echo 'Invalid data found when processing input' >&2
exit 1"#
        }
    };
    format!("#!/bin/sh\nfor last; do :; done\n{body}\n")
}
