//! yt-dlp Media Downloader
//!
//! Drives the `yt-dlp` executable as a child process. Cookies are handed
//! over through a Netscape cookie file that lives only for the duration of
//! the call, and the produced file path is read back from yt-dlp's
//! `after_move` print hook.

use bridge_traits::{
    download::{DownloadCookie, MediaDownloader},
    error::{BridgeError, Result},
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const YT_DLP: &str = "yt-dlp";
const FFMPEG: &str = "ffmpeg";

/// Creates a command that doesn't flash a console window on Windows
#[cfg(windows)]
fn hidden_command(program: &Path) -> Command {
    use std::os::windows::process::CommandExt;
    let mut cmd = Command::new(program);
    cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW
    cmd
}

#[cfg(not(windows))]
fn hidden_command(program: &Path) -> Command {
    Command::new(program)
}

/// Locate an executable on the system `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let lookup = if cfg!(windows) { "where" } else { "which" };
    let output = Command::new(lookup).arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}

/// Downloader backed by the `yt-dlp` command line tool
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    executable: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpDownloader {
    /// Use an explicit yt-dlp executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ffmpeg_location: None,
        }
    }

    /// Find yt-dlp (and ffmpeg, if installed) on `PATH`.
    pub fn discover() -> Result<Self> {
        let executable = find_executable(YT_DLP).ok_or_else(|| {
            BridgeError::NotAvailable(format!("{} not found on PATH", YT_DLP))
        })?;
        let ffmpeg_location = find_executable(FFMPEG);
        if ffmpeg_location.is_none() {
            warn!("ffmpeg not found; formats that need merging will fail");
        }
        info!(yt_dlp = ?executable, ffmpeg = ?ffmpeg_location, "Discovered downloader tools");

        Ok(Self {
            executable,
            ffmpeg_location,
        })
    }

    /// Point yt-dlp at a specific ffmpeg binary or directory.
    pub fn with_ffmpeg_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = Some(location.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn ffmpeg_location(&self) -> Option<&Path> {
        self.ffmpeg_location.as_deref()
    }

    fn build_command(&self, url: &str, destination: &Path, cookie_file: Option<&Path>) -> Command {
        let mut cmd = hidden_command(&self.executable);
        cmd.arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-warnings")
            .arg("-P")
            .arg(destination)
            .arg("-o")
            .arg("%(title)s.%(ext)s")
            .arg("--print")
            .arg("after_move:filepath");

        if let Some(cookies) = cookie_file {
            cmd.arg("--cookies").arg(cookies);
        }
        if let Some(ffmpeg) = &self.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }

        // Everything after `--` is a URL, even if it starts with a dash.
        cmd.arg("--").arg(url);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        cmd.output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BridgeError::NotAvailable(format!("{} not found at {:?}", YT_DLP, self.executable))
            } else {
                BridgeError::DownloadFailed(format!("Failed to start {}: {}", YT_DLP, e))
            }
        })
    }
}

/// Serialize cookies in the Netscape `cookies.txt` format yt-dlp reads.
pub fn netscape_cookie_file(cookies: &[DownloadCookie]) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for cookie in cookies {
        let domain = if cookie.http_only {
            format!("#HttpOnly_{}", cookie.domain)
        } else {
            cookie.domain.clone()
        };
        let include_subdomains = if cookie.domain.starts_with('.') {
            "TRUE"
        } else {
            "FALSE"
        };
        let secure = if cookie.secure { "TRUE" } else { "FALSE" };
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            domain,
            include_subdomains,
            cookie.path,
            secure,
            cookie.expires.unwrap_or(0),
            cookie.name,
            cookie.value
        ));
    }
    out
}

/// Find the produced file: the last path yt-dlp printed that exists inside
/// `destination`, or else the single regular file left in `destination`.
fn locate_output(stdout: &str, destination: &Path) -> Option<PathBuf> {
    let printed = stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .find(|path| path.starts_with(destination) && path.is_file());
    if printed.is_some() {
        return printed;
    }

    let mut files: Vec<PathBuf> = fs::read_dir(destination)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|e| e.to_str()) != Some("part"))
        .collect();
    if files.len() == 1 {
        files.pop()
    } else {
        None
    }
}

fn last_error_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string()
}

impl MediaDownloader for YtDlpDownloader {
    fn download(
        &self,
        url: &str,
        cookies: &[DownloadCookie],
        destination: &Path,
    ) -> Result<PathBuf> {
        fs::create_dir_all(destination)?;

        // Kept outside `destination` so it can never be mistaken for output.
        let cookie_file = if cookies.is_empty() {
            None
        } else {
            let mut file = NamedTempFile::new()?;
            file.write_all(netscape_cookie_file(cookies).as_bytes())?;
            file.flush()?;
            Some(file)
        };

        let cmd = self.build_command(url, destination, cookie_file.as_ref().map(|f| f.path()));
        debug!(cookie_count = cookies.len(), "Running yt-dlp");
        let output = self.run(cmd)?;

        if !output.status.success() {
            return Err(BridgeError::DownloadFailed(format!(
                "{} exited with {}: {}",
                YT_DLP,
                output.status,
                last_error_line(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = locate_output(&stdout, destination).ok_or_else(|| {
            BridgeError::DownloadFailed(format!("{} reported success but produced no file", YT_DLP))
        })?;

        info!(file = ?path.file_name(), "Download finished");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netscape_cookie_file_format() {
        let mut session = DownloadCookie::new("SID", "abc", ".example.com");
        session.secure = true;
        session.expires = Some(1_900_000_000);
        let mut private = DownloadCookie::new("token", "xyz", "example.com");
        private.http_only = true;

        let text = netscape_cookie_file(&[session, private]);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "# Netscape HTTP Cookie File");
        assert_eq!(
            lines[1],
            ".example.com\tTRUE\t/\tTRUE\t1900000000\tSID\tabc"
        );
        assert_eq!(
            lines[2],
            "#HttpOnly_example.com\tFALSE\t/\tFALSE\t0\ttoken\txyz"
        );
    }

    #[test]
    fn test_locate_output_prefers_printed_path() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs::write(&video, b"v").unwrap();
        fs::write(dir.path().join("other.mp4"), b"o").unwrap();

        let stdout = format!("noise\n{}\n", video.display());
        assert_eq!(locate_output(&stdout, dir.path()), Some(video));
    }

    #[test]
    fn test_locate_output_falls_back_to_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.webm");
        fs::write(&video, b"v").unwrap();
        fs::write(dir.path().join("clip.webm.part"), b"p").unwrap();

        assert_eq!(locate_output("", dir.path()), Some(video));
    }

    #[test]
    fn test_locate_output_ignores_paths_outside_destination() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::NamedTempFile::new().unwrap();
        let stdout = format!("{}\n", elsewhere.path().display());
        assert_eq!(locate_output(&stdout, dir.path()), None);
    }

    #[test]
    fn test_missing_executable_is_not_available() {
        let downloader = YtDlpDownloader::new("/nonexistent/yt-dlp");
        let dest = tempfile::tempdir().unwrap();
        let err = downloader
            .download("https://example.com/v", &[], dest.path())
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[cfg(unix)]
    mod fake_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("yt-dlp");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_download_returns_printed_file() {
            let tools = tempfile::tempdir().unwrap();
            let exe = script(
                tools.path(),
                r#"while [ $# -gt 0 ]; do
  case "$1" in -P) dest="$2"; shift;; esac
  shift
done
printf 'video-bytes' > "$dest/My Clip.mp4"
echo "$dest/My Clip.mp4""#,
            );

            let dest = tempfile::tempdir().unwrap();
            let path = YtDlpDownloader::new(exe)
                .download("https://example.com/v", &[], dest.path())
                .unwrap();

            assert_eq!(path.file_name().unwrap(), "My Clip.mp4");
            assert_eq!(fs::read(&path).unwrap(), b"video-bytes");
        }

        #[test]
        fn test_download_passes_cookie_file() {
            let tools = tempfile::tempdir().unwrap();
            let exe = script(
                tools.path(),
                r#"while [ $# -gt 0 ]; do
  case "$1" in -P) dest="$2"; shift;; --cookies) jar="$2"; shift;; esac
  shift
done
cp "$jar" "$dest/jar.txt"
echo "$dest/jar.txt""#,
            );

            let dest = tempfile::tempdir().unwrap();
            let cookies = [DownloadCookie::new("SID", "abc", ".example.com")];
            let path = YtDlpDownloader::new(exe)
                .download("https://example.com/v", &cookies, dest.path())
                .unwrap();

            let jar = fs::read_to_string(path).unwrap();
            assert!(jar.contains("\tSID\tabc"));
        }

        #[test]
        fn test_nonzero_exit_is_download_failure() {
            let tools = tempfile::tempdir().unwrap();
            let exe = script(tools.path(), "echo 'ERROR: Unsupported URL' >&2\nexit 1");

            let dest = tempfile::tempdir().unwrap();
            let err = YtDlpDownloader::new(exe)
                .download("https://example.com/v", &[], dest.path())
                .unwrap_err();

            match err {
                BridgeError::DownloadFailed(message) => {
                    assert!(message.contains("Unsupported URL"))
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
