//! Template sources and the clone capability for remote ones.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use url::Url;

use crate::config::RepositoryConfig;
use crate::error::{Error, Result};

/// Where a template is ingested from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Local directory containing the specification file and static files.
    Directory(PathBuf),
    /// Version-controlled remote repository.
    Remote(String),
}

impl TemplateSource {
    /// Classify a location string as a remote URL or a local path.
    pub fn from_location(location: &str) -> Self {
        if is_scp_like(location) {
            return TemplateSource::Remote(location.to_string());
        }
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "ssh" | "git") => {
                TemplateSource::Remote(location.to_string())
            }
            _ => TemplateSource::Directory(PathBuf::from(location)),
        }
    }
}

impl From<&Path> for TemplateSource {
    fn from(path: &Path) -> Self {
        TemplateSource::Directory(path.to_path_buf())
    }
}

impl From<PathBuf> for TemplateSource {
    fn from(path: PathBuf) -> Self {
        TemplateSource::Directory(path)
    }
}

// user@host:path
fn is_scp_like(location: &str) -> bool {
    match location.split_once(':') {
        Some((prefix, path)) => {
            prefix.contains('@') && !prefix.contains('/') && !path.starts_with("//") && !path.is_empty()
        }
        None => false,
    }
}

/// Materializes a remote repository into a local directory.
pub trait SourceCloner: Send + Sync {
    /// Clone `url` into `target`, which must not exist yet.
    fn clone_repository(&self, url: &str, target: &Path) -> Result<()>;
}

/// Clones with the `git` command line client.
#[derive(Debug, Clone)]
pub struct GitCloner {
    git_binary: String,
    timeout: Duration,
}

impl GitCloner {
    pub fn new(git_binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            git_binary: git_binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self::new(
            config.git_binary.clone(),
            Duration::from_secs(config.clone_timeout_seconds),
        )
    }
}

impl SourceCloner for GitCloner {
    fn clone_repository(&self, url: &str, target: &Path) -> Result<()> {
        debug!(url, target = %target.display(), "Cloning template source");

        let mut child = Command::new(&self.git_binary)
            .args(["clone", "--quiet", "--"])
            .arg(url)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::SourceRetrieval(format!("failed to run '{}': {}", self.git_binary, e))
            })?;

        // Drained concurrently so a chatty client cannot fill the pipe
        let stderr = child.stderr.take();
        let drain = std::thread::spawn(move || {
            let mut output = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut output);
            }
            output
        });

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    let stderr = drain.join().unwrap_or_default();
                    return Err(Error::SourceRetrieval(format!(
                        "git clone of '{}' failed ({}): {}",
                        url,
                        status,
                        stderr.trim()
                    )));
                }
                Ok(None) if Instant::now() >= deadline => {
                    warn!(url, timeout = ?self.timeout, "Clone timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::SourceRetrieval(format!(
                        "git clone of '{}' timed out after {:?}",
                        url, self.timeout
                    )));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    return Err(Error::SourceRetrieval(format!(
                        "failed to wait for git clone of '{}': {}",
                        url, e
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_location() {
        assert_eq!(
            TemplateSource::from_location("https://github.com/scailfin/rob-demo-hello-world.git"),
            TemplateSource::Remote("https://github.com/scailfin/rob-demo-hello-world.git".into())
        );
        assert_eq!(
            TemplateSource::from_location("git@github.com:scailfin/rob-demo.git"),
            TemplateSource::Remote("git@github.com:scailfin/rob-demo.git".into())
        );
        assert_eq!(
            TemplateSource::from_location("ssh://git@example.com/repo.git"),
            TemplateSource::Remote("ssh://git@example.com/repo.git".into())
        );
        assert_eq!(
            TemplateSource::from_location("./benchmarks/helloworld"),
            TemplateSource::Directory(PathBuf::from("./benchmarks/helloworld"))
        );
        assert_eq!(
            TemplateSource::from_location("/srv/bench"),
            TemplateSource::Directory(PathBuf::from("/srv/bench"))
        );
        assert_eq!(
            TemplateSource::from_location("C:\\bench"),
            TemplateSource::Directory(PathBuf::from("C:\\bench"))
        );
    }

    #[test]
    fn test_missing_git_binary() {
        let dir = tempfile::tempdir().unwrap();
        let cloner = GitCloner::new("/nonexistent/git-binary", Duration::from_secs(5));
        let err = cloner
            .clone_repository("https://example.com/repo.git", &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Error::SourceRetrieval(_)));
    }

    #[cfg(unix)]
    fn fake_git(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-git");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stderr_does_not_stall() {
        let dir = tempfile::tempdir().unwrap();
        // Well past the pipe buffer
        let git = fake_git(dir.path(), "head -c 1000000 /dev/zero | tr '\\0' x >&2\nexit 3");
        let cloner = GitCloner::new(git.to_string_lossy(), Duration::from_secs(30));

        let started = Instant::now();
        let err = cloner
            .clone_repository("https://example.com/repo.git", &dir.path().join("out"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(!msg.contains("timed out"), "{}", &msg[..msg.len().min(200)]);
        assert!(msg.contains("xxxx"));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[cfg(unix)]
    #[test]
    fn test_clone_success_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        // Arguments: clone --quiet -- <url> <target>
        let git = fake_git(dir.path(), "mkdir -p \"$5\"");
        let cloner = GitCloner::new(git.to_string_lossy(), Duration::from_secs(30));
        let target = dir.path().join("out");
        cloner
            .clone_repository("https://example.com/repo.git", &target)
            .unwrap();
        assert!(target.is_dir());

        let slow = dir.path().join("slow");
        std::fs::create_dir_all(&slow).unwrap();
        let git = fake_git(&slow, "exec sleep 10");
        let cloner = GitCloner::new(git.to_string_lossy(), Duration::from_millis(200));
        let err = cloner
            .clone_repository("https://example.com/repo.git", &dir.path().join("never"))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_from_config() {
        let mut config = RepositoryConfig::with_base_dir("/tmp/x");
        config.git_binary = "/opt/git".into();
        config.clone_timeout_seconds = 7;
        let cloner = GitCloner::from_config(&config);
        assert_eq!(cloner.git_binary, "/opt/git");
        assert_eq!(cloner.timeout, Duration::from_secs(7));
    }
}
