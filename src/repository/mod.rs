//! Filesystem-backed template repository.
//!
//! Each template lives under `<base>/<identifier>/`:
//!
//! ```text
//! <base>/
//!   3f9a2c1d/
//!     template.json   normalized specification
//!     static/         verbatim copy of the ingested source tree
//! ```
//!
//! Ingestion stages everything in a hidden directory under `<base>` and
//! publishes it with a single rename, so a failed ingest never leaves a
//! visible entry behind.

mod source;

pub use source::{GitCloner, SourceCloner, TemplateSource};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::RepositoryConfig;
use crate::error::{Error, Result};
use crate::template::{from_document, parse_document, parse_template_file, SpecFormat, WorkflowTemplate};

/// Subdirectory holding the copied source files.
pub const STATIC_DIR: &str = "static";

/// File holding the normalized specification.
pub const TEMPLATE_FILE: &str = "template.json";

/// Specification file names, in discovery order.
pub const SPEC_FILE_CANDIDATES: [&str; 9] = [
    "benchmark.yml",
    "benchmark.yaml",
    "benchmark.json",
    "template.yml",
    "template.yaml",
    "template.json",
    "workflow.yml",
    "workflow.yaml",
    "workflow.json",
];

const IDENTIFIER_LENGTH: usize = 8;
const STAGING_PREFIX: &str = ".staging-";
const CLONE_PREFIX: &str = ".clone-";

/// Store for ingested templates.
pub struct TemplateRepository {
    base_dir: PathBuf,
    max_attempts: u32,
    cloner: Box<dyn SourceCloner>,
}

impl std::fmt::Debug for TemplateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRepository")
            .field("base_dir", &self.base_dir)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl TemplateRepository {
    /// Open a repository that clones remote sources with `git`.
    pub fn open(config: &RepositoryConfig) -> Result<Self> {
        Self::with_cloner(config, GitCloner::from_config(config))
    }

    /// Open a repository with a custom clone capability.
    pub fn with_cloner(config: &RepositoryConfig, cloner: impl SourceCloner + 'static) -> Result<Self> {
        fs::create_dir_all(&config.base_dir)?;
        debug!(base_dir = %config.base_dir.display(), "Opened template repository");
        Ok(Self {
            base_dir: config.base_dir.clone(),
            max_attempts: config.max_attempts.max(1),
            cloner: Box::new(cloner),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ingest a template and return its new identifier.
    ///
    /// `spec_file` names the specification file relative to the source
    /// directory; without it the candidate names are tried in order.
    pub fn ingest(&self, source: &TemplateSource, spec_file: Option<&Path>) -> Result<String> {
        info!(source = ?source, "Ingesting template");

        // The clone lives until the static copy is made
        let (source_dir, _clone) = match source {
            TemplateSource::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(Error::SourceRetrieval(format!(
                        "source directory '{}' does not exist",
                        dir.display()
                    )));
                }
                (dir.clone(), None)
            }
            TemplateSource::Remote(url) => {
                let tmp = self.temp_dir(CLONE_PREFIX)?;
                let target = tmp.path().join("source");
                self.cloner.clone_repository(url, &target)?;
                (target, Some(tmp))
            }
        };

        let spec_path = find_spec_file(&source_dir, spec_file)?;
        debug!(spec_file = %spec_path.display(), "Found specification file");

        let mut template = parse_template_file(&spec_path, &self.allocate_identifier()?)?;

        let staging = self.temp_dir(STAGING_PREFIX)?;
        let base = fs::canonicalize(&self.base_dir).map_err(|e| Error::filesystem(&self.base_dir, e))?;
        copy_tree(&source_dir, &staging.path().join(STATIC_DIR), Some(&base))?;

        let identifier = self.publish(staging.path(), &mut template, || self.allocate_identifier())?;
        info!(
            identifier = %identifier,
            parameters = template.parameters.len(),
            "Template ingested"
        );
        Ok(identifier)
    }

    /// Move a staged entry into place under the template's identifier.
    ///
    /// When another entry took the identifier first, a new one is drawn from
    /// `allocate` and the normalized document is rewritten before retrying.
    fn publish(
        &self,
        staging: &Path,
        template: &mut WorkflowTemplate,
        mut allocate: impl FnMut() -> Result<String>,
    ) -> Result<String> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            write_template(staging, template)?;
            let target = self.entry_dir(&template.identifier);
            match fs::rename(staging, &target) {
                Ok(()) => return Ok(template.identifier.clone()),
                Err(_) if target.exists() && attempts < self.max_attempts => {
                    warn!(identifier = %template.identifier, "Identifier taken during publish, retrying");
                    template.identifier = allocate()?;
                }
                Err(e) => return Err(Error::filesystem(&target, e)),
            }
        }
    }

    fn temp_dir(&self, prefix: &str) -> Result<tempfile::TempDir> {
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.base_dir)
            .map_err(|e| Error::filesystem(&self.base_dir, e))
    }

    /// Load a stored template.
    pub fn get(&self, identifier: &str) -> Result<WorkflowTemplate> {
        let path = self.template_file(identifier)?;
        let content = fs::read_to_string(&path)?;
        let doc = parse_document(&content, SpecFormat::Json)?;
        from_document(&doc, identifier)
    }

    /// Remove a template together with its static files.
    pub fn delete(&self, identifier: &str) -> Result<()> {
        self.template_file(identifier)?;
        fs::remove_dir_all(self.entry_dir(identifier))?;
        info!(identifier, "Template deleted");
        Ok(())
    }

    pub fn exists(&self, identifier: &str) -> bool {
        self.template_file(identifier).is_ok()
    }

    /// Identifiers of all stored templates, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut identifiers = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if self.exists(name) {
                identifiers.push(name.to_string());
            }
        }
        identifiers.sort();
        Ok(identifiers)
    }

    /// Directory with the static files of a stored template.
    pub fn static_dir(&self, identifier: &str) -> Result<PathBuf> {
        self.template_file(identifier)?;
        Ok(self.entry_dir(identifier).join(STATIC_DIR))
    }

    fn entry_dir(&self, identifier: &str) -> PathBuf {
        self.base_dir.join(identifier)
    }

    fn template_file(&self, identifier: &str) -> Result<PathBuf> {
        if !is_valid_identifier(identifier) {
            return Err(Error::UnknownTemplate(identifier.to_string()));
        }
        let path = self.entry_dir(identifier).join(TEMPLATE_FILE);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::UnknownTemplate(identifier.to_string()))
        }
    }

    fn allocate_identifier(&self) -> Result<String> {
        for _ in 0..self.max_attempts {
            let identifier = new_identifier();
            if !self.entry_dir(&identifier).exists() {
                return Ok(identifier);
            }
        }
        Err(Error::InvalidTemplate(format!(
            "could not allocate a template identifier after {} attempts",
            self.max_attempts
        )))
    }
}

/// Locate the specification file in a source directory.
pub fn find_spec_file(dir: &Path, hint: Option<&Path>) -> Result<PathBuf> {
    if let Some(hint) = hint {
        let path = dir.join(hint);
        if path.is_file() {
            return Ok(path);
        }
        return Err(Error::MissingSpecFile { dir: path });
    }
    SPEC_FILE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::MissingSpecFile {
            dir: dir.to_path_buf(),
        })
}

fn write_template(dir: &Path, template: &WorkflowTemplate) -> Result<()> {
    let path = dir.join(TEMPLATE_FILE);
    let content = serde_json::to_string_pretty(&template.to_document())?;
    fs::write(&path, content).map_err(|e| Error::filesystem(&path, e))
}

/// Copy the source tree into `dst` without following symlinks.
///
/// Links are recreated as links, dangling ones included. `exclude` is a
/// canonical directory left out of the copy, used to keep the repository
/// out of its own entries when it lives inside the source.
fn copy_tree(src: &Path, dst: &Path, exclude: Option<&Path>) -> Result<()> {
    let root = fs::canonicalize(src).map_err(|e| Error::filesystem(src, e))?;
    fs::create_dir_all(dst).map_err(|e| Error::filesystem(dst, e))?;

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| exclude.map_or(true, |ex| e.path() != ex));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root.as_path()).to_path_buf();
            Error::filesystem(path, e)
        })?;
        let path = entry.path();
        let rel = match path.strip_prefix(&root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::filesystem(path, e))?;
        } else if file_type.is_symlink() {
            copy_link(path, &target)?;
        } else if file_type.is_file() {
            fs::copy(path, &target).map_err(|e| Error::filesystem(path, e))?;
        } else {
            debug!(path = %path.display(), "Skipping special file");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(path: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(path).map_err(|e| Error::filesystem(path, e))?;
    std::os::unix::fs::symlink(&link, target).map_err(|e| Error::filesystem(path, e))
}

#[cfg(not(unix))]
fn copy_link(path: &Path, _target: &Path) -> Result<()> {
    warn!(path = %path.display(), "Skipping symlink");
    Ok(())
}

fn new_identifier() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..IDENTIFIER_LENGTH].to_string()
}

fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.chars().all(|c| c.is_ascii_alphanumeric())
}
