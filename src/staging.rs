//! On-disk lifecycle of the current and previous wallpaper files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use walkdir::WalkDir;

const STAGING_DIR_NAME: &str = "wallpaper_slideshow";
/// Staged files are named `wallpaper_<post id>.<ext>` so leftovers from an
/// unclean shutdown are recognizable on the next run.
const STAGED_PREFIX: &str = "wallpaper_";
const SAVED_DIR_NAME: &str = "saved";

/// The wallpaper file currently applied (or recovered from a prior run).
#[derive(Debug, Clone, PartialEq)]
pub struct StagedImage {
    pub local_path: PathBuf,
    /// Direct file URL; unknown for a file discovered from a previous run.
    pub source_url: Option<String>,
    /// Post page the file came from; unknown for a discovered file.
    pub post_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
}

impl StagingStore {
    /// Staging directory under the user's picture library, created on
    /// first use.
    pub fn open_default() -> Result<Self> {
        let user_dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
        let pictures = user_dirs
            .picture_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| user_dirs.home_dir().join("Pictures"));
        Self::open(pictures.join(STAGING_DIR_NAME))
    }

    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look for a staged wallpaper left behind by a previous run.
    pub fn find_existing(&self) -> Option<StagedImage> {
        for entry in WalkDir::new(&self.dir).max_depth(1).into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(STAGED_PREFIX) {
                return Some(StagedImage {
                    local_path: entry.path().to_path_buf(),
                    source_url: None,
                    post_url: None,
                });
            }
        }
        None
    }

    /// Write downloaded bytes as the new current file.
    pub fn stage(&self, id: u64, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(format!("{STAGED_PREFIX}{id}.{ext}"));
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Best-effort removal of a file that is no longer current. Failures
    /// are logged, never fatal.
    pub fn retire(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            if path.exists() {
                tracing::warn!("failed to remove old wallpaper {}: {err}", path.display());
            }
        }
    }

    /// Copy the current staged file to a persistent name under the
    /// `saved` folder, named after the source URL when known.
    pub fn save_copy(&self, image: &StagedImage) -> Result<PathBuf> {
        let name = image
            .source_url
            .as_deref()
            .and_then(file_name_from_url)
            .map(str::to_owned)
            .or_else(|| {
                image
                    .local_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .ok_or_else(|| anyhow!("no file name for the current wallpaper"))?;
        let saved_dir = self.dir.join(SAVED_DIR_NAME);
        fs::create_dir_all(&saved_dir)
            .with_context(|| format!("failed to create {}", saved_dir.display()))?;
        let dest = saved_dir.join(name);
        fs::copy(&image.local_path, &dest).with_context(|| {
            format!(
                "failed to copy {} to {}",
                image.local_path.display(),
                dest.display()
            )
        })?;
        Ok(dest)
    }
}

/// Basename of a URL path, query string stripped.
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split('?').next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some("") | None => None,
        Some(name) => Some(name),
    }
}
