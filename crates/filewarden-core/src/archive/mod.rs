/// Archive builder — packages the watched folders into a single zip for
/// `/all` (media only) and `/zip` (everything).
///
/// Folders are walked recursively with `jwalk`. Each file is stored as
/// `<folder-name>/<path relative to folder>` so files from different watched
/// folders cannot collide; the rare remaining duplicate name is skipped with
/// a warning.
///
/// The returned [`Archive`] is a drop guard: the zip on disk is removed when
/// the guard goes out of scope, whether the send that follows succeeded,
/// failed, or the build itself bailed out half-way.
pub mod media;

pub use media::{MediaSet, DEFAULT_MEDIA_EXTENSIONS};

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Which files an archive collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Files whose extension is in the configured [`MediaSet`].
    AllMedia,
    /// Every regular file.
    Everything,
}

impl ArchiveKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::AllMedia => "all_media_files.zip",
            Self::Everything => "specified_folders.zip",
        }
    }

    /// Caption attached to the archive when it is sent.
    pub fn caption(self) -> &'static str {
        match self {
            Self::AllMedia => "All media files",
            Self::Everything => "Specified folders zipped",
        }
    }

    /// Media containers are already compressed; deflating them only burns CPU.
    fn compression(self) -> CompressionMethod {
        match self {
            Self::AllMedia => CompressionMethod::Stored,
            Self::Everything => CompressionMethod::Deflated,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Nothing matched; no archive was written.
    #[error("no matching files found")]
    Empty,
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A finished zip on disk. Removed when dropped.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    entries: usize,
    total_bytes: u64,
}

impl Archive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of files stored in the archive.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Sum of the uncompressed sizes of the stored files.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Archive: removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Archive: failed to remove {}: {e}", self.path.display()),
        }
    }
}

/// A file selected for packaging.
struct Source {
    entry_name: String,
    path: PathBuf,
    size: u64,
}

/// Builds archives of the watched folders into a working directory.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    folders: Vec<PathBuf>,
    work_dir: PathBuf,
    media: MediaSet,
}

impl ArchiveBuilder {
    pub fn new(folders: Vec<PathBuf>, work_dir: PathBuf, media: MediaSet) -> Self {
        Self {
            folders,
            work_dir,
            media,
        }
    }

    pub fn media(&self) -> &MediaSet {
        &self.media
    }

    /// Collect matching files and write them into `<work_dir>/<kind file name>`.
    pub fn build(&self, kind: ArchiveKind) -> Result<Archive, ArchiveError> {
        let output = self.work_dir.join(kind.file_name());
        let sources = self.collect(kind, &output);
        if sources.is_empty() {
            return Err(ArchiveError::Empty);
        }

        fs::create_dir_all(&self.work_dir).map_err(|e| ArchiveError::io(&self.work_dir, e))?;
        let file = File::create(&output).map_err(|e| ArchiveError::io(&output, e))?;

        // From here on, any early return drops the guard and removes the file.
        let mut archive = Archive {
            path: output,
            entries: 0,
            total_bytes: 0,
        };
        let mut zip = ZipWriter::new(BufWriter::new(file));

        for source in &sources {
            // Open before start_file so an unreadable file leaves no empty entry.
            let mut input = match File::open(&source.path) {
                Ok(f) => f,
                Err(e) => {
                    warn!("Archive: skipping {}: {e}", source.path.display());
                    continue;
                }
            };
            let options = SimpleFileOptions::default()
                .compression_method(kind.compression())
                .large_file(source.size >= u64::from(u32::MAX));
            zip.start_file(source.entry_name.as_str(), options)?;
            io::copy(&mut input, &mut zip).map_err(|e| ArchiveError::io(&source.path, e))?;
            archive.entries += 1;
            archive.total_bytes += source.size;
        }

        let mut writer = zip.finish()?;
        writer
            .flush()
            .map_err(|e| ArchiveError::io(&archive.path, e))?;

        if archive.entries == 0 {
            return Err(ArchiveError::Empty);
        }
        debug!(
            "Archive: wrote {} entries to {}",
            archive.entries,
            archive.path.display()
        );
        Ok(archive)
    }

    /// Walk every folder and select the files `kind` asks for.
    fn collect(&self, kind: ArchiveKind, output: &Path) -> Vec<Source> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut sources = Vec::new();

        for folder in &self.folders {
            let label = folder_label(folder);
            let walker = jwalk::WalkDir::new(folder)
                .skip_hidden(false)
                .follow_links(false)
                .sort(true)
                .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) => {
                        warn!("Archive: unreadable entry under {}: {err}", folder.display());
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if kind == ArchiveKind::AllMedia
                    && !self.media.matches_name(&entry.file_name().to_string_lossy())
                {
                    continue;
                }

                let path = entry.path();
                // The work dir may itself live inside a watched folder.
                if path == output {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(folder) else {
                    continue;
                };
                let entry_name = entry_name(&label, relative);
                if !seen.insert(entry_name.clone()) {
                    warn!("Archive: duplicate entry {entry_name}, skipping {}", path.display());
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                sources.push(Source {
                    entry_name,
                    path,
                    size,
                });
            }
        }
        sources
    }
}

/// Top-level directory name used inside the archive for `folder`.
fn folder_label(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_owned())
}

/// `label/a/b.txt`, always with forward slashes.
fn entry_name(label: &str, relative: &Path) -> String {
    let mut name = label.to_owned();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push('/');
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}
