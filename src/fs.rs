use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// An entry returned when listing a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Read-only view of a directory tree, used by the manifest builder and the asset loader
pub trait FileSystem {
    /// Resolve a path to an absolute one
    fn absolute(&self, path: &Path) -> io::Result<PathBuf>;

    /// Whether the path is an existing directory
    fn is_dir(&self, path: &Path) -> bool;

    /// List the direct children of a directory, sorted by name
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Read a whole file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Last modification time in whole unix seconds
    fn modified_secs(&self, path: &Path) -> io::Result<u64>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().into_string().map_err(|name| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("Path is not UTF-8: {:?}", name),
                )
            })?;
            // Follows symlinks so linked directories are walked like real ones
            let is_dir = fs::metadata(entry.path())?.is_dir();
            entries.push(DirEntry {
                name,
                path: entry.path(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn modified_secs(&self, path: &Path) -> io::Result<u64> {
        let modified = fs::metadata(path)?.modified()?;
        // Files dated before the epoch are treated as having no usable date
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Vec<u8>,
    modified: u64,
}

/// An in-memory directory tree for fixtures.
///
/// Directories exist implicitly as ancestors of the files added.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<PathBuf, MemoryFile>,
}

impl MemoryFileSystem {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, contents: &[u8], modified: u64) -> &mut Self {
        self.files.insert(
            lexical_absolute(path.as_ref()),
            MemoryFile {
                contents: contents.to_vec(),
                modified,
            },
        );
        self
    }

    /// Remove a file, returning whether it existed
    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        self.files.remove(&lexical_absolute(path.as_ref())).is_some()
    }

    fn file(&self, path: &Path) -> io::Result<&MemoryFile> {
        self.files
            .get(&lexical_absolute(path))
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("No such file: {}", path.display())))
    }
}

impl FileSystem for MemoryFileSystem {
    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        let path = lexical_absolute(path);
        if self.files.contains_key(&path) || self.is_dir(&path) {
            Ok(path)
        } else {
            Err(io::Error::new(ErrorKind::NotFound, format!("No such path: {}", path.display())))
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = lexical_absolute(path);
        self.files.keys().any(|file| file != &dir && file.starts_with(&dir))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let dir = lexical_absolute(path);
        if !self.is_dir(&dir) {
            return Err(io::Error::new(ErrorKind::NotFound, format!("No such directory: {}", dir.display())));
        }

        let mut children: BTreeMap<String, DirEntry> = BTreeMap::new();
        for file in self.files.keys() {
            let Ok(rest) = file.strip_prefix(&dir) else {
                continue;
            };
            let mut components = rest.components();
            let Some(Component::Normal(first)) = components.next() else {
                continue;
            };
            let name = first.to_string_lossy().into_owned();
            let is_dir = components.next().is_some();
            children
                .entry(name.clone())
                .and_modify(|entry| entry.is_dir |= is_dir)
                .or_insert_with(|| DirEntry {
                    path: dir.join(&name),
                    name,
                    is_dir,
                });
        }

        Ok(children.into_values().collect())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.file(path).map(|f| f.contents.clone())
    }

    fn modified_secs(&self, path: &Path) -> io::Result<u64> {
        self.file(path).map(|f| f.modified)
    }
}

/// Make a path absolute against `/` and resolve `.` and `..` without touching the disk
fn lexical_absolute(path: &Path) -> PathBuf {
    let mut result = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::ParentDir => {
                result.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    result
}
