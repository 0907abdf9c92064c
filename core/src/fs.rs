//! Rooted filesystem access.
//!
//! Routine and migration loading never touch the operating system directly;
//! they go through [`FileSystem`], which resolves every path relative to a
//! root. Two implementations ship with the crate:
//!
//! - [`DirFs`] maps the root onto a real directory.
//! - [`MemFs`] keeps the whole tree in memory and is what the test suites
//!   and dry-run printing use.
//!
//! Paths handed to a `FileSystem` are always relative. Absolute paths and
//! `..` components that would climb above the root are refused.
//!
//! ```
//! use std::path::Path;
//! use sqlmill_core::fs::{FileSystem, MemFs, FILE_MODE};
//!
//! let fs = MemFs::new();
//! fs.write_file(Path::new("queries/users.sql"), b"-- name: all\nSELECT 1", FILE_MODE)
//!     .unwrap();
//!
//! let mut seen = Vec::new();
//! fs.walk(Path::new(""), &mut |path, info| {
//!     seen.push((path.to_path_buf(), info.is_dir));
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(seen.len(), 2);
//! assert!(seen[0].1);
//! ```

use std::collections::BTreeMap;
use std::fs::{self as stdfs, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use walkdir::WalkDir;

/// Default permission bits for files written by sqlmill.
pub const FILE_MODE: u32 = 0o644;

/// Default permission bits for directories created by sqlmill.
pub const DIR_MODE: u32 = 0o755;

/// How [`FileSystem::open_file`] should open a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    /// Fail with [`io::ErrorKind::AlreadyExists`] when the file exists.
    pub create_new: bool,
}

impl OpenFlags {
    /// Read-only access to an existing file.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Write access, creating or truncating the file.
    pub fn write_truncate() -> Self {
        Self {
            write: true,
            truncate: true,
            create: true,
            ..Self::default()
        }
    }

    /// Write access to a file that must not exist yet.
    pub fn create_new() -> Self {
        Self {
            write: true,
            create_new: true,
            ..Self::default()
        }
    }
}

/// What [`FileSystem::walk`] reports about each entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Final path component.
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes; zero for directories.
    pub len: u64,
}

impl FileInfo {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// An open file handle.
pub trait File: Read + Write {}

impl<T: Read + Write> File for T {}

/// A directory tree addressed by root-relative paths.
pub trait FileSystem {
    /// Opens an existing file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Opens a file with explicit flags. `mode` applies when the file is
    /// created.
    fn open_file(&self, path: &Path, flags: OpenFlags, mode: u32) -> io::Result<Box<dyn File + '_>>;

    /// Visits every entry below `start`, depth-first, in lexicographic
    /// order within each directory. `start` itself is not reported.
    ///
    /// The visitor receives root-relative paths; an error returned by the
    /// visitor stops the walk and is passed through.
    fn walk(
        &self,
        start: &Path,
        visit: &mut dyn FnMut(&Path, &FileInfo) -> io::Result<()>,
    ) -> io::Result<()>;

    /// Writes `data` to `path`, creating intermediate directories.
    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()>;

    /// Creates `path` and every missing parent.
    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Returns `true` if an entry exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Joins path segments.
    fn join(&self, parts: &[&str]) -> PathBuf {
        parts.iter().collect()
    }
}

/// Normalizes a root-relative path, refusing anything that leaves the root.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escapes_root(path));
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escapes_root(path)),
        }
    }
    Ok(normalized)
}

fn escapes_root(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("path '{}' escapes the root", path.display()),
    )
}

/// A [`FileSystem`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(self.root.join(normalize(path)?))
    }
}

impl FileSystem for DirFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let file = stdfs::File::open(self.resolve(path)?)?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, mode: u32) -> io::Result<Box<dyn File + '_>> {
        let full = self.resolve(path)?;
        if flags.create || flags.create_new {
            if let Some(parent) = full.parent() {
                create_dirs(parent, DIR_MODE)?;
            }
        }

        let mut options = OpenOptions::new();
        options
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .truncate(flags.truncate)
            .create(flags.create)
            .create_new(flags.create_new);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(Box::new(options.open(full)?))
    }

    fn walk(
        &self,
        start: &Path,
        visit: &mut dyn FnMut(&Path, &FileInfo) -> io::Result<()>,
    ) -> io::Result<()> {
        let base = self.resolve(start)?;
        for entry in WalkDir::new(&base).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|err| io::Error::other(err.to_string()))?;
            let is_dir = entry.file_type().is_dir();
            let info = FileInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
                len: if is_dir { 0 } else { entry.metadata()?.len() },
            };
            visit(relative, &info)?;
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
        debug!(path = %path.display(), bytes = data.len(), "writing file");
        let mut file = self.open_file(path, OpenFlags::write_truncate(), mode)?;
        file.write_all(data)?;
        file.flush()
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        create_dirs(&self.resolve(path)?, mode)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_ok_and(|full| full.exists())
    }
}

fn create_dirs(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = stdfs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = BTreeMap<PathBuf, Node>;

/// An in-memory [`FileSystem`].
///
/// Clones share the same tree, so a test can hand one clone to the code
/// under test and inspect the result through another.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    tree: Arc<Mutex<Tree>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root-relative paths of every file, in walk order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Contents of the file at `path` as UTF-8 text.
    pub fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let mut text = String::new();
        self.open(path)?.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Deletes a file or an empty directory.
    pub fn remove(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path)?;
        self.lock()
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| not_found(&path))
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("'{}' does not exist", path.display()),
    )
}

fn insert_parents(tree: &mut Tree, path: &Path) -> io::Result<()> {
    let mut current = PathBuf::new();
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    for component in parent.components() {
        current.push(component);
        match tree.get(&current) {
            Some(Node::File(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("'{}' is not a directory", current.display()),
                ));
            }
            Some(Node::Dir) => {}
            None => {
                tree.insert(current.clone(), Node::Dir);
            }
        }
    }
    Ok(())
}

impl FileSystem for MemFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let path = normalize(path)?;
        match self.lock().get(&path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("'{}' is a directory", path.display()),
            )),
            None => Err(not_found(&path)),
        }
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, _mode: u32) -> io::Result<Box<dyn File + '_>> {
        let path = normalize(path)?;
        let mut tree = self.lock();
        let existing = match tree.get(&path) {
            Some(Node::Dir) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("'{}' is a directory", path.display()),
                ));
            }
            Some(Node::File(data)) => Some(data.clone()),
            None => None,
        };

        let data = match existing {
            Some(_) if flags.create_new => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("'{}' already exists", path.display()),
                ));
            }
            Some(_) if flags.truncate => Vec::new(),
            Some(data) => data,
            None if flags.create || flags.create_new => {
                insert_parents(&mut tree, &path)?;
                tree.insert(path.clone(), Node::File(Vec::new()));
                Vec::new()
            }
            None => return Err(not_found(&path)),
        };
        drop(tree);

        let mut cursor = Cursor::new(data);
        if flags.append {
            cursor.seek(SeekFrom::End(0))?;
        }
        Ok(Box::new(MemFile {
            fs: self.clone(),
            path,
            cursor,
            writable: flags.write || flags.append,
            dirty: flags.truncate,
        }))
    }

    fn walk(
        &self,
        start: &Path,
        visit: &mut dyn FnMut(&Path, &FileInfo) -> io::Result<()>,
    ) -> io::Result<()> {
        let start = normalize(start)?;
        let entries: Vec<(PathBuf, FileInfo)> = {
            let tree = self.lock();
            if !start.as_os_str().is_empty() && !tree.contains_key(&start) {
                return Err(not_found(&start));
            }
            tree.iter()
                .filter(|(path, _)| path.starts_with(&start) && **path != start)
                .map(|(path, node)| {
                    let name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let info = match node {
                        Node::Dir => FileInfo {
                            name,
                            is_dir: true,
                            len: 0,
                        },
                        Node::File(data) => FileInfo {
                            name,
                            is_dir: false,
                            len: data.len() as u64,
                        },
                    };
                    (path.clone(), info)
                })
                .collect()
        };

        for (path, info) in &entries {
            visit(path, info)?;
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, data: &[u8], _mode: u32) -> io::Result<()> {
        let path = normalize(path)?;
        let mut tree = self.lock();
        if matches!(tree.get(&path), Some(Node::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("'{}' is a directory", path.display()),
            ));
        }
        insert_parents(&mut tree, &path)?;
        tree.insert(path, Node::File(data.to_vec()));
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, _mode: u32) -> io::Result<()> {
        let path = normalize(path)?;
        if path.as_os_str().is_empty() {
            return Ok(());
        }
        let mut tree = self.lock();
        insert_parents(&mut tree, &path)?;
        match tree.get(&path) {
            Some(Node::File(_)) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' is a file", path.display()),
            )),
            Some(Node::Dir) => Ok(()),
            None => {
                tree.insert(path, Node::Dir);
                Ok(())
            }
        }
    }

    fn exists(&self, path: &Path) -> bool {
        normalize(path).is_ok_and(|path| path.as_os_str().is_empty() || self.lock().contains_key(&path))
    }
}

/// Handle returned by [`MemFs::open_file`]. Writes reach the tree on
/// flush and on drop.
struct MemFile {
    fs: MemFs,
    path: PathBuf,
    cursor: Cursor<Vec<u8>>,
    writable: bool,
    dirty: bool,
}

impl MemFile {
    fn sync(&mut self) {
        if self.dirty {
            self.fs
                .lock()
                .insert(self.path.clone(), Node::File(self.cursor.get_ref().clone()));
            self.dirty = false;
        }
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("'{}' is not open for writing", self.path.display()),
            ));
        }
        self.dirty = true;
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync();
        Ok(())
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.sync();
    }
}
