//! Resolve a process's virtual addresses to physical addresses by decoding the
//! kernel's per-process page table mapping file, `/proc/<pid>/pagemap`.
//!
//! Every virtual page of a process has an 8-byte entry in its pagemap file
//! describing the page's mapping state: resident in RAM (with a page frame
//! number), swapped out (with a swap offset and type), or not mapped at all.
//! The entry layout is documented in `Documentation/admin-guide/mm/pagemap.rst`
//! in the kernel tree.
//!
//! [`PageMap`] reads and decodes those entries.  [`PageMap::translate_range`]
//! walks a virtual address range page by page and combines each resolved page
//! frame with the intra-page offset to form the full physical address.
//!
//! Reading frame numbers requires `CAP_SYS_ADMIN`; the kernel reports a PFN of
//! zero to unprivileged readers.
//!
//! # Examples
//!
//! ```no_run
//! use virt2phys::{PageMap, TranslationOutcome};
//!
//! let page_size = virt2phys::page_size();
//! let mut pagemap = PageMap::open_self().unwrap();
//!
//! for (virt, outcome) in pagemap.translate_range(page_size, 0x5000_0000, 0x4000) {
//!     match outcome {
//!         TranslationOutcome::Resolved(phys) => println!("virt:0x{:x}, phys:0x{:x}", virt, phys),
//!         TranslationOutcome::NotPresent => println!("virt:0x{:x}, (not present)", virt),
//!         TranslationOutcome::Failed(e) => println!("virt:0x{:x}, lookup failed: {}", virt, e),
//!     }
//! }
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

mod entry;
pub use crate::entry::*;

mod pagemap;
pub use crate::pagemap::*;

/// Common result type of pagemap operations.
pub type PagemapResult<T> = Result<T, PagemapError>;

/// Error type for pagemap operations.
#[derive(Debug)]
pub enum PagemapError {
    /// The pagemap file exists but cannot be read with the current privileges.
    PermissionDenied(Option<PathBuf>),
    /// The pagemap file (or the process it belongs to) does not exist.
    NotFound(Option<PathBuf>),
    /// The pagemap file ended before the requested entry could be read.
    Incomplete(Option<PathBuf>),
    /// Any other I/O error while accessing the pagemap file.
    Io(io::Error, Option<PathBuf>),
}

impl fmt::Display for PagemapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PagemapError::*;
        match self {
            PermissionDenied(Some(p)) => write!(f, "Permission denied: {}", p.display()),
            PermissionDenied(None) => write!(f, "Permission denied"),
            NotFound(Some(p)) => write!(f, "File not found: {}", p.display()),
            NotFound(None) => write!(f, "File not found"),
            Incomplete(Some(p)) => write!(f, "Data incomplete: {}", p.display()),
            Incomplete(None) => write!(f, "Data incomplete"),
            Io(inner, Some(p)) => write!(f, "I/O error reading {}: {}", p.display(), inner),
            Io(inner, None) => write!(f, "I/O error: {}", inner),
        }
    }
}

impl std::error::Error for PagemapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PagemapError::Io(e, _) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PagemapError {
    fn from(err: io::Error) -> Self {
        use std::io::ErrorKind;
        let kind = err.kind();
        let path: Option<PathBuf> = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<IoErrorWrapper>())
            .map(|wrapper| wrapper.path.clone());
        match kind {
            ErrorKind::PermissionDenied => PagemapError::PermissionDenied(path),
            ErrorKind::NotFound => PagemapError::NotFound(path),
            ErrorKind::UnexpectedEof => PagemapError::Incomplete(path),
            _ => PagemapError::Io(err, path),
        }
    }
}

/// An `io::Error` payload that carries the path of the file the error came from.
#[derive(Debug)]
struct IoErrorWrapper {
    path: PathBuf,
    inner: io::Error,
}

impl fmt::Display for IoErrorWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.inner, self.path.display())
    }
}

impl std::error::Error for IoErrorWrapper {}

fn wrap_io_error(path: &Path, e: io::Error) -> io::Error {
    let kind = e.kind();
    io::Error::new(
        kind,
        IoErrorWrapper {
            path: path.to_owned(),
            inner: e,
        },
    )
}

/// A wrapper around a `File` that remembers the path it was opened from.
///
/// Errors produced by reads and seeks carry that path, so they can later be
/// classified into a [`PagemapError`] pointing at the offending file.
#[derive(Debug)]
pub struct FileWrapper {
    inner: File,
    path: PathBuf,
}

impl FileWrapper {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> io::Result<FileWrapper> {
        let p = path.as_ref();
        let inner = File::open(p).map_err(|e| wrap_io_error(p, e))?;
        Ok(FileWrapper {
            inner,
            path: p.to_owned(),
        })
    }
}

impl Read for FileWrapper {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| wrap_io_error(&self.path, e))
    }
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner
            .read_exact(buf)
            .map_err(|e| wrap_io_error(&self.path, e))
    }
}

impl Seek for FileWrapper {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos).map_err(|e| wrap_io_error(&self.path, e))
    }
}

/// Memory page size, in bytes.
///
/// This is calculated from `sysconf(_SC_PAGESIZE)`.
pub fn page_size() -> u64 {
    rustix::param::page_size() as u64
}
