use crate::{FileWrapper, PageTableEntry, PagemapError, PagemapResult};

use std::{
    io::{BufReader, Read, Seek, SeekFrom},
    mem::size_of,
    path::Path,
};

/// Per-page result of a range translation.
#[derive(Debug)]
pub enum TranslationOutcome {
    /// The page is resident; carries the full physical address.
    Resolved(u64),
    /// The page is not resident in RAM (unmapped or swapped out).
    NotPresent,
    /// The entry table could not be read at this page; ends the walk.
    Failed(PagemapError),
}

/// Reads and decodes page table entries from `/proc/<pid>/pagemap`.
///
/// The file holds one 8-byte entry per virtual page, indexed by virtual page
/// number.  Reading another process's pagemap requires `CAP_SYS_ADMIN`;
/// without it the kernel reports a frame number of zero for every page.
pub struct PageMap<R> {
    reader: R,
}

impl PageMap<BufReader<FileWrapper>> {
    /// Opens the pagemap file of the process with the given pid.
    pub fn open(pid: i32) -> PagemapResult<Self> {
        Self::open_with_root("/proc", pid)
    }

    /// Opens the pagemap file of the calling process itself.
    pub fn open_self() -> PagemapResult<Self> {
        let file = FileWrapper::open("/proc/self/pagemap")?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Opens a pagemap file under a procfs mounted somewhere other than `/proc`.
    pub fn open_with_root<P: AsRef<Path>>(root: P, pid: i32) -> PagemapResult<Self> {
        let path = root.as_ref().join(pid.to_string()).join("pagemap");
        let file = FileWrapper::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read + Seek> PageMap<R> {
    /// Wraps any seekable reader over an entry table.
    pub fn from_reader(reader: R) -> Self {
        PageMap { reader }
    }

    /// Reads and decodes the table entry for the page at `page_index`.
    pub fn get_entry(&mut self, page_index: u64) -> PagemapResult<PageTableEntry> {
        let offset = page_index * size_of::<u64>() as u64;
        let pos = self.reader.seek(SeekFrom::Start(offset))?;
        if pos != offset {
            // the table ends before the requested entry
            return Err(PagemapError::Incomplete(None));
        }

        let mut entry_bytes = [0; size_of::<u64>()];
        self.reader.read_exact(&mut entry_bytes)?;
        Ok(PageTableEntry::parse(u64::from_ne_bytes(entry_bytes)))
    }

    /// Resolves a single virtual address to a physical address.
    ///
    /// Returns `Ok(None)` if the page is not resident in RAM.
    pub fn translate(&mut self, page_size: u64, virt_addr: u64) -> PagemapResult<Option<u64>> {
        match self.get_entry(virt_addr / page_size)? {
            PageTableEntry::Present { pfn, .. } => {
                Ok(Some(pfn * page_size | (virt_addr & (page_size - 1))))
            }
            _ => Ok(None),
        }
    }

    /// Walks `size` bytes of virtual address space starting at `start`,
    /// yielding one `(virtual address, outcome)` pair per page.
    ///
    /// `start` is aligned down to a page boundary first, so a range beginning
    /// in the middle of a page covers that whole page.  The walk ends after
    /// the first [`TranslationOutcome::Failed`] item: a failed lookup means
    /// the entry table itself is truncated or unreadable, and later pages
    /// cannot fare any better.  Pages that are merely not resident do not
    /// stop the walk.
    pub fn translate_range(&mut self, page_size: u64, start: u64, size: u64) -> TranslateIter<'_, R> {
        debug_assert!(page_size.is_power_of_two());
        let start = start & !(page_size - 1);
        TranslateIter {
            pagemap: self,
            page_size,
            next: start,
            end: start.saturating_add(size),
            failed: false,
        }
    }
}

/// Iterator returned by [`PageMap::translate_range`].
///
/// Finite, lazy, and fused after the first failed lookup.
pub struct TranslateIter<'a, R> {
    pagemap: &'a mut PageMap<R>,
    page_size: u64,
    next: u64,
    end: u64,
    failed: bool,
}

impl<R: Read + Seek> Iterator for TranslateIter<'_, R> {
    type Item = (u64, TranslationOutcome);

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.end {
            return None;
        }
        let virt_addr = self.next;
        self.next = virt_addr.saturating_add(self.page_size);

        let outcome = match self.pagemap.translate(self.page_size, virt_addr) {
            Ok(Some(phys_addr)) => TranslationOutcome::Resolved(phys_addr),
            Ok(None) => TranslationOutcome::NotPresent,
            Err(e) => {
                self.failed = true;
                TranslationOutcome::Failed(e)
            }
        };
        Some((virt_addr, outcome))
    }
}
