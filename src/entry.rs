use bitflags::bitflags;
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Builds the mask covering bits `high..=low`, like the kernel's `GENMASK()`.
const fn genmask(high: u32, low: u32) -> u64 {
    (!0u64 << low) & (!0u64 >> (63 - high))
}

// source: include/linux/swap.h
const MAX_SWAPFILES_SHIFT: u32 = 5;

// Field layout from fs/proc/task_mmu.c
const PFN_MASK: u64 = genmask(54, 0);
const SWAP_TYPE_MASK: u64 = genmask(MAX_SWAPFILES_SHIFT - 1, 0);
const SWAP_OFFSET_MASK: u64 = genmask(54, MAX_SWAPFILES_SHIFT);

bitflags! {
    /// Status bits of a pagemap entry.
    ///
    /// These sit above the frame/offset fields.  `PRESENT` and `SWAP` select
    /// how the low 55 bits are read; the rest are carried for diagnostic
    /// visibility and play no part in address translation.
    #[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct EntryFlags: u64 {
        /// The page was written to since soft-dirty tracking was last cleared.
        const SOFT_DIRTY = 1 << 55;
        /// The page is mapped by exactly one process.
        const MMAP_EXCLUSIVE = 1 << 56;
        /// The page is file-backed or shared-anonymous.
        const FILE_SHARED = 1 << 61;
        /// The page has been evicted to swap.
        const SWAP = 1 << 62;
        /// The page is resident in RAM.
        const PRESENT = 1 << 63;
    }
}

/// One decoded pagemap entry.
///
/// Decoding is total: every 64-bit value maps to exactly one variant.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PageTableEntry {
    /// The page is resident; `pfn * page_size` is its physical base address.
    Present {
        /// Page frame number (bits 0-54).
        pfn: u64,
        /// Diagnostic status bits.
        flags: EntryFlags,
    },
    /// The page's contents live in a swap area.
    Swapped {
        /// Offset into the swap area (bits 5-54).
        offset: u64,
        /// Index of the swap area (bits 0-4).
        swap_type: u8,
        /// Diagnostic status bits.
        flags: EntryFlags,
    },
    /// The page is mapped to neither RAM nor swap.
    NotPresent,
}

impl PageTableEntry {
    /// Decodes a raw 8-byte pagemap record.
    ///
    /// The `PRESENT` bit alone decides whether the entry carries a usable
    /// frame number: a record with both `PRESENT` and `SWAP` set still decodes
    /// as [`PageTableEntry::Present`], with the PFN read from the low 55 bits.
    pub fn parse(raw: u64) -> Self {
        let flags = EntryFlags::from_bits_truncate(raw);

        if flags.contains(EntryFlags::PRESENT) {
            PageTableEntry::Present {
                pfn: raw & PFN_MASK,
                flags,
            }
        } else if flags.contains(EntryFlags::SWAP) {
            PageTableEntry::Swapped {
                offset: (raw & SWAP_OFFSET_MASK) >> MAX_SWAPFILES_SHIFT,
                swap_type: (raw & SWAP_TYPE_MASK) as u8,
                flags,
            }
        } else {
            PageTableEntry::NotPresent
        }
    }

    /// Returns true if the page is resident in RAM.
    pub fn is_present(&self) -> bool {
        matches!(self, PageTableEntry::Present { .. })
    }

    /// The page frame number, if the page is resident.
    pub fn pfn(&self) -> Option<u64> {
        match *self {
            PageTableEntry::Present { pfn, .. } => Some(pfn),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genmask() {
        assert_eq!(genmask(3, 1), 0b1110);
        assert_eq!(genmask(3, 0), 0b1111);
        assert_eq!(genmask(63, 62), 0b11 << 62);
        assert_eq!(genmask(63, 0), u64::MAX);
    }

    #[test]
    fn test_parse_present() {
        let entry = PageTableEntry::parse((1 << 63) | 0x1234);
        assert_eq!(
            entry,
            PageTableEntry::Present {
                pfn: 0x1234,
                flags: EntryFlags::PRESENT,
            }
        );

        // every one of the 55 low bits belongs to the frame number
        let entry = PageTableEntry::parse((1 << 63) | PFN_MASK);
        assert_eq!(entry.pfn(), Some(PFN_MASK));
    }

    #[test]
    fn test_parse_present_with_diagnostics() {
        let raw = (1u64 << 63) | (1 << 56) | (1 << 55) | 0b11;
        match PageTableEntry::parse(raw) {
            PageTableEntry::Present { pfn, flags } => {
                assert_eq!(pfn, 0b11);
                assert!(flags.contains(EntryFlags::MMAP_EXCLUSIVE | EntryFlags::SOFT_DIRTY));
                assert!(!flags.contains(EntryFlags::FILE_SHARED));
            }
            other => panic!("wrong decoding: {:?}", other),
        }
    }

    #[test]
    fn test_parse_present_wins_over_swap() {
        // A record with both selector bits keeps the frame-number field layout;
        // the swap interpretation never overrides a resident page.
        let raw = (1u64 << 63) | (1 << 62) | 0x62;
        match PageTableEntry::parse(raw) {
            PageTableEntry::Present { pfn, flags } => {
                assert_eq!(pfn, 0x62);
                assert!(flags.contains(EntryFlags::PRESENT | EntryFlags::SWAP));
            }
            other => panic!("wrong decoding: {:?}", other),
        }
    }

    #[test]
    fn test_parse_swapped() {
        let raw = (1u64 << 62) | (0b11 << 5) | 0b00010;
        match PageTableEntry::parse(raw) {
            PageTableEntry::Swapped {
                offset,
                swap_type,
                flags,
            } => {
                assert_eq!(offset, 0b11);
                assert_eq!(swap_type, 0b10);
                assert!(flags.contains(EntryFlags::SWAP));
            }
            other => panic!("wrong decoding: {:?}", other),
        }
        assert!(!PageTableEntry::parse(raw).is_present());
    }

    #[test]
    fn test_parse_swap_fields_span_full_width() {
        let raw = (1u64 << 62) | SWAP_OFFSET_MASK | SWAP_TYPE_MASK;
        match PageTableEntry::parse(raw) {
            PageTableEntry::Swapped {
                offset, swap_type, ..
            } => {
                // 50-bit offset, 5-bit type
                assert_eq!(offset, (1 << 50) - 1);
                assert_eq!(swap_type, 0x1f);
            }
            other => panic!("wrong decoding: {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_present() {
        assert_eq!(PageTableEntry::parse(0), PageTableEntry::NotPresent);
        // stale low bits without a selector mean nothing
        assert_eq!(PageTableEntry::parse(0x1234), PageTableEntry::NotPresent);
        assert_eq!(PageTableEntry::parse(1 << 55), PageTableEntry::NotPresent);
        assert_eq!(PageTableEntry::parse(PFN_MASK), PageTableEntry::NotPresent);
    }
}
