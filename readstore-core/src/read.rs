//! Packed read record
//!
//! A read is stored as a single `u64`:
//! - bits 0-30: start
//! - bits 31-61: end
//! - bit 62: forward flag (only meaningful when bit 63 is set)
//! - bit 63: strand known
//!
//! This layout is shared with parsers and viewers and must not change.

use crate::types::{GenomicPos, Strand};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Largest coordinate representable in a packed read
pub const MAX_POSITION: GenomicPos = 0x7FFF_FFFF;

const POSITION_MASK: u64 = 0x7FFF_FFFF;
const END_SHIFT: u32 = 31;
const FORWARD_BIT: u64 = 1 << 62;
const KNOWN_BIT: u64 = 1 << 63;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedRead(u64);

impl PackedRead {
    /// Packs a read. Coordinates given in the wrong order are swapped.
    pub fn new(start: GenomicPos, end: GenomicPos, strand: Strand) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        debug_assert!(end <= MAX_POSITION, "position {end} does not fit in a packed read");

        let mut bits = (start as u64 & POSITION_MASK) | ((end as u64 & POSITION_MASK) << END_SHIFT);
        match strand {
            Strand::Forward => bits |= KNOWN_BIT | FORWARD_BIT,
            Strand::Reverse => bits |= KNOWN_BIT,
            Strand::Unknown => {}
        }
        Self(bits)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn start(self) -> GenomicPos {
        (self.0 & POSITION_MASK) as GenomicPos
    }

    pub fn end(self) -> GenomicPos {
        ((self.0 >> END_SHIFT) & POSITION_MASK) as GenomicPos
    }

    pub fn strand(self) -> Strand {
        if self.0 & KNOWN_BIT == 0 {
            Strand::Unknown
        } else if self.0 & FORWARD_BIT != 0 {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }

    /// Inclusive length, so a read covering a single base has length 1
    pub fn length(self) -> GenomicPos {
        self.end() - self.start() + 1
    }

    pub fn midpoint(self) -> GenomicPos {
        self.start() + (self.end() - self.start()) / 2
    }

    /// Inclusive overlap test on both ends
    pub fn overlaps(self, other: PackedRead) -> bool {
        self.start() <= other.end() && self.end() >= other.start()
    }

    /// Distance spanned by a pair of reads, from the lowest start to the highest end
    pub fn fragment_length(a: PackedRead, b: PackedRead) -> GenomicPos {
        a.end().max(b.end()) - a.start().min(b.start())
    }

    pub fn strand_symbol(self) -> char {
        self.strand().symbol()
    }

    pub fn with_strand(self, strand: Strand) -> Self {
        Self::new(self.start(), self.end(), strand)
    }
}

impl Ord for PackedRead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start()
            .cmp(&other.start())
            .then_with(|| self.end().cmp(&other.end()))
            .then_with(|| self.strand().rank().cmp(&other.strand().rank()))
    }
}

impl PartialOrd for PackedRead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackedRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strand() {
            Strand::Forward => write!(f, "{}..{}", self.start(), self.end()),
            Strand::Reverse => write!(f, "complement({}..{})", self.start(), self.end()),
            Strand::Unknown => write!(f, "unknown({}..{})", self.start(), self.end()),
        }
    }
}

impl fmt::Debug for PackedRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedRead({self})")
    }
}
