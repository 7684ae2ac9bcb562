//! Duplicate removal policies applied during finalisation

use crate::read::PackedRead;
use crate::types::Strand;
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateMode {
    /// Keep counts as observed
    #[default]
    None,
    /// One count per distinct read
    StartAndEnd,
    /// One read per 5' position and strand
    Start,
    /// One read per 3' position and strand
    End,
}

impl DuplicateMode {
    /// Decodes the numeric mode used by parsers. Panics on an unknown code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => DuplicateMode::None,
            1 => DuplicateMode::StartAndEnd,
            2 => DuplicateMode::Start,
            3 => DuplicateMode::End,
            other => panic!("unrecognised duplicate mode code {other}"),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DuplicateMode::None => 0,
            DuplicateMode::StartAndEnd => 1,
            DuplicateMode::Start => 2,
            DuplicateMode::End => 3,
        }
    }

    pub fn removes_duplicates(self) -> bool {
        self != DuplicateMode::None
    }

    /// Applies the policy to sorted, adjacent-collapsed entries
    pub fn apply(self, entries: Vec<(PackedRead, u32)>) -> Vec<(PackedRead, u32)> {
        match self {
            DuplicateMode::None => entries,
            DuplicateMode::StartAndEnd => entries.into_iter().map(|(read, _)| (read, 1)).collect(),
            DuplicateMode::Start => collapse_by_key(entries, |read| match read.strand() {
                Strand::Reverse => read.end(),
                _ => read.start(),
            }),
            DuplicateMode::End => collapse_by_key(entries, |read| match read.strand() {
                Strand::Reverse => read.start(),
                _ => read.end(),
            }),
        }
    }
}

impl fmt::Display for DuplicateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DuplicateMode::None => "none",
            DuplicateMode::StartAndEnd => "start-and-end",
            DuplicateMode::Start => "start",
            DuplicateMode::End => "end",
        };
        f.write_str(name)
    }
}

impl FromStr for DuplicateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "no" => Ok(DuplicateMode::None),
            "start-and-end" | "start+end" | "both" => Ok(DuplicateMode::StartAndEnd),
            "start" => Ok(DuplicateMode::Start),
            "end" => Ok(DuplicateMode::End),
            other => Err(format!("unknown duplicate mode '{other}' (expected none, start-and-end, start or end)")),
        }
    }
}

/// Merges adjacent identical reads, summing their counts
pub fn collapse_adjacent(entries: &mut Vec<(PackedRead, u32)>) {
    entries.dedup_by(|next, kept| {
        if next.0 == kept.0 {
            kept.1 += next.1;
            true
        } else {
            false
        }
    });
}

fn strand_slot(strand: Strand) -> usize {
    match strand {
        Strand::Forward => 0,
        Strand::Reverse => 1,
        Strand::Unknown => 2,
    }
}

/// Keeps the first read seen for each (strand, key), with a count of one
fn collapse_by_key<F>(entries: Vec<(PackedRead, u32)>, key: F) -> Vec<(PackedRead, u32)>
where
    F: Fn(PackedRead) -> u32,
{
    let Some(max_end) = entries.iter().map(|(read, _)| read.end()).max() else {
        return entries;
    };

    let size = max_end as usize + 1;
    let mut seen: [BitVec; 3] = [bitvec![0; size], bitvec![0; size], bitvec![0; size]];

    let mut kept = Vec::with_capacity(entries.len());
    for (read, _) in entries {
        let presence = &mut seen[strand_slot(read.strand())];
        let k = key(read) as usize;
        if !presence[k] {
            presence.set(k, true);
            kept.push((read, 1));
        }
    }
    kept
}
