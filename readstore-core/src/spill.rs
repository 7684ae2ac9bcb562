//! Temp file cache for finalised chromosome data
//!
//! Each spilled record is laid out as:
//! - Header  { magic, version, flags, raw_len, comp_len, checksum }
//! - Payload { zstd-compressed record body }
//!
//! All integers are little endian. The checksum is xxh64 over the
//! uncompressed payload.

use crate::error::{StoreError, StoreResult};
use crate::hits::{HitCollection, HitList};
use crate::read::PackedRead;
use crate::reads::ReadsWithCounts;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{trace, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tempfile::{Builder, TempPath};

/// Magic bytes for a spilled `ReadsWithCounts`
pub const READS_MAGIC: &[u8; 4] = b"RWCT";

/// Magic bytes for a spilled `HitCollection`
pub const HITS_MAGIC: &[u8; 4] = b"HICH";

/// Current spill format version
pub const SPILL_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8 + 8;

/// A value with a stable binary payload
pub trait SpillRecord: Sized {
    const MAGIC: &'static [u8; 4];

    fn write_payload<W: Write>(&self, writer: &mut W) -> StoreResult<()>;

    fn read_payload<R: Read>(reader: &mut R, payload_len: u64) -> StoreResult<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SpillHeader {
    magic: [u8; 4],
    version: u32,
    flags: u32,
    raw_len: u64,
    comp_len: u64,
    checksum: u64,
}

impl SpillHeader {
    fn write<W: Write>(&self, writer: &mut W) -> StoreResult<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u64::<LittleEndian>(self.raw_len)?;
        writer.write_u64::<LittleEndian>(self.comp_len)?;
        writer.write_u64::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    fn read<R: Read>(reader: &mut R, expected: &[u8; 4]) -> StoreResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if &magic != expected {
            return Err(StoreError::InvalidMagic { expected: String::from_utf8_lossy(expected).to_string() });
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != SPILL_VERSION {
            return Err(StoreError::UnsupportedVersion(version));
        }

        Ok(Self {
            magic,
            version,
            flags: reader.read_u32::<LittleEndian>()?,
            raw_len: reader.read_u64::<LittleEndian>()?,
            comp_len: reader.read_u64::<LittleEndian>()?,
            checksum: reader.read_u64::<LittleEndian>()?,
        })
    }
}

/// Writes header and compressed payload for one record
pub fn write_record<W: Write, T: SpillRecord>(writer: &mut W, record: &T, level: i32) -> StoreResult<()> {
    let mut payload = Vec::new();
    record.write_payload(&mut payload)?;

    let compressed = zstd::encode_all(&payload[..], level)?;

    let header = SpillHeader {
        magic: *T::MAGIC,
        version: SPILL_VERSION,
        flags: 0,
        raw_len: payload.len() as u64,
        comp_len: compressed.len() as u64,
        checksum: xxhash_rust::xxh64::xxh64(&payload, 0),
    };

    header.write(writer)?;
    writer.write_all(&compressed)?;
    Ok(())
}

/// Reads one record, optionally verifying the payload checksum
pub fn read_record<R: Read, T: SpillRecord>(reader: &mut R, verify_checksum: bool) -> StoreResult<T> {
    let header = SpillHeader::read(reader, T::MAGIC)?;

    let mut compressed = Vec::new();
    reader.by_ref().take(header.comp_len).read_to_end(&mut compressed)?;
    if compressed.len() as u64 != header.comp_len {
        return Err(StoreError::Corruption(format!(
            "expected {} compressed bytes, found {}",
            header.comp_len,
            compressed.len()
        )));
    }

    let payload = zstd::decode_all(&compressed[..])?;
    if payload.len() as u64 != header.raw_len {
        return Err(StoreError::Corruption(format!(
            "expected {} payload bytes, found {}",
            header.raw_len,
            payload.len()
        )));
    }

    if verify_checksum {
        let found = xxhash_rust::xxh64::xxh64(&payload, 0);
        if found != header.checksum {
            return Err(StoreError::ChecksumMismatch { expected: header.checksum, found });
        }
    }

    T::read_payload(&mut Cursor::new(payload), header.raw_len)
}

fn write_name<W: Write>(writer: &mut W, name: &str) -> StoreResult<()> {
    writer.write_u32::<LittleEndian>(name.len() as u32)?;
    writer.write_all(name.as_bytes())?;
    Ok(())
}

fn read_name<R: Read>(reader: &mut R, payload_len: u64) -> StoreResult<String> {
    let len = reader.read_u32::<LittleEndian>()? as u64;
    if len > payload_len {
        return Err(StoreError::Corruption(format!("name length {len} exceeds payload")));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| StoreError::Corruption(format!("chromosome name is not UTF-8: {e}")))
}

fn read_positions<R: Read>(reader: &mut R, count: usize) -> StoreResult<Vec<PackedRead>> {
    let mut positions = Vec::with_capacity(count);
    for _ in 0..count {
        positions.push(PackedRead::from_bits(reader.read_u64::<LittleEndian>()?));
    }
    Ok(positions)
}

impl SpillRecord for ReadsWithCounts {
    const MAGIC: &'static [u8; 4] = READS_MAGIC;

    fn write_payload<W: Write>(&self, writer: &mut W) -> StoreResult<()> {
        writer.write_u64::<LittleEndian>(self.len() as u64)?;
        for read in self.reads() {
            writer.write_u64::<LittleEndian>(read.bits())?;
        }
        for &count in self.counts() {
            writer.write_u32::<LittleEndian>(count)?;
        }
        Ok(())
    }

    fn read_payload<R: Read>(reader: &mut R, payload_len: u64) -> StoreResult<Self> {
        let count = reader.read_u64::<LittleEndian>()?;
        let expected = count.checked_mul(12).and_then(|n| n.checked_add(8));
        if expected != Some(payload_len) {
            return Err(StoreError::Corruption(format!(
                "{count} reads do not fit a {payload_len} byte payload"
            )));
        }

        let count = count as usize;
        let reads = read_positions(reader, count)?;
        let mut counts = Vec::with_capacity(count);
        for _ in 0..count {
            counts.push(reader.read_u32::<LittleEndian>()?);
        }
        Ok(ReadsWithCounts::new(reads, counts))
    }
}

impl SpillRecord for HitCollection {
    const MAGIC: &'static [u8; 4] = HITS_MAGIC;

    fn write_payload<W: Write>(&self, writer: &mut W) -> StoreResult<()> {
        write_name(writer, self.source_chromosome())?;

        let lists: Vec<(&str, &HitList)> = self.lists().collect();
        writer.write_u32::<LittleEndian>(lists.len() as u32)?;

        for (name, list) in lists {
            write_name(writer, name)?;
            writer.write_u64::<LittleEndian>(list.len() as u64)?;
            for read in list.sources() {
                writer.write_u64::<LittleEndian>(read.bits())?;
            }
            for read in list.partners() {
                writer.write_u64::<LittleEndian>(read.bits())?;
            }
        }
        Ok(())
    }

    fn read_payload<R: Read>(reader: &mut R, payload_len: u64) -> StoreResult<Self> {
        let source = read_name(reader, payload_len)?;
        let mut collection = HitCollection::new(source);

        let partners = reader.read_u32::<LittleEndian>()?;
        for _ in 0..partners {
            let name = read_name(reader, payload_len)?;
            let len = reader.read_u64::<LittleEndian>()?;
            if len.saturating_mul(16) > payload_len {
                return Err(StoreError::Corruption(format!("{len} hits for {name} exceed payload")));
            }
            let sources = read_positions(reader, len as usize)?;
            let hits = read_positions(reader, len as usize)?;
            collection.insert_list(name, HitList::new(sources, hits));
        }
        Ok(collection)
    }
}

/// A record cached in a temp file, deleted when dropped or discarded
#[derive(Debug)]
pub struct SpillFile {
    path: TempPath,
    bytes: u64,
}

impl SpillFile {
    pub fn create<T: SpillRecord>(dir: &Path, prefix: &str, record: &T, level: i32) -> StoreResult<Self> {
        let file = Builder::new().prefix(prefix).suffix(".temp").tempfile_in(dir)?;
        {
            let mut writer = BufWriter::new(file.as_file());
            write_record(&mut writer, record, level)?;
            writer.flush()?;
        }
        let bytes = file.as_file().metadata()?.len();
        let path = file.into_temp_path();
        trace!("Cached {} bytes to {}", bytes, path.display());
        Ok(Self { path, bytes })
    }

    pub fn load<T: SpillRecord>(&self, verify_checksum: bool) -> StoreResult<T> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        read_record(&mut reader, verify_checksum)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size on disk including the header
    pub fn size(&self) -> u64 {
        self.bytes
    }

    /// Deletes the file now, logging rather than failing if that is not possible
    pub fn discard(self) {
        let display = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            warn!("Failed to delete cache file {}: {}", display, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;
    use tempfile::tempdir;

    fn sample_reads() -> ReadsWithCounts {
        ReadsWithCounts::new(
            vec![
                PackedRead::new(100, 200, Strand::Forward),
                PackedRead::new(150, 300, Strand::Reverse),
                PackedRead::new(400, 401, Strand::Unknown),
            ],
            vec![2, 1, 7],
        )
    }

    fn sample_hits() -> HitCollection {
        let mut hits = HitCollection::new("chr1");
        hits.add_hit("chr1", PackedRead::new(10, 60, Strand::Forward), PackedRead::new(5000, 5050, Strand::Reverse));
        hits.add_hit("chr2", PackedRead::new(70, 120, Strand::Reverse), PackedRead::new(90, 140, Strand::Forward));
        hits
    }

    #[test]
    fn test_reads_roundtrip() {
        let reads = sample_reads();
        let mut buffer = Vec::new();
        write_record(&mut buffer, &reads, 3).unwrap();

        let back: ReadsWithCounts = read_record(&mut Cursor::new(buffer), true).unwrap();
        assert_eq!(back, reads);
    }

    #[test]
    fn test_hits_roundtrip() {
        let hits = sample_hits();
        let mut buffer = Vec::new();
        write_record(&mut buffer, &hits, 3).unwrap();

        let back: HitCollection = read_record(&mut Cursor::new(buffer), true).unwrap();
        assert_eq!(back, hits);
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut buffer = Vec::new();
        write_record(&mut buffer, &sample_reads(), 3).unwrap();

        let result: StoreResult<HitCollection> = read_record(&mut Cursor::new(buffer), true);
        assert!(matches!(result, Err(StoreError::InvalidMagic { .. })));
    }

    #[test]
    fn test_version_checked() {
        let mut buffer = Vec::new();
        write_record(&mut buffer, &sample_reads(), 3).unwrap();
        buffer[4..8].copy_from_slice(&99u32.to_le_bytes());

        let result: StoreResult<ReadsWithCounts> = read_record(&mut Cursor::new(buffer), true);
        assert!(matches!(result, Err(StoreError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut buffer = Vec::new();
        write_record(&mut buffer, &sample_reads(), 3).unwrap();
        // checksum field sits at bytes 28..36
        buffer[28] ^= 0xFF;

        let result: StoreResult<ReadsWithCounts> = read_record(&mut Cursor::new(buffer.clone()), true);
        assert!(matches!(result, Err(StoreError::ChecksumMismatch { .. })));

        let unchecked: ReadsWithCounts = read_record(&mut Cursor::new(buffer), false).unwrap();
        assert_eq!(unchecked, sample_reads());
    }

    #[test]
    fn test_truncated_payload() {
        let mut buffer = Vec::new();
        write_record(&mut buffer, &sample_reads(), 3).unwrap();
        buffer.truncate(HEADER_LEN + 2);

        let result: StoreResult<ReadsWithCounts> = read_record(&mut Cursor::new(buffer), true);
        assert!(matches!(result, Err(StoreError::Corruption(_))));
    }

    #[test]
    fn test_spill_file_lifecycle() {
        let dir = tempdir().unwrap();
        let spill = SpillFile::create(dir.path(), "readstore_", &sample_reads(), 3).unwrap();
        let path = spill.path().to_path_buf();

        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("readstore_"));
        assert!(spill.size() > HEADER_LEN as u64);

        let back: ReadsWithCounts = spill.load(true).unwrap();
        assert_eq!(back, sample_reads());

        spill.discard();
        assert!(!path.exists());
    }

    #[test]
    fn test_spill_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = {
            let spill = SpillFile::create(dir.path(), "readstore_", &sample_hits(), 1).unwrap();
            spill.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
