//! Reading of the WOFF font format and reconstruction of the sfnt it wraps.

use std::convert::TryFrom;
use std::hash::Hasher;
use std::io::{Cursor, Read};
use std::sync::Arc;

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHasher;

use crate::binary::read::{ReadArray, ReadBinary, ReadBuf, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::font_builder::FontBuilder;
use crate::tables::{HeadTable, CFF_MAGIC, TTF_MAGIC};
use crate::tag;

/// The magic number identifying a WOFF file: 'wOFF'
pub const MAGIC: u32 = tag::WOFF;
/// The magic number identifying a WOFF2 file: 'wOF2'
pub const MAGIC2: u32 = tag::WOFF2;

/// Default budget of decompressed bytes held by a `WoffCache`.
pub const DEFAULT_CACHE_BUDGET: usize = 10 * 1024 * 1024;

// This is the default size of the buffer in the brotli crate.
const BROTLI_DECODER_BUFFER_SIZE: usize = 4096;

#[derive(Clone)]
pub struct WoffFont<'a> {
    pub scope: ReadScope<'a>,
    pub woff_header: WoffHeader,
    pub table_directory: ReadArray<'a, TableDirectoryEntry>,
}

#[derive(Clone, Debug)]
pub struct WoffHeader {
    pub signature: u32,
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub total_sfnt_size: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub meta_offset: u32,
    pub meta_length: u32,
    pub meta_orig_length: u32,
    pub priv_offset: u32,
    pub priv_length: u32,
}

#[derive(Debug, Clone)]
pub struct TableDirectoryEntry {
    pub tag: u32,
    pub offset: u32,
    pub comp_length: u32,
    pub orig_length: u32,
    pub orig_checksum: u32,
}

/// Compression applied to the tables of a WOFF file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    Zlib,
    Brotli,
}

/// Memoises decoded WOFF files, bounded by the total size of the decoded data.
pub struct WoffCache {
    inner: Mutex<WoffCacheInner>,
}

struct WoffCacheInner {
    entries: LruCache<(u64, usize), CacheEntry>,
    budget: usize,
    used: usize,
}

/// A decoded font along with the WOFF data it came from, so that a hit can be confirmed.
struct CacheEntry {
    source: Box<[u8]>,
    font: Arc<[u8]>,
}

/// Decode a WOFF file into the equivalent sfnt font file.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    let woff = ReadScope::new(data).read::<WoffFont<'_>>()?;
    woff.to_sfnt()
}

impl<'a> WoffFont<'a> {
    /// The "sfnt version" of the input font
    pub fn flavor(&self) -> u32 {
        self.woff_header.flavor
    }

    pub fn table_directory(&self) -> &ReadArray<'a, TableDirectoryEntry> {
        &self.table_directory
    }

    /// Compression used for the tables, selected by the declared WOFF version.
    pub fn compression(&self) -> Compression {
        match (self.woff_header.major_version, self.woff_header.minor_version) {
            (2, 0) => Compression::Brotli,
            _ => Compression::Zlib,
        }
    }

    /// Find the table directory entry for the given `tag`
    pub fn find_table_directory_entry(&self, tag: u32) -> Option<TableDirectoryEntry> {
        self.table_directory
            .iter()
            .find(|table_entry| table_entry.tag == tag)
    }

    /// Read and decompress the table with `tag`.
    pub fn read_table(&self, tag: u32) -> Result<Option<ReadBuf<'a>>, ParseError> {
        self.find_table_directory_entry(tag)
            .map(|table_entry| table_entry.read_table(&self.scope, self.compression()))
            .transpose()
    }

    /// Whether `entry` points at the extended metadata or private data blocks.
    fn is_metadata(&self, entry: &TableDirectoryEntry) -> bool {
        let header = &self.woff_header;
        (header.meta_offset != 0 && entry.offset == header.meta_offset)
            || (header.priv_offset != 0 && entry.offset == header.priv_offset)
    }

    /// Rebuild the sfnt font file described by this WOFF file.
    ///
    /// `head.checkSumAdjustment` is recomputed for the rebuilt file.
    pub fn to_sfnt(&self) -> Result<Vec<u8>, ParseError> {
        let compression = self.compression();
        let mut builder = FontBuilder::new(self.flavor());
        let mut head = None;

        for entry in self.table_directory.iter() {
            if self.is_metadata(&entry) {
                debug!("skipping WOFF metadata block at offset {}", entry.offset);
                continue;
            }

            let table = entry.read_table(&self.scope, compression)?;
            if entry.tag == tag::HEAD {
                head = Some(table.scope().read::<HeadTable>()?);
            } else {
                builder.add_raw_table(entry.tag, table.scope().data())?;
            }
        }

        let head = head.ok_or(ParseError::MissingTable(tag::HEAD))?;
        let builder = builder.add_head_table(&head)?;
        Ok(builder.data()?)
    }
}

impl<'b> ReadBinary for WoffFont<'b> {
    type HostType<'a> = WoffFont<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let woff_header = ctxt.read::<WoffHeader>()?;
        let table_directory =
            ctxt.read_array::<TableDirectoryEntry>(usize::from(woff_header.num_tables))?;
        Ok(WoffFont {
            scope,
            woff_header,
            table_directory,
        })
    }
}

impl ReadBinary for WoffHeader {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let signature = ctxt.read_u32be()?;
        match signature {
            MAGIC | MAGIC2 => {
                let flavor = ctxt.read_u32be()?;
                ctxt.check_version(flavor == TTF_MAGIC || flavor == CFF_MAGIC)?;
                let length = ctxt.read_u32be()?;
                let num_tables = ctxt.read_u16be()?;
                let reserved = ctxt.read_u16be()?;
                // The header includes a reserved field; this MUST be set to zero. If this field is
                // non-zero, a conforming user agent MUST reject the file as invalid.
                ctxt.check(reserved == 0)?;
                let total_sfnt_size = ctxt.read_u32be()?;
                let major_version = ctxt.read_u16be()?;
                let minor_version = ctxt.read_u16be()?;
                let meta_offset = ctxt.read_u32be()?;
                let meta_length = ctxt.read_u32be()?;
                let meta_orig_length = ctxt.read_u32be()?;
                let priv_offset = ctxt.read_u32be()?;
                let priv_length = ctxt.read_u32be()?;

                Ok(WoffHeader {
                    signature,
                    flavor,
                    length,
                    num_tables,
                    total_sfnt_size,
                    major_version,
                    minor_version,
                    meta_offset,
                    meta_length,
                    meta_orig_length,
                    priv_offset,
                    priv_length,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadFrom for TableDirectoryEntry {
    type ReadType = ((U32Be, U32Be, U32Be), (U32Be, U32Be));
    fn read_from(
        ((tag, offset, comp_length), (orig_length, orig_checksum)): ((u32, u32, u32), (u32, u32)),
    ) -> Self {
        TableDirectoryEntry {
            tag,
            offset,
            comp_length,
            orig_length,
            orig_checksum,
        }
    }
}

impl TableDirectoryEntry {
    fn is_compressed(&self) -> bool {
        self.comp_length != self.orig_length
    }

    /// Read and uncompress the contents of a table entry
    pub fn read_table<'a>(
        &self,
        scope: &ReadScope<'a>,
        compression: Compression,
    ) -> Result<ReadBuf<'a>, ParseError> {
        if self.comp_length > self.orig_length {
            return Err(ParseError::BadValue);
        }

        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.comp_length)?;
        let table_data = scope.offset_length(offset, length)?;

        if self.is_compressed() {
            let uncompressed = match compression {
                Compression::Zlib => inflate(table_data.data())?,
                Compression::Brotli => brotli_decompress(table_data.data())?,
            };
            if uncompressed.len() != usize::try_from(self.orig_length)? {
                return Err(ParseError::DecompressedLengthMismatch);
            }

            Ok(ReadBuf::from(uncompressed))
        } else {
            Ok(ReadBuf::from(table_data.data()))
        }
    }
}

#[cfg(any(feature = "flate2_zlib", feature = "flate2_rust"))]
fn inflate(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    use flate2::bufread::ZlibDecoder;

    let mut z = ZlibDecoder::new(data);
    let mut uncompressed = Vec::new();
    z.read_to_end(&mut uncompressed)
        .map_err(|_err| ParseError::CompressionError)?;
    Ok(uncompressed)
}

#[cfg(not(any(feature = "flate2_zlib", feature = "flate2_rust")))]
fn inflate(_data: &[u8]) -> Result<Vec<u8>, ParseError> {
    Err(ParseError::UnsupportedCompression)
}

fn brotli_decompress(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut input = brotli_decompressor::Decompressor::new(Cursor::new(data), BROTLI_DECODER_BUFFER_SIZE);
    let mut uncompressed = Vec::new();
    input
        .read_to_end(&mut uncompressed)
        .map_err(|_err| ParseError::CompressionError)?;
    Ok(uncompressed)
}

impl WoffCache {
    pub fn new() -> Self {
        WoffCache::with_budget(DEFAULT_CACHE_BUDGET)
    }

    /// Create a cache holding at most `budget` bytes of decoded font data.
    pub fn with_budget(budget: usize) -> Self {
        WoffCache {
            inner: Mutex::new(WoffCacheInner {
                entries: LruCache::unbounded(),
                budget,
                used: 0,
            }),
        }
    }

    /// Decode `data`, reusing an earlier result for the same input.
    pub fn decode(&self, data: &[u8]) -> Result<Arc<[u8]>, ParseError> {
        let key = cache_key(data);
        if let Some(entry) = self.inner.lock().entries.get(&key) {
            if *entry.source == *data {
                return Ok(Arc::clone(&entry.font));
            }
            debug!("WOFF cache key collision for {} byte input", data.len());
        }

        let font: Arc<[u8]> = Arc::from(decode(data)?);
        self.inner.lock().insert(
            key,
            CacheEntry {
                source: Box::from(data),
                font: Arc::clone(&font),
            },
        );
        Ok(font)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the decoded fonts currently held. The retained WOFF inputs are not
    /// counted.
    pub fn size(&self) -> usize {
        self.inner.lock().used
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.used = 0;
    }
}

impl Default for WoffCache {
    fn default() -> Self {
        WoffCache::new()
    }
}

impl WoffCacheInner {
    fn insert(&mut self, key: (u64, usize), entry: CacheEntry) {
        let len = entry.font.len();
        if len > self.budget {
            return;
        }

        if let Some(previous) = self.entries.put(key, entry) {
            self.used -= previous.font.len();
        }
        self.used += len;

        while self.used > self.budget {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.used -= evicted.font.len(),
                None => break,
            }
        }
    }
}

fn cache_key(data: &[u8]) -> (u64, usize) {
    let mut hasher = FxHasher::default();
    hasher.write(data);
    (hasher.finish(), data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;
    use crate::tables::tests::head_bytes;
    use crate::tables::OffsetTable;

    struct WoffTable<'a> {
        tag: u32,
        stored: &'a [u8],
        orig_length: u32,
    }

    fn woff_bytes(signature: u32, major: u16, tables: &[WoffTable<'_>]) -> Vec<u8> {
        let mut data = Vec::new();
        let directory_end = 44 + 20 * tables.len();
        data.extend_from_slice(&signature.to_be_bytes());
        data.extend_from_slice(&TTF_MAGIC.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // length
        data.extend_from_slice(&(tables.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0, 0]); // reserved
        data.extend_from_slice(&0u32.to_be_bytes()); // totalSfntSize
        data.extend_from_slice(&major.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&[0; 20]); // meta and priv

        let mut offset = directory_end;
        for table in tables {
            data.extend_from_slice(&table.tag.to_be_bytes());
            data.extend_from_slice(&(offset as u32).to_be_bytes());
            data.extend_from_slice(&(table.stored.len() as u32).to_be_bytes());
            data.extend_from_slice(&table.orig_length.to_be_bytes());
            data.extend_from_slice(&0u32.to_be_bytes());
            offset += table.stored.len();
        }
        for table in tables {
            data.extend_from_slice(table.stored);
        }
        data
    }

    fn raw(tag: u32, data: &[u8]) -> WoffTable<'_> {
        WoffTable {
            tag,
            stored: data,
            orig_length: data.len() as u32,
        }
    }

    #[test]
    fn test_bad_signature() {
        let mut data = woff_bytes(MAGIC, 1, &[]);
        data[0..4].copy_from_slice(b"OTTO");
        assert_eq!(decode(&data).err(), Some(ParseError::BadVersion));
    }

    #[test]
    fn test_bad_flavor() {
        let mut data = woff_bytes(MAGIC, 1, &[]);
        data[4..8].copy_from_slice(b"abcd");
        assert_eq!(decode(&data).err(), Some(ParseError::BadVersion));
    }

    #[test]
    fn test_reserved_must_be_zero() {
        let mut data = woff_bytes(MAGIC, 1, &[]);
        data[14] = 1;
        assert_eq!(decode(&data).err(), Some(ParseError::BadValue));
    }

    #[test]
    fn test_compression_selection() {
        let data = woff_bytes(MAGIC, 2, &[]);
        let woff = ReadScope::new(&data).read::<WoffFont<'_>>().unwrap();
        assert_eq!(woff.compression(), Compression::Brotli);

        let data = woff_bytes(MAGIC2, 1, &[]);
        let woff = ReadScope::new(&data).read::<WoffFont<'_>>().unwrap();
        assert_eq!(woff.compression(), Compression::Zlib);
    }

    #[test]
    fn test_uncompressed_tables_are_copied() {
        let head = head_bytes(0);
        let maxp = [0, 0, 0x50, 0, 0, 7];
        let data = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head), raw(tag::MAXP, &maxp)]);

        let woff = ReadScope::new(&data).read::<WoffFont<'_>>().unwrap();
        assert_eq!(woff.table_directory().len(), 2);
        let table = woff.read_table(tag::MAXP).unwrap().unwrap();
        assert_eq!(table.scope().data(), &maxp);
        assert!(woff.read_table(tag::GLYF).unwrap().is_none());

        let sfnt = decode(&data).unwrap();
        let scope = ReadScope::new(&sfnt);
        let offset_table = scope.read::<OffsetTable<'_>>().unwrap();
        assert_eq!(offset_table.sfnt_version, TTF_MAGIC);
        let maxp_scope = offset_table.read_table(&scope, tag::MAXP).unwrap().unwrap();
        assert_eq!(maxp_scope.data(), &maxp);
        assert_eq!(
            checksum::table_checksum(&sfnt).unwrap().0,
            checksum::SFNT_CHECKSUM_MAGIC
        );
    }

    #[test]
    fn test_comp_length_larger_than_orig_length() {
        let head = head_bytes(0);
        let table = WoffTable {
            tag: tag::MAXP,
            stored: &[0, 0, 0x50, 0, 0, 7],
            orig_length: 4,
        };
        let data = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head), table]);
        assert_eq!(decode(&data).err(), Some(ParseError::BadValue));
    }

    #[test]
    fn test_missing_head() {
        let data = woff_bytes(MAGIC, 1, &[raw(tag::MAXP, &[0, 0, 0x50, 0, 0, 7])]);
        assert_eq!(
            decode(&data).err(),
            Some(ParseError::MissingTable(tag::HEAD))
        );
    }

    #[test]
    fn test_skips_metadata_block() {
        let head = head_bytes(0);
        let mut data = woff_bytes(
            MAGIC,
            1,
            &[raw(tag::HEAD, &head), raw(tag!(b"meta"), b"<xml/>\0\0")],
        );
        // Point metaOffset at the second table's data.
        let meta_offset = (44 + 2 * 20 + head.len()) as u32;
        data[24..28].copy_from_slice(&meta_offset.to_be_bytes());

        let sfnt = decode(&data).unwrap();
        let offset_table = ReadScope::new(&sfnt).read::<OffsetTable<'_>>().unwrap();
        assert_eq!(offset_table.table_records.len(), 1);
        assert!(offset_table.has_table(tag::HEAD));
    }

    #[cfg(any(feature = "flate2_zlib", feature = "flate2_rust"))]
    #[test]
    fn test_corrupt_zlib_data() {
        let head = head_bytes(0);
        let table = WoffTable {
            tag: tag::MAXP,
            stored: &[1, 2, 3],
            orig_length: 6,
        };
        let data = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head), table]);
        assert_eq!(decode(&data).err(), Some(ParseError::CompressionError));
    }

    #[test]
    fn test_cache_reuses_decoded_font() {
        let head = head_bytes(0);
        let data = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head)]);
        let cache = WoffCache::new();
        let first = cache.decode(&data).unwrap();
        let second = cache.decode(&data).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size(), first.len());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_cache_hit_requires_same_input() {
        let head = head_bytes(0);
        let data = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head)]);
        let cache = WoffCache::new();

        // An entry filed under the key of `data` but decoded from other bytes.
        let stale: Arc<[u8]> = Arc::from(vec![0xAB; 8]);
        cache.inner.lock().insert(
            cache_key(&data),
            CacheEntry {
                source: Box::from(vec![0; data.len()]),
                font: Arc::clone(&stale),
            },
        );

        let font = cache.decode(&data).unwrap();
        assert!(!Arc::ptr_eq(&font, &stale));
        assert_eq!(&*font, decode(&data).unwrap().as_slice());
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&font, &cache.decode(&data).unwrap()));
    }

    #[test]
    fn test_cache_budget_evicts_least_recently_used() {
        let head = head_bytes(0);
        let first_input = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head), raw(tag::MAXP, &[0; 6])]);
        let second_input = woff_bytes(MAGIC, 1, &[raw(tag::HEAD, &head), raw(tag::CMAP, &[1; 6])]);

        let decoded_len = decode(&first_input).unwrap().len();
        let cache = WoffCache::with_budget(decoded_len + 8);
        let first = cache.decode(&first_input).unwrap();
        cache.decode(&second_input).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size(), decoded_len);

        // The first font was evicted so it is decoded again.
        let again = cache.decode(&first_input).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(first, again);
    }
}
