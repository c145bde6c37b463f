//! Local file validity checks
//!
//! A local file counts as valid when it exists and parses as the archive's
//! format. Validation never fails loudly: unreadable or malformed files are
//! simply reported invalid, which makes the fetcher download them again.
//! Validators only read; they never delete or rewrite what they inspect.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::trace;

/// Classic netCDF magic (`CDF` followed by a version byte)
const CDF_MAGIC: &[u8; 3] = b"CDF";

/// HDF5 format signature, used by netCDF-4 files
const HDF5_SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// Offsets at which an HDF5 superblock may start (after an optional user block)
const HDF5_SUPERBLOCK_OFFSETS: [usize; 5] = [0, 512, 1024, 2048, 4096];

/// Bytes first read from the start of a file for header inspection
const INITIAL_HEADER_LEN: u64 = 4096 + 128;

/// Largest prefix read while looking for the end of a classic header
const MAX_HEADER_LEN: u64 = 8 * 1024 * 1024;

/// Classic header list tags
const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;

/// `numrecs` value of a file still being written
const STREAMING: u64 = u64::MAX;

/// Decides whether a local file is complete and usable
#[async_trait]
pub trait Validator: Send + Sync {
    /// `true` only when `path` exists and passes the format check
    async fn is_valid(&self, path: &Path) -> bool;
}

/// Accepts classic netCDF (CDF-1/2/5) and netCDF-4 (HDF5) files
///
/// A transfer cut off midway is rejected in both families. For HDF5 the
/// superblock's end-of-file address is compared to the file length. For
/// classic files the whole header is parsed and the last byte of variable
/// data it describes must lie within the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfValidator;

impl NetCdfValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Validator for NetCdfValidator {
    async fn is_valid(&self, path: &Path) -> bool {
        let file_len = match regular_file_len(path).await {
            Some(len) => len,
            None => return false,
        };

        let mut limit = INITIAL_HEADER_LEN;
        loop {
            let header = match read_prefix(path, limit).await {
                Some(bytes) => bytes,
                None => return false,
            };

            let verdict = check_header(&header, file_len);
            trace!(path = %path.display(), file_len, read = header.len(), ?verdict, "Inspected netCDF header");
            match verdict {
                Verdict::Valid => return true,
                Verdict::Invalid => return false,
                Verdict::NeedMore if limit < MAX_HEADER_LEN => {
                    limit = limit.saturating_mul(8).min(MAX_HEADER_LEN);
                }
                Verdict::NeedMore => return false,
            }
        }
    }
}

/// Accepts any non-empty regular file
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyValidator;

#[async_trait]
impl Validator for NonEmptyValidator {
    async fn is_valid(&self, path: &Path) -> bool {
        matches!(regular_file_len(path).await, Some(len) if len > 0)
    }
}

async fn regular_file_len(path: &Path) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if metadata.is_file() {
        Some(metadata.len())
    } else {
        None
    }
}

async fn read_prefix(path: &Path, limit: u64) -> Option<Vec<u8>> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut buf = Vec::new();
    file.take(limit).read_to_end(&mut buf).await.ok()?;
    Some(buf)
}

/// Result of inspecting a file prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Valid,
    Invalid,
    /// The header continues past the bytes read so far
    NeedMore,
}

/// Check a header prefix against the netCDF family of formats
///
/// `header` is the start of the file, `file_len` its full length on disk.
/// A classic header longer than `header` counts as invalid.
pub fn inspect_header(header: &[u8], file_len: u64) -> bool {
    check_header(header, file_len) == Verdict::Valid
}

fn check_header(header: &[u8], file_len: u64) -> Verdict {
    if header.starts_with(CDF_MAGIC) {
        return classic_verdict(header, file_len);
    }
    if is_complete_hdf5(header, file_len) {
        Verdict::Valid
    } else {
        Verdict::Invalid
    }
}

fn classic_verdict(header: &[u8], file_len: u64) -> Verdict {
    match classic_data_end(header) {
        Ok(end) if end <= file_len => Verdict::Valid,
        Ok(_) | Err(Stop::Malformed) => Verdict::Invalid,
        Err(Stop::Short) if (header.len() as u64) < file_len => Verdict::NeedMore,
        Err(Stop::Short) => Verdict::Invalid,
    }
}

/// Why classic header parsing stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Ran out of bytes
    Short,
    Malformed,
}

/// Big-endian reader over a classic header
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// CDF-5 widens counts and sizes to 64 bits
    wide: bool,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: u64) -> Result<&'a [u8], Stop> {
        let n = usize::try_from(n).map_err(|_| Stop::Short)?;
        let end = self.pos.checked_add(n).ok_or(Stop::Short)?;
        let slice = self.bytes.get(self.pos..end).ok_or(Stop::Short)?;
        self.pos = end;
        Ok(slice)
    }

    fn uint(&mut self, width: u64) -> Result<u64, Stop> {
        Ok(self
            .take(width)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    fn u32(&mut self) -> Result<u64, Stop> {
        self.uint(4)
    }

    /// Count or size: 4 bytes, 8 in CDF-5
    fn non_neg(&mut self) -> Result<u64, Stop> {
        if self.wide {
            self.uint(8)
        } else {
            self.u32()
        }
    }

    fn skip_padded(&mut self, n: u64) -> Result<(), Stop> {
        self.take(pad4(n).ok_or(Stop::Malformed)?).map(|_| ())
    }

    fn name(&mut self) -> Result<(), Stop> {
        let len = self.non_neg()?;
        self.skip_padded(len)
    }

    /// List header; `Ok(0)` for an absent list
    fn list(&mut self, tag: u32) -> Result<u64, Stop> {
        let found = self.u32()?;
        let nelems = self.non_neg()?;
        match found {
            0 if nelems == 0 => Ok(0),
            t if t == u64::from(tag) => Ok(nelems),
            _ => Err(Stop::Malformed),
        }
    }

    fn attributes(&mut self) -> Result<(), Stop> {
        for _ in 0..self.list(NC_ATTRIBUTE)? {
            self.name()?;
            let size = self.nc_type()?;
            let nelems = self.non_neg()?;
            self.skip_padded(nelems.checked_mul(size).ok_or(Stop::Malformed)?)?;
        }
        Ok(())
    }

    /// External size in bytes of the next type code
    fn nc_type(&mut self) -> Result<u64, Stop> {
        match (self.u32()?, self.wide) {
            (1 | 2, _) | (7, true) => Ok(1),
            (3, _) | (8, true) => Ok(2),
            (4 | 5, _) | (9, true) => Ok(4),
            (6, _) | (10 | 11, true) => Ok(8),
            _ => Err(Stop::Malformed),
        }
    }
}

fn pad4(n: u64) -> Option<u64> {
    n.checked_add(3).map(|n| n & !3)
}

/// One variable's placement in a classic file
struct VarExtent {
    begin: u64,
    /// Bytes per record for record variables, total bytes otherwise
    slab: u64,
    record: bool,
}

/// Parse a whole classic header and return the offset just past the last
/// byte of variable data it describes
fn classic_data_end(header: &[u8]) -> Result<u64, Stop> {
    let version = *header.get(3).ok_or(Stop::Short)?;
    let (wide, offset_width) = match version {
        1 => (false, 4),
        2 => (false, 8),
        5 => (true, 8),
        _ => return Err(Stop::Malformed),
    };
    let mut cur = Cursor {
        bytes: header,
        pos: 4,
        wide,
    };

    let numrecs = match cur.non_neg()? {
        n if n == u64::from(u32::MAX) && !wide => STREAMING,
        n => n,
    };

    let mut dims = Vec::new();
    for _ in 0..cur.list(NC_DIMENSION)? {
        cur.name()?;
        dims.push(cur.non_neg()?);
    }

    cur.attributes()?;

    let mut vars = Vec::new();
    for _ in 0..cur.list(NC_VARIABLE)? {
        cur.name()?;
        let mut lengths = Vec::new();
        for _ in 0..cur.non_neg()? {
            let id = usize::try_from(cur.non_neg()?).map_err(|_| Stop::Malformed)?;
            lengths.push(*dims.get(id).ok_or(Stop::Malformed)?);
        }
        cur.attributes()?;
        let size = cur.nc_type()?;
        let _vsize = cur.non_neg()?;
        let begin = cur.uint(offset_width)?;

        // Only the leading dimension may be the unlimited one
        let record = lengths.first() == Some(&0);
        let fixed = if record { &lengths[1..] } else { &lengths[..] };
        let slab = fixed
            .iter()
            .try_fold(size, |acc, &len| acc.checked_mul(len))
            .ok_or(Stop::Malformed)?;
        vars.push(VarExtent { begin, slab, record });
    }

    let mut end = cur.pos as u64;
    let records: Vec<&VarExtent> = vars.iter().filter(|v| v.record).collect();
    // A lone record variable is stored without per-record padding
    let recsize = match records.as_slice() {
        [only] => only.slab,
        many => many
            .iter()
            .try_fold(0u64, |acc, v| pad4(v.slab).and_then(|s| acc.checked_add(s)))
            .ok_or(Stop::Malformed)?,
    };

    let records_known = numrecs != 0 && numrecs != STREAMING;
    for var in vars.iter().filter(|v| !v.record || records_known) {
        let var_end = if !var.record {
            var.begin.checked_add(var.slab)
        } else {
            (numrecs - 1)
                .checked_mul(recsize)
                .and_then(|skip| skip.checked_add(var.slab))
                .and_then(|len| var.begin.checked_add(len))
        };
        end = end.max(var_end.ok_or(Stop::Malformed)?);
    }
    Ok(end)
}

fn is_complete_hdf5(header: &[u8], file_len: u64) -> bool {
    HDF5_SUPERBLOCK_OFFSETS.iter().any(|&offset| {
        header
            .get(offset..offset + HDF5_SIGNATURE.len())
            .is_some_and(|sig| sig == HDF5_SIGNATURE)
            && superblock_fits(&header[offset..], file_len)
    })
}

/// Parse the superblock starting at `sb` and verify the file is long enough
fn superblock_fits(sb: &[u8], file_len: u64) -> bool {
    let version = match sb.get(8) {
        Some(v) => *v,
        None => return false,
    };

    // (offset of size-of-offsets byte, offset of base address)
    let (size_pos, addr_pos) = match version {
        0 => (13, 24),
        1 => (13, 28),
        2 | 3 => (9, 12),
        _ => return false,
    };

    let size_of_offsets = match sb.get(size_pos) {
        Some(&n @ (2 | 4 | 8)) => n as usize,
        _ => return false,
    };

    // Base address, then one address slot, then the end-of-file address
    let base = read_le(sb, addr_pos, size_of_offsets);
    let eof = read_le(sb, addr_pos + 2 * size_of_offsets, size_of_offsets);

    match (base, eof) {
        (Some(base), Some(eof)) => base
            .checked_add(eof)
            .is_some_and(|required| required > 0 && required <= file_len),
        _ => false,
    }
}

fn read_le(bytes: &[u8], pos: usize, width: usize) -> Option<u64> {
    let slice = bytes.get(pos..pos + width)?;
    Some(
        slice
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
    )
}
