use super::consts::*;
use crate::common::binary::{BinaryError, decode_utf16le};
use std::io::{self, Read, Seek, SeekFrom};
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Raw compound file header (512 bytes)
///
/// Field layout follows [MS-CFB] 2.2.
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 8],
    clsid: [u8; 16],
    minor_version: U16<LE>,
    major_version: U16<LE>,
    byte_order: U16<LE>,
    sector_shift: U16<LE>,
    mini_sector_shift: U16<LE>,
    reserved: [u8; 6],
    num_dir_sectors: U32<LE>,
    num_fat_sectors: U32<LE>,
    first_dir_sector: U32<LE>,
    transaction_signature: U32<LE>,
    mini_stream_cutoff: U32<LE>,
    first_minifat_sector: U32<LE>,
    num_minifat_sectors: U32<LE>,
    first_difat_sector: U32<LE>,
    num_difat_sectors: U32<LE>,
    /// First 109 FAT sector ids
    difat: [U32<LE>; HEADER_DIFAT_ENTRIES],
}

/// Raw OLE directory entry structure (128 bytes)
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes (including null terminator)
    name_len: U16<LE>,
    /// Entry type (1 = storage, 2 = stream, 5 = root)
    entry_type: u8,
    node_color: u8,
    sid_left: U32<LE>,
    sid_right: U32<LE>,
    sid_child: U32<LE>,
    clsid: [u8; 16],
    state_bits: U32<LE>,
    creation_time: U64<LE>,
    modified_time: U64<LE>,
    start_sector: U32<LE>,
    stream_size: U64<LE>,
}

/// A stream or storage in the compound file directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Storage ID (index in directory)
    pub sid: u32,
    /// Entry name (UTF-16 decoded)
    pub name: String,
    /// Entry type (stream, storage, root, ...)
    pub entry_type: u8,
    /// Index of left sibling in red-black tree
    pub sid_left: u32,
    /// Index of right sibling in red-black tree
    pub sid_right: u32,
    /// Index of child node in red-black tree
    pub sid_child: u32,
    /// First sector of the stream
    pub start_sector: u32,
    /// Size of the stream in bytes
    pub size: u64,
    /// Whether this stream lives in the mini stream
    pub is_minifat: bool,
}

/// Error types for OLE file parsing
#[derive(Debug)]
pub enum OleError {
    Io(io::Error),
    InvalidFormat(String),
    InvalidData(String),
    NotOleFile,
    CorruptedFile(String),
    StreamNotFound,
}

impl From<io::Error> for OleError {
    fn from(err: io::Error) -> Self {
        OleError::Io(err)
    }
}

impl From<BinaryError> for OleError {
    fn from(err: BinaryError) -> Self {
        OleError::InvalidData(err.to_string())
    }
}

impl std::fmt::Display for OleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OleError::Io(e) => write!(f, "IO error: {}", e),
            OleError::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            OleError::InvalidData(s) => write!(f, "Invalid data: {}", s),
            OleError::NotOleFile => write!(f, "Not an OLE file"),
            OleError::CorruptedFile(s) => write!(f, "Corrupted file: {}", s),
            OleError::StreamNotFound => write!(f, "Stream not found"),
        }
    }
}

impl std::error::Error for OleError {}

/// OLE2 structured storage reader.
///
/// Only what a Word document needs is supported: locating streams by path
/// and reading them whole, from either the regular FAT or the mini stream.
#[derive(Debug)]
pub struct OleFile<R: Read + Seek> {
    reader: R,
    /// Sector size (512 or 4096 bytes)
    sector_size: usize,
    /// Mini sector size (typically 64 bytes)
    mini_sector_size: usize,
    /// File Allocation Table - maps sector to next sector in chain
    fat: Vec<u32>,
    /// Mini FAT - for streams smaller than the cutoff size
    minifat: Vec<u32>,
    /// All directory entries indexed by SID; entry 0 is the root
    entries: Vec<DirectoryEntry>,
    /// Mini stream data (loaded on first use)
    ministream: Option<Vec<u8>>,
}

impl<R: Read + Seek> OleFile<R> {
    /// Open and parse an OLE file from a reader.
    pub fn open(mut reader: R) -> Result<Self, OleError> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        if file_size < MINIMAL_OLEFILE_SIZE as u64 {
            return Err(OleError::NotOleFile);
        }

        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        if &raw[0..8] != MAGIC {
            return Err(OleError::NotOleFile);
        }

        let header = RawHeader::read_from_bytes(&raw[..])
            .map_err(|_| OleError::InvalidFormat("Failed to parse header".to_string()))?;

        if header.byte_order.get() != 0xFFFE {
            return Err(OleError::InvalidFormat("Invalid byte order".to_string()));
        }

        let sector_shift = header.sector_shift.get();
        let sector_size = match (header.major_version.get(), sector_shift) {
            (3, 9) => 512,
            (4, 12) => 4096,
            (version, shift) => {
                return Err(OleError::InvalidFormat(format!(
                    "Unsupported version {} with sector shift {}",
                    version, shift
                )));
            },
        };
        let mini_sector_size = 1usize << header.mini_sector_shift.get().min(12);

        let mut ole = OleFile {
            reader,
            sector_size,
            mini_sector_size,
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            ministream: None,
        };

        ole.load_fat(&header)?;
        ole.load_directory(
            header.first_dir_sector.get(),
            header.mini_stream_cutoff.get(),
        )?;
        if header.num_minifat_sectors.get() > 0 {
            ole.load_minifat(header.first_minifat_sector.get())?;
        }

        Ok(ole)
    }

    /// Collect FAT sector ids from the header DIFAT and any DIFAT sectors,
    /// then read the FAT itself.
    fn load_fat(&mut self, header: &RawHeader) -> Result<(), OleError> {
        let mut fat_sectors: Vec<u32> = header
            .difat
            .iter()
            .map(|id| id.get())
            .take_while(|&id| id != FREESECT && id != ENDOFCHAIN)
            .collect();

        let ids_per_difat = self.sector_size / 4 - 1;
        let mut difat_sector = header.first_difat_sector.get();
        for _ in 0..header.num_difat_sectors.get() {
            if difat_sector == ENDOFCHAIN || difat_sector == FREESECT {
                break;
            }
            let sector = self.read_sector(difat_sector)?;
            let ids = read_u32_array(&sector);
            fat_sectors.extend(
                ids[..ids_per_difat]
                    .iter()
                    .copied()
                    .take_while(|&id| id != FREESECT && id != ENDOFCHAIN),
            );
            difat_sector = ids[ids_per_difat];
        }

        self.fat.reserve(fat_sectors.len() * self.sector_size / 4);
        for sector_id in fat_sectors {
            let sector = self.read_sector(sector_id)?;
            self.fat.extend(read_u32_array(&sector));
        }
        Ok(())
    }

    fn load_minifat(&mut self, first_sector: u32) -> Result<(), OleError> {
        let data = self.read_chain(first_sector)?;
        self.minifat = read_u32_array(&data);
        Ok(())
    }

    fn load_directory(&mut self, first_sector: u32, mini_cutoff: u32) -> Result<(), OleError> {
        let data = self.read_chain(first_sector)?;
        let count = data.len() / DIRENTRY_SIZE;
        if count == 0 {
            return Err(OleError::CorruptedFile("Empty directory".to_string()));
        }

        let mut entries = Vec::with_capacity(count);
        for (sid, chunk) in data.chunks_exact(DIRENTRY_SIZE).enumerate() {
            let raw = RawDirectoryEntry::read_from_bytes(chunk).map_err(|_| {
                OleError::InvalidFormat("Failed to parse directory entry".to_string())
            })?;
            entries.push(self.directory_entry(&raw, sid as u32, mini_cutoff));
        }

        if entries[0].entry_type != STGTY_ROOT {
            return Err(OleError::CorruptedFile(
                "First directory entry is not the root".to_string(),
            ));
        }
        self.entries = entries;
        Ok(())
    }

    fn directory_entry(&self, raw: &RawDirectoryEntry, sid: u32, mini_cutoff: u32) -> DirectoryEntry {
        let name_len = (raw.name_len.get() as usize).saturating_sub(2).min(64);
        let name = decode_utf16le(&raw.name[..name_len])
            .trim_end_matches('\0')
            .to_string();

        // 512-byte sector files only use the low 32 bits of the size
        let size = if self.sector_size == 512 {
            raw.stream_size.get() & 0xFFFF_FFFF
        } else {
            raw.stream_size.get()
        };

        DirectoryEntry {
            sid,
            name,
            entry_type: raw.entry_type,
            sid_left: raw.sid_left.get(),
            sid_right: raw.sid_right.get(),
            sid_child: raw.sid_child.get(),
            start_sector: raw.start_sector.get(),
            size,
            is_minifat: raw.entry_type == STGTY_STREAM && size < mini_cutoff as u64,
        }
    }

    fn read_sector(&mut self, sector_id: u32) -> Result<Vec<u8>, OleError> {
        // The header occupies the first sector-sized slot
        let position = (sector_id as u64 + 1) * self.sector_size as u64;
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buffer = vec![0u8; self.sector_size];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read a whole sector chain by following the FAT.
    fn read_chain(&mut self, start_sector: u32) -> Result<Vec<u8>, OleError> {
        let mut data = Vec::new();
        let mut sector = start_sector;
        let mut remaining = self.fat.len();

        while sector != ENDOFCHAIN {
            if sector as usize >= self.fat.len() {
                return Err(OleError::CorruptedFile(format!(
                    "Invalid sector index {} in FAT",
                    sector
                )));
            }
            if remaining == 0 {
                return Err(OleError::CorruptedFile("Cycle in FAT chain".to_string()));
            }
            remaining -= 1;

            data.extend_from_slice(&self.read_sector(sector)?);
            sector = self.fat[sector as usize];
        }
        Ok(data)
    }

    /// Read a stream stored in the mini stream by following the MiniFAT.
    fn read_mini_chain(&mut self, start_sector: u32, size: u64) -> Result<Vec<u8>, OleError> {
        if self.ministream.is_none() {
            let root_start = self.entries[0].start_sector;
            self.ministream = Some(self.read_chain(root_start)?);
        }
        let ministream = self.ministream.as_deref().unwrap_or_default();

        let mut data = Vec::with_capacity((size as usize).min(ministream.len()));
        let mut sector = start_sector;
        let mut remaining = self.minifat.len();

        while sector != ENDOFCHAIN {
            if sector as usize >= self.minifat.len() || remaining == 0 {
                return Err(OleError::CorruptedFile(format!(
                    "Invalid mini sector chain at {}",
                    sector
                )));
            }
            remaining -= 1;

            let position = sector as usize * self.mini_sector_size;
            let chunk = ministream
                .get(position..position + self.mini_sector_size)
                .ok_or_else(|| OleError::CorruptedFile("Mini sector out of bounds".to_string()))?;
            data.extend_from_slice(chunk);
            sector = self.minifat[sector as usize];
        }

        data.truncate(size as usize);
        Ok(data)
    }

    /// Open a stream by path and return its contents.
    ///
    /// Path components are matched case-insensitively, as the compound file
    /// format requires.
    pub fn open_stream(&mut self, path: &[&str]) -> Result<Vec<u8>, OleError> {
        let entry = self.find_entry(path)?.clone();
        if entry.entry_type != STGTY_STREAM {
            return Err(OleError::InvalidFormat("Not a stream".to_string()));
        }

        if entry.size == 0 {
            return Ok(Vec::new());
        }
        if entry.is_minifat {
            self.read_mini_chain(entry.start_sector, entry.size)
        } else {
            let mut data = self.read_chain(entry.start_sector)?;
            data.truncate(entry.size as usize);
            Ok(data)
        }
    }

    /// Check if a stream or storage exists at the given path.
    pub fn exists(&self, path: &[&str]) -> bool {
        self.find_entry(path).is_ok()
    }

    fn find_entry(&self, path: &[&str]) -> Result<&DirectoryEntry, OleError> {
        let mut current = &self.entries[0];
        for name in path {
            current = self.find_child(current.sid_child, name)?;
        }
        Ok(current)
    }

    /// Walk the sibling tree under a storage looking for `name`.
    fn find_child(&self, root_sid: u32, name: &str) -> Result<&DirectoryEntry, OleError> {
        let mut pending = vec![root_sid];
        let mut visited = 0usize;

        while let Some(sid) = pending.pop() {
            if sid == NOSTREAM {
                continue;
            }
            let entry = self.entries.get(sid as usize).ok_or_else(|| {
                OleError::CorruptedFile(format!("Invalid directory entry index {}", sid))
            })?;
            visited += 1;
            if visited > self.entries.len() {
                return Err(OleError::CorruptedFile("Cycle in directory tree".to_string()));
            }
            if entry.entry_type != STGTY_EMPTY && entry.name.eq_ignore_ascii_case(name) {
                return Ok(entry);
            }
            pending.push(entry.sid_left);
            pending.push(entry.sid_right);
        }

        Err(OleError::StreamNotFound)
    }
}

fn read_u32_array(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Check if data is an OLE file by checking magic bytes
pub fn is_ole_file(data: &[u8]) -> bool {
    data.len() >= MINIMAL_OLEFILE_SIZE && &data[0..8] == MAGIC
}
