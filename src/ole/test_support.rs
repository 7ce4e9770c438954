//! In-memory compound file writer used by the parser tests.

use super::consts::*;

const SECTOR: usize = 512;
const MINI_SECTOR: usize = 64;

/// Builds a version 3 compound file with streams directly under the root.
pub(crate) struct CompoundBuilder {
    streams: Vec<(String, Vec<u8>)>,
    use_mini: bool,
}

impl CompoundBuilder {
    pub(crate) fn new() -> Self {
        Self {
            streams: Vec::new(),
            use_mini: false,
        }
    }

    /// Store streams in the mini stream (cutoff 4096) instead of the FAT.
    pub(crate) fn with_mini_stream(mut self) -> Self {
        self.use_mini = true;
        self
    }

    pub(crate) fn stream(mut self, name: &str, data: Vec<u8>) -> Self {
        self.streams.push((name.to_string(), data));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut sectors: Vec<[u8; SECTOR]> = Vec::new();
        let mut fat: Vec<u32> = Vec::new();

        let mut starts = Vec::with_capacity(self.streams.len());
        let mut minifat: Vec<u32> = Vec::new();
        let mut ministream: Vec<u8> = Vec::new();

        for (_, data) in &self.streams {
            if data.is_empty() {
                starts.push(ENDOFCHAIN);
            } else if self.use_mini {
                let first = (ministream.len() / MINI_SECTOR) as u32;
                let count = data.len().div_ceil(MINI_SECTOR);
                for i in 0..count {
                    let next = if i + 1 == count { ENDOFCHAIN } else { first + i as u32 + 1 };
                    minifat.push(next);
                }
                ministream.extend_from_slice(data);
                ministream.resize(ministream.len().div_ceil(MINI_SECTOR) * MINI_SECTOR, 0);
                starts.push(first);
            } else {
                starts.push(push_chain(&mut sectors, &mut fat, data));
            }
        }

        let (minifat_start, ministream_start) = if self.use_mini && !minifat.is_empty() {
            let minifat_bytes: Vec<u8> = minifat.iter().flat_map(|v| v.to_le_bytes()).collect();
            (
                push_chain(&mut sectors, &mut fat, &minifat_bytes),
                push_chain(&mut sectors, &mut fat, &ministream),
            )
        } else {
            (ENDOFCHAIN, ENDOFCHAIN)
        };

        let mut directory = Vec::new();
        let root_child = if self.streams.is_empty() { NOSTREAM } else { 1 };
        directory.extend(dir_entry("Root Entry", STGTY_ROOT, NOSTREAM, root_child, ministream_start, ministream.len() as u64));
        for (index, (name, data)) in self.streams.iter().enumerate() {
            let sid = index as u32 + 1;
            let right = if index + 1 < self.streams.len() { sid + 1 } else { NOSTREAM };
            directory.extend(dir_entry(name, STGTY_STREAM, right, NOSTREAM, starts[index], data.len() as u64));
        }
        let dir_start = push_chain(&mut sectors, &mut fat, &directory);

        // Keep the file above the minimal OLE size
        while sectors.len() < 2 {
            sectors.push([0u8; SECTOR]);
            fat.push(FREESECT);
        }

        let mut fat_count = 1;
        while fat_count * (SECTOR / 4) < sectors.len() + fat_count {
            fat_count += 1;
        }
        let first_fat = sectors.len() as u32;
        for _ in 0..fat_count {
            fat.push(FATSECT);
        }
        fat.resize(fat_count * SECTOR / 4, FREESECT);
        for chunk in fat.chunks(SECTOR / 4) {
            let mut sector = [0u8; SECTOR];
            for (i, value) in chunk.iter().enumerate() {
                sector[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
            }
            sectors.push(sector);
        }

        let mut header = vec![0u8; SECTOR];
        header[0..8].copy_from_slice(MAGIC);
        header[0x18..0x1A].copy_from_slice(&0x3Eu16.to_le_bytes());
        header[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
        header[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        header[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
        header[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
        header[0x2C..0x30].copy_from_slice(&(fat_count as u32).to_le_bytes());
        header[0x30..0x34].copy_from_slice(&dir_start.to_le_bytes());
        let cutoff: u32 = if self.use_mini { 4096 } else { 0 };
        header[0x38..0x3C].copy_from_slice(&cutoff.to_le_bytes());
        header[0x3C..0x40].copy_from_slice(&minifat_start.to_le_bytes());
        let minifat_sectors = (minifat.len() * 4).div_ceil(SECTOR) as u32;
        header[0x40..0x44].copy_from_slice(&minifat_sectors.to_le_bytes());
        header[0x44..0x48].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
        for i in 0..HEADER_DIFAT_ENTRIES {
            let id = if i < fat_count { first_fat + i as u32 } else { FREESECT };
            header[0x4C + i * 4..0x50 + i * 4].copy_from_slice(&id.to_le_bytes());
        }

        let mut file = header;
        for sector in &sectors {
            file.extend_from_slice(sector);
        }
        file
    }
}

fn push_chain(sectors: &mut Vec<[u8; SECTOR]>, fat: &mut Vec<u32>, data: &[u8]) -> u32 {
    let first = sectors.len() as u32;
    let count = data.len().div_ceil(SECTOR).max(1);
    for i in 0..count {
        let mut sector = [0u8; SECTOR];
        let start = i * SECTOR;
        let end = (start + SECTOR).min(data.len());
        if start < end {
            sector[..end - start].copy_from_slice(&data[start..end]);
        }
        sectors.push(sector);
        fat.push(if i + 1 == count { ENDOFCHAIN } else { first + i as u32 + 1 });
    }
    first
}

fn dir_entry(name: &str, entry_type: u8, right: u32, child: u32, start: u32, size: u64) -> [u8; DIRENTRY_SIZE] {
    let mut entry = [0u8; DIRENTRY_SIZE];
    let units: Vec<u16> = name.encode_utf16().collect();
    for (i, unit) in units.iter().take(31).enumerate() {
        entry[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    let name_len = ((units.len().min(31) + 1) * 2) as u16;
    entry[64..66].copy_from_slice(&name_len.to_le_bytes());
    entry[66] = entry_type;
    entry[67] = 1;
    entry[68..72].copy_from_slice(&NOSTREAM.to_le_bytes());
    entry[72..76].copy_from_slice(&right.to_le_bytes());
    entry[76..80].copy_from_slice(&child.to_le_bytes());
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..128].copy_from_slice(&size.to_le_bytes());
    entry
}
