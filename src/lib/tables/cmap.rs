//! `cmap`: codepoint to glyph id mapping.
//!
//! Decoding picks the widest Unicode subtable (format 12 before format 4, then the
//! byte-oriented formats 6 and 0). Encoding writes a format 4 subtable for the BMP and adds
//! a format 12 subtable when supplementary-plane codepoints are present.

use super::{read_i16, read_u16, read_u32, truncated, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharMap {
    pub mappings: BTreeMap<u32, u16>,
}

impl CharMap {
    pub fn new(mappings: BTreeMap<u32, u16>) -> Self {
        CharMap { mappings }
    }

    pub fn decode(data: &[u8]) -> Result<Self, MergeError> {
        let num_tables = read_u16(data, 2).ok_or_else(|| truncated(TableKind::Cmap))?;
        let mut best: Option<(u8, usize)> = None;
        for i in 0..num_tables as usize {
            let record = 4 + i * 8;
            let platform = read_u16(data, record).ok_or_else(|| truncated(TableKind::Cmap))?;
            let encoding = read_u16(data, record + 2).ok_or_else(|| truncated(TableKind::Cmap))?;
            let offset = read_u32(data, record + 4).ok_or_else(|| truncated(TableKind::Cmap))?;
            let Some(format) = read_u16(data, offset as usize) else {
                continue;
            };
            let unicode = platform == 0 || (platform == 3 && (encoding == 1 || encoding == 10));
            let rank = match (unicode, format) {
                (true, 12) => 4,
                (true, 4) => 3,
                (_, 6) => 2,
                (_, 0) => 1,
                _ => 0,
            };
            if rank > 0 && best.map_or(true, |(r, _)| rank > r) {
                best = Some((rank, offset as usize));
            }
        }
        let Some((_, offset)) = best else {
            return Err(MergeError::table("cmap", "has no supported Unicode subtable"));
        };
        let subtable = &data[offset..];
        let mappings = match read_u16(subtable, 0) {
            Some(12) => decode_format12(subtable),
            Some(4) => decode_format4(subtable),
            Some(6) => decode_format6(subtable),
            _ => decode_format0(subtable),
        }
        .ok_or_else(|| truncated(TableKind::Cmap))?;
        debug!("Decoded cmap with {} mappings", mappings.len());
        Ok(CharMap { mappings })
    }

    pub fn encode(&self) -> Vec<u8> {
        let has_non_bmp = self.mappings.keys().any(|&cp| cp > 0xFFFF);
        let fmt4 = encode_format4(&self.mappings);
        let fmt12 = if has_non_bmp {
            encode_format12(&self.mappings)
        } else {
            Vec::new()
        };

        // (0,3) and (3,1) share the format 4 subtable; (0,4) and (3,10) share format 12
        let num_records: u16 = if has_non_bmp { 4 } else { 2 };
        let fmt4_offset = 4 + num_records as u32 * 8;
        let fmt12_offset = fmt4_offset + fmt4.len() as u32;
        let mut records = vec![(0u16, 3u16, fmt4_offset)];
        if has_non_bmp {
            records.push((0, 4, fmt12_offset));
        }
        records.push((3, 1, fmt4_offset));
        if has_non_bmp {
            records.push((3, 10, fmt12_offset));
        }

        let mut data = Vec::new();
        let _ = data.write_u16::<BigEndian>(0);
        let _ = data.write_u16::<BigEndian>(num_records);
        for (platform, encoding, offset) in records {
            let _ = data.write_u16::<BigEndian>(platform);
            let _ = data.write_u16::<BigEndian>(encoding);
            let _ = data.write_u32::<BigEndian>(offset);
        }
        data.extend_from_slice(&fmt4);
        data.extend_from_slice(&fmt12);
        data
    }

    pub fn glyph(&self, codepoint: u32) -> Option<u16> {
        self.mappings.get(&codepoint).copied()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn decode_format4(data: &[u8]) -> Option<BTreeMap<u32, u16>> {
    let seg_count = read_u16(data, 6)? as usize / 2;
    let end_codes = 14;
    let start_codes = end_codes + seg_count * 2 + 2;
    let id_deltas = start_codes + seg_count * 2;
    let id_range_offsets = id_deltas + seg_count * 2;
    let mut mappings = BTreeMap::new();
    for seg in 0..seg_count {
        let end = read_u16(data, end_codes + seg * 2)?;
        let start = read_u16(data, start_codes + seg * 2)?;
        let delta = read_i16(data, id_deltas + seg * 2)? as u16;
        let range_offset_pos = id_range_offsets + seg * 2;
        let range_offset = read_u16(data, range_offset_pos)? as usize;
        if start > end {
            continue;
        }
        for cp in start..=end {
            if cp == 0xFFFF {
                break;
            }
            let gid = if range_offset == 0 {
                cp.wrapping_add(delta)
            } else {
                let addr = range_offset_pos + range_offset + 2 * (cp - start) as usize;
                match read_u16(data, addr)? {
                    0 => 0,
                    g => g.wrapping_add(delta),
                }
            };
            if gid != 0 {
                mappings.insert(cp as u32, gid);
            }
        }
    }
    Some(mappings)
}

fn decode_format12(data: &[u8]) -> Option<BTreeMap<u32, u16>> {
    let num_groups = read_u32(data, 12)? as usize;
    let mut mappings = BTreeMap::new();
    for group in 0..num_groups {
        let base = 16 + group * 12;
        let start = read_u32(data, base)?;
        let end = read_u32(data, base + 4)?;
        let start_gid = read_u32(data, base + 8)?;
        if end < start || end > 0x10FFFF {
            continue;
        }
        for cp in start..=end {
            let gid = start_gid + (cp - start);
            if gid != 0 && gid <= u16::MAX as u32 {
                mappings.insert(cp, gid as u16);
            }
        }
    }
    Some(mappings)
}

fn decode_format6(data: &[u8]) -> Option<BTreeMap<u32, u16>> {
    let first = read_u16(data, 6)? as u32;
    let count = read_u16(data, 8)? as usize;
    let mut mappings = BTreeMap::new();
    for i in 0..count {
        let gid = read_u16(data, 10 + i * 2)?;
        if gid != 0 {
            mappings.insert(first + i as u32, gid);
        }
    }
    Some(mappings)
}

fn decode_format0(data: &[u8]) -> Option<BTreeMap<u32, u16>> {
    let glyphs = data.get(6..6 + 256)?;
    Some(
        glyphs
            .iter()
            .enumerate()
            .filter(|(_, &gid)| gid != 0)
            .map(|(cp, &gid)| (cp as u32, gid as u16))
            .collect(),
    )
}

/// Runs of consecutive codepoints mapped to consecutive glyph ids
fn runs(mappings: impl Iterator<Item = (u32, u16)>) -> Vec<(u32, u32, u16)> {
    let mut runs: Vec<(u32, u32, u16)> = Vec::new();
    for (cp, gid) in mappings {
        if let Some(last) = runs.last_mut() {
            let (start, end, start_gid) = *last;
            if cp == end + 1 && gid as u32 == start_gid as u32 + (cp - start) {
                last.1 = cp;
                continue;
            }
        }
        runs.push((cp, cp, gid));
    }
    runs
}

fn encode_format4(mappings: &BTreeMap<u32, u16>) -> Vec<u8> {
    let mut segments: Vec<(u16, u16, u16)> = runs(
        mappings
            .iter()
            .filter(|(&cp, _)| cp < 0xFFFF)
            .map(|(&cp, &gid)| (cp, gid)),
    )
    .into_iter()
    .map(|(start, end, gid)| (start as u16, end as u16, gid.wrapping_sub(start as u16)))
    .collect();
    // Required end-of-table segment
    segments.push((0xFFFF, 0xFFFF, 1));

    let seg_count = segments.len() as u16;
    let mut power = 1u16;
    while power * 2 <= seg_count {
        power <<= 1;
    }
    let search_range = power * 2;
    let entry_selector = power.trailing_zeros() as u16;
    let range_shift = seg_count * 2 - search_range;
    let length = 16 + segments.len() * 8;

    let mut data = Vec::with_capacity(length);
    let _ = data.write_u16::<BigEndian>(4);
    let _ = data.write_u16::<BigEndian>(length.min(u16::MAX as usize) as u16);
    let _ = data.write_u16::<BigEndian>(0);
    let _ = data.write_u16::<BigEndian>(seg_count * 2);
    let _ = data.write_u16::<BigEndian>(search_range);
    let _ = data.write_u16::<BigEndian>(entry_selector);
    let _ = data.write_u16::<BigEndian>(range_shift);
    for (_, end, _) in &segments {
        let _ = data.write_u16::<BigEndian>(*end);
    }
    let _ = data.write_u16::<BigEndian>(0);
    for (start, _, _) in &segments {
        let _ = data.write_u16::<BigEndian>(*start);
    }
    for (_, _, delta) in &segments {
        let _ = data.write_u16::<BigEndian>(*delta);
    }
    for _ in &segments {
        let _ = data.write_u16::<BigEndian>(0);
    }
    data
}

fn encode_format12(mappings: &BTreeMap<u32, u16>) -> Vec<u8> {
    let groups = runs(mappings.iter().map(|(&cp, &gid)| (cp, gid)));
    let mut data = Vec::with_capacity(16 + groups.len() * 12);
    let _ = data.write_u16::<BigEndian>(12);
    let _ = data.write_u16::<BigEndian>(0);
    let _ = data.write_u32::<BigEndian>(16 + groups.len() as u32 * 12);
    let _ = data.write_u32::<BigEndian>(0);
    let _ = data.write_u32::<BigEndian>(groups.len() as u32);
    for (start, end, gid) in groups {
        let _ = data.write_u32::<BigEndian>(start);
        let _ = data.write_u32::<BigEndian>(end);
        let _ = data.write_u32::<BigEndian>(gid as u32);
    }
    data
}
