//! `post`: PostScript data and glyph names.

use super::{io_truncated, read_i16, read_u32, require_len, scale_i16, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use read_fonts::tables::post::DEFAULT_GLYPH_NAMES;
use std::collections::HashMap;
use std::io::{Cursor, Read};

const HEADER_LEN: usize = 32;
const VERSION_1: u32 = 0x0001_0000;
const VERSION_2: u32 = 0x0002_0000;
const VERSION_3: u32 = 0x0003_0000;
const UNDERLINE_POSITION: usize = 8;
const UNDERLINE_THICKNESS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    header: Vec<u8>,
    /// Glyph names by glyph id, when the table carries them
    pub names: Option<Vec<String>>,
}

impl Post {
    pub fn decode(data: &[u8], num_glyphs: u16) -> Result<Self, MergeError> {
        require_len(TableKind::Post, data, HEADER_LEN)?;
        let header = data[..HEADER_LEN].to_vec();
        let names = match read_u32(data, 0) {
            Some(VERSION_1) => Some(
                DEFAULT_GLYPH_NAMES
                    .iter()
                    .take(num_glyphs as usize)
                    .map(|n| n.to_string())
                    .collect(),
            ),
            Some(VERSION_2) => Some(decode_names(&data[HEADER_LEN..])?),
            _ => None,
        };
        Ok(Post { header, names })
    }

    /// A version 3 table without glyph names
    pub fn new() -> Self {
        let mut header = vec![0u8; HEADER_LEN];
        BigEndian::write_u32(&mut header[0..], VERSION_3);
        Post {
            header,
            names: None,
        }
    }

    /// Writes version 2 when names are present, version 3 otherwise
    pub fn encode(&self) -> Vec<u8> {
        let mut data = self.header.clone();
        match &self.names {
            Some(names) => {
                BigEndian::write_u32(&mut data[0..], VERSION_2);
                encode_names(names, &mut data);
            }
            None => BigEndian::write_u32(&mut data[0..], VERSION_3),
        }
        data
    }

    pub fn glyph_name(&self, glyph_id: u16) -> Option<&str> {
        self.names
            .as_ref()
            .and_then(|names| names.get(glyph_id as usize))
            .map(String::as_str)
    }

    pub fn underline_position(&self) -> i16 {
        read_i16(&self.header, UNDERLINE_POSITION).unwrap_or(0)
    }

    pub fn underline_thickness(&self) -> i16 {
        read_i16(&self.header, UNDERLINE_THICKNESS).unwrap_or(0)
    }

    pub fn scale(&mut self, factor: f64) {
        let position = scale_i16(self.underline_position(), factor);
        let thickness = scale_i16(self.underline_thickness(), factor);
        BigEndian::write_i16(&mut self.header[UNDERLINE_POSITION..], position);
        BigEndian::write_i16(&mut self.header[UNDERLINE_THICKNESS..], thickness);
    }
}

impl Default for Post {
    fn default() -> Self {
        Post::new()
    }
}

fn decode_names(data: &[u8]) -> Result<Vec<String>, MergeError> {
    let truncated = io_truncated(TableKind::Post);
    let mut cursor = Cursor::new(data);
    let count = cursor.read_u16::<BigEndian>().map_err(&truncated)?;
    let mut indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        indices.push(cursor.read_u16::<BigEndian>().map_err(&truncated)?);
    }
    let mut custom = Vec::new();
    while let Ok(len) = cursor.read_u8() {
        let mut buf = vec![0u8; len as usize];
        cursor.read_exact(&mut buf).map_err(&truncated)?;
        custom.push(String::from_utf8_lossy(&buf).into_owned());
    }
    indices
        .into_iter()
        .map(|index| {
            let index = index as usize;
            if index < DEFAULT_GLYPH_NAMES.len() {
                Ok(DEFAULT_GLYPH_NAMES[index].to_string())
            } else {
                custom
                    .get(index - DEFAULT_GLYPH_NAMES.len())
                    .cloned()
                    .ok_or_else(|| MergeError::table("post", "references a missing glyph name"))
            }
        })
        .collect()
}

fn encode_names(names: &[String], out: &mut Vec<u8>) {
    let standard: HashMap<&str, u16> = DEFAULT_GLYPH_NAMES
        .iter()
        .enumerate()
        .map(|(i, n)| (*n, i as u16))
        .collect();
    let mut custom: Vec<&str> = Vec::new();
    let mut custom_index: HashMap<&str, u16> = HashMap::new();
    let _ = out.write_u16::<BigEndian>(names.len() as u16);
    for name in names {
        let index = match standard.get(name.as_str()) {
            Some(&i) => i,
            None => *custom_index.entry(name.as_str()).or_insert_with(|| {
                custom.push(name.as_str());
                (DEFAULT_GLYPH_NAMES.len() + custom.len() - 1) as u16
            }),
        };
        let _ = out.write_u16::<BigEndian>(index);
    }
    for name in custom {
        let bytes = &name.as_bytes()[..name.len().min(255)];
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
}
