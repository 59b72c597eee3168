//! `OS/2`: Windows metrics.

use super::{read_u16, read_u32, require_len, scale_i16, scale_u16, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder};

const MIN_LEN: usize = 78;
const V4_LEN: usize = 96;
const X_AVG_CHAR_WIDTH: usize = 2;
const UNICODE_RANGE: usize = 42;
const FIRST_CHAR_INDEX: usize = 64;
const LAST_CHAR_INDEX: usize = 66;
const TYPO_ASCENDER: usize = 68;
const TYPO_DESCENDER: usize = 70;
const TYPO_LINE_GAP: usize = 72;
const WIN_ASCENT: usize = 74;
const WIN_DESCENT: usize = 76;
const X_HEIGHT: usize = 86;
const CAP_HEIGHT: usize = 88;

/// Sub/superscript sizes and offsets, strikeout size and position
const SCRIPT_FIELDS: std::ops::Range<usize> = 10..30;

#[derive(Debug, Clone, PartialEq)]
pub struct Os2 {
    data: Vec<u8>,
}

impl Os2 {
    pub fn decode(data: &[u8]) -> Result<Self, MergeError> {
        require_len(TableKind::Os2, data, MIN_LEN)?;
        Ok(Os2 {
            data: data.to_vec(),
        })
    }

    /// A version 4 table with the given vertical metrics
    pub fn new(ascender: i16, descender: i16, line_gap: i16) -> Self {
        let mut data = vec![0u8; V4_LEN];
        BigEndian::write_u16(&mut data[0..], 4);
        BigEndian::write_u16(&mut data[4..], 400);
        BigEndian::write_u16(&mut data[6..], 5);
        data[58..62].copy_from_slice(b"NONE");
        BigEndian::write_u16(&mut data[62..], 0x0040);
        let mut os2 = Os2 { data };
        os2.set_i16(TYPO_ASCENDER, ascender);
        os2.set_i16(TYPO_DESCENDER, descender);
        os2.set_i16(TYPO_LINE_GAP, line_gap);
        os2.set_win_ascent(ascender.max(0) as u16);
        os2.set_win_descent(descender.unsigned_abs());
        os2
    }

    pub fn encode(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn version(&self) -> u16 {
        read_u16(&self.data, 0).unwrap_or(0)
    }

    fn get_i16(&self, offset: usize) -> i16 {
        read_u16(&self.data, offset).unwrap_or(0) as i16
    }

    fn set_i16(&mut self, offset: usize, value: i16) {
        if self.data.len() >= offset + 2 {
            BigEndian::write_i16(&mut self.data[offset..], value);
        }
    }

    fn set_u16(&mut self, offset: usize, value: u16) {
        if self.data.len() >= offset + 2 {
            BigEndian::write_u16(&mut self.data[offset..], value);
        }
    }

    pub fn win_ascent(&self) -> u16 {
        read_u16(&self.data, WIN_ASCENT).unwrap_or(0)
    }

    pub fn set_win_ascent(&mut self, value: u16) {
        self.set_u16(WIN_ASCENT, value);
    }

    /// Stored as a positive distance below the baseline
    pub fn win_descent(&self) -> u16 {
        read_u16(&self.data, WIN_DESCENT).unwrap_or(0)
    }

    pub fn set_win_descent(&mut self, value: u16) {
        self.set_u16(WIN_DESCENT, value);
    }

    pub fn typo_ascender(&self) -> i16 {
        self.get_i16(TYPO_ASCENDER)
    }

    pub fn unicode_ranges(&self) -> [u32; 4] {
        let mut ranges = [0u32; 4];
        for (i, r) in ranges.iter_mut().enumerate() {
            *r = read_u32(&self.data, UNICODE_RANGE + i * 4).unwrap_or(0);
        }
        ranges
    }

    pub fn set_unicode_ranges(&mut self, ranges: [u32; 4]) {
        for (i, r) in ranges.iter().enumerate() {
            BigEndian::write_u32(&mut self.data[UNICODE_RANGE + i * 4..], *r);
        }
    }

    pub fn char_index_range(&self) -> (u16, u16) {
        (
            read_u16(&self.data, FIRST_CHAR_INDEX).unwrap_or(0),
            read_u16(&self.data, LAST_CHAR_INDEX).unwrap_or(0),
        )
    }

    /// Records the lowest and highest mapped codepoints, saturating at U+FFFF
    pub fn set_char_index_range(&mut self, first: u32, last: u32) {
        self.set_u16(FIRST_CHAR_INDEX, first.min(0xFFFF) as u16);
        self.set_u16(LAST_CHAR_INDEX, last.min(0xFFFF) as u16);
    }

    /// Scales every font-unit field by `factor`
    pub fn scale(&mut self, factor: f64) {
        let mut signed = vec![X_AVG_CHAR_WIDTH, TYPO_ASCENDER, TYPO_DESCENDER, TYPO_LINE_GAP];
        signed.extend(SCRIPT_FIELDS.step_by(2));
        if self.version() >= 2 {
            signed.extend([X_HEIGHT, CAP_HEIGHT]);
        }
        for offset in signed {
            let value = self.get_i16(offset);
            self.set_i16(offset, scale_i16(value, factor));
        }
        let ascent = self.win_ascent();
        self.set_win_ascent(scale_u16(ascent, factor));
        // Some fonts store a negative descent; the field is a magnitude.
        let descent = self.get_i16(WIN_DESCENT);
        let scaled = (descent as f64 * factor).round().abs().min(u16::MAX as f64) as u16;
        self.set_win_descent(scaled);
    }
}
