//! `hhea` and `vhea`: the two metrics headers share one layout.

use super::{read_i16, read_u16, require_len, scale_i16, scale_u16, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder};

const LEN: usize = 36;
const ASCENDER: usize = 4;
const DESCENDER: usize = 6;
const LINE_GAP: usize = 8;
const ADVANCE_MAX: usize = 10;
const MIN_LEADING_BEARING: usize = 12;
const MIN_TRAILING_BEARING: usize = 14;
const MAX_EXTENT: usize = 16;
const CARET_OFFSET: usize = 22;
const NUM_LONG_METRICS: usize = 34;

/// Header for horizontal (`hhea`) or vertical (`vhea`) metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsHeader {
    data: Vec<u8>,
}

impl MetricsHeader {
    pub fn decode(kind: TableKind, data: &[u8]) -> Result<Self, MergeError> {
        require_len(kind, data, LEN)?;
        Ok(MetricsHeader {
            data: data[..LEN].to_vec(),
        })
    }

    pub fn new(ascender: i16, descender: i16, line_gap: i16, num_long_metrics: u16) -> Self {
        let mut data = vec![0u8; LEN];
        BigEndian::write_u32(&mut data[0..], 0x0001_0000);
        BigEndian::write_i16(&mut data[18..], 1);
        let mut header = MetricsHeader { data };
        header.set_i16(ASCENDER, ascender);
        header.set_i16(DESCENDER, descender);
        header.set_i16(LINE_GAP, line_gap);
        header.set_num_long_metrics(num_long_metrics);
        header
    }

    pub fn encode(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn get_i16(&self, offset: usize) -> i16 {
        read_i16(&self.data, offset).unwrap_or(0)
    }

    fn set_i16(&mut self, offset: usize, value: i16) {
        BigEndian::write_i16(&mut self.data[offset..], value);
    }

    pub fn ascender(&self) -> i16 {
        self.get_i16(ASCENDER)
    }

    pub fn set_ascender(&mut self, value: i16) {
        self.set_i16(ASCENDER, value);
    }

    pub fn descender(&self) -> i16 {
        self.get_i16(DESCENDER)
    }

    pub fn set_descender(&mut self, value: i16) {
        self.set_i16(DESCENDER, value);
    }

    pub fn line_gap(&self) -> i16 {
        self.get_i16(LINE_GAP)
    }

    pub fn advance_max(&self) -> u16 {
        read_u16(&self.data, ADVANCE_MAX).unwrap_or(0)
    }

    pub fn set_advance_max(&mut self, value: u16) {
        BigEndian::write_u16(&mut self.data[ADVANCE_MAX..], value);
    }

    pub fn min_leading_bearing(&self) -> i16 {
        self.get_i16(MIN_LEADING_BEARING)
    }

    pub fn set_min_leading_bearing(&mut self, value: i16) {
        self.set_i16(MIN_LEADING_BEARING, value);
    }

    pub fn min_trailing_bearing(&self) -> i16 {
        self.get_i16(MIN_TRAILING_BEARING)
    }

    pub fn set_min_trailing_bearing(&mut self, value: i16) {
        self.set_i16(MIN_TRAILING_BEARING, value);
    }

    pub fn max_extent(&self) -> i16 {
        self.get_i16(MAX_EXTENT)
    }

    pub fn set_max_extent(&mut self, value: i16) {
        self.set_i16(MAX_EXTENT, value);
    }

    pub fn num_long_metrics(&self) -> u16 {
        read_u16(&self.data, NUM_LONG_METRICS).unwrap_or(0)
    }

    pub fn set_num_long_metrics(&mut self, value: u16) {
        BigEndian::write_u16(&mut self.data[NUM_LONG_METRICS..], value);
    }

    /// Scales every font-unit field by `factor`
    pub fn scale(&mut self, factor: f64) {
        for offset in [
            ASCENDER,
            DESCENDER,
            LINE_GAP,
            MIN_LEADING_BEARING,
            MIN_TRAILING_BEARING,
            MAX_EXTENT,
            CARET_OFFSET,
        ] {
            let value = self.get_i16(offset);
            self.set_i16(offset, scale_i16(value, factor));
        }
        let advance = self.advance_max();
        self.set_advance_max(scale_u16(advance, factor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_touches_vertical_extents() {
        let mut hhea = MetricsHeader::new(800, -200, 90, 3);
        hhea.set_advance_max(1000);
        hhea.scale(2.048);
        assert_eq!(hhea.ascender(), 1638);
        assert_eq!(hhea.descender(), -410);
        assert_eq!(hhea.line_gap(), 184);
        assert_eq!(hhea.advance_max(), 2048);
        assert_eq!(hhea.num_long_metrics(), 3);
    }

    #[test]
    fn test_decode_requires_full_header() {
        assert!(MetricsHeader::decode(TableKind::Hhea, &[0u8; 30]).is_err());
        let raw = MetricsHeader::new(1, -1, 0, 1).encode();
        assert_eq!(MetricsHeader::decode(TableKind::Vhea, &raw).unwrap().ascender(), 1);
    }
}
