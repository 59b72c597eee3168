//! `head`: font header.

use super::{read_i16, read_u16, require_len, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder};

const LEN: usize = 54;
const CHECKSUM_ADJUSTMENT: usize = 8;
const UNITS_PER_EM: usize = 18;
const X_MIN: usize = 36;
const INDEX_TO_LOC_FORMAT: usize = 50;

/// Value the whole-font checksum must add up to with `checkSumAdjustment` included
pub const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    data: Vec<u8>,
}

impl Head {
    pub fn decode(data: &[u8]) -> Result<Self, MergeError> {
        require_len(TableKind::Head, data, LEN)?;
        Ok(Head {
            data: data.to_vec(),
        })
    }

    /// A version 1.0 header with the given em size and bounding box
    pub fn new(units_per_em: u16, bbox: [i16; 4]) -> Self {
        let mut data = vec![0u8; LEN];
        BigEndian::write_u32(&mut data[0..], 0x0001_0000);
        BigEndian::write_u32(&mut data[4..], 0x0001_0000);
        BigEndian::write_u32(&mut data[12..], 0x5F0F_3CF5);
        BigEndian::write_u16(&mut data[16..], 0x000B);
        BigEndian::write_i16(&mut data[48..], 2);
        let mut head = Head { data };
        head.set_units_per_em(units_per_em);
        head.set_bbox(bbox);
        head.set_index_to_loc_format(1);
        head
    }

    pub fn encode(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn units_per_em(&self) -> u16 {
        read_u16(&self.data, UNITS_PER_EM).unwrap_or(0)
    }

    pub fn set_units_per_em(&mut self, value: u16) {
        BigEndian::write_u16(&mut self.data[UNITS_PER_EM..], value);
    }

    /// `[xMin, yMin, xMax, yMax]`
    pub fn bbox(&self) -> [i16; 4] {
        let mut bbox = [0i16; 4];
        for (i, v) in bbox.iter_mut().enumerate() {
            *v = read_i16(&self.data, X_MIN + i * 2).unwrap_or(0);
        }
        bbox
    }

    pub fn set_bbox(&mut self, bbox: [i16; 4]) {
        for (i, v) in bbox.iter().enumerate() {
            BigEndian::write_i16(&mut self.data[X_MIN + i * 2..], *v);
        }
    }

    /// 0 for short `loca` offsets, 1 for long
    pub fn index_to_loc_format(&self) -> i16 {
        read_i16(&self.data, INDEX_TO_LOC_FORMAT).unwrap_or(0)
    }

    pub fn set_index_to_loc_format(&mut self, value: i16) {
        BigEndian::write_i16(&mut self.data[INDEX_TO_LOC_FORMAT..], value);
    }

    pub fn set_checksum_adjustment(&mut self, value: u32) {
        BigEndian::write_u32(&mut self.data[CHECKSUM_ADJUSTMENT..], value);
    }
}

/// Byte offset of `checkSumAdjustment` inside the `head` table
pub(crate) fn checksum_adjustment_offset() -> usize {
    CHECKSUM_ADJUSTMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header_fields() {
        let head = Head::new(2048, [-10, -200, 1000, 900]);
        assert_eq!(head.units_per_em(), 2048);
        assert_eq!(head.bbox(), [-10, -200, 1000, 900]);
        assert_eq!(head.index_to_loc_format(), 1);
        assert_eq!(head.encode().len(), 54);
    }

    #[test]
    fn test_decode_rejects_short_table() {
        assert!(Head::decode(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_unknown_fields_survive() {
        let mut raw = Head::new(1000, [0; 4]).encode();
        raw[44] = 0xAB;
        let mut head = Head::decode(&raw).unwrap();
        head.set_units_per_em(2048);
        assert_eq!(head.encode()[44], 0xAB);
    }
}
