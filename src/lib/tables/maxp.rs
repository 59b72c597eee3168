//! `maxp`: glyph count and TrueType interpreter limits.

use super::{read_u16, read_u32, require_len, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder};

const VERSION_0_5: u32 = 0x0000_5000;
const VERSION_1_0: u32 = 0x0001_0000;
const LEN_0_5: usize = 6;
const LEN_1_0: usize = 32;
const NUM_GLYPHS: usize = 4;
const MAX_POINTS: usize = 6;
const MAX_CONTOURS: usize = 8;
const MAX_COMPOSITE_POINTS: usize = 10;
const MAX_COMPOSITE_CONTOURS: usize = 12;
const MAX_ZONES: usize = 14;
const MAX_TWILIGHT_POINTS: usize = 16;
const MAX_SIZE_OF_INSTRUCTIONS: usize = 26;
const MAX_COMPONENT_ELEMENTS: usize = 28;
const MAX_COMPONENT_DEPTH: usize = 30;

/// Outline statistics recorded in a version 1.0 `maxp`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxpProfile {
    pub max_points: u16,
    pub max_contours: u16,
    pub max_composite_points: u16,
    pub max_composite_contours: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Maxp {
    data: Vec<u8>,
}

impl Maxp {
    pub fn decode(data: &[u8]) -> Result<Self, MergeError> {
        require_len(TableKind::Maxp, data, LEN_0_5)?;
        let len = match read_u32(data, 0) {
            Some(VERSION_1_0) => {
                require_len(TableKind::Maxp, data, LEN_1_0)?;
                LEN_1_0
            }
            _ => LEN_0_5,
        };
        Ok(Maxp {
            data: data[..len].to_vec(),
        })
    }

    /// A version 1.0 table for a TrueType font with `num_glyphs` glyphs
    pub fn new(num_glyphs: u16) -> Self {
        let mut maxp = Maxp {
            data: vec![0u8; LEN_0_5],
        };
        BigEndian::write_u32(&mut maxp.data[0..], VERSION_0_5);
        maxp.set_num_glyphs(num_glyphs);
        maxp.upgrade_to_truetype();
        maxp
    }

    pub fn encode(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn num_glyphs(&self) -> u16 {
        read_u16(&self.data, NUM_GLYPHS).unwrap_or(0)
    }

    pub fn set_num_glyphs(&mut self, value: u16) {
        BigEndian::write_u16(&mut self.data[NUM_GLYPHS..], value);
    }

    pub fn is_truetype(&self) -> bool {
        read_u32(&self.data, 0) == Some(VERSION_1_0)
    }

    /// Converts a CFF style 0.5 table to 1.0; a no-op for 1.0 tables
    pub fn upgrade_to_truetype(&mut self) {
        if self.is_truetype() {
            return;
        }
        self.data.resize(LEN_1_0, 0);
        BigEndian::write_u32(&mut self.data[0..], VERSION_1_0);
        BigEndian::write_u16(&mut self.data[MAX_ZONES..], 2);
    }

    pub fn profile(&self) -> MaxpProfile {
        let get = |offset| read_u16(&self.data, offset).unwrap_or(0);
        MaxpProfile {
            max_points: get(MAX_POINTS),
            max_contours: get(MAX_CONTOURS),
            max_composite_points: get(MAX_COMPOSITE_POINTS),
            max_composite_contours: get(MAX_COMPOSITE_CONTOURS),
            max_component_elements: get(MAX_COMPONENT_ELEMENTS),
            max_component_depth: get(MAX_COMPONENT_DEPTH),
        }
    }

    pub fn set_profile(&mut self, profile: &MaxpProfile) {
        if !self.is_truetype() {
            return;
        }
        for (offset, value) in [
            (MAX_POINTS, profile.max_points),
            (MAX_CONTOURS, profile.max_contours),
            (MAX_COMPOSITE_POINTS, profile.max_composite_points),
            (MAX_COMPOSITE_CONTOURS, profile.max_composite_contours),
            (MAX_COMPONENT_ELEMENTS, profile.max_component_elements),
            (MAX_COMPONENT_DEPTH, profile.max_component_depth),
        ] {
            BigEndian::write_u16(&mut self.data[offset..], value);
        }
    }

    /// Zeroes the interpreter limits once hinting programs are gone
    pub fn clear_instruction_limits(&mut self) {
        if !self.is_truetype() {
            return;
        }
        BigEndian::write_u16(&mut self.data[MAX_ZONES..], 1);
        for offset in (MAX_TWILIGHT_POINTS..=MAX_SIZE_OF_INSTRUCTIONS).step_by(2) {
            BigEndian::write_u16(&mut self.data[offset..], 0);
        }
    }

    /// Raises every limit of `self` to at least the matching limit of `other`
    pub fn raise_to(&mut self, other: &Maxp) {
        if !self.is_truetype() || !other.is_truetype() {
            return;
        }
        for offset in (MAX_POINTS..LEN_1_0).step_by(2) {
            let mine = read_u16(&self.data, offset).unwrap_or(0);
            let theirs = read_u16(&other.data, offset).unwrap_or(0);
            BigEndian::write_u16(&mut self.data[offset..], mine.max(theirs));
        }
    }
}

impl MaxpProfile {
    pub fn max(self, other: MaxpProfile) -> MaxpProfile {
        MaxpProfile {
            max_points: self.max_points.max(other.max_points),
            max_contours: self.max_contours.max(other.max_contours),
            max_composite_points: self.max_composite_points.max(other.max_composite_points),
            max_composite_contours: self
                .max_composite_contours
                .max(other.max_composite_contours),
            max_component_elements: self
                .max_component_elements
                .max(other.max_component_elements),
            max_component_depth: self.max_component_depth.max(other.max_component_depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_from_cff_version() {
        let mut raw = vec![0u8; 6];
        BigEndian::write_u32(&mut raw[0..], VERSION_0_5);
        BigEndian::write_u16(&mut raw[4..], 42);
        let mut maxp = Maxp::decode(&raw).unwrap();
        assert!(!maxp.is_truetype());
        maxp.upgrade_to_truetype();
        assert!(maxp.is_truetype());
        assert_eq!(maxp.num_glyphs(), 42);
        assert_eq!(maxp.encode().len(), 32);
    }

    #[test]
    fn test_clear_instruction_limits_keeps_profile() {
        let mut maxp = Maxp::new(3);
        maxp.set_profile(&MaxpProfile {
            max_points: 12,
            max_contours: 2,
            ..Default::default()
        });
        BigEndian::write_u16(&mut maxp.data[MAX_SIZE_OF_INSTRUCTIONS..], 300);
        maxp.clear_instruction_limits();
        assert_eq!(read_u16(&maxp.data, MAX_SIZE_OF_INSTRUCTIONS), Some(0));
        assert_eq!(maxp.profile().max_points, 12);
    }

    #[test]
    fn test_raise_to_takes_field_maxima() {
        let mut a = Maxp::new(3);
        a.set_profile(&MaxpProfile {
            max_points: 10,
            max_contours: 1,
            ..Default::default()
        });
        let mut b = Maxp::new(5);
        b.set_profile(&MaxpProfile {
            max_points: 4,
            max_contours: 6,
            ..Default::default()
        });
        a.raise_to(&b);
        assert_eq!(a.profile().max_points, 10);
        assert_eq!(a.profile().max_contours, 6);
        assert_eq!(a.num_glyphs(), 3);
    }
}
