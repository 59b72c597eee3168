//! Typed access to the sfnt tables the pipeline reads and rewrites.
//!
//! Tables are stored as raw bytes in [`crate::asset::FontAsset`], keyed by the closed
//! [`TableKind`] enumeration. The modules below decode the bytes into typed values and
//! encode them back. Fixed-layout tables (`head`, `hhea`, `OS/2`, ...) are views over the
//! raw bytes so that fields the pipeline never touches survive unchanged.

pub mod cmap;
pub mod glyf;
pub mod gsub;
pub mod head;
pub mod hhea;
pub mod hmtx;
pub mod layout;
pub mod maxp;
pub mod os2;
pub mod post;

use crate::MergeError;
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// The tables the pipeline knows about.
///
/// Anything else found in a font is carried through untouched as an unrecognized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKind {
    Head,
    Hhea,
    Maxp,
    Os2,
    Hmtx,
    Vhea,
    Vmtx,
    Cmap,
    Glyf,
    Loca,
    Post,
    Name,
    Cff,
    Cff2,
    Vorg,
    Gsub,
    Gpos,
    Gdef,
    Base,
    Jstf,
    Kern,
    Gasp,
    Fpgm,
    Prep,
    Cvt,
    Hdmx,
    Ltsh,
    Vdmx,
    Dsig,
    Meta,
}

impl TableKind {
    pub const ALL: [TableKind; 30] = [
        TableKind::Head,
        TableKind::Hhea,
        TableKind::Maxp,
        TableKind::Os2,
        TableKind::Hmtx,
        TableKind::Vhea,
        TableKind::Vmtx,
        TableKind::Cmap,
        TableKind::Glyf,
        TableKind::Loca,
        TableKind::Post,
        TableKind::Name,
        TableKind::Cff,
        TableKind::Cff2,
        TableKind::Vorg,
        TableKind::Gsub,
        TableKind::Gpos,
        TableKind::Gdef,
        TableKind::Base,
        TableKind::Jstf,
        TableKind::Kern,
        TableKind::Gasp,
        TableKind::Fpgm,
        TableKind::Prep,
        TableKind::Cvt,
        TableKind::Hdmx,
        TableKind::Ltsh,
        TableKind::Vdmx,
        TableKind::Dsig,
        TableKind::Meta,
    ];

    /// The four byte sfnt tag of this table
    pub fn tag(self) -> [u8; 4] {
        match self {
            TableKind::Head => *b"head",
            TableKind::Hhea => *b"hhea",
            TableKind::Maxp => *b"maxp",
            TableKind::Os2 => *b"OS/2",
            TableKind::Hmtx => *b"hmtx",
            TableKind::Vhea => *b"vhea",
            TableKind::Vmtx => *b"vmtx",
            TableKind::Cmap => *b"cmap",
            TableKind::Glyf => *b"glyf",
            TableKind::Loca => *b"loca",
            TableKind::Post => *b"post",
            TableKind::Name => *b"name",
            TableKind::Cff => *b"CFF ",
            TableKind::Cff2 => *b"CFF2",
            TableKind::Vorg => *b"VORG",
            TableKind::Gsub => *b"GSUB",
            TableKind::Gpos => *b"GPOS",
            TableKind::Gdef => *b"GDEF",
            TableKind::Base => *b"BASE",
            TableKind::Jstf => *b"JSTF",
            TableKind::Kern => *b"kern",
            TableKind::Gasp => *b"gasp",
            TableKind::Fpgm => *b"fpgm",
            TableKind::Prep => *b"prep",
            TableKind::Cvt => *b"cvt ",
            TableKind::Hdmx => *b"hdmx",
            TableKind::Ltsh => *b"LTSH",
            TableKind::Vdmx => *b"VDMX",
            TableKind::Dsig => *b"DSIG",
            TableKind::Meta => *b"meta",
        }
    }

    pub fn from_tag(tag: &[u8; 4]) -> Option<TableKind> {
        TableKind::ALL.iter().copied().find(|kind| &kind.tag() == tag)
    }

    /// Layout tables reference glyph ids and are only valid for the font they came from
    pub fn is_layout(self) -> bool {
        matches!(
            self,
            TableKind::Gsub
                | TableKind::Gpos
                | TableKind::Gdef
                | TableKind::Base
                | TableKind::Jstf
                | TableKind::Kern
        )
    }

    /// Hinting programs and per-size device tables
    pub fn is_hinting(self) -> bool {
        matches!(
            self,
            TableKind::Fpgm
                | TableKind::Prep
                | TableKind::Cvt
                | TableKind::Hdmx
                | TableKind::Ltsh
                | TableKind::Vdmx
        )
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.tag()).trim_end())
    }
}

/// Error for a table that ends before a field it must contain
pub(crate) fn truncated(kind: TableKind) -> MergeError {
    MergeError::table(kind.to_string(), "is truncated")
}

/// Maps an I/O error from a cursor read into a truncation error for `kind`
pub(crate) fn io_truncated(kind: TableKind) -> impl Fn(std::io::Error) -> MergeError {
    move |_| truncated(kind)
}

/// Checks that `data` holds at least `len` bytes
pub(crate) fn require_len(kind: TableKind, data: &[u8], len: usize) -> Result<(), MergeError> {
    if data.len() < len {
        return Err(truncated(kind));
    }
    Ok(())
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2).map(BigEndian::read_u16)
}

pub(crate) fn read_i16(data: &[u8], offset: usize) -> Option<i16> {
    data.get(offset..offset + 2).map(BigEndian::read_i16)
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4).map(BigEndian::read_u32)
}

/// sfnt table checksum: sum of big-endian u32 words, zero padded
pub fn checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(BigEndian::read_u32(chunk));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut last = [0u8; 4];
        last[..rest.len()].copy_from_slice(rest);
        sum = sum.wrapping_add(BigEndian::read_u32(&last));
    }
    sum
}

/// Scales a font-unit value and rounds to the nearest integer
pub(crate) fn scale_i16(value: i16, factor: f64) -> i16 {
    (value as f64 * factor)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

pub(crate) fn scale_u16(value: u16, factor: f64) -> u16 {
    (value as f64 * factor).round().clamp(0.0, u16::MAX as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip_for_every_kind() {
        for kind in TableKind::ALL {
            assert_eq!(TableKind::from_tag(&kind.tag()), Some(kind));
        }
        assert_eq!(TableKind::from_tag(b"zzzz"), None);
    }

    #[test]
    fn test_display_trims_padding() {
        assert_eq!(TableKind::Cff.to_string(), "CFF");
        assert_eq!(TableKind::Os2.to_string(), "OS/2");
    }

    #[test]
    fn test_checksum_pads_remainder() {
        assert_eq!(checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
        assert_eq!(checksum(&[1]), 0x0100_0000);
    }

    #[test]
    fn test_scale_rounds_to_nearest() {
        assert_eq!(scale_i16(100, 2.048), 205);
        assert_eq!(scale_i16(-100, 2.048), -205);
        assert_eq!(scale_u16(1000, 2.048), 2048);
        assert_eq!(scale_i16(i16::MAX, 2.0), i16::MAX);
    }
}
