//! A font file held as a typed table registry.
//!
//! [`FontAsset`] owns the raw bytes of every table, keyed by [`TableKind`]. Tables the
//! pipeline does not know are kept in a separate pass-through map and written back
//! unchanged. Typed accessors decode on demand; setters store freshly encoded bytes.

use crate::tables::cmap::CharMap;
use crate::tables::glyf::GlyphTable;
use crate::tables::head::{self, Head};
use crate::tables::hhea::MetricsHeader;
use crate::tables::hmtx::LongMetrics;
use crate::tables::maxp::Maxp;
use crate::tables::os2::Os2;
use crate::tables::post::Post;
use crate::tables::{checksum, read_u16, read_u32, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder};
use log::debug;
use skrifa::MetadataProvider;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use write_fonts::types::Tag;
use write_fonts::FontBuilder;

/// How glyph outlines are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineFormat {
    /// TrueType `glyf` quadratic curves
    Quadratic,
    /// PostScript `CFF `/`CFF2` cubic curves
    Cubic,
}

#[derive(Debug, Clone)]
pub struct FontAsset {
    path: PathBuf,
    tables: BTreeMap<TableKind, Vec<u8>>,
    unrecognized: BTreeMap<[u8; 4], Vec<u8>>,
}

impl FontAsset {
    /// Reads and parses the font at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MergeError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| MergeError::io(e, path))?;
        FontAsset::from_bytes(&data, path)
    }

    /// Parses font bytes; `path` becomes the identity of the asset
    pub fn from_bytes(data: &[u8], path: impl Into<PathBuf>) -> Result<Self, MergeError> {
        let path = path.into();
        let font = skrifa::FontRef::new(data).map_err(|e| {
            MergeError::font(format!("Failed to parse font: {:?}", e), Some(path.as_path()))
        })?;
        let num_tables = read_u16(data, 4).unwrap_or(0) as usize;
        let mut asset = FontAsset::empty(&path);
        for i in 0..num_tables {
            let record = 12 + i * 16;
            let (Some(offset), Some(length)) =
                (read_u32(data, record + 8), read_u32(data, record + 12))
            else {
                return Err(MergeError::font("Table directory is truncated", Some(path.as_path())));
            };
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&data[record..record + 4]);
            let (start, end) = (offset as usize, offset as usize + length as usize);
            let Some(bytes) = data.get(start..end) else {
                return Err(MergeError::font(
                    format!("Table '{}' extends past end of file", String::from_utf8_lossy(&tag)),
                    Some(path.as_path()),
                ));
            };
            match TableKind::from_tag(&tag) {
                Some(kind) => {
                    asset.tables.insert(kind, bytes.to_vec());
                }
                None => {
                    asset.unrecognized.insert(tag, bytes.to_vec());
                }
            }
        }
        debug!(
            "Loaded {:?}: {} tables, {} mapped codepoints",
            path,
            num_tables,
            font.charmap().mappings().count()
        );
        Ok(asset)
    }

    /// An asset with no tables
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        FontAsset {
            path: path.into(),
            tables: BTreeMap::new(),
            unrecognized: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn outline_format(&self) -> OutlineFormat {
        if self.has_table(TableKind::Cff) || self.has_table(TableKind::Cff2) {
            OutlineFormat::Cubic
        } else {
            OutlineFormat::Quadratic
        }
    }

    pub fn table(&self, kind: TableKind) -> Option<&[u8]> {
        self.tables.get(&kind).map(Vec::as_slice)
    }

    fn require(&self, kind: TableKind) -> Result<&[u8], MergeError> {
        self.table(kind)
            .ok_or_else(|| MergeError::table(kind.to_string(), "is missing"))
    }

    pub fn has_table(&self, kind: TableKind) -> bool {
        self.tables.contains_key(&kind)
    }

    pub fn set_table(&mut self, kind: TableKind, data: Vec<u8>) {
        self.tables.insert(kind, data);
    }

    pub fn remove_table(&mut self, kind: TableKind) -> Option<Vec<u8>> {
        self.tables.remove(&kind)
    }

    /// Known tables present in this font
    pub fn kinds(&self) -> impl Iterator<Item = TableKind> + '_ {
        self.tables.keys().copied()
    }

    /// Tags of tables carried through without interpretation
    pub fn unrecognized_tags(&self) -> Vec<String> {
        self.unrecognized
            .keys()
            .map(|tag| String::from_utf8_lossy(tag).trim_end().to_string())
            .collect()
    }

    pub fn clear_unrecognized(&mut self) {
        self.unrecognized.clear();
    }

    pub fn head(&self) -> Result<Head, MergeError> {
        Head::decode(self.require(TableKind::Head)?)
    }

    pub fn set_head(&mut self, head: &Head) {
        self.set_table(TableKind::Head, head.encode());
    }

    pub fn units_per_em(&self) -> Result<u16, MergeError> {
        Ok(self.head()?.units_per_em())
    }

    pub fn hhea(&self) -> Result<MetricsHeader, MergeError> {
        MetricsHeader::decode(TableKind::Hhea, self.require(TableKind::Hhea)?)
    }

    pub fn set_hhea(&mut self, hhea: &MetricsHeader) {
        self.set_table(TableKind::Hhea, hhea.encode());
    }

    pub fn vhea(&self) -> Result<Option<MetricsHeader>, MergeError> {
        self.table(TableKind::Vhea)
            .map(|data| MetricsHeader::decode(TableKind::Vhea, data))
            .transpose()
    }

    pub fn set_vhea(&mut self, vhea: &MetricsHeader) {
        self.set_table(TableKind::Vhea, vhea.encode());
    }

    pub fn maxp(&self) -> Result<Maxp, MergeError> {
        Maxp::decode(self.require(TableKind::Maxp)?)
    }

    pub fn set_maxp(&mut self, maxp: &Maxp) {
        self.set_table(TableKind::Maxp, maxp.encode());
    }

    pub fn num_glyphs(&self) -> Result<u16, MergeError> {
        Ok(self.maxp()?.num_glyphs())
    }

    pub fn os2(&self) -> Result<Option<Os2>, MergeError> {
        self.table(TableKind::Os2).map(Os2::decode).transpose()
    }

    pub fn set_os2(&mut self, os2: &Os2) {
        self.set_table(TableKind::Os2, os2.encode());
    }

    pub fn hmtx(&self) -> Result<LongMetrics, MergeError> {
        let num_long = self.hhea()?.num_long_metrics();
        LongMetrics::decode(
            TableKind::Hmtx,
            self.require(TableKind::Hmtx)?,
            num_long,
            self.num_glyphs()?,
        )
    }

    /// Stores `hmtx` and updates `numberOfHMetrics` in `hhea`
    pub fn set_hmtx(&mut self, hmtx: &LongMetrics) -> Result<(), MergeError> {
        let (data, num_long) = hmtx.encode();
        let mut hhea = self.hhea()?;
        hhea.set_num_long_metrics(num_long);
        self.set_hhea(&hhea);
        self.set_table(TableKind::Hmtx, data);
        Ok(())
    }

    pub fn vmtx(&self) -> Result<Option<LongMetrics>, MergeError> {
        let (Some(vhea), Some(data)) = (self.vhea()?, self.table(TableKind::Vmtx)) else {
            return Ok(None);
        };
        LongMetrics::decode(
            TableKind::Vmtx,
            data,
            vhea.num_long_metrics(),
            self.num_glyphs()?,
        )
        .map(Some)
    }

    /// Stores `vmtx` and updates the long metric count in `vhea`
    pub fn set_vmtx(&mut self, vmtx: &LongMetrics) -> Result<(), MergeError> {
        let Some(mut vhea) = self.vhea()? else {
            return Err(MergeError::table("vhea", "is missing"));
        };
        let (data, num_long) = vmtx.encode();
        vhea.set_num_long_metrics(num_long);
        self.set_vhea(&vhea);
        self.set_table(TableKind::Vmtx, data);
        Ok(())
    }

    pub fn cmap(&self) -> Result<CharMap, MergeError> {
        CharMap::decode(self.require(TableKind::Cmap)?)
    }

    pub fn set_cmap(&mut self, cmap: &CharMap) {
        self.set_table(TableKind::Cmap, cmap.encode());
    }

    pub fn glyphs(&self) -> Result<GlyphTable, MergeError> {
        GlyphTable::decode(
            self.require(TableKind::Glyf)?,
            self.require(TableKind::Loca)?,
            self.num_glyphs()?,
            self.head()?.index_to_loc_format(),
        )
    }

    /// Stores `glyf`/`loca` and keeps `head` and `maxp` consistent with them
    pub fn set_glyphs(&mut self, glyphs: &GlyphTable) -> Result<(), MergeError> {
        let (glyf, loca, format) = glyphs.encode();
        let mut head = self.head()?;
        head.set_index_to_loc_format(format);
        if let Some(bbox) = glyphs.bbox() {
            head.set_bbox(bbox);
        }
        self.set_head(&head);
        let mut maxp = self.maxp()?;
        maxp.set_num_glyphs(glyphs.len() as u16);
        maxp.set_profile(&glyphs.profile());
        self.set_maxp(&maxp);
        self.set_table(TableKind::Glyf, glyf);
        self.set_table(TableKind::Loca, loca);
        Ok(())
    }

    pub fn post(&self) -> Result<Option<Post>, MergeError> {
        let num_glyphs = self.num_glyphs()?;
        self.table(TableKind::Post)
            .map(|data| Post::decode(data, num_glyphs))
            .transpose()
    }

    pub fn set_post(&mut self, post: &Post) {
        self.set_table(TableKind::Post, post.encode());
    }

    /// Serializes the font and fixes up `head.checkSumAdjustment`
    pub fn to_bytes(&self) -> Result<Vec<u8>, MergeError> {
        let mut head = self.head()?;
        head.set_checksum_adjustment(0);
        let head_bytes = head.encode();

        let mut builder = FontBuilder::new();
        for (kind, data) in &self.tables {
            let data = if *kind == TableKind::Head {
                head_bytes.clone()
            } else {
                data.clone()
            };
            builder.add_raw(Tag::new(&kind.tag()), data);
        }
        for (tag, data) in &self.unrecognized {
            builder.add_raw(Tag::new(tag), data.clone());
        }
        let mut bytes = builder.build();

        let num_tables = read_u16(&bytes, 4).unwrap_or(0) as usize;
        let head_offset = (0..num_tables)
            .map(|i| 12 + i * 16)
            .find(|&record| bytes.get(record..record + 4) == Some(b"head"))
            .and_then(|record| read_u32(&bytes, record + 8))
            .ok_or_else(|| MergeError::table("head", "is missing from the written font"))?;
        let adjustment = head::CHECKSUM_MAGIC.wrapping_sub(checksum(&bytes));
        let field = head_offset as usize + head::checksum_adjustment_offset();
        BigEndian::write_u32(&mut bytes[field..field + 4], adjustment);
        Ok(bytes)
    }

    /// Writes the font to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MergeError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| MergeError::io(e, path))?;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::glyf::{GlyphOutline, Point, SimpleGlyph};
    use crate::tables::hmtx::Metric;

    fn tiny_font() -> FontAsset {
        let mut font = FontAsset::empty("tiny.ttf");
        font.set_head(&Head::new(1000, [0; 4]));
        font.set_hhea(&MetricsHeader::new(800, -200, 0, 2));
        font.set_maxp(&Maxp::new(2));
        font.set_os2(&Os2::new(800, -200, 0));
        font.set_post(&Post::new());
        font.set_cmap(&CharMap::new(BTreeMap::from([(0x41, 1)])));
        let glyph = SimpleGlyph {
            contours: vec![vec![
                Point::new(0, 0, true),
                Point::new(400, 0, true),
                Point::new(400, 600, true),
            ]],
            instructions: Vec::new(),
        };
        let glyphs = GlyphTable {
            glyphs: vec![Vec::new(), GlyphOutline::Simple(glyph).encode()],
        };
        font.set_glyphs(&glyphs).unwrap();
        font.set_hmtx(&LongMetrics {
            metrics: vec![
                Metric { advance: 500, bearing: 0 },
                Metric { advance: 450, bearing: 0 },
            ],
        })
        .unwrap();
        font
    }

    #[test]
    fn test_written_font_loads_again() {
        let font = tiny_font();
        let bytes = font.to_bytes().unwrap();
        let loaded = FontAsset::from_bytes(&bytes, "copy.ttf").unwrap();
        assert_eq!(loaded.units_per_em().unwrap(), 1000);
        assert_eq!(loaded.cmap().unwrap().glyph(0x41), Some(1));
        assert_eq!(loaded.hmtx().unwrap().get(1).unwrap().advance, 450);
        assert_eq!(loaded.outline_format(), OutlineFormat::Quadratic);
        assert_eq!(loaded.head().unwrap().bbox(), [0, 0, 400, 600]);
    }

    #[test]
    fn test_whole_font_checksum_matches_magic() {
        let bytes = tiny_font().to_bytes().unwrap();
        assert_eq!(checksum(&bytes), head::CHECKSUM_MAGIC);
    }

    #[test]
    fn test_cff_table_marks_cubic_outlines() {
        let mut font = tiny_font();
        font.set_table(TableKind::Cff, vec![1, 0, 4, 1]);
        assert_eq!(font.outline_format(), OutlineFormat::Cubic);
    }

    #[test]
    fn test_garbage_is_a_font_error() {
        let err = FontAsset::from_bytes(b"not a font at all", "junk.ttf").unwrap_err();
        assert!(matches!(err, MergeError::Font { .. }));
    }
}
