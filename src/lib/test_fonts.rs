//! Synthetic fonts for unit tests.

use crate::asset::FontAsset;
use crate::tables::cmap::CharMap;
use crate::tables::glyf::{Anchor, Component, CompositeGlyph, GlyphOutline, GlyphTable, Point, SimpleGlyph};
use crate::tables::head::Head;
use crate::tables::hhea::MetricsHeader;
use crate::tables::hmtx::{LongMetrics, Metric};
use crate::tables::maxp::Maxp;
use crate::tables::os2::Os2;
use crate::tables::post::Post;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::BTreeMap;
use write_fonts::read::FontRef;
use write_fonts::types::Tag;
use write_fonts::FontBuilder;

pub(crate) fn rect(x0: i16, y0: i16, x1: i16, y1: i16) -> SimpleGlyph {
    SimpleGlyph {
        contours: vec![vec![
            Point::new(x0, y0, true),
            Point::new(x1, y0, true),
            Point::new(x1, y1, true),
            Point::new(x0, y1, true),
        ]],
        instructions: vec![0xB0, 0x00],
    }
}

/// A TrueType font with one rectangle glyph per codepoint after `.notdef`.
///
/// When `composite` is set, one more glyph referencing glyph 1 is appended and mapped
/// to that codepoint. Every size is proportional to `upem`.
pub(crate) fn synthetic_font(path: &str, upem: u16, codepoints: &[u32], composite: Option<u32>) -> FontAsset {
    let unit = |v: i32| (v * upem as i32 / 1000) as i16;
    let mut outlines = vec![GlyphOutline::Simple(rect(unit(50), 0, unit(450), unit(700)))];
    let mut names = vec![".notdef".to_string()];
    let mut mappings = BTreeMap::new();
    for (i, &cp) in codepoints.iter().enumerate() {
        let width = unit(300 + (i as i32 % 5) * 40);
        outlines.push(GlyphOutline::Simple(rect(unit(40), 0, width, unit(600))));
        names.push(format!("uni{:04X}", cp));
        mappings.insert(cp, (i + 1) as u16);
    }
    if let Some(cp) = composite {
        outlines.push(GlyphOutline::Composite(CompositeGlyph {
            bbox: [unit(140), 0, unit(440), unit(600)],
            components: vec![Component {
                glyph: 1,
                anchor: Anchor::Offset { dx: unit(100), dy: 0 },
                transform: [1.0, 0.0, 0.0, 1.0],
                flags: 0,
            }],
            instructions: Vec::new(),
        }));
        names.push("composite".to_string());
        mappings.insert(cp, (outlines.len() - 1) as u16);
    }

    let num_glyphs = outlines.len() as u16;
    let mut font = FontAsset::empty(path);
    font.set_head(&Head::new(upem, [0; 4]));
    font.set_hhea(&MetricsHeader::new(unit(800), unit(-200), 0, num_glyphs));
    font.set_maxp(&Maxp::new(num_glyphs));
    font.set_os2(&Os2::new(unit(800), unit(-200), 0));
    let mut post = Post::new();
    post.names = Some(names);
    font.set_post(&post);
    font.set_cmap(&CharMap::new(mappings));
    let glyphs = GlyphTable {
        glyphs: outlines.iter().map(GlyphOutline::encode).collect(),
    };
    font.set_glyphs(&glyphs).unwrap();
    let metrics = (0..num_glyphs)
        .map(|g| Metric {
            advance: unit(500 + (g as i32 % 3) * 50) as u16,
            bearing: unit(40),
        })
        .collect();
    font.set_hmtx(&LongMetrics { metrics }).unwrap();
    font
}

/// `font` with one more table under a tag the crate does not know
pub(crate) fn with_unknown_table(font: &FontAsset, tag: &[u8; 4]) -> FontAsset {
    let bytes = font.to_bytes().unwrap();
    let mut builder = FontBuilder::new();
    builder.add_raw(Tag::new(tag), vec![0, 1, 0, 0]);
    builder.copy_missing_tables(FontRef::new(&bytes).unwrap());
    FontAsset::from_bytes(&builder.build(), font.path()).unwrap()
}

fn push(data: &mut Vec<u8>, values: &[u16]) {
    for v in values {
        data.write_u16::<BigEndian>(*v).unwrap();
    }
}

fn tag_words(tag: &[u8; 4]) -> [u16; 2] {
    [
        u16::from_be_bytes([tag[0], tag[1]]),
        u16::from_be_bytes([tag[2], tag[3]]),
    ]
}

/// A `GSUB` or `GPOS` table with one script (`script`, default language system only),
/// one feature (`feature`) and one lookup of `kind` holding `subtable`
pub(crate) fn single_lookup_table(script: &[u8; 4], feature: &[u8; 4], kind: u16, subtable: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    // header: script list at 10, feature list at 30, lookup list at 44
    push(&mut data, &[1, 0, 10, 30, 44]);
    // script list: one record, script at 8; script: default lang sys at 4
    push(&mut data, &[1]);
    push(&mut data, &tag_words(script));
    push(&mut data, &[8, 4, 0]);
    // lang sys: no reordering, no required feature, feature 0
    push(&mut data, &[0, 0xFFFF, 1, 0]);
    // feature list: one record, feature at 8 with lookup 0
    push(&mut data, &[1]);
    push(&mut data, &tag_words(feature));
    push(&mut data, &[8, 0, 1, 0]);
    // lookup list: one lookup at 4 with one subtable at 8
    push(&mut data, &[1, 4, kind, 0, 1, 8]);
    data.extend_from_slice(subtable);
    data
}

/// Pair adjustment subtable: x advance `value` on `first` when followed by `second`
pub(crate) fn kerning(first: u16, second: u16, value: i16) -> Vec<u8> {
    let mut subtable = Vec::new();
    // format 1, coverage at 18, x advance for the first glyph only, one pair set at 12
    push(&mut subtable, &[1, 18, 0x0004, 0, 1, 12]);
    push(&mut subtable, &[1, second, value as u16]);
    push(&mut subtable, &[1, 1, first]);
    subtable
}

/// Single substitution subtable (format 2) from each glyph to its substitute
pub(crate) fn single_substitution(pairs: &[(u16, u16)]) -> Vec<u8> {
    let mut subtable = Vec::new();
    let coverage_offset = 6 + pairs.len() as u16 * 2;
    push(&mut subtable, &[2, coverage_offset, pairs.len() as u16]);
    for &(_, to) in pairs {
        push(&mut subtable, &[to]);
    }
    push(&mut subtable, &[1, pairs.len() as u16]);
    for &(from, _) in pairs {
        push(&mut subtable, &[from]);
    }
    subtable
}
