//! Synthetic fonts shared by the integration tests.
#![allow(dead_code)]

use fontmerge::asset::FontAsset;
use fontmerge::tables::cmap::CharMap;
use fontmerge::tables::glyf::{GlyphOutline, GlyphTable, Point, SimpleGlyph};
use fontmerge::tables::head::Head;
use fontmerge::tables::hhea::MetricsHeader;
use fontmerge::tables::hmtx::{LongMetrics, Metric};
use fontmerge::tables::maxp::Maxp;
use fontmerge::tables::os2::Os2;
use fontmerge::tables::post::Post;
use fontmerge::tables::TableKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Codepoints of the synthetic Arabic font: letters, Arabic-Indic digits, presentation forms
pub fn arabic_codepoints() -> Vec<u32> {
    (0x0621..=0x064A)
        .chain(0x0660..=0x0669)
        .chain(0xFE80..=0xFEFC)
        .collect()
}

/// Printable ASCII plus a few codepoints outside the Latin range
pub fn latin_codepoints() -> Vec<u32> {
    (0x20..=0x7E).chain([0x00E9, 0x2014]).collect()
}

fn rect(x0: i16, y0: i16, x1: i16, y1: i16) -> GlyphOutline {
    GlyphOutline::Simple(SimpleGlyph {
        contours: vec![vec![
            Point::new(x0, y0, true),
            Point::new(x1, y0, true),
            Point::new(x1, y1, true),
            Point::new(x0, y1, true),
        ]],
        instructions: Vec::new(),
    })
}

/// A TrueType font with one distinct rectangle per codepoint, sized relative to `upem`
pub fn build_font(path: &Path, upem: u16, codepoints: &[u32]) -> FontAsset {
    let unit = |v: i32| (v * upem as i32 / 1000) as i16;
    let mut outlines = vec![rect(unit(50), 0, unit(450), unit(700))];
    let mut names = vec![".notdef".to_string()];
    let mut mappings = BTreeMap::new();
    for (i, &cp) in codepoints.iter().enumerate() {
        let right = unit(200 + (i as i32 % 7) * 50);
        let top = unit(400 + (i as i32 % 3) * 100);
        outlines.push(rect(unit(30), 0, right, top));
        names.push(format!("uni{:04X}", cp));
        mappings.insert(cp, (i + 1) as u16);
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
            advance: unit(450 + (g as i32 % 4) * 50) as u16,
            bearing: unit(30),
        })
        .collect();
    font.set_hmtx(&LongMetrics { metrics }).unwrap();
    font
}

/// Writes the synthetic Arabic font (1000 units per em) to `dir/name`
pub fn write_arabic(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    build_font(&path, 1000, &arabic_codepoints()).save(&path).unwrap();
    path
}

/// Writes the synthetic Latin font (2048 units per em) to `dir/name`
pub fn write_latin(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    build_font(&path, 2048, &latin_codepoints()).save(&path).unwrap();
    path
}

/// An `.otf` whose CFF table cannot be read
pub fn write_broken_cff(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut font = build_font(&path, 1000, &arabic_codepoints());
    font.remove_table(TableKind::Glyf);
    font.remove_table(TableKind::Loca);
    font.set_table(TableKind::Cff, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    font.save(&path).unwrap();
    path
}

/// A configuration with a small canvas and no external tool
pub const TEST_CONFIG: &str = r#"
[tools]
disable_external = true

[preview]
width = 640
height = 320
base_size = 12
size_step = 6
max_size = 60
"#;

/// Like [`TEST_CONFIG`] with a canvas large enough for the wrapped two-block layout
pub const PREVIEW_CONFIG: &str = r#"
[tools]
disable_external = true

[preview]
width = 1600
height = 800
base_size = 10
size_step = 4
max_size = 120
"#;
