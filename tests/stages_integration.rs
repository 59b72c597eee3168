mod common;

use fontmerge::asset::FontAsset;
use fontmerge::merge::{merge_fonts, strategies};
use fontmerge::subset::subset_to_file;
use fontmerge::tables::glyf::GlyphOutline;
use fontmerge::unicode_range::UnicodeRange;
use fontmerge::unify::{unify_units_per_em, Scaling};
use std::fs;

fn simple_bbox(font: &FontAsset, glyph_id: u16) -> [i16; 4] {
    match font.glyphs().unwrap().outline(glyph_id).unwrap() {
        GlyphOutline::Simple(glyph) => glyph.bbox(),
        other => panic!("expected a simple glyph, got {:?}", other),
    }
}

fn load_pair(dir: &std::path::Path) -> Vec<FontAsset> {
    let arabic = common::write_arabic(dir, "Arabic.ttf");
    let latin = common::write_latin(dir, "Latin.ttf");
    vec![FontAsset::load(arabic).unwrap(), FontAsset::load(latin).unwrap()]
}

#[test]
fn test_unify_scales_smaller_em_to_larger() {
    let dir = tempfile::tempdir().unwrap();
    let mut fonts = load_pair(dir.path());
    let before = simple_bbox(&fonts[0], 1);

    let scalings = unify_units_per_em(&mut fonts).unwrap();
    assert_eq!(scalings, vec![Scaling::Full, Scaling::Unchanged]);
    assert_eq!(fonts[0].units_per_em().unwrap(), 2048);
    assert_eq!(fonts[1].units_per_em().unwrap(), 2048);

    // rescaled font is rewritten in place
    let reloaded = FontAsset::load(fonts[0].path()).unwrap();
    assert_eq!(reloaded.units_per_em().unwrap(), 2048);
    assert_eq!(reloaded.hmtx().unwrap().get(1).unwrap().advance, 1024);

    let after = simple_bbox(&reloaded, 1);
    for (old, new) in before.iter().zip(after.iter()) {
        let expected = (*old as f64 * 2.048).round() as i32;
        assert!((*new as i32 - expected).abs() <= 1, "{} -> {}", old, new);
    }
}

#[test]
fn test_unify_twice_leaves_files_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut fonts = load_pair(dir.path());
    unify_units_per_em(&mut fonts).unwrap();
    let first = fs::read(fonts[0].path()).unwrap();

    let mut again: Vec<FontAsset> = fonts.iter().map(|f| FontAsset::load(f.path()).unwrap()).collect();
    let scalings = unify_units_per_em(&mut again).unwrap();
    assert_eq!(scalings, vec![Scaling::Unchanged, Scaling::Unchanged]);
    assert_eq!(fs::read(fonts[0].path()).unwrap(), first);
}

#[test]
fn test_subset_cmap_stays_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let fonts = load_pair(dir.path());
    let latin = UnicodeRange::latin();
    let subset = subset_to_file(&fonts[1], &latin, dir.path()).unwrap();

    assert_eq!(subset.path(), dir.path().join("Latin_sub.ttf"));
    let cmap = subset.cmap().unwrap();
    assert!(cmap.mappings.keys().all(|&cp| latin.contains(cp)));
    assert_eq!(cmap.mappings.len(), 0x7E - 0x20 + 1);
    assert!(!cmap.mappings.contains_key(&0x00E9));

    // glyph ids are kept, unretained glyphs are emptied
    let original = fonts[1].cmap().unwrap();
    let dropped = original.mappings[&0x00E9];
    let glyphs = subset.glyphs().unwrap();
    assert_eq!(glyphs.len(), fonts[1].glyphs().unwrap().len());
    assert!(glyphs.record(dropped).unwrap().is_empty());
}

#[test]
fn test_merged_cmap_is_union_and_glyphs_are_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut fonts = load_pair(dir.path());
    unify_units_per_em(&mut fonts).unwrap();
    let arabic = subset_to_file(&fonts[0], &UnicodeRange::arabic(), dir.path()).unwrap();
    let latin = subset_to_file(&fonts[1], &UnicodeRange::latin(), dir.path()).unwrap();

    let output = dir.path().join("Arabic_Latin.ttf");
    let merged = merge_fonts(&arabic, &latin, &output, &strategies(None)).unwrap();
    assert!(output.exists());
    let merged = FontAsset::load(merged.path()).unwrap();

    let merged_cmap = merged.cmap().unwrap();
    let arabic_cmap = arabic.cmap().unwrap();
    let latin_cmap = latin.cmap().unwrap();
    let mut expected: Vec<u32> = arabic_cmap
        .mappings
        .keys()
        .chain(latin_cmap.mappings.keys())
        .copied()
        .collect();
    expected.sort_unstable();
    expected.dedup();
    let actual: Vec<u32> = merged_cmap.mappings.keys().copied().collect();
    assert_eq!(actual, expected);

    let merged_glyphs = merged.glyphs().unwrap();
    for (source, cp) in [(&arabic, 0x0628u32), (&arabic, 0x0661), (&latin, 0x41), (&latin, 0x7A)] {
        let source_glyphs = source.glyphs().unwrap();
        let source_id = source.cmap().unwrap().mappings[&cp];
        let merged_id = merged_cmap.mappings[&cp];
        assert_eq!(
            merged_glyphs.outline(merged_id).unwrap(),
            source_glyphs.outline(source_id).unwrap(),
            "U+{:04X}",
            cp
        );
        assert_eq!(
            merged.hmtx().unwrap().get(merged_id).unwrap().advance,
            source.hmtx().unwrap().get(source_id).unwrap().advance
        );
    }
    assert_eq!(merged.units_per_em().unwrap(), 2048);
}
