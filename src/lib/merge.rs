//! Combining two TrueType fonts into one.
//!
//! The first font takes precedence everywhere: its glyphs keep their ids, its cmap entries
//! win on collisions, and its global tables are the base of the result. Strategies
//! implementing [`MergeStrategy`] are tried in order by [`merge_fonts`]; failure of every
//! strategy is fatal for the job.

use crate::asset::{FontAsset, OutlineFormat};
use crate::external::{Dialect, ExternalTool, MERGE_SCRIPT_FF};
use crate::tables::cmap::CharMap;
use crate::tables::glyf::{remap_components, GlyphTable};
use crate::tables::gsub::close_over_substitutions;
use crate::tables::hmtx::LongMetrics;
use crate::tables::layout::merge_layout_tables;
use crate::tables::post::Post;
use crate::tables::TableKind;
use crate::MergeError;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Tables whose contents depend on the glyph count and cannot survive appended glyphs
const GLYPH_COUNT_TABLES: [TableKind; 4] = [
    TableKind::Hdmx,
    TableKind::Ltsh,
    TableKind::Vdmx,
    TableKind::Dsig,
];

pub trait MergeStrategy {
    fn name(&self) -> &'static str;

    /// Merges `second` into `first` and writes the result to `output`
    fn merge(&self, first: &FontAsset, second: &FontAsset, output: &Path) -> Result<FontAsset, MergeError>;
}

/// The strategies available for a job, in the order they are tried
pub fn strategies(tool: Option<&ExternalTool>) -> Vec<Box<dyn MergeStrategy>> {
    let mut list: Vec<Box<dyn MergeStrategy>> = Vec::new();
    if let Some(tool) = tool {
        list.push(Box::new(ExternalMerge::new(tool.clone())));
    }
    list.push(Box::new(LibraryMerge));
    list
}

/// Merges `second` into `first`, trying each strategy until one succeeds
pub fn merge_fonts(
    first: &FontAsset,
    second: &FontAsset,
    output: &Path,
    strategies: &[Box<dyn MergeStrategy>],
) -> Result<FontAsset, MergeError> {
    let mut failures = Vec::new();
    for strategy in strategies {
        match strategy.merge(first, second, output) {
            Ok(merged) => {
                info!("Merged fonts with {} into {:?}", strategy.name(), output);
                return Ok(merged);
            }
            Err(e) => {
                warn!("{} merge failed: {}", strategy.name(), e);
                failures.push(format!("{}: {}", strategy.name(), e));
            }
        }
    }
    Err(MergeError::Merge {
        message: failures.join("; "),
    })
}

/// Merge through the external font editor
pub struct ExternalMerge {
    tool: ExternalTool,
}

impl ExternalMerge {
    pub fn new(tool: ExternalTool) -> Self {
        ExternalMerge { tool }
    }
}

impl MergeStrategy for ExternalMerge {
    fn name(&self) -> &'static str {
        "fontforge"
    }

    fn merge(&self, first: &FontAsset, second: &FontAsset, output: &Path) -> Result<FontAsset, MergeError> {
        self.tool.run_script(
            Dialect::Native,
            MERGE_SCRIPT_FF,
            &[first.path(), second.path(), output],
        )?;
        if !output.is_file() {
            return Err(MergeError::Tool {
                tool: "fontforge".to_string(),
                message: "finished without writing the merged font".to_string(),
            });
        }
        FontAsset::load(output)
    }
}

/// In-process merge of two fonts with `glyf` outlines
pub struct LibraryMerge;

impl MergeStrategy for LibraryMerge {
    fn name(&self) -> &'static str {
        "library"
    }

    fn merge(&self, first: &FontAsset, second: &FontAsset, output: &Path) -> Result<FontAsset, MergeError> {
        for font in [first, second] {
            if font.outline_format() != OutlineFormat::Quadratic {
                return Err(MergeError::Merge {
                    message: format!("{} still has CFF outlines", font.path().display()),
                });
            }
        }
        let mut merged = merge_tables(first, second)?;
        let unknown = merged.unrecognized_tags();
        if !unknown.is_empty() {
            warn!(
                "Dropping tables the merge cannot update: {}",
                unknown.join(", ")
            );
            merged.clear_unrecognized();
        }
        merged.set_path(output);
        merged.save(output)?;
        Ok(merged)
    }
}

fn merge_tables(first: &FontAsset, second: &FontAsset) -> Result<FontAsset, MergeError> {
    let first_glyphs = first.glyphs()?;
    let second_glyphs = second.glyphs()?;
    let first_cmap = first.cmap()?;
    let second_cmap = second.cmap()?;

    // glyphs of the second font reachable from codepoints it contributes
    let mut collisions = 0usize;
    let mut seeds = BTreeSet::new();
    for (&codepoint, &glyph_id) in &second_cmap.mappings {
        if first_cmap.mappings.contains_key(&codepoint) {
            collisions += 1;
        } else if glyph_id != 0 && (glyph_id as usize) < second_glyphs.len() {
            seeds.insert(glyph_id);
        }
    }
    if collisions > 0 {
        warn!(
            "{} codepoints exist in both fonts; keeping the glyphs of {:?}",
            collisions,
            first.path()
        );
    }
    // substitution results are needed by the second font's layout rules
    if let Some(gsub) = second.table(TableKind::Gsub) {
        if let Err(e) = close_over_substitutions(gsub, &mut seeds) {
            warn!("Could not follow substitutions of {:?}: {}", second.path(), e);
        }
        seeds.retain(|&g| g != 0 && (g as usize) < second_glyphs.len());
    }
    let appended: Vec<u16> = second_glyphs.component_closure(&seeds).into_iter().collect();

    let base = first_glyphs.len();
    let total = base + appended.len();
    if total > u16::MAX as usize {
        return Err(MergeError::Merge {
            message: format!("the merged font would need {} glyphs", total),
        });
    }
    let new_ids: BTreeMap<u16, u16> = appended
        .iter()
        .enumerate()
        .map(|(i, &old)| (old, (base + i) as u16))
        .collect();
    debug!("Appending {} glyphs after {} existing ones", appended.len(), base);

    let mut glyphs = GlyphTable {
        glyphs: first_glyphs.glyphs.clone(),
    };
    for &old in &appended {
        let mut record = second_glyphs.record(old).unwrap_or_default().to_vec();
        remap_components(&mut record, |child| new_ids.get(&child).copied().unwrap_or(0));
        glyphs.glyphs.push(record);
    }

    let mut mappings = first_cmap.mappings.clone();
    for (&codepoint, &glyph_id) in &second_cmap.mappings {
        if let Some(&new_id) = new_ids.get(&glyph_id) {
            mappings.entry(codepoint).or_insert(new_id);
        }
    }
    let cmap = CharMap::new(mappings);

    let mut merged = first.clone();
    let mut maxp = merged.maxp()?;
    maxp.raise_to(&second.maxp()?);
    merged.set_maxp(&maxp);
    merged.set_glyphs(&glyphs)?;

    let hmtx = append_metrics(first.hmtx()?, &second.hmtx()?, &appended);
    merged.set_hmtx(&hmtx)?;
    match (first.vmtx()?, second.vmtx()?) {
        (Some(first_vmtx), Some(second_vmtx)) => {
            merged.set_vmtx(&append_metrics(first_vmtx, &second_vmtx, &appended))?;
        }
        (Some(_), None) => {
            warn!("Dropping vertical metrics: {:?} has none", second.path());
            merged.remove_table(TableKind::Vhea);
            merged.remove_table(TableKind::Vmtx);
        }
        _ => {}
    }

    let mut hhea = merged.hhea()?;
    let other = second.hhea()?;
    hhea.set_ascender(hhea.ascender().max(other.ascender()));
    hhea.set_descender(hhea.descender().min(other.descender()));
    hhea.set_advance_max(hmtx.max_advance());
    hhea.set_min_leading_bearing(hhea.min_leading_bearing().min(other.min_leading_bearing()));
    hhea.set_min_trailing_bearing(hhea.min_trailing_bearing().min(other.min_trailing_bearing()));
    hhea.set_max_extent(hhea.max_extent().max(other.max_extent()));
    merged.set_hhea(&hhea);

    if let Some(mut os2) = merged.os2()? {
        if let Some(other) = second.os2()? {
            os2.set_win_ascent(os2.win_ascent().max(other.win_ascent()));
            os2.set_win_descent(os2.win_descent().max(other.win_descent()));
            let mut ranges = os2.unicode_ranges();
            for (mine, theirs) in ranges.iter_mut().zip(other.unicode_ranges()) {
                *mine |= theirs;
            }
            os2.set_unicode_ranges(ranges);
        }
        let first_cp = cmap.mappings.keys().next().copied().unwrap_or(0);
        let last_cp = cmap.mappings.keys().next_back().copied().unwrap_or(0);
        os2.set_char_index_range(first_cp, last_cp);
        merged.set_os2(&os2);
    }
    merged.set_cmap(&cmap);

    let mut post = first.post()?.unwrap_or_default();
    post.names = Some(merged_names(first.post()?.as_ref(), second.post()?.as_ref(), base, &appended));
    merged.set_post(&post);

    for kind in [TableKind::Gsub, TableKind::Gpos] {
        let Some(theirs) = second.table(kind) else {
            continue;
        };
        match merge_layout_tables(kind, first.table(kind), theirs, &new_ids) {
            Ok(layout) => {
                if layout.dropped_lookups > 0 {
                    warn!(
                        "{} {} lookups of {:?} cannot be carried over",
                        layout.dropped_lookups,
                        kind,
                        second.path()
                    );
                }
                merged.set_table(kind, layout.table);
            }
            Err(e) => warn!("Keeping only the {} rules of {:?}: {}", kind, first.path(), e),
        }
    }
    let dropped: Vec<String> = second
        .kinds()
        .filter(|k| k.is_layout() && !matches!(k, TableKind::Gsub | TableKind::Gpos))
        .map(|k| k.to_string())
        .collect();
    if !dropped.is_empty() {
        warn!(
            "Layout tables of {:?} are not merged: {}",
            second.path(),
            dropped.join(", ")
        );
    }
    for kind in GLYPH_COUNT_TABLES {
        merged.remove_table(kind);
    }
    Ok(merged)
}

fn append_metrics(mut first: LongMetrics, second: &LongMetrics, appended: &[u16]) -> LongMetrics {
    first
        .metrics
        .extend(appended.iter().map(|&g| second.get(g).unwrap_or_default()));
    first
}

/// Glyph names for the merged font, unique across both sources
fn merged_names(first: Option<&Post>, second: Option<&Post>, base: usize, appended: &[u16]) -> Vec<String> {
    let name_of = |post: Option<&Post>, old: u16, new: usize| {
        post.and_then(|p| p.glyph_name(old))
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("glyph{:05}", new))
    };
    let candidates = (0..base)
        .map(|g| name_of(first, g as u16, g))
        .chain(
            appended
                .iter()
                .enumerate()
                .map(|(i, &old)| name_of(second, old, base + i)),
        );

    let mut used = HashSet::new();
    let mut names = Vec::with_capacity(base + appended.len());
    for name in candidates {
        let mut unique = name.clone();
        let mut n = 1;
        while used.contains(&unique) {
            unique = format!("{}#{}", name, n);
            n += 1;
        }
        used.insert(unique.clone());
        names.push(unique);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::glyf::{component_ids, GlyphOutline};
    use crate::test_fonts::{kerning, single_lookup_table, single_substitution, synthetic_font, with_unknown_table};

    fn merged(first: &FontAsset, second: &FontAsset) -> FontAsset {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.ttf");
        let result = merge_fonts(first, second, &output, &strategies(None)).unwrap();
        FontAsset::load(result.path()).unwrap()
    }

    #[test]
    fn test_cmap_is_union_and_first_font_keeps_ids() {
        let arabic = synthetic_font("ar.ttf", 2048, &[0x0627, 0x0628], None);
        let latin = synthetic_font("en.ttf", 2048, &[0x41, 0x42], None);
        let font = merged(&arabic, &latin);
        let cmap = font.cmap().unwrap();
        assert_eq!(cmap.len(), 4);
        assert_eq!(cmap.glyph(0x0627), Some(1));
        assert_eq!(cmap.glyph(0x41), Some(3));
        assert_eq!(font.num_glyphs().unwrap(), 5);

        let glyphs = font.glyphs().unwrap();
        let source = latin.glyphs().unwrap();
        assert_eq!(glyphs.outline(3).unwrap(), source.outline(1).unwrap());
        assert_eq!(
            glyphs.outline(1).unwrap(),
            arabic.glyphs().unwrap().outline(1).unwrap()
        );
        assert_eq!(
            font.hmtx().unwrap().get(4).unwrap(),
            latin.hmtx().unwrap().get(2).unwrap()
        );
    }

    #[test]
    fn test_first_font_wins_collisions() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x20, 0x0628], None);
        let latin = synthetic_font("en.ttf", 1000, &[0x20, 0x41], None);
        let font = merged(&arabic, &latin);
        let cmap = font.cmap().unwrap();
        assert_eq!(cmap.glyph(0x20), Some(1));
        // only the glyph behind 'A' is appended
        assert_eq!(font.num_glyphs().unwrap(), 4);
        assert_eq!(cmap.glyph(0x41), Some(3));
    }

    #[test]
    fn test_appended_composites_are_remapped() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x0628], None);
        let latin = synthetic_font("en.ttf", 1000, &[0x41], Some(0xC5));
        let font = merged(&arabic, &latin);
        let glyphs = font.glyphs().unwrap();
        let composite = font.cmap().unwrap().glyph(0xC5).unwrap();
        let letter = font.cmap().unwrap().glyph(0x41).unwrap();
        assert_eq!(component_ids(glyphs.record(composite).unwrap()), vec![letter]);
        assert!(matches!(
            glyphs.outline(composite).unwrap(),
            GlyphOutline::Composite(_)
        ));
    }

    #[test]
    fn test_glyph_names_are_unique() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x0628], None);
        let latin = synthetic_font("en.ttf", 1000, &[0x41], None);
        let font = merged(&arabic, &latin);
        let post = font.post().unwrap().unwrap();
        let names = post.names.unwrap();
        assert_eq!(names, vec![".notdef", "uni0628", "uni0041"]);

        let names = merged_names(None, None, 2, &[5]);
        assert_eq!(names, vec!["glyph00000", "glyph00001", "glyph00002"]);
    }

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let mut post = Post::new();
        post.names = Some(vec![".notdef".into(), "a".into(), "a".into()]);
        let names = merged_names(Some(&post), Some(&post), 3, &[1, 2]);
        assert_eq!(names, vec![".notdef", "a", "a#1", "a#2", "a#3"]);
    }

    #[test]
    fn test_vertical_extents_take_the_maximum() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x0628], None);
        let latin = synthetic_font("en.ttf", 2000, &[0x41], None);
        let font = merged(&arabic, &latin);
        assert_eq!(font.hhea().unwrap().ascender(), 1600);
        assert_eq!(font.hhea().unwrap().descender(), -400);
        assert_eq!(font.os2().unwrap().unwrap().win_descent(), 400);
    }

    /// Shapes `text` with the merged font and returns glyph ids and x advances
    fn shape(font: &FontAsset, text: &str, features: &[&str]) -> Vec<(u32, i32)> {
        let data = font.to_bytes().unwrap();
        let face = rustybuzz::Face::from_slice(&data, 0).unwrap();
        let features: Vec<rustybuzz::Feature> = features.iter().map(|f| f.parse().unwrap()).collect();
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let output = rustybuzz::shape(&face, &features, buffer);
        output
            .glyph_infos()
            .iter()
            .zip(output.glyph_positions())
            .map(|(info, position)| (info.glyph_id, position.x_advance))
            .collect()
    }

    #[test]
    fn test_second_font_kerning_survives_with_new_ids() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x0628], None);
        let mut latin = synthetic_font("en.ttf", 1000, &[0x41, 0x56], None);
        latin.set_table(TableKind::Gpos, single_lookup_table(b"latn", b"kern", 2, &kerning(1, 2, -80)));
        let font = merged(&arabic, &latin);
        assert!(font.has_table(TableKind::Gpos));

        let cmap = font.cmap().unwrap();
        let (a, v) = (cmap.glyph(0x41).unwrap(), cmap.glyph(0x56).unwrap());
        assert_eq!((a, v), (2, 3));
        let advance = |g: u16| font.hmtx().unwrap().get(g).unwrap().advance as i32;
        assert_eq!(
            shape(&font, "AV", &[]),
            vec![(a as u32, advance(a) - 80), (v as u32, advance(v))]
        );
        // the pair only applies in that order
        assert_eq!(
            shape(&font, "VA", &[]),
            vec![(v as u32, advance(v)), (a as u32, advance(a))]
        );
    }

    #[test]
    fn test_substitution_targets_are_appended_and_remapped() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x0628], None);
        // glyph 2 is only reachable through the substitution
        let mut latin = synthetic_font("en.ttf", 1000, &[0x41, 0x42], None);
        let mut cmap = latin.cmap().unwrap();
        cmap.mappings.remove(&0x42);
        latin.set_cmap(&cmap);
        latin.set_table(
            TableKind::Gsub,
            single_lookup_table(b"latn", b"smcp", 1, &single_substitution(&[(1, 2)])),
        );
        let font = merged(&arabic, &latin);
        assert_eq!(font.num_glyphs().unwrap(), 4);
        let a = font.cmap().unwrap().glyph(0x41).unwrap();
        assert_eq!(shape(&font, "A", &[])[0].0, a as u32);
        assert_eq!(shape(&font, "A", &["smcp"])[0].0, 3);
    }

    #[test]
    fn test_unknown_tables_are_not_carried_into_the_merge() {
        let arabic = with_unknown_table(&synthetic_font("ar.ttf", 1000, &[0x0628], None), b"Silf");
        let latin = synthetic_font("en.ttf", 1000, &[0x41], None);
        assert_eq!(arabic.unrecognized_tags(), vec!["Silf"]);
        let font = merged(&arabic, &latin);
        assert!(font.unrecognized_tags().is_empty());
        assert_eq!(font.cmap().unwrap().len(), 2);
    }

    #[test]
    fn test_cubic_input_fails_every_strategy() {
        let arabic = synthetic_font("ar.ttf", 1000, &[0x0628], None);
        let mut latin = synthetic_font("en.otf", 1000, &[0x41], None);
        latin.set_table(TableKind::Cff, vec![1, 0, 4, 1]);
        let dir = tempfile::tempdir().unwrap();
        let err = merge_fonts(&arabic, &latin, &dir.path().join("m.ttf"), &strategies(None))
            .unwrap_err();
        assert!(matches!(err, MergeError::Merge { .. }));
        assert!(err.to_string().contains("CFF"));
    }
}
