//! Merging the `GSUB`/`GPOS` tables of two fonts.
//!
//! The first font's lookups are kept byte for byte. Every lookup of the result is written
//! as an extension lookup whose 32-bit offsets point into a copy of the first font's
//! table, so its subtables never need to be understood. Lookups of the second font are
//! decoded, their glyph ids rewritten through the glyph map of the merge, and encoded
//! again after the first font's lookups.
//!
//! Only lookups whose rules are plain glyph mappings can be rewritten: single, multiple,
//! alternate and ligature substitution, single and pair adjustment. Other lookup types
//! of the second font are dropped and counted. Device and variation offsets inside value
//! records are dropped as well; the plain placement and advance fields are kept.

use super::{read_i16, read_u16, read_u32, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

type Tag = [u8; 4];

const NO_REQUIRED_FEATURE: u16 = 0xFFFF;
const USE_MARK_FILTERING_SET: u16 = 0x0010;
/// Lookup flag bits that refer to the `GDEF` table of the lookup's own font
const GDEF_FLAGS: u16 = 0xFF00 | USE_MARK_FILTERING_SET;
/// Value record fields that hold plain numbers rather than device offsets
const PLAIN_VALUE_FIELDS: u16 = 0x000F;

const SINGLE_SUBST: u16 = 1;
const MULTIPLE_SUBST: u16 = 2;
const ALTERNATE_SUBST: u16 = 3;
const LIGATURE_SUBST: u16 = 4;
const SINGLE_POS: u16 = 1;
const PAIR_POS: u16 = 2;

/// The merged table and what could not be carried over
#[derive(Debug, Clone)]
pub struct MergedLayout {
    pub table: Vec<u8>,
    /// Lookups of the second font with a type that cannot be rewritten
    pub dropped_lookups: usize,
}

/// Appends the lookups, features and scripts of `second` to those of `first`.
///
/// `glyph_map` maps glyph ids of the second font to ids in the merged font; rules that
/// mention an unmapped glyph are left out. Without a `first` table the result holds the
/// second font's rules alone.
pub fn merge_layout_tables(
    kind: TableKind,
    first: Option<&[u8]>,
    second: &[u8],
    glyph_map: &BTreeMap<u16, u16>,
) -> Result<MergedLayout, MergeError> {
    let extension = extension_kind(kind)?;
    let base = match first {
        Some(data) => LayoutTable::parse(kind, data)?,
        None => LayoutTable::default(),
    };
    let other = LayoutTable::parse(kind, second)?;
    let source = Reader { data: second, kind };

    let mut lookups: Vec<OutLookup> = base
        .lookups
        .iter()
        .map(|lookup| OutLookup {
            kind: lookup.kind,
            flag: lookup.flag,
            mark_set: lookup.mark_set,
            subtables: lookup.subtables.iter().map(|&offset| Payload::Kept(offset)).collect(),
        })
        .collect();
    let map = |glyph: u16| glyph_map.get(&glyph).copied();
    let mut lookup_map = BTreeMap::new();
    let mut dropped_lookups = 0;
    for (index, lookup) in other.lookups.iter().enumerate() {
        let Some(subtables) = carry_over(source, lookup, &map)? else {
            dropped_lookups += 1;
            continue;
        };
        if subtables.is_empty() {
            continue;
        }
        lookup_map.insert(index as u16, count16(kind, lookups.len())?);
        lookups.push(OutLookup {
            kind: lookup.kind,
            flag: lookup.flag & !GDEF_FLAGS,
            mark_set: None,
            subtables: subtables.into_iter().map(Payload::Encoded).collect(),
        });
    }
    debug!(
        "{}: {} lookups kept, {} added, {} dropped",
        kind,
        base.lookups.len(),
        lookup_map.len(),
        dropped_lookups
    );

    let first_features = base.features.len();
    let mut features: Vec<(usize, Feature)> = base
        .features
        .into_iter()
        .chain(other.features.into_iter().map(|feature| Feature {
            tag: feature.tag,
            lookups: feature
                .lookups
                .iter()
                .filter_map(|index| lookup_map.get(index).copied())
                .collect(),
        }))
        .enumerate()
        .collect();
    features.sort_by_key(|(_, feature)| feature.tag);
    let mut position = vec![0u16; features.len()];
    for (new, (old, _)) in features.iter().enumerate() {
        position[*old] = count16(kind, new)?;
    }
    let index = FeatureIndex {
        position,
        first_features,
    };
    let features: Vec<Feature> = features.into_iter().map(|(_, feature)| feature).collect();

    let mut scripts = BTreeMap::new();
    let script_tags: BTreeSet<Tag> = base.scripts.keys().chain(other.scripts.keys()).copied().collect();
    for tag in script_tags {
        let mine = base.scripts.get(&tag);
        let theirs = other.scripts.get(&tag);
        let mine_default = mine.and_then(|s| s.default.as_ref());
        let theirs_default = theirs.and_then(|s| s.default.as_ref());
        let default = (mine_default.is_some() || theirs_default.is_some())
            .then(|| index.combine(mine_default, theirs_default));
        let lang_tags: BTreeSet<Tag> = mine
            .into_iter()
            .chain(theirs)
            .flat_map(|s| s.langs.keys().copied())
            .collect();
        let mut langs = BTreeMap::new();
        for lang in lang_tags {
            // a language only one font knows still gets the other font's default rules
            let a = mine.and_then(|s| s.langs.get(&lang).or(s.default.as_ref()));
            let b = theirs.and_then(|s| s.langs.get(&lang).or(s.default.as_ref()));
            langs.insert(lang, index.combine(a, b));
        }
        scripts.insert(tag, Script { default, langs });
    }

    let kept = first.unwrap_or_default();
    let script_list = encode_script_list(kind, &scripts)?;
    let feature_list = encode_feature_list(kind, &features)?;
    let lookup_list = encode_lookup_list(kind, extension, &lookups, kept)?;
    let mut table = Vec::with_capacity(10 + script_list.len() + feature_list.len() + lookup_list.len());
    put(
        &mut table,
        &[
            1,
            0,
            10,
            off16(kind, 10 + script_list.len())?,
            off16(kind, 10 + script_list.len() + feature_list.len())?,
        ],
    );
    table.extend(script_list);
    table.extend(feature_list);
    table.extend(lookup_list);
    Ok(MergedLayout {
        table,
        dropped_lookups,
    })
}

fn extension_kind(kind: TableKind) -> Result<u16, MergeError> {
    match kind {
        TableKind::Gsub => Ok(7),
        TableKind::Gpos => Ok(9),
        other => Err(MergeError::table(other.to_string(), "has no lookups")),
    }
}

/// Glyphs of a coverage table in coverage-index order
pub(super) fn decode_coverage(table: &[u8]) -> Option<Vec<u16>> {
    let format = read_u16(table, 0)?;
    let count = read_u16(table, 2)? as usize;
    let mut glyphs = Vec::new();
    match format {
        1 => {
            for i in 0..count {
                glyphs.push(read_u16(table, 4 + i * 2)?);
            }
        }
        2 => {
            for i in 0..count {
                let record = 4 + i * 6;
                let start = read_u16(table, record)?;
                let end = read_u16(table, record + 2)?;
                let start_index = read_u16(table, record + 4)? as usize;
                for (k, glyph) in (start..=end).enumerate() {
                    let index = start_index + k;
                    if glyphs.len() <= index {
                        glyphs.resize(index + 1, 0);
                    }
                    glyphs[index] = glyph;
                }
            }
        }
        _ => return None,
    }
    Some(glyphs)
}

#[derive(Clone, Copy)]
struct Reader<'a> {
    data: &'a [u8],
    kind: TableKind,
}

impl<'a> Reader<'a> {
    fn malformed(&self) -> MergeError {
        MergeError::table(self.kind.to_string(), "is malformed")
    }

    fn u16(&self, offset: usize) -> Result<u16, MergeError> {
        read_u16(self.data, offset).ok_or_else(|| self.malformed())
    }

    fn i16(&self, offset: usize) -> Result<i16, MergeError> {
        read_i16(self.data, offset).ok_or_else(|| self.malformed())
    }

    fn u32(&self, offset: usize) -> Result<u32, MergeError> {
        read_u32(self.data, offset).ok_or_else(|| self.malformed())
    }

    fn tag(&self, offset: usize) -> Result<Tag, MergeError> {
        self.data
            .get(offset..offset + 4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| self.malformed())
    }

    fn u16_array(&self, offset: usize, count: usize) -> Result<Vec<u16>, MergeError> {
        (0..count).map(|i| self.u16(offset + i * 2)).collect()
    }

    fn at(&self, offset: usize) -> Result<Reader<'a>, MergeError> {
        let data = self.data.get(offset..).ok_or_else(|| self.malformed())?;
        Ok(Reader { data, kind: self.kind })
    }

    /// The table at the 16-bit offset stored at `field`
    fn follow(&self, field: usize) -> Result<Reader<'a>, MergeError> {
        self.at(self.u16(field)? as usize)
    }

    fn coverage(&self, field: usize) -> Result<Vec<u16>, MergeError> {
        decode_coverage(self.follow(field)?.data).ok_or_else(|| self.malformed())
    }

    fn class_def(&self, field: usize) -> Result<BTreeMap<u16, u16>, MergeError> {
        let table = self.follow(field)?;
        let mut classes = BTreeMap::new();
        match table.u16(0)? {
            1 => {
                let start = table.u16(2)?;
                let count = table.u16(4)? as usize;
                for i in 0..count {
                    let class = table.u16(6 + i * 2)?;
                    classes.insert(start.wrapping_add(i as u16), class);
                }
            }
            2 => {
                for i in 0..table.u16(2)? as usize {
                    let record = 4 + i * 6;
                    let (start, end, class) = (table.u16(record)?, table.u16(record + 2)?, table.u16(record + 4)?);
                    for glyph in start..=end {
                        classes.insert(glyph, class);
                    }
                }
            }
            _ => return Err(self.malformed()),
        }
        classes.retain(|_, class| *class != 0);
        Ok(classes)
    }

    /// A value record, keeping only its plain fields
    fn value(&self, offset: usize, format: u16) -> Result<Vec<i16>, MergeError> {
        let mut values = Vec::new();
        let mut field = 0;
        for bit in 0..8 {
            if format & (1 << bit) == 0 {
                continue;
            }
            if bit < 4 {
                values.push(self.i16(offset + field * 2)?);
            }
            field += 1;
        }
        Ok(values)
    }
}

fn value_size(format: u16) -> usize {
    (format & 0x00FF).count_ones() as usize * 2
}

#[derive(Debug, Clone, Default, PartialEq)]
struct LangSys {
    required: u16,
    features: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Script {
    default: Option<LangSys>,
    langs: BTreeMap<Tag, LangSys>,
}

#[derive(Debug, Clone, PartialEq)]
struct Feature {
    tag: Tag,
    lookups: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
struct Lookup {
    /// Lookup type with extension lookups resolved to the type they wrap
    kind: u16,
    flag: u16,
    mark_set: Option<u16>,
    /// Subtable offsets from the start of the whole table
    subtables: Vec<usize>,
}

#[derive(Debug, Default)]
struct LayoutTable {
    scripts: BTreeMap<Tag, Script>,
    features: Vec<Feature>,
    lookups: Vec<Lookup>,
}

impl LayoutTable {
    fn parse(kind: TableKind, data: &[u8]) -> Result<Self, MergeError> {
        let extension = extension_kind(kind)?;
        let table = Reader { data, kind };
        let mut parsed = LayoutTable::default();

        let script_list = table.u16(4)? as usize;
        if script_list != 0 {
            let list = table.at(script_list)?;
            for i in 0..list.u16(0)? as usize {
                let tag = list.tag(2 + i * 6)?;
                parsed.scripts.insert(tag, parse_script(list.follow(6 + i * 6)?)?);
            }
        }

        let feature_list = table.u16(6)? as usize;
        if feature_list != 0 {
            let list = table.at(feature_list)?;
            for i in 0..list.u16(0)? as usize {
                let tag = list.tag(2 + i * 6)?;
                let feature = list.follow(6 + i * 6)?;
                let lookups = feature.u16_array(4, feature.u16(2)? as usize)?;
                parsed.features.push(Feature { tag, lookups });
            }
        }

        let lookup_list = table.u16(8)? as usize;
        if lookup_list != 0 {
            let list = table.at(lookup_list)?;
            for i in 0..list.u16(0)? as usize {
                let start = lookup_list + list.u16(2 + i * 2)? as usize;
                let lookup = table.at(start)?;
                let declared = lookup.u16(0)?;
                let mut lookup_kind = declared;
                let flag = lookup.u16(2)?;
                let count = lookup.u16(4)? as usize;
                let mark_set = if flag & USE_MARK_FILTERING_SET != 0 {
                    Some(lookup.u16(6 + count * 2)?)
                } else {
                    None
                };
                let mut subtables = Vec::with_capacity(count);
                for offset in lookup.u16_array(6, count)? {
                    let mut at = start + offset as usize;
                    if declared == extension {
                        let wrapper = table.at(at)?;
                        lookup_kind = wrapper.u16(2)?;
                        at += wrapper.u32(4)? as usize;
                    }
                    subtables.push(at);
                }
                parsed.lookups.push(Lookup {
                    kind: lookup_kind,
                    flag,
                    mark_set,
                    subtables,
                });
            }
        }
        Ok(parsed)
    }
}

fn parse_script(script: Reader) -> Result<Script, MergeError> {
    let default = match script.u16(0)? {
        0 => None,
        _ => Some(parse_lang_sys(script.follow(0)?)?),
    };
    let mut langs = BTreeMap::new();
    for i in 0..script.u16(2)? as usize {
        let tag = script.tag(4 + i * 6)?;
        langs.insert(tag, parse_lang_sys(script.follow(8 + i * 6)?)?);
    }
    Ok(Script { default, langs })
}

fn parse_lang_sys(lang: Reader) -> Result<LangSys, MergeError> {
    Ok(LangSys {
        required: lang.u16(2)?,
        features: lang.u16_array(6, lang.u16(4)? as usize)?,
    })
}

/// Where each feature of the two inputs ended up after sorting
struct FeatureIndex {
    position: Vec<u16>,
    first_features: usize,
}

impl FeatureIndex {
    fn first(&self, index: u16) -> Option<u16> {
        if index as usize >= self.first_features {
            return None;
        }
        self.position.get(index as usize).copied()
    }

    fn second(&self, index: u16) -> Option<u16> {
        self.position.get(self.first_features + index as usize).copied()
    }

    fn combine(&self, mine: Option<&LangSys>, theirs: Option<&LangSys>) -> LangSys {
        let mut features = BTreeSet::new();
        let mut required = NO_REQUIRED_FEATURE;
        for (lang, from_second) in [(mine, false), (theirs, true)] {
            let Some(lang) = lang else {
                continue;
            };
            let translate = |i: u16| if from_second { self.second(i) } else { self.first(i) };
            features.extend(lang.features.iter().filter_map(|&i| translate(i)));
            if required == NO_REQUIRED_FEATURE && lang.required != NO_REQUIRED_FEATURE {
                required = translate(lang.required).unwrap_or(NO_REQUIRED_FEATURE);
            }
        }
        LangSys {
            required,
            features: features.into_iter().collect(),
        }
    }
}

/// Rewrites every subtable of `lookup`; `None` when its type cannot be rewritten
fn carry_over(
    source: Reader,
    lookup: &Lookup,
    map: &dyn Fn(u16) -> Option<u16>,
) -> Result<Option<Vec<Vec<u8>>>, MergeError> {
    let mut encoded = Vec::new();
    for &offset in &lookup.subtables {
        let Some(rules) = Rules::decode(source.kind, lookup.kind, source.at(offset)?)? else {
            return Ok(None);
        };
        if let Some(rules) = rules.remap(map) {
            encoded.push(rules.encode(source.kind)?);
        }
    }
    Ok(Some(encoded))
}

#[derive(Debug, Clone, PartialEq)]
struct Ligature {
    glyph: u16,
    /// Components after the first one
    components: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
struct PairValue {
    second: u16,
    first_value: Vec<i16>,
    second_value: Vec<i16>,
}

/// The rules of one subtable, keyed by the covered glyph in coverage order
#[derive(Debug, Clone, PartialEq)]
enum Rules {
    Single(Vec<(u16, u16)>),
    /// Multiple (`kind` 2) or alternate (`kind` 3) substitution
    Sequence {
        kind: u16,
        entries: Vec<(u16, Vec<u16>)>,
    },
    Ligature(Vec<(u16, Vec<Ligature>)>),
    Adjust {
        format: u16,
        entries: Vec<(u16, Vec<i16>)>,
    },
    PairGlyphs {
        formats: (u16, u16),
        entries: Vec<(u16, Vec<PairValue>)>,
    },
    PairClasses {
        formats: (u16, u16),
        coverage: Vec<u16>,
        first_classes: BTreeMap<u16, u16>,
        second_classes: BTreeMap<u16, u16>,
        first_count: u16,
        second_count: u16,
        /// `first_count * second_count` value pairs, row by row
        records: Vec<(Vec<i16>, Vec<i16>)>,
    },
}

impl Rules {
    fn decode(table: TableKind, kind: u16, sub: Reader) -> Result<Option<Rules>, MergeError> {
        let format = sub.u16(0)?;
        let rules = match (table, kind, format) {
            (TableKind::Gsub, SINGLE_SUBST, 1) => {
                let delta = sub.i16(4)? as u16;
                let coverage = sub.coverage(2)?;
                Rules::Single(coverage.into_iter().map(|g| (g, g.wrapping_add(delta))).collect())
            }
            (TableKind::Gsub, SINGLE_SUBST, 2) => {
                let substitutes = sub.u16_array(6, sub.u16(4)? as usize)?;
                Rules::Single(sub.coverage(2)?.into_iter().zip(substitutes).collect())
            }
            (TableKind::Gsub, MULTIPLE_SUBST | ALTERNATE_SUBST, 1) => {
                let mut entries = Vec::new();
                for (i, glyph) in sub.coverage(2)?.into_iter().enumerate().take(sub.u16(4)? as usize) {
                    let sequence = sub.follow(6 + i * 2)?;
                    entries.push((glyph, sequence.u16_array(2, sequence.u16(0)? as usize)?));
                }
                Rules::Sequence { kind, entries }
            }
            (TableKind::Gsub, LIGATURE_SUBST, 1) => {
                let mut entries = Vec::new();
                for (i, glyph) in sub.coverage(2)?.into_iter().enumerate().take(sub.u16(4)? as usize) {
                    let set = sub.follow(6 + i * 2)?;
                    let mut ligatures = Vec::new();
                    for k in 0..set.u16(0)? as usize {
                        let ligature = set.follow(2 + k * 2)?;
                        let count = ligature.u16(2)?.saturating_sub(1) as usize;
                        ligatures.push(Ligature {
                            glyph: ligature.u16(0)?,
                            components: ligature.u16_array(4, count)?,
                        });
                    }
                    entries.push((glyph, ligatures));
                }
                Rules::Ligature(entries)
            }
            (TableKind::Gpos, SINGLE_POS, 1) => {
                let value_format = sub.u16(4)?;
                let value = sub.value(6, value_format)?;
                Rules::Adjust {
                    format: value_format & PLAIN_VALUE_FIELDS,
                    entries: sub.coverage(2)?.into_iter().map(|g| (g, value.clone())).collect(),
                }
            }
            (TableKind::Gpos, SINGLE_POS, 2) => {
                let value_format = sub.u16(4)?;
                let size = value_size(value_format);
                let mut entries = Vec::new();
                for (i, glyph) in sub.coverage(2)?.into_iter().enumerate().take(sub.u16(6)? as usize) {
                    entries.push((glyph, sub.value(8 + i * size, value_format)?));
                }
                Rules::Adjust {
                    format: value_format & PLAIN_VALUE_FIELDS,
                    entries,
                }
            }
            (TableKind::Gpos, PAIR_POS, 1) => {
                let (format1, format2) = (sub.u16(4)?, sub.u16(6)?);
                let record_size = 2 + value_size(format1) + value_size(format2);
                let mut entries = Vec::new();
                for (i, glyph) in sub.coverage(2)?.into_iter().enumerate().take(sub.u16(8)? as usize) {
                    let set = sub.follow(10 + i * 2)?;
                    let mut pairs = Vec::new();
                    for k in 0..set.u16(0)? as usize {
                        let record = 2 + k * record_size;
                        pairs.push(PairValue {
                            second: set.u16(record)?,
                            first_value: set.value(record + 2, format1)?,
                            second_value: set.value(record + 2 + value_size(format1), format2)?,
                        });
                    }
                    entries.push((glyph, pairs));
                }
                Rules::PairGlyphs {
                    formats: (format1 & PLAIN_VALUE_FIELDS, format2 & PLAIN_VALUE_FIELDS),
                    entries,
                }
            }
            (TableKind::Gpos, PAIR_POS, 2) => {
                let (format1, format2) = (sub.u16(4)?, sub.u16(6)?);
                let (first_count, second_count) = (sub.u16(12)?, sub.u16(14)?);
                let record_size = value_size(format1) + value_size(format2);
                let mut records = Vec::with_capacity(first_count as usize * second_count as usize);
                for i in 0..first_count as usize * second_count as usize {
                    let record = 16 + i * record_size;
                    records.push((
                        sub.value(record, format1)?,
                        sub.value(record + value_size(format1), format2)?,
                    ));
                }
                Rules::PairClasses {
                    formats: (format1 & PLAIN_VALUE_FIELDS, format2 & PLAIN_VALUE_FIELDS),
                    coverage: sub.coverage(2)?,
                    first_classes: sub.class_def(8)?,
                    second_classes: sub.class_def(10)?,
                    first_count,
                    second_count,
                    records,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(rules))
    }

    /// Translates every glyph id; `None` when no rule survives
    fn remap(self, map: &dyn Fn(u16) -> Option<u16>) -> Option<Rules> {
        let all = |glyphs: &[u16]| glyphs.iter().map(|&g| map(g)).collect::<Option<Vec<u16>>>();
        let rules = match self {
            Rules::Single(pairs) => Rules::Single(sorted(
                pairs
                    .into_iter()
                    .filter_map(|(from, to)| Some((map(from)?, map(to)?)))
                    .collect(),
            )),
            Rules::Sequence { kind, entries } => {
                let entries = entries
                    .into_iter()
                    .filter_map(|(glyph, sequence)| {
                        let glyph = map(glyph)?;
                        let sequence = if kind == ALTERNATE_SUBST {
                            let alternates: Vec<u16> = sequence.into_iter().filter_map(map).collect();
                            (!alternates.is_empty()).then_some(alternates)?
                        } else {
                            all(&sequence)?
                        };
                        Some((glyph, sequence))
                    })
                    .collect();
                Rules::Sequence {
                    kind,
                    entries: sorted(entries),
                }
            }
            Rules::Ligature(entries) => Rules::Ligature(sorted(
                entries
                    .into_iter()
                    .filter_map(|(glyph, ligatures)| {
                        let ligatures: Vec<Ligature> = ligatures
                            .into_iter()
                            .filter_map(|l| {
                                Some(Ligature {
                                    glyph: map(l.glyph)?,
                                    components: all(&l.components)?,
                                })
                            })
                            .collect();
                        (!ligatures.is_empty()).then_some((map(glyph)?, ligatures))
                    })
                    .collect(),
            )),
            Rules::Adjust { format, entries } => Rules::Adjust {
                format,
                entries: sorted(
                    entries
                        .into_iter()
                        .filter_map(|(glyph, value)| Some((map(glyph)?, value)))
                        .collect(),
                ),
            },
            Rules::PairGlyphs { formats, entries } => Rules::PairGlyphs {
                formats,
                entries: sorted(
                    entries
                        .into_iter()
                        .filter_map(|(glyph, pairs)| {
                            let mut pairs: Vec<PairValue> = pairs
                                .into_iter()
                                .filter_map(|p| Some(PairValue { second: map(p.second)?, ..p }))
                                .collect();
                            pairs.sort_by_key(|p| p.second);
                            pairs.dedup_by_key(|p| p.second);
                            (!pairs.is_empty()).then_some((map(glyph)?, pairs))
                        })
                        .collect(),
                ),
            },
            Rules::PairClasses {
                formats,
                coverage,
                first_classes,
                second_classes,
                first_count,
                second_count,
                records,
            } => {
                let classes = |classes: BTreeMap<u16, u16>| -> BTreeMap<u16, u16> {
                    classes.into_iter().filter_map(|(g, c)| Some((map(g)?, c))).collect()
                };
                let mut coverage: Vec<u16> = coverage.into_iter().filter_map(map).collect();
                coverage.sort_unstable();
                coverage.dedup();
                Rules::PairClasses {
                    formats,
                    coverage,
                    first_classes: classes(first_classes),
                    second_classes: classes(second_classes),
                    first_count,
                    second_count,
                    records,
                }
            }
        };
        (!rules.is_empty()).then_some(rules)
    }

    fn is_empty(&self) -> bool {
        match self {
            Rules::Single(entries) => entries.is_empty(),
            Rules::Sequence { entries, .. } => entries.is_empty(),
            Rules::Ligature(entries) => entries.is_empty(),
            Rules::Adjust { entries, .. } => entries.is_empty(),
            Rules::PairGlyphs { entries, .. } => entries.is_empty(),
            Rules::PairClasses { coverage, .. } => coverage.is_empty(),
        }
    }

    fn encode(&self, table: TableKind) -> Result<Vec<u8>, MergeError> {
        let mut data = Vec::new();
        match self {
            Rules::Single(entries) => {
                let covered: Vec<u16> = entries.iter().map(|e| e.0).collect();
                put(&mut data, &[2, off16(table, 6 + entries.len() * 2)?, count16(table, entries.len())?]);
                put(&mut data, &entries.iter().map(|e| e.1).collect::<Vec<u16>>());
                data.extend(encode_coverage(&covered));
            }
            Rules::Sequence { entries, .. } => {
                let blocks: Vec<Vec<u8>> = entries
                    .iter()
                    .map(|(_, glyphs)| {
                        let mut block = Vec::new();
                        put(&mut block, &[glyphs.len() as u16]);
                        put(&mut block, glyphs);
                        block
                    })
                    .collect();
                offset_table(table, &mut data, entries.iter().map(|e| e.0).collect(), &[], blocks)?;
            }
            Rules::Ligature(entries) => {
                let mut blocks = Vec::with_capacity(entries.len());
                for (_, ligatures) in entries {
                    let ligature_blocks: Vec<Vec<u8>> = ligatures
                        .iter()
                        .map(|l| {
                            let mut block = Vec::new();
                            put(&mut block, &[l.glyph, l.components.len() as u16 + 1]);
                            put(&mut block, &l.components);
                            block
                        })
                        .collect();
                    let mut set = Vec::new();
                    put(&mut set, &[count16(table, ligatures.len())?]);
                    let offsets = block_offsets(table, 2 + ligatures.len() * 2, &ligature_blocks)?;
                    put(&mut set, &offsets);
                    ligature_blocks.into_iter().for_each(|block| set.extend(block));
                    blocks.push(set);
                }
                offset_table(table, &mut data, entries.iter().map(|e| e.0).collect(), &[], blocks)?;
            }
            Rules::Adjust { format, entries } => {
                let size = value_size(*format);
                let covered: Vec<u16> = entries.iter().map(|e| e.0).collect();
                put(
                    &mut data,
                    &[2, off16(table, 8 + entries.len() * size)?, *format, count16(table, entries.len())?],
                );
                for (_, value) in entries {
                    put_values(&mut data, value);
                }
                data.extend(encode_coverage(&covered));
            }
            Rules::PairGlyphs { formats, entries } => {
                let blocks: Vec<Vec<u8>> = entries
                    .iter()
                    .map(|(_, pairs)| {
                        let mut set = Vec::new();
                        put(&mut set, &[pairs.len() as u16]);
                        for pair in pairs {
                            put(&mut set, &[pair.second]);
                            put_values(&mut set, &pair.first_value);
                            put_values(&mut set, &pair.second_value);
                        }
                        set
                    })
                    .collect();
                offset_table(
                    table,
                    &mut data,
                    entries.iter().map(|e| e.0).collect(),
                    &[formats.0, formats.1],
                    blocks,
                )?;
            }
            Rules::PairClasses {
                formats,
                coverage,
                first_classes,
                second_classes,
                first_count,
                second_count,
                records,
            } => {
                let record_size = value_size(formats.0) + value_size(formats.1);
                let header = 16 + records.len() * record_size;
                let blocks = [
                    encode_coverage(coverage),
                    encode_class_def(first_classes),
                    encode_class_def(second_classes),
                ];
                let offsets = block_offsets(table, header, &blocks)?;
                put(
                    &mut data,
                    &[2, offsets[0], formats.0, formats.1, offsets[1], offsets[2], *first_count, *second_count],
                );
                for (first_value, second_value) in records {
                    put_values(&mut data, first_value);
                    put_values(&mut data, second_value);
                }
                blocks.into_iter().for_each(|block| data.extend(block));
            }
        }
        Ok(data)
    }
}

/// Sorts entries by covered glyph, keeping the first of duplicates
fn sorted<T>(mut entries: Vec<(u16, T)>) -> Vec<(u16, T)> {
    entries.sort_by_key(|e| e.0);
    entries.dedup_by_key(|e| e.0);
    entries
}

/// Writes `format 1, coverage offset, fields.., count, offsets..` followed by `blocks`
/// and the coverage of `covered`
fn offset_table(
    table: TableKind,
    data: &mut Vec<u8>,
    covered: Vec<u16>,
    fields: &[u16],
    mut blocks: Vec<Vec<u8>>,
) -> Result<(), MergeError> {
    let count = blocks.len();
    blocks.push(encode_coverage(&covered));
    let offsets = block_offsets(table, 6 + fields.len() * 2 + count * 2, &blocks)?;
    put(data, &[1, offsets[count]]);
    put(data, fields);
    put(data, &[count16(table, count)?]);
    put(data, &offsets[..count]);
    blocks.into_iter().for_each(|block| data.extend(block));
    Ok(())
}

fn encode_coverage(glyphs: &[u16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + glyphs.len() * 2);
    put(&mut data, &[1, glyphs.len() as u16]);
    put(&mut data, glyphs);
    data
}

fn encode_class_def(classes: &BTreeMap<u16, u16>) -> Vec<u8> {
    let mut ranges: Vec<(u16, u16, u16)> = Vec::new();
    for (&glyph, &class) in classes {
        match ranges.last_mut() {
            Some((_, end, last)) if *last == class && end.checked_add(1) == Some(glyph) => *end = glyph,
            _ => ranges.push((glyph, glyph, class)),
        }
    }
    let mut data = Vec::with_capacity(4 + ranges.len() * 6);
    put(&mut data, &[2, ranges.len() as u16]);
    for (start, end, class) in ranges {
        put(&mut data, &[start, end, class]);
    }
    data
}

/// Offsets of `blocks` laid out one after another behind a header of `header` bytes
fn block_offsets(table: TableKind, header: usize, blocks: &[Vec<u8>]) -> Result<Vec<u16>, MergeError> {
    let mut offsets = Vec::with_capacity(blocks.len());
    let mut at = header;
    for block in blocks {
        offsets.push(off16(table, at)?);
        at += block.len();
    }
    Ok(offsets)
}

fn encode_lang_sys(lang: &LangSys) -> Vec<u8> {
    let mut data = Vec::with_capacity(6 + lang.features.len() * 2);
    put(&mut data, &[0, lang.required, lang.features.len() as u16]);
    put(&mut data, &lang.features);
    data
}

fn encode_script_list(table: TableKind, scripts: &BTreeMap<Tag, Script>) -> Result<Vec<u8>, MergeError> {
    let mut blocks = Vec::with_capacity(scripts.len());
    for script in scripts.values() {
        let mut lang_blocks: Vec<Vec<u8>> = script.default.iter().map(encode_lang_sys).collect();
        lang_blocks.extend(script.langs.values().map(encode_lang_sys));
        let offsets = block_offsets(table, 4 + script.langs.len() * 6, &lang_blocks)?;
        let (default, langs) = match script.default {
            Some(_) => (offsets[0], &offsets[1..]),
            None => (0, &offsets[..]),
        };
        let mut block = Vec::new();
        put(&mut block, &[default, count16(table, script.langs.len())?]);
        for (tag, offset) in script.langs.keys().zip(langs) {
            block.extend_from_slice(tag);
            put(&mut block, &[*offset]);
        }
        lang_blocks.into_iter().for_each(|lang| block.extend(lang));
        blocks.push(block);
    }
    let offsets = block_offsets(table, 2 + scripts.len() * 6, &blocks)?;
    let mut data = Vec::new();
    put(&mut data, &[count16(table, scripts.len())?]);
    for (tag, offset) in scripts.keys().zip(&offsets) {
        data.extend_from_slice(tag);
        put(&mut data, &[*offset]);
    }
    blocks.into_iter().for_each(|block| data.extend(block));
    Ok(data)
}

fn encode_feature_list(table: TableKind, features: &[Feature]) -> Result<Vec<u8>, MergeError> {
    let blocks: Vec<Vec<u8>> = features
        .iter()
        .map(|feature| {
            let mut block = Vec::new();
            put(&mut block, &[0, feature.lookups.len() as u16]);
            put(&mut block, &feature.lookups);
            block
        })
        .collect();
    let offsets = block_offsets(table, 2 + features.len() * 6, &blocks)?;
    let mut data = Vec::new();
    put(&mut data, &[count16(table, features.len())?]);
    for (feature, offset) in features.iter().zip(&offsets) {
        data.extend_from_slice(&feature.tag);
        put(&mut data, &[*offset]);
    }
    blocks.into_iter().for_each(|block| data.extend(block));
    Ok(data)
}

enum Payload {
    /// Offset of a subtable inside the first font's table
    Kept(usize),
    Encoded(Vec<u8>),
}

struct OutLookup {
    kind: u16,
    flag: u16,
    mark_set: Option<u16>,
    subtables: Vec<Payload>,
}

impl OutLookup {
    /// Lookup header and offsets, without its extension subtables
    fn header_len(&self) -> usize {
        6 + self.subtables.len() * 2 + if self.mark_set.is_some() { 2 } else { 0 }
    }
}

/// Extension subtable: format, wrapped lookup type, 32-bit offset
const EXTENSION_LEN: usize = 8;

/// Lookup list with every lookup wrapped in extension subtables, followed by the data
/// they point to: a copy of `kept` and then the encoded subtables
fn encode_lookup_list(
    table: TableKind,
    extension: u16,
    lookups: &[OutLookup],
    kept: &[u8],
) -> Result<Vec<u8>, MergeError> {
    let header = 2 + lookups.len() * 2;
    let mut lookup_offsets = Vec::with_capacity(lookups.len());
    let mut at = header;
    for lookup in lookups {
        lookup_offsets.push(off16(table, at)?);
        at += lookup.header_len() + lookup.subtables.len() * EXTENSION_LEN;
    }
    let kept_start = at;
    let keeps_any = lookups
        .iter()
        .any(|l| l.subtables.iter().any(|s| matches!(s, Payload::Kept(_))));
    let encoded_start = kept_start + if keeps_any { kept.len() + kept.len() % 2 } else { 0 };

    let mut data = Vec::with_capacity(encoded_start);
    let mut encoded = Vec::new();
    put(&mut data, &[count16(table, lookups.len())?]);
    put(&mut data, &lookup_offsets);
    for lookup in lookups {
        let start = data.len();
        let header_len = lookup.header_len();
        put(&mut data, &[extension, lookup.flag, count16(table, lookup.subtables.len())?]);
        for j in 0..lookup.subtables.len() {
            put(&mut data, &[off16(table, header_len + j * EXTENSION_LEN)?]);
        }
        if let Some(set) = lookup.mark_set {
            put(&mut data, &[set]);
        }
        for (j, payload) in lookup.subtables.iter().enumerate() {
            let position = start + header_len + j * EXTENSION_LEN;
            let target = match payload {
                Payload::Kept(offset) => kept_start + offset,
                Payload::Encoded(bytes) => {
                    let target = encoded_start + encoded.len();
                    encoded.extend_from_slice(bytes);
                    if encoded.len() % 2 == 1 {
                        encoded.push(0);
                    }
                    target
                }
            };
            let offset = u32::try_from(target - position)
                .map_err(|_| MergeError::table(table.to_string(), "grew past 32-bit offsets"))?;
            put(&mut data, &[1, lookup.kind]);
            let _ = data.write_u32::<BigEndian>(offset);
        }
    }
    if keeps_any {
        data.extend_from_slice(kept);
        if kept.len() % 2 == 1 {
            data.push(0);
        }
    }
    data.extend(encoded);
    Ok(data)
}

fn put(data: &mut Vec<u8>, values: &[u16]) {
    for &value in values {
        let _ = data.write_u16::<BigEndian>(value);
    }
}

fn put_values(data: &mut Vec<u8>, values: &[i16]) {
    for &value in values {
        let _ = data.write_i16::<BigEndian>(value);
    }
}

fn off16(table: TableKind, offset: usize) -> Result<u16, MergeError> {
    u16::try_from(offset).map_err(|_| MergeError::table(table.to_string(), "grew past 16-bit offsets"))
}

fn count16(table: TableKind, count: usize) -> Result<u16, MergeError> {
    u16::try_from(count).map_err(|_| MergeError::table(table.to_string(), "has too many entries"))
}
