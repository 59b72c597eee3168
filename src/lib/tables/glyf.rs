//! `glyf` and `loca`: TrueType outlines.
//!
//! The glyph table keeps every glyph as its raw binary record so that glyphs which are
//! only moved between fonts are copied byte for byte. Records are decoded into
//! [`GlyphOutline`] only when their contents must change (scaling, stripping hints,
//! outline conversion).

use super::maxp::MaxpProfile;
use super::{io_truncated, read_i16, read_u16, truncated, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeSet;
use std::io::{Cursor, Read};

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
/// Flags carried over unchanged when a component is re-encoded
const PRESERVED_COMPONENT_FLAGS: u16 = 0x0004 | 0x0200 | 0x0400 | 0x0800 | 0x1000;

/// Composite nesting beyond this depth is treated as a cycle
const MAX_COMPONENT_DEPTH: u16 = 16;

/// Offsets from the loca table
#[derive(Debug, Clone, PartialEq)]
pub struct LocaOffsets {
    /// Offsets of each glyph in the glyf table, one more than the glyph count
    pub offsets: Vec<u32>,
    /// 0 for short offsets (stored divided by 2), 1 for long offsets
    pub format: i16,
}

impl LocaOffsets {
    /// Parse the loca table from raw bytes
    pub fn from_bytes(data: &[u8], num_glyphs: u16, format: i16) -> Result<Self, MergeError> {
        let mut cursor = Cursor::new(data);
        let mut offsets = Vec::with_capacity(num_glyphs as usize + 1);
        for _ in 0..=num_glyphs {
            let offset = if format == 0 {
                cursor
                    .read_u16::<BigEndian>()
                    .map_err(io_truncated(TableKind::Loca))? as u32
                    * 2
            } else {
                cursor
                    .read_u32::<BigEndian>()
                    .map_err(io_truncated(TableKind::Loca))?
            };
            offsets.push(offset);
        }
        Ok(LocaOffsets { offsets, format })
    }

    /// Serialize back to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for offset in &self.offsets {
            if self.format == 0 {
                let _ = buf.write_u16::<BigEndian>((offset / 2) as u16);
            } else {
                let _ = buf.write_u32::<BigEndian>(*offset);
            }
        }
        buf
    }
}

/// All glyph records of a font, indexed by glyph id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphTable {
    pub glyphs: Vec<Vec<u8>>,
}

impl GlyphTable {
    pub fn decode(
        glyf: &[u8],
        loca: &[u8],
        num_glyphs: u16,
        index_to_loc_format: i16,
    ) -> Result<Self, MergeError> {
        let loca = LocaOffsets::from_bytes(loca, num_glyphs, index_to_loc_format)?;
        let mut glyphs = Vec::with_capacity(num_glyphs as usize);
        for window in loca.offsets.windows(2) {
            let (start, end) = (window[0] as usize, window[1] as usize);
            if start > end || end > glyf.len() {
                return Err(MergeError::table("loca", "points outside the glyf table"));
            }
            glyphs.push(glyf[start..end].to_vec());
        }
        Ok(GlyphTable { glyphs })
    }

    /// Returns `(glyf, loca, indexToLocFormat)`
    pub fn encode(&self) -> (Vec<u8>, Vec<u8>, i16) {
        let mut glyf = Vec::new();
        let mut offsets = vec![0u32];
        for record in &self.glyphs {
            glyf.extend_from_slice(record);
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }
            offsets.push(glyf.len() as u32);
        }
        let format = if glyf.len() / 2 <= u16::MAX as usize { 0 } else { 1 };
        let loca = LocaOffsets { offsets, format };
        (glyf, loca.to_bytes(), format)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn record(&self, glyph_id: u16) -> Option<&[u8]> {
        self.glyphs.get(glyph_id as usize).map(Vec::as_slice)
    }

    pub fn outline(&self, glyph_id: u16) -> Result<GlyphOutline, MergeError> {
        let record = self
            .record(glyph_id)
            .ok_or_else(|| MergeError::table("glyf", format!("has no glyph {}", glyph_id)))?;
        GlyphOutline::decode(record)
    }

    pub fn set_outline(&mut self, glyph_id: u16, outline: &GlyphOutline) {
        if let Some(record) = self.glyphs.get_mut(glyph_id as usize) {
            *record = outline.encode();
        }
    }

    /// Union of the bounding boxes of all non-empty glyphs
    pub fn bbox(&self) -> Option<[i16; 4]> {
        self.glyphs
            .iter()
            .filter(|r| r.len() >= 10)
            .map(|r| {
                [
                    BigEndian::read_i16(&r[2..]),
                    BigEndian::read_i16(&r[4..]),
                    BigEndian::read_i16(&r[6..]),
                    BigEndian::read_i16(&r[8..]),
                ]
            })
            .reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])])
    }

    /// `seeds` plus every glyph reachable from them through composite references
    pub fn component_closure(&self, seeds: &BTreeSet<u16>) -> BTreeSet<u16> {
        let mut closure = seeds.clone();
        let mut pending: Vec<u16> = seeds.iter().copied().collect();
        while let Some(glyph_id) = pending.pop() {
            let Some(record) = self.record(glyph_id) else {
                continue;
            };
            for child in component_ids(record) {
                if (child as usize) < self.glyphs.len() && closure.insert(child) {
                    pending.push(child);
                }
            }
        }
        closure
    }

    /// Outline statistics for `maxp`
    pub fn profile(&self) -> MaxpProfile {
        let mut profile = MaxpProfile::default();
        for glyph_id in 0..self.glyphs.len() {
            let record = &self.glyphs[glyph_id];
            let contours = read_i16(record, 0).unwrap_or(0);
            if contours >= 0 {
                let (points, contours) = simple_counts(record);
                profile.max_points = profile.max_points.max(points);
                profile.max_contours = profile.max_contours.max(contours);
            } else {
                let components = component_ids(record).len() as u16;
                let (points, contours, depth) = self.composite_counts(glyph_id as u16, 1);
                profile.max_component_elements = profile.max_component_elements.max(components);
                profile.max_composite_points = profile.max_composite_points.max(points);
                profile.max_composite_contours = profile.max_composite_contours.max(contours);
                profile.max_component_depth = profile.max_component_depth.max(depth);
            }
        }
        profile
    }

    fn composite_counts(&self, glyph_id: u16, depth: u16) -> (u16, u16, u16) {
        let Some(record) = self.record(glyph_id) else {
            return (0, 0, 0);
        };
        if read_i16(record, 0).unwrap_or(0) >= 0 {
            let (points, contours) = simple_counts(record);
            return (points, contours, 0);
        }
        if depth > MAX_COMPONENT_DEPTH {
            return (0, 0, depth);
        }
        let mut totals = (0u16, 0u16, depth);
        for child in component_ids(record) {
            let (points, contours, child_depth) = self.composite_counts(child, depth + 1);
            totals.0 = totals.0.saturating_add(points);
            totals.1 = totals.1.saturating_add(contours);
            totals.2 = totals.2.max(child_depth);
        }
        totals
    }
}

fn simple_counts(record: &[u8]) -> (u16, u16) {
    let contours = read_i16(record, 0).unwrap_or(0).max(0) as u16;
    if contours == 0 {
        return (0, 0);
    }
    let last_end = read_u16(record, 10 + (contours as usize - 1) * 2).unwrap_or(0);
    (last_end.saturating_add(1), contours)
}

/// Walks the component records of a raw composite glyph, calling `visit` with the byte
/// offset of each component's glyph index
fn walk_components(record: &[u8], mut visit: impl FnMut(usize)) {
    if read_i16(record, 0).unwrap_or(0) >= 0 {
        return;
    }
    let mut offset = 10;
    loop {
        let Some(flags) = read_u16(record, offset) else {
            return;
        };
        if read_u16(record, offset + 2).is_none() {
            return;
        }
        visit(offset + 2);
        offset += 4;
        offset += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            offset += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            offset += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            offset += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            return;
        }
    }
}

/// Glyph ids referenced by a raw composite record; empty for simple glyphs
pub fn component_ids(record: &[u8]) -> Vec<u16> {
    let mut ids = Vec::new();
    walk_components(record, |offset| {
        ids.push(BigEndian::read_u16(&record[offset..]));
    });
    ids
}

/// Rewrites the component glyph ids of a raw composite record in place
pub fn remap_components(record: &mut [u8], map: impl Fn(u16) -> u16) {
    let mut offsets = Vec::new();
    walk_components(record, |offset| offsets.push(offset));
    for offset in offsets {
        let old = BigEndian::read_u16(&record[offset..]);
        BigEndian::write_u16(&mut record[offset..], map(old));
    }
}

/// One outline point in font units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
    pub on_curve: bool,
}

impl Point {
    pub fn new(x: i16, y: i16, on_curve: bool) -> Self {
        Point { x, y, on_curve }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleGlyph {
    pub contours: Vec<Vec<Point>>,
    pub instructions: Vec<u8>,
}

/// How a component is positioned relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    Offset { dx: i16, dy: i16 },
    Points { parent: u16, child: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub glyph: u16,
    pub anchor: Anchor,
    /// 2x2 matrix in file order: xx, xy, yx, yy
    pub transform: [f32; 4],
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeGlyph {
    pub bbox: [i16; 4],
    pub components: Vec<Component>,
    pub instructions: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlyphOutline {
    Empty,
    Simple(SimpleGlyph),
    Composite(CompositeGlyph),
}

impl GlyphOutline {
    pub fn decode(record: &[u8]) -> Result<Self, MergeError> {
        if record.is_empty() {
            return Ok(GlyphOutline::Empty);
        }
        let contours = read_i16(record, 0).ok_or_else(|| truncated(TableKind::Glyf))?;
        if record.len() < 10 {
            return Err(truncated(TableKind::Glyf));
        }
        let bbox = [
            BigEndian::read_i16(&record[2..]),
            BigEndian::read_i16(&record[4..]),
            BigEndian::read_i16(&record[6..]),
            BigEndian::read_i16(&record[8..]),
        ];
        let mut cursor = Cursor::new(&record[10..]);
        if contours >= 0 {
            decode_simple(&mut cursor, contours as usize).map(GlyphOutline::Simple)
        } else {
            decode_composite(&mut cursor, bbox).map(GlyphOutline::Composite)
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            GlyphOutline::Empty => Vec::new(),
            GlyphOutline::Simple(glyph) => encode_simple(glyph),
            GlyphOutline::Composite(glyph) => encode_composite(glyph),
        }
    }

    /// Drops TrueType instructions
    pub fn strip_instructions(&mut self) {
        match self {
            GlyphOutline::Empty => {}
            GlyphOutline::Simple(glyph) => glyph.instructions.clear(),
            GlyphOutline::Composite(glyph) => glyph.instructions.clear(),
        }
    }
}

impl SimpleGlyph {
    pub fn bbox(&self) -> [i16; 4] {
        let mut points = self.contours.iter().flatten();
        let Some(first) = points.next() else {
            return [0; 4];
        };
        points.fold([first.x, first.y, first.x, first.y], |b, p| {
            [b[0].min(p.x), b[1].min(p.y), b[2].max(p.x), b[3].max(p.y)]
        })
    }

    pub fn scale(&mut self, factor: f64) {
        for point in self.contours.iter_mut().flatten() {
            point.x = super::scale_i16(point.x, factor);
            point.y = super::scale_i16(point.y, factor);
        }
    }
}

impl CompositeGlyph {
    /// Scales component offsets and the stored bounding box.
    ///
    /// The 2x2 transform is left alone: referenced glyphs are rescaled in the same pass,
    /// so composing the transform with the uniform scale only affects the translation.
    pub fn scale(&mut self, factor: f64) {
        for component in &mut self.components {
            if let Anchor::Offset { dx, dy } = &mut component.anchor {
                *dx = super::scale_i16(*dx, factor);
                *dy = super::scale_i16(*dy, factor);
            }
        }
        for v in &mut self.bbox {
            *v = super::scale_i16(*v, factor);
        }
    }
}

fn decode_simple(cursor: &mut Cursor<&[u8]>, num_contours: usize) -> Result<SimpleGlyph, MergeError> {
    let err = io_truncated(TableKind::Glyf);
    let mut end_points = Vec::with_capacity(num_contours);
    for _ in 0..num_contours {
        end_points.push(cursor.read_u16::<BigEndian>().map_err(&err)?);
    }
    let instruction_len = cursor.read_u16::<BigEndian>().map_err(&err)?;
    let mut instructions = vec![0u8; instruction_len as usize];
    cursor.read_exact(&mut instructions).map_err(&err)?;

    let num_points = end_points.last().map_or(0, |&e| e as usize + 1);
    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = cursor.read_u8().map_err(&err)?;
        flags.push(flag);
        if flag & REPEAT != 0 {
            let count = cursor.read_u8().map_err(&err)?;
            for _ in 0..count {
                flags.push(flag);
            }
        }
    }
    flags.truncate(num_points);

    let xs = decode_coordinates(cursor, &flags, X_SHORT, X_SAME_OR_POSITIVE)?;
    let ys = decode_coordinates(cursor, &flags, Y_SHORT, Y_SAME_OR_POSITIVE)?;

    let mut contours = Vec::with_capacity(num_contours);
    let mut start = 0usize;
    for &end in &end_points {
        let end = end as usize;
        if end < start || end >= num_points {
            return Err(MergeError::table("glyf", "has unordered contour end points"));
        }
        contours.push(
            (start..=end)
                .map(|i| Point::new(xs[i], ys[i], flags[i] & ON_CURVE != 0))
                .collect(),
        );
        start = end + 1;
    }
    Ok(SimpleGlyph {
        contours,
        instructions,
    })
}

fn decode_coordinates(
    cursor: &mut Cursor<&[u8]>,
    flags: &[u8],
    short: u8,
    same_or_positive: u8,
) -> Result<Vec<i16>, MergeError> {
    let err = io_truncated(TableKind::Glyf);
    let mut value = 0i16;
    let mut coordinates = Vec::with_capacity(flags.len());
    for &flag in flags {
        let delta = if flag & short != 0 {
            let magnitude = cursor.read_u8().map_err(&err)? as i16;
            if flag & same_or_positive != 0 {
                magnitude
            } else {
                -magnitude
            }
        } else if flag & same_or_positive != 0 {
            0
        } else {
            cursor.read_i16::<BigEndian>().map_err(&err)?
        };
        value = value.wrapping_add(delta);
        coordinates.push(value);
    }
    Ok(coordinates)
}

fn encode_simple(glyph: &SimpleGlyph) -> Vec<u8> {
    let points: Vec<Point> = glyph.contours.iter().flatten().copied().collect();
    if points.is_empty() {
        return Vec::new();
    }
    let bbox = glyph.bbox();
    let mut data = Vec::new();
    let _ = data.write_i16::<BigEndian>(glyph.contours.len() as i16);
    for v in bbox {
        let _ = data.write_i16::<BigEndian>(v);
    }
    let mut end = 0usize;
    for contour in &glyph.contours {
        end += contour.len();
        let _ = data.write_u16::<BigEndian>(end.saturating_sub(1) as u16);
    }
    let _ = data.write_u16::<BigEndian>(glyph.instructions.len() as u16);
    data.extend_from_slice(&glyph.instructions);

    let mut flags = Vec::with_capacity(points.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let (mut prev_x, mut prev_y) = (0i16, 0i16);
    for point in &points {
        let mut flag = if point.on_curve { ON_CURVE } else { 0 };
        flag |= encode_delta(point.x.wrapping_sub(prev_x), X_SHORT, X_SAME_OR_POSITIVE, &mut xs);
        flag |= encode_delta(point.y.wrapping_sub(prev_y), Y_SHORT, Y_SAME_OR_POSITIVE, &mut ys);
        flags.push(flag);
        prev_x = point.x;
        prev_y = point.y;
    }

    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let mut repeat = 0usize;
        while i + repeat + 1 < flags.len() && flags[i + repeat + 1] == flag && repeat < 255 {
            repeat += 1;
        }
        if repeat > 0 {
            data.push(flag | REPEAT);
            data.push(repeat as u8);
        } else {
            data.push(flag);
        }
        i += repeat + 1;
    }
    data.extend_from_slice(&xs);
    data.extend_from_slice(&ys);
    data
}

fn encode_delta(delta: i16, short: u8, same_or_positive: u8, out: &mut Vec<u8>) -> u8 {
    if delta == 0 {
        same_or_positive
    } else if delta.unsigned_abs() < 256 {
        out.push(delta.unsigned_abs() as u8);
        if delta > 0 {
            short | same_or_positive
        } else {
            short
        }
    } else {
        let _ = out.write_i16::<BigEndian>(delta);
        0
    }
}

fn f2dot14(raw: i16) -> f32 {
    raw as f32 / 16384.0
}

fn to_f2dot14(value: f32) -> i16 {
    (value * 16384.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn decode_composite(cursor: &mut Cursor<&[u8]>, bbox: [i16; 4]) -> Result<CompositeGlyph, MergeError> {
    let err = io_truncated(TableKind::Glyf);
    let mut components = Vec::new();
    let mut has_instructions = false;
    loop {
        let flags = cursor.read_u16::<BigEndian>().map_err(&err)?;
        let glyph = cursor.read_u16::<BigEndian>().map_err(&err)?;
        let (arg1, arg2) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (
                cursor.read_i16::<BigEndian>().map_err(&err)? as i32,
                cursor.read_i16::<BigEndian>().map_err(&err)? as i32,
            )
        } else if flags & ARGS_ARE_XY_VALUES != 0 {
            (
                cursor.read_i8().map_err(&err)? as i32,
                cursor.read_i8().map_err(&err)? as i32,
            )
        } else {
            (
                cursor.read_u8().map_err(&err)? as i32,
                cursor.read_u8().map_err(&err)? as i32,
            )
        };
        let anchor = if flags & ARGS_ARE_XY_VALUES != 0 {
            Anchor::Offset {
                dx: arg1 as i16,
                dy: arg2 as i16,
            }
        } else {
            Anchor::Points {
                parent: arg1 as u16,
                child: arg2 as u16,
            }
        };
        let mut read = || cursor.read_i16::<BigEndian>().map(f2dot14).map_err(&err);
        let transform = if flags & WE_HAVE_A_SCALE != 0 {
            let s = read()?;
            [s, 0.0, 0.0, s]
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            let sx = read()?;
            let sy = read()?;
            [sx, 0.0, 0.0, sy]
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            [read()?, read()?, read()?, read()?]
        } else {
            [1.0, 0.0, 0.0, 1.0]
        };
        has_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;
        components.push(Component {
            glyph,
            anchor,
            transform,
            flags: flags & PRESERVED_COMPONENT_FLAGS,
        });
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    let instructions = if has_instructions {
        let len = cursor.read_u16::<BigEndian>().map_err(&err)?;
        let mut instructions = vec![0u8; len as usize];
        cursor.read_exact(&mut instructions).map_err(&err)?;
        instructions
    } else {
        Vec::new()
    };
    Ok(CompositeGlyph {
        bbox,
        components,
        instructions,
    })
}

fn encode_composite(glyph: &CompositeGlyph) -> Vec<u8> {
    let mut data = Vec::new();
    let _ = data.write_i16::<BigEndian>(-1);
    for v in glyph.bbox {
        let _ = data.write_i16::<BigEndian>(v);
    }
    let count = glyph.components.len();
    for (i, component) in glyph.components.iter().enumerate() {
        let mut flags = component.flags & PRESERVED_COMPONENT_FLAGS;
        let (arg1, arg2, words) = match component.anchor {
            Anchor::Offset { dx, dy } => {
                flags |= ARGS_ARE_XY_VALUES;
                let fits = |v: i16| (i8::MIN as i16..=i8::MAX as i16).contains(&v);
                (dx as i32, dy as i32, !(fits(dx) && fits(dy)))
            }
            Anchor::Points { parent, child } => {
                (parent as i32, child as i32, parent > 0xFF || child > 0xFF)
            }
        };
        if words {
            flags |= ARG_1_AND_2_ARE_WORDS;
        }
        let [xx, xy, yx, yy] = component.transform;
        let transform: Vec<f32> = if xy != 0.0 || yx != 0.0 {
            flags |= WE_HAVE_A_TWO_BY_TWO;
            vec![xx, xy, yx, yy]
        } else if xx != yy {
            flags |= WE_HAVE_AN_X_AND_Y_SCALE;
            vec![xx, yy]
        } else if xx != 1.0 {
            flags |= WE_HAVE_A_SCALE;
            vec![xx]
        } else {
            Vec::new()
        };
        if i + 1 < count {
            flags |= MORE_COMPONENTS;
        } else if !glyph.instructions.is_empty() {
            flags |= WE_HAVE_INSTRUCTIONS;
        }
        let _ = data.write_u16::<BigEndian>(flags);
        let _ = data.write_u16::<BigEndian>(component.glyph);
        if words {
            let _ = data.write_i16::<BigEndian>(arg1 as i16);
            let _ = data.write_i16::<BigEndian>(arg2 as i16);
        } else {
            data.push(arg1 as u8);
            data.push(arg2 as u8);
        }
        for value in transform {
            let _ = data.write_i16::<BigEndian>(to_f2dot14(value));
        }
    }
    if !glyph.instructions.is_empty() {
        let _ = data.write_u16::<BigEndian>(glyph.instructions.len() as u16);
        data.extend_from_slice(&glyph.instructions);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: i16) -> SimpleGlyph {
        SimpleGlyph {
            contours: vec![vec![
                Point::new(0, 0, true),
                Point::new(size, 0, true),
                Point::new(size, size, true),
                Point::new(0, size, false),
            ]],
            instructions: vec![0xB0, 0x01],
        }
    }

    fn composite(children: &[(u16, i16)]) -> CompositeGlyph {
        CompositeGlyph {
            bbox: [0, 0, 500, 500],
            components: children
                .iter()
                .map(|&(glyph, dx)| Component {
                    glyph,
                    anchor: Anchor::Offset { dx, dy: 0 },
                    transform: [1.0, 0.0, 0.0, 1.0],
                    flags: 0,
                })
                .collect(),
            instructions: Vec::new(),
        }
    }

    #[test]
    fn test_simple_glyph_decodes_what_was_encoded() {
        let glyph = GlyphOutline::Simple(square(700));
        let decoded = GlyphOutline::decode(&glyph.encode()).unwrap();
        assert_eq!(decoded, glyph);
    }

    #[test]
    fn test_simple_glyph_header_has_bbox() {
        let record = GlyphOutline::Simple(square(300)).encode();
        assert_eq!(read_i16(&record, 0), Some(1));
        assert_eq!(read_i16(&record, 6), Some(300));
    }

    #[test]
    fn test_composite_with_large_offset_and_scale() {
        let mut glyph = composite(&[(1, 10), (2, 1000)]);
        glyph.components[1].transform = [0.5, 0.0, 0.0, 0.5];
        glyph.instructions = vec![1, 2, 3];
        let outline = GlyphOutline::Composite(glyph);
        assert_eq!(GlyphOutline::decode(&outline.encode()).unwrap(), outline);
    }

    #[test]
    fn test_composite_scale_keeps_transform() {
        let mut glyph = composite(&[(1, 100)]);
        glyph.components[0].transform = [0.75, 0.0, 0.0, 0.75];
        glyph.scale(2.0);
        assert_eq!(glyph.components[0].anchor, Anchor::Offset { dx: 200, dy: 0 });
        assert_eq!(glyph.components[0].transform, [0.75, 0.0, 0.0, 0.75]);
        assert_eq!(glyph.bbox, [0, 0, 1000, 1000]);
    }

    #[test]
    fn test_remap_components_in_place() {
        let mut record = GlyphOutline::Composite(composite(&[(1, 0), (2, 5)])).encode();
        let before = record.clone();
        remap_components(&mut record, |g| g + 10);
        assert_eq!(component_ids(&record), vec![11, 12]);
        assert_eq!(record.len(), before.len());
    }

    #[test]
    fn test_table_encode_and_closure() {
        let table = GlyphTable {
            glyphs: vec![
                Vec::new(),
                GlyphOutline::Simple(square(100)).encode(),
                GlyphOutline::Composite(composite(&[(1, 0)])).encode(),
                GlyphOutline::Composite(composite(&[(2, 0)])).encode(),
            ],
        };
        let (glyf, loca, format) = table.encode();
        let decoded = GlyphTable::decode(&glyf, &loca, 4, format).unwrap();
        assert_eq!(decoded.outline(1).unwrap(), table.outline(1).unwrap());
        assert_eq!(decoded.outline(0).unwrap(), GlyphOutline::Empty);
        assert_eq!(decoded.record(1).map(|r| r.len() % 4), Some(0));

        let closure = table.component_closure(&BTreeSet::from([3]));
        assert_eq!(closure, BTreeSet::from([1, 2, 3]));

        let profile = table.profile();
        assert_eq!(profile.max_points, 4);
        assert_eq!(profile.max_composite_points, 4);
        assert_eq!(profile.max_component_depth, 2);
    }

    #[test]
    fn test_loca_rejects_out_of_range_offsets() {
        let loca = LocaOffsets {
            offsets: vec![0, 40],
            format: 1,
        };
        assert!(GlyphTable::decode(&[0u8; 8], &loca.to_bytes(), 1, 1).is_err());
    }
}
