//! Line breaking and block placement for preview text.
//!
//! Wrapping and placement work on any [`TextMeasurer`], so they do not depend on how text
//! is shaped or rasterized. Right-to-left text is wrapped in logical order; turning each
//! committed line into visual order is left to the [`shaping::ShapingBackend`].

pub mod arabic;
pub mod shaping;

/// Writing direction of a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

/// Measures text at a fixed font size, in pixels
pub trait TextMeasurer {
    fn width(&self, text: &str, direction: Direction) -> f32;

    /// Height of one line of text
    fn line_height(&self) -> f32;
}

/// Greedy word wrap.
///
/// Words are added to the current line while it fits in `max_width`. A word that is
/// wider than `max_width` on its own is broken between characters; a single character
/// that does not fit still gets a line of its own, so wrapping always makes progress.
/// No line exceeds `max_width` by more than the width of one character.
pub fn wrap_lines(
    text: &str,
    max_width: f32,
    direction: Direction,
    measurer: &dyn TextMeasurer,
) -> Vec<String> {
    let fits = |candidate: &str| measurer.width(candidate, direction) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let trial = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&trial) {
            current = trial;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
            continue;
        }
        let mut part = String::new();
        for ch in word.chars() {
            let mut trial = part.clone();
            trial.push(ch);
            if fits(&trial) {
                part = trial;
            } else {
                if !part.is_empty() {
                    lines.push(std::mem::take(&mut part));
                }
                part.push(ch);
            }
        }
        current = part;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Which half of the canvas a block of lines occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Top,
    Bottom,
}

/// Smallest distance between a block and the top of its half
const MIN_BLOCK_TOP: f32 = 20.0;
/// The bottom block is raised by this much after centering
const BOTTOM_BLOCK_LIFT: f32 = 100.0;

/// A line with the position of its top-left corner on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// Centres `lines` horizontally and vertically within `half` of a `width` x `height` canvas.
///
/// Lines advance by the line height plus 20% of `font_size`.
pub fn place_block(
    lines: &[String],
    half: Half,
    canvas: (u32, u32),
    font_size: f32,
    direction: Direction,
    measurer: &dyn TextMeasurer,
) -> Vec<PlacedLine> {
    if lines.is_empty() {
        return Vec::new();
    }
    let width = canvas.0 as f32;
    let half_height = (canvas.1 / 2) as f32;
    let spacing = (font_size * 0.2).floor();
    let line_height = measurer.line_height();
    let block_height = lines.len() as f32 * line_height + (lines.len() - 1) as f32 * spacing;

    let mut top = ((half_height - block_height) / 2.0).floor().max(MIN_BLOCK_TOP);
    if half == Half::Bottom {
        top += half_height - BOTTOM_BLOCK_LIFT;
    }
    let mut placed = Vec::with_capacity(lines.len());
    let mut y = top;
    for line in lines {
        let line_width = measurer.width(line, direction);
        placed.push(PlacedLine {
            text: line.clone(),
            x: (width - line_width) / 2.0,
            y,
            width: line_width,
        });
        y += line_height + spacing;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 10 px wide, except 'W' at 35 px
    struct FixedWidth;

    impl TextMeasurer for FixedWidth {
        fn width(&self, text: &str, _direction: Direction) -> f32 {
            text.chars().map(|c| if c == 'W' { 35.0 } else { 10.0 }).sum()
        }

        fn line_height(&self) -> f32 {
            50.0
        }
    }

    #[test]
    fn test_words_are_kept_together() {
        let lines = wrap_lines("aaa bbb ccc", 75.0, Direction::LeftToRight, &FixedWidth);
        assert_eq!(lines, vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn test_long_word_breaks_between_characters() {
        let lines = wrap_lines("ab cdefghijkl m", 40.0, Direction::LeftToRight, &FixedWidth);
        assert_eq!(lines, vec!["ab", "cdef", "ghij", "kl m"]);
    }

    #[test]
    fn test_overflow_is_bounded_by_one_character() {
        let text = "The quick brown fox WWWW jumps over the lazy dog. 1234567890";
        for max_width in [20.0, 30.0, 60.0, 90.0, 200.0] {
            let lines = wrap_lines(text, max_width, Direction::LeftToRight, &FixedWidth);
            assert!(!lines.is_empty());
            for line in &lines {
                assert!(FixedWidth.width(line, Direction::LeftToRight) <= max_width + 35.0);
            }
            let rejoined: String = lines.concat().chars().filter(|c| *c != ' ').collect();
            let original: String = text.chars().filter(|c| *c != ' ').collect();
            assert_eq!(rejoined, original);
        }
    }

    #[test]
    fn test_character_wider_than_line_still_progresses() {
        let lines = wrap_lines("WW", 20.0, Direction::RightToLeft, &FixedWidth);
        assert_eq!(lines, vec!["W", "W"]);
    }

    #[test]
    fn test_blocks_are_centred_in_their_half() {
        let lines = vec!["aaaa".to_string(), "bb".to_string()];
        let top = place_block(&lines, Half::Top, (1000, 1000), 100.0, Direction::LeftToRight, &FixedWidth);
        // two 50 px lines with 20 px spacing
        assert_eq!(top[0].y, 190.0);
        assert_eq!(top[1].y, 260.0);
        assert_eq!(top[0].x, 480.0);
        assert_eq!(top[1].x, 490.0);

        let bottom = place_block(&lines, Half::Bottom, (1000, 1000), 100.0, Direction::RightToLeft, &FixedWidth);
        assert_eq!(bottom[0].y, 190.0 + 500.0 - 100.0);
    }

    #[test]
    fn test_tall_block_is_clamped_to_top_margin() {
        let lines: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let placed = place_block(&lines, Half::Top, (400, 400), 10.0, Direction::LeftToRight, &FixedWidth);
        assert_eq!(placed[0].y, 20.0);
    }
}
