//! Arabic contextual forms without a shaping engine.
//!
//! [`reshape`] replaces each Arabic letter with its isolated, initial, medial or final
//! presentation form according to the joining behaviour of its neighbours, and turns
//! lam followed by an alef into the corresponding lam-alef ligature. Diacritics are
//! transparent: they neither join nor break a join, and they stay after their base letter.
//! The result is still in logical order.

const TATWEEL: char = '\u{0640}';
const LAM: char = '\u{0644}';

/// Presentation forms by letter: isolated, final, initial, medial (0 = form does not exist).
/// Letters without an initial form join only to the preceding letter.
const FORMS: &[(char, [u32; 4])] = &[
    ('\u{0621}', [0xFE80, 0, 0, 0]),
    ('\u{0622}', [0xFE81, 0xFE82, 0, 0]),
    ('\u{0623}', [0xFE83, 0xFE84, 0, 0]),
    ('\u{0624}', [0xFE85, 0xFE86, 0, 0]),
    ('\u{0625}', [0xFE87, 0xFE88, 0, 0]),
    ('\u{0626}', [0xFE89, 0xFE8A, 0xFE8B, 0xFE8C]),
    ('\u{0627}', [0xFE8D, 0xFE8E, 0, 0]),
    ('\u{0628}', [0xFE8F, 0xFE90, 0xFE91, 0xFE92]),
    ('\u{0629}', [0xFE93, 0xFE94, 0, 0]),
    ('\u{062A}', [0xFE95, 0xFE96, 0xFE97, 0xFE98]),
    ('\u{062B}', [0xFE99, 0xFE9A, 0xFE9B, 0xFE9C]),
    ('\u{062C}', [0xFE9D, 0xFE9E, 0xFE9F, 0xFEA0]),
    ('\u{062D}', [0xFEA1, 0xFEA2, 0xFEA3, 0xFEA4]),
    ('\u{062E}', [0xFEA5, 0xFEA6, 0xFEA7, 0xFEA8]),
    ('\u{062F}', [0xFEA9, 0xFEAA, 0, 0]),
    ('\u{0630}', [0xFEAB, 0xFEAC, 0, 0]),
    ('\u{0631}', [0xFEAD, 0xFEAE, 0, 0]),
    ('\u{0632}', [0xFEAF, 0xFEB0, 0, 0]),
    ('\u{0633}', [0xFEB1, 0xFEB2, 0xFEB3, 0xFEB4]),
    ('\u{0634}', [0xFEB5, 0xFEB6, 0xFEB7, 0xFEB8]),
    ('\u{0635}', [0xFEB9, 0xFEBA, 0xFEBB, 0xFEBC]),
    ('\u{0636}', [0xFEBD, 0xFEBE, 0xFEBF, 0xFEC0]),
    ('\u{0637}', [0xFEC1, 0xFEC2, 0xFEC3, 0xFEC4]),
    ('\u{0638}', [0xFEC5, 0xFEC6, 0xFEC7, 0xFEC8]),
    ('\u{0639}', [0xFEC9, 0xFECA, 0xFECB, 0xFECC]),
    ('\u{063A}', [0xFECD, 0xFECE, 0xFECF, 0xFED0]),
    ('\u{0640}', [0x0640, 0x0640, 0x0640, 0x0640]),
    ('\u{0641}', [0xFED1, 0xFED2, 0xFED3, 0xFED4]),
    ('\u{0642}', [0xFED5, 0xFED6, 0xFED7, 0xFED8]),
    ('\u{0643}', [0xFED9, 0xFEDA, 0xFEDB, 0xFEDC]),
    ('\u{0644}', [0xFEDD, 0xFEDE, 0xFEDF, 0xFEE0]),
    ('\u{0645}', [0xFEE1, 0xFEE2, 0xFEE3, 0xFEE4]),
    ('\u{0646}', [0xFEE5, 0xFEE6, 0xFEE7, 0xFEE8]),
    ('\u{0647}', [0xFEE9, 0xFEEA, 0xFEEB, 0xFEEC]),
    ('\u{0648}', [0xFEED, 0xFEEE, 0, 0]),
    ('\u{0649}', [0xFEEF, 0xFEF0, 0, 0]),
    ('\u{064A}', [0xFEF1, 0xFEF2, 0xFEF3, 0xFEF4]),
    ('\u{0671}', [0xFB50, 0xFB51, 0, 0]),
    ('\u{067E}', [0xFB56, 0xFB57, 0xFB58, 0xFB59]),
    ('\u{0686}', [0xFB7A, 0xFB7B, 0xFB7C, 0xFB7D]),
    ('\u{0698}', [0xFB8A, 0xFB8B, 0, 0]),
    ('\u{06A9}', [0xFB8E, 0xFB8F, 0xFB90, 0xFB91]),
    ('\u{06AF}', [0xFB92, 0xFB93, 0xFB94, 0xFB95]),
    ('\u{06CC}', [0xFBFC, 0xFBFD, 0xFBFE, 0xFBFF]),
];

/// Lam-alef ligatures by alef: isolated, final
const LAM_ALEF: &[(char, [u32; 2])] = &[
    ('\u{0622}', [0xFEF5, 0xFEF6]),
    ('\u{0623}', [0xFEF7, 0xFEF8]),
    ('\u{0625}', [0xFEF9, 0xFEFA]),
    ('\u{0627}', [0xFEFB, 0xFEFC]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Isolated,
    Final,
    Initial,
    Medial,
}

fn forms(c: char) -> Option<&'static [u32; 4]> {
    FORMS
        .binary_search_by_key(&c, |&(letter, _)| letter)
        .ok()
        .map(|i| &FORMS[i].1)
}

/// Combining marks that do not take part in joining
pub fn is_transparent(c: char) -> bool {
    matches!(c,
        '\u{0610}'..='\u{061A}'
        | '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06DC}'
        | '\u{06DF}'..='\u{06E4}'
        | '\u{06E7}'..='\u{06E8}'
        | '\u{06EA}'..='\u{06ED}')
}

/// True when `c` can connect to the letter before it
fn joins_backward(c: char) -> bool {
    forms(c).is_some_and(|f| f[1] != 0)
}

/// True when `c` can connect to the letter after it
fn joins_forward(c: char) -> bool {
    forms(c).is_some_and(|f| f[2] != 0)
}

fn lam_alef(alef: char) -> Option<&'static [u32; 2]> {
    LAM_ALEF
        .iter()
        .find(|&&(letter, _)| letter == alef)
        .map(|(_, forms)| forms)
}

fn form_char(c: char, form: Form) -> char {
    let Some(f) = forms(c) else {
        return c;
    };
    let code = match form {
        Form::Isolated => f[0],
        Form::Final => f[1],
        Form::Initial => f[2],
        Form::Medial => f[3],
    };
    char::from_u32(code).filter(|_| code != 0).unwrap_or(c)
}

/// Replaces Arabic letters in `text` by their contextual presentation forms
pub fn reshape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let neighbour = |from: usize, forward: bool| -> Option<usize> {
        let mut i = from;
        loop {
            if forward {
                i += 1;
                if i >= chars.len() {
                    return None;
                }
            } else {
                i = i.checked_sub(1)?;
            }
            if !is_transparent(chars[i]) {
                return Some(i);
            }
        }
    };

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if forms(c).is_none() {
            out.push(c);
            i += 1;
            continue;
        }
        let prev = neighbour(i, false).map(|p| chars[p]);
        let joined_before = prev.is_some_and(joins_forward) && joins_backward(c);

        let next_index = neighbour(i, true);
        if c == LAM {
            if let Some(ligature) = next_index.and_then(|n| lam_alef(chars[n])) {
                let code = if joined_before { ligature[1] } else { ligature[0] };
                out.extend(char::from_u32(code));
                let next = next_index.unwrap_or(i);
                // marks between lam and alef follow the ligature
                out.extend(chars[i + 1..next].iter());
                i = next + 1;
                continue;
            }
        }
        let joined_after = joins_forward(c) && next_index.is_some_and(|n| joins_backward(chars[n]));
        let form = match (joined_before, joined_after) {
            (true, true) => Form::Medial,
            (true, false) => Form::Final,
            (false, true) => Form::Initial,
            (false, false) => Form::Isolated,
        };
        out.push(form_char(c, form));
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forms_table_is_sorted() {
        assert!(FORMS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_three_letter_word() {
        // beh + seen + meem
        assert_eq!(reshape("\u{0628}\u{0633}\u{0645}"), "\u{FE91}\u{FEB4}\u{FEE2}");
    }

    #[test]
    fn test_right_joining_letter_breaks_the_word() {
        // dal + beh: dal joins only backward, so beh starts fresh
        assert_eq!(reshape("\u{0628}\u{062F}\u{0628}"), "\u{FE91}\u{FEAA}\u{FE8F}");
    }

    #[test]
    fn test_lam_alef_ligature() {
        assert_eq!(reshape("\u{0644}\u{0627}"), "\u{FEFB}");
        // after a joining letter the final ligature is used
        assert_eq!(reshape("\u{0643}\u{0644}\u{0627}"), "\u{FEDB}\u{FEFC}");
    }

    #[test]
    fn test_diacritics_are_transparent() {
        // beh + fatha + teh: beh still joins teh across the mark
        assert_eq!(reshape("\u{0628}\u{064E}\u{062A}"), "\u{FE91}\u{064E}\u{FE96}");
        assert_eq!(reshape("\u{0644}\u{064E}\u{0627}"), "\u{FEFB}\u{064E}");
    }

    #[test]
    fn test_tatweel_and_latin_pass_through() {
        assert_eq!(reshape("\u{0628}\u{0640}"), "\u{FE91}\u{0640}");
        assert_eq!(reshape("abc 123"), "abc 123");
        assert_eq!(reshape("\u{0628} \u{0628}"), "\u{FE8F} \u{FE8F}");
    }

    #[test]
    fn test_persian_letters() {
        // peh + gaf
        assert_eq!(reshape("\u{067E}\u{06AF}"), "\u{FB58}\u{FB93}");
    }
}
