//! Minimal reading of ChordPro song sheets

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static CHORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());
static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{(?:title|t):\s*([^}]+)\}").unwrap());

/// Directive names that sometimes end up in square brackets by mistake
const NON_CHORDS: &[&str] = &["t:", "st:", "c:", "comment:", "title:", "subtitle:"];

/// Distinct inline chords of a song sheet, e.g. `[G7]`
pub fn distinct_chords(content: &str) -> BTreeSet<String> {
    CHORD_REGEX
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .filter(|chord| !chord.is_empty() && !chord.contains(' '))
        .filter(|chord| !NON_CHORDS.contains(&chord.to_lowercase().as_str()))
        .collect()
}

/// Value of the first `{title: ...}` or `{t: ...}` directive
pub fn title_directive(content: &str) -> Option<String> {
    TITLE_REGEX
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "{title: Jambalaya}\n{st: Hank Williams}\n\
        [C]Goodbye Joe, me gotta go, me oh [G7]my oh\n\
        He gotta go pole the pirogue down the [C]bayou\n\
        [c:] [C] [G7]\n";

    #[test]
    fn chords_are_deduplicated() {
        let chords = distinct_chords(SHEET);
        assert_eq!(chords.into_iter().collect::<Vec<_>>(), vec!["C", "G7"]);
    }

    #[test]
    fn bracketed_text_with_spaces_is_not_a_chord() {
        assert!(distinct_chords("[Chorus twice] [ ]").is_empty());
    }

    #[test]
    fn title_directive_long_and_short_form() {
        assert_eq!(title_directive(SHEET).as_deref(), Some("Jambalaya"));
        assert_eq!(title_directive("{T: Blue Moon }").as_deref(), Some("Blue Moon"));
        assert_eq!(title_directive("[C]no title here"), None);
    }
}
