//! Title keys used to group song files

const ARTICLES: &[&str] = &["a", "an", "the"];

/// Unicode punctuation that song files pick up from word processors, with the
/// ASCII text it is folded to.
pub const ASCII_FOLDS: &[(char, &str)] = &[
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
    ('\u{00AB}', "\""),
    ('\u{00BB}', "\""),
];

/// Replaces every character listed in [`ASCII_FOLDS`] with its ASCII form.
pub fn fold_to_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match ASCII_FOLDS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Canonical grouping key of a song title or file stem.
///
/// A leading article is dropped, apostrophes and commas are removed and the
/// result is lowercased. Different titles mapping to the same key is how
/// versions of one song end up in the same row.
pub fn normalize(name: &str) -> String {
    let folded = fold_to_ascii(name);
    let mut words = folded.split_whitespace();

    let stripped = match words.next() {
        Some(first) if ARTICLES.iter().any(|a| first.eq_ignore_ascii_case(a)) => {
            words.collect::<Vec<_>>().join(" ")
        }
        _ => folded.clone(),
    };

    stripped
        .chars()
        .filter(|c| *c != '\'' && *c != ',')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_articles_are_dropped() {
        assert_eq!(normalize("The Wanderer"), "wanderer");
        assert_eq!(normalize("A Wanderer"), "wanderer");
        assert_eq!(normalize("an Wanderer"), "wanderer");
        assert_eq!(normalize("Wanderer"), "wanderer");
    }

    #[test]
    fn hyphenated_first_word_is_not_an_article() {
        assert_eq!(normalize("A-ha Take On Me"), "a-ha take on me");
    }

    #[test]
    fn article_only_in_the_middle_is_kept() {
        assert_eq!(normalize("Under the Boardwalk"), "under the boardwalk");
    }

    #[test]
    fn apostrophes_and_commas_are_removed() {
        assert_eq!(normalize("Don't Stop, Believin'"), "dont stop believin");
    }

    #[test]
    fn curly_apostrophes_fold_before_stripping() {
        assert_eq!(normalize("Don\u{2019}t Think Twice"), normalize("Don't Think Twice"));
    }

    #[test]
    fn empty_name_is_empty_key() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("The"), "");
    }

    #[test]
    fn fold_replaces_dashes_and_ellipsis() {
        assert_eq!(fold_to_ascii("Wait\u{2026} \u{2013} now"), "Wait... - now");
    }
}
