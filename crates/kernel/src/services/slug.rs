//! Slug generation for category and post codes.

use chrono::Utc;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

const MAX_SLUG_LEN: usize = 128;

/// Convert text into a URL-safe slug.
///
/// Folds diacritics to ASCII (`đ` becomes `d`), lowercases, replaces
/// everything else that is not alphanumeric with hyphens, collapses runs and
/// trims hyphens at both ends.
pub fn slugify(text: &str) -> String {
    let folded = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'đ' => 'd',
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        });

    let mut result = String::with_capacity(text.len());
    let mut prev_was_hyphen = true;
    for c in folded {
        if c == '-' {
            if !prev_was_hyphen {
                result.push('-');
            }
            prev_was_hyphen = true;
        } else {
            result.push(c);
            prev_was_hyphen = false;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    // ASCII only, so any byte index is a char boundary.
    if result.len() > MAX_SLUG_LEN {
        let truncated = &result[..MAX_SLUG_LEN];
        return match truncated.rfind('-') {
            Some(last_hyphen) => truncated[..last_hyphen].to_string(),
            None => truncated.to_string(),
        };
    }

    result
}

/// Code for a new record: the slug of `text`, or `{prefix}-{micros}` when
/// `text` has nothing slugifiable (emoji, CJK, punctuation only).
pub fn code_for(text: &str, prefix: &str) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        format!("{prefix}-{}", Utc::now().timestamp_micros())
    } else {
        slug
    }
}
