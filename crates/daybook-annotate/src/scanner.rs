//! Reference extraction from markdown entry bodies.
//!
//! Finds `#tag` and `@person` references while skipping markdown constructs
//! that would produce false positives.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use daybook_core::defaults::MAX_REFERENCE_LEN;
use daybook_core::CatalogKind;

/// A sigil at start-of-text or after a character that is neither a word
/// character nor a hyphen, followed by a run of word characters/hyphens.
static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w-])([#@])([\w-]+)").expect("valid reference pattern"));

static FENCED_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?(?:```|\z)").expect("valid fenced code pattern"));

static INLINE_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`\n]+`").expect("valid inline code pattern"));

/// The `(target)` half of a markdown link.
static LINK_TARGET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\([^)\n]*\)").expect("valid link target pattern"));

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://|www\.)[^\s<>()\[\]]+").expect("valid url pattern")
});

/// One reference occurrence in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    pub kind: CatalogKind,
    /// Name without the sigil, case preserved.
    pub name: String,
    /// Byte offset of the sigil.
    pub start: usize,
    /// Byte offset one past the last name character.
    pub end: usize,
}

/// Scanner output: every accepted occurrence, plus the deduplicated names
/// of each kind in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub tokens: Vec<ReferenceToken>,
    pub tags: Vec<String>,
    pub people: Vec<String>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Extract tag and person references from entry text.
///
/// # Rules
///
/// 1. `#` starts a tag, `@` starts a person mention
/// 2. The name is one or more letters, digits, underscores, or hyphens
/// 3. A sigil directly after a word character or hyphen is not a reference
///    (`foo#bar`, `me@example.com`)
/// 4. Fenced code blocks, inline code, link targets, and URLs are skipped
/// 5. Names made only of `-`/`_`, or longer than 100 characters, are ignored
///    even though rule 2 matches them
/// 6. Names are deduplicated case-insensitively; the first spelling wins
///
/// Total over any input: malformed text yields no tokens, never an error.
///
/// # Examples
///
/// ```
/// use daybook_annotate::scan;
///
/// let result = scan("Lunch with @Jeremy about #work-plans");
/// assert_eq!(result.tags, vec!["work-plans"]);
/// assert_eq!(result.people, vec!["Jeremy"]);
/// ```
pub fn scan(text: &str) -> ScanResult {
    let masked = mask_non_prose(text);

    let mut result = ScanResult::default();
    let mut seen_tags = HashSet::new();
    let mut seen_people = HashSet::new();

    for cap in REFERENCE_PATTERN.captures_iter(&masked) {
        let (Some(sigil), Some(name)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let kind = if sigil.as_str() == "#" {
            CatalogKind::Tag
        } else {
            CatalogKind::Person
        };
        let name_str = &text[name.start()..name.end()];

        if !name_str.chars().any(char::is_alphanumeric) {
            continue;
        }
        if name_str.chars().count() > MAX_REFERENCE_LEN {
            trace!(
                subsystem = "annotate",
                component = "scanner",
                kind = %kind,
                len = name_str.len(),
                "Skipping over-long reference"
            );
            continue;
        }

        let (seen, names) = match kind {
            CatalogKind::Tag => (&mut seen_tags, &mut result.tags),
            CatalogKind::Person => (&mut seen_people, &mut result.people),
        };
        if seen.insert(name_str.to_lowercase()) {
            names.push(name_str.to_string());
        }

        result.tokens.push(ReferenceToken {
            kind,
            name: name_str.to_string(),
            start: sigil.start(),
            end: name.end(),
        });
    }

    result
}

/// Blank out code, link targets, and URLs with spaces of the same byte
/// length, so match offsets still index into the original text.
fn mask_non_prose(text: &str) -> String {
    let mut masked = text.to_string();
    for pattern in [
        &*FENCED_CODE_PATTERN,
        &*INLINE_CODE_PATTERN,
        &*LINK_TARGET_PATTERN,
        &*URL_PATTERN,
    ] {
        let ranges: Vec<(usize, usize)> = pattern
            .find_iter(&masked)
            .map(|m| (m.start(), m.end()))
            .collect();
        if ranges.is_empty() {
            continue;
        }
        let mut bytes = masked.into_bytes();
        for (start, end) in ranges {
            bytes[start..end].fill(b' ');
        }
        // Whole UTF-8 sequences are replaced by ASCII spaces.
        masked = String::from_utf8(bytes).unwrap_or_default();
    }
    masked
}
