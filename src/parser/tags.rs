//! Directive tag grammar.
//!
//! Recognizes the four open tags (`<message>`, `<file ...>`, `<action ...>`,
//! `<plan>`) at arbitrary positions in streamed text, including tags that
//! are still being written at the end of the buffer.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Open tags longer than this are treated as prose, finished or not.
pub const MAX_OPEN_TAG_LEN: usize = 2048;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is valid")
});

/// Directive kinds, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Message,
    File,
    Action,
    Plan,
}

impl TagKind {
    /// All kinds in priority order.
    pub const ALL: [Self; 4] = [Self::Message, Self::File, Self::Action, Self::Plan];

    /// Tag name as written by the model.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::File => "file",
            Self::Action => "action",
            Self::Plan => "plan",
        }
    }

    /// Closing tag for this kind.
    #[must_use]
    pub fn close_tag(self) -> &'static str {
        match self {
            Self::Message => "</message>",
            Self::File => "</file>",
            Self::Action => "</action>",
            Self::Plan => "</plan>",
        }
    }

    fn required_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Message | Self::Plan => &[],
            Self::File => &["path"],
            Self::Action => &["module", "action"],
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully received open tag.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTag {
    pub kind: TagKind,
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset just past `>`.
    pub end: usize,
    attributes: HashMap<String, String>,
}

impl OpenTag {
    /// Attribute value, trimmed. Empty values read as absent.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Outcome of scanning for the earliest open tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagScan {
    /// A complete open tag.
    Complete(OpenTag),
    /// Text from `start` onward may still become an open tag.
    Pending { start: usize },
    /// No open tag can start anywhere in the text.
    NotFound,
}

enum Candidate {
    Tag(TagKind, usize, HashMap<String, String>),
    Incomplete,
    NotATag,
}

/// Find the earliest directive open tag in `text`.
///
/// A tag still being written at the end of `text` is reported as `Pending`.
#[must_use]
pub fn scan_open_tag(text: &str) -> TagScan {
    scan(text, true)
}

/// Find the earliest complete directive open tag once no more text will
/// arrive. Unfinished tags are prose, so this never returns `Pending`.
#[must_use]
pub fn scan_final(text: &str) -> TagScan {
    scan(text, false)
}

fn scan(text: &str, more_expected: bool) -> TagScan {
    for (start, _) in text.match_indices('<') {
        match classify(&text[start..]) {
            Candidate::Tag(kind, len, attributes) => {
                return TagScan::Complete(OpenTag {
                    kind,
                    start,
                    end: start + len,
                    attributes,
                });
            }
            Candidate::Incomplete if more_expected => return TagScan::Pending { start },
            Candidate::Incomplete | Candidate::NotATag => {}
        }
    }
    TagScan::NotFound
}

/// Classify the text starting at a `<`.
///
/// The verdict for a prefix never changes as more text arrives, except that
/// `Incomplete` may resolve either way.
fn classify(candidate: &str) -> Candidate {
    let rest = &candidate[1..];
    for kind in TagKind::ALL {
        let name = kind.name();
        if rest.len() < name.len() {
            if name.starts_with(rest) {
                return Candidate::Incomplete;
            }
            continue;
        }
        if !rest.starts_with(name) {
            continue;
        }

        let after_name = &rest[name.len()..];
        match after_name.chars().next() {
            None => return Candidate::Incomplete,
            Some(c) if c == '>' || c.is_whitespace() => {}
            // `<messages>`, `<filename>` and friends.
            Some(_) => continue,
        }

        return match scan_attribute_list(after_name) {
            AttributeScan::End(close) => {
                let len = 1 + name.len() + close + 1;
                if len > MAX_OPEN_TAG_LEN {
                    tracing::debug!(tag = name, len, "Open tag too long, treating as text");
                    return Candidate::NotATag;
                }
                match parse_attributes(kind, &after_name[..close]) {
                    Some(attributes) => Candidate::Tag(kind, len, attributes),
                    None => Candidate::NotATag,
                }
            }
            AttributeScan::Unfinished if candidate.len() > MAX_OPEN_TAG_LEN => {
                tracing::debug!(tag = name, "Unterminated open tag too long, treating as text");
                Candidate::NotATag
            }
            AttributeScan::Unfinished => Candidate::Incomplete,
            AttributeScan::Invalid => Candidate::NotATag,
        };
    }
    Candidate::NotATag
}

enum AttributeScan {
    /// Byte offset of the `>` ending the tag.
    End(usize),
    /// Still a valid prefix of an attribute list.
    Unfinished,
    Invalid,
}

#[derive(Clone, Copy)]
enum AttributeState {
    /// After the tag name or a value; needs whitespace or `>`.
    Separator,
    /// Between attributes.
    Gap,
    Name,
    AfterName,
    BeforeValue,
    Value(char),
}

/// Walk `(\s+name\s*=\s*("..."|'...'))*\s*>` up to the closing `>`.
///
/// Quoted values may contain `>` or `<` but not a line break.
fn scan_attribute_list(text: &str) -> AttributeScan {
    use AttributeState::{AfterName, BeforeValue, Gap, Name, Separator, Value};

    let mut state = Separator;
    for (i, c) in text.char_indices() {
        state = match (state, c) {
            (Separator | Gap, '>') => return AttributeScan::End(i),
            (Separator | Gap, c) if c.is_whitespace() => Gap,
            (Gap, c) if c.is_ascii_alphabetic() || c == '_' => Name,
            (Name, c) if c.is_alphanumeric() || c == '_' || c == '-' => Name,
            (Name | AfterName, c) if c.is_whitespace() => AfterName,
            (Name | AfterName, '=') => BeforeValue,
            (BeforeValue, c) if c.is_whitespace() => BeforeValue,
            (BeforeValue, '"' | '\'') => Value(c),
            (Value(q), c) if c == q => Separator,
            (Value(_), '\n') => return AttributeScan::Invalid,
            (Value(q), _) => Value(q),
            _ => return AttributeScan::Invalid,
        };
    }
    AttributeScan::Unfinished
}

fn parse_attributes(kind: TagKind, text: &str) -> Option<HashMap<String, String>> {
    let attributes: HashMap<String, String> = ATTRIBUTE
        .captures_iter(text)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_string(), value.to_string())
        })
        .collect();

    for required in kind.required_attributes() {
        let present = attributes
            .get(*required)
            .is_some_and(|value| !value.trim().is_empty());
        if !present {
            tracing::warn!(tag = %kind, attribute = required, "Directive missing required attribute");
            return None;
        }
    }
    Some(attributes)
}

/// Find `pattern` in `text` at or after byte offset `from`.
#[must_use]
pub fn find_from(text: &str, pattern: &str, from: usize) -> Option<usize> {
    let mut from = from.min(text.len());
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    text[from..].find(pattern).map(|index| from + index)
}

/// Length of the longest suffix of `text` that is a proper prefix of `pattern`.
///
/// Such a suffix may turn into `pattern` once more text arrives, so it must
/// not be reported as block content yet.
#[must_use]
pub fn partial_suffix_len(text: &str, pattern: &str) -> usize {
    let max = pattern.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| {
            let start = text.len() - n;
            text.is_char_boundary(start) && pattern.starts_with(&text[start..])
        })
        .unwrap_or(0)
}
