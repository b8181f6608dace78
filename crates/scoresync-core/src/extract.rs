//! Score and remark extraction from posted text.
//!
//! A score post is a keyword plus four `(name)(signed number)` pairs, with an
//! optional parenthesized comment attached to the keyword. The keyword may lead
//! or trail the pairs:
//!
//! ```text
//! KW name num name num name num name num
//! name num name num name num name num KW
//! KW(comment) name num name num name num name num
//! name num name num name num name num KW(comment)
//! ```
//!
//! Whitespace is insignificant. A name is one or more characters other than
//! ASCII digits, `(`, `)`, `+` and `-`; a number is one or more of `0-9+-` and
//! must additionally read as a single optionally signed integer.

use crate::models::{RemarkNote, SEATS, ScoreReport};

const FULLWIDTH_REPLACEMENTS: [(char, char); 5] = [
    ('\u{ff0b}', '+'),
    ('\u{2212}', '-'),
    ('\u{ff08}', '('),
    ('\u{ff09}', ')'),
    ('\u{2017}', '_'),
];

/// Grammars tried in declaration order; the first that matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGrammar {
    KeywordFirst,
    KeywordLast,
    KeywordCommentFirst,
    KeywordCommentLast,
}

impl ScoreGrammar {
    pub const ALL: [Self; 4] = [
        Self::KeywordFirst,
        Self::KeywordLast,
        Self::KeywordCommentFirst,
        Self::KeywordCommentLast,
    ];

    /// Splits normalized text into (pairs body, comment) for this grammar.
    fn split<'a>(self, text: &'a str, keyword: &str) -> Option<(&'a str, Option<&'a str>)> {
        match self {
            Self::KeywordFirst => text.strip_prefix(keyword).map(|body| (body, None)),
            Self::KeywordLast => text.strip_suffix(keyword).map(|body| (body, None)),
            Self::KeywordCommentFirst => {
                let rest = text.strip_prefix(keyword)?.strip_prefix('(')?;
                // Shortest non-empty comment: the closing paren may not be the first char.
                let close = rest.char_indices().skip(1).find(|(_, ch)| *ch == ')')?.0;
                Some((&rest[close + 1..], Some(&rest[..close])))
            }
            Self::KeywordCommentLast => {
                let inner = text.strip_suffix(')')?;
                let open = inner.find('(')?;
                let body = inner[..open].strip_suffix(keyword)?;
                let comment = &inner[open + 1..];
                if comment.is_empty() {
                    return None;
                }
                Some((body, Some(comment)))
            }
        }
    }

    #[must_use]
    pub fn parse(self, text: &str, keyword: &str) -> Option<ScoreReport> {
        let (body, comment) = self.split(text, keyword)?;
        let seats = parse_pairs(body)?;
        Some(ScoreReport {
            seats,
            comment: comment.map(ToString::to_string),
        })
    }
}

/// Extraction seam used by the collectors.
pub trait ReportParser {
    fn extract_score(&self, text: &str) -> Option<ScoreReport>;
    fn extract_remarks(&self, text: &str) -> Vec<RemarkNote>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordParser {
    pub keyword: String,
    pub remark_keyword: String,
}

impl KeywordParser {
    pub fn new(keyword: impl Into<String>, remark_keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            remark_keyword: remark_keyword.into(),
        }
    }
}

impl ReportParser for KeywordParser {
    fn extract_score(&self, text: &str) -> Option<ScoreReport> {
        extract_score(text, &self.keyword)
    }

    fn extract_remarks(&self, text: &str) -> Vec<RemarkNote> {
        extract_remarks(text, &self.remark_keyword)
    }
}

#[must_use]
pub fn extract_score(text: &str, keyword: &str) -> Option<ScoreReport> {
    let keyword = normalize(keyword);
    if keyword.is_empty() {
        return None;
    }
    let text = normalize(text);
    ScoreGrammar::ALL
        .iter()
        .find_map(|grammar| grammar.parse(&text, &keyword))
}

/// Text must start with `keyword`; the remaining tokens pair up as
/// `(name, note)` and an unpaired trailing token is dropped.
#[must_use]
pub fn extract_remarks(text: &str, keyword: &str) -> Vec<RemarkNote> {
    let Some(rest) = text.trim_start().strip_prefix(keyword) else {
        return Vec::new();
    };
    if keyword.is_empty() {
        return Vec::new();
    }
    let tokens = rest.split_whitespace().collect::<Vec<_>>();
    tokens
        .chunks_exact(2)
        .map(|pair| RemarkNote {
            name: pair[0].to_string(),
            note: pair[1].to_string(),
        })
        .collect()
}

/// Strict raw-score parser: an optional single sign followed by ASCII digits.
#[must_use]
pub fn parse_raw_score(raw: &str) -> Option<i64> {
    let digits = raw
        .strip_prefix('+')
        .or_else(|| raw.strip_prefix('-'))
        .unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude = digits.parse::<i64>().ok()?;
    if raw.starts_with('-') {
        Some(-magnitude)
    } else {
        Some(magnitude)
    }
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| {
            FULLWIDTH_REPLACEMENTS
                .iter()
                .find(|(from, _)| *from == ch)
                .map_or(ch, |(_, to)| *to)
        })
        .collect()
}

fn is_number_char(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '+' || ch == '-'
}

fn is_name_char(ch: char) -> bool {
    !is_number_char(ch) && ch != '(' && ch != ')'
}

fn parse_pairs(body: &str) -> Option<[(String, String); SEATS]> {
    let mut seats: Vec<(String, String)> = Vec::with_capacity(SEATS);
    let mut rest = body;
    for _ in 0..SEATS {
        let name_len = rest
            .char_indices()
            .find(|(_, ch)| !is_name_char(*ch))
            .map_or(rest.len(), |(idx, _)| idx);
        if name_len == 0 {
            return None;
        }
        let (name, after_name) = rest.split_at(name_len);
        let number_len = after_name
            .char_indices()
            .find(|(_, ch)| !is_number_char(*ch))
            .map_or(after_name.len(), |(idx, _)| idx);
        if number_len == 0 {
            return None;
        }
        let (number, after_number) = after_name.split_at(number_len);
        parse_raw_score(number)?;
        seats.push((name.to_string(), number.to_string()));
        rest = after_number;
    }
    if !rest.is_empty() {
        return None;
    }
    seats.try_into().ok()
}
