//! Statement classification.
//!
//! Backends report affected-row counts for every statement kind, but only `UPDATE` and
//! `DELETE` counts are surfaced in a [`QueryResult`](crate::results::QueryResult). The kind is
//! read from the statement text with the same lightweight scanner shape used for placeholder
//! handling: quoted strings, quoted identifiers, comments and dollar-quoted bodies are skipped.

/// Kind of the top-level command a statement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl CommandKind {
    /// Classify a statement by its leading keyword.
    ///
    /// `WITH` statements are classified by the first top-level data keyword following the
    /// common table expressions, so `WITH moved AS (...) DELETE FROM t ...` is a `Delete`.
    #[must_use]
    pub fn classify(sql: &str) -> CommandKind {
        let words = scan_words(sql);
        let mut iter = words.into_iter();
        let Some((first, _)) = iter.next() else {
            return CommandKind::Other;
        };
        if !first.eq_ignore_ascii_case("with") {
            return CommandKind::from_keyword(first);
        }
        iter.filter(|(_, depth)| *depth == 0)
            .map(|(word, _)| CommandKind::from_keyword(word))
            .find(|kind| *kind != CommandKind::Other)
            .unwrap_or(CommandKind::Other)
    }

    fn from_keyword(word: &str) -> CommandKind {
        if word.eq_ignore_ascii_case("select")
            || word.eq_ignore_ascii_case("values")
            || word.eq_ignore_ascii_case("table")
        {
            CommandKind::Select
        } else if word.eq_ignore_ascii_case("insert") || word.eq_ignore_ascii_case("replace") {
            CommandKind::Insert
        } else if word.eq_ignore_ascii_case("update") {
            CommandKind::Update
        } else if word.eq_ignore_ascii_case("delete") {
            CommandKind::Delete
        } else {
            CommandKind::Other
        }
    }

    /// Whether the affected-row count of this kind is reported to callers.
    #[must_use]
    pub fn reports_affected_rows(self) -> bool {
        matches!(self, CommandKind::Update | CommandKind::Delete)
    }
}

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Collect bare words outside of literals and comments, with their parenthesis depth.
fn scan_words(sql: &str) -> Vec<(&str, u32)> {
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut state = State::Normal;
    let mut depth: u32 = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b'$' => {
                    if let Some((tag, end)) = dollar_tag(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = end;
                    }
                }
                _ if b.is_ascii_alphabetic() || b == b'_' => {
                    let start = idx;
                    while idx < bytes.len()
                        && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_')
                    {
                        idx += 1;
                    }
                    words.push((&sql[start..idx], depth));
                    continue;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(level) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(level + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if level == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(level - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && bytes[idx..].starts_with(tag.as_bytes()) {
                    idx += tag.len();
                    state = State::Normal;
                    continue;
                }
            }
        }
        idx += 1;
    }

    words
}

/// Recognize `$$` or `$tag$` at `start`, returning the tag and the index of its closing `$`.
fn dollar_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    if bytes.get(idx).is_some_and(u8::is_ascii_digit) {
        // positional parameter like $1
        return None;
    }
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    if bytes.get(idx) == Some(&b'$') {
        let tag = String::from_utf8_lossy(&bytes[start..=idx]).into_owned();
        Some((tag, idx))
    } else {
        None
    }
}
