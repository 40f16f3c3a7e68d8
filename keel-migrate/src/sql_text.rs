//! Quote-aware scanning of raw SQL text.
//!
//! Comment markers and delimiters inside `'...'`, `"..."` and `` `...` `` literals are
//! left alone. Doubled quotes (`'it''s'`) need no special handling: the scanner leaves
//! the literal and immediately re-enters it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Quoted(u8),
    LineComment,
    BlockComment,
}

/// Remove `--` line comments and `/* */` block comments outside quoted text.
///
/// Line comments keep their terminating newline; block comments become one space.
pub fn strip_comments(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut state = State::Code;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'-', Some(b'-')) => {
                    out.push_str(&sql[start..i]);
                    state = State::LineComment;
                    i += 2;
                    continue;
                }
                (b'/', Some(b'*')) => {
                    out.push_str(&sql[start..i]);
                    out.push(' ');
                    state = State::BlockComment;
                    i += 2;
                    continue;
                }
                (b'\'' | b'"' | b'`', _) => state = State::Quoted(b),
                _ => {}
            },
            State::Quoted(q) => {
                if b == q {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                    start = i;
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    i += 2;
                    start = i;
                    continue;
                }
            }
        }
        i += 1;
    }

    if matches!(state, State::Code | State::Quoted(_)) {
        out.push_str(&sql[start..]);
    }
    out
}

/// Split SQL text into statements on `delimiter`.
///
/// A word delimiter such as `GO` only counts when it stands alone on a line.
/// Symbol delimiters are matched anywhere outside quotes and comments. Pieces are
/// trimmed and empty pieces dropped.
pub fn split_statements(sql: &str, delimiter: &str) -> Vec<String> {
    let delimiter = delimiter.trim();
    if delimiter.is_empty() {
        return non_empty(vec![sql.to_string()]);
    }
    if delimiter.chars().all(|c| c.is_ascii_alphanumeric()) {
        return split_on_word_lines(sql, delimiter);
    }

    let bytes = sql.as_bytes();
    let delim = delimiter.as_bytes();
    let mut pieces = Vec::new();
    let mut state = State::Code;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => {
                if bytes[i..].starts_with(delim) {
                    pieces.push(sql[start..i].to_string());
                    i += delim.len();
                    start = i;
                    continue;
                }
                match (b, next) {
                    (b'-', Some(b'-')) => state = State::LineComment,
                    (b'/', Some(b'*')) => {
                        state = State::BlockComment;
                        i += 2;
                        continue;
                    }
                    (b'\'' | b'"' | b'`', _) => state = State::Quoted(b),
                    _ => {}
                }
            }
            State::Quoted(q) => {
                if b == q {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    pieces.push(sql[start..].to_string());

    non_empty(pieces)
}

/// Remove one trailing `delimiter` (after trailing whitespace), if present.
pub fn strip_trailing_delimiter<'a>(sql: &'a str, delimiter: &str) -> &'a str {
    let trimmed = sql.trim_end();
    let delimiter = delimiter.trim();
    if delimiter.is_empty() || trimmed.len() < delimiter.len() {
        return trimmed;
    }
    let split = trimmed.len() - delimiter.len();
    if !trimmed.is_char_boundary(split) {
        return trimmed;
    }
    let (head, tail) = trimmed.split_at(split);
    let is_word = delimiter.chars().all(|c| c.is_ascii_alphanumeric());
    if is_word && !head.is_empty() && !head.ends_with(char::is_whitespace) {
        return trimmed;
    }
    if tail.eq_ignore_ascii_case(delimiter) {
        head.trim_end()
    } else {
        trimmed
    }
}

fn split_on_word_lines(sql: &str, word: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for line in sql.lines() {
        if line.trim().eq_ignore_ascii_case(word) {
            pieces.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    pieces.push(current);
    non_empty(pieces)
}

fn non_empty(pieces: Vec<String>) -> Vec<String> {
    pieces
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_line_comments() {
        let sql = "SELECT 1; -- trailing\n-- whole line\nSELECT 2;";
        assert_eq!(strip_comments(sql), "SELECT 1; \n\nSELECT 2;");
    }

    #[test]
    fn test_strip_block_comments() {
        assert_eq!(strip_comments("SELECT/* hi */1"), "SELECT 1");
        assert_eq!(strip_comments("SELECT 1 /* never closed"), "SELECT 1  ");
    }

    #[test]
    fn test_comment_markers_inside_quotes_are_kept() {
        let sql = "INSERT INTO t VALUES ('--not a comment', \"/*x*/\")";
        assert_eq!(strip_comments(sql), sql);
        assert_eq!(strip_comments("SELECT 'it''s' -- c"), "SELECT 'it''s' ");
    }

    #[test]
    fn test_split_on_semicolon() {
        let sql = "CREATE TABLE a (id INT);\nINSERT INTO a VALUES (1);\n";
        assert_eq!(
            split_statements(sql, ";"),
            vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)"]
        );
    }

    #[test]
    fn test_split_ignores_quoted_and_commented_delimiters() {
        let sql = "INSERT INTO a VALUES ('x;y'); -- a;b\nSELECT 2";
        assert_eq!(
            split_statements(sql, ";"),
            vec!["INSERT INTO a VALUES ('x;y')", "-- a;b\nSELECT 2"]
        );
    }

    #[test]
    fn test_split_on_go_lines() {
        let sql = "CREATE PROCEDURE p AS SELECT 1\nGO\nEXEC p\ngo\n";
        assert_eq!(
            split_statements(sql, "GO"),
            vec!["CREATE PROCEDURE p AS SELECT 1", "EXEC p"]
        );
    }

    #[test]
    fn test_split_custom_symbol_delimiter() {
        assert_eq!(split_statements("a $$ b $$", "$$"), vec!["a", "b"]);
    }

    #[test]
    fn test_strip_trailing_delimiter() {
        assert_eq!(strip_trailing_delimiter("SELECT 1;  \n", ";"), "SELECT 1");
        assert_eq!(strip_trailing_delimiter("SELECT 1;;", ";"), "SELECT 1;");
        assert_eq!(strip_trailing_delimiter("EXEC p\ngo", "GO"), "EXEC p");
        assert_eq!(strip_trailing_delimiter("SELECT ego", "GO"), "SELECT ego");
        assert_eq!(strip_trailing_delimiter("SELECT 1", ";"), "SELECT 1");
    }
}
