//! `?` → `$N` placeholder rewriting for the Postgres backend.
//!
//! Queries are authored with `?` placeholders. The rewrite skips
//! anything inside single-quoted string literals (including doubled `''`
//! escapes) and treats `??` as an escaped literal question mark.

/// Rewrite a SQLite-flavoured statement for Postgres.
pub fn rewrite(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    let mut n = 0u32;

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                // A doubled quote inside a literal is an escape, not a
                // terminator.
                if in_string && chars.peek() == Some(&'\'') {
                    out.push('\'');
                    out.push(chars.next().unwrap());
                    continue;
                }
                in_string = !in_string;
                out.push('\'');
            }
            '?' if !in_string => {
                if chars.peek() == Some(&'?') {
                    chars.next();
                    out.push('?');
                } else {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Count the bindable placeholders in a statement (same quoting rules).
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                if in_string && chars.peek() == Some(&'\'') {
                    chars.next();
                    continue;
                }
                in_string = !in_string;
            }
            '?' if !in_string => {
                if chars.peek() == Some(&'?') {
                    chars.next();
                } else {
                    count += 1;
                }
            }
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbers_sequentially() {
        assert_eq!(
            rewrite("SELECT * FROM t WHERE a = ? AND b = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn skips_string_literals() {
        assert_eq!(
            rewrite("SELECT '?' , x FROM t WHERE y = ?"),
            "SELECT '?' , x FROM t WHERE y = $1"
        );
    }

    #[test]
    fn honours_doubled_quote_escape() {
        assert_eq!(
            rewrite("SELECT 'it''s ?' FROM t WHERE y = ?"),
            "SELECT 'it''s ?' FROM t WHERE y = $1"
        );
    }

    #[test]
    fn doubled_question_mark_is_literal() {
        assert_eq!(
            rewrite("SELECT a ?? b FROM t WHERE y = ?"),
            "SELECT a ? b FROM t WHERE y = $1"
        );
    }

    #[test]
    fn counts_match_rewrite() {
        let sql = "INSERT INTO t (a, b, c) VALUES (?, ?, ?)";
        assert_eq!(count_placeholders(sql), 3);
        assert!(rewrite(sql).contains("$3"));
    }

    proptest! {
        /// The rewrite introduces exactly one `$N` per counted
        /// placeholder and never touches literal content.
        #[test]
        fn placeholder_count_is_preserved(sql in "[a-z '?=,()]{0,80}") {
            let rewritten = rewrite(&sql);
            let dollars = rewritten.matches('$').count();
            prop_assert_eq!(dollars, count_placeholders(&sql));
        }
    }
}
