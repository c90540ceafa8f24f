use std::fmt;
use std::path::{Path, PathBuf};
use std::str::Split;

use sqlpush_common::{Error, Result};

/// Lines starting with this prefix are dropped from the front of a statement.
pub const COMMENT_PREFIX: &str = "--";

/// The text of one migration file. Read once and never modified.
#[derive(Debug, Clone)]
pub struct MigrationScript {
    source: PathBuf,
    text: String,
}

impl MigrationScript {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_text(path, text))
    }

    pub fn from_text(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// A fresh pass over the statements. Each call starts from the top.
    pub fn statements(&self) -> Statements<'_> {
        split_statements(&self.text)
    }
}

/// Split `text` on every `;`.
///
/// This is a plain textual split, not a SQL tokenizer: a `;` inside a string
/// literal, a dollar-quoted body or a procedural block splits that statement
/// into invalid fragments. Migrations containing function bodies must be sent
/// whole (see `ExecutorOptions::whole_script_first`).
pub fn split_statements(text: &str) -> Statements<'_> {
    Statements {
        fragments: text.split(';'),
        ordinal: 0,
    }
}

/// Lazy iterator over the statements of a script.
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    fragments: Split<'a, char>,
    ordinal: usize,
}

impl<'a> Iterator for Statements<'a> {
    type Item = Statement<'a>;

    fn next(&mut self) -> Option<Statement<'a>> {
        for fragment in self.fragments.by_ref() {
            if let Some(body) = strip_leading_comments(fragment) {
                self.ordinal += 1;
                return Some(Statement {
                    ordinal: self.ordinal,
                    body,
                });
            }
        }
        None
    }
}

fn strip_leading_comments(fragment: &str) -> Option<&str> {
    let mut rest = fragment.trim();
    while rest.starts_with(COMMENT_PREFIX) {
        rest = match rest.find('\n') {
            Some(end) => rest[end + 1..].trim_start(),
            None => "",
        };
    }
    (!rest.is_empty()).then_some(rest)
}

/// One candidate statement, borrowed from its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement<'a> {
    ordinal: usize,
    body: &'a str,
}

impl<'a> Statement<'a> {
    /// 1-based position in the script.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Statement text without the terminating `;`.
    pub fn body(&self) -> &'a str {
        self.body
    }

    /// Statement text as sent to the server.
    pub fn sql(&self) -> String {
        format!("{};", self.body)
    }

    /// Upper-cased leading keyword, e.g. `CREATE`.
    pub fn kind(&self) -> String {
        let token = self
            .body
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_ascii_alphabetic());

        if token.is_empty() {
            return "UNKNOWN".to_string();
        }
        token.to_ascii_uppercase()
    }

    /// Single-line prefix of the statement for progress and error output.
    pub fn preview(&self, max_chars: usize) -> String {
        preview(self.body, max_chars)
    }
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.body)
    }
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqls(text: &str) -> Vec<String> {
        split_statements(text).map(|s| s.sql()).collect()
    }

    #[test]
    fn policy_example_yields_two_statements() {
        let text = "DROP POLICY x; -- comment\nCREATE POLICY y AS ...;";
        assert_eq!(sqls(text), vec!["DROP POLICY x;", "CREATE POLICY y AS ...;"]);
    }

    #[test]
    fn empty_and_comment_only_fragments_are_dropped() {
        let text = "\n;;  ;\n-- header only\n;\n-- a\n-- b\nSELECT 1;\n\n";
        assert_eq!(sqls(text), vec!["SELECT 1;"]);
        assert_eq!(split_statements("").count(), 0);
        assert_eq!(split_statements("-- nothing here").count(), 0);
    }

    #[test]
    fn last_statement_without_semicolon_is_kept() {
        assert_eq!(
            sqls("SELECT 1; SELECT 2"),
            vec!["SELECT 1;", "SELECT 2;"]
        );
    }

    #[test]
    fn ordinals_count_only_kept_statements() {
        let ordinals: Vec<usize> = split_statements("-- c\n; A; ; B;")
            .map(|s| s.ordinal())
            .collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[test]
    fn statements_are_restartable() {
        let script = MigrationScript::from_text("m.sql", "A; B; C;");
        assert_eq!(script.statements().count(), 3);
        let first: Vec<_> = script.statements().map(|s| s.body()).collect();
        assert_eq!(first, vec!["A", "B", "C"]);

        let mut iter = script.statements();
        iter.next();
        let resumed = iter.clone();
        assert_eq!(resumed.count(), 2);
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn rejoined_statements_cover_all_non_comment_content() {
        let text = "-- fix rls\nALTER TABLE t ENABLE ROW LEVEL SECURITY;\n\n\
                    DROP POLICY IF EXISTS p ON t;\n-- recreate\nCREATE POLICY p ON t\n  FOR SELECT USING (true);\n";
        let joined: String = split_statements(text).map(|s| s.to_string()).collect();
        for line in text.lines() {
            let line = line.trim().trim_end_matches(';');
            if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
                continue;
            }
            assert!(joined.contains(line), "missing {line:?} in {joined:?}");
        }
    }

    #[test]
    fn semicolon_inside_function_body_splits_naively() {
        let text = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN PERFORM 1; END $$ LANGUAGE plpgsql;";
        let parts = sqls(text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "CREATE FUNCTION f() RETURNS void AS $$ BEGIN PERFORM 1;");
    }

    #[test]
    fn kind_is_leading_keyword() {
        let stmt = split_statements("  create policy p on t").next().unwrap();
        assert_eq!(stmt.kind(), "CREATE");
        let stmt = split_statements("(SELECT 1)").next().unwrap();
        assert_eq!(stmt.kind(), "SELECT");
        let stmt = split_statements("123").next().unwrap();
        assert_eq!(stmt.kind(), "UNKNOWN");
    }

    #[test]
    fn preview_flattens_and_truncates() {
        let stmt = split_statements("CREATE POLICY\n   p ON t").next().unwrap();
        assert_eq!(stmt.preview(80), "CREATE POLICY p ON t");
        assert_eq!(stmt.preview(6), "CREATE...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = MigrationScript::read("/nonexistent/migration.sql").unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.to_string().starts_with("/nonexistent/migration.sql"));
    }

    #[test]
    fn reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001_init.sql");
        std::fs::write(&path, "CREATE TABLE a (id int);").unwrap();
        let script = MigrationScript::read(&path).unwrap();
        assert_eq!(script.source(), path.as_path());
        assert_eq!(script.statements().count(), 1);
    }
}
