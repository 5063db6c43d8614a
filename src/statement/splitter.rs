//! Statement boundary detection.
//!
//! Uses the sqlparser-rs tokenizer to find top-level semicolons, so
//! semicolons inside string literals, quoted identifiers and comments never
//! split a statement.

use sqlparser::dialect::{dialect_from_str, Dialect, GenericDialect};
use sqlparser::tokenizer::{Location, Token, Tokenizer};

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result};

use super::{ParsedLocation, ParsedStatement, Position, SelectionMode, StatementDetails};

/// Splits a script into statements for the configured SQL dialect.
#[derive(Debug, Clone)]
pub struct StatementSplitter {
    dialect_name: String,
}

impl StatementSplitter {
    /// Creates a splitter for the named dialect (e.g. "postgresql", "hive").
    pub fn new(dialect: &str) -> Result<Self> {
        let dialect_name = dialect.trim().to_lowercase();
        if dialect_from_str(&dialect_name).is_none() {
            return Err(ExecutorError::config(format!(
                "Unknown SQL dialect '{dialect}'"
            )));
        }
        Ok(Self { dialect_name })
    }

    /// Creates a splitter for the connector dialect of an executor configuration.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        Self::new(&config.connector.dialect)
    }

    /// Returns the dialect name this splitter tokenizes with.
    pub fn dialect_name(&self) -> &str {
        &self.dialect_name
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        dialect_from_str(&self.dialect_name).unwrap_or_else(|| Box::new(GenericDialect {}))
    }

    /// Splits a script into statements in textual order.
    ///
    /// Segments that contain only whitespace or comments are skipped.
    pub fn split(&self, sql: &str) -> Result<Vec<ParsedStatement>> {
        let dialect = self.dialect();
        let tokens = Tokenizer::new(dialect.as_ref(), sql)
            .tokenize_with_location()
            .map_err(|e| ExecutorError::parse(e.to_string()))?;

        let index = SourceIndex::new(sql);
        let mut statements = Vec::new();
        // Char offsets of the current statement's first and last significant token.
        let mut current: Option<(usize, usize)> = None;

        for (i, token) in tokens.iter().enumerate() {
            match token.token {
                Token::SemiColon => {
                    if let Some(span) = current.take() {
                        statements.push(index.statement(span));
                    }
                }
                Token::Whitespace(_) | Token::EOF => {}
                _ => {
                    let start = index.offset(token.location);
                    let end = tokens
                        .get(i + 1)
                        .map(|next| index.offset(next.location))
                        .unwrap_or_else(|| index.char_len());
                    current = Some(match current {
                        Some((first, _)) => (first, end),
                        None => (start, end),
                    });
                }
            }
        }

        if let Some(span) = current {
            statements.push(index.statement(span));
        }

        Ok(statements)
    }

    /// Splits a script and attaches the cursor and selection.
    pub fn details(
        &self,
        sql: &str,
        cursor: Option<Position>,
        selection: SelectionMode,
    ) -> Result<StatementDetails> {
        Ok(StatementDetails {
            statements: self.split(sql)?,
            cursor,
            selection,
        })
    }
}

/// Maps tokenizer locations (line/column in chars) to offsets and back.
struct SourceIndex<'a> {
    sql: &'a str,
    /// Char offset at which each line starts.
    line_starts: Vec<usize>,
    /// Byte offset of each char, plus one trailing entry for the end.
    byte_offsets: Vec<usize>,
}

impl<'a> SourceIndex<'a> {
    fn new(sql: &'a str) -> Self {
        let mut line_starts = vec![0];
        let mut byte_offsets = Vec::with_capacity(sql.len() + 1);
        for (char_index, (byte_index, ch)) in sql.char_indices().enumerate() {
            byte_offsets.push(byte_index);
            if ch == '\n' {
                line_starts.push(char_index + 1);
            }
        }
        byte_offsets.push(sql.len());
        Self {
            sql,
            line_starts,
            byte_offsets,
        }
    }

    fn char_len(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    fn offset(&self, location: Location) -> usize {
        let line = (location.line.max(1) - 1) as usize;
        let column = (location.column.max(1) - 1) as usize;
        match self.line_starts.get(line) {
            Some(start) => (start + column).min(self.char_len()),
            None => self.char_len(),
        }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let line_start = self.line_starts[line - 1];
        Position::new(line as u64, (offset - line_start + 1) as u64)
    }

    fn statement(&self, (start, end): (usize, usize)) -> ParsedStatement {
        let text = &self.sql[self.byte_offsets[start]..self.byte_offsets[end]];
        ParsedStatement::new(
            text,
            ParsedLocation::new(self.position(start), self.position(end)),
        )
    }
}
