//! Statement boundaries as seen by the executor.
//!
//! These are the descriptors a boundary detector hands to the synchronizer:
//! each statement's text, where it sits in the buffer, and which part of the
//! buffer the user is focused on.

mod splitter;

pub use splitter::StatementSplitter;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the editor buffer. Lines and columns are 1-based and
/// columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    pub fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    /// Parses `LINE:COLUMN`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (line, column) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid position: {s}. Expected LINE:COLUMN"))?;
        let line: u64 = line
            .trim()
            .parse()
            .map_err(|_| format!("Invalid line in position: {s}"))?;
        let column: u64 = column
            .trim()
            .parse()
            .map_err(|_| format!("Invalid column in position: {s}"))?;
        if line == 0 || column == 0 {
            return Err(format!("Position {s} is out of range, lines and columns start at 1"));
        }
        Ok(Self { line, column })
    }
}

/// Span of a statement in the buffer. `end` is the position just past the
/// statement's last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedLocation {
    pub start: Position,
    pub end: Position,
}

impl ParsedLocation {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns true if the position lies inside the statement, end inclusive,
    /// so a cursor resting right after the last character still counts.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// Returns true if the span shares at least one position with `[start, end]`.
    pub fn intersects(&self, start: Position, end: Position) -> bool {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.start <= end && start <= self.end
    }
}

/// One statement as produced by a boundary detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStatement {
    /// Statement text without the terminating semicolon or surrounding whitespace.
    pub statement: String,
    /// Where the statement sits in the buffer.
    pub location: ParsedLocation,
    /// First keyword or identifier of the statement (e.g. `SELECT`, `USE`).
    pub first_token: String,
    /// Database the detector already resolved for this statement, if any.
    #[serde(default)]
    pub database: Option<String>,
}

impl ParsedStatement {
    pub fn new(statement: impl Into<String>, location: ParsedLocation) -> Self {
        let statement = statement.into();
        let first_token = statement
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .find(|token| !token.is_empty())
            .unwrap_or_default()
            .to_string();
        Self {
            statement,
            location,
            first_token,
            database: None,
        }
    }

    /// Returns true for `USE <database>` statements.
    pub fn is_use(&self) -> bool {
        self.first_token.eq_ignore_ascii_case("use")
    }

    /// The database named by a `USE` statement, with quoting removed.
    pub fn used_database(&self) -> Option<String> {
        if !self.is_use() {
            return None;
        }
        let name = self
            .statement
            .split_whitespace()
            .nth(1)?
            .trim_matches(|c| c == '`' || c == '"' || c == '\'' || c == ';');
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Which statements the user wants to run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum SelectionMode {
    /// The statement under the cursor.
    #[default]
    Active,
    /// Every statement touched by a highlighted range.
    Range { start: Position, end: Position },
    /// The whole script.
    All,
}

/// Everything the synchronizer needs from a boundary detector.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatementDetails {
    /// Statements in textual order.
    pub statements: Vec<ParsedStatement>,
    /// Current cursor position, if the editor has focus.
    pub cursor: Option<Position>,
    /// Selection to resolve into the run set.
    pub selection: SelectionMode,
}

impl StatementDetails {
    pub fn new(statements: Vec<ParsedStatement>) -> Self {
        Self {
            statements,
            cursor: None,
            selection: SelectionMode::default(),
        }
    }

    pub fn with_cursor(mut self, cursor: Position) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    /// Index of the statement containing the cursor.
    pub fn active_index(&self) -> Option<usize> {
        let cursor = self.cursor?;
        self.statements
            .iter()
            .position(|statement| statement.location.contains(cursor))
    }

    /// Indices of the statements the selection resolves to, in textual order.
    pub fn selected_indices(&self) -> Vec<usize> {
        match self.selection {
            SelectionMode::All => (0..self.statements.len()).collect(),
            SelectionMode::Range { start, end } if start != end => self
                .statements
                .iter()
                .enumerate()
                .filter(|(_, statement)| statement.location.intersects(start, end))
                .map(|(index, _)| index)
                .collect(),
            SelectionMode::Range { .. } | SelectionMode::Active => {
                self.active_index().into_iter().collect()
            }
        }
    }
}
