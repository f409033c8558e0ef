use std::io::Error;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::host::Section;

/// Top level key of the state and request documents that column controls write into.
pub const STATE_NAMESPACE: &str = "columnControl";

/// Name of the fixed search slot column controls apply their filters to.
pub const FILTER_NAMESPACE: &str = "dtcc";

pub const HELP_TEXT: &str = "\
Type to edit the search of the focused column, <Enter> applies it.
<Up>/<Down>          change the search logic
<Ctrl-u>             clear the focused search
<Enter>/<Esc>        open / close a dropdown
<PgUp>/<PgDn>        switch between dropdown entries
<Tab>/<Shift-Tab>    focus next / previous column
<Ctrl-Left/Right>    move the focused column
<Ctrl-l>             send a search clear to the focused column
<F1>                 toggle this help
<Ctrl-c>             save state and quit";

#[derive(Debug, Error)]
pub enum CCError {
    #[error("Unknown ColumnControl content type: {0}")]
    UnknownContentType(String),
    #[error("ColumnControl content aliases form a cycle: {}", .0.join(" -> "))]
    AliasCycle(Vec<String>),
    #[error("Invalid ColumnControl target: {0}")]
    InvalidTarget(String),
    #[error("Column {column} has no {section} cell in row {row}")]
    MissingTarget {
        column: usize,
        section: Section,
        row: usize,
    },
    #[error("A search input needs at least one operator")]
    NoOperators,
    #[error("Invalid options for content type {kind}: {source}")]
    InvalidConfig {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("File not found")]
    FileNotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Unknown file type")]
    UnknownFileType,
    #[error(transparent)]
    IoError(#[from] Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    PolarsError(#[from] PolarsError),
}

#[derive(Debug, Clone)]
pub struct TableConfig {
    pub event_poll_time: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    NextColumn,
    PreviousColumn,
    MoveColumnLeft,
    MoveColumnRight,
    ClearColumn,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
