//! The narrow set of grid capabilities column controls rely on.
//!
//! Controls never own the grid. They subscribe to its lifecycle events and call
//! back into it through [`Host`], which keeps them testable against any grid
//! that implements the trait (see [`crate::grid::Grid`]).

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::control::CellRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Header,
    Footer,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Header => write!(f, "header"),
            Section::Footer => write!(f, "footer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ColumnsReordered,
    Destroy,
    StateSaveParams,
    StateLoaded,
    PreXhr,
    SearchClear,
}

/// Events emitted by the host. Document carrying events hand out the document so
/// listeners can annotate it in place.
#[derive(Debug)]
pub enum HostEvent<'a> {
    ColumnsReordered,
    Destroy,
    StateSaveParams(&'a mut Value),
    StateLoaded(&'a Value),
    PreXhr(&'a mut Value),
    SearchClear(usize),
}

impl HostEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::ColumnsReordered => EventKind::ColumnsReordered,
            HostEvent::Destroy => EventKind::Destroy,
            HostEvent::StateSaveParams(_) => EventKind::StateSaveParams,
            HostEvent::StateLoaded(_) => EventKind::StateLoaded,
            HostEvent::PreXhr(_) => EventKind::PreXhr,
            HostEvent::SearchClear(_) => EventKind::SearchClear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

pub type Handler = Rc<dyn Fn(&mut HostEvent<'_>)>;

pub type Predicate = Rc<dyn Fn(&str) -> bool>;

/// Content of a column's fixed search slot.
#[derive(Clone)]
pub enum ColumnFilter {
    /// Smart match: every whitespace separated word has to appear, ignoring case.
    Term(String),
    /// Custom match over the raw cell text.
    Predicate(Predicate),
}

impl ColumnFilter {
    /// An empty term filters nothing.
    pub fn is_set(&self) -> bool {
        match self {
            ColumnFilter::Term(term) => !term.is_empty(),
            ColumnFilter::Predicate(_) => true,
        }
    }

    pub fn matches(&self, haystack: &str) -> bool {
        match self {
            ColumnFilter::Term(term) => {
                let haystack = haystack.to_lowercase();
                term.to_lowercase()
                    .split_whitespace()
                    .all(|word| haystack.contains(word))
            }
            ColumnFilter::Predicate(predicate) => predicate(haystack),
        }
    }
}

impl fmt::Debug for ColumnFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnFilter::Term(term) => f.debug_tuple("Term").field(term).finish(),
            ColumnFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

pub trait Host {
    fn on(&self, kind: EventKind, handler: Handler) -> ListenerId;

    /// Removing an unknown listener is a no-op.
    fn off(&self, id: ListenerId);

    fn cell(&self, column: usize, section: Section, row: usize) -> Option<CellRef>;

    fn add_row_class(&self, section: Section, row: usize, class: &str);

    fn column_title(&self, column: usize) -> String;

    fn search_fixed(&self, column: usize, name: &str) -> Option<ColumnFilter>;

    fn set_search_fixed(&self, column: usize, name: &str, filter: ColumnFilter);

    /// Redraw the whole grid (`None`) or after a change to a single column.
    fn draw(&self, column: Option<usize>);

    /// Current position of the column that was created at `original`.
    fn transpose_from_original(&self, original: usize) -> usize;

    fn server_side(&self) -> bool;

    fn i18n(&self, key: &str, fallback: &str) -> String;

    /// State document the grid was initialised with, if any.
    fn state_loaded(&self) -> Option<Value>;
}
