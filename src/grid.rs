//! In memory grid implementing [`Host`].
//!
//! Column data is kept as strings, filtering works on a row mapping the same
//! way the viewer's table views do, and all lifecycle events are dispatched
//! synchronously to the registered listeners.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use derive_setters::Setters;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::control::{CellRef, HeaderCell};
use crate::host::{ColumnFilter, EventKind, Handler, Host, HostEvent, ListenerId, Section};

#[derive(Debug, Clone, Setters)]
#[setters(strip_option)]
pub struct GridOptions {
    pub header_rows: usize,
    pub footer_rows: usize,
    /// Filtering is left to a server, the grid only builds request documents.
    pub server_side: bool,
    /// State document the grid starts with.
    pub state: Option<Value>,
    pub translations: HashMap<String, String>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            header_rows: 1,
            footer_rows: 0,
            server_side: false,
            state: None,
            translations: HashMap::new(),
        }
    }
}

struct Column {
    /// Position when the grid was created.
    original_idx: usize,
    /// Position in the loaded data.
    source: usize,
    name: String,
    data: Vec<String>,
    header: Vec<CellRef>,
    footer: Vec<CellRef>,
    filters: BTreeMap<String, ColumnFilter>,
}

impl Column {
    fn matches(&self, row: usize) -> bool {
        let cell = self.data.get(row).map(String::as_str).unwrap_or("");
        self.filters.values().all(|f| f.matches(cell))
    }
}

pub struct Grid {
    options: GridOptions,
    columns: RefCell<Vec<Column>>,
    rows: RefCell<Vec<usize>>,
    nrows: usize,
    row_classes: RefCell<HashMap<(Section, usize), Vec<String>>>,
    listeners: RefCell<Vec<(ListenerId, EventKind, Handler)>>,
    next_listener: Cell<u64>,
    loaded_state: RefCell<Option<Value>>,
    last_request: RefCell<Option<Value>>,
    draws: Cell<usize>,
    destroyed: Cell<bool>,
}

impl Grid {
    /// Columns are given as `(title, values)`, all of the same length.
    pub fn new(columns: Vec<(String, Vec<String>)>, options: GridOptions) -> Self {
        let nrows = columns.iter().map(|(_, d)| d.len()).max().unwrap_or(0);
        let cells = |n: usize, title: Option<&str>| -> Vec<CellRef> {
            (0..n)
                .map(|row| {
                    let text = if row == 0 { title.unwrap_or("") } else { "" };
                    CellRef::new(RefCell::new(HeaderCell::new(text)))
                })
                .collect()
        };

        let mut columns: Vec<Option<(usize, (String, Vec<String>))>> =
            columns.into_iter().enumerate().map(Some).collect();
        let order = saved_order(options.state.as_ref(), columns.len())
            .unwrap_or_else(|| (0..columns.len()).collect());

        let columns = order
            .into_iter()
            .filter_map(|source| columns[source].take())
            .enumerate()
            .map(|(idx, (source, (name, data)))| Column {
                original_idx: idx,
                source,
                header: cells(options.header_rows, Some(&name)),
                footer: cells(options.footer_rows, None),
                name,
                data,
                filters: BTreeMap::new(),
            })
            .collect::<Vec<Column>>();
        debug!("Grid with {} columns and {} rows", columns.len(), nrows);

        Self {
            loaded_state: RefCell::new(options.state.clone()),
            options,
            columns: RefCell::new(columns),
            rows: RefCell::new((0..nrows).collect()),
            nrows,
            row_classes: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            last_request: RefCell::new(None),
            draws: Cell::new(0),
            destroyed: Cell::new(false),
        }
    }

    fn emit(&self, event: &mut HostEvent<'_>) {
        let kind = event.kind();
        // Handlers may register or remove listeners while running
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| h.clone())
            .collect();
        trace!("Emitting {:?} to {} listeners", kind, handlers.len());
        for handler in handlers {
            handler(event);
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.borrow().len()
    }

    pub fn row_count(&self) -> usize {
        self.nrows
    }

    pub fn column_titles(&self) -> Vec<String> {
        self.columns.borrow().iter().map(|c| c.name.clone()).collect()
    }

    /// Data indices of the rows passing all column filters, as of the last draw.
    pub fn visible_rows(&self) -> Vec<usize> {
        self.rows.borrow().clone()
    }

    pub fn cell_text(&self, row: usize, column: usize) -> String {
        self.columns
            .borrow()
            .get(column)
            .and_then(|c| c.data.get(row).cloned())
            .unwrap_or_default()
    }

    pub fn row_classes(&self, section: Section, row: usize) -> Vec<String> {
        self.row_classes
            .borrow()
            .get(&(section, row))
            .cloned()
            .unwrap_or_default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn draw_count(&self) -> usize {
        self.draws.get()
    }

    pub fn last_request(&self) -> Option<Value> {
        self.last_request.borrow().clone()
    }

    /// Move a column to a new position and notify listeners.
    pub fn move_column(&self, from: usize, to: usize) -> bool {
        {
            let mut columns = self.columns.borrow_mut();
            if from >= columns.len() || to >= columns.len() || from == to {
                return false;
            }
            let column = columns.remove(from);
            columns.insert(to, column);
        }
        debug!("Moved column {from} to {to}");
        self.emit(&mut HostEvent::ColumnsReordered);
        true
    }

    /// Build the state document, letting listeners annotate it.
    pub fn save_state(&self) -> Value {
        let order: Vec<usize> = self
            .columns
            .borrow()
            .iter()
            .map(|c| c.source)
            .collect();
        let mut doc = json!({ "order": order });
        self.emit(&mut HostEvent::StateSaveParams(&mut doc));
        doc
    }

    /// Apply a state document at runtime.
    pub fn load_state(&self, doc: Value) {
        self.emit(&mut HostEvent::StateLoaded(&doc));
        *self.loaded_state.borrow_mut() = Some(doc);
    }

    /// Build the document a server side grid would send for a draw.
    pub fn build_request(&self) -> Value {
        let columns: Vec<Value> = self
            .columns
            .borrow()
            .iter()
            .enumerate()
            .map(|(idx, c)| json!({ "data": idx, "name": c.name }))
            .collect();
        let mut doc = json!({ "draw": self.draws.get(), "columns": columns });
        self.emit(&mut HostEvent::PreXhr(&mut doc));
        *self.last_request.borrow_mut() = Some(doc.clone());
        doc
    }

    /// Ask the controls of a column to drop their search.
    pub fn search_clear(&self, column: usize) {
        self.emit(&mut HostEvent::SearchClear(column));
    }

    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.emit(&mut HostEvent::Destroy);
        self.listeners.borrow_mut().clear();
    }

    fn apply_filters(&self) {
        let columns = self.columns.borrow();
        let rows: Vec<usize> = (0..self.nrows)
            .filter(|&row| columns.iter().all(|c| c.matches(row)))
            .collect();
        trace!("Filtered {} of {} rows", rows.len(), self.nrows);
        *self.rows.borrow_mut() = rows;
    }
}

/// Column order of a state document, if it is a permutation of the columns.
fn saved_order(state: Option<&Value>, ncols: usize) -> Option<Vec<usize>> {
    let order: Vec<usize> = serde_json::from_value(state?.get("order")?.clone()).ok()?;
    let mut seen = vec![false; ncols];
    for &idx in order.iter() {
        if idx >= ncols || seen[idx] {
            return None;
        }
        seen[idx] = true;
    }
    (order.len() == ncols).then_some(order)
}

impl Host for Grid {
    fn on(&self, kind: EventKind, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, kind, handler));
        id
    }

    fn off(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(lid, _, _)| *lid != id);
    }

    fn cell(&self, column: usize, section: Section, row: usize) -> Option<CellRef> {
        let columns = self.columns.borrow();
        let column = columns.get(column)?;
        let cells = match section {
            Section::Header => &column.header,
            Section::Footer => &column.footer,
        };
        cells.get(row).cloned()
    }

    fn add_row_class(&self, section: Section, row: usize, class: &str) {
        let mut classes = self.row_classes.borrow_mut();
        let entry = classes.entry((section, row)).or_default();
        if !entry.iter().any(|c| c == class) {
            entry.push(class.to_string());
        }
    }

    fn column_title(&self, column: usize) -> String {
        self.columns
            .borrow()
            .get(column)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    fn search_fixed(&self, column: usize, name: &str) -> Option<ColumnFilter> {
        self.columns
            .borrow()
            .get(column)
            .and_then(|c| c.filters.get(name).cloned())
    }

    fn set_search_fixed(&self, column: usize, name: &str, filter: ColumnFilter) {
        let mut columns = self.columns.borrow_mut();
        let Some(column) = columns.get_mut(column) else {
            return;
        };
        if filter.is_set() {
            column.filters.insert(name.to_string(), filter);
        } else {
            column.filters.remove(name);
        }
    }

    fn draw(&self, column: Option<usize>) {
        self.draws.set(self.draws.get() + 1);
        trace!("Draw #{} (column {:?})", self.draws.get(), column);
        if self.options.server_side {
            self.build_request();
        } else {
            self.apply_filters();
        }
    }

    fn transpose_from_original(&self, original: usize) -> usize {
        self.columns
            .borrow()
            .iter()
            .position(|c| c.original_idx == original)
            .unwrap_or(original)
    }

    fn server_side(&self) -> bool {
        self.options.server_side
    }

    fn i18n(&self, key: &str, fallback: &str) -> String {
        self.options
            .translations
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn state_loaded(&self) -> Option<Value> {
        self.loaded_state.borrow().clone()
    }
}
