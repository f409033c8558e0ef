//! Search input shared by the search content plugins.
//!
//! The widget keeps an operator ("logic") and a term and forwards changes to a
//! filter callback. Three paths write to it: key input from the user, state
//! restored by the grid, and programmatic calls such as a search clear. The
//! callback only runs when the operator or the term differ from the pair it
//! saw last, and it is told whether the write came from a state restore so it
//! can skip redrawing.
//!
//! The widget also takes part in the grid's state saving and, for server side
//! grids, in building the outgoing request.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use derive_setters::Setters;
use ratatui::buffer::Buffer;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, trace, warn};

use crate::content::Options;
use crate::control::{Control, Destroy};
use crate::domain::{CCError, STATE_NAMESPACE};
use crate::host::{EventKind, Host, HostEvent, ListenerId};
use crate::icons::icon;
use crate::inputter::{InputResult, Inputter};

/// Operators that are active without a term.
const TERM_INDEPENDENT: [&str; 2] = ["empty", "notEmpty"];

pub type FilterCallback = Rc<dyn Fn(&str, &str, bool)>;
pub type ValueTransform = Rc<dyn Fn(&str) -> String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub label: String,
    pub value: String,
}

impl Operator {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Persisted per column under `columnControl.<idx>.searchInput`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub logic: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Configuration phase of a [`SearchInput`]. Nothing is attached to the grid
/// until [`SearchInputBuilder::build`].
#[derive(Setters)]
pub struct SearchInputBuilder {
    #[setters(skip)]
    operators: Vec<Operator>,
    #[setters(skip)]
    placeholder: String,
    #[setters(skip)]
    title: String,
    #[setters(skip)]
    title_attr: String,
    #[setters(skip)]
    clearable: bool,
    #[setters(skip)]
    classes: Vec<String>,
    #[setters(skip)]
    value_transform: Option<ValueTransform>,
    /// Merged into the request payload of server side grids.
    extra_server_data: Options,
    /// Widget kind written to saved state and request payloads.
    #[setters(into)]
    kind: String,
}

impl Default for SearchInputBuilder {
    fn default() -> Self {
        Self {
            operators: Vec::new(),
            placeholder: String::new(),
            title: String::new(),
            title_attr: String::new(),
            clearable: true,
            classes: vec!["dtcc-content".to_string(), "dtcc-search".to_string()],
            value_transform: None,
            extra_server_data: Map::new(),
            kind: "text".to_string(),
        }
    }
}

impl SearchInputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first operator is selected initially.
    pub fn operators(mut self, operators: Vec<Operator>) -> Self {
        self.operators = operators;
        self
    }

    /// `[title]` is replaced with the column title. Empty text keeps the previous value.
    pub fn placeholder(mut self, text: &str) -> Self {
        if !text.is_empty() {
            self.placeholder = text.to_string();
        }
        self
    }

    pub fn title(mut self, text: &str) -> Self {
        if !text.is_empty() {
            self.title = text.to_string();
        }
        self
    }

    pub fn title_attr(mut self, text: &str) -> Self {
        if !text.is_empty() {
            self.title_attr = text.to_string();
        }
        self
    }

    /// Removing the clear affordance cannot be undone.
    pub fn clearable(mut self, set: bool) -> Self {
        if !set {
            self.clearable = false;
        }
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.classes.push(name.to_string());
        self
    }

    /// Applied to the term only when building server side request payloads.
    pub fn value_transform(mut self, transform: impl Fn(&str) -> String + 'static) -> Self {
        self.value_transform = Some(Rc::new(transform));
        self
    }

    /// Validate the configuration and attach the widget to the grid.
    pub fn build(self, host: Rc<dyn Host>, idx: usize) -> Result<SearchInput, CCError> {
        let first = self.operators.first().ok_or(CCError::NoOperators)?;
        let column_title = host.column_title(idx);
        let fill = |template: &str| template.replacen("[title]", &column_title, 1);

        let state = SearchState {
            idx,
            original_idx: idx,
            operator: first.value.clone(),
            icon: icon(&first.value),
            term: String::new(),
            last_operator: None,
            last_term: None,
            loading: false,
            active: false,
            placeholder: fill(&self.placeholder),
            title: fill(&self.title),
            title_attr: fill(&self.title_attr),
            clearable: self.clearable,
            classes: self.classes,
            kind: self.kind,
            value_transform: self.value_transform,
            extra_server_data: self.extra_server_data,
            operators: self.operators,
            callback: None,
            listeners: Vec::new(),
            editor: Inputter::default(),
        };

        let input = SearchInput {
            shared: Rc::new(SearchShared {
                host,
                state: RefCell::new(state),
            }),
        };
        input.attach();
        debug!("Search input ready for column {idx}");
        Ok(input)
    }
}

struct SearchState {
    idx: usize,
    original_idx: usize,
    operators: Vec<Operator>,
    operator: String,
    term: String,
    last_operator: Option<String>,
    last_term: Option<String>,
    loading: bool,
    active: bool,
    icon: &'static str,
    placeholder: String,
    title: String,
    title_attr: String,
    clearable: bool,
    classes: Vec<String>,
    kind: String,
    value_transform: Option<ValueTransform>,
    extra_server_data: Options,
    callback: Option<FilterCallback>,
    listeners: Vec<ListenerId>,
    editor: Inputter,
}

struct SearchShared {
    host: Rc<dyn Host>,
    state: RefCell<SearchState>,
}

#[derive(Clone)]
pub struct SearchInput {
    shared: Rc<SearchShared>,
}

impl SearchInput {
    fn attach(&self) {
        let mut listeners = vec![
            self.listen(EventKind::StateSaveParams, |input, event| {
                if let HostEvent::StateSaveParams(doc) = event {
                    input.save_state(doc);
                }
            }),
            self.listen(EventKind::StateLoaded, |input, event| {
                if let HostEvent::StateLoaded(doc) = event {
                    input.load_state(doc);
                }
            }),
            self.listen(EventKind::ColumnsReordered, |input, _| input.remap()),
            self.listen(EventKind::SearchClear, |input, event| {
                if let HostEvent::SearchClear(column) = event {
                    input.external_clear(*column);
                }
            }),
        ];

        if self.shared.host.server_side() {
            listeners.push(self.listen(EventKind::PreXhr, |input, event| {
                if let HostEvent::PreXhr(doc) = event {
                    input.annotate_request(doc);
                }
            }));
        }

        self.shared.state.borrow_mut().listeners = listeners;
    }

    fn listen(
        &self,
        kind: EventKind,
        on_event: fn(&SearchInput, &mut HostEvent<'_>),
    ) -> ListenerId {
        let weak: Weak<SearchShared> = Rc::downgrade(&self.shared);
        self.shared.host.on(
            kind,
            Rc::new(move |event: &mut HostEvent<'_>| {
                if let Some(shared) = weak.upgrade() {
                    on_event(&SearchInput { shared }, event);
                }
            }),
        )
    }

    /// Install the filter callback. A saved state for this column is applied
    /// right away, so the callback sees restored values with `loading` set.
    pub fn register_filter_callback(
        &self,
        callback: impl Fn(&str, &str, bool) + 'static,
    ) -> &Self {
        self.shared.state.borrow_mut().callback = Some(Rc::new(callback));

        if let Some(state) = self.shared.host.state_loaded() {
            self.load_state(&state);
        }
        self
    }

    pub fn clear(&self) -> &Self {
        let first = self.shared.state.borrow().operators[0].value.clone();
        self.set_value(&first, "")
    }

    pub fn set_value(&self, operator: &str, term: &str) -> &Self {
        self.apply(operator, term);
        self.run_search();
        self
    }

    /// Refresh the active flag and notify the callback if the operator or the
    /// term changed since the last notification.
    pub fn run_search(&self) -> &Self {
        let dispatch = {
            let mut state = self.shared.state.borrow_mut();
            state.active =
                TERM_INDEPENDENT.contains(&state.operator.as_str()) || !state.term.is_empty();

            let changed = state.last_term.as_deref() != Some(state.term.as_str())
                || state.last_operator.as_deref() != Some(state.operator.as_str());

            match state.callback.clone() {
                Some(callback) if changed => {
                    state.last_term = Some(state.term.clone());
                    state.last_operator = Some(state.operator.clone());
                    Some((callback, state.operator.clone(), state.term.clone(), state.loading))
                }
                _ => None,
            }
        };

        if let Some((callback, operator, term, loading)) = dispatch {
            trace!("Search dispatch {operator} {term:?} (loading: {loading})");
            callback(&operator, &term, loading);
        }
        self
    }

    fn apply(&self, operator: &str, term: &str) {
        let mut state = self.shared.state.borrow_mut();
        let operator = if state.operators.iter().any(|o| o.value == operator) {
            operator.to_string()
        } else {
            warn!(
                "Unknown search logic {operator:?} for column {}, using {}",
                state.idx, state.operators[0].value
            );
            state.operators[0].value.clone()
        };

        state.icon = icon(&operator);
        state.operator = operator;
        state.term = term.to_string();
        state.editor.set(term);
    }

    fn load_state(&self, doc: &Value) {
        let (idx, loading) = {
            let state = self.shared.state.borrow();
            (state.idx, state.loading)
        };
        if loading {
            return;
        }

        let Some(record) = doc
            .get(STATE_NAMESPACE)
            .and_then(|cc| cc.get(idx.to_string()))
            .and_then(|column| column.get("searchInput"))
        else {
            return;
        };

        let record: SearchRecord = match serde_json::from_value(record.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring malformed search state for column {idx}: {e}");
                return;
            }
        };

        debug!("Restoring search state for column {idx}: {record:?}");
        self.shared.state.borrow_mut().loading = true;
        self.apply(&record.logic, &record.value);
        self.run_search();
        self.shared.state.borrow_mut().loading = false;
    }

    fn save_state(&self, doc: &mut Value) {
        let state = self.shared.state.borrow();
        let record = SearchRecord {
            logic: state.operator.clone(),
            kind: state.kind.clone(),
            value: state.term.clone(),
        };

        let Some(root) = doc.as_object_mut() else {
            warn!("State document is not an object, skipping column {}", state.idx);
            return;
        };
        let namespace = object_entry(root, STATE_NAMESPACE);
        let column = object_entry(namespace, &state.idx.to_string());
        column.insert("searchInput".to_string(), json!(record));
    }

    fn annotate_request(&self, doc: &mut Value) {
        let state = self.shared.state.borrow();

        let Some(column) = doc
            .get_mut("columns")
            .and_then(|columns| columns.get_mut(state.idx))
            .and_then(|column| column.as_object_mut())
        else {
            debug!("Column {} is not part of the request, skipping", state.idx);
            return;
        };

        let value = match &state.value_transform {
            Some(transform) => transform(&state.term),
            None => state.term.clone(),
        };

        let mut search = Map::new();
        search.insert("value".to_string(), Value::String(value));
        search.insert("logic".to_string(), Value::String(state.operator.clone()));
        search.insert("type".to_string(), Value::String(state.kind.clone()));
        for (key, value) in state.extra_server_data.iter() {
            search.insert(key.clone(), value.clone());
        }

        object_entry(column, STATE_NAMESPACE).insert("search".to_string(), Value::Object(search));
    }

    fn remap(&self) {
        let original = self.shared.state.borrow().original_idx;
        let idx = self.shared.host.transpose_from_original(original);
        trace!("Search input for original column {original} now at {idx}");
        self.shared.state.borrow_mut().idx = idx;
    }

    fn external_clear(&self, column: usize) {
        if column != self.idx() {
            return;
        }
        // Clearing through the grid api should not redraw on its own
        self.shared.state.borrow_mut().loading = true;
        self.clear();
        self.shared.state.borrow_mut().loading = false;
    }

    fn cycle_operator(&self, step: isize) {
        let (next, term) = {
            let state = self.shared.state.borrow();
            let count = state.operators.len() as isize;
            let current = state
                .operators
                .iter()
                .position(|o| o.value == state.operator)
                .unwrap_or(0) as isize;
            let next = (current + step).rem_euclid(count) as usize;
            (
                state.operators[next].value.clone(),
                state.editor.pending().to_string(),
            )
        };
        self.set_value(&next, &term);
    }

    pub fn idx(&self) -> usize {
        self.shared.state.borrow().idx
    }

    pub fn operator(&self) -> String {
        self.shared.state.borrow().operator.clone()
    }

    pub fn term(&self) -> String {
        self.shared.state.borrow().term.clone()
    }

    pub fn operators(&self) -> Vec<Operator> {
        self.shared.state.borrow().operators.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.borrow().active
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn is_clearable(&self) -> bool {
        self.shared.state.borrow().clearable
    }

    pub fn icon(&self) -> &'static str {
        self.shared.state.borrow().icon
    }

    pub fn placeholder(&self) -> String {
        self.shared.state.borrow().placeholder.clone()
    }

    pub fn title(&self) -> String {
        self.shared.state.borrow().title.clone()
    }

    pub fn title_attr(&self) -> String {
        self.shared.state.borrow().title_attr.clone()
    }

    pub fn classes(&self) -> Vec<String> {
        self.shared.state.borrow().classes.clone()
    }

    pub fn kind(&self) -> String {
        self.shared.state.borrow().kind.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.state.borrow().listeners.len()
    }
}

impl Destroy for SearchInput {
    fn destroy(&self) {
        let listeners = {
            let mut state = self.shared.state.borrow_mut();
            state.callback = None;
            std::mem::take(&mut state.listeners)
        };
        trace!("Removing {} search input listeners", listeners.len());
        for id in listeners {
            self.shared.host.off(id);
        }
    }
}

impl Control for SearchInput {
    fn name(&self) -> &'static str {
        "search"
    }

    fn height(&self) -> u16 {
        if self.shared.state.borrow().title.is_empty() {
            1
        } else {
            2
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer, focused: bool) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let state = self.shared.state.borrow();
        let mut y = area.y;
        let width = area.width as usize;

        if !state.title.is_empty() {
            buf.set_stringn(area.x, y, &state.title, width, Style::default().bold());
            y += 1;
            if y >= area.y + area.height {
                return;
            }
        }

        let icon_style = if state.active {
            Style::default().yellow().bold()
        } else {
            Style::default()
        };
        let (x, _) = buf.set_stringn(area.x, y, state.icon, width, icon_style);
        let x = x + 1;
        let right = area.x + area.width;
        if x >= right {
            return;
        }

        let clear_width = if state.clearable { 2 } else { 0 };
        let text_width = (right - x).saturating_sub(clear_width) as usize;
        let text = state.editor.pending();
        let (shown, style) = if text.is_empty() {
            (state.placeholder.as_str(), Style::default().dim())
        } else {
            (text, Style::default())
        };
        let style = if focused {
            style.add_modifier(Modifier::UNDERLINED)
        } else {
            style
        };
        buf.set_stringn(x, y, shown, text_width, style);

        if focused {
            let offset = u16::try_from(state.editor.curser_pos()).unwrap_or(u16::MAX);
            if offset < text_width as u16
                && let Some(cell) = buf.cell_mut((x + offset, y))
            {
                cell.set_style(Style::default().add_modifier(Modifier::REVERSED));
            }
        }

        if state.clearable && (state.active || state.editor.is_dirty()) {
            buf.set_stringn(right - 1, y, icon("x"), 1, Style::default());
        }
    }

    fn handle_key(&self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Up, _) => {
                self.cycle_operator(-1);
                true
            }
            (KeyCode::Down, _) => {
                self.cycle_operator(1);
                true
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                if self.is_clearable() {
                    self.clear();
                    true
                } else {
                    false
                }
            }
            _ => {
                let result = self.shared.state.borrow_mut().editor.read(key);
                match result {
                    InputResult::Committed(term) => {
                        self.shared.state.borrow_mut().term = term;
                        self.run_search();
                        true
                    }
                    InputResult::Edited | InputResult::Reverted => true,
                    InputResult::Ignored => false,
                }
            }
        }
    }
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made an object"),
    }
}
