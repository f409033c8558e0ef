use ratatui::crossterm::event::KeyEvent;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::column_control::{ColumnControl, ControlOptions};
use crate::content::{ContentDescriptor, ContentRegistry};
use crate::domain::{CCError, HELP_TEXT, Message};
use crate::grid::Grid;
use crate::host::Host;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    POPUP,
}

/// Which column controls to mount. `columns` replaces `controls` for the
/// listed column positions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub controls: Vec<ControlOptions>,
    pub columns: BTreeMap<usize, Vec<ControlOptions>>,
}

impl Layout {
    pub fn load(path: &Path) -> Result<Self, CCError> {
        let text = fs::read_to_string(path)?;
        let layout: Layout = serde_json::from_str(&text)?;
        debug!(
            "Layout with {} default controls and {} column overrides",
            layout.controls.len(),
            layout.columns.len()
        );
        Ok(layout)
    }

    pub fn for_column(&self, idx: usize) -> Vec<ControlOptions> {
        if let Some(controls) = self.columns.get(&idx) {
            return controls.clone();
        }
        if self.controls.is_empty() {
            vec![ControlOptions::default().content(vec![ContentDescriptor::named("searchText")])]
        } else {
            self.controls.clone()
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    name: String,
    grid: Rc<Grid>,
    controls: Vec<ColumnControl>,
    focus: usize,
    state_path: Option<PathBuf>,
    width: usize,
    height: usize,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    /// Mount the layout's column controls on every column of the grid.
    pub fn init(
        name: &str,
        grid: Rc<Grid>,
        registry: Rc<ContentRegistry>,
        layout: &Layout,
        state_path: Option<PathBuf>,
    ) -> Result<Self, CCError> {
        let host: Rc<dyn Host> = grid.clone();
        let mut controls = Vec::new();
        for idx in 0..grid.column_count() {
            for opts in layout.for_column(idx) {
                controls.push(ColumnControl::new(host.clone(), registry.clone(), idx, opts)?);
            }
        }
        // Restored searches are applied without drawing
        grid.draw(None);
        info!("Mounted {} column controls", controls.len());

        let mut model = Self {
            status: Status::READY,
            modus: Modus::TABLE,
            name: name.to_string(),
            grid,
            controls,
            focus: 0,
            state_path,
            width: 0,
            height: 0,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.update_status();
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn controls(&self) -> &[ColumnControl] {
        &self.controls
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn help_text(&self) -> &'static str {
        HELP_TEXT
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn update_status(&mut self) {
        let message = format!(
            "{} of {} rows, draw #{}",
            self.grid.visible_rows().len(),
            self.grid.row_count(),
            self.grid.draw_count()
        );
        self.set_status_message(message);
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), CCError> {
        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit()?,
                Message::Help => self.show_help(),
                Message::NextColumn => self.move_focus(1),
                Message::PreviousColumn => self.move_focus(-1),
                Message::MoveColumnLeft => self.move_column(-1),
                Message::MoveColumnRight => self.move_column(1),
                Message::ClearColumn => {
                    // Clearing never redraws on its own
                    self.grid.search_clear(self.focus);
                    self.grid.draw(Some(self.focus));
                    self.update_status();
                }
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::RawKey(key) => {
                    let consumed = self.raw_input(key);
                    trace!("Key {:?} consumed: {}", key.code, consumed);
                    self.update_status();
                }
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit()?,
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => self.modus = Modus::TABLE,
            },
        }
        Ok(())
    }

    /// Save the state document and tear the controls down.
    pub fn quit(&mut self) -> Result<(), CCError> {
        if let Some(path) = self.state_path.as_ref() {
            let state = self.grid.save_state();
            fs::write(path, serde_json::to_string_pretty(&state)?)?;
            info!("Saved state to {}", path.display());
        }
        self.grid.destroy();
        self.status = Status::QUITTING;
        Ok(())
    }

    fn show_help(&mut self) {
        self.modus = Modus::POPUP;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.width, width, self.height, height
        );
        self.width = width;
        self.height = height;
    }

    fn move_focus(&mut self, step: isize) {
        let ncols = self.grid.column_count();
        if ncols == 0 {
            return;
        }
        self.focus = (self.focus as isize + step).rem_euclid(ncols as isize) as usize;
        self.set_status_message(format!("Column {}", self.grid.column_title(self.focus)));
    }

    fn move_column(&mut self, step: isize) {
        let to = self.focus as isize + step;
        if to < 0 {
            return;
        }
        if self.grid.move_column(self.focus, to as usize) {
            self.focus = to as usize;
            self.set_status_message(format!(
                "Moved {} to position {}",
                self.grid.column_title(self.focus),
                self.focus
            ));
        }
    }

    /// Offer the key to the controls mounted on the focused column.
    fn raw_input(&mut self, key: KeyEvent) -> bool {
        self.controls
            .iter()
            .filter(|c| c.idx() == self.focus)
            .filter_map(|c| c.wrapper())
            .any(|wrapper| wrapper.handle_key(key))
    }
}
