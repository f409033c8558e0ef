use std::time::Duration;
use tracing::trace;

use crate::domain::{CCError, Message, TableConfig};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TableConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, _model: &Model) -> Result<Option<Message>, CCError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(Some(self.handle_key(key)));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// Viewer keys are mapped to messages, everything else goes to the focused column.
    pub fn handle_key(&self, key: event::KeyEvent) -> Message {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Message::Quit,
            (KeyCode::Char('l'), KeyModifiers::CONTROL) => Message::ClearColumn,
            (KeyCode::Left, KeyModifiers::CONTROL) => Message::MoveColumnLeft,
            (KeyCode::Right, KeyModifiers::CONTROL) => Message::MoveColumnRight,
            (KeyCode::Tab, _) => Message::NextColumn,
            (KeyCode::BackTab, _) => Message::PreviousColumn,
            (KeyCode::F(1), _) => Message::Help,
            _ => Message::RawKey(key),
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
