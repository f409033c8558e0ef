use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Line editor backing a search input. Edits stay pending until committed.
#[derive(Default, Debug, Clone)]
pub struct Inputter {
    pending: String,
    committed: String,
    curser_pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputResult {
    /// The pending text changed, nothing to apply yet.
    Edited,
    /// Enter was pressed, the pending text is the new value.
    Committed(String),
    /// Esc restored the last committed value.
    Reverted,
    Ignored,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        let result = match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, KeyModifiers::NONE) => self.left(),
            (KeyCode::Right, KeyModifiers::NONE) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (kc, KeyModifiers::NONE | KeyModifiers::SHIFT) => self.key(kc),
            _ => InputResult::Ignored,
        };
        trace!("Input {key:?} => {result:?}");
        result
    }

    /// Replace both the pending and the committed text, e.g. on state restore.
    pub fn set(&mut self, s: &str) {
        self.pending = s.to_string();
        self.committed = s.to_string();
        self.curser_pos = self.pending.chars().count();
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_dirty(&self) -> bool {
        self.pending != self.committed
    }

    pub fn curser_pos(&self) -> usize {
        self.curser_pos
    }

    fn enter(&mut self) -> InputResult {
        self.committed = self.pending.clone();
        InputResult::Committed(self.committed.clone())
    }

    fn escape(&mut self) -> InputResult {
        if !self.is_dirty() {
            return InputResult::Ignored;
        }
        let committed = self.committed.clone();
        self.set(&committed);
        InputResult::Reverted
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos == 0 {
            return InputResult::Ignored;
        }
        self.curser_pos -= 1;
        let at = self.getbytepos();
        self.pending.remove(at);
        InputResult::Edited
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos >= self.pending.chars().count() {
            return InputResult::Ignored;
        }
        let at = self.getbytepos();
        self.pending.remove(at);
        InputResult::Edited
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        InputResult::Edited
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.pending.chars().count() {
            self.curser_pos += 1;
        }
        InputResult::Edited
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        InputResult::Edited
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.pending.chars().count();
        InputResult::Edited
    }

    fn key(&mut self, code: KeyCode) -> InputResult {
        match code.as_char() {
            Some(chr) => {
                let at = self.getbytepos();
                self.pending.insert(at, chr);
                self.curser_pos += 1;
                InputResult::Edited
            }
            None => InputResult::Ignored,
        }
    }

    fn getbytepos(&self) -> usize {
        self.pending
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut Inputter, code: KeyCode) -> InputResult {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn edits_stay_pending_until_enter() {
        let mut input = Inputter::default();
        press(&mut input, KeyCode::Char('a'));
        press(&mut input, KeyCode::Char('c'));
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Char('b'));
        assert_eq!(input.pending(), "abc");
        assert!(input.is_dirty());
        assert_eq!(
            press(&mut input, KeyCode::Enter),
            InputResult::Committed("abc".to_string())
        );
        assert!(!input.is_dirty());
    }

    #[test]
    fn escape_reverts_to_committed_text() {
        let mut input = Inputter::default();
        input.set("äb");
        press(&mut input, KeyCode::Backspace);
        assert_eq!(input.pending(), "ä");
        assert_eq!(press(&mut input, KeyCode::Esc), InputResult::Reverted);
        assert_eq!(input.pending(), "äb");
        assert_eq!(press(&mut input, KeyCode::Esc), InputResult::Ignored);
    }

    #[test]
    fn control_chords_are_ignored() {
        let mut input = Inputter::default();
        let result = input.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(result, InputResult::Ignored);
        assert_eq!(input.pending(), "");
    }
}
