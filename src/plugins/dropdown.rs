use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use ratatui::buffer::Buffer;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::Rect;
use ratatui::style::Style;
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use super::options;
use crate::column_control::ColumnControl;
use crate::content::{ContentDescriptor, Options, Parent, PluginConfig, PluginDescriptor};
use crate::control::{Control, ControlRef, Destroy};
use crate::domain::CCError;
use crate::icons::icon;

pub const KIND: &str = "dropdown";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropdownConfig {
    pub content: Vec<ContentDescriptor>,
    pub icon: String,
    pub text: String,
    pub class_name: String,
}

impl Default for DropdownConfig {
    fn default() -> Self {
        Self {
            content: Vec::new(),
            icon: "menu".to_string(),
            text: String::new(),
            class_name: String::new(),
        }
    }
}

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::terminal(
        options(json!({
            "className": "",
            "content": [],
            "icon": "menu",
            "text": "",
        })),
        init,
    )
}

pub fn search_dropdown() -> PluginDescriptor {
    PluginDescriptor::alias(
        options(json!({
            "clear": true,
            "placeholder": "",
            "title": "",
            "titleAttr": "",
        })),
        extend_search_dropdown,
    )
}

/// A dropdown with the column's search in it.
fn extend_search_dropdown(ctx: &ColumnControl, config: &Options) -> ContentDescriptor {
    let text = ctx.dt().i18n("columnControl.searchDropdown", "Search");
    let mut dropdown = Options::new();
    dropdown.insert("icon".to_string(), json!("search"));
    dropdown.insert("text".to_string(), json!(text));
    dropdown.insert("className".to_string(), json!("searchDropdown"));
    dropdown.insert(
        "content".to_string(),
        json!([ContentDescriptor::extended("search", config.clone())]),
    );
    ContentDescriptor::extended(KIND, dropdown)
}

fn init(ctx: &ColumnControl, config: &PluginConfig) -> Result<ControlRef, CCError> {
    let opts: DropdownConfig = config.typed(KIND)?;
    let dropdown = Rc::new(Dropdown::new(&opts));
    ctx.destroy_add(dropdown.clone());

    let mut parents = config.parents.clone();
    let me: Weak<Dropdown> = Rc::downgrade(&dropdown);
    let me: Weak<dyn Parent> = me;
    parents.push(me);

    for item in opts.content.iter() {
        let child = ctx.build_content(item, parents.clone())?;
        dropdown.children.borrow_mut().push(child);
    }

    let control: ControlRef = dropdown;
    Ok(control)
}

/// Button that reveals nested content and highlights itself while any of it
/// is active.
pub struct Dropdown {
    icon: &'static str,
    text: String,
    class_name: String,
    children: RefCell<Vec<ControlRef>>,
    open: Cell<bool>,
    focus: Cell<usize>,
    active: RefCell<HashMap<u64, bool>>,
}

impl Dropdown {
    fn new(opts: &DropdownConfig) -> Self {
        Self {
            icon: icon(&opts.icon),
            text: opts.text.clone(),
            class_name: opts.class_name.clone(),
            children: RefCell::new(Vec::new()),
            open: Cell::new(false),
            focus: Cell::new(0),
            active: RefCell::new(HashMap::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.borrow().values().any(|a| *a)
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn children(&self) -> Vec<ControlRef> {
        self.children.borrow().clone()
    }

    fn focused_child(&self) -> Option<ControlRef> {
        self.children.borrow().get(self.focus.get()).cloned()
    }
}

impl Parent for Dropdown {
    fn active_list(&self, unique: u64, active: bool) {
        trace!("Dropdown {:?} active[{unique}] = {active}", self.text);
        self.active.borrow_mut().insert(unique, active);
    }
}

impl Destroy for Dropdown {
    fn destroy(&self) {
        self.open.set(false);
        self.active.borrow_mut().clear();
        self.children.borrow_mut().clear();
    }
}

impl Control for Dropdown {
    fn name(&self) -> &'static str {
        "dropdown"
    }

    fn height(&self) -> u16 {
        if self.open.get() {
            1 + self.children.borrow().iter().map(|c| c.height()).sum::<u16>()
        } else {
            1
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer, focused: bool) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let style = if self.is_active() {
            Style::default().yellow().bold()
        } else {
            Style::default()
        };
        let marker = icon(if self.open.get() { "chevronDown" } else { "chevronRight" });
        let label = format!("{} {} {}", self.icon, self.text, marker);
        buf.set_stringn(area.x, area.y, label, area.width as usize, style);

        if !self.open.get() {
            return;
        }
        let indent = 2.min(area.width);
        let bottom = area.y + area.height;
        let mut y = area.y + 1;
        for (i, child) in self.children.borrow().iter().enumerate() {
            if y >= bottom {
                break;
            }
            let height = child.height().min(bottom - y);
            let rect = Rect::new(area.x + indent, y, area.width - indent, height);
            child.render(rect, buf, focused && i == self.focus.get());
            y += height;
        }
    }

    fn handle_key(&self, key: KeyEvent) -> bool {
        if !self.open.get() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Down) {
                self.open.set(true);
                return true;
            }
            return false;
        }

        match key.code {
            KeyCode::PageDown => {
                let count = self.children.borrow().len().max(1);
                self.focus.set((self.focus.get() + 1) % count);
                true
            }
            KeyCode::PageUp => {
                let count = self.children.borrow().len().max(1);
                self.focus.set((self.focus.get() + count - 1) % count);
                true
            }
            _ => {
                if let Some(child) = self.focused_child()
                    && child.handle_key(key)
                {
                    return true;
                }
                if key.code == KeyCode::Esc {
                    self.open.set(false);
                    return true;
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    #[test]
    fn active_while_any_nested_content_is() {
        let dropdown = Dropdown::new(&DropdownConfig::default());
        assert!(!dropdown.is_active());
        dropdown.active_list(1, true);
        dropdown.active_list(2, false);
        assert!(dropdown.is_active());
        dropdown.active_list(1, false);
        assert!(!dropdown.is_active());
    }

    #[test]
    fn enter_opens_and_escape_closes() {
        let dropdown = Dropdown::new(&DropdownConfig::default());
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert!(!dropdown.handle_key(key(KeyCode::Esc)));
        assert!(dropdown.handle_key(key(KeyCode::Enter)));
        assert!(dropdown.is_open());
        assert!(dropdown.handle_key(key(KeyCode::PageDown)));
        assert!(dropdown.handle_key(key(KeyCode::Esc)));
        assert!(!dropdown.is_open());
        assert_eq!(dropdown.height(), 1);
    }
}
