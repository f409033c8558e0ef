use std::cell::RefCell;
use std::rc::Rc;

use ratatui::buffer::Buffer;
use ratatui::crossterm::event::KeyEvent;
use ratatui::layout::Rect;

/// A mounted UI element produced by a content plugin.
pub trait Control {
    fn name(&self) -> &'static str;

    fn render(&self, area: Rect, buf: &mut Buffer, focused: bool);

    /// Returns true when the key was consumed.
    fn handle_key(&self, key: KeyEvent) -> bool;

    /// Rows needed to render the control.
    fn height(&self) -> u16 {
        1
    }
}

pub type ControlRef = Rc<dyn Control>;

/// Anything registered into a column controller's destroy list.
pub trait Destroy {
    fn destroy(&self);
}

pub type DestroyRef = Rc<dyn Destroy>;

pub fn same_component(a: &DestroyRef, b: &DestroyRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Container a column controller creates inside its target cell.
pub struct Wrapper {
    class: String,
    children: RefCell<Vec<ControlRef>>,
}

impl Wrapper {
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            children: RefCell::new(Vec::new()),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn append(&self, control: ControlRef) {
        self.children.borrow_mut().push(control);
    }

    pub fn children(&self) -> Vec<ControlRef> {
        self.children.borrow().clone()
    }

    pub fn height(&self) -> u16 {
        self.children.borrow().iter().map(|c| c.height()).sum()
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, focused: bool) {
        let mut y = area.y;
        for child in self.children.borrow().iter() {
            let bottom = area.y + area.height;
            if y >= bottom {
                break;
            }
            let height = child.height().min(bottom - y);
            child.render(Rect::new(area.x, y, area.width, height), buf, focused);
            y += height;
        }
    }

    /// Offers the key to each child in order until one consumes it.
    pub fn handle_key(&self, key: KeyEvent) -> bool {
        self.children().iter().any(|c| c.handle_key(key))
    }
}

/// A header or footer cell of the grid.
#[derive(Default)]
pub struct HeaderCell {
    text: String,
    wrappers: Vec<Rc<Wrapper>>,
}

pub type CellRef = Rc<RefCell<HeaderCell>>;

impl HeaderCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            wrappers: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn append(&mut self, wrapper: Rc<Wrapper>) {
        self.wrappers.push(wrapper);
    }

    /// Detach a wrapper, returns false if it was not mounted here.
    pub fn remove(&mut self, wrapper: &Rc<Wrapper>) -> bool {
        let before = self.wrappers.len();
        self.wrappers.retain(|w| !Rc::ptr_eq(w, wrapper));
        before != self.wrappers.len()
    }

    pub fn wrappers(&self) -> &[Rc<Wrapper>] {
        &self.wrappers
    }

    pub fn height(&self) -> u16 {
        self.wrappers.iter().map(|w| w.height()).sum()
    }
}
