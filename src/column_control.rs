//! Binds the declared content of one grid column into a header or footer cell.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::content::{ContentDescriptor, ContentRegistry, Parent, PluginConfig, Resolved};
use crate::control::{CellRef, ControlRef, DestroyRef, Wrapper, same_component};
use crate::domain::CCError;
use crate::host::{EventKind, Host, HostEvent, ListenerId, Section};

pub const WRAPPER_CLASS: &str = "dtcc";

/// Which cell of the column receives the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// Header row index.
    Row(usize),
    /// `"tfoot"`, `"tfoot:<row>"`, `"thead:<row>"`; anything else is header row 0.
    Selector(String),
}

impl Default for Target {
    fn default() -> Self {
        Target::Row(0)
    }
}

impl Target {
    pub fn locate(&self) -> Result<(Section, usize), CCError> {
        match self {
            Target::Row(row) => Ok((Section::Header, *row)),
            Target::Selector(selector) => {
                let mut parts = selector.split(':');
                let section = match parts.next() {
                    Some("tfoot") => Section::Footer,
                    _ => Section::Header,
                };
                let row = match parts.next().map(str::trim) {
                    None | Some("") => 0,
                    Some(row) => row
                        .parse::<usize>()
                        .map_err(|_| CCError::InvalidTarget(selector.clone()))?,
                };
                Ok((section, row))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassName {
    One(String),
    Many(Vec<String>),
}

impl Default for ClassName {
    fn default() -> Self {
        ClassName::One(String::new())
    }
}

impl ClassName {
    pub fn names(&self) -> Vec<&str> {
        let names: Vec<&str> = match self {
            ClassName::One(name) => name.split_whitespace().collect(),
            ClassName::Many(names) => names.iter().map(String::as_str).collect(),
        };
        names.into_iter().filter(|n| !n.is_empty()).collect()
    }
}

/// Options declared for a column. Unset fields fall back to [`ControlConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Setters)]
#[serde(rename_all = "camelCase", default)]
#[setters(strip_option)]
pub struct ControlOptions {
    pub class_name: Option<ClassName>,
    pub target: Option<Target>,
    pub content: Option<Vec<ContentDescriptor>>,
}

/// Effective configuration of a column controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlConfig {
    pub class_name: ClassName,
    pub target: Target,
    pub content: Option<Vec<ContentDescriptor>>,
}

impl ControlConfig {
    pub fn merge(mut self, opts: ControlOptions) -> Self {
        if let Some(class_name) = opts.class_name {
            self.class_name = class_name;
        }
        if let Some(target) = opts.target {
            self.target = target;
        }
        if opts.content.is_some() {
            self.content = opts.content;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Bound,
    Populated,
    Destroyed,
}

struct ControlInner {
    host: Rc<dyn Host>,
    registry: Rc<ContentRegistry>,
    config: ControlConfig,
    unique: u64,
    column_idx: Cell<usize>,
    original_idx: usize,
    target: RefCell<Option<CellRef>>,
    wrapper: RefCell<Option<Rc<Wrapper>>>,
    to_destroy: RefCell<Vec<DestroyRef>>,
    listeners: RefCell<Vec<ListenerId>>,
    lifecycle: Cell<Lifecycle>,
}

#[derive(Clone)]
pub struct ColumnControl {
    inner: Rc<ControlInner>,
}

/// Handle for closures that must not keep a controller alive.
#[derive(Clone)]
pub struct WeakColumnControl(Weak<ControlInner>);

impl WeakColumnControl {
    pub fn upgrade(&self) -> Option<ColumnControl> {
        self.0.upgrade().map(|inner| ColumnControl { inner })
    }
}

impl ColumnControl {
    pub fn new(
        host: Rc<dyn Host>,
        registry: Rc<ContentRegistry>,
        column_idx: usize,
        opts: ControlOptions,
    ) -> Result<Self, CCError> {
        let config = ControlConfig::default().merge(opts);
        let control = ColumnControl {
            inner: Rc::new(ControlInner {
                host,
                registry,
                config,
                unique: rand::random::<u64>(),
                column_idx: Cell::new(column_idx),
                original_idx: column_idx,
                target: RefCell::new(None),
                wrapper: RefCell::new(None),
                to_destroy: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                lifecycle: Cell::new(Lifecycle::Uninitialized),
            }),
        };

        let (section, row) = control.inner.config.target.locate()?;
        let target = control
            .inner
            .host
            .cell(column_idx, section, row)
            .ok_or(CCError::MissingTarget {
                column: column_idx,
                section,
                row,
            })?;
        *control.inner.target.borrow_mut() = Some(target.clone());
        control.inner.lifecycle.set(Lifecycle::Bound);

        for class in control.inner.config.class_name.names() {
            control.inner.host.add_row_class(section, row, class);
        }

        let content = control.inner.config.content.clone().unwrap_or_default();
        if !content.is_empty() {
            control.populate(&target, &content)?;
        }

        debug!(
            "Column control for column {} is {:?}",
            column_idx,
            control.state()
        );
        Ok(control)
    }

    fn populate(&self, target: &CellRef, content: &[ContentDescriptor]) -> Result<(), CCError> {
        // Remap before any plugin registers its own listeners
        let reorder = self.listen(EventKind::ColumnsReordered, |control| {
            let inner = &control.inner;
            let idx = inner.host.transpose_from_original(inner.original_idx);
            trace!("Column control {} moved to {}", inner.original_idx, idx);
            inner.column_idx.set(idx);
        });
        self.inner.listeners.borrow_mut().push(reorder);

        let wrapper = Rc::new(Wrapper::new(WRAPPER_CLASS));
        target.borrow_mut().append(wrapper.clone());
        *self.inner.wrapper.borrow_mut() = Some(wrapper.clone());

        for item in content {
            match self.build_content(item, Vec::new()) {
                Ok(control) => wrapper.append(control),
                Err(e) => {
                    self.teardown();
                    self.inner.lifecycle.set(Lifecycle::Bound);
                    return Err(e);
                }
            }
        }

        let destroy = self.listen(EventKind::Destroy, |control| control.teardown());
        self.inner.listeners.borrow_mut().push(destroy);
        self.inner.lifecycle.set(Lifecycle::Populated);
        Ok(())
    }

    fn listen(&self, kind: EventKind, on_event: fn(&ColumnControl)) -> ListenerId {
        let weak = self.downgrade();
        self.inner.host.on(
            kind,
            Rc::new(move |_: &mut HostEvent<'_>| {
                if let Some(control) = weak.upgrade() {
                    on_event(&control);
                }
            }),
        )
    }

    /// Tear down every registered child in registration order, then detach the wrapper.
    fn teardown(&self) {
        let children: Vec<DestroyRef> = std::mem::take(&mut *self.inner.to_destroy.borrow_mut());
        debug!(
            "Destroying {} components of column {}",
            children.len(),
            self.idx()
        );
        for child in children.iter() {
            child.destroy();
        }

        let wrapper = self.inner.wrapper.borrow_mut().take();
        if let (Some(wrapper), Some(target)) = (wrapper, self.inner.target.borrow().as_ref()) {
            target.borrow_mut().remove(&wrapper);
        }

        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for id in listeners {
            self.inner.host.off(id);
        }
        self.inner.lifecycle.set(Lifecycle::Destroyed);
    }

    /// Resolve a descriptor and run the plugin initializer. `parents` are the
    /// enclosing controls that want to know when this content becomes active.
    pub fn build_content(
        &self,
        content: &ContentDescriptor,
        parents: Vec<Weak<dyn Parent>>,
    ) -> Result<ControlRef, CCError> {
        let resolved = self.resolve(content)?;
        let init = resolved
            .init()
            .ok_or_else(|| CCError::UnknownContentType(resolved.kind.clone()))?;
        trace!("Initialising {} for column {}", resolved.kind, self.idx());
        init(self, &PluginConfig::new(resolved.config).with_parents(parents))
    }

    pub fn resolve(&self, content: &ContentDescriptor) -> Result<Resolved, CCError> {
        self.inner.registry.resolve(self, content)
    }

    /// Register a component for teardown when the grid is destroyed.
    pub fn destroy_add(&self, component: DestroyRef) {
        self.inner.to_destroy.borrow_mut().push(component);
    }

    /// Forget a component that was destroyed on its own.
    pub fn destroy_remove(&self, component: &DestroyRef) {
        let mut list = self.inner.to_destroy.borrow_mut();
        if let Some(pos) = list.iter().position(|c| same_component(c, component)) {
            list.remove(pos);
        }
    }

    pub fn dt(&self) -> Rc<dyn Host> {
        self.inner.host.clone()
    }

    pub fn idx(&self) -> usize {
        self.inner.column_idx.get()
    }

    pub fn original_idx(&self) -> usize {
        self.inner.original_idx
    }

    pub fn unique(&self) -> u64 {
        self.inner.unique
    }

    pub fn registry(&self) -> Rc<ContentRegistry> {
        self.inner.registry.clone()
    }

    pub fn state(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    pub fn target(&self) -> Option<CellRef> {
        self.inner.target.borrow().clone()
    }

    pub fn wrapper(&self) -> Option<Rc<Wrapper>> {
        self.inner.wrapper.borrow().clone()
    }

    pub fn pending_destroy(&self) -> usize {
        self.inner.to_destroy.borrow().len()
    }

    pub fn downgrade(&self) -> WeakColumnControl {
        WeakColumnControl(Rc::downgrade(&self.inner))
    }
}
