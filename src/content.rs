//! Content descriptors and the registry of content plugins.
//!
//! A column's `content` list is made of [`ContentDescriptor`]s. Each one names a
//! plugin in the [`ContentRegistry`], either directly, through the array
//! shorthand for a dropdown, or with per-use option overrides. Plugins are
//! either terminal (they build a control) or aliases that rewrite the
//! descriptor into another one.

use std::collections::HashMap;
use std::fmt;
use std::rc::Weak;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::column_control::ColumnControl;
use crate::control::ControlRef;
use crate::domain::CCError;
use crate::plugins;

pub type Options = Map<String, Value>;

/// Plugin the array shorthand resolves to.
pub const SEQUENCE_PLUGIN: &str = "dropdown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentDescriptor {
    Named(String),
    Sequence(Vec<ContentDescriptor>),
    Extended(ExtendedContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedContent {
    pub extend: String,
    #[serde(flatten)]
    pub options: Options,
}

impl ContentDescriptor {
    pub fn named(name: &str) -> Self {
        ContentDescriptor::Named(name.to_string())
    }

    pub fn extended(name: &str, options: Options) -> Self {
        ContentDescriptor::Extended(ExtendedContent {
            extend: name.to_string(),
            options,
        })
    }

    /// Name of the plugin this descriptor asks for.
    pub fn plugin_name(&self) -> &str {
        match self {
            ContentDescriptor::Named(name) => name,
            ContentDescriptor::Sequence(_) => SEQUENCE_PLUGIN,
            ContentDescriptor::Extended(ext) => &ext.extend,
        }
    }
}

/// Receives activity updates from nested content, e.g. a dropdown button that
/// highlights itself while any search inside it is active.
pub trait Parent {
    fn active_list(&self, unique: u64, active: bool);
}

/// Resolved options handed to a plugin initializer. Parents are held weakly
/// since they own the controls they are handed to.
#[derive(Clone, Default)]
pub struct PluginConfig {
    pub options: Options,
    pub parents: Vec<Weak<dyn Parent>>,
}

impl PluginConfig {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            parents: Vec::new(),
        }
    }

    pub fn with_parents(mut self, parents: Vec<Weak<dyn Parent>>) -> Self {
        self.parents = parents;
        self
    }

    /// Read the options into a plugin's typed configuration.
    pub fn typed<T: DeserializeOwned>(&self, kind: &str) -> Result<T, CCError> {
        serde_json::from_value(Value::Object(self.options.clone())).map_err(|source| {
            CCError::InvalidConfig {
                kind: kind.to_string(),
                source,
            }
        })
    }

    pub fn mark_parents(&self, unique: u64, active: bool) {
        for parent in self.parents.iter().filter_map(Weak::upgrade) {
            parent.active_list(unique, active);
        }
    }
}

pub type InitFn = fn(&ColumnControl, &PluginConfig) -> Result<ControlRef, CCError>;

pub type ExtendFn = fn(&ColumnControl, &Options) -> ContentDescriptor;

#[derive(Clone, Copy)]
pub enum Behaviour {
    Terminal(InitFn),
    Alias(ExtendFn),
}

#[derive(Clone)]
pub struct PluginDescriptor {
    pub defaults: Options,
    pub behaviour: Behaviour,
}

impl PluginDescriptor {
    pub fn terminal(defaults: Options, init: InitFn) -> Self {
        Self {
            defaults,
            behaviour: Behaviour::Terminal(init),
        }
    }

    pub fn alias(defaults: Options, extend: ExtendFn) -> Self {
        Self {
            defaults,
            behaviour: Behaviour::Alias(extend),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.behaviour, Behaviour::Alias(_))
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("defaults", &self.defaults)
            .field("alias", &self.is_alias())
            .finish()
    }
}

/// Outcome of resolving a descriptor: a terminal plugin and its options.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub config: Options,
    pub kind: String,
    pub plugin: PluginDescriptor,
}

impl Resolved {
    pub fn init(&self) -> Option<InitFn> {
        match self.plugin.behaviour {
            Behaviour::Terminal(init) => Some(init),
            Behaviour::Alias(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    plugins: HashMap<String, PluginDescriptor>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the plugins shipped with the crate.
    pub fn builtin() -> Self {
        plugins::register_all(Self::new())
    }

    pub fn register(mut self, name: &str, plugin: PluginDescriptor) -> Self {
        self.plugins.insert(name.to_string(), plugin);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Turn a descriptor into a terminal plugin plus merged options, following
    /// alias plugins until a terminal one is reached. Visiting an alias twice
    /// is reported as a cycle.
    pub fn resolve(
        &self,
        ctx: &ColumnControl,
        content: &ContentDescriptor,
    ) -> Result<Resolved, CCError> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = content.clone();

        loop {
            let (kind, plugin, config) = self.merge(&current)?;

            match plugin.behaviour {
                Behaviour::Terminal(_) => {
                    debug!("Resolved content {} via {:?}", kind, chain);
                    return Ok(Resolved {
                        config,
                        kind,
                        plugin,
                    });
                }
                Behaviour::Alias(extend) => {
                    if chain.contains(&kind) {
                        chain.push(kind);
                        return Err(CCError::AliasCycle(chain));
                    }
                    chain.push(kind);
                    current = extend(ctx, &config);
                }
            }
        }
    }

    fn merge(
        &self,
        content: &ContentDescriptor,
    ) -> Result<(String, PluginDescriptor, Options), CCError> {
        let kind = content.plugin_name().to_string();
        let plugin = self
            .lookup(&kind)
            .cloned()
            .ok_or_else(|| CCError::UnknownContentType(kind.clone()))?;

        let mut config = plugin.defaults.clone();
        match content {
            ContentDescriptor::Named(_) => {}
            ContentDescriptor::Sequence(items) => {
                config.insert("content".to_string(), serde_json::to_value(items)?);
            }
            ContentDescriptor::Extended(ext) => {
                for (key, value) in ext.options.iter() {
                    config.insert(key.clone(), value.clone());
                }
            }
        }

        Ok((kind, plugin, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptors_deserialize_from_all_three_shapes() {
        let parsed: Vec<ContentDescriptor> =
            serde_json::from_value(json!(["search", ["searchText"], {"extend": "searchText", "title": "Find"}]))
                .unwrap();

        assert_eq!(parsed[0], ContentDescriptor::named("search"));
        assert_eq!(
            parsed[1],
            ContentDescriptor::Sequence(vec![ContentDescriptor::named("searchText")])
        );
        match &parsed[2] {
            ContentDescriptor::Extended(ext) => {
                assert_eq!(ext.extend, "searchText");
                assert_eq!(ext.options.get("title"), Some(&json!("Find")));
            }
            other => panic!("Unexpected descriptor {other:?}"),
        }
    }

    #[test]
    fn sequence_descriptors_ask_for_a_dropdown() {
        let seq = ContentDescriptor::Sequence(vec![]);
        assert_eq!(seq.plugin_name(), SEQUENCE_PLUGIN);
    }

    #[test]
    fn builtin_registry_knows_the_shipped_plugins() {
        let registry = ContentRegistry::builtin();
        for name in ["searchText", "search", "dropdown", "searchDropdown"] {
            assert!(registry.lookup(name).is_some(), "missing {name}");
        }
        assert!(registry.lookup("search").unwrap().is_alias());
        assert!(!registry.lookup("searchText").unwrap().is_alias());
        assert!(registry.lookup("colVis").is_none());
    }
}
