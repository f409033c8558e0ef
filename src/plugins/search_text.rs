use std::rc::Rc;

use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use super::options;
use crate::column_control::ColumnControl;
use crate::content::{ContentDescriptor, Options, PluginConfig, PluginDescriptor};
use crate::control::ControlRef;
use crate::domain::{CCError, FILTER_NAMESPACE};
use crate::host::ColumnFilter;
use crate::search_input::{Operator, SearchInputBuilder};

pub const KIND: &str = "searchText";

const I18N_BASE: &str = "columnControl.search.text.";

const OPERATORS: [(&str, &str); 10] = [
    ("contains", "Contains"),
    ("notContains", "Does not contain"),
    ("equal", "Equals"),
    ("notEqual", "Does not equal"),
    ("starts", "Starts"),
    ("notStarts", "Does not start"),
    ("ends", "Ends"),
    ("notEnds", "Does not end"),
    ("empty", "Empty"),
    ("notEmpty", "Not empty"),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchTextConfig {
    /// Show the clear affordance.
    pub clear: bool,
    pub placeholder: String,
    /// Shown above the input, `[title]` is replaced by the column title.
    pub title: String,
    pub title_attr: String,
}

impl Default for SearchTextConfig {
    fn default() -> Self {
        Self {
            clear: true,
            placeholder: String::new(),
            title: String::new(),
            title_attr: String::new(),
        }
    }
}

pub fn defaults() -> Options {
    options(json!({
        "clear": true,
        "placeholder": "",
        "title": "",
        "titleAttr": "",
    }))
}

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::terminal(defaults(), init)
}

/// `search` picks the search flavour for a column. Columns only hold text here.
pub fn search_alias() -> PluginDescriptor {
    PluginDescriptor::alias(Options::new(), extend_search)
}

fn extend_search(_ctx: &ColumnControl, config: &Options) -> ContentDescriptor {
    ContentDescriptor::extended(KIND, config.clone())
}

fn init(ctx: &ColumnControl, config: &PluginConfig) -> Result<ControlRef, CCError> {
    let opts: SearchTextConfig = config.typed(KIND)?;
    let dt = ctx.dt();

    let operators = OPERATORS
        .iter()
        .map(|(value, label)| Operator::new(dt.i18n(&format!("{I18N_BASE}{value}"), label), *value))
        .collect();

    let input = Rc::new(
        SearchInputBuilder::new()
            .class("dtcc-searchText")
            .clearable(opts.clear)
            .placeholder(&opts.placeholder)
            .title(&opts.title)
            .title_attr(&opts.title_attr)
            .operators(operators)
            .build(dt, ctx.idx())?,
    );

    let weak = ctx.downgrade();
    let plugin_config = config.clone();
    input.register_filter_callback(move |logic, term, loading| {
        if let Some(ctx) = weak.upgrade() {
            apply_search(&ctx, &plugin_config, logic, term, loading);
        }
    });

    ctx.destroy_add(input.clone());
    let control: ControlRef = input;
    Ok(control)
}

fn predicate(f: impl Fn(&str) -> bool + 'static) -> Option<ColumnFilter> {
    Some(ColumnFilter::Predicate(Rc::new(f)))
}

fn apply_search(ctx: &ColumnControl, config: &PluginConfig, logic: &str, term: &str, loading: bool) {
    let dt = ctx.dt();
    let idx = ctx.idx();
    trace!("searchText column {idx}: {logic} {term:?}");

    config.mark_parents(
        ctx.unique(),
        logic == "empty" || logic == "notEmpty" || !term.is_empty(),
    );

    // The request builder carries the search to the server
    if dt.server_side() {
        if !loading {
            dt.draw(None);
        }
        return;
    }

    let term = term.to_lowercase();
    let current_set = dt
        .search_fixed(idx, FILTER_NAMESPACE)
        .is_some_and(|f| f.is_set());

    let filter = match logic {
        "empty" => predicate(|haystack| haystack.is_empty()),
        "notEmpty" => predicate(|haystack| !haystack.is_empty()),
        _ if term.is_empty() && !current_set => return,
        _ if term.is_empty() => Some(ColumnFilter::Term(String::new())),
        "equal" => predicate(move |haystack| haystack.to_lowercase() == term),
        "notEqual" => predicate(move |haystack| haystack.to_lowercase() != term),
        "contains" => Some(ColumnFilter::Term(term)),
        "notContains" => predicate(move |haystack| !haystack.to_lowercase().contains(&term)),
        "starts" => predicate(move |haystack| haystack.to_lowercase().starts_with(&term)),
        "notStarts" => predicate(move |haystack| !haystack.to_lowercase().starts_with(&term)),
        "ends" => predicate(move |haystack| haystack.to_lowercase().ends_with(&term)),
        "notEnds" => predicate(move |haystack| !haystack.to_lowercase().ends_with(&term)),
        _ => None,
    };

    if let Some(filter) = filter {
        dt.set_search_fixed(idx, FILTER_NAMESPACE, filter);
    }

    config.mark_parents(
        ctx.unique(),
        dt.search_fixed(idx, FILTER_NAMESPACE)
            .is_some_and(|f| f.is_set()),
    );

    if !loading {
        dt.draw(Some(idx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_config_reads_camel_case() {
        let mut opts = defaults();
        opts.insert("titleAttr".into(), json!("Search [title]"));
        opts.insert("clear".into(), json!(false));
        let config: SearchTextConfig = PluginConfig::new(opts).typed(KIND).unwrap();
        assert_eq!(config.title_attr, "Search [title]");
        assert!(!config.clear);
    }

    #[test]
    fn bad_option_types_are_reported() {
        let mut opts = defaults();
        opts.insert("clear".into(), json!("yes"));
        let result: Result<SearchTextConfig, _> = PluginConfig::new(opts).typed(KIND);
        assert!(matches!(result, Err(CCError::InvalidConfig { .. })));
    }
}
