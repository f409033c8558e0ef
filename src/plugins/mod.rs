//! Content plugins shipped with the crate.

use serde_json::Value;

use crate::content::{ContentRegistry, Options};

pub mod dropdown;
pub mod search_text;

pub fn register_all(registry: ContentRegistry) -> ContentRegistry {
    registry
        .register(search_text::KIND, search_text::plugin())
        .register("search", search_text::search_alias())
        .register(dropdown::KIND, dropdown::plugin())
        .register("searchDropdown", dropdown::search_dropdown())
}

fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}
