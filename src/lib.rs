//! Per-column search controls for tabular grids.
//!
//! A [`column_control::ColumnControl`] mounts content plugins, resolved through a
//! [`content::ContentRegistry`], into a header or footer cell of a grid
//! implementing [`host::Host`]. The built-in `searchText` plugin keeps its
//! [`search_input::SearchInput`] in sync with the grid's filters, saved state and
//! server request documents.

pub mod column_control;
pub mod content;
pub mod control;
pub mod controller;
pub mod domain;
pub mod grid;
pub mod host;
pub mod icons;
pub mod inputter;
pub mod loader;
pub mod model;
pub mod plugins;
pub mod search_input;
pub mod ui;

pub use column_control::{ColumnControl, ControlOptions};
pub use content::{ContentDescriptor, ContentRegistry};
pub use domain::CCError;
pub use grid::{Grid, GridOptions};
pub use host::Host;
pub use search_input::{SearchInput, SearchInputBuilder};
