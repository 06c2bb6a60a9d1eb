//! Dump specification types and configuration loading.
//!
//! A [`Spec`] describes what to copy and how to sanitise it: per-table
//! filters, foreign key relationships to expand, anonymisation directives,
//! view ordering weights and named matcher fragments. Specs are loaded from a
//! YAML file with `MIRROR_*` environment variable overrides.

mod load;
mod spec;

pub use load::load_spec;
pub use spec::{Filter, Relationship, Sort, SortDirection, Spec, TableConfig};
