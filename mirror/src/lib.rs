//! Core engine for sanitised, referentially consistent database copies.
//!
//! The crate is organised around three seams:
//!
//! - [`reader::Reader`] produces rows of a table onto a channel, expanding
//!   configured foreign key relationships as it goes.
//! - [`anonymiser::Anonymiser`] is a reader decorator that rewrites row cells
//!   in flight, one row at a time, using literal, faker and conditional
//!   expression directives.
//! - [`dumper::Dumper`] consumes row channels and writes rows, structure and
//!   view DDL in a destination specific form.
//!
//! [`dumper::Engine`] ties the seams together: it dumps the structure, then
//! runs one reader task and one dumper task per table, joined by a single
//! slot channel and gated by a concurrency bound.

pub mod anonymiser;
pub mod conn;
pub mod dumper;
pub mod error;
pub mod expr;
mod macros;
pub mod reader;
pub mod types;
