//! Driver registration.
//!
//! Drivers are registered explicitly at startup rather than through side
//! effectful imports, so the binary controls exactly which backends exist.

use std::sync::Arc;

use mirror::dumper::mysql::MysqlDumperDriver;
use mirror::dumper::text::TextDumperDriver;
use mirror::reader::mysql::MysqlReaderDriver;
use mirror::{dumper, reader};

pub fn register_all() {
    reader::register_driver(Arc::new(MysqlReaderDriver));

    dumper::register_driver(Arc::new(MysqlDumperDriver));
    dumper::register_driver(Arc::new(TextDumperDriver));
}
