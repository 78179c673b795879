//! Unit test harness for sla-exposure.
//!
//! Configuration files and profile files are exercised through real files in
//! temporary directories.

mod config_parsing;
mod profile_files;
