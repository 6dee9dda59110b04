pub mod app;
pub mod bundle;
pub mod bundle_cache;
pub mod config;
pub mod contexts;
pub mod error;
pub mod field;
pub mod file_group;
pub mod fs_util;
pub mod layout;
pub mod lookup;
pub mod manifest;
pub mod output;
pub mod processors;
pub mod report;
pub mod schema;
pub mod validation;
