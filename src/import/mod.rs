//! Importers that turn external API descriptions into collections

pub mod openapi;

pub use openapi::{load_openapi_file, openapi_to_collection};
