//! Common utilities shared by the renderer, the query synthesiser and the CLI

pub mod handlebars;

pub use handlebars::{get_handlebars, write_string_to_file, HelperTable};
