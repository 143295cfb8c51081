pub mod cleaner;

pub use cleaner::{clean_document, clean_value, extract_plan};
