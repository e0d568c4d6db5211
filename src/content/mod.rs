//! Page content streams.
//!
//! Parses content streams into operators and interprets them into the
//! page objects the font subsetter inspects.

pub mod operators;
pub mod page_objects;
pub mod parser;

pub use operators::{Operator, TextElement};
pub use page_objects::{page_content, page_resources, parse_page_objects, PageObject, TextObject};
pub use parser::parse_content_stream;
