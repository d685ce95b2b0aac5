//! An owned, mutable XML document tree.
//!
//! Documents are parsed with `quick-xml`, built from `serde_json` values, edited
//! through [`NodeId`] handles and written back out as markup.

mod document;
pub mod error;
mod node;
mod parse;
mod serialize;
mod value;

pub use document::Document;
pub use error::DomError;
pub use node::{Attribute, Element, NodeId, NodeKind};
pub use serialize::{SerializeOptions, escape_attribute, escape_text};
pub use value::is_valid_name;
