//! In-memory media helpers: `data:` URL codec and object URL handles.

mod data_url;
mod object_url;

pub use data_url::{decode_data_url, encode_data_url, MediaData};
pub use object_url::{ObjectUrl, ObjectUrlRegistry};
