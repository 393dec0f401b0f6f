pub mod content_hash;
pub mod sql;
pub mod tokens;

pub use sql::Record;
