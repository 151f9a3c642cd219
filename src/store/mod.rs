//! Cursor persistence: memory, JSON-file and libSQL backends.

pub mod json_file;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use json_file::JsonFileCursorStore;
pub use libsql_backend::LibSqlCursorStore;
pub use memory::InMemoryCursorStore;
pub use traits::CursorStore;
