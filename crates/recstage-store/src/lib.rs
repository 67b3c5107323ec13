//! recstage-store: record store backends
//!
//! - [`MemoryStore`]: mutex-guarded map, for tests and one-off imports
//! - [`DuckDbStore`]: persistent DuckDB table with SQL batch updates

mod duck;
mod memory;
mod sql;

pub use duck::DuckDbStore;
pub use memory::MemoryStore;
