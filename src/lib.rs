pub mod api;
pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod ir;
pub mod runtime;
pub mod span;

// Re-exports — short paths for the CLI and tests
pub use config::project;
pub use ir::lir;
pub use ir::reg;

// Re-export public API — `velox::compile()` etc.
pub use api::*;
