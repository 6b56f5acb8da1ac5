pub mod api;
pub mod ast;
pub mod backend;
pub mod codegen;
pub mod diagnostic;
pub mod error;
pub mod function;
pub mod ir;
pub mod passes;
pub mod registry;
pub mod runtime;
pub mod span;
pub mod types;

// Re-export public API: `voxl::Compiler`, `voxl::CompileOptions` etc.
pub use api::*;
pub use ast::Tree;
pub use diagnostic::{render_diagnostics, Diagnostic};
