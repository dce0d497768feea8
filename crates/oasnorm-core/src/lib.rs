pub mod config;
pub mod error;
pub mod normalize;
pub mod parse;

pub use normalize::{Diagnostic, DiagnosticKind, NormalizeReport, normalize};
