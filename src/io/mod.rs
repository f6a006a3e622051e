//! Source file resolution

pub mod source;

pub use source::SourceFile;
