//! # gumleaf-sexp
//!
//! A [`TreeGenerator`] for a small S-expression format, so trees can be
//! written by hand, stored as fixtures and diffed without a language parser.
//!
//! ```
//! use gumleaf::{DiffOptions, TreeGenerator, diff_trees};
//! use gumleaf_sexp::SexpGenerator;
//!
//! let src = SexpGenerator.generate_from_str(r#"(Expr (Name "i") (Op "++"))"#).unwrap();
//! let dst = SexpGenerator.generate_from_str(r#"(Expr (Name "i") (Op "--"))"#).unwrap();
//!
//! let diff = diff_trees(&src, &dst, &DiffOptions::default());
//! assert_eq!(diff.script.to_string(), "update-node(s:3 → \"--\")\n");
//! ```
//!
//! Each node is `(Type "value"? @key="metadata"* children*)`; `;` starts a
//! comment. Metadata values are stored as `String`.

#![warn(missing_docs)]

use std::path::Path;

use facet::Facet;
use gumleaf::{Tree, TreeGenerator};

mod parser;
mod printer;

pub use parser::{SyntaxError, parse};
pub use printer::to_sexp;

/// Why [`SexpGenerator::generate_from_file`] failed.
#[derive(Facet, Debug, PartialEq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum GenerateError {
    /// could not read {path}: {reason}
    Io { path: String, reason: String },

    /// {path}: byte {offset}: {message}
    Syntax {
        path: String,
        offset: usize,
        message: String,
    },
}

/// Parses the S-expression format into [`Tree`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SexpGenerator;

impl SexpGenerator {
    /// Read and parse a file. I/O failures and syntax errors are reported
    /// separately.
    pub fn generate_from_file(&self, path: impl AsRef<Path>) -> Result<Tree, GenerateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GenerateError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.generate_from_str(&text)
            .map_err(|e| GenerateError::Syntax {
                path: path.display().to_string(),
                offset: e.offset(),
                message: e.to_string(),
            })
    }
}

impl TreeGenerator for SexpGenerator {
    type Error = SyntaxError;

    fn generate_from_str(&self, source: &str) -> Result<Tree, SyntaxError> {
        let tree = parse(source)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(nodes = tree.len(), "parsed s-expression");
        Ok(tree)
    }
}
