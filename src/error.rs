//! Error taxonomy of the interpreter.
//!
//! Scan, parse and resolution diagnostics are reported through the
//! [`App`](crate::App) as they are found and only set a flag; they never
//! travel as values. Runtime failures do travel: they unwind the evaluator
//! as [`RuntimeError`] until the top-level interpret loop reports them.

use crate::scanner::Token;
use thiserror::Error;

/// A runtime failure, carrying the token that triggered it so the report
/// can point at a source line.
#[derive(Debug, Error)]
#[error("{message}\n[line {}]", .token.line)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new<M>(token: &Token, message: M) -> RuntimeError
    where
        M: Into<String>,
    {
        RuntimeError {
            token: token.clone(),
            message: message.into(),
        }
    }
}
