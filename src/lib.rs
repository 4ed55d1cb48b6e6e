pub mod ast;
pub mod error;
pub mod interner;
pub mod interpreter;
pub mod parser;
pub mod scanner;

use crate::error::RuntimeError;
use crate::interner::Interner;
use crate::interpreter::{Interpreter, Resolver};
use crate::parser::Parser;
use crate::scanner::{Scanner, Token, TokenType};
use log::debug;
use std::cell::Cell;

/// Pipeline driver and diagnostics sink.
///
/// Owns the interner and the two error flags. Scan, parse and resolution
/// errors are reported here as they are found; the driver consults the
/// flags between stages and refuses to go on once one is set.
pub struct App {
    pub interner: Interner,
    had_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
    next_expr_id: Cell<usize>,
}

impl App {
    pub fn new() -> App {
        App {
            interner: Interner::new(),
            had_error: Cell::new(false),
            had_runtime_error: Cell::new(false),
            next_expr_id: Cell::new(0),
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    /// The prompt clears both flags between lines.
    pub fn clear_errors(&self) {
        self.had_error.set(false);
        self.had_runtime_error.set(false);
    }

    pub fn error(&self, line: u64, message: &str) {
        self.report(line, "", message);
    }

    pub fn error_token(&self, token: &Token, message: &str) {
        if token.token_type == TokenType::Eof {
            self.report(token.line, " at end", message);
        } else {
            self.report(
                token.line,
                &format!(" at '{}'", self.interner.resolve(token.lexeme)),
                message,
            );
        }
    }

    pub fn runtime_error(&self, error: &RuntimeError) {
        self.had_runtime_error.set(true);
        eprintln!("{}", error);
    }

    fn report(&self, line: u64, origin: &str, message: &str) {
        self.had_error.set(true);
        eprintln!("[line {}] Error{}: {}", line, origin, message);
    }

    /// Runs a program: scan, parse, resolve, evaluate.
    pub fn run(&self, interpreter: &mut Interpreter, source: &str) {
        self.run_pipeline(interpreter, source, false);
    }

    /// Runs one prompt line; bare expression statements print their value.
    pub fn run_repl(&self, interpreter: &mut Interpreter, source: &str) {
        self.run_pipeline(interpreter, source, true);
    }

    fn run_pipeline(&self, interpreter: &mut Interpreter, source: &str, repl: bool) {
        let mut scanner = Scanner::new(self, source.as_bytes());
        let tokens = scanner.scan_tokens();
        debug!("scanned {} tokens", tokens.len());

        let mut parser = Parser::new(self, tokens, self.next_expr_id.get());
        let statements = parser.parse();
        self.next_expr_id.set(parser.next_expr_id());
        debug!("parsed {} statements", statements.len());

        if self.had_error.get() {
            return;
        }

        let mut resolver = Resolver::new(self, interpreter);
        resolver.resolve(&statements);

        if self.had_error.get() {
            return;
        }

        if repl {
            interpreter.interpret_repl(self, &statements);
        } else {
            interpreter.interpret(self, &statements);
        }
    }
}

impl Default for App {
    fn default() -> App {
        App::new()
    }
}
