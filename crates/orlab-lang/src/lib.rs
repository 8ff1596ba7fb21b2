pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod runner;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use ast::*;
pub use compiler::{CompileError, CompiledModel, Compiler};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use runner::{run, solve_source, Method, SolveOutcome};
