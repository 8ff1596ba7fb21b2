//! WASM bindings for orlab
//!
//! JavaScript-friendly entry points for browser editors and step viewers.

use std::collections::HashSet;

use wasm_bindgen::prelude::*;

use crate::ast::Program;
use crate::compiler::Compiler;
use crate::lexer::{Lexer, TokenKind};
use crate::parser::Parser;
use crate::runner::{solve_source, Method};

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse source code and return the AST as JSON
#[wasm_bindgen]
pub fn parse(source: &str) -> Result<JsValue, JsValue> {
    let program = Parser::parse(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&program)
}

/// Tokenize source code and return tokens as JSON
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<TokenInfo> = Lexer::tokenize(source)
        .into_iter()
        .map(|t| TokenInfo {
            kind: format!("{:?}", t.kind),
            text: t.text,
            start: t.span.start,
            end: t.span.end,
        })
        .collect();
    to_js(&tokens)
}

#[derive(serde::Serialize)]
struct TokenInfo {
    kind: String,
    text: String,
    start: usize,
    end: usize,
}

/// Token classes for syntax highlighting
#[wasm_bindgen]
pub fn get_semantic_tokens(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<SemanticToken> = Lexer::tokenize(source)
        .into_iter()
        .filter_map(|t| {
            let token_type = match t.kind {
                TokenKind::Lp
                | TokenKind::Assignment
                | TokenKind::Transport
                | TokenKind::Maximize
                | TokenKind::Minimize => "keyword",
                TokenKind::Ident => "variable",
                TokenKind::Number => "number",
                TokenKind::String => "string",
                TokenKind::Comment => "comment",
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Le
                | TokenKind::Ge
                | TokenKind::Eq => "operator",
                _ => return None,
            };
            Some(SemanticToken {
                start: t.span.start,
                end: t.span.end,
                token_type: token_type.to_string(),
            })
        })
        .collect();
    to_js(&tokens)
}

#[derive(serde::Serialize)]
struct SemanticToken {
    start: usize,
    end: usize,
    token_type: String,
}

/// Check a source file and return diagnostics
#[wasm_bindgen]
pub fn validate(source: &str) -> JsValue {
    let diagnostics = get_diagnostics(source);
    serde_wasm_bindgen::to_value(&diagnostics).unwrap_or(JsValue::NULL)
}

#[derive(serde::Serialize)]
struct Diagnostic {
    start: usize,
    end: usize,
    severity: String,
    message: String,
}

fn get_diagnostics(source: &str) -> Vec<Diagnostic> {
    match Parser::parse(source) {
        Err(e) => {
            let (start, end) = e
                .span()
                .map_or((0, source.len()), |span| (span.start, span.end));
            vec![Diagnostic {
                start,
                end,
                severity: "error".to_string(),
                message: e.to_string(),
            }]
        }
        Ok(program) => validate_program(&program),
    }
}

/// Compile every model on its own so one bad model does not hide the others.
fn validate_program(program: &Program) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for item in &program.items {
        let span = item.span();
        if !seen.insert(item.name()) {
            diagnostics.push(Diagnostic {
                start: span.start,
                end: span.end,
                severity: "error".to_string(),
                message: format!("Duplicate model definition: '{}'", item.name()),
            });
            continue;
        }

        let mut compiler = Compiler::new();
        let single = Program {
            items: vec![item.clone()],
        };
        let result = compiler.load(&single).and_then(|_| compiler.compile(item.name()));
        if let Err(e) = result {
            diagnostics.push(Diagnostic {
                start: span.start,
                end: span.end,
                severity: "error".to_string(),
                message: e.to_string(),
            });
        }
    }

    diagnostics
}

/// Model names in declaration order
#[wasm_bindgen]
pub fn models(source: &str) -> Result<js_sys::Array, JsValue> {
    let program = Parser::parse(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(program
        .items
        .iter()
        .map(|item| JsValue::from_str(item.name()))
        .collect())
}

/// Names accepted by the `method` argument of [`solve`]
#[wasm_bindgen]
pub fn methods() -> js_sys::Array {
    Method::ALL
        .iter()
        .map(|m| JsValue::from_str(m.as_str()))
        .collect()
}

/// Compile and solve one model, returning its solution with the full trace.
///
/// An unbalanced transport table is an error unless `balance` is `true`.
#[wasm_bindgen]
pub fn solve(
    source: &str,
    model: &str,
    method: Option<String>,
    balance: Option<bool>,
) -> Result<JsValue, JsValue> {
    let method = method
        .filter(|m| !m.is_empty())
        .map(|m| m.parse::<Method>())
        .transpose()
        .map_err(|e| JsValue::from_str(&e))?;

    let outcome = solve_source(source, model, method, balance.unwrap_or(false))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&outcome)
}
