use orlab_solver::Relation;
use thiserror::Error;

use crate::ast::*;
use crate::lexer::{Lexer, Span, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Invalid number: {text}")]
    InvalidNumber { text: String, span: Span },
    #[error("Model {model} has more than one objective")]
    DuplicateObjective { model: String, span: Span },
    #[error("Section {section} appears twice")]
    DuplicateSection { section: String, span: Span },
    #[error("Unknown section {name}; expected {expected}")]
    UnknownSection {
        name: String,
        expected: &'static str,
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::DuplicateObjective { span, .. }
            | ParseError::DuplicateSection { span, .. }
            | ParseError::UnknownSection { span, .. } => Some(*span),
            ParseError::UnexpectedEof => None,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<Program, ParseError> {
        let tokens = Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_program()
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn skip_newlines_and_comments(&mut self) {
        while matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Comment | TokenKind::Semicolon
        ) {
            self.advance();
        }
    }

    fn skip_comments(&mut self) {
        while self.peek_kind() == TokenKind::Comment {
            self.advance();
        }
    }

    /// End offset of the last consumed token.
    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|p| self.tokens.get(p))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        match self.current() {
            Some(t) if t.kind != TokenKind::Eof => ParseError::UnexpectedToken {
                expected: expected.into(),
                found: format!("{:?}", t.kind),
                span: t.span,
            },
            _ => ParseError::UnexpectedEof,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        self.skip_newlines_and_comments();
        if self.peek_kind() == kind {
            self.advance().ok_or(ParseError::UnexpectedEof)
        } else {
            Err(self.unexpected(format!("{:?}", kind)))
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();

        loop {
            self.skip_newlines_and_comments();

            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Lp => items.push(Item::Lp(self.parse_lp()?)),
                TokenKind::Assignment => items.push(Item::Assignment(self.parse_assignment()?)),
                TokenKind::Transport => items.push(Item::Transport(self.parse_transport()?)),
                _ => return Err(self.unexpected("lp, assignment, or transport")),
            }
        }

        Ok(Program { items })
    }

    fn parse_lp(&mut self) -> Result<LpModel, ParseError> {
        let start = self.expect(TokenKind::Lp)?.span;
        let name = self.expect(TokenKind::Ident)?.text;
        self.expect(TokenKind::LBrace)?;

        let mut objective: Option<Objective> = None;
        let mut constraints = Vec::new();

        loop {
            self.skip_newlines_and_comments();
            match self.peek_kind() {
                TokenKind::RBrace => break,
                TokenKind::Maximize | TokenKind::Minimize => {
                    let parsed = self.parse_objective()?;
                    if objective.is_some() {
                        return Err(ParseError::DuplicateObjective {
                            model: name,
                            span: parsed.span,
                        });
                    }
                    objective = Some(parsed);
                }
                _ => constraints.push(self.parse_constraint()?),
            }
            self.end_statement()?;
        }

        let end = self.expect(TokenKind::RBrace)?.span;

        Ok(LpModel {
            span: Span::new(start.start, end.end),
            name,
            objective,
            constraints,
        })
    }

    /// A statement ends at a newline, a semicolon or the closing brace.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        self.skip_comments();
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn parse_objective(&mut self) -> Result<Objective, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::UnexpectedEof);
        };
        let sense = if token.kind == TokenKind::Maximize {
            Sense::Maximize
        } else {
            Sense::Minimize
        };
        let expr = self.parse_expr()?;

        Ok(Objective {
            span: Span::new(token.span.start, self.previous_end()),
            sense,
            expr,
        })
    }

    fn parse_constraint(&mut self) -> Result<ConstraintDecl, ParseError> {
        let start = self.current().map(|t| t.span.start).unwrap_or(0);

        let label = if self.peek_kind() == TokenKind::Ident && self.peek_kind_at(1) == TokenKind::Colon {
            let label = self.advance().map(|t| t.text);
            self.advance(); // :
            label
        } else {
            None
        };

        let lhs = self.parse_expr()?;
        self.skip_comments();
        let relation = match self.peek_kind() {
            TokenKind::Le => Relation::Le,
            TokenKind::Ge => Relation::Ge,
            TokenKind::Eq => Relation::Eq,
            _ => return Err(self.unexpected("<=, >=, or =")),
        };
        self.advance();
        let rhs = self.parse_expr()?;

        Ok(ConstraintDecl {
            span: Span::new(start, self.previous_end()),
            label,
            lhs,
            relation,
            rhs,
        })
    }

    fn parse_assignment(&mut self) -> Result<AssignmentModel, ParseError> {
        let start = self.expect(TokenKind::Assignment)?.span;
        let name = self.expect(TokenKind::Ident)?.text;
        self.expect(TokenKind::LBrace)?;

        let mut model = AssignmentModel {
            span: start,
            name,
            rows: None,
            cols: None,
            costs: None,
        };

        loop {
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::RBrace {
                break;
            }
            let section = self.expect(TokenKind::Ident)?;
            self.skip_section_colon();
            match section.text.as_str() {
                "rows" => set_once(&mut model.rows, self.parse_label_list()?, &section)?,
                "cols" | "columns" => set_once(&mut model.cols, self.parse_label_list()?, &section)?,
                "costs" => set_once(&mut model.costs, self.parse_matrix()?, &section)?,
                _ => {
                    return Err(ParseError::UnknownSection {
                        name: section.text,
                        expected: "rows, cols, or costs",
                        span: section.span,
                    });
                }
            }
        }

        let end = self.expect(TokenKind::RBrace)?.span;
        model.span = Span::new(start.start, end.end);
        Ok(model)
    }

    fn parse_transport(&mut self) -> Result<TransportModel, ParseError> {
        let start = self.expect(TokenKind::Transport)?.span;
        let name = self.expect(TokenKind::Ident)?.text;
        self.expect(TokenKind::LBrace)?;

        let mut model = TransportModel {
            span: start,
            name,
            sources: None,
            destinations: None,
            supply: None,
            demand: None,
            costs: None,
        };

        loop {
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::RBrace {
                break;
            }
            let section = self.expect(TokenKind::Ident)?;
            self.skip_section_colon();
            match section.text.as_str() {
                "sources" => set_once(&mut model.sources, self.parse_label_list()?, &section)?,
                "destinations" => {
                    set_once(&mut model.destinations, self.parse_label_list()?, &section)?
                }
                "supply" => set_once(&mut model.supply, self.parse_number_list()?, &section)?,
                "demand" => set_once(&mut model.demand, self.parse_number_list()?, &section)?,
                "costs" => set_once(&mut model.costs, self.parse_matrix()?, &section)?,
                _ => {
                    return Err(ParseError::UnknownSection {
                        name: section.text,
                        expected: "sources, destinations, supply, demand, or costs",
                        span: section.span,
                    });
                }
            }
        }

        let end = self.expect(TokenKind::RBrace)?.span;
        model.span = Span::new(start.start, end.end);
        Ok(model)
    }

    fn skip_section_colon(&mut self) {
        if self.peek_kind() == TokenKind::Colon {
            self.advance();
        }
    }

    /// `[a, b, "Plant 3"]`
    fn parse_label_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut labels = Vec::new();
        loop {
            self.skip_newlines_and_comments();
            match self.peek_kind() {
                TokenKind::RBracket => break,
                TokenKind::Ident | TokenKind::Number => {
                    if let Some(token) = self.advance() {
                        labels.push(token.text);
                    }
                }
                TokenKind::String => {
                    if let Some(token) = self.advance() {
                        labels.push(token.text.trim_matches('"').to_string());
                    }
                }
                _ => return Err(self.unexpected("label")),
            }
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::Comma {
                self.advance();
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(labels)
    }

    /// `[1, -2.5, 3]`
    fn parse_number_list(&mut self) -> Result<Vec<f64>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut values = Vec::new();
        loop {
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::RBracket {
                break;
            }
            values.push(self.parse_signed_number()?);
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::Comma {
                self.advance();
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(values)
    }

    /// `{ [..] [..] }`, one bracketed list per row
    fn parse_matrix(&mut self) -> Result<Vec<Vec<f64>>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut rows = Vec::new();
        loop {
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::RBrace {
                break;
            }
            rows.push(self.parse_number_list()?);
            self.skip_newlines_and_comments();
            if self.peek_kind() == TokenKind::Comma {
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(rows)
    }

    fn parse_signed_number(&mut self) -> Result<f64, ParseError> {
        let negative = self.peek_kind() == TokenKind::Minus;
        if negative {
            self.advance();
        }
        if self.peek_kind() != TokenKind::Number {
            return Err(self.unexpected("number"));
        }
        let value = self.parse_number()?;
        Ok(if negative { -value } else { value })
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let token = self.advance().ok_or(ParseError::UnexpectedEof)?;
        token.text.parse().map_err(|_| ParseError::InvalidNumber {
            text: token.text.clone(),
            span: token.span,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_additive()
    }

    // Newlines end an expression unless it is waiting for an operand.
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            self.skip_comments();
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.skip_newlines_and_comments();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            self.skip_comments();
            let (op, right) = match self.peek_kind() {
                TokenKind::Star | TokenKind::Slash => {
                    let op = if self.peek_kind() == TokenKind::Star {
                        BinaryOp::Mul
                    } else {
                        BinaryOp::Div
                    };
                    self.advance();
                    self.skip_newlines_and_comments();
                    (op, self.parse_unary()?)
                }
                // Implicit multiplication: `3 x1`, `2(x1 + x2)`
                TokenKind::Number | TokenKind::Ident | TokenKind::LParen => {
                    (BinaryOp::Mul, self.parse_primary()?)
                }
                _ => break,
            };
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            TokenKind::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            TokenKind::Number => Ok(Expr::Number(self.parse_number()?)),
            TokenKind::Ident => {
                let token = self.advance().ok_or(ParseError::UnexpectedEof)?;
                Ok(Expr::Variable {
                    name: token.text,
                    span: token.span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines_and_comments();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }
            _ => Err(self.unexpected("number, variable, or (")),
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, section: &Token) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateSection {
            section: section.text.clone(),
            span: section.span,
        });
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp(source: &str) -> LpModel {
        match Parser::parse(source).unwrap().items.remove(0) {
            Item::Lp(model) => model,
            other => panic!("Expected lp, got {}", other.kind()),
        }
    }

    #[test]
    fn test_parse_lp() {
        let model = lp(r#"lp production {
            maximize 3 x1 + 5 x2
            x1 <= 4
            cap: 2 x2 <= 12   // labelled
            3 x1 + 2 x2 ≤ 18
        }"#);

        assert_eq!(model.name, "production");
        let objective = model.objective.unwrap();
        assert_eq!(objective.sense, Sense::Maximize);
        assert_eq!(model.constraints.len(), 3);
        assert_eq!(model.constraints[1].label.as_deref(), Some("cap"));
        assert_eq!(model.constraints[2].relation, Relation::Le);
        assert_eq!(model.constraints[2].rhs, Expr::Number(18.0));
    }

    #[test]
    fn test_implicit_multiplication() {
        let model = lp("lp m { min 3 x1\n }");
        match model.objective.unwrap().expr {
            Expr::BinaryOp { left, op, right } => {
                assert_eq!(*left, Expr::Number(3.0));
                assert_eq!(op, BinaryOp::Mul);
                assert!(matches!(*right, Expr::Variable { ref name, .. } if name == "x1"));
            }
            other => panic!("Expected product, got {:?}", other),
        }
    }

    #[test]
    fn test_newline_ends_expression() {
        // Without the newline rule the second line would be read as `4 - x2`.
        let model = lp("lp m {\n max x1 + x2\n x1 <= 4\n -x2 >= -3\n}");
        assert_eq!(model.constraints.len(), 2);
        assert_eq!(model.constraints[0].rhs, Expr::Number(4.0));
        assert!(matches!(model.constraints[1].lhs, Expr::Neg(_)));
        assert_eq!(
            model.constraints[1].rhs,
            Expr::Neg(Box::new(Expr::Number(3.0)))
        );
    }

    #[test]
    fn test_trailing_operator_continues_line() {
        let model = lp("lp m {\n max x1 +\n   x2\n x1 <= 1\n}");
        assert_eq!(model.constraints.len(), 1);
        assert_eq!(model.objective.unwrap().expr.to_string(), "x1 + x2");
    }

    #[test]
    fn test_semicolons() {
        let model = lp("lp m { max x1 + x2; x1 <= 1; x2 = 2 }");
        assert_eq!(model.constraints.len(), 2);
        assert_eq!(model.constraints[1].relation, Relation::Eq);
    }

    #[test]
    fn test_duplicate_objective() {
        let err = Parser::parse("lp m {\n max x1\n min x1\n}").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateObjective { .. }));
    }

    #[test]
    fn test_missing_relation() {
        let err = Parser::parse("lp m {\n max x1\n x1 + 2\n}").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, .. } => assert_eq!(expected, "<=, >=, or ="),
            other => panic!("Expected unexpected token, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assignment() {
        let source = r#"assignment crews {
            rows [ann, bob, "Cy Young"]
            cols [a, b, c]
            costs {
                [4, 2, 8]
                [4, 3, 7]
                [3, 1, 6]
            }
        }"#;
        let program = Parser::parse(source).unwrap();
        match &program.items[0] {
            Item::Assignment(a) => {
                assert_eq!(a.name, "crews");
                assert_eq!(a.rows.as_ref().unwrap()[2], "Cy Young");
                assert_eq!(a.costs.as_ref().unwrap()[2], vec![3.0, 1.0, 6.0]);
            }
            _ => panic!("Expected assignment"),
        }
    }

    #[test]
    fn test_parse_transport() {
        let source = "transport plants {\n supply [10, 20]\n demand: [15, 15]\n costs { [2, 3], [5, 1] }\n}";
        let program = Parser::parse(source).unwrap();
        match &program.items[0] {
            Item::Transport(t) => {
                assert_eq!(t.supply, Some(vec![10.0, 20.0]));
                assert_eq!(t.demand, Some(vec![15.0, 15.0]));
                assert_eq!(t.costs.as_ref().map(Vec::len), Some(2));
                assert!(t.sources.is_none());
            }
            _ => panic!("Expected transport"),
        }
    }

    #[test]
    fn test_unknown_section() {
        let err = Parser::parse("transport t { weights [1] }").unwrap_err();
        assert!(matches!(err, ParseError::UnknownSection { ref name, .. } if name == "weights"));
        assert!(err.span().is_some());
    }

    #[test]
    fn test_unexpected_eof() {
        assert_eq!(Parser::parse("lp m {"), Err(ParseError::UnexpectedEof));
    }
}
