use std::str::Chars;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Lp,
    Assignment,
    Transport,
    Maximize,
    Minimize,

    // Literals
    Ident,
    Number,
    String,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Le,
    Ge,
    Eq,
    Colon,
    Semicolon,
    Comma,

    // Delimiters
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,

    // Special
    Newline,
    Comment,
    Eof,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
        }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    pos: usize,
    current: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            pos: 0,
            current,
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current;
        self.current = self.chars.next();
        if let Some(c) = c {
            self.pos += c.len_utf8();
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn token_from(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Span::new(start, self.pos), &self.source[start..self.pos])
    }

    fn line_comment(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        self.token_from(TokenKind::Comment, start)
    }

    fn block_comment(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // /
        self.advance(); // *
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    break;
                }
                Some(_) => {}
                None => break, // unterminated
            }
        }
        self.token_from(TokenKind::Comment, start)
    }

    fn read_string(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // opening quote
        while let Some(c) = self.peek() {
            if c == '"' {
                self.advance();
                break;
            }
            if c == '\n' {
                break;
            }
            self.advance();
        }
        self.token_from(TokenKind::String, start)
    }

    /// Digits with an optional fraction and exponent. A sign is always a
    /// separate `Minus` token.
    fn read_number(&mut self) -> Token {
        let start = self.pos;
        self.eat_digits();

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.eat_digits();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let mut ahead = self.chars.clone();
            let next = ahead.next();
            let digit = match next {
                Some('+' | '-') => ahead.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if digit {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                self.eat_digits();
            }
        }

        self.token_from(TokenKind::Number, start)
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let kind = match text {
            "lp" => TokenKind::Lp,
            "assignment" => TokenKind::Assignment,
            "transport" => TokenKind::Transport,
            "maximize" | "max" => TokenKind::Maximize,
            "minimize" | "min" => TokenKind::Minimize,
            _ => TokenKind::Ident,
        };
        Token::new(kind, Span::new(start, self.pos), text)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        self.advance();
        self.token_from(kind, start)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), "");
        };

        match c {
            '\n' => self.single(TokenKind::Newline),
            '/' => match self.peek_next() {
                Some('/') => self.line_comment(),
                Some('*') => self.block_comment(),
                _ => self.single(TokenKind::Slash),
            },
            '"' => self.read_string(),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '≤' => self.single(TokenKind::Le),
            '≥' => self.single(TokenKind::Ge),
            '<' | '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    let kind = if c == '<' { TokenKind::Le } else { TokenKind::Ge };
                    self.token_from(kind, start)
                } else {
                    // Strict inequalities are not linear programming relations.
                    self.token_from(TokenKind::Error, start)
                }
            }
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                }
                self.token_from(TokenKind::Eq, start)
            }
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            c if c.is_ascii_digit() => self.read_number(),
            '.' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_ident(),
            _ => self.single(TokenKind::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("lp assignment transport maximize max minimize min"),
            vec![
                TokenKind::Lp,
                TokenKind::Assignment,
                TokenKind::Transport,
                TokenKind::Maximize,
                TokenKind::Maximize,
                TokenKind::Minimize,
                TokenKind::Minimize,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::tokenize("100 8.5 0.005 .5 1e3 2.5E-2");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["100", "8.5", "0.005", ".5", "1e3", "2.5E-2", ""]);
    }

    #[test]
    fn test_minus_is_always_an_operator() {
        assert_eq!(
            kinds("-20 x1-3"),
            vec![
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_relations() {
        assert_eq!(
            kinds("<= >= = == ≤ ≥ <"),
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Eq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Error,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unicode_spans() {
        let tokens = Lexer::tokenize("x ≤ 4");
        assert_eq!(tokens[1].span, Span::new(2, 5));
        assert_eq!(tokens[2].span, Span::new(6, 7));
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("foo // comment\nbar /* block\n */ baz"),
            vec![
                TokenKind::Ident,
                TokenKind::Comment,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Comment,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_model_snippet() {
        let source = "lp production {\n  maximize 3 x1 + 5 x2\n  cap: 2 x2 <= 12\n}";
        let kinds: Vec<_> = Lexer::tokenize(source)
            .iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Lp,
                TokenKind::Ident, // production
                TokenKind::LBrace,
                TokenKind::Maximize,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Ident, // cap
                TokenKind::Colon,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Le,
                TokenKind::Number,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }
}
