use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Number(i64),
    String(&'a str),

    // Keywords
    Program,
    Func,
    Return,
    If,
    Else,
    While,
    Let,
    Input,
    Output,
    Main,
    Struct,
    Map,
    Set,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Ampersand,    // &
    Assign,       // =
    EqualEqual,   // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Semicolon, // ;
    Dot,       // .
    Colon,     // :

    EOF,
}

impl<'a> TokenKind<'a> {
    pub fn keyword(ident: &'a str) -> Option<Self> {
        let kind = match ident {
            "program" => TokenKind::Program,
            "func" => TokenKind::Func,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "let" => TokenKind::Let,
            "input" => TokenKind::Input,
            "output" => TokenKind::Output,
            "main" => TokenKind::Main,
            "struct" => TokenKind::Struct,
            "map" => TokenKind::Map,
            "set" => TokenKind::Set,
            _ => return None,
        };
        Some(kind)
    }

    /// Category name used by the token dump (`NUMBER`, `ID`, `OP`, `LET`, ...).
    pub fn category(&self) -> &'static str {
        match self {
            TokenKind::Identifier(_) => "ID",
            TokenKind::Number(_) => "NUMBER",
            TokenKind::String(_) => "STRING",
            TokenKind::Program => "PROGRAM",
            TokenKind::Func => "FUNC",
            TokenKind::Return => "RETURN",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::While => "WHILE",
            TokenKind::Let => "LET",
            TokenKind::Input => "INPUT",
            TokenKind::Output => "OUTPUT",
            TokenKind::Main => "MAIN",
            TokenKind::Struct => "STRUCT",
            TokenKind::Map => "MAP",
            TokenKind::Set => "SET",
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Ampersand
            | TokenKind::Assign
            | TokenKind::EqualEqual
            | TokenKind::NotEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => "OP",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Dot => "DOT",
            TokenKind::Colon => "COLON",
            TokenKind::EOF => "EOF",
        }
    }

    /// Human-readable description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Number(value) => format!("number {value}"),
            TokenKind::String(_) => "string literal".to_string(),
            TokenKind::EOF => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Program => "program",
            TokenKind::Func => "func",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Let => "let",
            TokenKind::Input => "input",
            TokenKind::Output => "output",
            TokenKind::Main => "main",
            TokenKind::Struct => "struct",
            TokenKind::Map => "map",
            TokenKind::Set => "set",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Ampersand => "&",
            TokenKind::Assign => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Identifier(_)
            | TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::EOF => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub lexeme: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, lexeme: &'a str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({}, {}, {}, {})",
            self.kind.category(),
            self.lexeme,
            self.span.line,
            self.span.column
        )
    }
}
