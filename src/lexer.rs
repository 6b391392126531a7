use std::{iter::Peekable, str::CharIndices};

use log::debug;

use crate::token::{Span, Token, TokenKind};

mod error;

pub use error::{LexError, LexResult};

/// Hand-written scanner over L25 source text.
///
/// The lexer is cheap to clone, so a token stream can be restarted from any
/// point by cloning the lexer before pulling tokens from it.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
            finished: false,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        self.skip_whitespace();

        let start_line = self.line;
        let start_column = self.column;
        let Some(&(start_idx, ch)) = self.chars.peek() else {
            let index = self.input.len();
            return Ok(Token::new(
                TokenKind::EOF,
                "",
                Span {
                    start: index,
                    end: index,
                    line: start_line,
                    column: start_column,
                },
            ));
        };

        if ch.is_ascii_digit() {
            return self.read_number(start_idx, start_line, start_column);
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.read_identifier(start_idx, start_line, start_column));
        }
        if ch == '"' {
            return self.read_string(start_idx, start_line, start_column);
        }

        self.advance_char();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '&' => TokenKind::Ampersand,
            '=' => self.with_equal(TokenKind::EqualEqual, TokenKind::Assign),
            '<' => self.with_equal(TokenKind::LessEqual, TokenKind::Less),
            '>' => self.with_equal(TokenKind::GreaterEqual, TokenKind::Greater),
            '!' if self.consume_if('=') => TokenKind::NotEqual,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    line: start_line,
                    column: start_column,
                });
            }
        };

        let end_idx = self.current_index();
        Ok(Token::new(
            kind,
            &self.input[start_idx..end_idx],
            Span {
                start: start_idx,
                end: end_idx,
                line: start_line,
                column: start_column,
            },
        ))
    }

    fn with_equal(&mut self, paired: TokenKind<'a>, single: TokenKind<'a>) -> TokenKind<'a> {
        if self.consume_if('=') { paired } else { single }
    }

    fn consume_if(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.advance_char();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if matches!(c, ' ' | '\t' | '\r' | '\n') {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = TokenKind::keyword(ident).unwrap_or(TokenKind::Identifier(ident));
        Token::new(
            kind,
            ident,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance_char(); // Consume first digit
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                line,
                column,
            })?;
        Ok(Token::new(
            TokenKind::Number(value),
            literal,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    /// Reads a `"..."` literal with backslash escapes left untouched.
    ///
    /// A quote that never closes does not form a string token, so it is
    /// reported as an unmatched character like any other stray input.
    fn read_string(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        let mut lookahead = self.clone();
        lookahead.advance_char(); // Opening quote
        while let Some((idx, c)) = lookahead.advance_char() {
            match c {
                '"' => {
                    let end_idx = idx + 1;
                    *self = lookahead;
                    return Ok(Token::new(
                        TokenKind::String(&self.input[start + 1..idx]),
                        &self.input[start..end_idx],
                        Span {
                            start,
                            end: end_idx,
                            line,
                            column,
                        },
                    ));
                }
                '\\' => {
                    lookahead.advance_char();
                }
                _ => {}
            }
        }
        Err(LexError::UnexpectedCharacter {
            character: '"',
            line,
            column,
        })
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

/// Yields every token up to and including the end-of-input sentinel, then stops.
/// A lexical error is yielded once and also ends the sequence.
impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        if matches!(&result, Ok(token) if token.kind == TokenKind::EOF) || result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let tokens = Lexer::new(input).collect::<LexResult<Vec<_>>>()?;
    debug!("tokenized {} bytes into {} tokens", input.len(), tokens.len());
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            program p {
                main { let x = 4 + 4; output(x); }
            }
        "};
        let expected_tokens = vec![
            TokenKind::Program,
            TokenKind::Identifier("p"),
            TokenKind::LBrace,
            TokenKind::Main,
            TokenKind::LBrace,
            TokenKind::Let,
            TokenKind::Identifier("x"),
            TokenKind::Assign,
            TokenKind::Number(4),
            TokenKind::Plus,
            TokenKind::Number(4),
            TokenKind::Semicolon,
            TokenKind::Output,
            TokenKind::LParen,
            TokenKind::Identifier("x"),
            TokenKind::RParen,
            TokenKind::Semicolon,
            TokenKind::RBrace,
            TokenKind::RBrace,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn prefers_two_character_operators() {
        assert_eq!(
            kinds("a<=b>=c==d!=e<f>g=h"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::LessEqual,
                TokenKind::Identifier("b"),
                TokenKind::GreaterEqual,
                TokenKind::Identifier("c"),
                TokenKind::EqualEqual,
                TokenKind::Identifier("d"),
                TokenKind::NotEqual,
                TokenKind::Identifier("e"),
                TokenKind::Less,
                TokenKind::Identifier("f"),
                TokenKind::Greater,
                TokenKind::Identifier("g"),
                TokenKind::Assign,
                TokenKind::Identifier("h"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn reclassifies_keywords_but_not_builtin_names() {
        assert_eq!(
            kinds("struct map set map_insert set_items letx"),
            vec![
                TokenKind::Struct,
                TokenKind::Map,
                TokenKind::Set,
                TokenKind::Identifier("map_insert"),
                TokenKind::Identifier("set_items"),
                TokenKind::Identifier("letx"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = tokenize("let a;\n  *p = &a[0];").expect("tokenize should succeed");
        let star = &tokens[3];
        assert_eq!(star.kind, TokenKind::Star);
        assert_eq!((star.span.line, star.span.column), (2, 2));
        let amp = &tokens[6];
        assert_eq!(amp.kind, TokenKind::Ampersand);
        assert_eq!((amp.span.line, amp.span.column), (2, 7));
    }

    #[test]
    fn scans_string_literals_with_escapes() {
        let tokens = tokenize(r#"output("a\"b")"#).expect("tokenize should succeed");
        assert_eq!(tokens[2].kind, TokenKind::String(r#"a\"b"#));
        assert_eq!(tokens[2].lexeme, r#""a\"b""#);
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("let x = 1;\nx = 1 @ 2;").expect_err("expected lexing failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                line: 2,
                column: 6,
            }
        );
        assert!(err.to_string().contains("Unexpected character '@' at line 2"));
    }

    #[test]
    fn errors_on_unterminated_string_and_lone_bang() {
        let err = tokenize("\"abc").expect_err("expected lexing failure");
        assert!(matches!(
            err,
            LexError::UnexpectedCharacter { character: '"', .. }
        ));
        let err = tokenize("a ! b").expect_err("expected lexing failure");
        assert!(matches!(
            err,
            LexError::UnexpectedCharacter { character: '!', .. }
        ));
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("let n = 99999999999999999999999999;").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }

    #[test]
    fn iterator_is_finite_and_restartable() {
        let mut lexer = Lexer::new("a b");
        let first = lexer.next().expect("token").expect("lexes");
        assert_eq!(first.kind, TokenKind::Identifier("a"));

        let restarted = lexer.clone().collect::<LexResult<Vec<_>>>().expect("lexes");
        let rest = lexer.collect::<LexResult<Vec<_>>>().expect("lexes");
        assert_eq!(restarted, rest);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1].kind, TokenKind::EOF);
    }

    #[test]
    fn displays_tokens_for_dumps() {
        let tokens = tokenize("let x = 10;").expect("tokenize should succeed");
        let rendered = tokens.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec![
                "Token(LET, let, 1, 0)",
                "Token(ID, x, 1, 4)",
                "Token(OP, =, 1, 6)",
                "Token(NUMBER, 10, 1, 8)",
                "Token(SEMICOLON, ;, 1, 10)",
                "Token(EOF, , 1, 11)",
            ]
        );
    }
}
