use log::debug;

use crate::ast::{
    AssignTarget, BinaryOperator, Call, Expression, FuncDef, Program, Statement, StmtList,
    UnaryOperator,
};
use crate::lexer;
use crate::token::{Span, Token, TokenKind};

mod error;

pub use error::{ParseError, ParseResult};

/// Recursive-descent parser with one token of lookahead (two when telling a
/// call statement apart from an assignment).
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if !matches!(tokens.last(), Some(token) if token.kind == TokenKind::EOF) {
            let span = tokens.last().map(Token::span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, "", span));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        self.expect(TokenKind::Program)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace)?;

        let mut functions = Vec::new();
        while self.check(TokenKind::Func) {
            functions.push(self.parse_function_def()?);
        }

        self.expect(TokenKind::Main)?;
        self.expect(TokenKind::LBrace)?;
        let main = self.parse_stmt_list()?;
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::EOF)?;

        debug!(
            "parsed program '{name}' with {} function(s)",
            functions.len()
        );
        Ok(Program {
            name,
            functions,
            main,
        })
    }

    fn parse_function_def(&mut self) -> ParseResult<FuncDef> {
        self.expect(TokenKind::Func)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            params.push(self.expect_identifier()?);
            while self.eat(TokenKind::Comma) {
                params.push(self.expect_identifier()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_stmt_list()?;
        self.expect(TokenKind::Return)?;
        let return_expr = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        self.expect(TokenKind::RBrace)?;

        Ok(FuncDef {
            name,
            params,
            body,
            return_expr,
        })
    }

    fn parse_stmt_list(&mut self) -> ParseResult<StmtList> {
        let mut statements = vec![self.parse_statement()?];
        self.expect(TokenKind::Semicolon)?;
        while self.starts_statement() {
            statements.push(self.parse_statement()?);
            self.expect(TokenKind::Semicolon)?;
        }
        Ok(StmtList::new(statements))
    }

    fn starts_statement(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Input
                | TokenKind::Output
                | TokenKind::Star
                | TokenKind::Identifier(_)
        )
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let kind = self.current().kind;
        match kind {
            TokenKind::Let => self.parse_declare(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Input => self.parse_input(),
            TokenKind::Output => self.parse_output(),
            TokenKind::Identifier(_) if self.peek_kind(1) == &TokenKind::LParen => {
                Ok(Statement::Call(self.parse_call()?))
            }
            TokenKind::Identifier(_) | TokenKind::Star => self.parse_assignment(),
            _ => Err(self.error("statement")),
        }
    }

    fn parse_declare(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Let)?;
        let name = self.expect_identifier()?;
        let size = if self.eat(TokenKind::LBracket) {
            let size = self.parse_expression()?;
            self.expect(TokenKind::RBracket)?;
            Some(size)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Statement::Declare { name, size, init })
    }

    fn parse_assignment(&mut self) -> ParseResult<Statement> {
        let target = self.parse_assign_target()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;
        Ok(Statement::Assign { target, value })
    }

    fn parse_assign_target(&mut self) -> ParseResult<AssignTarget> {
        if self.eat(TokenKind::Star) {
            return Ok(AssignTarget::Deref(self.parse_deref_operand()?));
        }
        let target = match self.parse_variable()? {
            Expression::Identifier(name) => AssignTarget::Variable(name),
            Expression::ArrayAccess { array, index } => AssignTarget::Index {
                array: *array,
                index: *index,
            },
            Expression::FieldAccess { object, field } => AssignTarget::Field {
                object: *object,
                field,
            },
            _ => return Err(self.error("assignable variable")),
        };
        Ok(target)
    }

    fn parse_deref_operand(&mut self) -> ParseResult<Expression> {
        if self.eat(TokenKind::Star) {
            let operand = self.parse_deref_operand()?;
            return Ok(Expression::Unary {
                op: UnaryOperator::Deref,
                operand: Box::new(operand),
            });
        }
        self.parse_variable()
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_bool_expression()?;
        self.expect(TokenKind::RParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.eat(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_bool_expression()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Statement::While { condition, body })
    }

    fn parse_block(&mut self) -> ParseResult<StmtList> {
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_stmt_list()?;
        self.expect(TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_input(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Input)?;
        self.expect(TokenKind::LParen)?;
        let mut names = vec![self.expect_identifier()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(Statement::Input(names))
    }

    fn parse_output(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Output)?;
        self.expect(TokenKind::LParen)?;
        let mut values = vec![self.parse_expression()?];
        while self.eat(TokenKind::Comma) {
            values.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(Statement::Output(values))
    }

    fn parse_call(&mut self) -> ParseResult<Call> {
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let args = self.parse_expression_list(TokenKind::RParen)?;
        Ok(Call { name, args })
    }

    /// Parses `[expr ("," expr)*]` followed by the closing delimiter.
    fn parse_expression_list(&mut self, close: TokenKind<'a>) -> ParseResult<Vec<Expression>> {
        let mut values = Vec::new();
        if !self.check(close) {
            values.push(self.parse_expression()?);
            while self.eat(TokenKind::Comma) {
                values.push(self.parse_expression()?);
            }
        }
        self.expect(close)?;
        Ok(values)
    }

    fn parse_bool_expression(&mut self) -> ParseResult<Expression> {
        let left = self.parse_expression()?;
        let kind = self.current().kind;
        let op = match kind {
            TokenKind::EqualEqual => BinaryOperator::Equal,
            TokenKind::NotEqual => BinaryOperator::NotEqual,
            TokenKind::Less => BinaryOperator::Less,
            TokenKind::LessEqual => BinaryOperator::LessEqual,
            TokenKind::Greater => BinaryOperator::Greater,
            TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
            _ => return Err(self.error("comparison operator")),
        };
        self.advance();
        let right = self.parse_expression()?;
        Ok(Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let kind = self.current().kind;
        let sign = match kind {
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Minus => Some(UnaryOperator::Minus),
            _ => None,
        };
        let mut expr = if let Some(op) = sign {
            self.advance();
            Expression::Unary {
                op,
                operand: Box::new(self.parse_term()?),
            }
        } else {
            self.parse_term()?
        };

        loop {
            let kind = self.current().kind;
            let op = match kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_factor()?;
        loop {
            let kind = self.current().kind;
            let op = match kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> ParseResult<Expression> {
        let kind = self.current().kind;
        match kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expression::Number(value))
            }
            TokenKind::Ampersand => {
                self.advance();
                Ok(Expression::Unary {
                    op: UnaryOperator::AddressOf,
                    operand: Box::new(self.parse_variable()?),
                })
            }
            TokenKind::Star => {
                self.advance();
                Ok(Expression::Unary {
                    op: UnaryOperator::Deref,
                    operand: Box::new(self.parse_factor()?),
                })
            }
            TokenKind::Identifier(_) if self.peek_kind(1) == &TokenKind::LParen => {
                Ok(Expression::Call(self.parse_call()?))
            }
            TokenKind::Identifier(_) => self.parse_variable(),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_expression_list(TokenKind::RBracket)?;
                Ok(Expression::ArrayLiteral(elements))
            }
            TokenKind::Struct => self.parse_struct_literal(),
            TokenKind::Map => self.parse_map_literal(),
            TokenKind::Set => {
                self.advance();
                self.expect(TokenKind::LBrace)?;
                let elements = self.parse_expression_list(TokenKind::RBrace)?;
                Ok(Expression::SetLiteral(elements))
            }
            _ => Err(self.error("expression")),
        }
    }

    fn parse_variable(&mut self) -> ParseResult<Expression> {
        let mut expr = Expression::Identifier(self.expect_identifier()?);
        loop {
            if self.eat(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expression::ArrayAccess {
                    array: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(TokenKind::Dot) {
                let field = self.expect_identifier()?;
                expr = Expression::FieldAccess {
                    object: Box::new(expr),
                    field,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_struct_literal(&mut self) -> ParseResult<Expression> {
        self.expect(TokenKind::Struct)?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Assign)?;
            fields.push((name, self.parse_expression()?));
            if !self.eat(TokenKind::Semicolon) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expression::StructLiteral(fields))
    }

    fn parse_map_literal(&mut self) -> ParseResult<Expression> {
        self.expect(TokenKind::Map)?;
        self.expect(TokenKind::LBrace)?;
        let mut pairs = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.parse_expression()?;
                self.expect(TokenKind::Colon)?;
                pairs.push((key, self.parse_expression()?));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expression::MapLiteral(pairs))
    }

    fn current(&self) -> &Token<'a> {
        self.token_at(self.position)
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind<'a> {
        &self.token_at(self.position + offset).kind
    }

    fn token_at(&self, index: usize) -> &Token<'a> {
        // `new` guarantees a trailing EOF token, which absorbs overruns.
        let last = self.tokens.len() - 1;
        &self.tokens[index.min(last)]
    }

    fn check(&self, kind: TokenKind<'a>) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) {
        if self.current().kind != TokenKind::EOF {
            self.position += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind<'a>) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(&kind.describe()))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current().kind {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.error("identifier"))
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        let Span { line, column, .. } = token.span;
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.describe(),
            line,
            column,
        }
    }
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

pub fn parse(input: &str) -> ParseResult<Program> {
    let tokens = lexer::tokenize(input)?;
    parse_tokens(tokens)
}
