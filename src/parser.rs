// ABOUTME: Recursive-descent parser building statements from the token stream

use crate::ast::{Expr, LiteralValue, NodeId, Stmt};
use crate::error::VeldError;
use crate::token::{Literal, Token, TokenType};
use std::rc::Rc;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<VeldError>,
    next_id: NodeId,
    loop_depth: usize,
    function_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_start_id(tokens, 0)
    }

    /// REPL sessions thread the id through successive parsers so node ids
    /// stay unique for the lifetime of the interpreter.
    pub fn with_start_id(tokens: Vec<Token>, start_id: NodeId) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            next_id: start_id,
            loop_depth: 0,
            function_depth: 0,
        }
    }

    /// The first id a follow-up parser should start from.
    pub fn next_node_id(&self) -> NodeId {
        self.next_id
    }

    /// Parses the whole token stream. On error inside a declaration the
    /// parser synchronizes to the next statement boundary and keeps going,
    /// so several errors can be reported from one pass.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, Vec<VeldError>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.matches(&[TokenType::Var]) {
            self.var_declaration()
        } else if self.check(TokenType::Fun) && self.check_next(TokenType::Identifier) {
            self.advance();
            self.function_declaration()
        } else if self.matches(&[TokenType::Class]) {
            self.class_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(statement) => Some(statement),
            Err(error) => {
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt, VeldError> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.matches(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    fn function_declaration(&mut self) -> Result<Stmt, VeldError> {
        let name = self.consume(TokenType::Identifier, "Expect function name.")?;
        let function = self.function_body("function")?;
        Ok(Stmt::Function { name, function })
    }

    /// Parameter list plus braced body; shared by declarations, methods, and
    /// anonymous function expressions.
    fn function_body(&mut self, kind: &str) -> Result<Expr, VeldError> {
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() == 255 {
                    eprintln!(
                        "[line {}] Warning: Can't have more than 255 parameters.",
                        self.peek().line
                    );
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.matches(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;

        // break/continue may not cross a function boundary
        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.block_statements();
        self.function_depth -= 1;
        self.loop_depth = saved_loop_depth;

        Ok(Expr::Function {
            params,
            body: Rc::new(body?),
        })
    }

    fn class_declaration(&mut self) -> Result<Stmt, VeldError> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.matches(&[TokenType::Less]) {
            let super_name = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expr::Variable {
                id: self.fresh_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut class_methods = Vec::new();
        let mut class_fields = Vec::new();
        let mut instance_fields = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if self.matches(&[TokenType::Class]) {
                // Static member: `class name(...) {...}` or `class name = expr;`
                let member_name =
                    self.consume(TokenType::Identifier, "Expect static member name.")?;
                if self.check(TokenType::LeftParen) {
                    let function = self.function_body("method")?;
                    class_methods.push((member_name, function));
                } else {
                    self.consume(TokenType::Equal, "Expect '=' after static field name.")?;
                    let initializer = self.expression()?;
                    self.consume(TokenType::Semicolon, "Expect ';' after static field.")?;
                    class_fields.push((member_name, initializer));
                }
            } else {
                let member_name =
                    self.consume(TokenType::Identifier, "Expect method or field name.")?;
                if self.check(TokenType::LeftParen) {
                    let function = self.function_body("method")?;
                    methods.push((member_name, function));
                } else if self.matches(&[TokenType::Equal]) {
                    let initializer = self.expression()?;
                    self.consume(TokenType::Semicolon, "Expect ';' after field initializer.")?;
                    instance_fields.push((member_name, initializer));
                } else {
                    return Err(self.error_at_peek("Expect '(' or '=' after member name."));
                }
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            class_methods,
            class_fields,
            instance_fields,
        })
    }

    fn statement(&mut self) -> Result<Stmt, VeldError> {
        if self.matches(&[TokenType::If]) {
            return self.if_statement();
        }
        if self.matches(&[TokenType::While]) {
            return self.while_statement();
        }
        if self.matches(&[TokenType::For]) {
            return self.for_statement();
        }
        if self.matches(&[TokenType::Return]) {
            return self.return_statement();
        }
        if self.matches(&[TokenType::Break]) {
            return self.break_statement();
        }
        if self.matches(&[TokenType::Continue]) {
            return self.continue_statement();
        }
        if self.matches(&[TokenType::Print]) {
            return self.print_statement();
        }
        if self.matches(&[TokenType::LeftBrace]) {
            let statements = self.block_statements()?;
            return Ok(Stmt::Block { statements });
        }
        self.expression_statement()
    }

    fn if_statement(&mut self) -> Result<Stmt, VeldError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, VeldError> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;

        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;

        Ok(Stmt::While {
            keyword,
            condition,
            body: Box::new(body?),
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, VeldError> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.matches(&[TokenType::Semicolon]) {
            None
        } else if self.matches(&[TokenType::Var]) {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;

        Ok(Stmt::For {
            keyword,
            initializer,
            condition,
            increment,
            body: Box::new(body?),
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, VeldError> {
        let keyword = self.previous().clone();
        if self.function_depth == 0 {
            self.errors
                .push(VeldError::parse(&keyword, "Illegal return statement."));
        }
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn break_statement(&mut self) -> Result<Stmt, VeldError> {
        let keyword = self.previous().clone();
        if self.loop_depth == 0 {
            self.errors
                .push(VeldError::parse(&keyword, "Illegal break statement."));
        }
        self.consume(TokenType::Semicolon, "Expect ';' after 'break'.")?;
        Ok(Stmt::Break { keyword })
    }

    fn continue_statement(&mut self) -> Result<Stmt, VeldError> {
        let keyword = self.previous().clone();
        if self.loop_depth == 0 {
            self.errors
                .push(VeldError::parse(&keyword, "Illegal continue statement."));
        }
        self.consume(TokenType::Semicolon, "Expect ';' after 'continue'.")?;
        Ok(Stmt::Continue { keyword })
    }

    fn print_statement(&mut self) -> Result<Stmt, VeldError> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expr })
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>, VeldError> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, VeldError> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expr })
    }

    // ------------------------------------------------------------------
    // Expressions, precedence low to high
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, VeldError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, VeldError> {
        let expr = self.or()?;

        if self.matches(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.fresh_id(),
                    name,
                    value,
                }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),
                Expr::Index {
                    is_slice: false,
                    container,
                    index,
                    end,
                    bracket,
                } => {
                    let anchor = bracket.clone();
                    Ok(Expr::SetIndex {
                        target: Box::new(Expr::Index {
                            container,
                            index,
                            end,
                            bracket,
                            is_slice: false,
                        }),
                        value,
                        bracket: anchor,
                    })
                }
                _ => Err(VeldError::parse(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, VeldError> {
        let mut expr = self.and()?;
        while self.matches(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, VeldError> {
        let mut expr = self.bit_or()?;
        while self.matches(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.bit_or()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn bit_or(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(&[TokenType::Pipe], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(&[TokenType::Caret], Self::bit_and)
    }

    fn bit_and(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(&[TokenType::Amp], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(&[TokenType::EqualEqual, TokenType::BangEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(
            &[
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
            ],
            Self::shift,
        )
    }

    fn shift(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(&[TokenType::LessLess, TokenType::GreaterGreater], Self::term)
    }

    fn term(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(&[TokenType::Plus, TokenType::Minus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, VeldError> {
        self.binary_tier(
            &[TokenType::Star, TokenType::Slash, TokenType::Percent],
            Self::power,
        )
    }

    /// `**` is right-associative: `2 ** 3 ** 2` is `2 ** (3 ** 2)`.
    fn power(&mut self) -> Result<Expr, VeldError> {
        let expr = self.unary()?;
        if self.matches(&[TokenType::StarStar]) {
            let operator = self.previous().clone();
            let right = self.power()?;
            return Ok(Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn binary_tier(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr, VeldError>,
    ) -> Result<Expr, VeldError> {
        let mut expr = next(self)?;
        while self.matches(operators) {
            let operator = self.previous().clone();
            let right = next(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, VeldError> {
        if self.matches(&[TokenType::Bang, TokenType::Minus, TokenType::Tilde]) {
            let operator = self.previous().clone();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, VeldError> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else if self.matches(&[TokenType::LeftBracket]) {
                expr = self.index_suffix(expr)?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, VeldError> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() == 255 {
                    eprintln!(
                        "[line {}] Warning: Can't have more than 255 arguments.",
                        self.peek().line
                    );
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    /// `[i]`, `[i:j]`, `[:j]`, `[i:]`, `[:]` after a postfix expression.
    fn index_suffix(&mut self, container: Expr) -> Result<Expr, VeldError> {
        let bracket = self.previous().clone();
        let mut index = None;
        let mut end = None;
        let mut is_slice = false;

        if self.matches(&[TokenType::Colon]) {
            is_slice = true;
            if !self.check(TokenType::RightBracket) {
                end = Some(Box::new(self.expression()?));
            }
        } else {
            index = Some(Box::new(self.expression()?));
            if self.matches(&[TokenType::Colon]) {
                is_slice = true;
                if !self.check(TokenType::RightBracket) {
                    end = Some(Box::new(self.expression()?));
                }
            }
        }

        self.consume(TokenType::RightBracket, "Expect ']' after index.")?;
        Ok(Expr::Index {
            container: Box::new(container),
            index,
            end,
            bracket,
            is_slice,
        })
    }

    fn primary(&mut self) -> Result<Expr, VeldError> {
        if self.matches(&[TokenType::False]) {
            return Ok(Expr::Literal {
                value: LiteralValue::Bool(false),
            });
        }
        if self.matches(&[TokenType::True]) {
            return Ok(Expr::Literal {
                value: LiteralValue::Bool(true),
            });
        }
        if self.matches(&[TokenType::Nil]) {
            return Ok(Expr::Literal {
                value: LiteralValue::Nil,
            });
        }
        if self.matches(&[TokenType::Number, TokenType::String]) {
            let value = match self.previous().literal.clone() {
                Literal::Int(i) => LiteralValue::Int(i),
                Literal::Float(f) => LiteralValue::Float(f),
                Literal::Str { text, quote } => LiteralValue::Str { text, quote },
                Literal::None => {
                    return Err(self.error_at_previous("Malformed literal token."));
                }
            };
            return Ok(Expr::Literal { value });
        }
        if self.matches(&[TokenType::Identifier]) {
            return Ok(Expr::Variable {
                id: self.fresh_id(),
                name: self.previous().clone(),
            });
        }
        if self.matches(&[TokenType::This]) {
            return Ok(Expr::This {
                id: self.fresh_id(),
                keyword: self.previous().clone(),
            });
        }
        if self.matches(&[TokenType::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super {
                id: self.fresh_id(),
                keyword,
                method,
            });
        }
        if self.matches(&[TokenType::LeftParen]) {
            let inner = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping {
                inner: Box::new(inner),
            });
        }
        if self.matches(&[TokenType::LeftBracket]) {
            return self.list_literal();
        }
        if self.matches(&[TokenType::LeftBrace]) {
            return self.dict_literal();
        }
        if self.matches(&[TokenType::Fun]) {
            return self.function_body("function");
        }

        Err(self.error_at_peek("Expect expression."))
    }

    fn list_literal(&mut self) -> Result<Expr, VeldError> {
        let bracket = self.previous().clone();
        let mut elements = Vec::new();
        while !self.check(TokenType::RightBracket) {
            elements.push(self.expression()?);
            if !self.matches(&[TokenType::Comma]) {
                break;
            }
        }
        self.consume(TokenType::RightBracket, "Expect ']' after list elements.")?;
        Ok(Expr::List { elements, bracket })
    }

    fn dict_literal(&mut self) -> Result<Expr, VeldError> {
        let brace = self.previous().clone();
        let mut entries = Vec::new();
        while !self.check(TokenType::RightBrace) {
            let key = self.expression()?;
            self.consume(TokenType::Colon, "Expect ':' after dictionary key.")?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.matches(&[TokenType::Comma]) {
                break;
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after dictionary entries.")?;
        Ok(Expr::Dict { entries, brace })
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn matches(&mut self, kinds: &[TokenType]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenType) -> bool {
        self.peek().kind == kind
    }

    fn check_next(&self, kind: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.tokens
            .get(self.current + 1)
            .map(|t| t.kind == kind)
            .unwrap_or(false)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenType, message: &str) -> Result<Token, VeldError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error_at_peek(message))
    }

    fn error_at_peek(&self, message: &str) -> VeldError {
        VeldError::parse(self.peek(), message)
    }

    fn error_at_previous(&self, message: &str) -> VeldError {
        VeldError::parse(self.previous(), message)
    }

    /// Discards tokens until a likely statement boundary.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenType::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<VeldError>> {
        let tokens = Scanner::new(source).scan_tokens().expect("scan failed");
        Parser::new(tokens).parse()
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        parse(source).expect("parse failed")
    }

    fn first_message(source: &str) -> String {
        parse(source).expect_err("expected parse error")[0]
            .message()
            .to_string()
    }

    #[test]
    fn test_precedence_of_term_and_factor() {
        let statements = parse_ok("print 1 + 2 * 3;");
        let Stmt::Print { expr } = &statements[0] else {
            panic!("Expected print statement");
        };
        // The top operator must be '+', with '*' nested on the right
        let Expr::Binary { operator, right, .. } = expr else {
            panic!("Expected binary expression");
        };
        assert_eq!(operator.kind, TokenType::Plus);
        assert!(matches!(**right, Expr::Binary { ref operator, .. }
            if operator.kind == TokenType::Star));
    }

    #[test]
    fn test_power_is_right_associative() {
        let statements = parse_ok("print 2 ** 3 ** 2;");
        let Stmt::Print { expr } = &statements[0] else {
            panic!("Expected print statement");
        };
        let Expr::Binary { left, right, .. } = expr else {
            panic!("Expected binary expression");
        };
        assert!(matches!(**left, Expr::Literal { .. }));
        assert!(matches!(**right, Expr::Binary { .. }));
    }

    #[test]
    fn test_comparison_binds_looser_than_shift() {
        let statements = parse_ok("print 1 << 2 < 3;");
        let Stmt::Print { expr } = &statements[0] else {
            panic!("Expected print statement");
        };
        let Expr::Binary { operator, .. } = expr else {
            panic!("Expected binary expression");
        };
        assert_eq!(operator.kind, TokenType::Less);
    }

    #[test]
    fn test_assignment_targets() {
        assert!(matches!(
            &parse_ok("x = 1;")[0],
            Stmt::Expression {
                expr: Expr::Assign { .. }
            }
        ));
        assert!(matches!(
            &parse_ok("a.b = 1;")[0],
            Stmt::Expression {
                expr: Expr::Set { .. }
            }
        ));
        assert!(matches!(
            &parse_ok("a[0] = 1;")[0],
            Stmt::Expression {
                expr: Expr::SetIndex { .. }
            }
        ));
    }

    #[test]
    fn test_nested_index_assignment_target() {
        let statements = parse_ok("a[1][2] = 3;");
        let Stmt::Expression {
            expr: Expr::SetIndex { target, .. },
        } = &statements[0]
        else {
            panic!("Expected SetIndex");
        };
        let Expr::Index { container, .. } = &**target else {
            panic!("Expected Index target");
        };
        assert!(matches!(**container, Expr::Index { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(first_message("1 = 2;"), "Invalid assignment target.");
        assert_eq!(first_message("a[1:2] = 3;"), "Invalid assignment target.");
    }

    #[test]
    fn test_slice_forms() {
        for source in ["a[1:2];", "a[:2];", "a[1:];", "a[:];"] {
            let statements = parse_ok(source);
            let Stmt::Expression {
                expr: Expr::Index { is_slice, .. },
            } = &statements[0]
            else {
                panic!("Expected index expression for {source}");
            };
            assert!(*is_slice, "{source} should parse as a slice");
        }
    }

    #[test]
    fn test_list_and_dict_literals() {
        assert!(matches!(
            &parse_ok("var x = [1, 2, 3,];")[0],
            Stmt::Var {
                initializer: Some(Expr::List { .. }),
                ..
            }
        ));
        assert!(matches!(
            &parse_ok("var d = {'a': 1, 'b': 2};")[0],
            Stmt::Var {
                initializer: Some(Expr::Dict { .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_brace_at_statement_level_is_a_block() {
        assert!(matches!(&parse_ok("{ var x = 1; }")[0], Stmt::Block { .. }));
    }

    #[test]
    fn test_anonymous_function_expression() {
        assert!(matches!(
            &parse_ok("var f = fun (x) { return x; };")[0],
            Stmt::Var {
                initializer: Some(Expr::Function { .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_return_outside_function() {
        assert_eq!(first_message("return 1;"), "Illegal return statement.");
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(first_message("break;"), "Illegal break statement.");
        assert_eq!(
            first_message("fun f() { while (true) { fun g() { break; } } }"),
            "Illegal break statement."
        );
    }

    #[test]
    fn test_continue_outside_loop() {
        assert_eq!(first_message("continue;"), "Illegal continue statement.");
    }

    #[test]
    fn test_break_inside_loop_is_fine() {
        assert!(parse("while (true) { break; continue; }").is_ok());
        assert!(parse("for (;;) { break; }").is_ok());
    }

    #[test]
    fn test_class_with_members() {
        let statements = parse_ok(
            "class Point { \
               x = 0; \
               y = 0; \
               class origin() { return Point(); } \
               class count = 0; \
               init(x) { this.x = x; } \
               sum() { return this.x + this.y; } \
             }",
        );
        let Stmt::Class {
            methods,
            class_methods,
            class_fields,
            instance_fields,
            ..
        } = &statements[0]
        else {
            panic!("Expected class statement");
        };
        assert_eq!(methods.len(), 2);
        assert_eq!(class_methods.len(), 1);
        assert_eq!(class_fields.len(), 1);
        assert_eq!(instance_fields.len(), 2);
    }

    #[test]
    fn test_synchronization_reports_multiple_errors() {
        let errors = parse("var = 1; var y 2; print y;").expect_err("expected errors");
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_node_ids_are_unique_and_monotonic() {
        let tokens = Scanner::new("x; y; z;").scan_tokens().unwrap();
        let mut parser = Parser::with_start_id(tokens, 10);
        let statements = parser.parse().unwrap();
        let mut ids = Vec::new();
        for statement in &statements {
            if let Stmt::Expression {
                expr: Expr::Variable { id, .. },
            } = statement
            {
                ids.push(*id);
            }
        }
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(parser.next_node_id(), 13);
    }

    #[test]
    fn test_super_requires_method_name() {
        assert!(parse("class B < A { m() { super.m(); } }").is_ok());
        assert_eq!(
            first_message("class B < A { m() { super; } }"),
            "Expect '.' after 'super'."
        );
    }
}
