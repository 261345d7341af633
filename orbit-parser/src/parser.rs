use crate::ast::{BinaryOp, Expr, Program, Span, Stmt, UnaryOp};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Recursive-descent parser over the pre-lexed token stream.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Lex and parse a whole source file.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.statement()?);
        }
        Ok(Program { stmts })
    }

    fn peek(&self) -> &Token {
        // The stream always ends with Eof, which is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.bump())
        } else {
            let token = self.peek();
            Err(ParseError::new(
                format!("expected {}, found {:?}", what, token.kind),
                token.line,
                token.col,
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.bump();
                Ok((name, Span::new(token.line, token.col)))
            }
            _ => Err(ParseError::new(
                format!("expected {}, found {:?}", what, token.kind),
                token.line,
                token.col,
            )),
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let token = self.peek().clone();
        let stmt = match token.kind {
            TokenKind::Var => self.var_decl()?,
            TokenKind::Func => self.func_decl()?,
            TokenKind::If => self.if_stmt()?,
            TokenKind::While => self.while_stmt()?,
            TokenKind::Return => self.return_stmt()?,
            TokenKind::Class => {
                return Err(ParseError::new(
                    "class declarations are not supported; classes come from the host",
                    token.line,
                    token.col,
                ));
            }
            _ => self.expr_or_assign_stmt()?,
        };
        // Statement separators are optional.
        while self.eat(&TokenKind::Semi) {}
        Ok(stmt)
    }

    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let span = Span::new(kw.line, kw.col);
        let (name, _) = self.expect_ident("variable name")?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Stmt::Var { name, init, span })
    }

    fn func_decl(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let span = Span::new(kw.line, kw.col);
        let (name, _) = self.expect_ident("function name")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (param, param_span) = self.expect_ident("parameter name")?;
                if params.contains(&param) {
                    return Err(ParseError::new(
                        format!("duplicate parameter '{}'", param),
                        param_span.line,
                        param_span.col,
                    ));
                }
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.block()?;
        Ok(Stmt::Func {
            name,
            params,
            body,
            span,
        })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let span = Span::new(kw.line, kw.col);
        let cond = self.expression()?;
        let then_body = self.block()?;
        let else_body = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.if_stmt()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            span,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let span = Span::new(kw.line, kw.col);
        let cond = self.expression()?;
        let body = self.block()?;
        Ok(Stmt::While { cond, body, span })
    }

    fn return_stmt(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let span = Span::new(kw.line, kw.col);
        let value = if self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Semi)
            || self.check(&TokenKind::Eof)
        {
            None
        } else {
            Some(self.expression()?)
        };
        Ok(Stmt::Return { value, span })
    }

    fn expr_or_assign_stmt(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        let span = expr.span();
        if self.eat(&TokenKind::Assign) {
            let value = self.expression()?;
            return match expr {
                Expr::Ident { name, .. } => Ok(Stmt::Assign { name, value, span }),
                Expr::Member { object, member, .. } => Ok(Stmt::AssignMember {
                    object: *object,
                    member,
                    value,
                    span,
                }),
                _ => Err(ParseError::new(
                    "invalid assignment target",
                    span.line,
                    span.col,
                )),
            };
        }
        Ok(Stmt::Expr { expr, span })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    // ---- expressions, lowest to highest precedence ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.check(&TokenKind::OrOr) {
            let op_token = self.bump();
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: Span::new(op_token.line, op_token.col),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.equality()?;
        while self.check(&TokenKind::AndAnd) {
            let op_token = self.bump();
            let rhs = self.equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: Span::new(op_token.line, op_token.col),
            };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                _ => break,
            };
            let op_token = self.bump();
            let rhs = self.comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: Span::new(op_token.line, op_token.col),
            };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let op_token = self.bump();
            let rhs = self.additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: Span::new(op_token.line, op_token.col),
            };
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let op_token = self.bump();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: Span::new(op_token.line, op_token.col),
            };
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let op_token = self.bump();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: Span::new(op_token.line, op_token.col),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        let op_token = self.bump();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span: Span::new(op_token.line, op_token.col),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.check(&TokenKind::LParen) {
                let open = self.bump();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: Span::new(open.line, open.col),
                };
            } else if self.check(&TokenKind::Dot) {
                let dot = self.bump();
                let (member, _) = self.expect_ident("member name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    member,
                    span: Span::new(dot.line, dot.col),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let span = Span::new(token.line, token.col);
        let expr = match token.kind {
            TokenKind::Int(value) => {
                self.bump();
                Expr::Int { value, span }
            }
            TokenKind::Float(value) => {
                self.bump();
                Expr::Float { value, span }
            }
            TokenKind::Str(ref value) => {
                let value = value.clone();
                self.bump();
                Expr::Str { value, span }
            }
            TokenKind::True => {
                self.bump();
                Expr::Bool { value: true, span }
            }
            TokenKind::False => {
                self.bump();
                Expr::Bool { value: false, span }
            }
            TokenKind::Null => {
                self.bump();
                Expr::Null { span }
            }
            TokenKind::Ident(ref name) => {
                let name = name.clone();
                self.bump();
                Expr::Ident { name, span }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                inner
            }
            _ => {
                return Err(ParseError::new(
                    format!("expected expression, found {:?}", token.kind),
                    token.line,
                    token.col,
                ));
            }
        };
        Ok(expr)
    }
}
