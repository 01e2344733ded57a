use crate::ast::{Arg, BinOp, CmpOp, Expr, UnOp};
use crate::error::{ExprError, Result, Span};
use crate::lexer::{tokenize, SpannedToken, Token};
use quire_types::Value;

/// Recursive-descent parser, one function per precedence level
///
/// Precedence from loosest to tightest:
/// 1. `x if c else y`
/// 2. `or`, `||`
/// 3. `and`, `&&`
/// 4. `not`, `!`
/// 5. comparisons, `in`, `not in` (chaining)
/// 6. `+`, `-`
/// 7. `*`, `/`, `%`
/// 8. unary `-`
/// 9. attribute access, calls, subscripts
pub struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> &Token {
        self.peek().map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_default()
    }

    fn advance(&mut self) -> Option<&'a SpannedToken> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.peek_token()) == std::mem::discriminant(expected)
    }

    fn consume(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<Span> {
        if self.check(&expected) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.error(format!("Expected {}", what)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::Parse {
            span: self.current_span(),
            message: message.into(),
        }
    }

    /// Parse a complete expression; trailing tokens are an error
    pub fn parse(&mut self) -> Result<Expr> {
        let expr = self.parse_ternary()?;
        if !self.check(&Token::Eof) {
            return Err(self.error(format!("Unexpected token {:?}", self.peek_token())));
        }
        Ok(expr)
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let then = self.parse_or()?;
        if !self.consume(&Token::If) {
            return Ok(then);
        }
        let condition = self.parse_or()?;
        self.expect(Token::Else, "'else' in conditional expression")?;
        let otherwise = self.parse_ternary()?;
        let span = then.span().join(otherwise.span());
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
            span,
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.consume(&Token::Or) || self.consume(&Token::OrOr) {
            let right = self.parse_and()?;
            let span = left.span().join(right.span());
            left = Expr::Or(Box::new(left), Box::new(right), span);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.consume(&Token::And) || self.consume(&Token::AndAnd) {
            let right = self.parse_not()?;
            let span = left.span().join(right.span());
            left = Expr::And(Box::new(left), Box::new(right), span);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.check(&Token::Not) || self.check(&Token::Bang) {
            let start = self.current_span();
            self.pos += 1;
            let operand = self.parse_not()?;
            let span = start.join(operand.span());
            return Ok(Expr::Unary(UnOp::Not, Box::new(operand), span));
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek_token() {
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::Ne,
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            Token::In => CmpOp::In,
            Token::Not if matches!(self.peek_nth(1), Token::In) => {
                self.pos += 2;
                return Some(CmpOp::NotIn);
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.parse_additive()?));
        }
        match rest.last() {
            None => Ok(left),
            Some((_, last)) => {
                let span = left.span().join(last.span());
                Ok(Expr::Compare(Box::new(left), rest, span))
            }
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            let span = left.span().join(right.span());
            left = Expr::Binary(Box::new(left), op, Box::new(right), span);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            let span = left.span().join(right.span());
            left = Expr::Binary(Box::new(left), op, Box::new(right), span);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(&Token::Minus) {
            let start = self.current_span();
            self.pos += 1;
            let operand = self.parse_unary()?;
            let span = start.join(operand.span());
            return Ok(Expr::Unary(UnOp::Neg, Box::new(operand), span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_token() {
                Token::Dot => {
                    self.pos += 1;
                    let span = self.current_span();
                    let name = match self.advance().map(|t| &t.token) {
                        Some(Token::Identifier(name)) => name.clone(),
                        _ => {
                            return Err(ExprError::Parse {
                                span,
                                message: "Expected attribute name after '.'".into(),
                            })
                        }
                    };
                    let span = expr.span().join(span);
                    expr = Expr::Attr(Box::new(expr), name, span);
                }
                Token::LParen => {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    let end = self.expect(Token::RParen, "')' to close call")?;
                    let span = expr.span().join(end);
                    expr = Expr::Call(Box::new(expr), args, span);
                }
                Token::LBracket => {
                    self.pos += 1;
                    let index = self.parse_ternary()?;
                    let end = self.expect(Token::RBracket, "']' to close subscript")?;
                    let span = expr.span().join(end);
                    expr = Expr::Index(Box::new(expr), Box::new(index), span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.check(&Token::RParen) && !self.check(&Token::Eof) {
            let keyword = match (self.peek_token(), self.peek_nth(1)) {
                (Token::Identifier(name), Token::Eq) => Some(name.clone()),
                _ => None,
            };
            match keyword {
                Some(name) => {
                    self.pos += 2;
                    args.push(Arg::Keyword(name, self.parse_ternary()?));
                }
                None => {
                    if args.iter().any(|a| matches!(a, Arg::Keyword(..))) {
                        return Err(self.error("Positional argument follows keyword argument"));
                    }
                    args.push(Arg::Positional(self.parse_ternary()?));
                }
            }
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(token) = self.advance().cloned() else {
            return Err(self.error("Unexpected end of input"));
        };
        let span = token.span;
        let expr = match token.token {
            Token::IntLiteral(i) => Expr::Literal(Value::Int(i), span),
            Token::FloatLiteral(x) => Expr::Literal(Value::Float(x), span),
            Token::StringLiteral(s) => Expr::Literal(Value::Str(s), span),
            Token::True => Expr::Literal(Value::Bool(true), span),
            Token::False => Expr::Literal(Value::Bool(false), span),
            Token::None => Expr::Literal(Value::None, span),
            Token::Identifier(name) => Expr::Name(name, span),
            Token::LParen => {
                let inner = self.parse_ternary()?;
                self.expect(Token::RParen, "')'")?;
                inner
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while !self.check(&Token::RBracket) && !self.check(&Token::Eof) {
                    items.push(self.parse_ternary()?);
                    if !self.consume(&Token::Comma) {
                        break;
                    }
                }
                let end = self.expect(Token::RBracket, "']' to close list")?;
                Expr::List(items, span.join(end))
            }
            Token::Eof => {
                return Err(ExprError::Parse {
                    span,
                    message: "Unexpected end of input".into(),
                })
            }
            other => {
                return Err(ExprError::Parse {
                    span,
                    message: format!("Unexpected token {:?}", other),
                })
            }
        };
        Ok(expr)
    }
}

/// Parse expression source into a syntax tree
pub fn parse_expr(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    Parser::new(&tokens).parse()
}
