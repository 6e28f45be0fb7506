use super::{BinOp, ExprError, Func, Node};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Semi,
    End,
}

/// Recursive-descent parser over the raw source text.
///
/// Grammar, loosest binding first:
///
/// ```text
/// expr    := sum (';' sum)*
/// sum     := term (('+' | '-') term)*
/// term    := factor (('*' | '/') factor)*
/// factor  := signed ('^' signed)*      // left-associative, sign covers the chain
/// signed  := ('+' | '-')? primary
/// primary := number | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'
/// ```
pub(super) struct Parser<'a> {
    src: &'a str,
    pos: usize,
    peeked: Option<(Token, usize)>,
    var_names: &'a [&'a str],
}

impl<'a> Parser<'a> {
    pub(super) fn new(src: &'a str, var_names: &'a [&'a str]) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
            var_names,
        }
    }

    pub(super) fn parse(mut self) -> Result<Node, ExprError> {
        if self.src.trim().is_empty() {
            return Err(ExprError::Empty);
        }

        let root = self.parse_expr()?;
        match self.next()? {
            (Token::End, _) => Ok(root),
            (_, pos) => Err(ExprError::Trailing { pos }),
        }
    }

    fn parse_expr(&mut self) -> Result<Node, ExprError> {
        let first = self.parse_sum()?;
        if self.peek()? != &Token::Semi {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.peek()? == &Token::Semi {
            self.next()?;
            items.push(self.parse_sum()?);
        }
        Ok(Node::Seq(items))
    }

    fn parse_sum(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek()? {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.next()?;
            let rhs = self.parse_term()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_term(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek()? {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.next()?;
            let rhs = self.parse_factor()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_factor(&mut self) -> Result<Node, ExprError> {
        let negate = self.parse_sign()?;
        let mut base = self.parse_primary()?;

        while self.peek()? == &Token::Caret {
            self.next()?;
            let exponent = self.parse_signed()?;
            base = Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent));
        }

        Ok(if negate { Node::Neg(Box::new(base)) } else { base })
    }

    fn parse_signed(&mut self) -> Result<Node, ExprError> {
        let negate = self.parse_sign()?;
        let node = self.parse_primary()?;
        Ok(if negate { Node::Neg(Box::new(node)) } else { node })
    }

    fn parse_sign(&mut self) -> Result<bool, ExprError> {
        match self.peek()? {
            Token::Minus => {
                self.next()?;
                Ok(true)
            }
            Token::Plus => {
                self.next()?;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let (token, pos) = self.next()?;
        match token {
            Token::Num(value) => Ok(Node::Const(value)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect_close()?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek()? == &Token::LParen {
                    self.next()?;
                    self.parse_call(name, pos)
                } else {
                    self.resolve_identifier(name, pos)
                }
            }
            Token::End => Err(ExprError::UnexpectedEnd),
            other => Err(ExprError::UnexpectedChar {
                ch: Self::token_char(&other),
                pos,
            }),
        }
    }

    fn parse_call(&mut self, name: String, pos: usize) -> Result<Node, ExprError> {
        let func = Func::lookup(&name).ok_or_else(|| ExprError::UnknownFunction {
            name: name.clone(),
            pos,
        })?;

        let mut args = vec![self.parse_expr()?];
        while self.peek()? == &Token::Comma {
            self.next()?;
            args.push(self.parse_expr()?);
        }
        self.expect_close()?;

        let (min, max, expected) = func.arity();
        if args.len() < min || args.len() > max {
            return Err(ExprError::Arity {
                name,
                expected,
                got: args.len(),
            });
        }

        Ok(Node::Call(func, args))
    }

    fn resolve_identifier(&self, name: String, pos: usize) -> Result<Node, ExprError> {
        if let Some(index) = self.var_names.iter().position(|var| *var == name) {
            return Ok(Node::Var(index));
        }

        match name.as_str() {
            "PI" => Ok(Node::Const(std::f64::consts::PI)),
            "E" => Ok(Node::Const(std::f64::consts::E)),
            "PHI" => Ok(Node::Const(1.618_033_988_749_895)),
            _ => Err(ExprError::UnknownIdentifier { name, pos }),
        }
    }

    fn expect_close(&mut self) -> Result<(), ExprError> {
        match self.next()? {
            (Token::RParen, _) => Ok(()),
            (_, pos) => Err(ExprError::UnbalancedParen { pos }),
        }
    }

    fn token_char(token: &Token) -> char {
        match token {
            Token::Plus => '+',
            Token::Minus => '-',
            Token::Star => '*',
            Token::Slash => '/',
            Token::Caret => '^',
            Token::LParen => '(',
            Token::RParen => ')',
            Token::Comma => ',',
            Token::Semi => ';',
            _ => '?',
        }
    }

    fn peek(&mut self) -> Result<&Token, ExprError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lex()?);
        }
        match &self.peeked {
            Some((token, _)) => Ok(token),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn next(&mut self) -> Result<(Token, usize), ExprError> {
        match self.peeked.take() {
            Some(peeked) => Ok(peeked),
            None => self.lex(),
        }
    }

    fn lex(&mut self) -> Result<(Token, usize), ExprError> {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();

        let start = self.pos;
        let Some(ch) = trimmed.chars().next() else {
            return Ok((Token::End, start));
        };

        let single = match ch {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semi),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok((token, start));
        }

        if ch.is_ascii_digit() || ch == '.' {
            return self.lex_number(start);
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let len = trimmed
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(trimmed.len());
            self.pos += len;
            return Ok((Token::Ident(trimmed[..len].to_string()), start));
        }

        Err(ExprError::UnexpectedChar { ch, pos: start })
    }

    fn lex_number(&mut self, start: usize) -> Result<(Token, usize), ExprError> {
        let bytes = self.src.as_bytes();
        let mut end = start;

        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }

        // Exponent only counts when digits follow, so "2e" stays an error below
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp_end = end + 1;
            if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
                exp_end += 1;
            }
            let digits_start = exp_end;
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            if exp_end > digits_start {
                end = exp_end;
            }
        }

        let text = &self.src[start..end];
        let value = text.parse::<f64>().map_err(|_| ExprError::InvalidNumber {
            text: text.to_string(),
            pos: start,
        })?;

        self.pos = end;
        Ok((Token::Num(value), start))
    }
}
