use crate::error::ParseError;
use crate::token::{Token, TokenKind};

/// Byte-based scanner producing the full token stream in one pass.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(byte)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek2() == Some(b'*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek2() == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ParseError::new(
                                    "unterminated block comment",
                                    line,
                                    col,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;

        let (line, col) = (self.line, self.col);
        let byte = match self.peek() {
            Some(b) => b,
            None => return Ok(Token::new(TokenKind::Eof, line, col)),
        };

        if byte.is_ascii_digit() {
            return self.number(line, col);
        }
        if byte == b'_' || byte.is_ascii_alphabetic() {
            return Ok(self.ident(line, col));
        }
        if byte == b'"' {
            return self.string(line, col);
        }

        self.bump();
        let kind = match byte {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'.' => TokenKind::Dot,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.bump();
                    TokenKind::AndAnd
                } else {
                    return Err(ParseError::new("unexpected character '&'", line, col));
                }
            }
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.bump();
                    TokenKind::OrOr
                } else {
                    return Err(ParseError::new("unexpected character '|'", line, col));
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", other as char),
                    line,
                    col,
                ));
            }
        };
        Ok(Token::new(kind, line, col))
    }

    fn number(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek2(), Some(b) if b.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| ParseError::new("invalid number literal", line, col))?;

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| ParseError::new("invalid float literal", line, col))?;
            Ok(Token::new(TokenKind::Float(value), line, col))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| ParseError::new("integer literal out of range", line, col))?;
            Ok(Token::new(TokenKind::Int(value), line, col))
        }
    }

    fn ident(&mut self, line: u32, col: u32) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b == b'_' || b.is_ascii_alphanumeric()) {
            self.bump();
        }
        // Start byte was checked ASCII, so the slice is valid UTF-8.
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        match TokenKind::keyword(text) {
            Some(kind) => Token::new(kind, line, col),
            None => Token::new(TokenKind::Ident(text.to_string()), line, col),
        }
    }

    fn string(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    return Ok(Token::new(TokenKind::Str(value), line, col));
                }
                Some(b'\\') => {
                    self.bump();
                    let escaped = match self.bump() {
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        Some(b'r') => '\r',
                        Some(b'\\') => '\\',
                        Some(b'"') => '"',
                        Some(b'0') => '\0',
                        _ => {
                            return Err(ParseError::new(
                                "invalid escape sequence",
                                self.line,
                                self.col,
                            ));
                        }
                    };
                    value.push(escaped);
                }
                Some(_) => {
                    let start = self.pos;
                    while matches!(self.peek(), Some(b) if b != b'"' && b != b'\\') {
                        self.bump();
                    }
                    let chunk = std::str::from_utf8(&self.src[start..self.pos])
                        .map_err(|_| ParseError::new("invalid UTF-8 in string", line, col))?;
                    value.push_str(chunk);
                }
                None => {
                    return Err(ParseError::new("unterminated string literal", line, col));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_numbers_and_operators() {
        assert_eq!(
            kinds("1 + 2.5 * x"),
            vec![
                TokenKind::Int(1),
                TokenKind::Plus,
                TokenKind::Float(2.5),
                TokenKind::Star,
                TokenKind::Ident("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_two_char_operators() {
        assert_eq!(
            kinds("if a == b && !c { return }"),
            vec![
                TokenKind::If,
                TokenKind::Ident("a".to_string()),
                TokenKind::EqEq,
                TokenKind::Ident("b".to_string()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("c".to_string()),
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_strings_with_escapes() {
        assert_eq!(
            kinds(r#""hi\n" "a\"b""#),
            vec![
                TokenKind::Str("hi\n".to_string()),
                TokenKind::Str("a\"b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        let src = "1 // line\n/* block\nstill */ 2";
        assert_eq!(
            kinds(src),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = Lexer::new("a\n  b").tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }

    #[test]
    fn rejects_unterminated_constructs() {
        assert!(Lexer::new("\"open").tokenize().is_err());
        assert!(Lexer::new("/* open").tokenize().is_err());
        assert!(Lexer::new("a & b").tokenize().is_err());
    }
}
