use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

const NEARBY_BEFORE: usize = 10;
const NEARBY_AFTER: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    Return,

    // Symbols
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dash,

    // Relational operators, `<` and `>` double as arrow heads
    LessThan,
    Equals,
    GreaterThan,

    // Literals. Numbers keep their source text.
    String(String),
    Number(String),

    Identifier(String),
    /// `:name`, stored without the colon.
    Label(String),

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Byte offset of the first character.
    pub offset: usize,
}

/// A window of `input` around `offset`, for error messages.
pub fn nearby(input: &str, offset: usize) -> String {
    let offset = offset.min(input.len());
    let (head, tail) = input.split_at(offset);
    let before: Vec<char> = head.chars().rev().take(NEARBY_BEFORE).collect();
    let mut window: String = before.into_iter().rev().collect();
    window.extend(tail.chars().take(NEARBY_AFTER));
    window
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token {
            token_type: TokenType::Eof,
            offset: self.position,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        let start = self.position;
        let Some(char) = self.advance() else {
            return Ok(None);
        };

        if char == '"' {
            return Ok(Some(self.read_string(start)?));
        }

        if char.is_ascii_digit() || (char == '.' && self.peek_is_digit()) {
            return Ok(Some(self.read_number(char, start)?));
        }

        // A sign directly followed by a digit starts a number; a lone `-`
        // is an edge dash.
        if (char == '-' || char == '+') && (self.peek_is_digit() || self.peek_is_dot()) {
            return Ok(Some(self.read_number(char, start)?));
        }

        if char.is_alphabetic() || char == '_' {
            return Ok(Some(self.read_identifier(char, start)));
        }

        let token_type = match char {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '[' => TokenType::LeftBracket,
            ']' => TokenType::RightBracket,
            ',' => TokenType::Comma,
            '-' => TokenType::Dash,
            '<' => TokenType::LessThan,
            '=' => TokenType::Equals,
            '>' => TokenType::GreaterThan,
            ':' => {
                let name = self.read_word();
                if name.is_empty() {
                    return Err(self.error("expected a label name after `:`", start));
                }
                TokenType::Label(name)
            }
            _ => {
                return Err(self.error(format!("unexpected character `{char}`"), start));
            }
        };

        Ok(Some(Token {
            token_type,
            offset: start,
        }))
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> Error {
        Error::parse(message, nearby(self.input, offset))
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek_is_digit(&mut self) -> bool {
        matches!(self.chars.peek(), Some(c) if c.is_ascii_digit())
    }

    fn peek_is_dot(&mut self) -> bool {
        matches!(self.chars.peek(), Some('.'))
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, start: usize) -> Result<Token> {
        let mut value = String::new();
        while let Some(c) = self.advance() {
            match c {
                '"' => {
                    return Ok(Token {
                        token_type: TokenType::String(value),
                        offset: start,
                    });
                }
                // A backslash takes the next character literally.
                '\\' => match self.advance() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                _ => value.push(c),
            }
        }
        Err(self.error("unterminated string literal", start))
    }

    fn read_number(&mut self, first: char, start: usize) -> Result<Token> {
        let mut value = String::new();
        value.push(first);
        let mut dots = usize::from(first == '.');
        let mut digits = usize::from(first.is_ascii_digit());

        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                digits += 1;
            } else if c == '.' {
                dots += 1;
            } else {
                break;
            }
            value.push(c);
            self.advance();
        }

        if dots > 1 {
            return Err(self.error(format!("malformed number `{value}`"), start));
        }
        if digits == 0 {
            return Err(self.error("expected a digit in number", start));
        }
        Ok(Token {
            token_type: TokenType::Number(value),
            offset: start,
        })
    }

    fn read_word(&mut self) -> String {
        let mut value = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }
        value
    }

    fn read_identifier(&mut self, first: char, start: usize) -> Token {
        let mut value = String::new();
        value.push(first);
        value.push_str(&self.read_word());

        let token_type = match value.to_ascii_lowercase().as_str() {
            "select" => TokenType::Select,
            "return" => TokenType::Return,
            _ => TokenType::Identifier(value),
        };
        Token {
            token_type,
            offset: start,
        }
    }
}
