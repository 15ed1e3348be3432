use blockq_core::{QueryError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    Order,
    By,
    Limit,
    And,
    Or,
    Asc,
    Desc,
    True,
    False,

    // Operators
    Star,
    Minus,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Semicolon,

    // Literals
    Number(String),
    String(String),
    Timestamp(String),
    Identifier(String),

    // Special
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Select => f.write_str("SELECT"),
            Token::From => f.write_str("FROM"),
            Token::Where => f.write_str("WHERE"),
            Token::Order => f.write_str("ORDER"),
            Token::By => f.write_str("BY"),
            Token::Limit => f.write_str("LIMIT"),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Asc => f.write_str("ASC"),
            Token::Desc => f.write_str("DESC"),
            Token::True => f.write_str("TRUE"),
            Token::False => f.write_str("FALSE"),
            Token::Star => f.write_str("*"),
            Token::Minus => f.write_str("-"),
            Token::Equal => f.write_str("="),
            Token::NotEqual => f.write_str("!="),
            Token::Less => f.write_str("<"),
            Token::LessEqual => f.write_str("<="),
            Token::Greater => f.write_str(">"),
            Token::GreaterEqual => f.write_str(">="),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Semicolon => f.write_str(";"),
            Token::Number(n) => f.write_str(n),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Timestamp(t) => f.write_str(t),
            Token::Identifier(id) => f.write_str(id),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while self.position < self.input.len() {
            self.skip_whitespace();

            if self.position >= self.input.len() {
                break;
            }

            tokens.push(self.next_token()?);
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        let token = match ch {
            '*' => {
                self.advance();
                Token::Star
            }
            '-' => {
                self.advance();
                Token::Minus
            }
            '=' => {
                self.advance();
                Token::Equal
            }
            '<' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    Token::LessEqual
                } else if self.current_char() == '>' {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Less
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    Token::NotEqual
                } else {
                    return Err(QueryError::Syntax("Unexpected character '!'".to_string()));
                }
            }
            '(' => {
                self.advance();
                Token::LeftParen
            }
            ')' => {
                self.advance();
                Token::RightParen
            }
            ',' => {
                self.advance();
                Token::Comma
            }
            ';' => {
                self.advance();
                Token::Semicolon
            }
            '\'' | '"' => self.read_string()?,
            _ if ch.is_ascii_digit() && self.at_date() => self.read_timestamp(),
            _ if ch.is_ascii_digit() => self.read_number()?,
            _ if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
            _ => {
                return Err(QueryError::Syntax(format!(
                    "Unexpected character: '{}'",
                    ch
                )));
            }
        };

        Ok(token)
    }

    fn read_string(&mut self) -> Result<Token> {
        let quote = self.current_char();
        self.advance();

        let mut value = String::new();
        while self.position < self.input.len() && self.current_char() != quote {
            value.push(self.current_char());
            self.advance();
        }

        if self.position >= self.input.len() {
            return Err(QueryError::Syntax("Unterminated string".to_string()));
        }

        self.advance(); // closing quote
        Ok(Token::String(value))
    }

    fn read_number(&mut self) -> Result<Token> {
        let mut number = String::new();
        let mut seen_dot = false;

        while self.position < self.input.len()
            && (self.current_char().is_ascii_digit() || self.current_char() == '.')
        {
            if self.current_char() == '.' {
                if seen_dot {
                    return Err(QueryError::Syntax(format!("Invalid number: {}.", number)));
                }
                seen_dot = true;
            }
            number.push(self.current_char());
            self.advance();
        }

        if self.current_char().is_alphabetic() || self.current_char() == '_' {
            return Err(QueryError::Syntax(format!(
                "Invalid number: {}{}",
                number,
                self.current_char()
            )));
        }

        Ok(Token::Number(number))
    }

    /// `YYYY-MM-DD` at the current position starts an unquoted timestamp.
    fn at_date(&self) -> bool {
        let window: Vec<char> = self
            .input
            .iter()
            .skip(self.position)
            .take(10)
            .copied()
            .collect();
        window.len() == 10
            && window.iter().enumerate().all(|(i, c)| match i {
                4 | 7 => *c == '-',
                _ => c.is_ascii_digit(),
            })
    }

    fn read_timestamp(&mut self) -> Token {
        let mut text = String::new();

        while self.position < self.input.len() {
            let c = self.current_char();
            if c.is_ascii_digit() || matches!(c, '-' | ':' | '.' | '+' | 'T' | 'Z' | 't' | 'z') {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        Token::Timestamp(text)
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while self.position < self.input.len()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "LIMIT" => Token::Limit,
            "AND" => Token::And,
            "OR" => Token::Or,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            _ => Token::Identifier(ident),
        }
    }

    fn current_char(&self) -> char {
        if self.position < self.input.len() {
            self.input[self.position]
        } else {
            '\0'
        }
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.current_char().is_whitespace() {
            self.advance();
        }
    }
}
