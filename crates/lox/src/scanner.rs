//! Single-pass lexical scanner: source text → ordered token stream.

use std::rc::Rc;

use crate::diagnostics::Diagnostics;
use crate::token::{Token, TokenKind, TokenLiteral, keyword};

/// Scans an entire source string into tokens, reporting lexical errors through
/// `diagnostics` as it goes rather than failing on the first one.
pub struct Scanner<'a> {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &str, diagnostics: &'a mut Diagnostics) -> Self {
        Self { source: source.chars().collect(), tokens: Vec::new(), start: 0, current: 0, line: 1, diagnostics }
    }

    /// Consumes the scanner, returning every token found plus a terminal `Eof`.
    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens.push(Token::eof(self.line));
        self.tokens
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            '-' => self.add_token(TokenKind::Minus),
            '+' => self.add_token(TokenKind::Plus),
            ';' => self.add_token(TokenKind::Semicolon),
            '*' => self.add_token(TokenKind::Star),
            '!' => {
                let kind = if self.match_char('=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') { TokenKind::LessEqual } else { TokenKind::Less };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.add_token(kind);
            }
            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if is_alpha(c) => self.identifier(),
            _ => self.diagnostics.error(self.line, "Unexpected character."),
        }
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.diagnostics.error(self.line, "Unterminated string.");
            return;
        }

        // Consume the closing quote.
        self.advance();

        let value: String = self.source[self.start + 1..self.current - 1].iter().collect();
        self.add_token_with_literal(TokenKind::String, Some(TokenLiteral::Str(Rc::from(value))));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let value: f64 = text.parse().expect("number lexeme must parse as f64");
        self.add_token_with_literal(TokenKind::Number, Some(TokenLiteral::Number(value)));
    }

    fn identifier(&mut self) {
        while is_alphanumeric(self.peek()) {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = keyword(&text).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.add_token_with_literal(kind, None);
    }

    fn add_token_with_literal(&mut self, kind: TokenKind, literal: Option<TokenLiteral>) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, literal, self.line));
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alphanumeric(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        Scanner::new(source, &mut diagnostics).scan_tokens().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_single_and_double_char_operators() {
        let kinds = scan("!= == <= >= = < >");
        assert_eq!(
            kinds,
            vec![
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comment_consumes_to_end_of_line_but_newline_still_counts() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("// comment\nvar", &mut diagnostics).scan_tokens();
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn multiline_string_increments_line() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("\"a\nb\"", &mut diagnostics).scan_tokens();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[0].literal, Some(TokenLiteral::Str(Rc::from("a\nb"))));
    }

    #[test]
    fn unterminated_string_reports_error_at_start_line() {
        let mut diagnostics = Diagnostics::new();
        let _ = Scanner::new("\"a", &mut diagnostics).scan_tokens();
        assert!(diagnostics.had_error());
    }

    #[test]
    fn keywords_are_classified() {
        let kinds = scan("and class fun nil orchard");
        assert_eq!(
            kinds,
            vec![TokenKind::And, TokenKind::Class, TokenKind::Fun, TokenKind::Nil, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn unknown_character_is_skipped_and_reported() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("@var", &mut diagnostics).scan_tokens();
        assert!(diagnostics.had_error());
        assert_eq!(tokens[0].kind, TokenKind::Var);
    }
}
