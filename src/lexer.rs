//! Lexical analysis of a shell input line.
//!
//! The shell has no quoting or escaping: a line is split on runs of whitespace and
//! each piece is classified by exact comparison against the operator literals.

use std::fmt;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Any text that is not an operator.
    Word,
    /// Input redirection, `<`.
    RedirectIn,
    /// Output redirection, `>`.
    RedirectOut,
    /// Error redirection, `2>`.
    RedirectErr,
    /// The pipe operator, `|`.
    Pipe,
    /// Background marker, `&`.
    Background,
}

impl TokenKind {
    /// Classifies a whitespace-free piece of input.
    pub fn classify(text: &str) -> Self {
        match text {
            "<" => TokenKind::RedirectIn,
            ">" => TokenKind::RedirectOut,
            "2>" => TokenKind::RedirectErr,
            "|" => TokenKind::Pipe,
            "&" => TokenKind::Background,
            _ => TokenKind::Word,
        }
    }

    pub fn is_operator(self) -> bool {
        self != TokenKind::Word
    }
}

/// A token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = TokenKind::classify(&text);
        Token { text, kind }
    }

    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Splits `line` into tokens.
///
/// Any string is lexically valid, so this never fails. Empty or blank input
/// yields an empty vector.
pub fn tokenize(line: &str) -> Vec<Token> {
    line.split_whitespace().map(Token::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        tokenize(line).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn blank_input_has_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t  ").is_empty());
    }

    #[test]
    fn splits_on_whitespace_runs() {
        let texts: Vec<String> = tokenize("  ls   -l\t/tmp ")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn classifies_every_operator() {
        use TokenKind::*;
        assert_eq!(
            kinds("cat < in > out 2> err | wc &"),
            vec![
                Word, RedirectIn, Word, RedirectOut, Word, RedirectErr, Word, Pipe, Word,
                Background
            ]
        );
    }

    #[test]
    fn operators_glued_to_words_are_words() {
        // No operator splitting inside a word: `a>b` is one plain token.
        assert_eq!(kinds("echo a>b 2>&1 &&"), vec![TokenKind::Word; 4]);
    }

    #[test]
    fn display_prints_token_text() {
        let token = Token::new("2>");
        assert_eq!(token.kind, TokenKind::RedirectErr);
        assert!(token.kind.is_operator());
        assert_eq!(token.to_string(), "2>");
    }
}
