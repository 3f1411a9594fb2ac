//! Lexical analysis for Z3 trace logs
//!
//! Tokenizes a single `trace=true` log line using logos. Lines look like
//! `[mk-app] #12 f #10 #11` or `[new-match] 0x5581 #30 #28 #12 ; #19 (#20 #21)`.

use logos::Logos;
use smtrace_core::Span;

/// Trace line tokens
#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token {
    /// Line kind, e.g. `[mk-app]`
    #[regex(r"\[[a-z][a-z0-9\-]*\]", priority = 10)]
    Tag,

    /// Term identifier with optional namespace: `#12`, `datatype#3`
    #[regex(r"[A-Za-z0-9_\-]*#[0-9]+", priority = 8)]
    TermId,

    /// Match fingerprint
    #[regex(r"0x[0-9a-fA-F]+", priority = 10)]
    Fingerprint,

    #[regex(r"[0-9]+", priority = 5)]
    Number,

    #[token(";")]
    Semicolon,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    /// Bar-quoted symbol: `|x|`
    #[regex(r"\|[^|]*\|")]
    QuotedSymbol,

    /// Any other symbol: function names, theories, methods
    #[regex(r"[^\s();|]+", priority = 1)]
    Word,

    /// Whitespace (ignored)
    #[regex(r"[ \t\f\r\n]+", logos::skip)]
    Whitespace,

    /// End of line
    Eol,

    /// Lexer error
    Error,
}

impl Token {
    /// Human readable token class, used in parse errors
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Tag => "line tag",
            Self::TermId => "term id",
            Self::Fingerprint => "fingerprint",
            Self::Number => "number",
            Self::Semicolon => "`;`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::QuotedSymbol => "quoted symbol",
            Self::Word => "symbol",
            Self::Whitespace => "whitespace",
            Self::Eol => "end of line",
            Self::Error => "invalid input",
        }
    }
}

/// Token with location information
#[derive(Debug, Clone, Copy)]
pub struct SpannedToken<'input> {
    pub token: Token,
    pub span: Span,
    pub text: &'input str,
}

/// Lexer that produces tokens with spans for one line
pub struct Lexer<'input> {
    lexer: logos::Lexer<'input, Token>,
    input: &'input str,
}

impl<'input> Lexer<'input> {
    #[must_use]
    pub fn new(input: &'input str) -> Self {
        Self {
            lexer: Token::lexer(input),
            input,
        }
    }

    /// Get the next token with span information
    pub fn next_token(&mut self) -> SpannedToken<'input> {
        match self.lexer.next() {
            Some(Ok(token)) => {
                let span = self.lexer.span();
                SpannedToken {
                    token,
                    span: Span::new(span.start, span.end),
                    text: &self.input[span],
                }
            }
            Some(Err(())) => {
                let span = self.lexer.span();
                SpannedToken {
                    token: Token::Error,
                    span: Span::new(span.start, span.end),
                    text: &self.input[span],
                }
            }
            None => SpannedToken {
                token: Token::Eol,
                span: Span::new(self.input.len(), self.input.len()),
                text: "",
            },
        }
    }

    /// Tokenize the entire line; the last token is always `Eol`
    pub fn tokenize(&mut self) -> Vec<SpannedToken<'input>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eol = token.token == Token::Eol;
            tokens.push(token);
            if is_eol {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_mk_app_line() {
        let mut lexer = Lexer::new("[mk-app] #12 f #10 #11");
        let tokens = lexer.tokenize();

        assert_eq!(tokens.len(), 6); // tag, id, name, id, id, EOL
        assert_eq!(tokens[0].token, Token::Tag);
        assert_eq!(tokens[0].text, "[mk-app]");
        assert_eq!(tokens[1].token, Token::TermId);
        assert_eq!(tokens[1].text, "#12");
        assert_eq!(tokens[2].token, Token::Word);
        assert_eq!(tokens[2].text, "f");
        assert_eq!(tokens[5].token, Token::Eol);
    }

    #[test]
    fn test_span_tracking() {
        let tokens = Lexer::new("[push] 3").tokenize();

        assert_eq!(tokens[0].span.start, 0);
        assert_eq!(tokens[0].span.end, 6);
        assert_eq!(tokens[1].span.start, 7);
        assert_eq!(tokens[1].span.end, 8);
    }

    #[test]
    fn test_namespaced_term_id() {
        let tokens = Lexer::new("[mk-var] datatype#2 0").tokenize();
        assert_eq!(tokens[1].token, Token::TermId);
        assert_eq!(tokens[1].text, "datatype#2");
        assert_eq!(tokens[2].token, Token::Number);
    }

    #[test]
    fn test_new_match_line() {
        assert_eq!(
            kinds("[new-match] 0x55d4 #30 #28 #12 ; #19 (#20 #21)"),
            vec![
                Token::Tag,
                Token::Fingerprint,
                Token::TermId,
                Token::TermId,
                Token::TermId,
                Token::Semicolon,
                Token::TermId,
                Token::LParen,
                Token::TermId,
                Token::TermId,
                Token::RParen,
                Token::Eol,
            ]
        );
    }

    #[test]
    fn test_var_names() {
        let tokens = Lexer::new("[attach-var-names] #40 (|x| ; |Int|)").tokenize();
        assert_eq!(tokens[2].token, Token::LParen);
        assert_eq!(tokens[3].token, Token::QuotedSymbol);
        assert_eq!(tokens[3].text, "|x|");
        assert_eq!(tokens[4].token, Token::Semicolon);
        assert_eq!(tokens[5].token, Token::QuotedSymbol);
        assert_eq!(tokens[6].token, Token::RParen);
    }

    #[test]
    fn test_symbols_are_words() {
        let test_cases = vec!["+", "<=", "k!0", "forall", "theory-solving", "4.12.2", "Z3", "-1"];

        for input in test_cases {
            let tokens = Lexer::new(input).tokenize();
            assert_eq!(tokens.len(), 2, "{input}"); // word, EOL
            assert_eq!(tokens[0].token, Token::Word, "{input}");
            assert_eq!(tokens[0].text, input);
        }
    }

    #[test]
    fn test_word_containing_hash_stays_one_token() {
        let tokens = Lexer::new("[mk-app] #3 call@x#0 #2").tokenize();
        assert_eq!(tokens[2].token, Token::Word);
        assert_eq!(tokens[2].text, "call@x#0");
        assert_eq!(tokens[3].token, Token::TermId);
    }

    #[test]
    fn test_number_and_fingerprint_precedence() {
        assert_eq!(kinds("42"), vec![Token::Number, Token::Eol]);
        assert_eq!(kinds("0x2a"), vec![Token::Fingerprint, Token::Eol]);
        assert_eq!(kinds("0"), vec![Token::Number, Token::Eol]);
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let tokens = Lexer::new("|x").tokenize();
        assert_eq!(tokens[0].token, Token::Error);
    }
}
