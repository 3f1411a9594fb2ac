//! Token cursor over one lexed trace line
//!
//! Every helper reports failures as a `LineError` pointing at the offending
//! token, so the caller only has to attach the line number.

use smtrace_core::{Span, TraceErrorKind};
use smtrace_lexer::{SpannedToken, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub kind: TraceErrorKind,
    pub span: Span,
}

impl LineError {
    #[must_use]
    pub const fn new(kind: TraceErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

pub type LineResult<T> = Result<T, LineError>;

pub struct Cursor<'t, 'input> {
    input: &'input str,
    tokens: &'t [SpannedToken<'input>],
    pos: usize,
}

impl<'t, 'input> Cursor<'t, 'input> {
    /// `tokens` must end with `Token::Eol`
    #[must_use]
    pub const fn new(input: &'input str, tokens: &'t [SpannedToken<'input>]) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
        }
    }

    #[must_use]
    pub fn peek(&self) -> SpannedToken<'input> {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[must_use]
    pub fn peek_is(&self, token: Token) -> bool {
        self.peek().token == token
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        self.peek_is(Token::Eol)
    }

    /// Advance; stays on `Eol` once reached
    pub fn bump(&mut self) -> SpannedToken<'input> {
        let tok = self.peek();
        if tok.token != Token::Eol {
            self.pos += 1;
        }
        tok
    }

    pub fn eat(&mut self, token: Token) -> Option<SpannedToken<'input>> {
        if self.peek_is(token) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn unexpected(tok: SpannedToken<'_>, what: &'static str) -> LineError {
        let kind = match tok.token {
            Token::Eol => TraceErrorKind::MissingField(what),
            Token::Error => TraceErrorKind::Lexical(tok.text.to_string()),
            _ => TraceErrorKind::UnexpectedToken {
                expected: what,
                found: tok.text.to_string(),
            },
        };
        LineError::new(kind, tok.span)
    }

    /// # Errors
    ///
    /// `MissingField` at end of line, `UnexpectedToken` otherwise
    pub fn expect(&mut self, token: Token, what: &'static str) -> LineResult<SpannedToken<'input>> {
        let tok = self.peek();
        if tok.token == token {
            Ok(self.bump())
        } else {
            Err(Self::unexpected(tok, what))
        }
    }

    /// A symbol such as a function or quantifier name.
    ///
    /// Indexed names like `(_ extract 7 0)` are taken as one symbol.
    ///
    /// # Errors
    ///
    /// Fails on end of line, `;`, or an unbalanced group
    pub fn symbol(&mut self, what: &'static str) -> LineResult<&'input str> {
        let tok = self.peek();
        match tok.token {
            Token::Word
            | Token::Number
            | Token::QuotedSymbol
            | Token::Fingerprint
            | Token::TermId => Ok(self.bump().text),
            Token::LParen => self.group(),
            _ => Err(Self::unexpected(tok, what)),
        }
    }

    fn group(&mut self) -> LineResult<&'input str> {
        let open = self.bump();
        let mut depth = 1usize;
        loop {
            let tok = self.bump();
            match tok.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&self.input[open.span.start..tok.span.end]);
                    }
                }
                Token::Eol => return Err(Self::unexpected(tok, "`)`")),
                Token::Error => return Err(Self::unexpected(tok, "`)`")),
                _ => {}
            }
        }
    }

    /// # Errors
    ///
    /// Fails if the next token is not a decimal number that fits in `usize`
    pub fn number(&mut self, what: &'static str) -> LineResult<usize> {
        let tok = self.expect(Token::Number, what)?;
        tok.text.parse().map_err(|_| {
            LineError::new(
                TraceErrorKind::UnexpectedToken {
                    expected: what,
                    found: tok.text.to_string(),
                },
                tok.span,
            )
        })
    }

    /// Raw text from the current token to the end of the line
    #[must_use]
    pub fn rest(&self) -> &'input str {
        let start = self.peek().span.start;
        self.input[start..].trim_end()
    }

    /// Consume everything up to the end of the line
    pub fn skip_rest(&mut self) {
        while !self.at_end() {
            self.bump();
        }
    }

    /// # Errors
    ///
    /// `TrailingData` if anything but the end of line follows
    pub fn finish(&mut self) -> LineResult<()> {
        let tok = self.peek();
        match tok.token {
            Token::Eol => Ok(()),
            Token::Error => Err(Self::unexpected(tok, "end of line")),
            _ => Err(LineError::new(
                TraceErrorKind::TrailingData(self.rest().to_string()),
                tok.span,
            )),
        }
    }
}
