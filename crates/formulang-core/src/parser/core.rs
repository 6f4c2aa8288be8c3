//! Parser state machine and low-level operations.

use rowan::{Checkpoint, GreenNode, GreenNodeBuilder, TextRange, TextSize};

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::Error;

use super::cst::{SyntaxKind, TokenSet};
use super::lexer::{lex, Token};

/// Limits the parser may exhaust. Exposed so embedding hosts can tune them.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Maximum number of token-consuming steps before aborting.
    pub exec_fuel: u32,
    /// Maximum nesting depth for recursive productions (expressions,
    /// composition reference paths).
    pub recursion_limit: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            recursion_limit: 256,
        }
    }
}

/// Result of a successful parse: a lossless green tree plus any diagnostics
/// accumulated along the way (parse failures are recoverable and reported as
/// diagnostics; only fuel/recursion exhaustion is a hard [`Error`]).
pub struct ParseResult {
    pub green: GreenNode,
    pub diagnostics: Diagnostics,
}

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    builder: GreenNodeBuilder<'static>,
    diagnostics: Diagnostics,
    fuel: u32,
    depth: u32,
    config: ParserConfig,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, config: ParserConfig) -> Self {
        Self {
            source,
            tokens: lex(source),
            pos: 0,
            builder: GreenNodeBuilder::new(),
            diagnostics: Diagnostics::new(),
            fuel: config.exec_fuel,
            depth: 0,
            config,
        }
    }

    // -- token stream -----------------------------------------------------

    /// Index of the next non-trivia token, or `self.tokens.len()` at EOF.
    fn skip_trivia_from(&self, mut i: usize) -> usize {
        while i < self.tokens.len() && self.tokens[i].kind.is_trivia() {
            i += 1;
        }
        i
    }

    pub fn current(&self) -> SyntaxKind {
        let i = self.skip_trivia_from(self.pos);
        self.tokens.get(i).map(|t| t.kind).unwrap_or(SyntaxKind::Error)
    }

    pub fn at(&self, kind: SyntaxKind) -> bool {
        self.current() == kind
    }

    pub fn at_set(&self, set: TokenSet) -> bool {
        set.contains(self.current())
    }

    pub fn at_eof(&self) -> bool {
        self.skip_trivia_from(self.pos) >= self.tokens.len()
    }

    pub fn current_range(&self) -> TextRange {
        let i = self.skip_trivia_from(self.pos);
        self.tokens
            .get(i)
            .map(|t| t.span)
            .unwrap_or_else(|| TextRange::empty(TextSize::from(self.source.len() as u32)))
    }

    /// Consumes tokens up to and including the next non-trivia token,
    /// attaching every consumed token (trivia included) to the tree as a
    /// leading-trivia-then-token sequence.
    pub fn bump(&mut self) -> Result<(), Error> {
        self.tick()?;
        while self.pos < self.tokens.len() && self.tokens[self.pos].kind.is_trivia() {
            self.push_token(self.pos);
            self.pos += 1;
        }
        if self.pos < self.tokens.len() {
            self.push_token(self.pos);
            self.pos += 1;
        }
        Ok(())
    }

    fn push_token(&mut self, idx: usize) {
        let tok = self.tokens[idx];
        let source = self.source;
        let text = &source[std::ops::Range::<usize>::from(tok.span)];
        self.builder.token(rowan::SyntaxKind::from(tok.kind), text);
    }

    /// Consumes a token expected to be `kind`; emits a diagnostic and leaves
    /// the cursor in place (caller decides whether to recover) if it isn't.
    pub fn expect(&mut self, kind: SyntaxKind) -> Result<bool, Error> {
        if self.at(kind) {
            self.bump()?;
            Ok(true)
        } else {
            let range = self.current_range();
            self.diagnostics
                .error(
                    DiagnosticCode::ParseUnexpectedToken,
                    format!("expected {:?}, found {:?}", kind, self.current()),
                    range,
                )
                .emit();
            Ok(false)
        }
    }

    fn tick(&mut self) -> Result<(), Error> {
        if self.fuel == 0 {
            return Err(Error::ExecFuelExhausted);
        }
        self.fuel -= 1;
        Ok(())
    }

    // -- recursion guard ----------------------------------------------------

    pub fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.config.recursion_limit {
            return Err(Error::RecursionLimitExceeded);
        }
        Ok(())
    }

    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // -- tree building ------------------------------------------------------

    pub fn start_node(&mut self, kind: SyntaxKind) {
        self.builder.start_node(rowan::SyntaxKind::from(kind));
    }

    pub fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.builder.checkpoint()
    }

    pub fn start_node_at(&mut self, checkpoint: Checkpoint, kind: SyntaxKind) {
        self.builder
            .start_node_at(checkpoint, rowan::SyntaxKind::from(kind));
    }

    /// Wraps a single unexpected token in an `Error` node and consumes it,
    /// so the parser always makes progress on malformed input.
    pub fn error_and_bump(&mut self, message: impl Into<String>) -> Result<(), Error> {
        let range = self.current_range();
        self.diagnostics
            .error(DiagnosticCode::ParseUnexpectedToken, message, range)
            .emit();
        self.start_node(SyntaxKind::Error);
        self.bump()?;
        self.finish_node();
        Ok(())
    }

    /// Skips tokens until one in `recovery` (or EOF) is reached, wrapping
    /// the skipped span in a single `Error` node.
    pub fn recover_until(&mut self, recovery: TokenSet) -> Result<(), Error> {
        if self.at_eof() || self.at_set(recovery) {
            return Ok(());
        }
        self.start_node(SyntaxKind::Error);
        while !self.at_eof() && !self.at_set(recovery) {
            self.bump()?;
        }
        self.finish_node();
        Ok(())
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn finish(self) -> ParseResult {
        let green = self.builder.finish();
        ParseResult {
            green,
            diagnostics: self.diagnostics,
        }
    }
}
