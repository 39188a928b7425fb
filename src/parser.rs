//! Builds validated [`Command`]s out of a token sequence.

use crate::command::{Command, Pipeline, Stream};
use crate::lexer::{Token, TokenKind};
use thiserror::Error;

/// Reasons a line is rejected before anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("empty command")]
    EmptyCommand,
    #[error("only one '|' per line is supported")]
    MultiplePipes,
    #[error("missing target after '{0}'")]
    MissingTarget(Stream),
    #[error("invalid target '{found}' after '{stream}'")]
    InvalidTarget { stream: Stream, found: String },
    #[error("'{0}' redirected more than once")]
    DuplicateRedirect(Stream),
    #[error("unexpected word '{0}' after redirections")]
    UnexpectedWord(String),
    #[error("'{0}' conflicts with the pipe")]
    RedirectIntoPipe(Stream),
}

fn redirected_stream(kind: TokenKind) -> Option<Stream> {
    match kind {
        TokenKind::RedirectIn => Some(Stream::Stdin),
        TokenKind::RedirectOut => Some(Stream::Stdout),
        TokenKind::RedirectErr => Some(Stream::Stderr),
        _ => None,
    }
}

struct CommandBuilder<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> CommandBuilder<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        CommandBuilder { tokens, pos: 0 }
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn build(mut self) -> Result<Command, BuildError> {
        let mut cmd = Command::default();

        // The first operator ends argv.
        while let Some(token) = self.peek().filter(|t| t.is_word()) {
            cmd.argv.push(token.text.clone());
            self.pos += 1;
        }
        if cmd.argv.is_empty() {
            return Err(BuildError::EmptyCommand);
        }

        while let Some(token) = self.consume() {
            if let Some(stream) = redirected_stream(token.kind) {
                let target = self.parse_target(stream)?;
                let slot = cmd.target_mut(stream);
                if slot.is_some() {
                    return Err(BuildError::DuplicateRedirect(stream));
                }
                *slot = Some(target);
                continue;
            }
            match token.kind {
                TokenKind::Background => cmd.background = true,
                TokenKind::Pipe => return Err(BuildError::MultiplePipes),
                _ => return Err(BuildError::UnexpectedWord(token.text.clone())),
            }
        }

        Ok(cmd)
    }

    fn parse_target(&mut self, stream: Stream) -> Result<String, BuildError> {
        match self.consume() {
            Some(token) if token.is_word() => Ok(token.text.clone()),
            Some(token) => Err(BuildError::InvalidTarget {
                stream,
                found: token.text.clone(),
            }),
            None => Err(BuildError::MissingTarget(stream)),
        }
    }
}

/// Builds a single command from a token sequence that contains no pipe.
pub fn build_command(tokens: &[Token]) -> Result<Command, BuildError> {
    CommandBuilder::new(tokens).build()
}

/// Turns the tokens of one input line into a [`Pipeline`].
///
/// The sequence is split at its first `|`. Each side is validated on its own, and
/// then the pair is checked for redirections that would fight with the pipe: the
/// left command may not redirect its stdout and the right one may not redirect
/// its stdin.
pub fn build(tokens: &[Token]) -> Result<Pipeline, BuildError> {
    let Some(split) = tokens.iter().position(|t| t.kind == TokenKind::Pipe) else {
        return build_command(tokens).map(Pipeline::Single);
    };

    let (left, right) = (&tokens[..split], &tokens[split + 1..]);
    if right.iter().any(|t| t.kind == TokenKind::Pipe) {
        return Err(BuildError::MultiplePipes);
    }

    let left = build_command(left)?;
    let right = build_command(right)?;
    if left.out_target.is_some() {
        return Err(BuildError::RedirectIntoPipe(Stream::Stdout));
    }
    if right.in_target.is_some() {
        return Err(BuildError::RedirectIntoPipe(Stream::Stdin));
    }
    Ok(Pipeline::Pair(left, right))
}
