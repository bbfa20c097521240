#![deny(unused_must_use)]

use bytecode::{Chunk, Emitter, JumpHandle, Literal, Opcode};
use span::Span;

use crate::lexer::{Lexer, TokenKind};
use crate::{Error, ErrorKind, Result};

mod expr;
mod stmt;

pub(crate) use stmt::{JumpKind, Loop, PendingJump, Statement};

/// Compile a program to bytecode.
pub fn parse(src: &str) -> Result<Chunk> {
  let mut parser = Parser::new(src);
  parser.lex.bump()?;
  parser.parse_statements()?;
  debug_assert!(parser.stack.is_empty());
  debug_assert_eq!(parser.context_depth, 0);
  parser.emit.flush();
  let Parser { emit, strict, .. } = parser;
  Ok(emit.finish(strict, Vec::new()))
}

pub(crate) struct Parser<'src> {
  pub(crate) lex: Lexer<'src>,
  pub(crate) emit: Emitter,
  /// Statement frames, innermost last. The `START` sentinel of the current
  /// compilation is implicit: the frame at `stack_base`.
  pub(crate) stack: Vec<Statement>,
  /// Frames below this index belong to an enclosing function.
  pub(crate) stack_base: usize,
  pub(crate) strict: bool,
  pub(crate) in_function: bool,
  pub(crate) in_with: bool,
  /// A parameter (or the function's own name) is `eval` or `arguments`,
  /// which is rejected if the function turns out to be strict.
  pub(crate) has_non_strict_arg: bool,
  /// Runtime context allocations (`with`, for-in, `try`) currently open.
  pub(crate) context_depth: u16,
}

/// Per-function state saved around a nested function compilation.
struct SavedFunction {
  emit: Emitter,
  strict: bool,
  in_function: bool,
  in_with: bool,
  has_non_strict_arg: bool,
  context_depth: u16,
  stack_base: usize,
}

impl<'src> Parser<'src> {
  fn new(src: &'src str) -> Self {
    Parser {
      lex: Lexer::new(src),
      emit: Emitter::new("global"),
      stack: Vec::new(),
      stack_base: 0,
      strict: false,
      in_function: false,
      in_with: false,
      has_non_strict_arg: false,
      context_depth: 0,
    }
  }

  #[inline]
  pub(crate) fn error(&self, kind: impl Into<ErrorKind>) -> Error {
    Error::new(kind.into(), self.lex.token.span)
  }

  #[inline]
  pub(crate) fn check(&self, kind: TokenKind) -> bool {
    self.lex.token.kind == kind
  }

  pub(crate) fn add_literal(&mut self, literal: Literal) -> Result<u16> {
    let result = self.emit.literal(literal);
    result.map_err(|e| self.error(e))
  }

  /// Intern the current token as an identifier literal.
  pub(crate) fn ident_literal(&mut self) -> Result<u16> {
    debug_assert!(self.check(TokenKind::Lit_Ident));
    let name = self.lex.lexeme(&self.lex.token);
    self.add_literal(Literal::Ident(name.into()))
  }

  pub(crate) fn patch(&mut self, handle: JumpHandle) -> Result<()> {
    let result = self.emit.patch(handle);
    result.map_err(|e| self.error(e))
  }

  /// `( expression )`, leaving the value on the stack.
  pub(crate) fn parse_enclosed_expr(&mut self) -> Result<()> {
    self.lex.bump()?;
    if !self.check(TokenKind::Brk_ParenL) {
      return Err(self.error(ErrorKind::LeftParenExpected));
    }
    self.lex.bump()?;
    self.parse_expr()?;
    if !self.check(TokenKind::Brk_ParenR) {
      return Err(self.error(ErrorKind::RightParenExpected));
    }
    self.lex.bump()
  }

  /// Compile a function literal: parameter list and body. The current token
  /// must be the `(` of the parameter list; on return the body's `}` has
  /// been consumed. Returns the literal index of the compiled function.
  pub(crate) fn parse_function_literal(
    &mut self,
    name: String,
    non_strict_name: bool,
  ) -> Result<u16> {
    if !self.check(TokenKind::Brk_ParenL) {
      return Err(self.error(ErrorKind::ArgumentListExpected));
    }
    self.lex.bump()?;

    let mut params: Vec<Box<str>> = Vec::new();
    let mut has_non_strict_arg = non_strict_name;
    if !self.check(TokenKind::Brk_ParenR) {
      loop {
        if !self.check(TokenKind::Lit_Ident) {
          return Err(self.error(ErrorKind::IdentifierExpected));
        }
        let param = self.lex.lexeme(&self.lex.token);
        if param == "eval" || param == "arguments" {
          has_non_strict_arg = true;
        }
        if self.strict && crate::lexer::is_strict_reserved(param) {
          return Err(self.error(ErrorKind::StrictIdentNotAllowed));
        }
        params.push(param.into());
        self.lex.bump()?;
        if !self.check(TokenKind::Tok_Comma) {
          break;
        }
        self.lex.bump()?;
      }
    }
    if !self.check(TokenKind::Brk_ParenR) {
      return Err(self.error(ErrorKind::RightParenExpected));
    }
    self.lex.bump()?;
    if !self.check(TokenKind::Brk_CurlyL) {
      return Err(self.error(ErrorKind::LeftBraceExpected));
    }
    self.lex.bump()?;

    let saved = SavedFunction {
      emit: std::mem::replace(&mut self.emit, Emitter::new(name)),
      strict: self.strict,
      in_function: self.in_function,
      in_with: self.in_with,
      has_non_strict_arg: self.has_non_strict_arg,
      context_depth: self.context_depth,
      stack_base: self.stack_base,
    };
    self.in_function = true;
    self.in_with = false;
    self.has_non_strict_arg = has_non_strict_arg;
    self.context_depth = 0;
    self.stack_base = self.stack.len();

    // strict mode is inherited and may additionally be enabled by the
    // body's own directive prologue
    let body = self.parse_statements();

    let strict = self.strict;
    let inner = std::mem::replace(&mut self.emit, saved.emit);
    self.strict = saved.strict;
    self.in_function = saved.in_function;
    self.in_with = saved.in_with;
    self.has_non_strict_arg = saved.has_non_strict_arg;
    self.context_depth = saved.context_depth;
    self.stack_base = saved.stack_base;
    body?;

    let mut inner = inner;
    inner.flush();
    inner.emit(Opcode::ReturnWithUndefined);
    let chunk = inner.finish(strict, params);

    // the body's closing `}` is still the current token
    self.lex.bump()?;
    self.add_literal(Literal::Function(Box::new(chunk)))
  }
}

/// Saved source region re-parsed out of order (loop conditions, updates).
pub(crate) type SourceRange = Span;

// The statement grammar never recurses (nesting lives on the explicit frame
// stack), but the expression grammar does. A single parse_XXX() level needs
// a few hundred bytes of stack at most; 64k of headroom is comfortable.
#[cfg(feature = "check-recursion-limit")]
const MINIMUM_STACK_REQUIRED: usize = 64_000;

#[cfg(feature = "check-recursion-limit")]
pub(crate) fn check_recursion_limit(span: Span) -> Result<()> {
  if stacker::remaining_stack()
    .map(|available| available > MINIMUM_STACK_REQUIRED)
    .unwrap_or(true)
  {
    Ok(())
  } else {
    Err(Error::new(ErrorKind::NestingLimit, span))
  }
}

#[cfg(not(feature = "check-recursion-limit"))]
pub(crate) fn check_recursion_limit(_span: Span) -> Result<()> {
  Ok(())
}

#[cfg(test)]
mod tests;
