//! Source text to bytecode, in a single pass.
//!
//! The parser is AST-less: statements and expressions stream bytecode
//! through the emitter as they are recognized. Control flow whose target is
//! unknown at emission time is emitted as a forward branch and patched when
//! the owning statement frame is closed.

use span::Span;

pub mod lexer;
pub mod parser;
pub mod scanner;

pub use parser::parse;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error {
  pub kind: ErrorKind,
  pub span: Span,
}

impl Error {
  pub fn new(kind: ErrorKind, span: impl Into<Span>) -> Self {
    Error {
      kind,
      span: span.into(),
    }
  }

  pub fn report<'a>(&self, source: impl Into<diag::Source<'a>>) -> String {
    diag::Report::error(source, self.kind.message(), self.span).emit_to_string()
  }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} at {}", self.kind.message(), self.span)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  PrimaryExpExpected,
  ExpressionExpected,
  InvalidExpression,
  LeftParenExpected,
  RightParenExpected,
  LeftBraceExpected,
  ColonExpected,
  SemicolonExpected,
  IdentifierExpected,
  PropertyNameExpected,
  InExpected,
  WhileExpected,
  CatchFinallyExpected,
  ArgumentListExpected,
  ObjectItemSeparatorExpected,
  StatementExpected,
  InvalidRightSquare,
  RightSquareExpected,
  InvalidSwitch,
  MultipleDefaultsNotAllowed,
  CaseNotInSwitch,
  DefaultNotInSwitch,
  InvalidBreak,
  InvalidBreakLabel,
  InvalidContinue,
  InvalidContinueLabel,
  DuplicatedLabel,
  InvalidReturn,
  WithNotAllowed,
  StrictIdentNotAllowed,
  NonStrictArgDefinition,
  InvalidToken,
  UnterminatedString,
  UnterminatedRegExp,
  NestingLimit,
  JumpTooFar,
  LiteralLimit,
}

impl ErrorKind {
  pub fn message(&self) -> &'static str {
    use ErrorKind::*;
    match self {
      PrimaryExpExpected => "primary expression expected",
      ExpressionExpected => "expression expected",
      InvalidExpression => "invalid expression",
      LeftParenExpected => "`(` expected",
      RightParenExpected => "`)` expected",
      LeftBraceExpected => "`{` expected",
      ColonExpected => "`:` expected",
      SemicolonExpected => "`;` expected",
      IdentifierExpected => "identifier expected",
      PropertyNameExpected => "property name expected",
      InExpected => "`in` expected",
      WhileExpected => "`while` expected",
      CatchFinallyExpected => "`catch` or `finally` expected",
      ArgumentListExpected => "argument list expected",
      ObjectItemSeparatorExpected => "`,` or `}` expected after a property",
      StatementExpected => "statement expected",
      InvalidRightSquare => "unexpected `}`",
      RightSquareExpected => "`]` expected",
      InvalidSwitch => "switch body must start with `case` or `default`",
      MultipleDefaultsNotAllowed => "a switch may only have one `default`",
      CaseNotInSwitch => "`case` outside of a switch",
      DefaultNotInSwitch => "`default` outside of a switch",
      InvalidBreak => "`break` outside of a loop or switch",
      InvalidBreakLabel => "no label found for `break`",
      InvalidContinue => "`continue` outside of a loop",
      InvalidContinueLabel => "no loop label found for `continue`",
      DuplicatedLabel => "duplicated label",
      InvalidReturn => "`return` outside of a function",
      WithNotAllowed => "`with` is not allowed in strict mode",
      StrictIdentNotAllowed => "identifier is reserved in strict mode",
      NonStrictArgDefinition => "argument name is not allowed in strict mode",
      InvalidToken => "invalid token",
      UnterminatedString => "unterminated string literal",
      UnterminatedRegExp => "unterminated regexp literal",
      NestingLimit => "nesting limit reached",
      JumpTooFar => "jump offset does not fit in 16 bits",
      LiteralLimit => "too many literals in one function",
    }
  }
}

impl From<bytecode::EmitError> for ErrorKind {
  fn from(value: bytecode::EmitError) -> Self {
    match value {
      bytecode::EmitError::JumpTooFar => ErrorKind::JumpTooFar,
      bytecode::EmitError::LiteralLimit => ErrorKind::LiteralLimit,
    }
  }
}
