//! The pre-scanner.
//!
//! `scan_until` advances the token stream without emitting code, tracking
//! bracket nesting on its own small stack, until it finds a requested
//! terminator at nesting depth zero. The statement parser uses it to locate
//! regions whose code must be emitted out of source order (while/for
//! conditions, for updates, switch bodies) and to classify `for` headers
//! (`for (x in e)` vs `for (;;)`).
//!
//! The scanner shares the lexer but never touches the statement stack and
//! never emits bytecode; its discipline is purely syntactic nesting.

use span::Span;

use crate::lexer::{Lexer, PropertyName, TokenKind, TokenKind::*};
use crate::{Error, ErrorKind, Result};

/// What to scan for. The terminator must appear with the scan stack empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanGoal {
  /// `)` — while conditions, for updates.
  RightParen,
  /// `;` — for conditions.
  Semicolon,
  /// `in`, or `;` as the not-a-for-in signal.
  In,
  /// `:` — case expressions on the second switch pass.
  Colon,
  /// `case`, `default` or `}` at depth zero.
  SwitchBody,
}

impl ScanGoal {
  fn matches(self, kind: TokenKind) -> bool {
    match self {
      ScanGoal::RightParen => kind == Brk_ParenR,
      ScanGoal::Semicolon => kind == Tok_Semicolon,
      // for (;;) headers terminate at the first `;`, telling the caller
      // "not a for-in"
      ScanGoal::In => kind == Kw_In || kind == Tok_Semicolon,
      ScanGoal::Colon => kind == Tok_Colon,
      ScanGoal::SwitchBody => false,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanMode {
  PrimaryExpression,
  PrimaryExpressionAfterNew,
  PostPrimaryExpression,
  PrimaryExpressionEnd,
  Statement,
  FunctionArguments,
  PropertyName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanFrame {
  ParenExpression,
  ParenStatement,
  ColonExpression,
  ColonStatement,
  SquareBracketedExpression,
  ObjectLiteral,
  BlockStatement,
  BlockExpression,
  BlockProperty,
}

struct Scanner<'a, 'src> {
  lex: &'a mut Lexer<'src>,
  stack: Vec<ScanFrame>,
  mode: ScanMode,
  goal: ScanGoal,
}

/// Scan forward until the goal terminator at depth zero.
///
/// Returns the source range consumed: it starts right after the token that
/// was current on entry and ends right before the terminator. On return the
/// terminator is the current token, unconsumed. Reaching end-of-source first
/// is an error.
pub fn scan_until(lex: &mut Lexer<'_>, goal: ScanGoal) -> Result<Span> {
  let mut range = Span::new(lex.position(), lex.position());

  let mut scanner = Scanner {
    lex,
    stack: Vec::new(),
    mode: ScanMode::PrimaryExpression,
    goal,
  };

  match goal {
    ScanGoal::SwitchBody => {
      // the current token is already the first token of a statement
      scanner.mode = ScanMode::Statement;
    }
    other => {
      scanner.lex.bump()?;
      if other == ScanGoal::In && scanner.lex.token.kind == Kw_Var {
        scanner.lex.bump()?;
      }
    }
  }

  loop {
    let kind = scanner.lex.token.kind;

    if kind == Tok_Eos {
      return Err(Error::new(
        ErrorKind::ExpressionExpected,
        scanner.lex.token.span,
      ));
    }

    if scanner.stack.is_empty() {
      let done = match goal {
        ScanGoal::SwitchBody => {
          scanner.mode == ScanMode::Statement
            && matches!(kind, Kw_Case | Kw_Default | Brk_CurlyR)
        }
        other => other.matches(kind),
      };
      if done {
        return Ok(range);
      }
    }

    if scanner.step(kind)? {
      // re-dispatch the current token in the new mode
      continue;
    }

    range.end = scanner.lex.token.span.end;
    scanner.lex.bump()?;
  }
}

impl<'a, 'src> Scanner<'a, 'src> {
  fn top(&self) -> Option<ScanFrame> {
    self.stack.last().copied()
  }

  fn err(&self, kind: ErrorKind) -> Error {
    Error::new(kind, self.lex.token.span)
  }

  /// One dispatch step. Returns `true` to re-dispatch the current token
  /// without advancing.
  fn step(&mut self, kind: TokenKind) -> Result<bool> {
    match self.mode {
      ScanMode::PrimaryExpression => {
        if kind == Op_Plus || kind == Op_Minus || kind.is_unary_op() {
          return Ok(false);
        }
        self.primary_expression(kind)
      }
      ScanMode::PrimaryExpressionAfterNew => self.primary_expression(kind),
      ScanMode::PostPrimaryExpression => {
        if self.post_primary_expression(kind)? {
          return Ok(false);
        }
        self.primary_expression_end(kind)
      }
      ScanMode::PrimaryExpressionEnd => self.primary_expression_end(kind),
      ScanMode::Statement => self.statement(kind),
      ScanMode::FunctionArguments => self.function_arguments(),
      ScanMode::PropertyName => self.property_name(),
    }
  }

  fn primary_expression(&mut self, kind: TokenKind) -> Result<bool> {
    match kind {
      Kw_New => {
        self.mode = ScanMode::PrimaryExpressionAfterNew;
      }
      Op_Slash | Op_SlashEqual => {
        self.lex.construct_regexp()?;
        self.mode = ScanMode::PostPrimaryExpression;
      }
      Kw_Function => {
        self.stack.push(ScanFrame::BlockExpression);
        self.mode = ScanMode::FunctionArguments;
      }
      Brk_ParenL => {
        self.stack.push(ScanFrame::ParenExpression);
        self.mode = ScanMode::PrimaryExpression;
      }
      Brk_SquareL => {
        self.stack.push(ScanFrame::SquareBracketedExpression);
        self.mode = ScanMode::PrimaryExpression;
      }
      Brk_CurlyL => {
        self.stack.push(ScanFrame::ObjectLiteral);
        self.mode = ScanMode::PropertyName;
        return Ok(true);
      }
      Lit_Ident | Lit_String | Lit_Number | Lit_RegExp | Kw_This | Lit_True | Lit_False
      | Lit_Null => {
        self.mode = ScanMode::PostPrimaryExpression;
      }
      Brk_SquareR => {
        if self.top() != Some(ScanFrame::SquareBracketedExpression) {
          return Err(self.err(ErrorKind::PrimaryExpExpected));
        }
        self.stack.pop();
        self.mode = ScanMode::PostPrimaryExpression;
      }
      Tok_Comma => {
        // array elision
        if self.top() != Some(ScanFrame::SquareBracketedExpression) {
          return Err(self.err(ErrorKind::PrimaryExpExpected));
        }
        self.mode = ScanMode::PrimaryExpression;
      }
      Brk_ParenR => {
        self.mode = ScanMode::PostPrimaryExpression;
        match self.top() {
          Some(ScanFrame::ParenStatement) => self.mode = ScanMode::Statement,
          Some(ScanFrame::ParenExpression) => {}
          _ => return Err(self.err(ErrorKind::PrimaryExpExpected)),
        }
        self.stack.pop();
      }
      Tok_Semicolon => {
        // needed by for (;;) headers
        if self.top() != Some(ScanFrame::ParenStatement) {
          return Err(self.err(ErrorKind::PrimaryExpExpected));
        }
        self.mode = ScanMode::PrimaryExpression;
      }
      _ => return Err(self.err(ErrorKind::PrimaryExpExpected)),
    }
    Ok(false)
  }

  /// Returns `true` when the token was consumed by a postfix form.
  fn post_primary_expression(&mut self, kind: TokenKind) -> Result<bool> {
    match kind {
      Op_Dot => {
        self.lex.scan_dot_property()?;
        Ok(true)
      }
      Brk_ParenL => {
        self.stack.push(ScanFrame::ParenExpression);
        self.mode = ScanMode::PrimaryExpression;
        Ok(true)
      }
      Brk_SquareL => {
        self.stack.push(ScanFrame::SquareBracketedExpression);
        self.mode = ScanMode::PrimaryExpression;
        Ok(true)
      }
      // no newline may precede a postfix operator
      Op_PlusPlus | Op_MinusMinus if !self.lex.token.was_newline => {
        self.mode = ScanMode::PrimaryExpressionEnd;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  fn primary_expression_end(&mut self, kind: TokenKind) -> Result<bool> {
    match kind {
      Tok_Question => {
        self.stack.push(ScanFrame::ColonExpression);
        self.mode = ScanMode::PrimaryExpression;
        return Ok(false);
      }
      Tok_Comma => {
        if self.top() == Some(ScanFrame::ObjectLiteral) {
          self.mode = ScanMode::PropertyName;
          return Ok(true);
        }
        self.mode = ScanMode::PrimaryExpression;
        return Ok(false);
      }
      Tok_Colon => {
        match self.top() {
          Some(ScanFrame::ColonExpression) => {
            self.mode = ScanMode::PrimaryExpression;
            self.stack.pop();
            return Ok(false);
          }
          Some(ScanFrame::ColonStatement) => {
            self.mode = ScanMode::Statement;
            self.stack.pop();
            return Ok(false);
          }
          _ => {}
        }
        // fall through
      }
      _ => {}
    }

    if kind.is_binary_op()
      || (kind == Tok_Semicolon && self.top() == Some(ScanFrame::ParenStatement))
    {
      self.mode = ScanMode::PrimaryExpression;
      return Ok(false);
    }

    if (kind == Brk_SquareR && self.top() == Some(ScanFrame::SquareBracketedExpression))
      || (kind == Brk_ParenR && self.top() == Some(ScanFrame::ParenExpression))
      || (kind == Brk_CurlyR && self.top() == Some(ScanFrame::ObjectLiteral))
    {
      self.stack.pop();
      self.mode = ScanMode::PostPrimaryExpression;
      return Ok(false);
    }

    self.mode = ScanMode::Statement;
    if kind == Brk_ParenR && self.top() == Some(ScanFrame::ParenStatement) {
      self.stack.pop();
      return Ok(false);
    }

    // check whether statement mode can be entered
    if !matches!(
      self.top(),
      Some(ScanFrame::BlockStatement)
        | Some(ScanFrame::BlockExpression)
        | Some(ScanFrame::BlockProperty)
    ) && !(self.stack.is_empty() && self.goal == ScanGoal::SwitchBody)
    {
      return Err(self.err(ErrorKind::InvalidExpression));
    }

    if kind == Brk_CurlyR || self.lex.token.was_newline {
      return Ok(true);
    }

    if kind != Tok_Semicolon {
      return Err(self.err(ErrorKind::InvalidExpression));
    }

    Ok(false)
  }

  fn statement(&mut self, kind: TokenKind) -> Result<bool> {
    match kind {
      Tok_Semicolon | Kw_Else | Kw_Do | Kw_Return | Kw_Try | Kw_Finally | Kw_Debugger => {
        return Ok(false);
      }
      Kw_If | Kw_While | Kw_With | Kw_Switch | Kw_Catch => {
        self.lex.bump()?;
        if self.lex.token.kind != Brk_ParenL {
          return Err(self.err(ErrorKind::LeftParenExpected));
        }
        self.stack.push(ScanFrame::ParenStatement);
        self.mode = ScanMode::PrimaryExpression;
        return Ok(false);
      }
      Kw_For => {
        self.lex.bump()?;
        if self.lex.token.kind != Brk_ParenL {
          return Err(self.err(ErrorKind::LeftParenExpected));
        }
        self.lex.bump()?;
        self.stack.push(ScanFrame::ParenStatement);
        self.mode = ScanMode::PrimaryExpression;
        return Ok(self.lex.token.kind != Kw_Var);
      }
      Kw_Var | Kw_Throw => {
        self.mode = ScanMode::PrimaryExpression;
        return Ok(false);
      }
      Kw_Break | Kw_Continue => {
        self.lex.bump()?;
        let label = !self.lex.token.was_newline && self.lex.token.kind == Lit_Ident;
        return Ok(!label);
      }
      Kw_Default => {
        self.lex.bump()?;
        if self.lex.token.kind != Tok_Colon {
          return Err(self.err(ErrorKind::ColonExpected));
        }
        return Ok(false);
      }
      Kw_Case => {
        self.stack.push(ScanFrame::ColonStatement);
        self.mode = ScanMode::PrimaryExpression;
        return Ok(false);
      }
      Brk_CurlyR => {
        if matches!(
          self.top(),
          Some(ScanFrame::BlockStatement)
            | Some(ScanFrame::BlockExpression)
            | Some(ScanFrame::BlockProperty)
        ) {
          let top = self.stack.pop();
          if top == Some(ScanFrame::BlockExpression) {
            self.mode = ScanMode::PostPrimaryExpression;
          } else if top == Some(ScanFrame::BlockProperty) {
            self.mode = ScanMode::PostPrimaryExpression;
            self.lex.bump()?;
            if !matches!(self.lex.token.kind, Tok_Comma | Brk_CurlyR) {
              return Err(self.err(ErrorKind::ObjectItemSeparatorExpected));
            }
            return Ok(true);
          }
          return Ok(false);
        }
        // stray `}`: fall through to the expression path below
      }
      Brk_CurlyL => {
        self.stack.push(ScanFrame::BlockStatement);
        return Ok(false);
      }
      Kw_Function => {
        self.stack.push(ScanFrame::BlockStatement);
        self.mode = ScanMode::FunctionArguments;
        return Ok(false);
      }
      _ => {}
    }

    self.mode = ScanMode::PrimaryExpression;

    if kind == Lit_Ident {
      self.lex.bump()?;
      if self.lex.token.kind == Tok_Colon {
        // a label
        self.mode = ScanMode::Statement;
        return Ok(false);
      }
      self.mode = ScanMode::PostPrimaryExpression;
    }

    Ok(true)
  }

  fn function_arguments(&mut self) -> Result<bool> {
    debug_assert!(matches!(
      self.top(),
      Some(ScanFrame::BlockStatement)
        | Some(ScanFrame::BlockExpression)
        | Some(ScanFrame::BlockProperty)
    ));

    // optional function name
    if self.lex.token.kind == Lit_Ident {
      self.lex.bump()?;
    }

    if self.lex.token.kind != Brk_ParenL {
      return Err(self.err(ErrorKind::ArgumentListExpected));
    }
    self.lex.bump()?;

    if self.lex.token.kind != Brk_ParenR {
      loop {
        if self.lex.token.kind != Lit_Ident {
          return Err(self.err(ErrorKind::IdentifierExpected));
        }
        self.lex.bump()?;
        if self.lex.token.kind != Tok_Comma {
          break;
        }
        self.lex.bump()?;
      }
    }

    if self.lex.token.kind != Brk_ParenR {
      return Err(self.err(ErrorKind::RightParenExpected));
    }
    self.lex.bump()?;

    if self.lex.token.kind != Brk_CurlyL {
      return Err(self.err(ErrorKind::LeftBraceExpected));
    }
    self.mode = ScanMode::Statement;
    Ok(false)
  }

  fn property_name(&mut self) -> Result<bool> {
    debug_assert_eq!(self.top(), Some(ScanFrame::ObjectLiteral));

    match self.lex.scan_property_name()? {
      PropertyName::CloseBrace => {
        self.stack.pop();
        self.mode = ScanMode::PostPrimaryExpression;
        Ok(false)
      }
      PropertyName::Getter | PropertyName::Setter => {
        self.stack.push(ScanFrame::BlockProperty);
        self.mode = ScanMode::FunctionArguments;
        Ok(false)
      }
      PropertyName::Name => {
        self.lex.bump()?;
        if self.lex.token.kind != Tok_Colon {
          return Err(self.err(ErrorKind::ColonExpected));
        }
        self.mode = ScanMode::PrimaryExpression;
        Ok(false)
      }
    }
  }
}

#[cfg(test)]
mod tests;
