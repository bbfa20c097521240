//! Expression parsing.
//!
//! Expressions stream bytecode like statements do, with one twist: the most
//! recent emission stays in the emitter's peephole slot, so that assignment
//! and the for-in lvalue rewrite can turn a trailing "get" into the matching
//! "assign", and so that statement context can demote a value-producing
//! opcode to its no-result form instead of emitting a pop.

use bytecode::{ExtOpcode, Literal, Op, Opcode, Pending};

use super::{check_recursion_limit, Parser};
use crate::lexer::{PropertyName, TokenKind::*};
use crate::{ErrorKind, Result};

/// What happens to the expression's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExprCtx {
  /// The value stays on the stack.
  Value,
  /// The value is dropped.
  Statement,
  /// The value becomes the program's completion value.
  Block,
}

impl<'src> Parser<'src> {
  /// An expression whose value is needed on the stack.
  pub(crate) fn parse_expr(&mut self) -> Result<()> {
    self.parse_expression(ExprCtx::Value, false, false)
  }

  /// `ctx` decides what happens to the result; `no_comma` parses a single
  /// assignment expression; `has_literal` means the caller already emitted
  /// the leading primary into the peephole slot.
  pub(crate) fn parse_expression(
    &mut self,
    ctx: ExprCtx,
    no_comma: bool,
    has_literal: bool,
  ) -> Result<()> {
    let mut has_literal = has_literal;
    loop {
      self.parse_assignment_expr(has_literal)?;
      has_literal = false;
      if no_comma || !self.check(Tok_Comma) {
        break;
      }
      self.drop_expr_result(false);
      self.lex.bump()?;
    }
    match ctx {
      ExprCtx::Value => {}
      ExprCtx::Statement => self.drop_expr_result(false),
      ExprCtx::Block => self.drop_expr_result(true),
    }
    Ok(())
  }

  /// Demote the pending opcode to its no-result (or completion-value) form,
  /// or pop the value it leaves behind.
  pub(crate) fn drop_expr_result(&mut self, block: bool) {
    if let Some(pending) = self.emit.last().copied() {
      if let Some(op) = demote_result_op(pending.op, block) {
        self.emit.cancel_last();
        self.emit.set_last(Pending {
          op,
          operand: pending.operand,
        });
        return;
      }
    }
    self.emit.emit(if block { Opcode::PopBlock } else { Opcode::Pop });
  }

  fn parse_assignment_expr(&mut self, has_literal: bool) -> Result<()> {
    check_recursion_limit(self.lex.token.span)?;
    self.parse_conditional_expr(has_literal)?;

    let Some(binop) = assignment_op(self.lex.token.kind) else {
      return Ok(());
    };

    // the left-hand side must still sit in the peephole slot as a "get"
    let Some(pending) = self.emit.last().copied() else {
      return Err(self.error(ErrorKind::InvalidExpression));
    };
    match pending.op {
      Op::Cbc(Opcode::PushIdent) => {
        let index = pending.literal_index();
        match binop {
          None => {
            self.emit.cancel_last();
            self.lex.bump()?;
            self.parse_assignment_expr(false)?;
          }
          Some(op) => {
            // compound: the current value is loaded first
            self.lex.bump()?;
            self.parse_assignment_expr(false)?;
            self.emit.emit(op);
          }
        }
        self.emit.emit_literal(Opcode::AssignIdentPushResult, index);
      }
      Op::Cbc(Opcode::PropGet) => {
        self.emit.cancel_last();
        match binop {
          None => {
            self.lex.bump()?;
            self.parse_assignment_expr(false)?;
          }
          Some(op) => {
            self.emit.emit(Opcode::Dup2);
            self.emit.emit(Opcode::PropGet);
            self.lex.bump()?;
            self.parse_assignment_expr(false)?;
            self.emit.emit(op);
          }
        }
        self.emit.emit(Opcode::AssignPushResult);
      }
      Op::Cbc(Opcode::PropStringGet) => {
        let index = pending.literal_index();
        self.emit.cancel_last();
        match binop {
          None => {
            self.lex.bump()?;
            self.parse_assignment_expr(false)?;
          }
          Some(op) => {
            self.emit.emit(Opcode::Dup);
            self.emit.emit_literal(Opcode::PropStringGet, index);
            self.lex.bump()?;
            self.parse_assignment_expr(false)?;
            self.emit.emit(op);
          }
        }
        self
          .emit
          .emit_literal(Opcode::AssignPropStringPushResult, index);
      }
      _ => return Err(self.error(ErrorKind::InvalidExpression)),
    }
    Ok(())
  }

  fn parse_conditional_expr(&mut self, has_literal: bool) -> Result<()> {
    self.parse_binary_expr(0, has_literal)?;

    if self.check(Tok_Question) {
      let otherwise = self.emit.forward_branch(Opcode::BranchIfFalseForward);
      self.lex.bump()?;
      self.parse_assignment_expr(false)?;
      if !self.check(Tok_Colon) {
        return Err(self.error(ErrorKind::ColonExpected));
      }
      let end = self.emit.forward_branch(Opcode::JumpForward);
      self.patch(otherwise)?;
      self.lex.bump()?;
      self.parse_assignment_expr(false)?;
      self.patch(end)?;
    }
    Ok(())
  }

  fn parse_binary_expr(&mut self, min_precedence: u8, has_literal: bool) -> Result<()> {
    self.parse_unary_expr(has_literal)?;

    loop {
      let kind = self.lex.token.kind;
      let Some(precedence) = binary_precedence(kind) else {
        break;
      };
      if precedence < min_precedence {
        break;
      }

      match kind {
        // && and || keep their left value and short-circuit
        Op_AmpAmp | Op_PipePipe => {
          self.emit.emit(Opcode::Dup);
          let short = self.emit.forward_branch(if kind == Op_AmpAmp {
            Opcode::BranchIfFalseForward
          } else {
            Opcode::BranchIfTrueForward
          });
          self.emit.emit(Opcode::Pop);
          self.lex.bump()?;
          self.parse_binary_expr(precedence + 1, false)?;
          self.patch(short)?;
        }
        _ => {
          self.lex.bump()?;
          self.parse_binary_expr(precedence + 1, false)?;
          self.emit.emit(binary_opcode(kind));
        }
      }
    }
    Ok(())
  }

  fn parse_unary_expr(&mut self, has_literal: bool) -> Result<()> {
    if has_literal {
      return self.parse_postfix_rest(true);
    }

    let kind = self.lex.token.kind;
    let opcode = match kind {
      Op_Plus => Opcode::Plus,
      Op_Minus => Opcode::Negate,
      Op_Bang => Opcode::LogicalNot,
      Op_Tilde => Opcode::BitNot,
      Kw_Typeof => Opcode::TypeOf,
      Kw_Void => Opcode::Void,
      Kw_Delete => Opcode::Delete,
      Op_PlusPlus | Op_MinusMinus => {
        self.lex.bump()?;
        self.parse_unary_expr(false)?;
        self.require_lvalue()?;
        self.emit.emit(if kind == Op_PlusPlus {
          Opcode::PreIncrPushResult
        } else {
          Opcode::PreDecrPushResult
        });
        return Ok(());
      }
      _ => {
        self.parse_primary_expr()?;
        return self.parse_postfix_rest(true);
      }
    };

    self.lex.bump()?;
    self.parse_unary_expr(false)?;
    self.emit.emit(opcode);
    Ok(())
  }

  /// Member accesses, calls and postfix operators.
  fn parse_postfix_rest(&mut self, calls: bool) -> Result<()> {
    loop {
      match self.lex.token.kind {
        Op_Dot => {
          self.lex.scan_dot_property()?;
          let name = self.lex.lexeme(&self.lex.token);
          let index = self.add_literal(Literal::Str(name.into()))?;
          self.emit.emit_literal(Opcode::PushLiteral, index);
          self.emit.emit(Opcode::PropGet);
          self.lex.bump()?;
        }
        Brk_SquareL => {
          self.lex.bump()?;
          if self.check(Lit_String) {
            // a lone string key gets the string-keyed access form
            let span = self.lex.token.span;
            let state = self.lex.save();
            self.lex.bump()?;
            if self.check(Brk_SquareR) {
              let raw = &self.lex.src()[span.start + 1..span.end - 1];
              let index = self.add_literal(Literal::Str(unescape_string(raw)))?;
              self.emit.emit_literal(Opcode::PropStringGet, index);
              self.lex.bump()?;
              continue;
            }
            self.lex.restore(state);
          }
          self.parse_expr()?;
          if !self.check(Brk_SquareR) {
            return Err(self.error(ErrorKind::RightSquareExpected));
          }
          self.emit.emit(Opcode::PropGet);
          self.lex.bump()?;
        }
        Brk_ParenL if calls => {
          let argc = self.parse_arguments()?;
          self.emit.emit_byte(Opcode::CallPushResult, argc);
        }
        // no newline may precede a postfix operator
        Op_PlusPlus | Op_MinusMinus if !self.lex.token.was_newline => {
          self.require_lvalue()?;
          let op = if self.check(Op_PlusPlus) {
            Opcode::PostIncrPushResult
          } else {
            Opcode::PostDecrPushResult
          };
          self.emit.emit(op);
          self.lex.bump()?;
        }
        _ => break,
      }
    }
    Ok(())
  }

  fn parse_primary_expr(&mut self) -> Result<()> {
    match self.lex.token.kind {
      Lit_Ident => {
        let index = self.ident_literal()?;
        self.emit.emit_literal(Opcode::PushIdent, index);
        self.lex.bump()
      }
      Lit_Number => {
        let value = parse_number(self.lex.lexeme(&self.lex.token));
        let index = self.add_literal(Literal::Number(value))?;
        self.emit.emit_literal(Opcode::PushNumber, index);
        self.lex.bump()
      }
      Lit_String => {
        let span = self.lex.token.span;
        let raw = &self.lex.src()[span.start + 1..span.end - 1];
        let index = self.add_literal(Literal::Str(unescape_string(raw)))?;
        self.emit.emit_literal(Opcode::PushLiteral, index);
        self.lex.bump()
      }
      Lit_True => {
        self.emit.emit(Opcode::PushTrue);
        self.lex.bump()
      }
      Lit_False => {
        self.emit.emit(Opcode::PushFalse);
        self.lex.bump()
      }
      Lit_Null => {
        self.emit.emit(Opcode::PushNull);
        self.lex.bump()
      }
      Kw_This => {
        self.emit.emit(Opcode::PushThis);
        self.lex.bump()
      }
      Op_Slash | Op_SlashEqual => {
        // primary position: `/` opens a regexp literal
        let (pattern, flags) = self.lex.construct_regexp()?;
        let pattern = self.lex.src()[pattern.range()].into();
        let flags = self.lex.src()[flags.range()].into();
        let index = self.add_literal(Literal::RegExp { pattern, flags })?;
        self.emit.emit_literal(Opcode::PushRegExp, index);
        self.lex.bump()
      }
      Brk_ParenL => {
        self.lex.bump()?;
        self.parse_expr()?;
        if !self.check(Brk_ParenR) {
          return Err(self.error(ErrorKind::RightParenExpected));
        }
        self.lex.bump()
      }
      Brk_SquareL => self.parse_array_literal(),
      Brk_CurlyL => self.parse_object_literal(),
      Kw_Function => {
        self.lex.bump()?;
        let (name, non_strict_name) = if self.check(Lit_Ident) {
          let name = self.lex.lexeme(&self.lex.token).to_string();
          self.lex.bump()?;
          let non_strict = name == "eval" || name == "arguments";
          (name, non_strict)
        } else {
          (String::from("anonymous"), false)
        };
        let function = self.parse_function_literal(name, non_strict_name)?;
        self.emit.emit_literal(Opcode::PushLiteral, function);
        Ok(())
      }
      Kw_New => {
        self.lex.bump()?;
        self.parse_primary_expr()?;
        // member accesses bind tighter than the constructor call
        self.parse_postfix_rest(false)?;
        let argc = if self.check(Brk_ParenL) {
          self.parse_arguments()?
        } else {
          0
        };
        self.emit.emit_byte(Opcode::New, argc);
        Ok(())
      }
      _ => Err(self.error(ErrorKind::PrimaryExpExpected)),
    }
  }

  fn parse_arguments(&mut self) -> Result<u8> {
    debug_assert!(self.check(Brk_ParenL));
    self.lex.bump()?;

    let mut count: usize = 0;
    if !self.check(Brk_ParenR) {
      loop {
        self.parse_assignment_expr(false)?;
        count += 1;
        if !self.check(Tok_Comma) {
          break;
        }
        self.lex.bump()?;
      }
    }
    if !self.check(Brk_ParenR) {
      return Err(self.error(ErrorKind::RightParenExpected));
    }
    if count > u8::MAX as usize {
      return Err(self.error(ErrorKind::InvalidExpression));
    }
    self.lex.bump()?;
    Ok(count as u8)
  }

  fn parse_array_literal(&mut self) -> Result<()> {
    debug_assert!(self.check(Brk_SquareL));
    self.emit.emit(Opcode::CreateArray);
    self.lex.bump()?;

    loop {
      match self.lex.token.kind {
        Brk_SquareR => {
          self.lex.bump()?;
          return Ok(());
        }
        Tok_Comma => {
          // elision
          self.emit.emit(Opcode::PushUndefined);
          self.emit.emit(Opcode::ArrayPush);
          self.lex.bump()?;
        }
        _ => {
          self.parse_assignment_expr(false)?;
          self.emit.emit(Opcode::ArrayPush);
          if self.check(Tok_Comma) {
            self.lex.bump()?;
          } else if !self.check(Brk_SquareR) {
            return Err(self.error(ErrorKind::RightSquareExpected));
          }
        }
      }
    }
  }

  fn parse_object_literal(&mut self) -> Result<()> {
    debug_assert!(self.check(Brk_CurlyL));
    self.emit.emit(Opcode::CreateObject);

    loop {
      match self.lex.scan_property_name()? {
        PropertyName::CloseBrace => {
          self.lex.bump()?;
          return Ok(());
        }
        accessor @ (PropertyName::Getter | PropertyName::Setter) => {
          if !self.lex.token.kind.is_property_name() {
            return Err(self.error(ErrorKind::PropertyNameExpected));
          }
          let key = self.property_key_literal()?;
          let name = self.lex.lexeme(&self.lex.token).to_string();
          self.lex.bump()?;
          let function = self.parse_function_literal(name, false)?;
          self.emit.emit_literal(Opcode::PushLiteral, function);
          let op = if accessor == PropertyName::Getter {
            ExtOpcode::SetGetter
          } else {
            ExtOpcode::SetSetter
          };
          self.emit.emit_ext_literal(op, key);
        }
        PropertyName::Name => {
          let key = self.property_key_literal()?;
          self.lex.bump()?;
          if !self.check(Tok_Colon) {
            return Err(self.error(ErrorKind::ColonExpected));
          }
          self.lex.bump()?;
          self.parse_assignment_expr(false)?;
          self.emit.emit_literal(Opcode::SetProperty, key);
        }
      }

      match self.lex.token.kind {
        Tok_Comma => {}
        Brk_CurlyR => {
          self.lex.bump()?;
          return Ok(());
        }
        _ => return Err(self.error(ErrorKind::ObjectItemSeparatorExpected)),
      }
    }
  }

  /// The current object key token as a string literal.
  fn property_key_literal(&mut self) -> Result<u16> {
    let span = self.lex.token.span;
    let key: Box<str> = match self.lex.token.kind {
      Lit_String => unescape_string(&self.lex.src()[span.start + 1..span.end - 1]),
      _ => self.lex.lexeme(&self.lex.token).into(),
    };
    self.add_literal(Literal::Str(key))
  }

  /// The pending opcode must be a "get" that assignment or incr/decr can
  /// operate on.
  fn require_lvalue(&self) -> Result<()> {
    match self.emit.last().map(|p| p.op) {
      Some(Op::Cbc(
        Opcode::PushIdent | Opcode::PropGet | Opcode::PropStringGet,
      )) => Ok(()),
      _ => Err(self.error(ErrorKind::InvalidExpression)),
    }
  }
}

fn demote_result_op(op: Op, block: bool) -> Option<Op> {
  let op = match op {
    Op::Cbc(op) => op,
    Op::Ext(_) => return None,
  };
  let demoted = match (op, block) {
    (Opcode::CallPushResult, false) => Opcode::Call,
    (Opcode::CallPushResult, true) => Opcode::CallBlock,
    (Opcode::AssignIdentPushResult, false) => Opcode::AssignIdent,
    (Opcode::AssignIdentPushResult, true) => Opcode::AssignIdentBlock,
    (Opcode::AssignPushResult, false) => Opcode::Assign,
    (Opcode::AssignPushResult, true) => Opcode::AssignBlock,
    (Opcode::AssignPropStringPushResult, false) => Opcode::AssignPropString,
    (Opcode::AssignPropStringPushResult, true) => Opcode::AssignPropStringBlock,
    // the completion value of incr/decr is observable, so the push form
    // stays in block context
    (Opcode::PreIncrPushResult, false) => Opcode::PreIncr,
    (Opcode::PreDecrPushResult, false) => Opcode::PreDecr,
    (Opcode::PostIncrPushResult, false) => Opcode::PostIncr,
    (Opcode::PostDecrPushResult, false) => Opcode::PostDecr,
    _ => return None,
  };
  Some(Op::Cbc(demoted))
}

fn assignment_op(kind: crate::lexer::TokenKind) -> Option<Option<Opcode>> {
  let compound = match kind {
    Op_Equal => return Some(None),
    Op_PlusEqual => Opcode::Add,
    Op_MinusEqual => Opcode::Sub,
    Op_StarEqual => Opcode::Mul,
    Op_SlashEqual => Opcode::Div,
    Op_PercentEqual => Opcode::Mod,
    Op_ShlEqual => Opcode::LeftShift,
    Op_ShrEqual => Opcode::RightShift,
    Op_UshrEqual => Opcode::UnsignedRightShift,
    Op_AmpEqual => Opcode::BitAnd,
    Op_PipeEqual => Opcode::BitOr,
    Op_CaretEqual => Opcode::BitXor,
    _ => return None,
  };
  Some(Some(compound))
}

fn binary_precedence(kind: crate::lexer::TokenKind) -> Option<u8> {
  let precedence = match kind {
    Op_PipePipe => 1,
    Op_AmpAmp => 2,
    Op_Pipe => 3,
    Op_Caret => 4,
    Op_Amp => 5,
    Op_EqualEqual | Op_BangEqual | Op_EqualEqualEqual | Op_BangEqualEqual => 6,
    Op_Less | Op_More | Op_LessEqual | Op_MoreEqual | Kw_In | Kw_Instanceof => 7,
    Op_Shl | Op_Shr | Op_Ushr => 8,
    Op_Plus | Op_Minus => 9,
    Op_Star | Op_Slash | Op_Percent => 10,
    _ => return None,
  };
  Some(precedence)
}

fn binary_opcode(kind: crate::lexer::TokenKind) -> Opcode {
  match kind {
    Op_Pipe => Opcode::BitOr,
    Op_Caret => Opcode::BitXor,
    Op_Amp => Opcode::BitAnd,
    Op_EqualEqual => Opcode::Equal,
    Op_BangEqual => Opcode::NotEqual,
    Op_EqualEqualEqual => Opcode::StrictEqual,
    Op_BangEqualEqual => Opcode::StrictNotEqual,
    Op_Less => Opcode::Less,
    Op_More => Opcode::Greater,
    Op_LessEqual => Opcode::LessEqual,
    Op_MoreEqual => Opcode::GreaterEqual,
    Kw_In => Opcode::In,
    Kw_Instanceof => Opcode::InstanceOf,
    Op_Shl => Opcode::LeftShift,
    Op_Shr => Opcode::RightShift,
    Op_Ushr => Opcode::UnsignedRightShift,
    Op_Plus => Opcode::Add,
    Op_Minus => Opcode::Sub,
    Op_Star => Opcode::Mul,
    Op_Slash => Opcode::Div,
    Op_Percent => Opcode::Mod,
    kind => unreachable!("not a binary operator: {kind:?}"),
  }
}

/// Decode the escapes of a string literal body.
pub(crate) fn unescape_string(raw: &str) -> Box<str> {
  if !raw.contains('\\') {
    return raw.into();
  }

  let mut out = String::with_capacity(raw.len());
  let mut chars = raw.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some('t') => out.push('\t'),
      Some('r') => out.push('\r'),
      Some('b') => out.push('\u{0008}'),
      Some('f') => out.push('\u{000C}'),
      Some('v') => out.push('\u{000B}'),
      Some('0') => out.push('\0'),
      Some('x') => push_hex_escape(&mut out, &mut chars, 2),
      Some('u') => push_hex_escape(&mut out, &mut chars, 4),
      Some(other) => out.push(other),
      None => {}
    }
  }
  out.into()
}

fn push_hex_escape(out: &mut String, chars: &mut std::str::Chars<'_>, len: usize) {
  let mut digits = String::new();
  for _ in 0..len {
    match chars.next() {
      Some(c) => digits.push(c),
      None => break,
    }
  }
  match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
    Some(c) => out.push(c),
    // invalid escapes are kept verbatim
    None => {
      out.push('\\');
      out.push_str(&digits);
    }
  }
}

/// Parse a numeric literal; the lexer guarantees the shape.
pub(crate) fn parse_number(lexeme: &str) -> f64 {
  if let Some(hex) = lexeme
    .strip_prefix("0x")
    .or_else(|| lexeme.strip_prefix("0X"))
  {
    u64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN)
  } else {
    lexeme.parse().unwrap_or(f64::NAN)
  }
}
