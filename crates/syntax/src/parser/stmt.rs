//! Statement parsing.
//!
//! Statements do not recurse: each nesting construct pushes a frame onto
//! [`Parser::stack`] and continues the main loop. A closing token (or the
//! natural end of a construct) runs the matching "ender", which pops the
//! frame and patches the branches recorded in it. Pre-scanned regions
//! (loop conditions, for updates, switch bodies) are re-tokenized and
//! compiled at their execution position rather than their source position.

use std::collections::VecDeque;

use bytecode::{ExtOpcode, JumpHandle, Literal, Op, Opcode, Operand, Pending};

use super::expr::ExprCtx;
use super::{Parser, SourceRange};
use crate::lexer::{is_strict_reserved, TokenKind::*};
use crate::scanner::{scan_until, ScanGoal};
use crate::{ErrorKind, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JumpKind {
  Break,
  Continue,
}

/// A break or continue recorded on a loop frame, patched when the loop
/// closes. Breaks resolve to the position after the loop, continues to the
/// loop's condition (or update) position.
#[derive(Debug)]
pub(crate) struct PendingJump {
  pub handle: JumpHandle,
  pub kind: JumpKind,
}

/// Break/continue list carried by every breakable statement.
#[derive(Debug, Default)]
pub(crate) struct Loop {
  pub branches: Vec<PendingJump>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TryBlock {
  Try,
  Catch,
  Finally,
}

/// A statement frame. The enum discriminant is the frame tag; dropping a
/// frame releases every patch record it owns, which is what keeps the
/// "all patches are resolved or freed" invariant on error paths.
#[derive(Debug)]
pub(crate) enum Statement {
  Block,
  Label {
    name: Box<str>,
    breaks: Vec<PendingJump>,
  },
  If {
    end: JumpHandle,
  },
  Else {
    end: JumpHandle,
  },
  Switch {
    /// Jump to the default case, or past the switch if there is none.
    default: Option<JumpHandle>,
    /// Case comparison branches, patched in source order on the second pass.
    cases: VecDeque<JumpHandle>,
    has_default: bool,
    loop_: Loop,
  },
  DoWhile {
    start: usize,
    loop_: Loop,
  },
  While {
    end: JumpHandle,
    condition: SourceRange,
    start: usize,
    loop_: Loop,
  },
  For {
    end: JumpHandle,
    condition: SourceRange,
    update: SourceRange,
    start: usize,
    loop_: Loop,
  },
  ForIn {
    end: JumpHandle,
    start: usize,
    loop_: Loop,
  },
  With {
    end: JumpHandle,
  },
  Try {
    block: TryBlock,
    end: JumpHandle,
  },
}

impl Statement {
  /// Frames which allocate a runtime context; jumping out of one must use
  /// the context-exiting jump.
  fn creates_context(&self) -> bool {
    matches!(
      self,
      Statement::ForIn { .. } | Statement::With { .. } | Statement::Try { .. }
    )
  }

  fn is_loop(&self) -> bool {
    matches!(
      self,
      Statement::DoWhile { .. }
        | Statement::While { .. }
        | Statement::For { .. }
        | Statement::ForIn { .. }
    )
  }

  fn is_breakable(&self) -> bool {
    matches!(self, Statement::Switch { .. }) || self.is_loop()
  }

  fn loop_mut(&mut self) -> Option<&mut Loop> {
    match self {
      Statement::Switch { loop_, .. }
      | Statement::DoWhile { loop_, .. }
      | Statement::While { loop_, .. }
      | Statement::For { loop_, .. }
      | Statement::ForIn { loop_, .. } => Some(loop_),
      _ => None,
    }
  }
}

impl<'src> Parser<'src> {
  /// Parse statements until end-of-source, or until the `}` closing the
  /// current function body (left unconsumed for the caller).
  pub(crate) fn parse_statements(&mut self) -> Result<()> {
    let base = self.stack_base;
    debug_assert_eq!(base, self.stack.len());

    let mut stashed_literal = self.parse_directive_prologue()?;

    if self.strict && self.has_non_strict_arg {
      return Err(self.error(ErrorKind::NonStrictArgDefinition));
    }

    loop {
      if !stashed_literal && self.check(Tok_Eos) && self.stack.len() == base {
        break;
      }

      if std::mem::take(&mut stashed_literal) {
        // the directive prologue left a pushed string in the peephole
        // slot; it is the start of an expression statement
        self.parse_expr_statement(true)?;
      } else {
        match self.lex.token.kind {
          Tok_Semicolon => {}

          Brk_CurlyR => {
            // only block-like frames may be closed here
            if self.stack.len() > base
              && matches!(
                self.stack.last(),
                Some(Statement::Label { .. })
                  | Some(Statement::If { .. })
                  | Some(Statement::Else { .. })
                  | Some(Statement::DoWhile { .. })
                  | Some(Statement::While { .. })
                  | Some(Statement::For { .. })
                  | Some(Statement::ForIn { .. })
                  | Some(Statement::With { .. })
              )
            {
              return Err(self.error(ErrorKind::StatementExpected));
            }
          }

          Brk_CurlyL => {
            self.stack.push(Statement::Block);
            self.lex.bump()?;
            continue;
          }

          Kw_Var => self.parse_var_statement()?,

          Kw_Function => {
            self.parse_function_statement()?;
            continue;
          }

          Kw_If => {
            self.parse_if_statement_start()?;
            continue;
          }

          Kw_Switch => {
            self.parse_switch_statement_start()?;
            continue;
          }

          Kw_Do => {
            let start = self.emit.offset();
            self.stack.push(Statement::DoWhile {
              start,
              loop_: Loop::default(),
            });
            self.lex.bump()?;
            continue;
          }

          Kw_While => {
            self.parse_while_statement_start()?;
            continue;
          }

          Kw_For => {
            self.parse_for_statement_start()?;
            continue;
          }

          Kw_With => {
            self.parse_with_statement_start()?;
            continue;
          }

          Kw_Try => {
            self.lex.bump()?;
            if !self.check(Brk_CurlyL) {
              return Err(self.error(ErrorKind::LeftBraceExpected));
            }
            self.context_depth += 1;
            let end = self.emit.ext_forward_branch(ExtOpcode::TryCreateContext);
            self.stack.push(Statement::Try {
              block: TryBlock::Try,
              end,
            });
            self.lex.bump()?;
            continue;
          }

          Kw_Default => {
            self.parse_default_statement()?;
            continue;
          }

          Kw_Case => {
            self.parse_case_statement()?;
            continue;
          }

          Kw_Break => self.parse_break_statement()?,

          Kw_Continue => self.parse_continue_statement()?,

          Kw_Throw => {
            self.lex.bump()?;
            // no ASI for throw: a newline here is a syntax error
            if self.lex.token.was_newline {
              return Err(self.error(ErrorKind::ExpressionExpected));
            }
            self.parse_expr()?;
            self.emit.emit(Opcode::Throw);
          }

          Kw_Return => {
            if !self.in_function {
              return Err(self.error(ErrorKind::InvalidReturn));
            }
            self.lex.bump()?;
            if self.lex.token.was_newline
              || self.check(Tok_Semicolon)
              || self.check(Brk_CurlyR)
              || self.check(Tok_Eos)
            {
              self.emit.emit(Opcode::ReturnWithUndefined);
            } else {
              self.parse_expr()?;
              self.emit.emit(Opcode::Return);
            }
          }

          Kw_Debugger => {
            self.emit.emit_ext(ExtOpcode::Debugger);
            self.lex.bump()?;
          }

          Lit_Ident => {
            let span = self.lex.token.span;
            let name = self.lex.lexeme(&self.lex.token);
            self.lex.bump()?;
            if self.check(Tok_Colon) {
              self.parse_label(name, span)?;
              self.lex.bump()?;
              continue;
            }
            let index = self.add_literal(Literal::Ident(name.into()))?;
            self.emit.emit_literal(Opcode::PushIdent, index);
            self.parse_expr_statement(true)?;
          }

          _ => self.parse_expr_statement(false)?,
        }
      }

      self.emit.flush();
      if self.parse_statement_end(base)? {
        // function body closed; the `}` belongs to the caller
        return Ok(());
      }
    }

    if self.in_function {
      // end-of-source inside a function body
      return Err(self.error(ErrorKind::StatementExpected));
    }
    Ok(())
  }

  /// Expression statement: `PARSE_EXPR_STATEMENT` inside a function,
  /// `PARSE_EXPR_BLOCK` (completion value tracked) at the top level.
  fn parse_expr_statement(&mut self, has_literal: bool) -> Result<()> {
    let ctx = if self.in_function {
      ExprCtx::Statement
    } else {
      ExprCtx::Block
    };
    self.parse_expression(ctx, false, has_literal)
  }

  /// Leading string-literal statements. Returns `true` when a string was
  /// pushed into the peephole slot because it turned out to start an
  /// expression statement instead.
  fn parse_directive_prologue(&mut self) -> Result<bool> {
    while self.check(Lit_String) {
      let string_span = self.lex.token.span;
      self.lex.bump()?;

      if !self.check(Tok_Semicolon) && !self.check(Brk_CurlyR) {
        let kind = self.lex.token.kind;
        if !self.lex.token.was_newline
          || kind.is_binary_op()
          || matches!(kind, Brk_ParenL | Brk_SquareL | Op_Dot)
        {
          // not a directive: the string starts an expression statement
          let raw = &self.lex.src()[string_span.start + 1..string_span.end - 1];
          let value = super::expr::unescape_string(raw);
          let index = self.add_literal(Literal::Str(value))?;
          self.emit.emit_literal(Opcode::PushLiteral, index);
          return Ok(true);
        }
      }

      // `use strict` must match exactly, byte for byte: an escaped form
      // does not enable strict mode
      let raw = &self.lex.src()[string_span.start + 1..string_span.end - 1];
      if raw == "use strict" {
        self.strict = true;
        if self.check(Lit_Ident) && is_strict_reserved(self.lex.lexeme(&self.lex.token)) {
          return Err(self.error(ErrorKind::StrictIdentNotAllowed));
        }
      }

      if self.check(Tok_Semicolon) {
        self.lex.bump()?;
      }
    }
    Ok(false)
  }

  /// The statement terminator loop: consume `;` / `}` / ASI, then run
  /// single-token enders until a frame that needs more input is on top.
  /// One terminator may collapse several frames (`if (a) if (b) c();`).
  ///
  /// Returns `true` when the `}` closing the current function body was
  /// reached; it is left unconsumed for the parent context.
  fn parse_statement_end(&mut self, base: usize) -> Result<bool> {
    let mut terminator_required = true;
    loop {
      if terminator_required {
        if self.check(Brk_CurlyR) {
          if self.stack.len() == base {
            if self.in_function {
              debug_assert_eq!(self.context_depth, 0);
              return Ok(true);
            }
            return Err(self.error(ErrorKind::InvalidRightSquare));
          }
          match self.stack.last() {
            Some(Statement::Block) => {
              self.stack.pop();
              self.lex.bump()?;
            }
            Some(Statement::Switch { .. }) => {
              self.parse_switch_statement_end()?;
            }
            Some(Statement::Try { .. }) => {
              self.parse_try_statement_end()?;
            }
            _ => {}
          }
        } else if self.check(Tok_Semicolon) {
          self.lex.bump()?;
        } else if !self.check(Tok_Eos) && !self.lex.token.was_newline {
          return Err(self.error(ErrorKind::SemicolonExpected));
        }
      }

      terminator_required = false;

      if self.stack.len() == base {
        return Ok(false);
      }
      match self.stack.last() {
        Some(Statement::Label { .. }) => {
          let Some(Statement::Label { breaks, .. }) = self.stack.pop() else {
            unreachable!()
          };
          for jump in breaks {
            self.patch(jump.handle)?;
          }
          continue;
        }

        Some(Statement::If { .. }) => {
          if self.parse_if_statement_end()? {
            break;
          }
          continue;
        }

        Some(Statement::Else { .. }) => {
          let Some(Statement::Else { end }) = self.stack.pop() else {
            unreachable!()
          };
          self.patch(end)?;
          continue;
        }

        Some(Statement::DoWhile { .. }) => {
          self.parse_do_while_statement_end()?;
          terminator_required = true;
          continue;
        }

        Some(Statement::While { .. }) => {
          self.parse_while_statement_end()?;
          continue;
        }

        Some(Statement::For { .. }) => {
          self.parse_for_statement_end()?;
          continue;
        }

        Some(Statement::ForIn { .. }) => {
          self.parse_for_in_statement_end()?;
          continue;
        }

        Some(Statement::With { .. }) => {
          self.parse_with_statement_end()?;
          continue;
        }

        _ => break,
      }
    }
    Ok(false)
  }

  fn parse_var_statement(&mut self) -> Result<()> {
    debug_assert!(self.check(Kw_Var));
    loop {
      self.lex.bump()?;
      if !self.check(Lit_Ident) {
        return Err(self.error(ErrorKind::IdentifierExpected));
      }
      if self.strict && is_strict_reserved(self.lex.lexeme(&self.lex.token)) {
        return Err(self.error(ErrorKind::StrictIdentNotAllowed));
      }
      let index = self.ident_literal()?;
      self.emit.emit_literal(Opcode::PushIdent, index);

      self.lex.bump()?;
      if self.check(Op_Equal) {
        self.parse_expression(ExprCtx::Statement, true, true)?;
      } else {
        // nothing is assigned: the pending push is dropped
        debug_assert_eq!(
          self.emit.last().map(|p| p.op),
          Some(Op::Cbc(Opcode::PushIdent))
        );
        self.emit.cancel_last();
      }

      if !self.check(Tok_Comma) {
        break;
      }
    }
    Ok(())
  }

  fn parse_function_statement(&mut self) -> Result<()> {
    debug_assert!(self.check(Kw_Function));
    self.lex.bump()?;
    if !self.check(Lit_Ident) {
      return Err(self.error(ErrorKind::IdentifierExpected));
    }
    let name = self.lex.lexeme(&self.lex.token).to_string();
    if self.strict && is_strict_reserved(&name) {
      return Err(self.error(ErrorKind::StrictIdentNotAllowed));
    }
    let index = self.add_literal(Literal::Ident(name.as_str().into()))?;
    let non_strict_name = name == "eval" || name == "arguments";
    self.lex.bump()?;

    let function = self.parse_function_literal(name, non_strict_name)?;
    self.emit.emit_literal(Opcode::PushLiteral, function);
    self.emit.emit_literal(Opcode::AssignIdent, index);
    self.emit.flush();
    Ok(())
  }

  fn parse_if_statement_start(&mut self) -> Result<()> {
    self.parse_enclosed_expr()?;
    let end = self.emit.forward_branch(Opcode::BranchIfFalseForward);
    self.stack.push(Statement::If { end });
    Ok(())
  }

  /// Returns `true` when an `else` branch was entered.
  fn parse_if_statement_end(&mut self) -> Result<bool> {
    let Some(Statement::If { end }) = self.stack.pop() else {
      unreachable!()
    };

    if !self.check(Kw_Else) {
      self.patch(end)?;
      return Ok(false);
    }

    let else_end = self.emit.forward_branch(Opcode::JumpForward);
    self.patch(end)?;
    self.stack.push(Statement::Else { end: else_end });
    self.lex.bump()?;
    Ok(true)
  }

  fn parse_with_statement_start(&mut self) -> Result<()> {
    if self.strict {
      return Err(self.error(ErrorKind::WithNotAllowed));
    }

    self.parse_enclosed_expr()?;

    self.context_depth += 1;
    self.in_with = true;
    let end = self.emit.ext_forward_branch(ExtOpcode::WithCreateContext);
    self.stack.push(Statement::With { end });
    Ok(())
  }

  fn parse_with_statement_end(&mut self) -> Result<()> {
    let Some(Statement::With { end }) = self.stack.pop() else {
      unreachable!()
    };

    self.emit.flush();
    self.context_depth -= 1;
    self.emit.emit(Opcode::ContextEnd);
    self.patch(end)?;

    let still_in_with = self.stack[self.stack_base..]
      .iter()
      .any(|frame| matches!(frame, Statement::With { .. }));
    if !still_in_with {
      self.in_with = false;
    }
    Ok(())
  }

  fn parse_do_while_statement_end(&mut self) -> Result<()> {
    if !self.check(Kw_While) {
      return Err(self.error(ErrorKind::WhileExpected));
    }

    let Some(Statement::DoWhile { start, mut loop_ }) = self.stack.pop() else {
      unreachable!()
    };

    self.set_continues_to_here(&mut loop_)?;

    self.parse_enclosed_expr()?;

    if self.emit.last().map(|p| p.op) == Some(Op::Cbc(Opcode::PushFalse)) {
      // `do ... while (false)` never branches back
      self.emit.cancel_last();
    } else {
      let opcode = self.condition_branch_opcode();
      self.emit.backward_branch(opcode, start);
    }

    self.set_breaks_to_here(loop_)
  }

  fn parse_while_statement_start(&mut self) -> Result<()> {
    debug_assert!(self.check(Kw_While));
    self.lex.bump()?;

    if !self.check(Brk_ParenL) {
      return Err(self.error(ErrorKind::LeftParenExpected));
    }

    let end = self.emit.forward_branch(Opcode::JumpForward);
    let start = self.emit.offset();

    // the condition is compiled at the end of the loop
    let condition = scan_until(&mut self.lex, ScanGoal::RightParen)?;
    self.lex.bump()?;

    self.stack.push(Statement::While {
      end,
      condition,
      start,
      loop_: Loop::default(),
    });
    Ok(())
  }

  fn parse_while_statement_end(&mut self) -> Result<()> {
    let Some(Statement::While {
      end,
      condition,
      start,
      mut loop_,
    }) = self.stack.pop()
    else {
      unreachable!()
    };

    let saved = self.lex.save();

    self.patch(end)?;
    self.set_continues_to_here(&mut loop_)?;

    self.lex.set_range(condition);
    self.lex.bump()?;
    self.parse_expr()?;
    if !self.check(Tok_Eos) {
      return Err(self.error(ErrorKind::InvalidExpression));
    }

    let opcode = self.condition_branch_opcode();
    self.emit.backward_branch(opcode, start);
    self.set_breaks_to_here(loop_)?;

    self.lex.restore(saved);
    Ok(())
  }

  /// Pick the backward branch for a just-compiled loop condition, fusing a
  /// trailing `!` and folding a literal `true`.
  fn condition_branch_opcode(&mut self) -> Opcode {
    match self.emit.last().map(|p| p.op) {
      Some(Op::Cbc(Opcode::LogicalNot)) => {
        self.emit.cancel_last();
        Opcode::BranchIfFalseBackward
      }
      Some(Op::Cbc(Opcode::PushTrue)) => {
        self.emit.cancel_last();
        Opcode::JumpBackward
      }
      _ => Opcode::BranchIfTrueBackward,
    }
  }

  fn parse_for_statement_start(&mut self) -> Result<()> {
    debug_assert!(self.check(Kw_For));
    self.lex.bump()?;

    if !self.check(Brk_ParenL) {
      return Err(self.error(ErrorKind::LeftParenExpected));
    }

    let header = scan_until(&mut self.lex, ScanGoal::In)?;

    if self.check(Kw_In) {
      self.parse_for_in_statement_start(header)
    } else {
      // ordinary for: rewind and compile the initializer in place
      self.lex.set_position(header.start);
      self.lex.bump()?;

      if !self.check(Tok_Semicolon) {
        if self.check(Kw_Var) {
          self.parse_var_statement()?;
        } else {
          self.parse_expression(ExprCtx::Statement, false, false)?;
        }
        if !self.check(Tok_Semicolon) {
          return Err(self.error(ErrorKind::SemicolonExpected));
        }
      }

      let end = self.emit.forward_branch(Opcode::JumpForward);
      let start = self.emit.offset();

      // condition and update are compiled at the end of the loop
      let condition = scan_until(&mut self.lex, ScanGoal::Semicolon)?;
      let update = scan_until(&mut self.lex, ScanGoal::RightParen)?;
      self.lex.bump()?;

      self.stack.push(Statement::For {
        end,
        condition,
        update,
        start,
        loop_: Loop::default(),
      });
      Ok(())
    }
  }

  fn parse_for_in_statement_start(&mut self, left: SourceRange) -> Result<()> {
    debug_assert!(self.check(Kw_In));
    self.lex.bump()?;
    self.parse_expr()?;

    if !self.check(Brk_ParenR) {
      return Err(self.error(ErrorKind::RightParenExpected));
    }

    self.context_depth += 1;
    let end = self.emit.ext_forward_branch(ExtOpcode::ForInCreateContext);
    let start = self.emit.offset();

    // go back and compile the left-hand side as an assignment target
    let saved = self.lex.save();
    self.lex.set_range(left);
    self.lex.bump()?;

    if self.check(Kw_Var) {
      self.lex.bump()?;
      if !self.check(Lit_Ident) {
        return Err(self.error(ErrorKind::IdentifierExpected));
      }
      let index = self.ident_literal()?;
      self.lex.bump()?;

      if self.check(Op_Equal) {
        // the initializer is compiled but never executed
        let skip = self.emit.forward_branch(Opcode::JumpForward);
        self.lex.bump()?;
        self.parse_expression(ExprCtx::Statement, true, false)?;
        self.patch(skip)?;
      }

      self.emit.emit_ext(ExtOpcode::ForInGetNext);
      self.emit.emit_literal(Opcode::AssignIdent, index);
    } else {
      self.parse_expr()?;

      // rewrite the final "get" of the target into its "assign" form
      let (opcode, operand) = match self.emit.take_last() {
        Some(Pending {
          op: Op::Cbc(Opcode::PushIdent),
          operand,
        }) => (Opcode::AssignIdent, operand),
        Some(Pending {
          op: Op::Cbc(Opcode::PropGet),
          operand,
        }) => (Opcode::Assign, operand),
        Some(Pending {
          op: Op::Cbc(Opcode::PropStringGet),
          operand,
        }) => (Opcode::AssignPropString, operand),
        other => {
          // not an assignable target: this only fails at runtime
          if let Some(pending) = other {
            self.emit.set_last(pending);
          }
          self.emit.emit_ext(ExtOpcode::PushUndefinedBase);
          (Opcode::Assign, Operand::None)
        }
      };

      self.emit.emit_ext(ExtOpcode::ForInGetNext);
      self.emit.flush();
      self.emit.set_last(Pending {
        op: Op::Cbc(opcode),
        operand,
      });
    }

    if !self.check(Tok_Eos) {
      return Err(self.error(ErrorKind::InExpected));
    }

    self.emit.flush();
    self.lex.restore(saved);
    self.lex.bump()?;

    self.stack.push(Statement::ForIn {
      end,
      start,
      loop_: Loop::default(),
    });
    Ok(())
  }

  fn parse_for_statement_end(&mut self) -> Result<()> {
    let Some(Statement::For {
      end,
      condition,
      update,
      start,
      mut loop_,
    }) = self.stack.pop()
    else {
      unreachable!()
    };

    let saved = self.lex.save();

    // continues land on the update expression
    self.lex.set_range(update);
    self.lex.bump()?;
    self.set_continues_to_here(&mut loop_)?;

    if !self.check(Tok_Eos) {
      self.parse_expression(ExprCtx::Statement, false, false)?;
      if !self.check(Tok_Eos) {
        return Err(self.error(ErrorKind::InvalidExpression));
      }
    }

    self.patch(end)?;

    self.lex.set_range(condition);
    self.lex.bump()?;

    let opcode = if !self.check(Tok_Eos) {
      self.parse_expr()?;
      if !self.check(Tok_Eos) {
        return Err(self.error(ErrorKind::InvalidExpression));
      }
      self.condition_branch_opcode()
    } else {
      Opcode::JumpBackward
    };

    self.emit.backward_branch(opcode, start);
    self.set_breaks_to_here(loop_)?;

    self.lex.restore(saved);
    Ok(())
  }

  fn parse_for_in_statement_end(&mut self) -> Result<()> {
    let Some(Statement::ForIn {
      end,
      start,
      mut loop_,
    }) = self.stack.pop()
    else {
      unreachable!()
    };

    self.set_continues_to_here(&mut loop_)?;

    self.emit.flush();
    self.context_depth -= 1;
    self
      .emit
      .ext_backward_branch(ExtOpcode::BranchIfForInHasNext, start);

    // both the create-context branch and iterator exhaustion land on the
    // trailing context end; breaks exited the context themselves and land
    // after it
    self.patch(end)?;
    self.emit.emit(Opcode::ContextEnd);
    self.emit.flush();
    self.set_breaks_to_here(loop_)
  }

  fn parse_switch_statement_start(&mut self) -> Result<()> {
    debug_assert!(self.check(Kw_Switch));
    self.parse_enclosed_expr()?;

    if !self.check(Brk_CurlyL) {
      return Err(self.error(ErrorKind::LeftBraceExpected));
    }
    let body_start = self.lex.save();
    self.lex.bump()?;

    if self.check(Brk_CurlyR) {
      // `switch (e) {}`: only the discriminant value must be dropped
      self.emit.emit(Opcode::Pop);
      self.emit.flush();
      self.stack.push(Statement::Block);
      return Ok(());
    }

    if !self.check(Kw_Case) && !self.check(Kw_Default) {
      return Err(self.error(ErrorKind::InvalidSwitch));
    }

    // first pass: compile the case expressions and their comparison
    // branches, skipping the statements in between
    let mut cases = VecDeque::new();
    let mut case_found = false;
    let mut default_found = false;

    loop {
      scan_until(&mut self.lex, ScanGoal::SwitchBody)?;

      if self.check(Kw_Default) {
        if default_found {
          return Err(self.error(ErrorKind::MultipleDefaultsNotAllowed));
        }
        self.lex.bump()?;
        if !self.check(Tok_Colon) {
          return Err(self.error(ErrorKind::ColonExpected));
        }
        default_found = true;
      } else {
        debug_assert!(self.check(Kw_Case) || self.check(Brk_CurlyR));
        if case_found {
          // close the previous case: its value is still on the stack, and
          // the comparison sits right after its expression in the stream.
          // The last case does not duplicate the discriminant.
          let opcode = if !self.check(Kw_Case) {
            self.emit.emit(Opcode::StrictEqual);
            Opcode::BranchIfTrueForward
          } else {
            Opcode::BranchIfStrictEqual
          };
          cases.push_back(self.emit.forward_branch(opcode));
        }

        if self.check(Brk_CurlyR) {
          break;
        }

        self.lex.bump()?;
        self.parse_expr()?;
        if !self.check(Tok_Colon) {
          return Err(self.error(ErrorKind::ColonExpected));
        }
        case_found = true;
      }

      self.lex.bump()?;
    }

    if !case_found {
      // only a default case: drop the discriminant
      self.emit.emit(Opcode::Pop);
    }

    let default = Some(self.emit.forward_branch(Opcode::JumpForward));

    self.stack.push(Statement::Switch {
      default,
      cases,
      has_default: default_found,
      loop_: Loop::default(),
    });

    // second pass: rewind and compile the body
    self.lex.restore(body_start);
    self.lex.bump()
  }

  fn parse_switch_statement_end(&mut self) -> Result<()> {
    let Some(Statement::Switch {
      default,
      cases,
      has_default,
      loop_,
    }) = self.stack.pop()
    else {
      unreachable!()
    };
    debug_assert!(cases.is_empty());

    if !has_default {
      let handle = default.expect("unpatched default branch on switch frame");
      self.patch(handle)?;
    }

    self.set_breaks_to_here(loop_)?;
    self.lex.bump()
  }

  fn parse_case_statement(&mut self) -> Result<()> {
    let Some(Statement::Switch { .. }) = self.stack.last() else {
      return Err(self.error(ErrorKind::CaseNotInSwitch));
    };

    // the expression was already compiled on the first pass
    scan_until(&mut self.lex, ScanGoal::Colon)?;
    self.lex.bump()?;

    let Some(Statement::Switch { cases, .. }) = self.stack.last_mut() else {
      unreachable!()
    };
    let branch = cases
      .pop_front()
      .expect("case comparison missing from switch frame");
    self.patch(branch)
  }

  fn parse_default_statement(&mut self) -> Result<()> {
    let Some(Statement::Switch { .. }) = self.stack.last() else {
      return Err(self.error(ErrorKind::DefaultNotInSwitch));
    };

    self.lex.bump()?;
    // already validated on the first pass
    debug_assert!(self.check(Tok_Colon));
    self.lex.bump()?;

    let Some(Statement::Switch { default, .. }) = self.stack.last_mut() else {
      unreachable!()
    };
    let handle = default
      .take()
      .expect("default branch patched twice on switch frame");
    self.patch(handle)
  }

  fn parse_try_statement_end(&mut self) -> Result<()> {
    let Some(Statement::Try { block, end }) = self.stack.pop() else {
      unreachable!()
    };

    self.lex.bump()?;

    if block == TryBlock::Finally {
      self.emit.flush();
      self.context_depth -= 1;
      self.emit.emit(Opcode::ContextEnd);
      return self.patch(end);
    }

    self.patch(end)?;

    if block == TryBlock::Catch {
      if !self.check(Kw_Finally) {
        // bare catch: close the context with a synthetic finally so that
        // every try context ends in a context end
        self.emit.flush();
        self.context_depth -= 1;
        self.emit.emit(Opcode::ContextEnd);
        self.emit.flush();
        return Ok(());
      }
    } else if !self.check(Kw_Catch) && !self.check(Kw_Finally) {
      return Err(self.error(ErrorKind::CatchFinallyExpected));
    }

    if self.check(Kw_Catch) {
      self.lex.bump()?;
      if !self.check(Brk_ParenL) {
        return Err(self.error(ErrorKind::LeftParenExpected));
      }
      self.lex.bump()?;
      if !self.check(Lit_Ident) {
        return Err(self.error(ErrorKind::IdentifierExpected));
      }
      let binding = self.ident_literal()?;
      self.lex.bump()?;
      if !self.check(Brk_ParenR) {
        return Err(self.error(ErrorKind::RightParenExpected));
      }
      self.lex.bump()?;
      if !self.check(Brk_CurlyL) {
        return Err(self.error(ErrorKind::LeftBraceExpected));
      }

      let end = self.emit.ext_forward_branch(ExtOpcode::Catch);
      self.emit.emit_literal(Opcode::AssignIdent, binding);
      self.emit.flush();
      self.stack.push(Statement::Try {
        block: TryBlock::Catch,
        end,
      });
    } else {
      debug_assert!(self.check(Kw_Finally));
      self.lex.bump()?;
      if !self.check(Brk_CurlyL) {
        return Err(self.error(ErrorKind::LeftBraceExpected));
      }

      let end = self.emit.ext_forward_branch(ExtOpcode::Finally);
      self.stack.push(Statement::Try {
        block: TryBlock::Finally,
        end,
      });
    }

    self.lex.bump()
  }

  fn parse_label(&mut self, name: &str, span: span::Span) -> Result<()> {
    for frame in self.stack[self.stack_base..].iter().rev() {
      if let Statement::Label { name: label, .. } = frame {
        if &**label == name {
          return Err(crate::Error::new(ErrorKind::DuplicatedLabel, span));
        }
      }
    }

    self.stack.push(Statement::Label {
      name: name.into(),
      breaks: Vec::new(),
    });
    Ok(())
  }

  fn parse_break_statement(&mut self) -> Result<()> {
    self.lex.bump()?;
    let mut opcode = Opcode::JumpForward;

    if !self.lex.token.was_newline && self.check(Lit_Ident) {
      let name = self.lex.lexeme(&self.lex.token);
      let mut target = None;
      for index in (self.stack_base..self.stack.len()).rev() {
        let frame = &self.stack[index];
        if frame.creates_context() {
          opcode = Opcode::JumpForwardExitContext;
        }
        if let Statement::Label { name: label, .. } = frame {
          if &**label == name {
            target = Some(index);
            break;
          }
        }
      }
      let Some(index) = target else {
        return Err(self.error(ErrorKind::InvalidBreakLabel));
      };

      let handle = self.emit.forward_branch(opcode);
      let Statement::Label { breaks, .. } = &mut self.stack[index] else {
        unreachable!()
      };
      breaks.push(PendingJump {
        handle,
        kind: JumpKind::Break,
      });
      return self.lex.bump();
    }

    let mut target = None;
    for index in (self.stack_base..self.stack.len()).rev() {
      let frame = &self.stack[index];
      if frame.creates_context() {
        opcode = Opcode::JumpForwardExitContext;
      }
      if frame.is_breakable() {
        target = Some(index);
        break;
      }
    }
    let Some(index) = target else {
      return Err(self.error(ErrorKind::InvalidBreak));
    };

    let handle = self.emit.forward_branch(opcode);
    self.stack[index]
      .loop_mut()
      .expect("break target has no branch list")
      .branches
      .push(PendingJump {
        handle,
        kind: JumpKind::Break,
      });
    Ok(())
  }

  fn parse_continue_statement(&mut self) -> Result<()> {
    self.lex.bump()?;
    let mut opcode = Opcode::JumpForward;

    if !self.lex.token.was_newline && self.check(Lit_Ident) {
      let name = self.lex.lexeme(&self.lex.token);
      // only a label directly wrapping a loop may be continued; the walk
      // remembers the loop seen right before a run of labels
      let mut last_loop = None;
      let mut for_in_was_seen = false;
      let mut target = None;

      let mut index = self.stack.len();
      while index > self.stack_base {
        index -= 1;
        let frame = &self.stack[index];

        if last_loop.is_some() {
          if let Statement::Label { name: label, .. } = frame {
            if &**label == name {
              target = last_loop;
              break;
            }
            continue;
          }
        }

        if matches!(frame, Statement::With { .. } | Statement::Try { .. }) || for_in_was_seen {
          opcode = Opcode::JumpForwardExitContext;
        } else if matches!(frame, Statement::ForIn { .. }) {
          // the innermost for-in is its own continue target; only crossing
          // a second one exits a context
          for_in_was_seen = true;
        }

        last_loop = frame.is_loop().then_some(index);
      }

      let Some(index) = target else {
        return Err(self.error(ErrorKind::InvalidContinueLabel));
      };

      let handle = self.emit.forward_branch(opcode);
      self.stack[index]
        .loop_mut()
        .expect("continue target has no branch list")
        .branches
        .push(PendingJump {
          handle,
          kind: JumpKind::Continue,
        });
      return self.lex.bump();
    }

    let mut target = None;
    for index in (self.stack_base..self.stack.len()).rev() {
      let frame = &self.stack[index];
      if frame.is_loop() {
        target = Some(index);
        break;
      }
      if matches!(frame, Statement::With { .. } | Statement::Try { .. }) {
        opcode = Opcode::JumpForwardExitContext;
      }
    }
    let Some(index) = target else {
      return Err(self.error(ErrorKind::InvalidContinue));
    };

    let handle = self.emit.forward_branch(opcode);
    self.stack[index]
      .loop_mut()
      .expect("continue target has no branch list")
      .branches
      .push(PendingJump {
        handle,
        kind: JumpKind::Continue,
      });
    Ok(())
  }

  /// Patch the continue-kind jumps in `loop_` to the current position,
  /// keeping the breaks for the loop's end.
  fn set_continues_to_here(&mut self, loop_: &mut Loop) -> Result<()> {
    let branches = std::mem::take(&mut loop_.branches);
    for jump in branches {
      match jump.kind {
        JumpKind::Continue => self.patch(jump.handle)?,
        JumpKind::Break => loop_.branches.push(jump),
      }
    }
    Ok(())
  }

  /// Patch the remaining (break-kind) jumps to the current position.
  fn set_breaks_to_here(&mut self, loop_: Loop) -> Result<()> {
    for jump in loop_.branches {
      debug_assert_eq!(jump.kind, JumpKind::Break);
      self.patch(jump.handle)?;
    }
    Ok(())
  }
}
