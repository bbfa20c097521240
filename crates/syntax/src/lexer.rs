#![allow(non_camel_case_types)]

use logos::Logos;
use span::Span;

use crate::{Error, ErrorKind, Result};

/// A single token.
///
/// `was_newline` is set when a line terminator (possibly inside a comment)
/// precedes the token; automatic semicolon insertion and the `break` /
/// `continue` / `return` / postfix `++` rules key off of it.
#[derive(Clone, Debug)]
pub struct Token {
  pub kind: TokenKind,
  pub span: Span,
  pub was_newline: bool,
}

impl Token {
  fn eos(at: usize, was_newline: bool) -> Token {
    Token {
      kind: TokenKind::Tok_Eos,
      span: Span::new(at, at),
      was_newline,
    }
  }
}

/// On-demand lexer.
///
/// Unlike a pre-tokenizing lexer, this one scans a single token per `bump`
/// from a byte cursor. The parser moves the cursor around: pre-scanned
/// regions are re-tokenized later (`set_range`), and `/` is re-scanned as a
/// regexp literal when it appears in primary expression position
/// (`construct_regexp`).
#[derive(Clone)]
pub struct Lexer<'src> {
  src: &'src str,
  /// Where the next token scan starts.
  pos: usize,
  /// End-of-source limit; re-tokenized regions clamp this so the parser
  /// sees `Tok_Eos` at the end of the region.
  end: usize,
  pub token: Token,
}

/// Saved lexer position, including the current token.
#[derive(Clone)]
pub struct LexState {
  pos: usize,
  end: usize,
  token: Token,
}

/// Result of scanning an object literal key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyName {
  /// `}` — the literal ends here.
  CloseBrace,
  /// `get` followed by an accessor definition.
  Getter,
  /// `set` followed by an accessor definition.
  Setter,
  /// An ordinary key; the token is left on it.
  Name,
}

impl<'src> Lexer<'src> {
  pub fn new(src: &'src str) -> Self {
    Lexer {
      src,
      pos: 0,
      end: src.len(),
      token: Token::eos(0, false),
    }
  }

  #[inline]
  pub fn src(&self) -> &'src str {
    self.src
  }

  #[inline]
  pub fn lexeme(&self, token: &Token) -> &'src str {
    &self.src[token.span.range()]
  }

  /// Cursor position: the offset right after the current token.
  #[inline]
  pub fn position(&self) -> usize {
    self.pos
  }

  pub fn save(&self) -> LexState {
    LexState {
      pos: self.pos,
      end: self.end,
      token: self.token.clone(),
    }
  }

  pub fn restore(&mut self, state: LexState) {
    self.pos = state.pos;
    self.end = state.end;
    self.token = state.token;
  }

  /// Re-position into `span`; subsequent tokens come from the region and it
  /// ends in `Tok_Eos`. The caller `bump`s to load the first token.
  pub fn set_range(&mut self, span: Span) {
    self.pos = span.start;
    self.end = span.end;
  }

  /// Move the cursor, keeping the current end-of-source limit.
  pub fn set_position(&mut self, pos: usize) {
    self.pos = pos;
  }

  /// Advance to the next token.
  pub fn bump(&mut self) -> Result<()> {
    let mut was_newline = false;
    loop {
      if self.pos >= self.end {
        self.token = Token::eos(self.end, was_newline);
        return Ok(());
      }
      let mut inner = TokenKind::lexer(&self.src[self.pos..self.end]);
      let Some(kind) = inner.next() else {
        self.token = Token::eos(self.end, was_newline);
        return Ok(());
      };
      let span = Span::new(self.pos + inner.span().start, self.pos + inner.span().end);
      self.pos = span.end;
      match kind {
        TokenKind::_Whitespace | TokenKind::_Comment => {
          let text = &self.src[span.range()];
          if text.contains('\n') || text.contains('\r') {
            was_newline = true;
          }
        }
        TokenKind::Tok_Error => {
          let kind = match self.src.as_bytes()[span.start] {
            b'"' | b'\'' => ErrorKind::UnterminatedString,
            _ => ErrorKind::InvalidToken,
          };
          return Err(Error::new(kind, span));
        }
        kind => {
          self.token = Token {
            kind,
            span,
            was_newline,
          };
          return Ok(());
        }
      }
    }
  }

  /// Re-scan the current `/` or `/=` token as a regexp literal.
  ///
  /// This is the regex-vs-division resolution point: the caller decides,
  /// based on whether a primary expression is expected, and the lexer only
  /// does the scanning. On success the current token is `Lit_RegExp` and the
  /// returned spans cover the pattern and the flags.
  pub fn construct_regexp(&mut self) -> Result<(Span, Span)> {
    debug_assert!(matches!(
      self.token.kind,
      TokenKind::Op_Slash | TokenKind::Op_SlashEqual
    ));

    let start = self.token.span.start;
    let bytes = self.src.as_bytes();
    let mut i = start + 1;
    let mut in_class = false;
    loop {
      if i >= self.end {
        return Err(Error::new(
          ErrorKind::UnterminatedRegExp,
          Span::new(start, self.end),
        ));
      }
      match bytes[i] {
        b'\n' | b'\r' => {
          return Err(Error::new(
            ErrorKind::UnterminatedRegExp,
            Span::new(start, i),
          ));
        }
        b'\\' => {
          i += 1;
        }
        b'[' => in_class = true,
        b']' => in_class = false,
        b'/' if !in_class => break,
        _ => {}
      }
      i += 1;
    }
    let pattern = Span::new(start + 1, i);

    let mut j = i + 1;
    while j < self.end && is_ident_byte(bytes[j]) {
      j += 1;
    }
    let flags = Span::new(i + 1, j);

    self.token = Token {
      kind: TokenKind::Lit_RegExp,
      span: Span::new(start, j),
      was_newline: self.token.was_newline,
    };
    self.pos = j;
    Ok((pattern, flags))
  }

  /// Advance to the next token, which must be a property name after `.`;
  /// reserved words are valid identifiers here.
  pub fn scan_dot_property(&mut self) -> Result<()> {
    self.bump()?;
    if self.token.kind.is_identifier_name() {
      self.token.kind = TokenKind::Lit_Ident;
      Ok(())
    } else {
      Err(Error::new(ErrorKind::IdentifierExpected, self.token.span))
    }
  }

  /// Advance to the next token, which must open an object literal entry:
  /// a key (reserved words allowed), a `get`/`set` accessor head, or `}`.
  ///
  /// For `Getter`/`Setter` the token is left on the accessor's name.
  pub fn scan_property_name(&mut self) -> Result<PropertyName> {
    self.bump()?;
    match self.token.kind {
      TokenKind::Brk_CurlyR => Ok(PropertyName::CloseBrace),
      TokenKind::Lit_Ident => {
        let lexeme = self.lexeme(&self.token);
        if lexeme == "get" || lexeme == "set" {
          let getter = lexeme == "get";
          let state = self.save();
          self.bump()?;
          // a plain property may still be named `get` / `set`
          if matches!(
            self.token.kind,
            TokenKind::Tok_Colon | TokenKind::Tok_Comma | TokenKind::Brk_CurlyR
          ) {
            self.restore(state);
            return Ok(PropertyName::Name);
          }
          return Ok(if getter {
            PropertyName::Getter
          } else {
            PropertyName::Setter
          });
        }
        Ok(PropertyName::Name)
      }
      kind if kind.is_property_name() => {
        self.token.kind = match kind {
          TokenKind::Lit_String | TokenKind::Lit_Number => kind,
          // reserved words become plain keys
          _ => TokenKind::Lit_Ident,
        };
        Ok(PropertyName::Name)
      }
      _ => Err(Error::new(ErrorKind::PropertyNameExpected, self.token.span)),
    }
  }
}

fn is_ident_byte(byte: u8) -> bool {
  byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// The ES5.1 `FutureReservedWord`s that are additionally reserved in
/// strict mode code.
pub fn is_strict_reserved(name: &str) -> bool {
  matches!(
    name,
    "implements"
      | "interface"
      | "let"
      | "package"
      | "private"
      | "protected"
      | "public"
      | "static"
      | "yield"
  )
}

#[derive(Clone, Copy, Debug, Logos, PartialEq, Eq)]
pub enum TokenKind {
  // Keywords
  #[token("break")]
  Kw_Break,
  #[token("case")]
  Kw_Case,
  #[token("catch")]
  Kw_Catch,
  #[token("continue")]
  Kw_Continue,
  #[token("debugger")]
  Kw_Debugger,
  #[token("default")]
  Kw_Default,
  #[token("delete")]
  Kw_Delete,
  #[token("do")]
  Kw_Do,
  #[token("else")]
  Kw_Else,
  #[token("finally")]
  Kw_Finally,
  #[token("for")]
  Kw_For,
  #[token("function")]
  Kw_Function,
  #[token("if")]
  Kw_If,
  #[token("in")]
  Kw_In,
  #[token("instanceof")]
  Kw_Instanceof,
  #[token("new")]
  Kw_New,
  #[token("return")]
  Kw_Return,
  #[token("switch")]
  Kw_Switch,
  #[token("this")]
  Kw_This,
  #[token("throw")]
  Kw_Throw,
  #[token("try")]
  Kw_Try,
  #[token("typeof")]
  Kw_Typeof,
  #[token("var")]
  Kw_Var,
  #[token("void")]
  Kw_Void,
  #[token("while")]
  Kw_While,
  #[token("with")]
  Kw_With,

  // Brackets
  #[token("{")]
  Brk_CurlyL,
  #[token("}")]
  Brk_CurlyR,
  #[token("(")]
  Brk_ParenL,
  #[token(")")]
  Brk_ParenR,
  #[token("[")]
  Brk_SquareL,
  #[token("]")]
  Brk_SquareR,

  // Misc characters
  #[token(".")]
  Op_Dot,
  #[token(",")]
  Tok_Comma,
  #[token(";")]
  Tok_Semicolon,
  #[token(":")]
  Tok_Colon,
  #[token("?")]
  Tok_Question,

  // Assignment operators
  #[token("=")]
  Op_Equal,
  #[token("+=")]
  Op_PlusEqual,
  #[token("-=")]
  Op_MinusEqual,
  #[token("*=")]
  Op_StarEqual,
  #[token("/=")]
  Op_SlashEqual,
  #[token("%=")]
  Op_PercentEqual,
  #[token("<<=")]
  Op_ShlEqual,
  #[token(">>=")]
  Op_ShrEqual,
  #[token(">>>=")]
  Op_UshrEqual,
  #[token("&=")]
  Op_AmpEqual,
  #[token("|=")]
  Op_PipeEqual,
  #[token("^=")]
  Op_CaretEqual,

  // Equality operators
  #[token("==")]
  Op_EqualEqual,
  #[token("!=")]
  Op_BangEqual,
  #[token("===")]
  Op_EqualEqualEqual,
  #[token("!==")]
  Op_BangEqualEqual,

  // Relational and shift operators
  #[token("<")]
  Op_Less,
  #[token(">")]
  Op_More,
  #[token("<=")]
  Op_LessEqual,
  #[token(">=")]
  Op_MoreEqual,
  #[token("<<")]
  Op_Shl,
  #[token(">>")]
  Op_Shr,
  #[token(">>>")]
  Op_Ushr,

  // Arithmetic operators
  #[token("+")]
  Op_Plus,
  #[token("-")]
  Op_Minus,
  #[token("*")]
  Op_Star,
  #[token("/")]
  Op_Slash,
  #[token("%")]
  Op_Percent,

  // Bitwise and logical operators
  #[token("&")]
  Op_Amp,
  #[token("|")]
  Op_Pipe,
  #[token("^")]
  Op_Caret,
  #[token("~")]
  Op_Tilde,
  #[token("&&")]
  Op_AmpAmp,
  #[token("||")]
  Op_PipePipe,
  #[token("!")]
  Op_Bang,
  #[token("++")]
  Op_PlusPlus,
  #[token("--")]
  Op_MinusMinus,

  // Literals
  #[token("true")]
  Lit_True,
  #[token("false")]
  Lit_False,
  #[token("null")]
  Lit_Null,
  /// `0`, `1.5`, `5e10`, `0x1F`, etc.
  #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
  #[regex(r"0[xX][0-9a-fA-F]+")]
  Lit_Number,
  #[regex(r#""([^"\\\n\r]|\\.)*""#)]
  #[regex(r#"'([^'\\\n\r]|\\.)*'"#)]
  Lit_String,
  /// `a`, `b_c`, `$x0`, etc.
  #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
  Lit_Ident,
  /// Constructed by [`Lexer::construct_regexp`], never matched directly.
  Lit_RegExp,

  #[doc(hidden)]
  #[regex(r"[ \t\r\n\u{000B}\u{000C}]+")]
  _Whitespace,
  #[doc(hidden)]
  #[regex(r"//[^\n]*")]
  #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
  _Comment,

  #[error]
  Tok_Error,
  Tok_Eos,
}

impl TokenKind {
  pub fn is_keyword(self) -> bool {
    use TokenKind::*;
    matches!(
      self,
      Kw_Break
        | Kw_Case
        | Kw_Catch
        | Kw_Continue
        | Kw_Debugger
        | Kw_Default
        | Kw_Delete
        | Kw_Do
        | Kw_Else
        | Kw_Finally
        | Kw_For
        | Kw_Function
        | Kw_If
        | Kw_In
        | Kw_Instanceof
        | Kw_New
        | Kw_Return
        | Kw_Switch
        | Kw_This
        | Kw_Throw
        | Kw_Try
        | Kw_Typeof
        | Kw_Var
        | Kw_Void
        | Kw_While
        | Kw_With
    )
  }

  /// Tokens accepted as identifiers after `.` and as object keys.
  pub fn is_identifier_name(self) -> bool {
    use TokenKind::*;
    matches!(self, Lit_Ident | Lit_True | Lit_False | Lit_Null) || self.is_keyword()
  }

  pub fn is_property_name(self) -> bool {
    use TokenKind::*;
    matches!(self, Lit_String | Lit_Number) || self.is_identifier_name()
  }

  /// Every binary operator, including assignment; used by the pre-scanner
  /// and the directive prologue's continuation check.
  pub fn is_binary_op(self) -> bool {
    use TokenKind::*;
    matches!(
      self,
      Op_Equal
        | Op_PlusEqual
        | Op_MinusEqual
        | Op_StarEqual
        | Op_SlashEqual
        | Op_PercentEqual
        | Op_ShlEqual
        | Op_ShrEqual
        | Op_UshrEqual
        | Op_AmpEqual
        | Op_PipeEqual
        | Op_CaretEqual
        | Op_EqualEqual
        | Op_BangEqual
        | Op_EqualEqualEqual
        | Op_BangEqualEqual
        | Op_Less
        | Op_More
        | Op_LessEqual
        | Op_MoreEqual
        | Op_Shl
        | Op_Shr
        | Op_Ushr
        | Op_Plus
        | Op_Minus
        | Op_Star
        | Op_Slash
        | Op_Percent
        | Op_Amp
        | Op_Pipe
        | Op_Caret
        | Op_AmpAmp
        | Op_PipePipe
        | Kw_In
        | Kw_Instanceof
    )
  }

  /// Unary operators other than `+` and `-`.
  pub fn is_unary_op(self) -> bool {
    use TokenKind::*;
    matches!(
      self,
      Op_Bang | Op_Tilde | Op_PlusPlus | Op_MinusMinus | Kw_Delete | Kw_Typeof | Kw_Void
    )
  }
}

#[cfg(test)]
mod tests;
