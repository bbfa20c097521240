use std::fmt::{self, Write};

use beef::lean::Cow;
use owo_colors::OwoColorize;
use span::Span;
use thiserror::Error;

use crate::source::Source;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
  Info,
  Warning,
  Error,
}

impl Level {
  fn header(&self) -> &'static str {
    match self {
      Level::Info => "info",
      Level::Warning => "warning",
      Level::Error => "error",
    }
  }
}

#[derive(Debug, Error)]
pub enum EmitError {
  #[error("failed to format report")]
  Fmt(#[from] fmt::Error),
}

/// A single diagnostic which may be emitted to anything
/// implementing [`fmt::Write`].
///
/// ```text
/// error: `while` expected
///  --> 2:5
///   |
/// 2 | } (x);
///   |   ^^^
/// ```
pub struct Report<'a> {
  level: Level,
  source: Source<'a>,
  message: Cow<'a, str>,
  span: Span,
  label: Option<Cow<'a, str>>,
  color: bool,
}

impl<'a> Report<'a> {
  pub fn new(
    level: Level,
    source: impl Into<Source<'a>>,
    message: impl Into<Cow<'a, str>>,
    span: impl Into<Span>,
  ) -> Self {
    Report {
      level,
      source: source.into(),
      message: message.into(),
      span: span.into(),
      label: None,
      color: true,
    }
  }

  /// An `Error`-level report.
  pub fn error(
    source: impl Into<Source<'a>>,
    message: impl Into<Cow<'a, str>>,
    span: impl Into<Span>,
  ) -> Self {
    Report::new(Level::Error, source, message, span)
  }

  /// A `Warning`-level report.
  pub fn warn(
    source: impl Into<Source<'a>>,
    message: impl Into<Cow<'a, str>>,
    span: impl Into<Span>,
  ) -> Self {
    Report::new(Level::Warning, source, message, span)
  }

  pub fn label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn color(mut self, enabled: bool) -> Self {
    self.color = enabled;
    self
  }

  pub fn emit(&self, out: &mut impl Write) -> Result<(), EmitError> {
    let (line, col) = self.source.line_col(self.span.start);
    let line_span = self.source.line_span(self.span.start);
    let text = &self.source.str()[line_span.range()];

    // `error: message`
    if self.color {
      match self.level {
        Level::Info => write!(out, "{}", self.level.header().blue().bold())?,
        Level::Warning => write!(out, "{}", self.level.header().yellow().bold())?,
        Level::Error => write!(out, "{}", self.level.header().red().bold())?,
      }
    } else {
      write!(out, "{}", self.level.header())?;
    }
    writeln!(out, ": {}", self.message)?;

    // ` --> name:line:col`
    match self.source.name() {
      Some(name) => writeln!(out, " --> {name}:{line}:{col}")?,
      None => writeln!(out, " --> {line}:{col}")?,
    }

    // the offending line with an underline
    let n = line.to_string();
    let pad = " ".repeat(n.len());
    writeln!(out, "{pad} |")?;
    writeln!(out, "{n} | {text}")?;
    let underline_start = self.span.start - line_span.start;
    let underline_len = self
      .span
      .len()
      .min(line_span.end.saturating_sub(self.span.start))
      .max(1);
    write!(
      out,
      "{pad} | {}{}",
      " ".repeat(underline_start),
      "^".repeat(underline_len)
    )?;
    match &self.label {
      Some(label) => writeln!(out, " {label}")?,
      None => writeln!(out)?,
    }

    Ok(())
  }

  pub fn emit_to_string(&self) -> String {
    let mut out = String::new();
    self
      .emit(&mut out)
      .expect("fmt::Write for String does not fail");
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_emit_report() {
    let src = "let x = ;\nlet y = 1;";
    let report = Report::error(src, "expression expected", Span::new(8, 9)).color(false);
    let out = report.emit_to_string();
    assert_eq!(
      out,
      "error: expression expected\n --> 1:9\n  |\n1 | let x = ;\n  |         ^\n"
    );
  }

  #[test]
  fn test_emit_report_with_label() {
    let src = "a\nb ~ c\n";
    let report = Report::error(src, "invalid token", Span::new(4, 5))
      .color(false)
      .label("here");
    let out = report.emit_to_string();
    assert_eq!(
      out,
      "error: invalid token\n --> 2:3\n  |\n2 | b ~ c\n  |   ^ here\n"
    );
  }
}
