use beef::lean::Cow;
use span::Span;

/// A source string together with an optional name,
/// with line lookup for rendering reports.
#[derive(Clone)]
pub struct Source<'a> {
  name: Option<Cow<'a, str>>,
  str: &'a str,
}

impl<'a> Source<'a> {
  pub fn string(str: &'a str) -> Self {
    Source { name: None, str }
  }

  pub fn file(name: impl Into<Cow<'a, str>>, str: &'a str) -> Self {
    Source {
      name: Some(name.into()),
      str,
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn str(&self) -> &'a str {
    self.str
  }

  /// 1-based line and column of `pos`.
  ///
  /// Columns count bytes, which matches how the lexer measures them.
  pub fn line_col(&self, pos: usize) -> (usize, usize) {
    let pos = pos.min(self.str.len());
    let mut line = 1;
    let mut line_start = 0;
    for (i, b) in self.str.bytes().enumerate() {
      if i >= pos {
        break;
      }
      if b == b'\n' {
        line += 1;
        line_start = i + 1;
      }
    }
    (line, pos - line_start + 1)
  }

  /// The span of the full line containing `pos`, without its terminator.
  pub fn line_span(&self, pos: usize) -> Span {
    let pos = pos.min(self.str.len());
    let start = self.str[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = self.str[pos..]
      .find('\n')
      .map(|i| pos + i)
      .unwrap_or(self.str.len());
    Span { start, end }
  }
}

impl<'a> From<&'a str> for Source<'a> {
  fn from(value: &'a str) -> Self {
    Source::string(value)
  }
}
