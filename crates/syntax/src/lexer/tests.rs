use super::*;

fn collect(src: &str) -> Vec<(TokenKind, String)> {
  let mut lex = Lexer::new(src);
  let mut out = vec![];
  loop {
    lex.bump().unwrap();
    if lex.token.kind == TokenKind::Tok_Eos {
      break;
    }
    out.push((lex.token.kind, lex.lexeme(&lex.token).to_string()));
  }
  out
}

#[test]
fn tokens() {
  use TokenKind::*;
  let tokens = collect("var x = a >>> 2; // trailing\nx !== 0x1F");
  let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
  assert_eq!(
    kinds,
    vec![
      Kw_Var,
      Lit_Ident,
      Op_Equal,
      Lit_Ident,
      Op_Ushr,
      Lit_Number,
      Tok_Semicolon,
      Lit_Ident,
      Op_BangEqualEqual,
      Lit_Number,
    ]
  );
}

#[test]
fn newline_flags() {
  let mut lex = Lexer::new("a\nb /* c\n */ d e");
  lex.bump().unwrap(); // a
  assert!(!lex.token.was_newline);
  lex.bump().unwrap(); // b
  assert!(lex.token.was_newline);
  lex.bump().unwrap(); // d, newline inside the block comment counts
  assert!(lex.token.was_newline);
  lex.bump().unwrap(); // e
  assert!(!lex.token.was_newline);
}

#[test]
fn strings() {
  let tokens = collect(r#" "a\"b" 'c\'d' "#);
  assert_eq!(tokens[0].0, TokenKind::Lit_String);
  assert_eq!(tokens[0].1, r#""a\"b""#);
  assert_eq!(tokens[1].0, TokenKind::Lit_String);

  let mut lex = Lexer::new("\"abc");
  let err = lex.bump().unwrap_err();
  assert_eq!(err.kind, crate::ErrorKind::UnterminatedString);
}

#[test]
fn regexp_construction() {
  let mut lex = Lexer::new("/a[/]b\\/c/gi + 1");
  lex.bump().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Op_Slash);
  let (pattern, flags) = lex.construct_regexp().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Lit_RegExp);
  assert_eq!(&lex.src()[pattern.range()], "a[/]b\\/c");
  assert_eq!(&lex.src()[flags.range()], "gi");
  lex.bump().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Op_Plus);
}

#[test]
fn regexp_after_assign_divide() {
  // the `=` is part of the pattern when the token was `/=`
  let mut lex = Lexer::new("/=a/");
  lex.bump().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Op_SlashEqual);
  let (pattern, _) = lex.construct_regexp().unwrap();
  assert_eq!(&lex.src()[pattern.range()], "=a");
}

#[test]
fn unterminated_regexp() {
  let mut lex = Lexer::new("/ab\nc/");
  lex.bump().unwrap();
  let err = lex.construct_regexp().unwrap_err();
  assert_eq!(err.kind, crate::ErrorKind::UnterminatedRegExp);
}

#[test]
fn range_relexing() {
  let src = "while (i < n) x;";
  let mut lex = Lexer::new(src);
  lex.bump().unwrap();

  // re-tokenize only `i < n`
  lex.set_range(Span::new(7, 12));
  lex.bump().unwrap();
  assert_eq!(lex.lexeme(&lex.token), "i");
  lex.bump().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Op_Less);
  lex.bump().unwrap();
  assert_eq!(lex.lexeme(&lex.token), "n");
  lex.bump().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Tok_Eos);
}

#[test]
fn save_restore() {
  let mut lex = Lexer::new("a b c");
  lex.bump().unwrap();
  let state = lex.save();
  lex.bump().unwrap();
  lex.bump().unwrap();
  assert_eq!(lex.lexeme(&lex.token), "c");
  lex.restore(state);
  assert_eq!(lex.lexeme(&lex.token), "a");
  lex.bump().unwrap();
  assert_eq!(lex.lexeme(&lex.token), "b");
}

#[test]
fn dot_property_allows_reserved() {
  let mut lex = Lexer::new("a.in");
  lex.bump().unwrap();
  lex.bump().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Op_Dot);
  lex.scan_dot_property().unwrap();
  assert_eq!(lex.token.kind, TokenKind::Lit_Ident);
  assert_eq!(lex.lexeme(&lex.token), "in");
}

#[test]
fn property_names() {
  // ordinary key named `get`
  let mut lex = Lexer::new("{ get: 1 }");
  lex.bump().unwrap();
  assert_eq!(lex.scan_property_name().unwrap(), PropertyName::Name);
  assert_eq!(lex.lexeme(&lex.token), "get");

  // accessor
  let mut lex = Lexer::new("{ get x() {} }");
  lex.bump().unwrap();
  assert_eq!(lex.scan_property_name().unwrap(), PropertyName::Getter);
  assert_eq!(lex.lexeme(&lex.token), "x");

  // reserved word key
  let mut lex = Lexer::new("{ var: 1 }");
  lex.bump().unwrap();
  assert_eq!(lex.scan_property_name().unwrap(), PropertyName::Name);
  assert_eq!(lex.token.kind, TokenKind::Lit_Ident);
}
