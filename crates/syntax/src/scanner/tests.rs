use indoc::indoc;

use super::*;
use crate::lexer::Lexer;

/// Lexes `src`, positions on the first token, and scans.
fn scan(src: &str, goal: ScanGoal) -> (Span, String) {
  let mut lex = Lexer::new(src);
  lex.bump().unwrap();
  let range = scan_until(&mut lex, goal).unwrap();
  let terminator = lex.lexeme(&lex.token).to_string();
  (range, terminator)
}

fn scan_err(src: &str, goal: ScanGoal) -> ErrorKind {
  let mut lex = Lexer::new(src);
  lex.bump().unwrap();
  scan_until(&mut lex, goal).unwrap_err().kind
}

#[test]
fn while_condition() {
  // entered on `(`, stops at the matching `)`
  let src = "( i < (n + 1) ) body";
  let (range, terminator) = scan(src, ScanGoal::RightParen);
  assert_eq!(terminator, ")");
  assert_eq!(&src[range.range()], " i < (n + 1)");
}

#[test]
fn for_header_in() {
  let (_, terminator) = scan("( x in obj )", ScanGoal::In);
  assert_eq!(terminator, "in");

  let (_, terminator) = scan("( var x in obj )", ScanGoal::In);
  assert_eq!(terminator, "in");

  // `in` inside a nested expression does not terminate the scan
  let (_, terminator) = scan("( (a in b); x < 3; x++ )", ScanGoal::In);
  assert_eq!(terminator, ";");
}

#[test]
fn for_header_ordinary() {
  // for (;;) stops at the first `;`, signalling "not a for-in"
  let (_, terminator) = scan("( i = 0; i < n; i++ )", ScanGoal::In);
  assert_eq!(terminator, ";");
}

#[test]
fn nested_brackets() {
  let src = "( f(a[b], {x: [1, 2], y: g()}) ) tail";
  let (range, terminator) = scan(src, ScanGoal::RightParen);
  assert_eq!(terminator, ")");
  assert_eq!(range.end, src.find(" ) tail").unwrap());
}

#[test]
fn object_literal_accessors() {
  let src = "( {get x() { return 1; }, set x(v) {}, z: 2} )";
  let (_, terminator) = scan(src, ScanGoal::RightParen);
  assert_eq!(terminator, ")");
}

#[test]
fn function_expression_body_is_opaque() {
  // the `;` inside the function body must not terminate the scan
  let src = "; x = function f(a, b) { g(); }; done";
  let (range, terminator) = scan(src, ScanGoal::Semicolon);
  assert_eq!(terminator, ";");
  assert_eq!(range.end, src.rfind("; done").unwrap());
}

#[test]
fn regex_vs_division() {
  // in primary position `/` starts a regexp; the `)` inside it is opaque
  let (_, terminator) = scan("( /a)b/ )", ScanGoal::RightParen);
  assert_eq!(terminator, ")");

  // after a primary, `/` is division
  let (_, terminator) = scan("( a / b )", ScanGoal::RightParen);
  assert_eq!(terminator, ")");
}

#[test]
fn switch_body() {
  let src = indoc! {"
    f(1); { g(2); }
    case 2:
  "};
  let mut lex = Lexer::new(src);
  lex.bump().unwrap();
  scan_until(&mut lex, ScanGoal::SwitchBody).unwrap();
  assert_eq!(lex.lexeme(&lex.token), "case");
}

#[test]
fn switch_body_nested_switch() {
  // `case` of a nested switch is consumed inside its block frame
  let src = "switch (x) { case 1: break; } default:";
  let mut lex = Lexer::new(src);
  lex.bump().unwrap();
  scan_until(&mut lex, ScanGoal::SwitchBody).unwrap();
  assert_eq!(lex.lexeme(&lex.token), "default");
}

#[test]
fn case_expression() {
  // scanning for `:` skips a nested conditional
  let src = "case a ? b : c : x";
  let mut lex = Lexer::new(src);
  lex.bump().unwrap();
  let range = scan_until(&mut lex, ScanGoal::Colon).unwrap();
  assert_eq!(lex.token.span.start, src.rfind(':').unwrap());
  assert_eq!(&src[range.range()], " a ? b : c");
}

#[test]
fn postfix_asi() {
  // a newline before `++` terminates the expression, and a new statement
  // cannot start inside a parenthesized header
  let kind = scan_err("( a\n++ )", ScanGoal::RightParen);
  assert_eq!(kind, ErrorKind::InvalidExpression);

  // without the newline it is a postfix operator
  let (_, terminator) = scan("( a++ )", ScanGoal::RightParen);
  assert_eq!(terminator, ")");
}

#[test]
fn eos_fails() {
  assert_eq!(
    scan_err("( a + b", ScanGoal::RightParen),
    ErrorKind::ExpressionExpected
  );
}

#[test]
fn stray_semicolon_in_array() {
  assert_eq!(
    scan_err("( [1; 2] )", ScanGoal::RightParen),
    ErrorKind::InvalidExpression
  );
}
