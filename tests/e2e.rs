use indoc::indoc;
use kumo::{Kumo, Value};

#[test]
fn kumo_e2e() {
  let kumo = Kumo::new();

  let result = kumo
    .eval(indoc! {r#"
      var total = 0;
      var i = 0;
      while (i < 10) {
        total = total + i;
        i = i + 1;
      }
      total;
    "#})
    .unwrap();
  assert_eq!(result, Value::Number(45.0));
  assert_eq!(kumo.global("i"), Some(Value::Number(10.0)));
}

#[test]
fn globals_persist_between_evals() {
  let kumo = Kumo::new();
  kumo.eval("var x = 21;").unwrap();
  let result = kumo.eval("x * 2;").unwrap();
  assert_eq!(result, Value::Number(42.0));
}

#[test]
fn branching() {
  let kumo = Kumo::new();
  let result = kumo
    .eval(indoc! {r#"
      var x = 3;
      if (x === 3) { x = "three"; } else { x = "other"; }
      x;
    "#})
    .unwrap();
  assert_eq!(result, Value::str("three"));
}

#[test]
fn do_while_and_strings() {
  let kumo = Kumo::new();
  let result = kumo
    .eval(indoc! {r#"
      var s = "";
      var n = 3;
      do {
        s = s + "x";
        n = n - 1;
      } while (n);
      s;
    "#})
    .unwrap();
  assert_eq!(result, Value::str("xxx"));
}

#[test]
fn ternary_and_logic() {
  let kumo = Kumo::new();
  assert_eq!(
    kumo.eval("1 ? 'a' : 'b';").unwrap(),
    Value::str("a")
  );
  assert_eq!(kumo.eval("0 || 'fallback';").unwrap(), Value::str("fallback"));
  assert_eq!(kumo.eval("1 && 2;").unwrap(), Value::Number(2.0));
}

#[test]
fn uncaught_throw() {
  let kumo = Kumo::new();
  let err = kumo.eval("throw 'boom';").unwrap_err();
  assert!(matches!(err, kumo::Error::Runtime(_)));
}

#[test]
fn syntax_error_reports() {
  let kumo = Kumo::new();
  let src = "var x = ;";
  let err = kumo.check(src).unwrap_err();
  let report = err.report(src);
  assert!(report.contains("error"));
  assert!(report.contains("var x = ;"));
}

#[test]
fn check_does_not_run() {
  let kumo = Kumo::new();
  kumo.check("var x = 1;").unwrap();
  assert_eq!(kumo.global("x"), None);
}
