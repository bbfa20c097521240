use bytecode::{Chunk, Decoded, Literal};
use indoc::indoc;

use super::*;
use crate::ErrorKind;

fn compile(src: &str) -> Chunk {
  match parse(src) {
    Ok(chunk) => chunk,
    Err(e) => panic!("{}", e.report(src)),
  }
}

fn compile_err(src: &str) -> ErrorKind {
  parse(src).expect_err("source parsed successfully").kind
}

/// Compile `src` as a function body and return the function's chunk.
fn function_chunk(src: &str) -> Chunk {
  let chunk = compile(&format!("function f() {{ {src} }}"));
  for literal in &chunk.literals {
    if let Literal::Function(inner) = literal {
      return (**inner).clone();
    }
  }
  panic!("no function literal in chunk");
}

fn names_of(chunk: &Chunk) -> Vec<&'static str> {
  chunk
    .instructions()
    .map(|instr| instr.unwrap().op.name())
    .collect()
}

/// Opcode names of `src` compiled as a function body, without the
/// trailing implicit return.
fn fnames(src: &str) -> Vec<&'static str> {
  let mut names = names_of(&function_chunk(src));
  assert_eq!(names.pop(), Some("return_with_undefined"));
  names
}

fn fops(src: &str) -> Vec<String> {
  let chunk = function_chunk(src);
  let mut ops = chunk.op_list();
  ops.pop();
  ops
}

/// Every forward branch must point forward, every backward branch backward,
/// and all targets must stay inside the stream. Checks nested functions too.
fn assert_branches_valid(chunk: &Chunk) {
  for instr in chunk.instructions() {
    let instr = instr.unwrap();
    match instr.operand {
      Decoded::Forward(_) => {
        let target = instr.target().unwrap();
        assert!(target > instr.offset, "forward branch points backward");
        assert!(target <= chunk.code.len(), "branch target out of bounds");
      }
      Decoded::Backward(_) => {
        let target = instr.target().unwrap();
        assert!(target < instr.offset, "backward branch points forward");
      }
      _ => {}
    }
  }
  for literal in &chunk.literals {
    if let Literal::Function(inner) = literal {
      assert_branches_valid(inner);
    }
  }
}

#[test]
fn var_statement() {
  assert_eq!(
    compile("var x = 1;").op_list(),
    vec!["push_number 1", "assign_ident 'x'"]
  );

  // no initializer: the pending push is cancelled
  assert_eq!(compile("var x;").op_list(), Vec::<String>::new());

  assert_eq!(
    compile("var x = 1, y, z = x;").op_list(),
    vec![
      "push_number 1",
      "assign_ident 'x'",
      "push_ident 'x'",
      "assign_ident 'z'",
    ]
  );
}

#[test]
fn if_else() {
  assert_eq!(
    fnames("if (a) b(); else c();"),
    vec![
      "push_ident",
      "branch_if_false_forward",
      "push_ident",
      "call",
      "jump_forward",
      "push_ident",
      "call",
    ]
  );

  // the false branch lands after the jump over the else body
  let chunk = function_chunk("if (a) b(); else c();");
  let instrs: Vec<_> = chunk.instructions().map(|i| i.unwrap()).collect();
  assert_eq!(instrs[1].target(), Some(instrs[5].offset));
  assert_eq!(instrs[4].target(), Some(instrs[7].offset));
  assert_branches_valid(&chunk);
}

#[test]
fn if_cascade_collapses_on_one_terminator() {
  assert_eq!(
    fnames("if (a) if (b) c();"),
    vec![
      "push_ident",
      "branch_if_false_forward",
      "push_ident",
      "branch_if_false_forward",
      "push_ident",
      "call",
    ]
  );
}

#[test]
fn while_loop() {
  assert_eq!(
    fops("while (i < n) i++;"),
    vec![
      "jump_forward +6",
      "push_ident 'i'",
      "post_incr",
      "push_ident 'i'",
      "push_ident 'n'",
      "less",
      "branch_if_true_backward -8",
    ]
  );
}

#[test]
fn while_condition_folding() {
  // literal true folds into an unconditional backward jump
  assert_eq!(
    fnames("while (true) f();"),
    vec!["jump_forward", "push_ident", "call", "jump_backward"]
  );

  // a trailing `!` fuses into the branch
  assert_eq!(
    fnames("while (!done) f();"),
    vec![
      "jump_forward",
      "push_ident",
      "call",
      "push_ident",
      "branch_if_false_backward",
    ]
  );
}

#[test]
fn do_while_loop() {
  assert_eq!(
    fnames("do f(); while (a);"),
    vec!["push_ident", "call", "push_ident", "branch_if_true_backward"]
  );

  // `do ... while (false)` emits no branch at all
  assert_eq!(fnames("do f(); while (false);"), vec!["push_ident", "call"]);

  // `do ... while (true)` is an unconditional loop
  assert_eq!(
    fnames("do f(); while (true);"),
    vec!["push_ident", "call", "jump_backward"]
  );
}

#[test]
fn for_loop() {
  assert_eq!(
    fnames("for (i = 0; i < n; i++) f();"),
    vec![
      // init
      "push_number",
      "assign_ident",
      "jump_forward",
      // body
      "push_ident",
      "call",
      // update
      "push_ident",
      "post_incr",
      // condition
      "push_ident",
      "push_ident",
      "less",
      "branch_if_true_backward",
    ]
  );

  // for (;;) is a bare backward jump
  assert_eq!(
    fnames("for (;;) f();"),
    vec!["jump_forward", "push_ident", "call", "jump_backward"]
  );
}

#[test]
fn for_in_loop() {
  assert_eq!(
    fops("for (k in o) f(k);"),
    vec![
      "push_ident 'o'",
      "for_in_create_context +17",
      "for_in_get_next",
      "assign_ident 'k'",
      "push_ident 'f'",
      "push_ident 'k'",
      "call 1",
      "branch_if_for_in_has_next -10",
      "context_end",
    ]
  );
}

#[test]
fn for_in_lvalue_rewrites() {
  assert_eq!(
    fnames("for (x in e) ;"),
    vec![
      "push_ident",
      "for_in_create_context",
      "for_in_get_next",
      "assign_ident",
      "branch_if_for_in_has_next",
      "context_end",
    ]
  );

  assert_eq!(
    fnames("for (o.p in e) ;"),
    vec![
      "push_ident",
      "for_in_create_context",
      "push_ident",
      "push_literal",
      "for_in_get_next",
      "assign",
      "branch_if_for_in_has_next",
      "context_end",
    ]
  );

  assert_eq!(
    fnames("for (o['p'] in e) ;"),
    vec![
      "push_ident",
      "for_in_create_context",
      "push_ident",
      "for_in_get_next",
      "assign_prop_string",
      "branch_if_for_in_has_next",
      "context_end",
    ]
  );

  // not an assignable target: deferred to a runtime error
  assert_eq!(
    fnames("for (123 in e) ;"),
    vec![
      "push_ident",
      "for_in_create_context",
      "push_number",
      "push_undefined_base",
      "for_in_get_next",
      "assign",
      "branch_if_for_in_has_next",
      "context_end",
    ]
  );
}

#[test]
fn for_in_var_initializer_is_skipped() {
  // the initializer compiles but is jumped over
  assert_eq!(
    fnames("for (var x = f() in e) ;"),
    vec![
      "push_ident",
      "for_in_create_context",
      "jump_forward",
      "push_ident",
      "call",
      "for_in_get_next",
      "assign_ident",
      "branch_if_for_in_has_next",
      "context_end",
    ]
  );
}

#[test]
fn with_statement() {
  assert_eq!(
    fnames("with (o) { f(); }"),
    vec![
      "push_ident",
      "with_create_context",
      "push_ident",
      "call",
      "context_end",
    ]
  );

  assert_eq!(compile_err(r#""use strict"; with (o) {}"#), ErrorKind::WithNotAllowed);
}

#[test]
fn try_catch() {
  assert_eq!(
    fops("try { a(); } catch (e) { b(); }"),
    vec![
      "try_create_context +8",
      "push_ident 'a'",
      "call 0",
      "catch +10",
      "assign_ident 'e'",
      "push_ident 'b'",
      "call 0",
      "context_end",
    ]
  );
}

#[test]
fn try_finally_shapes() {
  assert_eq!(
    fnames("try { a(); } finally { b(); }"),
    vec![
      "try_create_context",
      "push_ident",
      "call",
      "finally",
      "push_ident",
      "call",
      "context_end",
    ]
  );

  assert_eq!(
    fnames("try { a(); } catch (e) { b(); } finally { c(); }"),
    vec![
      "try_create_context",
      "push_ident",
      "call",
      "catch",
      "assign_ident",
      "push_ident",
      "call",
      "finally",
      "push_ident",
      "call",
      "context_end",
    ]
  );

  assert_eq!(compile_err("try { a(); } x();"), ErrorKind::CatchFinallyExpected);
}

#[test]
fn switch_shapes() {
  // an empty switch only drops the discriminant
  assert_eq!(compile("switch (e) {}").op_list(), vec!["push_ident 'e'", "pop"]);

  let names = fnames(indoc! {"
    switch (e) {
      case a: f();
      case b: g();
      default: h();
      case c: i();
    }
  "});
  assert_eq!(
    &names[..9],
    &[
      "push_ident", // e
      "push_ident", // a
      "branch_if_strict_equal",
      "push_ident", // b
      "branch_if_strict_equal",
      "push_ident", // c, the last case does not duplicate the value
      "strict_equal",
      "branch_if_true_forward",
      "jump_forward", // to default
    ]
  );
  assert_eq!(
    names.iter().filter(|n| **n == "branch_if_strict_equal").count(),
    2
  );

  assert_eq!(
    compile_err("switch (e) { default: ; default: ; }"),
    ErrorKind::MultipleDefaultsNotAllowed
  );
  assert_eq!(compile_err("switch (e) { f(); }"), ErrorKind::InvalidSwitch);
  assert_eq!(compile_err("case 1: ;"), ErrorKind::CaseNotInSwitch);
  assert_eq!(compile_err("default: ;"), ErrorKind::DefaultNotInSwitch);
}

#[test]
fn switch_fallthrough_targets() {
  let chunk = function_chunk("switch (e) { case a: f(); case b: g(); }");
  assert_branches_valid(&chunk);

  // both case comparisons land inside the body, in source order
  let instrs: Vec<_> = chunk.instructions().map(|i| i.unwrap()).collect();
  let case_a = instrs[2].target().unwrap();
  let case_b = instrs[5].target().unwrap();
  assert!(case_a < case_b);
}

#[test]
fn break_and_continue() {
  assert_eq!(
    fnames("while (a) { if (x) break; f(); }"),
    vec![
      "jump_forward",
      "push_ident",
      "branch_if_false_forward",
      "jump_forward", // break
      "push_ident",
      "call",
      "push_ident",
      "branch_if_true_backward",
    ]
  );

  let chunk = function_chunk("while (a) { continue; }");
  let instrs: Vec<_> = chunk.instructions().map(|i| i.unwrap()).collect();
  // the continue targets the condition, which the loop-entry jump also targets
  assert_eq!(instrs[1].target(), instrs[0].target());

  assert_eq!(compile_err("break;"), ErrorKind::InvalidBreak);
  assert_eq!(compile_err("continue;"), ErrorKind::InvalidContinue);
  assert_eq!(compile_err("switch (e) { case 1: continue; }"), ErrorKind::InvalidContinue);
}

#[test]
fn labels() {
  // scenario: the labeled break is patched at label end
  let chunk = function_chunk("L: for (;;) { if (x) break L; }");
  assert_eq!(
    names_of(&chunk),
    vec![
      "jump_forward",
      "push_ident",
      "branch_if_false_forward",
      "jump_forward", // break L, no context to exit
      "jump_backward",
      "return_with_undefined",
    ]
  );
  let instrs: Vec<_> = chunk.instructions().map(|i| i.unwrap()).collect();
  // the break lands after the loop's backward jump
  assert_eq!(instrs[3].target(), Some(instrs[5].offset));

  assert_eq!(
    compile_err("L: while (a) { L: f(); }"),
    ErrorKind::DuplicatedLabel
  );
  assert_eq!(
    compile_err("while (a) { break L; }"),
    ErrorKind::InvalidBreakLabel
  );
  // continue requires the label to wrap a loop directly
  assert_eq!(
    compile_err("L: { continue L; }"),
    ErrorKind::InvalidContinueLabel
  );
  assert_eq!(fnames("L: while (a) { continue L; }").len(), 4);
}

#[test]
fn context_crossing_jumps() {
  // break out of a with-context uses the exit form
  assert!(fnames("while (a) { with (o) { break; } }")
    .contains(&"jump_forward_exit_context"));

  // break out of a try-context
  assert!(fnames("while (a) { try { break; } catch (e) {} }")
    .contains(&"jump_forward_exit_context"));

  // break out of a for-in exits its own iteration context
  assert!(fnames("for (k in o) { break; }").contains(&"jump_forward_exit_context"));

  // continue to the loop's own for-in context stays inside
  let names = fnames("for (k in o) { continue; }");
  assert!(names.contains(&"jump_forward"));
  assert!(!names.contains(&"jump_forward_exit_context"));

  // a labeled continue crossing a for-in must exit it
  assert!(
    fnames("L: while (a) { for (k in o) { continue L; } }")
      .contains(&"jump_forward_exit_context")
  );

  // plain break with nothing to cross uses the plain jump
  let names = fnames("while (a) { break; }");
  assert!(names.contains(&"jump_forward"));
  assert!(!names.contains(&"jump_forward_exit_context"));
}

#[test]
fn asi() {
  let inside = |src: &str| function_chunk(src).code;

  // return\nx parses as `return; x;`
  assert_eq!(inside("return\nx"), inside("return; x;"));

  // x\n++y parses as `x; ++y;`
  assert_eq!(compile("x\n++y").code, compile("x; ++y;").code);

  // x++\ny parses as `x++; y;`
  assert_eq!(compile("x++\ny").code, compile("x++; y;").code);

  // a missing terminator without a newline is an error
  assert_eq!(compile_err("var x = 1 var y = 2"), ErrorKind::SemicolonExpected);
}

#[test]
fn asi_return_forms() {
  assert_eq!(fnames("return"), vec!["return_with_undefined"]);
  assert_eq!(fnames("return x;"), vec!["push_ident", "return"]);
  assert_eq!(fnames("return\nx"), vec!["return_with_undefined", "push_ident", "pop"]);
}

#[test]
fn no_asi_for_throw() {
  assert_eq!(compile_err("throw\nx;"), ErrorKind::ExpressionExpected);
  assert_eq!(fnames("throw x;"), vec!["push_ident", "throw"]);
}

#[test]
fn regex_vs_division() {
  assert_eq!(
    compile("a = /re/;").op_list(),
    vec!["push_regexp /re/", "assign_ident_block 'a'"]
  );

  assert_eq!(
    fnames("x = a / b / c;"),
    vec![
      "push_ident",
      "push_ident",
      "div",
      "push_ident",
      "div",
      "assign_ident",
    ]
  );
}

#[test]
fn strict_mode_detection() {
  assert!(compile(r#""use strict";"#).strict);
  assert!(compile("'use strict';").strict);

  // an escaped form does not enable strict mode
  assert!(!compile(r#""use\u0020strict";"#).strict);

  // only the directive prologue counts
  assert!(!compile(r#"foo(); "use strict";"#).strict);

  // strictness is per function and inherited
  let chunk = compile(r#"function f() { "use strict"; }"#);
  assert!(!chunk.strict);
  assert!(function_chunk(r#""use strict"; var x;"#).strict);
}

#[test]
fn strict_mode_restrictions() {
  assert_eq!(
    compile_err(r#""use strict"; var let;"#),
    ErrorKind::StrictIdentNotAllowed
  );
  assert_eq!(
    compile_err(r#"function f(eval) { "use strict"; }"#),
    ErrorKind::NonStrictArgDefinition
  );
  // without the directive both are fine
  compile("var let;");
  compile("function f(eval) {}");
}

#[test]
fn directive_prologue_restart() {
  // a string literal followed by an operator is an expression statement
  assert_eq!(compile(r#""abc" + d;"#).code, compile(r#"("abc") + d;"#).code);
  assert!(!compile(r#""abc" + d; "use strict";"#).strict);

  // a plain directive emits nothing
  assert_eq!(compile(r#""not strict";"#).op_list(), Vec::<String>::new());
}

#[test]
fn expression_statements() {
  // at the top level the completion value is tracked
  assert_eq!(
    compile("1 + 2;").op_list(),
    vec!["push_number 1", "push_number 2", "add", "pop_block"]
  );
  assert_eq!(compile("f();").op_list(), vec!["push_ident 'f'", "call_block 0"]);

  // inside a function the value is dropped
  assert_eq!(fops("f();"), vec!["push_ident 'f'", "call 0"]);
  assert_eq!(fops("x;"), vec!["push_ident 'x'", "pop"]);
}

#[test]
fn assignments() {
  assert_eq!(
    fops("x += 1;"),
    vec!["push_ident 'x'", "push_number 1", "add", "assign_ident 'x'"]
  );

  assert_eq!(
    fnames("o.p = v;"),
    vec!["push_ident", "push_literal", "push_ident", "assign"]
  );

  assert_eq!(
    fnames("o.p += v;"),
    vec![
      "push_ident",
      "push_literal",
      "dup2",
      "prop_get",
      "push_ident",
      "add",
      "assign",
    ]
  );

  assert_eq!(
    fnames("o['p'] += v;"),
    vec![
      "push_ident",
      "dup",
      "prop_string_get",
      "push_ident",
      "add",
      "assign_prop_string",
    ]
  );

  assert_eq!(
    fnames("o[k] = v;"),
    vec!["push_ident", "push_ident", "push_ident", "assign"]
  );

  // nested assignments keep the inner value
  assert_eq!(
    fnames("x = y = 1;"),
    vec!["push_number", "assign_ident_push_result", "assign_ident"]
  );

  assert_eq!(compile_err("1 = 2;"), ErrorKind::InvalidExpression);
}

#[test]
fn calls_and_members() {
  assert_eq!(
    fops("f(a, b);"),
    vec!["push_ident 'f'", "push_ident 'a'", "push_ident 'b'", "call 2"]
  );

  assert_eq!(
    fnames("o.m(1);"),
    vec![
      "push_ident",
      "push_literal",
      "prop_get",
      "push_number",
      "call",
    ]
  );

  assert_eq!(
    fnames("x = new C(a);"),
    vec!["push_ident", "push_ident", "new", "assign_ident"]
  );
}

#[test]
fn logical_operators_short_circuit() {
  assert_eq!(
    fnames("x = a && b;"),
    vec![
      "push_ident", // a
      "dup",
      "branch_if_false_forward",
      "pop",
      "push_ident", // b
      "assign_ident",
    ]
  );

  assert_eq!(
    fnames("x = a || b;"),
    vec![
      "push_ident",
      "dup",
      "branch_if_true_forward",
      "pop",
      "push_ident",
      "assign_ident",
    ]
  );
}

#[test]
fn conditional_expression() {
  assert_eq!(
    fnames("x = a ? b : c;"),
    vec![
      "push_ident",
      "branch_if_false_forward",
      "push_ident",
      "jump_forward",
      "push_ident",
      "assign_ident",
    ]
  );
}

#[test]
fn array_and_object_literals() {
  assert_eq!(
    fnames("x = [1, , 2];"),
    vec![
      "create_array",
      "push_number",
      "array_push",
      "push_undefined",
      "array_push",
      "push_number",
      "array_push",
      "assign_ident",
    ]
  );

  assert_eq!(
    fnames("x = {a: 1, 'b c': 2};"),
    vec![
      "create_object",
      "push_number",
      "set_property",
      "push_number",
      "set_property",
      "assign_ident",
    ]
  );

  assert_eq!(
    fnames("x = {get p() { return 1; }};"),
    vec!["create_object", "push_literal", "set_getter", "assign_ident"]
  );
}

#[test]
fn functions() {
  let chunk = compile("function add(a, b) { return a + b; }");
  assert_eq!(chunk.op_list(), vec!["push_literal <function add>", "assign_ident 'add'"]);

  let Some(Literal::Function(inner)) = chunk
    .literals
    .iter()
    .find(|l| matches!(l, Literal::Function(_)))
  else {
    panic!("no function literal");
  };
  let expected: Vec<Box<str>> = vec!["a".into(), "b".into()];
  assert_eq!(inner.params, expected);
  assert_eq!(
    names_of(inner),
    vec![
      "push_ident",
      "push_ident",
      "add",
      "return",
      "return_with_undefined",
    ]
  );

  assert_eq!(compile_err("return;"), ErrorKind::InvalidReturn);
  assert_eq!(compile_err("function () {}"), ErrorKind::IdentifierExpected);
}

#[test]
fn function_expressions() {
  assert_eq!(
    fnames("x = function (a) { return a; };"),
    vec!["push_literal", "assign_ident"]
  );
  assert_eq!(fnames("(function () {})();"), vec!["push_literal", "call"]);
}

#[test]
fn nested_blocks_and_errors() {
  compile("{ { { f(); } } }");
  assert_eq!(compile_err("}"), ErrorKind::InvalidRightSquare);
  assert_eq!(compile_err("if (a) }"), ErrorKind::StatementExpected);
  assert_eq!(compile_err("do f();"), ErrorKind::WhileExpected);
  assert_eq!(compile_err("function f() { g();"), ErrorKind::StatementExpected);
  assert_eq!(compile_err("if a) f();"), ErrorKind::LeftParenExpected);
}

#[test]
fn debugger_statement() {
  assert_eq!(fnames("debugger;"), vec!["debugger"]);
}

#[test]
fn balance() {
  // deeply mixed control flow parses with every branch resolved and the
  // context counter back at zero (checked by debug assertions in `parse`)
  let chunk = compile(indoc! {r#"
    function outer(a) {
      L: for (var k in a) {
        try {
          with (a) {
            while (k < 10) {
              if (k) continue L;
              do { k++; } while (false);
              break L;
            }
          }
        } catch (e) {
          switch (e) {
            case 1: break;
            default: return;
          }
        }
      }
    }
    outer({});
  "#});
  assert_branches_valid(&chunk);
}
