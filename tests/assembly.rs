#[macro_use]
extern crate indoc;

use ssadce::assembly::{parse_module, parse_unit};

fn roundtrip(input: &str) {
    let module = parse_module(input).unwrap();
    module.verify();
    assert_eq!(module.to_string(), input);
}

#[test]
fn empty_module() {
    assert_eq!(parse_module("").unwrap().num_units(), 0);
}

#[test]
fn all_instructions() {
    roundtrip(indoc! {"
        func @ops (%a, %b) {
        %entry:
            %0 = const 42
            %1 = const -3
            %2 = alias %a
            %3 = not %2
            %4 = neg %3
            %5 = add %0, %a
            %6 = sub %5, %b
            %7 = mul %6, %1
            %8 = div %7, %0
            %9 = and %8, %4
            %10 = or %9, %9
            %11 = xor %10, undef
            %12 = eq %11, %a
            %13 = neq %12, %b
            %14 = lt %13, %0
            %15 = le %14, %0
            %16 = call @ext (%15, undef)
            ret %16
        }
    "});
}

#[test]
fn control_flow() {
    roundtrip(indoc! {"
        func @name (%a, %b) {
        %entry:
            %0 = const 42
            %1 = add %0, %a
            %2 = call @ext (%1, undef)
            br %1, %yes, %no
        %yes:
            ret %1
        %no:
            br %exit
        %exit:
            ret
        }

        func @other () {
        %entry:
            ret
        }
    "});
}

#[test]
fn forward_references() {
    let input = indoc! {"
        func @f (%c) {
        %entry:
            br %c, %a, %b
        %a:
            ret %x
        %b:
            %x = const 3
            ret %x
        }
    "};
    roundtrip(input);
    let unit = parse_unit(input).unwrap();
    let x = unit
        .all_insts()
        .find_map(|inst| unit.get_inst_result(inst))
        .unwrap();
    assert_eq!(unit.get_name(x), Some("x"));
    assert_eq!(unit.uses(x).len(), 2);
}

#[test]
fn dots_and_underscores_in_names() {
    roundtrip(indoc! {"
        func @foo.bar_1 (%in.0) {
        %entry.1:
            %tmp_0 = neg %in.0
            ret %tmp_0
        }
    "});
}

#[test]
fn undefined_value() {
    let err = parse_module(indoc! {"
        func @f () {
        %entry:
            %0 = add %1, %2
            ret %0
        }
    "})
    .unwrap_err();
    assert_eq!(err, "3:5: use of undefined value %1");
}

#[test]
fn value_defined_twice() {
    let err = parse_module(indoc! {"
        func @f () {
        %entry:
            %0 = const 1
            %0 = const 2
            ret %0
        }
    "})
    .unwrap_err();
    assert_eq!(err, "4:5: value %0 defined multiple times");
}

#[test]
fn argument_defined_twice() {
    let err = parse_module("func @f (%a, %a) {\n%entry:\n    ret\n}\n").unwrap_err();
    assert_eq!(err, "1:1: value %a defined multiple times");
}

#[test]
fn unknown_block() {
    let err = parse_module(indoc! {"
        func @f () {
        %entry:
            br %nowhere
        }
    "})
    .unwrap_err();
    assert_eq!(err, "3:5: unknown block %nowhere");
}

#[test]
fn function_defined_twice() {
    let err = parse_module(indoc! {"
        func @f () {
        %entry:
            ret
        }
        func @f () {
        %entry:
            ret
        }
    "})
    .unwrap_err();
    assert_eq!(err, "5:1: @f defined multiple times");
}

#[test]
fn syntax_error_has_location() {
    let err = parse_module(indoc! {"
        func @f () {
        %entry:
            %0 = frobnicate 1
            ret
        }
    "})
    .unwrap_err();
    assert!(err.contains("3:"), "unexpected error: {}", err);
}

#[test]
fn missing_terminator_is_syntax_error() {
    assert!(parse_module("func @f () {\n%entry:\n    %0 = const 1\n}\n").is_err());
}

#[test]
fn parse_unit_requires_one_function() {
    let err = parse_unit("").unwrap_err();
    assert_eq!(err, "expected one function, found 0");
}
