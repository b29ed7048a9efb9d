#[macro_use]
extern crate indoc;

use ssadce::{
    assembly::parse_module,
    ir::prelude::*,
    opt::prelude::*,
    pass::{DeadCodeElim, Propagation},
};

/// Run DCE over every function of `input` and return the resulting assembly,
/// whether anything changed, and the recorded invalidations.
fn run_dce(input: &str, propagation: Propagation) -> (String, bool, Vec<(UnitName, Invalidation)>) {
    let mut module = parse_module(input).unwrap();
    module.verify();
    let ctx = PassContext::new();
    let changed = DeadCodeElim::with_propagation(propagation).run_on_module(&ctx, &mut module);
    module.verify();
    (module.to_string(), changed, ctx.take_invalidations())
}

#[test]
fn unused_users_of_live_values() {
    let input = indoc! {"
        func @f () {
        %entry:
            %0 = const 1
            %1 = const 2
            %2 = add %0, %0
            ret %0
        }
    "};

    let (output, changed, invalidations) = run_dce(input, Propagation::OperandsOnly);
    assert!(changed);
    assert_eq!(
        output,
        indoc! {"
            func @f () {
            %entry:
                %0 = const 1
                ret %0
            }
        "}
    );
    assert_eq!(
        invalidations,
        vec![(UnitName::global("f"), Invalidation::Instructions)]
    );

    // Following user edges keeps `%2` alive, since it consumes `%0`.
    let (output, changed, _) = run_dce(input, Propagation::Bidirectional);
    assert!(changed);
    assert_eq!(
        output,
        indoc! {"
            func @f () {
            %entry:
                %0 = const 1
                %2 = add %0, %0
                ret %0
            }
        "}
    );
}

#[test]
fn reachable_chain_is_kept() {
    let input = indoc! {"
        func @f () {
        %entry:
            %0 = const 5
            %1 = add %0, %0
            ret %1
        }
    "};
    for &propagation in &[Propagation::Bidirectional, Propagation::OperandsOnly] {
        let (output, changed, invalidations) = run_dce(input, propagation);
        assert!(!changed);
        assert_eq!(output, input);
        assert_eq!(invalidations.len(), 1);
    }
}

#[test]
fn disqualified_shapes_are_untouched() {
    let input = indoc! {"
        func @branches (%c) {
        %entry:
            %0 = const 1
            %1 = const 2
            br %c, %yes, %no
        %yes:
            ret %0
        %no:
            ret
        }

        func @loops () {
        %entry:
            %0 = const 1
            br %entry
        }
    "};
    let (output, changed, invalidations) = run_dce(input, Propagation::Bidirectional);
    assert!(!changed);
    assert_eq!(output, input);
    assert!(invalidations.is_empty());
}

#[test]
fn terminator_survives() {
    let (output, changed, _) = run_dce(
        indoc! {"
            func @f (%a) {
            %entry:
                %0 = const 1
                %1 = add %a, %0
                ret
            }
        "},
        Propagation::Bidirectional,
    );
    assert!(changed);
    assert_eq!(
        output,
        indoc! {"
            func @f (%a) {
            %entry:
                ret
            }
        "}
    );
}

#[test]
fn dead_chains_are_removed() {
    let (output, _, _) = run_dce(
        indoc! {"
            func @f (%a, %b) {
            %entry:
                %x = const 2
                %y = neg %x
                %z = mul %y, %y
                %w = sub %z, %x
                %r = add %a, %b
                ret %r
            }
        "},
        Propagation::Bidirectional,
    );
    assert_eq!(
        output,
        indoc! {"
            func @f (%a, %b) {
            %entry:
                %r = add %a, %b
                ret %r
            }
        "}
    );
}

#[test]
fn calls_are_not_roots() {
    let (output, _, _) = run_dce(
        indoc! {"
            func @f (%a) {
            %entry:
                %0 = call @log (%a)
                %1 = call @get ()
                ret %1
            }
        "},
        Propagation::Bidirectional,
    );
    assert_eq!(
        output,
        indoc! {"
            func @f (%a) {
            %entry:
                %1 = call @get ()
                ret %1
            }
        "}
    );
}

#[test]
fn undef_operands_are_accepted() {
    let input = indoc! {"
        func @f () {
        %entry:
            %0 = add undef, undef
            %1 = const 3
            ret %0
        }
    "};
    let (output, _, _) = run_dce(input, Propagation::Bidirectional);
    assert_eq!(
        output,
        indoc! {"
            func @f () {
            %entry:
                %0 = add undef, undef
                ret %0
            }
        "}
    );
}

#[test]
fn second_run_is_noop() {
    let input = indoc! {"
        func @f (%a) {
        %entry:
            %0 = const 1
            %1 = const 2
            %2 = xor %0, %a
            %3 = lt %1, %1
            ret %2
        }
    "};
    let mut module = parse_module(input).unwrap();
    let ctx = PassContext::new();
    let mut dce = DeadCodeElim::new();
    assert!(dce.run_on_module(&ctx, &mut module));
    let once = module.to_string();
    assert!(!dce.run_on_module(&ctx, &mut module));
    assert_eq!(module.to_string(), once);
    assert_eq!(ctx.take_invalidations().len(), 2);
}

#[test]
fn propagation_reaches_fixpoint() {
    let module = parse_module(indoc! {"
        func @f (%a) {
        %entry:
            %0 = const 1
            %1 = add %0, %a
            %2 = mul %1, %1
            %3 = sub %0, %0
            %4 = const 9
            ret %2
        }
    "})
    .unwrap();
    let unit = module.unit_data().next().unwrap();
    let mut dce = DeadCodeElim::new();
    dce.mark_terminator(unit);
    assert_eq!(dce.useful().len(), 1);
    assert_eq!(dce.propagate(unit), 4);
    assert_eq!(dce.propagate(unit), 0);
    assert_eq!(dce.useful().len(), 5);
    let term = unit.func_layout().terminator(unit.func_layout().entry());
    assert_eq!(dce.useful().iter().next(), Some(term));
    dce.reset();
    assert!(dce.useful().is_empty());
    dce.reset();
    assert!(dce.useful().is_empty());
}

#[test]
fn state_does_not_leak_between_functions() {
    let input = indoc! {"
        func @a () {
        %entry:
            %0 = const 1
            %1 = const 2
            %2 = add %0, %1
            ret %2
        }

        func @b () {
        %entry:
            %0 = const 1
            %1 = const 2
            %2 = add %1, %1
            ret %2
        }
    "};
    let mut module = parse_module(input).unwrap();
    let units: Vec<_> = module.units().collect();
    let ctx = PassContext::new();
    let mut dce = DeadCodeElim::new();

    assert!(!dce.run(&ctx, &mut module.unit_mut(units[0])));
    assert!(dce.useful().is_empty());
    assert!(dce.run(&ctx, &mut module.unit_mut(units[1])));
    assert!(dce.useful().is_empty());

    // The first function's instructions must not keep `%0` of the second
    // function alive, even though the keys coincide.
    assert_eq!(
        module.unit_data().nth(1).unwrap().to_string(),
        indoc! {"
            func @b () {
            %entry:
                %1 = const 2
                %2 = add %1, %1
                ret %2
            }"}
    );
}

#[test]
fn parallel_matches_sequential() {
    let input = indoc! {"
        func @a (%x) {
        %entry:
            %0 = const 1
            %1 = add %x, %x
            ret %1
        }

        func @b () {
        %entry:
            %0 = const 1
            %1 = neg %0
            ret %0
        }

        func @c () {
        %entry:
            %0 = const 7
            ret
        }
    "};

    let mut sequential = parse_module(input).unwrap();
    let ctx = PassContext::new();
    DeadCodeElim::new().run_on_module(&ctx, &mut sequential);

    let mut parallel = parse_module(input).unwrap();
    let pctx = PassContext::new();
    assert!(run_parallel(&DeadCodeElim::new(), &pctx, &mut parallel));
    parallel.verify();

    assert_eq!(parallel.to_string(), sequential.to_string());
    let mut invalidated: Vec<_> = pctx
        .take_invalidations()
        .into_iter()
        .map(|(unit, _)| unit.to_string())
        .collect();
    invalidated.sort();
    assert_eq!(invalidated, vec!["@a", "@b", "@c"]);
}

#[test]
fn feature_gate_disables_pass() {
    let input = indoc! {"
        func @f () {
        %entry:
            %0 = const 1
            ret
        }
    "};
    let mut module = parse_module(input).unwrap();
    let mut ctx = PassContext::new();
    ctx.disable(DeadCodeElim::NAME);
    assert!(!DeadCodeElim::new().run_on_module(&ctx, &mut module));
    assert!(!run_parallel(&DeadCodeElim::new(), &ctx, &mut module));
    assert_eq!(module.to_string(), input);
    assert!(ctx.invalidations().is_empty());

    ctx.enable(DeadCodeElim::NAME);
    assert!(DeadCodeElim::new().run_on_module(&ctx, &mut module));
    assert_eq!(ctx.invalidations().len(), 1);
}
