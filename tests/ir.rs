#[macro_use]
extern crate indoc;

use ssadce::ir::prelude::*;

/// Create a `func @test` function with `num_args` arguments, populated by a
/// callback operating on its single entry block.
fn within_func(num_args: usize, f: impl FnOnce(&mut UnitBuilder, Block)) -> UnitData {
    let mut func = UnitData::new(UnitName::global("test"), Signature::with_args(num_args));
    let mut builder = UnitBuilder::new(&mut func);
    let bb = builder.named_block("entry");
    builder.append_to(bb);
    f(&mut builder, bb);
    func
}

#[test]
fn names_and_temporaries() {
    let func = within_func(1, |builder, _| {
        let a = builder.input_arg(0);
        builder.set_name(a, "a".to_owned());
        let x = builder.ins().name("x").add(a, a);
        let x1 = builder.ins().name("x").mul(x, x);
        let t = builder.ins().neg(x1);
        builder.ins().ret_value(t);
    });
    func.verify();
    assert_eq!(
        func.to_string(),
        indoc! {"
            func @test (%a) {
            %entry:
                %x = add %a, %a
                %x.1 = mul %x, %x
                %0 = neg %x.1
                ret %0
            }"}
    );
}

#[test]
fn call_interns_externals() {
    let func = within_func(0, |builder, _| {
        let ext = builder.add_extern(UnitName::global("foo"));
        let same = builder.add_extern(UnitName::global("foo"));
        assert_eq!(ext, same);
        let one = builder.ins().name("one").const_int(1);
        let r = builder.ins().name("called").call(ext, vec![one, one]);
        builder.ins().ret_value(r);
    });
    func.verify();
    assert_eq!(func.dfg().ext_units().count(), 1);
    assert_eq!(
        func.to_string(),
        indoc! {"
            func @test () {
            %entry:
                %one = const 1
                %called = call @foo (%one, %one)
                ret %called
            }"}
    );
}

#[test]
fn removal_rewrites_uses_to_undef() {
    let func = within_func(0, |builder, bb| {
        let c = builder.ins().const_int(1);
        let n = builder.ins().neg(c);
        builder.ins().ret_value(n);
        let def = builder.dfg().value_inst(c);
        let removed = builder.remove_insts_where(bb, |inst| inst == def);
        assert_eq!(removed, vec![def]);
        let undef = builder.dfg().get_undef().unwrap();
        assert_eq!(builder.uses(undef).len(), 1);
    });
    func.verify();
    assert_eq!(
        func.to_string(),
        indoc! {"
            func @test () {
            %entry:
                %0 = neg undef
                ret %0
            }"}
    );
}

#[test]
fn insertion_positions() {
    let func = within_func(0, |builder, bb| {
        let a = builder.ins().name("a").const_int(1);
        let ret = builder.ins().ret_value(a);
        builder.insert_before(ret);
        let b = builder.ins().name("b").const_int(2);
        builder.prepend_to(bb);
        builder.ins().name("z").const_int(0);
        let b_inst = builder.dfg().value_inst(b);
        builder.insert_after(b_inst);
        builder.ins().name("c").add(a, b);
    });
    func.verify();
    assert_eq!(
        func.to_string(),
        indoc! {"
            func @test () {
            %entry:
                %z = const 0
                %a = const 1
                %b = const 2
                %c = add %a, %b
                ret %a
            }"}
    );
}

#[test]
fn replace_use_moves_uses() {
    within_func(0, |builder, _| {
        let a = builder.ins().const_int(1);
        let b = builder.ins().const_int(2);
        let s = builder.ins().add(a, a);
        builder.ins().ret_value(s);
        assert_eq!(builder.replace_use(a, b), 2);
        assert!(!builder.has_uses(a));
        assert_eq!(builder.uses(b).len(), 2);
        assert_eq!(builder.dfg().users(b).count(), 1);
    });
}

#[test]
fn remove_block_drops_instructions() {
    let mut func = UnitData::new(UnitName::global("test"), Signature::new());
    let mut builder = UnitBuilder::new(&mut func);
    let entry = builder.named_block("entry");
    let other = builder.named_block("other");
    builder.append_to(other);
    let v = builder.ins().const_int(5);
    builder.ins().ret_value(v);
    builder.append_to(entry);
    builder.ins().ret();
    builder.remove_block(other);
    assert_eq!(builder.func_layout().num_blocks(), 1);
    assert!(!builder.dfg().contains_value(v));
    func.verify();
}

#[test]
fn conditional_branch() {
    let mut func = UnitData::new(UnitName::global("test"), Signature::with_args(1));
    let mut builder = UnitBuilder::new(&mut func);
    let entry = builder.named_block("entry");
    let yes = builder.named_block("yes");
    let no = builder.named_block("no");
    let c = builder.input_arg(0);
    builder.set_name(c, "c".to_owned());
    builder.append_to(entry);
    builder.ins().br_cond(c, yes, no);
    builder.append_to(yes);
    builder.ins().ret_value(c);
    builder.append_to(no);
    builder.ins().ret();
    func.verify();
    assert_eq!(func.name().as_str(), "test");
    assert_eq!(
        func.to_string(),
        indoc! {"
            func @test (%c) {
            %entry:
                br %c, %yes, %no
            %yes:
                ret %c
            %no:
                ret
            }"}
    );
}
