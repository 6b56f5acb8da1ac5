use super::*;
use crate::ast::{BinaryOp, CrementOp, KeywordKind, Literal, LoopKind};
use crate::diagnostic::Severity;
use crate::function::{FunctionEmitter, FunctionGroup, MatchTier, Signature};
use crate::ir::{Inst, Operand};
use crate::registry::TargetKind;
use crate::runtime::Value;

fn generate_with(
    tree: &Tree,
    target: TargetKind,
    custom: &CustomData,
) -> (IrFunction, Registry, Vec<Diagnostic>) {
    generate_using(tree, target, custom, &FunctionRegistry::standard())
}

fn generate_using(
    tree: &Tree,
    target: TargetKind,
    custom: &CustomData,
    functions: &FunctionRegistry,
) -> (IrFunction, Registry, Vec<Diagnostic>) {
    let mut sink = DiagnosticSink::new(None, false);
    let map = SourceMap::new(tree);
    let registry = Registry::build(tree, target, &map, &mut sink);
    let ctx = CodegenContext {
        registry: &registry,
        functions,
        custom_data: custom,
        source_map: &map,
    };
    let func = CodeGenerator::new(tree, ctx, &mut sink).generate();
    (func, registry, sink.into_diagnostics())
}

fn generate(tree: &Tree) -> (IrFunction, Registry, Vec<Diagnostic>) {
    generate_with(tree, TargetKind::Points, &CustomData::new())
}

fn errors(diags: &[Diagnostic]) -> Vec<&Diagnostic> {
    diags.iter().filter(|d| d.is_error()).collect()
}

fn count(body: &[Inst], pred: &dyn Fn(&Inst) -> bool) -> usize {
    body.iter()
        .map(|inst| {
            usize::from(pred(inst))
                + inst
                    .bodies()
                    .into_iter()
                    .map(|b| count(b, pred))
                    .sum::<usize>()
        })
        .sum()
}

#[test]
fn test_attribute_assignment_lowering() {
    let mut t = Tree::new();
    let b = t.attribute_inferred("b");
    let one = t.value(Literal::Int32(1));
    let sum = t.binary(BinaryOp::Add, b, one);
    let a = t.attribute_inferred("a");
    let assign = t.assign(a, sum);
    t.append(assign);

    let (func, registry, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    let slot = |name: &str| registry.get(name).map(|e| e.index).unwrap_or(usize::MAX);
    let expected = format!(
        "fn points(slots: 2, regs: 4)\n  \
         r0: float = read @{}\n  \
         r1: int32 = const 1\n  \
         r2: float = convert r1\n  \
         r3: float = r0 + r2\n  \
         write @{}, r3",
        slot("b"),
        slot("a")
    );
    assert_eq!(func.to_string(), expected);
}

#[test]
fn test_undeclared_local_is_declaration_error() {
    let mut t = Tree::new();
    let x = t.local("x");
    let one = t.value(Literal::Int32(1));
    let assign = t.assign(x, one);
    t.append(assign);

    let (_, _, diags) = generate(&t);
    let errs = errors(&diags);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, ErrorKind::Declaration);
    assert_eq!(errs[0].message, "local 'x' is not declared");
}

#[test]
fn test_break_outside_loop() {
    let mut t = Tree::new();
    let brk = t.keyword(KeywordKind::Break);
    t.append(brk);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::Semantic);
    assert_eq!(diags[0].message, "'break' outside of a loop");
}

#[test]
fn test_shadowing_an_enclosing_local_is_rejected() {
    let mut t = Tree::new();
    let outer = t.declare(Ty::INT32, "x", None);
    t.append(outer);
    let inner = t.declare(Ty::FLOAT, "x", None);
    let block = t.block(vec![inner]);
    t.append(block);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::Declaration);
    assert!(diags[0].help.is_some());
}

#[test]
fn test_sibling_scopes_may_reuse_names() {
    let mut t = Tree::new();
    for _ in 0..2 {
        let decl = t.declare(Ty::INT32, "x", None);
        let block = t.block(vec![decl]);
        t.append(block);
    }
    let (_, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
}

#[test]
fn test_independent_errors_are_all_reported() {
    let mut t = Tree::new();
    let brk = t.keyword(KeywordKind::Continue);
    t.append(brk);
    let y = t.local("y");
    t.append(y);
    let call = t.call("nope", vec![]);
    t.append(call);

    let (_, _, diags) = generate(&t);
    assert_eq!(errors(&diags).len(), 3);
}

#[test]
fn test_unknown_function() {
    let mut t = Tree::new();
    let call = t.call("nope", vec![]);
    t.append(call);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::FunctionResolution(MatchTier::None));
    assert_eq!(diags[0].message, "unknown function 'nope'");
}

#[test]
fn test_size_match_lists_candidates() {
    let mut t = Tree::new();
    let f = t.value(Literal::Float(1.0));
    let s = t.value(Literal::Str("s".into()));
    let call = t.call("dot", vec![f, s]);
    t.append(call);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::FunctionResolution(MatchTier::Size));
    assert_eq!(diags[0].message, "invalid argument types for dot(float, string)");
    assert_eq!(diags[0].notes.len(), 9);
    assert!(diags[0].notes[0].starts_with("candidate: dot("));
    assert_eq!(diags[0].help.as_deref(), Some("dot: Dot product."));
}

fn emits_int(e: &mut FunctionEmitter<'_>, _: &[Operand]) -> Option<Operand> {
    Some(e.int(1))
}

fn emits_nothing(_: &mut FunctionEmitter<'_>, _: &[Operand]) -> Option<Operand> {
    None
}

#[test]
fn test_broken_inline_builtins_fail_generation() {
    let functions = FunctionRegistry::new()
        .with(FunctionGroup::new("bad").emitted(Signature::new(Vec::new(), Ty::FLOAT), emits_int))
        .with(
            FunctionGroup::new("none").emitted(Signature::new(Vec::new(), Ty::FLOAT), emits_nothing),
        );
    // @a = bad(); @b = none();
    let mut t = Tree::new();
    for (attr, name) in [("a", "bad"), ("b", "none")] {
        let call = t.call(name, vec![]);
        let target = t.attribute(attr, Ty::FLOAT);
        let assign = t.assign(target, call);
        t.append(assign);
    }

    let (_, _, diags) =
        generate_using(&t, TargetKind::Points, &CustomData::new(), &functions);
    let failures: Vec<&str> = diags
        .iter()
        .filter(|d| d.kind == ErrorKind::FunctionGeneration)
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(failures.len(), 2, "{:?}", diags);
    assert!(failures[0].ends_with("produced int32, declared float"), "{}", failures[0]);
    assert!(failures[1].ends_with("produced no value"), "{}", failures[1]);
}

#[test]
fn test_native_call_converts_arguments() {
    let mut t = Tree::new();
    let two = t.value(Literal::Int32(2));
    let call = t.call("sqrt", vec![two]);
    let decl = t.declare(Ty::DOUBLE, "r", Some(call));
    t.append(decl);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::Convert { .. })), 1);
    assert_eq!(
        count(&func.body, &|i| matches!(i, Inst::CallNative { name, .. } if name == "sqrt")),
        1
    );
}

#[test]
fn test_volume_only_function_in_point_program() {
    let mut t = Tree::new();
    let call = t.call("getcoordx", vec![]);
    t.append(call);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::Semantic);

    let (func, _, diags) = generate_with(&t, TargetKind::Volumes, &CustomData::new());
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::Intrinsic { .. })), 1);
}

#[test]
fn test_local_component_assignment_inserts_in_place() {
    let mut t = Tree::new();
    let decl = t.declare(Ty::VEC3F, "v", None);
    t.append(decl);
    let v = t.local("v");
    let idx = t.value(Literal::Int32(1));
    let component = t.unpack(v, idx);
    let two = t.value(Literal::Int32(2));
    let assign = t.assign(component, two);
    t.append(assign);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    let inserts: Vec<&Inst> = func
        .body
        .iter()
        .filter(|i| matches!(i, Inst::Insert { .. }))
        .collect();
    assert_eq!(inserts.len(), 1);
    match inserts[0] {
        Inst::Insert { dst, src, .. } => {
            assert_eq!(dst, src);
            assert_eq!(func.reg_ty(*dst), Some(Ty::VEC3F));
        }
        _ => unreachable!(),
    }
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::Copy { .. })), 0);
}

#[test]
fn test_attribute_component_compound_reads_once() {
    let mut t = Tree::new();
    let p = t.attribute("P", Ty::VEC3F);
    let idx = t.value(Literal::Int32(0));
    let component = t.unpack(p, idx);
    let one = t.value(Literal::Float(1.0));
    let assign = t.compound_assign(BinaryOp::Add, component, one);
    t.append(assign);

    let (func, registry, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    assert!(registry.get("P").is_some_and(|e| e.writable));
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::ReadAttr { .. })), 1);
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::Insert { .. })), 1);
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::WriteAttr { .. })), 1);
}

#[test]
fn test_matrix_two_index_access() {
    let mut t = Tree::new();
    let decl = t.declare(Ty::MAT3F, "m", None);
    t.append(decl);
    let m = t.local("m");
    let row = t.value(Literal::Int32(1));
    let col = t.value(Literal::Int32(2));
    let element = t.unpack2(m, row, col);
    let out = t.declare(Ty::FLOAT, "f", Some(element));
    t.append(out);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(
        count(&func.body, &|i| matches!(i, Inst::Binary { op: BinaryOp::Mul, .. })),
        1
    );
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::Extract { .. })), 1);
}

#[test]
fn test_constant_index_out_of_range() {
    let mut t = Tree::new();
    let decl = t.declare(Ty::VEC3F, "v", None);
    t.append(decl);
    let v = t.local("v");
    let idx = t.value(Literal::Int32(3));
    let component = t.unpack(v, idx);
    t.append(component);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "index 3 is out of range 0..3");
}

#[test]
fn test_string_arithmetic_is_rejected() {
    let mut t = Tree::new();
    let s = t.value(Literal::Str("a".into()));
    let one = t.value(Literal::Int32(1));
    let sum = t.binary(BinaryOp::Add, s, one);
    t.append(sum);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].message,
        "operator '+' cannot be applied to string and int32"
    );
}

#[test]
fn test_logical_and_short_circuits() {
    let mut t = Tree::new();
    let x = t.attribute("x", Ty::INT32);
    let y = t.attribute("y", Ty::INT32);
    let both = t.binary(BinaryOp::And, x, y);
    let decl = t.declare(Ty::BOOL, "b", Some(both));
    t.append(decl);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    let branch = func.body.iter().find_map(|i| match i {
        Inst::If {
            then_body,
            else_body,
            ..
        } => Some((then_body, else_body)),
        _ => None,
    });
    let (then_body, else_body) = branch.expect("short-circuit branch");
    assert!(else_body.is_empty());
    assert_eq!(count(then_body, &|i| matches!(i, Inst::ReadAttr { .. })), 1);
    assert_eq!(count(&func.body, &|i| matches!(i, Inst::ReadAttr { .. })), 2);
}

#[test]
fn test_post_increment_yields_previous_value() {
    let mut t = Tree::new();
    let zero = t.value(Literal::Int32(0));
    let decl = t.declare(Ty::INT32, "i", Some(zero));
    t.append(decl);
    let i = t.local("i");
    let post = t.crement(CrementOp::Increment, true, i);
    let j = t.declare(Ty::INT32, "j", Some(post));
    t.append(j);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    // i = 0; old = i; i = i + 1; j = old
    let copies: Vec<(u32, u32)> = func
        .body
        .iter()
        .filter_map(|inst| match inst {
            Inst::Copy { dst, src } => Some((dst.0, src.0)),
            _ => None,
        })
        .collect();
    assert_eq!(copies.len(), 4);
    let (old, _) = copies[1];
    assert_eq!(copies[3].1, old);
}

#[test]
fn test_for_loop_structure() {
    let mut t = Tree::new();
    let zero = t.value(Literal::Int32(0));
    let init = t.declare(Ty::INT32, "i", Some(zero));
    let i = t.local("i");
    let three = t.value(Literal::Int32(3));
    let cond = t.binary(BinaryOp::Lt, i, three);
    let i = t.local("i");
    let step = t.crement(CrementOp::Increment, false, i);
    let a = t.attribute("a", Ty::INT32);
    let one = t.value(Literal::Int32(1));
    let add = t.compound_assign(BinaryOp::Add, a, one);
    let body = t.block(vec![add]);
    let lp = t.loop_(LoopKind::For, Some(init), Some(cond), Some(step), body);
    t.append(lp);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    match func.body.last() {
        Some(Inst::Loop {
            kind,
            cond,
            cond_body,
            body,
            iteration,
        }) => {
            assert_eq!(*kind, LoopKind::For);
            assert!(cond.is_some());
            assert!(!cond_body.is_empty());
            assert_eq!(count(body, &|i| matches!(i, Inst::WriteAttr { .. })), 1);
            assert!(!iteration.is_empty());
        }
        other => panic!("expected a loop, found {:?}", other),
    }
}

#[test]
fn test_loop_local_is_scoped_to_the_loop() {
    let mut t = Tree::new();
    let init = t.declare(Ty::INT32, "i", None);
    let body = t.block(vec![]);
    let lp = t.loop_(LoopKind::For, Some(init), None, None, body);
    t.append(lp);
    let i = t.local("i");
    t.append(i);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::Declaration);
}

#[test]
fn test_pack_requires_a_valid_component_count() {
    let mut t = Tree::new();
    let items: Vec<NodeId> = (0..5).map(|i| t.value(Literal::Int32(i))).collect();
    let pack = t.pack(items);
    t.append(pack);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::Semantic);
}

#[test]
fn test_pack_promotes_components() {
    let mut t = Tree::new();
    let a = t.value(Literal::Int32(1));
    let b = t.value(Literal::Double(2.0));
    let c = t.value(Literal::Float(3.0));
    let pack = t.pack(vec![a, b, c]);
    let decl = t.declare(Ty::VEC3D, "v", Some(pack));
    t.append(decl);

    let (func, _, diags) = generate(&t);
    assert!(diags.is_empty(), "{:?}", diags);
    let packed = func.body.iter().find_map(|i| match i {
        Inst::Pack { dst, .. } => func.reg_ty(*dst),
        _ => None,
    });
    assert_eq!(packed, Some(Ty::VEC3D));
}

#[test]
fn test_invalid_cast() {
    let mut t = Tree::new();
    let decl = t.declare(Ty::VEC3F, "v", None);
    t.append(decl);
    let v = t.local("v");
    let cast = t.cast(Ty::FLOAT, v);
    t.append(cast);

    let (_, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "cannot cast vec3f to float");
}

#[test]
fn test_external_variables_resolve_from_custom_data() {
    let mut t = Tree::new();
    let scale = t.external("scale", Ty::FLOAT);
    let decl = t.declare(Ty::FLOAT, "s", Some(scale));
    t.append(decl);

    let custom = CustomData::new().with("scale", Value::Float(2.5));
    let (func, _, diags) = generate_with(&t, TargetKind::Points, &custom);
    assert!(diags.is_empty(), "{:?}", diags);
    assert!(func.body.iter().any(|i| matches!(
        i,
        Inst::Const { value: Value::Float(v), .. } if *v == 2.5
    )));

    let (_, _, diags) = generate_with(&t, TargetKind::Points, &CustomData::new());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);

    let custom = CustomData::new().with("scale", Value::Int32(2));
    let (_, _, diags) = generate_with(&t, TargetKind::Points, &custom);
    assert_eq!(errors(&diags).len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::TypeConflict);
}

#[test]
fn test_statement_after_return_still_type_checks() {
    let mut t = Tree::new();
    let ret = t.keyword(KeywordKind::Return);
    t.append(ret);
    let x = t.local("missing");
    t.append(x);

    let (func, _, diags) = generate(&t);
    assert_eq!(diags.len(), 1);
    assert!(matches!(func.body.first(), Some(Inst::Return)));
}
