
use crate::ast::{BinaryOp, Literal, Tree};
use crate::types::Ty;

/// `@a = @b + 1;` with both attributes untyped (float).
fn add_one_tree() -> Tree {
    let mut t = Tree::new();
    let b = t.attribute_inferred("b");
    let one = t.value(Literal::Int32(1));
    let sum = t.binary(BinaryOp::Add, b, one);
    let a = t.attribute_inferred("a");
    let assign = t.assign(a, sum);
    t.append(assign);
    t
}

/// `<ty>@name = value;`
fn assign_literal(t: &mut Tree, name: &str, ty: Ty, value: Literal) {
    let target = t.attribute(name, ty);
    let value = t.value(value);
    let assign = t.assign(target, value);
    t.append(assign);
}
