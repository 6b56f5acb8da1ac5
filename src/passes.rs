//! Tree rewrites run on the compiler's private copy before registry
//! construction.

use tracing::debug;

use crate::ast::{node_type, Literal, Node, NodeId, Tree};
use crate::diagnostic::{Diagnostic, DiagnosticSink, ErrorKind, SourceMap};
use crate::types::Ty;

/// Run every pass in order.
pub fn run(tree: &mut Tree, source_map: &mut SourceMap, sink: &mut DiagnosticSink) {
    lower_externals(tree, source_map, sink);
}

/// Replace `external("name")` and `externalv("name")` calls with
/// `ExternalVariable` nodes of type float and vec3f.
///
/// Returns the number of calls lowered.
pub fn lower_externals(
    tree: &mut Tree,
    source_map: &mut SourceMap,
    sink: &mut DiagnosticSink,
) -> usize {
    let mut calls: Vec<(NodeId, Ty, Option<String>)> = Vec::new();
    tree.visit_node_type::<node_type::FunctionCall>(|id, node| {
        let Node::FunctionCall { name, args } = node else {
            return;
        };
        let ty = match name.as_str() {
            "external" => Ty::FLOAT,
            "externalv" => Ty::VEC3F,
            _ => return,
        };
        let literal = match args.as_slice() {
            [arg] => match tree.get(*arg) {
                Some(Node::Value(Literal::Str(s))) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        };
        calls.push((id, ty, literal));
    });

    let mut lowered = 0;
    for (call, ty, name) in calls {
        let error = |message: String| {
            Diagnostic::error(ErrorKind::Semantic, message, source_map.lookup(tree, call))
        };
        let Some(name) = name else {
            let diag = error("external lookups take one string literal argument".to_string())
                .with_help("write external(\"name\") or externalv(\"name\")".to_string());
            sink.push(diag);
            continue;
        };
        let variable = tree.external(&name, ty);
        match tree.replace(call, variable) {
            Ok(()) => {
                source_map.transfer(call, variable);
                lowered += 1;
            }
            Err(err) => {
                let diag = Diagnostic::error(
                    ErrorKind::Semantic,
                    err.to_string(),
                    source_map.lookup(tree, call),
                );
                sink.push(diag);
            }
        }
    }
    debug!(lowered, "external lookups lowered");
    lowered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn lower(tree: &mut Tree, map: &mut SourceMap) -> (usize, Vec<Diagnostic>) {
        let mut sink = DiagnosticSink::new(None, false);
        let n = lower_externals(tree, map, &mut sink);
        (n, sink.into_diagnostics())
    }

    #[test]
    fn test_external_calls_become_variables() {
        let mut t = Tree::new();
        let name = t.value(Literal::Str("scale".into()));
        let call = t.call("external", vec![name]);
        let decl = t.declare(Ty::FLOAT, "s", Some(call));
        t.append(decl);
        let name = t.value(Literal::Str("offset".into()));
        let call_v = t.call("externalv", vec![name]);
        t.append(call_v);
        let mut map = SourceMap::new(&t).with(call, Span::new(0, 4, 19));

        let (n, diags) = lower(&mut t, &mut map);
        assert_eq!(n, 2);
        assert!(diags.is_empty());
        assert!(t.get(call).is_none());

        let externals: Vec<(String, Ty)> = t
            .collect::<node_type::ExternalVariable>()
            .into_iter()
            .filter_map(|id| match &t[id] {
                Node::ExternalVariable { name, ty } => Some((name.clone(), *ty)),
                _ => None,
            })
            .collect();
        assert_eq!(
            externals,
            vec![
                ("scale".to_string(), Ty::FLOAT),
                ("offset".to_string(), Ty::VEC3F)
            ]
        );
        let lowered = t.collect::<node_type::ExternalVariable>()[0];
        assert_eq!(map.lookup(&t, lowered), Some(Span::new(0, 4, 19)));
    }

    #[test]
    fn test_non_literal_argument_is_rejected() {
        let mut t = Tree::new();
        let x = t.local("x");
        let call = t.call("external", vec![x]);
        t.append(call);
        let mut map = SourceMap::new(&t);

        let (n, diags) = lower(&mut t, &mut map);
        assert_eq!(n, 0);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, ErrorKind::Semantic);
        assert!(t.get(call).is_some());
    }

    #[test]
    fn test_other_calls_are_untouched() {
        let mut t = Tree::new();
        let s = t.value(Literal::Str("x".into()));
        let call = t.call("print", vec![s]);
        t.append(call);
        let mut map = SourceMap::new(&t);
        let (n, diags) = lower(&mut t, &mut map);
        assert_eq!(n, 0);
        assert!(diags.is_empty());
    }
}
