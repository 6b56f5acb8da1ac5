//! Whole-pipeline tests through the public API, with a toy front end for
//! single-line `lhs = term + term ...;` programs.

use voxl::ast::{BinaryOp, Literal, NodeId, Tree};
use voxl::diagnostic::{ErrorKind, SourceMap};
use voxl::error::SyntaxError;
use voxl::runtime::{PointDataset, Value, VolumeDataset};
use voxl::span::Span;
use voxl::types::Ty;
use voxl::{CompileOptions, Compiler, ExecuteOptions, Frontend, OptLevel, ParsedSource, TargetKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Parses `stmt;`* where a statement is `variable = term (+ term)*`, a
/// variable is `@name`, `f@name` or `i@name`, and a term is a variable, a
/// number or a zero-argument call `name()`.
struct LineFrontend;

impl LineFrontend {
    fn term(
        tree: &mut Tree,
        spans: &mut Vec<(NodeId, Span)>,
        text: &str,
        start: u32,
    ) -> Result<NodeId, SyntaxError> {
        let span = Span::new(0, start, start + text.len() as u32);
        let node = if let Some(name) = text.strip_suffix("()") {
            tree.call(name, vec![])
        } else if let Some(name) = text.strip_prefix("i@") {
            tree.attribute(name, Ty::INT32)
        } else if let Some(name) = text.strip_prefix("f@") {
            tree.attribute(name, Ty::FLOAT)
        } else if let Some(name) = text.strip_prefix('@') {
            tree.attribute_inferred(name)
        } else if let Ok(v) = text.parse::<i32>() {
            tree.value(Literal::Int32(v))
        } else if let Ok(v) = text.parse::<f32>() {
            tree.value(Literal::Float(v))
        } else {
            return Err(SyntaxError::new(format!("unexpected '{}'", text), Some(span)));
        };
        spans.push((node, span));
        Ok(node)
    }
}

impl Frontend for LineFrontend {
    fn parse(&self, source: &str) -> Result<ParsedSource, SyntaxError> {
        let mut tree = Tree::new();
        let mut pending = Vec::new();
        let mut offset = 0u32;
        for stmt in source.split_inclusive(';') {
            let Some(body) = stmt.strip_suffix(';') else {
                if stmt.trim().is_empty() {
                    break;
                }
                let end = offset + stmt.len() as u32;
                return Err(SyntaxError::new("expected ';'", Some(Span::new(0, end, end))));
            };
            let mut tokens = Vec::new();
            let mut pos = offset;
            for word in body.split(' ') {
                if !word.is_empty() {
                    tokens.push((word, pos));
                }
                pos += word.len() as u32 + 1;
            }
            pending.push((tokens, offset, offset + stmt.len() as u32));
            offset += stmt.len() as u32;
        }

        let mut spans = Vec::new();
        for (tokens, start, end) in pending {
            let [(lhs, lhs_at), ("=", _), rest @ ..] = tokens.as_slice() else {
                return Err(SyntaxError::new("expected 'lhs = expr'", Some(Span::new(0, start, end))));
            };
            let target = LineFrontend::term(&mut tree, &mut spans, lhs, *lhs_at)?;
            let mut terms = rest.iter().filter(|(t, _)| *t != "+");
            let Some(&(first, at)) = terms.next() else {
                return Err(SyntaxError::new("expected an expression", Some(Span::new(0, start, end))));
            };
            let mut value = LineFrontend::term(&mut tree, &mut spans, first, at)?;
            for &(text, at) in terms {
                let rhs = LineFrontend::term(&mut tree, &mut spans, text, at)?;
                value = tree.binary(BinaryOp::Add, value, rhs);
            }
            let assign = tree.assign(target, value);
            spans.push((assign, Span::new(0, start, end)));
            tree.append(assign);
        }
        let mut map = SourceMap::new(&tree);
        for (node, span) in spans {
            map.insert(node, span);
        }
        Ok(ParsedSource::with_source_map(tree, map))
    }
}

#[test]
fn test_add_one_end_to_end() {
    init_tracing();
    let exe = Compiler::default()
        .compile_source(&LineFrontend, "@a = @b + 1;", TargetKind::Points)
        .ok()
        .and_then(|exe| exe.into_points())
        .expect("program compiles");

    let names: Vec<(&str, Ty, bool)> = exe
        .registry()
        .entries()
        .map(|e| (e.name.as_str(), e.ty, e.writable))
        .collect();
    assert_eq!(names, vec![("a", Ty::FLOAT, true), ("b", Ty::FLOAT, false)]);

    let mut data = PointDataset::new(16).with_uniform("b", Value::Float(2.0));
    let report = exe
        .execute(&mut data, &ExecuteOptions::default().with_parallel(true))
        .expect("execute");
    assert_eq!(report.processed, 16);
    assert!(data
        .values("a")
        .unwrap_or_default()
        .iter()
        .all(|v| *v == Value::Float(3.0)));
}

#[test]
fn test_every_opt_level_computes_the_same_result() {
    let source = "i@x = 2 + 3 + i@y; i@z = i@x + i@x;";
    for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2] {
        let exe = Compiler::new(CompileOptions::default().with_opt_level(level))
            .compile_source(&LineFrontend, source, TargetKind::Points)
            .ok()
            .and_then(|exe| exe.into_points())
            .expect("program compiles");
        let mut data = PointDataset::new(3).with_values(
            "y",
            Ty::INT32,
            vec![Value::Int32(0), Value::Int32(1), Value::Int32(-5)],
        );
        exe.execute(&mut data, &ExecuteOptions::default())
            .expect("execute");
        assert_eq!(
            data.values("z"),
            Some(&[Value::Int32(10), Value::Int32(12), Value::Int32(0)][..]),
            "{:?}",
            level
        );
    }
}

#[test]
fn test_conflicting_attribute_types() {
    let diags = Compiler::default()
        .compile_source(&LineFrontend, "i@a = 2; f@a = 2.5;", TargetKind::Points)
        .err()
        .expect("type conflict");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::TypeConflict);
    assert_eq!(diags[0].span, Some(Span::new(0, 9, 12)));
}

#[test]
fn test_syntax_error_stops_the_pipeline() {
    let diags = Compiler::default()
        .compile_source(&LineFrontend, "@a = @b", TargetKind::Points)
        .err()
        .expect("syntax error");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::Syntax);
}

#[test]
fn test_rendered_diagnostic_points_at_the_call() {
    let source = "@a = nope();";
    let diags = Compiler::default()
        .compile_source(&LineFrontend, source, TargetKind::Points)
        .err()
        .expect("unknown function");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].span, Some(Span::new(0, 5, 11)));
    let rendered = diags[0].render_to_string("program.vx", source);
    assert!(rendered.contains("unknown function 'nope'"), "{}", rendered);
    assert!(rendered.contains("program.vx"), "{}", rendered);
}

#[test]
fn test_volume_coordinates_end_to_end() {
    let exe = Compiler::default()
        .compile_source(&LineFrontend, "i@index = getcoordx() + getcoordy();", TargetKind::Volumes)
        .ok()
        .and_then(|exe| exe.into_volumes())
        .expect("program compiles");
    let mut grids = VolumeDataset::new().with_grid("index", Value::Int32(-1));
    for x in 0..4 {
        grids.set("index", [x, 2, 0], Value::Int32(0));
    }
    let report = exe
        .execute(&mut grids, &ExecuteOptions::default().with_chunk_size(2))
        .expect("execute");
    assert_eq!(report.processed, 4);
    assert_eq!(report.chunks, 2);
    assert_eq!(grids.value("index", [3, 2, 0]), Some(&Value::Int32(5)));
    assert_eq!(grids.value("index", [9, 9, 9]), Some(&Value::Int32(-1)));
}
