//! Compile-time diagnostics: categorised errors and warnings, the capped
//! sink the pipeline records them into, and the node → source span map.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{NodeId, Tree, TreeId};
use crate::function::MatchTier;
use crate::span::Span;

/// A compiler diagnostic (error or warning).
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Pipeline stage category of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Syntax,
    /// A name reused with an incompatible type.
    TypeConflict,
    /// A local redeclared in an open scope, or an unknown local.
    Declaration,
    /// No Explicit or Implicit overload; carries the best tier reached.
    FunctionResolution(MatchTier),
    /// A built-in generator produced an invalid result.
    FunctionGeneration,
    Semantic,
    Backend,
    Binding,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::TypeConflict => "type conflict",
            ErrorKind::Declaration => "declaration error",
            ErrorKind::FunctionResolution(_) => "function resolution error",
            ErrorKind::FunctionGeneration => "function generation error",
            ErrorKind::Semantic => "semantic error",
            ErrorKind::Backend => "backend error",
            ErrorKind::Binding => "binding error",
        }
    }
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, message: String, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(kind: ErrorKind, message: String, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message, span)
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render the report into a string using ariadne, without colors.
    /// Diagnostics without a span are anchored at offset 0.
    pub fn render_to_string(&self, filename: &str, source: &str) -> String {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let range = self.span.map_or(0..0, |s| s.range());

        let mut report = Report::build(kind, filename, range.start)
            .with_config(Config::default().with_color(false))
            .with_message(format!("{}: {}", self.kind.as_str(), self.message));
        if self.span.is_some() {
            report = report.with_label(Label::new((filename, range)).with_message(&self.message));
        }
        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        let mut out = Vec::new();
        match report
            .finish()
            .write((filename, Source::from(source)), &mut out)
        {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };
        let range = self.span.map_or(0..0, |s| s.range());

        let mut report = Report::build(kind, filename, range.start)
            .with_message(format!("{}: {}", self.kind.as_str(), self.message));
        if self.span.is_some() {
            report = report.with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(color),
            );
        }
        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if report
            .finish()
            .eprint((filename, Source::from(source)))
            .is_err()
        {
            eprintln!("{}", self);
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}]: {}", level, self.kind.as_str(), self.message)
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}

/// Append-only diagnostic list with an error cap.
///
/// Errors past `max_errors` are counted but not recorded. With
/// `warnings_as_errors` every warning is recorded as an error.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    max_errors: Option<usize>,
    warnings_as_errors: bool,
    errors: usize,
}

impl DiagnosticSink {
    pub fn new(max_errors: Option<usize>, warnings_as_errors: bool) -> Self {
        Self {
            diagnostics: Vec::new(),
            max_errors,
            warnings_as_errors,
            errors: 0,
        }
    }

    pub fn push(&mut self, mut diag: Diagnostic) {
        if diag.severity == Severity::Warning && self.warnings_as_errors {
            diag.severity = Severity::Error;
            diag.notes.push("warning treated as error".to_string());
        }
        if diag.severity == Severity::Error {
            self.errors += 1;
            if self.max_errors.is_some_and(|max| self.errors > max) {
                return;
            }
        }
        self.diagnostics.push(diag);
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.push(diag);
        }
    }

    /// Whether any error was detected, recorded or not.
    pub fn has_fatal(&self) -> bool {
        self.errors > 0
    }

    /// Errors detected, including those past the cap.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Errors detected but not recorded.
    pub fn suppressed(&self) -> usize {
        self.max_errors
            .map_or(0, |max| self.errors.saturating_sub(max))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Recorded diagnostics; the last recorded error notes how many more
    /// were suppressed.
    pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        let suppressed = self.suppressed();
        if suppressed > 0 {
            if let Some(last) = self.diagnostics.iter_mut().rev().find(|d| d.is_error()) {
                last.notes
                    .push(format!("{} further error(s) not shown", suppressed));
            }
        }
        self.diagnostics
    }
}

/// Source spans of the nodes of one parsed tree.
///
/// Lookups keyed on a node of a different tree (a copy) fall back to the
/// node at the same preorder position in the tree the map was built for.
#[derive(Clone, Debug)]
pub struct SourceMap {
    tree: TreeId,
    order: Vec<NodeId>,
    spans: HashMap<NodeId, Span>,
}

impl SourceMap {
    pub fn new(tree: &Tree) -> Self {
        Self {
            tree: tree.id(),
            order: tree.preorder(),
            spans: HashMap::new(),
        }
    }

    pub fn insert(&mut self, node: NodeId, span: Span) {
        self.spans.insert(node, span);
    }

    pub fn with(mut self, node: NodeId, span: Span) -> Self {
        self.insert(node, span);
        self
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Span of `node`, a node of `tree`.
    pub fn lookup(&self, tree: &Tree, node: NodeId) -> Option<Span> {
        if tree.id() == self.tree {
            return self.spans.get(&node).copied();
        }
        let position = tree.preorder().iter().position(|&n| n == node)?;
        self.spans.get(self.order.get(position)?).copied()
    }

    /// Re-key every span onto `copy`, which must be a structural copy of the
    /// mapped tree.
    pub fn rebase(&self, copy: &Tree) -> SourceMap {
        let order = copy.preorder();
        let spans = order
            .iter()
            .zip(self.order.iter())
            .filter_map(|(&new, old)| self.spans.get(old).map(|s| (new, *s)))
            .collect();
        SourceMap {
            tree: copy.id(),
            order,
            spans,
        }
    }

    /// Give `to` the span of `from`, for rewrites that replace one node with
    /// another.
    pub fn transfer(&mut self, from: NodeId, to: NodeId) {
        if let Some(span) = self.spans.get(&from).copied() {
            self.spans.insert(to, span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal};
    use crate::types::Ty;

    fn error(message: &str) -> Diagnostic {
        Diagnostic::error(ErrorKind::Semantic, message.to_string(), None)
    }

    #[test]
    fn test_error_construction() {
        let d = Diagnostic::error(
            ErrorKind::TypeConflict,
            "type mismatch".to_string(),
            Some(Span::new(0, 10, 15)),
        );
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "type mismatch");
        assert_eq!(d.span.map(|s| s.start), Some(10));
        assert!(d.notes.is_empty());
        assert!(d.help.is_none());
    }

    #[test]
    fn test_chained_builders() {
        let d = Diagnostic::warning(ErrorKind::Semantic, "hint".to_string(), None)
            .with_note("note 1".to_string())
            .with_help("help text".to_string())
            .with_note("note 2".to_string());
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.notes, vec!["note 1", "note 2"]);
        assert_eq!(d.help.as_deref(), Some("help text"));
        assert_eq!(d.to_string(), "warning[semantic error]: hint");
    }

    #[test]
    fn test_render_to_string_includes_message_and_notes() {
        let source = "@a = @b + 1;\n";
        let d = Diagnostic::error(
            ErrorKind::TypeConflict,
            "'a' used as int32 and float".to_string(),
            Some(Span::new(0, 0, 2)),
        )
        .with_note("first use declared int32".to_string());
        let out = d.render_to_string("test.vx", source);
        assert!(out.contains("type conflict: 'a' used as int32 and float"));
        assert!(out.contains("first use declared int32"));
    }

    #[test]
    fn test_render_without_span_does_not_panic() {
        error("no location").render("test.vx", "");
        render_diagnostics(&[error("one"), error("two")], "test.vx", "x\n");
    }

    #[test]
    fn test_sink_caps_recorded_errors_but_counts_all() {
        let mut sink = DiagnosticSink::new(Some(2), false);
        for i in 0..5 {
            sink.push(error(&format!("e{}", i)));
        }
        sink.push(Diagnostic::warning(
            ErrorKind::Semantic,
            "w".to_string(),
            None,
        ));
        assert!(sink.has_fatal());
        assert_eq!(sink.error_count(), 5);
        assert_eq!(sink.suppressed(), 3);
        let diags = sink.into_diagnostics();
        assert_eq!(diags.len(), 3);
        assert_eq!(diags[1].notes, vec!["3 further error(s) not shown"]);
    }

    #[test]
    fn test_sink_promotes_warnings() {
        let mut sink = DiagnosticSink::new(None, true);
        sink.push(Diagnostic::warning(
            ErrorKind::Semantic,
            "w".to_string(),
            None,
        ));
        assert!(sink.has_fatal());
        assert_eq!(sink.diagnostics()[0].severity, Severity::Error);

        let mut lenient = DiagnosticSink::new(None, false);
        lenient.push(Diagnostic::warning(
            ErrorKind::Semantic,
            "w".to_string(),
            None,
        ));
        assert!(!lenient.has_fatal());
    }

    #[test]
    fn test_source_map_falls_back_to_traversal_position() {
        let mut tree = Tree::new();
        let b = tree.attribute("b", Ty::FLOAT);
        let one = tree.value(Literal::Float(1.0));
        let sum = tree.binary(BinaryOp::Add, b, one);
        tree.append(sum);

        let map = SourceMap::new(&tree)
            .with(b, Span::new(0, 0, 2))
            .with(sum, Span::new(0, 0, 6));
        assert_eq!(map.lookup(&tree, b), Some(Span::new(0, 0, 2)));

        let copy = tree.copy();
        let copied_b = copy.preorder()[2];
        assert_eq!(map.lookup(&copy, copied_b), Some(Span::new(0, 0, 2)));

        let rebased = map.rebase(&copy);
        assert_eq!(rebased.len(), 2);
        assert_eq!(rebased.lookup(&copy, copied_b), Some(Span::new(0, 0, 2)));
    }
}
