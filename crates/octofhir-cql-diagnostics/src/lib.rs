// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Diagnostic and error reporting types shared by the parser, the CQL→ELM
//! lowering pass, the evaluator, and the measure engine.
//!
//! Compilation never throws on the first error: every pass that can fail
//! partially accumulates [`Diagnostic`]s into a [`Diagnostics`] list and
//! returns the list alongside whatever partial tree it managed to build.

mod code;
mod span;

pub use code::DiagnosticCode;
pub use span::SourceSpan;

use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Subtle suggestion, never blocks compilation or evaluation.
    Hint,
    /// Informational note.
    #[default]
    Info,
    /// Might indicate a problem but does not prevent execution.
    Warning,
    /// Prevents successful compilation or aborts the current evaluation.
    Error,
}

/// A single diagnostic: what went wrong, where, and how bad it is.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(
                f,
                "{:?} [{}] at {}: {}",
                self.severity, self.code, span, self.message
            ),
            None => write!(f, "{:?} [{}]: {}", self.severity, self.code, self.message),
        }
    }
}

/// A collector for diagnostics accumulated during a compiler pass.
///
/// Unlike `Result`, pushing to `Diagnostics` never short-circuits the pass
/// that owns it — callers decide whether `has_errors()` should abort the
/// next pass.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            log::debug!("diagnostic: {diagnostic}");
        }
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_without_short_circuiting() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error(DiagnosticCode::UnresolvedReference, "X"));
        diags.push(Diagnostic::warning(DiagnosticCode::DuplicateDefinition, "Y"));
        assert_eq!(diags.len(), 2);
        assert!(diags.has_errors());
    }

    #[test]
    fn display_includes_span_when_present() {
        let d = Diagnostic::error(DiagnosticCode::ParseError, "unexpected token")
            .with_span(SourceSpan::new(3, 10, 1, 4));
        let text = d.to_string();
        assert!(text.contains("1:4"));
    }
}
