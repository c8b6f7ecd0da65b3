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

//! Lowering's own error taxonomy. Each variant doubles as the
//! typed payload behind the [`Diagnostic`] the collect/lower passes push —
//! lowering never stops at the first one, so these are collected, not
//! thrown, except where noted on [`crate::lower::lower_library`].

use octofhir_cql_diagnostics::{Diagnostic, DiagnosticCode};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ElmError {
    #[error("unresolved reference: {name}")]
    UnresolvedReference { name: String },
    #[error("unresolved include: {name} version {version:?}")]
    UnresolvedInclude { name: String, version: Option<String> },
    #[error("cyclic include: {0:?}")]
    CyclicInclude(Vec<String>),
    #[error("cyclic definition: {0:?}")]
    CyclicDefinition(Vec<String>),
    #[error("duplicate definition: {name}")]
    DuplicateDefinition { name: String },
    #[error("ambiguous overload for {op}: candidates {candidates:?}")]
    AmbiguousOverload { op: String, candidates: Vec<String> },
    #[error("context mismatch in {definition}: required {required}, actual {actual}")]
    ContextMismatch { definition: String, required: String, actual: String },
    #[error("type mismatch in {op}: expected {expected}, found {actual}")]
    TypeMismatch { op: String, expected: String, actual: String },
}

impl ElmError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::UnresolvedReference { .. } => DiagnosticCode::UnresolvedReference,
            Self::UnresolvedInclude { .. } => DiagnosticCode::UnresolvedInclude,
            Self::CyclicInclude(_) => DiagnosticCode::CyclicInclude,
            Self::CyclicDefinition(_) => DiagnosticCode::CyclicDefinition,
            Self::DuplicateDefinition { .. } => DiagnosticCode::DuplicateDefinition,
            Self::AmbiguousOverload { .. } => DiagnosticCode::AmbiguousOverload,
            Self::ContextMismatch { .. } => DiagnosticCode::ContextMismatch,
            Self::TypeMismatch { .. } => DiagnosticCode::TypeMismatch,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let code = self.code();
        Diagnostic::error(code, self.to_string())
    }
}

pub type ElmResult<T> = Result<T, ElmError>;
