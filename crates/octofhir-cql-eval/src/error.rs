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

//! Evaluation's own error taxonomy. Unlike lowering, the tree-walker does
//! stop at the first error within one expression evaluation — there is no
//! partial `Value` to keep accumulating into — but every variant still maps
//! onto a [`DiagnosticCode`] so callers can report it the same way a
//! compile-time diagnostic is reported.

use octofhir_cql_core::Kind;
use octofhir_cql_diagnostics::{Diagnostic, DiagnosticCode};
use octofhir_cql_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    Overload(#[from] RegistryError),

    #[error(transparent)]
    Elm(#[from] octofhir_cql_elm::ElmError),

    #[error("type mismatch in {op}: expected {expected}, found {actual:?}")]
    TypeMismatch { op: String, expected: String, actual: Kind },

    #[error("{name} is not defined")]
    UnresolvedReference { name: String },

    #[error("variable {name} is not bound in this context")]
    VariableNotFound { name: String },

    #[error("index {index} out of bounds for a list of size {size}")]
    IndexOutOfBounds { index: i64, size: usize },

    #[error("arithmetic overflow in {op}")]
    Overflow { op: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("terminology error: {message}")]
    Terminology { message: String },

    #[error("data source error: {message}")]
    DataSource { message: String },

    #[error("recursion depth {limit} exceeded evaluating {definition}")]
    RecursionLimit { definition: String, limit: usize },

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("library {name} version {version:?} is not resolvable")]
    UnresolvedInclude { name: String, version: Option<String> },
}

impl EvalError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Overload(e) => e.code(),
            Self::Elm(e) => e.code(),
            Self::TypeMismatch { .. } => DiagnosticCode::TypeMismatch,
            Self::UnresolvedReference { .. } => DiagnosticCode::UnresolvedReference,
            Self::VariableNotFound { .. } => DiagnosticCode::UnresolvedReference,
            Self::IndexOutOfBounds { .. } => DiagnosticCode::TypeMismatch,
            Self::Overflow { .. } => DiagnosticCode::Overflow,
            Self::DivisionByZero => DiagnosticCode::DivisionByZero,
            Self::Terminology { .. } => DiagnosticCode::TerminologyError,
            Self::DataSource { .. } => DiagnosticCode::DataSourceError,
            Self::RecursionLimit { .. } => DiagnosticCode::Overflow,
            Self::Cancelled => DiagnosticCode::Cancelled,
            Self::UnresolvedInclude { .. } => DiagnosticCode::UnresolvedInclude,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let code = self.code();
        Diagnostic::error(code, self.to_string())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
