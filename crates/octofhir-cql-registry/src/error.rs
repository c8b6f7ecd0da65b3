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

//! Overload resolution errors. These map onto the same
//! [`octofhir_cql_diagnostics::DiagnosticCode`] variants the lowering pass
//! uses for its own `AmbiguousOverload`/`TypeMismatch` diagnostics, since an
//! evaluator-time overload failure and a lowering-time one are the same
//! condition caught at a different stage.

use octofhir_cql_core::Kind;
use octofhir_cql_diagnostics::DiagnosticCode;
use octofhir_cql_elm::ElmOperator;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("no overload of {op:?} accepts argument kinds {actual:?}")]
    NoMatchingOverload { op: ElmOperator, actual: Vec<Kind> },
    #[error("ambiguous overload of {op:?} for argument kinds {actual:?}: {candidates} candidates tie")]
    AmbiguousOverload {
        op: ElmOperator,
        actual: Vec<Kind>,
        candidates: usize,
    },
}

impl RegistryError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::NoMatchingOverload { .. } => DiagnosticCode::TypeMismatch,
            Self::AmbiguousOverload { .. } => DiagnosticCode::AmbiguousOverload,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
