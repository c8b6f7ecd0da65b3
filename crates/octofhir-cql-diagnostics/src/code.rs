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

//! The diagnostic code taxonomy. One variant per error kind in the error
//! handling design (compile-time diagnostics only; runtime-only kinds like
//! `Overflow`/`DivisionByZero`/`Cancelled` live in `octofhir-cql-core`'s and
//! `octofhir-cql-eval`'s own error enums but are mirrored here so they can
//! be reported through the same `Diagnostic` shape when surfaced to a host).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagnosticCode {
    // Lexing
    LexError,
    UnclosedString,
    InvalidEscape,
    InvalidNumber,
    InvalidDateTime,

    // Parsing
    ParseError,
    UnexpectedToken,
    ExpectedToken,

    // Name resolution / lowering
    UnresolvedReference,
    UnresolvedInclude,
    CyclicInclude,
    CyclicDefinition,
    DuplicateDefinition,
    AmbiguousOverload,
    ContextMismatch,

    // Type system
    TypeMismatch,

    // Units / intervals
    IncompatibleUnits,
    UnknownUnit,
    InvalidInterval,

    // Runtime
    Overflow,
    DivisionByZero,
    TerminologyError,
    DataSourceError,
    Cancelled,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
