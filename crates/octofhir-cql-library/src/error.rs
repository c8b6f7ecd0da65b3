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

//! Errors raised while compiling a library or resolving its include graph.
//! Parse/lowering failures keep their diagnostics rather than collapsing to
//! a single message, so a caller can still print every error the source had.

use octofhir_cql_diagnostics::Diagnostics;
use octofhir_cql_elm::ElmError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LibraryError {
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Compile(Diagnostics),
    #[error(transparent)]
    Elm(#[from] ElmError),
}

pub type LibraryResult<T> = Result<T, LibraryError>;
