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

//! The facade's unified error taxonomy: one enum wrapping every crate's own
//! error type behind `#[from]`, so callers match one type regardless of
//! which stage of the pipeline failed.

use octofhir_cql_core::CoreError;
use octofhir_cql_elm::ElmError;
use octofhir_cql_eval::EvalError;
use octofhir_cql_library::LibraryError;
use octofhir_cql_parser::ParseError;
use octofhir_cql_terminology::TerminologyError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CqlError {
    #[error("{0} is not defined in this library")]
    UnknownDefinition(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Elm(#[from] ElmError),

    #[error(transparent)]
    Terminology(#[from] TerminologyError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

pub type CqlResult<T> = Result<T, CqlError>;
