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

//! ELM tree types and CQL/FHIRPath-to-ELM lowering.
//!
//! [`lower_library`] is the entry point: it runs symbol collection, cyclic
//! definition detection, and name resolution/context propagation/constant
//! folding over a parsed [`octofhir_cql_ast::LibraryAst`], producing an
//! [`ElmLibrary`] plus whatever [`octofhir_cql_diagnostics::Diagnostics`]
//! it collected along the way. [`json`] serializes that library to and from
//! the wire ELM JSON shape.

pub mod error;
pub mod json;
pub mod library;
pub mod lower;
pub mod node;

pub use error::{ElmError, ElmResult};
pub use json::{from_json, to_json, ElmJsonError};
pub use library::*;
pub use lower::lower_library;
pub use node::*;
