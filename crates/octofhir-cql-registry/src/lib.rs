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

//! Operator/function signature tables and overload resolution for the ELM
//! tree-walker. This crate owns no evaluation logic of its
//! own — [`resolve::resolve`] turns an [`octofhir_cql_elm::ElmOperator`]
//! plus the `Kind`s its operands evaluated to into the single matching
//! [`signature::Signature`] and the `Kind` it produces, and the evaluator
//! crate does the rest.
//!
//! This table is consulted synchronously and is immutable once built, so
//! it needs no locking: the concurrency model runs
//! independent subjects across threads via `rayon`, each holding its own
//! borrow of the same static table.

pub mod error;
pub mod operators;
pub mod resolve;
pub mod signature;

pub use error::{RegistryError, RegistryResult};
pub use operators::signatures;
pub use resolve::{resolve, Resolved};
pub use signature::{ParamKind, ResultKind, Signature};
