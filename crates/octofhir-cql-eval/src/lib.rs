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

//! The ELM tree-walking evaluator, the retrieve layer, and FHIR
//! resource navigation — everything needed to run a compiled
//! [`octofhir_cql_elm::ElmLibrary`] against a [`DataSource`] of FHIR data
//! resources.

pub mod config;
pub mod context;
pub mod datasource;
pub mod error;
pub mod eval;
pub mod navigator;
pub mod operators;
pub mod temporal_literal;

pub use config::{CancellationToken, EvaluationConfig};
pub use context::EvaluationContext;
pub use datasource::{BundleDataSource, CodeFilter, DataSource, DateFilter, InMemoryDataSource, PatientBundleDataSource};
pub use error::{EvalError, EvalResult};
pub use eval::eval_node;
