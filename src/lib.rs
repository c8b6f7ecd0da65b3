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

//! A clinical expression language toolchain: FHIRPath and CQL compiled to
//! ELM and evaluated over FHIR-shaped data.
//!
//! This crate is the facade: it wires the lexer/parser, the CQL→ELM
//! lowering pass, the tree-walking evaluator, the library manager, and the
//! measure engine together behind [`CqlEngine`] and one unified
//! [`CqlError`] taxonomy. Every other crate in the workspace is usable
//! standalone; this one exists so a caller doesn't have to assemble the
//! pipeline themselves.

pub use octofhir_cql_core as core;
pub use octofhir_cql_diagnostics as diagnostics;
pub use octofhir_cql_elm as elm;
pub use octofhir_cql_eval as eval;
pub use octofhir_cql_library as library;
pub use octofhir_cql_measure as measure;
pub use octofhir_cql_parser as parser;
pub use octofhir_cql_registry as registry;
pub use octofhir_cql_terminology as terminology;

pub mod engine;
pub mod error;

pub use engine::CqlEngine;
pub use error::{CqlError, CqlResult};

pub use octofhir_cql_core::Value;
pub use octofhir_cql_eval::{BundleDataSource, DataSource, InMemoryDataSource, PatientBundleDataSource};
pub use octofhir_cql_library::{CompiledLibrary, InMemoryLibraryProvider, LibraryProvider};
pub use octofhir_cql_measure::{MeasureDefinition, MeasureReport, PopulationKind, Scoring};
pub use octofhir_cql_terminology::{InMemoryTerminologyService, TerminologyService};
