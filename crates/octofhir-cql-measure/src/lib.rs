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

//! The measure engine: fixed population taxonomy, per-subject
//! evaluation dispatched across a cohort, and `MeasureReport` construction.

pub mod definition;
pub mod engine;
pub mod population;
pub mod report;
pub mod scoring;
pub mod subject;

pub use definition::{MeasureDefinition, StratifierDef};
pub use engine::evaluate_measure;
pub use population::PopulationKind;
pub use report::MeasureReport;
pub use scoring::{PopulationCounts, Scoring};
pub use subject::{evaluate_subject, SubjectResult};
