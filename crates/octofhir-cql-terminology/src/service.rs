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

//! The terminology contract: value set membership, code
//! validation, and subsumption, behind one trait so the retrieve layer and
//! the `InValueSet`/`Subsumes`/`SubsumedBy` operators don't care whether
//! answers come from an in-process index or a remote FHIR terminology
//! server.

use crate::error::TerminologyResult;
use octofhir_cql_core::Code;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidateCodeResult {
    pub result: bool,
    pub display: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsumptionRelation {
    Equivalent,
    Subsumes,
    SubsumedBy,
    NotSubsumed,
}

pub trait TerminologyService: Send + Sync {
    fn validate_code(&self, url: &str, system: &str, code: &str) -> TerminologyResult<ValidateCodeResult>;

    fn member_of(&self, code: &Code, url: &str) -> TerminologyResult<bool>;

    fn subsumes(&self, system: &str, code_a: &str, code_b: &str) -> TerminologyResult<SubsumptionRelation>;

    /// The expanded `(system, code)` set behind a value set URL, used by the
    /// retrieve layer's code filter to avoid calling
    /// `member_of` once per candidate resource. `None` when the service
    /// can't materialize a full expansion (e.g. a remote service that only
    /// answers point queries).
    fn expand(&self, url: &str) -> TerminologyResult<Option<Vec<(String, String)>>>;
}
