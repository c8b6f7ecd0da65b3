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

//! The shape a remote FHIR terminology server integration would take.
//! Forwarding requests over the network is out of scope here — this type
//! only needs to offer the interface surface, so it exists so callers
//! can hold a `Box<dyn TerminologyService>` without caring which variant
//! backs it, and so a future network-backed implementation has a contract
//! to satisfy.

use crate::error::{TerminologyError, TerminologyResult};
use crate::service::{SubsumptionRelation, TerminologyService, ValidateCodeResult};
use octofhir_cql_core::Code;

#[derive(Debug, Clone)]
pub struct RemoteTerminologyService {
    pub base_url: String,
}

impl RemoteTerminologyService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    fn unavailable(&self) -> TerminologyError {
        TerminologyError::RemoteUnavailable { url: self.base_url.clone() }
    }
}

impl TerminologyService for RemoteTerminologyService {
    fn validate_code(&self, _url: &str, _system: &str, _code: &str) -> TerminologyResult<ValidateCodeResult> {
        Err(self.unavailable())
    }

    fn member_of(&self, _code: &Code, _url: &str) -> TerminologyResult<bool> {
        Err(self.unavailable())
    }

    fn subsumes(&self, _system: &str, _code_a: &str, _code_b: &str) -> TerminologyResult<SubsumptionRelation> {
        Err(self.unavailable())
    }

    fn expand(&self, _url: &str) -> TerminologyResult<Option<Vec<(String, String)>>> {
        Err(self.unavailable())
    }
}
