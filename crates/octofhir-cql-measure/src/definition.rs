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

//! What a measure run needs beyond the compiled library itself: which
//! scoring method applies, which `define` backs each population (defaulting
//! to name aliasing when not overridden), and which `define`s back the
//! stratifiers.

use crate::population::PopulationKind;
use crate::scoring::Scoring;
use octofhir_cql_elm::{ElmError, ElmLibrary};
use rustc_hash::FxHashMap;

/// One stratifier: partitions the cohort by the value of a `define`,
/// computed once per subject and reused across population counts.
#[derive(Debug, Clone)]
pub struct StratifierDef {
    pub name: String,
    pub define: String,
}

#[derive(Debug, Clone)]
pub struct MeasureDefinition {
    pub scoring: Scoring,
    /// Overrides the `define` name backing a population kind, for libraries
    /// that don't use either the spaced or unspaced canonical spelling.
    pub population_overrides: FxHashMap<PopulationKind, String>,
    pub stratifiers: Vec<StratifierDef>,
}

impl MeasureDefinition {
    pub fn new(scoring: Scoring) -> Self {
        Self { scoring, population_overrides: FxHashMap::default(), stratifiers: Vec::new() }
    }

    pub fn with_override(mut self, kind: PopulationKind, define_name: impl Into<String>) -> Self {
        self.population_overrides.insert(kind, define_name.into());
        self
    }

    pub fn with_stratifier(mut self, name: impl Into<String>, define: impl Into<String>) -> Self {
        self.stratifiers.push(StratifierDef { name: name.into(), define: define.into() });
        self
    }

    /// Resolves which `define` in `library` backs `kind`: the override if
    /// one is set, else the spaced spelling, else the unspaced spelling.
    /// Returns an owned name since an override's lifetime is tied to this
    /// definition, not to the library being checked against. A library that
    /// defines both the spaced and unspaced spelling of the same population
    /// is ambiguous, not a preference between them, so that case is reported
    /// as a [`ElmError::DuplicateDefinition`] rather than silently resolved.
    pub fn resolve_define(&self, kind: PopulationKind, library: &ElmLibrary) -> Result<Option<String>, ElmError> {
        if let Some(name) = self.population_overrides.get(&kind) {
            return Ok(library.statement(name).map(|_| name.clone()));
        }
        let spaced = library.statement(kind.spaced_name()).is_some();
        let unspaced = library.statement(kind.unspaced_name()).is_some();
        match (spaced, unspaced) {
            (true, true) => Err(ElmError::DuplicateDefinition { name: kind.spaced_name().to_string() }),
            (true, false) => Ok(Some(kind.spaced_name().to_string())),
            (false, true) => Ok(Some(kind.unspaced_name().to_string())),
            (false, false) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_core::Value;
    use octofhir_cql_elm::{ElmNode, ElmStatement};

    fn library_with(name: &str) -> ElmLibrary {
        let mut lib = ElmLibrary::new();
        lib.statements.push(ElmStatement {
            name: name.to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::Literal(Value::Boolean(true)),
        });
        lib
    }

    #[test]
    fn resolves_spaced_name_when_present() {
        let def = MeasureDefinition::new(Scoring::Proportion);
        let lib = library_with("Initial Population");
        assert_eq!(def.resolve_define(PopulationKind::InitialPopulation, &lib).unwrap().as_deref(), Some("Initial Population"));
    }

    #[test]
    fn falls_back_to_unspaced_name() {
        let def = MeasureDefinition::new(Scoring::Proportion);
        let lib = library_with("InitialPopulation");
        assert_eq!(def.resolve_define(PopulationKind::InitialPopulation, &lib).unwrap().as_deref(), Some("InitialPopulation"));
    }

    #[test]
    fn override_wins_over_both_canonical_spellings() {
        let def = MeasureDefinition::new(Scoring::Proportion).with_override(PopulationKind::InitialPopulation, "IP");
        let lib = library_with("IP");
        assert_eq!(def.resolve_define(PopulationKind::InitialPopulation, &lib).unwrap().as_deref(), Some("IP"));
    }

    #[test]
    fn both_spellings_present_is_a_duplicate_definition_not_a_silent_preference() {
        let def = MeasureDefinition::new(Scoring::Proportion);
        let mut lib = library_with("Initial Population");
        lib.statements.push(ElmStatement {
            name: "InitialPopulation".to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::Literal(Value::Boolean(true)),
        });
        let err = def.resolve_define(PopulationKind::InitialPopulation, &lib).unwrap_err();
        assert_eq!(err, ElmError::DuplicateDefinition { name: "Initial Population".to_string() });
    }

    #[test]
    fn an_override_sidesteps_the_ambiguity_check() {
        let def = MeasureDefinition::new(Scoring::Proportion).with_override(PopulationKind::InitialPopulation, "Initial Population");
        let mut lib = library_with("Initial Population");
        lib.statements.push(ElmStatement {
            name: "InitialPopulation".to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::Literal(Value::Boolean(true)),
        });
        assert_eq!(def.resolve_define(PopulationKind::InitialPopulation, &lib).unwrap().as_deref(), Some("Initial Population"));
    }
}
