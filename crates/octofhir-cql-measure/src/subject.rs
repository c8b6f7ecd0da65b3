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

//! Single-subject evaluation: build an
//! `EvaluationContext` rooted at the subject, evaluate every population in
//! the fixed order, then the stratifiers. One `EvaluationContext` per
//! subject, never shared — this is the unit of parallelism
//! the measure engine dispatches across a cohort.

use crate::definition::MeasureDefinition;
use crate::population::PopulationKind;
use octofhir_cql_core::Value;
use octofhir_cql_elm::ElmLibrary;
use octofhir_cql_eval::{DataSource, EvalError, EvaluationConfig, EvaluationContext};
use octofhir_cql_terminology::TerminologyService;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SubjectResult {
    pub populations: FxHashMap<PopulationKind, Value>,
    pub stratifiers: FxHashMap<String, Value>,
}

impl SubjectResult {
    pub fn in_population(&self, kind: PopulationKind) -> bool {
        matches!(self.populations.get(&kind), Some(Value::Boolean(true)))
    }

    pub fn observation(&self) -> Option<&Value> {
        self.populations.get(&PopulationKind::MeasureObservation)
    }
}

pub fn evaluate_subject(
    definition: &MeasureDefinition,
    library: &Arc<ElmLibrary>,
    subject: Value,
    data_source: &Arc<dyn DataSource>,
    terminology: &Arc<dyn TerminologyService>,
    config: &EvaluationConfig,
) -> Result<SubjectResult, EvalError> {
    let ctx = EvaluationContext::new(subject, Arc::clone(library), Arc::clone(data_source), Arc::clone(terminology))
        .with_config(config.clone());

    let mut populations = FxHashMap::default();
    for kind in PopulationKind::ORDER {
        if let Some(define) = definition.resolve_define(kind, library)? {
            let statement = library.statement(&define).expect("resolve_define only returns names present in the library");
            let value = octofhir_cql_eval::eval_node(&statement.expression, &ctx)?;
            populations.insert(kind, value);
        }
    }

    let mut stratifiers = FxHashMap::default();
    for stratifier in &definition.stratifiers {
        if let Some(statement) = library.statement(&stratifier.define) {
            let value = octofhir_cql_eval::eval_node(&statement.expression, &ctx)?;
            stratifiers.insert(stratifier.name.clone(), value);
        }
    }

    Ok(SubjectResult { populations, stratifiers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_elm::{ElmNode, ElmStatement};
    use octofhir_cql_eval::InMemoryDataSource;
    use octofhir_cql_terminology::InMemoryTerminologyService;
    use crate::scoring::Scoring;

    fn library_with(name: &str, value: Value) -> Arc<ElmLibrary> {
        let mut lib = ElmLibrary::new();
        lib.statements.push(ElmStatement {
            name: name.to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::Literal(value),
        });
        Arc::new(lib)
    }

    #[test]
    fn evaluates_the_population_define_named_by_resolution() {
        let library = library_with("Initial Population", Value::Boolean(true));
        let definition = MeasureDefinition::new(Scoring::Cohort);
        let data_source: Arc<dyn DataSource> = Arc::new(InMemoryDataSource::default());
        let terminology: Arc<dyn TerminologyService> = Arc::new(InMemoryTerminologyService::default());
        let result = evaluate_subject(&definition, &library, Value::Null, &data_source, &terminology, &EvaluationConfig::default()).unwrap();
        assert!(result.in_population(PopulationKind::InitialPopulation));
    }

    #[test]
    fn missing_population_define_is_simply_absent() {
        let library = library_with("Initial Population", Value::Boolean(true));
        let definition = MeasureDefinition::new(Scoring::Proportion);
        let data_source: Arc<dyn DataSource> = Arc::new(InMemoryDataSource::default());
        let terminology: Arc<dyn TerminologyService> = Arc::new(InMemoryTerminologyService::default());
        let result = evaluate_subject(&definition, &library, Value::Null, &data_source, &terminology, &EvaluationConfig::default()).unwrap();
        assert!(!result.in_population(PopulationKind::Numerator));
    }
}
