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

//! The measure engine's entry point: runs every subject in a cohort
//! through [`evaluate_subject`], tallies the populations, scores the
//! group, and groups stratified sub-scores, isolating per-subject
//! failures into the report rather than aborting the run.

use crate::definition::MeasureDefinition;
use crate::population::PopulationKind;
use crate::report::{tally, GroupReport, MeasureReport, PopulationReport, StratifierReport, StratumReport, SubjectError};
use crate::subject::{evaluate_subject, SubjectResult};
use octofhir_cql_core::Value;
use octofhir_cql_elm::ElmLibrary;
use octofhir_cql_eval::{operators, DataSource, EvalError, EvaluationConfig};
use octofhir_cql_terminology::TerminologyService;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Below this cohort size, per-subject evaluation runs on the calling
/// thread; a tiny cohort isn't worth rayon's thread-pool handoff.
const PARALLEL_THRESHOLD: usize = 8;

fn evaluate_cohort(
    definition: &MeasureDefinition,
    library: &Arc<ElmLibrary>,
    cohort: &[Value],
    data_source: &Arc<dyn DataSource>,
    terminology: &Arc<dyn TerminologyService>,
    config: &EvaluationConfig,
) -> Vec<(usize, Result<SubjectResult, EvalError>)> {
    let run_one = |(index, subject): (usize, &Value)| {
        (index, evaluate_subject(definition, library, subject.clone(), data_source, terminology, config))
    };

    if cohort.len() >= PARALLEL_THRESHOLD {
        use rayon::prelude::*;
        cohort.par_iter().enumerate().map(run_one).collect()
    } else {
        cohort.iter().enumerate().map(run_one).collect()
    }
}

fn stratifier_value_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

fn group_from(subjects: &[&SubjectResult], definition: &MeasureDefinition) -> GroupReport {
    let counts = tally(subjects.iter().flat_map(|s| PopulationKind::ORDER.into_iter().map(|k| (k, s.in_population(k)))));

    let observations: Vec<Value> = subjects
        .iter()
        .filter(|s| s.in_population(PopulationKind::MeasurePopulation))
        .filter_map(|s| s.observation().cloned())
        .collect();
    let observation_aggregate = if observations.is_empty() {
        None
    } else {
        match operators::aggregate::sum(&Value::List(observations)) {
            Ok(Value::Decimal(d)) => Some(d),
            Ok(Value::Integer(i)) => Some(Decimal::from(i)),
            _ => None,
        }
    };

    let populations = PopulationKind::ORDER
        .into_iter()
        .map(|kind| PopulationReport { kind, count: count_for(&counts, kind) })
        .collect();
    let measure_score = definition.scoring.score(&counts, observation_aggregate);

    let stratifiers = definition
        .stratifiers
        .iter()
        .map(|stratifier| {
            let mut by_value: std::collections::BTreeMap<String, Vec<&SubjectResult>> = std::collections::BTreeMap::new();
            for subject in subjects {
                let key = subject
                    .stratifiers
                    .get(&stratifier.name)
                    .map(stratifier_value_key)
                    .unwrap_or_else(|| "null".to_string());
                by_value.entry(key).or_default().push(subject);
            }
            let strata = by_value
                .into_iter()
                .map(|(value, members)| {
                    let sub_group = group_from(&members, definition);
                    StratumReport { value, populations: sub_group.populations, measure_score: sub_group.measure_score }
                })
                .collect();
            StratifierReport { name: stratifier.name.clone(), strata }
        })
        .collect();

    GroupReport { populations, measure_score, stratifiers }
}

fn count_for(counts: &crate::scoring::PopulationCounts, kind: PopulationKind) -> u64 {
    match kind {
        PopulationKind::InitialPopulation => counts.initial_population,
        PopulationKind::Denominator => counts.denominator,
        PopulationKind::DenominatorExclusion => counts.denominator_exclusion,
        PopulationKind::DenominatorException => counts.denominator_exception,
        PopulationKind::Numerator => counts.numerator,
        PopulationKind::NumeratorExclusion => counts.numerator_exclusion,
        PopulationKind::MeasurePopulation => counts.measure_population,
        PopulationKind::MeasureObservation => 0,
    }
}

/// Evaluates `definition` over `cohort`, producing the group/stratifier
/// tree plus one error entry per subject whose evaluation failed
/// isolating per-subject failures rather than propagating them.
pub fn evaluate_measure(
    definition: &MeasureDefinition,
    library: Arc<ElmLibrary>,
    cohort: &[Value],
    data_source: Arc<dyn DataSource>,
    terminology: Arc<dyn TerminologyService>,
    config: EvaluationConfig,
) -> MeasureReport {
    let results = evaluate_cohort(definition, &library, cohort, &data_source, &terminology, &config);

    let mut subjects = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for (index, result) in results {
        match result {
            Ok(subject) => subjects.push(subject),
            Err(err) => {
                log::warn!("subject {index} failed measure evaluation: {err}");
                errors.push(SubjectError { index, message: err.to_string() });
            }
        }
    }

    let refs: Vec<&SubjectResult> = subjects.iter().collect();
    let group = group_from(&refs, definition);
    MeasureReport { group, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::MeasureDefinition;
    use crate::population::PopulationKind;
    use crate::scoring::Scoring;
    use octofhir_cql_elm::{ElmNode, ElmOperator, ElmStatement};
    use octofhir_cql_eval::InMemoryDataSource;
    use octofhir_cql_terminology::InMemoryTerminologyService;

    fn age_gate_library() -> Arc<ElmLibrary> {
        // Initial Population: AgeInYears() >= 18; Denominator: AgeInYears() >= 45
        let age_gate = |threshold: i64, name: &str| ElmStatement {
            name: name.to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::binary(
                ElmOperator::GreaterOrEqual,
                ElmNode::operator(ElmOperator::AgeInYears, Vec::new()),
                ElmNode::Literal(Value::Integer(threshold)),
            ),
        };
        let mut lib = ElmLibrary::new();
        lib.statements.push(age_gate(18, "Initial Population"));
        lib.statements.push(age_gate(45, "Denominator"));
        Arc::new(lib)
    }

    fn patient(age_years: i64) -> Value {
        Value::Resource(serde_json::json!({
            "resourceType": "Patient",
            "birthDate": format!("{}-01-01", 2026 - age_years),
        }))
    }

    #[test]
    fn cohort_scoring_counts_the_initial_population() {
        let library = age_gate_library();
        let definition = MeasureDefinition::new(Scoring::Cohort);
        let cohort: Vec<Value> = vec![patient(10), patient(20), patient(30)];
        let data_source: Arc<dyn DataSource> = Arc::new(InMemoryDataSource::default());
        let terminology: Arc<dyn TerminologyService> = Arc::new(InMemoryTerminologyService::default());
        let report = evaluate_measure(&definition, library, &cohort, data_source, terminology, EvaluationConfig::default());
        assert_eq!(report.group.measure_score, Some(Decimal::from(2)));
        assert!(report.errors.is_empty());
    }

    #[test]
    fn proportion_scoring_divides_denominator_eligible_subjects() {
        let library = age_gate_library();
        let definition = MeasureDefinition::new(Scoring::Proportion)
            .with_override(PopulationKind::Numerator, "Initial Population");
        let cohort: Vec<Value> = (0..10).map(|i| patient(30 + i * 5)).collect();
        let data_source: Arc<dyn DataSource> = Arc::new(InMemoryDataSource::default());
        let terminology: Arc<dyn TerminologyService> = Arc::new(InMemoryTerminologyService::default());
        let report = evaluate_measure(&definition, library, &cohort, data_source, terminology, EvaluationConfig::default());
        assert!(report.group.measure_score.is_some());
    }
}
