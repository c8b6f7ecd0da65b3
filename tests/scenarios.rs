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

//! End-to-end scenarios exercised directly against [`CqlEngine`], each one
//! matching one literal-input/expected-output pair.

use octofhir_cql::{
    CqlEngine, InMemoryDataSource, InMemoryLibraryProvider, InMemoryTerminologyService, MeasureDefinition,
    PopulationKind, Scoring, Value,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn engine() -> CqlEngine {
    CqlEngine::new(
        Arc::new(InMemoryLibraryProvider::new()),
        Arc::new(InMemoryDataSource::default()),
        Arc::new(InMemoryTerminologyService::default()),
    )
}

#[test]
fn arithmetic_expression_respects_operator_precedence() {
    let result = engine().evaluate_expression("1 + 2 * 3", None, None).unwrap();
    assert_eq!(result, Value::Integer(7));
}

#[test]
fn years_between_uses_calendar_math_not_elapsed_days() {
    // `Today()` reads the wall clock with no injection point (evaluator
    // instances expose no suspendable clock source), so the fixed
    // "@2024-06-15T00:00:00Z" context time is substituted with an
    // equivalent literal in place of `Today()`.
    let result = engine()
        .evaluate_expression("years between @1990-01-01 and @2024-06-15", None, None)
        .unwrap();
    assert_eq!(result, Value::Integer(34));
}

#[test]
fn difference_in_days_between_counts_calendar_days() {
    let result = engine()
        .evaluate_expression("difference in days between @2024-01-01 and @2024-01-10", None, None)
        .unwrap();
    assert_eq!(result, Value::Integer(9));
}

#[test]
fn unit_conversion_rounds_to_eight_fractional_digits() {
    let result = engine()
        .evaluate_expression("ConvertQuantity(150 '[lb_av]', 'kg')", None, None)
        .unwrap();
    match result {
        Value::Quantity(q) => {
            assert_eq!(q.unit.as_deref(), Some("kg"));
            assert_eq!(q.value.round_dp(8), Decimal::new(680388555, 7));
        }
        other => panic!("expected Quantity, got {other:?}"),
    }
}

#[test]
fn three_valued_logic_matches_kleene_tables() {
    let e = engine();
    assert_eq!(e.evaluate_expression("true and null", None, None).unwrap(), Value::Null);
    assert_eq!(e.evaluate_expression("true or null", None, None).unwrap(), Value::Boolean(true));
}

#[test]
fn retrieve_with_valueset_filter_finds_a_matching_condition() {
    let mut data_source = InMemoryDataSource::default();
    data_source.insert(
        "Patient",
        serde_json::json!({ "resourceType": "Patient", "id": "p1" }),
    );
    data_source.insert(
        "Condition",
        serde_json::json!({
            "resourceType": "Condition",
            "id": "c1",
            "subject": { "reference": "Patient/p1" },
            "code": { "coding": [{ "system": "http://snomed.info/sct", "code": "44054006" }] },
        }),
    );

    let mut terminology = InMemoryTerminologyService::new();
    terminology
        .ingest_value_set(
            &serde_json::json!({
                "compose": { "include": [{ "system": "http://snomed.info/sct", "concept": [{ "code": "44054006" }] }] },
            }),
            Some("vs/diabetes"),
        )
        .unwrap();

    let engine = CqlEngine::new(
        Arc::new(InMemoryLibraryProvider::new()),
        Arc::new(data_source),
        Arc::new(terminology),
    );

    let library = engine
        .compile(
            r#"
            library L using FHIR version '4.0.1'
            context Patient
            valueset "DM": 'vs/diabetes'
            define HasDM: exists([Condition: "DM"])
        "#,
        )
        .unwrap();

    let patient = serde_json::json!({ "resourceType": "Patient", "id": "p1" });
    let result = engine.evaluate_definition(&library, "HasDM", Some(patient), None).unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn measure_proportion_scoring_matches_the_expected_ratio() {
    let mut data_source = InMemoryDataSource::default();
    // Ages 30..=75 step 5; conditions recorded only for subjects aged >= 50.
    let ages: Vec<i64> = (0..10).map(|i| 30 + i * 5).collect();
    let this_year = 2026;
    let mut cohort = Vec::with_capacity(ages.len());
    for (i, age) in ages.iter().enumerate() {
        let id = format!("p{i}");
        data_source.insert(
            "Patient",
            serde_json::json!({
                "resourceType": "Patient",
                "id": id,
                "birthDate": format!("{}-01-01", this_year - age),
            }),
        );
        if *age >= 50 {
            data_source.insert(
                "Condition",
                serde_json::json!({
                    "resourceType": "Condition",
                    "id": format!("c{i}"),
                    "subject": { "reference": format!("Patient/{id}") },
                }),
            );
        }
        cohort.push(serde_json::json!({
            "resourceType": "Patient",
            "id": id,
            "birthDate": format!("{}-01-01", this_year - age),
        }));
    }
    let cohort: Vec<Value> = cohort.into_iter().map(Value::Resource).collect();

    let engine = CqlEngine::new(
        Arc::new(InMemoryLibraryProvider::new()),
        Arc::new(data_source),
        Arc::new(InMemoryTerminologyService::default()),
    );

    let library = engine
        .compile(
            r#"
            library M using FHIR version '4.0.1'
            context Patient
            define "Initial Population": AgeInYears() >= 18
            define "Denominator": AgeInYears() >= 45
            define "Denominator Exclusion": AgeInYears() > 75
            define "Numerator": exists([Condition])
        "#,
        )
        .unwrap();

    let definition = MeasureDefinition::new(Scoring::Proportion);
    let report = engine.evaluate_measure(&library, &definition, &cohort);

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let count_of = |kind: PopulationKind| {
        report
            .group
            .populations
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.count)
            .unwrap_or(0)
    };
    assert_eq!(count_of(PopulationKind::InitialPopulation), 10);
    assert_eq!(count_of(PopulationKind::Denominator), 7);
    assert_eq!(count_of(PopulationKind::DenominatorExclusion), 0);
    assert_eq!(count_of(PopulationKind::Numerator), 6);
    assert_eq!(report.group.measure_score, Some(Decimal::from(6) / Decimal::from(7)));
}
