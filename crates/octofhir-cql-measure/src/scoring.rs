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

//! The four scoring formulas. Each takes the cohort-wide
//! population counts (and, for continuous-variable, the aggregated
//! observation) and produces the single `measureScore` value for a group.

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
    Proportion,
    Ratio,
    Cohort,
    ContinuousVariable,
}

/// Cohort-wide population counts a group's `measureScore` is computed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopulationCounts {
    pub initial_population: u64,
    pub denominator: u64,
    pub denominator_exclusion: u64,
    pub denominator_exception: u64,
    pub numerator: u64,
    pub numerator_exclusion: u64,
    pub measure_population: u64,
}

fn ratio(numerator: i64, denominator: i64) -> Option<Decimal> {
    if denominator == 0 {
        return None;
    }
    Some(Decimal::from(numerator) / Decimal::from(denominator))
}

impl Scoring {
    /// `measureScore`, or `None` when the formula's denominator is `0/0`
    /// (that case maps to `Null`, not a divide-by-zero error) or continuous-variable has no
    /// measure-population members to aggregate over.
    pub fn score(&self, counts: &PopulationCounts, observation_aggregate: Option<Decimal>) -> Option<Decimal> {
        match self {
            Scoring::Proportion => {
                let numerator = counts.numerator as i64 - counts.numerator_exclusion as i64;
                let denominator = counts.denominator as i64 - counts.denominator_exclusion as i64 - counts.denominator_exception as i64;
                ratio(numerator, denominator)
            }
            Scoring::Ratio => {
                let numerator = counts.numerator as i64 - counts.numerator_exclusion as i64;
                ratio(numerator, counts.denominator as i64)
            }
            Scoring::Cohort => Some(Decimal::from(counts.initial_population)),
            Scoring::ContinuousVariable => observation_aggregate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportion_reduces_denominator_by_exclusion_and_exception() {
        let counts = PopulationCounts { denominator: 7, denominator_exclusion: 0, denominator_exception: 1, numerator: 5, numerator_exclusion: 0, ..Default::default() };
        let score = Scoring::Proportion.score(&counts, None).unwrap();
        assert_eq!(score, Decimal::from(5) / Decimal::from(6));
    }

    #[test]
    fn proportion_zero_over_zero_is_null() {
        let counts = PopulationCounts::default();
        assert!(Scoring::Proportion.score(&counts, None).is_none());
    }

    #[test]
    fn ratio_does_not_reduce_denominator_by_exceptions() {
        let counts = PopulationCounts { denominator: 7, denominator_exclusion: 0, denominator_exception: 1, numerator: 6, numerator_exclusion: 0, ..Default::default() };
        let score = Scoring::Ratio.score(&counts, None).unwrap();
        assert_eq!(score, Decimal::from(6) / Decimal::from(7));
    }

    #[test]
    fn cohort_score_is_the_initial_population_count() {
        let counts = PopulationCounts { initial_population: 10, ..Default::default() };
        assert_eq!(Scoring::Cohort.score(&counts, None), Some(Decimal::from(10)));
    }

    #[test]
    fn continuous_variable_uses_the_supplied_aggregate() {
        let counts = PopulationCounts::default();
        let agg = Some(Decimal::from(42));
        assert_eq!(Scoring::ContinuousVariable.score(&counts, agg), agg);
    }
}
