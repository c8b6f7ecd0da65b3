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

//! The fixed population taxonomy: eight population kinds,
//! evaluated in a fixed order, each recognized under either its spaced or
//! unspaced `define` name.

/// A measure population kind, in the order the engine must evaluate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopulationKind {
    InitialPopulation,
    Denominator,
    DenominatorExclusion,
    DenominatorException,
    Numerator,
    NumeratorExclusion,
    MeasurePopulation,
    MeasureObservation,
}

impl PopulationKind {
    /// Fixed evaluation order.
    pub const ORDER: [PopulationKind; 8] = [
        PopulationKind::InitialPopulation,
        PopulationKind::Denominator,
        PopulationKind::DenominatorExclusion,
        PopulationKind::DenominatorException,
        PopulationKind::Numerator,
        PopulationKind::NumeratorExclusion,
        PopulationKind::MeasurePopulation,
        PopulationKind::MeasureObservation,
    ];

    /// The spaced spelling, as most reference CQL measures quote it:
    /// `define "Initial Population": ...`.
    pub fn spaced_name(&self) -> &'static str {
        match self {
            Self::InitialPopulation => "Initial Population",
            Self::Denominator => "Denominator",
            Self::DenominatorExclusion => "Denominator Exclusion",
            Self::DenominatorException => "Denominator Exception",
            Self::Numerator => "Numerator",
            Self::NumeratorExclusion => "Numerator Exclusion",
            Self::MeasurePopulation => "Measure Population",
            Self::MeasureObservation => "Measure Observation",
        }
    }

    /// The unspaced spelling (`InitialPopulation`), also accepted
    /// case-sensitively.
    pub fn unspaced_name(&self) -> &'static str {
        match self {
            Self::InitialPopulation => "InitialPopulation",
            Self::Denominator => "Denominator",
            Self::DenominatorExclusion => "DenominatorExclusion",
            Self::DenominatorException => "DenominatorException",
            Self::Numerator => "Numerator",
            Self::NumeratorExclusion => "NumeratorExclusion",
            Self::MeasurePopulation => "MeasurePopulation",
            Self::MeasureObservation => "MeasureObservation",
        }
    }

    /// The FHIR `MeasureReport.group.population.code` this kind reports as.
    pub fn report_code(&self) -> &'static str {
        match self {
            Self::InitialPopulation => "initial-population",
            Self::Denominator => "denominator",
            Self::DenominatorExclusion => "denominator-exclusion",
            Self::DenominatorException => "denominator-exception",
            Self::Numerator => "numerator",
            Self::NumeratorExclusion => "numerator-exclusion",
            Self::MeasurePopulation => "measure-population",
            Self::MeasureObservation => "measure-observation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_starts_with_initial_population_and_ends_with_observation() {
        assert_eq!(PopulationKind::ORDER[0], PopulationKind::InitialPopulation);
        assert_eq!(PopulationKind::ORDER[7], PopulationKind::MeasureObservation);
    }

    #[test]
    fn spaced_and_unspaced_names_differ_only_by_whitespace() {
        let spaced = PopulationKind::DenominatorException.spaced_name().replace(' ', "");
        assert_eq!(spaced, PopulationKind::DenominatorException.unspaced_name());
    }
}
