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

//! Quantity (a decimal value with a UCUM unit) and Ratio, plus the unit
//! engine: dimensional parsing, canonicalization, and conversion.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::fmt;

/// Fractional digits locked for `convert`/`ConvertQuantity` rounding.
pub const CONVERSION_SCALE: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantity {
    pub value: Decimal,
    /// `None` and `Some("1")` both mean dimensionless; `None` is used for
    /// quantities built without ever naming a unit, `Some("1")` for ones
    /// that explicitly carry the UCUM `'1'` unit literal.
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new(value: Decimal, unit: Option<String>) -> Self {
        Self {
            value,
            unit: unit.map(|u| normalize_unit_name(&u)),
        }
    }

    pub fn unitless(value: Decimal) -> Self {
        Self { value, unit: None }
    }

    pub fn with_unit(value: Decimal, unit: impl Into<String>) -> Self {
        Self::new(value, Some(unit.into()))
    }

    fn unit_str(&self) -> &str {
        self.unit.as_deref().unwrap_or("1")
    }

    pub fn has_compatible_dimensions(&self, other: &Quantity) -> bool {
        match (&self.unit, &other.unit) {
            (None, None) => true,
            _ => octofhir_ucum::is_comparable(self.unit_str(), other.unit_str()).unwrap_or(false),
        }
    }

    /// Convert this quantity's value into `target_unit`, rounding to
    /// [`CONVERSION_SCALE`] fractional digits.
    pub fn convert_to(&self, target_unit: &str) -> Result<Quantity> {
        let target_unit = normalize_unit_name(target_unit);
        let from_unit = self.unit_str().to_string();
        if from_unit == target_unit {
            return Ok(self.clone());
        }
        let from_analysis = octofhir_ucum::analyse(&from_unit)
            .map_err(|_| CoreError::UnknownUnit { code: from_unit.clone() })?;
        let to_analysis = octofhir_ucum::analyse(&target_unit)
            .map_err(|_| CoreError::UnknownUnit { code: target_unit.clone() })?;
        if from_analysis.dimension != to_analysis.dimension {
            return Err(CoreError::incompatible_units(from_unit, target_unit));
        }
        let value_f64 = self.value.to_f64().unwrap_or(0.0);
        let converted = (value_f64 * from_analysis.factor + from_analysis.offset - to_analysis.offset)
            / to_analysis.factor;
        let decimal = Decimal::from_f64(converted).unwrap_or(self.value);
        let rounded = decimal.round_dp_with_strategy(
            CONVERSION_SCALE,
            rust_decimal::RoundingStrategy::MidpointNearestEven,
        );
        Ok(Quantity::new(rounded, Some(target_unit)))
    }

    pub fn equals_with_conversion(&self, other: &Quantity) -> Result<bool> {
        match (&self.unit, &other.unit) {
            (None, None) => Ok(self.value == other.value),
            (Some(_), Some(_)) | (None, Some(_)) | (Some(_), None) => {
                if self.unit_str() == other.unit_str() {
                    return Ok(self.value == other.value);
                }
                if !self.has_compatible_dimensions(other) {
                    return Ok(false);
                }
                let converted = other.convert_to(self.unit_str())?;
                Ok(self.value == converted.value)
            }
        }
    }

    pub fn add(&self, other: &Quantity) -> Result<Quantity> {
        self.combine(other, |a, b| a + b)
    }

    pub fn subtract(&self, other: &Quantity) -> Result<Quantity> {
        self.combine(other, |a, b| a - b)
    }

    fn combine(&self, other: &Quantity, op: impl Fn(Decimal, Decimal) -> Decimal) -> Result<Quantity> {
        match (&self.unit, &other.unit) {
            (None, None) => Ok(Quantity::unitless(op(self.value, other.value))),
            _ if self.unit_str() == other.unit_str() => {
                Ok(Quantity::new(op(self.value, other.value), self.unit.clone()))
            }
            _ if self.has_compatible_dimensions(other) => {
                let converted = other.convert_to(self.unit_str())?;
                Ok(Quantity::new(op(self.value, converted.value), self.unit.clone()))
            }
            _ => Err(CoreError::incompatible_units(
                self.unit_str().to_string(),
                other.unit_str().to_string(),
            )),
        }
    }

    pub fn multiply_scalar(&self, scalar: Decimal) -> Quantity {
        Quantity::new(self.value * scalar, self.unit.clone())
    }

    pub fn divide_scalar(&self, scalar: Decimal) -> Option<Quantity> {
        if scalar.is_zero() {
            None
        } else {
            Some(Quantity::new(self.value / scalar, self.unit.clone()))
        }
    }

    pub fn multiply(&self, other: &Quantity) -> Quantity {
        Quantity::new(
            self.value * other.value,
            combine_units_multiply(&self.unit, &other.unit),
        )
    }

    pub fn divide(&self, other: &Quantity) -> Option<Quantity> {
        if other.value.is_zero() {
            None
        } else {
            Some(Quantity::new(
                self.value / other.value,
                combine_units_divide(&self.unit, &other.unit),
            ))
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(u) => write!(f, "{} '{}'", self.value, u),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Numerator / denominator pair, each a [`Quantity`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ratio {
    pub numerator: Quantity,
    pub denominator: Quantity,
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Map FHIRPath/CQL calendar-duration unit spellings onto UCUM codes, and
/// leave anything else (already UCUM, or unrecognized) untouched — exactly
/// upstream's `Quantity::normalize_unit_name`.
fn normalize_unit_name(unit: &str) -> String {
    match unit {
        "year" | "years" => "a".to_string(),
        "month" | "months" => "mo".to_string(),
        "week" | "weeks" => "wk".to_string(),
        "day" | "days" => "d".to_string(),
        "hour" | "hours" => "h".to_string(),
        "minute" | "minutes" => "min".to_string(),
        "second" | "seconds" => "s".to_string(),
        "millisecond" | "milliseconds" => "ms".to_string(),
        other => other.to_string(),
    }
}

fn combine_units_multiply(left: &Option<String>, right: &Option<String>) -> Option<String> {
    match (left, right) {
        (Some(l), Some(r)) if l == "1" => Some(r.clone()),
        (Some(l), Some(r)) if r == "1" => Some(l.clone()),
        (Some(l), Some(r)) => Some(format!("{l}.{r}")),
        (Some(u), None) | (None, Some(u)) => Some(u.clone()),
        (None, None) => None,
    }
}

fn combine_units_divide(numerator: &Option<String>, denominator: &Option<String>) -> Option<String> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if n == d => Some("1".to_string()),
        (Some(n), Some(d)) if d == "1" => Some(n.clone()),
        (Some(n), Some(d)) => Some(format!("{n}/{d}")),
        (Some(n), None) => Some(n.clone()),
        (None, Some(d)) => Some(format!("1/{d}")),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn same_unit_addition_is_exact() {
        let a = Quantity::with_unit(dec!(5), "mg");
        let b = Quantity::with_unit(dec!(3), "mg");
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.value, dec!(8));
    }

    #[test]
    fn incompatible_units_reject_addition() {
        let a = Quantity::with_unit(dec!(5), "mg");
        let b = Quantity::with_unit(dec!(3), "mL");
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn pounds_to_kilograms_matches_scenario_3() {
        let q = Quantity::with_unit(dec!(150), "[lb_av]");
        let converted = q.convert_to("kg").unwrap();
        assert_eq!(converted.value, dec!(68.0388555));
    }

    #[test]
    fn calendar_alias_equals_ucum_week() {
        let a = Quantity::with_unit(dec!(7), "days");
        let b = Quantity::with_unit(dec!(1), "wk");
        assert!(a.equals_with_conversion(&b).unwrap());
    }
}
