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

//! Overload resolution: given an operator and the `Kind`s its operands
//! evaluated to, pick the one [`Signature`] that applies and report what
//! it will produce. Evaluation itself never inspects
//! [`crate::operators::signatures`] directly — it always goes through
//! [`resolve`], so adding an overload here is enough to make it dispatchable.

use crate::error::{RegistryError, RegistryResult};
use crate::operators::signatures;
use crate::signature::Signature;
use octofhir_cql_core::Kind;
use octofhir_cql_elm::ElmOperator;

/// The single overload that matched, and the `Kind` it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub result: Kind,
}

/// Resolve `op` against `arg_kinds`. A single matching overload is the
/// success path; zero matches is a type mismatch, more than one is an
/// ambiguity the lowering pass's own disambiguation didn't already rule
/// out (overloads here are kept non-overlapping by construction, so this
/// should never fire in practice — it is still reported rather than
/// panicking, since a future overload addition could violate that).
pub fn resolve(op: ElmOperator, arg_kinds: &[Kind]) -> RegistryResult<Resolved> {
    let candidates: Vec<&Signature> = signatures_cached(op)
        .iter()
        .filter(|s| s.matches(arg_kinds))
        .collect();

    match candidates.len() {
        0 => {
            log::debug!("no overload of {op:?} matches {arg_kinds:?}");
            Err(RegistryError::NoMatchingOverload {
                op,
                actual: arg_kinds.to_vec(),
            })
        }
        1 => Ok(Resolved {
            result: candidates[0].result_kind(arg_kinds),
        }),
        n => {
            log::warn!("{n} overloads of {op:?} tie on {arg_kinds:?}");
            Err(RegistryError::AmbiguousOverload {
                op,
                actual: arg_kinds.to_vec(),
                candidates: n,
            })
        }
    }
}

/// `signatures()` builds a fresh `Vec` per call (the table is small and
/// rarely hot enough to warrant a lazy static); this indirection exists so
/// callers only ever go through one name, in case that changes.
fn signatures_cached(op: ElmOperator) -> Vec<Signature> {
    signatures(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_integer_addition() {
        let resolved = resolve(ElmOperator::Add, &[Kind::Integer, Kind::Integer]).unwrap();
        assert_eq!(resolved.result, Kind::Integer);
    }

    #[test]
    fn resolves_decimal_widening() {
        let resolved = resolve(ElmOperator::Add, &[Kind::Integer, Kind::Decimal]).unwrap();
        assert_eq!(resolved.result, Kind::Decimal);
    }

    #[test]
    fn resolves_date_plus_quantity() {
        let resolved = resolve(ElmOperator::Add, &[Kind::Date, Kind::Quantity]).unwrap();
        assert_eq!(resolved.result, Kind::Date);
    }

    #[test]
    fn rejects_incompatible_operand_kinds() {
        let err = resolve(ElmOperator::Add, &[Kind::Boolean, Kind::Boolean]).unwrap_err();
        assert!(matches!(err, RegistryError::NoMatchingOverload { .. }));
    }

    #[test]
    fn null_operand_is_always_accepted() {
        let resolved = resolve(ElmOperator::And, &[Kind::Null, Kind::Boolean]).unwrap();
        assert_eq!(resolved.result, Kind::Boolean);
    }

    #[test]
    fn exists_resolves_to_boolean() {
        let resolved = resolve(ElmOperator::Exists, &[Kind::List]).unwrap();
        assert_eq!(resolved.result, Kind::Boolean);
    }
}
