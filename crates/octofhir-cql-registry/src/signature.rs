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

//! A minimal function/operator signature: just the parameter kinds, a
//! variadic flag, and a result kind. No performance metadata, no LSP
//! hooks, no builder machinery — the registry only needs enough to pick
//! an overload and tell the evaluator what it produced.

use octofhir_cql_core::Kind;

/// What a single parameter position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Exactly one [`Kind`], no widening.
    Exact(Kind),
    /// Any of `Integer`/`Long`/`Decimal`. `Quantity` is deliberately not
    /// included: it participates in its own overloads (see e.g. `Add`,
    /// `Less`) so a scalar-numeric and a quantity overload never both
    /// match the same argument list.
    Numeric,
    /// Any of `Date`/`DateTime`/`Time`.
    Temporal,
    /// A `List` of any element kind.
    List,
    /// Accepts anything, including `Null`.
    Any,
}

impl ParamKind {
    /// `Null` always satisfies a parameter — every operator here is total
    /// over `Null`, it just answers `Null` back.
    pub fn accepts(&self, kind: Kind) -> bool {
        if kind == Kind::Null {
            return true;
        }
        match self {
            ParamKind::Exact(k) => *k == kind,
            ParamKind::Numeric => matches!(kind, Kind::Integer | Kind::Long | Kind::Decimal),
            ParamKind::Temporal => matches!(kind, Kind::Date | Kind::DateTime | Kind::Time),
            ParamKind::List => matches!(kind, Kind::List),
            ParamKind::Any => true,
        }
    }
}

/// What an overload produces, in terms of its operands' kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Always this kind, regardless of operands.
    Fixed(Kind),
    /// The kind of the operand at this index, passed through unchanged.
    Operand(usize),
    /// The widest numeric kind among the numeric operands (promotion
    /// order `Integer < Long < Decimal`, `Quantity` stays `Quantity`).
    Widened,
    /// Always `Boolean`.
    Boolean,
    /// Determined at evaluation time from the argument's runtime payload,
    /// not statically knowable from operand `Kind`s alone (e.g. `First`
    /// unwrapping a `List`'s element kind).
    Dynamic,
}

/// One callable shape for an operator: its parameter kinds and what it
/// returns. An [`ElmOperator`](octofhir_cql_elm::ElmOperator) may have
/// several of these; [`crate::resolve`] picks the one matching the actual
/// argument kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamKind>,
    pub variadic: bool,
    pub result: ResultKind,
}

impl Signature {
    pub fn new(params: Vec<ParamKind>, result: ResultKind) -> Self {
        Self { params, variadic: false, result }
    }

    pub fn variadic(params: Vec<ParamKind>, result: ResultKind) -> Self {
        Self { params, variadic: true, result }
    }

    /// Whether `arg_kinds` could invoke this overload: arity then per-slot
    /// kind compatibility. Variadic signatures repeat the final parameter
    /// kind for every extra argument.
    pub fn matches(&self, arg_kinds: &[Kind]) -> bool {
        if self.variadic {
            if arg_kinds.len() < self.params.len().saturating_sub(1) {
                return false;
            }
        } else if arg_kinds.len() != self.params.len() {
            return false;
        }

        for (i, kind) in arg_kinds.iter().enumerate() {
            let param = if i < self.params.len() {
                &self.params[i]
            } else {
                // variadic tail reuses the last declared parameter kind
                self.params.last().expect("variadic signature has at least one param")
            };
            if !param.accepts(*kind) {
                return false;
            }
        }
        true
    }

    /// Resolve [`ResultKind`] against actual argument kinds.
    pub fn result_kind(&self, arg_kinds: &[Kind]) -> Kind {
        match self.result {
            ResultKind::Fixed(k) => k,
            ResultKind::Operand(i) => arg_kinds.get(i).copied().unwrap_or(Kind::Null),
            ResultKind::Boolean => Kind::Boolean,
            ResultKind::Dynamic => Kind::Null,
            ResultKind::Widened => widen(arg_kinds),
        }
    }
}

fn widen(arg_kinds: &[Kind]) -> Kind {
    let mut best = Kind::Integer;
    for kind in arg_kinds {
        best = match (best, kind) {
            (_, Kind::Quantity) | (Kind::Quantity, _) => Kind::Quantity,
            (_, Kind::Decimal) | (Kind::Decimal, _) => Kind::Decimal,
            (_, Kind::Long) | (Kind::Long, _) => Kind::Long,
            _ => best,
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_param_rejects_other_kinds() {
        let p = ParamKind::Exact(Kind::Integer);
        assert!(p.accepts(Kind::Integer));
        assert!(!p.accepts(Kind::String));
        assert!(p.accepts(Kind::Null));
    }

    #[test]
    fn numeric_param_excludes_quantity() {
        let p = ParamKind::Numeric;
        assert!(p.accepts(Kind::Integer));
        assert!(p.accepts(Kind::Decimal));
        assert!(!p.accepts(Kind::Quantity));
        assert!(!p.accepts(Kind::String));
    }

    #[test]
    fn variadic_signature_matches_any_extra_arity() {
        let sig = Signature::variadic(vec![ParamKind::Any], ResultKind::Fixed(Kind::List));
        assert!(sig.matches(&[]));
        assert!(sig.matches(&[Kind::Integer]));
        assert!(sig.matches(&[Kind::Integer, Kind::String, Kind::Boolean]));
    }

    #[test]
    fn widened_result_picks_the_widest_numeric_operand() {
        let sig = Signature::new(
            vec![ParamKind::Numeric, ParamKind::Numeric],
            ResultKind::Widened,
        );
        assert_eq!(sig.result_kind(&[Kind::Integer, Kind::Decimal]), Kind::Decimal);
        assert_eq!(sig.result_kind(&[Kind::Integer, Kind::Long]), Kind::Long);
        assert_eq!(sig.result_kind(&[Kind::Integer, Kind::Integer]), Kind::Integer);
    }
}
