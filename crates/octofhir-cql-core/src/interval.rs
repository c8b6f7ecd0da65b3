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

//! Interval algebra: closed/open endpoints over an ordered point type, the
//! 13 Allen relations, and arithmetic.
//!
//! Endpoints may be `Value::Null`, meaning unbounded in that direction.

use crate::error::{CoreError, Result};
use crate::value::{Kind, Value};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub low: Value,
    pub high: Value,
    pub low_closed: bool,
    pub high_closed: bool,
    pub point_type: Kind,
}

impl Interval {
    /// Construct an interval, rejecting `low > high` when both bounds are
    /// present.
    pub fn new(low: Value, high: Value, low_closed: bool, high_closed: bool) -> Result<Self> {
        let point_type = if !low.is_null() {
            low.kind()
        } else if !high.is_null() {
            high.kind()
        } else {
            Kind::Null
        };
        if !low.is_null() && !high.is_null() {
            match low.compare(&high) {
                Ok(Some(Ordering::Greater)) => {
                    return Err(CoreError::InvalidInterval {
                        reason: "low must be <= high".to_string(),
                    });
                }
                Ok(_) => {}
                Err(_) => {
                    return Err(CoreError::InvalidInterval {
                        reason: "low and high are not comparable".to_string(),
                    });
                }
            }
        }
        Ok(Self {
            low,
            high,
            low_closed,
            high_closed,
            point_type,
        })
    }

    pub fn is_low_unbounded(&self) -> bool {
        self.low.is_null()
    }

    pub fn is_high_unbounded(&self) -> bool {
        self.high.is_null()
    }

    /// `high - low` for intervals over a subtractable point type. `None` for
    /// unbounded intervals or point types width isn't defined over (e.g.
    /// String, Tuple).
    pub fn width(&self) -> Option<Value> {
        if self.is_low_unbounded() || self.is_high_unbounded() {
            return None;
        }
        match (&self.low, &self.high) {
            (Value::Integer(lo), Value::Integer(hi)) => Some(Value::Integer(*hi - *lo)),
            (Value::Long(lo), Value::Long(hi)) => Some(Value::Long(*hi - *lo)),
            (Value::Decimal(lo), Value::Decimal(hi)) => Some(Value::Decimal(*hi - *lo)),
            (Value::Quantity(lo), Value::Quantity(hi)) => hi.subtract(lo).ok().map(Value::Quantity),
            _ => None,
        }
    }

    /// Does this interval contain `point`? `None` propagates when a bounded
    /// endpoint can't be compared to `point` (e.g. incompatible temporal
    /// precision).
    pub fn contains_point(&self, point: &Value) -> Option<bool> {
        if point.is_null() {
            return None;
        }
        if !self.is_low_unbounded() {
            match point.compare(&self.low).ok()? {
                Some(Ordering::Less) => return Some(false),
                Some(Ordering::Equal) if !self.low_closed => return Some(false),
                None => return None,
                _ => {}
            }
        }
        if !self.is_high_unbounded() {
            match point.compare(&self.high).ok()? {
                Some(Ordering::Greater) => return Some(false),
                Some(Ordering::Equal) if !self.high_closed => return Some(false),
                None => return None,
                _ => {}
            }
        }
        Some(true)
    }

    fn effective_bounds(&self, other: &Interval) -> Option<(Ordering, Ordering, Ordering, Ordering)> {
        // Compare (self.low, other.low), (self.low, other.high), (self.high, other.low), (self.high, other.high)
        let ll = compare_endpoint(&self.low, &other.low)?;
        let lh = compare_endpoint(&self.low, &other.high)?;
        let hl = compare_endpoint(&self.high, &other.low)?;
        let hh = compare_endpoint(&self.high, &other.high)?;
        Some((ll, lh, hl, hh))
    }

    /// One of the 13 Allen relations between `self` and `other`, exhaustive
    /// for any pair of bounded intervals of the same point type.
    pub fn allen_relation(&self, other: &Interval) -> Option<AllenRelation> {
        let (ll, lh, hl, hh) = self.effective_bounds(other)?;
        use AllenRelation::*;
        use Ordering::*;
        Some(if hl == Less {
            Before
        } else if lh == Greater {
            After
        } else if hl == Equal {
            Meets
        } else if lh == Equal {
            MetBy
        } else if ll == Equal && hh == Equal {
            Equals
        } else if ll == Equal && hh == Less {
            Starts
        } else if ll == Equal && hh == Greater {
            StartedBy
        } else if hh == Equal && ll == Less {
            FinishedBy
        } else if hh == Equal && ll == Greater {
            Finishes
        } else if ll == Less && hh == Greater {
            Contains
        } else if ll == Greater && hh == Less {
            During
        } else if ll == Less && hh == Less {
            Overlaps
        } else {
            OverlappedBy
        })
    }

    pub fn overlaps(&self, other: &Interval) -> Option<bool> {
        let (_, lh, hl, _) = self.effective_bounds(other)?;
        Some(hl != Ordering::Less && lh != Ordering::Greater)
    }

    pub fn before(&self, other: &Interval) -> Option<bool> {
        let hl = compare_endpoint(&self.high, &other.low)?;
        Some(hl == Ordering::Less || (hl == Ordering::Equal && !(self.high_closed && other.low_closed)))
    }

    pub fn after(&self, other: &Interval) -> Option<bool> {
        other.before(self)
    }

    pub fn starts(&self, other: &Interval) -> Option<bool> {
        let ll = compare_endpoint(&self.low, &other.low)?;
        let hh = compare_endpoint(&self.high, &other.high)?;
        Some(ll == Ordering::Equal && hh != Ordering::Greater)
    }

    pub fn ends(&self, other: &Interval) -> Option<bool> {
        let hh = compare_endpoint(&self.high, &other.high)?;
        let ll = compare_endpoint(&self.low, &other.low)?;
        Some(hh == Ordering::Equal && ll != Ordering::Less)
    }

    pub fn during(&self, other: &Interval) -> Option<bool> {
        let ll = compare_endpoint(&self.low, &other.low)?;
        let hh = compare_endpoint(&self.high, &other.high)?;
        Some(ll != Ordering::Less && hh != Ordering::Greater)
    }

    pub fn includes(&self, other: &Interval) -> Option<bool> {
        other.during(self)
    }
}

/// The 13 Allen interval relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllenRelation {
    Before,
    After,
    Meets,
    MetBy,
    Overlaps,
    OverlappedBy,
    Starts,
    StartedBy,
    During,
    Contains,
    Finishes,
    FinishedBy,
    Equals,
}

fn compare_endpoint(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.is_null(), b.is_null()) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => a.compare(b).ok().flatten(),
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.low_closed { "[" } else { "(" },
            self.low,
            self.high,
            if self.high_closed { "]" } else { ")" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(low: i64, high: i64) -> Interval {
        Interval::new(Value::Integer(low), Value::Integer(high), true, true).unwrap()
    }

    #[test]
    fn rejects_low_greater_than_high() {
        assert!(Interval::new(Value::Integer(5), Value::Integer(1), true, true).is_err());
    }

    #[test]
    fn contains_point_respects_closed_bounds() {
        let i = closed(1, 10);
        assert_eq!(i.contains_point(&Value::Integer(1)), Some(true));
        assert_eq!(i.contains_point(&Value::Integer(10)), Some(true));
        assert_eq!(i.contains_point(&Value::Integer(11)), Some(false));
    }

    #[test]
    fn before_relation() {
        let a = closed(1, 5);
        let b = closed(10, 20);
        assert_eq!(a.before(&b), Some(true));
        assert_eq!(b.before(&a), Some(false));
    }

    #[test]
    fn overlaps_relation() {
        let a = closed(1, 10);
        let b = closed(5, 15);
        assert_eq!(a.overlaps(&b), Some(true));
    }

    #[test]
    fn during_and_includes_are_duals() {
        let inner = closed(3, 5);
        let outer = closed(1, 10);
        assert_eq!(inner.during(&outer), Some(true));
        assert_eq!(outer.includes(&inner), Some(true));
    }

    #[test]
    fn width_is_high_minus_low() {
        let i = closed(3, 10);
        assert_eq!(i.width(), Some(Value::Integer(7)));
    }

    #[test]
    fn unbounded_interval_has_no_width() {
        let i = Interval::new(Value::Null, Value::Integer(10), true, true).unwrap();
        assert_eq!(i.width(), None);
    }

    #[test]
    fn unbounded_endpoints_compare_as_extremes() {
        let unbounded_low = Interval::new(Value::Null, Value::Integer(10), true, true).unwrap();
        assert_eq!(unbounded_low.contains_point(&Value::Integer(-1000)), Some(true));
    }
}
