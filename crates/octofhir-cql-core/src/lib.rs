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

//! Value model, temporal kernel, UCUM unit engine, and interval algebra
//! shared by every stage of the CQL toolchain.

pub mod error;
pub mod interval;
pub mod quantity;
pub mod temporal;
pub mod value;

pub use error::{CoreError, Result};
pub use interval::{AllenRelation, Interval};
pub use quantity::{Quantity, Ratio, CONVERSION_SCALE};
pub use temporal::{
    calendar_months_between, calendar_years_between, elapsed_days_between, Precision, PrecisionDate,
    PrecisionDateTime, PrecisionTime, TemporalUnit,
};
pub use value::{kleene, Code, Concept, Kind, Tuple, Value};
