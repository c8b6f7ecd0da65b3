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

//! Error types for the value model, temporal kernel, unit engine, and
//! interval algebra.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("type mismatch in {op}: expected {expected}, found {actual}")]
    TypeMismatch {
        op: String,
        expected: String,
        actual: String,
    },

    #[error("incompatible units: cannot convert {from} to {to}")]
    IncompatibleUnits { from: String, to: String },

    #[error("unknown unit: {code}")]
    UnknownUnit { code: String },

    #[error("invalid interval: {reason}")]
    InvalidInterval { reason: String },

    #[error("overflow in {op}")]
    Overflow { op: String },

    #[error("division by zero")]
    DivisionByZero,
}

impl CoreError {
    pub fn type_mismatch(
        op: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            op: op.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn incompatible_units(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::IncompatibleUnits {
            from: from.into(),
            to: to.into(),
        }
    }
}
