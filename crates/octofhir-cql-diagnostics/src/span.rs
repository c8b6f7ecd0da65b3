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

//! Source location tracking.

use std::fmt;

/// A byte-offset span in source text, with the 1-based line/column of its
/// start for human-readable diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub col: u32,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize, line: u32, col: u32) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    pub fn point(pos: usize, line: u32, col: u32) -> Self {
        Self::new(pos, pos, line, col)
    }

    /// Merge two spans into the smallest span that contains both.
    pub fn merge(self, other: Self) -> Self {
        if self.start <= other.start {
            Self::new(self.start, self.end.max(other.end), self.line, self.col)
        } else {
            other.merge(self)
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
