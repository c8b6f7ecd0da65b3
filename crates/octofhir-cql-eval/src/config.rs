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

//! Bounds on one evaluation: recursion depth, collection size, and the
//! cooperative cancellation flag every long-running step consults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// `ExpressionRef` resolution nests no deeper than this before
    /// [`crate::error::EvalError::RecursionLimit`] fires.
    pub max_recursion_depth: usize,
    /// A single list-producing node refuses to materialize past this many
    /// elements.
    pub max_collection_size: usize,
    /// Advisory only; the core never starts a clock itself —
    /// a host checks elapsed time against this and sets `cancel` when it
    /// expires.
    pub timeout_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 256,
            max_collection_size: 1_000_000,
            timeout_ms: 30_000,
        }
    }
}

/// A cooperative cancellation flag, shared by `Arc` across everything one
/// evaluation touches. Checked on entry to every `ExpressionRef`, query
/// iteration step, and retrieve call; never polled by a timer
/// inside the core itself.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
