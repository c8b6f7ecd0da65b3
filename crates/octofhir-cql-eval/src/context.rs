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

//! The per-evaluation context threaded through the tree-walker: the
//! current `$this`, the root subject resource, a copy-on-write variable
//! scope, and the shared services (`DataSource`, `TerminologyService`).
//!
//! One [`EvaluationContext`] is built per subject and never
//! shared across subjects — its memoization map and cancellation flag are
//! private to it. Cloning it to push a new scope frame is cheap: the
//! heavyweight fields (`library`, `data_source`, `terminology`, the
//! memoization map) are `Arc`-shared, only the small `variables` map is
//! copy-on-write.

use crate::config::{CancellationToken, EvaluationConfig};
use crate::datasource::DataSource;
use crate::operators::temporal;
use chrono::{DateTime, Local};
use octofhir_cql_elm::ElmLibrary;
use octofhir_cql_core::Value;
use octofhir_cql_terminology::TerminologyService;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct EvaluationContext {
    /// `$this` for the node currently being evaluated.
    pub input: Value,
    /// The subject resource the whole evaluation started from.
    pub root: Arc<Value>,
    variables: Arc<FxHashMap<String, Value>>,
    parameters: Arc<FxHashMap<String, Value>>,
    pub library: Arc<ElmLibrary>,
    pub data_source: Arc<dyn DataSource>,
    pub terminology: Arc<dyn TerminologyService>,
    pub config: Arc<EvaluationConfig>,
    pub cancel: CancellationToken,
    memo: Arc<Mutex<FxHashMap<String, Value>>>,
    /// `Today()`/`Now()`/`TimeOfDay()`'s shared clock reading, taken once
    /// and reused by every call within the evaluation this context (and
    /// its clones) belongs to.
    clock: Arc<Mutex<Option<DateTime<Local>>>>,
    depth: usize,
}

impl EvaluationContext {
    pub fn new(
        input: Value,
        library: Arc<ElmLibrary>,
        data_source: Arc<dyn DataSource>,
        terminology: Arc<dyn TerminologyService>,
    ) -> Self {
        let root = Arc::new(input.clone());
        Self {
            input,
            root,
            variables: Arc::new(FxHashMap::default()),
            parameters: Arc::new(FxHashMap::default()),
            library,
            data_source,
            terminology,
            config: Arc::new(EvaluationConfig::default()),
            cancel: CancellationToken::new(),
            memo: Arc::new(Mutex::new(FxHashMap::default())),
            clock: Arc::new(Mutex::new(None)),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_parameters(mut self, parameters: FxHashMap<String, Value>) -> Self {
        self.parameters = Arc::new(parameters);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A new context with `$this` replaced — navigating into a property or
    /// iterating a collection element.
    pub fn with_input(&self, input: Value) -> Self {
        Self {
            input,
            ..self.clone()
        }
    }

    /// Bind one variable (query alias, `let`, lambda `$this`/`$index`) on
    /// top of the current scope. Copy-on-write: only this context's map is
    /// cloned, siblings and the parent are untouched.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Self {
        let mut vars = (*self.variables).clone();
        vars.insert(name.into(), value);
        Self {
            variables: Arc::new(vars),
            ..self.clone()
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// One recursion level deeper (entering an `ExpressionRef`), erroring
    /// out if that exceeds the configured bound rather than overflowing the
    /// Rust call stack.
    pub fn enter(&self) -> Result<Self, crate::error::EvalError> {
        if self.depth >= self.config.max_recursion_depth {
            return Err(crate::error::EvalError::RecursionLimit {
                definition: String::new(),
                limit: self.config.max_recursion_depth,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }

    pub fn memoized(&self, key: &str) -> Option<Value> {
        self.memo.lock().get(key).cloned()
    }

    pub fn memoize(&self, key: impl Into<String>, value: Value) {
        self.memo.lock().insert(key.into(), value);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The wall-clock instant `Today()`/`Now()`/`TimeOfDay()` all read,
    /// sampled on first use and cached for the rest of the evaluation.
    fn clock_now(&self) -> DateTime<Local> {
        let mut guard = self.clock.lock();
        if let Some(instant) = *guard {
            return instant;
        }
        let instant = Local::now();
        *guard = Some(instant);
        instant
    }

    pub fn today(&self) -> Value {
        temporal::today_at(self.clock_now())
    }

    pub fn now(&self) -> Value {
        temporal::now_at(self.clock_now())
    }

    pub fn time_of_day(&self) -> Value {
        temporal::time_of_day_at(self.clock_now())
    }

    /// `Today()`'s date component alone, for callers (age calculations)
    /// that need a [`octofhir_cql_core::PrecisionDate`] rather than a
    /// [`Value`].
    pub fn today_date(&self) -> octofhir_cql_core::PrecisionDate {
        match temporal::today_at(self.clock_now()) {
            Value::Date(d) => d,
            _ => unreachable!("today_at always returns a Date"),
        }
    }
}
