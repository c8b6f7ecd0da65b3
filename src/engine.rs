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

//! [`CqlEngine`]: the facade wiring every pipeline crate together behind
//! the four core operations (`compile`, `evaluate_expression`,
//! `evaluate_definition`, `evaluate_all`), plus measure evaluation.
//! An engine instance owns its library cache, `DataSource`, and
//! `TerminologyService` — there is no global mutable state.

use crate::error::{CqlError, CqlResult};
use indexmap::IndexMap;
use octofhir_cql_core::Value;
use octofhir_cql_elm::ElmLibrary;
use octofhir_cql_eval::{eval_node, DataSource, EvaluationConfig, EvaluationContext};
use octofhir_cql_library::{CompiledLibrary, LibraryManager, LibraryProvider};
use octofhir_cql_measure::{evaluate_measure, MeasureDefinition, MeasureReport};
use octofhir_cql_terminology::TerminologyService;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The synthetic definition name an ad hoc expression is compiled under.
/// Quoted so it can never collide with a source-declared identifier, which
/// CQL's grammar doesn't allow to contain leading/trailing underscores.
const EXPRESSION_SLOT: &str = "__expr__";

pub struct CqlEngine {
    manager: LibraryManager,
    data_source: Arc<dyn DataSource>,
    terminology: Arc<dyn TerminologyService>,
    config: EvaluationConfig,
}

impl CqlEngine {
    pub fn new(
        provider: Arc<dyn LibraryProvider>,
        data_source: Arc<dyn DataSource>,
        terminology: Arc<dyn TerminologyService>,
    ) -> Self {
        Self {
            manager: LibraryManager::new(provider),
            data_source,
            terminology,
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    /// Compiles `source` to a cached, immutable library, resolving its
    /// `include`s transitively. Diagnostics from a failing parse or lowering
    /// pass surface through [`CqlError::Library`].
    pub fn compile(&self, source: &str) -> CqlResult<Arc<CompiledLibrary>> {
        Ok(self.manager.compile(source)?)
    }

    /// Evaluates a single FHIRPath/CQL expression with no surrounding
    /// library declarations, by compiling it as the sole `define` of an
    /// anonymous library so it goes through the same cache and lowering
    /// pipeline as any other definition.
    pub fn evaluate_expression(
        &self,
        source: &str,
        resource: Option<serde_json::Value>,
        params: Option<FxHashMap<String, Value>>,
    ) -> CqlResult<Value> {
        let wrapped = format!("define \"{EXPRESSION_SLOT}\": {source}");
        let library = self.compile(&wrapped)?;
        self.evaluate_definition(&library, EXPRESSION_SLOT, resource, params)
    }

    /// Evaluates one named `define` from a compiled library against
    /// `resource`, with `params` bound as CQL parameter values.
    pub fn evaluate_definition(
        &self,
        library: &CompiledLibrary,
        name: &str,
        resource: Option<serde_json::Value>,
        params: Option<FxHashMap<String, Value>>,
    ) -> CqlResult<Value> {
        let flat = Arc::new(library.flatten());
        let statement = flat
            .statement(name)
            .ok_or_else(|| CqlError::UnknownDefinition(name.to_string()))?;
        let ctx = self.context_for(Arc::clone(&flat), resource, params);
        Ok(eval_node(&statement.expression, &ctx)?)
    }

    /// Evaluates every public, non-function definition in `library`,
    /// preserving source declaration order.
    pub fn evaluate_all(
        &self,
        library: &CompiledLibrary,
        resource: Option<serde_json::Value>,
        params: Option<FxHashMap<String, Value>>,
    ) -> CqlResult<IndexMap<String, Value>> {
        let flat = Arc::new(library.flatten());
        let ctx = self.context_for(Arc::clone(&flat), resource, params);
        let mut results = IndexMap::new();
        for statement in flat.statements.iter().filter(|s| s.is_public && !s.is_function()) {
            let value = eval_node(&statement.expression, &ctx)?;
            results.insert(statement.name.clone(), value);
        }
        Ok(results)
    }

    /// Runs a measure `definition` over `cohort` against `library`,
    /// isolating per-subject evaluation failures into the resulting report
    /// rather than propagating them.
    pub fn evaluate_measure(
        &self,
        library: &CompiledLibrary,
        definition: &MeasureDefinition,
        cohort: &[Value],
    ) -> MeasureReport {
        let flat = Arc::new(library.flatten());
        evaluate_measure(
            definition,
            flat,
            cohort,
            Arc::clone(&self.data_source),
            Arc::clone(&self.terminology),
            self.config.clone(),
        )
    }

    fn context_for(
        &self,
        library: Arc<ElmLibrary>,
        resource: Option<serde_json::Value>,
        params: Option<FxHashMap<String, Value>>,
    ) -> EvaluationContext {
        let input = resource.map(Value::Resource).unwrap_or(Value::Null);
        let ctx = EvaluationContext::new(input, library, Arc::clone(&self.data_source), Arc::clone(&self.terminology))
            .with_config(self.config.clone());
        match params {
            Some(p) => ctx.with_parameters(p),
            None => ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_eval::InMemoryDataSource;
    use octofhir_cql_library::InMemoryLibraryProvider;
    use octofhir_cql_terminology::InMemoryTerminologyService;

    fn engine() -> CqlEngine {
        CqlEngine::new(
            Arc::new(InMemoryLibraryProvider::new()),
            Arc::new(InMemoryDataSource::default()),
            Arc::new(InMemoryTerminologyService::default()),
        )
    }

    #[test]
    fn evaluate_expression_runs_an_ad_hoc_arithmetic_expression() {
        let result = engine().evaluate_expression("2 + 3", None, None).unwrap();
        assert_eq!(result, Value::Integer(5));
    }

    #[test]
    fn evaluate_definition_runs_a_named_define_from_a_compiled_library() {
        let engine = engine();
        let library = engine.compile("library Test version '1.0.0'\ndefine Answer: 40 + 2").unwrap();
        let result = engine.evaluate_definition(&library, "Answer", None, None).unwrap();
        assert_eq!(result, Value::Integer(42));
    }

    #[test]
    fn evaluate_all_collects_every_public_definition_in_source_order() {
        let engine = engine();
        let library = engine
            .compile("library Test version '1.0.0'\ndefine First: 1\ndefine Second: 2")
            .unwrap();
        let results = engine.evaluate_all(&library, None, None).unwrap();
        let names: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn unknown_definition_name_is_reported() {
        let engine = engine();
        let library = engine.compile("library Test version '1.0.0'\ndefine Answer: 1").unwrap();
        let err = engine.evaluate_definition(&library, "Missing", None, None).unwrap_err();
        assert!(matches!(err, CqlError::UnknownDefinition(name) if name == "Missing"));
    }
}
