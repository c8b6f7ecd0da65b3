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

//! The compile-cache payload: an [`ElmLibrary`] plus the transitively
//! visible, qualified view of its includes' definitions — evaluation sees
//! the transitively-closed list of definitions with qualified names
//! `X.DefName`.

use octofhir_cql_elm::{ElmLibrary, ElmStatement};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct CompiledLibrary {
    pub elm: ElmLibrary,
    qualified: FxHashMap<String, ElmStatement>,
}

impl CompiledLibrary {
    pub(crate) fn new(elm: ElmLibrary, qualified: FxHashMap<String, ElmStatement>) -> Self {
        Self { elm, qualified }
    }

    pub fn name(&self) -> Option<&str> {
        self.elm.identifier.as_ref().map(|id| id.id.as_str())
    }

    pub fn version(&self) -> Option<&str> {
        self.elm.identifier.as_ref().and_then(|id| id.version.as_deref())
    }

    /// Looks up one of this library's own `define`d statements by its bare name.
    pub fn statement(&self, name: &str) -> Option<&ElmStatement> {
        self.elm.statement(name)
    }

    /// Looks up a statement reached through an `include`d library, qualified
    /// as `Alias.DefName`.
    pub fn qualified_statement(&self, qualified_name: &str) -> Option<&ElmStatement> {
        self.qualified.get(qualified_name)
    }

    /// Every qualified name this library can see through its includes.
    pub fn qualified_names(&self) -> impl Iterator<Item = &str> {
        self.qualified.keys().map(|s| s.as_str())
    }

    /// The `ElmLibrary` an `EvaluationContext` can be built from directly:
    /// this library's own statements plus every include's definitions,
    /// appended under their qualified `Alias.DefName`, so
    /// `octofhir-cql-eval`'s tree-walker can resolve a cross-library
    /// `ExpressionRef`/`FunctionRef` with a plain name lookup.
    pub fn flatten(&self) -> ElmLibrary {
        let mut flat = self.elm.clone();
        for (qualified_name, statement) in &self.qualified {
            let mut statement = statement.clone();
            statement.name = qualified_name.clone();
            flat.statements.push(statement);
        }
        flat
    }
}
