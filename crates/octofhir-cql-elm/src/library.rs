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

//! The compiled [`ElmLibrary`]: an immutable artifact produced by lowering,
//! cached by the library manager, and never mutated after creation.

use crate::node::ElmNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmLibraryIdentifier {
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmUsing {
    pub model: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmInclude {
    pub name: String,
    pub version: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmParameterDef {
    pub name: String,
    pub declared_type: Option<String>,
    pub default: Option<ElmNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmCodeSystemDef {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmValuesetDef {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmCodeDef {
    pub name: String,
    pub code: String,
    pub system: String,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmConceptDef {
    pub name: String,
    pub codes: Vec<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmContextDef {
    pub name: String,
}

/// Parameter declared by a `define function` (its type is advisory; the
/// evaluator does not enforce structural typing beyond overload resolution
/// already performed during lowering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmFunctionParameter {
    pub name: String,
    pub declared_type: Option<String>,
}

/// One `define`d statement: an expression or a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmStatement {
    pub name: String,
    pub context: String,
    pub is_public: bool,
    pub function_params: Option<Vec<ElmFunctionParameter>>,
    pub expression: ElmNode,
}

impl ElmStatement {
    pub fn is_function(&self) -> bool {
        self.function_params.is_some()
    }
}

/// The compiled, immutable library artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ElmLibrary {
    pub identifier: Option<ElmLibraryIdentifier>,
    pub usings: Vec<ElmUsing>,
    pub includes: Vec<ElmInclude>,
    pub parameters: Vec<ElmParameterDef>,
    pub code_systems: Vec<ElmCodeSystemDef>,
    pub valuesets: Vec<ElmValuesetDef>,
    pub codes: Vec<ElmCodeDef>,
    pub concepts: Vec<ElmConceptDef>,
    pub contexts: Vec<ElmContextDef>,
    pub statements: Vec<ElmStatement>,
}

impl ElmLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement(&self, name: &str) -> Option<&ElmStatement> {
        self.statements.iter().find(|s| s.name == name)
    }
}
