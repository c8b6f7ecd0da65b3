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

//! Top-level CQL library structure: the declarations that precede
//! expression/function definitions in source order but are collected
//! independently of it (forward references are legal).

use crate::expression::ExpressionNode;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryIdentifier {
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsingDef {
    pub model: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncludeDef {
    pub name: String,
    pub version: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterDef {
    pub name: String,
    pub declared_type: Option<String>,
    pub default: Option<ExpressionNode>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeSystemDef {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValuesetDef {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
    pub code_systems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeDef {
    pub name: String,
    pub code: String,
    pub system: String,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConceptDef {
    pub name: String,
    pub codes: Vec<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextDef {
    pub name: String,
}

/// `define [access] Name: expression` or `context Name define Name: expr`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionDef {
    pub name: String,
    pub context: Option<String>,
    pub is_public: bool,
    pub expression: ExpressionNode,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionParameter {
    pub name: String,
    pub declared_type: Option<String>,
}

/// `define function Name(params): body`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionDef {
    pub name: String,
    pub context: Option<String>,
    pub is_public: bool,
    pub params: Vec<FunctionParameter>,
    pub body: ExpressionNode,
}

/// The full parsed library: all declarations plus definitions, in source
/// order. Name resolution across declarations is the lowering pass's job,
/// not the parser's.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryAst {
    pub identifier: Option<LibraryIdentifier>,
    pub usings: Vec<UsingDef>,
    pub includes: Vec<IncludeDef>,
    pub parameters: Vec<ParameterDef>,
    pub code_systems: Vec<CodeSystemDef>,
    pub valuesets: Vec<ValuesetDef>,
    pub codes: Vec<CodeDef>,
    pub concepts: Vec<ConceptDef>,
    pub contexts: Vec<ContextDef>,
    pub expressions: Vec<ExpressionDef>,
    pub functions: Vec<FunctionDef>,
}

impl LibraryAst {
    pub fn new() -> Self {
        Self::default()
    }
}
