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

//! Pass 1: walk the parsed [`LibraryAst`] building symbol tables. Unresolved
//! forward references are legal here — definitions may refer to
//! later-declared names.

use crate::error::ElmError;
use octofhir_cql_ast::LibraryAst;
use octofhir_cql_diagnostics::Diagnostics;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub enum DefinitionKind {
    Expression,
    Function,
}

#[derive(Debug, Clone)]
pub struct DefinitionEntry {
    pub kind: DefinitionKind,
    pub context: Option<String>,
}

/// Symbol tables built from a single library's declarations, consumed by
/// [`crate::lower::lower::lower_library`].
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub includes: FxHashMap<String, (String, Option<String>)>,
    pub parameters: FxHashMap<String, ()>,
    pub code_systems: FxHashMap<String, ()>,
    pub valuesets: FxHashMap<String, ()>,
    pub codes: FxHashMap<String, ()>,
    pub concepts: FxHashMap<String, ()>,
    pub definitions: FxHashMap<String, DefinitionEntry>,
}

/// Collect symbol tables from a library, emitting [`ElmError::DuplicateDefinition`]
/// diagnostics for any name declared more than once among expressions and
/// functions (both spaced and unspaced aliases
/// of the same logical name collide here too, since the parser keeps
/// whatever name the source used and this table compares literal strings —
/// alias normalization is the measure engine's job, C13).
pub fn collect(library: &LibraryAst) -> (SymbolTable, Diagnostics) {
    let mut table = SymbolTable::default();
    let mut diagnostics = Diagnostics::new();

    for include in &library.includes {
        table
            .includes
            .insert(include.alias.clone(), (include.name.clone(), include.version.clone()));
    }
    for parameter in &library.parameters {
        table.parameters.insert(parameter.name.clone(), ());
    }
    for cs in &library.code_systems {
        table.code_systems.insert(cs.name.clone(), ());
    }
    for vs in &library.valuesets {
        table.valuesets.insert(vs.name.clone(), ());
    }
    for code in &library.codes {
        table.codes.insert(code.name.clone(), ());
    }
    for concept in &library.concepts {
        table.concepts.insert(concept.name.clone(), ());
    }

    for expr_def in &library.expressions {
        if table.definitions.contains_key(&expr_def.name) {
            diagnostics.push(
                ElmError::DuplicateDefinition { name: expr_def.name.clone() }.into_diagnostic(),
            );
            continue;
        }
        table.definitions.insert(
            expr_def.name.clone(),
            DefinitionEntry { kind: DefinitionKind::Expression, context: expr_def.context.clone() },
        );
    }
    for func_def in &library.functions {
        if table.definitions.contains_key(&func_def.name) {
            diagnostics.push(
                ElmError::DuplicateDefinition { name: func_def.name.clone() }.into_diagnostic(),
            );
            continue;
        }
        table.definitions.insert(
            func_def.name.clone(),
            DefinitionEntry { kind: DefinitionKind::Function, context: func_def.context.clone() },
        );
    }

    (table, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_ast::{ExpressionDef, LiteralValue};
    use octofhir_cql_ast::ExpressionNode;

    #[test]
    fn duplicate_expression_names_are_flagged() {
        let mut library = LibraryAst::new();
        library.expressions.push(ExpressionDef {
            name: "X".to_string(),
            context: None,
            is_public: true,
            expression: ExpressionNode::literal(LiteralValue::Integer(1)),
        });
        library.expressions.push(ExpressionDef {
            name: "X".to_string(),
            context: None,
            is_public: true,
            expression: ExpressionNode::literal(LiteralValue::Integer(2)),
        });
        let (table, diagnostics) = collect(&library);
        assert_eq!(table.definitions.len(), 1);
        assert!(!diagnostics.is_empty());
    }
}
