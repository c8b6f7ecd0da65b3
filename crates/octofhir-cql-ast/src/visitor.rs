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

//! A walking visitor over [`ExpressionNode`] trees, used by the lowering
//! pass's collect phase and by diagnostics tooling that needs to find every
//! sub-expression of a kind without hand-rolling the traversal each time.

use crate::expression::ExpressionNode;

pub trait ExpressionVisitor {
    fn visit(&mut self, node: &ExpressionNode) {
        walk(self, node);
    }
}

/// Default traversal: visits every child of `node`, in source order.
pub fn walk<V: ExpressionVisitor + ?Sized>(visitor: &mut V, node: &ExpressionNode) {
    use ExpressionNode::*;
    match node {
        Literal(_) | Identifier(_) | QualifiedIdentifier { .. } | Variable(_) | ParameterRef(_) => {}
        Path { base, .. } => visitor.visit(base),
        BinaryOp(data) => {
            visitor.visit(&data.left);
            visitor.visit(&data.right);
        }
        UnaryOp { operand, .. } => visitor.visit(operand),
        FunctionCall(data) => {
            for arg in &data.args {
                visitor.visit(&arg.value);
            }
        }
        MethodCall(data) => {
            visitor.visit(&data.base);
            for arg in &data.args {
                visitor.visit(&arg.value);
            }
        }
        Index { base, index } => {
            visitor.visit(base);
            visitor.visit(index);
        }
        TypeCheck { expression, .. } | TypeCast { expression, .. } => visitor.visit(expression),
        Lambda(data) => visitor.visit(&data.body),
        Conditional(data) => {
            visitor.visit(&data.condition);
            visitor.visit(&data.then_expr);
            visitor.visit(&data.else_expr);
        }
        Case(data) => {
            if let Some(selector) = &data.selector {
                visitor.visit(selector);
            }
            for item in &data.items {
                visitor.visit(&item.when);
                visitor.visit(&item.then);
            }
            visitor.visit(&data.else_expr);
        }
        TupleLiteral(fields) => {
            for (_, value) in fields {
                visitor.visit(value);
            }
        }
        ListLiteral { elements, .. } => {
            for element in elements {
                visitor.visit(element);
            }
        }
        IntervalLiteral(data) => {
            visitor.visit(&data.low);
            visitor.visit(&data.high);
        }
        Retrieve(data) => {
            if let Some(filter) = &data.code_filter {
                visitor.visit(filter);
            }
        }
        Query(data) => {
            for source in &data.sources {
                visitor.visit(&source.expression);
            }
            for rel in &data.relationships {
                visitor.visit(&rel.source.expression);
                visitor.visit(&rel.condition);
            }
            for let_clause in &data.lets {
                visitor.visit(&let_clause.expression);
            }
            if let Some(where_clause) = &data.where_clause {
                visitor.visit(where_clause);
            }
            if let Some(return_clause) = &data.return_clause {
                visitor.visit(return_clause);
            }
            if let Some(aggregate) = &data.aggregate_clause {
                if let Some(starting) = &aggregate.starting {
                    visitor.visit(starting);
                }
                visitor.visit(&aggregate.body);
            }
            for sort_item in &data.sort {
                visitor.visit(&sort_item.expression);
            }
        }
        Exists(inner) => visitor.visit(inner),
    }
}

/// Collects every identifier referenced anywhere in an expression tree.
#[derive(Default)]
pub struct IdentifierCollector {
    pub names: Vec<String>,
}

impl ExpressionVisitor for IdentifierCollector {
    fn visit(&mut self, node: &ExpressionNode) {
        if let ExpressionNode::Identifier(name) = node {
            self.names.push(name.clone());
        }
        walk(self, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::BinaryOperator;

    #[test]
    fn collects_identifiers_from_nested_expression() {
        let expr = ExpressionNode::binary_op(
            BinaryOperator::And,
            ExpressionNode::identifier("active"),
            ExpressionNode::path(ExpressionNode::identifier("Patient"), "deceased"),
        );
        let mut collector = IdentifierCollector::default();
        collector.visit(&expr);
        assert_eq!(collector.names, vec!["active".to_string(), "Patient".to_string()]);
    }
}
