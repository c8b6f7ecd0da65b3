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

//! Tokenizer and parser turning FHIRPath/CQL source text into
//! `octofhir_cql_ast` trees.
//!
//! Parsing never fails outright: [`parse_expression`] and [`parse_library`]
//! always return a tree, accompanied by a [`Diagnostics`] list that is empty
//! on full success. A lexer failure (unclosed string, malformed number) is
//! the only case reported as a hard [`error::ParseError`], since no
//! reasonable token stream exists past that point.

pub mod error;
pub mod lexer;
pub mod parser;

pub use error::{ParseError, ParseResult};
pub use lexer::{SpannedToken, Token, Tokenizer};
pub use octofhir_cql_diagnostics::Diagnostics;
pub use parser::{parse_expression, parse_library, Parser};
