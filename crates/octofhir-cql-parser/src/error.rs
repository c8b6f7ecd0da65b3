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

use octofhir_cql_diagnostics::SourceSpan;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("{reason} at {span}")]
    Lex { span: SourceSpan, reason: String },
    #[error("expected {expected}, found {found} at {span}")]
    UnexpectedToken {
        span: SourceSpan,
        expected: String,
        found: String,
    },
    #[error("unclosed string literal starting at {span}")]
    UnclosedString { span: SourceSpan },
    #[error("invalid escape sequence '{escape}' at {span}")]
    InvalidEscape { span: SourceSpan, escape: String },
    #[error("invalid number literal '{text}' at {span}")]
    InvalidNumber { span: SourceSpan, text: String },
    #[error("invalid date/time literal '{text}' at {span}")]
    InvalidDateTime { span: SourceSpan, text: String },
}

pub type ParseResult<T> = Result<T, ParseError>;
