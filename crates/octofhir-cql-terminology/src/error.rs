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

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TerminologyError {
    #[error("value set not found: {url}")]
    UnknownValueSet { url: String },

    #[error("malformed value set resource: {reason}")]
    MalformedValueSet { reason: String },

    #[error("remote terminology service not reachable in-process: {url}")]
    RemoteUnavailable { url: String },
}

pub type TerminologyResult<T> = Result<T, TerminologyError>;
