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

//! The library manager: compiles CQL source into cached, immutable
//! [`ElmLibrary`](octofhir_cql_elm::ElmLibrary) artifacts and resolves
//! `include` declarations into a transitively-closed, qualified view of
//! their definitions.

pub mod compiled;
pub mod error;
pub mod manager;
pub mod provider;

pub use compiled::CompiledLibrary;
pub use error::{LibraryError, LibraryResult};
pub use manager::{LibraryManager, LibraryManagerStats};
pub use provider::{InMemoryLibraryProvider, LibraryProvider};
