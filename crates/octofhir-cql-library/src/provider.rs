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

//! Source lookup for `include` statements, the library-manager analogue of
//! [`octofhir_cql_eval::DataSource`]: the manager never knows where library
//! source text lives, only how to ask for it by name and optional version.

use rustc_hash::FxHashMap;

/// Resolves an `include Name version 'x.y'` declaration to CQL source text.
pub trait LibraryProvider: Send + Sync {
    fn source_for(&self, name: &str, version: Option<&str>) -> Option<String>;
}

/// A provider backed by an in-process map, for embedded libraries and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibraryProvider {
    sources: FxHashMap<(String, Option<String>), String>,
}

impl InMemoryLibraryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, version: Option<String>, source: impl Into<String>) {
        self.sources.insert((name.into(), version), source.into());
    }
}

impl LibraryProvider for InMemoryLibraryProvider {
    fn source_for(&self, name: &str, version: Option<&str>) -> Option<String> {
        if let Some(v) = version {
            if let Some(src) = self.sources.get(&(name.to_string(), Some(v.to_string()))) {
                return Some(src.clone());
            }
        }
        // An include without a pinned version, or a version miss, falls back
        // to whatever single copy of the name the provider holds.
        self.sources
            .iter()
            .find(|((n, _), _)| n == name)
            .map(|(_, src)| src.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_and_version_match_wins() {
        let mut provider = InMemoryLibraryProvider::new();
        provider.add("Common", Some("1.0.0".into()), "library Common version '1.0.0'");
        assert!(provider.source_for("Common", Some("1.0.0")).is_some());
        assert!(provider.source_for("Missing", None).is_none());
    }

    #[test]
    fn unversioned_lookup_falls_back_to_any_registered_copy() {
        let mut provider = InMemoryLibraryProvider::new();
        provider.add("Common", Some("1.0.0".into()), "library Common version '1.0.0'");
        assert!(provider.source_for("Common", None).is_some());
    }
}
