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

//! The library manager: compiles CQL source to a cached, immutable
//! [`CompiledLibrary`], resolving `include` declarations against a
//! [`LibraryProvider`] and flattening their definitions into qualified
//! names.
//!
//! Two independent caches, matching the two keying schemes the design calls
//! for: a content-hash keyed cache so repeated `compile()` calls on
//! identical source text are free and automatically invalidate on any edit,
//! and a `(name, version)` keyed registry so `include` lookups find an
//! already-compiled library without re-parsing it.

use crate::compiled::CompiledLibrary;
use crate::error::{LibraryError, LibraryResult};
use crate::provider::LibraryProvider;
use dashmap::DashMap;
use octofhir_cql_elm::{lower_library, ElmError, ElmStatement};
use octofhir_cql_parser::parse_library;
use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn content_hash(source: &str) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    source.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Default)]
pub struct LibraryManagerStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct LibraryManager {
    provider: Arc<dyn LibraryProvider>,
    by_hash: DashMap<u64, Arc<CompiledLibrary>>,
    by_name: DashMap<(String, Option<String>), Arc<CompiledLibrary>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LibraryManager {
    pub fn new(provider: Arc<dyn LibraryProvider>) -> Self {
        Self {
            provider,
            by_hash: DashMap::new(),
            by_name: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> LibraryManagerStats {
        LibraryManagerStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Compiles `source`, resolving its includes transitively. Returns the
    /// cached artifact on a repeat call with identical source text.
    pub fn compile(&self, source: &str) -> LibraryResult<Arc<CompiledLibrary>> {
        self.compile_with_stack(source, &mut Vec::new())
    }

    /// Looks up an already-registered library by name/version without
    /// compiling anything, falling back to the provider when it hasn't been
    /// seen yet.
    pub fn resolve_named(&self, name: &str, version: Option<&str>) -> LibraryResult<Arc<CompiledLibrary>> {
        self.resolve_named_with_stack(name, version, &mut Vec::new())
    }

    fn compile_with_stack(&self, source: &str, stack: &mut Vec<String>) -> LibraryResult<Arc<CompiledLibrary>> {
        let hash = content_hash(source);
        if let Some(cached) = self.by_hash.get(&hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&cached));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let (ast, diagnostics) = parse_library(source);
        if diagnostics.has_errors() {
            return Err(LibraryError::Compile(diagnostics));
        }
        let (elm, diagnostics) = lower_library(&ast);
        if diagnostics.has_errors() {
            return Err(LibraryError::Compile(diagnostics));
        }

        let mut qualified: FxHashMap<String, ElmStatement> = FxHashMap::default();
        for include in &elm.includes {
            let included = self.resolve_named_with_stack(&include.name, include.version.as_deref(), stack)?;
            for statement in &included.elm.statements {
                qualified.insert(format!("{}.{}", include.alias, statement.name), statement.clone());
            }
        }

        let compiled = Arc::new(CompiledLibrary::new(elm, qualified));
        self.by_hash.insert(hash, Arc::clone(&compiled));
        if let Some(id) = &compiled.elm.identifier {
            self.by_name.insert((id.id.clone(), id.version.clone()), Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    fn resolve_named_with_stack(&self, name: &str, version: Option<&str>, stack: &mut Vec<String>) -> LibraryResult<Arc<CompiledLibrary>> {
        if let Some(cached) = self.lookup_by_name(name, version) {
            return Ok(cached);
        }
        if stack.iter().any(|n| n == name) {
            let mut cycle = stack.clone();
            cycle.push(name.to_string());
            return Err(ElmError::CyclicInclude(cycle).into());
        }
        let source = self
            .provider
            .source_for(name, version)
            .ok_or_else(|| ElmError::UnresolvedInclude { name: name.to_string(), version: version.map(String::from) })?;

        stack.push(name.to_string());
        let result = self.compile_with_stack(&source, stack);
        stack.pop();
        result
    }

    fn lookup_by_name(&self, name: &str, version: Option<&str>) -> Option<Arc<CompiledLibrary>> {
        if let Some(v) = version {
            if let Some(found) = self.by_name.get(&(name.to_string(), Some(v.to_string()))) {
                return Some(Arc::clone(&found));
            }
        }
        self.by_name.iter().find(|entry| entry.key().0 == name).map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryLibraryProvider;

    #[test]
    fn repeat_compile_of_identical_source_hits_the_cache() {
        let manager = LibraryManager::new(Arc::new(InMemoryLibraryProvider::new()));
        let source = "library Test version '1.0.0'\ndefine Answer: 42";
        manager.compile(source).unwrap();
        manager.compile(source).unwrap();
        let stats = manager.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn editing_source_bypasses_the_stale_cache_entry() {
        let manager = LibraryManager::new(Arc::new(InMemoryLibraryProvider::new()));
        manager.compile("library Test version '1.0.0'\ndefine Answer: 42").unwrap();
        manager.compile("library Test version '1.0.0'\ndefine Answer: 43").unwrap();
        assert_eq!(manager.stats().misses, 2);
    }

    #[test]
    fn unresolved_include_is_reported() {
        let manager = LibraryManager::new(Arc::new(InMemoryLibraryProvider::new()));
        let source = "library Main version '1.0.0'\ninclude Missing version '1.0.0' called M\ndefine Answer: 42";
        let err = manager.compile(source).unwrap_err();
        assert!(matches!(err, LibraryError::Elm(ElmError::UnresolvedInclude { .. })));
    }

    #[test]
    fn include_definitions_surface_under_their_qualified_alias() {
        let mut provider = InMemoryLibraryProvider::new();
        provider.add("Common", Some("1.0.0".into()), "library Common version '1.0.0'\ndefine Answer: 42");
        let manager = LibraryManager::new(Arc::new(provider));
        let source = "library Main version '1.0.0'\ninclude Common version '1.0.0' called C\ndefine Doubled: 2";
        let compiled = manager.compile(source).unwrap();
        assert!(compiled.qualified_statement("C.Answer").is_some());
    }

    #[test]
    fn cyclic_includes_are_rejected() {
        let mut provider = InMemoryLibraryProvider::new();
        provider.add("A", None, "library A\ninclude B called B\ndefine X: 1");
        provider.add("B", None, "library B\ninclude A called A\ndefine Y: 2");
        let manager = LibraryManager::new(Arc::new(provider));
        let err = manager.resolve_named("A", None).unwrap_err();
        assert!(matches!(err, LibraryError::Elm(ElmError::CyclicInclude(_))));
    }
}
