//! Library catalog
//!
//! Static `name -> definition` table. Construction rejects duplicate names,
//! dependencies on unknown libraries and dependency cycles, so every name the
//! loader resolves has a finite, well-founded dependency tree.

use crate::config::LibraryDefinition;
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Validated library catalog
#[derive(Debug, Clone)]
pub struct LibraryCatalog {
    definitions: HashMap<String, LibraryDefinition>,
    names: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl LibraryCatalog {
    /// Build and validate a catalog.
    pub fn new(definitions: Vec<LibraryDefinition>) -> Result<Self> {
        let mut map = HashMap::with_capacity(definitions.len());
        let mut names = Vec::with_capacity(definitions.len());

        for def in definitions {
            if def.name.trim().is_empty() {
                return Err(Error::Config("library with empty name in catalog".to_string()));
            }
            if map.contains_key(&def.name) {
                return Err(Error::Config(format!(
                    "library '{}' is defined twice",
                    def.name
                )));
            }
            names.push(def.name.clone());
            map.insert(def.name.clone(), def);
        }

        for def in map.values() {
            for dep in &def.dependencies {
                if !map.contains_key(dep) {
                    return Err(Error::Config(format!(
                        "library '{}' depends on unknown library '{}'",
                        def.name, dep
                    )));
                }
            }
        }

        let catalog = Self {
            definitions: map,
            names,
        };

        {
            let mut marks = HashMap::new();
            for name in &catalog.names {
                catalog.check_acyclic(name, &mut marks, &mut Vec::new())?;
            }
        }

        Ok(catalog)
    }

    fn check_acyclic<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                path.push(name);
                return Err(Error::Config(format!(
                    "library dependency cycle: {}",
                    path.join(" -> ")
                )));
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        path.push(name);
        if let Some(def) = self.definitions.get(name) {
            for dep in &def.dependencies {
                self.check_acyclic(dep, marks, path)?;
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Option<&LibraryDefinition> {
        self.definitions.get(name)
    }

    /// Whether the catalog knows a library
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Library names in catalog order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Definitions for `names` plus their transitive dependencies, each once,
    /// dependencies before dependents.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<LibraryDefinition>> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for name in names {
            self.visit(name, &mut seen, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        ordered: &mut Vec<LibraryDefinition>,
    ) -> Result<()> {
        if seen.contains(name) {
            return Ok(());
        }
        let def = self.get(name).ok_or_else(|| Error::LibraryLoadFailed {
            name: name.to_string(),
            reason: "not in catalog".to_string(),
        })?;
        seen.insert(name.to_string());
        for dep in &def.dependencies {
            self.visit(dep, seen, ordered)?;
        }
        ordered.push(def.clone());
        Ok(())
    }
}
