//! The routine repository.
//!
//! A [`Provider`] collects named routines from tagged `.sql` files and hands
//! them out as [`Query`] values. Routine names are unique across everything
//! a provider has loaded: the first definition wins and any later one
//! aborts the load.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::fs::FileSystem;
use crate::scanner;
use crate::statement::Query;
use crate::value::{Params, Value};

/// Named routines loaded from tagged SQL.
#[derive(Debug, Default)]
pub struct Provider {
    routines: Mutex<BTreeMap<String, String>>,
}

impl Provider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.sql` file under the root of `fs`, in walk order.
    ///
    /// Returns the number of routines loaded.
    pub fn read_dir(&self, fs: &dyn FileSystem) -> Result<u64> {
        let mut files: Vec<PathBuf> = Vec::new();
        fs.walk(Path::new(""), &mut |path, info| {
            if info.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                files.push(path.to_path_buf());
            }
            Ok(())
        })?;

        let mut total = 0;
        for path in files {
            let count = self.read_from(BufReader::new(fs.open(&path)?))?;
            debug!(file = %path.display(), routines = count, "loaded routine file");
            total += count;
        }
        Ok(total)
    }

    /// Loads routines from one tagged-SQL stream.
    ///
    /// Nothing is added when the stream repeats a name, within itself or
    /// against routines already loaded.
    pub fn read_from<R: BufRead>(&self, reader: R) -> Result<u64> {
        let scanned = scanner::scan(reader)?;
        let mut routines = self.lock();

        let mut seen = std::collections::BTreeSet::new();
        for (name, _) in &scanned {
            if routines.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(CoreError::DuplicateRoutine(name.clone()));
            }
        }

        let count = scanned.len() as u64;
        routines.extend(scanned);
        Ok(count)
    }

    /// Body of the routine called `name`.
    pub fn get(&self, name: &str) -> Result<String> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::RoutineNotFound(name.to_string()))
    }

    /// A positional query for routine `name`.
    pub fn query(&self, name: &str, args: Vec<Value>) -> Result<Query> {
        Ok(Query::sql(self.get(name)?, args))
    }

    /// A named query for routine `name`, bound from the fields of `record`.
    pub fn named_query<T: Serialize + ?Sized>(&self, name: &str, record: &T) -> Result<Query> {
        Query::named_from(self.get(name)?, record)
    }

    /// A named query for routine `name`, bound from `params`.
    pub fn named_query_with(&self, name: &str, params: Params) -> Result<Query> {
        Ok(Query::named(self.get(name)?, params))
    }

    /// Names of every loaded routine, sorted.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.routines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
