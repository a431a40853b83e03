//! Pipeline state shared between CI steps
//!
//! [PipelineStore] layers two behaviours over the [KvStore] file:
//! memoizing expensive steps by name ([PipelineStore::cache]) and handing
//! values to later steps ([PipelineStore::export_values], in `export.rs`).

pub mod export;
pub mod store;

pub use export::ExportMode;
pub use store::{KvStore, CACHE_REGION, ENV_VARS_REGION, RESULTS_REGION};

use crate::boundary::BoundaryWarning;
use crate::ci::CiEnvironment;
use crate::error::{RelgateError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, Span};

/// Memoizing, exporting view over one store file
///
/// No cross-process locking: steps sharing a store file must run one after
/// another.
pub struct PipelineStore {
    store: KvStore,
    env: CiEnvironment,
    memo: Mutex<HashMap<String, Value>>,
    span: Span,
}

impl PipelineStore {
    /// Open the store, replacing a file that does not parse with an empty one
    ///
    /// Read failures are returned; the file is left in place.
    pub fn open(store: KvStore, env: CiEnvironment) -> Result<Self> {
        if let Some(reason) = store.corruption()? {
            BoundaryWarning::CacheCorrupted {
                path: store.path().display().to_string(),
                reason,
            }
            .emit();
            store.reset()?;
        }

        Ok(PipelineStore {
            store,
            env,
            memo: Mutex::new(HashMap::new()),
            span: tracing::info_span!("pipeline_store"),
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn env(&self) -> &CiEnvironment {
        &self.env
    }

    /// Return the stored result for `name`, or run `compute` and store it
    ///
    /// `compute` runs at most once per name for the lifetime of this value.
    /// Nothing is written when `compute` fails.
    pub fn cache<T, F>(&self, name: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let _guard = self.span.enter();

        if let Some(cached) = self.cached(name)? {
            return Ok(cached);
        }

        info!(name, "cache miss, computing");
        let result = compute()?;

        let value = serde_json::to_value(&result)
            .map_err(|e| RelgateError::cache_io(format!("cannot encode '{}': {}", name, e)))?;
        self.store.save(CACHE_REGION, name, &value)?;
        self.memo_put(name, value)?;

        Ok(result)
    }

    /// Stored value for `name`, decoded as `T`
    ///
    /// An entry of another shape is dropped and reported as a miss.
    fn cached<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let value = match self.memo_get(name)? {
            Some(value) => {
                debug!(name, "cache hit (memory)");
                value
            }
            None => match self.store.load::<Value>(CACHE_REGION, name)? {
                Some(value) => {
                    debug!(name, "cache hit");
                    self.memo_put(name, value.clone())?;
                    value
                }
                None => return Ok(None),
            },
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                BoundaryWarning::CacheEntryDiscarded {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
                .emit();
                self.invalidate(name)?;
                Ok(None)
            }
        }
    }

    /// Forget a cached result so the next `cache` call recomputes it
    pub fn invalidate(&self, name: &str) -> Result<bool> {
        self.memo_lock()?.remove(name);
        self.store.remove(CACHE_REGION, name)
    }

    fn memo_lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.memo
            .lock()
            .map_err(|_| RelgateError::cache_io("memo lock poisoned"))
    }

    fn memo_get(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.memo_lock()?.get(name).cloned())
    }

    fn memo_put(&self, name: &str, value: Value) -> Result<()> {
        self.memo_lock()?.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> PipelineStore {
        let store = KvStore::new(dir.path().join("pipeline.json"));
        PipelineStore::open(store, CiEnvironment::default()).unwrap()
    }

    #[test]
    fn test_compute_runs_once() {
        let dir = TempDir::new().unwrap();
        let pipeline = open(&dir);
        let calls = Cell::new(0);

        let compute = || {
            calls.set(calls.get() + 1);
            Ok(vec!["a".to_string(), "b".to_string()])
        };
        let first: Vec<String> = pipeline.cache("artifacts", compute).unwrap();
        let second: Vec<String> = pipeline
            .cache("artifacts", || {
                calls.set(calls.get() + 1);
                Ok(vec![])
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_survives_reopen() {
        let dir = TempDir::new().unwrap();
        open(&dir).cache("n", || Ok(7u32)).unwrap();

        let value: u32 = open(&dir)
            .cache("n", || panic!("should not recompute"))
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_failed_compute_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = open(&dir);

        let err = pipeline
            .cache::<u32, _>("flaky", || Err(RelgateError::build("build.sh", "linux/amd64", "boom")))
            .unwrap_err();
        assert!(matches!(err, RelgateError::Build { .. }));

        let stored: Option<u32> = pipeline.store().load(CACHE_REGION, "flaky").unwrap();
        assert_eq!(stored, None);
        assert_eq!(pipeline.cache("flaky", || Ok(3u32)).unwrap(), 3);
    }

    #[test]
    fn test_corrupt_store_degrades_to_recompute() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pipeline.json"), "garbage").unwrap();

        let pipeline = open(&dir);
        assert_eq!(pipeline.cache("x", || Ok("fresh".to_string())).unwrap(), "fresh");
    }

    #[test]
    fn test_mistyped_entry_is_recomputed() {
        let dir = TempDir::new().unwrap();
        let pipeline = open(&dir);
        pipeline
            .store()
            .save(CACHE_REGION, "build:tree:v1.0.0:linux-amd64", &"old shape")
            .unwrap();

        let value: Vec<u32> = pipeline
            .cache("build:tree:v1.0.0:linux-amd64", || Ok(vec![1, 2]))
            .unwrap();
        assert_eq!(value, vec![1, 2]);

        let stored: Option<Vec<u32>> = pipeline
            .store()
            .load(CACHE_REGION, "build:tree:v1.0.0:linux-amd64")
            .unwrap();
        assert_eq!(stored, Some(vec![1, 2]));
    }

    #[test]
    fn test_mistyped_memo_entry_is_recomputed() {
        let dir = TempDir::new().unwrap();
        let pipeline = open(&dir);
        pipeline.cache("n", || Ok("text".to_string())).unwrap();

        assert_eq!(pipeline.cache("n", || Ok(5u32)).unwrap(), 5);
        assert_eq!(pipeline.cache("n", || Ok(9u32)).unwrap(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_store_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::create_dir(&path).unwrap();

        let result = PipelineStore::open(KvStore::new(&path), CiEnvironment::default());
        assert!(matches!(result, Err(RelgateError::CacheIo(_))));
        assert!(path.is_dir());
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let dir = TempDir::new().unwrap();
        let pipeline = open(&dir);
        pipeline.cache("k", || Ok(1u32)).unwrap();
        assert!(pipeline.invalidate("k").unwrap());
        assert_eq!(pipeline.cache("k", || Ok(2u32)).unwrap(), 2);
    }
}
