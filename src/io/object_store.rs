use crate::types::{CoverageError, CoverageResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Read-only view of a bucketed, prefix-listable blob namespace
pub trait ObjectStore: Send + Sync {
    /// List every key in `bucket` starting with `prefix`
    ///
    /// A missing prefix is an empty listing. `CoverageError::BackendUnavailable`
    /// is reserved for a store that cannot be reached at all; any other error
    /// concerns this prefix only.
    fn list_keys(&self, bucket: &str, prefix: &str) -> CoverageResult<Vec<String>>;

    /// URI under which a listed object is reported and later opened
    fn object_uri(&self, bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, key)
    }

    /// Cheap check that `bucket` can be listed at all; an unusable backend
    /// reports `CoverageError::BackendUnavailable`
    fn check_access(&self, _bucket: &str) -> CoverageResult<()> {
        Ok(())
    }

    fn describe(&self) -> String;
}

/// Object store backed by a local mirror laid out as `<root>/<bucket>/<key>`
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> CoverageResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(CoverageError::BackendUnavailable(format!(
                "Local mirror root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_files(&path, base, out)?;
            } else if let Ok(relative) = path.strip_prefix(base) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn list_keys(&self, bucket: &str, prefix: &str) -> CoverageResult<Vec<String>> {
        let base = self.root.join(bucket);
        // Only the directory part of the prefix narrows the walk
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = if dir_part.is_empty() { base.clone() } else { base.join(dir_part) };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        Self::collect_files(&start, &base, &mut keys).map_err(|e| CoverageError::Listing {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            message: e.to_string(),
        })?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        self.root.join(bucket).join(key).display().to_string()
    }

    fn describe(&self) -> String {
        format!("local mirror {}", self.root.display())
    }
}

#[derive(Debug, Clone)]
enum InjectedFailure {
    Prefix { bucket: String, prefix: String },
    Unreachable,
}

/// In-memory snapshot of a store; listings come back in key order
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, BTreeSet<String>>,
    failures: Vec<InjectedFailure>,
    list_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, bucket: &str, key: &str) -> Self {
        self.insert(bucket, key);
        self
    }

    pub fn insert(&mut self, bucket: &str, key: &str) {
        self.objects
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string());
    }

    /// Make listings of exactly `prefix` fail as a per-prefix error
    pub fn fail_prefix(mut self, bucket: &str, prefix: &str) -> Self {
        self.failures.push(InjectedFailure::Prefix {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        });
        self
    }

    /// Make every listing fail as if the backend were unreachable
    pub fn unreachable(mut self) -> Self {
        self.failures.push(InjectedFailure::Unreachable);
        self
    }

    /// Number of `list_keys` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_keys(&self, bucket: &str, prefix: &str) -> CoverageResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        for failure in &self.failures {
            match failure {
                InjectedFailure::Unreachable => {
                    return Err(CoverageError::BackendUnavailable("injected outage".to_string()))
                }
                InjectedFailure::Prefix { bucket: b, prefix: p } if b == bucket && p == prefix => {
                    return Err(CoverageError::Listing {
                        bucket: bucket.to_string(),
                        prefix: prefix.to_string(),
                        message: "injected listing failure".to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(self
            .objects
            .get(bucket)
            .map(|keys| keys.iter().filter(|k| k.starts_with(prefix)).cloned().collect())
            .unwrap_or_default())
    }

    fn check_access(&self, _bucket: &str) -> CoverageResult<()> {
        if self.failures.iter().any(|f| matches!(f, InjectedFailure::Unreachable)) {
            return Err(CoverageError::BackendUnavailable("injected outage".to_string()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory store ({} buckets)", self.objects.len())
    }
}
