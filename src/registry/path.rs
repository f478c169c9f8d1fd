use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use regex::bytes::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};

use crate::error::Result;
use crate::types::PathId;

/// Compiled program size limit for a pattern set. The regex default (10 MiB)
/// is too small for tens of thousands of URI patterns.
const COMPILED_SIZE_LIMIT: usize = 256 * (1 << 20);

/// One match of a registered URI pattern in a scanned buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMatch {
    pub path: PathId,
    pub start: usize,
    pub end: usize,
}

/// Immutable multi-pattern matcher built from one snapshot of the registry.
///
/// A `RegexSet` picks the patterns that occur anywhere in the buffer, then
/// only those patterns are run again to report offsets.
pub struct PathMatcher {
    set: RegexSet,
    patterns: Vec<(PathId, Regex)>,
    cache: Option<Mutex<LruCache<Vec<u8>, Vec<PathMatch>>>>,
}

impl PathMatcher {
    /// A matcher with no patterns. Never fails.
    pub fn empty(cache_size: usize) -> Self {
        Self {
            set: RegexSet::empty(),
            patterns: Vec::new(),
            cache: new_cache(cache_size),
        }
    }

    /// Compile `(id, pattern)` pairs into a matcher.
    pub fn compile(
        patterns: &[(PathId, String)],
        case_insensitive: bool,
        cache_size: usize,
    ) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::empty(cache_size));
        }

        let set = RegexSetBuilder::new(patterns.iter().map(|(_, p)| p.as_str()))
            .case_insensitive(case_insensitive)
            .size_limit(COMPILED_SIZE_LIMIT)
            .build()?;

        let compiled = patterns
            .iter()
            .map(|(id, p)| {
                RegexBuilder::new(p)
                    .case_insensitive(case_insensitive)
                    .build()
                    .map(|re| (*id, re))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            set,
            patterns: compiled,
            cache: new_cache(cache_size),
        })
    }

    /// Every match of every pattern in `data`, ordered by end then start offset.
    ///
    /// Each matching pattern reports its leftmost non-overlapping matches, so
    /// `aa` in `aaaa` yields two matches, not three.
    pub fn scan(&self, data: &[u8]) -> Vec<PathMatch> {
        if self.patterns.is_empty() {
            return Vec::new();
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().get(data) {
                return hit.clone();
            }
        }

        let mut matches: Vec<PathMatch> = self
            .set
            .matches(data)
            .iter()
            .flat_map(|idx| {
                let (id, re) = &self.patterns[idx];
                re.find_iter(data).map(move |m| PathMatch {
                    path: *id,
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect();
        matches.sort_by_key(|m| (m.end, m.start, m.path));

        if let Some(cache) = &self.cache {
            cache.lock().put(data.to_vec(), matches.clone());
        }
        matches
    }

    /// Number of compiled patterns
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl std::fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathMatcher")
            .field("patterns", &self.patterns.len())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

fn new_cache(size: usize) -> Option<Mutex<LruCache<Vec<u8>, Vec<PathMatch>>>> {
    NonZeroUsize::new(size).map(|n| Mutex::new(LruCache::new(n)))
}

#[derive(Debug)]
struct PathTable {
    ids: HashMap<String, PathId>,
    last_id: u32,
}

/// URI string to [`PathId`] table plus the published matcher.
///
/// Edits to the table are not visible to [`scan`](Self::scan) until
/// [`commit`](Self::commit) rebuilds and swaps in a new matcher. Scans clone
/// the current `Arc` under a short read lock, so a scan racing a commit runs
/// entirely against either the old or the new pattern set.
#[derive(Debug)]
pub struct PathRegistry {
    table: RwLock<PathTable>,
    matcher: RwLock<Arc<PathMatcher>>,
    commit_lock: Mutex<()>,
    case_insensitive: bool,
    cache_size: usize,
}

impl PathRegistry {
    pub fn new(case_insensitive: bool, cache_size: usize) -> Self {
        Self::with_capacity(case_insensitive, cache_size, 0)
    }

    pub fn with_capacity(case_insensitive: bool, cache_size: usize, capacity: usize) -> Self {
        Self {
            table: RwLock::new(PathTable {
                ids: HashMap::with_capacity(capacity),
                last_id: 0,
            }),
            matcher: RwLock::new(Arc::new(PathMatcher::empty(cache_size))),
            commit_lock: Mutex::new(()),
            case_insensitive,
            cache_size,
        }
    }

    /// Id of `uri`, assigning the next sequential id on first sight.
    pub fn add_or_get(&self, uri: &str) -> PathId {
        if let Some(id) = self.table.read().ids.get(uri) {
            return *id;
        }

        let mut table = self.table.write();
        if let Some(id) = table.ids.get(uri) {
            return *id;
        }
        table.last_id += 1;
        let id = PathId(table.last_id);
        table.ids.insert(uri.to_string(), id);
        tracing::debug!(uri, id = id.0, "registered uri");
        id
    }

    /// Check that `uri` compiles as a pattern, without registering it.
    ///
    /// A pattern that passes here cannot make a later [`commit`](Self::commit)
    /// fail on its own.
    pub fn validate(&self, uri: &str) -> Result<()> {
        RegexBuilder::new(uri)
            .case_insensitive(self.case_insensitive)
            .size_limit(COMPILED_SIZE_LIMIT)
            .build()?;
        Ok(())
    }

    pub fn find(&self, uri: &str) -> Option<PathId> {
        self.table.read().ids.get(uri).copied()
    }

    /// Remove the mapping. The published matcher keeps the pattern until the
    /// next commit.
    pub fn delete(&self, uri: &str) -> Option<PathId> {
        self.table.write().ids.remove(uri)
    }

    /// Remove every mapping. The published matcher is untouched.
    pub fn clear(&self) {
        self.table.write().ids.clear();
    }

    /// Remove every mapping and publish an empty matcher.
    pub fn reset(&self) {
        let _commit = self.commit_lock.lock();
        self.table.write().ids.clear();
        let previous = std::mem::replace(
            &mut *self.matcher.write(),
            Arc::new(PathMatcher::empty(self.cache_size)),
        );
        drop(previous);
    }

    /// Rebuild the matcher from the current mapping and publish it.
    ///
    /// On failure the previous matcher stays published.
    pub fn commit(&self) -> Result<()> {
        let _commit = self.commit_lock.lock();

        let mut patterns: Vec<(PathId, String)> = {
            let table = self.table.read();
            table
                .ids
                .iter()
                .map(|(uri, id)| (*id, uri.clone()))
                .collect()
        };
        patterns.sort_by_key(|(id, _)| *id);

        let matcher =
            match PathMatcher::compile(&patterns, self.case_insensitive, self.cache_size) {
                Ok(matcher) => matcher,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        patterns = patterns.len(),
                        "uri matcher rebuild failed"
                    );
                    return Err(e);
                }
            };

        let previous = std::mem::replace(&mut *self.matcher.write(), Arc::new(matcher));
        drop(previous);

        tracing::debug!(patterns = patterns.len(), "published uri matcher");
        Ok(())
    }

    /// Run the published matcher against `data`.
    ///
    /// See [`PathMatcher::scan`] for which matches are reported.
    pub fn scan(&self, data: &[u8]) -> Vec<PathMatch> {
        self.snapshot().scan(data)
    }

    /// The currently published matcher.
    pub fn snapshot(&self) -> Arc<PathMatcher> {
        self.matcher.read().clone()
    }

    pub fn len(&self) -> usize {
        self.table.read().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PathRegistry {
        PathRegistry::new(true, 16)
    }

    fn ids(matches: &[PathMatch]) -> Vec<PathId> {
        let mut ids: Vec<PathId> = matches.iter().map(|m| m.path).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    #[test]
    fn test_sequential_ids() {
        let reg = registry();
        assert_eq!(reg.add_or_get("/orders"), PathId(1));
        assert_eq!(reg.add_or_get("/users"), PathId(2));
        assert_eq!(reg.add_or_get("/orders"), PathId(1));
        assert_eq!(reg.add_or_get("/items"), PathId(3));
        assert_eq!(reg.find("/users"), Some(PathId(2)));
        assert_eq!(reg.find("/nope"), None);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let reg = registry();
        assert_eq!(reg.add_or_get("/a"), PathId(1));
        assert_eq!(reg.delete("/a"), Some(PathId(1)));
        assert_eq!(reg.delete("/a"), None);
        assert_eq!(reg.add_or_get("/a"), PathId(2));
    }

    #[test]
    fn test_scan_requires_commit() {
        let reg = registry();
        let id = reg.add_or_get("/orders");
        assert!(reg.scan(b"/orders/42").is_empty());

        reg.commit().unwrap();
        let matches = reg.scan(b"/orders/42");
        assert_eq!(
            matches,
            vec![PathMatch {
                path: id,
                start: 0,
                end: 7
            }]
        );
    }

    #[test]
    fn test_delete_keeps_stale_pattern_until_commit() {
        let reg = registry();
        let id = reg.add_or_get("/orders");
        reg.commit().unwrap();

        reg.delete("/orders");
        assert_eq!(ids(&reg.scan(b"/orders")), vec![id]);

        reg.commit().unwrap();
        assert!(reg.scan(b"/orders").is_empty());
    }

    #[test]
    fn test_scan_reports_every_pattern_and_offset() {
        let reg = registry();
        let api = reg.add_or_get("/api");
        let v1 = reg.add_or_get("/api/v1/.*");
        let users = reg.add_or_get("users");
        reg.commit().unwrap();

        let matches = reg.scan(b"/api/v1/users?next=users");
        assert_eq!(ids(&matches), vec![api, v1, users]);
        assert_eq!(matches.iter().filter(|m| m.path == users).count(), 2);
    }

    #[test]
    fn test_scan_reports_non_overlapping_matches() {
        let reg = registry();
        let aa = reg.add_or_get("aa");
        let a = reg.add_or_get("a");
        reg.commit().unwrap();

        let matches = reg.scan(b"aaaa");
        let of = |id: PathId| -> Vec<(usize, usize)> {
            matches
                .iter()
                .filter(|m| m.path == id)
                .map(|m| (m.start, m.end))
                .collect()
        };
        assert_eq!(of(aa), vec![(0, 2), (2, 4)]);
        assert_eq!(of(a), vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert!(matches.windows(2).all(|w| w[0].end <= w[1].end));
    }

    #[test]
    fn test_validate_rejects_bad_patterns() {
        let reg = registry();
        reg.validate("/orders/[0-9]+").unwrap();
        assert!(reg.validate("/orders/(").is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_case_insensitive_patterns() {
        let reg = registry();
        let id = reg.add_or_get("/Orders");
        reg.commit().unwrap();
        assert_eq!(ids(&reg.scan(b"/ORDERS")), vec![id]);

        let strict = PathRegistry::new(false, 0);
        strict.add_or_get("/Orders");
        strict.commit().unwrap();
        assert!(strict.scan(b"/orders").is_empty());
    }

    #[test]
    fn test_failed_commit_keeps_previous_matcher() {
        let reg = registry();
        let good = reg.add_or_get("/good");
        reg.commit().unwrap();

        reg.add_or_get("/bad(");
        assert!(reg.commit().is_err());
        assert_eq!(ids(&reg.scan(b"/good")), vec![good]);
        assert_eq!(reg.snapshot().pattern_count(), 1);

        reg.delete("/bad(");
        reg.commit().unwrap();
        assert_eq!(ids(&reg.scan(b"/good")), vec![good]);
    }

    #[test]
    fn test_reset_publishes_empty_matcher() {
        let reg = registry();
        reg.add_or_get("/a");
        reg.commit().unwrap();
        reg.reset();
        assert!(reg.is_empty());
        assert!(reg.scan(b"/a").is_empty());
        assert_eq!(reg.snapshot().pattern_count(), 0);
    }

    #[test]
    fn test_clear_leaves_matcher() {
        let reg = registry();
        let a = reg.add_or_get("/a");
        reg.commit().unwrap();
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(ids(&reg.scan(b"/a")), vec![a]);
    }

    #[test]
    fn test_cache_is_per_snapshot() {
        let reg = registry();
        let a = reg.add_or_get("/a");
        reg.commit().unwrap();
        assert_eq!(ids(&reg.scan(b"/a/b")), vec![a]);
        assert_eq!(ids(&reg.scan(b"/a/b")), vec![a]);

        let b = reg.add_or_get("/b");
        reg.commit().unwrap();
        assert_eq!(ids(&reg.scan(b"/a/b")), vec![a, b]);
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = PathMatcher::empty(0);
        assert_eq!(matcher.pattern_count(), 0);
        assert!(matcher.scan(b"/anything").is_empty());
    }
}
