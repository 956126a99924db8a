//! Resolve glyph outlines to code points by comparing them with a reference glyph set.
//!
//! Reference glyphs are bucketed by point count. A query outline is compared against the
//! bucket with its own point count, after discarding candidates whose extents differ too much,
//! and the candidate with the smallest distance supplies the code point.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHasher};

use crate::error::MatchError;
use crate::tables::glyf::{Glyph, Point, SimpleGlyph};

pub const DEFAULT_GROUPED_CAPACITY: usize = 50;
pub const DEFAULT_RESULT_CAPACITY: usize = 1000;

/// Candidates whose flattened lengths differ by this much or more are skipped.
const MAX_LENGTH_DIFFERENCE: i64 = 2;
/// Candidates with any extent further away than this are skipped.
const MAX_EXTENT_DIFFERENCE: i64 = 3;

/// A glyph outline and the code point it is known to represent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGlyph {
    glyph: Glyph,
    unicode: u32,
}

/// Outline coordinates flattened to `[x0, y0, x1, y1, ...]`.
///
/// `extents` holds `[max x, min x, max y, min y]`. The extents start at zero, so they always
/// include the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatGlyph {
    pub coordinates: Vec<i32>,
    pub extents: [i32; 4],
}

/// Distance between two flattened outlines. Smaller is closer.
pub trait DistanceMetric: Send + Sync {
    fn distance(&self, query: &[i32], candidate: &[i32]) -> i64;
}

/// Sum of squared coordinate differences.
#[derive(Debug, Default, Clone, Copy)]
pub struct SquaredDistance;

#[derive(Debug)]
struct Candidate {
    unicode: u32,
    flat: FlatGlyph,
}

type GroupedCandidates = FxHashMap<usize, Vec<Candidate>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ResultKey {
    grouped: u64,
    query_hash: u64,
    query_len: usize,
}

/// Bounded caches shared by every matcher built with them.
pub struct MatchCaches {
    grouped: Mutex<LruCache<u64, Arc<GroupedCandidates>>>,
    results: Mutex<LruCache<ResultKey, u32>>,
    computations: AtomicUsize,
}

/// Nearest-neighbour matcher over one reference glyph set.
#[derive(Clone)]
pub struct GlyphShapeMatcher {
    inner: Arc<MatcherInner>,
}

struct MatcherInner {
    grouped_key: u64,
    grouped: Arc<GroupedCandidates>,
    caches: Arc<MatchCaches>,
    metric: Arc<dyn DistanceMetric>,
}

/// Delivers a match result to a callback exactly once.
///
/// Dropping an incomplete `Completion`, for example while a worker unwinds, reports
/// `MatchError::WorkerFailed`.
struct Completion<F: FnOnce(Result<u32, MatchError>)> {
    callback: Option<F>,
}

impl ReferenceGlyph {
    pub fn new(glyph: Glyph, unicode: u32) -> Self {
        ReferenceGlyph { glyph, unicode }
    }

    pub fn glyph(&self) -> &Glyph {
        &self.glyph
    }

    pub fn unicode(&self) -> u32 {
        self.unicode
    }
}

impl FlatGlyph {
    pub fn new(points: impl IntoIterator<Item = (i32, i32)>) -> Self {
        let points = points.into_iter();
        let mut coordinates = Vec::with_capacity(points.size_hint().0 * 2);
        let mut extents = [0; 4];
        for (x, y) in points {
            coordinates.push(x);
            coordinates.push(y);
            extents[0] = extents[0].max(x);
            extents[1] = extents[1].min(x);
            extents[2] = extents[2].max(y);
            extents[3] = extents[3].min(y);
        }

        FlatGlyph {
            coordinates,
            extents,
        }
    }

    fn from_outline(glyph: &SimpleGlyph) -> Self {
        FlatGlyph::new(
            glyph
                .outline_points()
                .map(|Point(x, y)| (i32::from(x), i32::from(y))),
        )
    }

    /// Number of flattened values, twice the point count.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    fn is_near(&self, other: &FlatGlyph) -> bool {
        let length_difference = (self.len() as i64 - other.len() as i64).abs();
        length_difference < MAX_LENGTH_DIFFERENCE
            && self
                .extents
                .iter()
                .zip(other.extents.iter())
                .all(|(&a, &b)| (i64::from(a) - i64::from(b)).abs() <= MAX_EXTENT_DIFFERENCE)
    }
}

impl DistanceMetric for SquaredDistance {
    /// `i64::MAX` when the outlines have different lengths.
    fn distance(&self, query: &[i32], candidate: &[i32]) -> i64 {
        if query.len() != candidate.len() {
            return i64::MAX;
        }

        query
            .iter()
            .zip(candidate)
            .map(|(&a, &b)| {
                let delta = i64::from(a) - i64::from(b);
                delta.saturating_mul(delta)
            })
            .fold(0i64, i64::saturating_add)
    }
}

/// Score every candidate against `query`.
pub fn distances_batch<M: DistanceMetric + ?Sized>(
    metric: &M,
    query: &FlatGlyph,
    candidates: &[&FlatGlyph],
) -> Vec<i64> {
    candidates
        .iter()
        .map(|candidate| metric.distance(&query.coordinates, &candidate.coordinates))
        .collect()
}

/// Parse glyph text of the form `x1,y1|x2,y2|...`.
///
/// Tokens that are not a pair are skipped. A pair that is not two integers is an error, and
/// so is text without any points.
pub fn parse_glyph_text(text: &str) -> Result<Vec<(i32, i32)>, MatchError> {
    let mut points = Vec::new();
    for token in text.split('|') {
        let parts = token.split(',').collect::<Vec<_>>();
        if let [x, y] = parts.as_slice() {
            let x = x.trim().parse::<i32>().map_err(|_| MatchError::InvalidGlyphInput)?;
            let y = y.trim().parse::<i32>().map_err(|_| MatchError::InvalidGlyphInput)?;
            points.push((x, y));
        }
    }

    if points.is_empty() {
        Err(MatchError::InvalidGlyphInput)
    } else {
        Ok(points)
    }
}

impl MatchCaches {
    pub fn new() -> Self {
        MatchCaches::with_capacity(DEFAULT_GROUPED_CAPACITY, DEFAULT_RESULT_CAPACITY)
    }

    /// Caches holding at most `grouped` preprocessed reference sets and `results` resolved
    /// queries. A capacity of zero is treated as one.
    pub fn with_capacity(grouped: usize, results: usize) -> Self {
        let capacity = |n: usize| NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN);
        MatchCaches {
            grouped: Mutex::new(LruCache::new(capacity(grouped))),
            results: Mutex::new(LruCache::new(capacity(results))),
            computations: AtomicUsize::new(0),
        }
    }

    /// Empty both caches.
    pub fn clear(&self) {
        self.grouped.lock().clear();
        self.results.lock().clear();
    }

    /// Number of searches performed without a result cache hit.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn grouped_len(&self) -> usize {
        self.grouped.lock().len()
    }

    pub fn results_len(&self) -> usize {
        self.results.lock().len()
    }

    fn grouped_candidates(&self, key: u64, reference: &[ReferenceGlyph]) -> Arc<GroupedCandidates> {
        if let Some(grouped) = self.grouped.lock().get(&key) {
            return Arc::clone(grouped);
        }

        let grouped = Arc::new(group_by_point_count(reference));
        self.grouped.lock().put(key, Arc::clone(&grouped));
        grouped
    }
}

impl Default for MatchCaches {
    fn default() -> Self {
        MatchCaches::new()
    }
}

fn group_by_point_count(reference: &[ReferenceGlyph]) -> GroupedCandidates {
    let mut grouped = GroupedCandidates::default();
    for reference_glyph in reference {
        let simple = match reference_glyph.glyph.as_simple() {
            Some(simple) if !simple.coordinates.is_empty() => simple,
            _ => continue,
        };
        grouped
            .entry(simple.coordinates.len())
            .or_default()
            .push(Candidate {
                unicode: reference_glyph.unicode,
                flat: FlatGlyph::from_outline(simple),
            });
    }
    grouped
}

fn reference_key(reference: &[ReferenceGlyph]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_usize(reference.len());
    for reference_glyph in reference {
        hasher.write_u32(reference_glyph.unicode);
        match &reference_glyph.glyph {
            Glyph::Empty => hasher.write_u8(0),
            Glyph::Simple(simple) => {
                hasher.write_u8(1);
                simple.point_form.hash(&mut hasher);
                simple.coordinates.hash(&mut hasher);
            }
            Glyph::Composite(composite) => {
                hasher.write_u8(2);
                for component in &composite.glyphs {
                    hasher.write_u16(component.glyph_index);
                }
            }
        }
    }
    hasher.finish()
}

fn query_hash(query: &str) -> u64 {
    let mut hasher = FxHasher::default();
    query.hash(&mut hasher);
    hasher.finish()
}

impl GlyphShapeMatcher {
    /// Matcher scoring candidates with `SquaredDistance`.
    pub fn new(reference: Arc<[ReferenceGlyph]>, caches: Arc<MatchCaches>) -> Self {
        GlyphShapeMatcher::with_metric(reference, caches, Arc::new(SquaredDistance))
    }

    /// Results are cached per reference set and query only, so matchers with different
    /// metrics should not share `caches`.
    pub fn with_metric(
        reference: Arc<[ReferenceGlyph]>,
        caches: Arc<MatchCaches>,
        metric: Arc<dyn DistanceMetric>,
    ) -> Self {
        let grouped_key = reference_key(&reference);
        let grouped = caches.grouped_candidates(grouped_key, &reference);

        GlyphShapeMatcher {
            inner: Arc::new(MatcherInner {
                grouped_key,
                grouped,
                caches,
                metric,
            }),
        }
    }

    /// Find the code point of the reference glyph closest to `query`.
    pub fn find_closest(&self, query: &str) -> Result<u32, MatchError> {
        let key = self.inner.result_key(query);
        match self.inner.cached(&key) {
            Some(unicode) => Ok(unicode),
            None => self.inner.compute(key, query),
        }
    }

    /// Run `find_closest` on a worker thread and pass the result to `callback`.
    ///
    /// A cached result is passed to `callback` before this returns.
    pub fn find_closest_async<F>(&self, query: &str, callback: F)
    where
        F: FnOnce(Result<u32, MatchError>) + Send + 'static,
    {
        let key = self.inner.result_key(query);
        if let Some(unicode) = self.inner.cached(&key) {
            callback(Ok(unicode));
            return;
        }

        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        let completion = Completion::new(callback);
        let spawned = thread::Builder::new()
            .name("glyph-match".into())
            .spawn(move || {
                let result = inner.compute(key, &query);
                completion.complete(result);
            });
        // On failure the closure, and with it the completion, has already been dropped.
        if let Err(err) = spawned {
            warn!("unable to start glyph match worker: {}", err);
        }
    }

    /// Run `find_closest_async` and wait for its result.
    pub fn find_closest_blocking(&self, query: &str) -> Result<u32, MatchError> {
        let slot = Arc::new((Mutex::new(None), Condvar::new()));
        let signal = Arc::clone(&slot);
        self.find_closest_async(query, move |result| {
            let (lock, condvar) = &*signal;
            *lock.lock() = Some(result);
            condvar.notify_all();
        });

        let (lock, condvar) = &*slot;
        let mut result = lock.lock();
        while result.is_none() {
            condvar.wait(&mut result);
        }
        result.take().unwrap_or(Err(MatchError::WorkerFailed))
    }

    pub fn caches(&self) -> &Arc<MatchCaches> {
        &self.inner.caches
    }
}

impl MatcherInner {
    fn result_key(&self, query: &str) -> ResultKey {
        ResultKey {
            grouped: self.grouped_key,
            query_hash: query_hash(query),
            query_len: query.len(),
        }
    }

    fn cached(&self, key: &ResultKey) -> Option<u32> {
        self.caches.results.lock().get(key).copied()
    }

    fn compute(&self, key: ResultKey, query: &str) -> Result<u32, MatchError> {
        self.caches.computations.fetch_add(1, Ordering::Relaxed);
        let unicode = self.search(query)?;
        self.caches.results.lock().put(key, unicode);
        Ok(unicode)
    }

    fn search(&self, query: &str) -> Result<u32, MatchError> {
        let input = FlatGlyph::new(parse_glyph_text(query)?);
        let candidates = self
            .grouped
            .get(&(input.len() / 2))
            .ok_or(MatchError::NoCandidates)?;

        let filtered = candidates
            .iter()
            .filter(|candidate| input.is_near(&candidate.flat))
            .collect::<Vec<_>>();
        debug!(
            "glyph match: {} of {} candidates within extents",
            filtered.len(),
            candidates.len()
        );

        let flats = filtered
            .iter()
            .map(|candidate| &candidate.flat)
            .collect::<Vec<_>>();
        let distances = distances_batch(self.metric.as_ref(), &input, &flats);

        filtered
            .iter()
            .zip(distances)
            .filter(|(_, distance)| *distance < i64::MAX)
            .min_by_key(|(_, distance)| *distance)
            .map(|(candidate, _)| candidate.unicode)
            .ok_or(MatchError::NoMatch)
    }
}

impl<F: FnOnce(Result<u32, MatchError>)> Completion<F> {
    fn new(callback: F) -> Self {
        Completion {
            callback: Some(callback),
        }
    }

    fn complete(mut self, result: Result<u32, MatchError>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<F: FnOnce(Result<u32, MatchError>)> Drop for Completion<F> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(MatchError::WorkerFailed));
        }
    }
}
