//! Tracking for operations that complete asynchronously, possibly on a
//! different thread than the call that issued them.
//!
//! The layer sometimes hands wrapped output handles to the application
//! before the underlying object exists (a pipeline built under a
//! deferred operation). The continuation registered here is what finally
//! records the wrapped -> native mapping once the object is real.
//! Completion is observed from both the join path and the result-query
//! path; the pop-based take under the per-record mutex guarantees each
//! continuation runs exactly once no matter how many threads race.

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

type PostCompletion = Box<dyn FnOnce() + Send>;
type PostCheck = Box<dyn FnOnce(&DeferredResult) + Send>;

/// Result set produced by a deferred operation: the wrapped/native pairs
/// whose registry mappings are still outstanding.
#[derive(Debug, Clone, Default)]
pub struct DeferredResult {
    pub pipelines: Vec<(u64, u64)>,
}

#[derive(Default)]
struct OpRecord {
    post_completion: Vec<PostCompletion>,
    post_check: Vec<PostCheck>,
    result: Option<DeferredResult>,
}

/// Per-device tracker, keyed by the native deferred-operation handle.
#[derive(Default)]
pub struct DeferredOperationTracker {
    ops: DashMap<u64, Mutex<OpRecord>>,
}

impl DeferredOperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an operation. Idempotent.
    pub fn register_op(&self, op: u64) {
        self.ops.entry(op).or_default();
    }

    /// Queue a continuation to run once, on the first completion
    /// observation, on whichever thread observes it.
    pub fn register_post_completion(&self, op: u64, continuation: PostCompletion) {
        self.ops
            .entry(op)
            .or_default()
            .lock()
            .post_completion
            .push(continuation);
    }

    /// Queue a continuation that consumes the produced result set. Runs
    /// once, on the first completion observation after a result exists.
    pub fn register_post_check(&self, op: u64, continuation: PostCheck) {
        self.ops
            .entry(op)
            .or_default()
            .lock()
            .post_check
            .push(continuation);
    }

    /// Record the result set for an operation.
    pub fn produce_result(&self, op: u64, result: DeferredResult) {
        self.ops.entry(op).or_default().lock().result = Some(result);
    }

    /// Called from the join path and the result-query path once the
    /// operation is complete. Atomically takes the pending continuation
    /// lists; a concurrent observer gets empty lists, so each
    /// continuation runs exactly once in total. Querying before a result
    /// exists leaves the post-check continuations queued.
    pub fn observe_completion(&self, op: u64) {
        let (completions, checks, result) = match self.ops.get(&op) {
            Some(entry) => {
                let mut rec = entry.lock();
                let completions = std::mem::take(&mut rec.post_completion);
                let result = rec.result.clone();
                let checks = if result.is_some() {
                    std::mem::take(&mut rec.post_check)
                } else {
                    Vec::new()
                };
                (completions, checks, result)
            }
            None => return,
        };
        // Continuations run outside the record mutex and map shard; they
        // may touch this tracker again.
        if !completions.is_empty() || !checks.is_empty() {
            debug!(
                op = format_args!("{op:#x}"),
                completions = completions.len(),
                checks = checks.len(),
                "running deferred-operation continuations"
            );
        }
        for f in completions {
            f();
        }
        if let Some(result) = result {
            for f in checks {
                f(&result);
            }
        }
    }

    /// Stop tracking an operation (its destroy call).
    pub fn remove(&self, op: u64) {
        self.ops.remove(&op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
