use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A bounded set of keys that have already been acted upon.
///
/// Once a critical section leaves the set holding more than `capacity` keys
/// the whole set is cleared. There is no per-key ageing, so a key can be seen
/// again right after a clear.
pub struct DedupRecord<K> {
	capacity: usize,
	seen: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash> DedupRecord<K> {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			seen: Mutex::new(HashSet::new()),
		}
	}

	/// Enters the critical section. Check and mark through the returned guard
	/// to make them atomic with respect to other callers.
	pub fn lock(&self) -> DedupGuard<'_, K> {
		DedupGuard {
			capacity: self.capacity,
			seen: self.seen.lock().unwrap_or_else(PoisonError::into_inner),
		}
	}

	/// Marks `key`, returning false if it was already marked.
	pub fn insert(&self, key: K) -> bool {
		self.lock().mark(key)
	}

	pub fn contains(&self, key: &K) -> bool {
		self.lock().contains(key)
	}

	pub fn len(&self) -> usize {
		self.lock().seen.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

pub struct DedupGuard<'a, K: Eq + Hash> {
	capacity: usize,
	seen: MutexGuard<'a, HashSet<K>>,
}

impl<K: Eq + Hash> DedupGuard<'_, K> {
	pub fn contains(&self, key: &K) -> bool {
		self.seen.contains(key)
	}

	pub fn mark(&mut self, key: K) -> bool {
		self.seen.insert(key)
	}
}

impl<K: Eq + Hash> Drop for DedupGuard<'_, K> {
	fn drop(&mut self) {
		if self.seen.len() > self.capacity {
			tracing::info!(entries = self.seen.len(), "clearing dedup record");
			self.seen.clear();
		}
	}
}
