use std::sync::Arc;

use crate::dedup::DedupRecord;

#[test]
fn test_insert_reports_first_sight() {
	let record = DedupRecord::new(10);

	assert!(record.insert("a"));
	assert!(!record.insert("a"));
	assert!(record.contains(&"a"));
	assert!(!record.contains(&"b"));
	assert_eq!(record.len(), 1);
}

#[test]
fn test_clears_in_bulk_past_capacity() {
	let record = DedupRecord::new(3);

	for key in 0..3 {
		assert!(record.insert(key));
	}
	assert_eq!(record.len(), 3);

	assert!(record.insert(3));
	assert!(record.is_empty());

	// Forgotten keys are accepted again.
	assert!(record.insert(0));
}

#[test]
fn test_guard_checks_and_marks_atomically() {
	let record = DedupRecord::new(100);

	{
		let mut guard = record.lock();
		assert!(!guard.contains(&1));
		assert!(guard.mark(1));
		assert!(!guard.mark(1));
	}

	assert!(record.contains(&1));
}

#[test]
fn test_concurrent_inserts_win_once() {
	let record = Arc::new(DedupRecord::new(10_000));

	let handles = (0..8)
		.map(|_| {
			let record = record.clone();
			std::thread::spawn(move || (0..500).filter(|key| record.insert(*key)).count())
		})
		.collect::<Vec<_>>();

	let wins = handles.into_iter().map(|h| h.join().unwrap()).sum::<usize>();

	assert_eq!(wins, 500);
	assert_eq!(record.len(), 500);
}
