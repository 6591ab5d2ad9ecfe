use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

/// One mutex per entity name. Operations on different names run in
/// parallel; operations on the same name are serialized.
#[derive(Debug, Default)]
pub(crate) struct NameLocks {
	locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
	/// Run `f` while holding the lock of `name`.
	pub(crate) fn with<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
		let lock = {
			let mut locks = self
				.locks
				.lock()
				.unwrap_or_else(|poisoned| poisoned.into_inner());
			Arc::clone(locks.entry(name.to_string()).or_default())
		};
		let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		f()
	}
}
