use std::any::Any;
use std::hash::Hash;

/// Type-erased value cell. The fxhash64 stamp is the change-detection
/// gate: two values count as identical when their stamps are equal, so
/// comparing never needs a downcast.
pub(crate) struct Hashed {
	pub(crate) value: Box<dyn Any>,
	pub(crate) hash: u64,
}

impl Hashed {
	pub(crate) fn of<T>(value: T) -> Self
	where
		T: Hash + 'static,
	{
		let hash = fxhash::hash64(&value);
		Hashed {
			value: Box::new(value),
			hash,
		}
	}

	pub(crate) fn get<T>(&self) -> T
	where
		T: Clone + 'static,
	{
		self.value.downcast_ref::<T>().unwrap().clone()
	}
}
