use std::ops::Deref;

use crate::Runtime;

/// Context handed to a computed's body while it runs. It derefs to the
/// runtime, so bodies read, write and create nodes through it.
pub struct Scope<'rt> {
	runtime: &'rt Runtime,
}

impl<'rt> Scope<'rt> {
	pub(crate) fn new(runtime: &'rt Runtime) -> Self {
		Scope { runtime }
	}
}

impl Deref for Scope<'_> {
	type Target = Runtime;

	fn deref(&self) -> &Runtime {
		self.runtime
	}
}
