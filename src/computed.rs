use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::hashed::Hashed;
use crate::node::{ComputeFn, Node, NodeId};
use crate::scope::Scope;
use crate::{Runtime, Source};

/// A derived, memoized value: recomputed from its body over other nodes,
/// cached between runs. The handle is a copyable index into the
/// runtime's arena.
pub struct Computed<T> {
	id: NodeId,
	marker: PhantomData<fn() -> T>,
}

impl<T> Copy for Computed<T> {}

impl<T> Clone for Computed<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Computed<T> {
	pub fn id(&self) -> NodeId {
		self.id
	}
}

impl<T> Source<T> for Computed<T> {
	fn id(&self) -> NodeId {
		self.id
	}
}

impl<T> Debug for Computed<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Computed").field(&self.id.0).finish()
	}
}

impl Runtime {
	/// Create a memoized derived value.
	///
	/// Under an active observer the new node immediately becomes one of
	/// the observer's dependencies. As the observer's first recorded
	/// dependency of the pass it inherits the observer's height and
	/// computes inline; any later it is placed a level above the observer
	/// and queued instead, deferring the work to stabilization so lazily
	/// built chains cannot recurse without bound. Outside any observer it
	/// computes eagerly on construction.
	pub fn computed<T, F>(&self, mut func: F) -> Computed<T>
	where
		T: Hash + 'static,
		F: FnMut(&Scope<'_>) -> T + 'static,
	{
		let body: ComputeFn = Box::new(move |scope| Hashed::of(func(scope)));
		let observer = self.observer.get();
		let id = {
			let mut nodes = self.nodes.borrow_mut();
			let entry = nodes.vacant_entry();
			let id = NodeId(entry.key() as u32);
			entry.insert(Node::computed(body, id));
			id
		};
		if observer.is_none() {
			self.recompute(id, false);
		} else {
			let first = {
				let nodes = self.nodes.borrow();
				nodes[observer.index()].comp().deps_tail.is_none()
			};
			if first {
				{
					let mut nodes = self.nodes.borrow_mut();
					let height = nodes[observer.index()].comp().height;
					nodes[id.index()].comp_mut().height = height;
				}
				self.recompute(id, false);
			} else {
				let mut nodes = self.nodes.borrow_mut();
				let height = nodes[observer.index()].comp().height + 1;
				nodes[id.index()].comp_mut().height = height;
				let mut heap = self.heap.borrow_mut();
				heap.insert(&mut nodes, id);
			}
			self.link(id, observer);
		}
		Computed {
			id,
			marker: PhantomData,
		}
	}
}
