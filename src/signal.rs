use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use tracing::trace;

use crate::hashed::Hashed;
use crate::node::{Node, NodeId};
use crate::propagate::mark_subscribers;
use crate::{Runtime, Source};

/// A mutable leaf value: no dependencies, no recomputation function.
/// The handle is a copyable index into the runtime's arena.
pub struct Signal<T> {
	id: NodeId,
	marker: PhantomData<fn() -> T>,
}

impl<T> Copy for Signal<T> {}

impl<T> Clone for Signal<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Signal<T> {
	pub fn id(&self) -> NodeId {
		self.id
	}
}

impl<T> Source<T> for Signal<T> {
	fn id(&self) -> NodeId {
		self.id
	}
}

impl<T> Debug for Signal<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Signal").field(&self.id.0).finish()
	}
}

impl Runtime {
	pub fn signal<T>(&self, value: T) -> Signal<T>
	where
		T: Hash + 'static,
	{
		let id = {
			let mut nodes = self.nodes.borrow_mut();
			NodeId(nodes.insert(Node::signal(Hashed::of(value))) as u32)
		};
		Signal {
			id,
			marker: PhantomData,
		}
	}

	/// Store a new value. The hash stamp is the single change gate: a
	/// write of an identical value suppresses all propagation. Otherwise
	/// every direct subscriber is marked dirty and queued; the transitive
	/// closure is marked lazily, once per batch.
	pub fn write<T>(&self, signal: &Signal<T>, value: T)
	where
		T: Hash + 'static,
	{
		let next = Hashed::of(value);
		let mut nodes = self.nodes.borrow_mut();
		{
			let node = &mut nodes[signal.id.index()];
			if node
				.value
				.as_ref()
				.map_or(false, |prev| prev.hash == next.hash)
			{
				return;
			}
			node.value = Some(next);
		}
		trace!(node = signal.id.0, "write");
		let links = self.links.borrow();
		let mut heap = self.heap.borrow_mut();
		mark_subscribers(&mut nodes, &links, &mut heap, signal.id);
		self.needs_notify.set(true);
	}

	/// Mutate the value in place, through the same change gate.
	pub fn update<T>(&self, signal: &Signal<T>, func: impl FnOnce(&mut T))
	where
		T: Hash + 'static,
	{
		let changed = {
			let mut nodes = self.nodes.borrow_mut();
			let slot = nodes[signal.id.index()].value.as_mut().unwrap();
			let value = slot.value.downcast_mut::<T>().unwrap();
			func(value);
			let hash = fxhash::hash64(value);
			if hash == slot.hash {
				false
			} else {
				slot.hash = hash;
				true
			}
		};
		if changed {
			trace!(node = signal.id.0, "update");
			let mut nodes = self.nodes.borrow_mut();
			let links = self.links.borrow();
			let mut heap = self.heap.borrow_mut();
			mark_subscribers(&mut nodes, &links, &mut heap, signal.id);
			self.needs_notify.set(true);
		}
	}
}
