use std::cell::{Cell, RefCell};

use slab::Slab;
use tracing::trace;

use crate::heap::HeightHeap;
use crate::link::unlink_sub;
use crate::node::{Kind, Link, LinkId, Node, NodeId, CHECK, DIRTY, RECOMPUTING};
use crate::scope::Scope;
use crate::Source;

/// The reactive graph: node arena, link arena, height-bucketed dirty heap
/// and the single active-observer slot. Every operation is a method here,
/// so independent graphs coexist and tests get a fresh one each.
///
/// Strictly single-threaded; interior mutability is `Cell`/`RefCell` and
/// the type is deliberately neither `Send` nor `Sync`.
pub struct Runtime {
	pub(crate) nodes: RefCell<Slab<Node>>,
	pub(crate) links: RefCell<Slab<Link>>,
	pub(crate) heap: RefCell<HeightHeap>,
	pub(crate) observer: Cell<NodeId>,
	/// Monotonic tracking-pass counter; stamps links for dedupe.
	pub(crate) pass: Cell<u32>,
	/// Current stabilizer bucket; 0 while idle.
	pub(crate) threshold: Cell<u32>,
	pub(crate) needs_notify: Cell<bool>,
	pub(crate) stabilizing: Cell<bool>,
	pub(crate) batch_depth: Cell<u32>,
}

impl Default for Runtime {
	fn default() -> Self {
		Runtime::new()
	}
}

impl Runtime {
	pub fn new() -> Runtime {
		Runtime {
			nodes: RefCell::new(Slab::new()),
			links: RefCell::new(Slab::new()),
			heap: RefCell::new(HeightHeap::new()),
			observer: Cell::new(NodeId::NONE),
			pass: Cell::new(0),
			threshold: Cell::new(0),
			needs_notify: Cell::new(false),
			stabilizing: Cell::new(false),
			batch_depth: Cell::new(0),
		}
	}

	/// Read a node's current value. While an observer is active the node
	/// is recorded as one of its dependencies.
	pub fn read<T, S>(&self, source: &S) -> T
	where
		T: Clone + 'static,
		S: Source<T>,
	{
		let id = source.id();
		self.pull(id);
		let observer = self.observer.get();
		if !observer.is_none() {
			self.link(id, observer);
		}
		self.value_of(id)
	}

	/// Untracked read: resolves staleness like [`Runtime::read`] but
	/// records no edge.
	pub fn peek<T, S>(&self, source: &S) -> T
	where
		T: Clone + 'static,
		S: Source<T>,
	{
		self.pull(source.id());
		self.value_of(source.id())
	}

	fn pull(&self, id: NodeId) {
		let (state, height) = {
			let nodes = self.nodes.borrow();
			match &nodes[id.index()].kind {
				Kind::Signal => return,
				Kind::Computed(comp) => (comp.state, comp.height),
			}
		};
		if state & RECOMPUTING != 0 {
			if self.nodes.borrow()[id.index()].value.is_none() {
				panic!("cycle: computed read during its own first recomputation");
			}
			return;
		}
		if height >= self.threshold.get() || state & (CHECK | DIRTY) != 0 {
			self.notify();
			self.update_node(id);
		}
	}

	fn value_of<T>(&self, id: NodeId) -> T
	where
		T: Clone + 'static,
	{
		self.nodes.borrow()[id.index()].value.as_ref().unwrap().get()
	}

	/// Register a teardown callback on the running computed; it fires
	/// before the next recomputation or on dispose. Outside an observer
	/// this is a silent no-op.
	pub fn on_cleanup(&self, func: impl FnOnce() + 'static) {
		let observer = self.observer.get();
		if observer.is_none() {
			return;
		}
		let mut nodes = self.nodes.borrow_mut();
		nodes[observer.index()]
			.comp_mut()
			.cleanup
			.push(Box::new(func));
	}

	/// Run `func` with no active observer, so reads inside create no
	/// dependency edges.
	pub fn root<R>(&self, func: impl FnOnce(&Scope<'_>) -> R) -> R {
		let prev = self.observer.replace(NodeId::NONE);
		let out = func(&Scope::new(self));
		self.observer.set(prev);
		out
	}

	/// Group writes; stabilization runs once, at the outermost exit.
	pub fn batch<R>(&self, func: impl FnOnce() -> R) -> R {
		self.batch_depth.set(self.batch_depth.get() + 1);
		let out = func();
		self.batch_depth.set(self.batch_depth.get() - 1);
		if self.batch_depth.get() == 0 {
			self.stabilize();
		}
		out
	}

	pub fn is_signal(&self, node: NodeId) -> bool {
		matches!(self.nodes.borrow()[node.index()].kind, Kind::Signal)
	}

	pub fn is_computed(&self, node: NodeId) -> bool {
		matches!(self.nodes.borrow()[node.index()].kind, Kind::Computed(_))
	}

	/// Sever a node from the graph: leave the heap, run cleanups, unlink
	/// every dependency edge. A computed dependency left without
	/// subscribers is disposed along the way. Idempotent; the last value
	/// stays readable.
	pub fn dispose(&self, node: NodeId) {
		let mut work = vec![node];
		while let Some(id) = work.pop() {
			let cleanup = {
				let mut nodes = self.nodes.borrow_mut();
				let mut links = self.links.borrow_mut();
				if matches!(nodes[id.index()].kind, Kind::Signal) {
					continue;
				}
				trace!(node = id.0, "dispose");
				self.heap.borrow_mut().remove(&mut nodes, id);
				let (mut dep_link, cleanup) = {
					let comp = nodes[id.index()].comp_mut();
					comp.state = 0;
					comp.deps_tail = LinkId::NONE;
					(
						std::mem::replace(&mut comp.deps, LinkId::NONE),
						std::mem::take(&mut comp.cleanup),
					)
				};
				while !dep_link.is_none() {
					let next = links[dep_link.index()].next_dep;
					let dep = links[dep_link.index()].dep;
					unlink_sub(&mut nodes, &mut links, dep_link);
					links.remove(dep_link.index());
					if nodes[dep.index()].subs.is_none()
						&& matches!(nodes[dep.index()].kind, Kind::Computed(_))
					{
						work.push(dep);
					}
					dep_link = next;
				}
				cleanup
			};
			for func in cleanup {
				func();
			}
		}
	}

	pub(crate) fn state_of(&self, id: NodeId) -> u8 {
		self.nodes.borrow()[id.index()].state()
	}
}
