use std::panic::{self, AssertUnwindSafe};

use tracing::{error, trace};

use crate::node::{LinkId, NodeId, CHECK, DIRTY, IN_HEAP, RECOMPUTING};
use crate::propagate::mark_subscribers;
use crate::scope::Scope;
use crate::Runtime;

impl Runtime {
	/// Depth-first pull. CHECK resolves by updating dependencies in
	/// order, stopping the moment one of them turns this node DIRTY:
	/// one dirty ancestor already justifies recomputing. State is clean
	/// on exit either way.
	pub(crate) fn update_node(&self, id: NodeId) {
		if self.state_of(id) & CHECK != 0 {
			let mut l = self.nodes.borrow()[id.index()].comp().deps;
			while !l.is_none() {
				let (dep, next) = {
					let links = self.links.borrow();
					(links[l.index()].dep, links[l.index()].next_dep)
				};
				if self.state_of(dep) & (CHECK | DIRTY) != 0 {
					self.update_node(dep);
				}
				if self.state_of(id) & DIRTY != 0 {
					break;
				}
				l = next;
			}
		}
		if self.state_of(id) & DIRTY != 0 {
			self.recompute(id, false);
		} else {
			let mut nodes = self.nodes.borrow_mut();
			nodes[id.index()].comp_mut().state &= !CHECK;
		}
	}

	/// Run a computed's body and reconcile the graph around the result:
	/// cleanups fire first, the dependency list is re-tracked through the
	/// write cursor, a changed value seeds every subscriber into the
	/// heap, and dependencies the run stopped reading are unlinked (and
	/// disposed once subscriber-less).
	pub(crate) fn recompute(&self, id: NodeId, from_heap: bool) {
		if self.state_of(id) & RECOMPUTING != 0 {
			return;
		}
		trace!(node = id.0, "recompute");
		if !from_heap {
			let mut nodes = self.nodes.borrow_mut();
			self.heap.borrow_mut().remove(&mut nodes, id);
		}
		// previous run's cleanups, in registration order, before the new body
		let pending = {
			let mut nodes = self.nodes.borrow_mut();
			std::mem::take(&mut nodes[id.index()].comp_mut().cleanup)
		};
		for func in pending {
			func();
		}
		let func = {
			let mut nodes = self.nodes.borrow_mut();
			let pass = self.pass.get().wrapping_add(1);
			self.pass.set(pass);
			let comp = nodes[id.index()].comp_mut();
			comp.state = RECOMPUTING;
			comp.deps_tail = LinkId::NONE;
			comp.pass = pass;
			comp.func.take()
		};
		let mut func = match func {
			Some(func) => func,
			None => return,
		};
		let prev = self.observer.replace(id);
		let result = panic::catch_unwind(AssertUnwindSafe(|| func(&Scope::new(self))));
		self.observer.set(prev);
		// the body goes back into its slot even when it panicked
		{
			let mut nodes = self.nodes.borrow_mut();
			nodes[id.index()].comp_mut().func = Some(func);
		}
		let changed = match result {
			Ok(next) => {
				let mut nodes = self.nodes.borrow_mut();
				let node = &mut nodes[id.index()];
				let changed = node
					.value
					.as_ref()
					.map_or(true, |prev| prev.hash != next.hash);
				if changed {
					node.value = Some(next);
				}
				changed
			}
			Err(payload) => {
				let has_value = self.nodes.borrow()[id.index()].value.is_some();
				if !has_value {
					// nothing to fall back to: restore invariants, then resume
					let orphans = self.end_tracking(id);
					{
						let mut nodes = self.nodes.borrow_mut();
						let comp = nodes[id.index()].comp_mut();
						comp.state &= IN_HEAP | DIRTY;
					}
					for orphan in orphans {
						self.dispose(orphan);
					}
					panic::resume_unwind(payload);
				}
				error!(node = id.0, "recomputation panicked; keeping previous value");
				false
			}
		};
		if changed {
			let mut nodes = self.nodes.borrow_mut();
			let links = self.links.borrow();
			let mut heap = self.heap.borrow_mut();
			mark_subscribers(&mut nodes, &links, &mut heap, id);
			self.needs_notify.set(true);
		}
		let orphans = self.end_tracking(id);
		{
			let mut nodes = self.nodes.borrow_mut();
			let comp = nodes[id.index()].comp_mut();
			// a mid-run self-invalidation may have requeued the node;
			// keep those bits, the queue membership must stay coherent
			comp.state &= IN_HEAP | DIRTY;
		}
		for orphan in orphans {
			self.dispose(orphan);
		}
	}

	/// Drain the heap in strictly ascending height order. Entries
	/// inserted at higher buckets during the pass are reached by the same
	/// pass; a node never recomputes before every lower bucket settled,
	/// and never more than once per pass. Re-entrant calls are no-ops;
	/// the in-flight drain picks new work up on its own.
	pub fn stabilize(&self) {
		if self.stabilizing.replace(true) {
			return;
		}
		self.notify();
		trace!(pending = self.heap.borrow().len(), "stabilize");
		let mut height = 0;
		while height < self.heap.borrow().span() {
			self.threshold.set(height);
			loop {
				let next = {
					let mut nodes = self.nodes.borrow_mut();
					self.heap.borrow_mut().pop(&mut nodes, height)
				};
				match next {
					Some(id) => self.recompute(id, true),
					None => break,
				}
			}
			height += 1;
		}
		self.threshold.set(0);
		self.stabilizing.set(false);
	}
}
