use slab::Slab;

use crate::node::{Node, NodeId, IN_HEAP};

/// Dirty-work queue bucketed by topological height. Each bucket is a
/// circular doubly-linked list threaded through the nodes' own heap
/// pointers, so insert, remove and pop are all O(1). The IN_HEAP flag and
/// bucket membership change together, never separately.
pub(crate) struct HeightHeap {
	buckets: Vec<NodeId>,
	len: usize,
}

impl HeightHeap {
	pub(crate) fn new() -> Self {
		HeightHeap {
			buckets: Vec::new(),
			len: 0,
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.len
	}

	/// One past the highest bucket ever used.
	pub(crate) fn span(&self) -> u32 {
		self.buckets.len() as u32
	}

	pub(crate) fn insert(&mut self, nodes: &mut Slab<Node>, id: NodeId) {
		let height = {
			let comp = nodes[id.index()].comp_mut();
			if comp.state & IN_HEAP != 0 {
				return;
			}
			comp.state |= IN_HEAP;
			comp.height as usize
		};
		if self.buckets.len() <= height {
			self.buckets.resize(height + 1, NodeId::NONE);
		}
		let head = self.buckets[height];
		if head.is_none() {
			// pointers are already self-referential: a one-entry cycle
			self.buckets[height] = id;
		} else {
			let tail = nodes[head.index()].comp().prev_heap;
			nodes[tail.index()].comp_mut().next_heap = id;
			{
				let comp = nodes[id.index()].comp_mut();
				comp.prev_heap = tail;
				comp.next_heap = head;
			}
			nodes[head.index()].comp_mut().prev_heap = id;
		}
		self.len += 1;
	}

	pub(crate) fn remove(&mut self, nodes: &mut Slab<Node>, id: NodeId) {
		let (height, next, prev) = {
			let comp = nodes[id.index()].comp_mut();
			if comp.state & IN_HEAP == 0 {
				return;
			}
			comp.state &= !IN_HEAP;
			let next = comp.next_heap;
			let prev = comp.prev_heap;
			comp.next_heap = id;
			comp.prev_heap = id;
			(comp.height as usize, next, prev)
		};
		if next == id {
			self.buckets[height] = NodeId::NONE;
		} else {
			nodes[prev.index()].comp_mut().next_heap = next;
			nodes[next.index()].comp_mut().prev_heap = prev;
			if self.buckets[height] == id {
				self.buckets[height] = next;
			}
		}
		self.len -= 1;
	}

	pub(crate) fn pop(&mut self, nodes: &mut Slab<Node>, height: u32) -> Option<NodeId> {
		let head = *self.buckets.get(height as usize)?;
		if head.is_none() {
			return None;
		}
		self.remove(nodes, head);
		Some(head)
	}

	/// Snapshot of everything currently queued, for the notify walk.
	pub(crate) fn queued(&self, nodes: &Slab<Node>) -> Vec<NodeId> {
		let mut out = Vec::with_capacity(self.len);
		for &head in &self.buckets {
			if head.is_none() {
				continue;
			}
			let mut id = head;
			loop {
				out.push(id);
				id = nodes[id.index()].comp().next_heap;
				if id == head {
					break;
				}
			}
		}
		out
	}
}
