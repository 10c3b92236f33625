use slab::Slab;
use tracing::trace;

use crate::heap::HeightHeap;
use crate::node::{Link, Node, NodeId, CHECK, DIRTY, RECOMPUTING};
use crate::Runtime;

/// Mark every direct subscriber of `id` dirty and queue it. Transitive
/// marking is left to the lazy notify pass. A subscriber that is itself
/// mid-run is skipped: its own reads pull the fresh value directly.
pub(crate) fn mark_subscribers(
	nodes: &mut Slab<Node>,
	links: &Slab<Link>,
	heap: &mut HeightHeap,
	id: NodeId,
) {
	let mut l = nodes[id.index()].subs;
	while !l.is_none() {
		let link = links[l.index()];
		if nodes[link.sub.index()].comp().state & RECOMPUTING == 0 {
			nodes[link.sub.index()].comp_mut().state |= DIRTY;
			heap.insert(nodes, link.sub);
		}
		l = link.next_sub;
	}
}

impl Runtime {
	/// Once per batch: extend the DIRTY seeds sitting in the heap with a
	/// transitive CHECK closure over their subscribers, stopping descent
	/// wherever the marks already cover the subtree. Afterward the
	/// short-circuit pull is sound: a CHECK node that finds no dirty
	/// ancestor quietly degrades back to clean.
	pub(crate) fn notify(&self) {
		if !self.needs_notify.replace(false) {
			return;
		}
		let mut nodes = self.nodes.borrow_mut();
		let links = self.links.borrow();
		let seeds = self.heap.borrow().queued(&nodes);
		if seeds.is_empty() {
			return;
		}
		trace!(seeds = seeds.len(), "notify");
		let mut stack = Vec::new();
		for seed in &seeds {
			push_subs(&nodes, &links, *seed, &mut stack);
		}
		while let Some(id) = stack.pop() {
			{
				let comp = nodes[id.index()].comp_mut();
				if comp.state & (CHECK | DIRTY) != 0 {
					continue;
				}
				comp.state |= CHECK;
			}
			push_subs(&nodes, &links, id, &mut stack);
		}
	}
}

fn push_subs(nodes: &Slab<Node>, links: &Slab<Link>, id: NodeId, out: &mut Vec<NodeId>) {
	let mut l = nodes[id.index()].subs;
	while !l.is_none() {
		out.push(links[l.index()].sub);
		l = links[l.index()].next_sub;
	}
}
