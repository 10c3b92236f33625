use slab::Slab;

use crate::node::{Kind, Link, LinkId, Node, NodeId};
use crate::Runtime;

impl Runtime {
	/// Record `dep` as a dependency of `sub` for the current tracking
	/// pass. Consecutive re-reads dedupe against the write cursor, a
	/// stable prefix from the previous pass is reused without allocating,
	/// and a non-consecutive re-read within the pass is caught by the
	/// stamp on `dep`'s subscriber tail.
	pub(crate) fn link(&self, dep: NodeId, sub: NodeId) {
		let mut nodes = self.nodes.borrow_mut();
		let mut links = self.links.borrow_mut();
		let (pass, tail) = {
			let comp = nodes[sub.index()].comp();
			(comp.pass, comp.deps_tail)
		};
		if !tail.is_none() && links[tail.index()].dep == dep {
			return;
		}
		let next = if tail.is_none() {
			nodes[sub.index()].comp().deps
		} else {
			links[tail.index()].next_dep
		};
		if !next.is_none() && links[next.index()].dep == dep {
			links[next.index()].pass = pass;
			nodes[sub.index()].comp_mut().deps_tail = next;
			raise_height(&mut nodes, dep, sub);
			return;
		}
		let sub_tail = nodes[dep.index()].subs_tail;
		if !sub_tail.is_none()
			&& links[sub_tail.index()].sub == sub
			&& links[sub_tail.index()].pass == pass
		{
			return;
		}
		let link = LinkId(links.insert(Link {
			dep,
			sub,
			next_dep: next,
			prev_sub: sub_tail,
			next_sub: LinkId::NONE,
			pass,
		}) as u32);
		if tail.is_none() {
			nodes[sub.index()].comp_mut().deps = link;
		} else {
			links[tail.index()].next_dep = link;
		}
		if sub_tail.is_none() {
			nodes[dep.index()].subs = link;
		} else {
			links[sub_tail.index()].next_sub = link;
		}
		nodes[dep.index()].subs_tail = link;
		nodes[sub.index()].comp_mut().deps_tail = link;
		raise_height(&mut nodes, dep, sub);
	}

	/// Drop every link after the write cursor: dependencies this pass did
	/// not touch. Returns the computeds orphaned by the unlink; callers
	/// dispose them once no borrows are held.
	pub(crate) fn end_tracking(&self, sub: NodeId) -> Vec<NodeId> {
		let mut orphans = Vec::new();
		let mut nodes = self.nodes.borrow_mut();
		let mut links = self.links.borrow_mut();
		let tail = nodes[sub.index()].comp().deps_tail;
		let mut stale = if tail.is_none() {
			std::mem::replace(&mut nodes[sub.index()].comp_mut().deps, LinkId::NONE)
		} else {
			std::mem::replace(&mut links[tail.index()].next_dep, LinkId::NONE)
		};
		while !stale.is_none() {
			let next = links[stale.index()].next_dep;
			let dep = links[stale.index()].dep;
			unlink_sub(&mut nodes, &mut links, stale);
			links.remove(stale.index());
			if nodes[dep.index()].subs.is_none()
				&& matches!(nodes[dep.index()].kind, Kind::Computed(_))
			{
				orphans.push(dep);
			}
			stale = next;
		}
		orphans
	}
}

/// Splice a link out of its dependency's subscriber list. The caller
/// removes it from the slab and from the sub's dependency chain.
pub(crate) fn unlink_sub(nodes: &mut Slab<Node>, links: &mut Slab<Link>, link: LinkId) {
	let Link {
		dep,
		prev_sub,
		next_sub,
		..
	} = links[link.index()];
	if prev_sub.is_none() {
		nodes[dep.index()].subs = next_sub;
	} else {
		links[prev_sub.index()].next_sub = next_sub;
	}
	if next_sub.is_none() {
		nodes[dep.index()].subs_tail = prev_sub;
	} else {
		links[next_sub.index()].prev_sub = prev_sub;
	}
}

/// A node must sit strictly above its deepest dependency; heights only
/// ever grow.
fn raise_height(nodes: &mut Slab<Node>, dep: NodeId, sub: NodeId) {
	let dep_height = nodes[dep.index()].height();
	let comp = nodes[sub.index()].comp_mut();
	if dep_height >= comp.height {
		comp.height = dep_height + 1;
	}
}
