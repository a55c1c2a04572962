use std::{
	cmp::{Ordering, Reverse},
	collections::{BinaryHeap, HashMap, HashSet, VecDeque},
};

use crate::distance::cosine_distance;

/// A node id paired with its distance to whatever vector the current search is anchored on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scored {
	pub(crate) distance: f32,
	pub(crate) node: usize,
}
impl PartialEq for Scored {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}
impl Eq for Scored {}
impl Ord for Scored {
	fn cmp(&self, other: &Self) -> Ordering {
		self.distance.total_cmp(&other.distance).then_with(|| self.node.cmp(&other.node))
	}
}
impl PartialOrd for Scored {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

#[derive(Debug)]
pub(crate) struct Node<K> {
	pub(crate) key: K,
	pub(crate) vector: Vec<f32>,
	/// One neighbor list per layer, `0..=level`.
	pub(crate) neighbors: Vec<Vec<usize>>,
}
impl<K> Node<K> {
	pub(crate) fn level(&self) -> usize {
		self.neighbors.len() - 1
	}
}

/// Adjacency storage. Node ids are insertion positions.
#[derive(Debug)]
pub(crate) struct Graph<K> {
	pub(crate) nodes: Vec<Node<K>>,
}
impl<K> Graph<K> {
	pub(crate) fn new() -> Self {
		Self { nodes: Vec::new() }
	}

	pub(crate) fn distance_to(&self, query: &[f32], node: usize) -> f32 {
		cosine_distance(query, &self.nodes[node].vector)
	}

	pub(crate) fn distance_between(&self, a: usize, b: usize) -> f32 {
		cosine_distance(&self.nodes[a].vector, &self.nodes[b].vector)
	}

	/// Walks one layer by always stepping to the closest neighbor until no neighbor improves.
	pub(crate) fn greedy_closest(&self, query: &[f32], start: usize, layer: usize) -> usize {
		let mut current = start;
		let mut current_distance = self.distance_to(query, current);

		loop {
			let mut improved = false;

			for &neighbor in &self.nodes[current].neighbors[layer] {
				let distance = self.distance_to(query, neighbor);

				if distance < current_distance {
					current = neighbor;
					current_distance = distance;
					improved = true;
				}
			}

			if !improved {
				return current;
			}
		}
	}

	/// Best-first search over one layer. Returns at most `ef` nodes, closest first.
	pub(crate) fn search_layer(
		&self,
		query: &[f32],
		entry_points: &[usize],
		ef: usize,
		layer: usize,
	) -> Vec<Scored> {
		let mut visited = HashSet::with_capacity(ef.saturating_mul(4));
		let mut candidates = BinaryHeap::new();
		let mut results: BinaryHeap<Scored> = BinaryHeap::new();

		for &node in entry_points {
			if !visited.insert(node) {
				continue;
			}

			let scored = Scored { distance: self.distance_to(query, node), node };

			candidates.push(Reverse(scored));
			results.push(scored);

			if results.len() > ef {
				results.pop();
			}
		}

		while let Some(Reverse(closest)) = candidates.pop() {
			if results.len() >= ef
				&& let Some(furthest) = results.peek()
				&& closest.distance > furthest.distance
			{
				break;
			}

			for &neighbor in &self.nodes[closest.node].neighbors[layer] {
				if !visited.insert(neighbor) {
					continue;
				}

				let distance = self.distance_to(query, neighbor);
				let admit =
					results.len() < ef || results.peek().is_some_and(|f| distance < f.distance);

				if !admit {
					continue;
				}

				let scored = Scored { distance, node: neighbor };

				candidates.push(Reverse(scored));
				results.push(scored);

				if results.len() > ef {
					results.pop();
				}
			}
		}

		results.into_sorted_vec()
	}

	/// Diversity heuristic over `candidates`, which must be sorted by distance to the base node.
	///
	/// A candidate is skipped while some already selected neighbor sits closer to it than the
	/// base does. Skipped candidates backfill any slots left open, closest first.
	pub(crate) fn select_neighbors(&self, candidates: &[Scored], limit: usize) -> Vec<usize> {
		if candidates.len() <= limit {
			return candidates.iter().map(|candidate| candidate.node).collect();
		}

		self.diversify(candidates, limit)
	}

	fn diversify(&self, candidates: &[Scored], limit: usize) -> Vec<usize> {
		let mut selected: Vec<usize> = Vec::with_capacity(limit);
		let mut skipped = Vec::new();

		for candidate in candidates {
			if selected.len() >= limit {
				break;
			}

			let dominated = selected
				.iter()
				.any(|&chosen| self.distance_between(candidate.node, chosen) < candidate.distance);

			if dominated {
				skipped.push(candidate.node);
			} else {
				selected.push(candidate.node);
			}
		}

		for node in skipped {
			if selected.len() >= limit {
				break;
			}

			selected.push(node);
		}

		selected
	}

	/// Links `a` and `b` at `layer` in both directions.
	pub(crate) fn link(&mut self, a: usize, b: usize, layer: usize) {
		self.nodes[a].neighbors[layer].push(b);
		self.nodes[b].neighbors[layer].push(a);
	}

	fn unlink(&mut self, a: usize, b: usize, layer: usize) {
		self.nodes[a].neighbors[layer].retain(|&neighbor| neighbor != b);
		self.nodes[b].neighbors[layer].retain(|&neighbor| neighbor != a);
	}

	fn links(&self, a: usize, b: usize, layer: usize) -> bool {
		self.nodes[a].neighbors[layer].contains(&b)
	}

	/// Trims `node`'s list at `layer` down to `limit` entries.
	///
	/// Links are ranked with the diversity heuristic and dropped worst first, on both ends. A
	/// link is only dropped while its far end can still reach `node` some other way. When every
	/// remaining link is a bridge the worst one is handed to [`Graph::reroute`], so the layer
	/// never splits. Returns `false` if that was impossible and a bridge had to go anyway.
	pub(crate) fn prune(&mut self, node: usize, layer: usize, limit: usize) -> bool {
		let mut candidates: Vec<Scored> = self.nodes[node].neighbors[layer]
			.iter()
			.map(|&neighbor| Scored { distance: self.distance_between(node, neighbor), node: neighbor })
			.collect();

		candidates.sort();

		let ranked = self.diversify(&candidates, candidates.len());
		let mut connected = true;

		while self.nodes[node].neighbors[layer].len() > limit {
			let droppable = ranked.iter().rev().copied().find(|&neighbor| {
				self.links(node, neighbor, layer) && !self.is_bridge(node, neighbor, layer)
			});

			if let Some(neighbor) = droppable {
				self.unlink(node, neighbor, layer);

				continue;
			}

			let Some(worst) =
				ranked.iter().rev().copied().find(|&neighbor| self.links(node, neighbor, layer))
			else {
				break;
			};

			if !self.reroute(node, worst, layer, limit) {
				connected = false;
			}
		}

		connected
	}

	/// Whether the `a`-`b` link is the only path between them at `layer`.
	fn is_bridge(&self, a: usize, b: usize, layer: usize) -> bool {
		let mut visited = HashSet::from([b]);
		let mut queue = VecDeque::from([b]);

		while let Some(current) = queue.pop_front() {
			for &next in &self.nodes[current].neighbors[layer] {
				if next == a {
					if current == b {
						continue;
					}

					return false;
				}
				if visited.insert(next) {
					queue.push_back(next);
				}
			}
		}

		true
	}

	/// Drops bridge `node`-`detached` and reattaches `detached` to the side it was cut from.
	///
	/// The closest node there with a free slot takes the link. If every node there is full,
	/// `detached` takes over one end of an edge that lies on a cycle, which keeps all degrees
	/// within `cap`. Returns `false` when neither exists.
	fn reroute(&mut self, node: usize, detached: usize, layer: usize, cap: usize) -> bool {
		self.unlink(node, detached, layer);

		let mut parent = HashMap::from([(node, node)]);
		let mut queue = VecDeque::from([node]);
		let mut spare: Option<Scored> = None;
		let mut cycle_edge = None;

		while let Some(current) = queue.pop_front() {
			if current != node && self.nodes[current].neighbors[layer].len() < cap {
				let distance = self.distance_between(detached, current);

				if spare.is_none_or(|best| distance < best.distance) {
					spare = Some(Scored { distance, node: current });
				}
			}

			for &next in &self.nodes[current].neighbors[layer] {
				if let Some(&next_parent) = parent.get(&next) {
					let tree_edge = next_parent == current || parent.get(&current) == Some(&next);

					if !tree_edge && cycle_edge.is_none() && current != node && next != node {
						cycle_edge = Some((current, next));
					}
				} else {
					parent.insert(next, current);
					queue.push_back(next);
				}
			}
		}

		if parent.contains_key(&detached) {
			return true;
		}
		if let Some(target) = spare {
			self.link(detached, target.node, layer);

			return true;
		}

		let Some((a, b)) = cycle_edge else {
			return false;
		};
		let closer_to_a =
			self.distance_between(detached, a) <= self.distance_between(detached, b);
		let (keep, free) = if closer_to_a { (a, b) } else { (b, a) };

		self.unlink(keep, free, layer);
		self.link(detached, keep, layer);

		true
	}
}

#[cfg(test)]
mod tests {
	use super::{Graph, Node, Scored};

	fn graph(vectors: &[[f32; 2]]) -> Graph<usize> {
		let mut graph = Graph::new();

		for (idx, vector) in vectors.iter().enumerate() {
			graph.nodes.push(Node { key: idx, vector: vector.to_vec(), neighbors: vec![Vec::new()] });
		}

		graph
	}

	fn scored_from(graph: &Graph<usize>, base: &[f32], nodes: &[usize]) -> Vec<Scored> {
		let mut out: Vec<Scored> = nodes
			.iter()
			.map(|&node| Scored { distance: graph.distance_to(base, node), node })
			.collect();

		out.sort();

		out
	}

	#[test]
	fn scored_orders_by_distance_then_node() {
		let near = Scored { distance: 0.1, node: 9 };
		let far = Scored { distance: 0.5, node: 1 };
		let tie = Scored { distance: 0.1, node: 10 };

		assert!(near < far);
		assert!(near < tie);
		assert_ne!(near, tie);
	}

	#[test]
	fn heuristic_skips_candidates_shadowed_by_a_closer_pick() {
		// Node 1 and 2 point the same way; 3 points elsewhere.
		let graph = graph(&[[0.0, 0.0], [1.0, 0.0], [0.995, 0.0998], [0.0, 1.0]]);
		let base = [0.7071, 0.7071];
		let candidates = scored_from(&graph, &base, &[1, 2, 3]);
		let selected = graph.select_neighbors(&candidates, 2);

		assert_eq!(selected.len(), 2);
		assert!(selected.contains(&3), "Expected the diverse direction to be kept: {selected:?}");
	}

	#[test]
	fn heuristic_backfills_skipped_candidates() {
		let graph = graph(&[
			[1.0, 0.0],
			[0.995, 0.0998],
			[0.98, 0.1987],
			[0.98, -0.1987],
			[0.95, 0.3122],
		]);
		let base = [1.0, 0.0];
		let candidates = scored_from(&graph, &base, &[1, 2, 3, 4]);
		let selected = graph.select_neighbors(&candidates, 3);

		// 2 and 4 are shadowed by 1; only 2 makes it back in.
		assert_eq!(selected, vec![1, 3, 2]);
	}

	#[test]
	fn greedy_walk_stops_at_local_minimum() {
		let mut graph = graph(&[[0.0, 1.0], [0.7071, 0.7071], [1.0, 0.0]]);

		graph.nodes[0].neighbors[0] = vec![1];
		graph.nodes[1].neighbors[0] = vec![0, 2];
		graph.nodes[2].neighbors[0] = vec![1];

		assert_eq!(graph.greedy_closest(&[1.0, 0.0], 0, 0), 2);
		assert_eq!(graph.greedy_closest(&[0.0, 1.0], 2, 0), 0);
	}

	#[test]
	fn prune_drops_links_on_both_ends() {
		let mut graph = graph(&[[1.0, 0.0], [0.9, 0.4359], [0.0, 1.0], [0.6, 0.8]]);

		for (a, b) in [(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)] {
			graph.link(a, b, 0);
		}

		assert!(graph.prune(0, 0, 2));
		assert_eq!(graph.nodes[0].neighbors[0], vec![1, 3]);
		assert_eq!(graph.nodes[2].neighbors[0], vec![1, 3]);
		assert_symmetric(&graph);
	}

	#[test]
	fn prune_reroutes_bridges_instead_of_cutting_them() {
		let mut graph = graph(&[[1.0, 0.0], [0.9, 0.4359], [0.0, 1.0], [0.9, -0.4359]]);

		for leaf in 1..=3 {
			graph.link(0, leaf, 0);
		}

		assert!(graph.prune(0, 0, 2));
		assert_eq!(graph.nodes[0].neighbors[0], vec![1, 3]);
		// 2 lost its only link and moves to the closest node with a free slot.
		assert_eq!(graph.nodes[2].neighbors[0], vec![1]);
		assert_eq!(graph.nodes[1].neighbors[0], vec![0, 2]);
		assert_symmetric(&graph);
		assert_eq!(reachable(&graph, 0), 4);
	}

	#[test]
	fn reroute_takes_over_a_cycle_edge_when_every_slot_is_full() {
		let mut graph = graph(&[
			[0.0, -1.0],
			[1.0, 0.0],
			[-1.0, 0.0],
			[-0.6, 0.8],
			[0.9, 0.4359],
			[0.0, 1.0],
			[0.6, 0.8],
		]);

		for (a, b) in [(0, 1), (0, 2), (2, 3), (2, 4), (3, 5), (3, 6), (4, 5), (4, 6), (5, 6)] {
			graph.link(a, b, 0);
		}

		assert!(graph.reroute(0, 1, 0, 3));
		assert_eq!(graph.nodes[0].neighbors[0], vec![2]);
		assert_eq!(graph.nodes[1].neighbors[0], vec![4]);
		assert_eq!(graph.nodes[5].neighbors[0], vec![3, 6]);
		assert!(graph.nodes.iter().all(|node| node.neighbors[0].len() <= 3));
		assert_symmetric(&graph);
		assert_eq!(reachable(&graph, 0), 7);
	}

	fn assert_symmetric(graph: &Graph<usize>) {
		for (node, entry) in graph.nodes.iter().enumerate() {
			for &neighbor in &entry.neighbors[0] {
				assert!(
					graph.nodes[neighbor].neighbors[0].contains(&node),
					"Link {node} -> {neighbor} has no way back."
				);
			}
		}
	}

	fn reachable(graph: &Graph<usize>, from: usize) -> usize {
		let mut seen = vec![false; graph.nodes.len()];
		let mut stack = vec![from];

		seen[from] = true;

		while let Some(node) = stack.pop() {
			for &next in &graph.nodes[node].neighbors[0] {
				if !seen[next] {
					seen[next] = true;
					stack.push(next);
				}
			}
		}

		seen.into_iter().filter(|seen| *seen).count()
	}
}
