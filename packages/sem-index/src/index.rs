use rand::{Rng, SeedableRng, distributions::OpenClosed01, rngs::StdRng};

use crate::{
	Error, Result,
	config::HnswConfig,
	graph::{Graph, Node},
};

// Keeps a pathological draw from allocating an absurd number of layers.
const MAX_LEVEL: usize = 32;

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<K> {
	pub key: K,
	/// Cosine distance to the query, `1 - dot`.
	pub distance: f32,
}

/// Hierarchical navigable small world graph over unit vectors.
///
/// The index is built once per request and thrown away afterwards, so it only supports
/// insertion and search. Every inserted vector must share the dimension of the first one.
#[derive(Debug)]
pub struct HnswIndex<K> {
	cfg: HnswConfig,
	graph: Graph<K>,
	entry_point: Option<usize>,
	max_layer: usize,
	dimensions: Option<usize>,
	rng: StdRng,
}
impl<K> HnswIndex<K> {
	pub fn new(cfg: HnswConfig) -> Self {
		Self::with_rng(cfg, StdRng::from_entropy())
	}

	/// Same as [`HnswIndex::new`] but level draws are reproducible.
	pub fn with_seed(cfg: HnswConfig, seed: u64) -> Self {
		Self::with_rng(cfg, StdRng::seed_from_u64(seed))
	}

	fn with_rng(cfg: HnswConfig, rng: StdRng) -> Self {
		Self { cfg, graph: Graph::new(), entry_point: None, max_layer: 0, dimensions: None, rng }
	}

	/// Builds an index by inserting `items` in iteration order.
	pub fn build<I>(cfg: HnswConfig, items: I) -> Result<Self>
	where
		I: IntoIterator<Item = (K, Vec<f32>)>,
	{
		let mut index = Self::new(cfg);

		for (key, vector) in items {
			index.insert(key, vector)?;
		}

		Ok(index)
	}

	pub fn config(&self) -> &HnswConfig {
		&self.cfg
	}

	pub fn len(&self) -> usize {
		self.graph.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.nodes.is_empty()
	}

	/// Dimension fixed by the first insertion, if any.
	pub fn dimensions(&self) -> Option<usize> {
		self.dimensions
	}

	pub fn max_layer(&self) -> usize {
		self.max_layer
	}

	pub fn entry_point(&self) -> Option<usize> {
		self.entry_point
	}

	pub fn node_level(&self, node: usize) -> Option<usize> {
		self.graph.nodes.get(node).map(Node::level)
	}

	/// Neighbor ids of `node` at `layer`, or `None` when the node does not reach that layer.
	pub fn neighbors(&self, node: usize, layer: usize) -> Option<&[usize]> {
		self.graph.nodes.get(node)?.neighbors.get(layer).map(Vec::as_slice)
	}

	pub fn key(&self, node: usize) -> Option<&K> {
		self.graph.nodes.get(node).map(|node| &node.key)
	}

	/// Inserts a vector and returns its node id.
	pub fn insert(&mut self, key: K, vector: Vec<f32>) -> Result<usize> {
		self.check_dimensions(&vector)?;

		let level = self.random_level();
		let node = self.graph.nodes.len();

		self.graph.nodes.push(Node { key, vector, neighbors: vec![Vec::new(); level + 1] });

		let Some(mut entry) = self.entry_point else {
			self.dimensions = Some(self.graph.nodes[node].vector.len());
			self.entry_point = Some(node);
			self.max_layer = level;

			return Ok(node);
		};
		let query = self.graph.nodes[node].vector.clone();

		for layer in (level + 1..=self.max_layer).rev() {
			entry = self.graph.greedy_closest(&query, entry, layer);
		}

		let mut entry_points = vec![entry];

		for layer in (0..=level.min(self.max_layer)).rev() {
			let found =
				self.graph.search_layer(&query, &entry_points, self.cfg.ef_construction, layer);
			let cap = self.cfg.max_neighbors(layer);
			let selected = self.graph.select_neighbors(&found, cap);

			for &neighbor in &selected {
				self.graph.link(node, neighbor, layer);
			}

			for &neighbor in &selected {
				if self.graph.nodes[neighbor].neighbors[layer].len() > cap
					&& !self.graph.prune(neighbor, layer, cap)
				{
					tracing::debug!(node = neighbor, layer, cap, "Pruning split the layer.");
				}
			}

			entry_points = found.into_iter().map(|scored| scored.node).collect();
		}

		if level > self.max_layer {
			tracing::trace!(node, level, previous = self.max_layer, "Promoted new entry point.");

			self.max_layer = level;
			self.entry_point = Some(node);
		}

		Ok(node)
	}

	/// Approximate `k` nearest neighbors of `query`, closest first.
	///
	/// `ef` is raised to `k` when smaller. An empty index or `k == 0` yields no hits.
	pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor<K>>>
	where
		K: Clone,
	{
		if let Some(expected) = self.dimensions
			&& expected != query.len()
		{
			return Err(Error::DimensionMismatch { expected, actual: query.len() });
		}

		let Some(mut entry) = self.entry_point else {
			return Ok(Vec::new());
		};

		if k == 0 {
			return Ok(Vec::new());
		}

		for layer in (1..=self.max_layer).rev() {
			entry = self.graph.greedy_closest(query, entry, layer);
		}

		let found = self.graph.search_layer(query, &[entry], ef.max(k), 0);

		Ok(found
			.into_iter()
			.take(k)
			.map(|scored| Neighbor {
				key: self.graph.nodes[scored.node].key.clone(),
				distance: scored.distance,
			})
			.collect())
	}

	fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
		if vector.is_empty() {
			return Err(Error::EmptyVector);
		}
		if let Some(expected) = self.dimensions
			&& expected != vector.len()
		{
			return Err(Error::DimensionMismatch { expected, actual: vector.len() });
		}

		Ok(())
	}

	fn random_level(&mut self) -> usize {
		let u: f64 = self.rng.sample(OpenClosed01);
		let level = (-u.ln() * self.cfg.level_multiplier).floor();

		if level.is_finite() && level > 0.0 { (level as usize).min(MAX_LEVEL) } else { 0 }
	}
}
