#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HnswConfig {
	/// Neighbor cap above layer 0.
	pub m: usize,
	/// Neighbor cap at layer 0.
	pub m_max0: usize,
	/// Result set breadth used while linking a new node.
	pub ef_construction: usize,
	/// `mL` in `floor(-ln(U) * mL)`.
	pub level_multiplier: f64,
}
impl HnswConfig {
	pub fn new(m: usize) -> Self {
		let m = m.max(2);

		Self { m, m_max0: m * 2, ef_construction: 200, level_multiplier: 1.0 / (m as f64).ln() }
	}

	pub fn with_m_max0(mut self, m_max0: usize) -> Self {
		self.m_max0 = m_max0.max(self.m);

		self
	}

	pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
		self.ef_construction = ef_construction.max(1);

		self
	}

	pub fn with_level_multiplier(mut self, level_multiplier: f64) -> Self {
		self.level_multiplier = level_multiplier;

		self
	}

	pub(crate) fn max_neighbors(&self, layer: usize) -> usize {
		if layer == 0 { self.m_max0 } else { self.m }
	}
}
impl Default for HnswConfig {
	fn default() -> Self {
		Self::new(16)
	}
}
