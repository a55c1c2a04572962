pub fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `1 - dot(a, b)`. Callers are expected to hand in unit vectors; nothing is renormalized here.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	1.0 - dot(a, b)
}
