use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 400.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Parameters for turning a corner cloud into the ordered marker grid.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridSearchParams {
    /// Minimal corner strength to consider.
    pub min_strength: f32,

    /// Neighbor graph construction.
    pub graph: GridGraphParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let p: GridSearchParams = serde_json::from_str("{}").expect("parse");
        assert_eq!(p, GridSearchParams::default());
        assert_eq!(p.graph.k_neighbors, 8);
    }
}
