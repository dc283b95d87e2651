//! Node placement. Nodes are laid out row-first on a fixed-width grid, so a node count always
//! maps to the same positions.

use std::num::NonZeroUsize;

use crate::constants;
use crate::ident::NodeId;

/// A position in the plane, in meters.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A row-first grid.
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct GridLayout {
    /// Nodes per row.
    #[builder(default = constants::GRID_WIDTH)]
    pub width: NonZeroUsize,
    #[builder(default = constants::GRID_MIN_X)]
    pub min_x: f64,
    #[builder(default = constants::GRID_MIN_Y)]
    pub min_y: f64,
    /// Distance between columns.
    #[builder(default = constants::GRID_DELTA_X)]
    pub delta_x: f64,
    /// Distance between rows.
    #[builder(default = constants::GRID_DELTA_Y)]
    pub delta_y: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GridLayout {
    /// Places `nr_nodes` nodes. Node `i` lands in column `i % width` and row `i / width`.
    pub fn place(&self, nr_nodes: usize) -> Placement {
        let width = self.width.get();
        let positions = (0..nr_nodes)
            .map(|i| {
                let (col, row) = (i % width, i / width);
                Position::new(
                    self.min_x + col as f64 * self.delta_x,
                    self.min_y + row as f64 * self.delta_y,
                )
            })
            .collect();
        Placement { positions }
    }
}

/// Places `nr_nodes` nodes on a line, `spacing` meters apart. This is the layout written to
/// animation traces.
pub fn linear(nr_nodes: usize, spacing: f64) -> Placement {
    let positions = (0..nr_nodes)
        .map(|i| Position::new(i as f64 * spacing, 0.0))
        .collect();
    Placement { positions }
}

/// Node positions, indexed by [`NodeId`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    positions: Vec<Position>,
}

impl Placement {
    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.positions.get(id.inner()).copied()
    }

    /// Iterate over `(node, position)` pairs in node order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Position)> + '_ {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, &p)| (NodeId::new(i), p))
    }

    delegate::delegate! {
        to self.positions {
            #[call(len)]
            pub fn nr_nodes(&self) -> usize;

            pub fn is_empty(&self) -> bool;
        }
    }
}
