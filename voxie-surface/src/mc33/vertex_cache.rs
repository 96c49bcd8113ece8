//! Rolling cache of edge vertices shared between neighboring cells
//!
//! Cells are visited x fastest, then y, then z. A cell only shares edges
//! with cells of its own layer and of the layers directly below and above,
//! so two planes of x- and y-edges plus one plane of z-edges suffice.

use voxie_core::{Error, Result};

const EMPTY: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct EdgeCache {
    nx: usize,
    ny: usize,
    down_x: Vec<u32>,
    down_y: Vec<u32>,
    up_x: Vec<u32>,
    up_y: Vec<u32>,
    vertical: Vec<u32>,
}

fn empty_plane(len: usize) -> Result<Vec<u32>> {
    let mut plane = Vec::new();
    plane.try_reserve_exact(len)?;
    plane.resize(len, EMPTY);
    Ok(plane)
}

impl EdgeCache {
    /// Cache for a grid with `nx * ny` points per layer
    pub fn new(nx: usize, ny: usize) -> Result<Self> {
        if nx < 2 || ny < 2 {
            return Err(Error::InvalidGrid(format!(
                "Edge cache needs at least 2x2 points per layer, got {}x{}",
                nx, ny
            )));
        }
        let x_edges = (nx - 1) * ny;
        let y_edges = nx * (ny - 1);
        Ok(Self {
            nx,
            ny,
            down_x: empty_plane(x_edges)?,
            down_y: empty_plane(y_edges)?,
            up_x: empty_plane(x_edges)?,
            up_y: empty_plane(y_edges)?,
            vertical: empty_plane(nx * ny)?,
        })
    }

    #[inline]
    fn slot(&mut self, x: usize, y: usize, edge: u8) -> &mut u32 {
        let nx = self.nx;
        debug_assert!(x + 1 < nx && y + 1 < self.ny);
        match edge {
            0 => &mut self.down_x[y * (nx - 1) + x],
            1 => &mut self.down_y[y * nx + x + 1],
            2 => &mut self.down_x[(y + 1) * (nx - 1) + x],
            3 => &mut self.down_y[y * nx + x],
            4 => &mut self.up_x[y * (nx - 1) + x],
            5 => &mut self.up_y[y * nx + x + 1],
            6 => &mut self.up_x[(y + 1) * (nx - 1) + x],
            7 => &mut self.up_y[y * nx + x],
            8 => &mut self.vertical[y * nx + x],
            9 => &mut self.vertical[y * nx + x + 1],
            10 => &mut self.vertical[(y + 1) * nx + x + 1],
            _ => &mut self.vertical[(y + 1) * nx + x],
        }
    }

    /// Vertex of `edge` of cell `(x, y)` in the current layer, created with
    /// `create` on the first request
    pub fn get_or_insert_with<F>(&mut self, x: usize, y: usize, edge: u8, create: F) -> Result<u32>
    where
        F: FnOnce() -> Result<u32>,
    {
        let slot = self.slot(x, y, edge);
        if *slot == EMPTY {
            *slot = create()?;
        }
        Ok(*slot)
    }

    pub fn get(&mut self, x: usize, y: usize, edge: u8) -> Option<u32> {
        let index = *self.slot(x, y, edge);
        (index != EMPTY).then_some(index)
    }

    /// Advance to the next layer: the upper plane becomes the lower one
    pub fn next_layer(&mut self) {
        std::mem::swap(&mut self.down_x, &mut self.up_x);
        std::mem::swap(&mut self.down_y, &mut self.up_y);
        self.up_x.fill(EMPTY);
        self.up_y.fill(EMPTY);
        self.vertical.fill(EMPTY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> impl FnMut() -> Result<u32> {
        let mut next = 0;
        move || {
            next += 1;
            Ok(next - 1)
        }
    }

    #[test]
    fn test_neighbors_share_edges() {
        let mut cache = EdgeCache::new(3, 3).unwrap();
        let mut create = counter();
        // +x face of cell (0, 0) is the -x face of cell (1, 0)
        let a = cache.get_or_insert_with(0, 0, 1, &mut create).unwrap();
        assert_eq!(cache.get_or_insert_with(1, 0, 3, &mut create).unwrap(), a);
        let b = cache.get_or_insert_with(0, 0, 10, &mut create).unwrap();
        assert_eq!(cache.get_or_insert_with(1, 0, 11, &mut create).unwrap(), b);
        // +y face of cell (0, 0) is the -y face of cell (0, 1)
        let c = cache.get_or_insert_with(0, 0, 6, &mut create).unwrap();
        assert_eq!(cache.get_or_insert_with(0, 1, 4, &mut create).unwrap(), c);
        // Diagonal neighbor (1, 1) sees the same z-edge as its corner 0
        assert_eq!(cache.get(1, 1, 8), Some(b));
        assert_eq!(cache.get(1, 1, 11), None);
    }

    #[test]
    fn test_layers_roll() {
        let mut cache = EdgeCache::new(2, 2).unwrap();
        let mut create = counter();
        let top = cache.get_or_insert_with(0, 0, 4, &mut create).unwrap();
        let vertical = cache.get_or_insert_with(0, 0, 8, &mut create).unwrap();
        cache.next_layer();
        // Former top edge is now a bottom edge; vertical edges are fresh
        assert_eq!(cache.get(0, 0, 0), Some(top));
        assert_eq!(cache.get(0, 0, 4), None);
        assert_eq!(cache.get(0, 0, 8), None);
        assert_ne!(cache.get_or_insert_with(0, 0, 8, &mut create).unwrap(), vertical);
    }

    #[test]
    fn test_create_error_leaves_slot_empty() {
        let mut cache = EdgeCache::new(2, 2).unwrap();
        let result = cache.get_or_insert_with(0, 0, 0, || Err(Error::Cancelled));
        assert!(result.is_err());
        assert_eq!(cache.get(0, 0, 0), None);
    }

    #[test]
    fn test_rejects_thin_layers() {
        assert!(EdgeCache::new(1, 5).is_err());
    }
}
