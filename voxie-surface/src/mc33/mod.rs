//! Marching Cubes 33 isosurface extraction
//!
//! Topologically correct variant of Marching Cubes: ambiguous faces are
//! resolved with the asymptotic decider and cells whose topology depends on
//! the trilinear interior get an exact connectivity test, so the extracted
//! surface is watertight and matches the topology of the trilinear
//! interpolant cell by cell.

pub mod classifier;
pub mod extractor;
pub mod interior;
pub mod tables;
pub mod vertex_cache;

pub use classifier::{classify, CellCorners, Classification};
pub use extractor::*;
pub use tables::{CaseEntry, CaseTable, EdgeLoop, Template, TunnelCandidate};
pub use vertex_cache::EdgeCache;

/// Union-find over a small fixed set of nodes
#[derive(Debug, Clone)]
pub(crate) struct DisjointSet {
    parent: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(len: usize) -> Self {
        debug_assert!(len <= u8::MAX as usize);
        Self {
            parent: (0..len as u8).collect(),
        }
    }

    pub(crate) fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] as usize != node {
            let grandparent = self.parent[self.parent[node] as usize];
            self.parent[node] = grandparent;
            node = grandparent as usize;
        }
        node
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins so representatives do not depend on union order
            let (lo, hi) = (ra.min(rb), ra.max(rb));
            self.parent[hi] = lo as u8;
        }
    }

    pub(crate) fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_set() {
        let mut set = DisjointSet::new(6);
        set.union(4, 2);
        set.union(2, 5);
        assert!(set.connected(4, 5));
        assert!(!set.connected(0, 5));
        assert_eq!(set.find(5), 2);
        set.union(5, 0);
        assert_eq!(set.find(4), 0);
    }
}
