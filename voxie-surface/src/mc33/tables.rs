//! Cube geometry and the Marching Cubes 33 case table
//!
//! Corner `c` of the cell at `(x, y, z)` sits at `(x, y, z) + CORNER_OFFSETS[c]`.
//! The configuration of a cell has bit `c` set iff corner `c` is at or above
//! the isovalue ("positive").
//!
//! For every configuration and every outcome of its face tests the table holds
//! the boundary polygons of the surface inside the cell as closed loops of
//! cube edges. Each loop is oriented so that, seen from outside the cube, the
//! positive corners lie to the left of every segment. Loops on a shared face
//! are traversed in opposite directions by the two cells, which is what makes
//! the extracted surface consistently oriented.

use super::DisjointSet;
use std::sync::OnceLock;

pub const NO_EDGE: u8 = u8::MAX;

/// Grid offsets of the eight corners
pub const CORNER_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Endpoints of the twelve edges, lower grid coordinate first
pub const EDGE_CORNERS: [(u8, u8); 12] = [
    (0, 1),
    (1, 2),
    (3, 2),
    (0, 3),
    (4, 5),
    (5, 6),
    (7, 6),
    (4, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Grid axis along which each edge runs
pub const EDGE_AXIS: [usize; 12] = [0, 1, 0, 1, 0, 1, 0, 1, 2, 2, 2, 2];

/// Corners of the faces -z, +z, -y, +y, -x, +x, counter-clockwise as seen
/// from outside the cube
pub const FACE_CORNERS: [[u8; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [3, 7, 6, 2],
    [0, 4, 7, 3],
    [1, 2, 6, 5],
];

/// `FACE_EDGES[f][k]` joins `FACE_CORNERS[f][k]` and `FACE_CORNERS[f][k + 1]`
pub const FACE_EDGES: [[u8; 4]; 6] = [
    [3, 2, 1, 0],
    [4, 5, 6, 7],
    [0, 9, 4, 8],
    [11, 6, 10, 2],
    [8, 7, 11, 3],
    [1, 10, 5, 9],
];

/// Base cases whose topology also depends on the interior of the cell
pub const INTERIOR_TEST_CASES: [u8; 6] = [4, 6, 7, 10, 12, 13];

/// Per-configuration summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseEntry {
    /// One of the 15 classic Marching Cubes base cases (0..=14)
    pub case: u8,
    /// Bit `e` set iff edge `e` is crossed by the surface
    pub edge_mask: u16,
    /// Bit `f` set iff face `f` has its positive corners on one diagonal
    pub ambiguous_faces: u8,
    pub interior_test: bool,
}

/// One boundary polygon of the surface inside a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLoop {
    pub edges: Vec<u8>,
    /// A positive corner on the left of the loop and its region on the cube surface
    pub positive_corner: u8,
    pub positive_region: u8,
    /// A negative corner on the right of the loop and its region on the cube surface
    pub negative_corner: u8,
    pub negative_region: u8,
    /// The loop runs through both segments of an ambiguous face. Fanning it
    /// from one of its own vertices would put a diagonal on that face, so it
    /// is fanned around an extra center vertex instead.
    pub needs_center: bool,
}

/// Two loops that bound different regions of the same sign on the cube
/// surface. If those regions are connected through the interior of the cell,
/// the two disks are replaced by a tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelCandidate {
    pub loops: (usize, usize),
    pub corners: (u8, u8),
    pub positive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub loops: Vec<EdgeLoop>,
    /// Positive candidates first
    pub tunnels: Vec<TunnelCandidate>,
}

#[derive(Debug)]
pub struct CaseTable {
    entries: [CaseEntry; 256],
    offsets: [u32; 257],
    templates: Vec<Template>,
}

impl CaseTable {
    /// The process-wide table, built on first use
    pub fn get() -> &'static CaseTable {
        static TABLE: OnceLock<CaseTable> = OnceLock::new();
        TABLE.get_or_init(CaseTable::build)
    }

    fn build() -> Self {
        let mut entries = [CaseEntry::default(); 256];
        let mut offsets = [0u32; 257];
        let mut templates = Vec::new();
        for config in 0..=255u8 {
            let entry = classify_configuration(config);
            entries[config as usize] = entry;
            offsets[config as usize] = templates.len() as u32;
            let ambiguous: Vec<u8> = (0..6).filter(|f| entry.ambiguous_faces >> f & 1 == 1).collect();
            for outcome in 0..1u32 << ambiguous.len() {
                let joined = ambiguous
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| outcome >> i & 1 == 1)
                    .fold(0u8, |mask, (_, &f)| mask | 1 << f);
                templates.push(build_template(config, joined, entry.interior_test));
            }
        }
        offsets[256] = templates.len() as u32;
        Self {
            entries,
            offsets,
            templates,
        }
    }

    #[inline]
    pub fn entry(&self, config: u8) -> &CaseEntry {
        &self.entries[config as usize]
    }

    /// Template for `config` given the face test outcomes.
    ///
    /// Bit `f` of `joined_faces` is set when the positive corners of face `f`
    /// are connected across the face; bits of unambiguous faces are ignored.
    pub fn template(&self, config: u8, joined_faces: u8) -> &Template {
        let ambiguous = self.entries[config as usize].ambiguous_faces;
        let mut index = 0usize;
        let mut bit = 0;
        for f in 0..6 {
            if ambiguous >> f & 1 == 1 {
                index |= ((joined_faces >> f & 1) as usize) << bit;
                bit += 1;
            }
        }
        &self.templates[self.offsets[config as usize] as usize + index]
    }

    /// Number of distinct templates over all configurations
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

#[inline]
fn is_positive(config: u8, corner: u8) -> bool {
    config >> corner & 1 == 1
}

fn classify_configuration(config: u8) -> CaseEntry {
    let edge_mask = EDGE_CORNERS
        .iter()
        .enumerate()
        .filter(|&(_, &(a, b))| is_positive(config, a) != is_positive(config, b))
        .fold(0u16, |mask, (e, _)| mask | 1 << e);
    let ambiguous_faces = FACE_CORNERS
        .iter()
        .enumerate()
        .filter(|&(_, c)| {
            let s = c.map(|corner| is_positive(config, corner));
            s[0] == s[2] && s[1] == s[3] && s[0] != s[1]
        })
        .fold(0u8, |mask, (f, _)| mask | 1 << f);
    let case = base_case(config);
    CaseEntry {
        case,
        edge_mask,
        ambiguous_faces,
        interior_test: INTERIOR_TEST_CASES.contains(&case),
    }
}

/// Reduce a configuration to one of the 15 classic base cases.
///
/// Configurations with more than four positive corners are classified by
/// their complement. Four-corner sets are told apart by the degree sequence
/// of the cube edges they contain; the two mirror-image chains of three edges
/// (cases 11 and 14) are told apart by handedness, which is invariant under
/// rotation and complement.
pub fn base_case(config: u8) -> u8 {
    let set = if config.count_ones() > 4 { !config } else { config };
    let k = set.count_ones();
    let inner_edges: Vec<(u8, u8)> = EDGE_CORNERS
        .iter()
        .copied()
        .filter(|&(a, b)| is_positive(set, a) && is_positive(set, b))
        .collect();
    let mut degree = [0u8; 8];
    for &(a, b) in &inner_edges {
        degree[a as usize] += 1;
        degree[b as usize] += 1;
    }
    let max_degree = degree.iter().copied().max().unwrap_or(0);

    match (k, inner_edges.len()) {
        (0, _) => 0,
        (1, _) => 1,
        (2, 1) => 2,
        (2, _) => {
            let corners: Vec<u8> = (0..8).filter(|&c| is_positive(set, c)).collect();
            let (a, b) = (CORNER_OFFSETS[corners[0] as usize], CORNER_OFFSETS[corners[1] as usize]);
            let differing = (0..3).filter(|&i| a[i] != b[i]).count();
            if differing == 2 {
                3
            } else {
                4
            }
        }
        (3, 2) => 5,
        (3, 1) => 6,
        (3, _) => 7,
        (4, 4) => 8,
        (4, 3) if max_degree == 3 => 9,
        (4, 3) => {
            if chain_handedness(&inner_edges, &degree) > 0 {
                11
            } else {
                14
            }
        }
        (4, 2) if max_degree == 2 => 12,
        (4, 2) => 10,
        (4, _) => 13,
        _ => unreachable!("configuration {:#010b} reduced to {} corners", config, k),
    }
}

/// Sign of the determinant of the three edge directions along a chain
fn chain_handedness(edges: &[(u8, u8)], degree: &[u8; 8]) -> i32 {
    let Some(start) = (0..8u8).find(|&c| degree[c as usize] == 1) else {
        return 0;
    };
    let mut path = vec![start];
    while path.len() <= edges.len() {
        let current = path[path.len() - 1];
        let next = edges.iter().find_map(|&(a, b)| {
            let other = if a == current {
                b
            } else if b == current {
                a
            } else {
                return None;
            };
            (!path.contains(&other)).then_some(other)
        });
        match next {
            Some(c) => path.push(c),
            None => break,
        }
    }
    if path.len() != 4 {
        return 0;
    }
    let d: Vec<[i32; 3]> = path
        .windows(2)
        .map(|w| {
            let (a, b) = (CORNER_OFFSETS[w[0] as usize], CORNER_OFFSETS[w[1] as usize]);
            [0, 1, 2].map(|i| b[i] as i32 - a[i] as i32)
        })
        .collect();
    let det = d[0][0] * (d[1][1] * d[2][2] - d[1][2] * d[2][1])
        - d[0][1] * (d[1][0] * d[2][2] - d[1][2] * d[2][0])
        + d[0][2] * (d[1][0] * d[2][1] - d[1][1] * d[2][0]);
    det.signum()
}

fn build_template(config: u8, joined_faces: u8, interior_test: bool) -> Template {
    let mut next = [NO_EDGE; 12];
    // Face, positive corner and negative corner of the segment starting at each edge
    let mut segment = [(0u8, 0u8, 0u8); 12];
    let mut positive = DisjointSet::new(8);
    let mut negative = DisjointSet::new(8);
    let mut ambiguous = [false; 6];

    for &(a, b) in &EDGE_CORNERS {
        match (is_positive(config, a), is_positive(config, b)) {
            (true, true) => positive.union(a as usize, b as usize),
            (false, false) => negative.union(a as usize, b as usize),
            _ => {}
        }
    }

    for f in 0..6 {
        let c = FACE_CORNERS[f];
        let e = FACE_EDGES[f];
        let s = c.map(|corner| is_positive(config, corner));
        let mut link = |from: usize, to: usize| {
            next[e[from] as usize] = e[to];
            segment[e[from] as usize] = (f as u8, c[from], c[(from + 1) % 4]);
        };
        let crossings = (0..4).filter(|&k| s[k] != s[(k + 1) % 4]).count();
        match crossings {
            2 => {
                let start = (0..4).find(|&k| s[k] && !s[(k + 1) % 4]);
                let end = (0..4).find(|&k| !s[k] && s[(k + 1) % 4]);
                if let (Some(start), Some(end)) = (start, end) {
                    link(start, end);
                }
            }
            4 => {
                ambiguous[f] = true;
                let p = if s[0] { 0 } else { 1 };
                if joined_faces >> f & 1 == 1 {
                    link(p, p + 1);
                    link(p + 2, (p + 3) % 4);
                    positive.union(c[p] as usize, c[p + 2] as usize);
                } else {
                    link(p, (p + 3) % 4);
                    link(p + 2, p + 1);
                    negative.union(c[p + 1] as usize, c[(p + 3) % 4] as usize);
                }
            }
            _ => {}
        }
    }

    let mut visited = [false; 12];
    let mut loops = Vec::new();
    for first in 0..12 {
        if next[first] == NO_EDGE || visited[first] {
            continue;
        }
        let mut edges = Vec::new();
        let mut segments_on_face = [0u8; 6];
        let mut e = first;
        while !visited[e] {
            visited[e] = true;
            edges.push(e as u8);
            segments_on_face[segment[e].0 as usize] += 1;
            e = next[e] as usize;
        }
        let (_, positive_corner, negative_corner) = segment[first];
        loops.push(EdgeLoop {
            edges,
            positive_corner,
            positive_region: positive.find(positive_corner as usize) as u8,
            negative_corner,
            negative_region: negative.find(negative_corner as usize) as u8,
            needs_center: (0..6).any(|f| ambiguous[f] && segments_on_face[f] == 2),
        });
    }

    let tunnels = if interior_test {
        tunnel_candidates(&loops)
    } else {
        Vec::new()
    };
    Template { loops, tunnels }
}

fn tunnel_candidates(loops: &[EdgeLoop]) -> Vec<TunnelCandidate> {
    let mut candidates = Vec::new();
    for positive in [true, false] {
        let region = |l: &EdgeLoop| {
            if positive {
                l.positive_region
            } else {
                l.negative_region
            }
        };
        let corner = |l: &EdgeLoop| {
            if positive {
                l.positive_corner
            } else {
                l.negative_corner
            }
        };
        // Only regions bounded by a single loop can be joined by a tube
        let simple = |r: u8| loops.iter().filter(|l| region(l) == r).count() == 1;
        for i in 0..loops.len() {
            for j in i + 1..loops.len() {
                let (ri, rj) = (region(&loops[i]), region(&loops[j]));
                if ri != rj && simple(ri) && simple(rj) {
                    candidates.push(TunnelCandidate {
                        loops: (i, j),
                        corners: (corner(&loops[i]), corner(&loops[j])),
                        positive,
                    });
                }
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_of(corners: &[u8]) -> u8 {
        corners.iter().fold(0, |c, &k| c | 1 << k)
    }

    #[test]
    fn test_face_edges_match_corners() {
        for f in 0..6 {
            for k in 0..4 {
                let (a, b) = (FACE_CORNERS[f][k], FACE_CORNERS[f][(k + 1) % 4]);
                let (p, q) = EDGE_CORNERS[FACE_EDGES[f][k] as usize];
                assert!((a, b) == (p, q) || (a, b) == (q, p), "face {} edge {}", f, k);
            }
        }
    }

    #[test]
    fn test_every_edge_on_two_faces_in_opposite_directions() {
        for e in 0..12u8 {
            let uses: Vec<(u8, u8)> = (0..6)
                .flat_map(|f| (0..4).map(move |k| (f, k)))
                .filter(|&(f, k)| FACE_EDGES[f][k] == e)
                .map(|(f, k)| (FACE_CORNERS[f][k], FACE_CORNERS[f][(k + 1) % 4]))
                .collect();
            assert_eq!(uses.len(), 2);
            assert_eq!(uses[0], (uses[1].1, uses[1].0));
        }
    }

    #[test]
    fn test_case_counts() {
        // Number of configurations per base case under rotation and complement
        let expected = [2, 16, 24, 24, 8, 48, 48, 16, 6, 8, 6, 12, 24, 2, 12];
        let mut counts = [0usize; 15];
        for config in 0..=255u8 {
            counts[base_case(config) as usize] += 1;
        }
        assert_eq!(counts, expected);
    }

    #[test]
    fn test_representative_cases() {
        assert_eq!(base_case(config_of(&[0])), 1);
        assert_eq!(base_case(config_of(&[0, 1])), 2);
        assert_eq!(base_case(config_of(&[0, 2])), 3);
        assert_eq!(base_case(config_of(&[0, 6])), 4);
        assert_eq!(base_case(config_of(&[0, 1, 2])), 5);
        assert_eq!(base_case(config_of(&[0, 1, 6])), 6);
        assert_eq!(base_case(config_of(&[1, 3, 4])), 7);
        assert_eq!(base_case(config_of(&[0, 1, 2, 3])), 8);
        assert_eq!(base_case(config_of(&[0, 1, 3, 4])), 9);
        assert_eq!(base_case(config_of(&[0, 1, 6, 7])), 10);
        assert_eq!(base_case(config_of(&[0, 1, 2, 7])), 12);
        assert_eq!(base_case(config_of(&[0, 2, 5, 7])), 13);
        // Mirror images
        let a = base_case(config_of(&[0, 1, 2, 6]));
        let b = base_case(config_of(&[1, 0, 3, 7]));
        assert_eq!([a.min(b), a.max(b)], [11, 14]);
    }

    #[test]
    fn test_complement_has_same_case() {
        for config in 0..=255u8 {
            assert_eq!(base_case(config), base_case(!config));
        }
    }

    #[test]
    fn test_ambiguous_faces() {
        let table = CaseTable::get();
        assert_eq!(table.entry(config_of(&[0, 2])).ambiguous_faces, 0b000001);
        assert_eq!(table.entry(config_of(&[0, 6])).ambiguous_faces, 0);
        assert_eq!(table.entry(config_of(&[0, 2, 5, 7])).ambiguous_faces, 0b111111);
        assert_eq!(table.entry(config_of(&[0, 1, 6, 7])).ambiguous_faces, 0b110000);
    }

    #[test]
    fn test_template_count() {
        let table = CaseTable::get();
        let expected: usize = (0..=255u8)
            .map(|c| 1usize << table.entry(c).ambiguous_faces.count_ones())
            .sum();
        assert_eq!(table.template_count(), expected);
    }

    #[test]
    fn test_loops_cover_crossed_edges_once() {
        let table = CaseTable::get();
        for config in 0..=255u8 {
            let entry = table.entry(config);
            for joined in 0..64u8 {
                let template = table.template(config, joined);
                let mut mask = 0u16;
                for l in &template.loops {
                    assert!(l.edges.len() >= 3, "config {} has a short loop", config);
                    for &e in &l.edges {
                        assert_eq!(mask >> e & 1, 0);
                        mask |= 1 << e;
                    }
                }
                assert_eq!(mask, entry.edge_mask);
            }
        }
    }

    #[test]
    fn test_single_corner_loop_orientation() {
        let template = CaseTable::get().template(config_of(&[0]), 0);
        assert_eq!(template.loops.len(), 1);
        let l = &template.loops[0];
        // e3 -> e0 -> e8 turns counter-clockwise around corner 0 seen from outside
        let start = l.edges.iter().position(|&e| e == 3).unwrap();
        let rotated: Vec<u8> = (0..3).map(|i| l.edges[(start + i) % 3]).collect();
        assert_eq!(rotated, vec![3, 0, 8]);
        assert_eq!(l.positive_corner, 0);
        assert!(!l.needs_center);
    }

    #[test]
    fn test_face_diagonal_separated_and_joined() {
        let table = CaseTable::get();
        let config = config_of(&[0, 2]);
        let separated = table.template(config, 0);
        assert_eq!(separated.loops.len(), 2);
        assert!(separated.tunnels.is_empty());

        let joined = table.template(config, 1);
        assert_eq!(joined.loops.len(), 1);
        assert_eq!(joined.loops[0].edges.len(), 6);
        assert!(joined.loops[0].needs_center);
    }

    #[test]
    fn test_body_diagonal_has_positive_tunnel_candidate() {
        let template = CaseTable::get().template(config_of(&[0, 6]), 0);
        assert_eq!(template.loops.len(), 2);
        assert_eq!(template.tunnels.len(), 1);
        let tunnel = template.tunnels[0];
        assert!(tunnel.positive);
        let mut corners = [tunnel.corners.0, tunnel.corners.1];
        corners.sort_unstable();
        assert_eq!(corners, [0, 6]);
    }
}
