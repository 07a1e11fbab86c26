//! Screen-space geometry primitives.

use dem_common::Rgba;

/// A projected point: canvas x/y, depth z (greater is nearer) and color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub color: Rgba,
}

impl Vertex {
    pub fn new(x: f64, y: f64, z: f64, color: Rgba) -> Self {
        Self { x, y, z, color }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vertex,
    pub v1: Vertex,
    pub v2: Vertex,
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self { v0, v1, v2 }
    }

    /// Twice the signed area in screen space.
    #[inline]
    pub fn doubled_area(&self) -> f64 {
        (self.v1.x - self.v0.x) * (self.v2.y - self.v0.y)
            - (self.v2.x - self.v0.x) * (self.v1.y - self.v0.y)
    }
}

/// Ordered vertices where every vertex after the second closes a triangle
/// with the two before it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleStrip {
    vertices: Vec<Vertex>,
}

impl TriangleStrip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(capacity),
        }
    }

    pub fn reset(&mut self) {
        self.vertices.clear();
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len().saturating_sub(2)
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangle `index`, made of vertices `index`, `index + 1`, `index + 2`.
    pub fn triangle(&self, index: usize) -> Option<Triangle> {
        if index >= self.triangle_count() {
            return None;
        }
        Some(Triangle::new(
            self.vertices[index],
            self.vertices[index + 1],
            self.vertices[index + 2],
        ))
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.vertices
            .windows(3)
            .map(|w| Triangle::new(w[0], w[1], w[2]))
    }
}

/// A segment between two vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub v0: Vertex,
    pub v1: Vertex,
}

impl Edge {
    pub fn new(v0: Vertex, v1: Vertex) -> Self {
        Self { v0, v1 }
    }
}

/// Wireframe geometry: an ordered run of edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    edges: Vec<Edge>,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Connect consecutive vertices into edges.
    pub fn from_points(points: &[Vertex]) -> Self {
        Self {
            edges: points.windows(2).map(|w| Edge::new(w[0], w[1])).collect(),
        }
    }
}

/// A closed path made of one or more contours, filled with the even-odd rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanlinePath {
    contours: Vec<Vec<Vertex>>,
}

impl ScanlinePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new contour; following vertices are appended to it.
    pub fn begin_contour(&mut self) {
        self.contours.push(Vec::new());
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        match self.contours.last_mut() {
            Some(contour) => contour.push(vertex),
            None => self.contours.push(vec![vertex]),
        }
    }

    pub fn contours(&self) -> &[Vec<Vertex>] {
        &self.contours
    }

    /// Every closing edge of every contour with at least three vertices.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.contours
            .iter()
            .filter(|c| c.len() >= 3)
            .flat_map(|c| (0..c.len()).map(move |i| Edge::new(c[i], c[(i + 1) % c.len()])))
    }

    /// (min_y, max_y) over all vertices.
    pub fn vertical_extent(&self) -> Option<(f64, f64)> {
        self.contours.iter().flatten().fold(None, |acc, v| match acc {
            None => Some((v.y, v.y)),
            Some((lo, hi)) => Some((lo.min(v.y), hi.max(v.y))),
        })
    }
}

impl From<Vec<Vertex>> for ScanlinePath {
    fn from(vertices: Vec<Vertex>) -> Self {
        Self {
            contours: vec![vertices],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> Vertex {
        Vertex::new(i as f64, 0.0, 0.0, Rgba::BLACK)
    }

    #[test]
    fn test_triangle_count() {
        let mut strip = TriangleStrip::new();
        for n in 0..6 {
            assert_eq!(strip.triangle_count(), n.max(2) - 2);
            strip.add_vertex(v(n));
        }
        assert_eq!(strip.triangle_count(), 4);
    }

    #[test]
    fn test_triangle_vertices_in_order() {
        let mut strip = TriangleStrip::new();
        (0..5).for_each(|i| strip.add_vertex(v(i)));

        for i in 0..strip.triangle_count() {
            let t = strip.triangle(i).unwrap();
            assert_eq!((t.v0, t.v1, t.v2), (v(i), v(i + 1), v(i + 2)));
        }
        assert!(strip.triangle(3).is_none());
        assert_eq!(strip.triangles().count(), 3);
    }

    #[test]
    fn test_reset_clears() {
        let mut strip = TriangleStrip::new();
        (0..4).for_each(|i| strip.add_vertex(v(i)));
        strip.reset();
        assert_eq!(strip.vertex_count(), 0);
        assert!(strip.is_empty());
    }

    #[test]
    fn test_path_edges_close_contours() {
        let path = ScanlinePath::from(vec![v(0), v(1), v(2)]);
        let edges: Vec<Edge> = path.edges().collect();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], Edge::new(v(2), v(0)));
    }

    #[test]
    fn test_line_from_points() {
        let line = Line::from_points(&[v(0), v(1), v(2)]);
        assert_eq!(line.len(), 2);
        assert_eq!(line.edges()[1], Edge::new(v(1), v(2)));
    }
}
