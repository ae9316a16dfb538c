//! Planar geometry used to classify data points against an analytical envelope.

use nalgebra::Vector2;

/// Ordinate used to close an envelope polygon below every data point.
pub const ENVELOPE_FLOOR: f64 = -1.0e17;

/// Position in the (crack-front angle, SIF magnitude) plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    /// Abscissa, usually a crack-front angle in degrees.
    pub x: f64,
    /// Ordinate, usually a SIF magnitude.
    pub y: f64,
}

impl Point {
    /// Create a [`Point`] with explicit coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert the point into an algebraic vector.
    #[must_use]
    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Point {
    fn from(value: Vector2<f64>) -> Self {
        Self::new(value.x, value.y)
    }
}

impl From<Point> for Vector2<f64> {
    fn from(value: Point) -> Self {
        value.to_vector()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Closed polygon; the last vertex implicitly connects back to the first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Create a polygon from its vertices in traversal order.
    #[must_use]
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    /// Vertices in traversal order.
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Test whether `point` lies inside the polygon by the even-odd rule.
    ///
    /// Points exactly on an edge may fall on either side.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (vi, vj) = (self.vertices[i], self.vertices[j]);
            if (vi.y > point.y) != (vj.y > point.y) {
                let crossing = vj.x + (point.y - vj.y) * (vi.x - vj.x) / (vi.y - vj.y);
                if point.x < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Region between [`ENVELOPE_FLOOR`] and a piecewise linear curve `y(x)`.
///
/// A point is inside when its abscissa lies within the curve's range and its
/// ordinate is at most the curve value there, so points on the curve count
/// as inside. Where the curve has several vertices at one abscissa the
/// highest of them bounds the region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurveRegion {
    curve: Vec<Point>,
}

impl CurveRegion {
    /// Build the region under the curve through `(x[i], y[i])`, in the given order.
    ///
    /// # Examples
    /// ```
    /// use shardx::geometry::{CurveRegion, Point};
    ///
    /// let region = CurveRegion::new(&[0.0, 90.0, 180.0], &[20.0, 5.0, 20.0]);
    /// assert!(region.contains(Point::new(90.0, 5.0)));
    /// assert!(!region.contains(Point::new(90.0, 10.0)));
    /// ```
    #[must_use]
    pub fn new(x: &[f64], y: &[f64]) -> Self {
        let curve = x.iter().zip(y).map(|(&x, &y)| Point::new(x, y)).collect();
        Self { curve }
    }

    /// Vertices of the curve.
    #[must_use]
    pub fn curve(&self) -> &[Point] {
        &self.curve
    }

    /// Highest curve value at abscissa `x`, or `None` outside the curve's range.
    #[must_use]
    pub fn ceiling(&self, x: f64) -> Option<f64> {
        let mut ceiling: Option<f64> = None;
        for vertex in self.curve.iter().filter(|vertex| vertex.x == x) {
            ceiling = Some(ceiling.map_or(vertex.y, |c| c.max(vertex.y)));
        }
        for pair in self.curve.windows(2) {
            let (lo, hi) = if pair[0].x <= pair[1].x {
                (pair[0], pair[1])
            } else {
                (pair[1], pair[0])
            };
            if lo.x < x && x < hi.x {
                let value = lo.y + (x - lo.x) * (hi.y - lo.y) / (hi.x - lo.x);
                ceiling = Some(ceiling.map_or(value, |c| c.max(value)));
            }
        }
        ceiling
    }

    /// Test whether `point` lies under the curve and above the floor.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.y >= ENVELOPE_FLOOR && self.ceiling(point.x).is_some_and(|ceiling| point.y <= ceiling)
    }

    /// Classify every point; the result has one flag per input point.
    #[must_use]
    pub fn contains_points(&self, points: &[Point]) -> Vec<bool> {
        points.iter().map(|point| self.contains(*point)).collect()
    }

    /// Closed outline of the region: the curve padded at both ends with a
    /// vertex at [`ENVELOPE_FLOOR`].
    #[must_use]
    pub fn polygon(&self) -> Polygon {
        let mut vertices = self.curve.clone();
        if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last().copied()) {
            vertices.insert(0, Point::new(first.x, ENVELOPE_FLOOR));
            vertices.push(Point::new(last.x, ENVELOPE_FLOOR));
        }
        Polygon::new(vertices)
    }
}
