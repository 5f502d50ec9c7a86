//! Affine transforms for user, text, and device space.
//!
//! A 3×3 matrix with an implicit `[0 0 1]` third column, stored as the
//! six PDF numbers `[a b c d e f]`. Points are row vectors, so
//! `m1.concat(&m2)` applies `m1` first, then `m2` — the convention the
//! `cm` operator and text-matrix updates rely on.

/// A point in any of the coordinate spaces the engine works in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    /// Create a matrix from its six numbers.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// The identity matrix.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// A pure translation.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Concatenate: the resulting matrix applies `self` first, then
    /// `other`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform a point.
    pub fn transform(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// The translation component along x.
    pub fn translate_x(&self) -> f64 {
        self.e
    }

    /// The translation component along y.
    pub fn translate_y(&self) -> f64 {
        self.f
    }

    /// Horizontal scaling magnitude, accounting for rotation.
    pub fn scaling_factor_x(&self) -> f64 {
        if self.b != 0.0 {
            (self.a * self.a + self.b * self.b).sqrt()
        } else {
            self.a
        }
    }

    /// Vertical scaling magnitude, accounting for rotation.
    pub fn scaling_factor_y(&self) -> f64 {
        if self.c != 0.0 {
            (self.c * self.c + self.d * self.d).sqrt()
        } else {
            self.d
        }
    }

    /// The matrix as the `[a b c d e f]` array.
    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}
