use std::hash::Hash;

/// A normalized axis-aligned rectangle in Hilbert space.
///
/// `Rect` is used both for the footprint of a single indexed item and for the
/// spatial extent of a quadtree node. Constructors always normalize the
/// corners so that `min_x <= max_x` and `min_y <= max_y`.
///
/// # Examples
///
/// ```rust
/// use quindex::Rect;
///
/// let a = Rect::new(10.0, 10.0, 0.0, 0.0);
/// assert_eq!(a, Rect::new(0.0, 0.0, 10.0, 10.0));
///
/// let b = Rect::new(10.0, 10.0, 20.0, 20.0);
/// assert!(a.intersects(&b)); // touching edges intersect
/// ```
#[derive(Clone, Copy, PartialEq, Default, Debug)]
pub struct Rect {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl Eq for Rect {}

impl Hash for Rect {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.min_x.to_bits().hash(state);
        self.min_y.to_bits().hash(state);
        self.max_x.to_bits().hash(state);
        self.max_y.to_bits().hash(state);
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rect({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl Rect {
    /// Creates a rectangle from two opposite corners, in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect {
        Rect {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// A degenerate rectangle covering a single point.
    pub fn point(x: f64, y: f64) -> Rect {
        Rect::new(x, y, x, y)
    }

    /// Creates the rectangle of a `width` x `height` area around a center.
    pub fn from_center(x: f64, y: f64, width: f64, height: f64) -> Rect {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Rect::new(x - half_w, y - half_h, x + half_w, y + half_h)
    }

    /// Rectangle with inverted bounds, the identity for [`Rect::expand`].
    pub fn empty() -> Rect {
        Rect {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        )
    }

    /// Closed intersection test: rectangles sharing only an edge or a corner
    /// intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    /// Non-strict containment of `other` inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grows `self` to cover `other`.
    pub fn expand(&mut self, other: &Rect) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Grows `self` to cover the point `(x, y)`.
    pub fn expand_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Returns a copy padded by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn from_array(corners: [f64; 4]) -> Rect {
        Rect::new(corners[0], corners[1], corners[2], corners[3])
    }
}

impl From<(f64, f64, f64, f64)> for Rect {
    fn from((x1, y1, x2, y2): (f64, f64, f64, f64)) -> Self {
        Rect::new(x1, y1, x2, y2)
    }
}
