/// Axis-aligned bounding boxes in map coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    pub fn contains_point(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    pub fn contains(&self, other: &Aabb2) -> bool {
        other.min[0] >= self.min[0]
            && other.min[1] >= self.min[1]
            && other.max[0] <= self.max[0]
            && other.max[1] <= self.max[1]
    }

    pub fn intersects(&self, other: &Aabb2) -> bool {
        !(other.min[0] > self.max[0]
            || other.max[0] < self.min[0]
            || other.min[1] > self.max[1]
            || other.max[1] < self.min[1])
    }

    /// Grow (or shrink) around the center so each side is `ratio` times as long.
    pub fn scale(&self, ratio: f64) -> Self {
        let [cx, cy] = self.center();
        let hw = self.width() * ratio / 2.0;
        let hh = self.height() * ratio / 2.0;
        Aabb2::new([cx - hw, cy - hh], [cx + hw, cy + hh])
    }
}
