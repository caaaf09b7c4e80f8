/// A detected face's bounding box in native video-pixel coordinates.
///
/// Produced fresh by every detection pass and never mutated; the render loop
/// discards it once the frame it describes has been drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRegion {
    pub top_left: (f64, f64),
    pub bottom_right: (f64, f64),
}

impl FaceRegion {
    pub fn new(top_left: (f64, f64), bottom_right: (f64, f64)) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    pub fn width(&self) -> f64 {
        self.bottom_right.0 - self.top_left.0
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.1 - self.top_left.1
    }
}
