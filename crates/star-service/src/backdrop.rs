//! The twinkling star field drawn behind the public pages.

pub const STAR_COUNT: usize = 40;

pub struct Star {
    /// Percent of the viewport height.
    pub top: f32,
    /// Percent of the viewport width.
    pub left: f32,
    /// Seconds per twinkle cycle.
    pub duration: f32,
}

pub fn generate() -> Vec<Star> {
    (0..STAR_COUNT)
        .map(|_| Star {
            top: rand::random_range(0.0..100.0),
            left: rand::random_range(0.0..100.0),
            duration: rand::random_range(2.0..5.0),
        })
        .collect()
}
