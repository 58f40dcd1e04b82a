// THEORY:
// The `TemporalSmoother` is the only stateful stage of the color pipeline. Raw
// per-frame colors jump around with every cut, scroll and flicker on screen; sent
// straight to a bulb they read as strobing. The smoother keeps the last color it
// emitted and blends each new color into it with an exponential moving average,
// so changes fade in over a few frames instead of landing all at once.
//
// Key principles:
// 1.  **Memory only while active**: When smoothing is switched off, colors pass
//     through untouched and the remembered color is left as it was. Switching it
//     back on resumes blending from that older color.
// 2.  **Integer output**: Each blended channel is truncated back to a byte, which
//     is also what gets remembered for the next frame.

use crate::core_modules::pixel::pixel::Rgb;

pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.4;

/// Exponential moving average over successive frame colors.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    /// Weight of the newest color, between 0.0 (frozen) and 1.0 (no smoothing).
    factor: f64,
    /// The last color this smoother produced.
    last: Rgb,
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

impl TemporalSmoother {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            last: Rgb::BLACK,
        }
    }

    /// Blends `color` into the remembered color when `enabled`, otherwise passes it through.
    pub fn apply(&mut self, color: Rgb, enabled: bool) -> Rgb {
        if !enabled {
            return color;
        }

        let blend = |last: u8, new: u8| -> u8 {
            (last as f64 * (1.0 - self.factor) + new as f64 * self.factor) as u8
        };
        let smoothed = Rgb::new(
            blend(self.last.r, color.r),
            blend(self.last.g, color.g),
            blend(self.last.b, color.b),
        );
        self.last = smoothed;
        smoothed
    }

    pub fn last(&self) -> Rgb {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = Rgb::BLACK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_blends_from_black() {
        let mut smoother = TemporalSmoother::default();
        assert_eq!(smoother.apply(Rgb::new(250, 100, 0), true), Rgb::new(100, 40, 0));
    }

    #[test]
    fn converges_toward_a_steady_color() {
        let mut smoother = TemporalSmoother::default();
        let target = Rgb::new(200, 200, 200);
        let mut out = Rgb::BLACK;
        for _ in 0..30 {
            out = smoother.apply(target, true);
        }
        assert!(out.r >= 195 && out.r <= 200);
    }

    #[test]
    fn disabled_passes_through_and_keeps_memory() {
        let mut smoother = TemporalSmoother::default();
        smoother.apply(Rgb::new(100, 100, 100), true);
        assert_eq!(smoother.last(), Rgb::new(40, 40, 40));

        let passed = smoother.apply(Rgb::new(255, 0, 0), false);
        assert_eq!(passed, Rgb::new(255, 0, 0));
        assert_eq!(smoother.last(), Rgb::new(40, 40, 40));
    }

    #[test]
    fn reset_forgets_last_color() {
        let mut smoother = TemporalSmoother::default();
        smoother.apply(Rgb::new(100, 100, 100), true);
        smoother.reset();
        assert_eq!(smoother.last(), Rgb::BLACK);
    }
}
