use std::f32::consts::PI;

use rapier3d::prelude::Real;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicOut,
    SineInOut,
    BackOut,
    BounceOut,
}

impl Easing {
    /// Map normalized time in `[0, 1]` to progress. Input is clamped; overshooting curves
    /// (`BackOut`) may leave `[0, 1]` in between but always end at exactly `1`.
    pub fn apply(self, t: Real) -> Real {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) * 0.5
                }
            }
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::SineInOut => -((PI * t).cos() - 1.0) * 0.5,
            Easing::BackOut => {
                const C1: Real = 1.70158;
                const C3: Real = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
            Easing::BounceOut => bounce_out(t),
        }
    }
}

fn bounce_out(t: Real) -> Real {
    const N1: Real = 7.5625;
    const D1: Real = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Easing; 8] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicOut,
        Easing::SineInOut,
        Easing::BackOut,
        Easing::BounceOut,
    ];

    #[test]
    fn curves_start_at_zero_and_end_at_one() {
        for easing in ALL {
            assert_abs_diff_eq!(easing.apply(0.0), 0.0, epsilon = 1.0e-5);
            assert_abs_diff_eq!(easing.apply(1.0), 1.0, epsilon = 1.0e-5);
            assert_abs_diff_eq!(easing.apply(2.0), 1.0, epsilon = 1.0e-5);
        }
    }

    #[test]
    fn back_out_overshoots() {
        assert!(Easing::BackOut.apply(0.6) > 1.0);
    }
}
