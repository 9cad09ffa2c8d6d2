// ==============================================================================
// lean.rs — PLAYER LEAN TARGET ACCUMULATION
// ------------------------------------------------------------------------------
// The player never sets the lean directly. Holding horizontal input walks the
// target toward input * max_lean at accumulation_rate deg/s. Releasing decays
// it to upright at decay_rate deg/s. Reversing first decays to zero, then
// snaps through into the new direction on the same tick it reaches zero.
// ==============================================================================

use crate::config::LeanInputConfig;
use crate::tyre::types::move_towards;

const ZERO_SNAP: f32 = 1e-4;

pub fn accumulate_lean(current: f32, horizontal: f32, cfg: &LeanInputConfig, dt: f32) -> f32 {
    let accumulation_step = cfg.accumulation_rate * dt;
    let decay_step = cfg.decay_rate * dt;

    let next = if horizontal.abs() > cfg.input_deadzone {
        let goal = horizontal * cfg.max_lean_angle;
        let reversing = current != 0.0 && current.signum() != goal.signum();

        if !reversing {
            move_towards(current, goal, accumulation_step)
        } else {
            let decayed = move_towards(current, 0.0, decay_step);
            if decayed.abs() < ZERO_SNAP {
                move_towards(0.0, goal, accumulation_step)
            } else {
                decayed
            }
        }
    } else {
        move_towards(current, 0.0, decay_step)
    };

    next.clamp(-cfg.max_lean_angle, cfg.max_lean_angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DT: f32 = 0.02;

    fn cfg_40() -> LeanInputConfig {
        LeanInputConfig { max_lean_angle: 40.0, accumulation_rate: 30.0, ..LeanInputConfig::default() }
    }

    #[test]
    fn full_input_reaches_max_in_four_thirds_of_a_second() {
        let cfg = cfg_40();
        let mut lean = 0.0;
        let mut reached_at = None;
        // hold full right for two seconds
        for tick in 1..=100 {
            lean = accumulate_lean(lean, 1.0, &cfg, DT);
            if reached_at.is_none() && (lean - 40.0).abs() < 1e-3 {
                reached_at = Some(tick as f32 * DT);
            }
            assert!(lean <= 40.0);
        }
        let t = reached_at.unwrap();
        assert!((1.30..=1.36).contains(&t), "reached at {t}");
        assert_eq!(lean, 40.0);
    }

    #[test]
    fn release_decays_at_decay_rate() {
        let cfg = cfg_40();
        let lean = accumulate_lean(20.0, 0.0, &cfg, 1.0);
        assert_abs_diff_eq!(lean, 5.0, epsilon = 1e-5);
        assert_eq!(accumulate_lean(0.1, 0.0, &cfg, 1.0), 0.0);
    }

    #[test]
    fn reversal_decays_then_snaps_through_zero() {
        let cfg = cfg_40();
        // leaning right, player pushes left
        let lean = accumulate_lean(10.0, -1.0, &cfg, 0.5);
        assert_abs_diff_eq!(lean, 2.5, epsilon = 1e-5);
        // this step reaches zero and carries on left
        let lean = accumulate_lean(lean, -1.0, &cfg, 0.5);
        assert_abs_diff_eq!(lean, -15.0, epsilon = 1e-5);
    }

    #[test]
    fn partial_input_caps_lower() {
        let cfg = cfg_40();
        let mut lean = 0.0;
        for _ in 0..200 {
            lean = accumulate_lean(lean, 0.5, &cfg, DT);
        }
        assert_abs_diff_eq!(lean, 20.0, epsilon = 1e-4);
    }
}
