// ==============================================================================
// drive.rs — THROTTLE INTENT, SMOOTHING, OVERSPEED FADE, TURBO GAUGE
// ------------------------------------------------------------------------------
// target  = vertical axis * sensitivity (buttons override, turbo forces 1)
// current = lerp(current, target, clamp01(dt * input_smoothness))
// above the max-speed threshold positive drive fades linearly and reaches 0
// at threshold * (1 + overspeed_band).
//
// Turbo gauge:
//   active    = requested && !overheated && gauge > 0
//   active    -> drain, overheat at 0
//   otherwise -> recover, overheat clears at gauge_max
// ==============================================================================

use log::info;
use serde::Serialize;

use crate::config::{DriveConfig, TurboConfig};
use crate::host::InputState;
use crate::tyre::types::{clamp01, finite_scalar};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TurboGauge {
    pub gauge: f32,
    pub overheated: bool,
    pub active: bool,
}

impl TurboGauge {
    pub fn full(cfg: &TurboConfig) -> Self {
        Self { gauge: cfg.gauge_max, overheated: false, active: false }
    }

    /// Advance one tick; returns whether turbo boosts this tick.
    pub fn update(&mut self, requested: bool, cfg: &TurboConfig, dt: f32) -> bool {
        self.active = cfg.enabled && requested && !self.overheated && self.gauge > 0.0;

        if self.active {
            self.gauge = (self.gauge - cfg.consume_rate * dt).max(0.0);
            if self.gauge <= 0.0 {
                self.overheated = true;
                info!("turbo overheated");
            }
        } else {
            self.gauge = (self.gauge + cfg.recover_rate * dt).min(cfg.gauge_max);
            if self.overheated && self.gauge >= cfg.gauge_max {
                self.overheated = false;
                info!("turbo recovered");
            }
        }
        self.active
    }
}

/// Raw throttle intent for this tick, before smoothing.
pub fn target_drive(input: &InputState, cfg: &DriveConfig, turbo_active: bool) -> f32 {
    if turbo_active {
        return 1.0;
    }

    let mut target = if input.vertical > 0.0 {
        input.vertical * cfg.acceleration_sensitivity
    } else if input.vertical < 0.0 {
        input.vertical * cfg.brake_sensitivity
    } else {
        0.0
    };

    if input.accelerate {
        target = cfg.acceleration_sensitivity;
    } else if input.brake {
        target = -cfg.brake_sensitivity;
    }

    target.clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveState {
    pub target: f32,
    pub current: f32,
}

impl DriveState {
    /// Smooth toward `target`, then fade positive drive above the speed cap.
    pub fn advance(&mut self, target: f32, speed: f32, max_speed: f32, cfg: &DriveConfig, dt: f32) -> f32 {
        self.target = target;
        let t = clamp01(dt * cfg.input_smoothness);
        self.current = finite_scalar(self.current + (target - self.current) * t);

        let band = max_speed * cfg.overspeed_band;
        if speed > max_speed && self.current > 0.0 && band > 0.0 {
            self.current *= clamp01(1.0 - (speed - max_speed) / band);
        }
        self.current
    }
}
