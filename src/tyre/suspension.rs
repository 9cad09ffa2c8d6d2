// ==============================================================================
// suspension.rs — RAYCAST SPRING-DAMPER (GROUND CONTACT)
// ------------------------------------------------------------------------------
// Per wheel, per tick:
// - base = body transform applied to the wheel's local offset
// - cast along body -up for max_length + tyre_radius
// - hit:  current = clamp(d - r, 0, max), record contact, grounded
// - miss: current = max, not grounded, force 0, last_length untouched
//
// Grounded force (applied at the base position):
//   spring = up * k * (rest - current)
//   damper = up * c * (last - current) / dt      (skipped when dt == 0)
//   normal = max(0, dot(spring + damper, up))
//
// `spring_damper` is the pure part; `resolve_contact` does the query and the
// force application.
// ==============================================================================

use log::warn;

use crate::host::{GroundQuery, RigidBody};
use crate::tyre::state::WheelState;
use crate::tyre::types::{finite_or_zero, Pos3, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringDamperForce {
    pub spring: Vec3,
    pub damper: Vec3,
    pub total: Vec3,
    pub normal_force: f32,
}

pub fn spring_damper(
    rest_length: f32,
    current_length: f32,
    last_length: f32,
    spring_constant: f32,
    damper_constant: f32,
    up: Vec3,
    dt: f32,
) -> SpringDamperForce {
    let displacement = rest_length - current_length;
    let spring = up * spring_constant * displacement;

    let damper = if dt > 0.0 {
        let velocity = (last_length - current_length) / dt;
        up * damper_constant * velocity
    } else {
        Vec3::zeros()
    };

    let total = spring + damper;
    SpringDamperForce {
        spring,
        damper,
        total,
        normal_force: total.dot(&up).max(0.0),
    }
}

/// What one wheel saw this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactReport {
    pub grounded: bool,
    pub base_position: Pos3,
    pub current_length: f32,
    pub normal_force: f32,
    pub applied_force: Vec3,
}

pub fn resolve_contact<B, G>(wheel: &mut WheelState, body: &mut B, ground: &G, dt: f32) -> ContactReport
where
    B: RigidBody + ?Sized,
    G: GroundQuery + ?Sized,
{
    let up = body.up();
    let base = body.transform_point(&wheel.offset);
    let ray_length = wheel.ray_length();

    let hit = ground
        .cast(base, -up, ray_length)
        .filter(|h| h.distance < ray_length);

    let Some(hit) = hit else {
        wheel.clear_contact();
        return ContactReport {
            grounded: false,
            base_position: base,
            current_length: wheel.current_length,
            normal_force: 0.0,
            applied_force: Vec3::zeros(),
        };
    };

    wheel.is_grounded = true;
    wheel.current_length = (hit.distance - wheel.tyre_radius).clamp(0.0, wheel.max_length);
    wheel.contact_point = hit.point;
    wheel.contact_normal = hit.normal;

    let f = spring_damper(
        wheel.rest_length,
        wheel.current_length,
        wheel.last_length,
        wheel.spring_constant,
        wheel.damper_constant,
        up,
        dt,
    );

    let total = finite_or_zero(f.total);
    if total != f.total {
        warn!("wheel {}: non-finite suspension force dropped", wheel.id);
    }

    wheel.spring_force = f.spring;
    wheel.damper_force = f.damper;
    wheel.normal_force = if total == f.total { f.normal_force } else { 0.0 };
    wheel.last_length = wheel.current_length;

    body.apply_force_at_point(total, base);

    ContactReport {
        grounded: true,
        base_position: base,
        current_length: wheel.current_length,
        normal_force: wheel.normal_force,
        applied_force: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WheelConfig;
    use crate::host::{point, BodyProxy, FlatGround};
    use crate::tyre::types::{WheelId, WORLD_UP};
    use approx::assert_abs_diff_eq;
    use nalgebra::UnitQuaternion;

    fn wheel(rest: f32, max: f32, radius: f32, k: f32, c: f32) -> WheelState {
        WheelState::from_config(&WheelConfig {
            id: WheelId::R,
            offset: [0.0, 0.0, 0.0],
            tyre_radius: radius,
            rest_length: rest,
            max_length: max,
            spring_constant: k,
            damper_constant: c,
            ..WheelConfig::default()
        })
    }

    #[test]
    fn stiffer_spring_pushes_harder() {
        let mut prev = 0.0;
        for k in [100.0, 200.0, 5_000.0, 40_000.0] {
            let f = spring_damper(0.5, 0.3, 0.3, k, 0.0, WORLD_UP, 0.02);
            assert!(f.spring.norm() > prev);
            prev = f.spring.norm();
        }
    }

    #[test]
    fn normal_force_is_never_negative() {
        for current in [0.0, 0.2, 0.5, 0.7] {
            for last in [0.0, 0.35, 0.7] {
                for dt in [0.0, 0.001, 0.02] {
                    let f = spring_damper(0.5, current, last, 9_000.0, 700.0, WORLD_UP, dt);
                    assert!(f.normal_force >= 0.0);
                }
            }
        }
    }

    #[test]
    fn extended_spring_pulls_down() {
        // rest 0.5, max 0.7, ground 0.6 below the base, no tyre radius
        let mut w = wheel(0.5, 0.7, 0.0, 1_000.0, 0.0);
        w.last_length = 0.6;
        let mut body = BodyProxy::new(point(0.0, 0.6, 0.0), UnitQuaternion::identity());
        let ground = FlatGround { height: 0.0 };

        let report = resolve_contact(&mut w, &mut body, &ground, 0.02);

        assert!(report.grounded);
        assert_abs_diff_eq!(w.current_length, 0.6, epsilon = 1e-5);
        assert_abs_diff_eq!(w.compression(), -0.1, epsilon = 1e-5);
        assert_abs_diff_eq!(w.spring_force.y, -100.0, epsilon = 1e-2);
        assert_eq!(report.normal_force, 0.0);
    }

    #[test]
    fn airborne_wheel_keeps_last_length() {
        let mut w = wheel(0.5, 0.7, 0.3, 1_000.0, 50.0);
        w.last_length = 0.42;
        let mut body = BodyProxy::new(point(0.0, 5.0, 0.0), UnitQuaternion::identity());
        let ground = FlatGround { height: 0.0 };

        let report = resolve_contact(&mut w, &mut body, &ground, 0.02);

        assert!(!report.grounded);
        assert_eq!(w.current_length, 0.7);
        assert_eq!(w.last_length, 0.42);
        assert_eq!(w.normal_force, 0.0);
        assert!(body.forces.is_empty());
    }

    #[test]
    fn zero_dt_skips_damper() {
        let f = spring_damper(0.5, 0.4, 0.1, 1_000.0, 1e6, WORLD_UP, 0.0);
        assert_eq!(f.damper, Vec3::zeros());
        assert_abs_diff_eq!(f.normal_force, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn compressed_wheel_pushes_body_up_at_base() {
        let mut w = wheel(0.45, 0.6, 0.33, 9_000.0, 700.0);
        let mut body = BodyProxy::new(point(0.0, 0.6, 0.0), UnitQuaternion::identity());
        let ground = FlatGround { height: 0.0 };

        resolve_contact(&mut w, &mut body, &ground, 0.02);

        assert!(w.is_grounded);
        assert_abs_diff_eq!(w.current_length, 0.27, epsilon = 1e-5);
        assert_eq!(body.forces.len(), 1);
        assert!(body.forces[0].force.y > 0.0);
        assert_abs_diff_eq!(body.forces[0].point.y, 0.6, epsilon = 1e-6);
    }
}
