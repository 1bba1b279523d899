//! Bot input synthesis
//!
//! The bot is a pure function of the car and ball: chase the ball, boost on
//! long straights, handbrake through wide angles, hop when the ball is
//! overhead. Inputs are regenerated every tick before integration.

use crate::sim::car::normalize_signed_deg;
use crate::sim::constants::BOT_STEER_NORMALIZATION;
use crate::types::{BallState, CarInput, CarState};

pub fn input_for(car: &CarState, ball: &BallState) -> CarInput {
    let dx = ball.position.x - car.position.x;
    let dy = ball.position.y - car.position.y;
    let dz = ball.position.z - car.position.z;
    let dist2d = dx.hypot(dy);

    let target_yaw = dy.atan2(dx).to_degrees();
    let delta = normalize_signed_deg(target_yaw - car.rotation.yaw);
    let steer = (delta / BOT_STEER_NORMALIZATION).clamp(-1.0, 1.0);

    let throttle = if delta.abs() > 120.0 { -0.25 } else { 1.0 };
    let boost = delta.abs() < 12.0 && dist2d > 600.0 && car.boost > 15.0;
    let handbrake = delta.abs() > 75.0;
    let jump = car.is_grounded && dist2d < 250.0 && dz > 110.0;

    CarInput {
        throttle,
        steer,
        boost,
        jump,
        handbrake,
        ..CarInput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::constants::{BALL_RADIUS, CAR_RADIUS};
    use crate::types::Vec3;

    fn car_at(position: Vec3, yaw: f64, boost: f64) -> CarState {
        CarState {
            position,
            rotation: crate::types::Rotator {
                yaw,
                ..Default::default()
            },
            boost,
            is_grounded: true,
            ..CarState::default()
        }
    }

    fn ball_at(position: Vec3) -> BallState {
        BallState {
            position,
            velocity: Vec3::default(),
            radius: BALL_RADIUS,
        }
    }

    #[test]
    fn bot_boosts_on_aligned_long_chase() {
        let car = car_at(Vec3::new(-2000.0, 0.0, CAR_RADIUS), 0.0, 100.0);
        let ball = ball_at(Vec3::new(0.0, 0.0, BALL_RADIUS));
        let input = input_for(&car, &ball);
        assert_eq!(input.throttle, 1.0);
        assert!(input.boost);
        assert!(!input.handbrake);
        assert!(!input.jump);
    }

    #[test]
    fn bot_reverses_when_ball_is_behind() {
        let car = car_at(Vec3::new(0.0, 0.0, CAR_RADIUS), 0.0, 100.0);
        let ball = ball_at(Vec3::new(-1000.0, 10.0, BALL_RADIUS));
        let input = input_for(&car, &ball);
        assert_eq!(input.throttle, -0.25);
        assert!(input.handbrake);
        assert!(!input.boost);
    }

    #[test]
    fn bot_jumps_for_overhead_ball() {
        let car = car_at(Vec3::new(0.0, 0.0, CAR_RADIUS), 0.0, 100.0);
        let ball = ball_at(Vec3::new(100.0, 0.0, 400.0));
        let input = input_for(&car, &ball);
        assert!(input.jump);
    }
}
