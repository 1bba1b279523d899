//! Car integrator - semi-implicit Euler, single substep per tick

use crate::sim::constants::*;
use crate::types::{CarInput, CarState};

/// Jump bookkeeping per car. Not replicated.
#[derive(Debug, Clone, Copy, Default)]
pub struct JumpContext {
    pub used_jumps: u8,
    pub time_since_jump: f64,
    pub hold_time: f64,
    pub sticky_time: f64,
}

/// Clamp analog axes into their legal range. Unknown players are accepted
/// upstream, so this is the only input validation the world performs.
pub fn clamp_input(mut input: CarInput) -> CarInput {
    input.throttle = input.throttle.clamp(-1.0, 1.0);
    input.steer = input.steer.clamp(-1.0, 1.0);
    input
}

/// Advance one car by `dt` seconds.
pub fn integrate(car: &mut CarState, input: &CarInput, prev: &CarInput, jc: &mut JumpContext, dt: f64) {
    let speed2d = car.velocity.x.hypot(car.velocity.y);
    let turn_scale = 1.0 - (speed2d / MAX_BOOST_SPEED).min(0.75);
    let mut turn_rate = TURN_RATE * (0.55 + turn_scale);
    if input.handbrake && car.is_grounded {
        turn_rate *= HANDBRAKE_TURN_BOOST;
    }
    car.rotation.yaw += input.steer * turn_rate * dt * 180.0 / std::f64::consts::PI;
    car.rotation.yaw = normalize_deg(car.rotation.yaw);
    let yaw_rad = car.rotation.yaw.to_radians();

    let forward_x = yaw_rad.cos();
    let forward_y = yaw_rad.sin();
    let right_x = -forward_y;
    let right_y = forward_x;

    let mut forward_speed = car.velocity.x * forward_x + car.velocity.y * forward_y;
    let mut lateral_speed = car.velocity.x * right_x + car.velocity.y * right_y;

    let accel = if car.is_grounded {
        if input.throttle * forward_speed < 0.0 {
            input.throttle * BRAKE_ACCEL
        } else {
            input.throttle * THROTTLE_ACCEL
        }
    } else if input.throttle >= 0.0 {
        input.throttle * AIR_THROTTLE_ACCEL
    } else {
        input.throttle * AIR_REVERSE_ACCEL
    };
    forward_speed += accel * dt;

    let using_boost = input.boost && car.boost > 0.0;
    if using_boost && input.throttle > 0.0 {
        forward_speed += BOOST_ACCEL * dt;
        car.boost = (car.boost - 34.0 * dt).max(0.0);
    } else {
        car.boost = (car.boost + 8.0 * dt).min(100.0);
    }

    if input.throttle.abs() < 0.05 && car.is_grounded {
        forward_speed *= COAST_FRICTION;
    }

    let max_speed = if using_boost { MAX_CAR_SPEED } else { MAX_DRIVE_SPEED };
    forward_speed = forward_speed.clamp(-MAX_CAR_SPEED, max_speed);

    if car.is_grounded {
        let grip = if input.handbrake { HANDBRAKE_GRIP } else { LATERAL_GRIP };
        lateral_speed *= grip;
    } else {
        lateral_speed *= 0.985;
    }

    car.velocity.x = forward_x * forward_speed + right_x * lateral_speed;
    car.velocity.y = forward_y * forward_speed + right_y * lateral_speed;

    let jump_pressed = input.jump && !prev.jump;
    let mut did_first_jump = false;
    if car.is_grounded {
        *jc = JumpContext::default();
    }
    if jump_pressed && jc.used_jumps == 0 && car.is_grounded {
        car.velocity.z += JUMP_VELOCITY;
        car.is_grounded = false;
        jc.used_jumps = 1;
        jc.time_since_jump = 0.0;
        jc.hold_time = 0.0;
        jc.sticky_time = STICKY_TIME;
        did_first_jump = true;
    }
    if jc.used_jumps > 0 && !car.is_grounded {
        jc.time_since_jump += dt;
        if input.jump && jc.hold_time < JUMP_HOLD_MAX && jc.used_jumps == 1 {
            car.velocity.z += JUMP_HOLD_ACCEL * dt;
            jc.hold_time += dt;
        }
        if jc.sticky_time > 0.0 {
            car.velocity.z -= STICKY_FORCE * dt;
            jc.sticky_time -= dt;
        }
        if jump_pressed && !did_first_jump && jc.used_jumps == 1 && jc.time_since_jump <= DOUBLE_JUMP_MAX {
            car.velocity.z += JUMP_VELOCITY;
            let mut dodge_x = forward_x * input.throttle + right_x * input.steer;
            let mut dodge_y = forward_y * input.throttle + right_y * input.steer;
            let mag = dodge_x.hypot(dodge_y);
            if mag < 0.1 {
                // Neutral stick dodges straight forward.
                dodge_x = forward_x;
                dodge_y = forward_y;
            } else {
                dodge_x /= mag;
                dodge_y /= mag;
            }
            car.velocity.x += dodge_x * 500.0;
            car.velocity.y += dodge_y * 500.0;
            jc.used_jumps = 2;
            jc.hold_time = JUMP_HOLD_MAX;
            jc.sticky_time = 0.0;
        }
    }

    car.velocity.z += GRAVITY * dt;
    if car.is_grounded {
        car.velocity.x *= GROUND_FRICTION;
        car.velocity.y *= GROUND_FRICTION;
    } else {
        car.velocity.x *= AIR_RESISTANCE;
        car.velocity.y *= AIR_RESISTANCE;
    }

    car.position.x += car.velocity.x * dt;
    car.position.y += car.velocity.y * dt;
    car.position.z += car.velocity.z * dt;

    if car.position.z <= CAR_RADIUS {
        car.position.z = CAR_RADIUS;
        if car.velocity.z < 0.0 {
            car.velocity.z = 0.0;
        }
        car.is_grounded = true;
        jc.sticky_time = 0.0;
    }
    if car.position.z > ARENA_HEIGHT - CAR_RADIUS {
        car.position.z = ARENA_HEIGHT - CAR_RADIUS;
        car.velocity.z *= -0.25;
    }
}

/// Keep the car inside the arena box with an inelastic rebound.
pub fn clamp_bounds(car: &mut CarState) {
    let half_l = ARENA_LENGTH / 2.0;
    let half_w = ARENA_WIDTH / 2.0;

    if car.position.x < -half_l + CAR_RADIUS {
        car.position.x = -half_l + CAR_RADIUS;
        car.velocity.x *= -0.3;
    }
    if car.position.x > half_l - CAR_RADIUS {
        car.position.x = half_l - CAR_RADIUS;
        car.velocity.x *= -0.3;
    }
    if car.position.y < -half_w + CAR_RADIUS {
        car.position.y = -half_w + CAR_RADIUS;
        car.velocity.y *= -0.3;
    }
    if car.position.y > half_w - CAR_RADIUS {
        car.position.y = half_w - CAR_RADIUS;
        car.velocity.y *= -0.3;
    }
}

/// Normalize to [0, 360).
pub fn normalize_deg(mut d: f64) -> f64 {
    while d >= 360.0 {
        d -= 360.0;
    }
    while d < 0.0 {
        d += 360.0;
    }
    d
}

/// Normalize to (-180, 180].
pub fn normalize_signed_deg(mut d: f64) -> f64 {
    while d > 180.0 {
        d -= 360.0;
    }
    while d < -180.0 {
        d += 360.0;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_deg_wraps_into_range() {
        assert_eq!(normalize_deg(0.0), 0.0);
        assert_eq!(normalize_deg(360.0), 0.0);
        assert_eq!(normalize_deg(-90.0), 270.0);
        assert_eq!(normalize_deg(725.0), 5.0);
    }

    #[test]
    fn normalize_signed_deg_wraps_into_range() {
        assert_eq!(normalize_signed_deg(190.0), -170.0);
        assert_eq!(normalize_signed_deg(-190.0), 170.0);
        assert_eq!(normalize_signed_deg(45.0), 45.0);
    }

    #[test]
    fn clamp_input_bounds_analog_axes() {
        let input = clamp_input(CarInput {
            throttle: 4.0,
            steer: -9.0,
            ..CarInput::default()
        });
        assert_eq!(input.throttle, 1.0);
        assert_eq!(input.steer, -1.0);
    }

    #[test]
    fn grounded_car_stays_on_floor_without_jump() {
        let mut car = CarState {
            position: crate::types::Vec3::new(0.0, 0.0, CAR_RADIUS),
            boost: 100.0,
            is_grounded: true,
            ..CarState::default()
        };
        let mut jc = JumpContext::default();
        let input = CarInput {
            throttle: 1.0,
            ..CarInput::default()
        };
        for _ in 0..60 {
            let prev = car.last_input.clone();
            integrate(&mut car, &input, &prev, &mut jc, 1.0 / 120.0);
            car.last_input = input.clone();
        }
        assert_eq!(car.position.z, CAR_RADIUS);
        assert!(car.is_grounded);
    }

    #[test]
    fn brake_accel_applies_against_motion() {
        let mut car = CarState {
            position: crate::types::Vec3::new(0.0, 0.0, CAR_RADIUS),
            velocity: crate::types::Vec3::new(1000.0, 0.0, 0.0),
            boost: 100.0,
            is_grounded: true,
            ..CarState::default()
        };
        let mut jc = JumpContext::default();
        let input = CarInput {
            throttle: -1.0,
            ..CarInput::default()
        };
        let prev = CarInput::default();
        integrate(&mut car, &input, &prev, &mut jc, 1.0 / 120.0);
        // One braking tick sheds far more speed than plain reverse throttle would.
        assert!(car.velocity.x < 1000.0 - BRAKE_ACCEL / 240.0);
    }
}
