//! Ball integrator and arena bounds response

use crate::sim::constants::*;
use crate::types::BallState;

/// Advance the ball by `dt` seconds: gravity, drag, speed cap.
pub fn integrate(ball: &mut BallState, dt: f64) {
    ball.velocity.z += GRAVITY * dt;
    ball.position.x += ball.velocity.x * dt;
    ball.position.y += ball.velocity.y * dt;
    ball.position.z += ball.velocity.z * dt;

    // Rolling drag near the floor, lighter drag in flight.
    if ball.position.z <= ball.radius + 8.0 {
        ball.velocity.x *= 0.9975;
        ball.velocity.y *= 0.9975;
    } else {
        ball.velocity.x *= 0.9995;
        ball.velocity.y *= 0.9995;
    }
    ball.velocity.z *= 0.9994;

    let speed = ball.velocity.length();
    if speed > BALL_MAX_SPEED {
        let scale = BALL_MAX_SPEED / speed;
        ball.velocity.x *= scale;
        ball.velocity.y *= scale;
        ball.velocity.z *= scale;
    }
}

/// Reflect off floor, ceiling and side walls. The X walls do not reflect
/// while the ball is inside a goal mouth, which is the only way out of
/// bounds.
pub fn clamp_bounds(ball: &mut BallState) {
    let half_l = ARENA_LENGTH / 2.0;
    let half_w = ARENA_WIDTH / 2.0;

    if ball.position.z < ball.radius {
        ball.position.z = ball.radius;
        ball.velocity.z = -ball.velocity.z * BALL_RESTITUTION;
    }
    if ball.position.z > ARENA_HEIGHT - ball.radius {
        ball.position.z = ARENA_HEIGHT - ball.radius;
        ball.velocity.z = -ball.velocity.z * BALL_RESTITUTION;
    }

    let in_goal_y = ball.position.y.abs() <= GOAL_WIDTH / 2.0;
    let in_goal_z = ball.position.z <= GOAL_HEIGHT;

    if !in_goal_y || !in_goal_z {
        if ball.position.x < -half_l + ball.radius {
            ball.position.x = -half_l + ball.radius;
            ball.velocity.x = -ball.velocity.x * WALL_RESTITUTION;
        }
        if ball.position.x > half_l - ball.radius {
            ball.position.x = half_l - ball.radius;
            ball.velocity.x = -ball.velocity.x * WALL_RESTITUTION;
        }
    }
    if ball.position.y < -half_w + ball.radius {
        ball.position.y = -half_w + ball.radius;
        ball.velocity.y = -ball.velocity.y * WALL_RESTITUTION;
    }
    if ball.position.y > half_w - ball.radius {
        ball.position.y = half_w - ball.radius;
        ball.velocity.y = -ball.velocity.y * WALL_RESTITUTION;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    fn ball_at(position: Vec3, velocity: Vec3) -> BallState {
        BallState {
            position,
            velocity,
            radius: BALL_RADIUS,
        }
    }

    #[test]
    fn speed_is_capped_after_update() {
        let mut ball = ball_at(Vec3::new(0.0, 0.0, 500.0), Vec3::new(9000.0, 0.0, 0.0));
        integrate(&mut ball, 1.0 / 120.0);
        assert!(ball.velocity.length() <= BALL_MAX_SPEED + 1e-9);
    }

    #[test]
    fn floor_bounce_uses_ball_restitution() {
        let mut ball = ball_at(Vec3::new(0.0, 0.0, 50.0), Vec3::new(0.0, 0.0, -1000.0));
        clamp_bounds(&mut ball);
        assert_eq!(ball.position.z, BALL_RADIUS);
        assert!((ball.velocity.z - 1000.0 * BALL_RESTITUTION).abs() < 1e-9);
    }

    #[test]
    fn x_wall_reflects_outside_goal_mouth() {
        let mut ball = ball_at(
            Vec3::new(ARENA_LENGTH / 2.0 + 10.0, GOAL_WIDTH, 300.0),
            Vec3::new(800.0, 0.0, 0.0),
        );
        clamp_bounds(&mut ball);
        assert!(ball.position.x <= ARENA_LENGTH / 2.0 - BALL_RADIUS + 1e-9);
        assert!(ball.velocity.x < 0.0);
    }

    #[test]
    fn x_wall_open_inside_goal_mouth() {
        let mut ball = ball_at(
            Vec3::new(ARENA_LENGTH / 2.0 + 10.0, 0.0, 100.0),
            Vec3::new(800.0, 0.0, 0.0),
        );
        clamp_bounds(&mut ball);
        // Ball keeps travelling into the goal tunnel.
        assert!(ball.position.x > ARENA_LENGTH / 2.0);
        assert!(ball.velocity.x > 0.0);
    }
}
