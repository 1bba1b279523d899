//! Authoritative match state and the fixed-step tick

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use crate::sim::ball;
use crate::sim::bot;
use crate::sim::car::{self, JumpContext};
use crate::sim::constants::*;
use crate::types::{
    BallState, CarInput, CarState, GameplayEvent, GameplayEventKind, MatchState, Rotator,
    ScoreState, Team, Vec3,
};
use crate::util::id::next_id;
use crate::util::time::unix_millis;

/// Initial player details at match creation.
#[derive(Debug, Clone)]
pub struct PlayerSpawn {
    pub player_id: String,
    pub display_name: String,
    pub team: Team,
}

/// Wall-clock stamps of the last shot-on-goal credit per team, used to
/// rate-limit the heuristic to one event per team per 700 ms.
#[derive(Debug, Default)]
struct ShotClock {
    orange_ms: i64,
    blue_ms: i64,
}

impl ShotClock {
    fn last(&self, team: Team) -> i64 {
        match team {
            Team::Orange => self.orange_ms,
            Team::Blue => self.blue_ms,
        }
    }

    fn stamp(&mut self, team: Team, now: i64) {
        match team {
            Team::Orange => self.orange_ms = now,
            Team::Blue => self.blue_ms = now,
        }
    }
}

struct Inner {
    state: MatchState,
    /// Latest input per player, last-writer-wins. May reference players that
    /// have not been ensured yet.
    input: HashMap<String, CarInput>,
    jump: HashMap<String, JumpContext>,
    shot_clock: ShotClock,
}

/// The authoritative simulation world. All mutating methods take the write
/// lock; `snapshot` and the membership observers take the read lock. Locked
/// sections never perform I/O.
pub struct World {
    inner: RwLock<Inner>,
}

impl World {
    /// Create a world at kickoff with the given roster.
    pub fn new(match_id: impl Into<String>, duration: Duration, players: &[PlayerSpawn]) -> Self {
        let mut cars = HashMap::with_capacity(players.len());
        let mut jump = HashMap::with_capacity(players.len());
        let mut team_slots: HashMap<Team, usize> = HashMap::new();

        for spawn in players {
            let slot = team_slots.entry(spawn.team).or_insert(0);
            let car = kickoff_car(
                &spawn.player_id,
                &spawn.display_name,
                spawn.team,
                *slot,
                false,
            );
            *slot += 1;
            cars.insert(spawn.player_id.clone(), car);
            jump.insert(spawn.player_id.clone(), JumpContext::default());
        }

        let now = unix_millis();
        let state = MatchState {
            match_id: match_id.into(),
            tick: 0,
            created_at: now,
            cars,
            ball: BallState {
                position: Vec3::new(0.0, 0.0, BALL_RADIUS + 20.0),
                velocity: Vec3::default(),
                radius: BALL_RADIUS,
            },
            score: ScoreState {
                orange: 0,
                blue: 0,
                time_remaining_ms: duration.as_millis() as i32,
            },
            events: vec![GameplayEvent {
                kind: GameplayEventKind::Kickoff,
                player_id: None,
                team: None,
                occurred_ms: now,
            }],
        };

        Self {
            inner: RwLock::new(Inner {
                state,
                input: HashMap::new(),
                jump,
                shot_clock: ShotClock::default(),
            }),
        }
    }

    /// Store the latest client input for a player, last-writer-wins. Inputs
    /// for players not yet in the match are kept and apply once the player
    /// is ensured.
    pub fn apply_input(&self, input: CarInput) {
        let input = car::clamp_input(input);
        self.inner
            .write()
            .input
            .insert(input.player_id.clone(), input);
    }

    /// Advance the simulation by `dt` seconds. No-op for dt <= 0.
    pub fn tick(&self, dt: f64) {
        if dt <= 0.0 {
            return;
        }

        let mut guard = self.inner.write();
        let Inner {
            state,
            input,
            jump,
            shot_clock,
        } = &mut *guard;

        state.tick += 1;
        state.events.clear();

        let now = unix_millis();
        for (id, car) in state.cars.iter().filter(|(_, c)| c.is_bot) {
            let mut synthesized = bot::input_for(car, &state.ball);
            synthesized.player_id = id.clone();
            synthesized.sequence = state.tick;
            synthesized.client_ms = now;
            input.insert(id.clone(), synthesized);
        }

        if state.score.time_remaining_ms > 0 {
            let delta_ms = ((dt * 1000.0).round() as i32).max(1);
            state.score.time_remaining_ms = (state.score.time_remaining_ms - delta_ms).max(0);
        }

        for (id, car) in state.cars.iter_mut() {
            let applied = input.get(id).cloned().unwrap_or_default();
            let prev = std::mem::take(&mut car.last_input);
            let jc = jump.entry(id.clone()).or_default();
            car::integrate(car, &applied, &prev, jc, dt);
            car.last_input = applied;
            car::clamp_bounds(car);
        }

        ball::integrate(&mut state.ball, dt);
        ball::clamp_bounds(&mut state.ball);
        resolve_car_ball_collisions(state);
        detect_shot_on_goal(state, shot_clock, now);
        detect_goal_and_reset(state, now);
    }

    /// Deep copy of the match state, safe to read concurrently with ticks.
    pub fn snapshot(&self) -> MatchState {
        self.inner.read().state.clone()
    }

    /// Insert a player if absent and return the assigned team. Re-binds an
    /// existing car to human control and refreshes a non-empty display name.
    pub fn ensure_player(&self, player_id: &str, display_name: &str) -> Team {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(car) = inner.state.cars.get_mut(player_id) {
            if !display_name.is_empty() {
                car.display_name = display_name.to_string();
            }
            car.is_bot = false;
            let team = car.team;
            inner.jump.entry(player_id.to_string()).or_default();
            return team;
        }

        let mut orange_count = 0usize;
        let mut blue_count = 0usize;
        for car in inner.state.cars.values() {
            if car.is_bot {
                continue;
            }
            match car.team {
                Team::Orange => orange_count += 1,
                Team::Blue => blue_count += 1,
            }
        }

        let team = if orange_count > blue_count {
            Team::Blue
        } else {
            Team::Orange
        };
        let slot = match team {
            Team::Orange => orange_count,
            Team::Blue => blue_count,
        };

        inner.state.cars.insert(
            player_id.to_string(),
            kickoff_car(player_id, display_name, team, slot, false),
        );
        inner.jump.insert(player_id.to_string(), JumpContext::default());

        push_event(
            &mut inner.state,
            GameplayEventKind::PlayerJoin,
            Some(player_id.to_string()),
            Some(team),
        );
        team
    }

    /// Number of human-controlled cars.
    pub fn human_count(&self) -> usize {
        self.inner
            .read()
            .state
            .cars
            .values()
            .filter(|c| !c.is_bot)
            .count()
    }

    /// One active human player id, if any.
    pub fn first_human_id(&self) -> Option<String> {
        self.inner
            .read()
            .state
            .cars
            .iter()
            .find(|(_, c)| !c.is_bot)
            .map(|(id, _)| id.clone())
    }

    /// Guarantee one opponent bot for a human player if needed. Returns the
    /// bot id, reusing an existing opposing bot; empty when the opposing
    /// team already has a human.
    pub fn ensure_bot_opponent(&self, player_id: &str) -> Option<String> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let opponent = inner.state.cars.get(player_id)?.team.opponent();

        let opposing_humans = inner
            .state
            .cars
            .values()
            .filter(|c| c.team == opponent && !c.is_bot)
            .count();
        if opposing_humans > 0 {
            return None;
        }

        if let Some((id, _)) = inner
            .state
            .cars
            .iter()
            .find(|(_, c)| c.team == opponent && c.is_bot)
        {
            return Some(id.clone());
        }

        let slot = inner
            .state
            .cars
            .values()
            .filter(|c| c.team == opponent)
            .count();

        let bot_id = next_id(&format!("bot_{}", opponent));
        inner.state.cars.insert(
            bot_id.clone(),
            kickoff_car(&bot_id, "Velocity Bot", opponent, slot, true),
        );
        inner.jump.insert(bot_id.clone(), JumpContext::default());

        push_event(
            &mut inner.state,
            GameplayEventKind::PlayerJoin,
            Some(bot_id.clone()),
            Some(opponent),
        );
        Some(bot_id)
    }

    /// Remove every bot, used when enough humans are available.
    pub fn remove_all_bots(&self) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let bot_ids: Vec<String> = inner
            .state
            .cars
            .iter()
            .filter(|(_, c)| c.is_bot)
            .map(|(id, _)| id.clone())
            .collect();

        for id in bot_ids {
            if let Some(car) = inner.state.cars.remove(&id) {
                inner.input.remove(&id);
                inner.jump.remove(&id);
                push_event(
                    &mut inner.state,
                    GameplayEventKind::PlayerLeave,
                    Some(id),
                    Some(car.team),
                );
            }
        }
    }

    /// Remove a player and its input/jump state.
    pub fn remove_player(&self, player_id: &str) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let Some(car) = inner.state.cars.remove(player_id) else {
            return;
        };
        inner.input.remove(player_id);
        inner.jump.remove(player_id);
        push_event(
            &mut inner.state,
            GameplayEventKind::PlayerLeave,
            Some(player_id.to_string()),
            Some(car.team),
        );
    }
}

fn kickoff_pose(team: Team) -> (f64, f64) {
    match team {
        Team::Orange => (KICKOFF_ORANGE_X, 0.0),
        Team::Blue => (KICKOFF_BLUE_X, 180.0),
    }
}

fn kickoff_car(player_id: &str, display_name: &str, team: Team, slot: usize, is_bot: bool) -> CarState {
    let (x, yaw) = kickoff_pose(team);
    CarState {
        player_id: player_id.to_string(),
        display_name: display_name.to_string(),
        team,
        is_bot,
        position: Vec3::new(x, kickoff_slot_offset(slot), CAR_RADIUS),
        velocity: Vec3::default(),
        rotation: Rotator {
            yaw,
            ..Rotator::default()
        },
        boost: 100.0,
        is_grounded: true,
        last_input: CarInput::default(),
    }
}

fn push_event(
    state: &mut MatchState,
    kind: GameplayEventKind,
    player_id: Option<String>,
    team: Option<Team>,
) {
    state.events.push(GameplayEvent {
        kind,
        player_id,
        team,
        occurred_ms: unix_millis(),
    });
}

/// Impulse response between every car and the ball, in car-map iteration
/// order, without re-checking within the tick.
fn resolve_car_ball_collisions(state: &mut MatchState) {
    let MatchState { cars, ball, .. } = state;
    let min_dist = CAR_RADIUS + ball.radius;

    for car in cars.values_mut() {
        let dx = ball.position.x - car.position.x;
        let dy = ball.position.y - car.position.y;
        let dz = ball.position.z - car.position.z;
        let dist = (dx * dx + dy * dy + dz * dz).sqrt();
        if dist <= 0.0 || dist >= min_dist {
            continue;
        }

        let nx = dx / dist;
        let ny = dy / dist;
        let nz = dz / dist;

        let car_dot = car.velocity.x * nx + car.velocity.y * ny + car.velocity.z * nz;
        let ball_dot = ball.velocity.x * nx + ball.velocity.y * ny + ball.velocity.z * nz;
        let rel = ball_dot - car_dot;
        if rel > 0.0 {
            continue;
        }

        let impulse = -(1.0 + CAR_BALL_ELASTICITY) * rel;
        ball.velocity.x += impulse * nx;
        ball.velocity.y += impulse * ny;
        ball.velocity.z += impulse * nz;

        let overlap = min_dist - dist;
        ball.position.x += nx * overlap * 0.85;
        ball.position.y += ny * overlap * 0.85;
        ball.position.z += nz * overlap * 0.85;

        car.position.x -= nx * overlap * 0.15;
        car.position.y -= ny * overlap * 0.15;
        car.position.z -= nz * overlap * 0.15;
    }
}

/// Credit a shot on goal to the attacking team at most once per 700 ms when
/// the ball is deep in the defended half with inbound X velocity.
fn detect_shot_on_goal(state: &mut MatchState, shot_clock: &mut ShotClock, now: i64) {
    let x = state.ball.position.x;
    let y_abs = state.ball.position.y.abs();
    let vx = state.ball.velocity.x;

    if x > ARENA_LENGTH * 0.35
        && vx > 200.0
        && y_abs <= GOAL_WIDTH * 0.7
        && now - shot_clock.last(Team::Orange) >= 700
    {
        shot_clock.stamp(Team::Orange, now);
        state.events.push(GameplayEvent {
            kind: GameplayEventKind::ShotOnGoal,
            player_id: None,
            team: Some(Team::Orange),
            occurred_ms: now,
        });
    }
    if x < -ARENA_LENGTH * 0.35
        && vx < -200.0
        && y_abs <= GOAL_WIDTH * 0.7
        && now - shot_clock.last(Team::Blue) >= 700
    {
        shot_clock.stamp(Team::Blue, now);
        state.events.push(GameplayEvent {
            kind: GameplayEventKind::ShotOnGoal,
            player_id: None,
            team: Some(Team::Blue),
            occurred_ms: now,
        });
    }
}

fn detect_goal_and_reset(state: &mut MatchState, now: i64) {
    let in_goal_y = state.ball.position.y.abs() <= GOAL_WIDTH / 2.0;
    let in_goal_z = state.ball.position.z <= GOAL_HEIGHT;
    if !in_goal_y || !in_goal_z {
        return;
    }

    let scoring_team = if state.ball.position.x >= ARENA_LENGTH / 2.0 {
        Team::Orange
    } else if state.ball.position.x <= -ARENA_LENGTH / 2.0 {
        Team::Blue
    } else {
        return;
    };

    match scoring_team {
        Team::Orange => state.score.orange += 1,
        Team::Blue => state.score.blue += 1,
    }
    state.events.push(GameplayEvent {
        kind: GameplayEventKind::Goal,
        player_id: None,
        team: Some(scoring_team),
        occurred_ms: now,
    });
    reset_kickoff(state, scoring_team);
}

/// Ball to center court, cars to their team rows with cycled slot offsets,
/// boost refilled.
fn reset_kickoff(state: &mut MatchState, scoring_team: Team) {
    state.ball.position = Vec3::new(0.0, 0.0, BALL_RADIUS + 20.0);
    state.ball.velocity = Vec3::default();

    let mut team_slots: HashMap<Team, usize> = HashMap::new();
    for car in state.cars.values_mut() {
        let slot = team_slots.entry(car.team).or_insert(0);
        let (x, yaw) = kickoff_pose(car.team);
        car.position = Vec3::new(x, kickoff_slot_offset(*slot), CAR_RADIUS);
        car.rotation = Rotator {
            yaw,
            ..Rotator::default()
        };
        car.velocity = Vec3::default();
        car.boost = 100.0;
        car.is_grounded = true;
        *slot += 1;
    }

    push_event(state, GameplayEventKind::Kickoff, None, Some(scoring_team));
}
