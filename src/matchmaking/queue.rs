//! In-memory matchmaking queue
//!
//! Tickets are grouped into `region|playlist` buckets. A periodic pass pairs
//! waiting players inside a time-expanding MMR window and falls back to a bot
//! opponent for anyone waiting past the solo timeout.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::{MatchAssignment, QueueJoinRequest, QueueJoinResponse, QueuePollResponse, QueueStatus};
use crate::util::id::next_id;
use crate::util::time::unix_millis;

const DEFAULT_REGION: &str = "us-east";
const DEFAULT_PLAYLIST: &str = "ranked-1v1";
const DEFAULT_MMR: i32 = 1000;

/// Base MMR tolerance for a freshly queued pair.
const MMR_BASE_TOLERANCE: i32 = 60;
/// Tolerance gained per second of the longer wait, capped.
const MMR_TOLERANCE_PER_SEC: f64 = 12.0;
const MMR_TOLERANCE_CAP: i32 = 650;

/// Solo players are matched against a bot after this long.
const BOT_FILL_AFTER_MS: i64 = 4_000;

/// A queue entry.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub ticket_id: String,
    pub player_id: String,
    pub display_name: String,
    pub mmr: i32,
    pub region: String,
    pub playlist: String,
    /// Unix milliseconds at enqueue.
    pub joined_at: i64,
    pub status: QueueStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The pairing pass only produces pairs; larger match sizes are rejected
    /// up front instead of silently degrading to 1v1.
    #[error("match size {0} is not supported, only 2-player matches are implemented")]
    UnsupportedMatchSize(usize),
}

#[derive(Default)]
struct QueueState {
    /// `region|playlist` -> ticket ids, kept in joined order between passes.
    buckets: HashMap<String, Vec<String>>,
    tickets: HashMap<String, Ticket>,
    /// Pending assignments keyed by ticket id, consumed by poll.
    assignments: HashMap<String, MatchAssignment>,
}

/// In-memory matchmaking for local and staging usage.
pub struct QueueManager {
    server_addr: String,
    inner: RwLock<QueueState>,
}

impl QueueManager {
    pub fn new(server_addr: impl Into<String>) -> Self {
        let mut server_addr = server_addr.into();
        if server_addr.is_empty() {
            server_addr = "ws://localhost:9003/ws".to_string();
        }
        Self {
            server_addr,
            inner: RwLock::new(QueueState::default()),
        }
    }

    /// Add a player to the queue. Region, playlist and MMR defaults are
    /// applied here so every caller sees the same bucket keys.
    pub fn join(&self, mut req: QueueJoinRequest) -> QueueJoinResponse {
        if req.region.is_empty() {
            req.region = DEFAULT_REGION.to_string();
        }
        if req.playlist.is_empty() {
            req.playlist = DEFAULT_PLAYLIST.to_string();
        }
        if req.mmr <= 0 {
            req.mmr = DEFAULT_MMR;
        }

        let ticket = Ticket {
            ticket_id: next_id("t"),
            player_id: req.player_id,
            display_name: req.display_name,
            mmr: req.mmr,
            region: req.region.clone(),
            playlist: req.playlist.clone(),
            joined_at: unix_millis(),
            status: QueueStatus::Searching,
        };
        let key = bucket_key(&req.region, &req.playlist);
        let ticket_id = ticket.ticket_id.clone();

        let mut state = self.inner.write();
        state.buckets.entry(key).or_default().push(ticket_id.clone());
        state.tickets.insert(ticket_id.clone(), ticket);

        QueueJoinResponse {
            ticket_id,
            status: QueueStatus::Searching,
        }
    }

    /// Remove a ticket from the queue. Returns false if the ticket id is
    /// unknown.
    pub fn leave(&self, ticket_id: &str) -> bool {
        let mut state = self.inner.write();
        let Some(ticket) = state.tickets.remove(ticket_id) else {
            return false;
        };

        let key = bucket_key(&ticket.region, &ticket.playlist);
        if let Some(bucket) = state.buckets.get_mut(&key) {
            bucket.retain(|id| id != ticket_id);
        }
        state.assignments.remove(ticket_id);
        true
    }

    /// Current ticket status, with the assignment copy once matched.
    pub fn poll(&self, ticket_id: &str) -> QueuePollResponse {
        let state = self.inner.read();

        if let Some(assignment) = state.assignments.get(ticket_id) {
            return QueuePollResponse {
                ticket_id: ticket_id.to_string(),
                status: QueueStatus::Matched,
                assignment: Some(assignment.clone()),
            };
        }

        let status = state
            .tickets
            .get(ticket_id)
            .map(|t| t.status)
            .unwrap_or(QueueStatus::NotFound);
        QueuePollResponse {
            ticket_id: ticket_id.to_string(),
            status,
            assignment: None,
        }
    }

    /// Continuously evaluate the queue until cancelled. Only 2-player
    /// matches are implemented; larger sizes error immediately.
    pub async fn run(
        &self,
        cadence: Duration,
        players_per_match: usize,
        cancel: CancellationToken,
    ) -> Result<(), QueueError> {
        if players_per_match > 2 {
            return Err(QueueError::UnsupportedMatchSize(players_per_match));
        }
        let players_per_match = players_per_match.max(2);
        let cadence = if cadence.is_zero() {
            Duration::from_secs(1)
        } else {
            cadence
        };

        let mut ticker = interval(cadence);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => self.process(players_per_match),
            }
        }
    }

    /// One pairing pass over every bucket.
    pub fn process(&self, players_per_match: usize) {
        let now = unix_millis();
        let mut guard = self.inner.write();
        let QueueState {
            buckets,
            tickets,
            assignments,
        } = &mut *guard;

        for (key, bucket) in buckets.iter_mut() {
            bucket.sort_by_key(|id| tickets.get(id).map(|t| t.joined_at).unwrap_or(i64::MAX));

            let len = bucket.len();
            let mut used = vec![false; len];

            if len >= players_per_match {
                for i in 0..len.saturating_sub(1) {
                    if used[i] {
                        continue;
                    }
                    let Some(a) = tickets.get(&bucket[i]) else {
                        continue;
                    };
                    if a.status != QueueStatus::Searching {
                        continue;
                    }
                    let (a_mmr, a_joined) = (a.mmr, a.joined_at);

                    let mut best: Option<usize> = None;
                    let mut best_diff = i32::MAX;
                    for (j, id) in bucket.iter().enumerate().skip(i + 1) {
                        if used[j] {
                            continue;
                        }
                        let Some(b) = tickets.get(id) else { continue };
                        if b.status != QueueStatus::Searching {
                            continue;
                        }
                        let diff = (a_mmr - b.mmr).abs();
                        let threshold = allowed_mmr_diff(a_joined, b.joined_at, now);
                        if diff <= threshold && diff < best_diff {
                            best = Some(j);
                            best_diff = diff;
                        }
                    }

                    let Some(j) = best else { continue };
                    used[i] = true;
                    used[j] = true;

                    let a_id = bucket[i].clone();
                    let b_id = bucket[j].clone();
                    let (region, playlist) = split_key(key);
                    let players = vec![
                        tickets
                            .get(&a_id)
                            .map(|t| t.player_id.clone())
                            .unwrap_or_default(),
                        tickets
                            .get(&b_id)
                            .map(|t| t.player_id.clone())
                            .unwrap_or_default(),
                    ];
                    let assignment = MatchAssignment {
                        ticket_id: a_id.clone(),
                        match_id: next_id("m"),
                        region,
                        playlist,
                        players,
                        bot_fill: false,
                        server_addr: self.server_addr.clone(),
                        found_at_unix: now / 1000,
                    };
                    let mut paired = assignment.clone();
                    paired.ticket_id = b_id.clone();

                    if let Some(t) = tickets.get_mut(&a_id) {
                        t.status = QueueStatus::Matched;
                    }
                    if let Some(t) = tickets.get_mut(&b_id) {
                        t.status = QueueStatus::Matched;
                    }
                    debug!(
                        match_id = %assignment.match_id,
                        mmr_diff = best_diff,
                        "paired tickets"
                    );
                    assignments.insert(a_id, assignment);
                    assignments.insert(b_id, paired);
                }
            }

            // Bot-fill sweep over whoever is still searching, then retain
            // only unmatched tickets in the bucket.
            let (region, playlist) = split_key(key);
            let mut remaining = Vec::with_capacity(bucket.len());
            for (idx, id) in bucket.iter().enumerate() {
                let Some(ticket) = tickets.get_mut(id) else {
                    continue;
                };
                if used.get(idx).copied().unwrap_or(false)
                    || ticket.status != QueueStatus::Searching
                {
                    continue;
                }
                if now - ticket.joined_at >= BOT_FILL_AFTER_MS {
                    ticket.status = QueueStatus::Matched;
                    assignments.insert(
                        id.clone(),
                        MatchAssignment {
                            ticket_id: id.clone(),
                            match_id: next_id("m"),
                            region: region.clone(),
                            playlist: playlist.clone(),
                            players: vec![ticket.player_id.clone(), "bot".to_string()],
                            bot_fill: true,
                            server_addr: self.server_addr.clone(),
                            found_at_unix: now / 1000,
                        },
                    );
                    continue;
                }
                remaining.push(id.clone());
            }
            *bucket = remaining;
        }
    }
}

fn bucket_key(region: &str, playlist: &str) -> String {
    let region = if region.is_empty() { "global" } else { region };
    let playlist = if playlist.is_empty() {
        DEFAULT_PLAYLIST
    } else {
        playlist
    };
    format!("{region}|{playlist}")
}

fn split_key(key: &str) -> (String, String) {
    match key.split_once('|') {
        Some((region, playlist)) => (region.to_string(), playlist.to_string()),
        None => ("global".to_string(), DEFAULT_PLAYLIST.to_string()),
    }
}

/// Tolerated MMR difference for a pair, growing with the longer wait.
fn allowed_mmr_diff(a_joined_ms: i64, b_joined_ms: i64, now_ms: i64) -> i32 {
    let wait_secs = ((now_ms - a_joined_ms).max(now_ms - b_joined_ms)).max(0) as f64 / 1000.0;
    let bonus = ((wait_secs * MMR_TOLERANCE_PER_SEC) as i32).min(MMR_TOLERANCE_CAP);
    MMR_BASE_TOLERANCE + bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_req(player_id: &str, mmr: i32) -> QueueJoinRequest {
        QueueJoinRequest {
            player_id: player_id.to_string(),
            display_name: player_id.to_string(),
            region: "us-east".to_string(),
            playlist: "ranked-1v1".to_string(),
            mmr,
        }
    }

    fn backdate(queue: &QueueManager, ticket_id: &str, ms: i64) {
        let mut state = queue.inner.write();
        if let Some(ticket) = state.tickets.get_mut(ticket_id) {
            ticket.joined_at -= ms;
        }
    }

    #[test]
    fn close_mmr_tickets_pair_with_shared_match_id() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("p1", 1200));
        let b = queue.join(join_req("p2", 1240));

        queue.process(2);

        let ap = queue.poll(&a.ticket_id);
        let bp = queue.poll(&b.ticket_id);
        assert_eq!(ap.status, QueueStatus::Matched);
        assert_eq!(bp.status, QueueStatus::Matched);
        let a_assignment = ap.assignment.expect("assignment for a");
        let b_assignment = bp.assignment.expect("assignment for b");
        assert_eq!(a_assignment.match_id, b_assignment.match_id);
        assert!(!a_assignment.bot_fill);
        assert_eq!(a_assignment.players, vec!["p1", "p2"]);
    }

    #[test]
    fn distant_mmr_tickets_stay_searching_in_one_pass() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("p1", 900));
        let b = queue.join(join_req("p2", 1500));

        queue.process(2);

        assert_eq!(queue.poll(&a.ticket_id).status, QueueStatus::Searching);
        assert_eq!(queue.poll(&b.ticket_id).status, QueueStatus::Searching);
    }

    #[test]
    fn wait_expands_mmr_window() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("p1", 900));
        let b = queue.join(join_req("p2", 1500));
        backdate(&queue, &a.ticket_id, 120_000);
        backdate(&queue, &b.ticket_id, 120_000);

        queue.process(2);

        assert_eq!(queue.poll(&a.ticket_id).status, QueueStatus::Matched);
        assert_eq!(queue.poll(&b.ticket_id).status, QueueStatus::Matched);
    }

    #[test]
    fn pairing_prefers_smallest_mmr_diff() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("p1", 1000));
        let far = queue.join(join_req("p2", 1050));
        let near = queue.join(join_req("p3", 1010));

        queue.process(2);

        let a_assignment = queue.poll(&a.ticket_id).assignment.expect("a matched");
        assert_eq!(a_assignment.players, vec!["p1", "p3"]);
        assert_eq!(queue.poll(&near.ticket_id).status, QueueStatus::Matched);
        assert_eq!(queue.poll(&far.ticket_id).status, QueueStatus::Searching);
    }

    #[test]
    fn solo_ticket_gets_bot_fill_after_timeout() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("solo", 1200));
        backdate(&queue, &a.ticket_id, 10_000);

        queue.process(2);

        let poll = queue.poll(&a.ticket_id);
        assert_eq!(poll.status, QueueStatus::Matched);
        let assignment = poll.assignment.expect("assignment for solo ticket");
        assert!(assignment.bot_fill);
        assert_eq!(assignment.players, vec!["solo", "bot"]);
    }

    #[test]
    fn fresh_solo_ticket_keeps_searching() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("solo", 1200));

        queue.process(2);

        assert_eq!(queue.poll(&a.ticket_id).status, QueueStatus::Searching);
    }

    #[test]
    fn leave_removes_ticket_and_assignment() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let a = queue.join(join_req("p1", 1200));

        assert!(queue.leave(&a.ticket_id));
        assert!(!queue.leave(&a.ticket_id));
        assert_eq!(queue.poll(&a.ticket_id).status, QueueStatus::NotFound);

        // A later pass must not resurrect the ticket.
        queue.process(2);
        assert_eq!(queue.poll(&a.ticket_id).status, QueueStatus::NotFound);
    }

    #[test]
    fn poll_unknown_ticket_is_not_found() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        assert_eq!(queue.poll("t_missing").status, QueueStatus::NotFound);
    }

    #[test]
    fn join_applies_defaults() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let resp = queue.join(QueueJoinRequest {
            player_id: "p1".to_string(),
            ..QueueJoinRequest::default()
        });
        let state = queue.inner.read();
        let ticket = &state.tickets[&resp.ticket_id];
        assert_eq!(ticket.region, "us-east");
        assert_eq!(ticket.playlist, "ranked-1v1");
        assert_eq!(ticket.mmr, 1000);
    }

    #[tokio::test]
    async fn run_loop_pairs_and_exits_on_cancel() {
        let queue = std::sync::Arc::new(QueueManager::new("ws://localhost:9003/ws"));
        let a = queue.join(join_req("p1", 1200));
        let b = queue.join(join_req("p2", 1240));

        let cancel = CancellationToken::new();
        let loop_queue = queue.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            loop_queue
                .run(Duration::from_millis(10), 2, loop_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.poll(&a.ticket_id).status, QueueStatus::Matched);
        assert_eq!(queue.poll(&b.ticket_id).status, QueueStatus::Matched);

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run loop exits after cancel")
            .expect("task join");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn oversized_match_request_is_rejected() {
        let queue = QueueManager::new("ws://localhost:9003/ws");
        let result = queue
            .run(Duration::from_millis(10), 3, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(QueueError::UnsupportedMatchSize(3))));
    }
}
