//! Input-timing telemetry and anomaly escalation
//!
//! Key-press timestamps go into a bounded ring. Once the ring is full each
//! press has a small chance of shipping a snapshot to the anomaly detector.
//! A positive verdict escalates the run to the hardest tier and turns on text
//! corruption until the next run starts.

use std::collections::VecDeque;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::settings::Tier;
use crate::sim::state::{GameEvent, RunPhase, RunState};

pub const TELEMETRY_CAPACITY: usize = 50;
/// Chance per key press (once full) of posting a snapshot
pub const SEND_PROBABILITY: f64 = 0.05;

/// Last [`TELEMETRY_CAPACITY`] key-press timestamps (milliseconds)
#[derive(Debug, Clone, Default)]
pub struct TelemetryBuffer {
    samples: VecDeque<f64>,
    /// A post is outstanding
    pub in_flight: bool,
}

impl TelemetryBuffer {
    /// Append a timestamp, evicting the oldest. Returns true when full.
    pub fn push(&mut self, timestamp: f64) -> bool {
        if self.samples.len() == TELEMETRY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(timestamp);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= TELEMETRY_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.in_flight = false;
    }
}

/// Body posted to the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPost {
    pub subject_id: String,
    pub telemetry: Vec<f64>,
}

/// Detector response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    Network(String),
    Status(u16),
    Malformed(String),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Network(msg) => write!(f, "telemetry post failed: {msg}"),
            TelemetryError::Status(code) => write!(f, "anomaly detector returned HTTP {code}"),
            TelemetryError::Malformed(msg) => write!(f, "malformed anomaly verdict: {msg}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Interpret a raw HTTP response from the anomaly detector
pub fn parse_verdict(status: u16, body: &str) -> Result<AnomalyVerdict, TelemetryError> {
    if !(200..300).contains(&status) {
        return Err(TelemetryError::Status(status));
    }
    serde_json::from_str(body).map_err(|e| TelemetryError::Malformed(e.to_string()))
}

/// Anything that can judge a telemetry snapshot
pub trait AnomalyDetector {
    fn inspect(&mut self, post: &TelemetryPost) -> Result<AnomalyVerdict, TelemetryError>;
}

impl<F> AnomalyDetector for F
where
    F: FnMut(&TelemetryPost) -> Result<AnomalyVerdict, TelemetryError>,
{
    fn inspect(&mut self, post: &TelemetryPost) -> Result<AnomalyVerdict, TelemetryError> {
        self(post)
    }
}

/// Local stand-in for the remote detector: flags input that is faster or
/// more regular than a human hand
#[derive(Debug, Clone, Copy)]
pub struct CadenceDetector {
    /// Mean interval below this (ms) is flagged
    pub min_mean_interval: f64,
    /// Interval coefficient of variation below this is flagged
    pub min_variation: f64,
}

impl Default for CadenceDetector {
    fn default() -> Self {
        Self {
            min_mean_interval: 30.0,
            min_variation: 0.05,
        }
    }
}

impl AnomalyDetector for CadenceDetector {
    fn inspect(&mut self, post: &TelemetryPost) -> Result<AnomalyVerdict, TelemetryError> {
        let intervals: Vec<f64> = post.telemetry.windows(2).map(|w| w[1] - w[0]).collect();
        if intervals.len() < 2 {
            return Ok(AnomalyVerdict {
                is_anomaly: false,
                reason: String::new(),
            });
        }

        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;
        let variation = variance.sqrt() / mean.abs().max(f64::EPSILON);

        let verdict = if mean < self.min_mean_interval {
            AnomalyVerdict {
                is_anomaly: true,
                reason: format!("mean key interval {mean:.1}ms"),
            }
        } else if variation < self.min_variation {
            AnomalyVerdict {
                is_anomaly: true,
                reason: format!("key interval variation {variation:.3}"),
            }
        } else {
            AnomalyVerdict {
                is_anomaly: false,
                reason: String::new(),
            }
        };
        Ok(verdict)
    }
}

/// Record a key press and maybe request a telemetry post
pub fn record_key_press(state: &mut RunState, timestamp: f64) {
    let full = state.telemetry.push(timestamp);
    if !full || state.telemetry.in_flight || state.corrupted {
        return;
    }
    if !state.rng.random_bool(SEND_PROBABILITY) {
        return;
    }

    state.telemetry.in_flight = true;
    let post = TelemetryPost {
        subject_id: state.settings.subject_id.clone(),
        telemetry: state.telemetry.snapshot(),
    };
    log::debug!("Posting {} telemetry samples", post.telemetry.len());
    state.events.push(GameEvent::TelemetryRequested {
        epoch: state.epoch,
        post,
    });
}

/// Apply an anomaly detector response. Returns false when it was stale.
pub fn deliver_anomaly(
    state: &mut RunState,
    epoch: u64,
    result: Result<AnomalyVerdict, TelemetryError>,
) -> bool {
    if epoch != state.epoch {
        log::debug!("Discarding stale anomaly verdict (epoch {epoch}, now {})", state.epoch);
        return false;
    }
    state.telemetry.in_flight = false;

    match result {
        Ok(verdict) if verdict.is_anomaly => escalate(state, verdict.reason),
        Ok(_) => log::debug!("Telemetry looks human"),
        Err(e) => log::warn!("{e}; ignoring"),
    }
    true
}

/// One-way switch to the hardest tier with corrupted text
pub fn escalate(state: &mut RunState, reason: String) {
    if state.corrupted || state.phase == RunPhase::Menu {
        return;
    }
    log::warn!("Anomaly detected ({reason}); escalating run to {}", Tier::hardest().as_str());
    state.corrupted = true;
    state.tier = Tier::hardest();
    for enemy in state.enemies.iter_mut() {
        enemy.label = distort(&enemy.text, enemy.id as u64);
    }
    state.events.push(GameEvent::Escalated { reason });
}

impl RunState {
    /// See [`deliver_anomaly`]
    pub fn deliver_anomaly(&mut self, epoch: u64, result: Result<AnomalyVerdict, TelemetryError>) -> bool {
        deliver_anomaly(self, epoch, result)
    }
}

const GLYPHS: [(char, char); 14] = [
    ('a', 'α'),
    ('b', 'β'),
    ('c', '¢'),
    ('e', 'ε'),
    ('i', 'ı'),
    ('k', 'κ'),
    ('l', '|'),
    ('n', 'η'),
    ('o', 'ø'),
    ('p', 'ρ'),
    ('s', '§'),
    ('t', '†'),
    ('u', 'µ'),
    ('y', '¥'),
];

fn glyph_for(c: char) -> Option<char> {
    let lower = c.to_ascii_lowercase();
    GLYPHS.iter().find(|(from, _)| *from == lower).map(|(_, to)| *to)
}

fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Deterministic glyph substitution used while a run is corrupted
///
/// Roughly a third of the substitutable letters change; at least one always
/// does when the text has any.
pub fn distort(text: &str, seed: u64) -> String {
    let mut changed = false;
    let mut out: String = text
        .chars()
        .enumerate()
        .map(|(i, c)| match glyph_for(c) {
            Some(g) if mix(seed ^ (i as u64).wrapping_mul(31)) % 3 == 0 => {
                changed = true;
                g
            }
            _ => c,
        })
        .collect();

    if !changed {
        if let Some((i, g)) = text.chars().enumerate().find_map(|(i, c)| glyph_for(c).map(|g| (i, g))) {
            out = text
                .chars()
                .enumerate()
                .map(|(j, c)| if j == i { g } else { c })
                .collect();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::tick;

    fn playing() -> RunState {
        let settings = Settings {
            topic: "Arithmetic".to_string(),
            tier: Tier::Easy,
            ..Settings::default()
        };
        let mut state = RunState::new(settings, 3);
        tick::start_run(&mut state, Tier::Easy);
        state
    }

    #[test]
    fn test_ring_keeps_last_fifty() {
        let mut buffer = TelemetryBuffer::default();
        for i in 0..(TELEMETRY_CAPACITY + 10) {
            buffer.push(i as f64);
        }
        assert_eq!(buffer.len(), TELEMETRY_CAPACITY);
        assert_eq!(buffer.snapshot()[0], 10.0);
    }

    #[test]
    fn test_post_only_when_full_and_one_in_flight() {
        let mut state = playing();
        for i in 0..TELEMETRY_CAPACITY - 1 {
            record_key_press(&mut state, i as f64 * 100.0);
        }
        let requests = |s: &mut RunState| {
            s.drain_events()
                .iter()
                .filter(|e| matches!(e, GameEvent::TelemetryRequested { .. }))
                .count()
        };
        assert_eq!(requests(&mut state), 0);

        for i in 0..2000 {
            record_key_press(&mut state, 10_000.0 + i as f64 * 100.0);
        }
        assert_eq!(requests(&mut state), 1);
        assert!(state.telemetry.in_flight);
    }

    #[test]
    fn test_anomaly_escalates_once() {
        let mut state = playing();
        let epoch = state.epoch;
        let verdict = AnomalyVerdict {
            is_anomaly: true,
            reason: "too regular".to_string(),
        };
        assert!(deliver_anomaly(&mut state, epoch, Ok(verdict.clone())));
        assert!(state.corrupted);
        assert_eq!(state.tier, Tier::Spartan);
        assert!(
            state
                .enemies
                .iter()
                .all(|e| e.label == distort(&e.text, e.id as u64))
        );

        deliver_anomaly(&mut state, epoch, Ok(verdict));
        let escalations = state
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::Escalated { .. }))
            .count();
        assert_eq!(escalations, 1);
    }

    #[test]
    fn test_new_run_clears_escalation_and_drops_old_verdicts() {
        let mut state = playing();
        let old_epoch = state.epoch;
        escalate(&mut state, "test".to_string());
        tick::start_run(&mut state, Tier::Easy);
        assert!(!state.corrupted);
        assert_eq!(state.tier, Tier::Easy);

        let verdict = AnomalyVerdict {
            is_anomaly: true,
            reason: String::new(),
        };
        assert!(!deliver_anomaly(&mut state, old_epoch, Ok(verdict)));
        assert!(!state.corrupted);
    }

    #[test]
    fn test_post_failure_is_ignored() {
        let mut state = playing();
        state.telemetry.in_flight = true;
        let epoch = state.epoch;
        assert!(deliver_anomaly(&mut state, epoch, Err(TelemetryError::Status(500))));
        assert!(!state.telemetry.in_flight);
        assert!(!state.corrupted);
    }

    #[test]
    fn test_cadence_detector() {
        let mut detector = CadenceDetector::default();
        let robot = TelemetryPost {
            subject_id: "x".to_string(),
            telemetry: (0..50).map(|i| i as f64 * 100.0).collect(),
        };
        assert!(detector.inspect(&robot).unwrap().is_anomaly);

        let human = TelemetryPost {
            subject_id: "x".to_string(),
            telemetry: (0..50).map(|i| i as f64 * 180.0 + ((i * 37) % 90) as f64).collect(),
        };
        assert!(!detector.inspect(&human).unwrap().is_anomaly);
    }

    #[test]
    fn test_verdict_wire_format() {
        let verdict = parse_verdict(200, r#"{"isAnomaly":true,"reason":"bot"}"#).unwrap();
        assert!(verdict.is_anomaly);
        assert_eq!(parse_verdict(500, ""), Err(TelemetryError::Status(500)));
    }

    #[test]
    fn test_distort_is_deterministic_and_visible() {
        let a = distort("Leonidas", 7);
        assert_eq!(a, distort("Leonidas", 7));
        assert_ne!(a, "Leonidas");
        assert_eq!(a.chars().count(), "Leonidas".chars().count());
        assert_eq!(distort("42", 1), "42");
    }
}
