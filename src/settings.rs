//! Run configuration and difficulty tiers
//!
//! Loaded from a JSON file on native targets; every field has a default so a
//! partial file is fine.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{ARENA_HEIGHT, ARENA_WIDTH};
use crate::sim::BombKind;

/// Difficulty preset selected on the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Tier {
    Easy,
    #[default]
    Medium,
    Hard,
    Spartan,
}

/// Per-tier balance table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierParams {
    /// Initial enemy speed (px/frame)
    pub base_speed: f32,
    /// Enemy speed ceiling (px/frame)
    pub max_speed: f32,
    /// Magnitude of the per-frame random velocity perturbation
    pub entropy: f32,
    /// Per-frame probability that an active enemy drops a bomb
    pub fire_rate: f32,
    /// Extra fire rate per correct answer (zero on the lower tiers)
    pub fire_rate_per_correct: f32,
    pub score_multiplier: u64,
    /// Damage dealt by every bomb type except Piercing
    pub bomb_damage: f32,
    /// Bomb types enemies pick from
    pub bomb_kinds: &'static [BombKind],
}

const EASY_BOMBS: &[BombKind] = &[BombKind::Straight, BombKind::Sine];
const MEDIUM_BOMBS: &[BombKind] = &[BombKind::Straight, BombKind::Sine, BombKind::Tracking];
const HARD_BOMBS: &[BombKind] = &[
    BombKind::Straight,
    BombKind::Sine,
    BombKind::Tracking,
    BombKind::Cluster,
];
const SPARTAN_BOMBS: &[BombKind] = &[
    BombKind::Straight,
    BombKind::Sine,
    BombKind::Tracking,
    BombKind::Cluster,
    BombKind::Piercing,
];

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Easy, Tier::Medium, Tier::Hard, Tier::Spartan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Easy => "Easy",
            Tier::Medium => "Medium",
            Tier::Hard => "Hard",
            Tier::Spartan => "Spartan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" | "0" => Some(Tier::Easy),
            "medium" | "med" | "1" => Some(Tier::Medium),
            "hard" | "2" => Some(Tier::Hard),
            "spartan" | "expert" | "3" => Some(Tier::Spartan),
            _ => None,
        }
    }

    /// Numeric tier sent to the question source (0..=3)
    pub fn index(&self) -> u8 {
        match self {
            Tier::Easy => 0,
            Tier::Medium => 1,
            Tier::Hard => 2,
            Tier::Spartan => 3,
        }
    }

    pub fn from_index(index: u8) -> Self {
        match index {
            0 => Tier::Easy,
            1 => Tier::Medium,
            2 => Tier::Hard,
            _ => Tier::Spartan,
        }
    }

    /// Hardest tier, used by anomaly escalation
    pub fn hardest() -> Self {
        Tier::Spartan
    }

    pub fn params(&self) -> TierParams {
        match self {
            Tier::Easy => TierParams {
                base_speed: 1.0,
                max_speed: 2.0,
                entropy: 0.05,
                fire_rate: 0.002,
                fire_rate_per_correct: 0.0,
                score_multiplier: 1,
                bomb_damage: 15.0,
                bomb_kinds: EASY_BOMBS,
            },
            Tier::Medium => TierParams {
                base_speed: 1.5,
                max_speed: 3.0,
                entropy: 0.08,
                fire_rate: 0.004,
                fire_rate_per_correct: 0.0,
                score_multiplier: 2,
                bomb_damage: 15.0,
                bomb_kinds: MEDIUM_BOMBS,
            },
            Tier::Hard => TierParams {
                base_speed: 2.0,
                max_speed: 4.0,
                entropy: 0.12,
                fire_rate: 0.007,
                fire_rate_per_correct: 0.0008,
                score_multiplier: 3,
                bomb_damage: 15.0,
                bomb_kinds: HARD_BOMBS,
            },
            Tier::Spartan => TierParams {
                base_speed: 2.5,
                max_speed: 5.5,
                entropy: 0.18,
                fire_rate: 0.01,
                fire_rate_per_correct: 0.0015,
                score_multiplier: 5,
                bomb_damage: 25.0,
                bomb_kinds: SPARTAN_BOMBS,
            },
        }
    }
}

/// Training runs are free play; assessment runs report pass/fail to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunMode {
    #[default]
    Training,
    Assessment,
}

/// Errors raised while loading or saving settings
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "settings I/O error: {e}"),
            ConfigError::Json(e) => write!(f, "settings parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Difficulty preset
    pub tier: Tier,
    pub mode: RunMode,

    // === Session ===
    pub total_questions: u32,
    /// Correct answers needed for victory
    pub pass_threshold: u32,
    /// Enemies (answer options) per question
    pub options_per_question: usize,
    /// Bullets available per question
    pub ammo_per_question: u32,
    /// Restart automatically after a terminal state (ignored in assessment mode)
    pub auto_restart: bool,

    // === Question source ===
    pub topic: String,
    /// Identifies the player to the anomaly detector
    pub subject_id: String,
    /// Skip the remote source for mathematics topics
    pub prefer_local_math: bool,

    // === Arena ===
    pub arena_width: f32,
    pub arena_height: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tier: Tier::Medium,
            mode: RunMode::Training,

            total_questions: 10,
            pass_threshold: 7,
            options_per_question: 4,
            ammo_per_question: 6,
            auto_restart: false,

            topic: "General Knowledge".to_string(),
            subject_id: "anonymous".to_string(),
            prefer_local_math: true,

            arena_width: ARENA_WIDTH,
            arena_height: ARENA_HEIGHT,
        }
    }
}

impl Settings {
    /// Clamp fields into a playable range
    pub fn validate(mut self) -> Self {
        self.total_questions = self.total_questions.max(1);
        self.pass_threshold = self.pass_threshold.min(self.total_questions);
        self.options_per_question = self.options_per_question.max(2);
        self.ammo_per_question = self.ammo_per_question.max(1);
        if !(self.arena_width.is_finite() && self.arena_width >= 400.0) {
            self.arena_width = ARENA_WIDTH;
        }
        if !(self.arena_height.is_finite() && self.arena_height >= 300.0) {
            self.arena_height = ARENA_HEIGHT;
        }
        self
    }

    /// Whether the topic names a mathematics subject
    pub fn is_math_topic(&self) -> bool {
        const MATH_WORDS: [&str; 8] = [
            "math",
            "algebra",
            "arithmetic",
            "geometry",
            "calculus",
            "trigonometry",
            "statistics",
            "number",
        ];
        let topic = self.topic.to_lowercase();
        MATH_WORDS.iter().any(|w| topic.contains(w))
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.validate())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }
}
