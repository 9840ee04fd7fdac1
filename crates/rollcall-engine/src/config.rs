use crate::pipeline::CheckInPolicy;
use chrono::{DateTime, Utc};
use rollcall_core::detector::DEFAULT_MIN_CONFIDENCE;
use rollcall_core::{DistanceMetric, MatchPolicy, DEFAULT_MATCH_THRESHOLD};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Span within which a student can be marked present only once per lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateWindow {
    /// Once per lecture per UTC calendar day.
    #[default]
    Day,
    /// Once per lecture, ever.
    Lecture,
}

impl DuplicateWindow {
    /// Ledger key identifying the window that `at` falls into.
    pub fn key_for(&self, at: DateTime<Utc>) -> String {
        match self {
            DuplicateWindow::Day => at.date_naive().format("%Y-%m-%d").to_string(),
            DuplicateWindow::Lecture => "lecture".to_string(),
        }
    }
}

impl fmt::Display for DuplicateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicateWindow::Day => "day",
            DuplicateWindow::Lecture => "lecture",
        })
    }
}

impl FromStr for DuplicateWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(DuplicateWindow::Day),
            "lecture" => Ok(DuplicateWindow::Lecture),
            other => Err(format!("unknown duplicate window: {other}")),
        }
    }
}

/// Runtime configuration: optional TOML file, then `ROLLCALL_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding reference descriptors.
    pub data_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum distance for a positive match.
    pub match_threshold: f32,
    pub distance_metric: DistanceMetric,
    pub duplicate_window: DuplicateWindow,
    /// Detections scoring at or below this are not counted as faces.
    pub min_face_confidence: f32,
    pub min_password_len: usize,
    /// Append face mismatches to the ledger as `rejected` records.
    pub audit_rejections: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            db_path: data_dir.join("attendance.db"),
            model_dir: data_dir.join("models"),
            data_dir,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            distance_metric: DistanceMetric::Cosine,
            duplicate_window: DuplicateWindow::Day,
            min_face_confidence: DEFAULT_MIN_CONFIDENCE,
            min_password_len: 1,
            audit_rejections: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

impl Config {
    /// Load from `ROLLCALL_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("ROLLCALL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `ROLLCALL_*` overrides from `lookup`. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        override_parsed(&lookup, "ROLLCALL_MATCH_THRESHOLD", &mut self.match_threshold);
        override_parsed(&lookup, "ROLLCALL_DISTANCE_METRIC", &mut self.distance_metric);
        override_parsed(&lookup, "ROLLCALL_DUPLICATE_WINDOW", &mut self.duplicate_window);
        override_parsed(&lookup, "ROLLCALL_MIN_FACE_CONFIDENCE", &mut self.min_face_confidence);
        override_parsed(&lookup, "ROLLCALL_MIN_PASSWORD_LEN", &mut self.min_password_len);
        if let Some(v) = lookup("ROLLCALL_AUDIT_REJECTIONS") {
            self.audit_rejections = v != "0" && !v.eq_ignore_ascii_case("false");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.match_threshold.is_finite() || self.match_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "match_threshold must be a non-negative number, got {}",
                self.match_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_face_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_face_confidence must be within [0, 1], got {}",
                self.min_face_confidence
            )));
        }
        Ok(())
    }

    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy {
            threshold: self.match_threshold,
            metric: self.distance_metric,
        }
    }

    pub fn check_in_policy(&self) -> CheckInPolicy {
        CheckInPolicy {
            window: self.duplicate_window,
            audit_rejections: self.audit_rejections,
        }
    }

    pub fn descriptor_dir(&self) -> PathBuf {
        self.data_dir.join("descriptors")
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(e) => tracing::warn!(key, value = %raw, error = %e, "ignoring invalid override"),
    }
}
