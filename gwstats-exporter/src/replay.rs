// gwstats Exporter - Record replay engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Record replay engine for feeding captured gateway traffic through the
//! stats engine.
//!
//! A replay file is JSON Lines, one record per line:
//!
//! ```text
//! {"entity": "gw", "kind": "gateway", "mac": "54ef44001122", "record": {"free_mem": 5032}}
//! {"entity": "lamp", "kind": "zigbee", "delay_ms": 500, "record": {"sourceAddress": "0x7A2F"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::metrics::{record_dispatched, update_from_payload, update_replay_metrics};
use gwstats::{Dispatcher, EntityKind, Payload, RawRecord, StatsConfig, StatsError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Latest payload per entity, shared with the HTTP handlers.
pub type LatestPayloads = Arc<RwLock<HashMap<String, Payload>>>;

/// Configuration for record replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Path to the JSON Lines record file.
    pub records_path: String,
    /// Replay speed multiplier (1.0 = real-time, 10.0 = 10x faster).
    pub speed: f64,
    /// Whether to loop the file.
    pub loop_replay: bool,
    /// Delay between records when a line carries none.
    pub default_delay_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            records_path: String::new(),
            speed: 1.0,
            loop_replay: true,
            default_delay_ms: 1_000,
        }
    }
}

/// State of the replay engine.
#[derive(Debug)]
pub struct ReplayState {
    /// Current position in the file (record index).
    pub position: AtomicUsize,
    /// Total records in the file.
    pub total_records: AtomicUsize,
    /// Whether replay is running.
    pub running: AtomicBool,
    /// Records dispatched since start, across loops.
    pub dispatched: AtomicUsize,
}

impl Default for ReplayState {
    fn default() -> Self {
        Self {
            position: AtomicUsize::new(0),
            total_records: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            dispatched: AtomicUsize::new(0),
        }
    }
}

impl ReplayState {
    /// Ready once at least one record went through the engine.
    ///
    /// Stays ready when a looped replay rewinds to position 0.
    pub fn is_ready(&self) -> bool {
        self.dispatched.load(Ordering::SeqCst) > 0
    }
}

/// One line of a replay file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayLine {
    /// Entity the record belongs to.
    pub entity: String,
    /// Entity kind, registered on first sight.
    pub kind: EntityKind,
    /// Hardware address.
    #[serde(default)]
    pub mac: String,
    /// Delay before the next record; falls back to the configured default.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    /// Raw record as the gateway delivered it.
    pub record: RawRecord,
}

/// Replay engine that feeds records through the dispatcher and updates
/// Prometheus metrics.
pub struct ReplayEngine {
    config: ReplayConfig,
    stats_config: StatsConfig,
    state: Arc<ReplayState>,
    dispatcher: RwLock<Dispatcher>,
    latest: LatestPayloads,
    lines: Vec<ReplayLine>,
}

impl ReplayEngine {
    /// Create a new replay engine from a JSON Lines file.
    pub fn from_file(config: ReplayConfig, stats_config: StatsConfig) -> Result<Self, ReplayError> {
        let path = Path::new(&config.records_path);
        if !path.exists() {
            return Err(ReplayError::FileNotFound(config.records_path.clone()));
        }

        let text = std::fs::read_to_string(path)?;
        let lines = Self::parse_lines(&text)?;
        Self::new(config, stats_config, lines)
    }

    /// Create a replay engine from already parsed lines.
    pub fn new(
        config: ReplayConfig,
        stats_config: StatsConfig,
        lines: Vec<ReplayLine>,
    ) -> Result<Self, ReplayError> {
        if lines.is_empty() {
            return Err(ReplayError::EmptyDataset);
        }

        let dispatcher = Dispatcher::new(stats_config.clone())?;

        let state = Arc::new(ReplayState::default());
        state.total_records.store(lines.len(), Ordering::SeqCst);

        info!(
            "Loaded replay file: {} records, {} entities",
            lines.len(),
            Self::count_entities(&lines)
        );

        Ok(Self {
            config,
            stats_config,
            state,
            dispatcher: RwLock::new(dispatcher),
            latest: Arc::new(RwLock::new(HashMap::new())),
            lines,
        })
    }

    /// Parse JSON Lines text into replay lines.
    pub fn parse_lines(text: &str) -> Result<Vec<ReplayLine>, ReplayError> {
        let mut lines = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let line = serde_json::from_str(trimmed).map_err(|source| ReplayError::InvalidLine {
                line: index + 1,
                source,
            })?;
            lines.push(line);
        }
        Ok(lines)
    }

    fn count_entities(lines: &[ReplayLine]) -> usize {
        let mut seen: Vec<&str> = lines.iter().map(|l| l.entity.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Get the replay state.
    pub fn state(&self) -> Arc<ReplayState> {
        Arc::clone(&self.state)
    }

    /// Get the latest payload per entity.
    pub fn latest(&self) -> LatestPayloads {
        Arc::clone(&self.latest)
    }

    /// Number of distinct entities in the file.
    pub fn entity_count(&self) -> usize {
        Self::count_entities(&self.lines)
    }

    /// Start the replay loop (runs until the file ends, forever when looping).
    pub async fn run(&self) {
        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "Starting replay: speed={}, loop={}",
            self.config.speed, self.config.loop_replay
        );

        loop {
            let position = self.state.position.load(Ordering::SeqCst);

            if position >= self.lines.len() {
                if self.config.loop_replay {
                    info!("Replay file complete, looping...");
                    self.state.position.store(0, Ordering::SeqCst);
                    self.reset_dispatcher().await;
                    continue;
                } else {
                    info!("Replay file complete, stopping");
                    self.state.running.store(false, Ordering::SeqCst);
                    break;
                }
            }

            let line = &self.lines[position];
            self.process_line(line, position).await;

            self.state.position.fetch_add(1, Ordering::SeqCst);
            self.state.dispatched.fetch_add(1, Ordering::SeqCst);
            update_replay_metrics(position + 1, self.lines.len(), self.config.speed);

            let base_delay_ms = line.delay_ms.unwrap_or(self.config.default_delay_ms);
            let sleep_ms = if self.config.speed > 0.0 {
                (base_delay_ms as f64 / self.config.speed) as u64
            } else {
                base_delay_ms
            };
            if sleep_ms > 0 {
                sleep(Duration::from_millis(sleep_ms)).await;
            }
        }
    }

    /// Process a single replay line.
    async fn process_line(&self, line: &ReplayLine, position: usize) {
        debug!("Processing record {} for {}", position, line.entity);

        let result = {
            let mut dispatcher = self.dispatcher.write().await;
            if let Err(e) = dispatcher.store_mut().get_or_register(
                &line.entity,
                line.kind,
                line.mac.as_str(),
            ) {
                warn!("Failed to register {}: {}", line.entity, e);
            }
            dispatcher.dispatch(&line.entity, &line.record)
        };

        match result {
            Ok(payload) => {
                record_dispatched(true);
                update_from_payload(&line.entity, line.kind, &payload);

                let mut latest = self.latest.write().await;
                latest
                    .entry(line.entity.clone())
                    .or_default()
                    .extend_from(payload);
            }
            Err(e) => {
                record_dispatched(false);
                warn!("Failed to dispatch record {} for {}: {}", position, line.entity, e);
            }
        }
    }

    /// Start from a fresh dispatcher so a looped file does not count as loss.
    async fn reset_dispatcher(&self) {
        match Dispatcher::new(self.stats_config.clone()) {
            Ok(fresh) => *self.dispatcher.write().await = fresh,
            Err(e) => warn!("Failed to reset dispatcher: {}", e),
        }
    }
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid record on line {line}: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Empty replay file")]
    EmptyDataset,

    #[error("Stats engine error: {0}")]
    Stats(#[from] StatsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RECORDS: &str = r#"
# captured on the bench gateway
{"entity": "gw", "kind": "gateway", "mac": "54:EF:44:00:11:22", "record": {"free_mem": 5032, "run_time": 61}}
{"entity": "lamp", "kind": "zigbee", "delay_ms": 0, "record": {"sourceAddress": "0x7A2F", "clusterId": "0x0006", "APSCounter": "0x05", "APSPlayload": "0x180a0a"}}

{"entity": "lamp", "kind": "zigbee", "record": {"sourceAddress": "0x7A2F", "clusterId": "0x0006", "APSCounter": "0x07", "APSPlayload": "0x180c0a"}}
"#;

    fn create_test_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", RECORDS).unwrap();
        file.flush().unwrap();
        file
    }

    fn fast_config(path: String) -> ReplayConfig {
        ReplayConfig {
            records_path: path,
            speed: 1.0,
            loop_replay: false,
            default_delay_ms: 0,
        }
    }

    #[test]
    fn test_parse_lines() {
        let lines = ReplayEngine::parse_lines(RECORDS).expect("Failed to parse records");

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].kind, EntityKind::Gateway);
        assert_eq!(lines[1].entity, "lamp");
        assert_eq!(lines[1].delay_ms, Some(0));
        assert_eq!(lines[2].delay_ms, None);
        assert_eq!(lines[2].mac, "");
    }

    #[test]
    fn test_parse_lines_reports_line_number() {
        let text = "{\"entity\": \"a\", \"kind\": \"ble\", \"record\": {}}\nnot json\n";
        match ReplayEngine::parse_lines(text) {
            Err(ReplayError::InvalidLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidLine, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_missing_and_empty_files() {
        let missing = fast_config("/nonexistent/records.jsonl".to_string());
        assert!(matches!(
            ReplayEngine::from_file(missing, StatsConfig::default()),
            Err(ReplayError::FileNotFound(_))
        ));

        let empty = ReplayEngine::new(fast_config(String::new()), StatsConfig::default(), vec![]);
        assert!(matches!(empty, Err(ReplayError::EmptyDataset)));
    }

    #[tokio::test]
    async fn test_replay_run_once() {
        let file = create_test_file();
        let config = fast_config(file.path().to_string_lossy().to_string());

        let engine = ReplayEngine::from_file(config, StatsConfig::default()).unwrap();
        assert_eq!(engine.entity_count(), 2);
        assert!(!engine.state().is_ready());

        engine.run().await;

        let state = engine.state();
        assert_eq!(state.position.load(Ordering::SeqCst), 3);
        assert_eq!(state.dispatched.load(Ordering::SeqCst), 3);
        assert!(!state.running.load(Ordering::SeqCst));
        assert!(state.is_ready());

        let latest = engine.latest();
        let latest = latest.read().await;
        let lamp = latest.get("lamp").unwrap();
        assert_eq!(lamp.get("msg_received"), Some(&json!(2)));
        assert_eq!(lamp.get("msg_missed"), Some(&json!(1)));
        assert_eq!(lamp.get("last_msg"), Some(&json!("OnOff")));

        let gw = latest.get("gw").unwrap();
        assert_eq!(gw.get("free_mem"), Some(&json!(5032)));
        assert_eq!(gw.get("uptime"), Some(&json!("0 days, 00:01:01")));
    }

    #[test]
    fn test_ready_survives_rewind() {
        let state = ReplayState::default();
        assert!(!state.is_ready());

        state.dispatched.store(3, Ordering::SeqCst);
        state.position.store(0, Ordering::SeqCst);
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn test_looped_replay_stays_ready() {
        let lines = ReplayEngine::parse_lines(RECORDS).unwrap();
        let config = ReplayConfig {
            records_path: String::new(),
            speed: 1.0,
            loop_replay: true,
            default_delay_ms: 1,
        };
        let engine = ReplayEngine::new(config, StatsConfig::default(), lines).unwrap();

        let _ = tokio::time::timeout(Duration::from_millis(200), engine.run()).await;

        let state = engine.state();
        assert!(state.dispatched.load(Ordering::SeqCst) > 3);
        assert!(state.position.load(Ordering::SeqCst) <= 3);
        assert!(state.is_ready());
    }
}
