//! Configuration management for the trainer
//!
//! Layered the usual way: optional TOML file, environment overlay,
//! hard validation before a session may start.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::lang::Language;
use crate::tasks::{Difficulty, Factor, Operation};
use crate::{Error, Result};

/// Minimum tasks per session
pub const MIN_TASK_COUNT: usize = 5;

/// Maximum tasks per session
pub const MAX_TASK_COUNT: usize = 50;

/// Minimum per-question time limit
pub const MIN_TIME_LIMIT: Duration = Duration::from_secs(5);

/// Maximum per-question time limit
pub const MAX_TIME_LIMIT: Duration = Duration::from_secs(60);

/// Settings for one drill session
#[derive(Debug, Clone)]
pub struct DrillConfig {
    /// Operations to draw tasks from (non-empty)
    pub operations: Vec<Operation>,

    /// Difficulty level
    pub difficulty: Difficulty,

    /// Number of tasks in the session
    pub tasks_count: usize,

    /// Hard per-question answer deadline
    pub time_limit: Duration,

    /// Spoken/recognized language
    pub language: Language,
}

impl DrillConfig {
    /// Build a config with difficulty-derived defaults for count and limit
    #[must_use]
    pub fn new(operations: Vec<Operation>, difficulty: Difficulty, language: Language) -> Self {
        Self {
            operations,
            difficulty,
            tasks_count: difficulty.default_task_count(),
            time_limit: difficulty.default_time_limit(),
            language,
        }
    }

    /// Validate session settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the operation set is empty, the task
    /// count is outside 5-50, the time limit is outside 5-60 seconds, or a
    /// fixed multiplication factor is outside 2-9.
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(Error::Config("operation set is empty".to_string()));
        }

        if !(MIN_TASK_COUNT..=MAX_TASK_COUNT).contains(&self.tasks_count) {
            return Err(Error::Config(format!(
                "task count {} outside {MIN_TASK_COUNT}-{MAX_TASK_COUNT}",
                self.tasks_count
            )));
        }

        if self.time_limit < MIN_TIME_LIMIT || self.time_limit > MAX_TIME_LIMIT {
            return Err(Error::Config(format!(
                "time limit {:.0?} outside {MIN_TIME_LIMIT:.0?}-{MAX_TIME_LIMIT:.0?}",
                self.time_limit
            )));
        }

        for op in &self.operations {
            if let Operation::Multiplication(Factor::Fixed(factor)) = op {
                if !(2..=9).contains(factor) {
                    return Err(Error::Config(format!(
                        "fixed multiplication factor {factor} outside 2-9"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Speech backend configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// API keys for speech backends, read from the environment
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

/// Full trainer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Drill session settings
    pub drill: DrillConfig,

    /// Speech backend settings
    pub voice: VoiceConfig,

    /// Speech backend credentials
    pub api_keys: ApiKeys,
}

/// On-disk config file shape (all fields optional)
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    drill: DrillFile,
    #[serde(default)]
    voice: VoiceFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DrillFile {
    operations: Option<Vec<String>>,
    difficulty: Option<Difficulty>,
    tasks: Option<usize>,
    time_limit_secs: Option<u64>,
    language: Option<Language>,
    /// 0 means random factors; 2-9 selects a fixed times table
    multiplier: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct VoiceFile {
    stt_model: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f64>,
}

impl Config {
    /// Load configuration from the default file locations and environment.
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed,
    /// or if the resulting settings fail validation.
    pub fn load() -> Result<Self> {
        let file = Self::find_config_file()
            .map(|path| Self::read_file(&path))
            .transpose()?
            .unwrap_or_default();

        Self::from_file(file)
    }

    /// Parse a specific config file plus the environment overlay.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the settings are invalid.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        Self::from_file(Self::read_file(path)?)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let factor = match file.drill.multiplier {
            None | Some(0) => Factor::Random,
            Some(n) => Factor::Fixed(n),
        };

        let default_ops = vec!["add".to_string()];
        let operations = file
            .drill
            .operations
            .as_ref()
            .unwrap_or(&default_ops)
            .iter()
            .map(|name| parse_operation(name, factor))
            .collect::<Result<Vec<_>>>()?;

        let difficulty = file.drill.difficulty.unwrap_or_default();
        let language = file.drill.language.unwrap_or_default();

        let mut drill = DrillConfig::new(operations, difficulty, language);
        if let Some(tasks) = file.drill.tasks {
            drill.tasks_count = tasks;
        }
        if let Some(secs) = file.drill.time_limit_secs {
            drill.time_limit = Duration::from_secs(secs);
        }
        drill.validate()?;

        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            stt_model: std::env::var("MATHDRILL_STT_MODEL")
                .ok()
                .or(file.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_model: std::env::var("MATHDRILL_TTS_MODEL")
                .ok()
                .or(file.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: std::env::var("MATHDRILL_TTS_VOICE")
                .ok()
                .or(file.voice.tts_voice)
                .unwrap_or(defaults.tts_voice),
            tts_speed: file.voice.tts_speed.unwrap_or(defaults.tts_speed),
        };

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok(),
            deepgram: std::env::var("DEEPGRAM_API_KEY").ok(),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY").ok(),
        };

        Ok(Self { drill, voice, api_keys })
    }

    fn read_file(path: &std::path::Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let file = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(file)
    }

    /// Locate a config file: `$MATHDRILL_CONFIG`, then the XDG config
    /// directory, then `./mathdrill.toml`.
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MATHDRILL_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
            tracing::warn!(path = %p.display(), "MATHDRILL_CONFIG set but file does not exist");
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "omni", "mathdrill") {
            let p = dirs.config_dir().join("mathdrill.toml");
            if p.exists() {
                return Some(p);
            }
        }

        let local = PathBuf::from("mathdrill.toml");
        local.exists().then_some(local)
    }
}

/// Parse an operation name from config or CLI ("add", "sub", "mul", "div").
///
/// `factor` applies to multiplication only.
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown names.
pub fn parse_operation(name: &str, factor: Factor) -> Result<Operation> {
    match name.trim().to_ascii_lowercase().as_str() {
        "add" | "addition" | "+" => Ok(Operation::Addition),
        "sub" | "subtraction" | "-" => Ok(Operation::Subtraction),
        "mul" | "multiplication" | "table" | "x" => Ok(Operation::Multiplication(factor)),
        "div" | "division" | "/" => Ok(Operation::Division),
        other => Err(Error::Config(format!("unknown operation: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DrillConfig {
        DrillConfig::new(vec![Operation::Addition], Difficulty::Easy, Language::En)
    }

    #[test]
    fn defaults_follow_difficulty() {
        let config = base_config();
        assert_eq!(config.tasks_count, 10);
        assert_eq!(config.time_limit, Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_operations_rejected() {
        let mut config = base_config();
        config.operations.clear();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn task_count_bounds_enforced() {
        let mut config = base_config();
        config.tasks_count = 4;
        assert!(config.validate().is_err());
        config.tasks_count = 51;
        assert!(config.validate().is_err());
        config.tasks_count = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn time_limit_bounds_enforced() {
        let mut config = base_config();
        config.time_limit = Duration::from_secs(4);
        assert!(config.validate().is_err());
        config.time_limit = Duration::from_secs(61);
        assert!(config.validate().is_err());
        config.time_limit = Duration::from_secs(60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fixed_factor_bounds_enforced() {
        let mut config = base_config();
        config.operations = vec![Operation::Multiplication(Factor::Fixed(1))];
        assert!(config.validate().is_err());
        config.operations = vec![Operation::Multiplication(Factor::Fixed(9))];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn operation_names_parse() {
        assert_eq!(
            parse_operation("add", Factor::Random).unwrap(),
            Operation::Addition
        );
        assert_eq!(
            parse_operation("MUL", Factor::Fixed(3)).unwrap(),
            Operation::Multiplication(Factor::Fixed(3))
        );
        assert!(parse_operation("mod", Factor::Random).is_err());
    }

    #[test]
    fn load_from_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mathdrill.toml");
        std::fs::write(&path, "[drill]\noperations = [\"div\"]\ndifficulty = \"hard\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.drill.difficulty, Difficulty::Hard);
        assert_eq!(config.drill.operations, vec![Operation::Division]);
        assert_eq!(config.drill.tasks_count, 20);
        assert_eq!(config.drill.time_limit, Duration::from_secs(10));
    }

    #[test]
    fn config_file_round_trip() {
        let toml = r#"
            [drill]
            operations = ["add", "div"]
            difficulty = "medium"
            tasks = 12
            time_limit_secs = 30
            language = "en"

            [voice]
            tts_voice = "nova"
        "#;
        let file: ConfigFile = toml::from_str(toml).unwrap();
        let config = Config::from_file(file).unwrap();

        assert_eq!(config.drill.operations.len(), 2);
        assert_eq!(config.drill.difficulty, Difficulty::Medium);
        assert_eq!(config.drill.tasks_count, 12);
        assert_eq!(config.drill.time_limit, Duration::from_secs(30));
        assert_eq!(config.voice.tts_voice, "nova");
        assert_eq!(config.voice.tts_model, "tts-1");
    }
}
