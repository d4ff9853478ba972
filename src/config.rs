//! Configuração do Mr. Timely carregada a partir de `mr-timely.toml`.
//!
//! A struct [`TimelyConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `ANTHROPIC_API_KEY` tem precedência sobre o arquivo.

use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::TimelyError;
use crate::planner::DEFAULT_MAX_ACTIVITIES;

pub const CONFIG_FILE: &str = "mr-timely.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct TimelyConfig {
    /// Chave da API Anthropic; vazia desativa o planejamento por LLM.
    #[serde(default)]
    pub api_key: String,

    /// Onde a sessão atual é gravada.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,

    /// Duração usada por `setup` quando nenhuma é informada.
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,

    /// Sessões salvas há mais tempo que isso não são retomadas.
    #[serde(default = "default_max_session_age_hours")]
    pub max_session_age_hours: u32,

    #[serde(default = "default_planner_model")]
    pub planner_model: String,

    #[serde(default = "default_max_planned_activities")]
    pub max_planned_activities: usize,
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".mr-timely").join("session.json")
}

fn default_duration_minutes() -> u32 {
    60
}

fn default_max_session_age_hours() -> u32 {
    24
}

fn default_planner_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_max_planned_activities() -> usize {
    DEFAULT_MAX_ACTIVITIES
}

impl Default for TimelyConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            session_path: default_session_path(),
            default_duration_minutes: default_duration_minutes(),
            max_session_age_hours: default_max_session_age_hours(),
            planner_model: default_planner_model(),
            max_planned_activities: default_max_planned_activities(),
        }
    }
}

impl TimelyConfig {
    /// Carrega `mr-timely.toml` do diretório atual.
    pub fn load() -> Result<Self, TimelyError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self, TimelyError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TimelyConfig>(&contents)?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), TimelyError> {
        if self.default_duration_minutes == 0 {
            return Err(TimelyError::Config(
                "default_duration_minutes must be greater than zero".into(),
            ));
        }
        if self.max_planned_activities == 0 {
            return Err(TimelyError::Config(
                "max_planned_activities must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn max_session_age(&self) -> Duration {
        Duration::hours(i64::from(self.max_session_age_hours))
    }

    pub fn default_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.default_duration_minutes))
    }
}
