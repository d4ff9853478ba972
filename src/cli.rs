//! Interface de linha de comando do Mr. Timely baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] e flags globais
//! (--session, --verbose).

use std::path::PathBuf;

use chrono::Duration;
use clap::{Parser, Subcommand};

/// Mr. Timely: acompanhe atividades dentro de um tempo definido.
#[derive(Debug, Parser)]
#[command(name = "mr-timely", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo da sessão (sobrepõe `session_path` do mr-timely.toml).
    #[arg(long, global = true)]
    pub session: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Começa uma nova sessão com a duração dada (ex.: 45m, 1h30m, 90).
    Setup {
        #[arg(value_parser = parse_duration)]
        duration: Option<Duration>,
    },

    /// Adiciona uma atividade à sessão.
    Add {
        name: String,

        /// ID explícito; por padrão é derivado do nome.
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Inicia uma atividade pendente.
    Start { id: String },

    /// Conclui a atividade atual e inicia outra.
    Switch { id: String },

    /// Conclui uma atividade (a atual, se nenhuma for informada).
    Complete { id: Option<String> },

    /// Remove uma atividade.
    Remove { id: String },

    /// Mostra o estado da sessão.
    Status,

    /// Mostra o resumo da sessão.
    Summary {
        /// Emite o resumo em JSON.
        #[arg(long)]
        json: bool,
    },

    /// Gera atividades a partir de uma descrição em linguagem natural.
    Plan { prompt: String },

    /// Descarta a sessão salva.
    Reset,
}

/// Accepts `90` (minutes), `45m`, `2h` and `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim().to_ascii_lowercase();
    if input.is_empty() {
        return Err("duration must not be empty".into());
    }
    if let Ok(minutes) = input.parse::<u32>() {
        return positive(Duration::minutes(i64::from(minutes)), &input);
    }

    let mut total = Duration::zero();
    let mut number = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let value: i64 = number
            .parse()
            .map_err(|_| format!("invalid duration `{input}`"))?;
        let part = match c {
            'h' => Duration::try_hours(value),
            'm' => Duration::try_minutes(value),
            's' => Duration::try_seconds(value),
            _ => return Err(format!("invalid duration unit `{c}` in `{input}`")),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| format!("duration `{input}` is out of range"))?;
        number.clear();
    }
    if !number.is_empty() {
        return Err(format!("missing unit after `{number}` in `{input}`"));
    }
    positive(total, &input)
}

fn positive(duration: Duration, input: &str) -> Result<Duration, String> {
    if duration > Duration::zero() {
        Ok(duration)
    } else {
        Err(format!("duration `{input}` must be greater than zero"))
    }
}
