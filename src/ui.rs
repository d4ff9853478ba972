//! Interface de terminal do Mr. Timely: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner do planejamento e `console` para
//! estilização com cores. O [`PlanProgress`] acompanha visualmente a geração
//! de um plano; [`print_status`] e [`print_summary`] mostram a sessão.

use chrono::{DateTime, Utc};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::activity::ActivityState;
use crate::planner::PlannedActivity;
use crate::session::Session;
use crate::summary::{SessionOutcome, SessionSummary};

/// Indicador visual enquanto o planejador consulta o modelo.
pub struct PlanProgress {
    pb: ProgressBar,
    green: Style,
    dim: Style,
}

impl PlanProgress {
    /// Inicia o spinner com o texto do pedido.
    pub fn start(prompt: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Planning: {prompt}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Finaliza o spinner e lista as atividades geradas.
    pub fn finish(&self, plan: &[PlannedActivity]) {
        self.pb.finish_and_clear();
        println!(
            "  {} Planned {} activities",
            self.green.apply_to("✓"),
            plan.len()
        );
        for planned in plan {
            match planned.duration_minutes {
                Some(minutes) => println!(
                    "    • {} {}",
                    planned.name,
                    self.dim.apply_to(format!("({minutes} min)"))
                ),
                None => println!("    • {}", planned.name),
            }
        }
    }
}

/// Mensagem curta de sucesso após um comando.
pub fn print_ok(message: &str) {
    println!("  {} {message}", Style::new().green().bold().apply_to("✓"));
}

/// Mostra relógio, atividade atual e o estado de cada atividade.
pub fn print_status(session: &Session, now: DateTime<Utc>) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    println!(
        "{}  {} elapsed, {} remaining of {}",
        bold.apply_to("Session"),
        format_clock(session.elapsed_secs(now)),
        format_clock(session.remaining_secs(now)),
        format_clock(session.total_duration_secs),
    );

    match (session.current_activity(), session.timeline().open_entry()) {
        (Some(activity), Some(entry)) => println!(
            "{}  {} ({})",
            bold.apply_to("Now"),
            activity.name,
            format_clock(entry.duration_secs(now))
        ),
        _ => println!("{}  {}", bold.apply_to("Now"), dim.apply_to("nothing running")),
    }
    println!();

    if session.machine().is_empty() {
        println!("  {}", dim.apply_to("No activities yet. Add one with `mr-timely add`."));
        return;
    }
    for (activity, record) in session.activities() {
        let state = state_style(record.state).apply_to(format!("{:<9}", record.state.to_string()));
        let name = if record.state.is_terminal() {
            dim.apply_to(activity.name.as_str())
        } else {
            Style::new().apply_to(activity.name.as_str())
        };
        println!(
            "  {state} {name} {}",
            dim.apply_to(format!("[{}]", activity.id))
        );
    }
    let pending = session
        .machine()
        .activities_in_state(ActivityState::Pending)
        .count();
    if pending > 0 {
        println!();
        println!("  {}", dim.apply_to(format!("{pending} still pending")));
    }

    if session.is_completed() {
        println!();
        println!("  {}", Style::new().green().bold().apply_to("All activities done."));
    } else if session.is_time_up(now) {
        println!();
        println!("  {}", Style::new().red().bold().apply_to("Time is up."));
    }
}

/// Imprime o resumo da sessão com os tempos por atividade.
pub fn print_summary(summary: &SessionSummary) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    let outcome_style = match summary.outcome {
        SessionOutcome::Completed => Style::new().green().bold(),
        SessionOutcome::TimeUp => Style::new().red().bold(),
        SessionOutcome::InProgress => Style::new().yellow(),
    };

    println!("{}", outcome_style.apply_to(format!("─── {} ───", outcome_label(summary.outcome))));
    println!("  Planned   {}", format_clock(summary.planned_secs));
    println!("  Spent     {}", format_clock(summary.time_spent_secs));
    println!("  Active    {}", format_clock(summary.active_secs));
    println!("  Idle      {}", format_clock(summary.idle_secs));
    if summary.overtime_secs > 0 {
        println!(
            "  Overtime  {}",
            Style::new().red().apply_to(format_clock(summary.overtime_secs))
        );
    }

    if !summary.activities.is_empty() {
        println!();
        println!("{}", bold.apply_to("Time per activity"));
        for time in &summary.activities {
            println!("  {:>8}  {}", format_clock(time.duration_secs), time.name);
        }
    }
    if !summary.skipped.is_empty() {
        println!();
        println!("{}", bold.apply_to("Skipped"));
        for skipped in &summary.skipped {
            println!("  {} {}", skipped.name, dim.apply_to(format!("[{}]", skipped.id)));
        }
    }
}

fn state_style(state: ActivityState) -> Style {
    match state {
        ActivityState::Pending => Style::new().dim(),
        ActivityState::Running => Style::new().cyan().bold(),
        ActivityState::Completed => Style::new().green(),
        ActivityState::Removed => Style::new().red().dim(),
    }
}

fn outcome_label(outcome: SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Completed => "Session complete",
        SessionOutcome::TimeUp => "Time is up",
        SessionOutcome::InProgress => "Session in progress",
    }
}

/// `h:mm:ss` acima de uma hora, `m:ss` abaixo. Negativos viram zero.
pub fn format_clock(secs: i64) -> String {
    let secs = secs.max(0);
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
