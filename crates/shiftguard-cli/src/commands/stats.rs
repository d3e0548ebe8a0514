use chrono::{Duration, Utc};
use clap::Subcommand;
use shiftguard_core::metrics::{
    compute_focus_metrics, compute_focus_streak_local, compute_weekly_totals_local, FocusReport,
};
use shiftguard_core::session::SessionRepository;
use shiftguard_core::usage::UsageRepository;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Consecutive days with at least one completed session
    Streak,
    /// Minutes worked on each of the last seven days
    Weekly,
    /// Focus score from recorded app usage
    Focus {
        /// Look back this many days
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Streak, weekly totals and session count together
    Report,
}

pub fn run(action: StatsAction) -> CliResult {
    let ctx = Context::load()?;
    let history = ctx.db.completed_all()?;

    match action {
        StatsAction::Streak => {
            print_json(&serde_json::json!({
                "streak": compute_focus_streak_local(&history),
            }))?;
        }
        StatsAction::Weekly => {
            print_json(&compute_weekly_totals_local(&history))?;
        }
        StatsAction::Focus { days } => {
            let to = Utc::now();
            let from = to - Duration::days(i64::from(days));
            let window = ctx.db.completed_between(from, to)?;
            let mut breaks = Vec::new();
            for session in &window {
                breaks.extend(ctx.db.breaks_for(&session.session_id)?);
            }
            let usage = ctx.db.usage_between(from, to)?;
            let metrics =
                compute_focus_metrics(&window, &breaks, &usage, &ctx.config.app_classifier());
            print_json(&metrics)?;
        }
        StatsAction::Report => {
            print_json(&FocusReport::compute_local(&history))?;
        }
    }
    Ok(())
}
