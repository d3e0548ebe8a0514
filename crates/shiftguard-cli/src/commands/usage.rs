use clap::Subcommand;
use shiftguard_core::session::SessionId;
use shiftguard_core::shield::ShieldDispatcher;
use shiftguard_core::{Database, UsageTracker};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum UsageAction {
    /// Attribute foreground time in an app to the open session
    Record {
        /// App identifier (e.g. "com.tinyspeck.slackmacgap")
        app: String,
        /// Foreground seconds
        seconds: u64,
    },
    /// Per-app totals for the open session, or for a given one
    Show {
        #[arg(long)]
        session: Option<String>,
    },
    /// Flip an app between work and non-work
    Toggle {
        app: String,
    },
}

pub fn run(action: UsageAction) -> CliResult {
    let mut ctx = Context::load()?;

    match action {
        UsageAction::Record { app, seconds } => {
            let store = ctx.session_store(ShieldDispatcher::disabled())?;
            let tracker = UsageTracker::new(Box::new(Database::open()?), store.watch_active_session());
            if tracker.record(&app, seconds)? {
                println!("recorded");
            } else {
                return Err("sample dropped: no open session or empty sample".into());
            }
        }
        UsageAction::Show { session } => {
            let store = ctx.session_store(ShieldDispatcher::disabled())?;
            let tracker = UsageTracker::new(Box::new(Database::open()?), store.watch_active_session());
            let totals = match session {
                Some(id) => tracker.totals_for(&SessionId::from(id))?,
                None => tracker.current_totals()?,
            };
            print_json(&totals)?;
        }
        UsageAction::Toggle { app } => {
            let mut classifier = ctx.config.app_classifier();
            let is_work = classifier.toggle(&app);
            ctx.config.usage.work_apps = classifier.work_apps().map(String::from).collect();
            ctx.config.save()?;
            print_json(&serde_json::json!({
                "app": app.trim(),
                "is_work_app": is_work,
            }))?;
        }
    }
    Ok(())
}
