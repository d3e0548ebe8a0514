use clap::Subcommand;
use shiftguard_core::geofence::{require_inside, GeoPoint};
use shiftguard_core::metrics::{summarize_session, FocusReport};
use shiftguard_core::shield::{ShieldAdapter, ShieldDispatcher};
use shiftguard_core::SessionError;

use super::{print_json, report_shield, CliResult, Context};

#[derive(Subcommand)]
pub enum ClockAction {
    /// Start a work session
    In {
        /// Current position as "<lat>,<lon>"; required when the geofence is on
        #[arg(long, allow_hyphen_values = true)]
        at: Option<GeoPoint>,
    },
    /// End the current work session
    Out,
    /// Print the current session state as JSON
    Status,
}

pub async fn run(action: ClockAction) -> CliResult {
    let ctx = Context::load()?;
    if !matches!(action, ClockAction::Status) {
        ctx.require_auth()?;
    }

    let shield = ctx.shield()?;
    let mut events = shield.subscribe();
    let dispatcher = ShieldDispatcher::spawn(shield.clone())?;
    let mut store = ctx.session_store(dispatcher)?;

    match action {
        ClockAction::In { at } => {
            if ctx.config.geofence.enabled {
                let status = require_inside(at, &ctx.config.geofence.locations)?;
                tracing::info!(
                    location = status.location.as_ref().map(|l| l.id.as_str()),
                    "inside work location"
                );
            }
            let transition = store.clock_in()?;
            print_json(&transition.event)?;
            report_shield(transition.shield).await;
        }
        ClockAction::Out => match store.clock_out() {
            Ok(out) => {
                let history = store.history()?;
                let output = serde_json::json!({
                    "event": out.event,
                    "summary": summarize_session(&out.session, out.record.ended_at),
                    "report": FocusReport::compute_local(&history),
                });
                print_json(&output)?;
                report_shield(out.shield).await;
            }
            Err(SessionError::PersistenceFailure {
                record,
                source,
                shield: ticket,
            }) => {
                report_shield(ticket).await;
                ctx.save_shield(&shield)?;
                eprintln!("{}", serde_json::to_string(&record)?);
                return Err(format!(
                    "session {} ended but could not be saved: {source}",
                    record.session_id
                )
                .into());
            }
            Err(e) => return Err(e.into()),
        },
        ClockAction::Status => {
            print_json(&serde_json::json!({
                "activity": store.status().activity(),
                "snapshot": store.snapshot(),
            }))?;
        }
    }

    ctx.save_shield(&shield)?;
    ctx.flush_events(&mut events)?;
    Ok(())
}
