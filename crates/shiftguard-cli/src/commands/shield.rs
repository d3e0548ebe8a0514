use clap::Subcommand;
use shiftguard_core::shield::{AppToken, LocalShield, ShieldAdapter, ShieldDispatcher};

use super::{print_json, report_shield, CliResult, Context};

#[derive(Subcommand)]
pub enum ShieldAction {
    /// Grant the one-time consent the shield needs before arming
    Authorize,
    /// Choose which apps and categories to restrict
    Pick {
        /// App or category tokens
        #[arg(required = true)]
        tokens: Vec<AppToken>,
    },
    /// Print shield state and event counts
    Status,
    /// Ask to be let through the shield once
    Bypass,
    /// Report an attempt to open a restricted app
    Attempt {
        token: Option<AppToken>,
    },
}

pub async fn run(action: ShieldAction) -> CliResult {
    let ctx = Context::load()?;
    let shield = ctx.shield()?;
    let mut events = shield.subscribe();

    match action {
        ShieldAction::Authorize => {
            let granted = shield.request_authorization()?;
            print_json(&serde_json::json!({
                "enabled": shield.is_enabled(),
                "authorized": granted,
            }))?;
        }
        ShieldAction::Pick { tokens } => {
            let mut state = shield.snapshot();
            state.available.clear();
            let picker = LocalShield::from_state(shield.is_enabled(), state).with_available(tokens);
            let selection = picker.pick_applications_and_categories()?;
            ctx.save_shield(&picker)?;
            print_json(&selection)?;
            return Ok(());
        }
        ShieldAction::Status => {
            let counts = ctx.event_log()?.totals();
            print_json(&serde_json::json!({
                "enabled": shield.is_enabled(),
                "state": shield.snapshot(),
                "events": counts,
            }))?;
        }
        ShieldAction::Bypass => {
            ctx.require_auth()?;
            let mut store = ctx.session_store(ShieldDispatcher::spawn(shield.clone())?)?;
            let transition = store.request_bypass()?;
            print_json(&transition.event)?;
            report_shield(transition.shield).await;
        }
        ShieldAction::Attempt { token } => {
            shield.simulate_attempt(token);
        }
    }

    ctx.save_shield(&shield)?;
    let counts = ctx.flush_events(&mut events)?;
    tracing::debug!(?counts, "shield events recorded");
    Ok(())
}
