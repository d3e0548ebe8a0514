use clap::Subcommand;
use shiftguard_core::session::BreakKind;
use shiftguard_core::shield::{ShieldAdapter, ShieldDispatcher};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum BreakAction {
    /// Start a break (lunch, coffee or personal)
    Start {
        kind: BreakKind,
    },
    /// End the current break
    End,
}

pub async fn run(action: BreakAction) -> CliResult {
    let ctx = Context::load()?;
    ctx.require_auth()?;

    let shield = ctx.shield()?;
    let mut events = shield.subscribe();
    let mut store = ctx.session_store(ShieldDispatcher::spawn(shield.clone())?)?;

    let event = match action {
        BreakAction::Start { kind } => store.start_break(kind)?,
        BreakAction::End => store.end_break()?,
    };
    print_json(&event)?;

    ctx.save_shield(&shield)?;
    ctx.flush_events(&mut events)?;
    Ok(())
}
