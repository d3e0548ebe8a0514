use clap::Subcommand;
use shiftguard_core::credentials::{redeem_org_code, sign_in, sign_out};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in and store fresh tokens
    Login {
        /// Work email address
        email: String,
    },
    /// Forget tokens, user and organization
    Logout,
    /// Print the current authentication context as JSON
    Status,
    /// Join an organization with an invite code
    Redeem {
        /// Invite code (case-insensitive)
        code: String,
    },
}

pub fn run(action: AuthAction) -> CliResult {
    let ctx = Context::load()?;
    let store = ctx.credentials()?;

    match action {
        AuthAction::Login { email } => {
            let auth = sign_in(store.as_ref(), &email)?;
            print_json(&auth)?;
        }
        AuthAction::Logout => {
            sign_out(store.as_ref())?;
            println!("signed out");
        }
        AuthAction::Status => {
            print_json(&ctx.auth()?)?;
        }
        AuthAction::Redeem { code } => {
            ctx.require_auth()?;
            let org_id = redeem_org_code(store.as_ref(), &code)?;
            println!("{org_id}");
        }
    }
    Ok(())
}
