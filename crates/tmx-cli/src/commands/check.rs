use crate::commands::common::Context;
use crate::error::CliError;

/// Report whether `email` (or the signed-in user) may use the app.
pub async fn run_check(ctx: &Context, email: Option<&str>) -> Result<String, CliError> {
    let Some(email) = email else {
        return Ok(format!("{}: allowed as {}", ctx.actor.email(), ctx.actor.role));
    };

    let authorization = ctx.users().resolver().check_user_allowed(email).await?;
    Ok(if authorization.allowed {
        format!("{}: allowed as {}", email.trim(), authorization.role)
    } else {
        format!("{}: not allowed", email.trim())
    })
}
