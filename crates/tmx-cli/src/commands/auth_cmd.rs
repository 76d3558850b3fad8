use tmx_core::access::AccessResolver;
use tmx_core::config::AppConfig;

use crate::auth::{auth_service, AuthSession};
use crate::cli::AuthCommands;
use crate::commands::common::{firestore_for_session, format_timestamp};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands) -> Result<(), CliError> {
    let config = AppConfig::from_env()?;
    let service = auth_service(&config.firebase)?;

    match command {
        AuthCommands::Login {
            email,
            password,
            google_id_token,
        } => {
            let session = match (email, password, google_id_token) {
                (_, _, Some(token)) => service.sign_in_with_google(&token).await?,
                (Some(email), Some(password), None) => {
                    service.sign_in_with_password(&email, &password).await?
                }
                _ => return Err(CliError::MissingCredentials),
            };
            println!("Signed in as {}", session_label(&session));
            report_access(&config, &session).await
        }
        AuthCommands::Status => {
            let Some(session) = service.restore_session().await? else {
                println!("Not signed in.");
                return Ok(());
            };
            println!(
                "Signed in as {} (token expires {})",
                session_label(&session),
                format_timestamp(session.expires_at)
            );
            report_access(&config, &session).await
        }
        AuthCommands::Logout => {
            service.sign_out()?;
            println!("Signed out");
            Ok(())
        }
    }
}

async fn report_access(config: &AppConfig, session: &AuthSession) -> Result<(), CliError> {
    let Some(email) = session.user.email.as_deref() else {
        println!("Account has no email; access cannot be checked.");
        return Ok(());
    };

    let store = firestore_for_session(config, session)?;
    let resolver = AccessResolver::new(store, &config.superadmin_email);
    let authorization = resolver.check_user_allowed(email).await?;
    if authorization.allowed {
        println!("Access: {}", authorization.role);
    } else {
        println!("Access: not on the allowlist. Ask an admin to add {email}.");
    }
    Ok(())
}

fn session_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or(&session.user.uid)
}
