use tmx_core::{AllowedUser, UserRole};

use crate::cli::UserCommands;
use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_users(ctx: &Context, command: UserCommands) -> Result<(), CliError> {
    let directory = ctx.users();
    match command {
        UserCommands::List { json } => {
            let users = directory.list_allowed_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                for line in format_user_lines(&users, &ctx.superadmin_email) {
                    println!("{line}");
                }
            }
        }
        UserCommands::Add { email, role } => {
            let user = directory
                .add_allowed_user(&ctx.actor, &email, role.into())
                .await?;
            println!("Added {} as {}", user.email, user.role);
        }
        UserCommands::Remove { email } => {
            directory.remove_allowed_user(&ctx.actor, &email).await?;
            println!("Removed {}", email.trim());
        }
        UserCommands::Role { email, role } => {
            let role: UserRole = role.into();
            directory.update_user_role(&ctx.actor, &email, role).await?;
            println!("{} is now {}", email.trim(), role);
        }
    }
    Ok(())
}

/// The superadmin first, then one line per allowlist row.
pub fn format_user_lines(users: &[AllowedUser], superadmin_email: &str) -> Vec<String> {
    std::iter::once(format!("{superadmin_email:<40} superadmin"))
        .chain(users.iter().map(|user| {
            if user.added_by.is_empty() {
                format!("{:<40} {}", user.email, user.role.as_str())
            } else {
                format!(
                    "{:<40} {:<10} added by {}",
                    user.email,
                    user.role.as_str(),
                    user.added_by
                )
            }
        }))
        .collect()
}
