use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tmx")]
#[command(about = "Shared rich-text notes with role-based access")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and out of Firebase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Check whether an email is on the allowlist
    Check {
        /// Email to check (defaults to the signed-in user)
        email: Option<String>,
    },
    /// Read and write notes
    Notes {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage the allowlist (admins only)
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password or a Google ID token
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL", requires = "password")]
        email: Option<String>,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
        /// Google ID token from an external sign-in flow
        #[arg(long, value_name = "TOKEN", conflicts_with_all = ["email", "password"])]
        google_id_token: Option<String>,
    },
    /// Show who is signed in and their role
    Status,
    /// Forget the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// List visible notes, pinned first
    List {
        /// Only notes whose title or preview contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a note's text
    Show {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Create a note, optionally with initial text
    #[command(alias = "add")]
    New {
        /// Initial text; one paragraph per line
        content: Vec<String>,
    },
    /// Edit a note in $EDITOR
    Edit {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Toggle a note's pin
    Pin {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Replace a note's assignees
    Assign {
        /// Note ID or unique ID prefix
        id: String,
        /// Assignee emails (none clears the list)
        emails: Vec<String>,
    },
    /// Print the note list every time it changes
    Watch,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List allowed users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Allow a user
    Add {
        email: String,
        #[arg(long, value_enum, default_value_t = RoleArg::User)]
        role: RoleArg,
    },
    /// Remove a user from the allowlist
    Remove { email: String },
    /// Change a user's role (superadmin only)
    Role {
        email: String,
        #[arg(value_enum)]
        role: RoleArg,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for tmx_core::UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => Self::User,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

impl From<CompletionShell> for clap_complete::Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
        }
    }
}
