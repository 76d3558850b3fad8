use chrono::Utc;
use tmx_core::editor::EditorSession;
use tmx_core::models::RichDocument;
use tmx_core::sync::filter_notes;
use tmx_core::{Note, NoteId};

use crate::cli::NoteCommands;
use crate::commands::common::{
    capture_editor_input_with_initial, format_note_lines, note_to_list_item, resolve_note,
    Context, NoteListItem,
};
use crate::error::CliError;

pub async fn run_notes(ctx: &Context, command: NoteCommands) -> Result<(), CliError> {
    match command {
        NoteCommands::List {
            search,
            limit,
            json,
        } => {
            let notes = list_notes(ctx, search.as_deref(), limit).await?;
            if json {
                let items = notes.iter().map(note_to_list_item).collect::<Vec<NoteListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_lines(&format_note_lines(&notes, Utc::now().timestamp_millis()));
            }
        }
        NoteCommands::Show { id } => {
            let note = resolve_note(ctx, &id).await?;
            println!("{}", render_note(&note));
        }
        NoteCommands::New { content } => {
            let id = create_note(ctx, &content.join(" ")).await?;
            println!("{id}");
        }
        NoteCommands::Edit { id } => {
            let note = resolve_note(ctx, &id).await?;
            let edited =
                capture_editor_input_with_initial(&note.content.to_plain_text())?.unwrap_or_default();
            save_edit(ctx, &note, &edited).await?;
            println!("{}", note.id);
        }
        NoteCommands::Pin { id } => {
            let note = resolve_note(ctx, &id).await?;
            ctx.notes().toggle_pin(&note.id, note.is_pinned).await?;
            let action = if note.is_pinned { "Unpinned" } else { "Pinned" };
            println!("{action} {}", note.id);
        }
        NoteCommands::Delete { id } => {
            let note = resolve_note(ctx, &id).await?;
            ctx.notes().delete_note(&note.id).await?;
            println!("Deleted {}", note.id);
        }
        NoteCommands::Assign { id, emails } => {
            let note = resolve_note(ctx, &id).await?;
            let assigned = ctx.notes().assign_note(&note.id, &emails).await?;
            if assigned.is_empty() {
                println!("{} has no assignees", note.id);
            } else {
                println!("{} assigned to {}", note.id, assigned.join(", "));
            }
        }
        NoteCommands::Watch => watch_notes(ctx).await?,
    }

    Ok(())
}

pub async fn list_notes(
    ctx: &Context,
    search: Option<&str>,
    limit: usize,
) -> Result<Vec<Note>, CliError> {
    let notes = ctx.feed().list_notes(&ctx.scope()).await?;
    let mut notes = filter_notes(&notes, search.unwrap_or_default());
    notes.truncate(limit);
    Ok(notes)
}

/// Create a note and, when `text` is not blank, fill it in.
pub async fn create_note(ctx: &Context, text: &str) -> Result<NoteId, CliError> {
    let service = ctx.notes();
    let id = service.create_note().await?;
    if !text.trim().is_empty() {
        service
            .update_content(&id, &RichDocument::from_plain_text(text.trim()))
            .await?;
    }
    Ok(id)
}

/// Write edited text back through an editor session. Returns `false` when
/// the text did not change.
pub async fn save_edit(ctx: &Context, note: &Note, edited: &str) -> Result<bool, CliError> {
    let content = RichDocument::from_plain_text(edited);
    if content.to_plain_text() == note.content.to_plain_text() {
        return Ok(false);
    }

    let mut session = EditorSession::new(ctx.notes());
    session.open(note);
    session.edit(content)?;
    session.close().await?;
    Ok(true)
}

pub fn render_note(note: &Note) -> String {
    let mut rendered = format!("# {}\n", note.title);
    if note.is_pinned {
        rendered.push_str("(pinned)\n");
    }
    if !note.assigned_to.is_empty() {
        rendered.push_str(&format!("Assigned to: {}\n", note.assigned_to.join(", ")));
    }
    if let Some(editor) = note.last_edited_by.as_ref() {
        let name = editor
            .display_name
            .as_deref()
            .or(editor.email.as_deref())
            .unwrap_or(&editor.uid);
        rendered.push_str(&format!("Last edited by: {name}\n"));
    }
    rendered.push('\n');
    rendered.push_str(&note.content.to_plain_text());
    rendered
}

async fn watch_notes(ctx: &Context) -> Result<(), CliError> {
    let mut subscription = ctx.feed().subscribe(&ctx.scope());
    loop {
        tokio::select! {
            item = subscription.next() => match item {
                Some(Ok(notes)) => {
                    println!("--- {} note(s) ---", notes.len());
                    print_lines(&format_note_lines(&notes, Utc::now().timestamp_millis()));
                }
                Some(Err(error)) => return Err(error.into()),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
