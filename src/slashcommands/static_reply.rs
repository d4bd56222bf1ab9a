use crate::data::config::{CommandConfig, Config};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::Context;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Attachments are resolved relative to this directory.
pub const FILES_DIR: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub attachment: Option<PathBuf>,
}

/// Builds the fixed reply for a configured command.
///
/// Lines of the configured text are separated by a blank line, whatever line
/// endings the config used.
pub fn respond(cmd: &CommandConfig) -> Reply {
    let text = match &cmd.text {
        Some(text) => split_lines(text).collect::<Vec<_>>().join("\n\n"),
        None => String::new(),
    };

    Reply {
        text,
        attachment: cmd.file.as_deref().map(|file| Path::new(FILES_DIR).join(file)),
    }
}

/// Splits on every line boundary a Unicode-aware reader accepts, with `\r\n`
/// counted once. A trailing boundary does not produce an empty last line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let boundary = rest.char_indices().find(|&(_, c)| is_line_boundary(c));
        let Some((end, boundary)) = boundary else {
            return Some(std::mem::take(&mut rest));
        };
        let line = &rest[..end];
        let skip = if rest[end..].starts_with("\r\n") { 2 } else { boundary.len_utf8() };
        rest = &rest[end + skip..];
        Some(line)
    })
}

fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

pub fn register<'a>(
    command: &'a mut CreateApplicationCommand,
    cmd: &CommandConfig,
) -> &'a mut CreateApplicationCommand {
    command.name(&cmd.command).description(&cmd.description)
}

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    config: &Config,
) -> serenity::Result<()> {
    let reply = match config.command(&command.data.name) {
        Some(cmd) => respond(cmd),
        None => {
            warn!("Received unknown command '{}'", command.data.name);
            Reply {
                text: String::from("Unknown command."),
                attachment: None,
            }
        }
    };

    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| {
                    message.content(&reply.text);
                    if let Some(file) = &reply.attachment {
                        message.add_file(file.as_path());
                    }
                    message
                })
        })
        .await
}
