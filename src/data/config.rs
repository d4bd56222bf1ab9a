//! Bot configuration, decoded from an untyped YAML value rather than a derived
//! `Deserialize` so errors can name the dotted path of the first missing key.
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use serenity::model::id::{ChannelId, EmojiId, GuildId, MessageId, RoleId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent. Holds the dotted path of the first one found.
    #[error("'{0}' not set in config")]
    Missing(String),
    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
    #[error("cannot read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Everything the bot needs to know about its single guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_id: GuildId,
    pub roles: RolesConfig,
    pub commands: Vec<CommandConfig>,
}

/// The one tracked reaction-role message and its emoji mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolesConfig {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji_to_role: HashMap<EmojiId, RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    pub command: String,
    pub description: String,
    pub text: Option<String>,
    pub file: Option<PathBuf>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let root = as_mapping(value, "<root>")?;

        let server_id = GuildId(id(require(root, "server", "server")?, "server")?);

        let roles = as_mapping(require(root, "roles", "roles")?, "roles")?;
        let channel_id = ChannelId(id(
            require(roles, "channel", "roles.channel")?,
            "roles.channel",
        )?);
        let message_id = MessageId(id(
            require(roles, "message", "roles.message")?,
            "roles.message",
        )?);

        let mut emoji_to_role = HashMap::new();
        for (index, item) in as_sequence(require(roles, "list", "roles.list")?, "roles.list")?
            .iter()
            .enumerate()
        {
            let path = format!("roles.list[{index}]");
            let item = as_mapping(item, &path)?;
            let emoji_key = format!("{path}.emoji");
            let role_key = format!("{path}.role");
            let emoji = EmojiId(id(require(item, "emoji", &emoji_key)?, &emoji_key)?);
            let role = RoleId(id(require(item, "role", &role_key)?, &role_key)?);
            emoji_to_role.insert(emoji, role);
        }

        let mut commands: Vec<CommandConfig> = Vec::new();
        for (index, item) in as_sequence(require(root, "commands", "commands")?, "commands")?
            .iter()
            .enumerate()
        {
            let path = format!("commands[{index}]");
            let command = CommandConfig::from_mapping(as_mapping(item, &path)?, &path)?;
            if commands.iter().any(|c| c.command == command.command) {
                return Err(invalid(
                    format!("{path}.command"),
                    format!("duplicate command name {:?}", command.command),
                ));
            }
            commands.push(command);
        }

        Ok(Self {
            server_id,
            roles: RolesConfig {
                channel_id,
                message_id,
                emoji_to_role,
            },
            commands,
        })
    }

    pub fn command(&self, name: &str) -> Option<&CommandConfig> {
        self.commands.iter().find(|c| c.command == name)
    }
}

impl CommandConfig {
    fn from_mapping(item: &Mapping, path: &str) -> Result<Self, ConfigError> {
        let command_key = format!("{path}.command");
        let description_key = format!("{path}.description");
        let command: String = typed(require(item, "command", &command_key)?, &command_key)?;
        let description: String =
            typed(require(item, "description", &description_key)?, &description_key)?;

        check_command_name(&command).map_err(|reason| invalid(command_key, reason))?;
        let chars = description.chars().count();
        if !(1..=100).contains(&chars) {
            return Err(invalid(
                description_key,
                format!("must be 1 to 100 characters, got {chars}"),
            ));
        }

        let text = optional::<String>(item, "text", path)?;
        let file = optional::<String>(item, "file", path)?.map(PathBuf::from);

        Ok(Self {
            command,
            description,
            text,
            file,
        })
    }
}

/// Slash command names: 1 to 32 chars of `-`, `_` or alphanumerics without an
/// uppercase form, so caseless scripts pass.
fn check_command_name(name: &str) -> Result<(), String> {
    let chars = name.chars().count();
    if !(1..=32).contains(&chars) {
        return Err(format!("must be 1 to 32 characters, got {chars}"));
    }
    let allowed =
        |c: char| c == '-' || c == '_' || (c.is_alphanumeric() && c.to_lowercase().eq([c]));
    match name.chars().find(|&c| !allowed(c)) {
        Some(c) => Err(format!("character {c:?} is not allowed in command names")),
        None => Ok(()),
    }
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.into(),
        reason: reason.into(),
    }
}

fn require<'a>(map: &'a Mapping, key: &str, path: &str) -> Result<&'a Value, ConfigError> {
    match map.get(key) {
        Some(Value::Null) | None => Err(ConfigError::Missing(path.to_owned())),
        Some(value) => Ok(value),
    }
}

fn optional<T: DeserializeOwned>(
    map: &Mapping,
    key: &str,
    path: &str,
) -> Result<Option<T>, ConfigError> {
    match map.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => typed(value, &format!("{path}.{key}")).map(Some),
    }
}

fn typed<T: DeserializeOwned>(value: &Value, path: &str) -> Result<T, ConfigError> {
    serde_yaml::from_value(value.clone()).map_err(|err| invalid(path, err.to_string()))
}

/// Discord ids may be written as integers or as strings holding an integer.
fn id(value: &Value, path: &str) -> Result<u64, ConfigError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(path, format!("{s:?} is not an integer id"))),
        other => typed(other, path),
    }
}

fn as_mapping<'a>(value: &'a Value, path: &str) -> Result<&'a Mapping, ConfigError> {
    value
        .as_mapping()
        .ok_or_else(|| invalid(path, "expected a mapping"))
}

fn as_sequence<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, ConfigError> {
    value
        .as_sequence()
        .ok_or_else(|| invalid(path, "expected a list"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml).expect("valid yaml");
        Config::from_value(&value)
    }

    fn missing(yaml: &str) -> String {
        match parse(yaml) {
            Err(ConfigError::Missing(key)) => key,
            other => panic!("expected missing key, got {other:?}"),
        }
    }

    const FULL: &str = r#"
server: "1"
roles:
  channel: 10
  message: 100
  list:
    - emoji: 5
      role: 7
    - emoji: 6
      role: 7
commands:
  - command: rules
    description: Show the server rules
    text: |
      Be nice.
      No spam.
  - command: map
    description: Post the map
    file: map.png
"#;

    #[test]
    fn full_config() {
        let config = parse(FULL).expect("config is valid");
        assert_eq!(config.server_id, GuildId(1));
        assert_eq!(config.roles.channel_id, ChannelId(10));
        assert_eq!(config.roles.message_id, MessageId(100));
        assert_eq!(config.roles.emoji_to_role.len(), 2);
        assert_eq!(config.roles.emoji_to_role[&EmojiId(6)], RoleId(7));

        let rules = config.command("rules").expect("rules command");
        assert_eq!(rules.text.as_deref(), Some("Be nice.\nNo spam.\n"));
        assert_eq!(rules.file, None);

        let map = config.command("map").expect("map command");
        assert_eq!(map.text, None);
        assert_eq!(map.file, Some(PathBuf::from("map.png")));
    }

    #[test]
    fn server_as_integer() {
        let config = parse(&FULL.replace("server: \"1\"", "server: 1")).expect("config is valid");
        assert_eq!(config.server_id, GuildId(1));
    }

    #[test]
    fn reports_first_missing_key() {
        assert_eq!(missing("roles: {}\ncommands: []"), "server");
        assert_eq!(
            missing("server: 1\nroles:\n  message: 1\n  list: []\ncommands: []"),
            "roles.channel"
        );
        assert_eq!(
            missing("server: 1\nroles:\n  channel: 1\n  list: []\ncommands: []"),
            "roles.message"
        );
        assert_eq!(
            missing("server: 1\nroles: {channel: 1, message: 2, list: []}\ncommands:\n  - description: x"),
            "commands[0].command"
        );
        assert_eq!(
            missing("server: 1\nroles: {channel: 1, message: 2, list: []}\ncommands:\n  - command: x"),
            "commands[0].description"
        );
    }

    #[test]
    fn null_counts_as_missing() {
        assert_eq!(missing("server: ~\nroles: {}\ncommands: []"), "server");
    }

    #[test]
    fn duplicate_emoji_last_wins() {
        let config = parse(
            "server: 1\nroles:\n  channel: 1\n  message: 2\n  list:\n    - {emoji: 5, role: 1}\n    - {emoji: 5, role: 2}\ncommands: []",
        )
        .expect("config is valid");
        assert_eq!(config.roles.emoji_to_role.len(), 1);
        assert_eq!(config.roles.emoji_to_role[&EmojiId(5)], RoleId(2));
    }

    #[test]
    fn rejects_bad_command_names() {
        let base = "server: 1\nroles: {channel: 1, message: 2, list: []}\ncommands:\n";
        for name in ["Rules", "two words", "", "abcdefghijklmnopqrstuvwxyz0123456"] {
            let yaml = format!("{base}  - {{command: {name:?}, description: x}}");
            assert!(
                matches!(parse(&yaml), Err(ConfigError::Invalid { .. })),
                "{name:?} must be rejected"
            );
        }
    }

    #[test]
    fn accepts_caseless_command_names() {
        let base = "server: 1\nroles: {channel: 1, message: 2, list: []}\ncommands:\n";
        for name in ["日本", "ไทย", "ß-rules_2"] {
            let yaml = format!("{base}  - {{command: {name:?}, description: x}}");
            let config =
                parse(&yaml).unwrap_or_else(|e| panic!("{name:?} must be accepted: {e}"));
            assert_eq!(config.commands[0].command, name);
        }
    }

    #[test]
    fn rejects_duplicate_commands() {
        let yaml = "server: 1\nroles: {channel: 1, message: 2, list: []}\ncommands:\n  - {command: a, description: x}\n  - {command: a, description: y}";
        match parse(yaml) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "commands[1].command"),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_ids() {
        match parse("server: guild\nroles: {channel: 1, message: 2, list: []}\ncommands: []") {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "server"),
            other => panic!("expected invalid, got {other:?}"),
        }
    }
}
