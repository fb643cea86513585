//! Command-line parsing.

use anyhow::{Result, anyhow, bail};
use shelfsync_core::RequestedDirection;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

pub const USAGE: &str = "Usage: shelfsync [--config <path>] <command>

Commands:
  shelves <feed>                                  print the dashboard shelves
  decide  <feed> <document> <to_audio|from_audio|auto>  evaluate a sync direction
  sync    <remote> <document> <to_audio|from_audio|auto>  evaluate, then ask the server to sync
  link    <feed> <document> <item-id|none>        link or unlink a document

<feed> is a JSON file, an http(s) base URL, or `remote` for the configured URL.";

/// Where the library feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    File(PathBuf),
    /// `None` uses the configured base URL.
    Remote(Option<String>),
}

impl FeedSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("remote") {
            FeedSource::Remote(None)
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            FeedSource::Remote(Some(trimmed.trim_end_matches('/').to_string()))
        } else {
            FeedSource::File(PathBuf::from(trimmed))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Shelves {
        feed: FeedSource,
    },
    Decide {
        feed: FeedSource,
        document: String,
        direction: RequestedDirection,
    },
    Sync {
        feed: FeedSource,
        document: String,
        direction: RequestedDirection,
    },
    Link {
        feed: FeedSource,
        document: String,
        item: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: PathBuf,
    pub command: Command,
}

/// Parse arguments, excluding the program name.
pub fn parse_args<I>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config needs a path\n\n{USAGE}"))?;
                config_path = PathBuf::from(path);
            }
            "-h" | "--help" => bail!("{USAGE}"),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or_else(|| anyhow!("{USAGE}"))?;
    let mut next = |what: &str| {
        positional
            .next()
            .ok_or_else(|| anyhow!("`{name}` is missing <{what}>\n\n{USAGE}"))
    };

    let command = match name.as_str() {
        "shelves" => Command::Shelves {
            feed: FeedSource::parse(&next("feed")?),
        },
        "decide" | "sync" => {
            let feed = FeedSource::parse(&next("feed")?);
            let document = next("document")?;
            let raw = next("direction")?;
            let direction = RequestedDirection::parse(&raw)
                .ok_or_else(|| anyhow!("unknown direction {raw:?}; use to_audio, from_audio or auto"))?;
            if name == "sync" {
                Command::Sync {
                    feed,
                    document,
                    direction,
                }
            } else {
                Command::Decide {
                    feed,
                    document,
                    direction,
                }
            }
        }
        "link" => {
            let feed = FeedSource::parse(&next("feed")?);
            let document = next("document")?;
            let raw = next("item-id|none")?;
            let item = Some(raw.trim().to_string())
                .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("none"));
            Command::Link {
                feed,
                document,
                item,
            }
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}
