//! First-time setup of the remote connection.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use inquire::{Password, PasswordDisplayMode, Text};

use crate::settings::{self, Settings};

/// Values collected from flags or prompts
#[derive(Debug, Default)]
pub struct InitOptions {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub key_column: Option<String>,
}

fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// The hosted database is always reached over HTTP(S)
pub fn is_valid_remote_url(url: &str) -> bool {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

/// Merge `options` into the saved settings, prompting for anything missing
pub fn handle_init(options: InitOptions) -> Result<()> {
    let mut settings = Settings::load()?;
    let interactive = is_interactive();

    let url = match options.url.or_else(|| settings.remote_url.clone()) {
        Some(url) => url,
        None if interactive => Text::new("Hosted database URL:")
            .with_placeholder("https://your-project.supabase.co")
            .with_help_message("Base URL of the project; REST calls go to <url>/rest/v1")
            .prompt()
            .context("Failed to get database URL")?,
        None => return Err(anyhow!("No database URL given. Pass --url or run interactively.")),
    };

    if !is_valid_remote_url(&url) {
        return Err(anyhow!(
            "Invalid URL '{}'. Must start with 'https://' or 'http://'",
            url
        ));
    }

    let api_key = match options.api_key.or_else(|| settings.api_key.clone()) {
        Some(key) => key,
        None if interactive => Password::new("API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .context("Failed to get API key")?,
        None => {
            return Err(anyhow!(
                "No API key given. Pass --api-key, set {}, or run interactively.",
                settings::API_KEY_ENV
            ))
        }
    };

    settings.remote_url = Some(url.trim().trim_end_matches('/').to_string());
    settings.api_key = Some(api_key.trim().to_string());
    if let Some(column) = options.key_column {
        settings.key_column = column;
    }

    settings.save().context("Failed to save configuration")?;

    println!("{}", "✓ Configuration saved".green().bold());
    println!(
        "  Remote: {}",
        settings.remote_url.as_deref().unwrap_or_default().cyan()
    );
    println!("  Key column: {}", settings.key_column);

    Ok(())
}
