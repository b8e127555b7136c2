use url::Url;

use crate::error::{CommandError, CommandResult};

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

pub trait Shell: Send + Sync {
    fn open_url(&self, url: &Url) -> CommandResult<()>;
}

/// Opens URLs with the user's default handler without waiting for it to exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn open_url(&self, url: &Url) -> CommandResult<()> {
        open::that_detached(url.as_str()).map_err(CommandError::collaborator)
    }
}

/// Parse a URL coming from the webview. Only absolute web and mail links pass.
pub fn parse_external_url(raw: &str) -> CommandResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CommandError::InvalidInput(format!("invalid url {:?}: {}", raw, e)))?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(CommandError::InvalidInput(format!(
            "refusing to open {} url",
            url.scheme()
        )));
    }

    Ok(url)
}
