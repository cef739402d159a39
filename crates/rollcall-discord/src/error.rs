use thiserror::Error;

/// Errors produced by the Discord access layer.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("not connected to Discord")]
    NotConnected,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by Discord")]
    RateLimited { retry_after: Option<f64> },

    #[error("transient Discord failure: {0}")]
    Transient(String),

    #[error("invalid id: {0}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, DiscordError>;

impl From<serenity::Error> for DiscordError {
    /// Classify a serenity error into the engine's taxonomy.
    /// HTTP 403/404/429 map to their own kinds; everything else is transient.
    fn from(e: serenity::Error) -> Self {
        if let serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(resp)) = &e {
            return match resp.status_code.as_u16() {
                403 => DiscordError::Forbidden(resp.error.message.clone()),
                404 => DiscordError::NotFound(resp.error.message.clone()),
                // Serenity's typed DiscordJsonError has no retry_after
                // field, but a 429 body does not decode as one either, so
                // the raw body (with its retry_after) ends up embedded in
                // the fallback error message. Recover it from there.
                429 => DiscordError::RateLimited {
                    retry_after: retry_after_secs(&resp.error.message),
                },
                _ => DiscordError::Transient(e.to_string()),
            };
        }
        DiscordError::Transient(e.to_string())
    }
}

/// Pull the `retry_after` value out of a raw Discord 429 body carried in an
/// error string, e.g. `{"message": "You are being rate limited.",
/// "retry_after": 64.57, "global": false}`.
fn retry_after_secs(text: &str) -> Option<f64> {
    let key = "\"retry_after\"";
    let tail = &text[text.find(key)? + key.len()..];
    let tail = tail.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let end = tail
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(tail.len());
    let seconds: f64 = tail[..end].parse().ok()?;
    seconds.is_finite().then_some(seconds)
}

impl DiscordError {
    /// Short kind string used in tool error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscordError::NotConnected => "not_connected",
            DiscordError::Forbidden(_) => "forbidden",
            DiscordError::NotFound(_) => "not_found",
            DiscordError::RateLimited { .. } => "rate_limited",
            DiscordError::Transient(_) => "transient",
            DiscordError::InvalidId(_) => "not_found",
        }
    }
}
