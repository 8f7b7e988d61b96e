//! Line-oriented command loop.
//!
//! Each input line is one request:
//!
//! ```text
//! <origin> <url>        fetch a video
//! <origin> mp3 <url>    fetch and extract the audio as mp3
//! <origin> cancel       cancel the origin's active job
//! ```
//!
//! Replies go to the writer, one line each, prefixed with the origin.

use std::fmt;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use ts_core::{Error, Origin, OutputFormat};
use ts_pipeline::{JobPhase, JobQueue};

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Submit {
        origin: Origin,
        url: String,
        format: OutputFormat,
    },
    Cancel {
        origin: Origin,
    },
}

/// Why a line was not understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Only an origin, or nothing recognisable after it.
    Incomplete,
    /// More words than any request takes.
    TrailingInput,
    /// The URL is not an absolute `http`/`https` URL.
    BadUrl(String),
    /// The URL's host does not resolve.
    UnknownHost(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "expected `<origin> [mp3] <url>` or `<origin> cancel`"),
            Self::TrailingInput => write!(f, "unexpected text after the url"),
            Self::BadUrl(url) => write!(f, "not an http(s) url: {url}"),
            Self::UnknownHost(host) => write!(f, "cannot resolve host {host}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> std::result::Result<Option<Request>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let origin = match words.next() {
        Some(origin) => Origin::new(origin),
        None => return Ok(None),
    };

    let request = match (words.next(), words.next()) {
        (Some(cmd), None) if cmd.eq_ignore_ascii_case("cancel") => Request::Cancel { origin },
        (Some(format), Some(url)) if format.eq_ignore_ascii_case("mp3") => Request::Submit {
            origin,
            url: checked_url(url)?,
            format: OutputFormat::Mp3,
        },
        (Some(url), None) => Request::Submit {
            origin,
            url: checked_url(url)?,
            format: OutputFormat::Video,
        },
        (Some(_), Some(_)) => return Err(ParseError::TrailingInput),
        (None, _) => return Err(ParseError::Incomplete),
    };

    if words.next().is_some() {
        return Err(ParseError::TrailingInput);
    }
    Ok(Some(request))
}

/// Accept only absolute `http`/`https` URLs.
pub fn checked_url(raw: &str) -> std::result::Result<String, ParseError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(parsed.into())
        }
        _ => Err(ParseError::BadUrl(raw.to_string())),
    }
}

/// Resolve the host of a URL accepted by [`checked_url`], so a typo fails
/// here instead of deep inside the fetch.
pub async fn resolve_host(url: &str) -> std::result::Result<(), ParseError> {
    let parsed = url::Url::parse(url).map_err(|_| ParseError::BadUrl(url.to_string()))?;
    let host = match parsed.host() {
        Some(url::Host::Domain(domain)) => domain.to_string(),
        Some(url::Host::Ipv4(_) | url::Host::Ipv6(_)) => return Ok(()),
        None => return Err(ParseError::BadUrl(url.to_string())),
    };
    let port = parsed.port_or_known_default().unwrap_or(80);

    let found = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map(|mut addrs| addrs.next().is_some());
    match found {
        Ok(true) => Ok(()),
        Ok(false) => Err(ParseError::UnknownHost(host)),
        Err(e) => {
            tracing::debug!("lookup of {host} failed: {e}");
            Err(ParseError::UnknownHost(host))
        }
    }
}

/// Run the command loop until `input` ends, then wait for the jobs it
/// started. Interrupting the process cancels every active job first.
pub async fn run<R, W>(queue: &JobQueue, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut jobs = JoinSet::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(finished) = jobs.join_next(), if !jobs.is_empty() => {
                if let Ok((origin, phase)) = finished {
                    reply(&mut output, &origin, &format!("job {phase}")).await?;
                }
                continue;
            }
            _ = tokio::signal::ctrl_c() => {
                let cancelled = queue.cancel_all();
                tracing::info!("interrupted, cancelled {cancelled} active job(s)");
                None
            }
        };

        let Some(line) = line else { break };

        let request = match parse_line(&line) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                output.write_all(format!("error: {e}\n").as_bytes()).await?;
                output.flush().await?;
                continue;
            }
        };

        match request {
            Request::Cancel { origin } => {
                let message = if queue.cancel(&origin) {
                    "cancelling"
                } else {
                    "nothing to cancel"
                };
                reply(&mut output, &origin, message).await?;
            }
            Request::Submit {
                origin,
                url,
                format,
            } => {
                if let Err(e) = resolve_host(&url).await {
                    reply(&mut output, &origin, &format!("rejected: {e}")).await?;
                    continue;
                }
                match queue.submit(origin.clone(), url, format) {
                    Ok(mut ticket) => {
                        reply(&mut output, &origin, &format!("accepted job {}", ticket.id))
                            .await?;
                        jobs.spawn(async move {
                            let phase: JobPhase = ticket.wait().await;
                            (ticket.origin, phase)
                        });
                    }
                    Err(e @ Error::AlreadyActive { .. }) => {
                        reply(&mut output, &origin, &format!("busy: {e}")).await?;
                    }
                    Err(e) => reply(&mut output, &origin, &format!("rejected: {e}")).await?,
                }
            }
        }
    }

    while let Some(finished) = jobs.join_next().await {
        if let Ok((origin, phase)) = finished {
            reply(&mut output, &origin, &format!("job {phase}")).await?;
        }
    }
    Ok(())
}

async fn reply<W: AsyncWrite + Unpin>(output: &mut W, origin: &Origin, message: &str) -> Result<()> {
    output
        .write_all(format!("{origin}: {message}\n").as_bytes())
        .await?;
    output.flush().await?;
    Ok(())
}
