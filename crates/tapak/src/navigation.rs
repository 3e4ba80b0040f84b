//! Turn-by-turn navigation links.
//!
//! Builds the platform's preferred Google Maps deep link for a record's
//! coordinates and falls back to the web directions URL when the deep link
//! cannot be opened.

use std::fmt;
use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Target platform family; decides which deep link is tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// `google.navigation:` intent, opened directly.
    #[default]
    Android,
    /// `comgooglemaps://` scheme, opened only if something can handle it.
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Android => write!(f, "android"),
            Self::Ios => write!(f, "ios"),
        }
    }
}

/// Something that can hand a URL to an external application.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// Whether an installed handler accepts `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability query itself fails.
    async fn can_open(&self, url: &str) -> io::Result<bool>;

    /// Open `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler accepted the URL.
    async fn open(&self, url: &str) -> io::Result<()>;
}

/// Which link ended up being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The platform deep link was opened.
    Preferred(String),
    /// The web URL was opened instead.
    WebFallback(String),
    /// Even the web URL failed; the failure was logged.
    Unavailable(String),
}

impl NavigationOutcome {
    /// The URL that was (or was last) attempted.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Preferred(url) | Self::WebFallback(url) | Self::Unavailable(url) => url,
        }
    }
}

/// Google Maps web directions URL.
#[must_use]
pub fn web_url(coordinates: &str) -> String {
    format!("https://www.google.com/maps/dir/?api=1&destination={coordinates}")
}

/// The platform's preferred deep link.
#[must_use]
pub fn preferred_url(coordinates: &str, platform: Platform) -> String {
    match platform {
        Platform::Android => format!("google.navigation:q={coordinates}"),
        Platform::Ios => format!("comgooglemaps://?daddr={coordinates}&directionsmode=driving"),
    }
}

/// Open navigation to `coordinates`.
///
/// The only check is that the text contains a comma; the text is passed to
/// the maps app unchanged. Dispatch failures never become errors: the web
/// URL is tried as a fallback and its own failure is only logged.
///
/// # Errors
///
/// Returns [`Error::InvalidCoordinates`] without dispatching anything when
/// `coordinates` has no comma.
pub async fn navigate(
    coordinates: &str,
    platform: Platform,
    opener: &dyn LinkOpener,
) -> Result<NavigationOutcome> {
    if !coordinates.contains(',') {
        return Err(Error::invalid_coordinates(coordinates));
    }

    let preferred = preferred_url(coordinates, platform);
    let web = web_url(coordinates);

    let use_preferred = match platform {
        Platform::Android => true,
        Platform::Ios => match opener.can_open(&preferred).await {
            Ok(supported) => supported,
            Err(e) => {
                debug!(url = %preferred, error = %e, "Capability query failed");
                false
            }
        },
    };

    if use_preferred {
        match opener.open(&preferred).await {
            Ok(()) => {
                info!(url = %preferred, %platform, "Opened navigation app");
                return Ok(NavigationOutcome::Preferred(preferred));
            }
            Err(e) => debug!(url = %preferred, error = %e, "Deep link failed, using web"),
        }
    }

    match opener.open(&web).await {
        Ok(()) => {
            info!(url = %web, "Opened web navigation");
            Ok(NavigationOutcome::WebFallback(web))
        }
        Err(e) => {
            warn!(url = %web, error = %e, "Could not open navigation");
            Ok(NavigationOutcome::Unavailable(web))
        }
    }
}

/// Opens links with the desktop's URL handler (`open` on macOS, `xdg-open`
/// elsewhere). Only web links are considered openable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn program() -> &'static str {
        if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

#[async_trait]
impl LinkOpener for SystemOpener {
    async fn can_open(&self, url: &str) -> io::Result<bool> {
        Ok(is_web_link(url))
    }

    async fn open(&self, url: &str) -> io::Result<()> {
        if !is_web_link(url) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no handler for {url}"),
            ));
        }
        let status = tokio::process::Command::new(Self::program())
            .arg(url)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "{} exited with {status}",
                Self::program()
            )))
        }
    }
}

/// "Opens" links by printing them to stdout. Only web links are considered
/// openable, so deep links fall back to the web URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOpener;

#[async_trait]
impl LinkOpener for PrintOpener {
    async fn can_open(&self, url: &str) -> io::Result<bool> {
        Ok(is_web_link(url))
    }

    async fn open(&self, url: &str) -> io::Result<()> {
        if !is_web_link(url) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot print-open {url}"),
            ));
        }
        println!("{url}");
        Ok(())
    }
}

fn is_web_link(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}
