//! Decides whether a page should get the automation attached.

use url::Url;

/// Matches page locations that host the player.
#[derive(Debug, Clone)]
pub struct ActivationGate {
    host: String,
    path: String,
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self {
            host: "youtube.com".to_string(),
            path: "/watch".to_string(),
        }
    }
}

impl ActivationGate {
    /// Creates a gate for a custom host (subdomains included) and path.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }

    /// Whether `location` is a video page the automation should run on.
    ///
    /// Unparseable locations and non-http(s) schemes never match.
    pub fn is_video_page(&self, location: &str) -> bool {
        let Ok(url) = Url::parse(location) else {
            return false;
        };

        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        let host_matches = url.host_str().is_some_and(|host| {
            host == self.host
                || host
                    .strip_suffix(&self.host)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });

        host_matches && url.path() == self.path
    }
}
