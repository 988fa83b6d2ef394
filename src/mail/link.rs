use percent_encoding::percent_decode_str;
use regex::Regex;
use std::fmt;
use url::Url;

/// Path segment that precedes the opaque token in a reset link.
const RESET_PATH: &str = "set-password/";

/// A single-use reset link, percent-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetLink(String);

impl ResetLink {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<base_url>set-password/<token>/`
#[derive(Debug, Clone)]
pub struct LinkPattern {
    regex: Regex,
}

impl LinkPattern {
    pub fn for_app(base_url: &Url) -> Result<Self, regex::Error> {
        let mut base = base_url.as_str().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let pattern = format!(r"{}{}[\w%\-]+/", regex::escape(&base), RESET_PATH);
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// First link in `body`, percent-decoded.
    ///
    /// Falls back to matching the decoded body when the whole link was
    /// embedded encoded (e.g. inside a redirect parameter).
    pub fn extract(&self, body: &str) -> Option<ResetLink> {
        if let Some(m) = self.regex.find(body) {
            let decoded = percent_decode_str(m.as_str()).decode_utf8_lossy();
            return Some(ResetLink(decoded.into_owned()));
        }

        if !body.contains('%') {
            return None;
        }
        let decoded_body = percent_decode_str(body).decode_utf8_lossy();
        self.regex
            .find(&decoded_body)
            .map(|m| ResetLink(m.as_str().to_string()))
    }
}
