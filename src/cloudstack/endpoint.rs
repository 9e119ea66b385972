//! Parsing of the connection URL into its scheme, host, port and path.
//!
//! Accepted URLs look like `http://cloud.example.com:8080/client/api`. The
//! host is matched greedily, so the port is the last `:<digits>` that is
//! immediately followed by a path of at least two characters.

use std::fmt;

use super::CloudstackError;

/// URL scheme accepted for the management API.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Returns the scheme as it appears in a URL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Management API endpoint extracted from a connection URL.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    /// URL scheme.
    pub scheme: Scheme,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Path of the API entry point, starting with `/`.
    pub path: String,
}

impl Endpoint {
    /// Parses a connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Configuration`] when the URL does not have
    /// the `scheme://host:port/path` shape.
    pub fn parse(url: &str) -> Result<Self, CloudstackError> {
        let malformed = || {
            CloudstackError::Configuration(format!(
                "url '{url}' must look like http(s)://host:port/path"
            ))
        };

        let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else {
            return Err(malformed());
        };

        let token = rest.split(char::is_whitespace).next().unwrap_or_default();
        let (host, digits, path) = split_authority(token).ok_or_else(malformed)?;
        let port = digits.parse::<u16>().map_err(|_| malformed())?;

        Ok(Self {
            scheme,
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }

    /// Base URL used for API requests.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.path
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Splits `host:port/path`, preferring the right-most port separator.
fn split_authority(token: &str) -> Option<(&str, &str, &str)> {
    token
        .match_indices(':')
        .rev()
        .find_map(|(colon, _)| {
            let (host, tail) = token.split_at(colon);
            let after = tail.get(1..)?;
            let digits = after
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(after.len());
            let (port, path) = after.split_at(digits);
            let valid = !host.is_empty()
                && !port.is_empty()
                && path.starts_with('/')
                && path.len() > 1;
            valid.then_some((host, port, path))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://cloud.example.com:8080/client/api", Scheme::Http, "cloud.example.com", 8080, "/client/api")]
    #[case("https://10.0.0.5:443/client/api", Scheme::Https, "10.0.0.5", 443, "/client/api")]
    #[case("http://user:pw@host:8080/x", Scheme::Http, "user:pw@host", 8080, "/x")]
    #[case("http://host:80/a:90/b", Scheme::Http, "host:80/a", 90, "/b")]
    #[case("http://host:8080/client trailing words", Scheme::Http, "host", 8080, "/client")]
    fn parses_well_formed_urls(
        #[case] url: &str,
        #[case] scheme: Scheme,
        #[case] host: &str,
        #[case] port: u16,
        #[case] path: &str,
    ) {
        let endpoint = Endpoint::parse(url).unwrap_or_else(|err| panic!("{url}: {err}"));
        assert_eq!(endpoint.scheme, scheme);
        assert_eq!(endpoint.host, host);
        assert_eq!(endpoint.port, port);
        assert_eq!(endpoint.path, path);
    }

    #[rstest]
    #[case("")]
    #[case("cloud.example.com:8080/client/api")]
    #[case("ftp://host:21/files")]
    #[case("http://host/client/api")]
    #[case("http://host:8080")]
    #[case("http://host:8080/")]
    #[case("http://:8080/client")]
    #[case("http://host:99999/client")]
    #[case("http://host:port/client")]
    #[case("HTTP://host:8080/client")]
    fn rejects_malformed_urls(#[case] url: &str) {
        let err = Endpoint::parse(url).expect_err("url should be rejected");
        assert!(
            matches!(err, CloudstackError::Configuration(_)),
            "unexpected error for {url}: {err:?}"
        );
    }

    #[test]
    fn base_url_round_trips_the_parts() {
        let endpoint =
            Endpoint::parse("https://cloud.example.com:8443/client/api").expect("valid url");
        assert_eq!(endpoint.base_url(), "https://cloud.example.com:8443/client/api");
    }
}
