//! Endpoint resolution.
//!
//! Splits a connection URI into its components so that configured path and
//! query overrides can be merged in, then serializes it back to a canonical
//! string. Only `scheme://host[:port][/path][?query][#fragment]` is accepted.

use std::fmt;
use std::str::FromStr;

use url::{Url, form_urlencoded};

use crate::types::{Result, SocketError};

/// A parsed connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    /// Empty when the endpoint has no path beyond the root
    pub path: String,
    /// Percent-decoded query parameters in order of appearance
    pub query: Vec<(String, String)>,
    pub fragment: Option<String>,
}

impl Endpoint {
    /// Parses an endpoint URI.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::MalformedEndpoint`] if the string is not an
    /// absolute `scheme://host` URI or carries user credentials.
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = |why: &str| SocketError::MalformedEndpoint(format!("{input}: {why}"));

        if !input.contains("://") {
            return Err(malformed("missing scheme separator"));
        }

        let url = Url::parse(input).map_err(|e| malformed(&e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(malformed("not a hierarchical URI"));
        }
        let Some(host) = url.host_str().filter(|host| !host.is_empty()) else {
            return Err(malformed("missing host"));
        };
        if !url.username().is_empty() || url.password().is_some() {
            return Err(malformed("credentials are not supported"));
        }

        let path = match url.path() {
            "/" => String::new(),
            path => path.to_string(),
        };

        Ok(Self {
            protocol: url.scheme().to_string(),
            host: host.to_string(),
            port: url.port(),
            path,
            query: url.query_pairs().into_owned().collect(),
            fragment: url.fragment().map(ToString::to_string),
        })
    }

    /// Replaces the path. A missing leading slash is added.
    pub fn set_path(&mut self, path: &str) {
        self.path = match path {
            "" | "/" => String::new(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{p}"),
        };
    }

    /// Sets a query parameter, replacing the value of an existing key.
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
    }

    /// Merges query parameters; incoming values win over existing ones.
    pub fn merge_query<I, K, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.set_query(key, value);
        }
    }

    /// Serializes back into a URI string with percent-encoded query pairs.
    pub fn build(&self) -> String {
        let mut uri = format!("{}://{}", self.protocol, self.host);
        if let Some(port) = self.port {
            uri.push(':');
            uri.push_str(&port.to_string());
        }
        uri.push_str(&self.path);

        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            uri.push('?');
            uri.push_str(&query);
        }

        if let Some(fragment) = &self.fragment {
            uri.push('#');
            uri.push_str(fragment);
        }

        uri
    }

    #[cfg(test)]
    fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = SocketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}
