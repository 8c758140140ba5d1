//! The `filesource:` identity scheme.
//!
//! `filesource:<path>?sourcetype=<backend-id>[&sessionId=<id>]`. The path
//! is backend-native, `sourcetype` selects a factory, and a resolvable
//! `sessionId` addresses an already-connected factory instance.

use crate::error::{FsError, FsResult};

pub const FILE_SOURCE_SCHEME: &str = "filesource";
pub const QUERY_SOURCE_TYPE: &str = "sourcetype";
pub const QUERY_SESSION_ID: &str = "sessionId";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUri {
    scheme: String,
    path: String,
    query: Vec<(String, String)>,
}

impl SourceUri {
    pub fn parse(url: &str) -> FsResult<Self> {
        let url = url.trim();
        let (scheme, rest) = url
            .split_once(':')
            .ok_or_else(|| FsError::InvalidArgument(format!("no scheme in url: {url:?}")))?;
        if scheme.is_empty() {
            return Err(FsError::InvalidArgument(format!("empty scheme: {url:?}")));
        }

        // Authority-form `scheme://host/...` is not used by in-process
        // backends; strip an empty authority when present.
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        let (path, query_text) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut query = Vec::new();
        if let Some(text) = query_text {
            for pair in text.split(['&', ',']) {
                if let Some((name, value)) = pair.split_once('=') {
                    query.push((name.to_string(), value.to_string()));
                }
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            path: path.to_string(),
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The factory selector: the `sourcetype` query value, or the scheme
    /// itself when it is not the generic `filesource` scheme.
    pub fn source_type(&self) -> Option<&str> {
        self.query(QUERY_SOURCE_TYPE).or({
            if self.scheme != FILE_SOURCE_SCHEME {
                Some(self.scheme.as_str())
            } else {
                None
            }
        })
    }

    pub fn session_id(&self) -> Option<i64> {
        self.query(QUERY_SESSION_ID)?.parse().ok()
    }
}

impl std::fmt::Display for SourceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)?;
        for (idx, (name, value)) in self.query.iter().enumerate() {
            f.write_str(if idx == 0 { "?" } else { "&" })?;
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_form() {
        let uri = SourceUri::parse("filesource:/tmp/TestDir?sourcetype=fileproxy").unwrap();
        assert_eq!(uri.scheme(), "filesource");
        assert_eq!(uri.path(), "/tmp/TestDir");
        assert_eq!(uri.source_type(), Some("fileproxy"));
        assert_eq!(uri.session_id(), None);
    }

    #[test]
    fn parses_session_id() {
        let uri =
            SourceUri::parse("filesource:/a/b?sourcetype=memory&sessionId=7").unwrap();
        assert_eq!(uri.source_type(), Some("memory"));
        assert_eq!(uri.session_id(), Some(7));
    }

    #[test]
    fn accepts_comma_separated_query_pairs() {
        let uri = SourceUri::parse("filesource:/a?sourcetype=memory,sessionId=3").unwrap();
        assert_eq!(uri.source_type(), Some("memory"));
        assert_eq!(uri.session_id(), Some(3));
    }

    #[test]
    fn scheme_doubles_as_source_type() {
        let uri = SourceUri::parse("memory:/a/b").unwrap();
        assert_eq!(uri.source_type(), Some("memory"));
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(SourceUri::parse("/just/a/path").is_err());
    }

    #[test]
    fn display_round_trip() {
        let text = "filesource:/a/b?sourcetype=memory&sessionId=9";
        let uri = SourceUri::parse(text).unwrap();
        assert_eq!(uri.to_string(), text);
    }
}
