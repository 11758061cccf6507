// # Configuration File
//
// Line-oriented `key=value` file holding the API token, the domains file
// location and the bookkeeping of the last update.
//
// ## Format
//
// ```text
// # Cloudflare credentials
// cloudflare_token = abc123   # zone:read + dns:edit
// domains_file = /etc/cf-dynamic/domains.json
// last_update=1735689600
// ```
//
// - Blank lines and `#` lines are kept verbatim on rewrite
// - Everything after the first `#` on an entry line is an inline comment
// - Exactly one `=` per entry; keys must be non-empty
//
// Rewriting a single key (`set`) preserves every other line, so hand-edited
// files survive `cf-dynamic login` and `cf-dynamic update`.

use std::path::Path;
use tokio::fs;

use crate::atomic::write_atomic;
use crate::error::{Error, Result};

/// Config key holding the Cloudflare API token
pub const KEY_CLOUDFLARE_TOKEN: &str = "cloudflare_token";
/// Config key holding the path of the domains file
pub const KEY_DOMAINS_FILE: &str = "domains_file";
/// Config key holding the IPv4 address seen by the last successful update
pub const KEY_LAST_IPV4: &str = "last_ipv4";
/// Config key holding the IPv6 address seen by the last successful update
pub const KEY_LAST_IPV6: &str = "last_ipv6";
/// Config key holding the unix timestamp of the last successful update
pub const KEY_LAST_UPDATE: &str = "last_update";

/// Permission bits for a written config file (it may contain the API token)
const CONF_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// Blank line or full-line comment, reproduced as-is
    Verbatim(String),
    Entry {
        key: String,
        value: String,
        /// Inline comment including its leading `#`
        comment: Option<String>,
    },
}

/// Parsed configuration file that can be edited without losing comments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfFile {
    lines: Vec<Line>,
}

impl ConfFile {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration text
    ///
    /// Fails with the 1-based line number when a line is neither a comment
    /// nor a single `key=value` pair.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                lines.push(Line::Verbatim(raw.to_string()));
                continue;
            }

            let (body, comment) = match trimmed.find('#') {
                Some(i) => (&trimmed[..i], Some(trimmed[i..].to_string())),
                None => (trimmed, None),
            };

            let invalid = || {
                Error::config(format!(
                    "Config file is not valid (Line {}: {})",
                    idx + 1,
                    raw
                ))
            };

            let mut parts = body.split('=');
            let key = parts.next().map(str::trim).ok_or_else(invalid)?;
            let value = parts.next().map(str::trim).ok_or_else(invalid)?;
            if parts.next().is_some() || key.is_empty() {
                return Err(invalid());
            }

            lines.push(Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
                comment,
            });
        }

        Ok(Self { lines })
    }

    /// Look up a value; the last occurrence of a key wins
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set a value, replacing every existing entry for `key` or appending one
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let mut found = false;

        for line in &mut self.lines {
            if let Line::Entry { key: k, value: v, .. } = line {
                if k == key {
                    *v = value.clone();
                    found = true;
                }
            }
        }

        if !found {
            self.lines.push(Line::Entry {
                key: key.to_string(),
                value,
                comment: None,
            });
        }
    }

    /// Iterate over all `(key, value)` entries in file order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, value, .. } => Some((key.as_str(), value.as_str())),
            Line::Verbatim(_) => None,
        })
    }

    /// Render back to text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Verbatim(raw) => out.push_str(raw),
                Line::Entry {
                    key,
                    value,
                    comment,
                } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                    if let Some(comment) = comment {
                        out.push(' ');
                        out.push_str(comment);
                    }
                }
            }
            out.push('\n');
        }
        out
    }

    /// Load a configuration file; a missing file yields an empty config
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file does not exist: {}", path.display());
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Unable to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&content)
            .map_err(|e| Error::config(format!("{} ({})", e, path.display())))
    }

    /// Atomically write the configuration to `path`
    pub async fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes(), Some(CONF_FILE_MODE))
            .await
            .map_err(|e| {
                Error::config(format!(
                    "Unable to write config file {}: {}",
                    path.display(),
                    e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
# cf-dynamic configuration

cloudflare_token = abc123   # scoped token
domains_file=/etc/cf-dynamic/domains.json
";

    #[test]
    fn test_parse_entries_and_comments() {
        let conf = ConfFile::parse(SAMPLE).unwrap();

        assert_eq!(conf.get(KEY_CLOUDFLARE_TOKEN), Some("abc123"));
        assert_eq!(
            conf.get(KEY_DOMAINS_FILE),
            Some("/etc/cf-dynamic/domains.json")
        );
        assert_eq!(conf.get("missing"), None);
        assert_eq!(conf.entries().count(), 2);
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        let err = ConfFile::parse("a=1\njust a line\n").unwrap_err();
        assert!(err.to_string().contains("Line 2"), "{err}");
    }

    #[test]
    fn test_parse_rejects_double_equals() {
        let err = ConfFile::parse("a=b=c\n").unwrap_err();
        assert!(err.to_string().contains("Line 1"), "{err}");
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        assert!(ConfFile::parse(" = value\n").is_err());
    }

    #[test]
    fn test_empty_value_allowed() {
        let conf = ConfFile::parse("cloudflare_token=\n").unwrap();
        assert_eq!(conf.get(KEY_CLOUDFLARE_TOKEN), Some(""));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let conf = ConfFile::parse("k=1\nk=2\n").unwrap();
        assert_eq!(conf.get("k"), Some("2"));
    }

    #[test]
    fn test_set_preserves_comments_and_inline_comment() {
        let mut conf = ConfFile::parse(SAMPLE).unwrap();
        conf.set(KEY_CLOUDFLARE_TOKEN, "xyz");

        let rendered = conf.render();
        assert_eq!(
            rendered,
            "\
# cf-dynamic configuration

cloudflare_token=xyz # scoped token
domains_file=/etc/cf-dynamic/domains.json
"
        );
    }

    #[test]
    fn test_set_appends_unknown_key() {
        let mut conf = ConfFile::parse("# header\n").unwrap();
        conf.set(KEY_LAST_UPDATE, "1700000000");

        assert_eq!(conf.render(), "# header\nlast_update=1700000000\n");
        assert_eq!(conf.get(KEY_LAST_UPDATE), Some("1700000000"));
    }

    #[test]
    fn test_render_reparses_identically() {
        let conf = ConfFile::parse(SAMPLE).unwrap();
        let reparsed = ConfFile::parse(&conf.render()).unwrap();
        assert_eq!(conf, reparsed);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let conf = ConfFile::load(&dir.path().join("none.conf")).await.unwrap();
        assert_eq!(conf.entries().count(), 0);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etc/cf-dynamic.conf");

        let mut conf = ConfFile::new();
        conf.set(KEY_CLOUDFLARE_TOKEN, "secret");
        conf.save(&path).await.unwrap();

        let loaded = ConfFile::load(&path).await.unwrap();
        assert_eq!(loaded.get(KEY_CLOUDFLARE_TOKEN), Some("secret"));
    }
}
