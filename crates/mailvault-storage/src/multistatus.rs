//! Multistatus listing parser.
//!
//! A listing request returns a multistatus document: one `<response>` per
//! resource, each carrying `<propstat>` blocks that pair a property set with
//! an HTTP status. This module decodes that document into [`FileInfo`]
//! records, excluding the self entry so a listing returns only children.

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::error::Result;
use crate::path::RemotePath;

/// Metadata for one remote file or directory, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Decoded absolute path in the remote document space.
    pub path: String,
    /// Display name, falling back to the final path segment.
    pub name: String,
    /// Whether the entry is a collection.
    pub is_dir: bool,
    /// Size in bytes; zero for collections.
    pub size: u64,
    /// MIME type, when the server reports one.
    pub content_type: Option<String>,
    /// Last modification time; Unix epoch when unparseable.
    pub modified: DateTime<Utc>,
}

/// Top-level `<multistatus>` node.
#[derive(Debug, Deserialize)]
struct Multistatus {
    #[serde(rename = "response", default)]
    responses: Vec<Response>,
}

/// One `<response>` node: a resource and its property blocks.
#[derive(Debug, Deserialize)]
struct Response {
    href: String,
    #[serde(rename = "propstat", default)]
    propstats: Vec<PropStat>,
}

/// A property set plus the status it was returned with.
#[derive(Debug, Deserialize)]
struct PropStat {
    prop: Prop,
    status: String,
}

/// The properties this client requests in its listing body.
#[derive(Debug, Deserialize)]
struct Prop {
    #[serde(rename = "displayname")]
    display_name: Option<String>,
    #[serde(rename = "getcontentlength")]
    content_length: Option<u64>,
    #[serde(rename = "getcontenttype")]
    content_type: Option<String>,
    #[serde(rename = "getlastmodified")]
    last_modified: Option<String>,
    #[serde(rename = "resourcetype")]
    resource_type: Option<ResourceType>,
}

/// `<resourcetype>` node; the `<collection/>` marker distinguishes a
/// directory from a file.
#[derive(Debug, Deserialize)]
struct ResourceType {
    collection: Option<EmptyElement>,
}

/// Placeholder for empty marker elements such as `<collection/>`.
#[derive(Debug, Deserialize)]
struct EmptyElement {}

/// Timestamp formats observed from servers, tried in order, after the RFC
/// 2822 and RFC 3339 parsers: RFC 850 and asctime.
const LEGACY_TIME_FORMATS: &[&str] = &[
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

/// Decodes a multistatus body into child entries of `requested`.
///
/// The entry whose href resolves to the requested collection itself is
/// excluded. Entries without any 2xx propstat are skipped. A timestamp that
/// matches none of the known formats degrades to the Unix epoch rather than
/// failing the listing.
///
/// # Errors
///
/// Returns [`crate::Error::Xml`] when the document as a whole cannot be
/// decoded.
pub fn parse(body: &str, requested: &RemotePath) -> Result<Vec<FileInfo>> {
    let document: Multistatus = quick_xml::de::from_str(body)?;
    let self_path = requested.as_str().trim_end_matches('/');

    let mut entries = Vec::new();
    for response in document.responses {
        let path = decode_href(&response.href);
        if path.trim_end_matches('/') == self_path {
            continue;
        }

        let Some(propstat) = first_ok_propstat(response.propstats) else {
            continue;
        };
        let prop = propstat.prop;

        let is_dir = prop
            .resource_type
            .as_ref()
            .is_some_and(|rt| rt.collection.is_some());
        let name = prop
            .display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| name_from_path(&path));

        entries.push(FileInfo {
            name,
            is_dir,
            size: prop.content_length.unwrap_or(0),
            content_type: prop.content_type,
            modified: prop
                .last_modified
                .as_deref()
                .map_or_else(epoch, parse_timestamp),
            path,
        });
    }
    Ok(entries)
}

/// Picks the first propstat whose status line carries a 2xx code.
fn first_ok_propstat(propstats: Vec<PropStat>) -> Option<PropStat> {
    propstats.into_iter().find(|ps| {
        ps.status
            .split_whitespace()
            .find_map(|token| token.parse::<u16>().ok())
            .is_some_and(|code| (200..300).contains(&code))
    })
}

/// Percent-decodes an href and strips any scheme-and-host prefix, leaving
/// the absolute remote path.
fn decode_href(href: &str) -> String {
    let path = if let Some(rest) = href.split_once("://").map(|(_, r)| r) {
        rest.find('/').map_or("/", |i| &rest[i..])
    } else {
        href
    };
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Extracts a display name from the final path segment.
fn name_from_path(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("/")
        .to_string()
}

/// Parses a modification timestamp against the ordered format list, falling
/// back to the Unix epoch.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    for format in LEGACY_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw.trim(), format) {
            return parsed.and_utc();
        }
    }
    epoch()
}

/// The zero timestamp used when a server's date is unparseable.
fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}
