//! sitemaps.org 0.9 document parser.
//!
//! Only the part of the protocol we submit from is modelled:
//! - Root: any element (normally `<urlset>`)
//! - Entries: `<url>` children of the root, in the sitemap namespace
//! - Locations: `<loc>` children of each `<url>`, in the sitemap namespace
//!
//! Elements outside that path (`<lastmod>`, `<image:image>`, ...) are parsed
//! for well-formedness and otherwise ignored.

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use tracing::info;

use sitearchiver_shared::{PageUrl, Result, SiteArchiverError};

/// Namespace URI of the sitemaps.org 0.9 schema.
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fetched sitemap: the raw body plus its parsed `<url>` entries.
#[derive(Debug, Clone)]
pub struct SitemapDocument {
    raw: Vec<u8>,
    entries: Vec<UrlEntry>,
}

/// One `<url>` element of a sitemap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlEntry {
    /// Text of every `<loc>` child, in order. Empty `<loc/>` elements are
    /// kept as empty strings.
    pub locs: Vec<String>,
}

impl SitemapDocument {
    /// Parse a sitemap body.
    ///
    /// The whole document must be well-formed; on any XML error no entries
    /// are returned.
    pub fn parse(raw: impl Into<Vec<u8>>) -> Result<Self> {
        let raw = raw.into();
        let entries = parse_entries(&raw)?;
        Ok(Self { raw, entries })
    }

    /// The body exactly as fetched.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parsed `<url>` entries in document order.
    pub fn entries(&self) -> &[UrlEntry] {
        &self.entries
    }

    /// Text of every `url/loc` element in document order, skipping empty ones.
    ///
    /// Reads only the parsed structure, so repeated calls return the same list.
    pub fn extract_urls(&self) -> Vec<PageUrl> {
        info!(entries = self.entries.len(), "extracting urls from sitemap");

        self.entries
            .iter()
            .flat_map(|entry| entry.locs.iter())
            .map(|loc| loc.trim())
            .filter(|loc| !loc.is_empty())
            .map(PageUrl::from)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Position of an open element relative to the `url/loc` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Root,
    Url,
    Loc,
    Other,
}

/// Incremental state while walking the event stream.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    entries: Vec<UrlEntry>,
    loc_text: String,
    saw_root: bool,
}

impl TreeBuilder {
    /// Handle a start tag (or a self-closing tag when `empty` is set).
    fn open(&mut self, in_sitemap_ns: bool, local_name: &[u8], empty: bool) -> Result<()> {
        let frame = match self.stack.last().copied() {
            None => {
                if self.saw_root {
                    return Err(SiteArchiverError::parse("multiple root elements"));
                }
                self.saw_root = true;
                Frame::Root
            }
            Some(Frame::Root) if in_sitemap_ns && local_name == b"url" => {
                self.entries.push(UrlEntry::default());
                Frame::Url
            }
            Some(Frame::Url) if in_sitemap_ns && local_name == b"loc" => {
                if empty {
                    self.current_entry()?.locs.push(String::new());
                }
                self.loc_text.clear();
                Frame::Loc
            }
            Some(_) => Frame::Other,
        };

        if !empty {
            self.stack.push(frame);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Loc) => {
                let text = std::mem::take(&mut self.loc_text);
                self.current_entry()?.locs.push(text);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(SiteArchiverError::parse("closing tag without matching start")),
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        match self.stack.last() {
            Some(Frame::Loc) => {
                self.loc_text.push_str(text);
                Ok(())
            }
            Some(_) => Ok(()),
            None if text.trim().is_empty() => Ok(()),
            None => Err(SiteArchiverError::parse("text outside the root element")),
        }
    }

    fn finish(self) -> Result<Vec<UrlEntry>> {
        if !self.saw_root {
            return Err(SiteArchiverError::parse("document has no root element"));
        }
        if !self.stack.is_empty() {
            return Err(SiteArchiverError::parse(format!(
                "unexpected end of document ({} unclosed elements)",
                self.stack.len()
            )));
        }
        Ok(self.entries)
    }

    fn current_entry(&mut self) -> Result<&mut UrlEntry> {
        self.entries
            .last_mut()
            .ok_or_else(|| SiteArchiverError::parse("<loc> outside of <url>"))
    }
}

/// Walk the document and collect `<url>` entries.
fn parse_entries(raw: &[u8]) -> Result<Vec<UrlEntry>> {
    let mut reader = NsReader::from_reader(raw);
    reader.config_mut().trim_text(true);
    let sitemap_ns = ResolveResult::Bound(Namespace(SITEMAP_NAMESPACE.as_bytes()));

    let mut builder = TreeBuilder::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let (ns, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok(resolved) => resolved,
            Err(e) => {
                return Err(SiteArchiverError::parse(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        };

        if let ResolveResult::Unknown(prefix) = &ns {
            return Err(SiteArchiverError::parse(format!(
                "unbound namespace prefix '{}'",
                String::from_utf8_lossy(prefix)
            )));
        }

        match event {
            Event::Start(ref e) => {
                builder.open(ns == sitemap_ns, e.local_name().as_ref(), false)?;
            }
            Event::Empty(ref e) => {
                builder.open(ns == sitemap_ns, e.local_name().as_ref(), true)?;
            }
            Event::End(_) => builder.close()?,
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|e| SiteArchiverError::parse(format!("bad text content: {e}")))?;
                builder.text(&text)?;
            }
            Event::CData(ref e) => {
                let text = std::str::from_utf8(e)
                    .map_err(|e| SiteArchiverError::parse(format!("bad CDATA content: {e}")))?;
                builder.text(text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    builder.finish()
}
