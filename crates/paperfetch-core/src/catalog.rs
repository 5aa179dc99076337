//! Proceedings catalog: every published paper's title and number, scraped
//! from the proceedings index page.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::CoreError;
use crate::session::Session;

/// A published paper in the proceedings listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Plain-text title, HTML already stripped.
    pub title: String,
    /// Paper number used to build the PDF URL.
    pub external_id: u32,
}

/// `<p>Title / 123<br />`: a title followed by its page number.
static TITLE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<p>(.*) / [0-9]*<br />$").unwrap());

/// `<a href="/Proceedings/16/Papers/042.pdf">`: the PDF link for the preceding title.
static PAPER_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^<a href="[^"]*/Papers/([0-9]+)\.pdf">"#).unwrap());

/// Strip markup and decode entities from an HTML fragment.
pub fn strip_html(fragment: &str) -> String {
    let html = scraper::Html::parse_fragment(fragment);
    html.root_element().text().collect::<String>().trim().to_string()
}

/// Parse the proceedings index into catalog entries, in page order.
///
/// The index lists each paper as a title line followed, some lines later,
/// by the link to its PDF. Lines between the two are ignored, as is any
/// second title line seen before the link.
pub fn parse_catalog(html: &str) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    let mut pending_title: Option<String> = None;

    for line in html.lines() {
        let line = line.trim_end();
        match pending_title.take() {
            None => {
                if let Some(caps) = TITLE_LINE_RE.captures(line) {
                    pending_title = Some(strip_html(&caps[1]));
                }
            }
            Some(title) => {
                let id = PAPER_LINK_RE
                    .captures(line)
                    .and_then(|caps| caps[1].parse::<u32>().ok());
                match id {
                    Some(external_id) => entries.push(CatalogEntry { title, external_id }),
                    None => pending_title = Some(title),
                }
            }
        }
    }

    entries
}

/// Download and parse the proceedings index at `url`.
pub async fn load_catalog(session: &Session, url: &str) -> Result<Vec<CatalogEntry>, CoreError> {
    let body = session
        .client()
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    // Parse in spawn_blocking; scraper's document types are !Send
    let entries = tokio::task::spawn_blocking(move || parse_catalog(&body))
        .await
        .map_err(|e| CoreError::Parse(e.to_string()))?;

    tracing::info!(url, papers = entries.len(), "loaded proceedings catalog");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html><body>
<h3>Agent-based and Multi-agent Systems</h3>
<p>Learning to Coordinate with <i>Partial</i> Observability / 3<br />
Alice Smith, Bob Jones<br />
<a href="/Proceedings/16/Papers/001.pdf">PDF</a>
<p>Q&amp;A: Answering Questions over Tables / 11<br />
Carol White<br />
<a href="/Proceedings/16/Papers/002.pdf">PDF</a>
<p>Not a paper line</p>
<p>Bounded Search / 19<br />
<a href="/Proceedings/16/Papers/117.pdf">PDF</a>
</body></html>
"#;

    #[test]
    fn parses_titles_and_ids_in_order() {
        let entries = parse_catalog(INDEX);
        assert_eq!(
            entries,
            vec![
                CatalogEntry {
                    title: "Learning to Coordinate with Partial Observability".to_string(),
                    external_id: 1,
                },
                CatalogEntry {
                    title: "Q&A: Answering Questions over Tables".to_string(),
                    external_id: 2,
                },
                CatalogEntry {
                    title: "Bounded Search".to_string(),
                    external_id: 117,
                },
            ]
        );
    }

    #[test]
    fn title_without_link_is_dropped() {
        let html = "<p>Orphan Title / 5<br />\n<p>Other / 9<br />\n";
        assert!(parse_catalog(html).is_empty());
    }

    #[test]
    fn second_title_before_link_is_ignored() {
        let html = "<p>First / 1<br />\n<p>Second / 2<br />\n<a href=\"/P/Papers/010.pdf\">PDF</a>\n";
        let entries = parse_catalog(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "First");
        assert_eq!(entries[0].external_id, 10);
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let html = "<p>Windows Title / 7<br />\r\n<a href=\"/Proceedings/16/Papers/044.pdf\">PDF</a>\r\n";
        let entries = parse_catalog(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].external_id, 44);
    }

    #[test]
    fn strip_html_decodes_entities() {
        assert_eq!(strip_html("A &lt;B&gt; <b>C</b> &#39;D&#39;"), "A <B> C 'D'");
    }
}
