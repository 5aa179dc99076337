//! Liked papers and their metadata, read from Confer.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::CoreError;
use crate::session::Session;

/// Confer's identifier for a paper.
///
/// Likes arrive as JSON numbers or strings while the metadata map is keyed
/// by strings, so both forms normalize to the same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaperId(String);

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for PaperId {
    fn from(id: u64) -> Self {
        PaperId(id.to_string())
    }
}

impl From<&str> for PaperId {
    fn from(id: &str) -> Self {
        PaperId(id.trim().to_string())
    }
}

impl<'de> Deserialize<'de> for PaperId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PaperIdVisitor;

        impl Visitor<'_> for PaperIdVisitor {
            type Value = PaperId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a paper id as a non-negative integer or a string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PaperId, E> {
                Ok(PaperId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PaperId, E> {
                u64::try_from(v)
                    .map(PaperId::from)
                    .map_err(|_| E::custom(format!("negative paper id {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PaperId, E> {
                Ok(PaperId::from(v))
            }
        }

        deserializer.deserialize_any(PaperIdVisitor)
    }
}

/// Metadata Confer publishes for one paper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl PaperRecord {
    /// Title exactly as Confer reports it, if present and not blank.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Entries without an abstract are sessions, keynotes and the like,
    /// not papers.
    pub fn has_abstract(&self) -> bool {
        self.abstract_text
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty())
    }
}

/// Paper metadata keyed by Confer id.
pub type PaperIndex = HashMap<PaperId, PaperRecord>;

#[derive(Deserialize)]
struct LikesPayload {
    #[serde(default)]
    likes: Vec<PaperId>,
}

/// Parse Confer's `/data` response into the user's liked paper ids.
pub fn parse_likes(body: &str) -> Result<Vec<PaperId>, CoreError> {
    let payload: LikesPayload = serde_json::from_str(body)?;
    Ok(payload.likes)
}

/// Parse a conference `papers.json`.
///
/// The file is a JavaScript assignment (`entities={...}`), not bare JSON.
pub fn parse_papers(body: &str) -> Result<PaperIndex, CoreError> {
    let json = body.trim();
    let json = json.strip_prefix("entities=").unwrap_or(json);
    let json = json.trim().trim_end_matches(';');
    Ok(serde_json::from_str(json)?)
}

/// Fetch the ids of the papers the session's user liked.
pub async fn fetch_likes(session: &Session) -> Result<Vec<PaperId>, CoreError> {
    let body = session
        .client()
        .get(session.url("/data"))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let likes = parse_likes(&body)?;
    tracing::info!(likes = likes.len(), "read liked papers");
    Ok(likes)
}

/// Fetch the metadata of every paper in the session's conference.
pub async fn fetch_papers(session: &Session) -> Result<PaperIndex, CoreError> {
    let url = session.url(&format!(
        "/static/conf/{}/data/papers.json",
        session.conference()
    ));
    let body = session
        .client()
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let papers = parse_papers(&body)?;
    tracing::info!(papers = papers.len(), "read conference papers");
    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn likes_accept_numbers_and_strings() {
        let likes = parse_likes(r#"{"likes": [12, "pn34", " 56 "], "user": "x"}"#).unwrap();
        assert_eq!(
            likes,
            vec![PaperId::from(12), PaperId::from("pn34"), PaperId::from(56)]
        );
    }

    #[test]
    fn missing_likes_is_empty() {
        assert!(parse_likes("{}").unwrap().is_empty());
    }

    #[test]
    fn negative_like_rejected() {
        assert!(parse_likes(r#"{"likes": [-1]}"#).is_err());
    }

    #[test]
    fn papers_prefix_is_stripped() {
        let body = r#"entities={
            "12": {"title": "Deep Learning for X", "abstract": "We learn.", "type": "paper"},
            "13": {"title": "Opening Keynote", "abstract": ""},
            "14": {"title": "Poster Session", "abstract": null}
        };"#;
        let papers = parse_papers(body).unwrap();
        assert_eq!(papers.len(), 3);

        let paper = &papers[&PaperId::from(12)];
        assert_eq!(paper.title(), Some("Deep Learning for X"));
        assert!(paper.has_abstract());
        assert_eq!(paper.kind.as_deref(), Some("paper"));

        assert!(!papers[&PaperId::from(13)].has_abstract());
        assert!(!papers[&PaperId::from(14)].has_abstract());
    }

    #[test]
    fn bare_json_papers_accepted() {
        let papers = parse_papers(r#"{"1": {"title": "T", "abstract": "A"}}"#).unwrap();
        assert!(papers.contains_key(&PaperId::from("1")));
    }

    #[test]
    fn blank_title_is_none() {
        let record = PaperRecord {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(record.title(), None);
    }

    #[test]
    fn title_keeps_surrounding_whitespace() {
        let record = PaperRecord {
            title: Some(" Deep Learning for X ".to_string()),
            ..Default::default()
        };
        assert_eq!(record.title(), Some(" Deep Learning for X "));
    }
}
