//! HTTP fetcher for wiki pages and issue-tracker tickets
//!
//! References are either prefixed ids (`wiki:12345`, `ticket:PROJ-42`) or
//! browser URLs of the form `.../pages/12345/...` and `.../browse/PROJ-42`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::adapters::credentials::{keys, CredentialStore};
use crate::agents::domain::{DocumentFetcher, ExternalFragment};
use crate::agents::error::FetchError;
use crate::config::DocumentsConfig;

/// A parsed document reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentReference {
    WikiPage(String),
    Ticket(String),
}

impl DocumentReference {
    pub fn parse(reference: &str) -> Result<Self, FetchError> {
        let reference = reference.trim();
        if let Some(id) = reference.strip_prefix("wiki:") {
            return Self::non_empty(id, reference).map(Self::WikiPage);
        }
        if let Some(key) = reference.strip_prefix("ticket:") {
            return Self::non_empty(key, reference).map(Self::Ticket);
        }
        if let Some(id) = path_segment_after(reference, "pages") {
            return Ok(Self::WikiPage(id));
        }
        if let Some(key) = path_segment_after(reference, "browse") {
            return Ok(Self::Ticket(key));
        }
        Err(FetchError::Unsupported(reference.to_string()))
    }

    fn non_empty(id: &str, reference: &str) -> Result<String, FetchError> {
        let id = id.trim();
        if id.is_empty() {
            Err(FetchError::Unsupported(reference.to_string()))
        } else {
            Ok(id.to_string())
        }
    }
}

fn path_segment_after(url: &str, marker: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let mut segments = path.split('/');
    segments.find(|s| *s == marker)?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Drop markup tags, keeping text content
fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    title: String,
    body: WikiBody,
}

#[derive(Debug, Deserialize)]
struct WikiBody {
    storage: WikiStorage,
}

#[derive(Debug, Deserialize)]
struct WikiStorage {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    key: String,
    fields: TicketFields,
}

#[derive(Debug, Deserialize)]
struct TicketFields {
    summary: String,
    #[serde(default)]
    description: Option<String>,
}

fn wiki_fragment(reference: &str, body: &str) -> Result<ExternalFragment, FetchError> {
    let page: WikiPage = serde_json::from_str(body)
        .map_err(|e| FetchError::Transport(format!("unexpected wiki response: {}", e)))?;
    Ok(ExternalFragment::new(reference, strip_markup(&page.body.storage.value)).with_title(page.title))
}

fn ticket_fragment(reference: &str, body: &str) -> Result<ExternalFragment, FetchError> {
    let ticket: Ticket = serde_json::from_str(body)
        .map_err(|e| FetchError::Transport(format!("unexpected tracker response: {}", e)))?;
    let content = match ticket.fields.description {
        Some(description) => format!("{}\n\n{}", ticket.fields.summary, description),
        None => ticket.fields.summary,
    };
    Ok(ExternalFragment::new(reference, content).with_title(ticket.key))
}

/// Fetches wiki pages and tickets over their REST APIs
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
    wiki_base_url: Option<String>,
    tracker_base_url: Option<String>,
    api_key: Option<SecretString>,
}

impl HttpDocumentFetcher {
    pub fn new(config: &DocumentsConfig, api_key: Option<SecretString>) -> Self {
        let trim = |url: &Option<String>| url.as_ref().map(|u| u.trim_end_matches('/').to_string());
        Self {
            client: reqwest::Client::new(),
            wiki_base_url: trim(&config.wiki_base_url),
            tracker_base_url: trim(&config.tracker_base_url),
            api_key,
        }
    }

    pub async fn from_config(config: &DocumentsConfig, credentials: &CredentialStore) -> Self {
        let key_name = config.api_key_env.as_deref().unwrap_or(keys::DOCUMENTS_API_KEY);
        let api_key = credentials.get_or_env(key_name).await;
        Self::new(config, api_key)
    }

    /// REST URL for a parsed reference
    pub fn url_for(&self, reference: &DocumentReference) -> Result<String, FetchError> {
        match reference {
            DocumentReference::WikiPage(id) => {
                let base = self.wiki_base_url.as_ref().ok_or_else(|| {
                    FetchError::Unsupported(format!("wiki:{} (no wiki_base_url configured)", id))
                })?;
                Ok(format!(
                    "{}/rest/api/content/{}?expand=body.storage",
                    base,
                    urlencoding::encode(id)
                ))
            }
            DocumentReference::Ticket(key) => {
                let base = self.tracker_base_url.as_ref().ok_or_else(|| {
                    FetchError::Unsupported(format!("ticket:{} (no tracker_base_url configured)", key))
                })?;
                Ok(format!(
                    "{}/rest/api/2/issue/{}?fields=summary,description",
                    base,
                    urlencoding::encode(key)
                ))
            }
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, reference: &str) -> Result<ExternalFragment, FetchError> {
        let parsed = DocumentReference::parse(reference)?;
        let url = self.url_for(&parsed)?;

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().await?;

        match response.status().as_u16() {
            200..=299 => {}
            404 => return Err(FetchError::NotFound(reference.to_string())),
            401 | 403 => return Err(FetchError::Unauthorized(reference.to_string())),
            status => {
                return Err(FetchError::Transport(format!(
                    "{} returned status {}",
                    reference, status
                )))
            }
        }

        let body = response.text().await?;
        match parsed {
            DocumentReference::WikiPage(_) => wiki_fragment(reference, &body),
            DocumentReference::Ticket(_) => ticket_fragment(reference, &body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpDocumentFetcher {
        HttpDocumentFetcher::new(
            &DocumentsConfig {
                wiki_base_url: Some("https://wiki.example.com/".into()),
                tracker_base_url: None,
                api_key_env: None,
            },
            None,
        )
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(
            DocumentReference::parse("wiki:12345").unwrap(),
            DocumentReference::WikiPage("12345".into())
        );
        assert_eq!(
            DocumentReference::parse("https://acme.atlassian.net/wiki/spaces/PM/pages/98765/Roadmap").unwrap(),
            DocumentReference::WikiPage("98765".into())
        );
        assert_eq!(
            DocumentReference::parse("https://acme.atlassian.net/browse/PROJ-42?focus=1").unwrap(),
            DocumentReference::Ticket("PROJ-42".into())
        );
        assert!(matches!(
            DocumentReference::parse("ticket: "),
            Err(FetchError::Unsupported(_))
        ));
        assert!(matches!(
            DocumentReference::parse("see the doc"),
            Err(FetchError::Unsupported(_))
        ));
    }

    #[test]
    fn test_url_for() {
        let url = fetcher()
            .url_for(&DocumentReference::WikiPage("a b".into()))
            .unwrap();
        assert_eq!(url, "https://wiki.example.com/rest/api/content/a%20b?expand=body.storage");
        assert!(fetcher()
            .url_for(&DocumentReference::Ticket("PROJ-1".into()))
            .is_err());
    }

    #[test]
    fn test_wiki_fragment_strips_markup() {
        let body = r#"{"title": "Roadmap", "body": {"storage": {"value": "<h1>Q3</h1><p>Ship <b>search</b></p>"}}}"#;
        let fragment = wiki_fragment("wiki:1", body).unwrap();
        assert_eq!(fragment.title.as_deref(), Some("Roadmap"));
        assert_eq!(fragment.content, "Q3 Ship search");
    }

    #[test]
    fn test_ticket_fragment() {
        let body = r#"{"key": "PROJ-42", "fields": {"summary": "Export fails", "description": "CSV export times out"}}"#;
        let fragment = ticket_fragment("ticket:PROJ-42", body).unwrap();
        assert_eq!(fragment.title.as_deref(), Some("PROJ-42"));
        assert_eq!(fragment.content, "Export fails\n\nCSV export times out");
    }

    #[tokio::test]
    async fn test_unsupported_reference_never_hits_network() {
        let err = fetcher().fetch("ticket:PROJ-9").await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }
}
