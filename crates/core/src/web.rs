use crate::ingest::{LoadReport, SkippedSource};
use crate::models::{Document, IngestionOptions, SourceFormat};
use crate::IngestError;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: Option<String>,
    pub text: String,
}

fn inline_whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static pattern compiles"))
}

/// Reduces an HTML page to its visible text, one text node per line.
pub fn html_to_text(html: &str) -> PageContent {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|element| element.text().collect::<String>())
        })
        .map(|title| inline_whitespace().replace_all(title.trim(), " ").to_string())
        .filter(|title| !title.is_empty());

    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_TAGS.contains(&element.name()))
        });
        if hidden {
            continue;
        }

        let line = inline_whitespace().replace_all(text.trim(), " ");
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }

    PageContent {
        title,
        text: lines.join("\n"),
    }
}

/// Valid URLs in input order plus the values that could not be parsed.
#[derive(Debug, Clone, Default)]
pub struct UrlList {
    pub urls: Vec<Url>,
    pub invalid: Vec<SkippedSource>,
}

/// Parses a comma separated URL list, ignoring whitespace and duplicates.
pub fn parse_url_list(raw: &str) -> Result<UrlList, IngestError> {
    let compact = raw.split_whitespace().collect::<String>();
    normalize_urls(compact.split(','))
}

/// Unparsable values are kept as skipped entries; only a list without a
/// single valid URL is an error.
pub fn normalize_urls<I, S>(values: I) -> Result<UrlList, IngestError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut list = UrlList::default();

    for value in values {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        match Url::parse(value) {
            Ok(url) => {
                if seen.insert(url.as_str().to_string()) {
                    list.urls.push(url);
                }
            }
            Err(error) => {
                warn!(value, error = %error, "skipping invalid url");
                list.invalid.push(SkippedSource {
                    source: value.to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    if list.urls.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no valid urls given ({} invalid)",
            list.invalid.len()
        )));
    }

    Ok(list)
}

fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    Html::parse_document(html)
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

struct FetchedPage {
    url: Url,
    body: String,
    is_html: bool,
}

pub struct WebLoader {
    client: Client,
    max_depth: usize,
}

impl WebLoader {
    pub fn new(options: &IngestionOptions) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.fetch_timeout_secs))
            .user_agent(concat!("corpus-index/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_depth: options.crawl_max_depth,
        })
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, IngestError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        let body = response.text().await?;
        let is_html = match content_type {
            Some(kind) => kind.contains("html"),
            None => body.trim_start().starts_with('<'),
        };

        Ok(FetchedPage {
            url: final_url,
            body,
            is_html,
        })
    }

    fn page_document(kind: SourceFormat, requested: &Url, page: &FetchedPage) -> Document {
        if !page.is_html {
            return Document::new(kind, requested.as_str(), None, page.body.clone());
        }

        let content = html_to_text(&page.body);
        let document = Document::new(kind, requested.as_str(), None, content.text);
        match content.title {
            Some(title) => document.with_metadata("title", title),
            None => document,
        }
    }

    /// Fetches each URL once. Failed fetches are reported, not fatal, and
    /// come after the list's invalid values in `skipped`.
    pub async fn load_url_list(&self, list: UrlList) -> LoadReport {
        let mut report = LoadReport {
            documents: Vec::new(),
            skipped: list.invalid,
        };

        for url in &list.urls {
            match self.fetch(url).await {
                Ok(page) => {
                    debug!(url = %url, bytes = page.body.len(), "fetched url");
                    report
                        .documents
                        .push(Self::page_document(SourceFormat::Urls, url, &page));
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "skipping url");
                    report.skip(url.as_str(), error);
                }
            }
        }

        report
    }

    /// Breadth-first crawl that stays under the root URL. The root sits at
    /// depth zero and only pages with depth below `max_depth` are fetched.
    pub async fn crawl(&self, root: &Url) -> LoadReport {
        let mut report = LoadReport::default();

        let mut root = root.clone();
        root.set_fragment(None);
        let scope = root.as_str().to_string();

        let mut visited = HashSet::from([scope.clone()]);
        let mut queue = VecDeque::from([(root, 0usize)]);

        while let Some((url, depth)) = queue.pop_front() {
            if depth >= self.max_depth {
                continue;
            }

            let page = match self.fetch(&url).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(url = %url, error = %error, "skipping crawled page");
                    report.skip(url.as_str(), error);
                    continue;
                }
            };

            if page.is_html && depth + 1 < self.max_depth {
                for link in extract_links(&page.body, &page.url) {
                    if link.as_str().starts_with(&scope) && visited.insert(link.to_string()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            debug!(url = %url, depth, queued = queue.len(), "crawled page");
            report
                .documents
                .push(Self::page_document(SourceFormat::UrlsRecursively, &url, &page));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn loader(max_depth: usize) -> WebLoader {
        WebLoader::new(&IngestionOptions {
            crawl_max_depth: max_depth,
            fetch_timeout_secs: 5,
            ..IngestionOptions::default()
        })
        .expect("client builds")
    }

    async fn mount_html(server: &MockServer, route: &str, body: &str, hits: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
            .expect(hits)
            .mount(server)
            .await;
    }

    #[test]
    fn html_text_skips_scripts_and_keeps_title() {
        let page = html_to_text(
            r#"<html><head><title> Pump   Manual </title><style>p { color: red }</style></head>
               <body><h1>Overview</h1><script>var x = 1;</script>
               <p>Check the   pressure
               daily.</p></body></html>"#,
        );

        assert_eq!(page.title.as_deref(), Some("Pump Manual"));
        assert!(page.text.contains("Overview"));
        assert!(page.text.contains("Check the pressure daily."));
        assert!(!page.text.contains("var x"));
        assert!(!page.text.contains("color"));
    }

    #[test]
    fn url_lists_are_trimmed_and_deduplicated() -> Result<(), Box<dyn std::error::Error>> {
        let list = parse_url_list(" https://a.example/x , https://b.example,https://a.example/x,")?;
        assert_eq!(list.urls.len(), 2);
        assert_eq!(list.urls[0].as_str(), "https://a.example/x");
        assert_eq!(list.urls[1].as_str(), "https://b.example/");
        assert!(list.invalid.is_empty());

        assert!(matches!(parse_url_list("not a url"), Err(IngestError::InvalidArgument(_))));
        assert!(matches!(parse_url_list(" , "), Err(IngestError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn invalid_values_are_kept_as_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let list = normalize_urls(["n/a", "https://a.example/x", "url"])?;
        assert_eq!(list.urls.len(), 1);

        let invalid: Vec<_> = list.invalid.iter().map(|item| item.source.as_str()).collect();
        assert_eq!(invalid, vec!["n/a", "url"]);
        assert!(list.invalid.iter().all(|item| !item.reason.is_empty()));
        Ok(())
    }

    #[test]
    fn links_resolve_relative_and_drop_fragments() -> Result<(), Box<dyn std::error::Error>> {
        let base = Url::parse("https://docs.example/guide/")?;
        let links = extract_links(
            r##"<a href="intro">i</a><a href="/api#x">a</a><a href="mailto:x@y.z">m</a>"##,
            &base,
        );
        let links: Vec<_> = links.iter().map(Url::as_str).collect();
        assert_eq!(links, vec!["https://docs.example/guide/intro", "https://docs.example/api"]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_urls_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_html(&server, "/ok", "<html><body><p>fine</p></body></html>", 1).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let list = normalize_urls([
            format!("{}/ok", server.uri()),
            "n/a".to_string(),
            format!("{}/missing", server.uri()),
        ])?;
        let report = loader(7).load_url_list(list).await;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].text, "fine");
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].source, "n/a");
        assert!(report.skipped[1].source.ends_with("/missing"));
        Ok(())
    }

    #[tokio::test]
    async fn crawl_respects_scope_and_depth() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/docs/",
            r##"<a href="a">A</a><a href="/docs/b#top">B</a><a href="/docs/a">again</a>
               <a href="/outside">out</a><p>root</p>"##,
            1,
        )
        .await;
        mount_html(&server, "/docs/a", r#"<a href="/docs/c">C</a><p>page a</p>"#, 1).await;
        mount_html(&server, "/docs/b", "<p>page b</p>", 1).await;
        mount_html(&server, "/docs/c", "<p>page c</p>", 0).await;
        mount_html(&server, "/outside", "<p>outside</p>", 0).await;

        let root = Url::parse(&format!("{}/docs/", server.uri()))?;
        let report = loader(2).crawl(&root).await;

        let mut sources: Vec<_> = report
            .documents
            .iter()
            .map(|doc| doc.source.trim_start_matches(&server.uri()).to_string())
            .collect();
        sources.sort();

        assert_eq!(sources, vec!["/docs/", "/docs/a", "/docs/b"]);
        assert!(report.skipped.is_empty());
        assert!(report
            .documents
            .iter()
            .all(|doc| doc.kind == SourceFormat::UrlsRecursively));
        Ok(())
    }

    #[tokio::test]
    async fn shallow_crawls_stop_at_the_root() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_html(&server, "/docs/", r#"<a href="/docs/a">A</a><p>root</p>"#, 1).await;
        mount_html(&server, "/docs/a", "<p>page a</p>", 0).await;

        let root = Url::parse(&format!("{}/docs/", server.uri()))?;

        let nothing = loader(0).crawl(&root).await;
        assert!(nothing.documents.is_empty());
        assert!(nothing.skipped.is_empty());

        let only_root = loader(1).crawl(&root).await;
        assert_eq!(only_root.documents.len(), 1);
        assert_eq!(only_root.documents[0].source, root.as_str());
        assert!(only_root.documents[0].text.contains("root"));
        Ok(())
    }
}
