//! Thin async HTTP client shared by the records-site fetcher and the
//! ArcGIS client.

use crate::config::HttpConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use url::Url;

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The requested URL, query included.
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client with a fixed user agent and per-request timeout.
///
/// Built once from [`HttpConfig`] and passed to whoever needs it; there is
/// no global session.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` and read the whole body. Any status is returned as a
    /// response; only transport failures are errors.
    pub async fn get(&self, url: &Url) -> Result<HttpResponse, reqwest::Error> {
        let resp = self.client.get(url.clone()).send().await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;

        Ok(HttpResponse {
            url: url.to_string(),
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_returns_any_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdo/sales.cfm"))
            .and(query_param("account", "10012345"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pdo/missing.cfm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();

        let mut url = Url::parse(&format!("{}/pdo/sales.cfm", server.uri())).unwrap();
        url.query_pairs_mut().append_pair("account", "10012345");
        let resp = client.get(&url).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.body, "<html>ok</html>");
        assert!(resp.url.ends_with("account=10012345"));

        let missing = Url::parse(&format!("{}/pdo/missing.cfm", server.uri())).unwrap();
        let resp = client.get(&missing).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }
}
