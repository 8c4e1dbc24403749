use crate::config::{Config, MIN_REMOTE_TIMEOUT_SECONDS};
use crate::lead::{Lead, NewLead};
use crate::store::{LeadStore, StoreError};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Lead table on a hosted PostgREST-compatible service (`/rest/v1/<table>`).
#[derive(Debug, Clone)]
pub struct RemoteStore {
    endpoint: Url,
    api_key: String,
    timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    code: Option<String>,
}

impl RemoteStore {
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config
            .remote_url
            .as_deref()
            .context("remote store selected but remote_url is not set")?;
        let api_key = config
            .resolve_remote_api_key()
            .context("remote store selected but no API key is configured")?;

        Self::new(base_url, &config.remote_table, api_key, config.remote_timeout_seconds)
    }

    pub fn new(base_url: &str, table: &str, api_key: String, timeout_seconds: u64) -> Result<Self> {
        if table.trim().is_empty() {
            bail!("remote table name is empty");
        }

        if timeout_seconds < MIN_REMOTE_TIMEOUT_SECONDS {
            bail!("remote_timeout_seconds must be at least {MIN_REMOTE_TIMEOUT_SECONDS}");
        }

        let mut endpoint =
            Url::parse(base_url).with_context(|| format!("Invalid remote store URL: {base_url}"))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow!("Remote store URL cannot have a path: {base_url}"))?
            .pop_if_empty()
            .extend(["rest", "v1", table.trim()]);

        Ok(Self {
            endpoint,
            api_key,
            timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn client(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key).context("Failed to build apikey header")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("Failed to build Authorization header")?,
        );

        Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create remote store HTTP client")
    }

    fn insert_blocking(&self, lead: &NewLead) -> Result<RemoteReply> {
        let response = self
            .client()?
            .post(self.endpoint.clone())
            .header("Prefer", "return=representation")
            .json(lead)
            .send()
            .context("Remote store insert request failed")?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read remote store response body")?;

        Ok(RemoteReply { status, body })
    }

    fn list_blocking(&self) -> Result<RemoteReply> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");

        let response = self
            .client()?
            .get(url)
            .send()
            .context("Remote store list request failed")?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read remote store response body")?;

        Ok(RemoteReply { status, body })
    }

    // The blocking client must not run on an async runtime thread.
    fn off_runtime<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(RemoteStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        std::thread::spawn(move || work(store))
            .join()
            .map_err(|_| anyhow!("remote store worker thread panicked"))?
    }
}

struct RemoteReply {
    status: StatusCode,
    body: String,
}

impl LeadStore for RemoteStore {
    fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let request = lead.clone();
        let reply = self.off_runtime(move |store| store.insert_blocking(&request))?;

        if is_unique_violation(reply.status, &reply.body) {
            return Err(StoreError::Duplicate { email: lead.email });
        }

        if !reply.status.is_success() {
            return Err(anyhow!("Remote store error {}: {}", reply.status, reply.body).into());
        }

        let mut rows = parse_rows(&reply.body)?;
        rows.pop()
            .ok_or_else(|| anyhow!("Remote store returned no inserted row").into())
    }

    fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        let reply = self.off_runtime(|store| store.list_blocking())?;

        if !reply.status.is_success() {
            return Err(anyhow!("Remote store error {}: {}", reply.status, reply.body).into());
        }

        Ok(parse_rows(&reply.body)?)
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

fn is_unique_violation(status: StatusCode, body: &str) -> bool {
    let coded = serde_json::from_str::<RemoteErrorBody>(body)
        .ok()
        .and_then(|error| error.code)
        .is_some_and(|code| code == UNIQUE_VIOLATION_CODE);

    coded || status == StatusCode::CONFLICT
}

fn parse_rows(body: &str) -> Result<Vec<Lead>> {
    serde_json::from_str(body).with_context(|| format!("Failed to parse remote lead rows: {body}"))
}

#[cfg(test)]
mod tests {
    use super::{RemoteStore, is_unique_violation, parse_rows};
    use crate::lead::{NewLead, Plan, University};
    use crate::store::{LeadStore, StoreError};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use reqwest::StatusCode;
    use serde_json::json;

    const ROW: &str = r#"{
        "id": "6f1c2f0e-8f7a-4c39-9d0e-1f0f4bb4c001",
        "email": "a@x.com",
        "name": null,
        "phone": "+44 7700 900000",
        "university": "cambridge",
        "selected_plan": "premium",
        "created_at": "2026-10-16T09:15:00.123456+00:00"
    }"#;

    async fn hosted_table() -> String {
        let app = Router::new().route(
            "/proxy/rest/v1/leads",
            post(|| async {
                (
                    AxumStatus::CONFLICT,
                    Json(json!({
                        "code": "23505",
                        "message": "duplicate key value violates unique constraint \"leads_email_key\""
                    })),
                )
            })
            .get(|| async { ([("content-type", "application/json")], format!("[{ROW}]")) }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        format!("http://{addr}/proxy")
    }

    fn new_lead(email: &str) -> NewLead {
        NewLead {
            email: email.to_string(),
            name: None,
            phone: None,
            university: University::Ucl,
            selected_plan: Plan::Free,
        }
    }

    #[test]
    fn builds_table_endpoint() {
        let store = RemoteStore::new("https://abc.example.co/", "leads", "key".to_string(), 20)
            .expect("store");
        assert_eq!(store.endpoint().as_str(), "https://abc.example.co/rest/v1/leads");
    }

    #[test]
    fn keeps_base_path_when_building_endpoint() {
        for base in ["https://host.example/proxy", "https://host.example/proxy/"] {
            let store = RemoteStore::new(base, "leads", "key".to_string(), 20).expect("store");
            assert_eq!(store.endpoint().as_str(), "https://host.example/proxy/rest/v1/leads");
        }
    }

    #[test]
    fn rejects_invalid_base_url_and_short_timeout() {
        assert!(RemoteStore::new("not a url", "leads", "key".to_string(), 20).is_err());
        assert!(RemoteStore::new("https://abc.example.co", "leads", "key".to_string(), 1).is_err());
    }

    #[test]
    fn detects_unique_violation_by_code_or_status() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        assert!(is_unique_violation(StatusCode::BAD_REQUEST, body));
        assert!(is_unique_violation(StatusCode::CONFLICT, ""));
        assert!(!is_unique_violation(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"code":"42P01"}"#
        ));
    }

    #[test]
    fn parses_hosted_rows() {
        let rows = parse_rows(&format!("[{ROW}]")).expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].university, University::Cambridge);
        assert_eq!(rows[0].selected_plan, Plan::Premium);
        assert!(rows[0].name.is_none());
        assert_eq!(rows[0].id.as_deref(), Some("6f1c2f0e-8f7a-4c39-9d0e-1f0f4bb4c001"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflict_from_hosted_table_is_duplicate() {
        let base = hosted_table().await;
        let store = RemoteStore::new(&base, "leads", "key".to_string(), 5).expect("store");

        let (inserted, listed) = tokio::task::spawn_blocking(move || {
            (store.insert(new_lead("a@x.com")), store.list_all())
        })
        .await
        .expect("join");

        match inserted {
            Err(StoreError::Duplicate { email }) => assert_eq!(email, "a@x.com"),
            other => panic!("expected duplicate, got {other:?}"),
        }
        let listed = listed.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].email, "a@x.com");
    }
}
