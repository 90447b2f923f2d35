use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::ApiError;

pub const API_PREFIX: &str = "/api/v1/volunteer";

// JSON client for the volunteer REST API
#[derive(Clone)]
pub struct VolunteerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl VolunteerClient {
    pub fn new(http: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        // add http:// if not present
        let base_url = if base_url.starts_with("http") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Self {
            http,
            base_url,
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // absolute url under the API prefix
    pub fn url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            API_PREFIX,
            path_and_query.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get_json(&self, path_and_query: &str) -> Result<Value, ApiError> {
        let request = self
            .authorize(self.http.get(self.url(path_and_query)))
            .timeout(Duration::from_secs(30));
        decode(request.send().await?).await
    }

    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self
            .authorize(self.http.post(self.url(path)))
            .json(body)
            .timeout(Duration::from_secs(30));
        decode(request.send().await?).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<R>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_under_api_prefix() {
        let client = VolunteerClient::new(reqwest::Client::new(), "localhost:3000/", None);
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(
            client.url("/shifts?week=12"),
            "http://localhost:3000/api/v1/volunteer/shifts?week=12"
        );
        assert_eq!(
            client.url("profiles/batch"),
            "http://localhost:3000/api/v1/volunteer/profiles/batch"
        );
    }

    #[test]
    fn keeps_explicit_scheme() {
        let client = VolunteerClient::new(reqwest::Client::new(), "https://api.example.org", None);
        assert_eq!(client.base_url(), "https://api.example.org");
    }
}
