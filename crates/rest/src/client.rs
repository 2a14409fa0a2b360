//! REST client and session.
//!
//! A session is opened by resolving the server host, then logging in with
//! `PUT /API/Auth/Login`. Uploads carry the returned token in a
//! `Basic` authorization header.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use driverpub_publish::{RemoteClient, RemoteError, RemoteFuture, RemoteSession};
use driverpub_settings::{Credentials, ServerEndpoint};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::types::{Collection, LoginRequest, parse_token};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Opens [`RestSession`]s against a server.
pub struct RestClient {
    http: reqwest::Client,
    scheme: &'static str,
}

impl RestClient {
    /// Creates a plain-HTTP client.
    pub fn new() -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            scheme: "http",
        })
    }

    /// Talks to the server over HTTPS instead.
    pub fn with_tls(mut self) -> Self {
        self.scheme = "https";
        self
    }

    async fn login(&self, api_url: &str, credentials: &Credentials) -> Result<String, RemoteError> {
        let body = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            domain: &credentials.domain,
        };

        let resp = self
            .http
            .put(format!("{api_url}/Auth/Login"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let token = parse_token(&check_status(resp).await?);
        if token.is_empty() {
            return Err(RemoteError::Auth("server returned an empty session token".into()));
        }
        Ok(token)
    }
}

impl RemoteClient for RestClient {
    fn connect<'a>(
        &'a self,
        endpoint: &'a ServerEndpoint,
        credentials: &'a Credentials,
    ) -> RemoteFuture<'a, Box<dyn RemoteSession>> {
        Box::pin(async move {
            resolve(endpoint).await?;

            let api_url = api_url(self.scheme, endpoint);
            let token = self.login(&api_url, credentials).await?;
            info!(
                server = %endpoint,
                user = %credentials.username,
                domain = %credentials.domain,
                "logged in"
            );

            Ok(Box::new(RestSession {
                http: self.http.clone(),
                api_url,
                token,
            }) as Box<dyn RemoteSession>)
        })
    }
}

/// One logged-in session.
pub struct RestSession {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl RestSession {
    /// Uploads `data` as the named resource in `collection`.
    async fn upload(
        &self,
        collection: Collection,
        name: &str,
        file_name: String,
        data: &[u8],
    ) -> Result<(), RemoteError> {
        let url = format!(
            "{}/{}/{}",
            self.api_url,
            collection.path(),
            utf8_percent_encode(name, NON_ALPHANUMERIC)
        );
        let form = Form::new().part("file", Part::bytes(data.to_vec()).file_name(file_name));

        debug!(url = %url, bytes = data.len(), "uploading");
        let resp = self
            .http
            .put(&url)
            .header(AUTHORIZATION, format!("Basic {}", self.token))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        check_status(resp).await.map(|_| ())
    }
}

impl RemoteSession for RestSession {
    fn update_driver<'a>(
        &'a self,
        driver_name: &'a str,
        archive: &'a [u8],
    ) -> RemoteFuture<'a, ()> {
        Box::pin(self.upload(
            Collection::Drivers,
            driver_name,
            format!("{driver_name}.zip"),
            archive,
        ))
    }

    fn update_entry<'a>(&'a self, name: &'a str, data: &'a [u8]) -> RemoteFuture<'a, ()> {
        let file_name = name.rsplit('/').next().unwrap_or(name).to_string();
        Box::pin(self.upload(Collection::Scripts, name, file_name, data))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        // The API has no logout; tokens expire server-side.
        Box::pin(async move {
            debug!(api = %self.api_url, "session released");
        })
    }
}

/// Fails with `UnknownHost` when the endpoint's host does not resolve.
async fn resolve(endpoint: &ServerEndpoint) -> Result<(), RemoteError> {
    match tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port)).await {
        Ok(mut addrs) => {
            if addrs.next().is_some() {
                Ok(())
            } else {
                Err(RemoteError::UnknownHost(endpoint.host.clone()))
            }
        }
        Err(e) => {
            debug!(host = %endpoint.host, error = %e, "host lookup failed");
            Err(RemoteError::UnknownHost(endpoint.host.clone()))
        }
    }
}

fn api_url(scheme: &str, endpoint: &ServerEndpoint) -> String {
    if endpoint.host.contains(':') && !endpoint.host.starts_with('[') {
        format!("{scheme}://[{}]:{}/API", endpoint.host, endpoint.port)
    } else {
        format!("{scheme}://{}:{}/API", endpoint.host, endpoint.port)
    }
}

/// Maps the response status and returns the body of a successful response.
async fn check_status(resp: reqwest::Response) -> Result<String, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return resp.text().await.map_err(transport);
    }

    // The status already classifies a failure; its body is only detail.
    let body = resp.text().await.unwrap_or_default();
    let detail = format!("{}: {body}", status.as_u16());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(RemoteError::Auth(detail))
    } else {
        Err(RemoteError::Rejected(detail))
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}
