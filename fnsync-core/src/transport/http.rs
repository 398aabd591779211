// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP transport backed by reqwest.
//!
//! Every endpoint lives at `http://{address}:8080/{path}`. The port is a fixed
//! platform convention. The request deadline is the only knob.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::{Endpoint, Request, Response, Transport};
use crate::error::{FnsyncError, FnsyncResult, RemoteError};
use crate::types::PlatformAddress;

/// Port the platform's control plane listens on.
pub const CONTROL_PORT: u16 = 8080;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport talking to a real platform over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    port: u16,
}

impl HttpTransport {
    /// Create a transport with a bounded per-request deadline.
    pub fn new(request_timeout: Duration) -> FnsyncResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FnsyncError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            port: CONTROL_PORT,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn url(&self, address: &PlatformAddress, endpoint: Endpoint) -> String {
        if address.is_ipv6() {
            format!("http://[{}]:{}/{}", address, self.port, endpoint.path())
        } else {
            format!("http://{}:{}/{}", address, self.port, endpoint.path())
        }
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        address: &PlatformAddress,
        request: Request,
    ) -> Result<Response, RemoteError> {
        let endpoint = request.endpoint;
        let url = self.url(address, endpoint);
        let transport_error = |e: reqwest::Error| RemoteError::Transport {
            endpoint,
            reason: e.to_string(),
        };

        let builder = if endpoint.is_read_only() {
            self.client.get(&url)
        } else {
            self.client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(request.body)
        };

        tracing::debug!(url = %url, "Sending control-plane request");

        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(transport_error)?.to_vec();

        tracing::debug!(url = %url, status = status, bytes = body.len(), "Control-plane response");

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{body::Bytes, http::StatusCode, routing::{get, post}, Router};

    async fn spawn_stub() -> u16 {
        let app = Router::new()
            .route(
                "/list",
                get(|| async {
                    r#"[{"name":"greet","hash":"abc","threads":4,"resource":"/greet"}]"#
                }),
            )
            .route(
                "/delete",
                post(|body: Bytes| async move {
                    if body.as_ref() == b"greet" {
                        StatusCode::OK
                    } else {
                        StatusCode::NOT_FOUND
                    }
                }),
            )
            .route(
                "/upload",
                post(|body: Bytes| async move {
                    if body.is_empty() {
                        (StatusCode::BAD_REQUEST, "empty upload")
                    } else {
                        (StatusCode::OK, "ok")
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    fn localhost() -> PlatformAddress {
        PlatformAddress::new("127.0.0.1").unwrap()
    }

    #[test]
    fn test_url_uses_control_port() {
        let transport = HttpTransport::new(DEFAULT_REQUEST_TIMEOUT).unwrap();
        let address = PlatformAddress::new("10.0.0.5").unwrap();
        assert_eq!(
            transport.url(&address, Endpoint::Upload),
            "http://10.0.0.5:8080/upload"
        );
    }

    #[test]
    fn test_url_brackets_ipv6() {
        let transport = HttpTransport::new(DEFAULT_REQUEST_TIMEOUT).unwrap();
        let address = PlatformAddress::new("::1").unwrap();
        assert_eq!(
            transport.url(&address, Endpoint::List),
            "http://[::1]:8080/list"
        );
    }

    #[tokio::test]
    async fn test_list_round_trip() {
        let port = spawn_stub().await;
        let transport = HttpTransport::new(Duration::from_secs(5))
            .unwrap()
            .with_port(port);

        let resp = transport
            .send(&localhost(), Request::get(Endpoint::List))
            .await
            .unwrap();
        assert!(resp.is_success());
        assert!(String::from_utf8(resp.body).unwrap().contains("greet"));
    }

    #[tokio::test]
    async fn test_post_statuses_are_returned() {
        let port = spawn_stub().await;
        let transport = HttpTransport::new(Duration::from_secs(5))
            .unwrap()
            .with_port(port);

        let ok = transport
            .send(&localhost(), Request::post(Endpoint::Delete, "greet"))
            .await
            .unwrap();
        assert_eq!(ok.status, 200);

        let missing = transport
            .send(&localhost(), Request::post(Endpoint::Delete, "other"))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        let rejected = transport
            .send(&localhost(), Request::post(Endpoint::Upload, Vec::new()))
            .await
            .unwrap();
        assert_eq!(rejected.status, 400);
        assert_eq!(rejected.body_excerpt(), "empty upload");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = HttpTransport::new(Duration::from_secs(2))
            .unwrap()
            .with_port(port);

        let err = transport
            .send(&localhost(), Request::get(Endpoint::List))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Transport {
                endpoint: Endpoint::List,
                ..
            }
        ));
    }
}
