// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! HTTP/1 server exposing `POST /api/identify`

use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::VendorClient;

pub const IDENTIFY_PATH: &str = "/api/identify";

/// Recognition proxy bound to one vendor
pub struct ProxyServer {
    vendor: Arc<dyn VendorClient>,
}

impl ProxyServer {
    pub fn new(vendor: Arc<dyn VendorClient>) -> Self {
        Self { vendor }
    }

    /// Accept connections until `shutdown` fires
    pub async fn serve(&self, addr: SocketAddr, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Recognition proxy listening on http://{}", listener.local_addr()?);
        self.serve_listener(listener, &mut shutdown).await
    }

    pub async fn serve_listener(
        &self,
        listener: TcpListener,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Recognition proxy stopped");
                    return Ok(());
                }
                accepted = listener.accept() => accepted?,
            };

            let vendor = self.vendor.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| handle_request(vendor.clone(), req));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Connection from {} ended: {}", peer, e);
                }
            });
        }
    }
}

/// Route one request
pub async fn handle_request<B>(
    vendor: Arc<dyn VendorClient>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight(),
        (Method::POST, IDENTIFY_PATH) => identify(vendor.as_ref(), req).await,
        _ => json_response(StatusCode::NOT_FOUND, json!({ "message": "Not found" })),
    };
    Ok(response)
}

async fn identify<B>(vendor: &dyn VendorClient, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    info!("Received request to {} at {}", IDENTIFY_PATH, chrono::Utc::now().to_rfc3339());

    let sample = match read_sample(req).await {
        Some(sample) => sample,
        None => {
            warn!("No file received");
            return json_response(StatusCode::BAD_REQUEST, json!({ "message": "No audio file received" }));
        }
    };

    match vendor.identify(sample).await {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => {
            error!("Vendor request failed: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Failed to recognize audio", "error": e.payload() }),
            )
        }
    }
}

/// Bytes of the `sample` file field, if the body is multipart and carries one
async fn read_sample<B>(req: Request<B>) -> Option<Bytes>
where
    B: Body,
    B::Error: Display,
{
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())?
        .to_string();
    let boundary = multer::parse_boundary(&content_type).ok()?;

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return None;
        }
    };

    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("sample") => {
                return match field.bytes().await {
                    Ok(data) if !data.is_empty() => {
                        debug!("Sample of {} bytes", data.len());
                        Some(data)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Malformed sample field: {}", e);
                        None
                    }
                };
            }
            Ok(Some(_)) => continue,
            Ok(None) => return None,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return None;
            }
        }
    }
}

fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,PUT,PATCH,POST,DELETE"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
