//! HTTP front for the catalog operations.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, info_span, warn, Instrument};

use crate::error::ServiceError;
use crate::transport::Transport;
use crate::Oblivion;

pub type ResponseBody = BoxBody<Bytes, Infallible>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Accept connections until Ctrl-C or SIGTERM.
pub async fn serve<T: Transport + 'static>(app: Arc<Oblivion<T>>, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await.with_context(|| format!("binding {bind}"))?;
    info!("Listening on http://{}", listener.local_addr().unwrap_or(bind));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => { warn!(error = %e, "accept failed"); continue; }
                };
                let io = TokioIo::new(stream);
                let app = app.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle_request(req, app.clone()));
                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        warn!(%peer, error = %err, "connection error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, closing HTTP server");
                return Ok(());
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn handle_request<T: Transport>(req: Request<Incoming>, app: Arc<Oblivion<T>>) -> Result<Response<ResponseBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let span = info_span!("request", id = %uuid::Uuid::new_v4(), %method, %path);

    async move {
        let start = Instant::now();
        let resp = route(&app, &method, &path, query.as_deref()).await;
        info!(status = resp.status().as_u16(), elapsed_ms = start.elapsed().as_millis() as u64, "handled");
        Ok(resp)
    }
    .instrument(span)
    .await
}

/// Dispatch one request. Split from the hyper plumbing so it can be driven directly.
pub async fn route<T: Transport>(app: &Oblivion<T>, method: &Method, path: &str, query: Option<&str>) -> Response<ResponseBody> {
    if *method != Method::GET {
        return json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }
    let params = parse_query(query);

    match path {
        "/health" => json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" })),

        "/api/invidious/search" => {
            let q = params.get("q").map(String::as_str).unwrap_or("");
            match app.invidious_search(q).await {
                Ok(r) => respond(StatusCode::OK, "application/json", r.body),
                Err(e) => service_error("invidious/search", e),
            }
        }

        p if p.starts_with("/api/invidious/streams/") => {
            let id = &p["/api/invidious/streams/".len()..];
            match app.invidious_streams(id).await {
                Ok(r) => respond(StatusCode::OK, "application/json", r.body),
                Err(e) => service_error("invidious/streams", e),
            }
        }

        "/api/itunes" => match app.itunes_search(query.unwrap_or("")).await {
            Ok(r) => respond(status_of(r.status), "application/json", r.body),
            Err(e) => service_error("itunes", e),
        },

        p if p.starts_with("/api/img/") => {
            let mut target = p["/api/img/".len()..].to_string();
            if let Some(q) = query {
                target.push('?');
                target.push_str(q);
            }
            match app.image(&target).await {
                Ok(r) if r.is_success() => {
                    let ct = r.content_type.as_deref().unwrap_or("image/jpeg");
                    let mut resp = respond(StatusCode::OK, ct, r.body);
                    let h = resp.headers_mut();
                    h.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400"));
                    h.insert("cross-origin-resource-policy", HeaderValue::from_static("cross-origin"));
                    resp
                }
                Ok(r) => respond(status_of(r.status), "text/plain", Bytes::new()),
                Err(e) => {
                    warn!(route = "img", error = %e, "upstream failed");
                    respond(StatusCode::BAD_GATEWAY, "text/plain", Bytes::new())
                }
            }
        }

        "/api/yt/search" => {
            let q = params.get("q").map(String::as_str).unwrap_or("");
            match app.youtube_search(q).await {
                Ok(records) => json_response(StatusCode::OK, &records),
                Err(e) => service_error("yt/search", e),
            }
        }

        p if p.starts_with("/api/yt/streams/") => {
            let id = &p["/api/yt/streams/".len()..];
            match app.youtube_audio(id).await {
                Ok(streams) => json_response(StatusCode::OK, &streams),
                Err(e) => service_error("yt/streams", e),
            }
        }

        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    }
}

fn service_error(route: &str, err: ServiceError) -> Response<ResponseBody> {
    match err {
        ServiceError::InvalidVideoId(_) => json_error(StatusCode::BAD_REQUEST, "invalid videoId"),
        other => {
            warn!(route, error = %other, "upstream failed");
            json_error(StatusCode::BAD_GATEWAY, &other.to_string())
        }
    }
}

fn status_of(code: u16) -> StatusCode { StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY) }

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody { Full::new(chunk.into()).boxed() }

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<ResponseBody> {
    let mut resp = Response::new(full(body));
    *resp.status_mut() = status;
    if let Ok(v) = HeaderValue::from_str(content_type) {
        resp.headers_mut().insert(CONTENT_TYPE, v);
    }
    resp
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<ResponseBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    respond(status, "application/json", json)
}

fn json_error(status: StatusCode, message: &str) -> Response<ResponseBody> {
    json_response(status, &ErrorBody { error: message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::transport::fake::{FakeTransport, Scripted};

    fn app(t: FakeTransport) -> Oblivion<FakeTransport> {
        let cfg = Config {
            invidious_instances: vec!["https://inv-a".into()],
            itunes_base: "https://itunes".into(),
            youtube_base: "https://yt".into(),
            ..Config::default()
        };
        Oblivion::with_transport(cfg, t)
    }

    async fn body_json(resp: Response<ResponseBody>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_and_unknown_routes() {
        let a = app(FakeTransport::new());
        let ok = route(&a, &Method::GET, "/health", None).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["status"], "ok");

        let missing = route(&a, &Method::GET, "/wp-admin", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await["error"], "not found");

        let post = route(&a, &Method::POST, "/health", None).await;
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn bad_video_id_is_400() {
        let a = app(FakeTransport::new());
        let resp = route(&a, &Method::GET, "/api/invidious/streams/bad", None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "invalid videoId");
    }

    #[tokio::test]
    async fn exhausted_mirrors_are_502_with_reason() {
        let a = app(FakeTransport::new().on("https://inv-a", Scripted::Respond(500, "", None)));
        let resp = route(&a, &Method::GET, "/api/invidious/search", Some("q=abba")).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let err = body_json(resp).await["error"].as_str().unwrap().to_string();
        assert!(err.contains("https://inv-a"));
    }

    #[tokio::test]
    async fn invidious_body_is_relayed_as_json() {
        let a = app(FakeTransport::new().on("https://inv-a", Scripted::Respond(200, "[{\"videoId\":\"x\"}]", None)));
        let resp = route(&a, &Method::GET, "/api/invidious/search", Some("q=abba")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(resp).await[0]["videoId"], "x");
    }

    #[tokio::test]
    async fn itunes_status_passes_through() {
        let a = app(FakeTransport::new().on("https://itunes", Scripted::Respond(404, "{}", None)));
        let resp = route(&a, &Method::GET, "/api/itunes", Some("term=x")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn image_gets_cache_headers() {
        let a = app(FakeTransport::new().on("https://i.ytimg.com", Scripted::Respond(200, "PNG", Some("image/png"))));
        let resp = route(&a, &Method::GET, "/api/img/i.ytimg.com/vi/x/hq.png", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(resp.headers()[CACHE_CONTROL], "public, max-age=86400");
        assert_eq!(resp.headers()["cross-origin-resource-policy"], "cross-origin");
    }

    #[tokio::test]
    async fn yt_search_returns_records() {
        let page = r#"var ytInitialData = {"contents":{"twoColumnSearchResultsRenderer":{"primaryContents":{"sectionListRenderer":{"contents":[{"itemSectionRenderer":{"contents":[{"videoRenderer":{"videoId":"dQw4w9WgXcQ","title":{"runs":[{"text":"Song"}]},"lengthText":{"simpleText":"3:45"}}}]}}]}}}}};"#;
        let a = app(FakeTransport::new().on("https://yt/results", Scripted::Respond(200, page, None)));
        let resp = route(&a, &Method::GET, "/api/yt/search", Some("q=song")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v[0]["videoId"], "dQw4w9WgXcQ");
        assert_eq!(v[0]["lengthSeconds"], 225);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_resolves_shutdown() {
        use std::time::Duration;

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        // first poll installs the handlers
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut shutdown).await.is_err());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
        tokio::time::timeout(Duration::from_secs(5), shutdown).await.expect("SIGTERM did not resolve shutdown");
    }

    #[test]
    fn query_is_decoded() {
        let p = parse_query(Some("q=daft+punk%21&x="));
        assert_eq!(p["q"], "daft punk!");
        assert_eq!(p["x"], "");
    }
}
