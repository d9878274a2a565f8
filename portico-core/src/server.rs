// HTTP server adapter

use crate::{App, Error, HttpRequest, HttpResponse, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use portico_log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builds a fresh app for every request.
pub type AppFactory = Arc<dyn Fn() -> Result<App> + Send + Sync>;

/// Serves each request through its own [`App`].
pub struct Server {
    factory: AppFactory,
}

impl Server {
    pub fn new(factory: impl Fn() -> Result<App> + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Start the HTTP server on the specified port
    pub async fn listen(self, port: u16) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!(target: "portico::server", "listening on http://{}", addr);

        loop {
            let (stream, remote) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let factory = self.factory.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let factory = factory.clone();
                    async move { handle_request(req, remote, factory).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(target: "portico::server", "error serving connection: {:?}", err);
                }
            });
        }
    }

    /// Serve one already converted request.
    pub async fn serve(&self, request: HttpRequest) -> HttpResponse {
        let result = match (self.factory)() {
            Ok(app) => app.handle(request).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|err| {
            error!(target: "portico::server", "request failed: {}", err);
            fallback_response(&err)
        })
    }
}

async fn handle_request(
    req: Request<IncomingBody>,
    remote: SocketAddr,
    factory: AppFactory,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let host = req
        .headers()
        .get(hyper::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let uri = match host {
        Some(host) => format!("http://{}{}", host, target),
        None => target,
    };

    let mut request = HttpRequest::from_uri(method, &uri).with_remote_addr(remote.ip().to_string());
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    request.body = req.collect().await?.to_bytes().to_vec();

    let server = Server { factory };
    Ok(to_hyper(server.serve(request).await))
}

fn fallback_response(err: &Error) -> HttpResponse {
    let status = err.status_code();
    let body = serde_json::json!({
        "status": status,
        "message": err.to_string(),
    });
    HttpResponse::new(status)
        .with_json(&body)
        .unwrap_or_else(|_| HttpResponse::internal_server_error())
}

fn to_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);

    for (key, value) in &response.headers {
        builder = builder.header(key, value);
    }
    for cookie in &response.cookies {
        builder = builder.header(hyper::header::SET_COOKIE, cookie);
    }

    builder.body(Full::new(Bytes::from(response.body))).unwrap_or_else(|e| {
        error!(target: "portico::server", "invalid response: {}", e);
        let mut fallback = Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
