// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Turn a non-success response into an [`AppError::Api`], keeping a short
/// excerpt of the body for the log.
pub async fn ensure_success(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::Api {
        backend,
        status: status.as_u16(),
        message: body.chars().take(200).collect(),
    })
}

/// A local HTTP/1.1 server answering every request from a closure, for
/// driving the remote stores without the real services.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use url::Url;

    /// One request as the server saw it.
    #[derive(Debug, Clone)]
    pub struct Captured {
        pub method: String,
        pub url: Url,
        pub body: String,
    }

    impl Captured {
        /// Decoded value of a query parameter.
        pub fn query(&self, key: &str) -> Option<String> {
            self.url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        }

        pub fn body_json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    /// A client that talks to the fake backend directly, whatever proxy the
    /// environment configures.
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    type Responder = dyn Fn(&Captured) -> (u16, String) + Send + Sync;

    pub struct FakeBackend {
        pub base_url: String,
        requests: Arc<Mutex<Vec<Captured>>>,
    }

    impl FakeBackend {
        /// Bind an ephemeral port and answer each request with `respond`,
        /// which returns a status and a JSON body.
        pub async fn start<F>(respond: F) -> Self
        where
            F: Fn(&Captured) -> (u16, String) + Send + Sync + 'static,
        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let respond: Arc<Responder> = Arc::new(respond);

            let log = Arc::clone(&requests);
            let origin = base_url.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let respond = Arc::clone(&respond);
                    let log = Arc::clone(&log);
                    let origin = origin.clone();
                    tokio::spawn(async move { serve(socket, &origin, respond, log).await });
                }
            });

            Self { base_url, requests }
        }

        pub fn requests(&self) -> Vec<Captured> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn serve(
        mut socket: TcpStream,
        origin: &str,
        respond: Arc<Responder>,
        log: Arc<Mutex<Vec<Captured>>>,
    ) {
        let Some(request) = read_request(&mut socket, origin).await else {
            return;
        };
        let (status, body) = respond(&request);
        log.lock().unwrap().push(request);

        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            if status < 400 { "OK" } else { "Error" },
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    async fn read_request(socket: &mut TcpStream, origin: &str) -> Option<Captured> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_len = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_len]).into_owned();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_len + content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.lines().next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let url = Url::parse(&format!("{}{}", origin, request_line.next()?)).ok()?;
        Some(Captured {
            method,
            url,
            body: String::from_utf8_lossy(&buf[head_len..]).into_owned(),
        })
    }
}
