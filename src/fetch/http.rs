//! HTTP downloads

use crate::error::{ClibsError, ClibsResult};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Capability to download a URL to a local file
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// `dest` may be left partially written on error; callers own cleanup.
    async fn download(&self, url: &str, dest: &Path) -> ClibsResult<u64>;
}

/// Downloader backed by a blocking `ureq` agent
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader with an optional overall per-request timeout
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ClibsResult<u64> {
        let agent = self.agent.clone();
        let owned_url = url.to_string();
        let dest: PathBuf = dest.to_path_buf();

        tokio::task::spawn_blocking(move || download_blocking(&agent, &owned_url, &dest))
            .await
            .map_err(|e| ClibsError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?
    }
}

fn download_blocking(agent: &ureq::Agent, url: &str, dest: &Path) -> ClibsResult<u64> {
    debug!("GET {}", url);

    let mut response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::StatusCode(status) => ClibsError::HttpStatus {
            url: url.to_string(),
            status,
        },
        other => ClibsError::Download {
            url: url.to_string(),
            reason: other.to_string(),
        },
    })?;

    let mut file = File::create(dest)
        .map_err(|e| ClibsError::io(format!("creating {}", dest.display()), e))?;

    let mut reader = response.body_mut().as_reader();
    let bytes = std::io::copy(&mut reader, &mut file).map_err(|e| ClibsError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    file.sync_all()
        .map_err(|e| ClibsError::io(format!("flushing {}", dest.display()), e))?;

    debug!("Downloaded {} bytes from {}", bytes, url);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use tempfile::TempDir;

    const BODY: &str = "prebuilt archive bytes";

    /// Serves `/archive.tar.gz` with [`BODY`] and 404 for anything else,
    /// for `requests` connections. Returns the base URL.
    fn serve(requests: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut header = String::new();
                while reader.read_line(&mut header).unwrap() > 0 && header != "\r\n" {
                    header.clear();
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = if path == "/archive.tar.gz" {
                    ("200 OK", BODY)
                } else {
                    ("404 Not Found", "not found")
                };
                write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
                stream.flush().unwrap();
            }
        });

        format!("http://{}", addr)
    }

    /// Talks to the local server directly, whatever proxy the environment sets
    fn direct_downloader() -> HttpDownloader {
        let config = ureq::Agent::config_builder()
            .proxy(None)
            .timeout_global(Some(Duration::from_secs(10)))
            .build();
        HttpDownloader {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    #[tokio::test]
    async fn success_writes_body_to_dest() {
        let base = serve(1);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("archive.tar.gz");

        let bytes = direct_downloader()
            .download(&format!("{}/archive.tar.gz", base), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, BODY.len() as u64);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), BODY);
    }

    #[tokio::test]
    async fn not_found_is_http_status() {
        let base = serve(1);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing.tar.gz");

        let err = direct_downloader()
            .download(&format!("{}/missing.tar.gz", base), &dest)
            .await
            .unwrap_err();

        match &err {
            ClibsError::HttpStatus { status, url } => {
                assert_eq!(*status, 404);
                assert!(url.ends_with("/missing.tar.gz"));
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
        assert!(err.is_fetch_failure());
        assert_eq!(err.hint(), Some("Check the URL and version in lib.toml"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_download_error() {
        let dir = TempDir::new().unwrap();
        let downloader = HttpDownloader::new(Some(Duration::from_secs(5)));
        // Port 9 (discard) on localhost is essentially never listening
        let err = downloader
            .download("http://127.0.0.1:9/archive.tar.gz", &dir.path().join("a"))
            .await
            .unwrap_err();
        assert!(err.is_fetch_failure());
    }
}
