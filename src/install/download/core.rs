//! Streaming asset download with progress tracking

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::config::InstallerConfig;
use crate::install::InstallerError;

/// Downloads release assets to local files
pub struct Fetcher {
    client: reqwest::Client,
    inactivity_timeout: Duration,
    show_progress: bool,
}

impl Fetcher {
    pub fn new(config: &InstallerConfig, show_progress: bool) -> Result<Self, InstallerError> {
        // Redirects are followed by default; the asset URL bounces to a CDN.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| InstallerError::download("<client>", e))?;

        Ok(Self {
            client,
            inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
            show_progress,
        })
    }

    /// Stream `url` into `destination`, returning the number of bytes written
    ///
    /// A failed transfer leaves whatever was written in place; the caller's
    /// workspace owns the file and discards it.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, InstallerError> {
        info!("Downloading {url}");

        // The inactivity limit also covers waiting for the response headers
        let response = match timeout(self.inactivity_timeout, self.client.get(url).send()).await {
            Ok(response) => response.map_err(|e| InstallerError::download(url, e))?,
            Err(_) => {
                return Err(InstallerError::download(
                    url,
                    format!(
                        "no response within {} seconds",
                        self.inactivity_timeout.as_secs()
                    ),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::download(url, format!("HTTP {status}")));
        }

        let total_bytes = response.content_length();
        let progress = self.progress_bar(total_bytes);

        let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
            InstallerError::download(url, format!("cannot create {}: {e}", destination.display()))
        })?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        loop {
            let chunk = match timeout(self.inactivity_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    progress.abandon();
                    return Err(InstallerError::download(url, e));
                }
                Ok(None) => break,
                Err(_) => {
                    progress.abandon();
                    return Err(InstallerError::download(
                        url,
                        format!(
                            "no data received for {} seconds after {downloaded} bytes",
                            self.inactivity_timeout.as_secs()
                        ),
                    ));
                }
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| InstallerError::download(url, e))?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| InstallerError::download(url, e))?;
        progress.finish_and_clear();

        check_complete(total_bytes, downloaded)
            .map_err(|reason| InstallerError::download(url, reason))?;

        debug!("Wrote {downloaded} bytes to {}", destination.display());
        Ok(downloaded)
    }

    fn progress_bar(&self, total_bytes: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = match total_bytes {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template(
            "  {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }
}

/// Compare the announced length with what actually arrived
fn check_complete(expected: Option<u64>, downloaded: u64) -> Result<(), String> {
    match expected {
        Some(expected) if expected != downloaded => Err(format!(
            "truncated transfer: {downloaded} of {expected} bytes"
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(&InstallerConfig::default(), false).unwrap()
    }

    #[tokio::test]
    async fn streams_body_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mintas-linux.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("mintas-linux.tar.gz");
        let written = fetcher()
            .download(&format!("{}/mintas-linux.tar.gz", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 4096]);
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/download/mintas-linux.tar.gz"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/cdn/blob", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset");
        fetcher()
            .download(
                &format!("{}/releases/download/mintas-linux.tar.gz", server.uri()),
                &dest,
            )
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn non_success_status_is_a_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher()
            .download(&format!("{}/missing", server.uri()), &dir.path().join("x"))
            .await
            .unwrap_err();
        match err {
            InstallerError::Download { reason, .. } => assert!(reason.contains("404")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_a_download_error() {
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher()
            .download(&format!("http://127.0.0.1:{port}/asset"), &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::Download { .. }));
    }

    #[tokio::test]
    async fn stalled_server_hits_the_inactivity_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = InstallerConfig {
            inactivity_timeout_secs: 1,
            ..InstallerConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = Fetcher::new(&config, false)
            .unwrap()
            .download(&format!("{}/slow", server.uri()), &dir.path().join("x"))
            .await
            .unwrap_err();
        match err {
            InstallerError::Download { reason, .. } => assert!(reason.contains("1 seconds")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_body_is_reported_as_truncated() {
        let reason = check_complete(Some(4096), 1024).unwrap_err();
        assert_eq!(reason, "truncated transfer: 1024 of 4096 bytes");
        assert!(check_complete(Some(7), 7).is_ok());
        assert!(check_complete(None, 123).is_ok());
    }
}
