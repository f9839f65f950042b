use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::debug;

use super::Downloader;
use crate::error::{Result, UpdateError};

const CHUNK_SIZE: usize = 8192;

/// Blocking HTTP downloader. One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Build a client that identifies itself with `user_agent`.
    /// `timeout` of `None` disables reqwest's default request timeout.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| UpdateError::network("<client>", e))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Response> {
        debug!(url, "GET");
        self.client
            .get(url)
            .send()
            .and_then(Response::error_for_status)
            .map_err(|e| UpdateError::network(url, e))
    }
}

impl Downloader for HttpDownloader {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url)?;
        let bytes = response.bytes().map_err(|e| UpdateError::network(url, e))?;
        Ok(bytes.to_vec())
    }

    fn fetch_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<()> {
        let mut response = self.get(url)?;
        let total = response.content_length();

        let mut file = File::create(dest).map_err(|e| UpdateError::io(dest, e))?;
        let downloaded = copy_with_progress(&mut response, &mut file, total, progress)
            .map_err(|e| match e {
                CopyError::Read(e) => UpdateError::network(url, e),
                CopyError::Write(e) => UpdateError::io(dest, e),
            })?;
        file.flush().map_err(|e| UpdateError::io(dest, e))?;

        debug!(url, bytes = downloaded, dest = %dest.display(), "download complete");
        Ok(())
    }
}

#[derive(Debug)]
enum CopyError {
    Read(std::io::Error),
    Write(std::io::Error),
}

fn copy_with_progress(
    reader: &mut impl Read,
    writer: &mut impl Write,
    total: Option<u64>,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> std::result::Result<u64, CopyError> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(CopyError::Write)?;
        downloaded += bytes_read as u64;
        progress(downloaded, total);
    }

    Ok(downloaded)
}
