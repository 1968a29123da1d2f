//! Seekable reader over HTTP Range requests.
//!
//! [`RangeReader`] implements `Read + Seek` by fetching fixed-size blocks on
//! demand and keeping recent ones in an LRU cache, so a TIFF decoder pulls
//! only the header and the chunks a window touches.

use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::{debug, trace, warn};

use crate::error::{CloudError, Result};

/// Default block size (256 KiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 256 * 1024;
/// Default number of cached blocks
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

/// Random-access byte source.
pub trait RangeSource {
    /// Total size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes `[offset, offset + length)`, truncated at the end of the source.
    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>>;
}

impl RangeSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let start = (offset as usize).min(self.as_slice().len());
        let end = (offset.saturating_add(length) as usize).min(self.as_slice().len());
        Ok(self[start..end].to_vec())
    }
}

/// Options for [`HttpRangeSource`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// A remote file read with `Range: bytes=a-b` requests.
pub struct HttpRangeSource {
    client: Client,
    url: String,
    len: u64,
    max_retries: u32,
}

impl HttpRangeSource {
    /// Fetch the file size with a HEAD request.
    pub fn open(url: &str, options: &HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        let resp = client.head(url).send()?;
        if !resp.status().is_success() {
            return Err(CloudError::Network(format!(
                "HTTP {} probing {}",
                resp.status(),
                url
            )));
        }
        let headers = resp.headers();
        let accept_ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |v| v.contains("bytes"));
        if !accept_ranges {
            return Err(CloudError::Network(format!(
                "server does not support Range requests for {url}"
            )));
        }
        let len = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| CloudError::Network(format!("no Content-Length for {url}")))?;

        debug!(url, len, "opened remote file");
        Ok(Self {
            client,
            url: url.to_string(),
            len,
            max_retries: options.max_retries,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RangeSource for HttpRangeSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let end = offset.saturating_add(length).min(self.len);
        if offset >= end {
            return Ok(Vec::new());
        }
        let range = format!("bytes={}-{}", offset, end - 1);

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms, 400ms, ...
                let delay = Duration::from_millis(100 * (1 << (attempt - 1)));
                warn!(attempt, ?delay, url = %self.url, "retrying range request");
                std::thread::sleep(delay);
            }

            match self.client.get(&self.url).header(RANGE, &range).send() {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    trace!(
                        range = %range,
                        content_range = ?resp.headers().get(CONTENT_RANGE),
                        "range fetched"
                    );
                    return Ok(resp.bytes()?.to_vec());
                }
                Ok(resp) if resp.status().is_success() => {
                    return Err(CloudError::Network(format!(
                        "server ignored Range header for {}",
                        self.url
                    )));
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_err = Some(CloudError::Network(format!(
                        "HTTP {} fetching {} ({})",
                        status, self.url, range
                    )));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => last_err = Some(e.into()),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network("range request failed".into())))
    }
}

/// `Read + Seek` adapter over a [`RangeSource`] with an LRU block cache.
pub struct RangeReader<S: RangeSource> {
    source: S,
    pos: u64,
    block_size: u64,
    cache: LruCache<u64, Vec<u8>>,
    fetches: usize,
}

impl<S: RangeSource> RangeReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_cache(source, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS)
    }

    pub fn with_cache(source: S, block_size: u64, cache_blocks: usize) -> Self {
        let cap = NonZeroUsize::new(cache_blocks.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            pos: 0,
            block_size: block_size.max(1),
            cache: LruCache::new(cap),
            fetches: 0,
        }
    }

    /// Number of range requests issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn block(&mut self, index: u64) -> Result<&Vec<u8>> {
        if !self.cache.contains(&index) {
            let data = self.source.fetch(index * self.block_size, self.block_size)?;
            self.fetches += 1;
            self.cache.put(index, data);
        }
        self.cache
            .get(&index)
            .ok_or_else(|| CloudError::Network("block evicted before use".into()))
    }
}

impl<S: RangeSource> Read for RangeReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.source.len();
        if buf.is_empty() || self.pos >= len {
            return Ok(0);
        }
        let index = self.pos / self.block_size;
        let within = (self.pos % self.block_size) as usize;
        let block = self
            .block(index)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if within >= block.len() {
            return Ok(0);
        }
        let n = (block.len() - within).min(buf.len());
        buf[..n].copy_from_slice(&block[within..within + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: RangeSource> Seek for RangeReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.source.len().checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            )),
        }
    }
}
