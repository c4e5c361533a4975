//! Byte-range access to the raster dataset.
//!
//! The GeoTIFF decoder only ever asks for byte windows (header, IFD, tag
//! arrays, single chunks), so a remote dataset is answered with a handful of
//! HTTP range requests instead of a full download.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{ElevationError, Result};

/// Default timeout for HTTP requests in seconds.
#[cfg(feature = "http")]
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A readable, randomly addressable byte source.
pub trait RangeSource: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`.
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>>;

    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Path or URL, used in logs and errors.
    fn identifier(&self) -> &str;

    /// Whether reads go over the network.
    fn is_remote(&self) -> bool {
        false
    }
}

/// A memory-mapped local file.
pub struct LocalSource {
    path: PathBuf,
    identifier: String,
    data: Mmap,
}

impl LocalSource {
    /// Memory-map a local file.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::DatasetUnavailable`] if the file cannot be
    /// opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();

        let file = File::open(&path).map_err(|e| ElevationError::unavailable(&identifier, e))?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and don't expose the mapping.
        let data =
            unsafe { Mmap::map(&file) }.map_err(|e| ElevationError::unavailable(&identifier, e))?;

        Ok(Self {
            path,
            identifier,
            data,
        })
    }

    /// Path of the mapped file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeSource for LocalSource {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.checked_add(length).unwrap_or(usize::MAX);
        if end > self.data.len() {
            return Err(ElevationError::unavailable(
                &self.identifier,
                format!(
                    "read of {} bytes at offset {} past end of file ({} bytes)",
                    length,
                    offset,
                    self.data.len()
                ),
            ));
        }
        Ok(self.data[start..end].to_vec())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// A remote dataset read with HTTP range requests.
#[cfg(feature = "http")]
pub struct HttpSource {
    url: String,
    size: u64,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// Connect to a remote dataset and determine its size.
    ///
    /// The size comes from the `Content-Length` of a `HEAD` request, or from
    /// the `Content-Range` of a one-byte range request when the server does
    /// not report a length for `HEAD`.
    pub fn open(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ElevationError::unavailable(url, e))?;

        let response = client
            .head(url)
            .send()
            .map_err(|e| ElevationError::unavailable(url, e))?;

        if !response.status().is_success() {
            return Err(ElevationError::unavailable(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        let size = match header_u64(response.headers(), reqwest::header::CONTENT_LENGTH) {
            Some(len) if len > 0 => len,
            _ => Self::probe_size(&client, url)?,
        };

        tracing::debug!(url = url, size = size, "Opened remote dataset");

        Ok(Self {
            url: url.to_string(),
            size,
            client,
        })
    }

    fn probe_size(client: &reqwest::blocking::Client, url: &str) -> Result<u64> {
        let response = client
            .get(url)
            .header(reqwest::header::RANGE, "bytes=0-0")
            .send()
            .map_err(|e| ElevationError::unavailable(url, e))?;

        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.trim().parse().ok())
            .ok_or_else(|| {
                ElevationError::unavailable(url, "server does not report the dataset size")
            })
    }
}

#[cfg(feature = "http")]
fn header_u64(
    headers: &reqwest::header::HeaderMap,
    name: reqwest::header::HeaderName,
) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(feature = "http")]
impl RangeSource for HttpSource {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let range = format!("bytes={}-{}", offset, offset + length as u64 - 1);
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, range)
            .send()
            .map_err(|e| ElevationError::unavailable(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ElevationError::unavailable(
                &self.url,
                format!("HTTP {} for range read at offset {}", status, offset),
            ));
        }

        let bytes = response
            .bytes()
            .map_err(|e| ElevationError::unavailable(&self.url, e))?;

        // A server ignoring the Range header answers 200 with the full body.
        let window = if status == reqwest::StatusCode::PARTIAL_CONTENT {
            &bytes[..]
        } else {
            let start = usize::try_from(offset).unwrap_or(usize::MAX);
            bytes.get(start..).unwrap_or(&[])
        };

        if window.len() < length {
            return Err(ElevationError::unavailable(
                &self.url,
                format!(
                    "short range read: wanted {} bytes at offset {}, got {}",
                    length,
                    offset,
                    window.len()
                ),
            ));
        }

        Ok(window[..length].to_vec())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.url
    }

    fn is_remote(&self) -> bool {
        true
    }
}

/// Open a range source for a dataset locator.
///
/// `http://` and `https://` locators are read remotely (requires the `http`
/// feature), a `file://` prefix is stripped, and anything else is treated as
/// a local path.
pub fn open_source(locator: &str) -> Result<Box<dyn RangeSource>> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        open_remote(locator)
    } else {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        Ok(Box::new(LocalSource::open(path)?))
    }
}

#[cfg(feature = "http")]
fn open_remote(locator: &str) -> Result<Box<dyn RangeSource>> {
    Ok(Box::new(HttpSource::open(locator)?))
}

#[cfg(not(feature = "http"))]
fn open_remote(locator: &str) -> Result<Box<dyn RangeSource>> {
    Err(ElevationError::unavailable(
        locator,
        "remote datasets require the `http` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_local_range_reads() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();

        let source = LocalSource::open(file.path()).unwrap();
        assert_eq!(source.size(), 13);
        assert!(!source.is_remote());

        assert_eq!(source.read_range(0, 5).unwrap(), b"Hello");
        assert_eq!(source.read_range(7, 5).unwrap(), b"World");
    }

    #[test]
    fn test_local_read_past_end() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"short").unwrap();

        let source = LocalSource::open(file.path()).unwrap();
        let result = source.read_range(3, 10);
        assert!(matches!(
            result,
            Err(ElevationError::DatasetUnavailable { .. })
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let result = open_source("/definitely/not/here/dtm.tif");
        match result {
            Err(ElevationError::DatasetUnavailable { locator, .. }) => {
                assert_eq!(locator, "/definitely/not/here/dtm.tif");
            }
            _ => panic!("Expected DatasetUnavailable error"),
        }
    }

    #[cfg(feature = "http")]
    mod http {
        use super::*;
        use crate::testutil::{ServeMode, TestServer};

        const BODY: &[u8] = b"Hello, World!";

        #[test]
        fn test_http_range_reads() {
            let server = TestServer::start(
                BODY.to_vec(),
                ServeMode {
                    honour_range: true,
                    head_length: true,
                },
            );

            let source = HttpSource::open(server.url()).unwrap();
            assert_eq!(source.size(), 13);
            assert!(source.is_remote());
            assert_eq!(source.identifier(), server.url());

            assert_eq!(source.read_range(7, 5).unwrap(), b"World");
            assert_eq!(server.served(), 5);
            assert!(source.read_range(0, 0).unwrap().is_empty());
        }

        #[test]
        fn test_http_size_from_content_range() {
            let server = TestServer::start(
                BODY.to_vec(),
                ServeMode {
                    honour_range: true,
                    head_length: false,
                },
            );

            let source = HttpSource::open(server.url()).unwrap();
            assert_eq!(source.size(), 13);
            assert_eq!(source.read_range(0, 5).unwrap(), b"Hello");
        }

        #[test]
        fn test_http_full_body_answer_is_sliced() {
            let server = TestServer::start(
                BODY.to_vec(),
                ServeMode {
                    honour_range: false,
                    head_length: true,
                },
            );

            let source = open_source(server.url()).unwrap();
            assert!(source.is_remote());
            assert_eq!(source.read_range(7, 5).unwrap(), b"World");
            assert_eq!(source.read_range(0, 5).unwrap(), b"Hello");

            // Past the end of what the server holds
            assert!(matches!(
                source.read_range(10, 5),
                Err(ElevationError::DatasetUnavailable { .. })
            ));
        }

        #[test]
        fn test_http_unknown_size() {
            let server = TestServer::start(
                BODY.to_vec(),
                ServeMode {
                    honour_range: false,
                    head_length: false,
                },
            );

            assert!(matches!(
                HttpSource::open(server.url()),
                Err(ElevationError::DatasetUnavailable { .. })
            ));
        }
    }

    #[test]
    fn test_file_url_prefix_is_stripped() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        let locator = format!("file://{}", file.path().display());
        let source = open_source(&locator).unwrap();
        assert_eq!(source.size(), 3);
    }
}
