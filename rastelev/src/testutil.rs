//! Synthetic GeoTIFF writer for tests.

use std::io::Write;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy)]
pub(crate) enum TestLayout {
    Strips(usize),
    Tiles(usize, usize),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum TestCompression {
    None,
    Deflate,
    Lzw,
}

/// A single-band little-endian GeoTIFF, float32 unless `int16()` is set.
pub(crate) struct TestRaster {
    width: usize,
    height: usize,
    values: Vec<f32>,
    origin: (f64, f64),
    pixel_size: (f64, f64),
    epsg: Option<u16>,
    nodata: Option<f64>,
    layout: TestLayout,
    compression: TestCompression,
    int16: bool,
    predictor: bool,
    pixel_is_point: bool,
    georeferenced: bool,
}

impl TestRaster {
    /// `values` are row-major, north row first. Defaults: origin `(0, height)`,
    /// 1×1 pixels, EPSG:2056, one strip, uncompressed.
    pub(crate) fn new(width: usize, height: usize, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
            origin: (0.0, height as f64),
            pixel_size: (1.0, 1.0),
            epsg: Some(2056),
            nodata: None,
            layout: TestLayout::Strips(height),
            compression: TestCompression::None,
            int16: false,
            predictor: false,
            pixel_is_point: false,
            georeferenced: true,
        }
    }

    pub(crate) fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin = (x, y);
        self
    }

    pub(crate) fn pixel_size(mut self, width: f64, height: f64) -> Self {
        self.pixel_size = (width, height);
        self
    }

    pub(crate) fn epsg(mut self, code: u16) -> Self {
        self.epsg = Some(code);
        self
    }

    pub(crate) fn without_crs(mut self) -> Self {
        self.epsg = None;
        self
    }

    pub(crate) fn nodata(mut self, value: f64) -> Self {
        self.nodata = Some(value);
        self
    }

    pub(crate) fn layout(mut self, layout: TestLayout) -> Self {
        self.layout = layout;
        self
    }

    pub(crate) fn compression(mut self, compression: TestCompression) -> Self {
        self.compression = compression;
        self
    }

    pub(crate) fn int16(mut self) -> Self {
        self.int16 = true;
        self
    }

    pub(crate) fn predictor(mut self) -> Self {
        self.predictor = true;
        self
    }

    pub(crate) fn pixel_is_point(mut self) -> Self {
        self.pixel_is_point = true;
        self
    }

    pub(crate) fn without_georeference(mut self) -> Self {
        self.georeferenced = false;
        self
    }

    pub(crate) fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.encode()).unwrap();
        file.flush().unwrap();
        file
    }

    fn chunk_geometry(&self) -> (usize, usize, usize, usize) {
        match self.layout {
            TestLayout::Strips(rows) => {
                let rows = rows.min(self.height);
                (self.width, rows, 1, self.height.div_ceil(rows))
            }
            TestLayout::Tiles(tw, th) => (
                tw,
                th,
                self.width.div_ceil(tw),
                self.height.div_ceil(th),
            ),
        }
    }

    fn encode_chunk(&self, chunk_col: usize, chunk_row: usize) -> Vec<u8> {
        let (cw, ch, _, _) = self.chunk_geometry();
        let rows = match self.layout {
            TestLayout::Strips(_) => ch.min(self.height - chunk_row * ch),
            TestLayout::Tiles(..) => ch,
        };
        let mask: u64 = if self.int16 { 0xFFFF } else { 0xFFFF_FFFF };

        let mut raw = Vec::new();
        for r in 0..rows {
            let y = chunk_row * ch + r;
            let mut bits: Vec<u64> = (0..cw)
                .map(|c| {
                    let x = chunk_col * cw + c;
                    let v = if x < self.width && y < self.height {
                        self.values[y * self.width + x]
                    } else {
                        0.0
                    };
                    if self.int16 {
                        u64::from(v as i16 as u16)
                    } else {
                        u64::from(v.to_bits())
                    }
                })
                .collect();
            if self.predictor {
                for i in (1..bits.len()).rev() {
                    bits[i] = bits[i].wrapping_sub(bits[i - 1]) & mask;
                }
            }
            for b in bits {
                if self.int16 {
                    raw.extend_from_slice(&(b as u16).to_le_bytes());
                } else {
                    raw.extend_from_slice(&(b as u32).to_le_bytes());
                }
            }
        }

        match self.compression {
            TestCompression::None => raw,
            TestCompression::Deflate => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&raw).unwrap();
                encoder.finish().unwrap()
            }
            TestCompression::Lzw => {
                weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                    .encode(&raw)
                    .unwrap()
            }
        }
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let (cw, ch, across, down) = self.chunk_geometry();
        let mut chunks = Vec::with_capacity(across * down);
        for row in 0..down {
            for col in 0..across {
                chunks.push(self.encode_chunk(col, row));
            }
        }

        let (offsets_tag, counts_tag) = match self.layout {
            TestLayout::Strips(_) => (273u16, 279u16),
            TestLayout::Tiles(..) => (324u16, 325u16),
        };

        let mut entries: Vec<Entry> = vec![
            Entry::long(256, &[self.width as u32]),
            Entry::long(257, &[self.height as u32]),
            Entry::short(258, &[if self.int16 { 16 } else { 32 }]),
            Entry::short(
                259,
                &[match self.compression {
                    TestCompression::None => 1,
                    TestCompression::Lzw => 5,
                    TestCompression::Deflate => 8,
                }],
            ),
            Entry::short(262, &[1]),
            Entry::short(277, &[1]),
            Entry::short(284, &[1]),
            Entry::short(317, &[if self.predictor { 2 } else { 1 }]),
            Entry::short(339, &[if self.int16 { 2 } else { 3 }]),
            Entry::long(offsets_tag, &vec![0; chunks.len()]),
            Entry::long(
                counts_tag,
                &chunks.iter().map(|c| c.len() as u32).collect::<Vec<_>>(),
            ),
        ];

        match self.layout {
            TestLayout::Strips(_) => entries.push(Entry::long(278, &[ch as u32])),
            TestLayout::Tiles(..) => {
                entries.push(Entry::long(322, &[cw as u32]));
                entries.push(Entry::long(323, &[ch as u32]));
            }
        }

        if self.georeferenced {
            entries.push(Entry::double(
                33550,
                &[self.pixel_size.0, self.pixel_size.1, 0.0],
            ));
            entries.push(Entry::double(
                33922,
                &[0.0, 0.0, 0.0, self.origin.0, self.origin.1, 0.0],
            ));
        }

        let mut keys: Vec<[u16; 4]> = Vec::new();
        let geographic = matches!(self.epsg, Some(code) if (4000..5000).contains(&code));
        keys.push([1024, 0, 1, if geographic { 2 } else { 1 }]);
        keys.push([1025, 0, 1, if self.pixel_is_point { 2 } else { 1 }]);
        if let Some(code) = self.epsg {
            keys.push([if geographic { 2048 } else { 3072 }, 0, 1, code]);
        }
        let mut directory = vec![1, 1, 0, keys.len() as u16];
        directory.extend(keys.iter().flatten());
        entries.push(Entry::short(34735, &directory));

        if let Some(nodata) = self.nodata {
            entries.push(Entry::ascii(42113, &nodata.to_string()));
        }

        entries.sort_by_key(|e| e.tag);

        // Layout: header | IFD | out-of-line tag values | chunk data
        let ifd_size = 2 + entries.len() * 12 + 4;
        let mut cursor = 8 + ifd_size;
        let mut positions = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.data.len() > 4 {
                cursor += cursor % 2;
                positions.push(Some(cursor));
                cursor += entry.data.len();
            } else {
                positions.push(None);
            }
        }

        let mut chunk_offsets = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            chunk_offsets.push(cursor as u32);
            cursor += chunk.len();
        }
        if let Some(entry) = entries.iter_mut().find(|e| e.tag == offsets_tag) {
            *entry = Entry::long(offsets_tag, &chunk_offsets);
        }

        let mut out = Vec::with_capacity(cursor);
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (entry, position) in entries.iter().zip(&positions) {
            out.extend_from_slice(&entry.tag.to_le_bytes());
            out.extend_from_slice(&entry.field_type.to_le_bytes());
            out.extend_from_slice(&entry.count.to_le_bytes());
            match position {
                Some(pos) => out.extend_from_slice(&(*pos as u32).to_le_bytes()),
                None => {
                    let mut inline = [0u8; 4];
                    inline[..entry.data.len()].copy_from_slice(&entry.data);
                    out.extend_from_slice(&inline);
                }
            }
        }
        out.extend_from_slice(&0u32.to_le_bytes());

        for (entry, position) in entries.iter().zip(&positions) {
            if let Some(pos) = position {
                out.resize(*pos, 0);
                out.extend_from_slice(&entry.data);
            }
        }
        for (chunk, offset) in chunks.iter().zip(&chunk_offsets) {
            out.resize(*offset as usize, 0);
            out.extend_from_slice(chunk);
        }
        out
    }
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn short(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            field_type: 3,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn long(tag: u16, values: &[u32]) -> Self {
        Self {
            tag,
            field_type: 4,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn double(tag: u16, values: &[f64]) -> Self {
        Self {
            tag,
            field_type: 12,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            field_type: 2,
            count: data.len() as u32,
            data,
        }
    }
}

#[cfg(feature = "http")]
pub(crate) use server::{ServeMode, TestServer};

#[cfg(feature = "http")]
mod server {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// A one-file HTTP/1.1 server on `127.0.0.1`, closing each connection after
    /// one response.
    pub(crate) struct TestServer {
        url: String,
        served: Arc<AtomicU64>,
    }

    #[derive(Debug, Clone, Copy)]
    pub(crate) struct ServeMode {
        /// Answer `Range` requests with `206 Partial Content`; otherwise every
        /// `GET` gets `200` with the whole file.
        pub honour_range: bool,
        /// Send `Content-Length` on `HEAD`.
        pub head_length: bool,
    }

    impl TestServer {
        pub(crate) fn start(body: Vec<u8>, mode: ServeMode) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}/dtm.tif", listener.local_addr().unwrap());
            let served = Arc::new(AtomicU64::new(0));

            let counter = Arc::clone(&served);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { continue };
                    respond(stream, &body, mode, &counter);
                }
            });

            Self { url, served }
        }

        pub(crate) fn url(&self) -> &str {
            &self.url
        }

        /// Body bytes sent so far.
        pub(crate) fn served(&self) -> u64 {
            self.served.load(Ordering::SeqCst)
        }
    }

    fn respond(mut stream: TcpStream, body: &[u8], mode: ServeMode, served: &AtomicU64) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let request = String::from_utf8_lossy(&request);
        let is_head = request.starts_with("HEAD ");
        let range = request.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if !name.trim().eq_ignore_ascii_case("range") {
                return None;
            }
            let (start, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
            Some((start.parse::<usize>().ok()?, end.parse::<usize>().ok()?))
        });

        let total = body.len();
        let (head, payload): (String, &[u8]) = if is_head {
            let length = if mode.head_length {
                format!("Content-Length: {}\r\n", total)
            } else {
                String::new()
            };
            (format!("HTTP/1.1 200 OK\r\n{}", length), &body[..0])
        } else {
            match range {
                Some((start, end)) if mode.honour_range && start < total => {
                    let end = end.min(total - 1);
                    let slice = &body[start..=end];
                    (
                        format!(
                            "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n",
                            start,
                            end,
                            total,
                            slice.len()
                        ),
                        slice,
                    )
                }
                _ => (
                    format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n", total),
                    body,
                ),
            }
        };

        served.fetch_add(payload.len() as u64, Ordering::SeqCst);
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(b"Connection: close\r\n\r\n");
        let _ = stream.write_all(payload);
        let _ = stream.flush();
    }
}
