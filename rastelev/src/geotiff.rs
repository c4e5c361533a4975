//! GeoTIFF metadata parsing and chunk decoding over a [`RangeSource`].
//!
//! Only the first image file directory (the full-resolution image) is read.
//! Opening a dataset costs a header read, an IFD read and a few tag-array
//! reads; pixel data is fetched one chunk (tile or strip) at a time.
//!
//! Supported layouts:
//!
//! - Classic TIFF and BigTIFF, little- and big-endian
//! - Tiled and stripped images, chunky or planar sample layout
//! - No compression, LZW and Deflate
//! - Predictor 1 (none), 2 (horizontal differencing) and 3 (floating point)
//! - 8/16/32-bit integers and 32/64-bit floats
//!
//! Only the first band is decoded.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{ElevationError, Result};
use crate::source::RangeSource;

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_PLANAR_CONFIGURATION: u16 = 284;
const TAG_PREDICTOR: u16 = 317;
const TAG_TILE_WIDTH: u16 = 322;
const TAG_TILE_LENGTH: u16 = 323;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_TILE_BYTE_COUNTS: u16 = 325;
const TAG_SAMPLE_FORMAT: u16 = 339;
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const GEO_KEY_RASTER_TYPE: u16 = 1025;
const GEO_KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const GEO_KEY_PROJECTED_CS_TYPE: u16 = 3072;
const GEO_KEY_USER_DEFINED: u16 = 32767;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Upper bound on entries in a single IFD, guards against garbage headers.
const MAX_IFD_ENTRIES: u64 = 4096;

/// Pixel sample type, from `BitsPerSample` and `SampleFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    UInt8,
    UInt16,
    UInt32,
    Int8,
    Int16,
    Int32,
    Float32,
    Float64,
}

impl SampleType {
    fn from_tags(bits_per_sample: u64, sample_format: u64) -> Option<Self> {
        match (sample_format, bits_per_sample) {
            (1, 8) => Some(SampleType::UInt8),
            (1, 16) => Some(SampleType::UInt16),
            (1, 32) => Some(SampleType::UInt32),
            (2, 8) => Some(SampleType::Int8),
            (2, 16) => Some(SampleType::Int16),
            (2, 32) => Some(SampleType::Int32),
            (3, 32) => Some(SampleType::Float32),
            (3, 64) => Some(SampleType::Float64),
            _ => None,
        }
    }

    /// Size of one sample in bytes.
    pub fn bytes(&self) -> usize {
        match self {
            SampleType::UInt8 | SampleType::Int8 => 1,
            SampleType::UInt16 | SampleType::Int16 => 2,
            SampleType::UInt32 | SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
        }
    }

    /// Interpret the low bits of `bits` as a sample of this type.
    fn to_f32(self, bits: u64) -> f32 {
        match self {
            SampleType::UInt8 => bits as u8 as f32,
            SampleType::UInt16 => bits as u16 as f32,
            SampleType::UInt32 => bits as u32 as f32,
            SampleType::Int8 => bits as u8 as i8 as f32,
            SampleType::Int16 => bits as u16 as i16 as f32,
            SampleType::Int32 => bits as u32 as i32 as f32,
            SampleType::Float32 => f32::from_bits(bits as u32),
            SampleType::Float64 => f64::from_bits(bits) as f32,
        }
    }
}

/// Chunk compression scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
    Deflate,
}

impl Compression {
    fn from_tag(value: u64) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            8 | 32946 => Some(Compression::Deflate),
            _ => None,
        }
    }
}

/// Axis-aligned mapping between pixel space and the raster's native CRS.
///
/// `origin_x`/`origin_y` is the outer corner of pixel (0, 0). Column `c`
/// starts at `origin_x + c * pixel_width`, row `r` starts at
/// `origin_y - r * pixel_height` (north-up rasters have a positive
/// `pixel_height`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoReference {
    /// Fractional pixel position of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (self.origin_y - y) / self.pixel_height,
        )
    }

    /// World coordinate of a fractional pixel position.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y - row * self.pixel_height,
        )
    }
}

/// Metadata of the full-resolution image.
#[derive(Debug, Clone)]
pub struct GeoTiffMetadata {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Chunk width (tile width, or image width for strips).
    pub chunk_width: usize,
    /// Chunk height (tile height, or rows per strip).
    pub chunk_height: usize,
    /// Chunks per row of chunks.
    pub chunks_across: usize,
    /// Rows of chunks.
    pub chunks_down: usize,
    /// Tiled (true) or stripped (false) layout.
    pub tiled: bool,
    pub samples_per_pixel: usize,
    /// Samples of all bands interleaved per pixel (`PlanarConfiguration` 1).
    pub chunky: bool,
    pub sample_type: SampleType,
    pub compression: Compression,
    pub predictor: u16,
    pub little_endian: bool,
    pub bigtiff: bool,
    chunk_offsets: Vec<u64>,
    chunk_byte_counts: Vec<u64>,
    /// Pixel to world mapping.
    pub georef: GeoReference,
    /// EPSG code from the GeoKey directory, if any.
    pub epsg: Option<u16>,
    /// `GDAL_NODATA` value, if any.
    pub nodata: Option<f64>,
}

/// A raw IFD entry. `value` holds the inline value field (4 bytes for
/// classic TIFF, 8 for BigTIFF).
#[derive(Debug, Clone)]
struct IfdEntry {
    field_type: u16,
    count: u64,
    value: [u8; 8],
}

#[derive(Debug, Clone, Copy)]
struct ByteOrder {
    little: bool,
}

impl ByteOrder {
    fn u16(&self, b: &[u8]) -> u16 {
        let a = [b[0], b[1]];
        if self.little {
            u16::from_le_bytes(a)
        } else {
            u16::from_be_bytes(a)
        }
    }

    fn u32(&self, b: &[u8]) -> u32 {
        let a = [b[0], b[1], b[2], b[3]];
        if self.little {
            u32::from_le_bytes(a)
        } else {
            u32::from_be_bytes(a)
        }
    }

    fn u64(&self, b: &[u8]) -> u64 {
        let a = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        if self.little {
            u64::from_le_bytes(a)
        } else {
            u64::from_be_bytes(a)
        }
    }

    /// Read one sample of `size` bytes as raw bits.
    fn bits(&self, b: &[u8], size: usize) -> u64 {
        match size {
            1 => u64::from(b[0]),
            2 => u64::from(self.u16(b)),
            4 => u64::from(self.u32(b)),
            _ => self.u64(b),
        }
    }
}

fn field_type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 | 16 | 17 | 18 => Some(8),
        _ => None,
    }
}

/// Reads tag values for one IFD.
struct TagReader<'a> {
    source: &'a dyn RangeSource,
    order: ByteOrder,
    inline_capacity: usize,
    offset_size: usize,
    entries: HashMap<u16, IfdEntry>,
}

impl<'a> TagReader<'a> {
    fn unavailable(&self, reason: impl ToString) -> ElevationError {
        ElevationError::unavailable(self.source.identifier(), reason)
    }

    fn raw(&self, tag: u16) -> Result<Option<(u16, u64, Vec<u8>)>> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(None);
        };
        let size = field_type_size(entry.field_type)
            .ok_or_else(|| self.unavailable(format!("tag {} has unknown type", tag)))?;
        let total = usize::try_from(entry.count)
            .ok()
            .and_then(|c| c.checked_mul(size))
            .ok_or_else(|| self.unavailable(format!("tag {} is too large", tag)))?;

        let bytes = if total <= self.inline_capacity {
            entry.value[..total].to_vec()
        } else {
            let offset = self.order.bits(&entry.value, self.offset_size);
            self.source.read_range(offset, total)?
        };
        Ok(Some((entry.field_type, entry.count, bytes)))
    }

    fn u64_values(&self, tag: u16) -> Result<Option<Vec<u64>>> {
        let Some((field_type, count, bytes)) = self.raw(tag)? else {
            return Ok(None);
        };
        let size = match field_type {
            1 => 1,
            3 => 2,
            4 => 4,
            16 => 8,
            other => {
                return Err(self.unavailable(format!(
                    "tag {} has non-integer type {}",
                    tag, other
                )))
            }
        };
        Ok(Some(
            (0..count as usize)
                .map(|i| self.order.bits(&bytes[i * size..], size))
                .collect(),
        ))
    }

    fn u64_value(&self, tag: u16) -> Result<Option<u64>> {
        Ok(self.u64_values(tag)?.and_then(|v| v.first().copied()))
    }

    fn f64_values(&self, tag: u16) -> Result<Option<Vec<f64>>> {
        let Some((field_type, count, bytes)) = self.raw(tag)? else {
            return Ok(None);
        };
        let values = match field_type {
            12 => (0..count as usize)
                .map(|i| f64::from_bits(self.order.u64(&bytes[i * 8..])))
                .collect(),
            11 => (0..count as usize)
                .map(|i| f64::from(f32::from_bits(self.order.u32(&bytes[i * 4..]))))
                .collect(),
            other => {
                return Err(self.unavailable(format!(
                    "tag {} has non-floating type {}",
                    tag, other
                )))
            }
        };
        Ok(Some(values))
    }

    fn ascii(&self, tag: u16) -> Result<Option<String>> {
        let Some((_, _, bytes)) = self.raw(tag)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        Ok(Some(text.trim_end_matches('\0').trim().to_string()))
    }
}

impl GeoTiffMetadata {
    /// Read the header and first IFD of a GeoTIFF.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::DatasetUnavailable`] if the source is not a
    /// TIFF, uses an unsupported encoding, or carries no georeferencing.
    pub fn read(source: &dyn RangeSource) -> Result<Self> {
        let id = source.identifier().to_string();
        let unavailable = |reason: String| ElevationError::unavailable(&id, reason);

        if source.size() < 8 {
            return Err(unavailable("file too small to be a TIFF".to_string()));
        }
        let header = source.read_range(0, source.size().min(16) as usize)?;

        let little = match &header[0..2] {
            b"II" => true,
            b"MM" => false,
            _ => return Err(unavailable("not a TIFF file".to_string())),
        };
        let order = ByteOrder { little };

        let (bigtiff, ifd_offset) = match order.u16(&header[2..4]) {
            42 => (false, u64::from(order.u32(&header[4..8]))),
            43 if header.len() >= 16 => (true, order.u64(&header[8..16])),
            version => return Err(unavailable(format!("unsupported TIFF version {}", version))),
        };

        let (count_size, entry_size, inline_capacity, offset_size) = if bigtiff {
            (8, 20, 8, 8)
        } else {
            (2, 12, 4, 4)
        };

        let count_bytes = source.read_range(ifd_offset, count_size)?;
        let entry_count = order.bits(&count_bytes, count_size);
        if entry_count == 0 || entry_count > MAX_IFD_ENTRIES {
            return Err(unavailable(format!("implausible IFD entry count {}", entry_count)));
        }

        let ifd = source.read_range(
            ifd_offset + count_size as u64,
            entry_count as usize * entry_size,
        )?;

        let mut entries = HashMap::with_capacity(entry_count as usize);
        for raw in ifd.chunks_exact(entry_size) {
            let tag = order.u16(&raw[0..2]);
            let field_type = order.u16(&raw[2..4]);
            let (count, value_bytes) = if bigtiff {
                (order.u64(&raw[4..12]), &raw[12..20])
            } else {
                (u64::from(order.u32(&raw[4..8])), &raw[8..12])
            };
            let mut value = [0u8; 8];
            value[..value_bytes.len()].copy_from_slice(value_bytes);
            entries.insert(
                tag,
                IfdEntry {
                    field_type,
                    count,
                    value,
                },
            );
        }

        let tags = TagReader {
            source,
            order,
            inline_capacity,
            offset_size,
            entries,
        };

        let width = tags
            .u64_value(TAG_IMAGE_WIDTH)?
            .ok_or_else(|| unavailable("missing ImageWidth".to_string()))? as usize;
        let height = tags
            .u64_value(TAG_IMAGE_LENGTH)?
            .ok_or_else(|| unavailable("missing ImageLength".to_string()))? as usize;
        if width == 0 || height == 0 {
            return Err(unavailable(format!("empty image {}x{}", width, height)));
        }

        let bits_per_sample = tags.u64_value(TAG_BITS_PER_SAMPLE)?.unwrap_or(1);
        let sample_format = tags.u64_value(TAG_SAMPLE_FORMAT)?.unwrap_or(1);
        let sample_type = SampleType::from_tags(bits_per_sample, sample_format).ok_or_else(|| {
            unavailable(format!(
                "unsupported sample type: {} bits, format {}",
                bits_per_sample, sample_format
            ))
        })?;

        let compression_tag = tags.u64_value(TAG_COMPRESSION)?.unwrap_or(1);
        let compression = Compression::from_tag(compression_tag)
            .ok_or_else(|| unavailable(format!("unsupported compression {}", compression_tag)))?;

        let predictor = tags.u64_value(TAG_PREDICTOR)?.unwrap_or(1) as u16;
        if !(1..=3).contains(&predictor) {
            return Err(unavailable(format!("unsupported predictor {}", predictor)));
        }

        let samples_per_pixel = tags.u64_value(TAG_SAMPLES_PER_PIXEL)?.unwrap_or(1).max(1) as usize;
        let chunky = tags.u64_value(TAG_PLANAR_CONFIGURATION)?.unwrap_or(1) != 2;

        let tiled = tags.entries.contains_key(&TAG_TILE_OFFSETS);
        let (chunk_width, chunk_height, offsets_tag, counts_tag) = if tiled {
            let tw = tags
                .u64_value(TAG_TILE_WIDTH)?
                .ok_or_else(|| unavailable("missing TileWidth".to_string()))?;
            let th = tags
                .u64_value(TAG_TILE_LENGTH)?
                .ok_or_else(|| unavailable("missing TileLength".to_string()))?;
            (tw as usize, th as usize, TAG_TILE_OFFSETS, TAG_TILE_BYTE_COUNTS)
        } else if tags.entries.contains_key(&TAG_STRIP_OFFSETS) {
            let rows = tags
                .u64_value(TAG_ROWS_PER_STRIP)?
                .unwrap_or(height as u64)
                .min(height as u64);
            (width, rows as usize, TAG_STRIP_OFFSETS, TAG_STRIP_BYTE_COUNTS)
        } else {
            return Err(unavailable("neither tile nor strip offsets present".to_string()));
        };
        if chunk_width == 0 || chunk_height == 0 {
            return Err(unavailable("zero chunk dimensions".to_string()));
        }

        let chunks_across = width.div_ceil(chunk_width);
        let chunks_down = height.div_ceil(chunk_height);

        let chunk_offsets = tags
            .u64_values(offsets_tag)?
            .ok_or_else(|| unavailable("missing chunk offsets".to_string()))?;
        let chunk_byte_counts = tags
            .u64_values(counts_tag)?
            .ok_or_else(|| unavailable("missing chunk byte counts".to_string()))?;
        let band_chunks = chunks_across * chunks_down;
        if chunk_offsets.len() < band_chunks || chunk_byte_counts.len() < band_chunks {
            return Err(unavailable(format!(
                "expected {} chunks, found {} offsets and {} byte counts",
                band_chunks,
                chunk_offsets.len(),
                chunk_byte_counts.len()
            )));
        }

        let geokeys = read_geokeys(&tags)?;
        let pixel_is_point = geokeys.get(&GEO_KEY_RASTER_TYPE) == Some(&RASTER_PIXEL_IS_POINT);
        let epsg = [GEO_KEY_PROJECTED_CS_TYPE, GEO_KEY_GEOGRAPHIC_TYPE]
            .iter()
            .filter_map(|key| geokeys.get(key).copied())
            .find(|&code| code != 0 && code != GEO_KEY_USER_DEFINED);

        let mut georef = read_georeference(&tags)?
            .ok_or_else(|| unavailable("no georeferencing tags".to_string()))?;
        if pixel_is_point {
            // Tiepoints address pixel centres; move the origin to the corner.
            georef.origin_x -= georef.pixel_width / 2.0;
            georef.origin_y += georef.pixel_height / 2.0;
        }

        let nodata = tags
            .ascii(TAG_GDAL_NODATA)?
            .and_then(|s| s.parse::<f64>().ok());

        Ok(Self {
            width,
            height,
            chunk_width,
            chunk_height,
            chunks_across,
            chunks_down,
            tiled,
            samples_per_pixel,
            chunky,
            sample_type,
            compression,
            predictor,
            little_endian: little,
            bigtiff,
            chunk_offsets,
            chunk_byte_counts,
            georef,
            epsg,
            nodata,
        })
    }

    /// Number of chunks holding the first band.
    pub fn chunk_count(&self) -> usize {
        self.chunks_across * self.chunks_down
    }

    /// Locate a pixel: `(chunk index, offset of the pixel within the chunk)`.
    pub fn locate(&self, col: usize, row: usize) -> (usize, usize) {
        let chunk = (row / self.chunk_height) * self.chunks_across + col / self.chunk_width;
        let local = (row % self.chunk_height) * self.chunk_width + col % self.chunk_width;
        (chunk, local)
    }

    /// Rows actually stored in a chunk (the last strip may be short).
    fn chunk_rows(&self, index: usize) -> usize {
        if self.tiled {
            self.chunk_height
        } else {
            let start = (index / self.chunks_across) * self.chunk_height;
            self.chunk_height.min(self.height - start)
        }
    }

    /// Samples per pixel as stored inside one chunk.
    fn chunk_stride(&self) -> usize {
        if self.chunky {
            self.samples_per_pixel
        } else {
            1
        }
    }

    /// Fetch and decode one chunk, returning first-band values row-major
    /// with `chunk_width` values per row.
    pub fn read_chunk(&self, source: &dyn RangeSource, index: usize) -> Result<Vec<f32>> {
        let rows = self.chunk_rows(index);
        let stride = self.chunk_stride();
        let bytes_per_sample = self.sample_type.bytes();
        let row_samples = self.chunk_width * stride;
        let expected = rows * row_samples * bytes_per_sample;

        let offset = self.chunk_offsets[index];
        let byte_count = self.chunk_byte_counts[index] as usize;

        if byte_count == 0 {
            // Sparse chunk: GDAL leaves never-written chunks empty.
            let fill = self.nodata.map(|v| v as f32).unwrap_or(f32::NAN);
            return Ok(vec![fill; self.chunk_width * rows]);
        }

        let compressed = source.read_range(offset, byte_count)?;
        let mut data = decompress(&compressed, self.compression, expected)
            .map_err(|e| ElevationError::unavailable(source.identifier(), e))?;
        if data.len() < expected {
            return Err(ElevationError::unavailable(
                source.identifier(),
                format!(
                    "chunk {} decoded to {} bytes, expected {}",
                    index,
                    data.len(),
                    expected
                ),
            ));
        }
        // Strip trailing padding
        data.truncate(expected);

        let order = ByteOrder {
            little: self.little_endian,
        };
        let mut values = Vec::with_capacity(self.chunk_width * rows);

        for row in data.chunks_exact_mut(row_samples * bytes_per_sample) {
            let bits: Vec<u64> = match self.predictor {
                3 => undo_float_predictor(row, stride, bytes_per_sample),
                2 => {
                    let mut bits: Vec<u64> = row
                        .chunks_exact(bytes_per_sample)
                        .map(|b| order.bits(b, bytes_per_sample))
                        .collect();
                    undo_horizontal_predictor(&mut bits, stride, bytes_per_sample);
                    bits
                }
                _ => row
                    .chunks_exact(bytes_per_sample)
                    .map(|b| order.bits(b, bytes_per_sample))
                    .collect(),
            };

            values.extend(
                bits.iter()
                    .step_by(stride)
                    .map(|&b| self.sample_type.to_f32(b)),
            );
        }

        Ok(values)
    }
}

fn read_geokeys(tags: &TagReader<'_>) -> Result<HashMap<u16, u16>> {
    let mut keys = HashMap::new();
    let Some(directory) = tags.u64_values(TAG_GEO_KEY_DIRECTORY)? else {
        return Ok(keys);
    };
    if directory.len() < 4 {
        return Ok(keys);
    }

    let count = directory[3] as usize;
    for key in directory[4..].chunks_exact(4).take(count) {
        // Location 0 means the value is stored inline in the fourth short.
        if key[1] == 0 {
            keys.insert(key[0] as u16, key[3] as u16);
        }
    }
    Ok(keys)
}

fn read_georeference(tags: &TagReader<'_>) -> Result<Option<GeoReference>> {
    let unavailable = |reason: &str| tags.unavailable(reason);

    if let Some(m) = tags.f64_values(TAG_MODEL_TRANSFORMATION)? {
        if m.len() < 8 {
            return Err(unavailable("truncated ModelTransformation"));
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err(unavailable("rotated rasters are not supported"));
        }
        if m[0] == 0.0 || m[5] == 0.0 {
            return Err(unavailable("degenerate ModelTransformation"));
        }
        return Ok(Some(GeoReference {
            origin_x: m[3],
            origin_y: m[7],
            pixel_width: m[0],
            pixel_height: -m[5],
        }));
    }

    let scale = tags.f64_values(TAG_MODEL_PIXEL_SCALE)?;
    let tiepoint = tags.f64_values(TAG_MODEL_TIEPOINT)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            if scale[0] == 0.0 || scale[1] == 0.0 {
                return Err(unavailable("zero pixel scale"));
            }
            Ok(Some(GeoReference {
                origin_x: tie[3] - tie[0] * scale[0],
                origin_y: tie[4] + tie[1] * scale[1],
                pixel_width: scale[0],
                pixel_height: scale[1],
            }))
        }
        _ => Ok(None),
    }
}

fn decompress(
    data: &[u8],
    compression: Compression,
    expected: usize,
) -> std::result::Result<Vec<u8>, String> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Deflate => {
            let mut decoder = flate2::read::ZlibDecoder::new(data);
            let mut out = Vec::with_capacity(expected);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| format!("deflate: {}", e))?;
            Ok(out)
        }
        Compression::Lzw => {
            let mut decoder =
                weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            decoder.decode(data).map_err(|e| format!("lzw: {}", e))
        }
    }
}

/// Reverse predictor 2 on one row of samples. Differences are taken per
/// sample (not per byte) with wrapping at the sample width.
fn undo_horizontal_predictor(bits: &mut [u64], stride: usize, bytes_per_sample: usize) {
    let mask = if bytes_per_sample >= 8 {
        u64::MAX
    } else {
        (1u64 << (bytes_per_sample * 8)) - 1
    };
    for i in stride..bits.len() {
        bits[i] = bits[i].wrapping_add(bits[i - stride]) & mask;
    }
}

/// Reverse predictor 3 on one row. The row holds byte-differenced planes,
/// most significant byte first, independent of the file byte order.
fn undo_float_predictor(row: &mut [u8], stride: usize, bytes_per_sample: usize) -> Vec<u64> {
    for i in stride..row.len() {
        row[i] = row[i].wrapping_add(row[i - stride]);
    }

    let samples = row.len() / bytes_per_sample;
    (0..samples)
        .map(|s| {
            (0..bytes_per_sample).fold(0u64, |acc, plane| {
                (acc << 8) | u64::from(row[plane * samples + s])
            })
        })
        .collect()
}
