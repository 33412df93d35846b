//! Strip/tile decoding for pages with several samples per pixel.
//!
//! The `tiff` decoder only assembles gray (one sample) and RGB/CMYK images,
//! while multispectral scenes are stored as one MinIsBlack page holding N
//! samples, pixel-interleaved (chunky) or band-sequential (planar). Those
//! pages are decoded here straight from their chunks.
//!
//! Supports DEFLATE (via `flate2`), LZW (via `weezl`) and uncompressed
//! chunks, with horizontal or floating-point prediction.

use crate::error::{Error, Result};
use crate::raster::SampleFormat;
use ndarray::Array2;
use std::io::{Read, Seek};
use tiff::decoder::ifd::Value;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::TiffResult;

/// TIFF compression codes.
mod compression {
    pub const NONE: u16 = 1;
    pub const LZW: u16 = 5;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

/// TIFF predictor codes.
mod predictor {
    pub const NONE: u16 = 1;
    pub const HORIZONTAL: u16 = 2;
    pub const FLOATING_POINT: u16 = 3;
}

/// TIFF sample format codes.
mod sample_format {
    pub const UNSIGNED_INT: u16 = 1;
    pub const SIGNED_INT: u16 = 2;
    pub const FLOAT: u16 = 3;
}

/// Storage layout of the current page
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageLayout {
    pub width: usize,
    pub height: usize,
    pub samples: usize,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub planar: bool,
    pub compression: u16,
    pub predictor: u16,
    pub tiled: bool,
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
}

impl PageLayout {
    pub(crate) fn from_decoder<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Self> {
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let samples = decoder.find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?.unwrap_or(1);
        let bits_per_sample = first_u16(decoder, Tag::BitsPerSample)?.unwrap_or(1);
        let sample_format =
            first_u16(decoder, Tag::SampleFormat)?.unwrap_or(sample_format::UNSIGNED_INT);
        let planar = decoder.find_tag_unsigned::<u16>(Tag::PlanarConfiguration)? == Some(2);
        let compression = decoder
            .find_tag_unsigned::<u16>(Tag::Compression)?
            .unwrap_or(compression::NONE);
        let predictor = decoder
            .find_tag_unsigned::<u16>(Tag::Predictor)?
            .unwrap_or(predictor::NONE);

        let tile_width = decoder.find_tag_unsigned::<u32>(Tag::TileWidth)?;
        let tile_length = decoder.find_tag_unsigned::<u32>(Tag::TileLength)?;
        let tile_size = (tile_width, tile_length);
        let (tiled, chunk_width, chunk_height, offsets, byte_counts) = match tile_size {
            (Some(tw), Some(tl)) => (
                true,
                tw as usize,
                tl as usize,
                u64_values(decoder, Tag::TileOffsets)?,
                u64_values(decoder, Tag::TileByteCounts)?,
            ),
            _ => {
                let rows_per_strip = decoder
                    .find_tag_unsigned::<u32>(Tag::RowsPerStrip)?
                    .map_or(height, |r| (r as usize).min(height));
                (
                    false,
                    width,
                    rows_per_strip,
                    u64_values(decoder, Tag::StripOffsets)?,
                    u64_values(decoder, Tag::StripByteCounts)?,
                )
            }
        };

        Ok(Self {
            width,
            height,
            samples: samples as usize,
            bits_per_sample,
            sample_format,
            planar,
            compression,
            predictor,
            tiled,
            chunk_width,
            chunk_height,
            offsets,
            byte_counts,
        })
    }

    fn pixel_format(&self) -> Result<SampleFormat> {
        Ok(match (self.bits_per_sample, self.sample_format) {
            (8, sample_format::UNSIGNED_INT) => SampleFormat::U8,
            (16, sample_format::UNSIGNED_INT) => SampleFormat::U16,
            (32, sample_format::UNSIGNED_INT) => SampleFormat::U32,
            (8, sample_format::SIGNED_INT) => SampleFormat::I8,
            (16, sample_format::SIGNED_INT) => SampleFormat::I16,
            (32, sample_format::SIGNED_INT) => SampleFormat::I32,
            (32, sample_format::FLOAT) => SampleFormat::F32,
            (64, sample_format::FLOAT) => SampleFormat::F64,
            (bits, format) => {
                return Err(Error::UnsupportedDataType(format!(
                    "{} bits per sample with sample format {}",
                    bits, format
                )))
            }
        })
    }
}

/// Decode every sample of the current page into its own band.
///
/// `file` holds the whole TIFF; chunk offsets index into it.
pub(crate) fn read_page_samples(
    layout: &PageLayout,
    file: &[u8],
) -> Result<(SampleFormat, Vec<Array2<f64>>)> {
    let format = layout.pixel_format()?;
    let little_endian = file.starts_with(b"II");
    let sample_size = usize::from(layout.bits_per_sample / 8);

    if layout.chunk_width == 0 || layout.chunk_height == 0 {
        return Err(Error::InvalidDimensions {
            width: layout.chunk_width,
            height: layout.chunk_height,
        });
    }
    let across = layout.width.div_ceil(layout.chunk_width);
    let down = layout.height.div_ceil(layout.chunk_height);
    let per_plane = across * down;
    let (planes, chunk_samples) = if layout.planar {
        (layout.samples, 1)
    } else {
        (1, layout.samples)
    };
    let chunk_count = per_plane * planes;
    if layout.offsets.len() < chunk_count || layout.byte_counts.len() < layout.offsets.len() {
        return Err(Error::Decompress(format!(
            "expected {} chunks, found {}",
            chunk_count,
            layout.offsets.len()
        )));
    }

    let mut bands = vec![Array2::<f64>::zeros((layout.height, layout.width)); layout.samples];

    for plane in 0..planes {
        for chunk in 0..per_plane {
            let index = plane * per_plane + chunk;
            let row0 = (chunk / across) * layout.chunk_height;
            let col0 = (chunk % across) * layout.chunk_width;
            // Tiles are always stored full size; the last strip may be short
            let chunk_rows = if layout.tiled {
                layout.chunk_height
            } else {
                layout.chunk_height.min(layout.height - row0)
            };
            let row_samples = layout.chunk_width * chunk_samples;
            let expected = row_samples * chunk_rows * sample_size;

            let mut data = decompress_chunk(
                chunk_bytes(file, layout.offsets[index], layout.byte_counts[index])?,
                layout.compression,
                expected,
            )?;
            if data.len() < expected {
                return Err(Error::Decompress(format!(
                    "chunk {} holds {} bytes, expected {}",
                    index,
                    data.len(),
                    expected
                )));
            }
            data.truncate(expected);

            match layout.predictor {
                predictor::NONE => {}
                predictor::HORIZONTAL => undo_horizontal(
                    &mut data,
                    row_samples,
                    chunk_samples,
                    sample_size,
                    little_endian,
                ),
                predictor::FLOATING_POINT => undo_floating_point(
                    &mut data,
                    row_samples,
                    chunk_samples,
                    sample_size,
                    little_endian,
                ),
                other => {
                    return Err(Error::UnsupportedDataType(format!("TIFF predictor {}", other)));
                }
            }

            let values = bytes_to_f64(&data, format, little_endian);
            for r in 0..chunk_rows {
                let row = row0 + r;
                if row >= layout.height {
                    break;
                }
                for c in 0..layout.chunk_width {
                    let col = col0 + c;
                    if col >= layout.width {
                        break;
                    }
                    let base = (r * layout.chunk_width + c) * chunk_samples;
                    for s in 0..chunk_samples {
                        let band = if layout.planar { plane } else { s };
                        bands[band][[row, col]] = values[base + s];
                    }
                }
            }
        }
    }

    Ok((format, bands))
}

fn first_u16<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<u16>> {
    Ok(decoder
        .find_tag(tag)?
        .map(Value::into_u16_vec)
        .transpose()?
        .and_then(|values| values.first().copied()))
}

/// Offsets and byte counts may be stored as SHORT, LONG or LONG8, single or listed
fn u64_values<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Vec<u64>> {
    match decoder.get_tag(tag)? {
        Value::List(values) => values.into_iter().map(Value::into_u64).collect(),
        value => Ok(vec![value.into_u64()?]),
    }
}

fn chunk_bytes(file: &[u8], offset: u64, count: u64) -> Result<&[u8]> {
    let start = usize::try_from(offset).map_err(|e| Error::Decompress(e.to_string()))?;
    let len = usize::try_from(count).map_err(|e| Error::Decompress(e.to_string()))?;
    start
        .checked_add(len)
        .and_then(|end| file.get(start..end))
        .ok_or_else(|| {
            Error::Decompress(format!(
                "chunk at {} (+{}) lies past end of file",
                offset, count
            ))
        })
}

/// Decompress raw chunk bytes according to the compression method.
fn decompress_chunk(
    data: &[u8],
    compression_code: u16,
    expected_raw_size: usize,
) -> Result<Vec<u8>> {
    match compression_code {
        compression::NONE => Ok(data.to_vec()),

        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            // zlib-wrapped in practice; some writers emit raw deflate
            let mut out = Vec::with_capacity(expected_raw_size);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
                return Ok(out);
            }
            out.clear();
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompress(format!("DEFLATE: {}", e)))?;
            Ok(out)
        }

        compression::LZW => {
            let mut decoder =
                weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            decoder
                .decode(data)
                .map_err(|e| Error::Decompress(format!("LZW: {}", e)))
        }

        other => Err(Error::UnsupportedDataType(format!("TIFF compression {}", other))),
    }
}

fn read_uint(bytes: &[u8], little_endian: bool) -> u64 {
    let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
    if little_endian {
        bytes.iter().rev().fold(0, fold)
    } else {
        bytes.iter().fold(0, fold)
    }
}

fn write_uint(bytes: &mut [u8], value: u64, little_endian: bool) {
    let n = bytes.len();
    for i in 0..n {
        let byte = (value >> (8 * i)) as u8;
        if little_endian {
            bytes[i] = byte;
        } else {
            bytes[n - 1 - i] = byte;
        }
    }
}

/// Reverse horizontal differencing: each sample was stored minus the same
/// sample of the previous pixel in the row (modulo the sample width).
fn undo_horizontal(
    data: &mut [u8],
    row_samples: usize,
    stride: usize,
    size: usize,
    little_endian: bool,
) {
    for row in data.chunks_exact_mut(row_samples * size) {
        for i in stride..row_samples {
            let prev = read_uint(&row[(i - stride) * size..(i - stride + 1) * size], little_endian);
            let cell = &mut row[i * size..(i + 1) * size];
            let value = read_uint(cell, little_endian).wrapping_add(prev);
            write_uint(cell, value, little_endian);
        }
    }
}

/// Reverse the floating-point predictor: byte-wise differencing over the row,
/// with the bytes of every value split into planes, most significant first.
fn undo_floating_point(
    data: &mut [u8],
    row_samples: usize,
    stride: usize,
    size: usize,
    little_endian: bool,
) {
    let row_bytes = row_samples * size;
    let mut planes = vec![0u8; row_bytes];
    for row in data.chunks_exact_mut(row_bytes) {
        for i in stride..row_bytes {
            row[i] = row[i].wrapping_add(row[i - stride]);
        }
        planes.copy_from_slice(row);
        for s in 0..row_samples {
            for b in 0..size {
                let pos = if little_endian { size - 1 - b } else { b };
                row[s * size + pos] = planes[b * row_samples + s];
            }
        }
    }
}

fn bytes_to_f64(data: &[u8], format: SampleFormat, little_endian: bool) -> Vec<f64> {
    macro_rules! decode {
        ($t:ty) => {
            data.chunks_exact(std::mem::size_of::<$t>())
                .map(|chunk| {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(chunk);
                    let value = if little_endian {
                        <$t>::from_le_bytes(bytes)
                    } else {
                        <$t>::from_be_bytes(bytes)
                    };
                    value as f64
                })
                .collect()
        };
    }

    match format {
        SampleFormat::U8 => decode!(u8),
        SampleFormat::U16 => decode!(u16),
        SampleFormat::U32 => decode!(u32),
        SampleFormat::I8 => decode!(i8),
        SampleFormat::I16 => decode!(i16),
        SampleFormat::I32 => decode!(i32),
        SampleFormat::F32 => decode!(f32),
        SampleFormat::F64 => decode!(f64),
    }
}
