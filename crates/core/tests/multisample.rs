//! Single-page rasters holding several samples per pixel, as written by
//! GDAL for multispectral scenes.

use std::io::{Cursor, Write};
use tiff::encoder::colortype::ColorType;
use tiff::encoder::compression::Lzw;
use tiff::encoder::TiffEncoder;
use tiff::tags::{PhotometricInterpretation, SampleFormat as TiffSampleFormat};
use vegidx_core::io::RasterDataset;
use vegidx_core::raster::SampleFormat;

const SHORT: u16 = 3;
const LONG: u16 = 4;

/// One little-endian page described tag by tag
struct Page {
    width: u32,
    height: u32,
    samples: u16,
    bits: u16,
    format: u16,
    planar: bool,
    compression: u16,
    predictor: u16,
    tile: Option<(u32, u32)>,
    chunks: Vec<Vec<u8>>,
}

impl Page {
    fn f32(width: u32, height: u32, samples: u16, planar: bool, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            width,
            height,
            samples,
            bits: 32,
            format: 3,
            planar,
            compression: 1,
            predictor: 1,
            tile: None,
            chunks,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let n = usize::from(self.samples);
        let (offsets_tag, counts_tag) = if self.tile.is_some() {
            (324u16, 325u16)
        } else {
            (273, 279)
        };

        let mut entries: Vec<(u16, u16, Vec<u32>)> = vec![
            (256, LONG, vec![self.width]),
            (257, LONG, vec![self.height]),
            (258, SHORT, vec![u32::from(self.bits); n]),
            (259, SHORT, vec![u32::from(self.compression)]),
            (262, SHORT, vec![1]),
            (277, SHORT, vec![u32::from(self.samples)]),
            (284, SHORT, vec![if self.planar { 2 } else { 1 }]),
            (317, SHORT, vec![u32::from(self.predictor)]),
            (339, SHORT, vec![u32::from(self.format); n]),
            (offsets_tag, LONG, vec![0; self.chunks.len()]),
            (counts_tag, LONG, self.chunks.iter().map(|c| c.len() as u32).collect()),
        ];
        match self.tile {
            Some((tw, tl)) => {
                entries.push((322, LONG, vec![tw]));
                entries.push((323, LONG, vec![tl]));
            }
            None => entries.push((278, LONG, vec![self.height])),
        }
        entries.sort_by_key(|entry| entry.0);

        let value_bytes = |ty: u16, values: &[u32]| -> Vec<u8> {
            values
                .iter()
                .flat_map(|&v| match ty {
                    SHORT => (v as u16).to_le_bytes().to_vec(),
                    _ => v.to_le_bytes().to_vec(),
                })
                .collect()
        };

        let ifd_len = 2 + 12 * entries.len() + 4;
        let extra_len: usize = entries
            .iter()
            .map(|(_, ty, values)| value_bytes(*ty, values).len())
            .filter(|&len| len > 4)
            .sum();
        let mut chunk_offset = (8 + ifd_len + extra_len) as u32;
        for (tag, _, values) in entries.iter_mut() {
            if *tag == offsets_tag {
                for (value, chunk) in values.iter_mut().zip(&self.chunks) {
                    *value = chunk_offset;
                    chunk_offset += chunk.len() as u32;
                }
            }
        }

        let mut out = b"II".to_vec();
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        let extra_start = 8 + ifd_len;
        let mut extra = Vec::new();
        for (tag, ty, values) in &entries {
            let mut bytes = value_bytes(*ty, values);
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            if bytes.len() <= 4 {
                bytes.resize(4, 0);
                out.extend_from_slice(&bytes);
            } else {
                out.extend_from_slice(&((extra_start + extra.len()) as u32).to_le_bytes());
                extra.extend_from_slice(&bytes);
            }
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend(extra);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

/// Band `b` (0-based) of the 2x2 fixtures holds `(b + 1) * 10 + pixel index`
fn band_value(band: usize, pixel: usize) -> f32 {
    ((band + 1) * 10 + pixel) as f32
}

fn open(bytes: &[u8]) -> RasterDataset {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("landsat_8_scene.tif");
    std::fs::write(&path, bytes).unwrap();
    RasterDataset::open(&path).unwrap()
}

fn assert_five_bands(dataset: &RasterDataset) {
    assert_eq!(dataset.band_count(), 5);
    assert_eq!(dataset.profile().band_count, 5);
    assert_eq!(dataset.profile().sample_format, SampleFormat::F32);
    for band in 0..5 {
        let raster = dataset.band::<f32>(band + 1).unwrap();
        for pixel in 0..4 {
            assert_eq!(raster.get(pixel / 2, pixel % 2).unwrap(), band_value(band, pixel));
        }
    }
}

#[test]
fn test_chunky_five_band_page() {
    let chunk: Vec<u8> = (0..4)
        .flat_map(|pixel| (0..5).map(move |band| band_value(band, pixel)))
        .flat_map(f32::to_le_bytes)
        .collect();

    let dataset = open(&Page::f32(2, 2, 5, false, vec![chunk]).encode());
    assert_five_bands(&dataset);
}

#[test]
fn test_planar_five_band_page() {
    let chunks: Vec<Vec<u8>> = (0..5)
        .map(|band| {
            (0..4)
                .map(|pixel| band_value(band, pixel))
                .flat_map(f32::to_le_bytes)
                .collect()
        })
        .collect();

    let dataset = open(&Page::f32(2, 2, 5, true, chunks).encode());
    assert_five_bands(&dataset);
}

#[test]
fn test_planar_deflate_with_horizontal_predictor() {
    // 2x2 uint16, two bands, each row stored as differences
    let bands = [[100u16, 120, 90, 80], [1000, 1500, 2000, 500]];
    let chunks: Vec<Vec<u8>> = bands
        .iter()
        .map(|band| {
            let mut raw = Vec::new();
            for row in band.chunks(2) {
                raw.extend_from_slice(&row[0].to_le_bytes());
                raw.extend_from_slice(&row[1].wrapping_sub(row[0]).to_le_bytes());
            }
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&raw).unwrap();
            encoder.finish().unwrap()
        })
        .collect();

    let page = Page {
        bits: 16,
        format: 1,
        compression: 8,
        predictor: 2,
        ..Page::f32(2, 2, 2, true, chunks)
    };
    let dataset = open(&page.encode());

    assert_eq!(dataset.profile().sample_format, SampleFormat::U16);
    for (b, expected) in bands.iter().enumerate() {
        let raster = dataset.band::<f64>(b + 1).unwrap();
        for (pixel, &value) in expected.iter().enumerate() {
            assert_eq!(raster.get(pixel / 2, pixel % 2).unwrap(), f64::from(value));
        }
    }
}

#[test]
fn test_tiled_page_with_padding() {
    // 3x3 uint8 with 2 samples in 2x2 tiles; edge tiles are padded
    let value = |band: usize, row: usize, col: usize| (band * 100 + row * 3 + col) as u8;
    let chunks: Vec<Vec<u8>> = (0..4)
        .map(|tile| {
            let (row0, col0) = ((tile / 2) * 2, (tile % 2) * 2);
            let mut bytes = Vec::new();
            for r in row0..row0 + 2 {
                for c in col0..col0 + 2 {
                    for band in 0..2 {
                        bytes.push(if r < 3 && c < 3 { value(band, r, c) } else { 0 });
                    }
                }
            }
            bytes
        })
        .collect();

    let page = Page {
        bits: 8,
        format: 1,
        tile: Some((2, 2)),
        ..Page::f32(3, 3, 2, false, chunks)
    };
    let dataset = open(&page.encode());

    assert_eq!(dataset.band_count(), 2);
    for band in 0..2 {
        let raster = dataset.band::<f64>(band + 1).unwrap();
        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(raster.get(row, col).unwrap(), f64::from(value(band, row, col)));
            }
        }
    }
}

struct FiveBandF32;

impl ColorType for FiveBandF32 {
    type Inner = f32;
    const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::BlackIsZero;
    const BITS_PER_SAMPLE: &'static [u16] = &[32; 5];
    const SAMPLE_FORMAT: &'static [TiffSampleFormat] = &[TiffSampleFormat::IEEEFP; 5];
}

#[test]
fn test_lzw_chunky_page_from_encoder() {
    let interleaved: Vec<f32> = (0..4)
        .flat_map(|pixel| (0..5).map(move |band| band_value(band, pixel)))
        .collect();

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        let image = encoder
            .new_image_with_compression::<FiveBandF32, _>(2, 2, Lzw)
            .unwrap();
        image.write_data(&interleaved).unwrap();
    }

    let dataset = open(buffer.get_ref());
    assert_five_bands(&dataset);
}
