//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Reading accepts the usual ways of storing several bands in one file: one
//! page with N samples per pixel (chunky or planar), or N single-sample
//! pages. Writing always produces float32 pages.

use super::chunks::{read_page_samples, PageLayout};
use crate::error::{Error, Result};
use crate::raster::{GeoKeys, GeoTransform, Raster, RasterElement, RasterProfile, SampleFormat};
use ndarray::{Array2, ArrayView2};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

// GeoTIFF / GDAL private tags
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

/// Resolves to the named variant when the `tiff` crate knows the code,
/// so lookups hit the same key the decoder stored.
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// All bands of a raster file, decoded into memory.
///
/// The file handle is released as soon as [`RasterDataset::open`] returns.
#[derive(Debug, Clone)]
pub struct RasterDataset {
    path: PathBuf,
    profile: RasterProfile,
    bands: Vec<Array2<f64>>,
}

impl RasterDataset {
    /// Decode every band of the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let (profile, bands) = decode_dataset(&bytes, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            profile,
            bands,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &RasterProfile {
        &self.profile
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Read one band (1-indexed) cast to `T`, carrying the file's georeferencing
    pub fn band<T: RasterElement>(&self, band: usize) -> Result<Raster<T>> {
        let source = band
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or(Error::BandOutOfRange {
                band,
                count: self.bands.len(),
            })?;

        let mut raster =
            Raster::from_array(source.mapv(|v| num_traits::cast(v).unwrap_or(T::default_nodata())));
        raster.apply_profile(&self.profile);
        Ok(raster)
    }
}

/// Read a single band (1-indexed, default 1) of a GeoTIFF
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    RasterDataset::open(path)?.band(band.unwrap_or(1))
}

/// Decode all full-resolution pages of a TIFF held in memory
fn decode_dataset(bytes: &[u8], path: &Path) -> Result<(RasterProfile, Vec<Array2<f64>>)> {
    let mut decoder = Decoder::new(Cursor::new(bytes))
        .map_err(|e| Error::tiff(path, e))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(|e| Error::tiff(path, e))?;
    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut profile = RasterProfile::new(rows, cols);
    read_georeferencing(&mut decoder, &mut profile);

    let mut bands = Vec::new();
    let mut sample_format = None;
    loop {
        // Reduced-resolution pages (overviews) have other dimensions
        if decoder.dimensions().map_err(|e| Error::tiff(path, e))? == (width, height) {
            let layout = PageLayout::from_decoder(&mut decoder).map_err(|e| Error::tiff(path, e))?;
            let (format, page) = if layout.samples > 1 {
                read_page_samples(&layout, bytes)?
            } else {
                let decoded = decoder.read_image().map_err(|e| Error::tiff(path, e))?;
                let (format, values) = decoded_to_f64(decoded)?;
                let band = Array2::from_shape_vec((rows, cols), values)
                    .map_err(|e| Error::Other(e.to_string()))?;
                (format, vec![band])
            };
            if sample_format.is_none() {
                sample_format = Some(format);
            }
            bands.extend(page);
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| Error::tiff(path, e))?;
    }

    profile.band_count = bands.len();
    profile.sample_format = sample_format.unwrap_or(SampleFormat::F32);
    Ok((profile, bands))
}

fn read_georeferencing(decoder: &mut Decoder<Cursor<&[u8]>>, profile: &mut RasterProfile) {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok();
    let matrix = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)).ok();

    let from_tiepoint = scale
        .zip(tiepoint)
        .and_then(|(s, t)| GeoTransform::from_scale_tiepoint(&s, &t));
    let from_matrix = matrix.and_then(|m| GeoTransform::from_model_transformation(&m));
    if let Some(transform) = from_tiepoint.or(from_matrix) {
        profile.transform = transform;
    }

    if let Ok(directory) = decoder.get_tag_u16_vec(geo_tag(GEO_KEY_DIRECTORY)) {
        let keys = GeoKeys {
            directory,
            double_params: decoder
                .get_tag_f64_vec(geo_tag(GEO_DOUBLE_PARAMS))
                .unwrap_or_default(),
            ascii_params: decoder.get_tag_ascii_string(geo_tag(GEO_ASCII_PARAMS)).ok(),
        };
        profile.crs = keys.crs();
        profile.geokeys = Some(keys);
    }

    profile.nodata = decoder
        .get_tag_ascii_string(geo_tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok());
}

fn decoded_to_f64(result: DecodingResult) -> Result<(SampleFormat, Vec<f64>)> {
    macro_rules! widen {
        ($buf:expr, $format:expr) => {
            ($format, $buf.into_iter().map(|v| v as f64).collect())
        };
    }

    Ok(match result {
        DecodingResult::U8(buf) => widen!(buf, SampleFormat::U8),
        DecodingResult::U16(buf) => widen!(buf, SampleFormat::U16),
        DecodingResult::U32(buf) => widen!(buf, SampleFormat::U32),
        DecodingResult::I8(buf) => widen!(buf, SampleFormat::I8),
        DecodingResult::I16(buf) => widen!(buf, SampleFormat::I16),
        DecodingResult::I32(buf) => widen!(buf, SampleFormat::I32),
        DecodingResult::F32(buf) => widen!(buf, SampleFormat::F32),
        DecodingResult::F64(buf) => (SampleFormat::F64, buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    })
}

/// Write a single-band float32 GeoTIFF described by `profile`.
///
/// The band count and sample format of `profile` are ignored; everything
/// else (dimensions, transform, CRS keys, nodata) is written as given.
/// Missing parent directories are created and an existing file is replaced.
pub fn write_geotiff_with_profile<P: AsRef<Path>>(
    path: P,
    data: ArrayView2<'_, f32>,
    profile: &RasterProfile,
) -> Result<()> {
    write_pages(path.as_ref(), &[data], profile)
}

/// Write a Raster as a single-band float32 GeoTIFF
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let data = raster.data().mapv(|v| num_traits::cast(v).unwrap_or(f32::NAN));
    write_geotiff_with_profile(path, data.view(), &raster.profile(SampleFormat::F32))
}

/// Write several equally-shaped bands as consecutive float32 pages
pub fn write_multiband_geotiff<P: AsRef<Path>>(
    path: P,
    bands: &[ArrayView2<'_, f32>],
    profile: &RasterProfile,
) -> Result<()> {
    write_pages(path.as_ref(), bands, profile)
}

fn write_pages(path: &Path, bands: &[ArrayView2<'_, f32>], profile: &RasterProfile) -> Result<()> {
    for band in bands {
        if band.dim() != (profile.rows, profile.cols) {
            let (ar, ac) = band.dim();
            return Err(Error::SizeMismatch {
                er: profile.rows,
                ec: profile.cols,
                ar,
                ac,
            });
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    {
        let mut encoder = TiffEncoder::new(&mut writer).map_err(|e| Error::tiff(path, e))?;
        for band in bands {
            encode_page(&mut encoder, *band, profile).map_err(|e| Error::tiff(path, e))?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn encode_page<W: Write + Seek>(
    encoder: &mut TiffEncoder<W>,
    band: ArrayView2<'_, f32>,
    profile: &RasterProfile,
) -> std::result::Result<(), tiff::TiffError> {
    let (rows, cols) = band.dim();
    let data: Vec<f32> = band.iter().copied().collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;

    let gt = profile.transform;
    if gt.is_rotated() {
        let matrix = gt.to_model_transformation();
        image
            .encoder()
            .write_tag(geo_tag(MODEL_TRANSFORMATION), &matrix[..])?;
    } else {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image.encoder().write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])?;
        image.encoder().write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])?;
    }

    if let Some(keys) = profile.geokeys_for_write() {
        image
            .encoder()
            .write_tag(geo_tag(GEO_KEY_DIRECTORY), keys.directory.as_slice())?;
        if !keys.double_params.is_empty() {
            image
                .encoder()
                .write_tag(geo_tag(GEO_DOUBLE_PARAMS), keys.double_params.as_slice())?;
        }
        if let Some(ascii) = keys.ascii_params.as_deref() {
            image.encoder().write_tag(geo_tag(GEO_ASCII_PARAMS), ascii)?;
        }
    }

    if let Some(nodata) = profile.nodata {
        let text = nodata.to_string();
        image.encoder().write_tag(geo_tag(GDAL_NODATA), text.as_str())?;
    }

    image.write_data(&data)
}
