//! Georeferenced single-band rasters decoded from GeoTIFF bytes.
//!
//! Georeferencing is taken from ModelPixelScale (33550) plus ModelTiepoint
//! (33922), or from ModelTransformation (34264) when those are absent.
//! CRS keys are not interpreted; every raster is assumed to be EPSG:4326.

use std::io::Cursor;

use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use ntl_common::BoundingBox;

use crate::error::{CompositeError, Result};

pub(crate) const MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const MODEL_TIEPOINT: u16 = 33922;
pub(crate) const MODEL_TRANSFORMATION: u16 = 34264;
pub(crate) const GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const GDAL_NODATA: u16 = 42113;

/// North-up affine transform from pixel to geographic coordinates.
///
/// `x = origin_x + col * pixel_width`, `y = origin_y + row * pixel_height`,
/// with `pixel_height` negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Transform that stretches `rows x cols` pixels over `bounds`.
    pub fn from_bounds(bounds: &BoundingBox, rows: usize, cols: usize) -> Self {
        Self {
            origin_x: bounds.min_x,
            origin_y: bounds.max_y,
            pixel_width: bounds.width() / cols.max(1) as f64,
            pixel_height: -bounds.height() / rows.max(1) as f64,
        }
    }

    /// Pixel `(row, col)` containing the geographic point, flooring
    /// fractional coordinates. May lie outside the raster.
    pub fn index(&self, x: f64, y: f64) -> (isize, isize) {
        let col = ((x - self.origin_x) / self.pixel_width).floor() as isize;
        let row = ((y - self.origin_y) / self.pixel_height).floor() as isize;
        (row, col)
    }

    /// Geographic coordinates of the upper-left corner of a pixel.
    pub fn pixel_to_geo(&self, row: isize, col: isize) -> (f64, f64) {
        (
            self.origin_x + col as f64 * self.pixel_width,
            self.origin_y + row as f64 * self.pixel_height,
        )
    }

    /// Geographic extent of a `rows x cols` raster on this transform.
    pub fn bounds(&self, rows: usize, cols: usize) -> BoundingBox {
        let (x0, y0) = self.pixel_to_geo(0, 0);
        let (x1, y1) = self.pixel_to_geo(rows as isize, cols as isize);
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// ModelPixelScale and ModelTiepoint tag values.
    pub fn to_tags(&self) -> ([f64; 3], [f64; 6]) {
        (
            [self.pixel_width, self.pixel_height.abs(), 0.0],
            [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0],
        )
    }
}

/// A decoded band with its georeferencing.
#[derive(Debug, Clone)]
pub struct GeoRaster<T> {
    pub data: Array2<T>,
    pub transform: GeoTransform,
}

impl<T> GeoRaster<T> {
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.rows(), self.cols())
    }
}

/// Sample types a band can be decoded into.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    fn from_decoded(result: DecodingResult) -> Result<Vec<Self>>;
}

macro_rules! convert_samples {
    ($result:expr, $t:ty) => {
        match $result {
            DecodingResult::U8(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::U16(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::U32(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::U64(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::I8(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::I16(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::I32(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::I64(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::F32(buf) => buf.into_iter().map(|v| v as $t).collect(),
            DecodingResult::F64(buf) => buf.into_iter().map(|v| v as $t).collect(),
            #[allow(unreachable_patterns)]
            _ => return Err(CompositeError::decode("unsupported TIFF sample format")),
        }
    };
}

impl Sample for f32 {
    fn from_decoded(result: DecodingResult) -> Result<Vec<Self>> {
        Ok(convert_samples!(result, f32))
    }
}

impl Sample for i64 {
    fn from_decoded(result: DecodingResult) -> Result<Vec<Self>> {
        Ok(convert_samples!(result, i64))
    }
}

impl Sample for u32 {
    fn from_decoded(result: DecodingResult) -> Result<Vec<Self>> {
        Ok(convert_samples!(result, u32))
    }
}

/// Decode the first band of a GeoTIFF.
pub fn decode<T: Sample>(bytes: &[u8]) -> Result<GeoRaster<T>> {
    let mut decoder = open(bytes)?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| CompositeError::decode(format!("cannot read dimensions: {}", e)))?;
    let (rows, cols) = (height as usize, width as usize);

    let transform = read_geotransform(&mut decoder)?;

    let result = decoder
        .read_image()
        .map_err(|e| CompositeError::decode(format!("cannot read image data: {}", e)))?;
    let samples = T::from_decoded(result)?;

    if samples.len() != rows * cols {
        return Err(CompositeError::decode(format!(
            "expected {} samples for a {}x{} single-band raster, got {}",
            rows * cols,
            rows,
            cols,
            samples.len()
        )));
    }

    let data = Array2::from_shape_vec((rows, cols), samples)
        .map_err(|e| CompositeError::decode(e.to_string()))?;
    Ok(GeoRaster { data, transform })
}

/// Geographic bounds of a GeoTIFF, without decoding its pixels.
pub fn read_bounds(bytes: &[u8]) -> Result<BoundingBox> {
    let mut decoder = open(bytes)?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| CompositeError::decode(format!("cannot read dimensions: {}", e)))?;
    let transform = read_geotransform(&mut decoder)?;
    Ok(transform.bounds(height as usize, width as usize))
}

fn open(bytes: &[u8]) -> Result<Decoder<Cursor<&[u8]>>> {
    Decoder::new(Cursor::new(bytes))
        .map_err(|e| CompositeError::decode(format!("not a TIFF: {}", e)))
}

fn read_geotransform<R>(decoder: &mut Decoder<R>) -> Result<GeoTransform>
where
    R: std::io::Read + std::io::Seek,
{
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION)) {
        if m.len() >= 16 {
            if m[1] != 0.0 || m[4] != 0.0 {
                return Err(CompositeError::decode("rotated rasters are not supported"));
            }
            return Ok(GeoTransform::new(m[3], m[7], m[0], m[5]));
        }
    }

    Err(CompositeError::decode("missing GeoTIFF georeferencing tags"))
}
