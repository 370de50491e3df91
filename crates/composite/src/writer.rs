//! Single-band GeoTIFF output for composites.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tiff::encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::{info, instrument};

use ntl_common::BoundingBox;

use crate::error::{CompositeError, Result};
use crate::raster::{
    GeoTransform, GDAL_NODATA, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT,
};

/// GeoKeyDirectory for geographic lat/lon on WGS 84 (EPSG:4326).
const EPSG_4326_GEOKEYS: [u16; 16] = [
    1, 1, 0, 3, // version 1.1.0, 3 keys
    1024, 0, 1, 2, // GTModelType = Geographic
    1025, 0, 1, 1, // GTRasterType = PixelIsArea
    2048, 0, 1, 4326, // GeographicType = EPSG:4326
];

/// Sample types that can be written as a single-band GeoTIFF.
pub trait WritableSample: Copy {
    /// Value written to the GDAL_NODATA tag, if any.
    const NODATA: Option<&'static str>;

    fn write_image<W: Write + Seek>(
        enc: &mut TiffEncoder<W>,
        rows: usize,
        cols: usize,
        data: &[Self],
        transform: &GeoTransform,
    ) -> tiff::TiffResult<()>;
}

impl WritableSample for f32 {
    const NODATA: Option<&'static str> = Some("nan");

    fn write_image<W: Write + Seek>(
        enc: &mut TiffEncoder<W>,
        rows: usize,
        cols: usize,
        data: &[Self],
        transform: &GeoTransform,
    ) -> tiff::TiffResult<()> {
        let mut image = enc.new_image::<colortype::Gray32Float>(cols as u32, rows as u32)?;
        write_geo_tags(image.encoder(), transform, Self::NODATA)?;
        image.write_data(data)
    }
}

impl WritableSample for u32 {
    const NODATA: Option<&'static str> = None;

    fn write_image<W: Write + Seek>(
        enc: &mut TiffEncoder<W>,
        rows: usize,
        cols: usize,
        data: &[Self],
        transform: &GeoTransform,
    ) -> tiff::TiffResult<()> {
        let mut image = enc.new_image::<colortype::Gray32>(cols as u32, rows as u32)?;
        write_geo_tags(image.encoder(), transform, Self::NODATA)?;
        image.write_data(data)
    }
}

fn write_geo_tags<W, K>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    transform: &GeoTransform,
    nodata: Option<&str>,
) -> tiff::TiffResult<()>
where
    W: Write + Seek,
    K: TiffKind,
{
    let (scale, tiepoint) = transform.to_tags();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &EPSG_4326_GEOKEYS[..])?;
    if let Some(nodata) = nodata {
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata)?;
    }
    Ok(())
}

/// Encode `array` stretched over `bounds` as GeoTIFF bytes.
pub fn encode<T: WritableSample>(array: &Array2<T>, bounds: &BoundingBox) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    encode_into(&mut buf, array, bounds)?;
    Ok(buf.into_inner())
}

fn encode_into<W, T>(writer: &mut W, array: &Array2<T>, bounds: &BoundingBox) -> Result<()>
where
    W: Write + Seek,
    T: WritableSample,
{
    let (rows, cols) = array.dim();
    if rows == 0 || cols == 0 {
        return Err(CompositeError::Write(format!(
            "cannot write empty {}x{} raster",
            rows, cols
        )));
    }

    let transform = GeoTransform::from_bounds(bounds, rows, cols);
    let data: Vec<T> = array.iter().copied().collect();

    let mut enc =
        TiffEncoder::new(writer).map_err(|e| CompositeError::Write(e.to_string()))?;
    T::write_image(&mut enc, rows, cols, &data, &transform)
        .map_err(|e| CompositeError::Write(e.to_string()))
}

/// Write `array` stretched over `bounds` to `path`.
#[instrument(skip(array), fields(path = %path.as_ref().display(), shape = ?array.dim()))]
pub fn write<T: WritableSample>(
    path: impl AsRef<Path>,
    array: &Array2<T>,
    bounds: &BoundingBox,
) -> Result<()> {
    let mut file = BufWriter::new(File::create(path.as_ref())?);
    encode_into(&mut file, array, bounds)?;
    file.flush()?;
    Ok(())
}

/// Paths of a written composite pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositePaths {
    pub radiance: PathBuf,
    pub count: PathBuf,
}

impl CompositePaths {
    /// `<stem>_rad.tif` and `<stem>_cnt.tif` inside `dir`.
    pub fn new(dir: &Path, stem: &str) -> Self {
        Self {
            radiance: dir.join(format!("{}_rad.tif", stem)),
            count: dir.join(format!("{}_cnt.tif", stem)),
        }
    }
}

/// Write a composite's average radiance and valid count side by side.
pub fn write_composite(
    dir: &Path,
    stem: &str,
    radiance_average: &Array2<f32>,
    valid_count: &Array2<u32>,
    bounds: &BoundingBox,
) -> Result<CompositePaths> {
    CompositeError::check_shape(radiance_average.dim(), valid_count.dim())?;
    std::fs::create_dir_all(dir)?;

    let paths = CompositePaths::new(dir, stem);
    write(&paths.radiance, radiance_average, bounds)?;
    write(&paths.count, valid_count, bounds)?;

    info!(
        radiance = %paths.radiance.display(),
        count = %paths.count.display(),
        "Wrote composite"
    );
    Ok(paths)
}
