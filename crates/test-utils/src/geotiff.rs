//! In-memory GeoTIFF encoding for raster fixtures.
//!
//! Fixtures carry only the georeferencing tags the readers need:
//! ModelPixelScale (33550), ModelTiepoint (33922) and an EPSG:4326
//! GeoKeyDirectory (34735).

use std::io::Cursor;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

/// Grid geometry of a synthetic raster: north-up, square pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTiffFixture {
    pub width: u32,
    pub height: u32,
    /// Longitude of the upper-left corner.
    pub origin_x: f64,
    /// Latitude of the upper-left corner.
    pub origin_y: f64,
    pub pixel_size: f64,
}

impl GeoTiffFixture {
    pub fn new(width: u32, height: u32, origin_x: f64, origin_y: f64, pixel_size: f64) -> Self {
        Self {
            width,
            height,
            origin_x,
            origin_y,
            pixel_size,
        }
    }

    /// Unit-degree grid with its upper-left corner at (0, height).
    ///
    /// Pixel (row, col) covers lon `[col, col + 1)` and lat
    /// `(height - row - 1, height - row]`.
    pub fn unit(width: u32, height: u32) -> Self {
        Self::new(width, height, 0.0, height as f64, 1.0)
    }

    /// Geographic bounds `(minx, miny, maxx, maxy)` of the whole grid.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.origin_x,
            self.origin_y - self.height as f64 * self.pixel_size,
            self.origin_x + self.width as f64 * self.pixel_size,
            self.origin_y,
        )
    }

    /// Encode a row-major f32 radiance band.
    pub fn encode_f32(&self, data: &[f32]) -> Vec<u8> {
        assert_eq!(data.len(), (self.width * self.height) as usize);
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf).expect("tiff encoder");
            let mut image = encoder
                .new_image::<colortype::Gray32Float>(self.width, self.height)
                .expect("tiff image");
            self.write_geo_tags(image.encoder());
            image.write_data(data).expect("tiff data");
        }
        buf.into_inner()
    }

    /// Encode a row-major u32 flag band.
    pub fn encode_u32(&self, data: &[u32]) -> Vec<u8> {
        assert_eq!(data.len(), (self.width * self.height) as usize);
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf).expect("tiff encoder");
            let mut image = encoder
                .new_image::<colortype::Gray32>(self.width, self.height)
                .expect("tiff image");
            self.write_geo_tags(image.encoder());
            image.write_data(data).expect("tiff data");
        }
        buf.into_inner()
    }

    fn write_geo_tags<W, K>(&self, dir: &mut tiff::encoder::DirectoryEncoder<'_, W, K>)
    where
        W: std::io::Write + std::io::Seek,
        K: tiff::encoder::TiffKind,
    {
        let scale = [self.pixel_size, self.pixel_size, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0];
        let geokeys: [u16; 16] = [1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326];

        dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
            .expect("pixel scale tag");
        dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
            .expect("tiepoint tag");
        dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])
            .expect("geokey tag");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_fixture_bounds() {
        let fixture = GeoTiffFixture::unit(4, 3);
        assert_eq!(fixture.bounds(), (0.0, 0.0, 4.0, 3.0));
    }

    #[test]
    fn test_encoded_bytes_are_tiff() {
        let bytes = GeoTiffFixture::unit(2, 2).encode_f32(&[1.0; 4]);
        assert!(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"));

        let mut decoder = tiff::decoder::Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (2, 2));
        let scale = decoder
            .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
            .unwrap();
        assert_eq!(scale[0], 1.0);
    }
}
