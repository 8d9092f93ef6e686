//! GeoTIFF fixtures for tests.

use std::path::Path;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::tile::{TAG_GDAL_NODATA, TAG_MODEL_PIXEL_SCALE, TAG_MODEL_TIEPOINT};

const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

/// Write a north-up GeoTIFF.
///
/// `origin` is the (lon, lat) of the northwest corner, `pixel` the
/// degrees-per-pixel step in (x, y), and `data` runs row-major from the
/// north edge.
pub(crate) fn write_geotiff(
    path: &Path,
    width: u32,
    height: u32,
    origin: (f64, f64),
    pixel: (f64, f64),
    nodata: Option<f64>,
    data: &[f32],
) {
    let file = std::fs::File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(file).unwrap();
    let mut image = tiff
        .new_image::<colortype::Gray32Float>(width, height)
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(TAG_MODEL_PIXEL_SCALE),
            &[pixel.0, pixel.1, 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(TAG_MODEL_TIEPOINT),
            &[0.0, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
    // Minimal GeoKey directory declaring geographic WGS84
    image
        .encoder()
        .write_tag(
            Tag::Unknown(TAG_GEO_KEY_DIRECTORY),
            &[1u16, 1, 0, 1, 2048, 0, 1, 4326][..],
        )
        .unwrap();
    if let Some(nodata) = nodata {
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), format!("{nodata}").as_str())
            .unwrap();
    }
    image.write_data(data).unwrap();
}

/// Write a TIFF without any georeferencing tags.
pub(crate) fn write_plain_tiff(path: &Path, width: u32, height: u32, data: &[f32]) {
    let file = std::fs::File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(file).unwrap();
    let image = tiff
        .new_image::<colortype::Gray32Float>(width, height)
        .unwrap();
    image.write_data(data).unwrap();
}

/// Row-major grid filled with a single value.
pub(crate) fn grid(width: u32, height: u32, value: f32) -> Vec<f32> {
    vec![value; (width * height) as usize]
}
