//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for TIFF I/O plus the handful of GeoTIFF tags the
//! pipeline needs: pixel scale + tiepoint (georeferencing), the GeoKey
//! directory (EPSG code) and GDAL_NODATA.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, GrayI32};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read a GeoTIFF file into a Raster
///
/// Cells that cannot be represented in `T` (NaN, out of range) and cells
/// equal to the GDAL_NODATA value become the raster's no-data value.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file, band)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn decode_geotiff<T, R>(reader: R, _band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let declared_nodata = read_nodata(&mut decoder);
    let nodata: T = declared_nodata
        .and_then(T::from_f64)
        .unwrap_or_else(T::default_nodata);

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    fn convert<S: Copy + Into<f64>, T: RasterElement>(buf: Vec<S>, nodata: T, declared: Option<f64>) -> Vec<T> {
        buf.into_iter()
            .map(|v| {
                let v: f64 = v.into();
                if declared.is_some_and(|nd| nd == v) {
                    return nodata;
                }
                T::from_f64(v).unwrap_or(nodata)
            })
            .collect()
    }

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::F64(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::U8(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::U16(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::U32(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::I8(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::I16(buf) => convert(buf, nodata, declared_nodata),
        DecodingResult::I32(buf) => convert(buf, nodata, declared_nodata),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_nodata(Some(nodata));

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    Ok(raster)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok())
}

/// Read GeoTransform from ModelPixelScale + ModelTiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from ProjectedCSTypeGeoKey or GeographicTypeGeoKey
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }

    let num_keys = keys[3] as usize;
    let mut geographic = None;

    for entry in keys[4..].chunks_exact(4).take(num_keys) {
        let (key_id, location, value) = (entry[0], entry[1], entry[3]);
        // location 0: value stored inline; 32767 is "user-defined"
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match key_id {
            PROJECTED_CS_TYPE_KEY => return Some(CRS::from_epsg(value as u32)),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(CRS::from_epsg(value as u32)),
            _ => {}
        }
    }

    geographic
}

/// Write a Raster to a GeoTIFF file
///
/// Integer rasters (codes, masks) are written as signed 32-bit integers so
/// GIS tools read them as categories; float rasters as 32-bit float. The
/// no-data value goes into the GDAL_NODATA tag.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    if T::is_float() {
        let data: Vec<f32> = raster
            .data()
            .iter()
            .map(|&v| {
                if raster.is_nodata(v) {
                    f32::NAN
                } else {
                    num_traits::cast(v).unwrap_or(f32::NAN)
                }
            })
            .collect();
        return write_image::<Gray32Float, _, _>(&mut encoder, raster, &data, "nan");
    }

    let nodata = raster
        .nodata()
        .and_then(|nd| num_traits::cast::<T, i32>(nd))
        .unwrap_or(i32::MIN);
    let data: Vec<i32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                nodata
            } else {
                num_traits::cast(v).unwrap_or(nodata)
            }
        })
        .collect();
    write_image::<GrayI32, _, _>(&mut encoder, raster, &data, &nodata.to_string())
}

fn write_image<C, T, W>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, data: &[C::Inner], nodata: &str) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geo_key_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .encoder()
        .write_tag(Tag::Unknown(GDAL_NODATA), nodata)
        .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKey directory: model type, raster type (PixelIsArea) and, when the
/// CRS has an EPSG code that fits, the projected or geographic type key.
fn geo_key_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(|c| c.epsg()).and_then(|code| u16::try_from(code).ok());
    let geographic = crs.is_some_and(|c| c.is_geographic());

    let model_type = if geographic { 2 } else { 1 };
    let mut keys: Vec<u16> = vec![
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1,
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }

    let mut directory = vec![1, 1, 0, (keys.len() / 4) as u16];
    directory.extend(keys);
    directory
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landcover() -> Raster<i32> {
        let mut r = Raster::from_vec(vec![30, 50, 70, 99, 82, 81], 2, 3).unwrap();
        r.set_transform(GeoTransform::new(260_000.0, 6_650_000.0, 5.0, -5.0));
        r.set_crs(Some(CRS::from_epsg(25833)));
        r.set_nodata(Some(i32::MIN));
        r.set(1, 2, i32::MIN).unwrap();
        r
    }

    #[test]
    fn test_buffer_roundtrip_keeps_codes_grid_and_crs() {
        let raster = landcover();
        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<i32> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.valid(0, 0), Some(30));
        assert_eq!(back.valid(1, 0), Some(99));
        assert_eq!(back.valid(1, 2), None);
        assert_eq!(back.transform(), raster.transform());
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(25833));
    }

    #[test]
    fn test_file_roundtrip() {
        let raster = landcover();
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path()).unwrap();
        let back: Raster<i32> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(back.valid(0, 2), Some(70));
        assert_eq!(back.valid_count(), 5);
    }

    #[test]
    fn test_codes_written_as_int32_with_nodata_tag() {
        let buf = write_geotiff_to_buffer(&landcover()).unwrap();
        let mut decoder = Decoder::new(Cursor::new(buf.as_slice())).unwrap();

        assert_eq!(read_nodata(&mut decoder), Some(i32::MIN as f64));
        match decoder.read_image().unwrap() {
            DecodingResult::I32(values) => {
                assert_eq!(values, vec![30, 50, 70, 99, 82, i32::MIN]);
            }
            _ => panic!("expected 32-bit integer samples"),
        }
    }

    #[test]
    fn test_mask_nodata_survives_roundtrip() {
        let mut mask: Raster<u8> = Raster::from_vec(vec![0, 1, u8::MAX, 1], 2, 2).unwrap();
        mask.set_nodata(Some(u8::MAX));
        let buf = write_geotiff_to_buffer(&mask).unwrap();
        let back: Raster<u8> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(back.nodata(), Some(u8::MAX));
        assert_eq!(back.valid(1, 0), None);
        assert_eq!(back.valid(0, 1), Some(1));
    }

    #[test]
    fn test_float_nodata_is_nan() {
        let mut areas: Raster<f64> = Raster::from_vec(vec![25.0, f64::NAN], 1, 2).unwrap();
        areas.set_nodata(Some(f64::NAN));
        let buf = write_geotiff_to_buffer(&areas).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.valid(0, 0), Some(25.0));
        assert_eq!(back.valid(0, 1), None);
    }

    #[test]
    fn test_geokeys_for_projected_and_geographic() {
        let utm = geo_key_directory(Some(&CRS::from_epsg(25833)));
        assert_eq!(utm[3], 3);
        assert_eq!(&utm[12..16], &[PROJECTED_CS_TYPE_KEY, 0, 1, 25833]);

        let geo = geo_key_directory(Some(&CRS::wgs84()));
        assert_eq!(geo[7], 2);
        assert_eq!(&geo[12..16], &[GEOGRAPHIC_TYPE_KEY, 0, 1, 4326]);

        let none = geo_key_directory(None);
        assert_eq!(none[3], 2);
    }
}
