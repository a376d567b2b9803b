//! Tile decoders.
//!
//! The cache never parses raster files itself: it hands the resolved path to
//! a [`TileDecoder`]. [`GeoTiffDecoder`] handles the `.tif` datasets; other
//! formats (the legacy Greek `.img` sheets) are plugged in through
//! [`Decoders::with_img`].

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{GeodemError, Result};
use crate::scheme::BoundingBox;
use crate::tile::{DemTile, PixelGrid};

/// GeoTIFF ModelPixelScaleTag.
const TAG_PIXEL_SCALE: u16 = 33550;
/// GeoTIFF ModelTiepointTag.
const TAG_TIEPOINT: u16 = 33922;
/// GDAL_NODATA, stored as an ASCII string.
const TAG_GDAL_NODATA: u16 = 42113;

/// Largest buffer the TIFF decoder may allocate (1 GiB).
const DECODE_LIMIT: usize = 1024 * 1024 * 1024;

/// Per-dataset settings passed to the decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Whether the heights in the file are orthometric.
    pub orthometric: bool,
    /// Nodata value used when the file does not declare one.
    pub nodata: Option<f32>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            orthometric: true,
            nodata: None,
        }
    }
}

/// Reads a raster file into a [`DemTile`].
pub trait TileDecoder: Send + Sync + fmt::Debug {
    /// Decode the whole tile.
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<DemTile>;

    /// Extent of the tile without keeping its samples.
    fn read_bounds(&self, path: &Path) -> Result<BoundingBox> {
        Ok(self.load(path, &LoadOptions::default())?.bounds())
    }
}

/// Decoder for single-band GeoTIFF tiles georeferenced with a tiepoint and
/// pixel scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffDecoder;

impl GeoTiffDecoder {
    fn open<'a>(mmap: &'a Mmap) -> Result<Decoder<Cursor<&'a [u8]>>> {
        let mut limits = Limits::default();
        limits.decoding_buffer_size = DECODE_LIMIT;
        limits.intermediate_buffer_size = DECODE_LIMIT;
        limits.ifd_value_size = DECODE_LIMIT;
        Ok(Decoder::new(Cursor::new(&mmap[..]))?.with_limits(limits))
    }

    fn map(path: &Path) -> Result<Mmap> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and lives only for one decode;
        // tile files are not modified while in use.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(mmap)
    }

    /// Pixel grid from the tiepoint and pixel scale tags.
    fn read_grid<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<PixelGrid> {
        let (width, height) = decoder.dimensions()?;
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_TIEPOINT))
            .map_err(|_| GeodemError::InvalidGeoTiff("missing ModelTiepoint tag".into()))?;
        let scale = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_PIXEL_SCALE))
            .map_err(|_| GeodemError::InvalidGeoTiff("missing ModelPixelScale tag".into()))?;

        if tiepoint.len() < 6 || scale.len() < 2 {
            return Err(GeodemError::InvalidGeoTiff(format!(
                "tiepoint has {} values and pixel scale {}",
                tiepoint.len(),
                scale.len()
            )));
        }
        if scale[0] <= 0.0 || scale[1] <= 0.0 {
            return Err(GeodemError::InvalidGeoTiff(format!(
                "non-positive pixel scale {} x {}",
                scale[0], scale[1]
            )));
        }

        // Tiepoint: raster (i, j, k) maps to model (x, y, z).
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let (x, y) = (tiepoint[3], tiepoint[4]);
        Ok(PixelGrid::new(
            x - i * scale[0],
            y + j * scale[1],
            scale[0],
            scale[1],
            width as usize,
            height as usize,
        ))
    }

    fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
    }

    fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
        let data = match decoder.read_image()? {
            DecodingResult::F32(data) => data,
            DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I16(data) => data.into_iter().map(f32::from).collect(),
            DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U16(data) => data.into_iter().map(f32::from).collect(),
            DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U8(data) => data.into_iter().map(f32::from).collect(),
            DecodingResult::I8(data) => data.into_iter().map(f32::from).collect(),
            DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
        };
        Ok(data)
    }
}

impl TileDecoder for GeoTiffDecoder {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<DemTile> {
        let mmap = Self::map(path)?;
        let mut decoder = Self::open(&mmap)?;

        let grid = Self::read_grid(&mut decoder)?;
        let nodata = Self::read_nodata(&mut decoder).or(options.nodata);
        let data = Self::decode_samples(&mut decoder)?;

        debug!(
            path = %path.display(),
            width = grid.width,
            height = grid.height,
            "decoded GeoTIFF tile"
        );
        Ok(DemTile::new(grid, data, nodata)?.with_orthometric(options.orthometric))
    }

    fn read_bounds(&self, path: &Path) -> Result<BoundingBox> {
        let mmap = Self::map(path)?;
        let mut decoder = Self::open(&mmap)?;
        Ok(Self::read_grid(&mut decoder)?.bounds())
    }
}

/// Decoder selection by file extension.
#[derive(Debug, Clone)]
pub struct Decoders {
    img: Option<Arc<dyn TileDecoder>>,
    default: Arc<dyn TileDecoder>,
}

impl Default for Decoders {
    fn default() -> Self {
        Self {
            img: None,
            default: Arc::new(GeoTiffDecoder),
        }
    }
}

impl Decoders {
    /// Use `decoder` for every file that is not `.img`.
    pub fn with_default(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.default = decoder;
        self
    }

    /// Use `decoder` for `.img` files.
    pub fn with_img(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.img = Some(decoder);
        self
    }

    /// The decoder responsible for `path`.
    ///
    /// # Errors
    ///
    /// [`GeodemError::UnsupportedFormat`] for `.img` files when no img
    /// decoder is registered.
    pub fn for_path(&self, path: &Path) -> Result<&dyn TileDecoder> {
        let is_img = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("img"));
        if !is_img {
            return Ok(self.default.as_ref());
        }
        self.img
            .as_deref()
            .ok_or_else(|| GeodemError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }
}

/// Write a tile as a single-band `f32` GeoTIFF.
///
/// The file carries the tiepoint, pixel scale and (if set) GDAL nodata tags,
/// so [`GeoTiffDecoder`] reads it back with the same pixel grid.
pub fn write_geotiff(path: &Path, tile: &DemTile) -> Result<()> {
    let grid = tile.grid();
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(file)?;
    let mut image =
        encoder.new_image::<colortype::Gray32Float>(grid.width as u32, grid.height as u32)?;

    let scale = [grid.pixel_width, grid.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, grid.west, grid.north, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_PIXEL_SCALE), &scale[..])?;
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_TIEPOINT), &tiepoint[..])?;
    if let Some(nodata) = tile.nodata() {
        let text = nodata.to_string();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA), text.as_str())?;
    }
    image.write_data(tile.data())?;

    debug!(path = %path.display(), "wrote GeoTIFF");
    Ok(())
}
