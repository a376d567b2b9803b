//! End-to-end tests over real GeoTIFF tiles on disk.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use geodem::geoid::GridGeometry;
use geodem::{
    write_geotiff, BoundingBox, Dataset, Decoders, DemTile, GdemService, GeoTiffDecoder,
    GeodemError, LoadOptions, NodeFilter, PixelGrid, SearchPath, TileDecoder, UndulationGrid,
    UNDULATION_SENTINEL,
};
use tempfile::TempDir;

/// Write a 5° SRTM tile of 0.5° pixels where every pixel holds `value`.
fn create_srtm_tile(dir: &Path, nl: i32, np: i32, value: f32) {
    let west = f64::from((nl - 1) * 5 - 180);
    let north = 60.0 - f64::from((np - 1) * 5);
    let grid = PixelGrid::new(west, north, 0.5, 0.5, 10, 10);
    let tile = DemTile::filled(grid, value, Some(-32768.0));
    write_geotiff(&dir.join(format!("srtm_{nl:02}_{np:02}.tif")), &tile).unwrap();
}

/// Global 30° undulation grid where node `(row, col)` holds `100 * row + col`.
fn create_geoid(dir: &Path) -> GridGeometry {
    let geometry = GridGeometry {
        lat_north: 90.0,
        lon_west: 0.0,
        dlat: 30.0,
        dlon: 30.0,
        nrows: 7,
        ncols: 13,
        margin: 3,
    };
    let mut file = File::create(dir.join("coarse.grd")).unwrap();
    for row in 0..geometry.nrows {
        for col in 0..geometry.ncols {
            let value = (100 * row + col) as f32;
            file.write_all(&value.to_le_bytes()).unwrap();
        }
    }
    geometry
}

#[test]
fn test_point_queries_over_geotiff_tiles() {
    let temp_dir = TempDir::new().unwrap();
    create_srtm_tile(temp_dir.path(), 41, 5, 321.0);
    let service = GdemService::new(Dataset::Srtm, SearchPath::new([temp_dir.path()]));

    assert_eq!(service.point_elevation(23.0, 38.0).unwrap(), Some(321.0));
    assert_eq!(
        service.point_elevation_interpolated(21.3, 36.8).unwrap(),
        Some(321.0)
    );
    // Neighbouring tile is absent.
    assert_eq!(service.point_elevation(26.0, 38.0).unwrap(), None);

    let stats = service.cache_stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.not_found_count, 1);
}

#[test]
fn test_first_root_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    create_srtm_tile(first.path(), 41, 5, 1.0);
    create_srtm_tile(second.path(), 41, 5, 2.0);
    create_srtm_tile(second.path(), 42, 5, 3.0);

    let service = GdemService::builder(Dataset::Srtm)
        .root(first.path())
        .root(second.path())
        .build()
        .unwrap();
    assert_eq!(service.point_elevation(23.0, 38.0).unwrap(), Some(1.0));
    assert_eq!(service.point_elevation(27.0, 38.0).unwrap(), Some(3.0));
}

#[test]
fn test_zipped_tile_is_extracted() {
    let staging = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    create_srtm_tile(staging.path(), 41, 5, 77.0);
    let tiff = std::fs::read(staging.path().join("srtm_41_05.tif")).unwrap();

    let file = File::create(data_dir.path().join("srtm_41_05.zip")).unwrap();
    let mut zip_writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip_writer.start_file("srtm_41_05.tif", options).unwrap();
    zip_writer.write_all(&tiff).unwrap();
    zip_writer.finish().unwrap();

    let service = GdemService::new(Dataset::Srtm, SearchPath::new([data_dir.path()]));
    assert_eq!(service.point_elevation(23.0, 38.0).unwrap(), Some(77.0));
    assert!(data_dir.path().join("srtm_41_05.tif").is_file());

    // The archive is listed under the tile name.
    let frames = service.enumerate_frame_rectangles(None);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].name, "srtm_41_05.tif");
}

#[test]
fn test_mosaic_roundtrip_through_geotiff() {
    let temp_dir = TempDir::new().unwrap();
    create_srtm_tile(temp_dir.path(), 41, 5, 100.0);
    create_srtm_tile(temp_dir.path(), 42, 5, 200.0);
    let service = GdemService::new(Dataset::Srtm, SearchPath::new([temp_dir.path()]));

    let window = BoundingBox::new(24.0, 37.0, 26.0, 38.0);
    let mosaic = service.join_dem(&window).unwrap().unwrap();
    assert_eq!(mosaic.width(), 4);
    assert_eq!(mosaic.height(), 2);
    assert_eq!(mosaic.get_elevation(24.75, 37.5), Some(100.0));
    assert_eq!(mosaic.get_elevation(25.25, 37.5), Some(200.0));

    let out = temp_dir.path().join("mosaic.tif");
    write_geotiff(&out, &mosaic).unwrap();
    let reread = GeoTiffDecoder.load(&out, &LoadOptions::default()).unwrap();
    assert_eq!(reread.grid(), mosaic.grid());
    assert_eq!(reread.data(), mosaic.data());
    assert_eq!(reread.nodata(), Some(-32768.0));
}

#[test]
fn test_nodes_of_loaded_tiles() {
    let temp_dir = TempDir::new().unwrap();
    create_srtm_tile(temp_dir.path(), 41, 5, 5.0);
    create_srtm_tile(temp_dir.path(), 42, 5, 6.0);
    let service = GdemService::new(Dataset::Srtm, SearchPath::new([temp_dir.path()]));

    let tiles = service
        .query_window_or_fail(&BoundingBox::new(24.0, 37.0, 26.0, 38.0), true)
        .unwrap();
    assert_eq!(tiles.len(), 2);
    assert_eq!(service.iter_nodes(NodeFilter::ValidOnly, None).count(), 200);

    let east = BoundingBox::new(25.0, 35.0, 30.0, 40.0);
    assert!(service
        .iter_nodes(NodeFilter::All, Some(&east))
        .all(|node| node.z == 6.0));
}

#[test]
fn test_greek_sheets_need_an_img_decoder() {
    let temp_dir = TempDir::new().unwrap();
    // Sheet 0400043950 spans x 400000..404000, y 4392000..4395000.
    let grid = PixelGrid::new(400_000.0, 4_395_000.0, 100.0, 100.0, 40, 30);
    let tile = DemTile::filled(grid, 250.0, None);
    write_geotiff(&temp_dir.path().join("0400043950.img"), &tile).unwrap();

    let service = GdemService::new(Dataset::GreekOld, SearchPath::new([temp_dir.path()]));
    assert!(matches!(
        service.point_elevation(401_000.0, 4_393_000.0),
        Err(GeodemError::UnsupportedFormat { .. })
    ));

    // The sheets in this test happen to be GeoTIFFs, so reuse that decoder.
    let service = GdemService::builder(Dataset::GreekOld)
        .root(temp_dir.path())
        .decoders(Decoders::default().with_img(Arc::new(GeoTiffDecoder)))
        .build()
        .unwrap();
    assert_eq!(
        service.point_elevation(401_000.0, 4_393_000.0).unwrap(),
        Some(250.0)
    );
}

#[test]
fn test_tandemx_heights_with_geoid() {
    let temp_dir = TempDir::new().unwrap();
    let geometry = create_geoid(temp_dir.path());
    let grid = PixelGrid::new(45.0, 16.0, 0.25, 0.25, 4, 4);
    write_geotiff(
        &temp_dir.path().join("tdm1_dem__30_n15e045_dem.tif"),
        &DemTile::filled(grid, 400.0, Some(-32767.0)),
    )
    .unwrap();

    let search = SearchPath::new([temp_dir.path()]);
    let geoid = UndulationGrid::new("coarse.grd", search.clone(), geometry);
    assert!(!geoid.is_initialized());

    let service = GdemService::builder(Dataset::TandemX30)
        .search_path(search)
        .geoid(geoid)
        .build()
        .unwrap();
    let h = service.point_elevation(45.0, 15.0).unwrap().unwrap();
    assert!((h - (400.0 - 251.5)).abs() < 1e-4, "got {h}");
}

#[test]
fn test_undulation_grid_boundaries() {
    let temp_dir = TempDir::new().unwrap();
    let geometry = create_geoid(temp_dir.path());
    let mut grid = UndulationGrid::open(temp_dir.path().join("coarse.grd"), geometry);

    assert_eq!(grid.undulation(0.0, 91.0).unwrap(), UNDULATION_SENTINEL);
    // South pole row, 30°E: node (6, 1).
    assert!((grid.undulation(30.0, -90.0).unwrap() - 601.0).abs() < 1e-9);
    assert!(grid.is_initialized());

    let (col, row) = grid.pixel_coordinate(0.0, 90.0);
    assert_eq!((col, row), (0, 0));
    assert!(col < (geometry.ncols + 2 * geometry.margin) as i64);
    assert!(row < (geometry.nrows + 2 * geometry.margin) as i64);
}
