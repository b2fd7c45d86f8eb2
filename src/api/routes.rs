use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::processor::Processor;

use super::handlers::*;

pub fn create_router(processor: Processor) -> Router {
    let config = processor.config().clone();
    let prefix = config.api_prefix.trim_end_matches('/');

    Router::new()
        .route("/", get(root))
        .route(&format!("{}/geotiff/metadata", prefix), post(metadata))
        .route(&format!("{}/geotiff/reproject", prefix), post(reproject))
        .route(&format!("{}/ndvi/from-bands", prefix), post(ndvi_from_bands))
        .route(&format!("{}/ndvi/from-multiband", prefix), post(ndvi_from_multiband))
        .route(&format!("{}/change-detection", prefix), post(change_detection))
        .nest_service(&format!("{}/output", prefix), ServeDir::new(&config.output_dir))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(config.max_body_bytes()))
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState::new(processor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::formats::tiff::GeoTiffWriter;
    use crate::raster::{Crs, GeoTransform, RasterGrid, RasterProfile};
    use crate::types::DataType;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const BOUNDARY: &str = "satproc-test-boundary";

    enum Part<'a> {
        File(&'a str, &'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: Vec<Part<'_>>) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/tiff\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value).as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post(uri: &str, parts: Vec<Part<'_>>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn tiff(crs: u32, bands: Vec<Vec<f64>>) -> Vec<u8> {
        let profile = RasterProfile {
            width: 10,
            height: 10,
            count: bands.len(),
            crs: Some(Crs::from_epsg(crs)),
            transform: GeoTransform::from_origin(500000.0, 5000000.0, 10.0, 10.0),
            nodata: None,
            dtype: DataType::U16,
        };
        let grid = RasterGrid::new(profile, bands).unwrap();
        GeoTiffWriter::new(&grid).to_bytes().unwrap()
    }

    fn setup() -> (TempDir, Config) {
        let dir = tempdir().unwrap();
        let config = Config::in_dir(dir.path());
        (dir, config)
    }

    async fn send(config: &Config, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(Processor::new(config.clone()))
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).map_or(true, |mut entries| entries.next().is_none())
    }

    #[tokio::test]
    async fn test_root() {
        let (_dir, config) = setup();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Welcome to Satellite Processing API");
    }

    #[tokio::test]
    async fn test_metadata() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/geotiff/metadata",
            vec![Part::File("file", "scene.tif", tiff(32633, vec![vec![1.0; 100]; 2]))],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["width"], 10);
        assert_eq!(json["count"], 2);
        assert_eq!(json["crs"], "EPSG:32633");
        assert_eq!(json["driver"], "GTiff");
        assert!(is_empty_dir(&config.temp_dir));
    }

    #[tokio::test]
    async fn test_corrupt_upload() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/geotiff/metadata",
            vec![Part::File("file", "broken.tif", b"not a tiff".to_vec())],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid format"));
        assert!(is_empty_dir(&config.temp_dir));
    }

    #[tokio::test]
    async fn test_rejects_non_tiff_upload() {
        let (_dir, config) = setup();
        let request = post("/api/v1/geotiff/metadata", vec![Part::File("file", "notes.txt", b"hi".to_vec())]);
        let (status, _) = send(&config, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_field() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/change-detection",
            vec![Part::File("image1", "a.tif", tiff(32633, vec![vec![1.0; 100]]))],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("image2"));
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let (_dir, mut config) = setup();
        config.max_file_size_mb = 1;
        let request = post(
            "/api/v1/geotiff/metadata",
            vec![Part::File("file", "big.tif", vec![0; 2 * 1024 * 1024])],
        );
        let (status, _) = send(&config, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_ndvi_from_bands_and_download() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/ndvi/from-bands",
            vec![
                Part::File("red_file", "red.tif", tiff(32633, vec![vec![100.0; 100]])),
                Part::File("nir_file", "nir.tif", tiff(32633, vec![vec![300.0; 100]])),
            ],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!((json["mean"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(json["ndvi_png"], "/api/v1/output/red_ndvi.png");
        assert_eq!(json["filename_red"], "red.tif");
        assert_eq!(json["filename_nir"], "nir.tif");
        assert!(json.get("filename").is_none());
        assert!(is_empty_dir(&config.temp_dir));

        let download = Request::builder()
            .uri("/api/v1/output/red_ndvi.png")
            .body(Body::empty())
            .unwrap();
        let response = create_router(Processor::new(config.clone()))
            .oneshot(download)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_multiband_band_out_of_range() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/ndvi/from-multiband",
            vec![
                Part::File("file", "rgb.tif", tiff(32633, vec![vec![1.0; 100]; 3])),
                Part::Text("red_band", "3"),
            ],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Band index out of range"));
        assert!(is_empty_dir(&config.output_dir));
    }

    #[tokio::test]
    async fn test_change_detection() {
        let (_dir, config) = setup();
        let mut after = vec![100.0; 100];
        after[..10].fill(200.0);
        let request = post(
            "/api/v1/change-detection",
            vec![
                Part::File("image1", "before.tif", tiff(32633, vec![vec![100.0; 100]])),
                Part::File("image2", "after.tif", tiff(32633, vec![after])),
                Part::Text("threshold", "0.2"),
            ],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["changed_area_pixels"], 10);
        assert_eq!(json["changed_area_percentage"], 10.0);
        assert_eq!(json["threshold_used"], 0.2);
        assert_eq!(json["dimensions"], "10x10");
        assert_eq!(json["output_tiff"], "/api/v1/output/change_before.tif");
    }

    #[tokio::test]
    async fn test_query_parameters_take_precedence() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/change-detection?threshold=0.3&band=1",
            vec![
                Part::File("image1", "a.tif", tiff(32633, vec![vec![1.0; 100]])),
                Part::File("image2", "b.tif", tiff(32633, vec![vec![1.0; 100]])),
                Part::Text("threshold", "0.2"),
            ],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["threshold_used"], 0.3);
    }

    #[tokio::test]
    async fn test_reproject_target_from_query() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/geotiff/reproject?target_crs=EPSG:3857",
            vec![Part::File("file", "scene.tif", tiff(32633, vec![vec![5.0; 100]]))],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Reprojection successful");
        assert_eq!(json["crs"], "EPSG:3857");
        assert_eq!(json["output_path"], "/api/v1/output/scene_reprojected.tif");
    }

    #[tokio::test]
    async fn test_multiband_bands_from_query() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/ndvi/from-multiband?red_band=1&nir_band=2",
            vec![Part::File(
                "file",
                "pair.tif",
                tiff(32633, vec![vec![100.0; 100], vec![300.0; 100]]),
            )],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["filename"], "pair.tif");
        assert!((json["median"].as_f64().unwrap() - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_change_detection_crs_mismatch() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/change-detection",
            vec![
                Part::File("image1", "a.tif", tiff(32633, vec![vec![1.0; 100]])),
                Part::File("image2", "b.tif", tiff(32634, vec![vec![1.0; 100]])),
            ],
        );
        let (status, json) = send(&config, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("CRS mismatch"));
        assert!(is_empty_dir(&config.temp_dir));
    }

    #[tokio::test]
    async fn test_invalid_threshold() {
        let (_dir, config) = setup();
        let request = post(
            "/api/v1/change-detection",
            vec![
                Part::File("image1", "a.tif", tiff(32633, vec![vec![1.0; 100]])),
                Part::File("image2", "b.tif", tiff(32633, vec![vec![1.0; 100]])),
                Part::Text("threshold", "high"),
            ],
        );
        let (status, _) = send(&config, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
