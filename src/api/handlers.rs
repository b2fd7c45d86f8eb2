use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{multipart::Multipart, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::metadata::Metadata;
use crate::processor::{Processor, DEFAULT_NIR_BAND, DEFAULT_RED_BAND};
use crate::raster::Crs;
use crate::temp::ScopedTempFile;

use super::models::*;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

const DEFAULT_TARGET_CRS: &str = "EPSG:4326";

/// Shared by every request
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
}

impl AppState {
    pub fn new(processor: Processor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    fn config(&self) -> &Config {
        self.processor.config()
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// HTTP status of a processing failure
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::CrsMismatch(_) | Error::BandIndexOutOfRange(_) | Error::ReprojectionFailure(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::WriteFailure(_) | Error::ComputationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn from_error(error: Error) -> ApiError {
    let status = status_for(&error);
    warn!(kind = error.kind(), status = status.as_u16(), "{}", error);
    error_response(status, error.to_string())
}

/// An uploaded file part
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Query parameters of a request
type Params = Query<HashMap<String, String>>;

/// Multipart body split into file parts and text fields
#[derive(Default)]
struct Form {
    files: HashMap<String, Upload>,
    fields: HashMap<String, String>,
}

impl Form {
    /// Reads every part; query parameters override text fields of the same name
    async fn read(Query(query): Params, mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Form::default();
        let rejected = |e: axum::extract::multipart::MultipartError| error_response(e.status(), e.body_text());

        while let Some(field) = multipart.next_field().await.map_err(rejected)? {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(rejected)?.to_vec();
                    form.files.insert(name, Upload { file_name, bytes });
                }
                None => {
                    let text = field.text().await.map_err(rejected)?;
                    form.fields.insert(name, text);
                }
            }
        }
        form.fields.extend(query);
        Ok(form)
    }

    /// GeoTIFF upload named `name`
    fn file(&mut self, name: &str) -> Result<Upload, ApiError> {
        let upload = self
            .files
            .remove(name)
            .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, format!("Missing file field '{}'", name)))?;

        let lower = upload.file_name.to_ascii_lowercase();
        if !(lower.ends_with(".tif") || lower.ends_with(".tiff")) {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("'{}' is not a GeoTIFF (.tif or .tiff)", upload.file_name),
            ));
        }
        Ok(upload)
    }

    /// Text field `name` parsed as `T`, or `default` when absent
    fn value<T: FromStr>(&self, name: &str, default: T) -> Result<T, ApiError> {
        match self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            None => Ok(default),
            Some(text) => text.parse().map_err(|_| {
                error_response(StatusCode::BAD_REQUEST, format!("Invalid value for '{}': {}", name, text))
            }),
        }
    }
}

/// Runs a pipeline on the blocking pool
async fn run<T, F>(state: &AppState, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Processor) -> crate::Result<T> + Send + 'static,
{
    let processor = Arc::clone(&state.processor);
    tokio::task::spawn_blocking(move || job(&processor))
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing task failed: {}", e)))?
        .map_err(from_error)
}

fn stage(config: &Config, upload: &Upload) -> crate::Result<ScopedTempFile> {
    ScopedTempFile::create(&config.temp_dir, &upload.file_name, &upload.bytes)
}

pub async fn root(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to {}", state.config().project_name),
    })
}

pub async fn metadata(
    State(state): State<AppState>,
    query: Params,
    multipart: Multipart,
) -> Result<Json<Metadata>, ApiError> {
    let upload = Form::read(query, multipart).await?.file("file")?;
    info!(file = %upload.file_name, "metadata request");

    run(&state, move |processor| {
        let input = stage(processor.config(), &upload)?;
        processor.metadata(input.path())
    })
    .await
    .map(Json)
}

pub async fn reproject(
    State(state): State<AppState>,
    query: Params,
    multipart: Multipart,
) -> Result<Json<ReprojectResponse>, ApiError> {
    let mut form = Form::read(query, multipart).await?;
    let upload = form.file("file")?;
    let target = Crs::new(form.value("target_crs", DEFAULT_TARGET_CRS.to_string())?);
    info!(file = %upload.file_name, target = %target, "reproject request");

    let output = run(&state, move |processor| {
        let input = stage(processor.config(), &upload)?;
        processor.reproject(input.path(), &target)
    })
    .await?;
    Ok(Json(ReprojectResponse::new(output, state.config())))
}

pub async fn ndvi_from_bands(
    State(state): State<AppState>,
    query: Params,
    multipart: Multipart,
) -> Result<Json<NdviResponse>, ApiError> {
    let mut form = Form::read(query, multipart).await?;
    let red = form.file("red_file")?;
    let nir = form.file("nir_file")?;
    info!(red = %red.file_name, nir = %nir.file_name, "ndvi request");
    let (filename_red, filename_nir) = (red.file_name.clone(), nir.file_name.clone());

    let output = run(&state, move |processor| {
        let red = stage(processor.config(), &red)?;
        let nir = stage(processor.config(), &nir)?;
        processor.vegetation_index(red.path(), nir.path())
    })
    .await?;
    Ok(Json(NdviResponse {
        filename_red: Some(filename_red),
        filename_nir: Some(filename_nir),
        ..NdviResponse::new(output, state.config())
    }))
}

pub async fn ndvi_from_multiband(
    State(state): State<AppState>,
    query: Params,
    multipart: Multipart,
) -> Result<Json<NdviResponse>, ApiError> {
    let mut form = Form::read(query, multipart).await?;
    let upload = form.file("file")?;
    let red_band = form.value("red_band", DEFAULT_RED_BAND)?;
    let nir_band = form.value("nir_band", DEFAULT_NIR_BAND)?;
    info!(file = %upload.file_name, red_band, nir_band, "multi-band ndvi request");
    let filename = upload.file_name.clone();

    let output = run(&state, move |processor| {
        let input = stage(processor.config(), &upload)?;
        processor.vegetation_index_from_bands(input.path(), red_band, nir_band)
    })
    .await?;
    Ok(Json(NdviResponse {
        filename: Some(filename),
        ..NdviResponse::new(output, state.config())
    }))
}

pub async fn change_detection(
    State(state): State<AppState>,
    query: Params,
    multipart: Multipart,
) -> Result<Json<ChangeResponse>, ApiError> {
    let mut form = Form::read(query, multipart).await?;
    let first = form.file("image1")?;
    let second = form.file("image2")?;
    let band = form.value("band", 1usize)?;
    let threshold = form.value("threshold", state.config().default_threshold)?;
    info!(image1 = %first.file_name, image2 = %second.file_name, band, threshold, "change detection request");

    let output = run(&state, move |processor| {
        let first = stage(processor.config(), &first)?;
        let second = stage(processor.config(), &second)?;
        processor.detect_change(first.path(), second.path(), band, Some(threshold))
    })
    .await?;
    Ok(Json(ChangeResponse::new(output, state.config())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::InvalidFormat(String::new())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&Error::CrsMismatch(String::new())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::BandIndexOutOfRange(String::new())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::ReprojectionFailure(String::new())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::WriteFailure(String::new())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(&Error::ComputationFailure(String::new())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
