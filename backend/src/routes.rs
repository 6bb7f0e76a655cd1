use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::ContentType;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use shared::{PredictionResponse, PredictionResult};

use crate::error::PredictError;
use crate::inference::{InferenceError, Model, Prediction};
use crate::storage::{StorageError, StoredUpload, UploadStore};
use crate::views;

const FILE_FIELD: &str = "file";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(serve_index)))
        .service(web::resource("/predict").route(web::post().to(handle_upload)))
        .service(web::resource("/api/predict").route(web::post().to(handle_api_upload)))
        .service(web::resource("/uploads/{filename}").route(web::get().to(serve_uploaded_file)));
}

struct FileField {
    file_name: String,
    data: Vec<u8>,
}

struct PredictionOutcome {
    upload: StoredUpload,
    prediction: Prediction,
    result: PredictionResult,
}

async fn serve_index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(views::render_index())
}

/// Pulls the first `file` field out of the form; other fields are drained and ignored.
async fn read_file_field(payload: &mut Multipart) -> Result<FileField, PredictError> {
    let mut upload: Option<FileField> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let wanted = upload.is_none() && field.name() == Some(FILE_FIELD);
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                warn!("Failed to read multipart field: {}", e);
                PredictError::InvalidUpload
            })?;
            if wanted {
                data.extend_from_slice(&chunk);
            }
        }

        if wanted {
            upload = Some(FileField {
                file_name: file_name.unwrap_or_default(),
                data,
            });
        }
    }

    match upload {
        Some(field) if !field.file_name.is_empty() => Ok(field),
        _ => Err(PredictError::InvalidUpload),
    }
}

async fn run_prediction(
    model: web::Data<Model>,
    store: web::Data<UploadStore>,
    field: FileField,
) -> Result<PredictionOutcome, PredictError> {
    let save_store = store.clone();
    let upload = web::block(move || save_store.save(&field.file_name, &field.data))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))
        .and_then(|saved| saved)
        .map_err(|e| {
            if let StorageError::Io(io) = &e {
                error!("Error saving file: {}", io);
            }
            PredictError::from(e)
        })?;

    let predict_model = model.clone();
    let predict_store = store.clone();
    let stored = upload.clone();
    let prediction = web::block(move || {
        let prediction = predict_model.predict(&stored.path);
        predict_store.release(&stored);
        prediction
    })
    .await
    .map_err(|e| InferenceError::Model(e.to_string()))
    .and_then(|predicted| predicted)
    .map_err(|e| {
        error!("Prediction failed for {}: {}", upload.path.display(), e);
        PredictError::from(e)
    })?;

    let result = PredictionResult::from_class_index(prediction.class_index, model.metadata());
    info!(
        "Predicted {} (class {}) for {} (uploaded as {:?})",
        result.label,
        prediction.class_index,
        upload.file_name,
        upload.original_name
    );

    Ok(PredictionOutcome {
        upload,
        prediction,
        result,
    })
}

async fn handle_upload(
    model: web::Data<Model>,
    store: web::Data<UploadStore>,
    mut payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let field = read_file_field(&mut payload).await?;
    let outcome = run_prediction(model, store, field).await?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(views::render_result(&outcome.result, &outcome.upload.file_name)))
}

async fn handle_api_upload(
    model: web::Data<Model>,
    store: web::Data<UploadStore>,
    mut payload: Multipart,
) -> HttpResponse {
    let outcome = match read_file_field(&mut payload).await {
        Ok(field) => run_prediction(model, store, field).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => HttpResponse::Ok().json(PredictionResponse {
            filename: outcome.upload.file_name,
            result: outcome.result,
            probabilities: outcome.prediction.probabilities,
        }),
        Err(e) => e.json_response(),
    }
}

async fn serve_uploaded_file(
    req: HttpRequest,
    store: web::Data<UploadStore>,
    filename: web::Path<String>,
) -> HttpResponse {
    let filename = filename.into_inner();
    let Some(path) = store.resolve(&filename) else {
        info!("Rejected upload path: {}", filename);
        return HttpResponse::NotFound().body("File not found");
    };

    match NamedFile::open_async(&path).await {
        Ok(file) if file.metadata().is_file() => file.into_response(&req),
        Ok(_) => {
            info!("Upload not found: {}", filename);
            HttpResponse::NotFound().body("File not found")
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("Upload not found: {}", filename);
            HttpResponse::NotFound().body("File not found")
        }
        Err(e) => {
            error!("Failed to open upload {}: {}", path.display(), e);
            HttpResponse::InternalServerError().body("Error reading file")
        }
    }
}
