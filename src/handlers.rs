use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{error::JsonPayloadError, http::header::ContentType, web, HttpRequest, HttpResponse};
use tracing::Instrument;
use uuid::Uuid;

use crate::decode::decode_image64;
use crate::error::ServiceError;
use crate::models::{parse_image_id, IdQuery, ModelLinks, PredictRequest, PredictionScores};
use crate::preprocess::{self, ChannelOrder};
use crate::state::{AppState, ModelEndpoint};

/// Registers every route for the models and store held by `state`.
pub fn routes(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state.clone()))
            .app_data(
                web::JsonConfig::default()
                    .limit(state.max_body_bytes)
                    .error_handler(json_error),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|_, _| ServiceError::BadRequest("Bad request format").into()),
            )
            .route("/", web::get().to(welcome))
            .route("/info", web::get().to(info));

        for endpoint in &state.endpoints {
            let data = web::Data::new(endpoint.clone());
            cfg.service(
                web::resource(format!("/{}", endpoint.name))
                    .app_data(data.clone())
                    .route(web::get().to(model_classes)),
            )
            .service(
                web::resource(format!("/{}/predict", endpoint.name))
                    .app_data(data)
                    .route(web::post().to(predict_inline)),
            );
        }

        if state.store.is_some() && state.primary().is_some() {
            cfg.route("/predict", web::get().to(predict_stored));
        }
    }
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!("rejected JSON body: {err}");
    match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            ServiceError::BadRequest("Request body too large").into()
        }
        _ => ServiceError::BadRequest("Bad request format").into(),
    }
}

pub async fn welcome() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body("<h1 style='color:#04aa6d'>welcome to doctor ai collab web api</h1>")
}

pub async fn info(state: web::Data<AppState>) -> HttpResponse {
    let listing: BTreeMap<&str, ModelLinks> = state
        .endpoints
        .iter()
        .map(|endpoint| {
            let links = ModelLinks {
                classes: format!("{}/{}", state.public_url, endpoint.name),
                predict: format!("{}/{}/predict", state.public_url, endpoint.name),
                labels: endpoint.labels.iter().map(str::to_string).collect(),
            };
            (endpoint.name.as_str(), links)
        })
        .collect();

    HttpResponse::Ok().json(listing)
}

pub async fn model_classes(endpoint: web::Data<ModelEndpoint>) -> HttpResponse {
    let mut body = format!(
        "<h1 style='color:#04aa6d'>Supported classes by {}:</h1><ul>",
        escape_html(&endpoint.name.replace('_', "-"))
    );
    for label in endpoint.labels.iter() {
        body.push_str("<li>");
        body.push_str(&escape_html(label));
        body.push_str("</li>");
    }
    body.push_str("</ul>");

    HttpResponse::Ok().content_type(ContentType::html()).body(body)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub async fn predict_inline(
    state: web::Data<AppState>,
    endpoint: web::Data<ModelEndpoint>,
    body: web::Json<PredictRequest>,
) -> Result<HttpResponse, ServiceError> {
    let image64 = body
        .into_inner()
        .image64
        .ok_or(ServiceError::BadRequest("Base64 image not provided"))?;

    let span = tracing::info_span!(
        "predict",
        request_id = %Uuid::new_v4(),
        model = %endpoint.name,
        source = "inline"
    );
    let scores = classify(&endpoint, state.channel_order, ImageInput::Inline(image64))
        .instrument(span)
        .await?;

    Ok(HttpResponse::Ok().json(scores))
}

pub async fn predict_stored(
    state: web::Data<AppState>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ServiceError> {
    let id = parse_image_id(query.id.as_deref())?;
    let (store, endpoint) = match (&state.store, state.primary()) {
        (Some(store), Some(endpoint)) => (store, endpoint),
        _ => {
            return Err(ServiceError::Inference(anyhow::anyhow!(
                "database lookup requested without a store and model"
            )))
        }
    };

    let span = tracing::info_span!(
        "predict",
        request_id = %Uuid::new_v4(),
        model = %endpoint.name,
        source = "database",
        image_id = id
    );
    let scores = async {
        let bytes = store.fetch(id).await?;
        classify(endpoint, state.channel_order, ImageInput::Stored(bytes)).await
    }
    .instrument(span)
    .await?;

    Ok(HttpResponse::Ok().json(scores))
}

enum ImageInput {
    Inline(String),
    Stored(Vec<u8>),
}

/// Decode, resize and forward pass run on the blocking pool.
async fn classify(
    endpoint: &ModelEndpoint,
    order: ChannelOrder,
    input: ImageInput,
) -> Result<PredictionScores, ServiceError> {
    let classifier = Arc::clone(&endpoint.classifier);
    let shape = endpoint.shape;

    let scores = web::block(move || -> Result<Vec<f32>, ServiceError> {
        let bytes = match input {
            ImageInput::Inline(uri) => decode_image64(&uri)?,
            ImageInput::Stored(bytes) => bytes,
        };
        let batch = preprocess::to_batch(&bytes, shape, order)?;
        classifier.classify(batch).map_err(ServiceError::Inference)
    })
    .await
    .map_err(|err| ServiceError::Inference(anyhow::anyhow!("blocking pool failure: {err}")))??;

    let scores = PredictionScores::new(&endpoint.labels, &scores)?;
    tracing::info!("prediction served");
    Ok(scores)
}
