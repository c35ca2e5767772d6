//! HTTP-level tests with a stub classifier in place of the ONNX network.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::{http::StatusCode, test, App};
use base64::{prelude::BASE64_STANDARD, Engine};
use image::{ImageOutputFormat, Rgb, RgbImage};
use ndarray::Array4;
use serde_json::{json, Value};
use sqlx::{AnyConnection, Connection};

use doctor_ai_api::inference::Classifier;
use doctor_ai_api::labels::{ClassLabels, MODEL_V1_CLASSES};
use doctor_ai_api::preprocess::InputShape;
use doctor_ai_api::store::BlobStore;
use doctor_ai_api::{routes, AppState, ModelEndpoint};

/// Returns fixed scores and records the batch shape it was given.
struct FixedScores {
    scores: Vec<f32>,
    calls: AtomicUsize,
    expected_shape: [usize; 4],
}

impl Classifier for FixedScores {
    fn classify(&self, batch: Array4<f32>) -> anyhow::Result<Vec<f32>> {
        anyhow::ensure!(batch.shape() == self.expected_shape, "unexpected shape");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }
}

fn stub(scores: Vec<f32>, side: usize) -> Arc<FixedScores> {
    Arc::new(FixedScores {
        scores,
        calls: AtomicUsize::new(0),
        expected_shape: [1, side, side, 3],
    })
}

fn endpoint(name: &str, labels: ClassLabels, side: u32, classifier: Arc<FixedScores>) -> ModelEndpoint {
    ModelEndpoint {
        name: name.to_string(),
        labels,
        shape: InputShape::square(side),
        classifier,
    }
}

fn v1_state(classifier: Arc<FixedScores>) -> AppState {
    let labels = ClassLabels::new(MODEL_V1_CLASSES);
    AppState::new(
        vec![endpoint("model_v1", labels, 8, classifier)],
        "http://localhost:5000/",
    )
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(12, 20, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

fn data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64_STANDARD.encode(bytes))
}

fn is_percentage(value: &Value) -> bool {
    let Some(s) = value.as_str() else { return false };
    let Some((whole, frac)) = s.split_once('.') else { return false };
    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.len() == 2
        && frac.bytes().all(|b| b.is_ascii_digit())
}

#[actix_web::test]
async fn welcome_page_is_html() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("welcome to doctor ai collab web api"));
}

#[actix_web::test]
async fn info_lists_links_and_labels() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/info").to_request()).await;
    assert_eq!(body["model_v1"]["classes"], "http://localhost:5000/model_v1");
    assert_eq!(body["model_v1"]["predict"], "http://localhost:5000/model_v1/predict");
    assert_eq!(body["model_v1"]["labels"].as_array().unwrap().len(), 14);
    assert!(body.get("model_v2").is_none());
}

#[actix_web::test]
async fn model_page_lists_every_class() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/model_v1").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    for label in MODEL_V1_CLASSES {
        assert!(html.contains(&format!("<li>{label}</li>")), "{label}");
    }
}

#[actix_web::test]
async fn model_page_escapes_label_markup() {
    let labels = ClassLabels::new(["<b>Mass</b>", "Edema & Effusion"]);
    let state = AppState::new(
        vec![endpoint("model_v1", labels, 8, stub(vec![], 8))],
        "http://localhost:5000",
    );
    let app = test::init_service(App::new().configure(routes(state))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/model_v1").to_request()).await;
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains("Supported classes by model-v1:"));
    assert!(html.contains("<li>&lt;b&gt;Mass&lt;/b&gt;</li>"));
    assert!(html.contains("<li>Edema &amp; Effusion</li>"));
    assert!(!html.contains("<b>"));
}

#[actix_web::test]
async fn predict_returns_every_label_as_percentage() {
    let scores: Vec<f32> = (0..14).map(|i| i as f32 / 20.0).collect();
    let classifier = stub(scores, 8);
    let app = test::init_service(App::new().configure(routes(v1_state(classifier.clone())))).await;

    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .set_json(json!({ "image64": data_uri(&png_bytes()) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 14);
    for label in MODEL_V1_CLASSES {
        assert!(is_percentage(&object[label]), "{label}: {}", object[label]);
    }
    assert_eq!(object["Atelectasis"], "0.00");
    assert_eq!(object["Cardiomegaly"], "5.00");
    assert_eq!(object["Hernia"], "65.00");
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn predict_accepts_unpadded_payload() {
    let classifier = stub(vec![0.0321; 14], 8);
    let app = test::init_service(App::new().configure(routes(v1_state(classifier)))).await;

    let payload = data_uri(&png_bytes());
    let unpadded = payload.trim_end_matches('=');
    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .set_json(json!({ "image64": unpadded }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["Pneumonia"], "3.21");
}

#[actix_web::test]
async fn missing_image_is_bad_request() {
    let classifier = stub(vec![0.5; 14], 8);
    let app = test::init_service(App::new().configure(routes(v1_state(classifier.clone())))).await;

    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Base64 image not provided" }));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn malformed_json_is_bad_request() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Bad request format");
}

#[actix_web::test]
async fn oversized_body_is_bad_request() {
    let state = v1_state(stub(vec![], 8)).with_max_body_bytes(64);
    let app = test::init_service(App::new().configure(routes(state))).await;

    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .set_json(json!({ "image64": data_uri(&png_bytes()) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Request body too large");
}

#[actix_web::test]
async fn malformed_base64_is_decode_error() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    for image64 in ["iVBORw0KGgo", "data:image/png;base64,@@@@"] {
        let req = test::TestRequest::post()
            .uri("/model_v1/predict")
            .set_json(json!({ "image64": image64 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "decoding base64 image failed", "{image64}");
    }
}

#[actix_web::test]
async fn non_image_payload_is_image_error() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .set_json(json!({ "image64": data_uri(b"plain text, not pixels") }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Image Processing Failed!");
}

#[actix_web::test]
async fn label_count_mismatch_is_server_error() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![0.1; 3], 8))))).await;

    let req = test::TestRequest::post()
        .uri("/model_v1/predict")
        .set_json(json!({ "image64": data_uri(&png_bytes()) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Inference failed");
}

#[actix_web::test]
async fn each_model_uses_its_own_shape_and_labels() {
    let v1 = stub(vec![0.0; 14], 8);
    let v2 = stub(vec![0.25, 0.75], 16);
    let state = AppState::new(
        vec![
            endpoint("model_v1", ClassLabels::new(MODEL_V1_CLASSES), 8, v1.clone()),
            endpoint("model_v2", ClassLabels::new(["Edema", "Mass"]), 16, v2.clone()),
        ],
        "http://localhost:5000",
    );
    let app = test::init_service(App::new().configure(routes(state))).await;

    let req = test::TestRequest::post()
        .uri("/model_v2/predict")
        .set_json(json!({ "image64": data_uri(&png_bytes()) }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "Edema": "25.00", "Mass": "75.00" }));
    assert_eq!(v1.calls.load(Ordering::SeqCst), 0);
    assert_eq!(v2.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn stored_lookup_is_absent_without_database() {
    let app = test::init_service(App::new().configure(routes(v1_state(stub(vec![], 8))))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/predict?id=1").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

async fn seeded_sqlite(dir: &tempfile::TempDir) -> String {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("images.db").display());
    sqlx::any::install_default_drivers();

    let mut conn = AnyConnection::connect(&url).await.unwrap();
    sqlx::query("CREATE TABLE blog_images (id INTEGER PRIMARY KEY, image_binary BLOB NOT NULL)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blog_images (id, image_binary) VALUES (?, ?)")
        .bind(3_i64)
        .bind(png_bytes())
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();

    url
}

#[actix_web::test]
async fn stored_image_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    let url = seeded_sqlite(&dir).await;
    let classifier = stub(vec![0.5; 14], 8);
    let state = v1_state(classifier.clone()).with_store(BlobStore::new(url));
    let app = test::init_service(App::new().configure(routes(state))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/predict?id=3").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_object().unwrap().len(), 14);
    assert_eq!(body["Edema"], "50.00");
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn unknown_stored_image_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let url = seeded_sqlite(&dir).await;
    let state = v1_state(stub(vec![0.5; 14], 8)).with_store(BlobStore::new(url));
    let app = test::init_service(App::new().configure(routes(state))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/predict?id=99").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Image not found");
}

#[actix_web::test]
async fn invalid_ids_never_reach_the_database() {
    // Unreachable on purpose: a database call would answer 503, not 400.
    let state = v1_state(stub(vec![0.5; 14], 8)).with_store(BlobStore::new("mysql://127.0.0.1:1/none"));
    let app = test::init_service(App::new().configure(routes(state))).await;

    for uri in [
        "/predict?id=0",
        "/predict?id=-5",
        "/predict?id=abc",
        "/predict?id=",
        "/predict?id=%2B5",
        "/predict?id=%207%20",
        "/predict",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[actix_web::test]
async fn unreachable_database_is_service_unavailable() {
    let state = v1_state(stub(vec![0.5; 14], 8)).with_store(BlobStore::new("mysql://127.0.0.1:1/none"));
    let app = test::init_service(App::new().configure(routes(state))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/predict?id=1").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Database unavailable");
}
