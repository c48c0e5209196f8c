//! HTTP client tests against an in-process axum stand-in for the detection
//! service.
//!
//! Each test binds the fake to `127.0.0.1:0`, so they run in parallel and
//! need no network access.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use stamp_extractor::{
    ClientConfig, DetectionService, Document, ErrorKind, Phase, StampApiClient, StampError,
    Workbench,
};
use std::sync::{Arc, Mutex};

// ── Fake service ─────────────────────────────────────────────────────────────

/// One multipart submission as the fake received it.
#[derive(Debug, Clone, Default)]
struct Submission {
    path: &'static str,
    file_name: Option<String>,
    content_type: Option<String>,
    file: Vec<u8>,
    page: Option<String>,
}

#[derive(Clone)]
struct Fake {
    seen: Arc<Mutex<Vec<Submission>>>,
    extract_status: StatusCode,
    extract_body: Value,
}

impl Fake {
    fn new(extract_status: StatusCode, extract_body: Value) -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            extract_status,
            extract_body,
        }
    }

    fn seen(&self) -> Vec<Submission> {
        self.seen.lock().unwrap().clone()
    }
}

async fn read_form(path: &'static str, mut form: Multipart) -> Submission {
    let mut sub = Submission {
        path,
        ..Default::default()
    };
    while let Some(field) = form.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                sub.file_name = field.file_name().map(str::to_string);
                sub.content_type = field.content_type().map(str::to_string);
                sub.file = field.bytes().await.unwrap().to_vec();
            }
            Some("page") => sub.page = Some(field.text().await.unwrap()),
            _ => {}
        }
    }
    sub
}

async fn get_info(State(fake): State<Fake>, form: Multipart) -> impl IntoResponse {
    let sub = read_form("/get-info", form).await;
    fake.seen.lock().unwrap().push(sub);
    Json(json!({ "page_count": 3 }))
}

async fn get_page_image(State(fake): State<Fake>, form: Multipart) -> impl IntoResponse {
    let sub = read_form("/get-page-image", form).await;
    let page: usize = sub.page.as_deref().unwrap_or("x").parse().unwrap_or(usize::MAX);
    fake.seen.lock().unwrap().push(sub);
    if page >= 3 {
        return (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Invalid page number" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "image": format!("data:image/png;base64,{}", STANDARD.encode(png(1000, 800))),
            "width": 1000,
            "height": 800
        })),
    )
}

async fn extract_stamp(State(fake): State<Fake>, form: Multipart) -> impl IntoResponse {
    let sub = read_form("/extract-stamp", form).await;
    fake.seen.lock().unwrap().push(sub);
    (fake.extract_status, Json(fake.extract_body.clone()))
}

async fn serve(fake: Fake) -> String {
    let app = Router::new()
        .route("/get-info", post(get_info))
        .route("/get-page-image", post(get_page_image))
        .route("/extract-stamp", post(extract_stamp))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn client(base: &str) -> StampApiClient {
    let config = ClientConfig::builder()
        .api_base(base)
        .request_timeout_secs(5)
        .build()
        .unwrap();
    StampApiClient::new(&config).unwrap()
}

fn drawing() -> Document {
    Document::from_upload("plan.pdf", Some("application/pdf"), b"%PDF-1.7\n%stub\n".to_vec())
        .unwrap()
}

fn multi_body(page: usize) -> Value {
    json!({
        "page": page,
        "stamps": [
            {
                "symbol_type": "approval_stamp",
                "bounding_box": [10, 10, 50, 20],
                "engineer_name": "JANE DOE",
                "license_number": "PE 12345"
            },
            {
                "symbol_type": "approval_stamp",
                "bounding_box": [200, 300, 40, 15],
                "engineer_name": null,
                "license_number": null
            }
        ],
        "raw_text": "JANE DOE\nPE 12345",
        "units": "pixels"
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn page_count_posts_the_file() {
    let fake = Fake::new(StatusCode::OK, json!({}));
    let api = client(&serve(fake.clone()).await);

    assert_eq!(api.page_count(&drawing()).await.unwrap(), 3);

    let seen = fake.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/get-info");
    assert_eq!(seen[0].file_name.as_deref(), Some("plan.pdf"));
    assert_eq!(seen[0].content_type.as_deref(), Some("application/pdf"));
    assert!(seen[0].file.starts_with(b"%PDF"));
    assert_eq!(seen[0].page, None);
}

#[tokio::test]
async fn page_image_decodes_data_uri() {
    let fake = Fake::new(StatusCode::OK, json!({}));
    let api = client(&serve(fake.clone()).await);

    let raster = api.page_image(&drawing(), 1).await.unwrap();
    assert_eq!((raster.page, raster.width, raster.height), (1, 1000, 800));
    assert_eq!(raster.image.mime_type, "image/png");
    let bitmap = raster.image.decode().unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (1000, 800));
    assert_eq!(fake.seen()[0].page.as_deref(), Some("1"));
}

#[tokio::test]
async fn page_image_error_carries_detail() {
    let fake = Fake::new(StatusCode::OK, json!({}));
    let api = client(&serve(fake).await);

    let err = api.page_image(&drawing(), 7).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rasterization);
    assert!(err.to_string().contains("HTTP 400: Invalid page number"), "{err}");
}

#[tokio::test]
async fn extract_accepts_multi_shape() {
    let fake = Fake::new(StatusCode::OK, multi_body(0));
    let api = client(&serve(fake.clone()).await);

    let set = api.extract(&drawing(), 0).await.unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.detections[0].engineer_name.as_deref(), Some("JANE DOE"));
    assert_eq!(set.detections[1].license_number, None);
    assert_eq!(set.raw_text.as_deref(), Some("JANE DOE\nPE 12345"));
    assert_eq!(set.raw, multi_body(0));

    let seen = fake.seen();
    assert_eq!(seen[0].path, "/extract-stamp");
    assert_eq!(seen[0].page.as_deref(), Some("0"));
}

#[tokio::test]
async fn extract_normalises_single_shape() {
    let body = json!({
        "page": 2,
        "symbol_type": "approval_stamp",
        "bounding_box": [120.5, 80, 300, 300],
        "engineer_name": "JOHN ROE",
        "license_number": "S-9981",
        "units": "pixels"
    });
    let fake = Fake::new(StatusCode::OK, body.clone());
    let api = client(&serve(fake).await);

    let set = api.extract(&drawing(), 2).await.unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.page, 2);
    assert_eq!(set.detections[0].bounding_box.x, 120.5);
    assert_eq!(set.detections[0].license_number.as_deref(), Some("S-9981"));
    assert_eq!(set.raw, body);
}

#[tokio::test]
async fn extract_non_success_is_rejected() {
    let fake = Fake::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "detail": "Tesseract is not installed" }),
    );
    let api = client(&serve(fake).await);

    match api.extract(&drawing(), 0).await {
        Err(StampError::ExtractionRejected {
            page,
            status,
            detail,
        }) => {
            assert_eq!((page, status), (0, 500));
            assert_eq!(detail, "Tesseract is not installed");
        }
        other => panic!("expected ExtractionRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn extract_answer_for_other_page_is_refused() {
    let fake = Fake::new(StatusCode::OK, multi_body(4));
    let api = client(&serve(fake).await);

    let err = api.extract(&drawing(), 1).await.unwrap_err();
    assert!(matches!(err, StampError::ExtractionFailed { page: 1, .. }));
}

#[tokio::test]
async fn unreachable_service_is_an_extraction_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base).extract(&drawing(), 0).await.unwrap_err();
    assert!(matches!(err, StampError::ExtractionFailed { .. }), "{err:?}");
    assert_eq!(
        err.user_message(),
        "Extraction failed. Make sure the backend is running."
    );
}

#[tokio::test]
async fn workbench_runs_against_remote_service() {
    let fake = Fake::new(StatusCode::OK, multi_body(0));
    let base = serve(fake.clone()).await;
    let config = ClientConfig::builder().api_base(base).build().unwrap();
    let workbench = Workbench::from_config(&config).unwrap();
    assert_eq!(workbench.rasterizer_name(), "remote");
    workbench.set_viewport_width(500.0);

    workbench.open(drawing()).await.unwrap();
    workbench.extract().await.unwrap();

    let snap = workbench.snapshot();
    assert_eq!(snap.phase, Phase::Resolved);
    assert_eq!(snap.page_count, 3);
    assert_eq!(snap.overlays.len(), 2);
    assert_eq!(snap.overlays[1].rect.height, 7.5);
    assert_eq!(snap.thumbnails.len(), 2);

    let paths: Vec<&str> = fake.seen().iter().map(|s| s.path).collect();
    assert_eq!(paths, vec!["/get-info", "/get-page-image", "/extract-stamp"]);
}
