use reqwest::multipart::Form;

use crate::common::{TestApp, file_part, routes};

#[tokio::test]
async fn stored_file_gets_a_timestamped_path_and_signed_url() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("clerk@audit.gov").await;

    let form = Form::new().part("file", file_part("scan.pdf", b"%PDF-1.4"));
    let res = app.multipart_with_token(routes::UPLOAD, form, &token).await;

    assert_eq!(res.status, 200, "{}", res.text);
    let path = res.body["path"].as_str().unwrap();
    assert!(path.starts_with("correspondences/"), "{path}");
    assert!(path.ends_with("-scan.pdf"), "{path}");
    assert!(res.body["signedUrl"].is_string());
    assert_eq!(app.blobs.paths().await, [path.to_string()]);
}

#[tokio::test]
async fn request_without_a_file_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("clerk@audit.gov").await;

    let form = Form::new().text("note", "no attachment here");
    let res = app.multipart_with_token(routes::UPLOAD, form, &token).await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    assert_eq!(res.body["message"], "No file provided");
    assert_eq!(app.blobs.calls(), 0);
}

#[tokio::test]
async fn storage_failure_is_an_internal_error() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("clerk@audit.gov").await;
    app.blobs.fail_uploads_after(0);

    let form = Form::new().part("file", file_part("scan.pdf", b"%PDF-1.4"));
    let res = app.multipart_with_token(routes::UPLOAD, form, &token).await;

    assert_eq!(res.status, 500);
    assert_eq!(res.body["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn upload_requires_authentication() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(format!("http://{}{}", app.addr, routes::UPLOAD))
        .multipart(Form::new().part("file", file_part("scan.pdf", b"%PDF")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 401);
}
