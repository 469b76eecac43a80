use cms_common::CorrespondenceStatus;
use reqwest::multipart::Form;
use serde_json::json;
use uuid::Uuid;

use crate::common::{TestApp, file_part, intake_form, routes};

mod list {
    use super::*;

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::CORRESPONDENCE).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_page() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        app.seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;

        let res = app
            .get_with_token(&format!("{}?q=zzz-nothing", routes::CORRESPONDENCE), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"], json!([]));
        assert_eq!(res.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn filters_by_text_and_status_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        app.seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;
        app.seed_record(2, "Budget approval", CorrespondenceStatus::Completed)
            .await;
        app.seed_record(3, "Budget review", CorrespondenceStatus::Pending)
            .await;
        app.seed_record(4, "Staff leave", CorrespondenceStatus::Pending)
            .await;

        let res = app
            .get_with_token(
                &format!("{}?q=BUDGET&status=Pending", routes::CORRESPONDENCE),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let subjects: Vec<&str> = res.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["subject"].as_str().unwrap())
            .collect();
        assert_eq!(subjects, ["Budget review", "Budget request"]);
    }

    #[tokio::test]
    async fn pages_through_the_full_result() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        for n in 0..5 {
            app.seed_record(n, &format!("Memo {n}"), CorrespondenceStatus::Pending)
                .await;
        }

        let res = app
            .get_with_token(
                &format!("{}?sort=oldest&page=2&per_page=2", routes::CORRESPONDENCE),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["pagination"]["total"], 5);
        assert_eq!(res.body["pagination"]["total_pages"], 3);
        assert_eq!(res.body["data"][0]["subject"], "Memo 2");
        assert_eq!(res.body["data"][1]["subject"], "Memo 3");
    }

    #[tokio::test]
    async fn unknown_sort_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let res = app
            .get_with_token(&format!("{}?sort=sideways", routes::CORRESPONDENCE), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unreachable_store_is_service_unavailable() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        app.records.set_unavailable(true);

        let res = app.get_with_token(routes::CORRESPONDENCE, &token).await;

        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "UPSTREAM_UNAVAILABLE");
    }
}

mod create {
    use super::*;

    #[tokio::test]
    async fn stores_the_record_its_files_and_an_activity_entry() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let form = intake_form("Budget request")
            .text("department", "Finance")
            .part("files", file_part("letter.pdf", b"%PDF-1.4"))
            .part("files", file_part("annex.pdf", b"%PDF-1.4 annex"));
        let res = app
            .multipart_with_token(routes::CORRESPONDENCE, form, &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let record = &res.body["correspondence"];
        assert_eq!(record["status"], "Pending");
        assert_eq!(record["department"], "Finance");
        assert!(record["registry_number"].as_str().unwrap().starts_with("CMS-"));
        assert_eq!(res.body["attachments"].as_array().unwrap().len(), 2);

        let id: Uuid = record["id"].as_str().unwrap().parse().unwrap();
        let mut paths = app.blobs.paths().await;
        paths.sort();
        assert_eq!(paths, [format!("{id}/annex.pdf"), format!("{id}/letter.pdf")]);

        let activity = app
            .get_with_token(&routes::correspondence_activity(id), &token)
            .await;
        assert_eq!(activity.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(activity.body["data"][0]["action"], "Created correspondence");
    }

    #[tokio::test]
    async fn missing_required_field_stores_nothing() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let form = Form::new()
            .text("subject", "Budget request")
            .text("recipient", "Director")
            .part("files", file_part("letter.pdf", b"%PDF-1.4"));
        let res = app
            .multipart_with_token(routes::CORRESPONDENCE, form, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(res.body["message"].as_str().unwrap().contains("sender"));
        assert_eq!(app.records.calls(), 0);
        assert_eq!(app.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn bad_date_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let form = Form::new()
            .text("subject", "Budget request")
            .text("sender", "Finance Dept")
            .text("recipient", "Director")
            .text("date", "01/06/2024");
        let res = app
            .multipart_with_token(routes::CORRESPONDENCE, form, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.records.calls(), 0);
    }

    #[tokio::test]
    async fn attachments_can_be_required() {
        let app = TestApp::spawn_with(|c| c.correspondence.require_attachments = true).await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let res = app
            .multipart_with_token(routes::CORRESPONDENCE, intake_form("Budget"), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.records.calls(), 0);
    }

    #[tokio::test]
    async fn failed_upload_reports_what_was_kept() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        app.blobs.fail_uploads_after(1);

        let form = intake_form("Budget request")
            .part("files", file_part("first.pdf", b"one"))
            .part("files", file_part("second.pdf", b"two"))
            .part("files", file_part("third.pdf", b"three"));
        let res = app
            .multipart_with_token(routes::CORRESPONDENCE, form, &token)
            .await;

        assert_eq!(res.status, 502, "{}", res.text);
        assert_eq!(res.body["code"], "PARTIAL_FAILURE");
        let details = &res.body["details"];
        assert_eq!(details["failed_file"], "second.pdf");
        assert_eq!(details["uploaded"].as_array().unwrap().len(), 1);

        let record_id: Uuid = details["record_id"].as_str().unwrap().parse().unwrap();
        let kept = app
            .get_with_token(&routes::correspondence(record_id), &token)
            .await;
        assert_eq!(kept.status, 200);
        assert_eq!(app.blobs.paths().await, [format!("{record_id}/first.pdf")]);
    }
}

mod detail {
    use super::*;

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let res = app
            .get_with_token(&routes::correspondence(Uuid::now_v7()), &token)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn record_is_returned_when_attachments_cannot_be_listed() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        let id = app
            .seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;
        app.blobs.fail_listing(true);

        let res = app.get_with_token(&routes::correspondence(id), &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["correspondence"]["subject"], "Budget request");
        assert_eq!(res.body["attachments"], json!([]));
    }

    #[tokio::test]
    async fn lists_uploaded_attachments() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let form = intake_form("Budget request").part("files", file_part("letter.pdf", b"%PDF"));
        let created = app
            .multipart_with_token(routes::CORRESPONDENCE, form, &token)
            .await;
        assert_eq!(created.status, 201, "{}", created.text);
        let id: Uuid = created.body["correspondence"]["id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let res = app.get_with_token(&routes::correspondence(id), &token).await;

        assert_eq!(res.status, 200);
        let attachment = &res.body["attachments"][0];
        assert_eq!(attachment["name"], "letter.pdf");
        assert_eq!(attachment["size"], 4);
        assert!(attachment["url"].as_str().unwrap().ends_with("letter.pdf"));
    }

    #[tokio::test]
    async fn download_returns_the_file_as_an_attachment() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let form = intake_form("Budget request").part("files", file_part("letter.pdf", b"%PDF"));
        let created = app
            .multipart_with_token(routes::CORRESPONDENCE, form, &token)
            .await;
        let id: Uuid = created.body["correspondence"]["id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let res = app
            .client
            .get(format!(
                "http://{}{}",
                app.addr,
                routes::attachment(id, "letter.pdf")
            ))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 200);
        let disposition = res.headers()["content-disposition"].to_str().unwrap();
        assert!(disposition.starts_with("attachment"), "{disposition}");
        assert_eq!(res.bytes().await.unwrap().as_ref(), b"%PDF");
    }

    #[tokio::test]
    async fn missing_attachment_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        let id = app
            .seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;

        let res = app
            .get_with_token(&routes::attachment(id, "nothing.pdf"), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod status {
    use super::*;

    #[tokio::test]
    async fn change_is_saved_and_logged() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        let id = app
            .seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;

        let res = app
            .patch_with_token(
                &routes::correspondence_status(id),
                &json!({"status": "Completed"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "Completed");
        assert!(res.body["updated_by"].is_string());

        let activity = app
            .get_with_token(&routes::correspondence_activity(id), &token)
            .await;
        let entry = &activity.body["data"][0];
        assert_eq!(entry["action"], "Updated status");
        assert_eq!(entry["description"], "Status changed from Pending to Completed");
    }

    #[tokio::test]
    async fn setting_the_same_status_writes_nothing() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        let id = app
            .seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;

        let res = app
            .patch_with_token(
                &routes::correspondence_status(id),
                &json!({"status": "Pending"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "Pending");
        assert!(res.body["updated_at"].is_null());

        let activity = app
            .get_with_token(&routes::correspondence_activity(id), &token)
            .await;
        assert_eq!(activity.body["data"], json!([]));
    }

    #[tokio::test]
    async fn unknown_status_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        let id = app
            .seed_record(1, "Budget request", CorrespondenceStatus::Pending)
            .await;

        let res = app
            .patch_with_token(
                &routes::correspondence_status(id),
                &json!({"status": "Shredded"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let res = app
            .patch_with_token(
                &routes::correspondence_status(Uuid::now_v7()),
                &json!({"status": "Archived"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
    }
}
