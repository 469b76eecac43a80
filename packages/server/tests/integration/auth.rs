use cms_common::CorrespondenceStatus;
use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod sign_in {
    use super::*;

    #[tokio::test]
    async fn confirmed_user_can_sign_in_and_gets_session_cookies() {
        let app = TestApp::spawn().await;
        app.auth.add_user("clerk@audit.gov", PASSWORD, true);

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["access_token"].is_string());
        assert_eq!(res.body["user"]["email"], "clerk@audit.gov");
        assert_eq!(res.body["redirect_to"], "/dashboard");
        assert!(res.cookie("cms_token").is_some());
        assert!(res.cookie("cms_auth").unwrap().starts_with("cms_auth=true"));
        assert!(res.cookie("cms_token").unwrap().contains("HttpOnly"));
    }

    #[tokio::test]
    async fn cookies_are_session_scoped_without_remember_me() {
        let app = TestApp::spawn().await;
        app.auth.add_user("clerk@audit.gov", PASSWORD, true);

        let short = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD}),
            )
            .await;
        let long = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD, "remember_me": true}),
            )
            .await;

        assert!(!short.cookie("cms_token").unwrap().contains("Max-Age"));
        assert!(long.cookie("cms_token").unwrap().contains("Max-Age"));
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_without_calling_the_store() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "not-an-email", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.auth.calls(), 0);
    }

    #[tokio::test]
    async fn short_password_is_rejected_without_calling_the_store() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": "abc"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.auth.calls(), 0);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let app = TestApp::spawn().await;
        app.auth.add_user("clerk@audit.gov", PASSWORD, true);

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": "wrong-password"}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
        assert!(res.cookie("cms_token").is_none());
    }

    #[tokio::test]
    async fn unconfirmed_email_is_forbidden() {
        let app = TestApp::spawn().await;
        app.auth.add_user("clerk@audit.gov", PASSWORD, false);

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "EMAIL_NOT_CONFIRMED");
    }

    #[tokio::test]
    async fn transient_store_failures_are_retried() {
        let app = TestApp::spawn().await;
        app.auth.add_user("clerk@audit.gov", PASSWORD, true);
        app.auth.fail_next(2);

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn unreachable_store_is_service_unavailable() {
        let app = TestApp::spawn().await;
        app.auth.set_unavailable(true);

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "UPSTREAM_UNAVAILABLE");
        assert_eq!(app.auth.calls(), 3);
    }
}

mod sign_up {
    use super::*;

    #[tokio::test]
    async fn new_account_needs_email_confirmation() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGN_UP,
                &json!({
                    "email": "new@audit.gov",
                    "password": PASSWORD,
                    "confirm_password": PASSWORD,
                    "first_name": "Ada",
                    "last_name": "Clerk",
                }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["confirmation_required"], true);
        assert!(res.body["message"].as_str().unwrap().contains("new@audit.gov"));
        assert!(res.cookie("cms_token").is_none());
    }

    #[tokio::test]
    async fn existing_email_is_a_validation_error() {
        let app = TestApp::spawn().await;
        app.auth.add_user("new@audit.gov", PASSWORD, true);

        let res = app
            .post_without_token(
                routes::SIGN_UP,
                &json!({
                    "email": "new@audit.gov",
                    "password": PASSWORD,
                    "confirm_password": PASSWORD,
                }),
            )
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(res.body["message"], "User already registered");
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGN_UP,
                &json!({
                    "email": "new@audit.gov",
                    "password": PASSWORD,
                    "confirm_password": "something-else",
                }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.auth.calls(), 0);
    }
}

mod forgot_password {
    use super::*;

    #[tokio::test]
    async fn reset_link_points_at_the_reset_page() {
        let app = TestApp::spawn().await;
        app.auth.add_user("clerk@audit.gov", PASSWORD, true);

        let res = app
            .post_without_token(
                routes::FORGOT_PASSWORD,
                &json!({"email": "clerk@audit.gov"}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let redirect = app.auth.reset_redirect("clerk@audit.gov").flatten().unwrap();
        assert!(redirect.ends_with("/reset-password"), "{redirect}");
    }
}

mod session {
    use super::*;

    #[tokio::test]
    async fn without_cookies_the_session_is_unauthenticated() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::SESSION).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["authenticated"], false);
        assert_eq!(res.body["state"], "unauthenticated");
        assert_eq!(app.auth.calls(), 0);
    }

    #[tokio::test]
    async fn signed_in_browser_is_authenticated_through_cookies() {
        let app = TestApp::spawn().await;
        app.signed_in_user("clerk@audit.gov").await;

        let res = app.get_without_token(routes::SESSION).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["authenticated"], true);
        assert_eq!(res.body["user"]["email"], "clerk@audit.gov");
    }

    #[tokio::test]
    async fn sign_out_clears_cookies_and_ends_the_session() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let res = app.post_without_token(routes::SIGN_OUT, &json!({})).await;
        assert_eq!(res.status, 200);
        for name in ["cms_auth", "cms_email", "cms_token", "cms_refresh"] {
            assert!(res.cookie(name).is_some(), "{name} was not cleared");
        }

        let res = app.get_with_token(routes::SESSION, &token).await;
        assert_eq!(res.body["authenticated"], false);
    }

    #[tokio::test]
    async fn signed_out_token_no_longer_opens_data_routes() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;
        app.seed_record(1, "Budget memo", CorrespondenceStatus::Pending).await;

        let res = app.get_with_token(routes::CORRESPONDENCE, &token).await;
        assert_eq!(res.status, 200, "{}", res.text);

        app.post_with_token(routes::SIGN_OUT, &json!({}), &token).await;

        let res = app.get_with_token(routes::SESSION, &token).await;
        assert_eq!(res.body["authenticated"], false);
        let res = app.get_with_token(routes::CORRESPONDENCE, &token).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");

        let res = app
            .post_without_token(
                routes::SIGN_IN,
                &json!({"email": "clerk@audit.gov", "password": PASSWORD}),
            )
            .await;
        let fresh = res.body["access_token"].as_str().unwrap();
        let res = app.get_with_token(routes::CORRESPONDENCE, fresh).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn sign_out_succeeds_even_when_the_store_is_down() {
        let app = TestApp::spawn().await;
        app.signed_in_user("clerk@audit.gov").await;
        app.auth.set_unavailable(true);

        let res = app.post_without_token(routes::SIGN_OUT, &json!({})).await;

        assert_eq!(res.status, 200);
        assert!(res.cookie("cms_token").is_some());
    }

    #[tokio::test]
    async fn refresh_uses_the_refresh_cookie() {
        let app = TestApp::spawn().await;
        app.signed_in_user("clerk@audit.gov").await;

        let res = app.post_without_token(routes::REFRESH, &json!({})).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["access_token"].is_string());
        assert!(res.cookie("cms_refresh").is_some());

        // Refresh tokens are single use.
        let again = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": "stale"}))
            .await;
        assert_eq!(again.status, 401);
    }

    #[tokio::test]
    async fn refresh_without_any_token_is_unauthorized() {
        let app = TestApp::spawn().await;

        let res = app.post_without_token(routes::REFRESH, &json!({})).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod events {
    use std::time::Duration;

    use super::*;
    use crate::common::read_until;

    #[tokio::test]
    async fn stream_reports_sign_out_and_releases_the_context() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let mut res = app.stream_with_token(routes::EVENTS, &token).await;
        assert_eq!(res.status().as_u16(), 200);
        assert!(
            res.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let mut seen = String::new();
        read_until(&mut res, &mut seen, "event: session").await;
        read_until(&mut res, &mut seen, r#""state":"authenticated""#).await;
        assert_eq!(app.sessions.len(), 1);

        let out = app.post_with_token(routes::SIGN_OUT, &json!({}), &token).await;
        assert_eq!(out.status, 200);
        read_until(&mut res, &mut seen, r#""state":"unauthenticated""#).await;

        drop(res);
        // Disconnects surface on the next read or keep-alive write.
        let released = tokio::time::timeout(Duration::from_secs(20), async {
            while !app.sessions.is_empty() {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "context outlived the stream");
    }

    #[tokio::test]
    async fn stream_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::EVENTS).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
        assert!(app.sessions.is_empty());
    }
}

mod password {
    use super::*;

    #[tokio::test]
    async fn signed_in_user_can_change_password() {
        let app = TestApp::spawn().await;
        let token = app.signed_in_user("clerk@audit.gov").await;

        let res = app
            .put_with_token(
                routes::PASSWORD,
                &json!({"password": "brand-new-pass", "confirm_password": "brand-new-pass"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(
            app.auth.password_of("clerk@audit.gov").as_deref(),
            Some("brand-new-pass")
        );
    }

    #[tokio::test]
    async fn changing_password_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .put(format!("http://{}{}", app.addr, routes::PASSWORD))
            .json(&json!({"password": "brand-new-pass", "confirm_password": "brand-new-pass"}))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 401);
    }
}

mod oauth {
    use super::*;

    #[tokio::test]
    async fn known_provider_gets_an_authorize_url() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::oauth("github")).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["url"].as_str().unwrap().contains("github"));
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::oauth("myspace")).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn callback_with_a_bad_token_is_unauthorized() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::OAUTH_CALLBACK,
                &json!({"access_token": "garbage"}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert!(res.cookie("cms_token").is_none());
    }
}
