mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn whoami_reports_session_and_account() -> Result<()> {
    let server = common::TestServer::start().await?;
    server.seed_admin("Ann", "a@x.com").await;

    let res = server
        .client
        .get(server.url("/api/auth/whoami"))
        .bearer_auth(server.token("A@X.com"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["session"]["email"], "a@x.com");
    assert_eq!(body["data"]["account"]["role"], "admin");
    assert!(body["data"]["session"].get("fingerprint").is_none());
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_token() -> Result<()> {
    let server = common::TestServer::start().await?;
    server.seed_admin("Ann", "a@x.com").await;
    let token = server.token("a@x.com");

    let res = server
        .client
        .delete(server.url("/api/auth/session"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.get(server.url("/api/accounts")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Session has been logged out");
    Ok(())
}

#[tokio::test]
async fn rejects_tokens_signed_with_another_secret() -> Result<()> {
    let server = common::TestServer::start().await?;
    let forged = rbac_console::testing::mint_token("not-the-secret", "a@x.com");

    let res = server.client.get(server.url("/api/auth/whoami")).bearer_auth(forged).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header("Authorization", "Basic abc")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
