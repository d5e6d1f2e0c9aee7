mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::TestServer::start().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["store"], "ok");
    Ok(())
}

#[tokio::test]
async fn root_describes_the_api() -> Result<()> {
    let server = common::TestServer::start().await?;

    let body: Value = server.client.get(server.url("/")).send().await?.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "RBAC Console");
    assert!(body["data"]["endpoints"]["provision"].is_string());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> Result<()> {
    let server = common::TestServer::start().await?;

    for path in ["/api/accounts", "/api/auth/whoami"] {
        let res = server.client.get(server.url(path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await?;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
    Ok(())
}
