// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `board` binary against a fake
//! backend.

use board_specs::BoardEnv;

async fn signed_in() -> anyhow::Result<BoardEnv> {
    let env = BoardEnv::start().await?;
    env.backend.add_user("ada", "Ada Lovelace", "pw");
    let run = env.board(&["login", "ada", "--password", "pw"]).await?;
    anyhow::ensure!(run.success(), "login failed: {}", run.stderr);
    Ok(env)
}

// -- Accounts -----------------------------------------------------------------

#[tokio::test]
async fn signup_and_login() -> anyhow::Result<()> {
    let env = BoardEnv::start().await?;

    let run = env.board(&["signup", "grace", "--name", "Grace Hopper", "--password", "pw"]).await?;
    assert!(run.success(), "{}", run.stderr);
    assert!(env.backend.has_user("grace"));

    let run = env.board(&["login", "grace", "--password", "pw"]).await?;
    assert!(run.success(), "{}", run.stderr);
    assert!(run.stdout.contains("Grace Hopper"));

    // Only the refresh cookie is on disk.
    let cookies = std::fs::read_to_string(env.state_dir().join("cookies.json"))?;
    assert!(cookies.contains("refreshToken"));
    assert!(cookies.contains("Strict"));
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_fails() -> anyhow::Result<()> {
    let env = BoardEnv::start().await?;
    env.backend.add_user("ada", "Ada", "pw");

    let run = env.board(&["signup", "ada", "--name", "Ada", "--password", "pw"]).await?;
    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("username already exists"));
    Ok(())
}

// -- Session reload -----------------------------------------------------------

#[tokio::test]
async fn each_invocation_refreshes_before_first_request() -> anyhow::Result<()> {
    let env = signed_in().await?;

    let run = env.board(&["request", "GET", "/boards"]).await?;
    assert!(run.success(), "{}", run.stderr);
    let body: serde_json::Value = serde_json::from_str(&run.stdout)?;
    assert_eq!(body[0]["title"], "Roadmap");

    assert_eq!(env.backend.refresh_calls(), 1);
    assert_eq!(env.backend.unauthorized_responses(), 0);

    let run = env.board(&["whoami"]).await?;
    assert!(run.success(), "{}", run.stderr);
    assert_eq!(run.stdout.trim(), "Ada Lovelace (ada)");
    assert_eq!(env.backend.refresh_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn without_proactive_refresh_a_401_is_recovered() -> anyhow::Result<()> {
    let env = signed_in().await?;

    let run = env.board(&["--no-proactive-refresh", "request", "GET", "/boards"]).await?;
    assert!(run.success(), "{}", run.stderr);
    assert_eq!(env.backend.refresh_calls(), 1);
    assert_eq!(env.backend.unauthorized_responses(), 1);
    Ok(())
}

#[tokio::test]
async fn post_with_body() -> anyhow::Result<()> {
    let env = signed_in().await?;

    let run = env.board(&["request", "POST", "/boards", "--data", r#"{"title":"Launch"}"#]).await?;
    assert!(run.success(), "{}", run.stderr);
    let body: serde_json::Value = serde_json::from_str(&run.stdout)?;
    assert_eq!(body["title"], "Launch");
    Ok(())
}

// -- Logout -------------------------------------------------------------------

#[tokio::test]
async fn revoked_refresh_token_ends_session() -> anyhow::Result<()> {
    let env = signed_in().await?;
    env.backend.revoke_refresh_tokens();

    let run = env.board(&["request", "GET", "/boards"]).await?;
    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("board login"));

    let run = env.board(&["status"]).await?;
    assert!(run.stdout.contains("signed out"));
    Ok(())
}

#[tokio::test]
async fn logout_then_request_makes_no_refresh_call() -> anyhow::Result<()> {
    let env = signed_in().await?;

    assert!(env.board(&["logout"]).await?.success());
    let run = env.board(&["request", "GET", "/boards"]).await?;

    assert_eq!(run.code, Some(1));
    assert_eq!(env.backend.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_api_url_exits_2() -> anyhow::Result<()> {
    let env = BoardEnv::start().await?;
    let run = env.board(&["--api-url", "ftp://nowhere", "status"]).await?;
    assert_eq!(run.code, Some(2));
    Ok(())
}
