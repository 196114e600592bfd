// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::Method;

use crate::session::AuthSession;
use crate::transport::{ApiRequest, ApiResponse};

pub(super) async fn run(session: &AuthSession, method: &str, path: &str, data: Option<&str>) -> i32 {
    let request = match build(method, path, data) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 2;
        }
    };
    match session.client().send(request).await {
        Ok(resp) => {
            print_body(&resp);
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

pub(super) fn build(method: &str, path: &str, data: Option<&str>) -> anyhow::Result<ApiRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid method: {method}"))?;
    let mut request = ApiRequest::new(method, path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).map_err(|e| anyhow::anyhow!("--data is not JSON: {e}"))?;
        request.body = Some(body);
    }
    Ok(request)
}

fn print_body(resp: &ApiResponse) {
    if resp.body.is_empty() {
        return;
    }
    match serde_json::from_slice::<serde_json::Value>(&resp.body) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{}", resp.text()),
        },
        Err(_) => println!("{}", resp.text()),
    }
}
