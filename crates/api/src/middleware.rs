use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::errors::json_error;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor";

/// Longest accepted actor name.
pub const MAX_ACTOR_LEN: usize = 64;

/// Attach an [`ActorContext`] to every request.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let actor = match extract_actor(req.headers()) {
        Ok(actor) => actor,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, "invalid_actor", msg).into_response(),
    };

    req.extensions_mut().insert(actor);
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Result<ActorContext, String> {
    let Some(value) = headers.get(ACTOR_HEADER) else {
        return Ok(ActorContext::default());
    };

    let raw = value
        .to_str()
        .map_err(|_| format!("{ACTOR_HEADER} must be visible ASCII"))?
        .trim();
    if raw.is_empty() {
        return Ok(ActorContext::default());
    }
    if raw.len() > MAX_ACTOR_LEN {
        return Err(format!(
            "{ACTOR_HEADER} exceeds {MAX_ACTOR_LEN} characters"
        ));
    }
    Ok(ActorContext::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_or_blank_header_defaults_to_system() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_actor(&headers).unwrap().actor(), "system");
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("   "));
        assert_eq!(extract_actor(&headers).unwrap().actor(), "system");
    }

    #[test]
    fn header_value_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static(" qa-lead "));
        assert_eq!(extract_actor(&headers).unwrap().actor(), "qa-lead");
    }

    #[test]
    fn overlong_actor_is_rejected() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(MAX_ACTOR_LEN + 1);
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(&long).unwrap());
        assert!(extract_actor(&headers).is_err());
    }
}
