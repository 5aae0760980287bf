use crate::error::AppError;
use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use isbot::Bots;
use std::sync::OnceLock;
use tracing::warn;

static BOTS: OnceLock<Bots> = OnceLock::new();

/// Score at or above which a request is rejected.
pub const BLOCK_SCORE: u32 = 100;

/// Heuristic bot score for a set of request headers.
///
/// Known crawler user agents score 100 outright. Browser-looking agents lose
/// points for each of Accept, Accept-Language and Accept-Encoding they omit.
pub fn bot_score(headers: &HeaderMap) -> u32 {
    let user_agent = headers
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if user_agent.is_empty() {
        return 50;
    }

    let mut score = 0;
    if BOTS.get_or_init(Bots::default).is_bot(user_agent) {
        score += 100;
    }

    if user_agent.starts_with("Mozilla/") {
        let missing = ["Accept", "Accept-Language", "Accept-Encoding"]
            .iter()
            .filter(|h| !headers.contains_key(**h))
            .count();
        score += match missing {
            0 => 0,
            1 => 30,
            _ => 70,
        };
    }

    score
}

/// Rejects form submissions that look automated.
///
/// Stripe webhook deliveries carry a `Stripe-Signature` header and are
/// authenticated separately, so they bypass scoring.
pub async fn bot_detection_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.method() == Method::OPTIONS || headers.contains_key("stripe-signature") {
        return Ok(next.run(request).await);
    }

    let score = bot_score(&headers);
    if score >= BLOCK_SCORE {
        warn!(
            user_agent = ?headers.get("User-Agent"),
            score = %score,
            path = %request.uri(),
            "Blocking suspected bot submission"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Bot detected")));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn browser_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 Safari/605.1.15",
            ),
        );
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Accept-Language", HeaderValue::from_static("en-US"));
        headers.insert("Accept-Encoding", HeaderValue::from_static("gzip"));
        headers
    }

    #[test]
    fn full_browser_headers_score_zero() {
        assert_eq!(bot_score(&browser_headers()), 0);
    }

    #[test]
    fn crawler_is_blocked() {
        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static("Googlebot/2.1"));
        assert!(bot_score(&headers) >= BLOCK_SCORE);
    }

    #[test]
    fn missing_user_agent_is_suspicious_but_allowed() {
        let score = bot_score(&HeaderMap::new());
        assert!(score > 0 && score < BLOCK_SCORE);
    }
}
