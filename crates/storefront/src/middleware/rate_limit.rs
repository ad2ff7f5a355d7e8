//! Rate limiting for the credential endpoints using governor and
//! `tower_governor`.
//!
//! Login, registration, OTP and password reset forms all hit the auth
//! service; the limiter keeps a single client from hammering it.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Proxy headers checked for the client address, most specific first.
const CLIENT_IP_HEADERS: [&str; 2] = ["x-real-ip", "x-forwarded-for"];

/// Key extractor that reads the client IP from reverse-proxy headers,
/// falling back to the socket peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

/// First address in a proxy header value.
fn parse_forwarded(value: &str) -> Option<IpAddr> {
    value.split(',').next()?.trim().parse().ok()
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        for name in CLIENT_IP_HEADERS {
            if let Some(ip) = headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_forwarded)
            {
                return Ok(ip);
            }
        }

        req.extensions()
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
            .map(|info| info.0.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter for the auth forms: one request every 4 seconds per IP,
/// burst of 8 (a signup with two OTP resends fits in the burst).
///
/// Returns `None` if the governor configuration is rejected, in which case
/// the routes are served unlimited.
#[must_use]
pub fn auth_rate_limiter() -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(4)
        .burst_size(8)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    #[test]
    fn test_parse_forwarded_takes_first_hop() {
        assert_eq!(
            parse_forwarded("203.0.113.7, 10.0.0.1"),
            Some("203.0.113.7".parse().unwrap_or(IpAddr::from([0, 0, 0, 0])))
        );
        assert_eq!(parse_forwarded("not-an-ip"), None);
    }

    #[test]
    fn test_real_ip_wins_over_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "198.51.100.1")
            .header("x-real-ip", "203.0.113.9")
            .body(())
            .unwrap();
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut().insert(axum::extract::ConnectInfo(
            "192.0.2.4:5555".parse::<std::net::SocketAddr>().unwrap(),
        ));
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "192.0.2.4".parse::<IpAddr>().unwrap());
        assert!(ClientIpKeyExtractor.extract(&Request::new(())).is_err());
    }

    #[test]
    fn test_auth_rate_limiter_builds() {
        assert!(auth_rate_limiter().is_some());
    }
}
