use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adapters::{CoinGeckoFeed, PriceFeed, QuoteSource, RetryPolicy, ThrottledSource};
use corelib::ApiError;

async fn feed_for(server: &MockServer, api_key: Option<&str>) -> CoinGeckoFeed {
    CoinGeckoFeed::new(server.uri(), api_key.map(str::to_string)).expect("build feed")
}

#[tokio::test]
async fn parses_usd_price_for_requested_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "bitcoin"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": { "usd": 64123.5 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quote = feed_for(&server, None)
        .await
        .fetch_price("bitcoin")
        .await
        .unwrap();

    assert_eq!(quote.symbol(), "bitcoin");
    assert_eq!(quote.price(), 64123.5);
}

#[tokio::test]
async fn sends_demo_api_key_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("x_cg_demo_api_key", "k-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ethereum": { "usd": 3000.0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quote = feed_for(&server, Some("k-123"))
        .await
        .fetch_price("ethereum")
        .await
        .unwrap();

    assert_eq!(quote.price(), 3000.0);
}

#[tokio::test]
async fn missing_coin_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = feed_for(&server, None)
        .await
        .fetch_price("not-a-coin")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::NotFound {
            symbol: "not-a-coin".into()
        }
    );
}

#[tokio::test]
async fn too_many_requests_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = feed_for(&server, None)
        .await
        .fetch_price("bitcoin")
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn server_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = feed_for(&server, None)
        .await
        .fetch_price("bitcoin")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Transport {
            status: Some(503),
            body: "maintenance".into()
        }
    );
}

#[tokio::test]
async fn throttled_source_retries_until_upstream_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "solana": { "usd": 150.25 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        min_interval: Duration::from_millis(5),
        max_retries: 3,
        backoff_step: Duration::from_millis(10),
    };
    let source = ThrottledSource::with_policy(feed_for(&server, None).await, policy);

    let quote = source.get_price("solana").await.unwrap();

    assert_eq!(quote.price(), 150.25);
}
