//! End-to-end tests for the resolver service against mocked collaborators

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use cep_weather::{
    NominatimResolver, ServiceConfig, TemperaturePipeline, TracePropagation, WeatherApiResolver,
    api::{self, ResolverState},
    upstream::http_client,
    web::with_common_layers,
};
use httpmock::prelude::*;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use rstest::rstest;
use serde_json::{Value, json};
use tower::ServiceExt;
use tracing_subscriber::layer::SubscriberExt;

const INBOUND_TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

/// Same trace id as the inbound header, any child span id
const CHILD_OF_INBOUND: &str = "^00-4bf92f3577b34da6a3ce929d0e0e4736-[0-9a-f]{16}-01$";

fn resolver_app(geocoding: &MockServer, weather: &MockServer) -> Router {
    let propagation = TracePropagation::w3c();
    let client = || {
        http_client(Duration::from_secs(5), "cep-weather-test", Some(propagation.clone())).unwrap()
    };

    let pipeline = TemperaturePipeline::new(
        Arc::new(NominatimResolver::new(client(), geocoding.base_url())),
        Arc::new(WeatherApiResolver::new(client(), weather.base_url(), "test-key")),
    );

    with_common_layers(api::router(ResolverState {
        pipeline,
        propagation,
        request_timeout: Duration::from_secs(10),
    }))
}

async fn get(app: Router, path: &str, traceparent: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method("GET").uri(path);
    if let Some(traceparent) = traceparent {
        request = request.header("traceparent", traceparent);
    }
    let response = app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_sao_paulo_scenario() {
    let geocoding = MockServer::start();
    let weather = MockServer::start();

    let geo_mock = geocoding
        .mock(|when, then| {
            when.method(GET).path("/search").query_param("q", "01001000");
            then.status(200).json_body(json!([{ "lat": "-23.55", "lon": "-46.63" }]));
        });
    let weather_mock = weather
        .mock(|when, then| {
            when.method(GET)
                .path("/current.json")
                .query_param("key", "test-key")
                .query_param("q", "-23.55,-46.63");
            then.status(200).json_body(json!({
                "location": { "name": "Sao Paulo" },
                "current": { "temp_c": 20.0, "temp_f": 68.0 }
            }));
        });

    let (status, body) = get(resolver_app(&geocoding, &weather), "/01001000", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        r#"{"city":"Sao Paulo","temp_c":20.0,"temp_f":68.0,"temp_k":293.0}"#
    );
    geo_mock.assert();
    weather_mock.assert();
}

#[tokio::test]
async fn test_unknown_cep_is_not_found() {
    let geocoding = MockServer::start();
    let weather = MockServer::start();

    geocoding
        .mock(|when, then| {
            when.method(GET).path("/search").query_param("q", "99999999");
            then.status(200).json_body(json!([]));
        });

    let (status, body) = get(resolver_app(&geocoding, &weather), "/99999999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "message": "can not find zipcode", "code": 404 }));
}

#[tokio::test]
async fn test_short_cep_is_unprocessable() {
    let geocoding = MockServer::start();
    let weather = MockServer::start();

    let (status, body) = get(resolver_app(&geocoding, &weather), "/123", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "message": "invalid zipcode", "code": 422 }));
}

#[tokio::test]
async fn test_weather_outage_is_internal_error() {
    let geocoding = MockServer::start();
    let weather = MockServer::start();

    geocoding
        .mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([{ "lat": "-23.55", "lon": "-46.63" }]));
        });
    weather
        .mock(|when, then| {
            when.method(GET).path("/current.json");
            then.status(502).body("bad gateway");
        });

    let (status, body) = get(resolver_app(&geocoding, &weather), "/01001000", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "message": "internal error", "code": 500 }));
}

#[tokio::test]
async fn test_repeated_requests_are_byte_identical() {
    let geocoding = MockServer::start();
    let weather = MockServer::start();

    geocoding
        .mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([{ "lat": "-22.90", "lon": "-43.17" }]));
        });
    weather
        .mock(|when, then| {
            when.method(GET).path("/current.json");
            then.status(200).json_body(json!({
                "location": { "name": "Rio de Janeiro" },
                "current": { "temp_c": 27.3, "temp_f": 81.1 }
            }));
        });

    let app = resolver_app(&geocoding, &weather);
    let (_, first) = get(app.clone(), "/20040002", None).await;
    let (_, second) = get(app, "/20040002", None).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_trace_context_reaches_both_collaborators() {
    let provider = SdkTracerProvider::builder().build();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("resolver-test")));
    let _guard = tracing::subscriber::set_default(subscriber);

    let geocoding = MockServer::start();
    let weather = MockServer::start();

    let geo_mock = geocoding
        .mock(|when, then| {
            when.method(GET)
                .path("/search")
                .header_matches("^traceparent$", CHILD_OF_INBOUND);
            then.status(200).json_body(json!([{ "lat": "-23.55", "lon": "-46.63" }]));
        });
    let weather_mock = weather
        .mock(|when, then| {
            when.method(GET)
                .path("/current.json")
                .header_matches("^traceparent$", CHILD_OF_INBOUND);
            then.status(200).json_body(json!({
                "location": { "name": "Sao Paulo" },
                "current": { "temp_c": 20.0, "temp_f": 68.0 }
            }));
        });

    let (status, _) = get(
        resolver_app(&geocoding, &weather),
        "/01001000",
        Some(INBOUND_TRACEPARENT),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    geo_mock.assert();
    weather_mock.assert();
}

#[rstest]
#[case("/%FF")]
#[case("/%FF%FF%FF%FF%FF%FF%FF%FF")]
#[case("/")]
#[tokio::test]
async fn test_unextractable_cep_is_unprocessable(#[case] path: &str) {
    let geocoding = MockServer::start();
    let weather = MockServer::start();
    let geo_mock = geocoding.mock(|when, then| {
        when.method(GET);
        then.status(500);
    });

    let (status, body) = get(resolver_app(&geocoding, &weather), path, None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "path {path}");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "message": "invalid zipcode", "code": 422 }));
    geo_mock.assert_calls(0);
}

#[tokio::test]
async fn test_collaborators_get_their_own_user_agent() {
    let geocoding = MockServer::start();
    let weather = MockServer::start();

    let geo_mock = geocoding.mock(|when, then| {
        when.method(GET).path("/search").header("user-agent", "geo-agent/1");
        then.status(200).json_body(json!([{ "lat": "-23.55", "lon": "-46.63" }]));
    });
    let weather_mock = weather.mock(|when, then| {
        when.method(GET)
            .path("/current.json")
            .header("user-agent", "weather-agent/1");
        then.status(200).json_body(json!({
            "location": { "name": "Sao Paulo" },
            "current": { "temp_c": 20.0 }
        }));
    });

    let mut config = ServiceConfig::default();
    config.geocoding.base_url = geocoding.base_url();
    config.geocoding.user_agent = "geo-agent/1".to_string();
    config.weather.base_url = weather.base_url();
    config.weather.user_agent = "weather-agent/1".to_string();
    config.weather.api_key = Some("test-key".to_string());
    let state = ResolverState::from_config(&config, TracePropagation::w3c()).unwrap();

    let (status, _) = get(with_common_layers(api::router(state)), "/01001000", None).await;

    assert_eq!(status, StatusCode::OK);
    geo_mock.assert();
    weather_mock.assert();
}
