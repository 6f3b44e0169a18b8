//! Integration tests for HttpGeocoder and WeatherProvider using wiremock.

use std::sync::Arc;

use skycast_weather::{
    ConditionsProvider, Coordinates, Geocoder, GeocoderEndpoints, GeocodingError, HttpGeocoder,
    TemperatureUnit, WeatherError, WeatherProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoints(server: &MockServer) -> GeocoderEndpoints {
    GeocoderEndpoints {
        reverse_url: format!("{}/reverse", server.uri()),
        search_url: format!("{}/v1/search", server.uri()),
        user_agent: "Skycast-Test/1.0".to_string(),
        search_count: 5,
    }
}

fn paris() -> Coordinates {
    Coordinates::try_new(48.8566, 2.3522).unwrap()
}

/// Helper to create a Nominatim reverse response
fn nominatim(address: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "place_id": 88066702,
        "display_name": "Paris, Ile-de-France, France",
        "address": address
    })
}

/// Helper to create an Open-Meteo forecast response
fn forecast(weather_code: i32, is_day: u8) -> serde_json::Value {
    serde_json::json!({
        "latitude": 48.86,
        "longitude": 2.35,
        "timezone": "Europe/Paris",
        "utc_offset_seconds": 7200,
        "current": {
            "time": 1746086400,
            "weather_code": weather_code,
            "is_day": is_day,
            "temperature_2m": 17.3
        },
        "daily": {
            "time": [1746050400],
            "sunrise": [1746072900],
            "sunset": [1746126300]
        }
    })
}

#[tokio::test]
async fn test_reverse_prefers_city() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("format", "json"))
        .and(query_param("lat", "48.8566"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim(serde_json::json!({
            "city": "Paris",
            "county": "Paris",
            "state": "Ile-de-France",
            "country": "France",
            "country_code": "fr"
        }))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let place = geocoder.reverse(paris()).await.unwrap();

    assert_eq!(place.name, "Paris");
    assert_eq!(place.country, "France");
    assert!(place.timezone.is_none());
}

#[tokio::test]
async fn test_reverse_falls_back_through_address_levels() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim(serde_json::json!({
            "county": "Larimer County",
            "state": "Colorado",
            "country_code": "us"
        }))))
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let place = geocoder.reverse(paris()).await.unwrap();

    assert_eq!(place.name, "Larimer County");
    assert_eq!(place.country, "US");
}

#[tokio::test]
async fn test_reverse_without_address_is_no_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "Unable to geocode" })),
        )
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let result = geocoder.reverse(paris()).await;

    assert!(matches!(result, Err(GeocodingError::NoResult)));
}

#[tokio::test]
async fn test_reverse_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let result = geocoder.reverse(paris()).await;

    assert!(matches!(result, Err(GeocodingError::Status(503))));
}

#[tokio::test]
async fn test_reverse_enriched_with_timezone() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim(serde_json::json!({
            "city": "Paris",
            "country": "France"
        }))))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("timezone", "auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast(0, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(
        format!("{}/v1/forecast", mock_server.uri()),
        TemperatureUnit::Celsius,
    )
    .unwrap();
    let geocoder = HttpGeocoder::new(endpoints(&mock_server))
        .unwrap()
        .with_conditions(Arc::new(provider));

    let place = geocoder.reverse(paris()).await.unwrap();

    assert_eq!(place.name, "Paris");
    assert_eq!(place.timezone.as_deref(), Some("Europe/Paris"));
    assert_eq!(place.utc_offset_seconds, Some(7200));
}

#[tokio::test]
async fn test_reverse_keeps_name_when_enrichment_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim(serde_json::json!({
            "town": "Annecy",
            "country": "France"
        }))))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(
        format!("{}/v1/forecast", mock_server.uri()),
        TemperatureUnit::Celsius,
    )
    .unwrap();
    let geocoder = HttpGeocoder::new(endpoints(&mock_server))
        .unwrap()
        .with_conditions(Arc::new(provider));

    let place = geocoder.reverse(paris()).await.unwrap();

    assert_eq!(place.name, "Annecy");
    assert!(place.timezone.is_none());
}

#[tokio::test]
async fn test_search_maps_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Springfield"))
        .and(query_param("count", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "id": 4409896,
                    "name": "Springfield",
                    "latitude": 37.21533,
                    "longitude": -93.29824,
                    "country": "United States",
                    "country_code": "US",
                    "timezone": "America/Chicago"
                },
                {
                    "id": 4250542,
                    "name": "Springfield",
                    "latitude": 39.80172,
                    "longitude": -89.64371,
                    "country_code": "US"
                }
            ],
            "generationtime_ms": 0.8
        })))
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let places = geocoder.search("  Springfield ").await.unwrap();

    assert_eq!(places.len(), 2);
    assert_eq!(places[0].country, "United States");
    assert_eq!(places[0].timezone.as_deref(), Some("America/Chicago"));
    assert_eq!(places[1].country, "US");
    assert!(places[1].timezone.is_none());
    assert!(!places[0].is_same_place(&places[1]));
}

#[tokio::test]
async fn test_search_without_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "generationtime_ms": 0.2 })),
        )
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let places = geocoder.search("Qwxzyville").await.unwrap();

    assert!(places.is_empty());
}

#[tokio::test]
async fn test_search_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let geocoder = HttpGeocoder::new(endpoints(&mock_server)).unwrap();
    let result = geocoder.search("Paris").await;

    assert!(matches!(result, Err(GeocodingError::Status(429))));
}

#[tokio::test]
async fn test_conditions_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("temperature_unit", "fahrenheit"))
        .and(query_param("timeformat", "unixtime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast(63, 0)))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(
        format!("{}/v1/forecast", mock_server.uri()),
        TemperatureUnit::Fahrenheit,
    )
    .unwrap();
    let conditions = provider.conditions(paris()).await.unwrap();

    assert_eq!(conditions.weather_code, 63);
    assert!(!conditions.is_day);
    assert_eq!(conditions.sunrise, Some(1746072900));
    assert_eq!(conditions.sunset, Some(1746126300));
    assert_eq!(conditions.temperature, Some(17.3));
    assert_eq!(conditions.timezone.as_deref(), Some("Europe/Paris"));
}

#[tokio::test]
async fn test_conditions_missing_current_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "timezone": "GMT",
            "utc_offset_seconds": 0
        })))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(
        format!("{}/v1/forecast", mock_server.uri()),
        TemperatureUnit::Celsius,
    )
    .unwrap();
    let result = provider.conditions(paris()).await;

    assert!(matches!(result, Err(WeatherError::Parse(_))));
}
