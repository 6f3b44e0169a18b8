//! Maps service-level errors onto the application error hierarchy so the
//! CLI can show `AppError::user_message()` instead of raw transport text.

use skycast_core::{
    AppError, GeocodingError as AppGeocodingError, LocationError as AppLocationError,
    NetworkError, StorageError as AppStorageError,
};
use skycast_weather::{GeocodingError, LocationError, StorageError, WeatherError};

pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

fn network(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        NetworkError::Timeout.into()
    } else {
        NetworkError::ConnectionFailed(e.to_string()).into()
    }
}

fn server(status: u16) -> AppError {
    NetworkError::ServerError {
        status,
        message: format!("HTTP {}", status),
    }
    .into()
}

impl IntoAppError for StorageError {
    fn into_app_error(self) -> AppError {
        match self {
            StorageError::Backend(reason) => AppStorageError::Unavailable(reason).into(),
            StorageError::Corrupt { key, reason } => {
                AppStorageError::Corruption(format!("{}: {}", key, reason)).into()
            }
        }
    }
}

impl IntoAppError for LocationError {
    fn into_app_error(self) -> AppError {
        match self {
            LocationError::PermissionDenied => AppLocationError::PermissionDenied.into(),
            LocationError::Timeout => AppLocationError::Timeout.into(),
            LocationError::ServiceUnavailable => {
                AppLocationError::Unavailable("location service unavailable".to_string()).into()
            }
            LocationError::Other(reason) => AppLocationError::Unavailable(reason).into(),
        }
    }
}

impl IntoAppError for GeocodingError {
    fn into_app_error(self) -> AppError {
        match self {
            GeocodingError::Network(e) => network(e),
            GeocodingError::Status(status) if status >= 500 => server(status),
            GeocodingError::Status(status) => {
                AppGeocodingError::Service(format!("HTTP {}", status)).into()
            }
            GeocodingError::Parse(reason) => NetworkError::InvalidResponse(reason).into(),
            GeocodingError::NoResult => AppGeocodingError::NoResults(String::new()).into(),
        }
    }
}

impl IntoAppError for WeatherError {
    fn into_app_error(self) -> AppError {
        match self {
            WeatherError::Network(e) => network(e),
            WeatherError::Status(status) => server(status),
            WeatherError::Parse(reason) => NetworkError::InvalidResponse(reason).into(),
        }
    }
}
