use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use rideline_domain::{Booking, Trip};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::api::{ApiError, BookingApi, NewBooking, TripCompletion};
use crate::app_config::ApiConfig;

/// HTTP implementation of [`BookingApi`] against the remote booking service
pub struct HttpBookingApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

/// `GET /api/bookings/my` wraps its list in an envelope
#[derive(Debug, Deserialize)]
struct BookingsEnvelope {
    bookings: Vec<Booking>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<Vec<ErrorDetail>>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Pull a human-readable message out of an error response body: the first
/// structured error when present, else the top-level message, else a
/// generic fallback.
fn extract_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(detail) = parsed
            .errors
            .into_iter()
            .flatten()
            .find_map(|d| d.message)
        {
            return detail;
        }
        if let Some(message) = parsed.message {
            return message;
        }
    }
    "unknown error".to_string()
}

impl HttpBookingApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = extract_message(&body);
            tracing::debug!(status = %status, %message, "remote rejected request");
            return Err(ApiError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Network(format!("undecodable response body: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let mut req = self.request(Method::PATCH, path);
        if let Some(body) = body {
            req = req.json(body);
        }
        self.send(req).await
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn create_booking(&self, req: &NewBooking) -> Result<Booking, ApiError> {
        self.send(self.request(Method::POST, "/api/bookings").json(req))
            .await
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        let envelope: BookingsEnvelope = self.get("/api/bookings/my").await?;
        Ok(envelope.bookings)
    }

    async fn driver_pending(&self) -> Result<Vec<Booking>, ApiError> {
        self.get("/api/bookings/driver/pending").await
    }

    async fn driver_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        self.get("/api/bookings/driver").await
    }

    async fn booking(&self, id: Uuid) -> Result<Booking, ApiError> {
        self.get(&format!("/api/bookings/{}", id)).await
    }

    async fn accept(&self, id: Uuid) -> Result<Booking, ApiError> {
        self.patch::<_, ()>(&format!("/api/bookings/{}/accept", id), None)
            .await
    }

    async fn reject(&self, id: Uuid, reason: &str) -> Result<Booking, ApiError> {
        let body = json!({ "reason": reason });
        self.patch(&format!("/api/bookings/{}/reject", id), Some(&body))
            .await
    }

    async fn complete(&self, id: Uuid) -> Result<Booking, ApiError> {
        self.patch::<_, ()>(&format!("/api/bookings/{}/complete", id), None)
            .await
    }

    async fn cancel(&self, id: Uuid, reason: Option<&str>) -> Result<Booking, ApiError> {
        let body = match reason {
            Some(reason) => json!({ "reason": reason }),
            None => json!({}),
        };
        self.patch(&format!("/api/bookings/{}/cancel", id), Some(&body))
            .await
    }

    async fn complete_trip(&self, trip_id: Uuid) -> Result<TripCompletion, ApiError> {
        self.patch::<_, ()>(&format!("/api/trips/{}/complete", trip_id), None)
            .await
    }

    async fn driver_trips(&self) -> Result<Vec<Trip>, ApiError> {
        self.get("/api/trips/driver").await
    }
}
