// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Learning platform (Moodle web service) client.
//!
//! Only one call is needed: the learner's enrolled courses with their
//! completion percentage. The payload is returned untouched; shaping it is
//! the normalizer's job, since the platform sometimes answers with an error
//! object and HTTP 200.

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Course-query collaborator: enrolled courses for an external learner ID.
#[async_trait]
pub trait CourseSource: Send + Sync {
    async fn fetch_courses(&self, learner_id: u64) -> Result<Value, AppError>;
}

/// Moodle REST client.
#[derive(Clone)]
pub struct MoodleClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MoodleClient {
    /// Create a client for `base_url` authenticated with a web service token.
    pub fn new(base_url: String, token: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/webservice/rest/server.php", self.base_url)
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json(&self, response: reqwest::Response) -> Result<Value, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Course source returned an error status");
            return Err(AppError::CourseSource(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::CourseSource(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl CourseSource for MoodleClient {
    async fn fetch_courses(&self, learner_id: u64) -> Result<Value, AppError> {
        let learner = learner_id.to_string();
        let response = self
            .http
            .get(self.endpoint())
            .query(&[
                ("wstoken", self.token.as_str()),
                ("wsfunction", "core_enrol_get_users_courses"),
                ("moodlewsrestformat", "json"),
                ("userid", learner.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("course query for learner {}", learner_id))
                } else {
                    AppError::CourseSource(e.to_string())
                }
            })?;

        self.check_response_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = MoodleClient::new(
            "https://moodle.example.org/".to_string(),
            "token".to_string(),
            Duration::from_secs(1),
        );
        assert_eq!(
            client.endpoint(),
            "https://moodle.example.org/webservice/rest/server.php"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_course_source_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let client = MoodleClient::new(
            "http://127.0.0.1:9".to_string(),
            "token".to_string(),
            Duration::from_millis(500),
        );

        let err = client.fetch_courses(42).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::CourseSource(_) | AppError::Timeout(_)
        ));
    }
}
