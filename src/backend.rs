//! Client for the camera server's REST endpoints.
//!
//! Every call is a form-encoded request whose response body is relayed back
//! to the user unchanged. The only structured response is the camera record
//! returned by `/camera/edit` with `cmd=get`.

use async_trait::async_trait;
use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, HttpClient, Request};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use url::form_urlencoded;

use crate::camera_form::CameraSettings;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("error in: {url} \nerror:\n{source}")]
    Transport {
        url: String,
        #[source]
        source: isahc::Error,
    },

    #[error("error in: {url} \nerror:\n{body}")]
    Status { url: String, status: u16, body: String },

    #[error("error in: {url} \nerror:\n{source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error in: {url} \nerror:\n{source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    Request(#[from] isahc::http::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(isahc::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Camera source as reported by `/camera/edit` with `cmd=get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub key: String,
    pub name: String,
    pub url: String,
    #[serde(deserialize_with = "flag_or_bool")]
    pub enabled: bool,
    pub poll_max_fps: u32,
    pub alert_max_fps: u32,
    pub num_secs_after: f64,
}

fn flag_or_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Operations the console performs against the camera server
#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn add_camera(&self, settings: &CameraSettings) -> BackendResult<String>;
    async fn save_camera(&self, key: &str, settings: &CameraSettings) -> BackendResult<String>;
    async fn get_camera(&self, key: &str) -> BackendResult<CameraRecord>;
    async fn delete_camera(&self, key: &str) -> BackendResult<String>;
    async fn trigger_camera(&self, key: &str) -> BackendResult<String>;
    async fn delete_event(&self, event: &str) -> BackendResult<String>;
}

pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

pub fn add_camera_body(settings: &CameraSettings) -> String {
    encode_form(&settings.form_pairs())
}

pub fn save_camera_body(key: &str, settings: &CameraSettings) -> String {
    let mut pairs = vec![("camera", key.to_string()), ("cmd", "save".to_string())];
    pairs.extend(settings.form_pairs());
    encode_form(&pairs)
}

/// [`CameraBackend`] speaking HTTP to the camera server
pub struct HttpBackend {
    client: HttpClient,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_form(&self, path: &str, body: String) -> BackendResult<String> {
        let url = self.url(path);
        debug!("📤 POST {} ({} bytes)", url, body.len());
        let request = Request::post(&url)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)?;
        self.send(url, request).await
    }

    async fn send(&self, url: String, request: Request<String>) -> BackendResult<String> {
        let mut response = match self.client.send_async(request).await {
            Ok(response) => response,
            Err(source) => {
                error!("❌ Request to {} failed: {}", url, source);
                return Err(BackendError::Transport { url, source });
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => return Err(BackendError::Body { url, source }),
        };

        if !status.is_success() {
            error!("❌ {} answered {}", url, status);
            return Err(BackendError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        info!("📥 {} answered {}", url, status);
        Ok(body)
    }
}

#[async_trait]
impl CameraBackend for HttpBackend {
    async fn add_camera(&self, settings: &CameraSettings) -> BackendResult<String> {
        self.post_form("/camera/add", add_camera_body(settings)).await
    }

    async fn save_camera(&self, key: &str, settings: &CameraSettings) -> BackendResult<String> {
        self.post_form("/camera/edit", save_camera_body(key, settings)).await
    }

    async fn get_camera(&self, key: &str) -> BackendResult<CameraRecord> {
        let body = encode_form(&[("camera", key), ("cmd", "get")]);
        let text = self.post_form("/camera/edit", body).await?;
        serde_json::from_str(&text).map_err(|source| BackendError::Decode {
            url: self.url("/camera/edit"),
            source,
        })
    }

    async fn delete_camera(&self, key: &str) -> BackendResult<String> {
        self.post_form("/camera/delete", encode_form(&[("camera", key)])).await
    }

    async fn trigger_camera(&self, key: &str) -> BackendResult<String> {
        let url = format!("{}?{}", self.url("/camera/trigger"), encode_form(&[("camera", key)]));
        debug!("📤 GET {}", url);
        let request = Request::get(&url).body(String::new())?;
        self.send(url, request).await
    }

    async fn delete_event(&self, event: &str) -> BackendResult<String> {
        self.post_form("/events/delete", encode_form(&[("event", event)])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CameraSettings {
        CameraSettings {
            name: "Back yard".to_string(),
            url: "http://cam/snap.jpg?a=1&b=2".to_string(),
            enabled: false,
            poll_max_fps: "1".to_string(),
            alert_max_fps: "10".to_string(),
            num_secs_after: "2".to_string(),
        }
    }

    #[test]
    fn test_add_body() {
        assert_eq!(
            add_camera_body(&settings()),
            "name=Back+yard&url=http%3A%2F%2Fcam%2Fsnap.jpg%3Fa%3D1%26b%3D2&enabled=0\
             &poll_max_fps=1&alert_max_fps=10&num_secs_after=2"
        );
    }

    #[test]
    fn test_save_body_leads_with_key_and_cmd() {
        let body = save_camera_body("cam-key", &settings());
        assert!(body.starts_with("camera=cam-key&cmd=save&name=Back+yard&"));
    }

    #[test]
    fn test_record_accepts_numeric_enabled() {
        let json = r#"{ "key": "k1", "name": "Garage", "url": "http://cam/x.jpg",
                        "enabled": 1, "poll_max_fps": 1, "alert_max_fps": 10,
                        "num_secs_after": 2.000000}"#;
        let record: CameraRecord = serde_json::from_str(json).unwrap();
        assert!(record.enabled);
        assert_eq!(record.num_secs_after, 2.0);

        let json = json.replace("\"enabled\": 1", "\"enabled\": false");
        let record: CameraRecord = serde_json::from_str(&json).unwrap();
        assert!(!record.enabled);
    }

    #[test]
    fn test_status_error_reads_like_notification() {
        let err = BackendError::Status {
            url: "http://cams/camera/add".to_string(),
            status: 500,
            body: "Traceback".to_string(),
        };
        assert_eq!(err.to_string(), "error in: http://cams/camera/add \nerror:\nTraceback");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new("http://cams:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/camera/add"), "http://cams:8081/camera/add");
    }
}
