//! Dropbox snapshot uploads.
//!
//! Uses the content upload endpoint with a bearer access token. Obtaining the token (the
//! OAuth flow for the configured app key) happens outside this process.

use std::time::Duration;

use super::Uploader;
use crate::config::DropboxSettings;
use crate::error::UploadError;

const UPLOAD_ENDPOINT: &str = "https://content.dropboxapi.com/2/files/upload";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DropboxUploader {
    agent: ureq::Agent,
    endpoint: String,
    access_token: String,
}

impl DropboxUploader {
    pub fn new(settings: &DropboxSettings) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            endpoint: UPLOAD_ENDPOINT.to_string(),
            access_token: settings.access_token.clone(),
        }
    }

    /// Point at a different API host (staging, local mock).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Uploader for DropboxUploader {
    fn name(&self) -> &'static str {
        "dropbox"
    }

    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError> {
        let api_arg = api_arg(destination);
        let result = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Content-Type", "application/octet-stream")
            .set("Dropbox-API-Arg", &api_arg)
            .send_bytes(image);
        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, response)) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|e| format!("unreadable error body: {}", e));
                Err(UploadError::Remote { status, message })
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(UploadError::Transport(transport.to_string()))
            }
        }
    }
}

/// Dropbox paths are absolute.
fn normalize_path(destination: &str) -> String {
    if destination.starts_with('/') {
        destination.to_string()
    } else {
        format!("/{}", destination)
    }
}

fn api_arg(destination: &str) -> String {
    let arg = serde_json::json!({
        "path": normalize_path(destination),
        "mode": "add",
        "autorename": true,
        "mute": false,
    });
    header_safe(&arg.to_string())
}

/// HTTP headers carry ASCII only; escape everything else as JSON `\u` sequences.
fn header_safe(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}
