use crate::config::RecordingAuth;
use crate::error::VoiceError;

/// Maximum recording download size (10 MiB).
pub const MAX_RECORDING_BYTES: usize = 10 * 1024 * 1024;

/// Downloads call recordings from the telephony provider.
#[derive(Debug, Clone)]
pub struct RecordingFetcher {
    client: reqwest::Client,
    auth: Option<RecordingAuth>,
    max_bytes: usize,
}

impl RecordingFetcher {
    pub fn new(client: reqwest::Client, auth: Option<RecordingAuth>) -> Self {
        Self {
            client,
            auth: auth.filter(|a| !a.account_sid.is_empty()),
            max_bytes: MAX_RECORDING_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetches the recording at `url`.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Recording` for non-http(s) URLs, non-success
    /// statuses, empty bodies, and bodies over the size cap.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, VoiceError> {
        validate_recording_url(url)?;

        let mut request = self.client.get(url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.account_sid, Some(&auth.auth_token));
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| VoiceError::Recording(format!("download failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::Recording(format!(
                "recording download returned {}",
                status
            )));
        }
        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(self.too_large(len as usize));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| VoiceError::Recording(format!("download interrupted: {}", e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(VoiceError::Recording("recording is empty".to_string()));
        }
        tracing::debug!(bytes = body.len(), "recording downloaded");
        Ok(body)
    }

    fn too_large(&self, len: usize) -> VoiceError {
        VoiceError::Recording(format!(
            "recording exceeds maximum size: {} bytes (limit: {} bytes)",
            len, self.max_bytes
        ))
    }
}

fn validate_recording_url(url: &str) -> Result<(), VoiceError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| VoiceError::Recording(format!("invalid recording url: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(VoiceError::Recording(format!(
            "unsupported recording url scheme: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_are_fetched() {
        assert!(validate_recording_url("https://api.twilio.com/rec/RE1").is_ok());
        assert!(validate_recording_url("http://localhost:8080/rec.wav").is_ok());
        assert!(validate_recording_url("file:///etc/passwd").is_err());
        assert!(validate_recording_url("not a url").is_err());
    }

    #[test]
    fn blank_account_disables_auth() {
        let fetcher = RecordingFetcher::new(
            reqwest::Client::new(),
            Some(RecordingAuth {
                account_sid: String::new(),
                auth_token: "x".to_string(),
            }),
        );
        assert!(fetcher.auth.is_none());
    }

    #[tokio::test]
    async fn rejected_scheme_never_hits_network() {
        let fetcher = RecordingFetcher::new(reqwest::Client::new(), None);
        let err = fetcher.fetch("ftp://example.com/a.wav").await.unwrap_err();
        assert!(matches!(err, VoiceError::Recording(msg) if msg.contains("scheme")));
    }
}
