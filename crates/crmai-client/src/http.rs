//! reqwest implementation of [`AssistantBackend`]

use crate::backend::{
    AnalysisKind, AssistantBackend, ChatRequest, SpeechResponse, TranscriptionResponse,
};
use async_trait::async_trait;
use crmai_common::{AssistError, AudioPayload, ClientConfig, Result, endpoints};
use crmai_stream::ByteStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct SuggestionsResponse {
    #[serde(default)]
    suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct QuickAnalysisResponse {
    analysis: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

/// HTTP client for the `/ai/*` endpoints
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AssistError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Use an existing client (shared connection pool, cookies, auth headers)
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Non-streaming calls get the configured timeout; the chat stream does not.
    fn bounded(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.request_timeout_seconds {
            Some(secs) => request.timeout(Duration::from_secs(secs)),
            None => request,
        }
    }

    async fn send(&self, name: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(AssistError::Status {
                endpoint: name.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// For endpoints whose error statuses still carry a JSON body the
    /// session wants to read (`{"error": "..."}`).
    async fn send_lenient<T: DeserializeOwned>(
        &self,
        name: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        match serde_json::from_slice::<T>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(AssistError::Status {
                endpoint: name.to_string(),
                status: status.as_u16(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn transport(err: reqwest::Error) -> AssistError {
    AssistError::Transport(err.to_string())
}

#[async_trait]
impl AssistantBackend for HttpBackend {
    async fn suggestions(&self, page_context: &str) -> Result<Vec<String>> {
        let url = self.config.endpoint(endpoints::SUGGESTIONS);
        debug!("Loading suggestions for page '{}'", page_context);

        let request = self.bounded(self.client.get(&url).query(&[("page", page_context)]));
        let response = self.send(endpoints::SUGGESTIONS, request).await?;
        let body: SuggestionsResponse = response.json().await.map_err(transport)?;
        Ok(body.suggestions)
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.config.endpoint(endpoints::STREAM_CHAT);
        debug!("Opening chat stream for page '{}'", request.page_context);

        let response = self
            .send(endpoints::STREAM_CHAT, self.client.post(&url).json(request))
            .await?;

        Ok(response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(transport)
            .boxed())
    }

    async fn text_to_speech(&self, text: &str) -> Result<SpeechResponse> {
        let url = self.config.endpoint(endpoints::TEXT_TO_SPEECH);
        let request = self.bounded(self.client.post(&url).json(&SpeechRequest { text }));
        self.send_lenient(endpoints::TEXT_TO_SPEECH, request).await
    }

    async fn voice_input(&self, audio: AudioPayload) -> Result<TranscriptionResponse> {
        let url = self.config.endpoint(endpoints::VOICE_INPUT);
        debug!("Uploading {} bytes of recorded audio", audio.len());

        let part = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)
            .map_err(|e| AssistError::Transcription(format!("Invalid audio type: {}", e)))?;
        let form = Form::new().part("audio", part);

        let request = self.bounded(self.client.post(&url).multipart(form));
        self.send_lenient(endpoints::VOICE_INPUT, request).await
    }

    async fn quick_analysis(&self, kind: AnalysisKind, days: u32) -> Result<Option<String>> {
        let url = self.config.endpoint(endpoints::QUICK_ANALYSIS);
        let query = [("type", kind.as_str().to_string()), ("days", days.to_string())];

        let request = self.bounded(self.client.get(&url).query(&query));
        let response = self.send(endpoints::QUICK_ANALYSIS, request).await?;
        let body: QuickAnalysisResponse = response.json().await.map_err(transport)?;
        Ok(body.analysis.filter(|a| !a.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmai_stream::{EventStream, StreamEvent};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response; resolves to the raw request received.
    async fn serve_once(
        status: &str,
        content_type: &str,
        body: &str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn backend(base_url: String) -> HttpBackend {
        HttpBackend::new(ClientConfig::new(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_suggestions() {
        let (url, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"suggestions": ["Analyse team performance", "Who are the top consultants?"]}"#,
        )
        .await;

        let suggestions = backend(url).suggestions("consultants").await.unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0], "Analyse team performance");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /ai/suggestions?page=consultants "));
    }

    #[tokio::test]
    async fn test_suggestions_error_status() {
        let (url, _server) = serve_once(
            "500 Internal Server Error",
            "application/json",
            r#"{"error": "suggestion lookup failed"}"#,
        )
        .await;

        match backend(url).suggestions("dashboard").await {
            Err(AssistError::Status { status, .. }) => assert_eq!(status, 500),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_chat() {
        let body = concat!(
            "data: {\"type\": \"start\", \"message\": \"Thinking...\"}\n\n",
            "data: {\"type\": \"chunk\", \"content\": \"Hel\"}\n\n",
            "data: {\"type\": \"chunk\", \"content\": \"lo\"}\n\n",
            "data: {\"type\": \"end\", \"timestamp\": \"2024-05-01T10:00:00\"}\n\n",
        );
        let (url, server) = serve_once("200 OK", "text/event-stream", body).await;

        let request = ChatRequest {
            message: "Show me **last month** stats".to_string(),
            page_context: "dashboard".to_string(),
        };
        let bytes = backend(url).stream_chat(&request).await.unwrap();
        let mut events = EventStream::new(bytes);
        let mut last = None;
        while let Some(event) = events.next().await {
            last = Some(event.unwrap());
        }
        assert_eq!(last, Some(StreamEvent::End));
        assert_eq!(events.accumulated(), "Hello");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /ai/stream-chat "));
        assert!(raw.contains(r#""page_context":"dashboard""#));
    }

    #[tokio::test]
    async fn test_stream_chat_rejected() {
        let (url, _server) = serve_once("401 Unauthorized", "text/html", "login").await;
        let request = ChatRequest {
            message: "hi".to_string(),
            page_context: "dashboard".to_string(),
        };
        let result = backend(url).stream_chat(&request).await;
        assert!(matches!(result, Err(ref e) if e.is_transport()));
    }

    #[tokio::test]
    async fn test_voice_input_reads_error_body() {
        let (url, server) = serve_once(
            "400 Bad Request",
            "application/json",
            r#"{"error": "Empty audio file"}"#,
        )
        .await;

        let response = backend(url)
            .voice_input(AudioPayload::wav(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Empty audio file"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /ai/voice-input "));
        assert!(raw.contains("name=\"audio\""));
        assert!(raw.contains("filename=\"recording.wav\""));
    }

    #[tokio::test]
    async fn test_text_to_speech() {
        let (url, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"success": true, "audio_data": "UklGRg==", "audio_format": "wav"}"#,
        )
        .await;

        let response = backend(url).text_to_speech("Hello").await.unwrap();
        assert!(response.success);
        assert_eq!(response.audio_data.as_deref(), Some("UklGRg=="));

        let raw = server.await.unwrap();
        assert!(raw.contains(r#"{"text":"Hello"}"#));
    }

    #[tokio::test]
    async fn test_quick_analysis() {
        let (url, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"analysis": "Bookings are up 12%", "type": "trends", "period_days": 7}"#,
        )
        .await;

        let analysis = backend(url)
            .quick_analysis(AnalysisKind::Trends, 7)
            .await
            .unwrap();
        assert_eq!(analysis.as_deref(), Some("Bookings are up 12%"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /ai/quick-analysis?type=trends&days=7 "));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // bind then drop to get a port with no listener
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = backend(format!("http://{}", addr)).suggestions("dashboard").await;
        assert!(matches!(result, Err(AssistError::Transport(_))));
    }
}
