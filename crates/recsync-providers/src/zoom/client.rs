//! Zoom REST API client.
//!
//! Low-level HTTP access to the users and cloud recording endpoints:
//! request building, status mapping and response parsing. Conversion from
//! the wire schema to [`Recording`] happens here too, so nothing above this
//! module sees Zoom's JSON.

use chrono::{DateTime, Utc};
use recsync_core::{DateWindow, MeetingId, Recording, RecordingFile};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{DeleteAction, Owner, RecordingPage};

use super::config::ZoomConfig;
use super::oauth::AccessToken;

/// Zoom REST API client.
#[derive(Debug)]
pub struct ZoomApiClient {
    http_client: reqwest::Client,
    api_base: String,
    access_token: AccessToken,
    page_size: u32,
    delete_action: DeleteAction,
}

impl ZoomApiClient {
    /// Creates a new client bound to one access token.
    pub fn new(config: &ZoomConfig, access_token: AccessToken) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::configuration("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.clone(),
            access_token,
            page_size: config.page_size,
            delete_action: config.delete_action,
        })
    }

    /// The token this client authenticates with.
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Lists every active user of the account, following pagination.
    pub async fn list_users(&self) -> ProviderResult<Vec<Owner>> {
        let url = format!("{}/users", self.api_base);
        let mut owners = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(&url)
                .bearer_auth(self.access_token.secret())
                .query(&[("page_size", self.page_size.to_string())]);
            if let Some(ref token) = page_token {
                request = request.query(&[("next_page_token", token)]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ProviderError::from_transport("user listing", e))?;
            let page: UserListResponse = parse_json(check_status(response).await?).await?;

            owners.extend(page.users.into_iter().map(ApiUser::into_owner));

            match non_empty(page.next_page_token) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("fetched {} users", owners.len());
        Ok(owners)
    }

    /// Fetches one page of an owner's recordings inside `window`.
    ///
    /// The endpoint's `to` is inclusive, so the window's last day is sent.
    pub async fn list_recordings_page(
        &self,
        owner_id: &str,
        window: DateWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<RecordingPage> {
        let Some(last_day) = window.last_day() else {
            return Ok(RecordingPage::default());
        };

        let url = format!(
            "{}/users/{}/recordings",
            self.api_base,
            urlencoding::encode(owner_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(self.access_token.secret())
            .query(&[
                ("from", window.start.format("%Y-%m-%d").to_string()),
                ("to", last_day.format("%Y-%m-%d").to_string()),
                ("page_size", self.page_size.to_string()),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("next_page_token", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("recording listing", e))?;
        let page: RecordingListResponse = parse_json(check_status(response).await?).await?;

        let total = page.meetings.len();
        let recordings: Vec<Recording> = page
            .meetings
            .into_iter()
            .filter_map(ApiMeeting::into_recording)
            .collect();
        if recordings.len() != total {
            warn!(
                owner = owner_id,
                %window,
                skipped = total - recordings.len(),
                "skipped malformed meetings in listing"
            );
        }

        Ok(RecordingPage {
            recordings,
            next_page_token: non_empty(page.next_page_token),
        })
    }

    /// Deletes all recording files of a meeting instance.
    ///
    /// Success is exactly `204 No Content`.
    pub async fn delete_recordings(&self, meeting_id: &MeetingId) -> ProviderResult<()> {
        let url = format!(
            "{}/meetings/{}/recordings",
            self.api_base,
            encode_meeting_uuid(meeting_id.as_str())
        );

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(self.access_token.secret())
            .query(&[("action", self.delete_action.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("recording deletion", e))?;

        let response = check_status(response).await?;
        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::invalid_response(format!(
                "unexpected delete response ({}): {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Encodes a meeting UUID for use as a path segment.
///
/// UUIDs that start with `/` or contain `//` must be encoded twice or the
/// API resolves them to a different meeting.
pub fn encode_meeting_uuid(uuid: &str) -> String {
    let once = urlencoding::encode(uuid).into_owned();
    if uuid.starts_with('/') || uuid.contains("//") {
        urlencoding::encode(&once).into_owned()
    } else {
        once
    }
}

/// Maps non-success statuses to provider errors.
async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let err = ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        ));
        return Err(match retry_after {
            Some(secs) => err.with_retry_after(std::time::Duration::from_secs(secs)),
            None => err,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);

    Err(match status {
        reqwest::StatusCode::UNAUTHORIZED => {
            ProviderError::authentication(format!("access token rejected: {}", message))
        }
        reqwest::StatusCode::FORBIDDEN => {
            ProviderError::authorization(format!("access denied: {}", message))
        }
        reqwest::StatusCode::NOT_FOUND => ProviderError::not_found(message),
        s if s.is_client_error() => ProviderError::bad_request(format!("API error ({}): {}", s, message)),
        s => ProviderError::server(format!("API error ({}): {}", s, message)),
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {}", e))
    })
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Response from `GET /users`.
#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    users: Vec<ApiUser>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    #[serde(default)]
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl ApiUser {
    fn into_owner(self) -> Owner {
        let owner = Owner::new(self.id, self.email);
        match (self.first_name, self.last_name) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                owner.with_display_name(format!("{} {}", first, last))
            }
            _ => owner,
        }
    }
}

/// Response from `GET /users/{id}/recordings`.
#[derive(Debug, Deserialize)]
struct RecordingListResponse {
    #[serde(default)]
    meetings: Vec<ApiMeeting>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMeeting {
    uuid: Option<String>,
    id: Option<u64>,
    #[serde(default)]
    topic: String,
    start_time: Option<String>,
    #[serde(default)]
    recording_files: Vec<ApiRecordingFile>,
}

impl ApiMeeting {
    fn into_recording(self) -> Option<Recording> {
        let Some(uuid) = self.uuid.filter(|u| !u.is_empty()) else {
            warn!(meeting_number = ?self.id, "meeting has no uuid");
            return None;
        };

        let start_time = match self.start_time.as_deref().map(DateTime::parse_from_rfc3339) {
            Some(Ok(parsed)) => parsed.with_timezone(&Utc),
            Some(Err(e)) => {
                warn!(meeting_id = %uuid, "failed to parse start time: {}", e);
                return None;
            }
            None => {
                warn!(meeting_id = %uuid, "meeting has no start time");
                return None;
            }
        };

        let mut recording = Recording::new(uuid, self.topic, start_time);
        recording.meeting_number = self.id;
        recording.files = self
            .recording_files
            .into_iter()
            .map(ApiRecordingFile::into_file)
            .collect();
        Some(recording)
    }
}

#[derive(Debug, Deserialize)]
struct ApiRecordingFile {
    id: Option<String>,
    #[serde(default)]
    file_type: String,
    #[serde(default)]
    file_extension: String,
    file_size: Option<u64>,
    download_url: Option<String>,
    recording_type: Option<String>,
}

impl ApiRecordingFile {
    fn into_file(self) -> RecordingFile {
        RecordingFile {
            id: self.id,
            file_type: self.file_type,
            file_extension: self.file_extension,
            recording_type: self.recording_type,
            download_url: self.download_url,
            file_size: self.file_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::zoom::config::ZoomCredentials;
    use chrono::NaiveDate;
    use mockito::Matcher;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client(server: &mockito::ServerGuard) -> ZoomApiClient {
        let config = ZoomConfig::new(ZoomCredentials::new("a", "c", "s"))
            .with_api_base(format!("{}/v2", server.url()));
        ZoomApiClient::new(&config, AccessToken::new("tok", Some(3600))).unwrap()
    }

    const PAGE_ONE: &str = r#"{
        "from": "2024-03-01",
        "to": "2024-03-30",
        "page_size": 300,
        "next_page_token": "page-2",
        "meetings": [
            {
                "uuid": "4444AAAiAAAAAiAiAiiAii==",
                "id": 123456789,
                "topic": "Weekly sync",
                "start_time": "2024-03-15T10:00:00Z",
                "recording_files": [
                    {
                        "id": "f-1",
                        "file_type": "MP4",
                        "file_extension": "MP4",
                        "file_size": 1024,
                        "download_url": "https://zoom.us/rec/download/f-1",
                        "recording_type": "shared_screen_with_speaker_view",
                        "status": "completed"
                    },
                    {
                        "id": "f-2",
                        "file_type": "",
                        "file_extension": "M4A",
                        "recording_type": "audio_only",
                        "status": "processing"
                    }
                ]
            },
            {
                "id": 42,
                "topic": "No uuid",
                "start_time": "2024-03-16T10:00:00Z"
            }
        ]
    }"#;

    const PAGE_TWO: &str = r#"{
        "next_page_token": "",
        "meetings": [
            {
                "uuid": "/ajdh//j==",
                "id": 987,
                "topic": "Retro",
                "start_time": "2024-03-20T15:30:00Z",
                "recording_files": []
            }
        ]
    }"#;

    #[tokio::test]
    async fn lists_recordings_with_inclusive_to() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/users/u1/recordings")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("from".into(), "2024-03-01".into()),
                Matcher::UrlEncoded("to".into(), "2024-03-30".into()),
                Matcher::UrlEncoded("page_size".into(), "300".into()),
            ]))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(PAGE_ONE)
            .create_async()
            .await;

        let window = DateWindow { start: date(2024, 3, 1), end: date(2024, 3, 31) };
        let page = client(&server)
            .list_recordings_page("u1", window, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
        assert_eq!(page.recordings.len(), 1, "meeting without uuid is dropped");

        let recording = &page.recordings[0];
        assert_eq!(recording.meeting_id.as_str(), "4444AAAiAAAAAiAiAiiAii==");
        assert_eq!(recording.meeting_number, Some(123456789));
        assert_eq!(recording.topic, "Weekly sync");
        assert_eq!(recording.files.len(), 2);
        assert_eq!(recording.files[0].file_size, Some(1024));
        assert_eq!(recording.files[1].file_type, "");
        assert!(recording.files[1].download_url.is_none());
    }

    #[tokio::test]
    async fn empty_next_page_token_ends_pagination() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/users/u1/recordings")
            .match_query(Matcher::UrlEncoded("next_page_token".into(), "page-2".into()))
            .with_status(200)
            .with_body(PAGE_TWO)
            .create_async()
            .await;

        let window = DateWindow { start: date(2024, 3, 1), end: date(2024, 3, 31) };
        let page = client(&server)
            .list_recordings_page("u1", window, Some("page-2"))
            .await
            .unwrap();
        assert!(page.next_page_token.is_none());
        assert_eq!(page.recordings[0].meeting_id.as_str(), "/ajdh//j==");
        assert!(page.recordings[0].files.is_empty());
    }

    #[tokio::test]
    async fn empty_window_makes_no_request() {
        let server = mockito::Server::new_async().await;
        let window = DateWindow { start: date(2024, 3, 1), end: date(2024, 3, 1) };
        let page = client(&server).list_recordings_page("u1", window, None).await.unwrap();
        assert!(page.recordings.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/users/u1/recordings")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body(r#"{"code":503,"message":"maintenance"}"#)
            .create_async()
            .await;

        let window = DateWindow { start: date(2024, 3, 1), end: date(2024, 3, 31) };
        let err = client(&server)
            .list_recordings_page("u1", window, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.message().contains("maintenance"));
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/users")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("Retry-After", "30")
            .create_async()
            .await;

        let err = client(&server).list_users().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert!(err.message().contains("30 seconds"));
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn lists_users_across_pages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/users")
            .match_query(Matcher::Regex("^page_size=300$".into()))
            .with_status(200)
            .with_body(
                r#"{"next_page_token":"p2","users":[{"id":"u1","email":"ann@example.com","first_name":"Ann","last_name":"Lee"}]}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/v2/users")
            .match_query(Matcher::UrlEncoded("next_page_token".into(), "p2".into()))
            .with_status(200)
            .with_body(r#"{"next_page_token":"","users":[{"id":"u2","email":"bob@example.com"}]}"#)
            .create_async()
            .await;

        let owners = client(&server).list_users().await.unwrap();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0].display_name, "Ann Lee");
        assert_eq!(owners[1].display_name, "bob@example.com");
    }

    #[tokio::test]
    async fn delete_requires_no_content() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("DELETE", Matcher::Regex(r"^/v2/meetings/abc.+/recordings$".into()))
            .match_query(Matcher::UrlEncoded("action".into(), "trash".into()))
            .with_status(204)
            .create_async()
            .await;
        let api = client(&server);
        api.delete_recordings(&MeetingId::new("abc==")).await.unwrap();
        ok.assert_async().await;

        server
            .mock("DELETE", "/v2/meetings/gone/recordings")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"code":3301,"message":"This recording does not exist."}"#)
            .create_async()
            .await;
        let err = api.delete_recordings(&MeetingId::new("gone")).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
    }

    #[test]
    fn meeting_uuid_encoding() {
        assert_eq!(encode_meeting_uuid("abc=="), "abc%3D%3D");
        assert_eq!(encode_meeting_uuid("a+b"), "a%2Bb");
        assert_eq!(encode_meeting_uuid("/abc"), "%252Fabc");
        assert_eq!(encode_meeting_uuid("ab//c"), "ab%252F%252Fc");
    }
}
