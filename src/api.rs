// VK API client: the four-call sequence that turns a local image into a
// wall post on a community wall.
//
//   photos.getWallUploadServer -> POST file to upload_url
//     -> photos.saveWallPhoto -> wall.post
//
// Every response goes through two checks: the HTTP status first, then the
// body for an embedded `error` object (VK reports API errors with HTTP 200).
// No call is retried. An upload that is never saved stays orphaned on the
// VK side; nothing compensates for it.

use std::fs;
use std::path::Path;

use log::{debug, error, info};
use reqwest::blocking::{multipart, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::VkCredentials;
use crate::error::{Error, Result};
use crate::http;

/// Single-use upload endpoint. Requested fresh for every upload.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadAddress {
    #[serde(rename = "upload_url")]
    pub url: String,
}

/// Token proving a raw upload. Passed unmodified to `save`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadedPhotoRef {
    pub photo: String,
    pub server: i64,
    pub hash: String,
}

/// A photo saved to the community's wall album.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SavedPhoto {
    pub owner_id: i64,
    #[serde(rename = "id")]
    pub media_id: i64,
    #[serde(default)]
    pub text: String,
}

impl SavedPhoto {
    /// The `photo{owner_id}_{media_id}` attachment token for `wall.post`.
    pub fn attachment(&self) -> String {
        format!("photo{}_{}", self.owner_id, self.media_id)
    }
}

/// Result of `wall.post`. Fields other than `post_id` are kept verbatim.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WallPost {
    pub post_id: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Embedded VK error object.
#[derive(Deserialize, Debug)]
struct VkError {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// Method responses wrap their payload in `{"response": ...}`.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    response: T,
}

#[derive(Clone)]
pub struct VkClient {
    client: Client,
    base_url: String,
    credentials: VkCredentials,
}

impl VkClient {
    /// `base_url` is the method root, e.g. `https://api.vk.com/method`.
    pub fn new(client: Client, base_url: &str, credentials: VkCredentials) -> Self {
        VkClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("access_token", self.credentials.access_token.clone()),
            ("v", self.credentials.api_version.clone()),
        ]
    }

    /// Step 1: ask for a single-use upload address.
    pub fn request_upload_address(&self) -> Result<UploadAddress> {
        let url = self.method_url("photos.getWallUploadServer");
        let mut params = self.auth_params();
        params.push(("group_id", self.credentials.group_id.to_string()));

        let res = http::send(&url, self.client.get(&url).query(&params))?;
        let envelope: Envelope<UploadAddress> = read_checked(&url, res)?;
        debug!("Got upload address {}", envelope.response.url);
        Ok(envelope.response)
    }

    /// Step 2: multipart POST of the raw file as `file1`.
    pub fn upload(&self, file_path: &Path, address: &UploadAddress) -> Result<UploadedPhotoRef> {
        let url = address.url.as_str();
        let bytes = fs::read(file_path)?;
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("image")
            .to_string();

        let part = multipart::Part::bytes(bytes).file_name(file_name);
        let form = multipart::Form::new().part("file1", part);

        let res = http::send(url, self.client.post(url).multipart(form))?;
        let uploaded: UploadedPhotoRef = read_checked(url, res)?;
        info!("Uploaded {} to server {}", file_path.display(), uploaded.server);
        Ok(uploaded)
    }

    /// Step 3: persist the uploaded photo on the community wall album.
    pub fn save(&self, uploaded: &UploadedPhotoRef, caption: &str) -> Result<SavedPhoto> {
        let url = self.method_url("photos.saveWallPhoto");
        let mut params = self.auth_params();
        params.extend([
            ("group_id", self.credentials.group_id.to_string()),
            ("photo", uploaded.photo.clone()),
            ("server", uploaded.server.to_string()),
            ("hash", uploaded.hash.clone()),
            ("caption", caption.to_string()),
        ]);

        let res = http::send(&url, self.client.post(&url).query(&params))?;
        let envelope: Envelope<Vec<SavedPhoto>> = read_checked(&url, res)?;
        let saved = envelope
            .response
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(&url, "`response` array is empty"))?;
        info!("Saved photo {}", saved.attachment());
        Ok(saved)
    }

    /// Step 4: publish a wall post carrying the saved photo.
    ///
    /// The owner id goes out negated: negative ids address a community wall.
    pub fn publish(&self, saved: &SavedPhoto, message: &str, from_group: bool) -> Result<WallPost> {
        let url = self.method_url("wall.post");
        let owner_id = self.credentials.wall_owner_id()?;
        let mut params = self.auth_params();
        params.extend([
            ("owner_id", owner_id.to_string()),
            ("message", message.to_string()),
            ("from_group", u8::from(from_group).to_string()),
            ("attachments", saved.attachment()),
        ]);

        let res = http::send(&url, self.client.post(&url).query(&params))?;
        let envelope: Envelope<WallPost> = read_checked(&url, res)?;
        info!("Published wall post {}", envelope.response.post_id);
        Ok(envelope.response)
    }

    /// Run steps 1-4 in order. A failed step stops the sequence.
    pub fn post_photo(&self, file_path: &Path, caption: &str) -> Result<WallPost> {
        let address = self.request_upload_address()?;
        let uploaded = self.upload(file_path, &address)?;
        let saved = self.save(&uploaded, caption)?;
        self.publish(&saved, &saved.text, true)
    }
}

/// Parse the body, surface an embedded `error` object as `Error::Api`, then
/// decode the expected shape.
fn read_checked<T: DeserializeOwned>(url: &str, res: reqwest::blocking::Response) -> Result<T> {
    let mut value = http::read_json(url, res)?;
    if let Some(err) = value.as_object_mut().and_then(|obj| obj.remove("error")) {
        let err = api_error(err);
        error!("{url} rejected the request: {err}");
        return Err(err);
    }
    http::decode(url, value)
}

fn api_error(err: Value) -> Error {
    match err {
        // The upload server reports some failures as a bare string.
        Value::String(message) => Error::Api { code: 0, message },
        other => match serde_json::from_value::<VkError>(other.clone()) {
            Ok(VkError { error_code, error_msg }) => Error::Api {
                code: error_code,
                message: error_msg,
            },
            Err(_) => Error::Api {
                code: 0,
                message: other.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod local_tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use tempfile::TempDir;

    const GROUP_ID: i64 = 212345678;

    fn credentials() -> VkCredentials {
        VkCredentials {
            access_token: "token".into(),
            api_version: "5.131".into(),
            group_id: GROUP_ID,
        }
    }

    fn vk_client(server: &ServerGuard) -> VkClient {
        VkClient::new(
            Client::new(),
            &format!("{}/method", server.url()),
            credentials(),
        )
    }

    fn image_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("comic.png");
        fs::write(&path, "png bytes").unwrap();
        path
    }

    fn mock_upload_server(server: &mut ServerGuard) -> Mock {
        let body = format!(r#"{{"response": {{"upload_url": "{}/upload"}}}}"#, server.url());
        server
            .mock("GET", "/method/photos.getWallUploadServer")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("access_token".into(), "token".into()),
                Matcher::UrlEncoded("v".into(), "5.131".into()),
                Matcher::UrlEncoded("group_id".into(), GROUP_ID.to_string()),
            ]))
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create()
    }

    fn mock_upload(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex("name=\"file1\"".into()))
            .with_status(200)
            .with_body(r#"{"server": 838, "photo": "[{\"photo\":\"abc\"}]", "hash": "h4sh"}"#)
            .expect(1)
            .create()
    }

    fn mock_save(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/method/photos.saveWallPhoto")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("group_id".into(), GROUP_ID.to_string()),
                Matcher::UrlEncoded("photo".into(), "[{\"photo\":\"abc\"}]".into()),
                Matcher::UrlEncoded("server".into(), "838".into()),
                Matcher::UrlEncoded("hash".into(), "h4sh".into()),
                Matcher::UrlEncoded("caption".into(), "alt text".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"response": [{"id": 457239017, "owner_id": -212345678, "text": "alt text"}]}"#)
            .expect(1)
            .create()
    }

    fn mock_publish(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/method/wall.post")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("owner_id".into(), "-212345678".into()),
                Matcher::UrlEncoded("from_group".into(), "1".into()),
                Matcher::UrlEncoded("message".into(), "alt text".into()),
                Matcher::UrlEncoded("attachments".into(), "photo-212345678_457239017".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"response": {"post_id": 42}}"#)
            .expect(1)
            .create()
    }

    #[test]
    fn test_post_photo_runs_all_four_steps() {
        let mut server = Server::new();
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir);
        let address = mock_upload_server(&mut server);
        let upload = mock_upload(&mut server);
        let save = mock_save(&mut server);
        let publish = mock_publish(&mut server);

        let post = vk_client(&server).post_photo(&path, "alt text").unwrap();

        assert_eq!(post.post_id, 42);
        address.assert();
        upload.assert();
        save.assert();
        publish.assert();
    }

    #[test]
    fn test_address_error_stops_before_upload() {
        let mut server = Server::new();
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir);
        let _address = server
            .mock("GET", "/method/photos.getWallUploadServer")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": {"error_code": 5, "error_msg": "User authorization failed"}}"#)
            .create();
        let upload = server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let err = vk_client(&server).post_photo(&path, "alt text").unwrap_err();

        match err {
            Error::Api { code, ref message } => {
                assert_eq!(code, 5);
                assert_eq!(message, "User authorization failed");
            }
            other => panic!("expected API error, got {other:?}"),
        }
        upload.assert();
    }

    #[test]
    fn test_upload_error_stops_before_save() {
        let mut server = Server::new();
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir);
        let _address = mock_upload_server(&mut server);
        let _upload = server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "invalid file"}"#)
            .create();
        let save = server
            .mock("POST", "/method/photos.saveWallPhoto")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let err = vk_client(&server).post_photo(&path, "alt text").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Api);
        save.assert();
    }

    #[test]
    fn test_http_failure_is_transport_not_api() {
        let mut server = Server::new();
        let _address = server
            .mock("GET", "/method/photos.getWallUploadServer")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body(r#"{"error": {"error_code": 10, "error_msg": "Internal server error"}}"#)
            .create();

        let err = vk_client(&server).request_upload_address().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_missing_upload_url_is_malformed() {
        let mut server = Server::new();
        let _address = server
            .mock("GET", "/method/photos.getWallUploadServer")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"response": {"album_id": -14}}"#)
            .create();

        let err = vk_client(&server).request_upload_address().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_empty_save_response_is_malformed() {
        let mut server = Server::new();
        let _save = server
            .mock("POST", "/method/photos.saveWallPhoto")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"response": []}"#)
            .create();
        let uploaded = UploadedPhotoRef {
            photo: "[]".into(),
            server: 1,
            hash: "h".into(),
        };

        let err = vk_client(&server).save(&uploaded, "caption").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_publish_negates_group_id() {
        let mut server = Server::new();
        let publish = server
            .mock("POST", "/method/wall.post")
            .match_query(Matcher::UrlEncoded("owner_id".into(), "-7".into()))
            .with_status(200)
            .with_body(r#"{"response": {"post_id": 3}}"#)
            .expect(1)
            .create();
        let client = VkClient::new(
            Client::new(),
            &format!("{}/method", server.url()),
            VkCredentials {
                group_id: 7,
                ..credentials()
            },
        );
        let saved = SavedPhoto {
            owner_id: -7,
            media_id: 9,
            text: String::new(),
        };

        let post = client.publish(&saved, "hello", true).unwrap();

        assert_eq!(post.post_id, 3);
        publish.assert();
    }

    #[test]
    fn test_publish_rejects_non_positive_group_id() {
        let mut server = Server::new();
        let publish = server
            .mock("POST", "/method/wall.post")
            .match_query(Matcher::Any)
            .expect(0)
            .create();
        let saved = SavedPhoto {
            owner_id: 1,
            media_id: 9,
            text: String::new(),
        };

        for group_id in [0, -212345678, i64::MIN] {
            let client = VkClient::new(
                Client::new(),
                &format!("{}/method", server.url()),
                VkCredentials {
                    group_id,
                    ..credentials()
                },
            );
            let err = client.publish(&saved, "hello", true).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{group_id}");
        }
        publish.assert();
    }

    #[test]
    fn test_save_error_stops_before_publish() {
        let mut server = Server::new();
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir);
        let _address = mock_upload_server(&mut server);
        let _upload = mock_upload(&mut server);
        let _save = server
            .mock("POST", "/method/photos.saveWallPhoto")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": {"error_code": 100, "error_msg": "One of the parameters specified was missing or invalid: hash is invalid"}}"#)
            .create();
        let publish = server
            .mock("POST", "/method/wall.post")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let err = vk_client(&server).post_photo(&path, "alt text").unwrap_err();

        match err {
            Error::Api { code, ref message } => {
                assert_eq!(code, 100);
                assert!(message.contains("hash is invalid"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
        publish.assert();
    }

    #[test]
    fn test_save_http_failure_is_transport() {
        let mut server = Server::new();
        let _save = server
            .mock("POST", "/method/photos.saveWallPhoto")
            .match_query(Matcher::Any)
            .with_status(503)
            .create();
        let uploaded = UploadedPhotoRef {
            photo: "[]".into(),
            server: 1,
            hash: "h".into(),
        };

        let err = vk_client(&server).save(&uploaded, "caption").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_attachment_token() {
        let saved = SavedPhoto {
            owner_id: -212345678,
            media_id: 457239017,
            text: "x".into(),
        };
        assert_eq!(saved.attachment(), "photo-212345678_457239017");
    }
}
