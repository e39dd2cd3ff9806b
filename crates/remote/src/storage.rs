//! Object storage endpoints (avatar bucket).

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};

use hearth_core::errors::{Error, Result};
use hearth_core::remote::{ObjectStorage, UploadOptions};

use crate::client::RestClient;

impl RestClient {
    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key)
    }
}

#[async_trait]
impl ObjectStorage for RestClient {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<()> {
        let url = self.object_url(bucket, key);
        let mut headers = self.headers()?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&options.content_type)
                .map_err(|_| Error::Storage("Invalid content type".to_string()))?,
        );
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_str(&format!("max-age={}", options.cache_control_secs))
                .map_err(|_| Error::Storage("Invalid cache control".to_string()))?,
        );
        headers.insert(
            "x-upsert",
            HeaderValue::from_static(if options.upsert { "true" } else { "false" }),
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_response(response)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.public_url(bucket, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let response = Self::check_response(response)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        let bytes = response.bytes().await.map_err(Self::map_transport_error)?;
        Ok(bytes.to_vec())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{start_mock_server, MockResponse};

    #[tokio::test]
    async fn upload_sends_cache_and_upsert_headers() {
        let (base_url, captured, server) = start_mock_server(vec![MockResponse {
            status: 200,
            body: r#"{"Key":"avatars/u.jpg"}"#.to_string(),
        }])
        .await;

        let client = RestClient::new(&base_url, "anon").expect("client");
        client
            .upload(
                "avatars",
                "u.jpg",
                vec![0xFF, 0xD8, 0xFF],
                UploadOptions::avatar(),
            )
            .await
            .expect("upload");

        let requests = captured.lock().await.clone();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/storage/v1/object/avatars/u.jpg");
        assert_eq!(
            requests[0].headers.get("cache-control").map(String::as_str),
            Some("max-age=3600")
        );
        assert_eq!(
            requests[0].headers.get("content-type").map(String::as_str),
            Some("image/jpeg")
        );
        assert_eq!(
            requests[0].headers.get("x-upsert").map(String::as_str),
            Some("true")
        );

        server.abort();
    }

    #[tokio::test]
    async fn public_url_shape() {
        let client = RestClient::new("http://localhost:9000/", "anon").expect("client");
        assert_eq!(
            client.public_url("avatars", "u.jpg"),
            "http://localhost:9000/storage/v1/object/public/avatars/u.jpg"
        );
    }
}
