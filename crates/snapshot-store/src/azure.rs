use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::{BlobStore, StoreError};

/// Azure Blob Storage over plain REST, authenticated with a SAS connection
/// string of the form
/// `BlobEndpoint=https://acct.blob.core.windows.net;SharedAccessSignature=sv=...`.
pub struct AzureBlobStore {
    endpoint: Url,
    sas: String,
    container: String,
    client: Client,
}

impl AzureBlobStore {
    pub fn from_connection_string(
        conn: &str,
        container: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let mut endpoint = None;
        let mut sas = None;

        for part in conn.split(';') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key {
                "BlobEndpoint" => endpoint = Some(value.to_string()),
                "SharedAccessSignature" => sas = Some(value.trim_start_matches('?').to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| StoreError::Config("missing BlobEndpoint".to_string()))?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| StoreError::Config(format!("bad BlobEndpoint: {e}")))?;
        let sas =
            sas.ok_or_else(|| StoreError::Config("missing SharedAccessSignature".to_string()))?;

        Ok(Self {
            endpoint,
            sas,
            container: container.into(),
            client: Client::new(),
        })
    }

    fn blob_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Config("BlobEndpoint cannot be a base URL".to_string()))?;
            segments.push(&self.container);
            // Keys contain slashes that must stay path separators; encode
            // segment by segment.
            for segment in key.split('/') {
                segments.push(segment);
            }
        }
        url.set_query(Some(&self.sas));
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let url = self.blob_url(key)?;
        tracing::debug!("GET blob {}/{}", self.container, key);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            status if status.is_success() => response
                .text()
                .await
                .map_err(|e| StoreError::Transport(e.to_string())),
            status => Err(StoreError::Transport(format!(
                "HTTP {status} reading blob {key}"
            ))),
        }
    }

    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError> {
        let url = self.blob_url(key)?;
        tracing::debug!("PUT blob {}/{}", self.container, key);
        let response = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Transport(format!(
                "HTTP {} writing blob {key}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str =
        "BlobEndpoint=https://acct.blob.core.windows.net;SharedAccessSignature=sv=2022&sig=abc%3D";

    #[test]
    fn parses_sas_connection_string() {
        let store = AzureBlobStore::from_connection_string(CONN, "history").unwrap();
        assert_eq!(store.sas, "sv=2022&sig=abc%3D");
        assert_eq!(store.endpoint.as_str(), "https://acct.blob.core.windows.net/");
    }

    #[test]
    fn rejects_incomplete_connection_strings() {
        assert!(matches!(
            AzureBlobStore::from_connection_string("BlobEndpoint=https://x.example", "history"),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            AzureBlobStore::from_connection_string("SharedAccessSignature=sv=1", "history"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn blob_url_encodes_key_segments() {
        let store = AzureBlobStore::from_connection_string(CONN, "history").unwrap();
        let url = store.blob_url("2021/01/2021-01-01 00:00:00.json").unwrap();
        assert_eq!(
            url.path(),
            "/history/2021/01/2021-01-01%2000:00:00.json"
        );
        assert_eq!(url.query(), Some("sv=2022&sig=abc%3D"));
    }
}
