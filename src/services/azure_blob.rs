use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode, Url};
use sha2::Sha256;

use crate::services::blob_store::{BlobInfo, BlobStore, BlobStoreError};

const API_VERSION: &str = "2021-08-06";

/// How requests to the storage account are authorised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AzureCredential {
    /// Query string appended to every request url.
    Sas(String),
    /// Account name and decoded account key for `SharedKey` signing.
    SharedKey { account: String, key: Vec<u8> },
}

/// Endpoint and credential pulled out of an Azure storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConnection {
    pub blob_endpoint: String,
    pub credential: AzureCredential,
}

impl AzureConnection {
    /// Accepts `BlobEndpoint=...` or `DefaultEndpointsProtocol=...;AccountName=...;EndpointSuffix=...`
    /// together with either `SharedAccessSignature=...` or `AccountKey=...`.
    /// A SAS token wins when both are present.
    pub fn parse(connection_string: &str) -> Result<Self, BlobStoreError> {
        let mut blob_endpoint = None;
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut sas_token = None;

        for part in connection_string.split(';').filter(|part| !part.trim().is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                BlobStoreError::Parse(format!("malformed connection string segment: {part}"))
            })?;
            match key.trim() {
                "BlobEndpoint" => blob_endpoint = Some(value.trim().to_string()),
                "AccountName" => account_name = Some(value.trim().to_string()),
                "AccountKey" => account_key = Some(value.trim().to_string()),
                "DefaultEndpointsProtocol" => protocol = value.trim().to_string(),
                "EndpointSuffix" => suffix = value.trim().to_string(),
                "SharedAccessSignature" => {
                    sas_token = Some(value.trim().trim_start_matches('?').to_string())
                }
                _ => {}
            }
        }

        let blob_endpoint = match (blob_endpoint, account_name.as_deref()) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("{protocol}://{account}.blob.{suffix}"),
            (None, None) => {
                return Err(BlobStoreError::Parse(
                    "connection string has neither BlobEndpoint nor AccountName".to_string(),
                ));
            }
        };

        let credential = match (sas_token, account_name, account_key) {
            (Some(token), _, _) => AzureCredential::Sas(token),
            (None, Some(account), Some(key)) => {
                let key = BASE64
                    .decode(&key)
                    .map_err(|e| BlobStoreError::Parse(format!("account key is not base64: {e}")))?;
                AzureCredential::SharedKey { account, key }
            }
            (None, None, Some(_)) => {
                return Err(BlobStoreError::Parse(
                    "connection string has an AccountKey but no AccountName".to_string(),
                ));
            }
            (None, _, None) => {
                return Err(BlobStoreError::Parse(
                    "connection string has neither SharedAccessSignature nor AccountKey".to_string(),
                ));
            }
        };

        Ok(Self {
            blob_endpoint: blob_endpoint.trim_end_matches('/').to_string(),
            credential,
        })
    }
}

/// `Authorization` header value for `request` under the Blob service `SharedKey` scheme.
///
/// The request must already carry its `x-ms-date` and `x-ms-version` headers.
fn shared_key_authorization(account: &str, key: &[u8], request: &Request) -> Result<String, BlobStoreError> {
    let string_to_sign = string_to_sign(account, request);
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| BlobStoreError::Parse(format!("invalid account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKey {account}:{signature}"))
}

fn string_to_sign(account: &str, request: &Request) -> String {
    let headers = request.headers();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    // An empty body is signed as an empty Content-Length.
    let content_length = request
        .body()
        .and_then(|body| body.as_bytes())
        .map(|bytes| bytes.len())
        .or_else(|| {
            headers
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
        })
        .filter(|length| *length > 0)
        .map(|length| length.to_string())
        .unwrap_or_default();

    let standard = [
        request.method().as_str().to_string(),
        header("content-encoding"),
        header("content-language"),
        content_length,
        header("content-md5"),
        header("content-type"),
        header("date"),
        header("if-modified-since"),
        header("if-match"),
        header("if-none-match"),
        header("if-unmodified-since"),
        header("range"),
    ];

    format!(
        "{}\n{}{}",
        standard.join("\n"),
        canonicalized_headers(headers),
        canonicalized_resource(account, request.url())
    )
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or_default().trim().to_string();
            (name.as_str().to_string(), value)
        })
        .collect();
    ms_headers.sort();
    ms_headers
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (name.to_lowercase(), value.into_owned()))
        .collect();
    params.sort();

    let mut resource = format!("/{account}{}", url.path());
    let mut index = 0;
    while index < params.len() {
        let name = &params[index].0;
        let values: Vec<&str> = params[index..]
            .iter()
            .take_while(|(other, _)| other == name)
            .map(|(_, value)| value.as_str())
            .collect();
        resource.push_str(&format!("\n{name}:{}", values.join(",")));
        index += values.len();
    }
    resource
}

pub struct AzureBlobStore {
    connection: AzureConnection,
    container: String,
    client: Client,
}

impl AzureBlobStore {
    pub fn new(connection: AzureConnection, container: &str) -> Result<Self, BlobStoreError> {
        Url::parse(&connection.blob_endpoint)
            .map_err(|e| BlobStoreError::Parse(format!("invalid blob endpoint: {e}")))?;
        Ok(Self {
            connection,
            container: container.to_string(),
            client: Client::new(),
        })
    }

    fn url(&self, blob: Option<&str>, params: &[(&str, &str)]) -> Result<Url, BlobStoreError> {
        let mut url = Url::parse(&self.connection.blob_endpoint)
            .map_err(|e| BlobStoreError::Parse(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BlobStoreError::Parse("blob endpoint cannot be a base".to_string()))?;
            segments.pop_if_empty().push(&self.container);
            if let Some(name) = blob {
                segments.push(name);
            }
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        if let AzureCredential::Sas(token) = &self.connection.credential {
            if !token.is_empty() {
                let query = match url.query() {
                    Some(existing) => format!("{existing}&{token}"),
                    None => token.clone(),
                };
                url.set_query(Some(&query));
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BlobStoreError> {
        let mut request = request
            .build()
            .map_err(|e| BlobStoreError::Connection(e.to_string()))?;
        if let AzureCredential::SharedKey { account, key } = &self.connection.credential {
            let authorization = shared_key_authorization(account, key, &request)?;
            let value = HeaderValue::from_str(&authorization)
                .map_err(|_| BlobStoreError::Parse("invalid authorization header".to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| BlobStoreError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BlobStoreError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BlobStoreError::NotFound);
        }
        if status == StatusCode::CONFLICT {
            return Err(BlobStoreError::Conflict);
        }
        if !status.is_success() {
            return Err(BlobStoreError::Connection(format!("unexpected status {status}")));
        }
        Ok(response)
    }

    async fn exists(&self, url: Url) -> Result<bool, BlobStoreError> {
        match self.send(self.request(Method::HEAD, url)).await {
            Ok(_) => Ok(true),
            Err(BlobStoreError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for AzureBlobStore {
    fn container_name(&self) -> &str {
        &self.container
    }

    fn blob_url(&self, name: &str) -> String {
        match self.url(Some(name), &[]) {
            Ok(mut url) => {
                // Hand out the address without the SAS token.
                url.set_query(None);
                url.to_string()
            }
            Err(_) => format!("{}/{}/{}", self.connection.blob_endpoint, self.container, name),
        }
    }

    async fn container_exists(&self) -> Result<bool, BlobStoreError> {
        self.exists(self.url(None, &[("restype", "container")])?).await
    }

    async fn create_container(&self) -> Result<(), BlobStoreError> {
        let url = self.url(None, &[("restype", "container")])?;
        let request = self.request(Method::PUT, url).header("Content-Length", "0");
        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(BlobStoreError::Conflict) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn list_blobs(&self) -> Result<Vec<BlobInfo>, BlobStoreError> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut params = vec![("restype", "container"), ("comp", "list")];
            if let Some(marker) = marker.as_deref() {
                params.push(("marker", marker));
            }
            let url = self.url(None, &params)?;
            let body = self
                .send(self.request(Method::GET, url))
                .await?
                .text()
                .await
                .map_err(|e| BlobStoreError::Parse(e.to_string()))?;

            for blob in xml_elements(&body, "Blob") {
                let name = xml_text(blob, "Name")
                    .ok_or_else(|| BlobStoreError::Parse("blob entry without a name".to_string()))?;
                blobs.push(BlobInfo {
                    url: self.blob_url(&name),
                    created_on: xml_text(blob, "Creation-Time").and_then(|text| {
                        DateTime::parse_from_rfc2822(&text)
                            .ok()
                            .map(|date| date.with_timezone(&Utc))
                    }),
                    size: xml_text(blob, "Content-Length").and_then(|text| text.parse().ok()),
                    content_type: xml_text(blob, "Content-Type").filter(|text| !text.is_empty()),
                    name,
                });
            }

            match xml_text(&body, "NextMarker").filter(|next| !next.is_empty()) {
                Some(next) if marker.as_deref() != Some(next.as_str()) => marker = Some(next),
                _ => break,
            }
        }

        Ok(blobs)
    }

    async fn blob_exists(&self, name: &str) -> Result<bool, BlobStoreError> {
        self.exists(self.url(Some(name), &[])?).await
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobStoreError> {
        let url = self.url(Some(name), &[])?;
        let request = self
            .request(Method::PUT, url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header("Content-Type", content_type)
            .body(bytes);
        self.send(request).await?;
        Ok(self.blob_url(name))
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, BlobStoreError> {
        let url = self.url(Some(name), &[])?;
        let bytes = self
            .send(self.request(Method::GET, url))
            .await?
            .bytes()
            .await
            .map_err(|e| BlobStoreError::Connection(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobStoreError> {
        let url = self.url(Some(name), &[])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

/// Inner text of every `<tag>...</tag>` element in `xml`, in document order.
fn xml_elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut elements = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(&close) else {
            break;
        };
        elements.push(&after_open[..end]);
        rest = &after_open[end + close.len()..];
    }
    elements
}

fn xml_text(xml: &str, tag: &str) -> Option<String> {
    xml_elements(xml, tag).first().map(|text| unescape_xml(text.trim()))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
