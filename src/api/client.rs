use crate::api::error::ApiError;
use crate::core::credentials::Session;
use crate::core::models::Page;
use crate::core::settings::ApiSettings;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

const USER_AGENT: &str = concat!("invctl/", env!("CARGO_PKG_VERSION"));
const MAX_PAGES: usize = 1000;

pub type Query = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api: ApiSettings,
    session: Session,
}

impl ApiClient {
    pub fn new(api: &ApiSettings, session: Session) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(api.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            http,
            api: api.clone(),
            session,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        self.api.endpoint(path)
    }

    /// Whether `url` points at the configured service (scheme, host and port).
    fn same_origin(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.api.base_url)) {
            (Ok(url), Ok(base)) => {
                url.scheme() == base.scheme()
                    && url.host_str() == base.host_str()
                    && url.port_or_known_default() == base.port_or_known_default()
            }
            _ => false,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let header = self
            .session
            .authorization_header()
            .map_err(ApiError::Credentials)?;

        Ok(match header {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        })
    }

    /// Sends a request and checks the status. A DELETE answered with 204 is a success.
    async fn send<B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.http.request(method.clone(), url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        builder = self.authorize(builder)?;

        if let Some(body) = body {
            let payload = serde_json::to_vec(body).map_err(ApiError::Encode)?;
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(payload);
        }

        tracing::debug!(%method, url, "Sending API request");
        let response = builder.send().await.map_err(|e| {
            tracing::debug!(%method, url, error = %e, "API request failed");
            ApiError::Transport(e)
        })?;

        check_status(response).await
    }

    /// Generic typed request. Returns `None` only for a DELETE answered without content
    /// (204 or an empty body).
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let is_delete = method == Method::DELETE;
        let response = self.send(method, &url, query, body).await?;

        if !is_delete {
            return decode(response).await.map(Some);
        }
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(ApiError::Decode)
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self.send::<()>(Method::GET, &url, query, None).await?;
        decode(response).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::POST, path, body).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::PUT, path, body).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::PATCH, path, body).await
    }

    async fn with_body<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let response = self.send(method, &url, &[], Some(body)).await?;
        decode(response).await
    }

    /// POST without a request body, used by action endpoints.
    pub async fn post_action<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self.send::<()>(Method::POST, &url, &[], None).await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request::<IgnoredAny, ()>(Method::DELETE, path, &[], None)
            .await?;
        Ok(())
    }

    pub async fn get_page<T>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<Page<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        self.get_with_query(path, query).await
    }

    /// Collects every page by following `next` links. Links to another origin than the
    /// configured service, or back to an already fetched page, end the walk.
    pub async fn fetch_all_pages<T>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let first: Page<T> = self.get_page(path, query).await?;
        let mut items = first.results;
        let mut next = first.next;
        let mut pages = 1;
        let mut visited = HashSet::new();

        while let Some(url) = next.take() {
            if pages >= MAX_PAGES {
                tracing::warn!(path, pages, "Stopping pagination at page limit");
                break;
            }
            if !self.same_origin(&url) {
                tracing::warn!(path, next = %url, "Ignoring next link to another host");
                break;
            }
            if !visited.insert(url.clone()) {
                tracing::warn!(path, next = %url, "Stopping pagination at repeated page");
                break;
            }

            let response = self.send::<()>(Method::GET, &url, &[], None).await?;
            let page: Page<T> = decode(response).await?;
            pages += 1;

            items.extend(page.results);
            next = page.next;
        }

        tracing::debug!(path, pages, items = items.len(), "Fetched all pages");
        Ok(items)
    }

    /// Multipart upload of a single file plus optional text fields.
    pub async fn upload<T>(
        &self,
        path: &str,
        field: &str,
        file: &Path,
        fields: &[(&str, String)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|source| ApiError::Upload {
                path: file.to_path_buf(),
                source,
            })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let size = bytes.len();
        let mut form = Form::new().part(field.to_string(), Part::bytes(bytes).file_name(file_name));
        for (name, value) in fields {
            form = form.text(name.to_string(), value.clone());
        }

        let url = self.endpoint(path);
        let builder = self.authorize(self.http.post(&url).multipart(form))?;

        tracing::info!(url, size, "Uploading file");
        let response = builder.send().await.map_err(ApiError::Transport)?;
        let response = check_status(response).await?;
        decode(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "API returned error status");
    Err(ApiError::Status {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

async fn decode<T>(response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let bytes = response.bytes().await.map_err(ApiError::Transport)?;
    serde_json::from_slice(&bytes).map_err(ApiError::Decode)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::credentials::{Credentials, MemoryCredentialStore};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    pub struct Canned {
        pub status: &'static str,
        pub body: String,
    }

    impl Canned {
        pub fn json(status: &'static str, body: impl Into<String>) -> Self {
            Self {
                status,
                body: body.into(),
            }
        }
    }

    /// Serves the canned responses one connection at a time and returns the raw requests.
    pub async fn serve<F>(build: F) -> (String, JoinHandle<Vec<String>>)
    where
        F: FnOnce(&str) -> Vec<Canned>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let responses = build(&base_url);

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for canned in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);

                let mut response = format!("HTTP/1.1 {}\r\nConnection: close\r\n", canned.status);
                if !canned.status.starts_with("204") {
                    response.push_str("Content-Type: application/json\r\n");
                    response.push_str(&format!("Content-Length: {}\r\n", canned.body.len()));
                }
                response.push_str("\r\n");
                response.push_str(&canned.body);

                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            requests
        });

        (base_url, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();

            if head.contains("transfer-encoding: chunked") {
                if buf.ends_with(b"0\r\n\r\n") {
                    break;
                }
                continue;
            }

            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + length {
                break;
            }
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn client(base_url: &str, credentials: Option<(&str, &str)>) -> ApiClient {
        let store = match credentials {
            Some((user, pass)) => {
                MemoryCredentialStore::with_credentials(Credentials::new(user, pass).unwrap())
            }
            None => MemoryCredentialStore::default(),
        };
        let api = ApiSettings {
            base_url: base_url.to_string(),
            prefix: "/api/v1".to_string(),
            timeout_secs: 5,
        };
        ApiClient::new(&api, Session::new(Arc::new(store))).unwrap()
    }

    /// A base URL nothing listens on.
    pub async fn dead_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }
}
