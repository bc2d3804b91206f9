//! Client for CRUD resources mounted with `Server::crud`.

use std::fmt::Display;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{Client, ClientError};
use crate::routing::join;

/// Bytes escaped when an id is placed into a single path segment.
const ID_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Typed access to one CRUD resource.
#[derive(Debug, Clone)]
pub struct CrudClient {
    client: Client,
    base: String,
}

impl CrudClient {
    /// Create a CRUD client for the resource at `base` on `addr`.
    pub fn new(addr: impl Into<String>, base: &str) -> Self {
        Self::with_client(Client::new(addr), base)
    }

    /// Wrap an already configured client (TLS, auth mutator).
    pub fn with_client(client: Client, base: &str) -> Self {
        Self {
            client,
            base: join(base, ""),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path of one item. The id always stays a single segment.
    ///
    /// URL parsing collapses `.` and `..` segments (encoded or not), so those
    /// ids and the empty id cannot be addressed and are rejected.
    fn item(&self, id: impl Display) -> Result<String, ClientError> {
        let id = id.to_string();
        if matches!(id.as_str(), "" | "." | "..") {
            return Err(ClientError::InvalidId(id));
        }
        let segment = utf8_percent_encode(&id, ID_SEGMENT);
        Ok(format!("{}/{}", self.base.trim_end_matches('/'), segment))
    }

    /// POST `{base}`.
    pub async fn create<T, R>(&self, item: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.client.post(&self.base, item).await?.decode()
    }

    /// GET `{base}`.
    pub async fn get<R: DeserializeOwned>(&self) -> Result<R, ClientError> {
        self.client.get(&self.base).await?.decode()
    }

    /// GET `{base}/{id}`.
    pub async fn get_by_id<R: DeserializeOwned>(&self, id: impl Display) -> Result<R, ClientError> {
        self.client.get(&self.item(id)?).await?.decode()
    }

    /// PUT `{base}/{id}`.
    pub async fn update<T, R>(&self, id: impl Display, item: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.client.put(&self.item(id)?, item).await?.decode()
    }

    /// DELETE `{base}/{id}`.
    pub async fn delete<R: DeserializeOwned>(&self, id: impl Display) -> Result<R, ClientError> {
        self.client.delete(&self.item(id)?).await?.decode()
    }
}
