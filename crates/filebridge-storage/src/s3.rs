// Filebridge - Unified File Storage
// Copyright (C) 2025 Filebridge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! AWS S3 (and S3-compatible) storage platform
//!
//! - Client built lazily on first use and released by [`FileStorage::close`]
//! - Static credentials from configuration, otherwise the SDK credential chain
//! - Canned ACLs and explicit grant headers
//! - User metadata plus the standard `Cache-Control`, `Content-Disposition`,
//!   `Content-Encoding` and `Content-Language` headers
//! - Single `PutObject` below the multipart threshold, sequential multipart
//!   upload above it (aborted on failure)
//! - Presigned GET URLs
//!
//! Retries are left to the SDK's own retry policy.
//!
//! # Examples
//!
//! ```rust,no_run
//! use filebridge_config::S3PlatformConfig;
//! use filebridge_storage::s3::S3Platform;
//!
//! let config = S3PlatformConfig {
//!     bucket_name: "uploads".to_string(),
//!     endpoint: Some("http://localhost:9000".to_string()),
//!     force_path_style: true,
//!     ..Default::default()
//! };
//! let storage = S3Platform::from_config(&config);
//! ```

use crate::acl::{AclGrant, AclPermission, AclResolver, AclValue, PredefinedAcl, ResolvedAcl};
use crate::error::{StorageError, StorageResult};
use crate::file_info::FileInfo;
use crate::platform::{join_url, main_key, th_key, FileStorage, SavePayload, WrittenKeys};
use crate::progress::ProgressReader;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filebridge_config::S3PlatformConfig;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Lazily constructed, closeable S3 client
pub struct S3ClientFactory {
    region: String,
    endpoint: Option<String>,
    credentials: Option<(String, String)>,
    force_path_style: bool,
    client: Mutex<Option<Client>>,
}

impl S3ClientFactory {
    pub fn new(config: &S3PlatformConfig) -> Self {
        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => Some((access.clone(), secret.clone())),
            _ => None,
        };
        S3ClientFactory {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            credentials,
            force_path_style: config.force_path_style,
            client: Mutex::new(None),
        }
    }

    /// The client, building it on first use
    pub async fn client(&self) -> Client {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return client.clone();
        }
        let client = self.build().await;
        *guard = Some(client.clone());
        client
    }

    pub async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Drop the client; the next call builds a fresh one
    pub async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            debug!(region = %self.region, "Closed S3 client");
        }
    }

    async fn build(&self) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));
        if let Some((access, secret)) = &self.credentials {
            loader = loader.credentials_provider(Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                "filebridge",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(self.force_path_style);
        if let Some(endpoint) = &self.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint.clone());
        }
        Client::from_conf(builder.build())
    }
}

impl fmt::Debug for S3ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3ClientFactory")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("static_credentials", &self.credentials.is_some())
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

/// Grant headers, one comma-separated grantee list per permission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantHeaders {
    pub read: Option<String>,
    pub read_acp: Option<String>,
    pub write_acp: Option<String>,
    pub full_control: Option<String>,
}

impl GrantHeaders {
    /// Group grants by permission
    ///
    /// Grantees are passed through in header form (`id="..."`,
    /// `uri="..."`, `emailAddress="..."`). Object ACLs have no `WRITE`
    /// permission, so such a grant is rejected.
    pub fn from_grants(grants: &[AclGrant]) -> StorageResult<Self> {
        let mut headers = GrantHeaders::default();
        for grant in grants {
            let slot = match grant.permission {
                AclPermission::Read => &mut headers.read,
                AclPermission::ReadAcp => &mut headers.read_acp,
                AclPermission::WriteAcp => &mut headers.write_acp,
                AclPermission::FullControl => &mut headers.full_control,
                AclPermission::Write => {
                    return Err(StorageError::unsupported_acl(format!(
                        "WRITE grant for {} is not valid on an object",
                        grant.grantee
                    )))
                }
            };
            match slot {
                Some(list) => {
                    list.push_str(", ");
                    list.push_str(&grant.grantee);
                }
                None => *slot = Some(grant.grantee.clone()),
            }
        }
        Ok(headers)
    }
}

/// ACL in the shape the S3 API takes it
#[derive(Debug, Clone, PartialEq)]
pub enum S3Acl {
    Canned(ObjectCannedAcl),
    Grants(GrantHeaders),
}

impl S3Acl {
    fn from_resolved(resolved: Option<ResolvedAcl>) -> StorageResult<Option<Self>> {
        Ok(match resolved {
            Some(ResolvedAcl::Predefined(acl)) => Some(S3Acl::Canned(canned(acl))),
            Some(ResolvedAcl::Grants(grants)) => {
                Some(S3Acl::Grants(GrantHeaders::from_grants(&grants)?))
            }
            None => None,
        })
    }
}

fn canned(acl: PredefinedAcl) -> ObjectCannedAcl {
    ObjectCannedAcl::from(acl.header_value())
}

/// Everything sent along with an object body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectOptions {
    pub content_type: Option<String>,
    pub user_metadata: Option<HashMap<String, String>>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub acl: Option<S3Acl>,
}

impl ObjectOptions {
    /// Split platform metadata into standard headers; unknown keys are dropped
    pub fn new(
        content_type: &str,
        metadata: &BTreeMap<String, String>,
        user_metadata: &BTreeMap<String, String>,
        acl: Option<S3Acl>,
    ) -> Self {
        let mut options = ObjectOptions {
            content_type: Some(content_type.to_string()).filter(|ct| !ct.is_empty()),
            user_metadata: (!user_metadata.is_empty()).then(|| {
                user_metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            }),
            acl,
            ..Default::default()
        };

        for (key, value) in metadata {
            let slot = match key.to_ascii_lowercase().as_str() {
                "cache-control" => &mut options.cache_control,
                "content-disposition" => &mut options.content_disposition,
                "content-encoding" => &mut options.content_encoding,
                "content-language" => &mut options.content_language,
                "content-type" => &mut options.content_type,
                _ => {
                    warn!(key = %key, "Ignoring unsupported S3 metadata key");
                    continue;
                }
            };
            *slot = Some(value.clone());
        }
        options
    }
}

/// Apply [`ObjectOptions`] to a `PutObject` or `CreateMultipartUpload` builder
macro_rules! with_object_options {
    ($builder:expr, $options:expr) => {{
        let options: &ObjectOptions = $options;
        let builder = $builder
            .set_content_type(options.content_type.clone())
            .set_metadata(options.user_metadata.clone())
            .set_cache_control(options.cache_control.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_content_encoding(options.content_encoding.clone())
            .set_content_language(options.content_language.clone());
        match &options.acl {
            Some(S3Acl::Canned(acl)) => builder.acl(acl.clone()),
            Some(S3Acl::Grants(grants)) => builder
                .set_grant_read(grants.read.clone())
                .set_grant_read_acp(grants.read_acp.clone())
                .set_grant_write_acp(grants.write_acp.clone())
                .set_grant_full_control(grants.full_control.clone()),
            None => builder,
        }
    }};
}

/// S3 platform adapter
#[derive(Clone)]
pub struct S3Platform {
    platform: String,
    bucket: String,
    domain: String,
    base_path: String,
    multipart_threshold: u64,
    part_size: u64,
    acl: AclResolver,
    factory: Arc<S3ClientFactory>,
}

impl S3Platform {
    /// Build the adapter; no network I/O happens until the first request
    pub fn from_config(config: &S3PlatformConfig) -> Self {
        S3Platform {
            platform: config.platform.clone(),
            bucket: config.bucket_name.clone(),
            domain: config.domain.clone(),
            base_path: config.base_path.clone(),
            multipart_threshold: config.multipart_threshold.max(1),
            part_size: config.multipart_part_size.max(1),
            acl: AclResolver::new(&PredefinedAcl::ALL, true)
                .with_default_acl(config.default_acl.clone()),
            factory: Arc::new(S3ClientFactory::new(config)),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn factory(&self) -> &S3ClientFactory {
        &self.factory
    }

    fn write_error(&self, filename: &str, context: &str, e: impl std::error::Error) -> StorageError {
        StorageError::remote_write(
            &self.platform,
            filename,
            anyhow::anyhow!("{}: {}", context, DisplayErrorContext(e)),
        )
    }

    async fn remove(&self, client: &Client, key: String) -> StorageResult<()> {
        client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                StorageError::other(anyhow::anyhow!(
                    "failed to delete {}: {}",
                    key,
                    DisplayErrorContext(e)
                ))
            })
    }

    /// Stream the main object, choosing single or multipart upload
    async fn upload_main(
        &self,
        client: &Client,
        key: &str,
        filename: &str,
        options: &ObjectOptions,
        payload: &mut SavePayload,
    ) -> StorageResult<u64> {
        let content = std::mem::replace(&mut payload.content, Box::new(tokio::io::empty()));
        let mut reader = ProgressReader::new(content, payload.progress.take(), payload.size);

        let result = self
            .upload_stream(client, key, filename, options, &mut reader)
            .await;
        reader.finish();
        result
    }

    async fn upload_stream<R>(
        &self,
        client: &Client,
        key: &str,
        filename: &str,
        options: &ObjectOptions,
        reader: &mut R,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let first = read_chunk(reader, self.multipart_threshold)
            .await
            .map_err(|e| StorageError::remote_write(&self.platform, filename, e))?;

        if (first.len() as u64) < self.multipart_threshold {
            let size = first.len() as u64;
            debug!(key, size, "Putting object to S3");
            with_object_options!(client.put_object(), options)
                .bucket(&self.bucket)
                .key(key)
                .content_length(size as i64)
                .body(ByteStream::from(first))
                .send()
                .await
                .map_err(|e| self.write_error(filename, "put_object failed", e))?;
            return Ok(size);
        }

        let created = with_object_options!(client.create_multipart_upload(), options)
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.write_error(filename, "create_multipart_upload failed", e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StorageError::remote_write(
                    &self.platform,
                    filename,
                    anyhow::anyhow!("no upload id returned for {}", key),
                )
            })?
            .to_string();
        debug!(key, upload_id = %upload_id, "Initiated multipart upload");

        match self
            .upload_parts(client, key, filename, &upload_id, first, reader)
            .await
        {
            Ok(size) => Ok(size),
            Err(e) => {
                if let Err(abort) = client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key,
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(abort),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts<R>(
        &self,
        client: &Client,
        key: &str,
        filename: &str,
        upload_id: &str,
        first: Bytes,
        reader: &mut R,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let part_size = self.part_size as usize;
        let mut pending = first;
        let mut parts = Vec::new();
        let mut total = 0u64;
        let mut eof = false;

        loop {
            while pending.len() >= part_size || (eof && !pending.is_empty()) {
                let chunk = pending.split_to(part_size.min(pending.len()));
                let part_number = parts.len() as i32 + 1;
                total += chunk.len() as u64;

                let response = client
                    .upload_part()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .body(ByteStream::from(chunk))
                    .send()
                    .await
                    .map_err(|e| self.write_error(filename, "upload_part failed", e))?;

                parts.push(
                    CompletedPart::builder()
                        .part_number(part_number)
                        .set_e_tag(response.e_tag().map(str::to_string))
                        .build(),
                );
                debug!(key, part_number, "Uploaded part");
            }

            if eof {
                break;
            }

            let wanted = (part_size - pending.len()) as u64;
            let more = read_chunk(reader, wanted)
                .await
                .map_err(|e| StorageError::remote_write(&self.platform, filename, e))?;
            if more.is_empty() {
                eof = true;
            } else {
                let mut joined = Vec::with_capacity(pending.len() + more.len());
                joined.extend_from_slice(&pending);
                joined.extend_from_slice(&more);
                pending = Bytes::from(joined);
            }
        }

        client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| self.write_error(filename, "complete_multipart_upload failed", e))?;

        debug!(key, size = total, "Completed multipart upload");
        Ok(total)
    }

    async fn download_key(
        &self,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        let client = self.factory.client().await;
        let response = client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                StorageError::remote_read(
                    &self.platform,
                    key,
                    anyhow::anyhow!("{}", DisplayErrorContext(e)),
                )
            })?;

        let mut body = response.body.into_async_read();
        tokio::io::copy(&mut body, sink)
            .await
            .map_err(|e| StorageError::remote_read(&self.platform, key, e))
    }

    async fn apply_acl(&self, key: &str, acl: &AclValue) -> StorageResult<bool> {
        let Some(acl) = S3Acl::from_resolved(self.acl.resolve(Some(acl))?)? else {
            return Ok(false);
        };

        let client = self.factory.client().await;
        let request = client.put_object_acl().bucket(&self.bucket).key(key);
        let request = match acl {
            S3Acl::Canned(acl) => request.acl(acl),
            S3Acl::Grants(grants) => request
                .set_grant_read(grants.read)
                .set_grant_read_acp(grants.read_acp)
                .set_grant_write_acp(grants.write_acp)
                .set_grant_full_control(grants.full_control),
        };
        request.send().await.map_err(|e| {
            StorageError::other(anyhow::anyhow!(
                "failed to set ACL on {}: {}",
                key,
                DisplayErrorContext(e)
            ))
        })?;
        Ok(true)
    }

    async fn presign(&self, key: &str, expiration: DateTime<Utc>) -> StorageResult<Option<String>> {
        let expires_in = (expiration - Utc::now()).to_std().map_err(|_| {
            StorageError::invalid_argument(format!(
                "presigned URL expiration {} is not in the future",
                expiration
            ))
        })?;
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::invalid_argument(e.to_string()))?;

        let client = self.factory.client().await;
        let request = client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                StorageError::other(anyhow::anyhow!(
                    "failed to presign {}: {}",
                    key,
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(Some(request.uri().to_string()))
    }
}

async fn read_chunk<R>(reader: &mut R, limit: u64) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    reader.take(limit).read_to_end(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}

impl fmt::Debug for S3Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Platform")
            .field("platform", &self.platform)
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("base_path", &self.base_path)
            .field("multipart_threshold", &self.multipart_threshold)
            .field("part_size", &self.part_size)
            .field("factory", &self.factory)
            .finish()
    }
}

#[async_trait]
impl FileStorage for S3Platform {
    fn platform(&self) -> &str {
        &self.platform
    }

    #[instrument(skip_all, fields(platform = %self.platform, bucket = %self.bucket, filename = %info.filename))]
    async fn save(&self, info: &mut FileInfo, mut payload: SavePayload) -> StorageResult<bool> {
        info.base_path = self.base_path.clone();
        let key = main_key(info)?;

        let acl = S3Acl::from_resolved(self.acl.resolve(info.file_acl.as_ref())?)?;
        let options = ObjectOptions::new(&info.content_type, &info.metadata, &info.user_metadata, acl);

        let thumbnail = match (payload.thumbnail.take(), info.thumbnail.as_ref()) {
            (Some(data), Some(th)) => {
                let th_acl = S3Acl::from_resolved(self.acl.resolve(th.file_acl.as_ref())?)?;
                let th_options =
                    ObjectOptions::new(&th.content_type, &th.metadata, &th.user_metadata, th_acl);
                Some((th_key(info)?, th.filename.clone(), data, th_options))
            }
            (Some(_), None) => return Err(StorageError::thumbnail_not_found(key)),
            (None, _) => None,
        };

        let client = self.factory.client().await;
        let mut written = WrittenKeys::new(&self.platform);

        let size = self
            .upload_main(&client, &key, &info.filename, &options, &mut payload)
            .await?;
        written.record(key.clone());
        info.size = size;
        info.url = join_url(&self.domain, &key);

        if let Some((th_key, th_filename, data, th_options)) = thumbnail {
            let th_size = data.len() as u64;
            let result = with_object_options!(client.put_object(), &th_options)
                .bucket(&self.bucket)
                .key(&th_key)
                .content_length(th_size as i64)
                .body(ByteStream::from(data))
                .send()
                .await;

            if let Err(e) = result {
                let error = self.write_error(&th_filename, "put_object failed", e);
                written.rollback(|k| self.remove(&client, k)).await;
                info.url.clear();
                return Err(error);
            }

            written.record(th_key.clone());
            if let Some(th) = info.thumbnail.as_mut() {
                th.size = th_size;
                th.url = join_url(&self.domain, &th_key);
            }
        }

        debug!(key = %key, size, "Stored object in S3");
        Ok(true)
    }

    async fn delete(&self, info: &FileInfo) -> StorageResult<bool> {
        let client = self.factory.client().await;
        if info.has_thumbnail() {
            self.remove(&client, th_key(info)?).await?;
        }
        self.remove(&client, main_key(info)?).await?;
        Ok(true)
    }

    async fn exists(&self, info: &FileInfo) -> StorageResult<bool> {
        let key = main_key(info)?;
        let client = self.factory.client().await;
        match client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::remote_read(
                &self.platform,
                key,
                anyhow::anyhow!("{}", DisplayErrorContext(e)),
            )),
        }
    }

    async fn download(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        self.download_key(&main_key(info)?, sink).await
    }

    async fn download_th(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        self.download_key(&th_key(info)?, sink).await
    }

    fn supports_acl(&self) -> bool {
        true
    }

    fn supports_presigned_url(&self) -> bool {
        true
    }

    fn supports_metadata(&self) -> bool {
        true
    }

    async fn set_file_acl(&self, info: &FileInfo, acl: &AclValue) -> StorageResult<bool> {
        self.apply_acl(&main_key(info)?, acl).await
    }

    async fn set_th_file_acl(&self, info: &FileInfo, acl: &AclValue) -> StorageResult<bool> {
        self.apply_acl(&th_key(info)?, acl).await
    }

    async fn generate_presigned_url(
        &self,
        info: &FileInfo,
        expiration: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        self.presign(&main_key(info)?, expiration).await
    }

    async fn generate_th_presigned_url(
        &self,
        info: &FileInfo,
        expiration: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        self.presign(&th_key(info)?, expiration).await
    }

    async fn close(&self) {
        self.factory.close().await;
    }
}
