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

//! Building a service from configuration

use crate::error::{StorageError, StorageResult};
use crate::local::LocalPlatform;
use crate::mock::MemoryPlatform;
use crate::s3::S3Platform;
use crate::service::FileStorageService;
use filebridge_config::Config;
use filebridge_observability::{init_tracing_with_config, LogConfig};
use std::sync::Arc;
use tracing::info;

/// Register one adapter per enabled platform entry
///
/// Local platforms create their storage directory here; S3 clients are only
/// built on first use.
///
/// # Errors
///
/// - [`StorageError::UnknownPlatform`] if `default_platform` names no
///   enabled platform
/// - I/O errors from creating a local storage directory
pub async fn build_service(config: &Config) -> StorageResult<FileStorageService> {
    if !config.has_platform(&config.default_platform) {
        return Err(StorageError::unknown_platform(&config.default_platform));
    }

    let mut builder = FileStorageService::builder()
        .default_platform(config.default_platform.clone())
        .thumbnail_suffix(config.thumbnail_suffix.clone());

    for local in config.local.iter().filter(|p| p.enable_storage) {
        builder = builder.platform(Arc::new(LocalPlatform::from_config(local).await?));
    }
    for s3 in config.s3.iter().filter(|p| p.enable_storage) {
        builder = builder.platform(Arc::new(S3Platform::from_config(s3)));
    }
    for memory in config.memory.iter().filter(|p| p.enable_storage) {
        builder = builder.platform(Arc::new(MemoryPlatform::from_config(memory)));
    }

    let service = builder.build();
    info!(
        platforms = ?service.platforms(),
        default_platform = service.default_platform(),
        "File storage service ready"
    );
    Ok(service)
}

/// Install the global tracing subscriber from the `[observability]` section
pub fn init_logging(config: &Config) -> StorageResult<()> {
    let observability = &config.observability;
    let log_config = LogConfig::from_settings(&observability.log_level, &observability.log_format)
        .map_err(|e| StorageError::invalid_argument(e.to_string()))?;
    init_tracing_with_config(log_config).map_err(|e| StorageError::invalid_argument(e.to_string()))
}
