//! End-to-end tests of the upload pipeline
//!
//! Everything runs against `MemoryPlatform` (and `LocalPlatform` on a temp
//! dir where a capability-less platform is needed), so no external services
//! are required. URL sources are served by a throwaway HTTP listener.

use chrono::{Duration, Utc};
use filebridge_storage::mock::{FailingReader, MemoryPlatform};
use filebridge_storage::{
    FileInfo, FileRecorder, FileStorageService, LocalPlatform, MemoryRecorder, PredefinedAcl,
    ProgressListener, ResolvedAcl, StorageError,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use futures::future::join_all;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn service_with(memory: &MemoryPlatform) -> FileStorageService {
    FileStorageService::builder()
        .platform(Arc::new(memory.clone()))
        .default_platform("memory-1")
        .build()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// Serve one response on an ephemeral port, returning the URL to fetch
async fn serve_once(status: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{}/images/logo.png", addr)
}

#[derive(Default)]
struct CountingListener {
    starts: AtomicUsize,
    finishes: AtomicUsize,
    last: Mutex<Option<(u64, Option<u64>)>>,
}

impl ProgressListener for CountingListener {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn progress(&self, transferred: u64, total: Option<u64>) {
        *self.last.lock().unwrap() = Some((transferred, total));
    }

    fn finish(&self) {
        self.finishes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct BrokenRecorder;

#[async_trait::async_trait]
impl FileRecorder for BrokenRecorder {
    async fn save(&self, _info: &mut FileInfo) -> anyhow::Result<bool> {
        anyhow::bail!("database is down")
    }

    async fn get_by_url(&self, _url: &str) -> anyhow::Result<Option<FileInfo>> {
        Ok(None)
    }

    async fn delete(&self, _url: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Empty stream named `empty.txt` under `t/`
#[tokio::test]
async fn test_empty_file_scenario() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let info = service
        .of_reader(tokio::io::empty())
        .name("empty.txt")
        .path("t/")
        .upload()
        .await
        .unwrap();

    assert_eq!(info.size, 0);
    assert_eq!(info.ext, "txt");
    assert_eq!(info.original_filename, "empty.txt");
    assert_eq!(info.content_type, "text/plain");
    assert!(info.url.starts_with("memory://t/"));
    assert!(info.url.ends_with(".txt"));
    assert_eq!(info.filename.len(), 32 + ".txt".len());
    assert_eq!(info.url, format!("memory://t/{}", info.filename));

    assert!(service.delete(&info).await.unwrap());
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_round_trip_sizes() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    for size in [0usize, 1, 10 * 1024 * 1024] {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let info = service
            .of_bytes(payload.clone())
            .name("blob.bin")
            .upload()
            .await
            .unwrap();

        assert_eq!(info.size, size as u64);
        let downloaded = service.download(&info).unwrap().bytes().await.unwrap();
        assert_eq!(downloaded.len(), size);
        assert!(downloaded[..] == payload[..], "content differs for size {}", size);
    }
}

#[tokio::test]
async fn test_path_and_reader_sources() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    std::io::Write::write_all(&mut file, b"id,name\n1,a\n").unwrap();
    let from_path = service.of_path(file.path()).upload().await.unwrap();
    assert_eq!(from_path.ext, "csv");
    assert_eq!(from_path.content_type, "text/csv");
    assert_eq!(
        &service.download(&from_path).unwrap().bytes().await.unwrap()[..],
        b"id,name\n1,a\n"
    );

    let from_reader = service
        .of_reader(Cursor::new(b"streamed".to_vec()))
        .save_filename("fixed-name.dat")
        .upload()
        .await
        .unwrap();
    assert_eq!(from_reader.filename, "fixed-name.dat");
    assert_eq!(from_reader.size, 8);
    assert_eq!(from_reader.ext, "");
}

#[tokio::test]
async fn test_url_source() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let image = png(32, 16);
    let url = serve_once("200 OK", "image/png", image.clone()).await;

    let info = service.of_url(url).path("remote/").upload().await.unwrap();

    assert_eq!(info.original_filename, "logo.png");
    assert_eq!(info.ext, "png");
    assert_eq!(info.content_type, "image/png");
    assert_eq!(info.size, image.len() as u64);
    assert_eq!(
        &service.download(&info).unwrap().bytes().await.unwrap()[..],
        &image[..]
    );
}

#[tokio::test]
async fn test_unreachable_url_makes_no_platform_call() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let err = service
        .of_url("http://127.0.0.1:1/missing.png")
        .upload()
        .await
        .unwrap_err();

    assert!(err.is_source_unavailable());
    assert_eq!(memory.calls().saves, 0);
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_error_status_is_source_unavailable() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let url = serve_once("404 Not Found", "text/plain", b"nope".to_vec()).await;

    let err = service.of_url(url).upload().await.unwrap_err();
    assert!(err.is_source_unavailable());
    assert_eq!(memory.calls().saves, 0);
}

#[tokio::test]
async fn test_missing_file_is_source_unavailable() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let err = service
        .of_path("/definitely/not/here.bin")
        .upload()
        .await
        .unwrap_err();
    assert!(err.is_source_unavailable());
    assert_eq!(memory.calls().saves, 0);
}

#[tokio::test]
async fn test_thumbnail_generated_and_downloadable() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let info = service
        .of_bytes(png(400, 200))
        .name("wide.png")
        .path("img/")
        .thumbnail_size(100, 100)
        .upload()
        .await
        .unwrap();

    let th_filename = info.th_filename().unwrap();
    assert_eq!(th_filename, format!("{}.min.jpg", info.filename));
    assert!(info.th_url().unwrap().ends_with(".min.jpg"));
    assert_eq!(info.th_content_type(), Some("image/jpeg"));

    let thumbnail = service.download_th(&info).unwrap().bytes().await.unwrap();
    assert_eq!(info.th_size(), Some(thumbnail.len() as u64));
    let decoded = image::load_from_memory(&thumbnail).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));
}

#[tokio::test]
async fn test_thumbnail_naming_overrides() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let info = service
        .of_bytes(png(20, 20))
        .name("a.png")
        .save_filename("avatar.png")
        .save_th_filename("avatar-small")
        .thumbnail_suffix(".th.png")
        .thumbnail()
        .upload()
        .await
        .unwrap();

    assert_eq!(info.filename, "avatar.png");
    assert_eq!(info.th_filename(), Some("avatar-small.th.png"));
    assert_eq!(info.th_content_type(), Some("image/png"));
    let stored = memory.object("avatar-small.th.png").await.unwrap();
    assert_eq!(image::guess_format(&stored.data).unwrap(), ImageFormat::Png);
}

#[tokio::test]
async fn test_no_thumbnail_means_thumbnail_not_found() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let info = service.of_bytes(png(10, 10)).name("a.png").upload().await.unwrap();

    assert!(info.th_url().is_none());
    assert!(info.th_filename().is_none());
    assert!(service.download_th(&info).unwrap_err().is_thumbnail_not_found());
    assert!(service
        .set_th_file_acl(&info, "public-read")
        .await
        .unwrap_err()
        .is_thumbnail_not_found());
    assert!(service
        .generate_th_presigned_url(&info, Utc::now() + Duration::minutes(5))
        .await
        .unwrap_err()
        .is_thumbnail_not_found());
}

#[tokio::test]
async fn test_thumbnail_of_non_image_fails_before_dispatch() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let err = service
        .of_bytes(b"not an image".to_vec())
        .name("notes.txt")
        .thumbnail()
        .upload()
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Thumbnail(_)));
    assert_eq!(memory.calls().saves, 0);
}

#[tokio::test]
async fn test_thumbnail_write_failure_rolls_back_main_object() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    memory.fail_thumbnail_writes(true);

    let err = service
        .of_bytes(png(50, 50))
        .name("a.png")
        .save_filename("rollback.png")
        .thumbnail()
        .upload()
        .await
        .unwrap_err();

    assert!(err.is_remote_write_failure());
    assert!(memory.is_empty().await);

    let mut probe = FileInfo::new("memory-1");
    probe.filename = "rollback.png".to_string();
    assert!(!service.exists(&probe).await.unwrap());
}

#[tokio::test]
async fn test_main_write_failure_leaves_nothing_behind() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    memory.fail_main_writes(true);

    let err = service
        .of_bytes(vec![1u8; 4096])
        .name("partial.bin")
        .upload()
        .await
        .unwrap_err();

    assert!(err.is_remote_write_failure());
    assert_eq!(memory.calls().saves, 1);
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_unreadable_reader_is_source_unavailable() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let err = service
        .of_reader(FailingReader)
        .name("broken.bin")
        .upload()
        .await
        .unwrap_err();

    assert!(err.is_source_unavailable());
    assert_eq!(memory.calls().saves, 0);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let info = service
        .of_bytes(png(30, 30))
        .name("a.png")
        .thumbnail()
        .upload()
        .await
        .unwrap();
    assert_eq!(memory.len().await, 2);

    assert!(service.delete(&info).await.unwrap());
    assert!(service.delete(&info).await.unwrap());
    assert!(memory.is_empty().await);
    assert!(!service.exists(&info).await.unwrap());
}

#[tokio::test]
async fn test_acl_resolution() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let public = service
        .of_bytes(b"x".to_vec())
        .name("public.txt")
        .acl("public-read")
        .upload()
        .await
        .unwrap();
    let stored = memory.object(&public.file_key()).await.unwrap();
    assert_eq!(stored.acl, Some(ResolvedAcl::Predefined(PredefinedAcl::PublicRead)));

    let bogus = service
        .of_bytes(b"x".to_vec())
        .name("bogus.txt")
        .acl("bogus-acl")
        .upload()
        .await
        .unwrap();
    let stored = memory.object(&bogus.file_key()).await.unwrap();
    assert_eq!(stored.acl, None);
}

#[tokio::test]
async fn test_thumbnail_acl_is_independent() {
    let memory =
        MemoryPlatform::new("memory-1").with_default_acl(Some("authenticated-read".to_string()));
    let service = service_with(&memory);

    let info = service
        .of_bytes(png(20, 20))
        .name("a.png")
        .acl("private")
        .thumbnail()
        .upload()
        .await
        .unwrap();

    let main = memory.object(&info.file_key()).await.unwrap();
    let th = memory.object(&info.th_file_key().unwrap()).await.unwrap();
    assert_eq!(main.acl, Some(ResolvedAcl::Predefined(PredefinedAcl::Private)));
    assert_eq!(
        th.acl,
        Some(ResolvedAcl::Predefined(PredefinedAcl::AuthenticatedRead))
    );

    assert!(service.set_th_file_acl(&info, PredefinedAcl::PublicRead).await.unwrap());
    let th = memory.object(&info.th_file_key().unwrap()).await.unwrap();
    assert_eq!(th.acl, Some(ResolvedAcl::Predefined(PredefinedAcl::PublicRead)));
}

#[tokio::test]
async fn test_metadata_reaches_platform() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let info = service
        .of_bytes(b"x".to_vec())
        .name("a.txt")
        .put_metadata("Cache-Control", "no-cache")
        .put_user_metadata("owner", "alice")
        .object_id("42")
        .object_type("user")
        .put_attr("role", "admin")
        .put_attr_all([("tags", serde_json::json!(["a", "b"]))])
        .upload()
        .await
        .unwrap();

    let stored = memory.object(&info.file_key()).await.unwrap();
    assert_eq!(stored.metadata.get("Cache-Control").map(String::as_str), Some("no-cache"));
    assert_eq!(stored.user_metadata.get("owner").map(String::as_str), Some("alice"));
    assert_eq!(info.object_id.as_deref(), Some("42"));
    assert_eq!(info.attr["role"], "admin");
    assert_eq!(info.attr["tags"], serde_json::json!(["a", "b"]));
}

#[tokio::test]
async fn test_unknown_platform() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    let err = service
        .of_bytes(b"x".to_vec())
        .platform("nowhere")
        .upload()
        .await
        .unwrap_err();
    assert!(err.is_unknown_platform());
    assert_eq!(memory.calls().saves, 0);

    let mut stray = FileInfo::new("nowhere");
    stray.filename = "x".to_string();
    assert!(service.exists(&stray).await.unwrap_err().is_unknown_platform());
}

#[tokio::test]
async fn test_capabilities_on_local_platform() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalPlatform::new("local-1", dir.path()).await.unwrap();
    let service = FileStorageService::builder()
        .platform(Arc::new(local))
        .build();

    let err = service
        .of_bytes(b"x".to_vec())
        .acl("public-read")
        .upload()
        .await
        .unwrap_err();
    assert!(err.is_unsupported_operation());

    let err = service
        .of_bytes(b"x".to_vec())
        .put_user_metadata("k", "v")
        .upload()
        .await
        .unwrap_err();
    assert!(err.is_unsupported_operation());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let info = service.of_bytes(b"x".to_vec()).name("a.txt").upload().await.unwrap();
    assert!(!service.set_file_acl(&info, "public-read").await.unwrap());
    let err = service
        .generate_presigned_url(&info, Utc::now() + Duration::minutes(5))
        .await
        .unwrap_err();
    assert!(err.is_unsupported_operation());
    assert!(!service.is_support_presigned_url("local-1").unwrap());
}

/// Thumbnail ACL and metadata are only checked when a thumbnail is written
#[tokio::test]
async fn test_thumbnail_settings_without_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalPlatform::new("local-1", dir.path()).await.unwrap();
    let service = FileStorageService::builder()
        .platform(Arc::new(local))
        .build();

    let info = service
        .of_bytes(b"plain".to_vec())
        .name("a.txt")
        .th_acl("public-read")
        .put_th_metadata("Cache-Control", "no-cache")
        .upload()
        .await
        .unwrap();
    assert!(!info.has_thumbnail());

    let err = service
        .of_bytes(png(20, 20))
        .name("b.png")
        .thumbnail()
        .th_acl("public-read")
        .upload()
        .await
        .unwrap_err();
    assert!(err.is_unsupported_operation());

    let err = service
        .of_bytes(png(20, 20))
        .name("c.png")
        .thumbnail()
        .put_th_user_metadata("k", "v")
        .upload()
        .await
        .unwrap_err();
    assert!(err.is_unsupported_operation());
}

#[tokio::test]
async fn test_presigned_url() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let info = service
        .of_bytes(png(20, 20))
        .name("a.png")
        .thumbnail()
        .upload()
        .await
        .unwrap();

    let expiration = Utc::now() + Duration::hours(1);
    let url = service.generate_presigned_url(&info, expiration).await.unwrap();
    assert!(url.starts_with(&info.url));
    assert!(url.contains(&memory.signature(&info.file_key(), expiration.timestamp())));

    let th_url = service.generate_th_presigned_url(&info, expiration).await.unwrap();
    assert!(th_url.starts_with(info.th_url().unwrap()));
}

#[tokio::test]
async fn test_records_follow_their_platform() {
    let first = MemoryPlatform::new("memory-1");
    let second = MemoryPlatform::new("memory-2");
    let service = FileStorageService::builder()
        .platform(Arc::new(first.clone()))
        .platform(Arc::new(second.clone()))
        .default_platform("memory-1")
        .build();

    let info = service
        .of_bytes(b"x".to_vec())
        .platform("memory-2")
        .name("a.txt")
        .upload()
        .await
        .unwrap();
    assert_eq!(info.platform, "memory-2");
    assert!(first.is_empty().await);

    assert!(service.exists(&info).await.unwrap());
    assert!(service.delete(&info).await.unwrap());
    assert!(second.is_empty().await);
    assert_eq!(first.calls().deletes, 0);
}

#[tokio::test]
async fn test_recorder_integration() {
    let memory = MemoryPlatform::new("memory-1");
    let recorder = Arc::new(MemoryRecorder::new());
    let service = FileStorageService::builder()
        .platform(Arc::new(memory.clone()))
        .default_platform("memory-1")
        .recorder(recorder.clone())
        .build();

    let info = service.of_bytes(b"x".to_vec()).name("a.txt").upload().await.unwrap();
    assert!(info.id.is_some());
    assert_eq!(
        service.get_file_info_by_url(&info.url).await.unwrap(),
        Some(info.clone())
    );
    assert!(service.exists_by_url(&info.url).await.unwrap());

    assert!(service.delete_by_url(&info.url).await.unwrap());
    assert!(memory.is_empty().await);
    assert!(recorder.is_empty().await);
    assert!(!service.delete_by_url(&info.url).await.unwrap());
    assert!(!service.exists_by_url(&info.url).await.unwrap());
}

#[tokio::test]
async fn test_recorder_failure_removes_stored_objects() {
    let memory = MemoryPlatform::new("memory-1");
    let service = FileStorageService::builder()
        .platform(Arc::new(memory.clone()))
        .default_platform("memory-1")
        .recorder(Arc::new(BrokenRecorder))
        .build();

    let err = service
        .of_bytes(png(20, 20))
        .name("a.png")
        .thumbnail()
        .upload()
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::RecordFailure(_)));
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_upload_and_download_progress() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let payload = vec![7u8; 64 * 1024];

    let upload = Arc::new(CountingListener::default());
    let info = service
        .of_bytes(payload.clone())
        .name("big.bin")
        .shared_progress_listener(upload.clone())
        .upload()
        .await
        .unwrap();
    assert_eq!(upload.starts.load(Ordering::SeqCst), 1);
    assert_eq!(upload.finishes.load(Ordering::SeqCst), 1);
    assert_eq!(*upload.last.lock().unwrap(), Some((65536, Some(65536))));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let data = service
        .download(&info)
        .unwrap()
        .progress_listener(move |transferred: u64, total: Option<u64>| {
            log.lock().unwrap().push((transferred, total));
        })
        .bytes()
        .await
        .unwrap();
    assert_eq!(data.len(), payload.len());
    assert_eq!(seen.lock().unwrap().last(), Some(&(65536, Some(65536))));
}

#[tokio::test]
async fn test_download_to_file() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);
    let info = service.of_bytes(b"on disk".to_vec()).name("a.txt").upload().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("copy.txt");
    let written = service.download(&info).unwrap().to_file(&target).await.unwrap();
    assert_eq!(written, 7);
    assert_eq!(std::fs::read(&target).unwrap(), b"on disk");
}

#[tokio::test]
async fn test_platform_management() {
    let memory = MemoryPlatform::new("memory-1");
    let service = service_with(&memory);

    assert!(service.add_platform(Arc::new(MemoryPlatform::new("memory-2"))).is_none());
    assert_eq!(service.platforms(), vec!["memory-1", "memory-2"]);
    assert_eq!(service.get_file_storage(None).unwrap().platform(), "memory-1");
    assert_eq!(
        service.get_file_storage(Some("memory-2")).unwrap().platform(),
        "memory-2"
    );

    assert!(service.remove_platform("memory-2").is_some());
    assert!(service.get_file_storage(Some("memory-2")).is_err());

    service.close().await;
    assert!(service.platforms().is_empty());
}

/// One service handles many uploads and downloads at once across platforms
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_and_downloads() {
    const N: usize = 16;
    let dir = tempfile::TempDir::new().unwrap();
    let memory = MemoryPlatform::new("memory-1");
    let local = LocalPlatform::new("local-1", dir.path()).await.unwrap();
    let service = FileStorageService::builder()
        .platform(Arc::new(memory.clone()))
        .platform(Arc::new(local))
        .default_platform("memory-1")
        .build();

    let payload = |i: usize| vec![i as u8; 1024 + i * 37];

    let uploads = (0..N).map(|i| {
        let service = &service;
        async move {
            let platform = if i % 2 == 0 { "memory-1" } else { "local-1" };
            service
                .of_bytes(payload(i))
                .name(format!("part-{}.bin", i))
                .path("batch/")
                .platform(platform)
                .upload()
                .await
        }
    });
    let infos: Vec<FileInfo> = join_all(uploads)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(memory.calls().saves, N / 2);
    assert_eq!(memory.len().await, N / 2);

    let downloads = infos.iter().map(|info| {
        let service = &service;
        async move { service.download(info)?.bytes().await }
    });
    let contents = join_all(downloads).await;

    for (i, (info, data)) in infos.iter().zip(contents).enumerate() {
        assert_eq!(info.platform, if i % 2 == 0 { "memory-1" } else { "local-1" });
        assert_eq!(data.unwrap().to_vec(), payload(i));
    }
}
