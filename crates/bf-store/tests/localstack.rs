//! End-to-end tests against LocalStack.
//!
//! These exercise the full scan -> partition -> stream path against a real
//! S3 API. They are ignored by default; run LocalStack (or set
//! `LOCALSTACK_ENDPOINT`) and pass `--ignored` to include them.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bf_store::{ClientConfig, DiscoveryConfig, ObjectStreamProvider, create_client, list_files};
use tokio::io::AsyncReadExt;

struct LocalStackContext {
    client: Client,
}

impl LocalStackContext {
    async fn new() -> Self {
        let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4566".to_string());

        let config = ClientConfig::new()
            .with_region("us-east-1")
            .with_credentials("test", "test")
            .with_endpoint(endpoint);

        Self {
            client: create_client(&config).await.unwrap(),
        }
    }

    async fn is_available(&self) -> bool {
        self.client.list_buckets().send().await.is_ok()
    }

    async fn create_bucket(&self, name: &str) {
        let exists = self
            .client
            .list_buckets()
            .send()
            .await
            .unwrap()
            .buckets()
            .iter()
            .any(|b| b.name().unwrap_or_default() == name);

        if !exists {
            self.client.create_bucket().bucket(name).send().await.unwrap();
        }
    }

    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .unwrap();
    }
}

fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_list_partition_and_stream() {
    let ctx = LocalStackContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "bf-e2e-bucket";
    ctx.create_bucket(bucket).await;

    let file1 = sample_bytes(100);
    let file2 = sample_bytes(50);
    let file3 = sample_bytes(10);
    ctx.upload(bucket, "data/1.csv", file1.clone()).await;
    ctx.upload(bucket, "data/2.csv", file2.clone()).await;
    ctx.upload(bucket, "data/3.csv", file3.clone()).await;
    // zero-size placeholder must be skipped
    ctx.upload(bucket, "data/empty.csv", Vec::new()).await;

    let config = DiscoveryConfig::new(bucket)
        .with_prefix("data/")
        .with_min_task_size(120);

    let listing = list_files(&ctx.client, &config).await.unwrap();

    assert_eq!(listing.len(), 3);
    assert_eq!(listing.task_count(), 2);
    assert_eq!(listing.last_path(None), Some("data/3.csv".to_string()));

    // First task holds 100 + 50 >= 120 bytes, second the leftover entry
    let names = listing.task(0).unwrap().to_vec().unwrap();
    assert_eq!(names, vec!["data/1.csv", "data/2.csv"]);

    // Stream the first task's objects and compare contents byte for byte
    let mut provider = ObjectStreamProvider::new(ctx.client.clone(), bucket, names);
    for expected in [&file1, &file2] {
        let mut opened = provider.open_next().await.unwrap().expect("object");
        let mut body = Vec::new();
        opened.reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(&body, expected);
    }
    assert!(provider.open_next().await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_pattern_filters_listing() {
    let ctx = LocalStackContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "bf-e2e-pattern-bucket";
    ctx.create_bucket(bucket).await;
    ctx.upload(bucket, "in/sample_01.csv", sample_bytes(20)).await;
    ctx.upload(bucket, "in/sample_02.csv", sample_bytes(20)).await;
    ctx.upload(bucket, "in/readme.txt", sample_bytes(20)).await;

    let config = DiscoveryConfig::new(bucket)
        .with_prefix("in/")
        .with_path_match_pattern("\\.csv$");

    let listing = list_files(&ctx.client, &config).await.unwrap();

    assert_eq!(listing.len(), 2);
    assert_eq!(listing.last_path(None), Some("in/sample_02.csv".to_string()));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_single_shot_provider_reads_one_object() {
    let ctx = LocalStackContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "bf-e2e-single-bucket";
    ctx.create_bucket(bucket).await;
    ctx.upload(bucket, "a.bin", sample_bytes(64)).await;
    ctx.upload(bucket, "b.bin", sample_bytes(64)).await;

    let names = vec!["a.bin".to_string(), "b.bin".to_string()];
    let mut provider =
        ObjectStreamProvider::new(ctx.client.clone(), bucket, names).with_single_shot(true);

    let opened = provider.open_next().await.unwrap().expect("first object");
    assert_eq!(opened.path, format!("s3://{bucket}/a.bin"));

    assert!(provider.open_next().await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_missing_object_is_not_retried() {
    let ctx = LocalStackContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "bf-e2e-missing-bucket";
    ctx.create_bucket(bucket).await;

    let mut provider = ObjectStreamProvider::new(
        ctx.client.clone(),
        bucket,
        vec!["does/not/exist.csv".to_string()],
    );

    let err = provider.open_next().await.unwrap_err();
    // 404 classifies as fatal, so the provider surfaces a configuration
    // error rather than burning the retry budget
    assert!(matches!(err, bf_error::BfError::Config { .. }));
}
