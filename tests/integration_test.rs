use chrono::{TimeZone, Utc};
use gorails_dl::download::TransferEvent;
use gorails_dl::{
    AuthSession, Authenticator, DownloadOptions, Error, HttpSettings, NoProgress, Orchestrator,
    RedirectResolver, SessionClient, TransferManager, TransferStatus, TransferTarget,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn settings_for(server: &MockServer) -> HttpSettings {
    HttpSettings::new(Url::parse(&server.uri()).unwrap())
}

fn client_for(server: &MockServer, session: Option<&AuthSession>) -> SessionClient {
    SessionClient::new(Arc::new(settings_for(server)), session).unwrap()
}

fn file_url(server: &MockServer, name: &str) -> Url {
    Url::parse(&format!("{}/files/{}", server.uri(), name)).unwrap()
}

fn quick_options(output: &Path) -> DownloadOptions {
    DownloadOptions {
        output_directory: output.to_path_buf(),
        max_parallel: 4,
        retries: 0,
        retry_delay: Duration::from_millis(10),
    }
}

/// HEAD answering with the size of `body`.
async fn mount_size_probe(server: &MockServer, file: &str, body: &[u8]) {
    Mock::given(method("HEAD"))
        .and(path(format!("/files/{}", file)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", body.len().to_string().as_str())
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Episode page, its download redirect and the file behind it.
async fn mount_episode(server: &MockServer, id: &str, title: &str, body: &[u8]) {
    let page = format!(
        r#"<html><body>
             <h1>{title}</h1>
             <p class="published">September 5, 2019</p>
             <a href="/episodes/{id}/download">Download</a>
           </body></html>"#
    );
    Mock::given(method("GET"))
        .and(path(format!("/episodes/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/episodes/{}/download", id)))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/files/{}.mp4", server.uri(), id).as_str()),
        )
        .mount(server)
        .await;

    mount_size_probe(server, &format!("{}.mp4", id), body).await;

    Mock::given(method("GET"))
        .and(path(format!("/files/{}.mp4", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
        .mount(server)
        .await;
}

// ---- Transfer Manager ----

#[tokio::test]
async fn test_fresh_download_writes_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/files/fresh.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(VIDEO.to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "fresh.mp4"), dir.path(), "Fresh", Some(1));
    let manager = TransferManager::new(&client_for(&server, None));
    let outcome = assert_ok!(manager.transfer(&target, &NoProgress).await);

    assert_eq!(outcome.status, TransferStatus::Completed);
    assert_eq!(outcome.filename, "01_Fresh.mp4");
    assert_eq!(outcome.byte_size, VIDEO.len() as u64);
    assert_eq!(fs::read(dir.path().join("01_Fresh.mp4")).unwrap(), VIDEO);
}

#[tokio::test]
async fn test_complete_local_file_is_skipped_without_body_reads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_size_probe(&server, "done.mp4", VIDEO).await;
    Mock::given(method("GET"))
        .and(path("/files/done.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(VIDEO.to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "done.mp4"), dir.path(), "Done", None);
    fs::write(&target.local_path, VIDEO).unwrap();

    let manager = TransferManager::new(&client_for(&server, None));
    let outcome = assert_ok!(manager.transfer(&target, &NoProgress).await);

    assert_eq!(outcome.status, TransferStatus::Skipped);
    assert_eq!(outcome.byte_size, VIDEO.len() as u64);
}

#[tokio::test]
async fn test_partial_file_is_resumed_with_range_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let offset = 10;
    mount_size_probe(&server, "partial.mp4", VIDEO).await;
    Mock::given(method("GET"))
        .and(path("/files/partial.mp4"))
        .and(header("range", format!("bytes={}-", offset).as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {}-{}/{}", offset, VIDEO.len() - 1, VIDEO.len()).as_str(),
                )
                .set_body_bytes(VIDEO[offset..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "partial.mp4"), dir.path(), "Partial", Some(2));
    fs::write(&target.local_path, &VIDEO[..offset]).unwrap();

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let manager = TransferManager::new(&client_for(&server, None));
    let outcome = assert_ok!(manager.transfer(&target, &sender).await);

    assert_eq!(outcome.status, TransferStatus::Resumed);
    assert_eq!(outcome.byte_size, VIDEO.len() as u64);
    assert_eq!(fs::read(&target.local_path).unwrap(), VIDEO);

    let started = receiver.try_recv().unwrap();
    assert!(matches!(
        started,
        TransferEvent::Started {
            resumed_from: 10,
            total_bytes: Some(36),
            ..
        }
    ));
}

#[tokio::test]
async fn test_ignored_range_restarts_from_zero() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_size_probe(&server, "norange.mp4", VIDEO).await;
    Mock::given(method("GET"))
        .and(path("/files/norange.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(VIDEO.to_vec()))
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "norange.mp4"), dir.path(), "No Range", None);
    fs::write(&target.local_path, b"0123").unwrap();

    let manager = TransferManager::new(&client_for(&server, None));
    let outcome = assert_ok!(manager.transfer(&target, &NoProgress).await);

    assert_eq!(outcome.status, TransferStatus::Completed);
    assert_eq!(fs::read(&target.local_path).unwrap(), VIDEO);
}

#[tokio::test]
async fn test_forced_download_overwrites_complete_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_size_probe(&server, "forced.mp4", VIDEO).await;
    Mock::given(method("GET"))
        .and(path("/files/forced.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(VIDEO.to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "forced.mp4"), dir.path(), "Forced", Some(1))
        .force_overwrite(true);
    let stale = b"stale local content that is longer than the remote video file";
    fs::write(&target.local_path, stale).unwrap();

    let manager = TransferManager::new(&client_for(&server, None));
    let outcome = assert_ok!(manager.transfer(&target, &NoProgress).await);

    assert_eq!(outcome.status, TransferStatus::Completed);
    assert_eq!(outcome.byte_size, VIDEO.len() as u64);
    assert_eq!(fs::read(&target.local_path).unwrap(), VIDEO);
}

#[tokio::test]
async fn test_unknown_remote_size_keeps_local_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("HEAD"))
        .and(path("/files/unknown.mp4"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/unknown.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(VIDEO.to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "unknown.mp4"), dir.path(), "Unknown", None);
    fs::write(&target.local_path, b"short").unwrap();

    let manager = TransferManager::new(&client_for(&server, None));
    let outcome = assert_ok!(manager.transfer(&target, &NoProgress).await);

    assert_eq!(outcome.status, TransferStatus::Skipped);
    assert_eq!(outcome.byte_size, 5);
    assert_eq!(fs::read(&target.local_path).unwrap(), b"short");
}

#[tokio::test]
async fn test_creation_time_becomes_modification_time() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/files/dated.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(VIDEO.to_vec()))
        .mount(&server)
        .await;

    let created_at = Utc.with_ymd_and_hms(2019, 9, 5, 0, 0, 0).unwrap();
    let target = TransferTarget::new(file_url(&server, "dated.mp4"), dir.path(), "Dated", None)
        .with_created_at(Some(created_at));

    let manager = TransferManager::new(&client_for(&server, None));
    assert_ok!(manager.transfer(&target, &NoProgress).await);

    let modified = fs::metadata(&target.local_path).unwrap().modified().unwrap();
    assert_eq!(modified, SystemTime::from(created_at));
}

#[tokio::test]
async fn test_server_error_is_retried_then_reported() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/files/broken.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "broken.mp4"), dir.path(), "Broken", None);
    let manager = TransferManager::new(&client_for(&server, None))
        .with_retries(2, Duration::from_millis(10));
    let err = assert_err!(manager.transfer(&target, &NoProgress).await);

    assert!(matches!(err, Error::HttpStatus { .. }));
    assert!(!target.local_path.exists());
}

#[tokio::test]
async fn test_interrupted_transfer_resumes_when_size_probe_is_refused() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cut = 10;
    Mock::given(method("HEAD"))
        .and(path("/files/signed.mp4"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    // The first response announces the full size but ends early.
    Mock::given(method("GET"))
        .and(path("/files/signed.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-range",
                    format!("bytes 0-{}/{}", VIDEO.len() - 1, VIDEO.len()).as_str(),
                )
                .set_body_bytes(VIDEO[..cut].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/signed.mp4"))
        .and(header("range", format!("bytes={}-", cut).as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {}-{}/{}", cut, VIDEO.len() - 1, VIDEO.len()).as_str(),
                )
                .set_body_bytes(VIDEO[cut..].to_vec()),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "signed.mp4"), dir.path(), "Signed", None);
    let manager = TransferManager::new(&client_for(&server, None))
        .with_retries(2, Duration::from_millis(10));
    let outcome = assert_ok!(manager.transfer(&target, &NoProgress).await);

    assert_eq!(outcome.status, TransferStatus::Resumed);
    assert_eq!(outcome.byte_size, VIDEO.len() as u64);
    assert_eq!(fs::read(&target.local_path).unwrap(), VIDEO);
}

#[tokio::test]
async fn test_interrupted_transfer_is_never_reported_as_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("HEAD"))
        .and(path("/files/cut.mp4"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/cut.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-range",
                    format!("bytes 0-{}/{}", VIDEO.len() - 1, VIDEO.len()).as_str(),
                )
                .set_body_bytes(VIDEO[..10].to_vec()),
        )
        .mount(&server)
        .await;

    let target = TransferTarget::new(file_url(&server, "cut.mp4"), dir.path(), "Cut", None);
    let manager = TransferManager::new(&client_for(&server, None))
        .with_retries(2, Duration::from_millis(10));
    let err = assert_err!(manager.transfer(&target, &NoProgress).await);

    assert!(matches!(err, Error::TransferFailed { .. }));
}

// ---- Redirect Resolver and session propagation ----

#[tokio::test]
async fn test_redirect_resolves_to_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/episodes/42/download"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/cdn/42.mp4", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/cdn/42.mp4", "video").await;

    let resolver = RedirectResolver::new(&client_for(&server, None));
    let indirect = Url::parse(&format!("{}/episodes/42/download", server.uri())).unwrap();
    let direct = assert_ok!(resolver.resolve(&indirect).await);

    assert_eq!(direct.path(), "/cdn/42.mp4");
}

#[tokio::test]
async fn test_redirect_to_error_fails_resolution() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/episodes/7/download"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolver = RedirectResolver::new(&client_for(&server, None));
    let indirect = Url::parse(&format!("{}/episodes/7/download", server.uri())).unwrap();
    let err = assert_err!(resolver.resolve(&indirect).await);

    assert!(matches!(err, Error::RedirectResolutionFailed { .. }));
}

#[tokio::test]
async fn test_session_cookie_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/episodes/secret"))
        .and(header("cookie", "_gorails_session=token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("members only"))
        .expect(1)
        .mount(&server)
        .await;

    let session = AuthSession::new("token-123");
    let client = client_for(&server, Some(&session));
    let response = client
        .http()
        .get(format!("{}/episodes/secret", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

// ---- Orchestrator ----

#[tokio::test]
async fn test_download_one_runs_full_pipeline() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_episode(&server, "42", "Intro to Testing", VIDEO).await;

    let orchestrator = Orchestrator::new(
        settings_for(&server),
        Some(AuthSession::new("tok")),
        quick_options(dir.path()),
    );
    let page = Url::parse(&format!("{}/episodes/42", server.uri())).unwrap();
    let outcome = assert_ok!(orchestrator.download_one(&page, false).await);

    assert_eq!(outcome.title, "Intro to Testing");
    assert_eq!(outcome.filename, "Intro to Testing.mp4");
    assert_eq!(outcome.status, TransferStatus::Completed);

    let file = dir.path().join("Intro to Testing.mp4");
    assert_eq!(fs::read(&file).unwrap(), VIDEO);
    let modified = fs::metadata(&file).unwrap().modified().unwrap();
    assert_eq!(
        modified,
        SystemTime::from(Utc.with_ymd_and_hms(2019, 9, 5, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_download_one_without_link_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/episodes/locked", "<h1>Locked</h1><p>Subscribe to watch</p>").await;

    let orchestrator = Orchestrator::new(settings_for(&server), None, quick_options(dir.path()));
    let page = Url::parse(&format!("{}/episodes/locked", server.uri())).unwrap();
    let err = assert_err!(orchestrator.download_one(&page, false).await);

    assert!(matches!(err, Error::NoDownloadLinkFound { .. }));
}

#[tokio::test]
async fn test_playlist_positions_and_idempotence() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(
        &server,
        "/series/testing",
        r#"<main>
             <a href="/episodes/e1?autoplay=1">Models</a>
             <a href="/episodes/e2">Controllers</a>
             <a href="/episodes/e3">System Tests</a>
             <a href="/episodes/e1?autoplay=0">Models again</a>
           </main>"#,
    )
    .await;
    // The first episode finishes last.
    Mock::given(method("GET"))
        .and(path("/episodes/e1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<h1>Models</h1><p>May 1, 2020</p><a href="/episodes/e1/download">Download</a>"#,
                )
                .set_delay(Duration::from_millis(300)),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    mount_episode(&server, "e1", "Models", b"first video").await;
    mount_episode(&server, "e2", "Controllers", b"second video").await;
    mount_episode(&server, "e3", "System Tests", b"third video").await;

    let orchestrator = Orchestrator::new(
        settings_for(&server),
        Some(AuthSession::new("tok")),
        quick_options(dir.path()),
    );
    let playlist = Url::parse(&format!("{}/series/testing", server.uri())).unwrap();

    let first = assert_ok!(orchestrator.download_playlist(&playlist, false).await);
    let positions: Vec<_> = first.videos.iter().map(|v| v.ordinal_position).collect();
    assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(first.total(), 3);
    assert_eq!(first.downloaded(), 3);
    assert_eq!(first.skipped(), 0);
    assert_eq!(
        fs::read(dir.path().join("01_Models.mp4")).unwrap(),
        b"first video"
    );
    assert!(dir.path().join("02_Controllers.mp4").exists());
    assert!(dir.path().join("03_System Tests.mp4").exists());

    let second = assert_ok!(orchestrator.download_playlist(&playlist, false).await);
    assert_eq!(second.downloaded(), 0);
    assert_eq!(second.skipped(), 3);
    assert_eq!(second.total(), 3);
}

#[tokio::test]
async fn test_playlist_runs_at_most_max_parallel_episodes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_delay = Duration::from_millis(300);
    let ids = ["p1", "p2", "p3", "p4", "p5"];

    let links: String = ids
        .iter()
        .map(|id| format!(r#"<a href="/episodes/{id}">{id}</a>"#))
        .collect();
    mount_page(&server, "/series/pool", &format!("<main>{links}</main>")).await;
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/episodes/{}", id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!(
                        r#"<h1>{id}</h1><a href="/episodes/{id}/download">Download</a>"#
                    ))
                    .set_delay(page_delay),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        mount_episode(&server, id, id, id.as_bytes()).await;
    }

    let options = DownloadOptions {
        max_parallel: 2,
        ..quick_options(dir.path())
    };
    let orchestrator = Orchestrator::new(settings_for(&server), None, options);
    let playlist = Url::parse(&format!("{}/series/pool", server.uri())).unwrap();

    let started = Instant::now();
    let result = assert_ok!(orchestrator.download_playlist(&playlist, false).await);
    let elapsed = started.elapsed();

    assert_eq!(result.downloaded(), 5);
    // Two workers need three rounds of delayed page fetches for five episodes.
    assert!(
        elapsed >= page_delay * 3,
        "five episodes finished in {:?} with two workers",
        elapsed
    );
}

#[tokio::test]
async fn test_playlist_episode_failure_does_not_cancel_siblings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(
        &server,
        "/series/mixed",
        r#"<main><a href="/episodes/ok1">One</a><a href="/episodes/gone">Two</a><a href="/episodes/ok2">Three</a></main>"#,
    )
    .await;
    mount_episode(&server, "ok1", "One", b"one").await;
    mount_page(&server, "/episodes/gone", "<h1>Gone</h1>").await;
    mount_episode(&server, "ok2", "Three", b"three").await;

    let orchestrator = Orchestrator::new(settings_for(&server), None, quick_options(dir.path()));
    let playlist = Url::parse(&format!("{}/series/mixed", server.uri())).unwrap();
    let result = assert_ok!(orchestrator.download_playlist(&playlist, false).await);

    assert_eq!(result.total(), 3);
    assert_eq!(result.downloaded(), 2);
    assert_eq!(result.failed(), 1);
    assert!(result.videos[1].is_failed());
    assert_eq!(result.videos[1].ordinal_position, Some(2));
    assert!(dir.path().join("03_Three.mp4").exists());
}

#[tokio::test]
async fn test_playlist_without_episodes_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/series/empty", "<main><p>Coming soon</p></main>").await;

    let orchestrator = Orchestrator::new(settings_for(&server), None, quick_options(dir.path()));
    let playlist = Url::parse(&format!("{}/series/empty", server.uri())).unwrap();
    let err = assert_err!(orchestrator.download_playlist(&playlist, false).await);

    assert!(matches!(err, Error::NoEpisodesFound { .. }));
}

#[tokio::test]
async fn test_workers_carry_the_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(
        &server,
        "/series/private",
        r#"<main><a href="/episodes/p1">One</a><a href="/episodes/p2">Two</a></main>"#,
    )
    .await;
    for id in ["p1", "p2"] {
        Mock::given(method("GET"))
            .and(path(format!("/episodes/{}", id)))
            .and(header("cookie", "_gorails_session=member"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<h1>Private {id}</h1><a href="/episodes/{id}/download">Download</a>"#
            )))
            .expect(1)
            .with_priority(1)
            .mount(&server)
            .await;
        mount_episode(&server, id, "should not be used", b"private").await;
    }

    let orchestrator = Orchestrator::new(
        settings_for(&server),
        Some(AuthSession::new("member")),
        quick_options(dir.path()),
    );
    let playlist = Url::parse(&format!("{}/series/private", server.uri())).unwrap();
    let result = assert_ok!(orchestrator.download_playlist(&playlist, false).await);

    assert_eq!(result.downloaded(), 2);
    assert!(dir.path().join("01_Private p1.mp4").exists());
    assert!(dir.path().join("02_Private p2.mp4").exists());
}

#[tokio::test]
async fn test_all_series_uses_subdirectories_and_isolates_failures() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(
        &server,
        "/series",
        r#"<article class="p-6"><a href="/series/alpha">Alpha</a></article>
           <article class="p-6"><a href="/series/broken">Broken</a></article>
           <article class="p-6"><a href="/series/beta">Beta</a></article>"#,
    )
    .await;
    mount_page(
        &server,
        "/series/alpha",
        r#"<main><a href="/episodes/a1">A1</a><a href="/episodes/a2">A2</a></main>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/series/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/series/beta", r#"<main><a href="/episodes/b1">B1</a></main>"#).await;
    mount_episode(&server, "a1", "Alpha One", b"a1").await;
    mount_episode(&server, "a2", "Alpha Two", b"a2").await;
    mount_episode(&server, "b1", "Beta One", b"b1").await;

    let orchestrator = Orchestrator::new(
        settings_for(&server),
        Some(AuthSession::new("tok")),
        quick_options(dir.path()),
    );
    let summary = assert_ok!(orchestrator.download_all_series(false).await);

    assert_eq!(summary.total_series, 3);
    assert_eq!(summary.completed_series(), 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].entry.title, "Broken");
    assert_eq!(summary.downloaded(), 3);

    assert_eq!(
        fs::read(dir.path().join("alpha").join("01_Alpha One.mp4")).unwrap(),
        b"a1"
    );
    assert!(dir.path().join("alpha").join("02_Alpha Two.mp4").exists());
    assert!(dir.path().join("beta").join("01_Beta One.mp4").exists());
    assert!(!dir.path().join("broken").exists());
}

// ---- Login ----

const SIGN_IN_FORM: &str = r#"<html><head>
    <meta name="csrf-param" content="authenticity_token">
    <meta name="csrf-token" content="csrf-abc123">
  </head><body><form action="/users/sign_in" method="post"></form></body></html>"#;

#[tokio::test]
async fn test_login_captures_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_gorails_session=anonymous; path=/")
                .set_body_string(SIGN_IN_FORM),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/sign_in"))
        .and(body_string_contains("authenticity_token=csrf-abc123"))
        .and(body_string_contains("user%5Bremember_me%5D=1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", "_gorails_session=signed-in; path=/")
                .insert_header("location", "/dashboard"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/dashboard", "<h1>Welcome back</h1>").await;

    let authenticator = Authenticator::new(Arc::new(settings_for(&server)));
    let session = assert_ok!(authenticator.login("dev@example.com", "secret").await);

    assert_eq!(session.token(), "signed-in");
}

#[tokio::test]
async fn test_rejected_login_reports_alert() {
    let server = MockServer::start().await;
    mount_page(&server, "/users/sign_in", SIGN_IN_FORM).await;
    Mock::given(method("POST"))
        .and(path("/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_gorails_session=anonymous; path=/")
                .set_body_string(
                    r#"<div class="alert">Invalid Email or password.</div>"#,
                ),
        )
        .mount(&server)
        .await;

    let authenticator = Authenticator::new(Arc::new(settings_for(&server)));
    let err = assert_err!(authenticator.login("dev@example.com", "wrong").await);

    match err {
        Error::AuthenticationFailed(reason) => assert_eq!(reason, "Invalid Email or password."),
        other => panic!("expected AuthenticationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_login_without_csrf_token_fails() {
    let server = MockServer::start().await;
    mount_page(&server, "/users/sign_in", "<html><body>Maintenance</body></html>").await;

    let authenticator = Authenticator::new(Arc::new(settings_for(&server)));
    let err = assert_err!(authenticator.login("dev@example.com", "secret").await);

    assert!(matches!(err, Error::AuthenticationFailed(_)));
}
