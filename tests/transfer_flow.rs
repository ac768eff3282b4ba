//! DCC transfer tests against a loopback peer.

mod common;

use std::sync::Arc;

use common::{DccPeer, RecordingSession, TestStack, eventually};
use downer::error::TransferError;
use downer::network::SessionHandle;
use downer::transfer::{TransferControl, TransferEngine, TransferJob, TransferOptions};
use xdcc_proto::{DccSend, RequestStatus};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn engine(dir: &std::path::Path) -> TransferEngine {
    TransferEngine::new(TransferOptions {
        download_dir: dir.to_path_buf(),
        connect_timeout: std::time::Duration::from_secs(5),
        read_timeout: std::time::Duration::from_secs(5),
        send_acks: true,
    })
}

#[tokio::test]
async fn test_exact_stream_lands_under_final_name() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let peer = DccPeer::bind().await.unwrap();
    let (ip, port) = (peer.ip(), peer.port());
    let data = payload(200_000);
    let served = peer.serve(data.clone());

    let control = TransferControl::default();
    let outcome = engine
        .begin_active_transfer(ip, port, "Show.S01E01.mkv", None, &control)
        .await
        .unwrap();

    assert_eq!(outcome.bytes, 200_000);
    assert_eq!(outcome.path, dir.path().join("Show.S01E01.mkv"));
    assert_eq!(std::fs::read(&outcome.path).unwrap(), data);
    assert!(
        std::fs::read_dir(dir.path())
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".part"))
    );
    assert_eq!(control.received(), 200_000);

    let acks = served.await.unwrap().unwrap();
    assert!(!acks.is_empty());
    assert_eq!(acks.len() % 4, 0);
    let last = u32::from_be_bytes(acks[acks.len() - 4..].try_into().unwrap());
    assert_eq!(last, 200_000);
}

#[tokio::test]
async fn test_known_size_stops_at_size() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let peer = DccPeer::bind().await.unwrap();
    let offer = DccSend::parse(&format!("SEND a.bin {} {} 4096", peer.ip(), peer.port())).unwrap();
    let served = peer.serve(payload(4096));

    let outcome = engine.receive(&offer, &TransferControl::default()).await.unwrap();
    assert_eq!(outcome.bytes, 4096);
    assert_eq!(std::fs::metadata(&outcome.path).unwrap().len(), 4096);
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reset_before_data_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let peer = DccPeer::bind().await.unwrap();
    let (ip, port) = (peer.ip(), peer.port());
    let served = peer.serve_reset();

    let result = engine
        .begin_active_transfer(ip, port, "reset.bin", None, &TransferControl::default())
        .await;

    assert!(result.is_err(), "reset must fail the transfer: {:?}", result);
    assert!(!dir.path().join("reset.bin").exists());
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_short_stream_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let peer = DccPeer::bind().await.unwrap();
    let (ip, port) = (peer.ip(), peer.port());
    let served = peer.serve(payload(1000));

    let result = engine
        .begin_active_transfer(ip, port, "short.bin", Some(5000), &TransferControl::default())
        .await;

    match result {
        Err(TransferError::Incomplete { expected, received }) => {
            assert_eq!(expected, 5000);
            assert_eq!(received, 1000);
        }
        other => panic!("expected Incomplete, got {:?}", other),
    }
    assert!(!dir.path().join("short.bin").exists());
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreachable_peer_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    // Bind then drop to get a port nobody listens on.
    let port = DccPeer::bind().await.unwrap().port();

    let result = engine
        .begin_active_transfer(
            u32::from(std::net::Ipv4Addr::LOCALHOST),
            port,
            "nobody.bin",
            None,
            &TransferControl::default(),
        )
        .await;
    assert!(matches!(result, Err(TransferError::Connect { .. })), "{:?}", result);
}

#[tokio::test]
async fn test_requested_pack_completes_through_pool() {
    let stack = TestStack::new().unwrap();
    let session = Arc::new(RecordingSession::new("S1"));
    stack
        .registry
        .register(Arc::clone(&session) as Arc<dyn SessionHandle>);

    let query = "S1/#chan/Bot/7";
    let request = stack.tracker.request_package(query).await.unwrap();
    assert_eq!(request.status, RequestStatus::Requested);
    assert_eq!(
        session.sent(),
        vec![("Bot".to_string(), "XDCC SEND #7".to_string())]
    );

    let peer = DccPeer::bind().await.unwrap();
    let offer = DccSend::parse(&format!("SEND pack7.mkv {} {} 65536", peer.ip(), peer.port())).unwrap();
    let served = peer.serve(payload(65536));

    // The bot answers from a differently-cased nick.
    let claimed = stack.tracker.claim("S1", "bot");
    assert_eq!(claimed.as_deref(), Some(query));
    stack
        .pool
        .submit(TransferJob {
            server: "S1".to_string(),
            nick: "bot".to_string(),
            offer,
            request: claimed,
        })
        .unwrap();

    let done = eventually("request to finish", || {
        stack
            .db
            .requests()
            .get(query)
            .ok()
            .flatten()
            .filter(|r| r.status.is_terminal())
    })
    .await;

    assert_eq!(done.status, RequestStatus::Done);
    assert_eq!(done.bytes, 65536);
    assert_eq!(done.file.as_deref(), Some("pack7.mkv"));
    assert_eq!(
        std::fs::metadata(stack.downloads.join("pack7.mkv")).unwrap().len(),
        65536
    );
    assert!(stack.pool.snapshot().is_empty());
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failed_transfer_marks_request_failed() {
    let stack = TestStack::new().unwrap();
    stack
        .registry
        .register(Arc::new(RecordingSession::new("S1")) as Arc<dyn SessionHandle>);

    let query = "S1/#chan/Bot/2";
    stack.tracker.request_package(query).await.unwrap();

    let peer = DccPeer::bind().await.unwrap();
    let offer = DccSend::parse(&format!("SEND two.bin {} {} 9000", peer.ip(), peer.port())).unwrap();
    let served = peer.serve(payload(3000));

    stack
        .pool
        .submit(TransferJob {
            server: "S1".to_string(),
            nick: "Bot".to_string(),
            offer,
            request: stack.tracker.claim("S1", "Bot"),
        })
        .unwrap();

    let failed = eventually("request to fail", || {
        stack
            .db
            .requests()
            .get(query)
            .ok()
            .flatten()
            .filter(|r| r.status.is_terminal())
    })
    .await;

    assert_eq!(failed.status, RequestStatus::Failed);
    assert_eq!(failed.bytes, 3000);
    assert!(failed.error.is_some());
    assert!(!stack.downloads.join("two.bin").exists());
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_two_bots_serving_one_release_name() {
    let stack = TestStack::new().unwrap();
    stack
        .registry
        .register(Arc::new(RecordingSession::new("S1")) as Arc<dyn SessionHandle>);

    let mut served = Vec::new();
    for (bot, fill) in [("BotA", b'A'), ("BotB", b'B')] {
        let query = format!("S1/#chan/{}/1", bot);
        stack.tracker.request_package(&query).await.unwrap();

        let peer = DccPeer::bind().await.unwrap();
        let offer =
            DccSend::parse(&format!("SEND Release.mkv {} {} 65536", peer.ip(), peer.port())).unwrap();
        served.push(peer.serve(vec![fill; 65536]));
        stack
            .pool
            .submit(TransferJob {
                server: "S1".to_string(),
                nick: bot.to_string(),
                offer,
                request: stack.tracker.claim("S1", bot),
            })
            .unwrap();
    }

    for (bot, fill) in [("BotA", b'A'), ("BotB", b'B')] {
        let query = format!("S1/#chan/{}/1", bot);
        let done = eventually("request to finish", || {
            stack
                .db
                .requests()
                .get(&query)
                .ok()
                .flatten()
                .filter(|r| r.status.is_terminal())
        })
        .await;
        assert_eq!(done.status, RequestStatus::Done, "{}: {:?}", bot, done.error);
        let file = done.file.unwrap();
        assert_eq!(std::fs::read(stack.downloads.join(&file)).unwrap(), vec![fill; 65536]);
    }

    let mut names: Vec<String> = std::fs::read_dir(&stack.downloads)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Release (1).mkv", "Release.mkv"]);
    for handle in served {
        handle.await.unwrap().unwrap();
    }
}
