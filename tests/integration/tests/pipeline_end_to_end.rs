//! End-to-end pipeline scenarios against a mock gateway: route, fetch,
//! verify, render.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::{Method, MockServer};
use sha2::{Digest, Sha256};

use waygate_client::{FetchOptions, WaygateClient, WaygateConfig, WaygateError};
use waygate_core::{ContentReference, TxId};
use waygate_fetch::FetchError;
use waygate_registry::{Gateway, GatewayProtocol, GatewayStatus, StaticRegistrySource};
use waygate_routing::RoutingStrategy;

fn digest_of(payload: &[u8]) -> TxId {
    TxId::from_bytes(Sha256::digest(payload).into())
}

fn gateway_for(server: &MockServer) -> Gateway {
    Gateway {
        address: "integration-gateway".to_string(),
        fqdn: server.host(),
        protocol: GatewayProtocol::Http,
        port: server.port(),
        status: GatewayStatus::Joined,
        operator_stake: 1_000,
        total_delegated_stake: 0,
        weights: Default::default(),
        stats: Default::default(),
    }
}

async fn client_for(server: &MockServer) -> WaygateClient {
    let client = WaygateClient::new(WaygateConfig {
        routing_strategy: RoutingStrategy::Random,
        ..Default::default()
    })
    .expect("client");
    client
        .refresh_registry(&StaticRegistrySource::new(vec![gateway_for(server)]))
        .await
        .expect("refresh");
    client
}

/// Serves `payload` as a plain transaction under its own digest.
fn mock_transaction(server: &MockServer, payload: &'static [u8]) -> TxId {
    let id = digest_of(payload);
    server.mock(move |when, then| {
        when.method(Method::HEAD).path(format!("/{id}"));
        then.status(200);
    });
    server.mock(move |when, then| {
        when.method(Method::GET).path(format!("/{id}"));
        then.status(200).body(payload);
    });
    id
}

#[tokio::test]
async fn contiguous_fetch_verifies_and_reports() {
    let server = MockServer::start();
    let id = mock_transaction(&server, b"permanent bytes, verified end to end");
    let client = client_for(&server).await;

    let outcome = client
        .fetch(&ContentReference::id(id), &FetchOptions::default())
        .await
        .expect("fetch");

    assert!(outcome.artifact.verified);
    assert_eq!(outcome.report.total, 1);
    assert_eq!(outcome.report.verified, 1);
    assert_eq!(
        outcome.artifact.bytes.as_ref(),
        b"permanent bytes, verified end to end"
    );
}

#[tokio::test]
async fn one_bit_corruption_surfaces_hash_mismatch() {
    let server = MockServer::start();
    let payload = b"exact bytes the digest was made from".to_vec();
    let id = digest_of(&payload);
    let mut corrupted = payload;
    corrupted[0] ^= 0x01;
    server.mock(move |when, then| {
        when.method(Method::HEAD).path(format!("/{id}"));
        then.status(200);
    });
    server.mock(move |when, then| {
        when.method(Method::GET).path(format!("/{id}"));
        then.status(200).body(corrupted.clone());
    });
    let client = client_for(&server).await;

    let outcome = client
        .fetch(&ContentReference::id(id), &FetchOptions::default())
        .await
        .expect("lenient mode still delivers");
    assert!(!outcome.artifact.verified);
    assert!(outcome
        .artifact
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("digest mismatch"));
    assert_eq!(outcome.report.failed, 1);
}

#[tokio::test]
async fn manifest_renders_rewritten_html_with_blob_handles() {
    let server = MockServer::start();

    let css = b"body { margin: 0; }";
    let js = b"console.log('app');";
    let png = b"\x89PNG\r\n\x1a\n fake image";
    let css_id = mock_transaction(&server, css);
    let js_id = mock_transaction(&server, js);
    let png_id = mock_transaction(&server, png);

    let html: &'static [u8] = Box::leak(
        br#"<!DOCTYPE html>
<html><head>
<link rel="stylesheet" href="style.css">
<script src="app.js"></script>
</head><body>
<img src="logo.png">
<script src="https://cdn.example.com/vendor.js"></script>
</body></html>"#
            .to_vec()
            .into_boxed_slice(),
    );
    let html_id = mock_transaction(&server, html);

    let manifest = serde_json::json!({
        "manifest": "arweave/paths",
        "version": "0.2.0",
        "index": { "path": "index.html" },
        "paths": {
            "index.html": { "id": html_id.to_base64url() },
            "style.css": { "id": css_id.to_base64url() },
            "app.js": { "id": js_id.to_base64url() },
            "logo.png": { "id": png_id.to_base64url() },
        }
    });
    let manifest_bytes: &'static [u8] =
        Box::leak(serde_json::to_vec(&manifest).unwrap().into_boxed_slice());
    let manifest_id = mock_transaction(&server, manifest_bytes);

    let client = client_for(&server).await;
    let outcome = client
        .fetch(&ContentReference::id(manifest_id), &FetchOptions::default())
        .await
        .expect("fetch");

    assert!(outcome.artifact.verified);
    assert_eq!(outcome.report.total, 4);
    assert_eq!(outcome.report.verified, 4);
    assert_eq!(outcome.report.failed, 0);

    let rendered = String::from_utf8(outcome.artifact.bytes.to_vec()).expect("utf-8 html");
    assert!(rendered.contains(&format!(r#"href="blob:{css_id}""#)));
    assert!(rendered.contains(&format!(r#"src="blob:{js_id}""#)));
    assert!(rendered.contains(&format!(r#"src="blob:{png_id}""#)));
    // External scripts stay external.
    assert!(rendered.contains("https://cdn.example.com/vendor.js"));
}

#[tokio::test]
async fn chunked_item_with_foreign_chunk_tx_aborts() {
    let server = MockServer::start();

    // Two-leaf Merkle tree over the root transaction's data.
    let chunk_one = vec![0xAAu8; 700];
    let chunk_two = vec![0xBBu8; 500];
    let total = (chunk_one.len() + chunk_two.len()) as u64;

    fn note_bytes(offset: u64) -> [u8; 32] {
        let mut note = [0u8; 32];
        note[24..].copy_from_slice(&offset.to_be_bytes());
        note
    }
    fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
        let mut outer = Sha256::new();
        for part in parts {
            outer.update(Sha256::digest(part));
        }
        outer.finalize().into()
    }

    let data_hash_one: [u8; 32] = Sha256::digest(&chunk_one).into();
    let data_hash_two: [u8; 32] = Sha256::digest(&chunk_two).into();
    let note_one = note_bytes(chunk_one.len() as u64);
    let note_two = note_bytes(total);
    let leaf_one = hash_parts(&[&data_hash_one, &note_one]);
    let leaf_two = hash_parts(&[&data_hash_two, &note_two]);
    let branch_note = note_bytes(chunk_one.len() as u64);
    let root_bytes = hash_parts(&[&leaf_one, &leaf_two, &branch_note]);
    let root = TxId::from_bytes(root_bytes);

    let mut branch_record = Vec::new();
    branch_record.extend_from_slice(&leaf_one);
    branch_record.extend_from_slice(&leaf_two);
    branch_record.extend_from_slice(&branch_note);
    let mut path_one = branch_record.clone();
    path_one.extend_from_slice(&data_hash_one);
    path_one.extend_from_slice(&note_one);

    let item_id = digest_of(b"the bundled item's own id");
    let root_start: u64 = 5_000;

    // Classifier + chunked HEAD: the item lives inside `root`.
    server.mock(move |when, then| {
        when.method(Method::HEAD).path(format!("/{item_id}"));
        then.status(200)
            .header("x-root-tx-id", root.to_base64url())
            .header("x-root-data-offset", "0")
            .header("content-length", total.to_string());
    });
    server.mock(move |when, then| {
        when.method(Method::GET).path(format!("/tx/{root}/offset"));
        then.status(200).json_body(serde_json::json!({
            "offset": (root_start + total - 1).to_string(),
            "size": total.to_string(),
        }));
    });
    // First chunk: valid proof, correct tx id.
    let path_one_b64 = URL_SAFE_NO_PAD.encode(&path_one);
    let chunk_one_body = chunk_one.clone();
    server.mock(move |when, then| {
        when.method(Method::GET)
            .path(format!("/chunk/{root_start}/data"));
        then.status(200)
            .header("x-chunk-tx-id", root.to_base64url())
            .header("x-chunk-start-offset", root_start.to_string())
            .header("x-chunk-read-offset", "0")
            .header("x-chunk-data-path", &path_one_b64)
            .body(chunk_one_body.clone());
    });
    // Second chunk claims a different transaction.
    let foreign = digest_of(b"a different transaction entirely");
    let second_offset = root_start + chunk_one.len() as u64;
    let chunk_two_body = chunk_two.clone();
    server.mock(move |when, then| {
        when.method(Method::GET)
            .path(format!("/chunk/{second_offset}/data"));
        then.status(200)
            .header("x-chunk-tx-id", foreign.to_base64url())
            .header("x-chunk-start-offset", second_offset.to_string())
            .header("x-chunk-read-offset", "0")
            .body(chunk_two_body.clone());
    });

    let client = client_for(&server).await;
    let error = client
        .fetch(&ContentReference::id(item_id), &FetchOptions::default())
        .await
        .expect_err("the walk must abort");
    assert!(matches!(
        error,
        WaygateError::Fetch(FetchError::ChunkTxIdMismatch { .. })
    ));
}

#[tokio::test]
async fn chunked_item_with_valid_proofs_round_trips() {
    let server = MockServer::start();

    let data = b"bundled item served through the chunk api";
    let data_hash: [u8; 32] = Sha256::digest(data).into();
    let mut note = [0u8; 32];
    note[24..].copy_from_slice(&(data.len() as u64).to_be_bytes());
    let mut outer = Sha256::new();
    outer.update(Sha256::digest(data_hash));
    outer.update(Sha256::digest(note));
    let root = TxId::from_bytes(outer.finalize().into());

    let mut leaf_record = Vec::new();
    leaf_record.extend_from_slice(&data_hash);
    leaf_record.extend_from_slice(&note);
    let path = URL_SAFE_NO_PAD.encode(&leaf_record);

    let item_id = digest_of(b"bundled item id");
    server.mock(move |when, then| {
        when.method(Method::HEAD).path(format!("/{item_id}"));
        then.status(200)
            .header("x-root-tx-id", root.to_base64url())
            .header("x-root-data-offset", "0")
            .header("content-length", data.len().to_string());
    });
    server.mock(move |when, then| {
        when.method(Method::GET).path(format!("/tx/{root}/offset"));
        then.status(200).json_body(serde_json::json!({
            "offset": 42_000 + data.len() as u64 - 1,
            "size": data.len() as u64,
        }));
    });
    server.mock(move |when, then| {
        when.method(Method::GET).path("/chunk/42000/data");
        then.status(200)
            .header("x-chunk-tx-id", root.to_base64url())
            .header("x-chunk-start-offset", "42000")
            .header("x-chunk-read-offset", "0")
            .header("x-chunk-data-path", &path)
            .body(data);
    });

    let client = client_for(&server).await;
    let outcome = client
        .fetch(&ContentReference::id(item_id), &FetchOptions::default())
        .await
        .expect("chunked fetch");
    assert!(outcome.artifact.verified);
    assert_eq!(outcome.artifact.bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn failing_gateway_falls_over_to_a_healthy_one() {
    let bad = MockServer::start();
    let good = MockServer::start();
    let payload = b"served by whichever gateway answers";
    let id = digest_of(payload);

    // The bad gateway 500s everything it is asked.
    bad.mock(move |when, then| {
        when.method(Method::HEAD).path(format!("/{id}"));
        then.status(500);
    });
    bad.mock(move |when, then| {
        when.method(Method::GET).path(format!("/{id}"));
        then.status(500);
    });
    good.mock(move |when, then| {
        when.method(Method::HEAD).path(format!("/{id}"));
        then.status(200);
    });
    good.mock(move |when, then| {
        when.method(Method::GET).path(format!("/{id}"));
        then.status(200).body(payload);
    });

    let client = WaygateClient::new(WaygateConfig {
        routing_strategy: RoutingStrategy::Random,
        ..Default::default()
    })
    .expect("client");
    let mut bad_gateway = gateway_for(&bad);
    bad_gateway.address = "bad-gateway".to_string();
    client
        .refresh_registry(&StaticRegistrySource::new(vec![
            bad_gateway,
            gateway_for(&good),
        ]))
        .await
        .expect("refresh");

    let outcome = client
        .fetch(&ContentReference::id(id), &FetchOptions::default())
        .await
        .expect("fallover succeeds");
    assert!(outcome.artifact.verified);
}
