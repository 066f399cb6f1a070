use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use keygate_api::github_client::GitHubStore;
use keygate_core::{DocumentStore, Revision, StoreError};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Default)]
struct MockRepo {
    file: Option<(String, String)>,
    commits: u32,
    messages: Vec<String>,
    refs: Vec<Option<String>>,
    branches: Vec<Option<String>>,
    fail_reads: bool,
}

type Shared = Arc<Mutex<MockRepo>>;

#[derive(Deserialize)]
struct RefQuery {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Deserialize)]
struct PutBody {
    message: String,
    content: String,
    sha: Option<String>,
    branch: Option<String>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("token t0k3n")
        && headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ua| ua.starts_with("keygate/"))
}

async fn get_contents(
    State(repo): State<Shared>,
    Path((_owner, _name, _path)): Path<(String, String, String)>,
    Query(query): Query<RefQuery>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
    }
    let mut repo = repo.lock().unwrap();
    repo.refs.push(query.git_ref);
    if repo.fail_reads {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({"message": "upstream down"})),
        );
    }
    match &repo.file {
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))),
        Some((content, sha)) => {
            // GitHub wraps base64 content at 60 columns.
            let encoded = STANDARD.encode(content);
            let wrapped = encoded
                .as_bytes()
                .chunks(60)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect::<Vec<_>>()
                .join("\n");
            (
                StatusCode::OK,
                Json(json!({"content": wrapped, "sha": sha, "encoding": "base64"})),
            )
        }
    }
}

async fn put_contents(
    State(repo): State<Shared>,
    Path((_owner, _name, _path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<PutBody>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
    }
    let mut repo = repo.lock().unwrap();
    let current = repo.file.as_ref().map(|(_, sha)| sha.clone());
    match (&current, &body.sha) {
        (Some(_), None) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"message": "\"sha\" wasn't supplied."})),
            );
        }
        (Some(cur), Some(sent)) if cur != sent => {
            return (
                StatusCode::CONFLICT,
                Json(json!({"message": "does not match"})),
            );
        }
        (None, Some(_)) => {
            return (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})));
        }
        _ => {}
    }

    let decoded = String::from_utf8(STANDARD.decode(&body.content).unwrap()).unwrap();
    repo.commits += 1;
    let sha = format!("sha{}", repo.commits);
    repo.file = Some((decoded, sha.clone()));
    repo.messages.push(body.message);
    repo.branches.push(body.branch);
    (StatusCode::OK, Json(json!({"content": {"sha": sha}})))
}

async fn spawn_github(repo: Shared) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let app = Router::new()
        .route(
            "/repos/{owner}/{repo}/contents/{*path}",
            get(get_contents).put(put_contents),
        )
        .with_state(repo);
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        server.await.expect("mock github failed");
    });
    (addr, shutdown_tx)
}

fn client(addr: SocketAddr, branch: Option<&str>) -> GitHubStore {
    GitHubStore::new(
        &format!("http://{addr}"),
        "acme",
        "licenses",
        branch.map(str::to_string),
        "t0k3n",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn missing_file_reads_as_none() {
    let repo = Shared::default();
    let (addr, _shutdown) = spawn_github(repo.clone()).await;
    let store = client(addr, None);

    assert!(store.fetch("keys.json").await.unwrap().is_none());
    assert_eq!(repo.lock().unwrap().refs, vec![None]);
}

#[tokio::test]
async fn create_then_update_round_trip() {
    let repo = Shared::default();
    let (addr, _shutdown) = spawn_github(repo.clone()).await;
    let store = client(addr, Some("data branch"));

    let first = store
        .replace("keys.json", "[]", None, "Create keys")
        .await
        .unwrap();
    assert_eq!(first, Revision::new("sha1"));

    let long_document = format!("[{}]", "{\"k\":\"v\"},".repeat(40).trim_end_matches(','));
    let second = store
        .replace("keys.json", &long_document, Some(&first), "Add key")
        .await
        .unwrap();
    assert_eq!(second, Revision::new("sha2"));

    let doc = store.fetch("keys.json").await.unwrap().unwrap();
    assert_eq!(doc.content, long_document);
    assert_eq!(doc.revision, second);

    let repo = repo.lock().unwrap();
    assert_eq!(repo.messages, ["Create keys", "Add key"]);
    assert_eq!(repo.refs, vec![Some("data branch".to_string())]);
    assert_eq!(repo.branches[0].as_deref(), Some("data branch"));
}

#[tokio::test]
async fn stale_sha_is_a_conflict() {
    let repo = Shared::default();
    let (addr, _shutdown) = spawn_github(repo.clone()).await;
    let store = client(addr, None);

    let first = store.replace("keys.json", "[]", None, "one").await.unwrap();
    store
        .replace("keys.json", "[1]", Some(&first), "two")
        .await
        .unwrap();

    let err = store
        .replace("keys.json", "[2]", Some(&first), "three")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
}

#[tokio::test]
async fn concurrent_create_is_a_conflict() {
    let repo = Shared::default();
    let (addr, _shutdown) = spawn_github(repo.clone()).await;
    let store = client(addr, None);

    store.replace("keys.json", "[]", None, "first").await.unwrap();
    let err = store
        .replace("keys.json", "[]", None, "second")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
}

#[tokio::test]
async fn server_errors_are_unavailable() {
    let repo = Shared::default();
    repo.lock().unwrap().fail_reads = true;
    let (addr, _shutdown) = spawn_github(repo.clone()).await;

    let err = client(addr, None).fetch("keys.json").await.unwrap_err();
    match err {
        StoreError::Unavailable(message) => {
            assert!(message.contains("502"), "{message}");
            assert!(message.contains("upstream down"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn bad_credentials_are_unavailable() {
    let repo = Shared::default();
    let (addr, _shutdown) = spawn_github(repo).await;
    let store = GitHubStore::new(
        &format!("http://{addr}"),
        "acme",
        "licenses",
        None,
        "wrong",
        Duration::from_secs(5),
    )
    .unwrap();

    let err = store.replace("keys.json", "[]", None, "x").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn unreachable_host_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, None).fetch("keys.json").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}
