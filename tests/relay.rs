//! End-to-end tests against a relay bound on localhost

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async, connect_async, MaybeTlsStream, WebSocketStream};

use broadcast_relay::{tls, RegistryHandle, RelayConfig, RelayServer, ServerMessage};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

/// Start a relay and return its address and Registry handle
async fn start_with(config: RelayConfig) -> (String, RegistryHandle) {
    let server = RelayServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry().clone();
    tokio::spawn(server.run());
    (addr.to_string(), registry)
}

/// Start a relay with default settings on a free port
async fn start() -> String {
    start_with(RelayConfig::default().bind("127.0.0.1", 0)).await.0
}

async fn connect_at(addr: &str, path: &str) -> tokio_tungstenite::tungstenite::Result<Client> {
    let (client, _) = timeout(STEP, connect_async(format!("ws://{}{}", addr, path)))
        .await
        .expect("connect timed out")?;
    Ok(client)
}

async fn connect(addr: &str) -> Client {
    connect_at(addr, "/ws").await.unwrap()
}

async fn recv<S>(client: &mut WebSocketStream<S>) -> ServerMessage
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = timeout(STEP, client.next())
            .await
            .expect("receive timed out")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(client: &mut Client, json: &str) {
    client.send(Message::Text(json.to_string())).await.unwrap();
}

fn user_list(names: &[&str]) -> ServerMessage {
    ServerMessage::UserList {
        users: names.iter().map(|s| s.to_string()).collect(),
    }
}

fn username(name: &str) -> ServerMessage {
    ServerMessage::Username {
        username: name.to_string(),
    }
}

#[tokio::test]
async fn test_join_chat_and_leave() {
    let addr = start().await;

    let mut a = connect(&addr).await;
    assert_eq!(recv(&mut a).await, user_list(&["Luffy"]));
    assert_eq!(recv(&mut a).await, username("Luffy"));

    let mut b = connect(&addr).await;
    assert_eq!(recv(&mut b).await, user_list(&["Luffy", "Zoro"]));
    assert_eq!(recv(&mut b).await, username("Zoro"));
    assert_eq!(recv(&mut a).await, user_list(&["Luffy", "Zoro"]));

    send(&mut b, r#"{"type":"message","text":"hi there"}"#).await;
    let expected = ServerMessage::Message {
        user: "Zoro".to_string(),
        text: "hi there".to_string(),
    };
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);

    b.close(None).await.unwrap();
    assert_eq!(recv(&mut a).await, user_list(&["Luffy"]));

    // Zoro is back in the pool behind the unused names.
    let mut c = connect(&addr).await;
    assert_eq!(recv(&mut c).await, user_list(&["Luffy", "Nami"]));
    assert_eq!(recv(&mut c).await, username("Nami"));
}

#[tokio::test]
async fn test_ping_and_user_list_requests() {
    let addr = start().await;
    let mut a = connect(&addr).await;
    recv(&mut a).await;
    recv(&mut a).await;

    send(&mut a, r#"{"type":"ping"}"#).await;
    assert_eq!(recv(&mut a).await, ServerMessage::Pong);

    send(&mut a, r#"{"type":"requestUserList"}"#).await;
    assert_eq!(recv(&mut a).await, user_list(&["Luffy"]));
}

#[tokio::test]
async fn test_bad_frames_keep_session_open() {
    let addr = start().await;
    let mut a = connect(&addr).await;
    recv(&mut a).await;
    recv(&mut a).await;

    send(&mut a, "definitely not json").await;
    send(&mut a, r#"{"type":"typing"}"#).await;
    a.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    send(&mut a, r#"{"type":"ping"}"#).await;

    assert_eq!(recv(&mut a).await, ServerMessage::Pong);
}

#[tokio::test]
async fn test_wrong_path_rejected() {
    let addr = start().await;

    assert!(connect_at(&addr, "/elsewhere").await.is_err());
}

#[tokio::test]
async fn test_custom_endpoint_path() {
    let config = RelayConfig::default()
        .bind("127.0.0.1", 0)
        .path("/chat")
        .mailbox_capacity(8);
    let (addr, registry) = start_with(config).await;

    assert!(connect_at(&addr, "/ws").await.is_err());

    let mut a = connect_at(&addr, "/chat").await.unwrap();
    assert_eq!(recv(&mut a).await, user_list(&["Luffy"]));
    assert_eq!(recv(&mut a).await, username("Luffy"));
    assert_eq!(registry.roster_snapshot().await.unwrap(), vec!["Luffy"]);
}

#[tokio::test]
async fn test_join_over_tls() {
    tls::install_crypto_provider();

    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = certified.cert.pem();
    let dir: PathBuf =
        std::env::temp_dir().join(format!("broadcast_relay-relay-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, &cert_pem).unwrap();
    std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();

    let config = RelayConfig::default()
        .bind("127.0.0.1", 0)
        .tls(cert_path, key_path);
    let (addr, _) = start_with(config).await;
    let _ = std::fs::remove_dir_all(&dir);

    // Client trusts only the relay's self-signed certificate
    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from_pem_slice(cert_pem.as_bytes()).unwrap())
        .unwrap();
    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(client_config));

    let tcp = TcpStream::connect(&addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let stream = timeout(STEP, connector.connect(server_name, tcp))
        .await
        .expect("TLS handshake timed out")
        .unwrap();
    let (mut client, _) = timeout(STEP, client_async("wss://localhost/ws", stream))
        .await
        .expect("WebSocket handshake timed out")
        .unwrap();

    assert_eq!(recv(&mut client).await, user_list(&["Luffy"]));
    assert_eq!(recv(&mut client).await, username("Luffy"));
}
