//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use rcgen::{generate_simple_self_signed, CertifiedKey};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;

use cgi_gateway::config::{
    GatewayConfig, ListenAddress, QueryStringMode, ServingMode, Timeouts, TlsListenerConfig,
};
use cgi_gateway::fastcgi::codec::RecordCodec;
use cgi_gateway::fastcgi::record::{self, protocol_status, EndRequest, RecordType};
use cgi_gateway::fastcgi::BackendAddress;
use cgi_gateway::net::listener;
use cgi_gateway::{GatewayServer, Shutdown};

pub const CONTROLLER: &str = "/srv/app/index.php";

/// What the mock FastCGI application received.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub params: BTreeMap<String, String>,
    pub stdin: Vec<u8>,
}

/// Start a FastCGI responder on an ephemeral port. `respond` returns the raw
/// CGI output (header block, blank line, body) for each request.
pub async fn start_fastcgi_backend<F>(respond: F) -> SocketAddr
where
    F: Fn(ReceivedRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let respond = respond.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut records = FramedRead::new(read, RecordCodec);
                let mut params = Vec::new();
                let mut stdin = Vec::new();
                let mut request_id = 1;

                while let Some(Ok(record)) = records.next().await {
                    request_id = record.request_id;
                    match record.kind {
                        RecordType::Params => params.extend_from_slice(&record.content),
                        RecordType::Stdin if record.content.is_empty() => break,
                        RecordType::Stdin => stdin.extend_from_slice(&record.content),
                        _ => {}
                    }
                }

                let params = record::decode_params(&params)
                    .unwrap()
                    .into_iter()
                    .map(|(k, v)| {
                        (
                            String::from_utf8_lossy(&k).into_owned(),
                            String::from_utf8_lossy(&v).into_owned(),
                        )
                    })
                    .collect();
                let output = respond(ReceivedRequest { params, stdin });

                let mut out = BytesMut::new();
                // Small records so header blocks span several of them.
                for chunk in output.chunks(7) {
                    record::encode_record(&mut out, RecordType::Stdout, request_id, chunk);
                }
                record::encode_record(&mut out, RecordType::Stdout, request_id, &[]);
                record::encode_end_request(
                    &mut out,
                    request_id,
                    EndRequest {
                        app_status: 0,
                        protocol_status: protocol_status::REQUEST_COMPLETE,
                    },
                );
                let _ = write.write_all(&out).await;
                let _ = write.shutdown().await;
            });
        }
    });

    addr
}

/// Echo the received environment as `NAME=value` lines and the body after
/// a `--` separator.
pub fn echo_environment(request: ReceivedRequest) -> Vec<u8> {
    let mut out = b"Content-Type: text/plain\r\n\r\n".to_vec();
    for (name, value) in &request.params {
        out.extend_from_slice(format!("{name}={value}\n").as_bytes());
    }
    out.extend_from_slice(b"--\n");
    out.extend_from_slice(&request.stdin);
    out
}

/// Parse the output of [`echo_environment`].
pub fn parse_echo(text: &str) -> (BTreeMap<String, String>, String) {
    let (env, body) = text.split_once("--\n").unwrap();
    let env = env
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (env, body.to_string())
}

pub fn proxy_config(backend: SocketAddr) -> GatewayConfig {
    GatewayConfig {
        mode: ServingMode::Proxy {
            backend: BackendAddress::new("tcp", &backend.to_string()).unwrap(),
            controller: PathBuf::from(CONTROLLER),
        },
        http: ListenAddress::parse("127.0.0.1:8080").unwrap(),
        https: None,
        query_string: QueryStringMode::Raw,
        timeouts: Timeouts::default(),
    }
}

pub fn static_config(root: PathBuf) -> GatewayConfig {
    GatewayConfig {
        mode: ServingMode::Static { root },
        http: ListenAddress::parse("127.0.0.1:8080").unwrap(),
        https: None,
        query_string: QueryStringMode::Raw,
        timeouts: Timeouts::default(),
    }
}

/// Serve `config` on an ephemeral plain listener.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let router = GatewayServer::new(&config).router(false);

    tokio::spawn(listener::serve(listener, router, shutdown.subscribe()));

    (addr, shutdown)
}

/// Write a self-signed `localhost` certificate and key into a scratch
/// directory and return their paths.
pub fn self_signed_certificate(label: &str) -> (PathBuf, PathBuf) {
    let CertifiedKey { cert, signing_key } =
        generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let dir = std::env::temp_dir().join(format!("cgi-gateway-{label}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, signing_key.serialize_pem()).unwrap();

    (cert_path, key_path)
}

/// A loopback port nothing is listening on right now.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Add an HTTPS listener on a free loopback port to `config`.
pub async fn with_tls(mut config: GatewayConfig, cert: PathBuf, key: PathBuf) -> GatewayConfig {
    let port = free_port().await;
    config.https = Some(TlsListenerConfig {
        address: ListenAddress::parse(&format!("127.0.0.1:{port}")).unwrap(),
        cert,
        key,
    });
    config
}

/// Serve `config` on its HTTPS listener and wait until it accepts
/// connections.
pub async fn start_tls_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let tls = config.https.clone().unwrap();
    let addr: SocketAddr = tls.address.as_str().parse().unwrap();
    let shutdown = Shutdown::new();
    let router = GatewayServer::new(&config).router(true);

    tokio::spawn(listener::serve_tls(tls, router, shutdown.subscribe()));

    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return (addr, shutdown);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("HTTPS listener on {addr} never came up");
}

/// HTTPS client that trusts any certificate.
pub fn tls_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .build()
        .unwrap()
}

/// HTTP client that neither pools connections nor follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
