//! Connection acceptance and per-connection serving.
//!
//! # Responsibilities
//! - Accept TCP connections until asked to stop
//! - Serve each connection on its own task (HTTP/1.1 or HTTP/2)
//! - Bound how long a client may take to send its request headers
//! - On stop, close idle connections and let busy ones finish
//!
//! # Design Decisions
//! - Connection tasks live in a `JoinSet` owned by the accept loop, so
//!   aborting the loop aborts every connection with it
//! - Transient accept errors are skipped; resource exhaustion backs off;
//!   anything else ends the loop and is reported as a serve failure

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Time a client has to send a complete request head.
pub const READ_HEADER_TIMEOUT: Duration = Duration::from_secs(15);

/// Pause after an accept error caused by resource exhaustion.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Accept and serve connections on `listener` until `stop` is canceled,
/// then wait for open connections to finish.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    read_header_timeout: Duration,
    stop: CancellationToken,
) -> io::Result<()> {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(read_header_timeout);

    let mut connections = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            Some(_) = connections.join_next() => continue,
            _ = stop.cancelled() => break,
        };

        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(err) if is_connection_error(&err) => continue,
            Err(err) if is_resource_exhaustion(&err) => {
                tracing::error!(error = %err, "Accept failed, backing off");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
            Err(err) => return Err(err),
        };

        connections.spawn(serve_connection(
            builder.clone(),
            stream,
            peer,
            router.clone(),
            stop.clone(),
        ));
    }

    drop(listener);
    tracing::debug!(open = connections.len(), "Listener closed, draining connections");

    while let Some(joined) = connections.join_next().await {
        if let Err(err) = joined {
            tracing::warn!(error = %err, "Connection task ended abnormally");
        }
    }
    Ok(())
}

async fn serve_connection(
    builder: Builder<TokioExecutor>,
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    stop: CancellationToken,
) {
    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        tracing::debug!(peer_addr = %peer, error = %err, "Connection closed with error");
    }
}

fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

#[cfg(unix)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOBUFS) | Some(libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_err: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn peer(ConnectInfo(addr): ConnectInfo<SocketAddr>) -> String {
        addr.ip().to_string()
    }

    async fn spawn_serve(
        router: Router,
        header_timeout: Duration,
    ) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<io::Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = CancellationToken::new();
        let task = tokio::spawn(serve(listener, router, header_timeout, stop.clone()));
        (addr, stop, task)
    }

    async fn read_until_closed(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        // A reset is as good as a close here.
        let _ = stream.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn handlers_see_peer_address() {
        let router = Router::new().route("/peer", get(peer));
        let (addr, stop, task) = spawn_serve(router, READ_HEADER_TIMEOUT).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /peer HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let response = read_until_closed(&mut stream).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("127.0.0.1"), "{response}");

        stop.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stalled_request_head_is_dropped() {
        let (addr, stop, task) = spawn_serve(Router::new(), Duration::from_millis(200)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /healthz HTTP/1.1\r\nHost: x\r\n").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), read_until_closed(&mut stream))
            .await
            .expect("server should close a connection stuck in its request head");

        stop.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stop_closes_idle_connections() {
        let (addr, stop, task) = spawn_serve(Router::new(), READ_HEADER_TIMEOUT).await;

        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("idle connection should not hold up the drain")
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn classifies_accept_errors() {
        assert!(is_connection_error(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_resource_exhaustion(&io::Error::from_raw_os_error(libc::EMFILE)));
        assert!(!is_resource_exhaustion(&io::Error::from_raw_os_error(libc::EBADF)));
    }
}
