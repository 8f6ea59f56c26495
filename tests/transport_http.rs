use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use tiny_http::{Response, Server};

use mpulog::transport::{Endpoint, Fetch, HttpTransport, SkipReason, Transport};

// Serves exactly one request with the given status/body and hands back the requested URL.
fn serve_once(status: u16, body: &'static str) -> (Endpoint, JoinHandle<String>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let handle = thread::spawn(move || {
        let req = server.recv().unwrap();
        let url = req.url().to_string();
        let _ = req.respond(Response::from_string(body).with_status_code(status));
        url
    });
    (Endpoint::new("127.0.0.1", port), handle)
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn fetch_returns_trimmed_body_on_200() {
    let (endpoint, server) = serve_once(200, "  {\"roll\":1.0}\r\n");
    let transport = HttpTransport::new(endpoint);

    assert_eq!(
        transport.fetch_reading(),
        Fetch::Reading("{\"roll\":1.0}".to_string())
    );
    assert_eq!(server.join().unwrap(), "/data");
}

#[test]
fn fetch_skips_non_200() {
    let (endpoint, server) = serve_once(503, "busy");
    let transport = HttpTransport::new(endpoint);

    assert_eq!(
        transport.fetch_reading(),
        Fetch::Skipped(SkipReason::Status(503))
    );
    server.join().unwrap();
}

#[test]
fn fetch_skips_success_codes_other_than_200() {
    let (endpoint, server) = serve_once(202, "{\"roll\":1.0}");
    let transport = HttpTransport::new(endpoint);

    assert_eq!(
        transport.fetch_reading(),
        Fetch::Skipped(SkipReason::Status(202))
    );
    server.join().unwrap();
}

#[test]
fn fetch_skips_blank_body() {
    let (endpoint, server) = serve_once(200, " \n ");
    let transport = HttpTransport::new(endpoint);

    assert_eq!(
        transport.fetch_reading(),
        Fetch::Skipped(SkipReason::EmptyBody)
    );
    server.join().unwrap();
}

#[test]
fn fetch_survives_connection_refused() {
    let transport = HttpTransport::new(Endpoint::new("127.0.0.1", closed_port()));

    match transport.fetch_reading() {
        Fetch::Skipped(SkipReason::Network(_)) => {}
        other => panic!("expected network skip, got {other:?}"),
    }
}

#[test]
fn reset_acknowledged() {
    let (endpoint, server) = serve_once(200, "LOG_DELETED");
    let transport = HttpTransport::new(endpoint);

    assert!(transport.reset_remote());
    assert_eq!(server.join().unwrap(), "/delete_log");
}

#[test]
fn reset_without_token_is_not_acknowledged() {
    let (endpoint, server) = serve_once(200, "OK");
    let transport = HttpTransport::new(endpoint);

    assert!(!transport.reset_remote());
    server.join().unwrap();
}

#[test]
fn reset_with_token_but_error_status_is_not_acknowledged() {
    let (endpoint, server) = serve_once(500, "LOG_DELETED");
    let transport = HttpTransport::new(endpoint);

    assert!(!transport.reset_remote());
    server.join().unwrap();
}

#[test]
fn reset_survives_connection_refused() {
    let transport = HttpTransport::new(Endpoint::new("127.0.0.1", closed_port()));
    assert!(!transport.reset_remote());
}
