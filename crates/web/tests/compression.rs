mod common;

use std::io::{Cursor, Read};

use cex_web::route::{self, handler_fn};
use cex_web::{Dispatcher, IO_BUFFER_SIZE};
use flate2::read::{GzDecoder, ZlibDecoder};
use http::StatusCode;

use common::{request, send_raw, start};

fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn server() -> cex_web::ServerHandle {
    start(
        Dispatcher::builder()
            .route(
                "/buffered/",
                route::get(handler_fn(|req, res, _| {
                    let len = req.file().parse().unwrap_or(0);
                    res.send(StatusCode::OK, data(len));
                })),
            )
            .route(
                "/streamed/",
                route::get(handler_fn(|req, res, _| {
                    let len = req.file().parse().unwrap_or(0);
                    let _ = res.stream(StatusCode::OK, Cursor::new(data(len)));
                })),
            )
            .build(),
    )
}

fn gunzip(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out).unwrap();
    out
}

#[test]
fn gzip_round_trip_for_buffered_bodies() {
    let server = server();

    for len in [1, IO_BUFFER_SIZE + 1] {
        let res = request(server.local_addr(), "GET", &format!("/buffered/{len}"), &[("Accept-Encoding", "gzip")]);
        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-encoding"), Some("gzip"));
        assert_eq!(gunzip(&res.body), data(len), "len {len}");
    }

    let res = request(server.local_addr(), "GET", "/buffered/0", &[("Accept-Encoding", "gzip")]);
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-encoding"), None);
    assert!(res.body.is_empty());
}

#[test]
fn gzip_round_trip_for_streamed_bodies() {
    let server = server();

    for len in [1, IO_BUFFER_SIZE * 2 + 7] {
        let res = request(server.local_addr(), "GET", &format!("/streamed/{len}"), &[("Accept-Encoding", "gzip")]);
        assert_eq!(res.status, 200);
        assert_eq!(res.header("transfer-encoding"), Some("chunked"));
        assert_eq!(res.header("content-encoding"), Some("gzip"));
        assert_eq!(gunzip(&res.body), data(len), "len {len}");
    }

    let res = request(server.local_addr(), "GET", "/streamed/0", &[("Accept-Encoding", "gzip")]);
    assert_eq!(res.status, 200);
    assert!(res.body.is_empty());
}

#[test]
fn deflate_when_gzip_is_not_accepted() {
    let server = server();

    let res = request(server.local_addr(), "GET", "/buffered/5000", &[("Accept-Encoding", "deflate")]);
    assert_eq!(res.header("content-encoding"), Some("deflate"));

    let mut out = Vec::new();
    ZlibDecoder::new(&res.body[..]).read_to_end(&mut out).unwrap();
    assert_eq!(out, data(5000));
}

#[test]
fn identity_without_accept_encoding() {
    let server = server();

    let res = request(server.local_addr(), "GET", "/streamed/70000", &[]);
    assert_eq!(res.header("content-encoding"), None);
    assert_eq!(res.body, data(70000));
}

#[test]
fn http10_streams_are_close_delimited() {
    let server = server();
    let len = IO_BUFFER_SIZE + 5;

    let res = send_raw(server.local_addr(), format!("GET /streamed/{len} HTTP/1.0\r\n\r\n").as_bytes());
    assert_eq!(res.status, 200);
    assert_eq!(res.header("transfer-encoding"), None);
    assert_eq!(res.header("content-length"), None);
    assert_eq!(res.header("connection"), Some("close"));
    assert_eq!(res.body, data(len));

    let res = send_raw(
        server.local_addr(),
        format!("GET /streamed/{len} HTTP/1.0\r\nConnection: keep-alive\r\nAccept-Encoding: gzip\r\n\r\n").as_bytes(),
    );
    assert_eq!(res.header("transfer-encoding"), None);
    assert_eq!(res.header("content-encoding"), Some("gzip"));
    assert_eq!(gunzip(&res.body), data(len));
}
