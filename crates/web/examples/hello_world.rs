use cex_web::middleware::{SecurityOptions, SessionOptions, security_headers, session_handler};
use cex_web::route::{self, handler_fn};
use cex_web::{Dispatcher, Server, ServerConfig};
use http::StatusCode;

#[tokio::main]
async fn main() {
    let dispatcher = Dispatcher::builder()
        .route_all(route::middleware(security_headers(SecurityOptions::default())))
        .route_all(route::middleware(session_handler(SessionOptions::default())))
        .route(
            "^/$",
            route::get(handler_fn(|req, res, _| {
                let session = req.properties().get_str("sessionId").unwrap_or_default();
                res.set("content-type", "text/plain; charset=utf-8");
                res.send(StatusCode::OK, format!("hello world, session {session}\n"));
            }))
            .regex(),
        )
        .route_all(route::middleware(handler_fn(|_, res, _| res.send(StatusCode::NOT_FOUND, "404 not found\n"))))
        .build();

    Server::builder()
        .dispatcher(dispatcher)
        .config(ServerConfig { port: 3000, ..ServerConfig::default() })
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();
}
