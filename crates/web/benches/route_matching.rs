use std::hint::black_box;

use cex_web::output::BufferedOutput;
use cex_web::route::{self, MatchMode, handler_fn};
use cex_web::{Dispatcher, Request, Response};
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use http::{StatusCode, Version};

const CHAIN_LENGTHS: [usize; 3] = [1, 16, 256];

fn dispatcher(mode: MatchMode, misses: usize) -> Dispatcher {
    let mut builder = Dispatcher::builder();
    for i in 0..misses {
        let path = match mode {
            MatchMode::Regex => format!("^/miss/{i}/[a-z]+$"),
            _ => format!("/miss/{i}/"),
        };
        builder = builder.route(
            path,
            route::get(handler_fn(|_, res, _| res.end(StatusCode::NOT_FOUND))).match_mode(mode),
        );
    }
    builder
        .route_all(route::get(handler_fn(|_, res, _| res.send(StatusCode::OK, "hit"))))
        .auto_compress(false)
        .build()
}

fn request() -> Request {
    Request::from(http::Request::get("/api/v1/users/42?expand=groups").body(()).expect("static request should be valid"))
}

fn benchmark_route_matching(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("route_matching");

    for (name, mode) in [("contains", MatchMode::Contains), ("exact", MatchMode::Exact), ("regex", MatchMode::Regex)] {
        for misses in CHAIN_LENGTHS {
            let dispatcher = dispatcher(mode, misses);
            group.bench_with_input(BenchmarkId::new(name, misses), &dispatcher, |b, dispatcher| {
                b.iter_batched(
                    || (request(), Response::new(Box::new(BufferedOutput::new()), Version::HTTP_11)),
                    |(mut req, mut res)| {
                        dispatcher.dispatch(&mut req, &mut res);
                        black_box(res.is_done())
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(routes, benchmark_route_matching);
criterion_main!(routes);
