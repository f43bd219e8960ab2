use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;
use tweetwatch_core::rate_limit::{RateLimiter, Tier};

fn bench_try_consume(c: &mut Criterion) {
    c.bench_function("try_consume/single_thread", |b| {
        let limiter = RateLimiter::new(Tier::Pro);
        b.iter(|| limiter.try_consume(black_box(1)))
    });

    c.bench_function("try_consume/4_threads", |b| {
        b.iter(|| {
            let limiter = Arc::new(RateLimiter::new(Tier::Pro));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    thread::spawn(move || {
                        let mut granted = 0u32;
                        for _ in 0..100 {
                            if limiter.try_consume(1).accepted {
                                granted += 1;
                            }
                        }
                        granted
                    })
                })
                .collect();
            let granted: u32 = handles.into_iter().filter_map(|h| h.join().ok()).sum();
            black_box(granted)
        })
    });
}

fn bench_status(c: &mut Criterion) {
    let limiter = RateLimiter::new(Tier::Basic);
    limiter.try_consume(10);
    c.bench_function("status", |b| b.iter(|| black_box(limiter.status())));
}

criterion_group!(benches, bench_try_consume, bench_status);
criterion_main!(benches);
