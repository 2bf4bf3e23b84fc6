use market_data_pipeline::app::PipelineConfig;
use market_data_pipeline::market::{MarketDataUpdate, OrderBookLevel, OrderBookUpdate};
use market_data_pipeline::pipeline::{MarketDataPipeline, PipelineEvent, StreamKind};
use market_data_pipeline::FEATURE_NAMES;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn config(poll_ms: u64, queue: usize) -> PipelineConfig {
    PipelineConfig {
        poll_interval: Duration::from_millis(poll_ms),
        max_queue_size: queue,
        ..Default::default()
    }
}

fn tick(source: &str, price: f64) -> MarketDataUpdate {
    MarketDataUpdate::new(source, price, 1.0, 0.99)
}

fn book(source: &str, mid: f64) -> OrderBookUpdate {
    OrderBookUpdate::new(
        source,
        vec![
            OrderBookLevel::new(mid - 0.5, 2.0),
            OrderBookLevel::new(mid - 1.0, 3.0),
        ],
        vec![
            OrderBookLevel::new(mid + 0.5, 1.0),
            OrderBookLevel::new(mid + 1.0, 4.0),
        ],
        0.97,
    )
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn test_multi_producer_per_source_fifo() {
    let pipeline = Arc::new(MarketDataPipeline::new(config(10, 100_000)).unwrap());

    // Per source, prices must arrive in the order each producer pushed them.
    let seen: Arc<Mutex<HashMap<String, Vec<f64>>>> = Arc::new(Mutex::new(HashMap::new()));
    let sink = seen.clone();
    pipeline.on_market_data(move |update| {
        sink.lock()
            .entry(update.source.clone())
            .or_default()
            .push(update.price);
    });
    pipeline.start().unwrap();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                let source = format!("feed-{}", p);
                for i in 0..500 {
                    pipeline.push_market_data(tick(&source, 1.0 + i as f64)).unwrap();
                    if i % 5 == 0 {
                        pipeline.push_order_book(book(&source, 100.0 + i as f64)).unwrap();
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        seen.lock().values().map(|v| v.len()).sum::<usize>() == 2_000
    }));
    pipeline.stop();

    let seen = seen.lock();
    assert_eq!(seen.len(), 4);
    for prices in seen.values() {
        assert!(prices.windows(2).all(|w| w[0] < w[1]));
    }

    for p in 0..4 {
        let metrics = pipeline.data_quality_metrics(&format!("feed-{}", p)).unwrap();
        assert_eq!(metrics.valid_data_points, 600);
        assert_eq!(metrics.rejected_data_points, 0);
        assert_eq!(metrics.data_completeness, 100.0);
    }
    assert_eq!(pipeline.metrics().get_accepted(StreamKind::MarketData), 2_000);
    assert_eq!(pipeline.metrics().get_accepted(StreamKind::OrderBook), 400);
}

#[test]
fn test_stop_is_prompt_while_producers_push() {
    let poll = Duration::from_millis(50);
    let pipeline = Arc::new(MarketDataPipeline::new(config(50, 100)).unwrap());
    pipeline.start().unwrap();

    let keep_pushing = Arc::new(AtomicBool::new(true));
    let producers: Vec<_> = (0..3)
        .map(|p| {
            let pipeline = pipeline.clone();
            let keep_pushing = keep_pushing.clone();
            thread::spawn(move || {
                let source = format!("feed-{}", p);
                let mut pushed = 0u64;
                while keep_pushing.load(Ordering::Relaxed) {
                    let _ = pipeline.push_market_data(tick(&source, 100.0));
                    pushed += 1;
                }
                pushed
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    pipeline.stop();
    let elapsed = started.elapsed();

    keep_pushing.store(false, Ordering::Relaxed);
    for producer in producers {
        assert!(producer.join().unwrap() > 0);
    }

    assert!(!pipeline.is_running());
    // One poll interval plus scheduling slack.
    assert!(elapsed < poll * 10, "stop took {:?}", elapsed);
    assert!(pipeline.market_queue_len() <= 100);
}

#[test]
fn test_queue_stays_bounded_without_consumer() {
    let pipeline = MarketDataPipeline::new(config(100, 50)).unwrap();
    let mut events = pipeline.subscribe_events();

    for i in 0..80 {
        pipeline.push_market_data(tick("Binance", 1.0 + i as f64)).unwrap();
    }
    assert_eq!(pipeline.market_queue_len(), 50);
    assert_eq!(pipeline.metrics().get_evictions(StreamKind::MarketData), 30);

    let mut overflows = 0;
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::QueueOverflow { stream, capacity } = event {
            assert_eq!(stream, StreamKind::MarketData);
            assert_eq!(capacity, 50);
            overflows += 1;
        }
    }
    assert_eq!(overflows, 30);

    let first = Arc::new(Mutex::new(None));
    let sink = first.clone();
    pipeline.on_market_data(move |update| {
        sink.lock().get_or_insert(update.price);
    });
    pipeline.process_pending();
    // Items 1..=30 were evicted.
    assert_eq!(*first.lock(), Some(31.0));
}

#[test]
fn test_callback_panic_does_not_stop_consumer() {
    let pipeline = MarketDataPipeline::new(config(10, 1000)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    pipeline.on_order_book(move |update| {
        counter.fetch_add(1, Ordering::SeqCst);
        if update.book.bids[0].price < 100.0 {
            panic!("cannot handle cheap books");
        }
    });
    pipeline.start().unwrap();

    pipeline.push_order_book(book("Coinbase", 50.0)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 1));

    pipeline.push_order_book(book("Coinbase", 200.0)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 2));

    assert!(pipeline.is_running());
    assert_eq!(pipeline.metrics().get_callback_faults(StreamKind::OrderBook), 1);
    assert_eq!(
        pipeline.latest_order_book().unwrap().book.best_bid(),
        Some(199.5)
    );
    pipeline.stop();
}

#[test]
fn test_stop_from_inside_callback() {
    let pipeline = Arc::new(MarketDataPipeline::new(config(10, 1000)).unwrap());
    let handle = Arc::downgrade(&pipeline);
    pipeline.on_market_data(move |_| {
        if let Some(pipeline) = handle.upgrade() {
            pipeline.stop();
        }
    });
    pipeline.start().unwrap();
    pipeline.push_market_data(tick("Binance", 10.0)).unwrap();

    assert!(wait_until(Duration::from_secs(2), || !pipeline.is_running()));
    pipeline.stop();
}

#[test]
fn test_restart_after_stop_from_callback_keeps_one_consumer() {
    let pipeline = Arc::new(MarketDataPipeline::new(config(10, 10_000)).unwrap());
    let restarted = Arc::new(AtomicBool::new(false));
    let consumers = Arc::new(Mutex::new(HashSet::new()));
    let delivered = Arc::new(AtomicUsize::new(0));

    let handle = Arc::downgrade(&pipeline);
    let (phase, seen, count) = (restarted.clone(), consumers.clone(), delivered.clone());
    pipeline.on_market_data(move |_| {
        if phase.load(Ordering::SeqCst) {
            seen.lock().insert(thread::current().id());
            count.fetch_add(1, Ordering::SeqCst);
        } else if let Some(pipeline) = handle.upgrade() {
            pipeline.stop();
        }
    });

    pipeline.start().unwrap();
    pipeline.push_market_data(tick("Binance", 10.0)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !pipeline.is_running()));

    // Restart right away, while the first consumer may still be unwinding its pass.
    restarted.store(true, Ordering::SeqCst);
    pipeline.start().unwrap();
    for i in 0..200 {
        pipeline
            .push_market_data(tick("Binance", 100.0 + i as f64))
            .unwrap();
        if i % 20 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    assert!(wait_until(Duration::from_secs(5), || {
        delivered.load(Ordering::SeqCst) == 200
    }));
    pipeline.stop();

    assert_eq!(consumers.lock().len(), 1, "more than one consumer published");
    assert_eq!(delivered.load(Ordering::SeqCst), 200);
}

#[test]
fn test_concurrent_start_and_stop_never_hang() {
    let pipeline = Arc::new(MarketDataPipeline::new(config(10, 1000)).unwrap());

    for round in 0..300 {
        pipeline.start().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let stopper = {
            let (pipeline, barrier) = (pipeline.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                pipeline.stop();
            })
        };
        let starter = {
            let (pipeline, barrier) = (pipeline.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                pipeline.start().unwrap();
            })
        };

        starter.join().unwrap();
        assert!(
            wait_until(Duration::from_secs(2), || stopper.is_finished()),
            "stop() did not return in round {}",
            round
        );
        stopper.join().unwrap();

        pipeline.stop();
        assert!(!pipeline.is_running());
    }
}

#[test]
fn test_feature_vector_layout() {
    let pipeline = MarketDataPipeline::new(config(10, 1000)).unwrap();
    pipeline.start().unwrap();

    pipeline.push_market_data(tick("Binance", 100.0)).unwrap();
    pipeline.push_order_book(book("Binance", 100.0)).unwrap();
    pipeline.push_sentiment_data("News", 0.6).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        pipeline.latest_order_book().is_some() && pipeline.latest_market_data().is_some()
    }));
    // Features are published after the whole batch.
    assert!(wait_until(Duration::from_secs(2), || {
        let snapshot = pipeline.snapshot();
        snapshot.feature("SPREAD") == Some(1.0)
            && snapshot.feature("SENTIMENT_NEWS").unwrap_or_default() > 0.5
    }));
    pipeline.stop();

    let features = pipeline.latest_features();
    assert_eq!(features.len(), FEATURE_NAMES.len());

    let snapshot = pipeline.snapshot();
    let names: Vec<&str> = snapshot.features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, FEATURE_NAMES);
    assert!((snapshot.feature("SENTIMENT_NEWS").unwrap() - 0.6).abs() < 1e-3);
    assert!((snapshot.feature("SENTIMENT_AGGREGATE").unwrap() - 0.24).abs() < 1e-3);
    assert_eq!(snapshot.feature("RSI"), Some(100.0));
}

#[test]
fn test_concurrent_sentiment_producers() {
    let pipeline = Arc::new(MarketDataPipeline::new(config(10, 1000)).unwrap());
    let callbacks = Arc::new(AtomicUsize::new(0));
    let counter = callbacks.clone();
    pipeline.on_sentiment(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let producers: Vec<_> = ["Twitter", "Reddit", "News"]
        .into_iter()
        .map(|source| {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    let score = (i as f64 / 100.0) * 2.0 - 1.0;
                    pipeline.push_sentiment(source, "tick", score, 0.9).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(callbacks.load(Ordering::SeqCst), 300);
    assert_eq!(pipeline.recent_sentiments(1_000).len(), 300);
    assert!((pipeline.latest_sentiment("Reddit").unwrap() - 0.98).abs() < 1e-9);
}

#[test]
#[ignore] // Run with: cargo test --release -- --ignored --nocapture
fn stress_test_sustained_throughput() {
    let pipeline = Arc::new(MarketDataPipeline::new(config(5, 10_000)).unwrap());
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    pipeline.on_market_data(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    pipeline.start().unwrap();

    let per_producer = 50_000;
    let started = Instant::now();
    let producers: Vec<_> = (0..8)
        .map(|p| {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                let source = format!("feed-{}", p);
                let mut latencies = Vec::with_capacity(per_producer);
                for i in 0..per_producer {
                    let push_start = Instant::now();
                    let _ = pipeline.push_market_data(tick(&source, 1.0 + i as f64));
                    latencies.push(push_start.elapsed());
                }
                latencies
            })
        })
        .collect();

    let mut latencies: Vec<Duration> = producers
        .into_iter()
        .flat_map(|p| p.join().unwrap())
        .collect();
    let push_duration = started.elapsed();

    wait_until(Duration::from_secs(10), || pipeline.market_queue_len() == 0);
    pipeline.stop();

    latencies.sort();
    let total = latencies.len();
    let p50 = latencies[total / 2].as_micros();
    let p99 = latencies[(total as f64 * 0.99) as usize].as_micros();
    let evicted = pipeline.metrics().get_evictions(StreamKind::MarketData);

    println!("\n📊 PIPELINE THROUGHPUT:");
    println!("   • Samples pushed:       {}", total);
    println!("   • Push duration:        {:?}", push_duration);
    println!("   • Samples/sec:          {:.0}", total as f64 / push_duration.as_secs_f64());
    println!("   • Delivered:            {}", delivered.load(Ordering::Relaxed));
    println!("   • Evicted:              {}", evicted);
    println!("   • Push P50:             {}μs", p50);
    println!("   • Push P99:             {}μs", p99);

    assert_eq!(
        delivered.load(Ordering::Relaxed) as u64 + evicted,
        total as u64
    );
    assert!(p99 < 10_000, "push P99 {}μs", p99);
}
