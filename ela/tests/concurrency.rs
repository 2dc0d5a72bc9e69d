//! Admission bound, timeout isolation and cross-request determinism.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::generators::{encode_png, gen_noise_rgb};
use ela::{AnalysisResult, ErrorKind};
use image::ExtendedColorType;

fn uploads(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let (w, h) = (24 + i * 3, 16 + i * 2);
            encode_png(&gen_noise_rgb(w, h, i as u64), w, h, ExtendedColorType::Rgb8)
        })
        .collect()
}

fn fingerprint(result: &AnalysisResult) -> (Vec<u8>, u64) {
    (result.artifact.bytes.clone(), result.anomaly_score.to_bits())
}

#[test]
fn n_plus_one_simultaneous_admissions_reject_at_least_one() {
    const N: usize = 3;
    let analyzer = common::analyzer(N);
    let barrier = Arc::new(Barrier::new(N + 1));

    let handles: Vec<_> = (0..=N)
        .map(|i| {
            let analyzer = analyzer.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let admission = analyzer.admit(Some(format!("r{i}")));
                // Hold the slot until every thread has tried.
                barrier.wait();
                admission.map(drop).map_err(|e| e.kind)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let rejected = outcomes
        .iter()
        .filter(|o| **o == Err(ErrorKind::Capacity))
        .count();
    assert_eq!(rejected, 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), N);
    assert_eq!(analyzer.peak_in_flight(), N);
    assert_eq!(analyzer.in_flight(), 0);
}

#[test]
fn peak_never_exceeds_bound_under_load() {
    common::init_tracing();
    const N: usize = 2;
    let analyzer = common::analyzer(N);
    let inputs = Arc::new(uploads(4));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let analyzer = analyzer.clone();
            let inputs = Arc::clone(&inputs);
            thread::spawn(move || {
                let mut capacity_errors = 0;
                for round in 0..3 {
                    match analyzer.analyze(&inputs[(t + round) % inputs.len()], None) {
                        Ok(result) => assert!((0.0..=1.0).contains(&result.anomaly_score)),
                        Err(err) => {
                            assert_eq!(err.kind, ErrorKind::Capacity, "{err}");
                            assert!(err.kind.is_retryable());
                            capacity_errors += 1;
                        }
                    }
                }
                capacity_errors
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(analyzer.peak_in_flight() <= N);
    assert!(analyzer.peak_in_flight() >= 1);
    assert_eq!(analyzer.in_flight(), 0);
}

#[test]
fn concurrent_results_match_sequential_results() {
    let inputs = uploads(6);
    let sequential: Vec<_> = {
        let analyzer = common::analyzer(1);
        inputs
            .iter()
            .map(|bytes| fingerprint(&analyzer.analyze(bytes, None).unwrap()))
            .collect()
    };

    let analyzer = common::analyzer(inputs.len());
    let barrier = Arc::new(Barrier::new(inputs.len()));
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|bytes| {
            let analyzer = analyzer.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fingerprint(&analyzer.analyze(&bytes, None).unwrap())
            })
        })
        .collect();

    let concurrent: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(concurrent, sequential);
}

#[test]
fn timed_out_request_does_not_disturb_others() {
    let inputs = uploads(4);
    let expected: Vec<_> = {
        let analyzer = common::analyzer(1);
        inputs
            .iter()
            .map(|bytes| fingerprint(&analyzer.analyze(bytes, None).unwrap()))
            .collect()
    };

    let analyzer = common::analyzer(inputs.len() + 1);
    let doomed = {
        let analyzer = analyzer.clone();
        let bytes = inputs[0].clone();
        thread::spawn(move || {
            analyzer
                .admit(Some("doomed".into()))
                .unwrap()
                .with_timeout(Duration::ZERO)
                .run(&bytes)
        })
    };
    let others: Vec<_> = inputs
        .into_iter()
        .map(|bytes| {
            let analyzer = analyzer.clone();
            thread::spawn(move || fingerprint(&analyzer.analyze(&bytes, None).unwrap()))
        })
        .collect();

    let err = doomed.join().unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.request_id, "doomed");
    assert_eq!(err.kind.status_code(), 504);

    let results: Vec<_> = others.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, expected);
    assert_eq!(analyzer.in_flight(), 0);
}

#[test]
fn deadline_expiring_mid_pipeline_is_a_timeout() {
    let (w, h) = (1500, 1500);
    let upload = encode_png(&gen_noise_rgb(w, h, 99), w, h, ExtendedColorType::Rgb8);
    let analyzer = common::analyzer(2);

    let err = analyzer
        .admit(Some("slow".into()))
        .unwrap()
        .with_timeout(Duration::from_millis(5))
        .run(&upload)
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout, "{err}");
    assert_eq!(err.request_id, "slow");
    assert!(err.message.contains("exceeded before"), "{}", err.message);
    assert!(!err.message.contains("before decode"), "{}", err.message);
    assert_eq!(analyzer.in_flight(), 0);

    // The analyzer stays usable for the next request.
    let small = encode_png(&gen_noise_rgb(16, 16, 1), 16, 16, ExtendedColorType::Rgb8);
    assert!(analyzer.analyze(&small, None).is_ok());
}
