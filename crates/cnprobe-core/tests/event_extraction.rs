//! Event extraction against synthetic postsynaptic currents

use cnprobe_core::{
    extract_events, extract_events_with, EventExtractor, EventRecord, ExtractionParams,
    ResponseTrace, StimulusSpec,
};

const DT: f64 = 0.025;
const TAU_RISE: f64 = 0.2;
const TAU_DECAY: f64 = 2.0;

/// Difference-of-exponentials current with unit peak, zero before `onset`
fn psc(t: f64, onset: f64) -> f64 {
    if t < onset {
        return 0.0;
    }
    let s = t - onset;
    let s_peak = (TAU_DECAY * TAU_RISE / (TAU_DECAY - TAU_RISE)) * (TAU_DECAY / TAU_RISE).ln();
    let norm = (-s_peak / TAU_DECAY).exp() - (-s_peak / TAU_RISE).exp();
    ((-s / TAU_DECAY).exp() - (-s / TAU_RISE).exp()) / norm
}

fn bits(event: &EventRecord) -> Vec<u64> {
    vec![
        event.pulse_time_ms.to_bits(),
        event.peak_amplitude.to_bits(),
        event.latency_20pct.to_bits(),
        event.latency_80pct.to_bits(),
        event.half_width_ms.to_bits(),
        event.half_left_ms.to_bits(),
        event.half_right_ms.to_bits(),
        event.rise_time_ms.to_bits(),
        event.peak_index.map_or(u64::MAX, |i| i as u64),
    ]
}

fn assert_undefined(event: &EventRecord) {
    assert!(!event.is_detected());
    assert!(event.peak_amplitude.is_nan());
    assert!(event.latency_20pct.is_nan());
    assert!(event.latency_80pct.is_nan());
    assert!(event.half_width_ms.is_nan());
    assert!(event.half_left_ms.is_nan());
    assert!(event.half_right_ms.is_nan());
    assert!(event.rise_time_ms.is_nan());
}

#[test]
fn single_psc_reports_peak_and_kinetics() {
    let _ = env_logger::builder().is_test(true).try_init();

    // inward current, peak 10 shortly after the 10 ms pulse, 2 ms decay
    let trace = ResponseTrace::from_fn(DT, 30.0, |t| -10.0 * psc(t, 10.0)).unwrap();
    let spec = StimulusSpec::new(1, 100.0, 10.0, 0.5, 1.0, DT).unwrap();

    let events = extract_events(&trace, &spec).unwrap();
    assert_eq!(events.len(), 1);

    let event = events[0];
    assert_eq!(event.pulse_time_ms, 10.0);
    assert!(event.is_detected());
    assert!((event.peak_amplitude - 10.0).abs() < 0.05, "peak {}", event.peak_amplitude);

    let peak_time = event.peak_index.unwrap() as f64 * DT;
    assert!(event.latency_20pct < event.latency_80pct);
    assert!(event.latency_80pct < peak_time);
    assert!(event.rise_time_ms > 0.0);
    assert!(event.half_left_ms < peak_time && peak_time < event.half_right_ms);
    assert!(event.half_width_ms > 0.0);
    assert!((event.half_width_ms - (event.half_right_ms - event.half_left_ms)).abs() < 1e-12);
}

#[test]
fn all_zero_trace_leaves_every_feature_undefined() {
    let spec = StimulusSpec::new(5, 100.0, 10.0, 0.5, 1.0, DT).unwrap();
    let trace = ResponseTrace::zeros(DT, 4000).unwrap();

    let events = extract_events(&trace, &spec).unwrap();
    assert_eq!(events.len(), 5);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.pulse_time_ms, 10.0 + 10.0 * i as f64);
        assert_undefined(event);
    }
}

#[test]
fn constant_holding_current_leaves_every_feature_undefined() {
    // a flat -3 nA offset has equal magnitude everywhere, so every window
    // peaks on its first searched sample
    let spec = StimulusSpec::new(4, 50.0, 10.0, 0.5, 1.0, DT).unwrap();
    let trace = ResponseTrace::new(DT, vec![-3.0; 6000]).unwrap();

    let events = extract_events(&trace, &spec).unwrap();
    assert_eq!(events.len(), 4);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.pulse_time_ms, 10.0 + 20.0 * i as f64);
        assert_eq!(event.peak_index, None);
        assert_undefined(event);
    }
}

#[test]
fn peak_on_first_searched_sample_is_not_an_event() {
    // instantaneous jump at the window start followed by a pure decay
    let trace = ResponseTrace::from_fn(DT, 30.0, |t| {
        if t >= 10.0 - 1e-9 {
            10.0 * (-(t - 10.0) / TAU_DECAY).exp()
        } else {
            0.0
        }
    })
    .unwrap();
    let spec = StimulusSpec::new(1, 100.0, 10.0, 0.5, 1.0, DT).unwrap();

    let events = extract_events(&trace, &spec).unwrap();
    assert_eq!(events[0].pulse_time_ms, 10.0);
    assert_undefined(&events[0]);
}

#[test]
fn minimum_latency_moves_the_first_searched_sample() {
    let trace = ResponseTrace::from_fn(DT, 30.0, |t| 10.0 * psc(t, 10.0)).unwrap();
    let spec = StimulusSpec::new(1, 100.0, 10.0, 0.5, 1.0, DT).unwrap();

    let detected = extract_events(&trace, &spec).unwrap();
    assert!(detected[0].is_detected());

    // starting the search after the peak leaves only the decay
    let late = ExtractionParams::default().with_min_latency(1.0);
    let events = extract_events_with(&trace, &spec, &late).unwrap();
    assert_undefined(&events[0]);
}

#[test]
fn peak_only_in_look_ahead_tail_is_ignored() {
    let spec = StimulusSpec::new(1, 100.0, 10.0, 0.5, 1.0, DT).unwrap();
    let mut samples = vec![0.0; 1200];
    // window starts at sample 400; samples 800..810 are the look-ahead tail
    samples[805] = 25.0;
    let trace = ResponseTrace::new(DT, samples).unwrap();

    let extractor = EventExtractor::new(&trace, &spec, &ExtractionParams::default()).unwrap();
    assert_eq!(extractor.pulse_window(0)[405], 25.0);
    assert_undefined(&extractor.analyze_pulse(0));
}

#[test]
fn pulse_train_with_depression_and_a_failure() {
    let amplitudes = [10.0, 8.0, 0.0, 4.0, 2.0];
    let spec = StimulusSpec::new(5, 50.0, 5.0, 0.5, 1.0, DT).unwrap();
    let onsets = spec.pulse_times_ms();
    let trace = ResponseTrace::from_fn(DT, 115.0, |t| {
        onsets
            .iter()
            .zip(amplitudes)
            .map(|(onset, amp)| -amp * psc(t, onset + 0.5))
            .sum()
    })
    .unwrap();

    let events = extract_events(&trace, &spec).unwrap();
    assert_eq!(events.len(), 5);
    assert!(events.windows(2).all(|w| w[0].pulse_time_ms < w[1].pulse_time_ms));

    for (event, amp) in events.iter().zip(amplitudes) {
        if amp == 0.0 {
            assert_undefined(event);
        } else {
            assert!((event.peak_amplitude - amp).abs() < 0.05 * amp);
            // release delayed by 0.5 ms after the pulse
            assert!(event.latency_20pct > 0.5 && event.latency_20pct < 1.0);
            assert!(event.half_width_ms > 1.0 && event.half_width_ms < 3.0);
        }
    }
}

#[test]
fn outward_and_inward_currents_are_treated_alike() {
    let spec = StimulusSpec::new(2, 100.0, 10.0, 0.5, 1.0, DT).unwrap();
    let outward = ResponseTrace::from_fn(DT, 40.0, |t| 3.0 * psc(t, 10.3) + 3.0 * psc(t, 20.3)).unwrap();
    let inward =
        ResponseTrace::from_fn(DT, 40.0, |t| -3.0 * psc(t, 10.3) - 3.0 * psc(t, 20.3)).unwrap();

    let a = extract_events(&outward, &spec).unwrap();
    let b = extract_events(&inward, &spec).unwrap();
    assert_eq!(a.iter().map(bits).collect::<Vec<_>>(), b.iter().map(bits).collect::<Vec<_>>());
}

#[test]
fn extraction_is_idempotent() {
    let spec = StimulusSpec::new(3, 100.0, 10.0, 0.5, 1.0, DT).unwrap();
    let trace =
        ResponseTrace::from_fn(DT, 50.0, |t| -7.0 * psc(t, 10.4) - 5.0 * psc(t, 20.6)).unwrap();

    let first = extract_events(&trace, &spec).unwrap();
    let second = extract_events(&trace, &spec).unwrap();
    assert_eq!(
        first.iter().map(bits).collect::<Vec<_>>(),
        second.iter().map(bits).collect::<Vec<_>>()
    );
}

#[test]
fn per_pulse_analysis_matches_full_run() {
    let spec = StimulusSpec::new(3, 100.0, 10.0, 0.5, 1.0, DT).unwrap();
    let trace =
        ResponseTrace::from_fn(DT, 50.0, |t| 6.0 * psc(t, 10.4) + 4.0 * psc(t, 30.4)).unwrap();
    let extractor = EventExtractor::new(&trace, &spec, &ExtractionParams::default()).unwrap();

    let all = extractor.run();
    for i in (0..3).rev() {
        assert_eq!(bits(&extractor.analyze_pulse(i)), bits(&all[i]));
    }
}

#[test]
fn malformed_spec_is_rejected() {
    let trace = ResponseTrace::zeros(DT, 100).unwrap();
    let mut spec = StimulusSpec::default();
    spec.frequency_hz = 0.0;
    assert!(extract_events(&trace, &spec).unwrap_err().is_invalid_spec());

    let mut spec = StimulusSpec::default();
    spec.pulse_count = 0;
    assert!(extract_events(&trace, &spec).unwrap_err().is_invalid_spec());
}
