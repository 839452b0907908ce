//! Property tests for the stimulus builder and the event extractor

use cnprobe_core::time::samples_in;
use cnprobe_core::{build_waveform, extract_events, ResponseTrace, StimulusSpec};
use proptest::prelude::*;

fn stimulus_spec() -> impl Strategy<Value = StimulusSpec> {
    (
        1usize..8,
        10.0f64..500.0,
        0.0f64..20.0,
        0.05f64..2.0,
        prop_oneof![-10.0f64..-0.1, 0.1f64..10.0],
        prop_oneof![Just(0.01), Just(0.025), Just(0.05), Just(0.1)],
    )
        .prop_map(|(n, freq, delay, dur, amp, dt)| {
            StimulusSpec::new(n, freq, delay, dur, amp, dt).unwrap()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn waveform_length_follows_total_duration(spec in stimulus_spec()) {
        let wave = build_waveform(&spec).unwrap();
        let expected = (spec.total_duration_ms() / spec.time_step_ms + 1e-9).floor() as usize + 1;
        prop_assert_eq!(wave.len(), expected);
        prop_assert_eq!(wave.time_step_ms(), spec.time_step_ms);
    }

    #[test]
    fn waveform_is_zero_outside_pulses(spec in stimulus_spec()) {
        let wave = build_waveform(&spec).unwrap();
        let dt = spec.time_step_ms;
        let width = samples_in(spec.duration_ms, dt).max(1);
        let starts: Vec<usize> = spec
            .pulse_times_ms()
            .iter()
            .map(|&onset| samples_in(onset, dt))
            .collect();

        for (index, &value) in wave.samples().iter().enumerate() {
            // pulses start on the sample at or just before their onset
            let inside = starts.iter().any(|&start| index >= start && index < start + width);
            if inside {
                prop_assert_eq!(value, spec.amplitude);
            } else {
                prop_assert_eq!(value, 0.0, "non-zero sample {} at {} ms", index, index as f64 * dt);
            }
        }
    }

    #[test]
    fn every_pulse_onset_carries_the_amplitude(spec in stimulus_spec()) {
        let wave = build_waveform(&spec).unwrap();
        for onset in spec.pulse_times_ms() {
            let index = (onset / spec.time_step_ms + 1e-9).floor() as usize;
            prop_assert_eq!(wave.value_at(index), Some(spec.amplitude));
        }
    }

    #[test]
    fn one_record_per_pulse_in_ascending_order(
        spec in stimulus_spec(),
        samples in prop::collection::vec(-5.0f64..5.0, 0..3000),
    ) {
        let trace = ResponseTrace::new(spec.time_step_ms, samples).unwrap();
        let events = extract_events(&trace, &spec).unwrap();

        prop_assert_eq!(events.len(), spec.pulse_count);
        for pair in events.windows(2) {
            prop_assert!(pair[0].pulse_time_ms < pair[1].pulse_time_ms);
        }
    }

    #[test]
    fn extraction_is_deterministic(
        spec in stimulus_spec(),
        samples in prop::collection::vec(-5.0f64..5.0, 0..3000),
    ) {
        let trace = ResponseTrace::new(spec.time_step_ms, samples).unwrap();
        let first = extract_events(&trace, &spec).unwrap();
        let second = extract_events(&trace, &spec).unwrap();

        for (a, b) in first.iter().zip(&second) {
            prop_assert_eq!(a.peak_index, b.peak_index);
            prop_assert_eq!(a.peak_amplitude.to_bits(), b.peak_amplitude.to_bits());
            prop_assert_eq!(a.latency_20pct.to_bits(), b.latency_20pct.to_bits());
            prop_assert_eq!(a.half_width_ms.to_bits(), b.half_width_ms.to_bits());
            prop_assert_eq!(a.rise_time_ms.to_bits(), b.rise_time_ms.to_bits());
        }
    }

    #[test]
    fn detected_features_are_consistent(
        spec in stimulus_spec(),
        samples in prop::collection::vec(-5.0f64..5.0, 0..3000),
    ) {
        let trace = ResponseTrace::new(spec.time_step_ms, samples).unwrap();
        for event in extract_events(&trace, &spec).unwrap() {
            if !event.is_detected() {
                prop_assert!(event.peak_amplitude.is_nan());
                continue;
            }
            prop_assert!(event.peak_amplitude > 0.0);
            if !event.rise_time_ms.is_nan() {
                prop_assert!(event.latency_20pct <= event.latency_80pct);
            }
            if !event.half_width_ms.is_nan() {
                prop_assert!(event.half_width_ms > 0.0);
            }
        }
    }
}
