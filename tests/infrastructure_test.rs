//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{counting_source, StreamInfoBuilder};
use plsl_rs::types::ChannelFormat;

#[test]
fn test_infrastructure_setup() {
    let info = StreamInfoBuilder::new("ECG")
        .stream_type("Cardio")
        .rate(256.0)
        .build();

    assert_eq!(info.name, "ECG");
    assert_eq!(info.source_id, "ecg");
    assert_eq!(info.channel_format, ChannelFormat::Float32);

    let source = counting_source(10.0, 2, 5);
    assert_eq!(source.frame(3), vec![3.0, 10_003.0]);
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}
