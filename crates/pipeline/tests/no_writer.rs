//! Scenario: no writer is attached. Task output is silently discarded and
//! the run still completes normally.

mod support;

use std::sync::Arc;

use pipeline::{Pipeline, PipelineConfig, Tasks};
use support::{Double, VecReader};

#[test]
fn without_a_writer_the_run_completes_and_discards_output() {
    let reader = VecReader::new(vec![1u32, 2, 3, 4]);

    let config = PipelineConfig::new(2, 2, 4, true).unwrap();
    let pipeline = Pipeline::new(config, Tasks::Shared(Arc::new(Double))).with_reader(reader);

    let report = pipeline.run().unwrap();
    assert!(report.exceptions.is_empty());
}
