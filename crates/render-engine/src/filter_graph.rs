//! Typed trim-and-concatenate filter graphs.
//!
//! The encoder's filter language is only produced here, from a list of trim
//! ranges. Callers decide how many ranges one graph may hold.

use autocut_common::error::{AutocutError, AutocutResult};
use autocut_timeline::Segment;

/// Output pad of every graph built here.
pub const OUTPUT_PAD: &str = "[outv]";

/// Video graph that trims `segments` out of input 0 and joins them in order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimConcatGraph {
    segments: Vec<Segment>,
}

impl TrimConcatGraph {
    pub fn new(segments: &[Segment]) -> AutocutResult<Self> {
        if segments.is_empty() {
            return Err(AutocutError::unsupported(
                "a trim/concat graph needs at least one segment",
            ));
        }
        Ok(Self {
            segments: segments.to_vec(),
        })
    }

    /// Number of trimmed ranges; never zero.
    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }

    /// Total duration of the joined output.
    pub fn output_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Render the graph in the encoder's filter syntax.
    pub fn expression(&self) -> String {
        let mut graph = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            graph.push_str(&format!(
                "[0:v]trim=start={:.6}:end={:.6},setpts=PTS-STARTPTS[v{i}];",
                segment.start, segment.end
            ));
        }
        for i in 0..self.segments.len() {
            graph.push_str(&format!("[v{i}]"));
        }
        graph.push_str(&format!(
            "concat=n={}:v=1:a=0{OUTPUT_PAD}",
            self.segments.len()
        ));
        graph
    }
}

/// Whether `count` segments fit in a single graph under `ceiling`.
pub fn fits_single_graph(count: usize, ceiling: usize) -> bool {
    count > 0 && count <= ceiling
}
