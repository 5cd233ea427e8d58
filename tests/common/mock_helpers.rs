//! Sink and channel helpers

use plsl_rs::monitor::{ChannelFrame, ChannelView, DisplaySink, TickReport};

/// Sink that keeps every published frame and tick report
#[derive(Default)]
pub struct CollectingSink {
    pub frames: Vec<ChannelFrame>,
    pub reports: Vec<TickReport>,
}

impl CollectingSink {
    /// Frames of one stream channel, oldest first
    pub fn frames_for(&self, stream_index: usize, channel: usize) -> Vec<&ChannelFrame> {
        self.frames
            .iter()
            .filter(|f| f.stream_index == stream_index && f.channel == channel)
            .collect()
    }
}

impl DisplaySink for CollectingSink {
    fn publish(&mut self, view: &ChannelView<'_>) {
        self.frames.push(view.to_frame());
    }

    fn on_tick_end(&mut self, report: &TickReport) {
        self.reports.push(report.clone());
    }
}
