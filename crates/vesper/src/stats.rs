//! Pipeline statistics.

/// Statistics from the processing pipeline, refreshed by every capture frame.
///
/// `None` means the statistic is unavailable, for example because the stage
/// that produces it is disabled or no capture frame was processed yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioProcessingStats {
    /// RMS level of the last processed capture frame (first channel, at the
    /// internal processing rate) in dBFS.
    pub output_rms_dbfs: Option<f64>,
    /// Prior speech probability in `[0.0, 1.0]` reported by the noise
    /// suppressor for the first channel.
    pub speech_probability: Option<f64>,
    /// Echo Return Loss Enhancement in dB:
    /// `ERLE = 10 log10(P_capture / P_out)`, measured around the echo stage.
    pub echo_return_loss_enhancement: Option<f64>,
}
