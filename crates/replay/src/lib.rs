//! Landmark Stream Replay
//!
//! Feeds recorded face landmark frames (JSON lines) through a `DmsModule`
//! and writes one JSON analysis per frame.

use std::io::{self, BufRead, Write};

use dms::{DmsError, DmsModule, Point};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Replay error types
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Line {line}: malformed frame: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: {source}")]
    Analysis {
        line: usize,
        #[source]
        source: DmsError,
    },

    #[error("Failed to write analysis: {0}")]
    Output(#[source] serde_json::Error),
}

/// One recorded frame
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    /// Monotonic capture time (ms)
    pub t_ms: i64,
    /// Normalized landmarks, absent or null when no face was found
    #[serde(default)]
    pub landmarks: Option<Vec<(f32, f32)>>,
}

/// Totals over a replayed stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub faceless_frames: usize,
    pub blinks: u32,
    pub yawns: u32,
    pub nods: u32,
    pub warnings: usize,
    pub alarm_frames: usize,
    pub max_alarm_level: u32,
}

/// Replay every frame from `input`, writing analyses to `output`
pub fn replay<R: BufRead, W: Write>(
    module: &mut DmsModule,
    input: R,
    mut output: W,
) -> Result<ReplaySummary, ReplayError> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(&line)
            .map_err(|source| ReplayError::Parse { line: line_no, source })?;
        let landmarks: Option<Vec<Point>> = record
            .landmarks
            .map(|points| points.into_iter().map(Point::from).collect());

        let analysis = module
            .analyze(landmarks.as_deref(), record.t_ms)
            .map_err(|source| ReplayError::Analysis { line: line_no, source })?;

        summary.frames += 1;
        if !analysis.face_detected {
            summary.faceless_frames += 1;
        }
        if let Some(metrics) = analysis.metrics {
            summary.blinks = metrics.blink_count;
            summary.yawns = metrics.yawn_count;
        }
        summary.nods = analysis.nod.nod_count;
        if analysis.warning.new_warning_event {
            summary.warnings += 1;
        }
        if analysis.alarm.active {
            summary.alarm_frames += 1;
        }
        summary.max_alarm_level = summary.max_alarm_level.max(analysis.alarm.level);

        if analysis.has_events() {
            debug!(t_ms = record.t_ms, "frame events: {:?}", analysis);
        }

        serde_json::to_writer(&mut output, &analysis).map_err(ReplayError::Output)?;
        writeln!(output)?;
    }

    output.flush()?;
    info!(
        frames = summary.frames,
        blinks = summary.blinks,
        yawns = summary.yawns,
        nods = summary.nods,
        warnings = summary.warnings,
        max_alarm_level = summary.max_alarm_level,
        "Replay finished"
    );

    Ok(summary)
}

/// Initialize logging to stderr; `RUST_LOG` overrides the default INFO level
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::config::LandmarkIndices;
    use dms::DmsConfig;
    use std::io::Cursor;

    fn open_face() -> Vec<(f32, f32)> {
        let indices = LandmarkIndices::default();
        let mut points = vec![(0.5f32, 0.5f32); 468];

        let eye = |x0: f32| {
            [
                (x0, 0.4),
                (x0 + 0.03, 0.385),
                (x0 + 0.07, 0.385),
                (x0 + 0.1, 0.4),
                (x0 + 0.07, 0.415),
                (x0 + 0.03, 0.415),
            ]
        };
        for (idx, pos) in indices.left_eye.iter().zip(eye(0.3)) {
            points[*idx] = pos;
        }
        for (idx, pos) in indices.right_eye.iter().zip(eye(0.6)) {
            points[*idx] = pos;
        }
        // Mouth corners only; the lip points coincide, so MAR is zero
        points[indices.mouth[0]] = (0.4, 0.7);
        points[indices.mouth[4]] = (0.6, 0.7);
        points
    }

    fn module() -> DmsModule {
        DmsModule::new(DmsConfig::default()).unwrap()
    }

    #[test]
    fn test_replay_writes_one_line_per_frame() {
        let face = serde_json::to_string(&open_face()).unwrap();
        let input = format!(
            "{{\"t_ms\": 0, \"landmarks\": {face}}}\n\n{{\"t_ms\": 33, \"landmarks\": null}}\n{{\"t_ms\": 66}}\n"
        );
        let mut output = Vec::new();

        let summary = replay(&mut module(), Cursor::new(input), &mut output).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.faceless_frames, 2);

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["face_detected"], true);
        assert_eq!(lines[1]["face_detected"], false);
        assert_eq!(lines[2]["timestamp_ms"], 66);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let input = "{\"t_ms\": 0}\nnot json\n";
        let err = replay(&mut module(), Cursor::new(input), Vec::new()).unwrap_err();

        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_short_landmarks_report_line_number() {
        let input = "{\"t_ms\": 0, \"landmarks\": [[0.1, 0.2]]}\n";
        let err = replay(&mut module(), Cursor::new(input), Vec::new()).unwrap_err();

        assert!(matches!(err, ReplayError::Analysis { line: 1, .. }));
    }
}
