//! CLI Command Implementations
//!
//! Each command returns its report as a string so it can be tested
//! without capturing stdout.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use super::StoreArgs;
use crate::config::LooperConfig;
use crate::error::{LoopGridError, Result};
use crate::grid::{GridEvent, LoopGrid, MemoryGrid};
use crate::looper::Looper;
use crate::quantize::{swing_position, swing_ratio, unswing_position};
use crate::transforms::{Double, Reverse, Shift};

/// Read and validate an events file.
pub fn load_events(path: &Path) -> Result<Vec<GridEvent>> {
    let content = fs::read_to_string(path).map_err(|e| LoopGridError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let events: Vec<GridEvent> = serde_json::from_str(&content)?;

    for (index, event) in events.iter().enumerate() {
        if event.id.is_empty() {
            return Err(LoopGridError::InvalidEvent {
                index,
                reason: "empty target id".to_string(),
            });
        }
        if !event.position.is_finite() {
            return Err(LoopGridError::InvalidEvent {
                index,
                reason: format!("position {} is not finite", event.position),
            });
        }
    }
    Ok(events)
}

/// Target ids in order of first appearance.
fn targets_of(events: &[GridEvent]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for event in events {
        if !targets.contains(&event.id) {
            targets.push(event.id.clone());
        }
    }
    targets
}

/// Swing amounts whose curve break-point stays strictly inside the cell.
fn check_swing_amount(field: &'static str, amount: f64) -> Result<()> {
    if amount.is_finite() && amount.abs() < 3.0 {
        Ok(())
    } else {
        Err(LoopGridError::InvalidConfig {
            field,
            reason: format!("must lie strictly between -3 and 3, got {}", amount),
        })
    }
}

/// End of the first whole loop that contains the last event.
///
/// The captured window is half-open, so ending it exactly at the last
/// event would drop that event.
fn window_end(last: f64, length: f64) -> f64 {
    ((last / length).floor() + 1.0) * length
}

/// Replay events through a looper and report the published loop set.
pub fn store(args: &StoreArgs) -> Result<String> {
    info!("Replaying events from: {}", args.events.display());

    let config = match &args.config {
        Some(path) => LooperConfig::load(path)?,
        None => LooperConfig::default(),
    };
    check_swing_amount("swing", args.swing)?;
    let events = load_events(&args.events)?;
    let length = args
        .length
        .filter(|l| *l > 0.0)
        .or(args.grid_length.filter(|l| *l > 0.0))
        .unwrap_or(config.default_loop_length);
    let at = args.at.or_else(|| {
        events
            .iter()
            .map(|e| e.position)
            .max_by(f64::total_cmp)
            .map(|last| window_end(last, length))
    });
    let targets = if args.targets.is_empty() {
        targets_of(&events)
    } else {
        args.targets.clone()
    };

    let grid = Arc::new(MemoryGrid::new(targets.clone()));
    if let Some(length) = args.grid_length {
        grid.set_loop_length(length);
    }
    grid.set_swing(args.swing);

    let mut looper = Looper::with_config(Arc::clone(&grid), config);
    for event in events {
        grid.emit(event);
    }

    looper.store(at, Some(length));

    let mut releases = Vec::new();
    if args.reverse {
        releases.push(looper.transform(Reverse));
    }
    if let Some(offset) = args.shift {
        releases.push(looper.transform(Shift::new(offset)));
    }
    if args.double {
        releases.push(looper.transform(Double));
    }
    if args.flatten {
        looper.flatten();
    }

    let output = looper.output();
    info!(
        targets = targets.len(),
        active = output.active_count(),
        transforms = releases.len(),
        "stored loop set"
    );

    let report = json!({
        "targets": targets,
        "loop_length": looper.base().loop_length,
        "swing": looper.swing(),
        "transforming": looper.is_transforming(),
        "loops": output.loops(),
    });
    looper.destroy();
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Report a position swung and unswung.
pub fn swing(position: f64, amount: f64, grid: f64) -> Result<String> {
    if !(grid.is_finite() && grid > 0.0) {
        return Err(LoopGridError::InvalidConfig {
            field: "grid",
            reason: format!("must be a positive number, got {}", grid),
        });
    }
    check_swing_amount("amount", amount)?;
    let center = swing_ratio(amount);
    let report = json!({
        "position": position,
        "center": center,
        "swung": swing_position(position, center, grid),
        "unswung": unswing_position(position, center, grid),
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn events_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const PERFORMANCE: &str = r#"[
        { "id": "kick", "position": 2.25, "event": "start" },
        { "id": "kick", "position": 2.75, "event": "stop" },
        { "id": "hat", "position": 3.5, "event": "stop" }
    ]"#;

    #[test]
    fn test_store_reports_loops() {
        let file = events_file(PERFORMANCE);
        let args = StoreArgs {
            events: file.path().to_path_buf(),
            at: Some(4.0),
            length: Some(4.0),
            ..StoreArgs::default()
        };

        let report: serde_json::Value = serde_json::from_str(&store(&args).unwrap()).unwrap();
        assert_eq!(report["targets"], json!(["kick", "hat"]));
        assert_eq!(report["loops"][0]["length"], json!(4.0));
        assert_eq!(report["loops"][0]["events"][0]["position"], json!(2.25));
        assert_eq!(report["loops"][1], serde_json::Value::Null);
        assert_eq!(report["transforming"], json!(false));
    }

    #[test]
    fn test_store_with_transforms() {
        let file = events_file(PERFORMANCE);
        let args = StoreArgs {
            events: file.path().to_path_buf(),
            at: Some(4.0),
            length: Some(4.0),
            reverse: true,
            ..StoreArgs::default()
        };

        let report: serde_json::Value = serde_json::from_str(&store(&args).unwrap()).unwrap();
        assert_eq!(report["transforming"], json!(true));
        assert_eq!(report["loops"][0]["events"][0]["position"], json!(1.25));

        let flattened = StoreArgs {
            flatten: true,
            ..args
        };
        let report: serde_json::Value =
            serde_json::from_str(&store(&flattened).unwrap()).unwrap();
        assert_eq!(report["transforming"], json!(false));
        assert_eq!(report["loops"][0]["events"][0]["position"], json!(1.25));
    }

    #[test]
    fn test_store_without_at_keeps_last_event() {
        let file = events_file(PERFORMANCE);
        let args = StoreArgs {
            events: file.path().to_path_buf(),
            length: Some(4.0),
            ..StoreArgs::default()
        };

        let report: serde_json::Value = serde_json::from_str(&store(&args).unwrap()).unwrap();
        assert_eq!(
            report["loops"][0]["events"],
            json!([
                { "position": 2.25, "start": true },
                { "position": 2.75, "start": false }
            ])
        );
    }

    #[test]
    fn test_window_end_covers_last_event() {
        assert_eq!(window_end(3.5, 4.0), 4.0);
        assert_eq!(window_end(4.0, 4.0), 8.0);
        assert_eq!(window_end(9.25, 8.0), 16.0);
    }

    #[test]
    fn test_store_rejects_out_of_range_swing() {
        let file = events_file(PERFORMANCE);
        let args = StoreArgs {
            events: file.path().to_path_buf(),
            swing: 3.5,
            ..StoreArgs::default()
        };
        assert_eq!(store(&args).unwrap_err().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_rejects_bad_events() {
        let file = events_file(r#"[{ "id": "", "position": 1.0, "event": "start" }]"#);
        let err = load_events(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_EVENT");

        let file = events_file(r#"[{ "id": "a", "position": 1.0, "event": "maybe" }]"#);
        let err = load_events(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_swing_report() {
        let report: serde_json::Value =
            serde_json::from_str(&swing(0.25, 0.0, 2.0).unwrap()).unwrap();
        assert_eq!(report["swung"], json!(0.25));
        assert_eq!(report["unswung"], json!(0.25));

        assert!(swing(0.25, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_swing_rejects_out_of_range_amount() {
        for amount in [3.0, -3.0, 7.5, f64::NAN] {
            let err = swing(0.25, amount, 2.0).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_CONFIG");
        }

        let report: serde_json::Value =
            serde_json::from_str(&swing(0.75, -2.9, 2.0).unwrap()).unwrap();
        assert!(report["unswung"].as_f64().unwrap().is_finite());
    }
}
