//! Tests for error types

use trueno_tracker::experiment::ExperimentId;
use trueno_tracker::Error;

#[test]
fn test_no_active_experiment_error() {
    let error = Error::NoActiveExperiment;
    let error_str = format!("{error}");
    assert!(error_str.contains("No active experiment"));
    assert!(error_str.contains("start()"));
}

#[test]
fn test_experiment_not_found_error() {
    let error = Error::ExperimentNotFound(ExperimentId::new(42));
    assert_eq!(format!("{error}"), "Experiment not found: 42");
    assert!(error.is_not_found());
}

#[test]
fn test_artifacts_path_already_set_error() {
    let error = Error::ArtifactsPathAlreadySet(ExperimentId::new(7));
    let error_str = format!("{error}");
    assert!(error_str.contains("already assigned"));
    assert!(error_str.contains('7'));
    assert!(!error.is_not_found());
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("epoch must be positive".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("epoch must be positive"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_database_error_conversion() {
    let error: Error = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(format!("{error}").starts_with("Database error"));
    assert!(!error.is_not_found());
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_error_debug() {
    let error = Error::NoActiveExperiment;
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("NoActiveExperiment"));
}

#[test]
fn test_result_type_alias_error() {
    fn returns_error() -> trueno_tracker::Result<i32> {
        Err(Error::Config("bad bind".to_string()))
    }

    let result = returns_error();
    assert!(matches!(result, Err(Error::Config(_))));
}
