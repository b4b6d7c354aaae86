//! Drives real child processes through the pipeline using stock unix tools.
#![cfg(unix)]

use slidepush::{
    config::Config,
    engine::system::SystemLauncher,
    fs::StdFileSystem,
    pipeline::run_to_completion,
    ConversionPipeline, ConversionState, FailureKind, PollResult,
};
use std::time::Duration;

fn run(cfg: &Config, source_name: &str, contents: &[u8]) -> (tempfile::TempDir, PollResult) {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join(source_name);
    std::fs::write(&source, contents).unwrap();
    let work = tmp.path().join("work");

    let mut pipeline = ConversionPipeline::new(cfg, SystemLauncher::new(), StdFileSystem);
    let handle = pipeline.start(&source, &work).unwrap();
    let result = run_to_completion(
        &mut pipeline,
        handle,
        Duration::from_millis(5),
        Some(Duration::from_secs(30)),
    )
    .unwrap();
    (tmp, result)
}

#[test]
fn non_zero_exit_fails() {
    let mut cfg = Config::default();
    cfg.tools.office_exe = "false".into();
    let (tmp, result) = run(&cfg, "talk.odp", b"doc");
    match result {
        PollResult::Failed(f) => assert_eq!(f.kind, FailureKind::ToolFailure),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!tmp.path().join("work").exists());
}

#[test]
fn success_without_output_fails() {
    let mut cfg = Config::default();
    cfg.tools.office_exe = "true".into();
    let (_tmp, result) = run(&cfg, "talk.odp", b"doc");
    match result {
        PollResult::Failed(f) => assert!(f.reason.contains("not produced")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn unknown_program_fails() {
    let mut cfg = Config::default();
    cfg.tools.office_exe = "slidepush-no-such-tool".into();
    let (_tmp, result) = run(&cfg, "talk.odp", b"doc");
    assert!(matches!(result, PollResult::Failed(_)));
}

#[test]
fn pdf_through_copying_raster_tool() {
    // `cp deck.pdf work/slide.jpg` stands in for the rasterizer.
    let mut cfg = Config::default();
    cfg.tools.raster_exe = "cp".into();

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("deck.pdf");
    std::fs::write(&source, b"%PDF-1.4").unwrap();
    let work = tmp.path().join("work");

    let mut pipeline = ConversionPipeline::new(&cfg, SystemLauncher::new(), StdFileSystem);
    let handle = pipeline.start(&source, &work).unwrap();
    let result =
        run_to_completion(&mut pipeline, handle, Duration::from_millis(5), None).unwrap();
    assert_eq!(result, PollResult::Finished);

    let slides = pipeline.collect_slides(handle).unwrap();
    assert_eq!(slides.len(), 1);
    assert_eq!(slides.slides[0].image_path, work.join("slide.jpg"));
    assert!(!work.join("deck.pdf").exists());
}

#[test]
fn cancel_kills_running_process() {
    // `sh deck.pdf work/slide.jpg` runs the staged file as a script.
    let mut cfg = Config::default();
    cfg.tools.raster_exe = "sh".into();

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("deck.pdf");
    std::fs::write(&source, b"exec sleep 30\n").unwrap();
    let work = tmp.path().join("work");

    let mut pipeline = ConversionPipeline::new(&cfg, SystemLauncher::new(), StdFileSystem);
    let handle = pipeline.start(&source, &work).unwrap();
    assert!(!pipeline.poll(handle).unwrap().is_terminal());
    assert!(!pipeline.poll(handle).unwrap().is_terminal());

    pipeline.cancel(handle).unwrap();
    assert_eq!(pipeline.state(handle).unwrap(), &ConversionState::Cancelled);
    assert!(!work.exists());
    assert!(pipeline.report(handle).unwrap().stages[0].killed);
}

#[test]
fn dropped_pipeline_reaps_running_process() {
    let mut cfg = Config::default();
    cfg.tools.raster_exe = "sh".into();

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("deck.pdf");
    std::fs::write(&source, b"exec sleep 30\n").unwrap();
    let work = tmp.path().join("work");

    let mut pipeline = ConversionPipeline::new(&cfg, SystemLauncher::new(), StdFileSystem);
    let handle = pipeline.start(&source, &work).unwrap();
    assert!(!pipeline.poll(handle).unwrap().is_terminal());
    let pid = pipeline.report(handle).unwrap().stages[0].pid;

    drop(pipeline);
    assert!(!work.exists());
    let alive = std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .unwrap()
        .success();
    assert!(!alive, "pid {pid} still running");
}

#[test]
fn doctor_reports_missing_tools() {
    let mut cfg = Config::default();
    cfg.tools.office_exe = "slidepush-no-such-tool".into();
    cfg.tools.raster_exe = "true".into();

    let diag = SystemLauncher::new().doctor(&cfg);
    assert_eq!(diag.len(), 2);
    assert!(!diag[0].available);
    assert!(diag[0].error.is_some());
    assert!(diag[1].available);
}
