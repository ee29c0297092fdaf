//! Tests for the line pipeline

use super::*;
use crate::filter::{terminal_chrome, NoNoise, NoiseRule, RuleSet};
use std::sync::Mutex;

fn config() -> PipelineConfig {
    PipelineConfig {
        noise: Arc::new(NoNoise),
        readiness: None,
        sentinel: Some("[[DONE]]".to_string()),
        history_capacity: 10,
        console_passthrough: false,
        line_callback: None,
    }
}

fn accepted(outputs: &[PipelineOutput]) -> Vec<&str> {
    outputs
        .iter()
        .filter_map(|o| match o {
            PipelineOutput::Accepted(line) => Some(line.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_immediate_repeat_suppressed() {
    let mut pipeline = LinePipeline::new(config());
    let out = pipeline.feed("hello\nhello\nworld\n").unwrap();
    assert_eq!(accepted(&out), vec!["hello", "world"]);
    assert_eq!(pipeline.accepted_lines(), 2);
}

#[test]
fn test_repeat_within_window_suppressed() {
    let mut pipeline = LinePipeline::new(config());
    let mut input = String::from("target\n");
    for i in 0..9 {
        input.push_str(&format!("line {}\n", i));
    }
    input.push_str("target\n");
    let out = pipeline.feed(&input).unwrap();
    let lines = accepted(&out);
    assert_eq!(lines.len(), 10);
    assert_eq!(lines.iter().filter(|l| **l == "target").count(), 1);
}

#[test]
fn test_repeat_after_window_emitted_again() {
    let mut pipeline = LinePipeline::new(config());
    let mut input = String::from("target\n");
    for i in 0..10 {
        input.push_str(&format!("line {}\n", i));
    }
    input.push_str("target\n");
    let out = pipeline.feed(&input).unwrap();
    let lines = accepted(&out);
    assert_eq!(lines.len(), 12);
    assert_eq!(lines.last(), Some(&"target"));
}

#[test]
fn test_partial_lines_joined_across_chunks() {
    let mut pipeline = LinePipeline::new(config());
    assert!(pipeline.feed("hel").unwrap().is_empty());
    let out = pipeline.feed("lo wor").unwrap();
    assert!(out.is_empty());
    let out = pipeline.feed("ld\nnext").unwrap();
    assert_eq!(accepted(&out), vec!["hello world"]);
    let out = pipeline.finish().unwrap();
    assert_eq!(accepted(&out), vec!["next"]);
    assert!(pipeline.finish().unwrap().is_empty());
}

#[test]
fn test_escapes_and_carriage_returns_cleaned() {
    let mut pipeline = LinePipeline::new(config());
    let out = pipeline
        .feed("\x1b[32mgreen\x1b[0m   \r\nprogress 10%\rprogress 100%\r\n")
        .unwrap();
    assert_eq!(accepted(&out), vec!["green", "progress 100%"]);
}

#[test]
fn test_noise_discarded() {
    let mut cfg = config();
    cfg.noise = terminal_chrome().shared();
    let mut pipeline = LinePipeline::new(cfg);
    let out = pipeline
        .feed("╭────╮\n⠋ Working\n\nanswer: 42\n╰────╯\n")
        .unwrap();
    assert_eq!(accepted(&out), vec!["answer: 42"]);
}

#[test]
fn test_readiness_gates_content() {
    let mut cfg = config();
    cfg.readiness = Some(Arc::new(|line: &str| line == "READY"));
    let mut pipeline = LinePipeline::new(cfg);
    assert!(!pipeline.is_ready());

    let out = pipeline
        .feed("banner v1\nechoed prompt\nREADY\nfirst\nsecond\n")
        .unwrap();
    assert!(pipeline.is_ready());
    assert_eq!(accepted(&out), vec!["first", "second"]);
    assert!(out.contains(&PipelineOutput::Ready));
}

#[test]
fn test_noise_checked_before_readiness() {
    let mut cfg = config();
    cfg.noise = Arc::new(|line: &str| line.starts_with('#'));
    cfg.readiness = Some(Arc::new(|line: &str| line.contains("READY")));
    let mut pipeline = LinePipeline::new(cfg);
    let out = pipeline.feed("# READY (noise)\nREADY\nok\n").unwrap();
    assert_eq!(accepted(&out), vec!["ok"]);
    // Readiness fired once, on the non-noise line
    assert_eq!(
        out.iter().filter(|o| **o == PipelineOutput::Ready).count(),
        1
    );
}

#[test]
fn test_sentinel_requests_exit_and_is_not_content() {
    let mut pipeline = LinePipeline::new(config());
    let out = pipeline.feed("result\n  [[DONE]]  \n").unwrap();
    assert_eq!(accepted(&out), vec!["result"]);
    assert_eq!(out.last(), Some(&PipelineOutput::ExitRequested));
}

#[test]
fn test_sentinel_ignored_before_readiness() {
    let mut cfg = config();
    cfg.readiness = Some(Arc::new(|line: &str| line == "READY"));
    let mut pipeline = LinePipeline::new(cfg);
    let out = pipeline.feed("[[DONE]]\n").unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_signals_reported() {
    let mut cfg = config();
    cfg.noise = RuleSet::new()
        .with(
            NoiseRule::contains("status", "esc to interrupt")
                .with_signal(r"(\d+) tokens")
                .unwrap(),
        )
        .shared();
    let mut pipeline = LinePipeline::new(cfg);
    let out = pipeline
        .feed("(3s · 128 tokens · esc to interrupt)\ndone\n")
        .unwrap();
    assert_eq!(
        out,
        vec![
            PipelineOutput::Signal(Signal {
                rule: "status".to_string(),
                value: "128".to_string()
            }),
            PipelineOutput::Accepted("done".to_string()),
        ]
    );
}

#[test]
fn test_console_passthrough_and_callback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let mut cfg = config();
    cfg.console_passthrough = true;
    cfg.line_callback = Some(Arc::new(move |line: &str| {
        seen_clone.lock().unwrap().push(line.to_string());
        Ok(())
    }));
    let mut pipeline = LinePipeline::new(cfg);
    let out = pipeline.feed("a\na\n").unwrap();
    assert_eq!(
        out,
        vec![
            PipelineOutput::Console("a".to_string()),
            PipelineOutput::Accepted("a".to_string()),
            PipelineOutput::Console("a".to_string()),
        ]
    );
    assert_eq!(*seen.lock().unwrap(), vec!["a", "a"]);
}

#[test]
fn test_callback_error_propagates() {
    let mut cfg = config();
    cfg.line_callback = Some(Arc::new(|line: &str| {
        if line == "bad" {
            Err(Error::Processing("rejected".to_string()))
        } else {
            Ok(())
        }
    }));
    let mut pipeline = LinePipeline::new(cfg);
    assert!(pipeline.feed("good\n").is_ok());
    assert!(matches!(
        pipeline.feed("bad\n"),
        Err(Error::Processing(msg)) if msg == "rejected"
    ));
}

#[test]
fn test_contain_panic() {
    let mut cfg = config();
    cfg.noise = Arc::new(|line: &str| -> bool {
        if line == "boom" {
            panic!("predicate exploded");
        }
        false
    });
    let mut pipeline = LinePipeline::new(cfg);
    let result = contain_panic(|| pipeline.feed("boom\n"));
    assert!(matches!(result, Err(Error::Processing(msg)) if msg.contains("exploded")));
}

#[test]
fn test_history_window_eviction() {
    let mut history = RecentHistory::new(2);
    history.push("a".to_string());
    history.push("b".to_string());
    history.push("c".to_string());
    assert_eq!(history.len(), 2);
    assert!(!history.contains("a"));
    assert!(history.contains("b"));
    assert!(history.contains("c"));
}

#[test]
fn test_content_conservation() {
    let mut pipeline = LinePipeline::new(config());
    let input = "one\ntwo\ntwo\nthree\none\n";
    let mut out = pipeline.feed(input).unwrap();
    out.extend(pipeline.finish().unwrap());
    let joined: String = accepted(&out).iter().map(|l| format!("{}\n", l)).collect();
    assert_eq!(joined, "one\ntwo\nthree\n");
}

#[test]
fn test_lines_before_failure_are_kept() {
    let mut cfg = config();
    cfg.line_callback = Some(Arc::new(|line: &str| {
        if line == "bad" {
            Err(Error::Processing("rejected".to_string()))
        } else {
            Ok(())
        }
    }));
    let mut pipeline = LinePipeline::new(cfg);
    assert!(pipeline.feed("fine\nbad\nafter\n").is_err());

    let kept = pipeline.take_pending();
    assert_eq!(accepted(&kept), vec!["fine"]);
    assert_eq!(pipeline.accepted_lines(), 1);
    assert!(pipeline.take_pending().is_empty());
}

#[test]
fn test_lines_before_panic_are_kept() {
    let mut cfg = config();
    cfg.noise = Arc::new(|line: &str| -> bool {
        if line == "boom" {
            panic!("predicate exploded");
        }
        false
    });
    let mut pipeline = LinePipeline::new(cfg);
    assert!(contain_panic(|| pipeline.feed("first\nboom\n")).is_err());
    assert_eq!(accepted(&pipeline.take_pending()), vec!["first"]);
}

#[test]
fn test_exit_echo_dropped_once() {
    let mut pipeline = LinePipeline::new(config());
    let out = pipeline.feed("answer\n").unwrap();
    assert_eq!(accepted(&out), vec!["answer"]);

    pipeline.expect_echo("exit\r");
    let out = pipeline.feed("exit\r\nexit\n").unwrap();
    // The echo is dropped; a later identical line is real output
    assert_eq!(accepted(&out), vec!["exit"]);
    assert_eq!(pipeline.accepted_lines(), 2);
}

#[test]
fn test_exit_echo_only_matches_whole_line() {
    let mut pipeline = LinePipeline::new(config());
    pipeline.expect_echo("/quit\r");
    let out = pipeline.feed("type /quit to leave\n/quit\n").unwrap();
    assert_eq!(accepted(&out), vec!["type /quit to leave"]);
}
