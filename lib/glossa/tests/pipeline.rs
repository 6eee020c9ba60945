//! End-to-end runs of the vocabulary job against real files.

use glossa::constants::SUCCESS_MARKER;
use glossa::{
    read_tokens, read_vocabulary, ExecutionContext, GlossaError, JobConfig, JobReport, RuntimeOptions,
    TokenizeError, Tokenizer, VocabularyJob, WordTokenizer,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: TempDir::new().unwrap() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn corpus(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut text = lines.join("\n");
        if !lines.is_empty() {
            text.push('\n');
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn options(&self) -> RuntimeOptions {
        RuntimeOptions::default()
            .with_workers(4)
            .with_reducers(3)
            .with_work_root(self.path("runs"))
    }
}

fn run_with<T: Tokenizer>(input: &Path, output: &Path, opts: RuntimeOptions, tokenizer: T) -> glossa::Result<JobReport> {
    let config = JobConfig::new(input.to_str().unwrap(), output.to_str().unwrap())?;
    let ctx = ExecutionContext::start(opts)?;
    let result = VocabularyJob::with_tokenizer(config, tokenizer).run(&ctx);
    ctx.stop();
    result
}

fn run(input: &Path, output: &Path, opts: RuntimeOptions) -> glossa::Result<JobReport> {
    run_with(input, output, opts, WordTokenizer::default())
}

fn set(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Panics on lines containing `trigger` until its crash budget is spent.
struct CrashingTokenizer {
    trigger: &'static str,
    crashes_left: AtomicUsize,
}

impl CrashingTokenizer {
    fn new(trigger: &'static str, crashes: usize) -> Self {
        Self { trigger, crashes_left: AtomicUsize::new(crashes) }
    }
}

impl Tokenizer for CrashingTokenizer {
    fn tokenize<F>(&self, line: &str, emit: &mut F) -> Result<(), TokenizeError>
    where
        F: FnMut(&str),
    {
        if line.contains(self.trigger)
            && self.crashes_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
        {
            panic!("simulated worker crash");
        }
        WordTokenizer::default().tokenize(line, emit)
    }
}

#[test]
fn scenario_a_dedups_across_lines() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["the cat sat", "the dog ran"]);
    let output = ws.path("out");
    let report = run(&input, &output, ws.options()).unwrap();

    assert_eq!(read_vocabulary(&output).unwrap(), set(&["the", "cat", "sat", "dog", "ran"]));
    assert_eq!(report.distinct_tokens(), 5);
    assert_eq!(report.map.lines, 2);
    assert_eq!(report.map.tokens_emitted, 6);
    assert!(output.join(SUCCESS_MARKER).is_file());
}

#[test]
fn scenario_b_strips_punctuation() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["Hello, world! Hello?"]);
    let output = ws.path("out");
    run(&input, &output, ws.options()).unwrap();
    assert_eq!(read_vocabulary(&output).unwrap(), set(&["Hello", "world"]));
}

#[test]
fn scenario_c_empty_corpus_writes_empty_vocabulary() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &[]);
    let output = ws.path("out");
    let report = run(&input, &output, ws.options()).unwrap();

    assert!(output.is_dir());
    assert!(output.join(SUCCESS_MARKER).is_file());
    assert!(read_tokens(&output).unwrap().is_empty());
    assert_eq!(report.partitions, 0);
    assert_eq!(report.distinct_tokens(), 0);
    assert_eq!(report.reduce.reducers, 3);
}

#[test]
fn scenario_d_stale_output_is_removed() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["one two"]);
    let output = ws.path("out");
    fs::create_dir_all(output.join("nested")).unwrap();
    fs::write(output.join("old.txt"), "stale\nwords\n").unwrap();
    fs::write(output.join("part-00009"), "ghost\n").unwrap();
    fs::write(output.join("nested/part-00000"), "deeper\n").unwrap();

    let report = run(&input, &output, ws.options()).unwrap();

    assert!(report.cleared_previous_output);
    assert!(!output.join("old.txt").exists());
    assert!(!output.join("nested").exists());
    assert!(!output.join("part-00009").exists());
    assert_eq!(read_vocabulary(&output).unwrap(), set(&["one", "two"]));
}

#[test]
fn output_that_was_a_plain_file_is_replaced() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["alpha beta"]);
    let output = ws.path("out");
    fs::write(&output, "not a directory").unwrap();
    run(&input, &output, ws.options()).unwrap();
    assert!(output.is_dir());
    assert_eq!(read_vocabulary(&output).unwrap(), set(&["alpha", "beta"]));
}

#[test]
fn reruns_are_idempotent() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["a b c", "c d e", "e f a"]);
    let output = ws.path("out");

    run(&input, &output, ws.options()).unwrap();
    let first = read_vocabulary(&output).unwrap();
    let mut first_files: Vec<_> = fs::read_dir(&output).unwrap().map(|e| e.unwrap().file_name()).collect();
    first_files.sort();

    let report = run(&input, &output, ws.options()).unwrap();
    let second = read_vocabulary(&output).unwrap();
    let mut second_files: Vec<_> = fs::read_dir(&output).unwrap().map(|e| e.unwrap().file_name()).collect();
    second_files.sort();

    assert!(report.cleared_previous_output);
    assert_eq!(first, second);
    assert_eq!(first_files, second_files);
}

#[test]
fn every_token_appears_exactly_once_across_fragments() {
    let ws = Workspace::new();
    let lines: Vec<String> = (0..400)
        .map(|i| format!("w{} w{} shared line{} w{}", i % 37, i % 11, i, (i * 7) % 53))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let input = ws.corpus("in.txt", &refs);
    let output = ws.path("out");
    let opts = ws.options().with_split_bytes(256).with_reducers(5);
    let report = run(&input, &output, opts).unwrap();

    let tokens = read_tokens(&output).unwrap();
    let unique: HashSet<_> = tokens.iter().cloned().collect();
    assert_eq!(tokens.len(), unique.len(), "duplicate token across fragments");

    let tokenizer = WordTokenizer::default();
    let expected: HashSet<String> = refs
        .iter()
        .flat_map(|l| tokenizer.tokens(l).map(str::to_owned).collect::<Vec<_>>())
        .collect();
    assert_eq!(unique, expected);
    assert_eq!(report.distinct_tokens() as usize, expected.len());
    assert!(report.partitions > 1);
}

#[test]
fn split_size_does_not_change_the_vocabulary() {
    let ws = Workspace::new();
    let input = ws.corpus(
        "in.txt",
        &["Det var en gång", "en katt som hette Måns.", "", "Måns, katt! 42 gånger\r", "sista raden"],
    );
    let baseline_out = ws.path("baseline");
    run(&input, &baseline_out, ws.options()).unwrap();
    let baseline = read_vocabulary(&baseline_out).unwrap();
    assert!(baseline.contains("Måns"));
    assert!(baseline.contains("42"));

    for split in [1u64, 2, 3, 7, 16, 64] {
        let out = ws.path(&format!("out-{split}"));
        let report = run(&input, &out, ws.options().with_split_bytes(split)).unwrap();
        assert_eq!(read_vocabulary(&out).unwrap(), baseline, "split size {split}");
        assert_eq!(report.map.lines, 5, "split size {split}");
    }
}

#[test]
fn directory_input_reads_every_data_file() {
    let ws = Workspace::new();
    ws.corpus("corpus/a.txt", &["apple banana"]);
    ws.corpus("corpus/nested/b.txt", &["cherry apple"]);
    ws.corpus("corpus/_SUCCESS", &["ignored marker"]);
    ws.corpus("corpus/.hidden", &["ignored hidden"]);
    let output = ws.path("out");
    let report = run(&ws.path("corpus"), &output, ws.options()).unwrap();

    assert_eq!(report.input_files, 2);
    assert_eq!(read_vocabulary(&output).unwrap(), set(&["apple", "banana", "cherry"]));
}

#[test]
fn previous_output_can_be_used_as_input() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["red green", "blue red"]);
    let first = ws.path("first");
    run(&input, &first, ws.options()).unwrap();
    let second = ws.path("second");
    run(&first, &second, ws.options()).unwrap();
    assert_eq!(read_vocabulary(&second).unwrap(), set(&["red", "green", "blue"]));
}

#[test]
fn invalid_utf8_lines_are_skipped_and_counted() {
    let ws = Workspace::new();
    let input = ws.path("in.txt");
    let mut bytes = b"good words\n".to_vec();
    bytes.extend_from_slice(b"broken \xff\xfe line\n");
    bytes.extend_from_slice(b"more words\n");
    fs::write(&input, bytes).unwrap();
    let output = ws.path("out");

    let report = run(&input, &output, ws.options()).unwrap();

    assert_eq!(report.map.tokenize_failures, 1);
    assert_eq!(report.map.lines, 3);
    assert_eq!(read_vocabulary(&output).unwrap(), set(&["good", "words", "more"]));
}

#[test]
fn crashed_partition_is_recomputed() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["alpha beta", "gamma crash delta", "epsilon alpha"]);
    let output = ws.path("out");
    let opts = ws.options().with_split_bytes(8).with_max_attempts(3);

    let report = run_with(&input, &output, opts, CrashingTokenizer::new("crash", 2)).unwrap();

    assert_eq!(report.map.retries, 2);
    assert_eq!(report.partition_retries(), 2);
    assert_eq!(
        read_vocabulary(&output).unwrap(),
        set(&["alpha", "beta", "gamma", "crash", "delta", "epsilon"])
    );
    assert_eq!(read_tokens(&output).unwrap().len(), 6);
}

#[test]
fn exhausted_retries_fail_without_output() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["fine line", "always crash here"]);
    let output = ws.path("out");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("old.txt"), "stale").unwrap();
    let opts = ws.options().with_max_attempts(2);

    let err = run_with(&input, &output, opts, CrashingTokenizer::new("crash", usize::MAX)).unwrap_err();

    match err {
        GlossaError::Partition { attempts, reason, .. } => {
            assert_eq!(attempts, 2);
            assert!(reason.contains("simulated worker crash"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists(), "a failed map stage must not leave output behind");
}

#[test]
fn missing_input_is_a_storage_failure() {
    let ws = Workspace::new();
    let output = ws.path("out");
    let err = run(&ws.path("does-not-exist"), &output, ws.options()).unwrap_err();
    assert!(err.is_storage(), "{err}");
    assert!(!output.exists());
}

#[test]
fn input_inside_output_is_refused_and_left_intact() {
    let ws = Workspace::new();
    let input = ws.corpus("out/corpus.txt", &["keep me"]);
    let output = ws.path("out");

    let err = run(&input, &output, ws.options()).unwrap_err();

    assert!(matches!(err, GlossaError::Config(_)), "{err}");
    assert!(input.is_file());
    assert_eq!(fs::read_to_string(&input).unwrap(), "keep me\n");
    assert!(!output.join(SUCCESS_MARKER).exists());
}

#[test]
fn scratch_space_is_cleaned_after_a_run() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["x y z"]);
    run(&input, &ws.path("out"), ws.options()).unwrap();
    assert!(!ws.path("runs").exists());
}

#[test]
fn case_is_kept_distinct() {
    let ws = Workspace::new();
    let input = ws.corpus("in.txt", &["The the THE"]);
    let output = ws.path("out");
    run(&input, &output, ws.options()).unwrap();
    assert_eq!(read_vocabulary(&output).unwrap(), set(&["The", "the", "THE"]));
}
