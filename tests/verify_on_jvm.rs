//! Run rewritten `javac` output on a real JVM, with every class verified
//!
//! Needs `javac` and `java` on the path. Without them, the test returns early.

use slot_rewriter::rewrite::{rewrite_class, FramePolicy, Settings, SlotStrategy};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const SAMPLE_SOURCE: &str = include_str!("java/Sample.java");

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn java_available() -> bool {
    ["javac", "java"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .output()
            .map_or(false, |output| output.status.success())
    })
}

fn assert_success(tool: &str, output: &Output) {
    assert!(
        output.status.success(),
        "{} failed:\n{}",
        tool,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Compile `Sample.java` (with debug information) into `directory`
fn compile_sample(directory: &Path) {
    let source = directory.join("Sample.java");
    fs::write(&source, SAMPLE_SOURCE).unwrap();
    let output = Command::new("javac")
        .arg("-g")
        .arg("-d")
        .arg(directory)
        .arg(&source)
        .output()
        .unwrap();
    assert_success("javac", &output);
}

/// Run `Sample` with bytecode verification forced on, returning its stdout
fn run_sample(class_path: &Path) -> String {
    let output = Command::new("java")
        .arg("-Xverify:all")
        .arg("-cp")
        .arg(class_path)
        .arg("Sample")
        .output()
        .unwrap();
    assert_success("java", &output);
    String::from_utf8(output.stdout).unwrap()
}

/// Rewrite every class file in `from` (`times` times over) into `to`
fn rewrite_directory(from: &Path, to: &Path, settings: &Settings, times: usize) -> usize {
    fs::create_dir_all(to).unwrap();
    let mut rewritten = 0;
    for entry in fs::read_dir(from).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().map_or(false, |extension| extension == "class") {
            let original = fs::read(&path).unwrap();
            let mut bytes = original.clone();
            for _ in 0..times {
                bytes = rewrite_class(&bytes, settings).unwrap();
            }
            assert_ne!(bytes, original, "{:?} was not changed", path);
            fs::write(to.join(path.file_name().unwrap()), bytes).unwrap();
            rewritten += 1;
        }
    }
    rewritten
}

#[test]
fn rewritten_javac_output_verifies_and_behaves_the_same() {
    init_logging();
    if !java_available() {
        eprintln!("Skipping: `javac` or `java` is not on the path");
        return;
    }

    let scratch = tempfile::tempdir().unwrap();
    let original = scratch.path().join("original");
    fs::create_dir(&original).unwrap();
    compile_sample(&original);
    let expected = run_sample(&original);
    assert!(expected.starts_with("positive empty\n10\n"), "{}", expected);
    assert!(expected.contains("firstsecondother\n10 11 12 -1 \n"), "{}", expected);

    let reject = Settings {
        strategy: SlotStrategy::Prepend,
        frame_policy: FramePolicy::Reject,
    };
    let variants = [
        ("prepend", Settings::new(SlotStrategy::Prepend), 1),
        ("append", Settings::new(SlotStrategy::Append), 1),
        ("prepend-reject", reject, 1),
        ("prepend-twice", Settings::new(SlotStrategy::Prepend), 2),
        ("append-twice", Settings::new(SlotStrategy::Append), 2),
    ];
    for (name, settings, times) in variants {
        let directory = scratch.path().join(name);
        let count = rewrite_directory(&original, &directory, &settings, times);
        assert_eq!(count, 1, "{}", name);
        assert_eq!(run_sample(&directory), expected, "output of the {} classes", name);
    }
}
