//! Integration tests for fs-walker
//!
//! All trees are built in temporary directories.

use fs_walker::config::compile_patterns;
use fs_walker::pool::{Quiescence, Task, Termination, WorkerPool};
use fs_walker::walker::RecursiveWalker;
use fs_walker::{TaskError, WalkSummary};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

type Seen = Arc<Mutex<HashMap<PathBuf, u64>>>;

/// Walk `root` and collect every reported file with its size
fn collect(walker: &RecursiveWalker, root: &Path) -> (WalkSummary, HashMap<PathBuf, u64>) {
    let seen: Seen = Arc::new(Mutex::new(HashMap::new()));
    let duplicates = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    let dup_sink = Arc::clone(&duplicates);
    let summary = walker
        .walk_dir(root, move |path: &Path, size: u64| {
            if sink.lock().insert(path.to_path_buf(), size).is_some() {
                dup_sink.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    assert_eq!(duplicates.load(Ordering::SeqCst), 0, "files reported twice");
    let files = seen.lock().clone();
    (summary, files)
}

/// root/{a.txt:10, sub/{b.txt:20, sub2/c.txt:5}}
fn small_tree() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), vec![b'a'; 10]).unwrap();
    fs::create_dir_all(dir.path().join("sub/sub2")).unwrap();
    fs::write(dir.path().join("sub/b.txt"), vec![b'b'; 20]).unwrap();
    fs::write(dir.path().join("sub/sub2/c.txt"), vec![b'c'; 5]).unwrap();
    dir
}

/// A chain of nested directories `d1/d2/.../dN`, one file per level
fn deep_tree(depth: usize) -> TempDir {
    let dir = tempdir().unwrap();
    let mut current = dir.path().to_path_buf();
    fs::write(current.join("f0"), b"x").unwrap();
    for level in 1..=depth {
        current = current.join(format!("d{}", level));
        fs::create_dir(&current).unwrap();
        fs::write(current.join(format!("f{}", level)), b"x").unwrap();
    }
    dir
}

#[test]
fn test_walk_reports_every_file_with_size() {
    let dir = small_tree();
    let walker = RecursiveWalker::new(2);

    let (summary, files) = collect(&walker, dir.path());

    assert_eq!(files.len(), 3);
    assert_eq!(files[&dir.path().join("a.txt")], 10);
    assert_eq!(files[&dir.path().join("sub/b.txt")], 20);
    assert_eq!(files[&dir.path().join("sub/sub2/c.txt")], 5);
    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.total_bytes, 35);
    assert_eq!(summary.total_dirs, 3);
    assert_eq!(summary.errors, 0);
    assert!(summary.completed);
}

#[test]
fn test_max_level_zero_lists_root_only() {
    let dir = small_tree();
    let walker = RecursiveWalker::new(2).max_level(0);

    let (summary, files) = collect(&walker, dir.path());

    assert_eq!(files.len(), 1);
    assert!(files.contains_key(&dir.path().join("a.txt")));
    assert_eq!(summary.total_dirs, 1);
    assert_eq!(summary.pruned, 1);
}

#[test]
fn test_default_depth_limit() {
    let dir = deep_tree(7);
    let walker = RecursiveWalker::new(4);

    let (summary, files) = collect(&walker, dir.path());

    // Levels 0..=4 are opened; d5 is pruned unopened
    assert_eq!(walker.max_depth(), 4);
    assert_eq!(files.len(), 5);
    assert_eq!(summary.total_dirs, 5);
    assert_eq!(summary.pruned, 1);
    assert!(files.keys().all(|p| {
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        ["f0", "f1", "f2", "f3", "f4"].contains(&name.as_str())
    }));
}

#[test]
fn test_sizes_independent_of_worker_count() {
    let dir = tempdir().unwrap();
    let mut expected_bytes = 0u64;
    let mut expected_files = 0usize;
    for i in 0..8 {
        let sub = dir.path().join(format!("dir{}", i));
        fs::create_dir_all(sub.join("inner")).unwrap();
        for j in 0..5 {
            let size = (i * 10 + j) as usize;
            fs::write(sub.join(format!("file{}", j)), vec![0u8; size]).unwrap();
            fs::write(sub.join("inner").join(format!("file{}", j)), vec![0u8; size]).unwrap();
            expected_bytes += 2 * size as u64;
            expected_files += 2;
        }
    }

    for workers in [1, 4, 16] {
        let walker = RecursiveWalker::new(workers);
        let (summary, files) = collect(&walker, dir.path());

        assert_eq!(files.len(), expected_files, "workers = {}", workers);
        assert_eq!(files.values().sum::<u64>(), expected_bytes);
        assert_eq!(summary.total_bytes, expected_bytes);
        assert_eq!(summary.workers, workers);
    }
}

#[test]
fn test_missing_root_is_observable_but_not_fatal() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let walker = RecursiveWalker::new(2).on_error(move |err: &TaskError| {
        sink.lock().push(err.path().cloned());
    });

    let (summary, files) = collect(&walker, &missing);

    assert!(files.is_empty());
    assert_eq!(summary.errors, 1);
    assert!(summary.completed);
    assert_eq!(failures.lock().as_slice(), &[Some(missing)]);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_does_not_abort_walk() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("visible.txt"), b"12345").unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("hidden.txt"), b"nope").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not stop a privileged user
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let denied = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&denied);
    let walker = RecursiveWalker::new(2).on_error(move |err: &TaskError| {
        if err.is_permission_denied() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let (summary, files) = collect(&walker, dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[&dir.path().join("visible.txt")], 5);
    assert_eq!(summary.errors, 1);
    assert_eq!(denied.load(Ordering::SeqCst), 1);
}

#[test]
fn test_idle_timeout_termination() {
    let dir = small_tree();
    let walker = RecursiveWalker::new(2)
        .termination(Termination::IdleTimeout(Duration::from_millis(200)));

    let (summary, files) = collect(&walker, dir.path());

    assert_eq!(files.len(), 3);
    assert_eq!(summary.total_bytes, 35);
    assert!(summary.completed);
}

#[test]
fn test_walk_dir_serialized_runs_on_caller_thread() {
    let dir = small_tree();
    let walker = RecursiveWalker::new(4);
    let caller = std::thread::current().id();

    let mut lines = Vec::new();
    let summary = walker
        .walk_dir_serialized(dir.path(), |path: &Path, size: u64| {
            assert_eq!(std::thread::current().id(), caller);
            lines.push(format!("{} {}", path.display(), size));
        })
        .unwrap();

    lines.sort();
    assert_eq!(lines.len(), 3);
    assert_eq!(summary.total_files, 3);
    assert!(lines.contains(&format!("{} 10", dir.path().join("a.txt").display())));
}

#[test]
fn test_exclude_patterns_skip_subtrees() {
    let dir = small_tree();
    let patterns = compile_patterns(&["/sub$".to_string()]).unwrap();
    let walker = RecursiveWalker::new(2).exclude_patterns(patterns);

    let (summary, files) = collect(&walker, dir.path());

    assert_eq!(files.len(), 1);
    assert_eq!(summary.excluded, 1);
    assert_eq!(summary.total_dirs, 1);
}

#[test]
fn test_wide_tree_does_not_deadlock() {
    // More subdirectories than the queue holds, with few workers
    let dir = tempdir().unwrap();
    for i in 0..600 {
        let sub = dir.path().join(format!("d{:04}", i));
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("f"), b"ab").unwrap();
    }

    let walker = RecursiveWalker::new(2);
    let (summary, files) = collect(&walker, dir.path());

    assert_eq!(files.len(), 600);
    assert_eq!(summary.total_bytes, 1200);
    assert_eq!(summary.total_dirs, 601);
    assert!(summary.completed);
}

#[test]
fn test_walker_is_reusable() {
    let dir = small_tree();
    let walker = RecursiveWalker::new(3);

    let (first, _) = collect(&walker, dir.path());
    let (second, _) = collect(&walker, dir.path());

    assert_eq!(first.total_bytes, second.total_bytes);
    assert_eq!(second.total_files, 3);
}

#[test]
fn test_concurrent_walks_on_shared_walker_keep_separate_totals() {
    let big = tempdir().unwrap();
    for i in 0..200 {
        fs::write(big.path().join(format!("f{:03}", i)), vec![0u8; 10]).unwrap();
    }
    let small = tempdir().unwrap();
    fs::write(small.path().join("only"), vec![0u8; 7]).unwrap();

    let walker = Arc::new(RecursiveWalker::new(4));
    for _ in 0..20 {
        let (a, b) = thread::scope(|scope| {
            let a = scope.spawn(|| walker.walk_dir(big.path(), |_: &Path, _: u64| {}));
            let b = scope.spawn(|| walker.walk_dir(small.path(), |_: &Path, _: u64| {}));
            (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
        });

        assert_eq!(a.total_bytes, 2000);
        assert_eq!(a.total_files, 200);
        assert_eq!(b.total_bytes, 7);
        assert_eq!(b.total_files, 1);
    }
}

#[cfg(unix)]
#[test]
fn test_follow_links_symlink_loop_reports_each_file_once() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"abc").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/b.txt"), b"def").unwrap();
    std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

    let walker = RecursiveWalker::new(4).follow_links(true);
    let (summary, files) = collect(&walker, dir.path());

    assert_eq!(files.len(), 2);
    assert_eq!(files[&dir.path().join("a.txt")], 3);
    assert_eq!(files[&dir.path().join("sub/b.txt")], 3);
    assert_eq!(summary.total_bytes, 6);
    assert_eq!(summary.total_dirs, 2);
    assert!(summary.completed);
}

#[cfg(unix)]
#[test]
fn test_file_symlink_reported_at_target_size_when_followed() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("target.bin"), vec![1u8; 5]).unwrap();
    std::os::unix::fs::symlink(dir.path().join("target.bin"), dir.path().join("link.bin"))
        .unwrap();

    let (plain, files) = collect(&RecursiveWalker::new(2), dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(plain.total_bytes, 5);

    let walker = RecursiveWalker::new(2).follow_links(true);
    let (followed, files) = collect(&walker, dir.path());
    assert_eq!(files.len(), 2);
    assert_eq!(files[&dir.path().join("link.bin")], 5);
    assert_eq!(followed.total_bytes, 10);
}

#[test]
fn test_callback_panic_is_counted_and_walk_continues() {
    let dir = small_tree();
    let bad = dir.path().join("sub/b.txt");

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let walker = RecursiveWalker::new(2).on_error(move |err: &TaskError| {
        sink.lock().push(err.path().cloned());
    });

    let reported = Arc::new(Mutex::new(Vec::new()));
    let reported_sink = Arc::clone(&reported);
    let panic_on = bad.clone();
    let summary = walker
        .walk_dir(dir.path(), move |path: &Path, _: u64| {
            if path == panic_on {
                panic!("cannot handle {}", path.display());
            }
            reported_sink.lock().push(path.to_path_buf());
        })
        .unwrap();

    // The sibling subdirectory below the bad file is still walked
    assert_eq!(reported.lock().len(), 2);
    assert!(reported.lock().contains(&dir.path().join("sub/sub2/c.txt")));
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(failures.lock().as_slice(), &[Some(bad)]);
}

#[test]
fn test_pool_standalone_with_failing_tasks() {
    let pool = WorkerPool::new(4);
    pool.start().unwrap();

    let handled = Arc::new(AtomicUsize::new(0));
    for i in 0..100 {
        let handled = Arc::clone(&handled);
        pool.add_task(Task::new(
            move || {
                if i % 10 == 0 {
                    Err(TaskError::Execution(format!("task {}", i)))
                } else {
                    Ok(())
                }
            },
            move |_| {
                handled.fetch_add(1, Ordering::SeqCst);
            },
        ));
    }

    assert_eq!(pool.wait(Termination::Drained), Quiescence::Drained);
    pool.join().unwrap();

    assert_eq!(handled.load(Ordering::SeqCst), 10);
    assert_eq!(pool.stats().completed(), 100);
}
