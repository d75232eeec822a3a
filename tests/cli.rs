use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("crag");
    path
}

fn run_crag(dir: &Path, config_path: &Path, args: &[&str], env: &[(&str, &str)]) -> (String, String, bool) {
    let binary = crag_binary();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(dir)
        .arg("--config")
        .arg(config_path)
        .args(args);
    for key in [
        "GEMINI_API_KEY",
        "HF_TOKEN",
        "CHUNK_SIZE",
        "CHUNK_OVERLAP",
        "SEARCH_K",
        "BIND_ADDR",
        "MARKDOWN_DIR",
        "INDEX_DIR",
        "UPLOAD_DIR",
        "LOG_DIR",
    ] {
        cmd.env_remove(key);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crag binary at {:?}: {}", binary, e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_config_defaults_when_file_missing() {
    let tmp = TempDir::new().unwrap();
    let (stdout, stderr, ok) = run_crag(tmp.path(), &tmp.path().join("absent.toml"), &["config"], &[]);
    assert!(ok, "config failed: {}", stderr);
    assert!(stdout.contains("bind = \"0.0.0.0:8001\""));
    assert!(stdout.contains("chunk_size = 1000"));
    assert!(stdout.contains("api_key = \"<unset>\""));
}

#[test]
fn test_config_masks_credentials_and_applies_env() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("crag.toml");
    fs::write(
        &config_path,
        "[chunking]\nchunk_size = 800\nchunk_overlap = 100\n\n[retrieval]\nsearch_k = 6\n",
    )
    .unwrap();

    let (stdout, stderr, ok) = run_crag(
        tmp.path(),
        &config_path,
        &["config"],
        &[("GEMINI_API_KEY", "super-secret"), ("SEARCH_K", "2")],
    );
    assert!(ok, "config failed: {}", stderr);
    assert!(stdout.contains("chunk_size = 800"));
    assert!(stdout.contains("search_k = 2"));
    assert!(stdout.contains("api_key = \"***\""));
    assert!(!stdout.contains("super-secret"));
}

#[test]
fn test_invalid_chunking_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("crag.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

    let (_, stderr, ok) = run_crag(tmp.path(), &config_path, &["config"], &[]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_placeholder_key_counts_as_unset() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, ok) = run_crag(
        tmp.path(),
        &tmp.path().join("absent.toml"),
        &["config"],
        &[("GEMINI_API_KEY", "your_gemini_api_key_here")],
    );
    assert!(ok);
    assert!(stdout.contains("api_key = \"<unset>\""));
}

#[test]
fn test_rebuild_fails_when_index_file_cannot_be_opened() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_string_lossy().replace('\\', "/");
    let config_path = tmp.path().join("crag.toml");
    fs::write(
        &config_path,
        format!(
            "[paths]\nmarkdown_dir = \"{root}/docs\"\nindex_dir = \"{root}/index\"\nupload_dir = \"{root}/uploads\"\nlog_dir = \"{root}/logs\"\n"
        ),
    )
    .unwrap();
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("docs/README.md"), "# OSSU\n\nFree computer science.").unwrap();
    // A directory where the SQLite file should be.
    fs::create_dir_all(tmp.path().join("index/index.sqlite")).unwrap();

    let (stdout, stderr, ok) = run_crag(tmp.path(), &config_path, &["rebuild"], &[]);
    assert!(!ok, "rebuild should fail, stdout: {}", stdout);
    assert!(!stdout.contains("Rebuild complete"));
    assert!(stderr.contains("cannot open index file"), "stderr: {}", stderr);
}
