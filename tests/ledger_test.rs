use relgate::domain::Version;
use relgate::git::mock::pad_hash;
use relgate::git::MockGitProvider;
use relgate::ledger::{MockReleaseProvider, ReleaseLedger, ReleaseProvider};
use relgate::RelgateError;
use std::fs;
use tempfile::TempDir;

fn upload(provider: &MockReleaseProvider, tag: &str, name: &str, content: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    let release = provider.get_release_by_tag(tag).unwrap();
    provider.upload_release_artifact(&release, name, &path).unwrap();
}

#[test]
fn test_already_released_matches_head_commit_only() {
    let provider = MockReleaseProvider::new();
    provider.create_release("v1.0.0", &pad_hash("a1")).unwrap();
    provider.create_release("v1.1.0", &pad_hash("b2")).unwrap();
    let ledger = ReleaseLedger::new(&provider);

    let at_first = MockGitProvider::new().commit("a1", "initial");
    let check = ledger.already_released(&at_first).unwrap();
    assert!(check.released);
    assert_eq!(check.tag, "v1.0.0");

    let unreleased = MockGitProvider::new().commit("c3", "new work");
    let check = ledger.already_released(&unreleased).unwrap();
    assert!(!check.released);
    assert_eq!(check.tag, "");
}

#[test]
fn test_promote_pull_request_build_to_release() {
    let pr_host = MockReleaseProvider::new();
    let pr_release = pr_host.create_release("v1.3.0-pr.42", &pad_hash("b2")).unwrap();
    upload(&pr_host, "v1.3.0-pr.42", "app-linux-amd64.tar.gz", "archive");
    upload(&pr_host, "v1.3.0-pr.42", "app-linux-amd64.sha256", "digest");
    let pr_release = pr_host.get_release_by_tag(&pr_release.tag).unwrap();

    let release_host = MockReleaseProvider::new();
    let ledger = ReleaseLedger::new(&release_host);
    let draft = ledger.ensure_release("v1.3.0-rc", &pad_hash("c3")).unwrap();
    ledger.copy_artifacts(&pr_host, &pr_release, &draft).unwrap();

    let retagged = release_host
        .tag_release(&draft, &Version::new(1, 3, 0), &pad_hash("c3"))
        .unwrap();
    assert_eq!(retagged.tag, "v1.3.0");

    let expected = vec![
        "app-linux-amd64.tar.gz".to_string(),
        "app-linux-amd64.sha256".to_string(),
    ];
    let published = ledger.finalize(&retagged, &expected).unwrap();
    assert!(!published.draft);
    assert_eq!(
        release_host.artifact_content("v1.3.0", "app-linux-amd64.tar.gz"),
        Some(b"archive".to_vec())
    );
}

#[test]
fn test_copy_is_idempotent_on_rerun() {
    let from_host = MockReleaseProvider::new();
    from_host.create_release("v2.0.0-pr.1", &pad_hash("aa")).unwrap();
    upload(&from_host, "v2.0.0-pr.1", "pkg.tar.gz", "bytes");
    let from = from_host.get_release_by_tag("v2.0.0-pr.1").unwrap();

    let to_host = MockReleaseProvider::new();
    let ledger = ReleaseLedger::new(&to_host);
    let to = ledger.ensure_release("v2.0.0", &pad_hash("aa")).unwrap();

    ledger.copy_artifacts(&from_host, &from, &to).unwrap();
    ledger.copy_artifacts(&from_host, &from, &to).unwrap();
    assert_eq!(to_host.upload_count(), 1);
}

#[test]
fn test_finalize_names_missing_artifact() {
    let provider = MockReleaseProvider::new();
    let ledger = ReleaseLedger::new(&provider);
    let draft = ledger.ensure_release("v0.2.0", &pad_hash("dd")).unwrap();

    let err = ledger
        .finalize(&draft, &["app-darwin-arm64.tar.gz".to_string()])
        .unwrap_err();
    assert!(matches!(err, RelgateError::ReleaseNotFound(_)));
    assert!(err.to_string().contains("app-darwin-arm64.tar.gz"));
    assert!(provider.get_release_by_tag("v0.2.0").unwrap().draft);
}
