//! Synchronizer behaviour against an in-memory content store.
//!
//! The fake store enforces the same optimistic-concurrency rules as the
//! contents API: creates must not carry a sha, updates must carry the
//! current one.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use asset_publish::assets::AssetRecord;
use asset_publish::config::Credentials;
use asset_publish::{
    ContentStore, PreconditionError, RemoteState, StoreError, Synchronizer, UpsertAction,
    VersionToken, WriteRequest,
};

#[derive(Default)]
struct MemoryStore {
    objects: RefCell<BTreeMap<String, (Vec<u8>, VersionToken)>>,
    next_rev: Cell<u32>,
    probes: RefCell<Vec<String>>,
    writes: RefCell<Vec<(String, WriteRequest)>>,
    failing: RefCell<HashMap<String, StoreError>>,
}

impl MemoryStore {
    fn seed(&self, path: &str, content: &[u8], token: &str) {
        self.objects
            .borrow_mut()
            .insert(path.to_string(), (content.to_vec(), VersionToken::new(token)));
        // "v1" seeded means the next revision is "v2".
        if let Some(n) = token.strip_prefix('v').and_then(|n| n.parse::<u32>().ok()) {
            self.next_rev.set(self.next_rev.get().max(n));
        }
    }

    fn fail_put(&self, path: &str, err: StoreError) {
        self.failing.borrow_mut().insert(path.to_string(), err);
    }

    fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.borrow().get(path).map(|(c, _)| c.clone())
    }

    fn request_count(&self) -> usize {
        self.probes.borrow().len() + self.writes.borrow().len()
    }
}

impl ContentStore for MemoryStore {
    fn probe(&self, path: &str) -> RemoteState {
        self.probes.borrow_mut().push(path.to_string());
        match self.objects.borrow().get(path) {
            Some((_, token)) => RemoteState::Present(token.clone()),
            None => RemoteState::Absent,
        }
    }

    fn put(&self, path: &str, request: &WriteRequest) -> Result<VersionToken, StoreError> {
        self.writes
            .borrow_mut()
            .push((path.to_string(), request.clone()));
        if let Some(err) = self.failing.borrow().get(path) {
            return Err(err.clone());
        }

        let current = self.objects.borrow().get(path).map(|(_, t)| t.clone());
        match (&current, &request.sha) {
            (None, Some(_)) => {
                return Err(StoreError::Rejected {
                    status: 422,
                    message: "sha given for a file that does not exist".into(),
                })
            }
            (Some(_), None) => {
                return Err(StoreError::Conflict("\"sha\" wasn't supplied.".into()))
            }
            (Some(cur), Some(sent)) if cur != sent => {
                return Err(StoreError::Conflict(format!("{path} is at {cur} but expected {sent}")))
            }
            _ => {}
        }

        let rev = self.next_rev.get() + 1;
        self.next_rev.set(rev);
        let token = VersionToken::new(format!("v{rev}"));
        let content = request.decoded_content().expect("valid base64");
        self.objects
            .borrow_mut()
            .insert(path.to_string(), (content, token.clone()));
        Ok(token)
    }
}

fn credentials(token: &str) -> Credentials {
    Credentials {
        api_base: "https://api.github.com".into(),
        owner: "octo".into(),
        repo: "gallery".into(),
        token: token.into(),
        branch: "main".into(),
    }
}

fn asset(name: &str, content: &[u8]) -> AssetRecord {
    AssetRecord::new("assets/images", name, content.to_vec())
}

fn synchronizer(store: &MemoryStore) -> Synchronizer<&MemoryStore> {
    Synchronizer::new(store, credentials("ghp_abcdefghijkl")).unwrap()
}

#[test]
fn absent_files_are_created_without_sha() {
    let store = MemoryStore::default();
    let sync = synchronizer(&store);

    let summary = sync
        .run(vec![asset("a.jpg", b"aaa"), asset("b.jpg", b"bbb")])
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 0);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.action == Some(UpsertAction::Create)));

    let writes = store.writes.borrow();
    assert_eq!(writes.len(), 2);
    for (_, req) in writes.iter() {
        assert!(req.sha.is_none());
        assert_eq!(req.branch, "main");
    }
    assert_eq!(writes[0].1.message, "Upload image: a.jpg");
    assert_eq!(store.content("assets/images/b.jpg").unwrap(), b"bbb");
}

#[test]
fn existing_file_is_updated_with_its_current_token() {
    let store = MemoryStore::default();
    store.seed("assets/images/a.jpg", b"old", "v1");
    let sync = synchronizer(&store);

    assert_eq!(
        sync.probe("assets/images/a.jpg"),
        RemoteState::Present(VersionToken::new("v1"))
    );

    let summary = sync.run(vec![asset("a.jpg", b"new")]).unwrap();
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.action, Some(UpsertAction::Update));
    assert_eq!(
        store.writes.borrow()[0].1.sha,
        Some(VersionToken::new("v1"))
    );

    let new_version = outcome.new_version().unwrap();
    assert_eq!(new_version, &VersionToken::new("v2"));
    assert_ne!(new_version, &VersionToken::new("v1"));
}

#[test]
fn probe_after_upsert_sees_the_returned_token() {
    let store = MemoryStore::default();
    let sync = synchronizer(&store);
    let path = "assets/images/a.jpg";

    let state = sync.probe(path);
    assert_eq!(state, RemoteState::Absent);
    let outcome = sync.upsert(path, b"aaa", "add a", &state);
    let written = outcome.new_version().cloned().unwrap();

    assert_eq!(sync.probe(path), RemoteState::Present(written));
}

#[test]
fn repeated_upsert_of_same_content_succeeds() {
    let store = MemoryStore::default();
    let sync = synchronizer(&store);
    let path = "assets/images/a.jpg";

    for _ in 0..2 {
        let state = sync.probe(path);
        let outcome = sync.upsert(path, b"same", "upload", &state);
        assert!(outcome.succeeded(), "{:?}", outcome.result);
    }
    // Unchanged content is still written.
    assert_eq!(store.writes.borrow().len(), 2);
    assert_eq!(store.writes.borrow()[1].1.sha, Some(VersionToken::new("v1")));
}

#[test]
fn stale_token_is_reported_as_conflict() {
    let store = MemoryStore::default();
    store.seed("assets/images/a.jpg", b"old", "v1");
    let sync = synchronizer(&store);

    let state = sync.probe("assets/images/a.jpg");
    // Someone else writes between our probe and our write.
    store.seed("assets/images/a.jpg", b"theirs", "v7");

    let outcome = sync.upsert("assets/images/a.jpg", b"ours", "upload", &state);
    assert!(matches!(outcome.error(), Some(StoreError::Conflict(_))));
    assert_eq!(store.content("assets/images/a.jpg").unwrap(), b"theirs");
}

#[test]
fn one_failure_does_not_stop_the_batch() {
    let store = MemoryStore::default();
    store.fail_put(
        "assets/images/b.jpg",
        StoreError::Unauthorized {
            status: 401,
            message: "Bad credentials".into(),
        },
    );
    let sync = synchronizer(&store);

    let names = ["a.jpg", "b.jpg", "c.jpg", "d.jpg"];
    let summary = sync
        .run(names.iter().map(|n| asset(n, n.as_bytes())).collect())
        .unwrap();

    assert_eq!(summary.outcomes.len(), 4);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(store.probes.borrow().len(), 4);

    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "assets/images/b.jpg");
    assert!(failures[0].1.to_string().contains("Bad credentials"));
    assert!(store.content("assets/images/d.jpg").is_some());
}

#[test]
fn probe_failure_skips_the_write_for_that_file() {
    struct FlakyProbe(MemoryStore);

    impl ContentStore for FlakyProbe {
        fn probe(&self, path: &str) -> RemoteState {
            if path.ends_with("a.jpg") {
                return RemoteState::ProbeFailed(StoreError::RateLimited(
                    "API rate limit exceeded".into(),
                ));
            }
            self.0.probe(path)
        }

        fn put(&self, path: &str, request: &WriteRequest) -> Result<VersionToken, StoreError> {
            self.0.put(path, request)
        }
    }

    let store = FlakyProbe(MemoryStore::default());
    let sync = Synchronizer::new(&store, credentials("ghp_abcdefghijkl")).unwrap();
    let summary = sync
        .run(vec![asset("a.jpg", b"a"), asset("b.jpg", b"b")])
        .unwrap();

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.outcomes[0].action, None);
    assert!(matches!(
        summary.outcomes[0].error(),
        Some(StoreError::RateLimited(_))
    ));
    let writes = store.0.writes.borrow();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "assets/images/b.jpg");
}

#[test]
fn outcomes_follow_path_order() {
    let store = MemoryStore::default();
    let sync = synchronizer(&store);
    let batch = || {
        vec![
            asset("c.png", b"c"),
            asset("a.jpg", b"a"),
            asset("b.gif", b"b"),
        ]
    };

    let first: Vec<_> = sync
        .run(batch())
        .unwrap()
        .outcomes
        .into_iter()
        .map(|o| o.path)
        .collect();
    let second: Vec<_> = sync
        .run(batch())
        .unwrap()
        .outcomes
        .into_iter()
        .map(|o| o.path)
        .collect();

    assert_eq!(
        first,
        [
            "assets/images/a.jpg",
            "assets/images/b.gif",
            "assets/images/c.png"
        ]
    );
    assert_eq!(first, second);
}

#[test]
fn empty_token_aborts_before_any_request() {
    let store = MemoryStore::default();
    let result = Synchronizer::new(&store, credentials(""));

    assert!(matches!(result, Err(PreconditionError::MissingToken)));
    assert_eq!(store.request_count(), 0);
}

#[test]
fn dry_run_probes_but_never_writes() {
    let store = MemoryStore::default();
    store.seed("assets/images/b.jpg", b"old", "v1");
    let sync = synchronizer(&store).dry_run(true);

    let summary = sync
        .run(vec![asset("a.jpg", b"a"), asset("b.jpg", b"b")])
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.outcomes[0].action, Some(UpsertAction::Create));
    assert_eq!(summary.outcomes[1].action, Some(UpsertAction::Update));
    assert!(summary.outcomes.iter().all(|o| o.new_version().is_none()));
    assert_eq!(store.probes.borrow().len(), 2);
    assert!(store.writes.borrow().is_empty());
}

#[test]
fn run_with_reports_each_outcome_as_it_happens() {
    let store = MemoryStore::default();
    let sync = synchronizer(&store);
    let mut seen = Vec::new();

    sync.run_with(vec![asset("b.jpg", b"b"), asset("a.jpg", b"a")], |o| {
        seen.push(o.path.clone())
    })
    .unwrap();

    assert_eq!(seen, ["assets/images/a.jpg", "assets/images/b.jpg"]);
}
