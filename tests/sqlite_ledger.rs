use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use flagscore::{
    model::{NewTask, NewTeam},
    persist::{
        PersistError, RecordOutcome, SolveLedger, TaskCatalogue, TeamDirectory, sqlite::SqliteStore,
    },
};

fn team(name: &str, country: &str, created_at_ms: u64) -> NewTeam {
    NewTeam {
        name: name.to_string(),
        country: country.to_string(),
        created_at_ms,
        ..NewTeam::default()
    }
}

fn task(name: &str, started_at_ms: Option<u64>, flags: &[&str]) -> NewTask {
    NewTask {
        name: name.to_string(),
        categories: vec!["web".to_string(), "misc".to_string()],
        difficulty: "easy".to_string(),
        description: format!("solve {name}"),
        started_at_ms,
        flags: flags.iter().map(|f| f.to_string()).collect(),
    }
}

#[test]
fn second_solve_of_same_pair_is_already_solved() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "PL", 0)).expect("team");
    let a = store.add_task(task("a", Some(0), &["FLAG{a}"])).expect("task");

    let first = store.record_solve(t1, a, 100).expect("first");
    let RecordOutcome::Created(event) = first else {
        panic!("expected created, got {first:?}");
    };
    assert_eq!((event.team_id, event.task_id, event.created_at_ms), (t1, a, 100));

    let second = store.record_solve(t1, a, 200).expect("second");
    assert_eq!(second, RecordOutcome::AlreadySolved);

    assert_eq!(store.solves_for_team(t1).expect("history").len(), 1);
    assert_eq!(store.latest_solve_id().expect("latest"), event.id);
}

#[test]
fn solve_ids_follow_arrival_order() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "", 0)).expect("team");
    let t2 = store.add_team(team("beta", "", 0)).expect("team");
    let a = store.add_task(task("a", Some(0), &[])).expect("task");
    let b = store.add_task(task("b", Some(0), &[])).expect("task");

    store.record_solve(t1, a, 300).expect("solve");
    store.record_solve(t2, a, 100).expect("solve");
    store.record_solve(t1, b, 200).expect("solve");

    let all = store.solves_between(0, 1_000).expect("between");
    let ids: Vec<u64> = all.iter().map(|e| e.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(all[0].created_at_ms, 300);

    let window = store.solves_between(150, 300).expect("window");
    assert_eq!(window.len(), 2);

    let by_task: Vec<u64> = store
        .solves_for_task(a, 0)
        .expect("task solves")
        .iter()
        .map(|e| e.created_at_ms)
        .collect();
    assert_eq!(by_task, vec![100, 300]);

    let by_team: Vec<u64> = store
        .solves_for_team(t1)
        .expect("team solves")
        .iter()
        .map(|e| e.created_at_ms)
        .collect();
    assert_eq!(by_team, vec![300, 200]);
}

#[test]
fn concurrent_duplicates_create_exactly_one_row() {
    let store = Arc::new(SqliteStore::open_in_memory().expect("open"));
    let t1 = store.add_team(team("alpha", "", 0)).expect("team");
    let a = store.add_task(task("a", Some(0), &["FLAG{a}"])).expect("task");

    const N: usize = 16;
    let barrier = Arc::new(Barrier::new(N));
    let workers: Vec<_> = (0..N)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.record_solve(t1, a, 1_000 + i as u64).expect("record")
            })
        })
        .collect();

    let outcomes: Vec<RecordOutcome> = workers
        .into_iter()
        .map(|w| w.join().expect("worker panicked"))
        .collect();
    let created = outcomes
        .iter()
        .filter(|o| matches!(o, RecordOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(outcomes.len() - created, N - 1);
    assert_eq!(store.solves_for_team(t1).expect("history").len(), 1);
}

#[test]
fn uniqueness_holds_across_independent_stores_on_one_file() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("ledger.db");

    let seed = SqliteStore::open(&db_path).expect("open seed");
    let t1 = seed.add_team(team("alpha", "", 0)).expect("team");
    let a = seed.add_task(task("a", Some(0), &["FLAG{a}"])).expect("task");
    drop(seed);

    const N: usize = 4;
    let barrier = Arc::new(Barrier::new(N));
    let workers: Vec<_> = (0..N)
        .map(|_| {
            let path = db_path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = SqliteStore::open(&path).expect("open instance");
                barrier.wait();
                store.record_solve(t1, a, 42).expect("record")
            })
        })
        .collect();

    let created = workers
        .into_iter()
        .map(|w| w.join().expect("worker panicked"))
        .filter(|o| matches!(o, RecordOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);

    let reopened = SqliteStore::open(&db_path).expect("reopen");
    assert_eq!(reopened.solves_between(0, 100).expect("between").len(), 1);
}

#[test]
fn solve_for_missing_task_is_an_error_not_a_duplicate() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "", 0)).expect("team");

    let res = store.record_solve(t1, 9_999, 1);
    assert!(res.is_err(), "expected foreign key failure, got {res:?}");
}

#[test]
fn catalogue_only_exposes_started_tasks() {
    let store = SqliteStore::open_in_memory().expect("open");
    let a = store.add_task(task("a", Some(100), &["FLAG{a}", "FLAG{a-alt}"])).expect("task");
    let b = store.add_task(task("b", Some(500), &["FLAG{b}"])).expect("task");
    let c = store.add_task(task("c", None, &["FLAG{c}"])).expect("task");

    let flags = store.activated_flags(100).expect("flags");
    assert_eq!(flags.len(), 2);
    assert!(flags.iter().all(|f| f.task_id == a && f.started_at_ms == 100));
    assert!(store.activated_flags(99).expect("flags").is_empty());

    let tasks = store.activated_tasks(1_000).expect("tasks");
    let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_eq!(tasks[0].categories, vec!["web".to_string(), "misc".to_string()]);

    assert!(store.set_task_start(c, Some(900)).expect("schedule"));
    assert_eq!(store.activated_tasks(1_000).expect("tasks").len(), 3);
    assert!(!store.set_task_start(12_345, Some(1)).expect("missing"));
}

#[test]
fn task_solves_hidden_until_task_started() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "", 0)).expect("team");
    let a = store.add_task(task("a", Some(100), &[])).expect("task");
    store.record_solve(t1, a, 150).expect("solve");

    assert!(store.solves_for_task(a, 50).expect("before").is_empty());
    assert_eq!(store.solves_for_task(a, 150).expect("after").len(), 1);
}

#[test]
fn directory_lookup_and_census() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "PL", 10)).expect("team");
    store.add_team(team("beta", "PL", 20)).expect("team");
    let t3 = store.add_team(team("gamma", "", 30)).expect("team");
    // Registered after the cutoff.
    store.add_team(team("delta", "DE", 5_000)).expect("team");

    let found = store.lookup_teams(&[t1, t3, 777]).expect("lookup");
    assert_eq!(found.len(), 2);
    assert_eq!(found[&t1].name, "alpha");
    assert_eq!(found[&t3].country, "");
    assert!(store.lookup_teams(&[]).expect("empty").is_empty());

    let census = store.team_census(1_000).expect("census");
    assert_eq!(census.teams, 3);
    assert_eq!(census.countries, 1);
}

#[test]
fn task_names_ignore_activation() {
    let store = SqliteStore::open_in_memory().expect("open");
    let a = store.add_task(task("a", Some(100), &[])).expect("task");
    let b = store.add_task(task("b", None, &[])).expect("task");

    let names = store.task_names(&[a, b, 404]).expect("names");
    assert_eq!(names.len(), 2);
    assert_eq!(names[&a], "a");
    assert_eq!(names[&b], "b");
    assert!(store.task_names(&[]).expect("empty").is_empty());
}

#[test]
fn solves_for_teams_are_newest_first_and_limited_to_teams() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "", 0)).expect("team");
    let t2 = store.add_team(team("beta", "", 0)).expect("team");
    let t3 = store.add_team(team("gamma", "", 0)).expect("team");
    let a = store.add_task(task("a", Some(0), &[])).expect("task");
    let b = store.add_task(task("b", Some(0), &[])).expect("task");

    store.record_solve(t1, a, 10).expect("solve");
    store.record_solve(t2, a, 30).expect("solve");
    store.record_solve(t3, a, 40).expect("solve");
    store.record_solve(t1, b, 20).expect("solve");

    let rows: Vec<(u64, u64)> = store
        .solves_for_teams(&[t1, t2])
        .expect("solves")
        .iter()
        .map(|e| (e.team_id, e.created_at_ms))
        .collect();
    assert_eq!(rows, vec![(t2, 30), (t1, 20), (t1, 10)]);
    assert!(store.solves_for_teams(&[]).expect("empty").is_empty());
}

#[test]
fn expired_write_is_refused_without_touching_the_ledger() {
    let store = SqliteStore::open_in_memory().expect("open");
    let t1 = store.add_team(team("alpha", "", 0)).expect("team");
    let a = store.add_task(task("a", Some(0), &[])).expect("task");

    let expired = Instant::now();
    let res = store.record_solve_within(t1, a, 5, expired);
    assert!(matches!(res, Err(PersistError::DeadlineExceeded)), "got {res:?}");
    assert_eq!(store.latest_solve_id().expect("latest"), 0);

    let later = Instant::now() + Duration::from_secs(5);
    let ok = store.record_solve_within(t1, a, 5, later).expect("in time");
    assert!(matches!(ok, RecordOutcome::Created(_)));
}
