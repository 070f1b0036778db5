use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use flagscore::{
    core::{
        flags::{FlagIndex, FlagIndexSnapshot},
        freeze::ScoringWindow,
        scoreboard::assemble_scoreboard,
    },
    model::{ActivatedFlag, NewTask, NewTeam, SolveEvent},
    persist::{SolveLedger, sqlite::SqliteStore},
};

const TEAMS: u64 = 1_000;
const TASKS: u64 = 50;

/// Every team solves every task once: 50k ledger rows.
fn ledger() -> Vec<SolveEvent> {
    let mut out = Vec::with_capacity((TEAMS * TASKS) as usize);
    for task_id in 1..=TASKS {
        for team_id in 1..=TEAMS {
            out.push(SolveEvent {
                id: out.len() as u64 + 1,
                team_id,
                task_id,
                created_at_ms: (team_id * 7 + task_id * 13) % 100_000,
            });
        }
    }
    out
}

fn bench_flag_resolve(c: &mut Criterion) {
    let index = FlagIndex::new();
    index.publish(FlagIndexSnapshot::from_flags(
        (0..10_000u64).map(|i| ActivatedFlag {
            task_id: i,
            flag: format!("FLAG{{{i:08x}}}"),
            started_at_ms: 0,
        }),
        0,
    ));
    let tokens: Vec<String> = (0..1_000u64).map(|i| format!("FLAG{{{:08x}}}", i * 7)).collect();

    c.bench_function("flag_resolve_1k", |b| {
        b.iter(|| {
            for token in &tokens {
                let _ = index.resolve(token);
            }
        });
    });
}

fn bench_scoreboard(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_scoreboard_50k");
    let events = ledger();

    for to_ms in [10_000u64, 50_000, 100_000] {
        let window = ScoringWindow { from_ms: 0, to_ms };
        group.bench_with_input(BenchmarkId::from_parameter(to_ms), &window, |b, window| {
            b.iter(|| {
                let _ = assemble_scoreboard(&events, *window);
            });
        });
    }

    group.finish();
}

fn bench_sqlite_record(c: &mut Criterion) {
    c.bench_function("sqlite_record_solve_5k", |b| {
        b.iter(|| {
            let store = SqliteStore::open_in_memory().expect("open");
            let task_id = store
                .add_task(NewTask {
                    name: "bench".into(),
                    categories: Vec::new(),
                    difficulty: String::new(),
                    description: String::new(),
                    started_at_ms: Some(0),
                    flags: vec!["FLAG{bench}".into()],
                })
                .expect("task");
            for i in 0..5_000u64 {
                let team_id = store
                    .add_team(NewTeam {
                        name: format!("team-{i}"),
                        ..NewTeam::default()
                    })
                    .expect("team");
                let _ = store.record_solve(team_id, task_id, i).expect("solve");
            }
        });
    });
}

criterion_group!(benches, bench_flag_resolve, bench_scoreboard, bench_sqlite_record);
criterion_main!(benches);
