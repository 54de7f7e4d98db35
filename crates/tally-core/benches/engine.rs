use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tally_core::model::{
    Approval, Initiative, InitiativeFields, InitiativeId, KeyActivity, Proposal, Status, User,
    UserId,
};
use tally_core::rollup::rollup;
use tally_core::visibility::{entity_stats, filter_for_user};

const TIERS: [usize; 3] = [100, 1_000, 10_000];
const ENTITIES: [&str; 5] = ["sgn", "lpp", "ptpn3", "ptpn4", "holding"];

fn corpus(size: usize) -> Vec<Initiative> {
    (0..size)
        .map(|i| {
            let entity = ENTITIES[i % ENTITIES.len()];
            let creator = format!("user-{}", i % 37);
            let mut proposal = Proposal::new(format!("initiative {i}"), creator.as_str(), entity);
            for a in 0..4u8 {
                let progress = u8::try_from((i * 7 + usize::from(a) * 13) % 101).unwrap_or(0);
                proposal = proposal.with_activity(KeyActivity::new(format!("ka {a}"), 25, progress));
            }
            let fields = InitiativeFields::from_proposal(proposal, Status::NotStarted);
            let approval = match i % 6 {
                0 => Approval::PendingCreate,
                1 => Approval::Rejected,
                _ => Approval::Approved,
            };
            Initiative::new(InitiativeId::new(format!("in-{i:010}")), UserId::new(creator), fields)
                .with_approval(approval)
        })
        .collect()
}

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("visibility");
    let member = User::member("user-3", "sgn");
    let admin = User::admin("root");

    for size in TIERS {
        let records = corpus(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("member", size), &records, |b, records| {
            b.iter(|| black_box(filter_for_user(Some(&member), records.clone()).len()));
        });
        group.bench_with_input(BenchmarkId::new("admin", size), &records, |b, records| {
            b.iter(|| black_box(filter_for_user(Some(&admin), records.clone()).len()));
        });
        group.bench_with_input(BenchmarkId::new("stats", size), &records, |b, records| {
            b.iter(|| black_box(entity_stats(records)));
        });
    }

    group.finish();
}

fn bench_rollup(c: &mut Criterion) {
    let mut group = c.benchmark_group("rollup");
    for count in [1usize, 8, 64] {
        let activities: Vec<KeyActivity> = (0..count)
            .map(|i| KeyActivity::new("ka", 1, u8::try_from(i % 101).unwrap_or(0)))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &activities, |b, activities| {
            b.iter(|| black_box(rollup(activities)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_visibility, bench_rollup);
criterion_main!(benches);
