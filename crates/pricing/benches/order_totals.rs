use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use inkwell_core::Money;
use inkwell_pricing::{
    Coupon, CouponKind, CouponUsage, PaymentMethod, PricedLine, PricingPolicy, compute_totals,
    validate_coupon,
};

fn cart(lines: usize) -> Vec<PricedLine> {
    (0..lines)
        .map(|i| PricedLine {
            unit_price: Money::from_paise(19_900 + (i as u64 * 1_250)),
            quantity: 1 + (i as u32 % 3),
            tax_rate_bp: if i % 4 == 0 { 500 } else { 0 },
        })
        .collect()
}

fn coupons(n: usize) -> Vec<Coupon> {
    (0..n)
        .map(|i| Coupon {
            code: format!("CODE{i}"),
            kind: CouponKind::Percent {
                basis_points: 500 + (i as u32 % 10) * 100,
            },
            min_subtotal: Some(Money::from_rupees(100)),
            starts_at: None,
            ends_at: None,
            max_redemptions: Some(1_000),
            per_user_limit: 1,
            active: true,
        })
        .collect()
}

fn bench_compute_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_totals");
    let policy = PricingPolicy {
        charge_cod_fee: true,
        ..PricingPolicy::default()
    };
    let coupon = coupons(1).remove(0);

    for lines in [1usize, 5, 25, 100] {
        let items = cart(lines);
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &items, |b, items| {
            b.iter(|| {
                compute_totals(
                    black_box(items),
                    Some(&coupon),
                    Some("Kashmir"),
                    PaymentMethod::Cod,
                    &policy,
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_coupon_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_coupon");
    let now = Utc::now();

    for n in [10usize, 100, 1_000] {
        let book = coupons(n);
        let code = format!("code{}", n - 1);
        group.bench_with_input(BenchmarkId::from_parameter(n), &book, |b, book| {
            b.iter(|| {
                validate_coupon(
                    black_box(book),
                    Some(code.as_str()),
                    Money::from_rupees(1_000),
                    now,
                    |_| CouponUsage::default(),
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_totals, bench_coupon_lookup);
criterion_main!(benches);
