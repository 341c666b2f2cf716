use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tapir::{gradient, record, Scalar};

#[cfg(feature = "jit")]
use tapir::{backend::CcJit, record_jit};

fn rosenbrock_generic<T: Scalar>(x: &[T]) -> T {
    let one = T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(1.0).unwrap());
    let hundred = T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(100.0).unwrap());
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

/// Fresh record-and-differentiate vs record-once-and-re-evaluate.
fn bench_record_vs_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_vs_reuse");
    for n in [2, 10, 100] {
        let x: Vec<f64> = (0..n).map(|i| 0.5 + 0.01 * i as f64).collect();

        group.bench_with_input(BenchmarkId::new("fresh_gradient", n), &x, |b, x| {
            b.iter(|| black_box(gradient(|v| rosenbrock_generic(v), black_box(x)).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("reuse_recording", n), &x, |b, x| {
            let mut rec = record(|v| rosenbrock_generic(v), x).unwrap();
            b.iter(|| black_box(rec.gradient_at(black_box(x)).unwrap()))
        });
    }
    group.finish();
}

/// Interpreter vs native kernel on re-evaluation of one recording.
#[cfg(feature = "jit")]
fn bench_interp_vs_jit(c: &mut Criterion) {
    if !CcJit::is_available() {
        eprintln!("skipping interp_vs_jit: no C compiler available");
        return;
    }
    let mut group = c.benchmark_group("interp_vs_jit");
    for n in [10, 100] {
        let x: Vec<f64> = (0..n).map(|i| 0.5 + 0.01 * i as f64).collect();

        group.bench_with_input(BenchmarkId::new("interpreter", n), &x, |b, x| {
            let mut rec = record(|v| rosenbrock_generic(v), x).unwrap();
            b.iter(|| black_box(rec.gradient_at(black_box(x)).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("cc_jit", n), &x, |b, x| {
            let mut rec = record_jit(|v| rosenbrock_generic(v), x).unwrap();
            b.iter(|| black_box(rec.gradient_at(black_box(x)).unwrap()))
        });
    }
    group.finish();
}

#[cfg(feature = "jit")]
criterion_group!(benches, bench_record_vs_reuse, bench_interp_vs_jit);
#[cfg(not(feature = "jit"))]
criterion_group!(benches, bench_record_vs_reuse);
criterion_main!(benches);
