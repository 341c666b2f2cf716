//! Recorder lifecycle, session exclusivity, and registration boundaries.

use approx::assert_relative_eq;
use num_complex::Complex;
use num_traits::Float;
use tapir::{Active, Error, Recorder};

#[test]
fn activating_a_second_recorder_conflicts() {
    let _first: Recorder<f64> = Recorder::active().unwrap();
    let mut second: Recorder<f64> = Recorder::new();
    assert!(matches!(second.activate(), Err(Error::RecorderConflict)));
}

#[test]
fn reactivating_the_active_recorder_is_a_noop() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    rec.activate().unwrap();
    assert!(rec.is_active());
}

#[test]
fn deactivate_is_idempotent_and_releases_the_thread() {
    let mut first: Recorder<f64> = Recorder::active().unwrap();
    first.deactivate();
    first.deactivate();
    assert!(!first.is_active());

    let second: Recorder<f64> = Recorder::active().unwrap();
    assert!(second.is_active());
}

#[test]
fn dropping_an_active_recorder_releases_the_thread() {
    {
        let _rec: Recorder<f64> = Recorder::active().unwrap();
    }
    let _next: Recorder<f64> = Recorder::active().unwrap();
}

#[test]
fn each_thread_gets_its_own_session() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut x = Active::from(2.0);
    rec.register_input(&mut x);

    let handle = std::thread::spawn(|| {
        let mut rec: Recorder<f64> = Recorder::active().expect("fresh thread, fresh slot");
        let mut x = Active::from(5.0);
        rec.register_input(&mut x);
        let y = x * x;
        rec.register_output(&y);
        rec.set_derivative(y.slot(), 1.0);
        rec.compute_adjoints().unwrap();
        rec.derivative(x.slot())
    });
    assert_eq!(handle.join().unwrap(), 10.0);

    // The main-thread session was untouched by the other thread.
    let y = x * 3.0;
    rec.register_output(&y);
    rec.set_derivative(y.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    assert_eq!(rec.derivative(x.slot()), 3.0);
}

#[test]
fn registering_the_same_input_twice_is_a_noop() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut x = Active::from(1.0);
    rec.register_input(&mut x);
    let slot = x.slot();
    rec.register_input(&mut x);
    assert_eq!(x.slot(), slot);
    assert_eq!(rec.graph().num_inputs(), 1);
}

#[test]
fn constant_outputs_are_skipped() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut x = Active::from(1.0);
    rec.register_input(&mut x);

    // Never touches an input: stays a compile-time constant.
    let y = Active::constant(2.0) * Active::constant(3.0);
    assert!(!y.is_recorded());
    rec.register_output(&y);
    assert_eq!(rec.graph().num_outputs(), 0);

    // Adjoints over an empty output list are all zero.
    rec.compute_adjoints().unwrap();
    assert_eq!(rec.derivative(x.slot()), 0.0);
}

#[test]
fn arithmetic_without_a_recorder_is_plain_floating_point() {
    let x = Active::from(2.0f64);
    let y = (x * x + 1.0).sqrt();
    assert!(!y.is_recorded());
    assert_relative_eq!(y.value(), 5.0f64.sqrt(), max_relative = 1e-15);
}

#[test]
fn derivative_reads_past_the_stored_length_are_zero() {
    let rec: Recorder<f64> = Recorder::new();
    assert_eq!(rec.derivative(40), 0.0);
}

#[test]
fn clear_derivatives_zeroes_every_slot() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut x = Active::from(1.5);
    rec.register_input(&mut x);
    let y = x.sin() + x * x;
    rec.register_output(&y);
    rec.set_derivative(y.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    assert!(rec.derivative(x.slot()) != 0.0);

    rec.clear_derivatives();
    for s in 0..rec.node_count() as u32 {
        assert_eq!(rec.derivative(s), 0.0);
    }
}

#[test]
fn seeding_k_scales_the_input_adjoint_by_k() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut x = Active::from(0.7);
    rec.register_input(&mut x);
    let y = x.exp() * x.cos();
    rec.register_output(&y);

    rec.set_derivative(y.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    let g1 = rec.derivative(x.slot());

    rec.clear_derivatives();
    rec.set_derivative(y.slot(), 2.5);
    rec.compute_adjoints().unwrap();
    let gk = rec.derivative(x.slot());

    assert_relative_eq!(gk, 2.5 * g1, max_relative = 1e-13);
}

#[test]
fn new_recording_round_trips() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();

    let mut first = (0.0, 0.0);
    for pass in 0..2 {
        // Inputs must be re-registered on fresh actives after a reset.
        let mut x = Active::from(2.0);
        rec.register_input(&mut x);
        let y = x.sin() + x * x * 2.0;
        rec.register_output(&y);
        rec.set_derivative(y.slot(), 1.0);
        rec.compute_adjoints().unwrap();

        let result = (y.value(), rec.derivative(x.slot()));
        if pass == 0 {
            first = result;
            rec.new_recording();
            assert!(rec.is_active());
            assert_eq!(rec.node_count(), 0);
        } else {
            assert_eq!(result, first);
        }
    }
}

#[test]
fn a_moved_recorder_stays_active() {
    let rec: Recorder<f64> = Recorder::active().unwrap();
    let mut boxed = Box::new(rec);
    assert!(boxed.is_active());

    let mut x = Active::from(4.0);
    boxed.register_input(&mut x);
    let y = x.sqrt();
    boxed.register_output(&y);
    boxed.set_derivative(y.slot(), 1.0);
    boxed.compute_adjoints().unwrap();
    assert_relative_eq!(boxed.derivative(x.slot()), 0.25, max_relative = 1e-15);
}

#[test]
fn complex_inputs_register_real_then_imaginary() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut z = Complex::new(Active::from(3.0), Active::from(4.0));
    rec.register_input_complex(&mut z);
    assert_eq!(z.re.slot(), 0);
    assert_eq!(z.im.slot(), 1);

    // |z|² decomposes into real arithmetic; no complex opcodes exist.
    let y = z.re * z.re + z.im * z.im;
    rec.register_output(&y);
    rec.set_derivative(y.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    assert_eq!(rec.derivative(z.re.slot()), 6.0);
    assert_eq!(rec.derivative(z.im.slot()), 8.0);
}

#[test]
fn complex_arithmetic_records_through_num_complex() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut z = Complex::new(Active::from(1.0), Active::from(2.0));
    rec.register_input_complex(&mut z);

    let w = z * z;
    rec.register_output_complex(&w);
    assert_eq!(rec.graph().num_outputs(), 2);

    // Seed the real component: d(re(z²))/d(re z) = 2·re z.
    rec.set_derivative(w.re.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    assert_eq!(rec.derivative(z.re.slot()), 2.0);
    assert_eq!(rec.derivative(z.im.slot()), -4.0);
}

#[test]
fn inputs_are_read_lazily_for_re_evaluation() {
    let mut rec: Recorder<f64> = Recorder::active().unwrap();
    let mut x = Active::from(1.0);
    rec.register_input(&mut x);
    let y = x * x;
    rec.register_output(&y);

    rec.set_derivative(y.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    assert_eq!(rec.derivative(x.slot()), 2.0);

    // Mutate the registered value in place: the recorder dereferences the
    // live pointer at compute time, so the graph is re-evaluated at x = 3.
    x.set_value(3.0);
    rec.clear_derivatives();
    rec.set_derivative(y.slot(), 1.0);
    rec.compute_adjoints().unwrap();
    assert_eq!(rec.derivative(x.slot()), 6.0);
}

#[test]
fn error_messages_name_the_failure() {
    let msg = Error::RecorderConflict.to_string();
    assert!(msg.contains("already active"));
    let msg = Error::InputCountMismatch {
        expected: 2,
        got: 1,
    }
    .to_string();
    assert!(msg.contains("2"));
    assert!(msg.contains("1"));
}
