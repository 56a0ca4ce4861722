mod common;

use common::RecordingBackend;
use rustfft_gpu::{
    BluesteinBuffers, Dialect, FftDirection, FftError, FftPlanner, KernelArg, PlanBuffers, PlannerConfig, Precision,
    Stage, Strategy,
};

// Hands out distinct buffer ids for everything a strategy asks for
fn buffers_for(strategy: &Strategy) -> PlanBuffers<u32> {
    let requirements = strategy.buffer_requirements();
    let mut next = 0;
    let mut alloc = || {
        next += 1;
        next
    };
    let mut buffers = PlanBuffers::new(alloc(), alloc());
    buffers.ping = requirements.ping.map(|_| alloc());
    buffers.pong = requirements.pong.map(|_| alloc());
    for _ in &requirements.bluestein {
        buffers.bluestein.push(BluesteinBuffers {
            chirp: alloc(),
            kernel_a: alloc(),
            kernel_b: alloc(),
            work_a: alloc(),
            work_b: alloc(),
        });
    }
    buffers
}

fn build_and_run(
    backend: &RecordingBackend,
    config: PlannerConfig,
    strategy: impl Fn(&FftPlanner<RecordingBackend>) -> Strategy,
    runs: usize,
) -> Vec<String> {
    let mut planner = FftPlanner::new(config);
    let strategy = strategy(&planner);
    let buffers = buffers_for(&strategy);
    let mut plan = planner.build(backend, &strategy, &buffers).unwrap();
    for _ in 0..runs {
        plan.execute(backend).unwrap();
    }
    plan.calls().iter().map(|call| call.desc().to_string()).collect()
}

#[test]
fn opencl_single_radix_units() {
    let backend = RecordingBackend::new(Dialect::OpenCl);
    let descs = build_and_run(
        &backend,
        PlannerConfig::default(),
        |planner| planner.strategy_1d(12, 1, FftDirection::Forward).unwrap(),
        1,
    );
    assert_eq!(
        descs,
        vec![
            "dft{r=4, p=1, n=12, batch=1, threads=3(32), wg=32}",
            "dft{r=3, p=4, n=12, batch=1, threads=4(32), wg=32}",
        ]
    );

    let units = backend.units.borrow();
    assert_eq!(units.len(), 2);
    for unit in units.iter() {
        assert_eq!(unit.entry_point, "radix");
        assert_eq!(unit.precision, Precision::Single);
        assert_eq!(unit.options, "-cl-mad-enable -cl-fast-relaxed-math");
        assert!(unit.source.contains("typedef float real_t;"));
        assert!(unit.source.contains("typedef float2 real2_t;"));
        assert!(unit.source.contains("kernel void radix(global const real2_t * x, global real2_t * y, uint p, uint threads)"));
        assert!(!unit.source.contains("cl_khr_fp64"));
        assert!(!unit.source.contains("__global__"));
    }
}

#[test]
fn cuda_double_bluestein_units() {
    let backend = RecordingBackend::new(Dialect::Cuda);
    build_and_run(
        &backend,
        PlannerConfig::default().with_precision(Precision::Double),
        |planner| planner.strategy_1d(7, 1, FftDirection::Inverse).unwrap(),
        1,
    );

    for entry_point in [
        "bluestein_twiddle",
        "bluestein_pad_kernel",
        "bluestein_mul_in",
        "bluestein_mul",
        "bluestein_mul_out",
        "radix",
    ] {
        let unit = backend.unit(entry_point);
        assert_eq!(unit.precision, Precision::Double);
        assert!(unit.source.contains("#define DEVICE __device__"), "{}", entry_point);
        assert!(unit.source.contains("typedef double real_t;"), "{}", entry_point);
        assert!(
            unit.source.contains(&format!("extern \"C\" __global__ void {}(", entry_point)),
            "{}",
            entry_point
        );
        assert!(!unit.source.contains("get_global_id"), "{}", entry_point);
    }

    let twiddle = backend.unit("bluestein_twiddle");
    assert!(twiddle.source.contains("unsigned long long"));
    assert_eq!(twiddle.options, "");
    assert_eq!(backend.unit("radix").options, "--use_fast_math");
    let mul_out = backend.unit("bluestein_mul_out");
    assert!(mul_out.source.contains("real_t div"));
}

#[test]
fn fast_math_can_be_disabled() {
    let backend = RecordingBackend::new(Dialect::OpenCl);
    build_and_run(
        &backend,
        PlannerConfig::default().with_fast_math(false),
        |planner| planner.strategy_1d(16, 1, FftDirection::Forward).unwrap(),
        0,
    );
    assert_eq!(backend.unit("radix").options, "");
}

#[test]
fn bluestein_runs_setup_once() {
    let backend = RecordingBackend::new(Dialect::OpenCl);
    let descs = build_and_run(
        &backend,
        PlannerConfig::default(),
        |planner| planner.strategy_1d(7, 1, FftDirection::Forward).unwrap(),
        2,
    );
    assert_eq!(descs.len(), 8);
    assert_eq!(descs[0], "bluestein_twiddle{n=7(32), wg=32, inverse=false}");
    assert_eq!(descs[1], "bluestein_pad_kernel{n=7, m=16(32), wg=32}");
    assert_eq!(descs[3], "bluestein_mul_in{batch=1, radix=7, p=1, threads=1, stride=16(32), wg=32}");
    assert_eq!(descs[5], "bluestein_mul{n=16(32), wg=32, rows=1}");
    assert_eq!(descs[7], "bluestein_mul_out{r=7(32), wg=32, batch=1, p=1, thr=1, stride=16}");

    // the chirp table and kernel spectrum are computed on the first run only
    let launches = backend.launches.borrow();
    assert_eq!(launches.len(), 8 + 5);
    let twiddles = launches
        .iter()
        .filter(|launch| matches!(launch.stage, Stage::BluesteinTwiddle { .. }))
        .count();
    assert_eq!(twiddles, 1);

    let mul_out = launches
        .iter()
        .find(|launch| matches!(launch.stage, Stage::BluesteinMulOut { .. }))
        .unwrap();
    assert_eq!(mul_out.args[3], KernelArg::Real(1.0 / 16.0));
}

#[test]
fn launch_geometry_is_aligned() {
    let backend = RecordingBackend {
        work_group_multiple: 48,
        ..RecordingBackend::new(Dialect::Cuda)
    };
    build_and_run(
        &backend,
        PlannerConfig::default(),
        |planner| planner.strategy_2d(90, 13, FftDirection::Forward).unwrap(),
        1,
    );

    let launches = backend.launches.borrow();
    assert!(!launches.is_empty());
    for launch in launches.iter() {
        let global = launch.geometry.global();
        let local = launch.geometry.local();
        assert_eq!(global.dimensions(), local.dimensions());
        for axis in 0..global.dimensions() {
            assert_eq!(global.get(axis) % local.get(axis), 0, "{:?}", launch);
        }
    }
}

#[test]
fn transpose_description() {
    let backend = RecordingBackend::new(Dialect::OpenCl);
    let descs = build_and_run(
        &backend,
        PlannerConfig::default(),
        |planner| planner.strategy_2d(8, 4, FftDirection::Forward).unwrap(),
        0,
    );
    assert_eq!(descs.len(), 4);
    assert_eq!(descs[1], "transpose{w=8(32), h=4(32), bs=32}");
    assert_eq!(descs[3], "transpose{w=4(32), h=8(32), bs=32}");

    let transpose = backend.unit("transpose");
    assert!(transpose.source.contains("local real2_t block[1024];"));
    assert_eq!(transpose.options, "");
}

#[test]
fn build_failures_carry_the_log() {
    let backend = RecordingBackend {
        reject_source: Some("dft3"),
        ..RecordingBackend::new(Dialect::OpenCl)
    };
    let mut planner = FftPlanner::new(PlannerConfig::default());
    let strategy = planner.strategy_1d(12, 1, FftDirection::Forward).unwrap();
    let buffers = buffers_for(&strategy);
    match planner.build(&backend, &strategy, &buffers) {
        Err(FftError::Build { kernel, log }) => {
            assert_eq!(kernel, "radix");
            assert!(log.contains("rejected 'dft3'"));
        }
        other => panic!("expected a build error, got {:?}", other.map(|plan| plan.len())),
    }
}
