//! Reference test binary entry point
//!
//! Runs every reference case against the configurations in `configs/`.

use reference_tests::{
    run_cosine_mode_decay, BoundsCheck, ExpectedResult, HeatBudgetCheck,
    InterfaceContinuityCheck, ReferenceTest, SlopeCheck, SteadyProfileCheck, TestResult,
};

/// Two insulated halves at 100 and 0 degrees relax toward a common mean
/// without gaining or losing heat.
fn insulated_box_test() -> ReferenceTest {
    ReferenceTest {
        name: "Insulated Box".to_string(),
        config_path: "configs/insulated-box.json".to_string(),
        duration: None,
        expected: ExpectedResult {
            bounds: Some(BoundsCheck { min: 0.0, max: 100.0 }),
            heat_budget: Some(HeatBudgetCheck { tolerance: 1e-9 }),
            interface_continuity: Some(InterfaceContinuityCheck { max_jump: 10.0 }),
            ..Default::default()
        },
    }
}

/// Hot left wall on a single slab: heat flows right, no overshoot.
fn hot_wall_test() -> ReferenceTest {
    ReferenceTest {
        name: "Hot Wall".to_string(),
        config_path: "configs/hot-wall-single.json".to_string(),
        duration: None,
        expected: ExpectedResult {
            bounds: Some(BoundsCheck { min: 20.0, max: 100.0 }),
            slope: Some(SlopeCheck::Negative),
            ..Default::default()
        },
    }
}

/// Two coupled slabs between walls at 100 and 0 degrees reach the linear
/// steady state, with the interface jump equal to one row of the line.
fn dual_slab_steady_test() -> ReferenceTest {
    ReferenceTest {
        name: "Dual Slab Steady State".to_string(),
        config_path: "configs/dual-slab.json".to_string(),
        duration: None,
        expected: ExpectedResult {
            bounds: Some(BoundsCheck { min: 0.0, max: 100.0 }),
            slope: Some(SlopeCheck::Negative),
            interface_continuity: Some(InterfaceContinuityCheck { max_jump: 5.5 }),
            steady_profile: Some(SteadyProfileCheck { tolerance: 1e-3 }),
            ..Default::default()
        },
    }
}

/// 848 kW/m^2 into 5 cm of copper for 30 s: the heat content must match
/// the energy supplied through the wall.
fn flux_slab_test() -> ReferenceTest {
    ReferenceTest {
        name: "Flux Slab Heating".to_string(),
        config_path: "configs/flux-slab.json".to_string(),
        duration: None,
        expected: ExpectedResult {
            bounds: Some(BoundsCheck { min: 20.0, max: 1.0e4 }),
            slope: Some(SlopeCheck::Negative),
            heat_budget: Some(HeatBudgetCheck { tolerance: 1e-6 }),
            ..Default::default()
        },
    }
}

/// Get all configuration-driven reference tests
fn all_tests() -> Vec<ReferenceTest> {
    vec![
        insulated_box_test(),
        hot_wall_test(),
        dual_slab_steady_test(),
        flux_slab_test(),
    ]
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    tracing::info!("Heat Diffusion Reference Test Suite");
    tracing::info!("===================================");

    let tests = all_tests();
    tracing::info!("Found {} reference tests", tests.len() + 1);

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    let outcomes = tests
        .iter()
        .map(|test| (test.name.clone(), test.run()))
        .chain(std::iter::once_with(|| {
            (
                "Cosine Mode Decay".to_string(),
                run_cosine_mode_decay(40, 2000, 1e-9, 5e-3),
            )
        }));

    for (name, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                if result.passed {
                    passed_count += 1;
                } else {
                    failed_count += 1;
                }
                result.print_summary();
                results.push(result);
            }
            Err(e) => {
                eprintln!("\nERROR running test {}: {}", name, e);
                failed_count += 1;
            }
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total tests: {}", passed_count + failed_count);
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    // Exit with error code if any tests failed
    if failed_count > 0 {
        std::process::exit(1);
    }
}
