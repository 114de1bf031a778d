mod common;

use std::sync::Arc;

use common::{
    HOST_PLATFORM, HostAccelerator, HostStats, count, force_from, graph_source, host_config,
    host_registry, random_cloud,
};
use nnforce::core::graph::LoadError;
use nnforce::core::state::StepTotals;
use nnforce::engine::accelerator::DeviceError;
use nnforce::engine::config::{PlatformConfig, Precision, PrecisionPolicy};
use nnforce::engine::error::ForceError;
use nnforce::engine::extract::ComputeFlags;
use nnforce::engine::force_impl::NeuralForceImpl;
use nnforce::engine::kernel::CALC_NEURAL_NETWORK_FORCE;
use nnforce::engine::registry::{KernelRegistry, register_neural_force_factories};

fn double() -> PlatformConfig {
    host_config(Precision::Double, PrecisionPolicy::Convert)
}

#[test]
fn unregistered_platform_is_reported() {
    let (_dir, force) = force_from(&graph_source(false, "f64"), false);
    let registry = KernelRegistry::new();

    let err = NeuralForceImpl::new(force, 2, &registry, &double()).err().unwrap();

    match err {
        ForceError::KernelNotRegistered { kernel, platform } => {
            assert_eq!(kernel, CALC_NEURAL_NETWORK_FORCE);
            assert_eq!(platform, HOST_PLATFORM);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn registering_a_platform_twice_is_rejected() {
    let stats = Arc::new(HostStats::default());
    let mut registry = host_registry(&stats);

    let err = register_neural_force_factories(&mut registry, HOST_PLATFORM, |_: &PlatformConfig| {
        Ok(HostAccelerator::new(Arc::new(HostStats::default())))
    })
    .unwrap_err();

    assert!(matches!(err, ForceError::AlreadyRegistered { .. }));
    assert!(registry.is_registered(CALC_NEURAL_NETWORK_FORCE, HOST_PLATFORM));
}

#[test]
fn unavailable_accelerator_is_reported_with_its_platform() {
    let (_dir, force) = force_from(&graph_source(false, "f64"), false);
    let mut registry = KernelRegistry::new();
    register_neural_force_factories(&mut registry, HOST_PLATFORM, |config: &PlatformConfig| {
        Err::<HostAccelerator, _>(DeviceError::Unavailable(format!(
            "no device {}",
            config.device_index
        )))
    })
    .unwrap();

    let err = NeuralForceImpl::new(force, 2, &registry, &double()).err().unwrap();

    match err {
        ForceError::AcceleratorUnavailable { platform, source } => {
            assert_eq!(platform, HOST_PLATFORM);
            assert_eq!(source, DeviceError::Unavailable("no device 0".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn graph_is_compiled_on_the_first_step_only() {
    let (_dir, force) = force_from(&graph_source(false, "f64"), false);
    let stats = Arc::new(HostStats::default());
    let registry = host_registry(&stats);

    let mut bound = NeuralForceImpl::new(force, 3, &registry, &double()).unwrap();
    assert!(!bound.is_initialized());
    assert_eq!(count(&stats.compilations), 0);
    assert_eq!(count(&stats.allocations), 0);

    for seed in 0..3 {
        bound
            .calc_forces_and_energy(
                &random_cloud(3, seed),
                None,
                ComputeFlags::ALL,
                &mut StepTotals::new(3),
            )
            .unwrap();
    }

    assert!(bound.is_initialized());
    assert_eq!(count(&stats.compilations), 1);
    assert_eq!(count(&stats.executions), 3);
}

#[test]
fn kernel_that_failed_to_initialize_stays_failed() {
    let (_dir, force) = force_from("potential = \"unknown\"\nprecision = \"f64\"\n", false);
    let stats = Arc::new(HostStats::default());
    let registry = host_registry(&stats);
    let mut bound = NeuralForceImpl::new(force, 2, &registry, &double()).unwrap();
    let positions = random_cloud(2, 0);

    let first = bound
        .calc_forces_and_energy(&positions, None, ComputeFlags::ALL, &mut StepTotals::new(2))
        .unwrap_err();
    assert!(matches!(first, ForceError::Load(LoadError::Compile { .. })));

    let second = bound
        .calc_forces_and_energy(&positions, None, ComputeFlags::ALL, &mut StepTotals::new(2))
        .unwrap_err();
    assert!(matches!(second, ForceError::KernelFailed(_)));
    assert!(!bound.is_initialized());
    assert_eq!(count(&stats.compilations), 1);
}

#[test]
fn every_context_opens_its_own_accelerator() {
    let (_dir, force) = force_from(&graph_source(false, "f64"), false);
    let stats = Arc::new(HostStats::default());
    let registry = host_registry(&stats);

    let mut replicas: Vec<_> = (0..3)
        .map(|_| NeuralForceImpl::new(Arc::clone(&force), 2, &registry, &double()).unwrap())
        .collect();
    for replica in &mut replicas {
        replica
            .calc_forces_and_energy(
                &random_cloud(2, 1),
                None,
                ComputeFlags::ALL,
                &mut StepTotals::new(2),
            )
            .unwrap();
    }

    assert_eq!(count(&stats.opened), 3);
    assert_eq!(count(&stats.compilations), 3);
    assert_eq!(Arc::strong_count(&force), 4);
}

#[test]
fn update_parameters_accepts_an_unchanged_force() {
    let (_dir, force) = force_from(&graph_source(true, "f64"), true);
    let stats = Arc::new(HostStats::default());
    let mut bound =
        NeuralForceImpl::new(Arc::clone(&force), 2, &host_registry(&stats), &double()).unwrap();

    let same = (*force).clone();
    assert!(bound.update_parameters(&same).is_ok());
}

#[test]
fn update_parameters_rejects_a_changed_periodicity_flag() {
    let (_dir, force) = force_from(&graph_source(true, "f64"), true);
    let stats = Arc::new(HostStats::default());
    let mut bound =
        NeuralForceImpl::new(Arc::clone(&force), 2, &host_registry(&stats), &double()).unwrap();

    let mut changed = (*force).clone();
    changed.set_uses_periodic_boundary_conditions(false);
    let err = bound.update_parameters(&changed).unwrap_err();

    assert!(matches!(err, ForceError::ConfigurationChanged(_)));
    assert!(bound.force().uses_periodic_boundary_conditions());
}

#[test]
fn update_parameters_rejects_a_different_graph() {
    let (_dir, force) = force_from(&graph_source(false, "f64"), false);
    let (_other_dir, other) = force_from(&graph_source(false, "f32"), false);
    let stats = Arc::new(HostStats::default());
    let mut bound = NeuralForceImpl::new(force, 2, &host_registry(&stats), &double()).unwrap();

    let err = bound.update_parameters(&other).unwrap_err();
    assert!(matches!(err, ForceError::ConfigurationChanged(_)));
}

#[test]
fn platform_configuration_file_selects_the_registered_platform() {
    let (_dir, force) = force_from(&graph_source(false, "f32"), false);
    let config_dir = tempfile::TempDir::new().unwrap();
    let config_path = config_dir.path().join("platform.toml");
    std::fs::write(
        &config_path,
        "platform = \"Host\"\nprecision = \"single\"\nprecision-policy = \"require-match\"\n",
    )
    .unwrap();
    let config = PlatformConfig::load(&config_path).unwrap();
    let stats = Arc::new(HostStats::default());

    let mut bound = NeuralForceImpl::new(force, 2, &host_registry(&stats), &config).unwrap();
    bound
        .calc_forces_and_energy(&random_cloud(2, 0), None, ComputeFlags::ALL, &mut StepTotals::new(2))
        .unwrap();
    assert_eq!(bound.particle_count(), 2);
}
