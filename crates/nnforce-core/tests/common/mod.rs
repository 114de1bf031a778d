#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use nalgebra::Vector3;
use nnforce::core::force::NeuralNetworkForce;
use nnforce::core::pbc::PeriodicBox;
use nnforce::core::tensor::{
    BOX_VECTORS, Dim, ENERGY, ElementType, FORCES, GraphSignature, HostView, HostViewMut,
    POSITIONS, TensorSpec,
};
use nnforce::engine::accelerator::{
    Accelerator, Bindings, CompiledGraph, DeviceBuffer, DeviceError,
};
use nnforce::engine::config::{PlatformConfig, PlatformConfigBuilder, Precision, PrecisionPolicy};
use nnforce::engine::registry::{KernelRegistry, register_neural_force_factories};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tempfile::TempDir;

pub const HOST_PLATFORM: &str = "Host";

/// Counters shared between a test and every accelerator it opens.
#[derive(Debug, Default)]
pub struct HostStats {
    pub opened: AtomicUsize,
    pub compilations: AtomicUsize,
    pub allocations: AtomicUsize,
    pub executions: AtomicUsize,
    pub synchronizations: AtomicUsize,
    pub fail_next_execute: AtomicBool,
}

impl HostStats {
    pub fn inject_execute_failure(&self) {
        self.fail_next_execute.store(true, Ordering::SeqCst);
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Debug)]
pub struct HostBuffer {
    data: Vec<f64>,
    element_type: ElementType,
}

impl HostBuffer {
    fn store(&mut self, index: usize, value: f64) {
        self.data[index] = match self.element_type {
            ElementType::F32 => f64::from(value as f32),
            ElementType::F64 => value,
        };
    }
}

impl DeviceBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn element_type(&self) -> ElementType {
        self.element_type
    }
}

/// The graphs this accelerator understands, written as TOML.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct HostGraphSource {
    potential: String,
    #[serde(default)]
    periodic: bool,
    precision: String,
    particles: Option<usize>,
}

/// E = Σ |r_i|² and F_i = -2 r_i, with r_i wrapped into the box when the graph is periodic.
pub struct HostGraph {
    signature: GraphSignature,
    periodic: bool,
}

impl CompiledGraph for HostGraph {
    fn signature(&self) -> &GraphSignature {
        &self.signature
    }
}

/// An accelerator that runs graphs on the host, for tests.
///
/// Reading results before synchronizing fails, like a real asynchronous stream would
/// return stale data.
pub struct HostAccelerator {
    stats: Arc<HostStats>,
    pending: bool,
}

impl HostAccelerator {
    pub fn new(stats: Arc<HostStats>) -> Self {
        stats.opened.fetch_add(1, Ordering::SeqCst);
        Self {
            stats,
            pending: false,
        }
    }
}

impl Accelerator for HostAccelerator {
    type Buffer = HostBuffer;
    type Graph = HostGraph;

    fn device_name(&self) -> String {
        "host".to_string()
    }

    fn compile(&mut self, serialized_graph: &[u8]) -> Result<HostGraph, DeviceError> {
        self.stats.compilations.fetch_add(1, Ordering::SeqCst);
        let text = std::str::from_utf8(serialized_graph)
            .map_err(|e| DeviceError::Compile(e.to_string()))?;
        let source: HostGraphSource =
            toml::from_str(text).map_err(|e| DeviceError::Compile(e.to_string()))?;
        if source.potential != "squared-norm" {
            return Err(DeviceError::Compile(format!(
                "unknown potential '{}'",
                source.potential
            )));
        }
        let element_type = match source.precision.as_str() {
            "f32" => ElementType::F32,
            "f64" => ElementType::F64,
            other => return Err(DeviceError::Compile(format!("unknown precision '{other}'"))),
        };
        let rows = source.particles.map_or(Dim::Dynamic, Dim::Fixed);

        let mut inputs = vec![TensorSpec::new(
            POSITIONS,
            vec![rows, Dim::Fixed(3)],
            element_type,
        )];
        if source.periodic {
            inputs.push(TensorSpec::new(
                BOX_VECTORS,
                vec![Dim::Fixed(3), Dim::Fixed(3)],
                element_type,
            ));
        }
        Ok(HostGraph {
            signature: GraphSignature {
                inputs,
                outputs: vec![
                    TensorSpec::new(ENERGY, vec![], element_type),
                    TensorSpec::new(FORCES, vec![rows, Dim::Fixed(3)], element_type),
                ],
            },
            periodic: source.periodic,
        })
    }

    fn allocate(&mut self, element_type: ElementType, len: usize) -> Result<HostBuffer, DeviceError> {
        self.stats.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(HostBuffer {
            data: vec![0.0; len],
            element_type,
        })
    }

    fn upload(&mut self, source: HostView<'_>, destination: &mut HostBuffer) -> Result<(), DeviceError> {
        if source.len() != destination.len() || source.element_type() != destination.element_type {
            return Err(DeviceError::Transfer(format!(
                "cannot upload {} {} values into a buffer of {} {} values",
                source.len(),
                source.element_type(),
                destination.len(),
                destination.element_type
            )));
        }
        match source {
            HostView::F32(values) => {
                for (d, s) in destination.data.iter_mut().zip(values) {
                    *d = f64::from(*s);
                }
            }
            HostView::F64(values) => destination.data.copy_from_slice(values),
        }
        Ok(())
    }

    fn execute(
        &mut self,
        graph: &mut HostGraph,
        bindings: &mut Bindings<HostBuffer>,
    ) -> Result<(), DeviceError> {
        if self.stats.fail_next_execute.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::Launch("injected failure".to_string()));
        }
        let periodic_box = match (&bindings.box_vectors, graph.periodic) {
            (Some(buffer), true) => Some(
                PeriodicBox::from_rows(&buffer.data).map_err(|e| DeviceError::Launch(e.to_string()))?,
            ),
            _ => None,
        };

        let positions = &bindings.positions.data;
        let mut energy = 0.0;
        for i in 0..positions.len() / 3 {
            let mut r = Vector3::new(positions[3 * i], positions[3 * i + 1], positions[3 * i + 2]);
            if let Some(pbox) = &periodic_box {
                r = pbox.wrap(&r);
            }
            energy += r.norm_squared();
            for k in 0..3 {
                bindings.forces.store(3 * i + k, -2.0 * r[k]);
            }
        }
        bindings.energy.store(0, energy);

        self.stats.executions.fetch_add(1, Ordering::SeqCst);
        self.pending = true;
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), DeviceError> {
        self.stats.synchronizations.fetch_add(1, Ordering::SeqCst);
        self.pending = false;
        Ok(())
    }

    fn download(&mut self, source: &HostBuffer, destination: HostViewMut<'_>) -> Result<(), DeviceError> {
        if self.pending {
            return Err(DeviceError::Transfer("read before synchronize".to_string()));
        }
        if source.len() != destination.len() {
            return Err(DeviceError::Transfer("buffer length mismatch".to_string()));
        }
        match destination {
            HostViewMut::F32(values) => {
                for (d, s) in values.iter_mut().zip(&source.data) {
                    *d = *s as f32;
                }
            }
            HostViewMut::F64(values) => values.copy_from_slice(&source.data),
        }
        Ok(())
    }
}

pub fn graph_source(periodic: bool, precision: &str) -> String {
    format!("potential = \"squared-norm\"\nperiodic = {periodic}\nprecision = \"{precision}\"\n")
}

/// Writes a serialized graph into a fresh temporary directory.
pub fn write_graph(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.graph");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

pub fn force_from(contents: &str, periodic: bool) -> (TempDir, Arc<NeuralNetworkForce>) {
    let (dir, path) = write_graph(contents);
    let mut force = NeuralNetworkForce::from_file(&path).unwrap();
    force.set_uses_periodic_boundary_conditions(periodic);
    (dir, Arc::new(force))
}

pub fn host_config(precision: Precision, policy: PrecisionPolicy) -> PlatformConfig {
    PlatformConfigBuilder::new()
        .platform_name(HOST_PLATFORM)
        .precision(precision)
        .precision_policy(policy)
        .build()
        .unwrap()
}

pub fn host_registry(stats: &Arc<HostStats>) -> KernelRegistry {
    let stats = Arc::clone(stats);
    let mut registry = KernelRegistry::new();
    register_neural_force_factories(&mut registry, HOST_PLATFORM, move |_: &PlatformConfig| {
        Ok(HostAccelerator::new(Arc::clone(&stats)))
    })
    .unwrap();
    registry
}

pub fn random_cloud(count: usize, seed: u64) -> Vec<Vector3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ) * 10.0
        })
        .collect()
}

/// Energy and forces of the squared-norm potential computed directly on the host.
pub fn reference(
    positions: &[Vector3<f64>],
    periodic_box: Option<&PeriodicBox>,
) -> (f64, Vec<Vector3<f64>>) {
    let wrapped: Vec<_> = positions
        .iter()
        .map(|r| periodic_box.map_or(*r, |b| b.wrap(r)))
        .collect();
    let energy = wrapped.iter().map(|r| r.norm_squared()).sum();
    let forces = wrapped.iter().map(|r| -2.0 * *r).collect();
    (energy, forces)
}

pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-5 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

pub fn assert_vectors_close(actual: &[Vector3<f64>], expected: &[Vector3<f64>]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        for k in 0..3 {
            assert_close(a[k], e[k]);
        }
    }
}
