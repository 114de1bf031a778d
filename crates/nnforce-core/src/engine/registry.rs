use super::accelerator::{Accelerator, DeviceError};
use super::config::PlatformConfig;
use super::error::ForceError;
use super::kernel::{CALC_NEURAL_NETWORK_FORCE, CalcNeuralForceKernel, NeuralForceKernel};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// Creates kernel instances for one platform.
pub trait KernelFactory: Send + Sync {
    fn create_kernel(
        &self,
        name: &str,
        config: &PlatformConfig,
    ) -> Result<Box<dyn CalcNeuralForceKernel>, ForceError>;
}

/// Builds [`NeuralForceKernel`]s on accelerators obtained from `provider`.
///
/// The provider opens the device selected by the platform configuration; it runs once per
/// kernel, so every simulation context owns its own accelerator.
pub struct NeuralForceKernelFactory<A, P> {
    provider: P,
    _accelerator: PhantomData<fn() -> A>,
}

impl<A, P> NeuralForceKernelFactory<A, P>
where
    A: Accelerator + 'static,
    P: Fn(&PlatformConfig) -> Result<A, DeviceError> + Send + Sync,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            _accelerator: PhantomData,
        }
    }
}

impl<A, P> KernelFactory for NeuralForceKernelFactory<A, P>
where
    A: Accelerator + 'static,
    P: Fn(&PlatformConfig) -> Result<A, DeviceError> + Send + Sync,
{
    fn create_kernel(
        &self,
        name: &str,
        config: &PlatformConfig,
    ) -> Result<Box<dyn CalcNeuralForceKernel>, ForceError> {
        if name != CALC_NEURAL_NETWORK_FORCE {
            return Err(ForceError::KernelNotRegistered {
                kernel: name.to_string(),
                platform: config.platform_name.clone(),
            });
        }
        let accelerator =
            (self.provider)(config).map_err(|source| ForceError::AcceleratorUnavailable {
                platform: config.platform_name.clone(),
                source,
            })?;
        debug!(
            "Created kernel '{}' on {} (device {}).",
            name,
            accelerator.device_name(),
            config.device_index
        );
        Ok(Box::new(NeuralForceKernel::new(accelerator, config.clone())))
    }
}

/// Maps (kernel name, platform name) pairs to the factories that build them.
#[derive(Default)]
pub struct KernelRegistry {
    factories: HashMap<(String, String), Arc<dyn KernelFactory>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kernel: &str,
        platform: &str,
        factory: Arc<dyn KernelFactory>,
    ) -> Result<(), ForceError> {
        let key = (kernel.to_string(), platform.to_string());
        if self.factories.contains_key(&key) {
            return Err(ForceError::AlreadyRegistered {
                kernel: key.0,
                platform: key.1,
            });
        }
        info!("Registered kernel '{}' for platform '{}'.", kernel, platform);
        self.factories.insert(key, factory);
        Ok(())
    }

    pub fn is_registered(&self, kernel: &str, platform: &str) -> bool {
        self.factories
            .contains_key(&(kernel.to_string(), platform.to_string()))
    }

    /// Creates `kernel` on the platform named by `config`.
    pub fn create_kernel(
        &self,
        kernel: &str,
        config: &PlatformConfig,
    ) -> Result<Box<dyn CalcNeuralForceKernel>, ForceError> {
        let key = (kernel.to_string(), config.platform_name.clone());
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| ForceError::KernelNotRegistered {
                kernel: key.0.clone(),
                platform: key.1.clone(),
            })?;
        factory.create_kernel(kernel, config)
    }
}

/// Registers the neural-network force kernel for `platform`, backed by accelerators from
/// `provider`.
pub fn register_neural_force_factories<A, P>(
    registry: &mut KernelRegistry,
    platform: &str,
    provider: P,
) -> Result<(), ForceError>
where
    A: Accelerator + 'static,
    P: Fn(&PlatformConfig) -> Result<A, DeviceError> + Send + Sync + 'static,
{
    registry.register(
        CALC_NEURAL_NETWORK_FORCE,
        platform,
        Arc::new(NeuralForceKernelFactory::new(provider)),
    )
}
