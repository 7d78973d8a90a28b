use std::collections::HashMap;
use std::sync::Arc;

use super::fomopay::Fomopay;
use super::payu::Payu;
use super::processor::{PaymentProcessor, Processor};
use crate::config::PaymentsConfig;
use crate::core::{AppError, Result};

/// Configured payment processors, keyed by name
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<&'static str, Arc<Processor>>,
}

impl ProcessorRegistry {
    /// Register every processor that has a configuration section
    pub fn from_config(config: &PaymentsConfig) -> Self {
        let mut registry = Self::default();

        if let Some(fomopay) = &config.fomopay {
            registry = registry.with(Processor::Fomopay(Fomopay::new(fomopay.clone())));
        }
        if let Some(payu) = &config.payu {
            registry = registry.with(Processor::Payu(Payu::new(payu.clone())));
        }

        registry
    }

    pub fn with(mut self, processor: Processor) -> Self {
        tracing::debug!(processor = processor.name(), "Payment processor registered");
        self.processors.insert(processor.name(), Arc::new(processor));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<Processor>> {
        self.processors.get(name).cloned()
    }

    /// Like [`get`](Self::get), failing with `NotFound` for unknown names
    pub fn require(&self, name: &str) -> Result<Arc<Processor>> {
        self.get(name)
            .ok_or_else(|| AppError::not_found(format!("Payment processor [{}] is not configured", name)))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.processors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
