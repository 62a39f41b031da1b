//! Provider discovery.

use std::sync::Arc;

use crate::wallet::provider::WalletProvider;

/// Non-interactive check for an injected provider.
pub trait ProviderProbe: Send + Sync {
    /// `None` when no provider is present; never prompts the user.
    fn detect(&self) -> Option<Arc<dyn WalletProvider>>;
}

/// Providers injected into the hosting environment, in injection order.
#[derive(Clone, Default)]
pub struct InjectedProviders {
    providers: Vec<Arc<dyn WalletProvider>>,
    preferred_vendor: Option<String>,
}

impl InjectedProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Prefer the provider carrying this vendor flag when several are present.
    pub fn prefer(mut self, vendor_flag: Option<String>) -> Self {
        self.preferred_vendor = vendor_flag;
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ProviderProbe for InjectedProviders {
    fn detect(&self) -> Option<Arc<dyn WalletProvider>> {
        let preferred = self.preferred_vendor.as_deref().and_then(|flag| {
            self.providers
                .iter()
                .find(|provider| provider.has_flag(flag))
        });

        let selected = preferred.or_else(|| self.providers.first()).cloned();
        match &selected {
            Some(_) => tracing::debug!(candidates = self.providers.len(), "Wallet provider detected"),
            None => tracing::debug!("No wallet provider injected"),
        }
        selected
    }
}

impl std::fmt::Debug for InjectedProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectedProviders")
            .field("providers", &self.providers.len())
            .field("preferred_vendor", &self.preferred_vendor)
            .finish()
    }
}
