use crate::core::error::{BridgeError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// Login/handshake with the exchange gateway.
///
/// Both the data and the execution side require `login` to have completed
/// before they start routing or submitting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeSession: Send + Sync {
    async fn login(
        &self,
        front_address: &str,
        broker_id: &str,
        investor_id: &str,
        password: &str,
    ) -> Result<()>;

    async fn connect(&self, address: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionState {
    pub front_address: Option<String>,
    pub investor_id: Option<String>,
    pub connected_to: Option<String>,
}

/// Session for deployments where an external bridge process owns the exchange
/// connection and this process only talks to it over the message bus.
///
/// Login checks that a credential set is present and remembers it; `connect`
/// records the bus address.
#[derive(Debug, Default)]
pub struct PassthroughSession {
    state: Mutex<SessionState>,
}

impl PassthroughSession {
    pub fn new() -> Self {
        PassthroughSession::default()
    }

    pub fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update<F: FnOnce(&mut SessionState)>(&self, f: F) {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl ExchangeSession for PassthroughSession {
    async fn login(
        &self,
        front_address: &str,
        broker_id: &str,
        investor_id: &str,
        password: &str,
    ) -> Result<()> {
        if front_address.is_empty() {
            return Err(BridgeError::AuthenticationError(
                "gateway front address is empty".to_string(),
            ));
        }
        if broker_id.is_empty() || investor_id.is_empty() || password.is_empty() {
            return Err(BridgeError::AuthenticationError(format!(
                "incomplete credentials for investor {:?}",
                investor_id
            )));
        }
        log::info!("logged in {} at {}", investor_id, front_address);
        self.update(|state| {
            state.front_address = Some(front_address.to_string());
            state.investor_id = Some(investor_id.to_string());
        });
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<()> {
        if self.state().investor_id.is_none() {
            return Err(BridgeError::AuthenticationError(
                "connect called before login".to_string(),
            ));
        }
        log::info!("session online via {}", address);
        self.update(|state| state.connected_to = Some(address.to_string()));
        Ok(())
    }
}
