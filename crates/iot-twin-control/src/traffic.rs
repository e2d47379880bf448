use crate::action::Action;
use crate::error::ControlError;
use iot_twin_abstract::{AppId, TrafficEndpoint};
use iot_twin_simulator::Simulator;
use tracing::info;

/// Lookup of configurable traffic endpoints by handle.
pub trait EndpointRegistry {
    fn endpoint_mut(&mut self, id: AppId) -> Option<&mut dyn TrafficEndpoint>;
}

impl EndpointRegistry for Simulator {
    fn endpoint_mut(&mut self, id: AppId) -> Option<&mut dyn TrafficEndpoint> {
        Simulator::endpoint_mut(self, id)
    }
}

/// Applies the control action to the single closed-loop traffic source.
/// Every other source keeps the rate it was installed with.
#[derive(Debug)]
pub struct TrafficController {
    controlled: AppId,
}

impl TrafficController {
    pub fn new(controlled: AppId) -> Self {
        Self { controlled }
    }

    pub fn controlled(&self) -> AppId {
        self.controlled
    }

    /// Set the controlled endpoint's rate to the action token. Consumes the
    /// controller: the rate is applied once, before the run. Returns the
    /// rate string now in effect.
    pub fn apply(
        self,
        registry: &mut dyn EndpointRegistry,
        action: &Action,
    ) -> Result<String, ControlError> {
        let endpoint = registry
            .endpoint_mut(self.controlled)
            .ok_or(ControlError::UnknownEndpoint(self.controlled))?;
        endpoint.set_data_rate(action.as_str())?;

        info!(
            "Data rate of {} set to {} ({})",
            endpoint.name(),
            endpoint.data_rate_spec(),
            endpoint.data_rate()
        );
        Ok(endpoint.data_rate_spec().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iot_twin_abstract::{DataRate, RateParseError};
    use std::collections::HashMap;

    struct FakeEndpoint {
        name: String,
        spec: String,
    }

    impl TrafficEndpoint for FakeEndpoint {
        fn name(&self) -> &str {
            &self.name
        }

        fn data_rate_spec(&self) -> &str {
            &self.spec
        }

        fn data_rate(&self) -> DataRate {
            self.spec.parse().unwrap_or_default()
        }

        fn set_data_rate(&mut self, spec: &str) -> Result<(), RateParseError> {
            spec.parse::<DataRate>()?;
            self.spec = spec.to_string();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRegistry(HashMap<AppId, FakeEndpoint>);

    impl EndpointRegistry for FakeRegistry {
        fn endpoint_mut(&mut self, id: AppId) -> Option<&mut dyn TrafficEndpoint> {
            self.0.get_mut(&id).map(|e| e as &mut dyn TrafficEndpoint)
        }
    }

    fn registry() -> FakeRegistry {
        let mut registry = FakeRegistry::default();
        for (id, name, spec) in [(0, "thermostat", "0bps"), (1, "camera", "10Mbps")] {
            registry.0.insert(
                AppId(id),
                FakeEndpoint {
                    name: name.into(),
                    spec: spec.into(),
                },
            );
        }
        registry
    }

    #[test]
    fn only_the_controlled_endpoint_changes() {
        let mut registry = registry();
        let applied = TrafficController::new(AppId(0))
            .apply(&mut registry, &Action::new("3Mbps"))
            .unwrap();

        assert_eq!(applied, "3Mbps");
        assert_eq!(registry.0[&AppId(0)].spec, "3Mbps");
        assert_eq!(registry.0[&AppId(1)].spec, "10Mbps");
    }

    #[test]
    fn malformed_rate_is_reported_by_the_endpoint() {
        let mut registry = registry();
        let err = TrafficController::new(AppId(0))
            .apply(&mut registry, &Action::new("lots"))
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidRate(_)));
        assert_eq!(registry.0[&AppId(0)].spec, "0bps");
    }

    #[test]
    fn unknown_endpoint_is_an_error() {
        let mut registry = registry();
        let err = TrafficController::new(AppId(9))
            .apply(&mut registry, &Action::new("3Mbps"))
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownEndpoint(AppId(9))));
    }
}
