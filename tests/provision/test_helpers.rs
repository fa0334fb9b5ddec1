//! Shared fixtures for provisioning BDD scenarios.

use ehprov::test_support::{ManagerCall, Operation, ScriptedManager, ScriptedManagerError};
use ehprov::{
    CaptureDescription, ProvisionError, ProvisionPlan, ProvisionReport, ProvisionStep, Region,
};
use rstest::fixture;

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub manager: ScriptedManager,
    pub plan: ProvisionPlan,
    pub shutdown_requested: bool,
    pub outcome: Option<RunOutcome>,
}

#[derive(Clone, Debug)]
pub enum RunOutcome {
    Succeeded(ProvisionReport),
    Failed(RunFailure),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunFailure {
    pub kind: RunFailureKind,
    pub message: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunFailureKind {
    ResourceGroup,
    Step(ProvisionStep),
    Cancelled,
}

impl RunFailure {
    pub fn from_error(err: &ProvisionError<ScriptedManagerError>) -> Self {
        let kind = match err {
            ProvisionError::ResourceGroup(_) => RunFailureKind::ResourceGroup,
            ProvisionError::Step { step, .. } => RunFailureKind::Step(*step),
            ProvisionError::Cancelled { .. } => RunFailureKind::Cancelled,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl ProvisionContext {
    pub fn operation(name: &str) -> Operation {
        Operation::from_name(name).unwrap_or_else(|| panic!("unknown operation {name}"))
    }

    pub fn report(&self) -> Option<&ProvisionReport> {
        match &self.outcome {
            Some(RunOutcome::Succeeded(report)) => Some(report),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match &self.outcome {
            Some(RunOutcome::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    pub fn captures(&self) -> Vec<Option<CaptureDescription>> {
        self.manager
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                ManagerCall::CreateEventHub { capture, .. } => Some(capture),
                _ => None,
            })
            .collect()
    }
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    ProvisionContext {
        manager: ScriptedManager::new(),
        plan: ProvisionPlan::generate(Region::new("eastus"), Region::new("eastus2")),
        shutdown_requested: false,
        outcome: None,
    }
}
