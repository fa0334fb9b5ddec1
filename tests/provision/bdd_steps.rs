//! BDD step definitions for the provisioning walkthrough.

use std::future;

use ehprov::test_support::{DEFAULT_CONSUMER_GROUP, Operation};
use ehprov::{CleanupOutcome, ProvisionOrchestrator};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{ProvisionContext, RunFailure, RunFailureKind, RunOutcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

const CREATION_ORDER: [Operation; 11] = [
    Operation::CreateResourceGroup,
    Operation::CreateNamespace,
    Operation::CreateStorageAccount,
    Operation::GetBlobService,
    Operation::CreateBlobContainer,
    Operation::CreateEventHub,
    Operation::CreateConsumerGroup,
    Operation::CreateAuthorizationRule,
    Operation::ListConsumerGroups,
    Operation::CreateEventHub,
    Operation::ListEventHubs,
];

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

#[given("a scripted resource manager")]
fn scripted_manager(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context
}

#[given("the \"{operation}\" operation fails")]
fn operation_fails(provision_context: ProvisionContext, operation: String) -> ProvisionContext {
    provision_context
        .manager
        .fail_on(ProvisionContext::operation(&operation));
    provision_context
}

#[given("call {occurrence} of the \"{operation}\" operation fails")]
fn nth_operation_fails(
    provision_context: ProvisionContext,
    occurrence: usize,
    operation: String,
) -> ProvisionContext {
    provision_context
        .manager
        .fail_at(ProvisionContext::operation(&operation), occurrence);
    provision_context
}

#[given("shutdown has already been requested")]
fn shutdown_requested(mut provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.shutdown_requested = true;
    provision_context
}

#[when("I run the provisioning walkthrough")]
fn run_walkthrough(provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let ProvisionContext {
        manager,
        plan,
        shutdown_requested,
        ..
    } = provision_context;

    let orchestrator = ProvisionOrchestrator::new(manager.clone());
    let result = runtime.block_on(async {
        if shutdown_requested {
            orchestrator.execute_until(&plan, future::ready(())).await
        } else {
            orchestrator.execute(&plan).await
        }
    });
    let outcome = match result {
        Ok(report) => RunOutcome::Succeeded(report),
        Err(err) => RunOutcome::Failed(RunFailure::from_error(&err)),
    };

    Ok(ProvisionContext {
        manager,
        plan,
        shutdown_requested,
        outcome: Some(outcome),
    })
}

#[then("the run succeeds")]
fn run_succeeds(provision_context: &ProvisionContext) -> Result<(), StepError> {
    match &provision_context.outcome {
        Some(RunOutcome::Succeeded(_)) => Ok(()),
        Some(RunOutcome::Failed(failure)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {}",
            failure.message
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the run fails at step \"{step}\"")]
fn run_fails_at(provision_context: &ProvisionContext, step: String) -> Result<(), StepError> {
    let failure = provision_context
        .failure()
        .ok_or_else(|| StepError::Assertion(String::from("expected failure outcome")))?;
    match &failure.kind {
        RunFailureKind::Step(actual) if actual.to_string() == step => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure at {step}, got {other:?}: {}",
            failure.message
        ))),
    }
}

#[then("the run fails before any resource exists")]
fn run_fails_early(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let failure = provision_context
        .failure()
        .ok_or_else(|| StepError::Assertion(String::from("expected failure outcome")))?;
    ensure(failure.kind == RunFailureKind::ResourceGroup, || {
        format!("expected resource group failure, got {:?}", failure.kind)
    })?;
    ensure(provision_context.manager.remaining_resources() == 0, || {
        String::from("no resource should exist")
    })
}

#[then("the run is cancelled")]
fn run_cancelled(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let failure = provision_context
        .failure()
        .ok_or_else(|| StepError::Assertion(String::from("expected failure outcome")))?;
    ensure(failure.kind == RunFailureKind::Cancelled, || {
        format!("expected cancellation, got {:?}", failure.kind)
    })
}

#[then("the operations run in the documented order")]
fn operations_in_order(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let operations = provision_context.manager.operations();
    let mut expected = CREATION_ORDER.to_vec();
    expected.push(Operation::DeleteResourceGroup);
    ensure(operations == expected, || {
        format!("unexpected call order: {operations:?}")
    })?;
    ensure(provision_context.manager.max_in_flight() == 1, || {
        String::from("calls overlapped")
    })
}

#[then("no operation runs after \"{operation}\" except cleanup")]
fn nothing_after(provision_context: &ProvisionContext, operation: String) -> Result<(), StepError> {
    let failing = ProvisionContext::operation(&operation);
    let operations = provision_context.manager.operations();
    let position = operations
        .iter()
        .position(|recorded| *recorded == failing)
        .ok_or_else(|| StepError::Assertion(format!("{failing} was never called")))?;
    let after: Vec<_> = operations.iter().skip(position + 1).collect();
    ensure(after == [&Operation::DeleteResourceGroup], || {
        format!("operations after {failing}: {after:?}")
    })
}

#[then("the resource group is deleted exactly once")]
fn deleted_once(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let deletes = provision_context
        .manager
        .count(Operation::DeleteResourceGroup);
    ensure(deletes == 1, || format!("expected one delete, saw {deletes}"))
}

#[then("the resource group is never deleted")]
fn never_deleted(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let deletes = provision_context
        .manager
        .count(Operation::DeleteResourceGroup);
    ensure(deletes == 0, || format!("expected no delete, saw {deletes}"))
}

#[then("nothing is left behind")]
fn nothing_left(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let remaining = provision_context.manager.remaining_resources();
    ensure(remaining == 0, || format!("{remaining} resources remain"))
}

#[then("the capture destination uses the storage account from the run")]
fn capture_matches_storage(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let report = provision_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("expected a report")))?;
    let captures = provision_context.captures();
    let Some(Some(capture)) = captures.first() else {
        return Err(StepError::Assertion(String::from(
            "first event hub was created without capture",
        )));
    };
    ensure(
        capture.destination.storage_account_id == report.summary.storage_account.id,
        || format!("capture points at {}", capture.destination.storage_account_id),
    )?;
    ensure(
        capture.destination.blob_container == report.summary.blob_container.name,
        || format!("capture container is {}", capture.destination.blob_container),
    )
}

#[then("the consumer group listing includes \"{first}\" and \"{second}\"")]
fn consumer_groups_listed(
    provision_context: &ProvisionContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    let report = provision_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("expected a report")))?;
    let names: Vec<&str> = report
        .summary
        .consumer_groups
        .iter()
        .map(|group| group.name.as_str())
        .collect();
    ensure(
        names.len() == 2 && names.contains(&first.as_str()) && names.contains(&second.as_str()),
        || format!("listed consumer groups: {names:?}"),
    )?;
    ensure(names.contains(&DEFAULT_CONSUMER_GROUP), || {
        String::from("default consumer group missing")
    })
}

#[then("the event hub listing includes both event hubs")]
fn event_hubs_listed(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let report = provision_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("expected a report")))?;
    let names: Vec<&str> = report
        .summary
        .event_hubs
        .iter()
        .map(|hub| hub.name.as_str())
        .collect();
    let plan = &provision_context.plan;
    ensure(
        names.len() == 2
            && names.contains(&plan.primary_event_hub.as_str())
            && names.contains(&plan.secondary_event_hub.as_str()),
        || format!("listed event hubs: {names:?}"),
    )
}

#[then("the cleanup failure is reported")]
fn cleanup_failure_reported(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let report = provision_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("expected a report")))?;
    ensure(
        matches!(report.cleanup, CleanupOutcome::Failed { .. }),
        || format!("cleanup outcome was {:?}", report.cleanup),
    )
}

#[then("the failure mentions the teardown failure")]
fn failure_mentions_teardown(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let failure = provision_context
        .failure()
        .ok_or_else(|| StepError::Assertion(String::from("expected failure outcome")))?;
    ensure(failure.message.contains("teardown also failed"), || {
        format!("message lacks teardown note: {}", failure.message)
    })
}
