//! BDD scenarios for the provisioning walkthrough.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionContext, provision_context};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Provision, list and delete everything"
)]
fn scenario_full_walkthrough(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Stop at a failing step and still delete the resource group"
)]
fn scenario_step_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Fail on the second event hub and still delete the resource group"
)]
fn scenario_second_hub_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Skip cleanup when the resource group is never created"
)]
fn scenario_resource_group_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Report a cleanup failure without failing the run"
)]
fn scenario_cleanup_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Keep the original error when cleanup also fails"
)]
fn scenario_double_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Clean up when shutdown is requested"
)]
fn scenario_shutdown(provision_context: ProvisionContext) {
    let _ = provision_context;
}
