use super::{
    finish, log_transition, ClusterOrchestrator, ClusterState, DeleteOutcome, DeleteRequest,
    StackTransition,
};
use crate::error::{Result, StratusError};
use std::time::Instant;
use tracing::{info, instrument};

const DELETE_PROMPT: &str = "Are you sure you want to delete your cluster? [y/N]";

impl ClusterOrchestrator {
    /// Delete the cluster's stack, if any, then its registry entry.
    ///
    /// Without `request.force` the operator is asked to confirm first; any
    /// answer other than yes aborts before a remote call is made.
    #[instrument(skip(self, request), fields(cluster = %request.cluster))]
    pub async fn delete(&self, request: &DeleteRequest) -> Result<DeleteOutcome> {
        let started = Instant::now();
        let result = self.delete_cluster(request).await;
        finish("delete", started, result)
    }

    async fn delete_cluster(&self, request: &DeleteRequest) -> Result<DeleteOutcome> {
        if request.cluster.is_empty() {
            return Err(StratusError::ClusterNotSet);
        }
        if !request.force && !self.confirm.confirm(DELETE_PROMPT)? {
            return Err(StratusError::Aborted {
                reason: "Aborted cluster deletion. To delete your cluster, re-run this command and specify the '--force' flag or confirm that you'd like to delete your cluster at the prompt".to_string(),
            });
        }

        self.validate_active(&request.cluster).await?;

        let stack_name = self.stack_name(&request.cluster);
        let stack_deleted = if self.stack_exists(&stack_name).await? {
            log_transition(&request.cluster, ClusterState::ActiveWithStack, ClusterState::Deleting);
            self.stacks.delete_stack(&stack_name).await?;
            info!("Waiting for your cluster resources to be deleted...");
            self.wait_for(StackTransition::Delete, &stack_name).await?;
            true
        } else {
            info!("No CloudFormation stack found for cluster '{}'", request.cluster);
            log_transition(&request.cluster, ClusterState::ActiveNoStack, ClusterState::Deleting);
            false
        };

        let registry_id = self.registry.delete_cluster(&request.cluster).await?;
        info!("Deleted cluster {}", request.cluster);
        log_transition(&request.cluster, ClusterState::Deleting, ClusterState::NonExistent);

        Ok(DeleteOutcome { registry_id, stack_deleted })
    }
}
