use super::{
    finish, log_transition, parse_size, ClusterOrchestrator, ClusterState, ScaleOutcome,
    ScaleRequest, StackTransition,
};
use crate::error::{Result, StratusError};
use crate::params::{keys, StackParams, REQUIRED_PARAMETERS};
use std::time::Instant;
use tracing::{info, instrument};

impl ClusterOrchestrator {
    /// Change the maximum size of the cluster's instance group.
    ///
    /// Every other stack parameter keeps its deployed value.
    #[instrument(skip(self, request), fields(cluster = %request.cluster))]
    pub async fn scale(&self, request: &ScaleRequest) -> Result<ScaleOutcome> {
        let started = Instant::now();
        let result = self.scale_cluster(request).await;
        finish("scale", started, result)
    }

    async fn scale_cluster(&self, request: &ScaleRequest) -> Result<ScaleOutcome> {
        if !request.capability_iam {
            return Err(StratusError::validation(
                "Please acknowledge that this command may create IAM resources with the '--capability-iam' flag",
            ));
        }
        let size = parse_size(request.size.as_deref())?
            .ok_or_else(|| StratusError::validation("Missing required flag '--size'"))?;

        self.validate_active(&request.cluster).await?;

        let stack_name = self.stack_name(&request.cluster);
        let existing = self.stacks.stack_parameters(&stack_name).await.map_err(|e| {
            if e.is_not_found() {
                StratusError::StackNotFound { stack: stack_name.clone() }
            } else {
                e
            }
        })?;

        let mut params = StackParams::for_update(REQUIRED_PARAMETERS, &existing);
        params.add(keys::ASG_MAX_SIZE, size.to_string());

        log_transition(&request.cluster, ClusterState::ActiveWithStack, ClusterState::ScaledUpdate);
        let stack_id = self.stacks.update_stack(&stack_name, &params).await?;
        info!("Waiting for your cluster resources to be updated...");
        self.wait_for(StackTransition::Update, &stack_name).await?;
        log_transition(&request.cluster, ClusterState::ScaledUpdate, ClusterState::ActiveWithStack);

        Ok(ScaleOutcome { stack_name, stack_id, size })
    }
}
