// Route planner - ties ordering, directions and assembly together
// This file implements the plan pipeline that the UI layer calls: optimize the
// stop order, fetch legs for it, assemble the result and drop stale responses
//
// Numan Thabit 2025 Nov

pub mod supersession;

pub use supersession::{RequestTicket, RequestTracker};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assembler::RouteAssembler;
use crate::directions::DirectionsProvider;
use crate::errors::{OptimizationError, PlannerError};
use crate::metrics::{ROUTING_ERRORS, STALE_RESULTS};
use crate::models::{OptimizedRouteResult, OriginalRouteInputs};
use crate::optimizer::{CostMetric, RouteOptimizer, StopOrder, TravelMatrixProvider};

/// Outcome of a plan request
#[derive(Debug)]
pub enum PlanOutcome {
    /// Result of the most recent request
    Current(OptimizedRouteResult),
    /// A newer request was issued while this one was in flight
    Superseded,
}

impl PlanOutcome {
    pub fn into_current(self) -> Option<OptimizedRouteResult> {
        match self {
            PlanOutcome::Current(result) => Some(result),
            PlanOutcome::Superseded => None,
        }
    }
}

pub struct RoutePlanner<M, D> {
    optimizer: Arc<RouteOptimizer>,
    matrix: M,
    directions: D,
    assembler: RouteAssembler,
    requests: RequestTracker,
}

impl<M, D> RoutePlanner<M, D>
where
    M: TravelMatrixProvider,
    D: DirectionsProvider,
{
    pub fn new(optimizer: Arc<RouteOptimizer>, matrix: M, directions: D, assembler: RouteAssembler) -> Self {
        Self {
            optimizer,
            matrix,
            directions,
            assembler,
            requests: RequestTracker::new(),
        }
    }

    pub fn optimizer(&self) -> &Arc<RouteOptimizer> {
        &self.optimizer
    }

    /// Plan a route for `inputs`. Results and failures of a request that was
    /// overtaken by a newer one come back as `Superseded`.
    #[tracing::instrument(skip_all, fields(stops = inputs.stops.len(), traffic = inputs.include_traffic))]
    pub async fn plan(&self, inputs: &OriginalRouteInputs) -> Result<PlanOutcome, PlannerError> {
        let ticket = self.requests.begin();
        let outcome = self.plan_inner(inputs).await;

        if !self.requests.is_current(ticket) {
            let label = if outcome.is_ok() { "ok" } else { "error" };
            STALE_RESULTS.with_label_values(&[label]).inc();
            debug!(request = ticket.sequence(), "discarding superseded plan result");
            return Ok(PlanOutcome::Superseded);
        }

        let result = outcome?;
        info!(
            request = ticket.sequence(),
            stops = result.optimized_stops().len(),
            total_distance = %result.total_distance(),
            estimated_time = %result.estimated_time(),
            "route planned"
        );
        Ok(PlanOutcome::Current(result))
    }

    async fn plan_inner(&self, inputs: &OriginalRouteInputs) -> Result<OptimizedRouteResult, PlannerError> {
        let order = self.order(inputs).await?;
        let mut ordered = order.apply(&inputs.stops);
        if inputs.round_trip && ordered.len() > 1 {
            ordered.push(ordered[0].clone());
        }

        let legs = self
            .directions
            .route(&ordered, inputs.include_traffic)
            .await
            .inspect_err(|err| {
                ROUTING_ERRORS.with_label_values(&[err.kind()]).inc();
                warn!(error = %err, "directions lookup failed");
            })?;

        Ok(self.assembler.assemble(ordered, legs)?)
    }

    async fn order(&self, inputs: &OriginalRouteInputs) -> Result<StopOrder, OptimizationError> {
        let stops = &inputs.stops;
        let constraints = inputs.constraints();
        let metric = CostMetric::for_traffic(inputs.include_traffic);
        if stops.len() <= 1 {
            return Ok(StopOrder::identity(stops.len()));
        }
        if let Some(order) = self.optimizer.lookup(stops, constraints, metric) {
            return Ok(order);
        }
        let matrix = self
            .matrix
            .matrix(stops, metric, inputs.include_traffic)
            .await
            .map_err(|err| {
                warn!(error = %err, "travel matrix unavailable");
                OptimizationError::MatrixUnavailable(err.to_string())
            })?;
        self.optimizer.optimize(stops, constraints, metric, &matrix)
    }
}
